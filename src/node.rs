//! Connection management: dialing, accepting, and per-session pumps.
//!
//! A [`Node`] ties the handshake, session registry, and transport together.
//! One task runs the accept loop, matching each inbound connection to a
//! discovered contact by address before running the responder handshake.
//! Each authenticated connection then gets two tasks: a writer draining the
//! session's outbound queue, and a pump forwarding decrypted payloads as
//! [`ChatEvent`]s.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::crypto::SessionKey;
use crate::error::ChatError;
use crate::handshake;
use crate::peer::{discover_contacts, ContactDirectory, PeerDiscovery, PeerInfo};
use crate::session::{Incoming, Messenger, SessionHandle, SessionRegistry};
use crate::transport::tcp::{dial, TcpConnection, TcpListener};
use crate::transport::{PacketReceiver, PacketTransport};

/// Something that happened on an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A session with `peer` was established.
    Connected { peer: String },
    /// A text message arrived.
    Message { peer: String, text: String },
    /// A file arrived and was written to `path`.
    FileReceived {
        peer: String,
        path: PathBuf,
        size: usize,
    },
    /// The session with `peer` ended (disconnect or fatal error).
    Disconnected { peer: String },
}

/// Tunables for a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory received files are written into.
    pub download_dir: PathBuf,
    /// Deadline for each individual handshake step.
    pub step_deadline: Duration,
    /// Capacity of each session's outbound packet queue.
    pub outbound_queue: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            step_deadline: Duration::from_secs(10),
            outbound_queue: 32,
        }
    }
}

/// One chat node: local identity, collaborators, and active sessions.
pub struct Node<D, C> {
    local_name: String,
    discovery: Arc<D>,
    contacts: Arc<C>,
    registry: Arc<SessionRegistry>,
    events: mpsc::Sender<ChatEvent>,
    config: NodeConfig,
}

impl<D, C> Clone for Node<D, C> {
    fn clone(&self) -> Self {
        Self {
            local_name: self.local_name.clone(),
            discovery: self.discovery.clone(),
            contacts: self.contacts.clone(),
            registry: self.registry.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D, C> Node<D, C>
where
    D: PeerDiscovery + 'static,
    C: ContactDirectory + 'static,
{
    /// Creates a node and the receiving end of its event stream.
    pub fn new(
        local_name: impl Into<String>,
        discovery: D,
        contacts: C,
        config: NodeConfig,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (events, event_rx) = mpsc::channel(64);
        (
            Self {
                local_name: local_name.into(),
                discovery: Arc::new(discovery),
                contacts: Arc::new(contacts),
                registry: Arc::new(SessionRegistry::new()),
                events,
                config,
            },
            event_rx,
        )
    }

    /// The active session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Peers currently advertised that we have a password for.
    pub fn discover(&self) -> Vec<PeerInfo> {
        discover_contacts(&*self.discovery, &*self.contacts, &self.local_name)
    }

    /// Dials `peer` and runs the initiator handshake.
    ///
    /// On success the session is installed and its pump tasks are running.
    pub async fn connect(&self, peer: &PeerInfo) -> Result<(), ChatError> {
        let password = self.contacts.password_for(&peer.name)?;

        let mut conn = dial(peer.socket_addr()).await?;
        let key = match handshake::initiate(&mut conn, &password, self.config.step_deadline).await
        {
            Ok(key) => key,
            Err(e) => {
                // Fatal to the attempt: tear the connection down, keep nothing.
                let _ = conn.close().await;
                return Err(e);
            }
        };

        info!(peer = %peer.name, "connected");
        self.install_session(peer.name.clone(), conn, key).await;
        Ok(())
    }

    /// Runs the accept loop. Long-lived; spawn it once per node.
    pub async fn run_acceptor(&self, listener: TcpListener) {
        loop {
            let conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };

            let node = self.clone();
            tokio::spawn(async move { node.handle_inbound(conn).await });
        }
    }

    /// Handles one inbound connection through its handshake.
    async fn handle_inbound(self, mut conn: TcpConnection) {
        let remote = conn.peer_addr();

        let peer = match self.resolve_peer(&remote) {
            Some(peer) => peer,
            None => {
                warn!(%remote, "inbound connection from no known contact, dropping");
                let _ = conn.close().await;
                return;
            }
        };

        let password = match self.contacts.password_for(&peer.name) {
            Ok(password) => password,
            Err(e) => {
                warn!(peer = %peer.name, "dropping inbound connection: {e}");
                let _ = conn.close().await;
                return;
            }
        };

        match handshake::respond(&mut conn, &password, self.config.step_deadline).await {
            Ok(key) => {
                info!(peer = %peer.name, "accepted connection");
                self.install_session(peer.name, conn, key).await;
            }
            Err(e) => {
                warn!(peer = %peer.name, "handshake failed: {e}");
                let _ = conn.close().await;
            }
        }
    }

    /// Matches an inbound remote address against the discovery snapshot,
    /// filtered to known contacts.
    fn resolve_peer(&self, remote: &str) -> Option<PeerInfo> {
        let remote: SocketAddr = remote.parse().ok()?;
        self.discover().into_iter().find(|p| p.addr == remote.ip())
    }

    /// Installs the session and spawns its writer and pump tasks.
    async fn install_session(&self, peer: String, conn: TcpConnection, key: SessionKey) {
        let messenger =
            Messenger::new(key).with_download_dir(&self.config.download_dir);

        let (outbound_tx, mut outbound_rx) = mpsc::channel(self.config.outbound_queue);
        let (mut sender, receiver) = conn.into_split();

        // Writer: drains the outbound queue until the handle is dropped.
        tokio::spawn(async move {
            while let Some(packet) = outbound_rx.recv().await {
                if let Err(e) = sender.send(&packet).await {
                    debug!("writer stopped: {e}");
                    break;
                }
            }
            let _ = sender.close().await;
        });

        self.registry
            .install(&peer, SessionHandle::new(messenger.clone(), outbound_tx));
        let _ = self
            .events
            .send(ChatEvent::Connected { peer: peer.clone() })
            .await;

        let node = self.clone();
        tokio::spawn(async move { node.pump(peer, receiver, messenger).await });
    }

    /// Drains incoming packets for one session until it dies.
    async fn pump(
        self,
        peer: String,
        mut receiver: PacketReceiver<TcpStream>,
        messenger: Messenger,
    ) {
        loop {
            let packet = match receiver.recv().await {
                Ok(packet) => packet,
                Err(e) => {
                    debug!(peer = %peer, "connection closed: {e}");
                    break;
                }
            };

            match messenger.receive(&packet) {
                Ok(Incoming::Text(text)) => {
                    let _ = self
                        .events
                        .send(ChatEvent::Message {
                            peer: peer.clone(),
                            text,
                        })
                        .await;
                }
                Ok(Incoming::File { path, size }) => {
                    let _ = self
                        .events
                        .send(ChatEvent::FileReceived {
                            peer: peer.clone(),
                            path,
                            size,
                        })
                        .await;
                }
                Err(e) => {
                    // The session key can no longer be trusted.
                    warn!(peer = %peer, "dropping session: {e}");
                    break;
                }
            }
        }

        self.registry.remove(&peer);
        let _ = self.events.send(ChatEvent::Disconnected { peer }).await;
    }

    /// Sends a text message to a connected peer.
    pub async fn send_text(&self, peer: &str, text: &str) -> Result<(), ChatError> {
        let handle = self
            .registry
            .get(peer)
            .ok_or_else(|| ChatError::UnknownPeer(peer.to_string()))?;

        let packet = handle.messenger.text_packet(text)?;
        handle.send(packet).await
    }

    /// Sends a local file to a connected peer.
    pub async fn send_file(&self, peer: &str, path: &Path) -> Result<(), ChatError> {
        let handle = self
            .registry
            .get(peer)
            .ok_or_else(|| ChatError::UnknownPeer(peer.to_string()))?;

        let packet = handle.messenger.file_packet(path)?;
        handle.send(packet).await
    }

    /// Sends a local file under an explicit destination name.
    pub async fn send_file_as(
        &self,
        peer: &str,
        path: &Path,
        dest: &str,
    ) -> Result<(), ChatError> {
        let handle = self
            .registry
            .get(peer)
            .ok_or_else(|| ChatError::UnknownPeer(peer.to_string()))?;

        let packet = handle.messenger.file_packet_as(path, dest)?;
        handle.send(packet).await
    }

    /// Closes the session with `peer`, if any.
    pub fn disconnect(&self, peer: &str) {
        if self.registry.remove(peer).is_some() {
            info!(peer, "disconnected");
        }
    }
}
