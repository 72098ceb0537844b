//! Registry of active authenticated sessions, keyed by peer name.
//!
//! Replaces a single mutable "current peer" pointer: reads and writes of
//! the active session become registry lookups, and independent sessions to
//! different peers can coexist.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::info;

use crate::error::ChatError;
use crate::session::Messenger;
use crate::wire::Packet;

/// Handle to one established session: its messenger plus the outbound
/// packet queue drained by the connection's writer task.
pub struct SessionHandle {
    /// Encodes and decodes payloads under this session's key.
    pub messenger: Messenger,
    outbound: mpsc::Sender<Packet>,
}

impl SessionHandle {
    pub fn new(messenger: Messenger, outbound: mpsc::Sender<Packet>) -> Self {
        Self { messenger, outbound }
    }

    /// Queue a packet for sending on this session's connection.
    pub async fn send(&self, packet: Packet) -> Result<(), ChatError> {
        self.outbound.send(packet).await.map_err(|_| {
            ChatError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "session connection closed",
            ))
        })
    }
}

/// All currently authenticated sessions.
///
/// Dropping a handle out of the registry drops its messenger, and with it
/// the session key (zeroized on drop).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a session for `peer`, replacing any previous one.
    pub fn install(&self, peer: &str, handle: SessionHandle) -> Arc<SessionHandle> {
        let handle = Arc::new(handle);
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions.insert(peer.to_string(), handle.clone()).is_some() {
            info!(peer, "replaced existing session");
        }
        handle
    }

    /// Looks up the session for `peer`.
    pub fn get(&self, peer: &str) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(peer).cloned()
    }

    /// Removes the session for `peer`, invalidating its key.
    pub fn remove(&self, peer: &str) -> Option<Arc<SessionHandle>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(peer)
    }

    /// Whether an authenticated session with `peer` exists.
    pub fn is_connected(&self, peer: &str) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.contains_key(peer)
    }

    /// Names of all currently connected peers.
    pub fn connected_peers(&self) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.keys().cloned().collect()
    }
}
