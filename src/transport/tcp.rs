//! TCP transport using tokio.

use tokio::net::{TcpListener as TokioTcpListener, TcpStream, ToSocketAddrs};

use crate::error::ChatError;
use crate::transport::PacketStream;

/// A framed packet stream over TCP.
pub type TcpConnection = PacketStream<TcpStream>;

/// Opens an outbound connection to a peer.
pub async fn dial<A: ToSocketAddrs>(addr: A) -> Result<TcpConnection, ChatError> {
    let stream = TcpStream::connect(addr).await?;
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    Ok(PacketStream::new(stream, peer_addr))
}

/// TCP listener yielding inbound chat connections.
pub struct TcpListener {
    listener: TokioTcpListener,
}

impl TcpListener {
    /// Bind to an address and start listening.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, ChatError> {
        let listener = TokioTcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<TcpConnection, ChatError> {
        let (stream, addr) = self.listener.accept().await?;
        Ok(PacketStream::new(stream, addr.to_string()))
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }
}
