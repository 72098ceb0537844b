//! Transport layer for chat connections.
//!
//! The byte stream gives no packet boundaries, so every packet is framed
//! with an explicit little-endian `u32` length prefix. One logical packet
//! may span multiple physical reads or writes without corrupting protocol
//! state.

pub mod tcp;

pub use tcp::{TcpConnection, TcpListener};

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};

use crate::error::ChatError;
use crate::wire::{Packet, MAX_PACKET_BYTES};

/// Trait for bidirectional async packet transport.
#[async_trait]
pub trait PacketTransport: Send {
    /// Send one packet.
    async fn send_packet(&mut self, packet: &Packet) -> Result<(), ChatError>;

    /// Receive one packet, blocking until a full frame arrives.
    async fn recv_packet(&mut self) -> Result<Packet, ChatError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), ChatError>;

    /// The peer address as a string.
    fn peer_addr(&self) -> String;
}

/// Receives one packet with an explicit deadline.
///
/// Expiry surfaces as [`ChatError::Timeout`], distinct from I/O failure, so
/// callers can tell "peer unreachable" from "peer rejected".
pub async fn recv_packet_deadline<T>(
    transport: &mut T,
    deadline: Duration,
) -> Result<Packet, ChatError>
where
    T: PacketTransport + ?Sized,
{
    tokio::time::timeout(deadline, transport.recv_packet())
        .await
        .map_err(|_| ChatError::Timeout(deadline))?
}

/// Writes a length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ChatError> {
    if data.len() > MAX_PACKET_BYTES {
        return Err(ChatError::Decode(format!(
            "frame too large: {} bytes",
            data.len()
        )));
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a length-prefixed frame, bounding the accepted size.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ChatError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_PACKET_BYTES {
        return Err(ChatError::Decode(format!("frame too large: {} bytes", len)));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// A framed packet stream over any async byte stream.
pub struct PacketStream<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    peer_addr: String,
}

impl<S: AsyncRead + AsyncWrite + Send> PacketStream<S> {
    /// Wrap a byte stream in packet framing.
    pub fn new(stream: S, peer_addr: String) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            peer_addr,
        }
    }

    /// Split into independent send and receive halves.
    ///
    /// Done after the handshake, so the receive pump and outbound senders
    /// don't contend for the connection.
    pub fn into_split(self) -> (PacketSender<S>, PacketReceiver<S>) {
        (
            PacketSender {
                writer: self.writer,
            },
            PacketReceiver {
                reader: self.reader,
                peer_addr: self.peer_addr,
            },
        )
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send> PacketTransport for PacketStream<S> {
    async fn send_packet(&mut self, packet: &Packet) -> Result<(), ChatError> {
        let data = packet.encode()?;
        write_frame(&mut self.writer, &data).await
    }

    async fn recv_packet(&mut self) -> Result<Packet, ChatError> {
        let data = read_frame(&mut self.reader).await?;
        Packet::decode(&data)
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    fn peer_addr(&self) -> String {
        self.peer_addr.clone()
    }
}

/// The write half of a split packet stream.
pub struct PacketSender<S> {
    writer: BufWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite + Send> PacketSender<S> {
    /// Send one packet.
    pub async fn send(&mut self, packet: &Packet) -> Result<(), ChatError> {
        let data = packet.encode()?;
        write_frame(&mut self.writer, &data).await
    }

    /// Flush and shut the write side down.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// The read half of a split packet stream.
pub struct PacketReceiver<S> {
    reader: BufReader<ReadHalf<S>>,
    peer_addr: String,
}

impl<S: AsyncRead + AsyncWrite + Send> PacketReceiver<S> {
    /// Receive one packet, blocking until a full frame arrives.
    pub async fn recv(&mut self) -> Result<Packet, ChatError> {
        let data = read_frame(&mut self.reader).await?;
        Packet::decode(&data)
    }

    /// The peer address as a string.
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Message;

    fn sample_packet() -> Packet {
        Packet::new(vec![Message {
            data: vec![1, 2, 3],
            iv: vec![0; 12],
            tag: vec![0; 16],
        }])
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        write_frame(&mut a, b"hello frame").await.unwrap();
        let data = read_frame(&mut b).await.unwrap();

        assert_eq!(data, b"hello frame");
    }

    #[tokio::test]
    async fn test_frame_rejects_oversized_length_prefix() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let len = (MAX_PACKET_BYTES as u32 + 1).to_le_bytes();
        a.write_all(&len).await.unwrap();

        let result = read_frame(&mut b).await;
        assert!(matches!(result, Err(ChatError::Decode(_))));
    }

    #[tokio::test]
    async fn test_packet_stream_roundtrip() {
        let (a, b) = tokio::io::duplex(4096);
        let mut sender = PacketStream::new(a, "a".to_string());
        let mut receiver = PacketStream::new(b, "b".to_string());

        let packet = sample_packet();
        sender.send_packet(&packet).await.unwrap();

        assert_eq!(receiver.recv_packet().await.unwrap(), packet);
    }

    #[tokio::test]
    async fn test_split_halves_work_independently() {
        let (a, b) = tokio::io::duplex(4096);
        let (mut tx, _) = PacketStream::new(a, "a".to_string()).into_split();
        let (_, mut rx) = PacketStream::new(b, "b".to_string()).into_split();

        let packet = sample_packet();
        tx.send(&packet).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), packet);
    }

    #[tokio::test]
    async fn test_recv_deadline_expires_as_timeout() {
        let (a, _b) = tokio::io::duplex(64);
        let mut silent = PacketStream::new(a, "silent".to_string());

        let result =
            recv_packet_deadline(&mut silent, Duration::from_millis(50)).await;

        assert!(matches!(result, Err(ChatError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_closed_stream_surfaces_io_error() {
        let (a, b) = tokio::io::duplex(64);
        drop(b);
        let mut orphan = PacketStream::new(a, "orphan".to_string());

        assert!(matches!(
            orphan.recv_packet().await,
            Err(ChatError::Io(_))
        ));
    }
}
