//! Session-keyed message and file exchange.
//!
//! Once a handshake has installed a [`SessionKey`], all traffic is packets
//! of one message (text) or two messages (file content plus destination
//! name). The [`Messenger`] classifies incoming packets into the explicit
//! [`Incoming`] variants so callers never dispatch on raw message counts.

mod registry;

pub use registry::{SessionHandle, SessionRegistry};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use crate::crypto::SessionKey;
use crate::error::ChatError;
use crate::wire::{Message, Packet};

/// A decrypted application payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text message.
    Text(String),
    /// A file, already written to `path`.
    File {
        /// Where the content was written, inside the download directory.
        path: PathBuf,
        /// Content size in bytes.
        size: usize,
    },
}

/// Encodes and decodes payloads under one established session key.
#[derive(Clone)]
pub struct Messenger {
    key: SessionKey,
    download_dir: PathBuf,
}

impl Messenger {
    /// Create a messenger for an established session.
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            download_dir: PathBuf::from("."),
        }
    }

    /// Set the directory received files are written into.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Encrypts a text message into a one-message packet.
    pub fn text_packet(&self, text: &str) -> Result<Packet, ChatError> {
        Ok(Packet::new(vec![Message::seal(
            text.as_bytes(),
            self.key.as_bytes(),
        )?]))
    }

    /// Reads a local file and encrypts it into a two-message packet.
    ///
    /// The file's own path string is sent as the destination name, as
    /// existing deployments do.
    pub fn file_packet(&self, path: &Path) -> Result<Packet, ChatError> {
        let dest = path.to_string_lossy().into_owned();
        self.file_packet_as(path, &dest)
    }

    /// Like [`file_packet`](Self::file_packet) with an explicit destination
    /// name for the receiver.
    pub fn file_packet_as(&self, path: &Path, dest: &str) -> Result<Packet, ChatError> {
        let content = fs::read(path)?;

        Ok(Packet::new(vec![
            Message::seal(&content, self.key.as_bytes())?,
            Message::seal(dest.as_bytes(), self.key.as_bytes())?,
        ]))
    }

    /// Decrypts an incoming packet and classifies it.
    ///
    /// A two-message packet is a file transfer: the content is written into
    /// the download directory under the sanitized destination name. Any
    /// authentication failure here means the session key can no longer be
    /// trusted; the caller must drop the whole session.
    pub fn receive(&self, packet: &Packet) -> Result<Incoming, ChatError> {
        match packet.messages.as_slice() {
            [text] => {
                let plaintext = text.open(self.key.as_bytes())?;
                let text = String::from_utf8(plaintext)
                    .map_err(|_| ChatError::Decode("text message is not valid UTF-8".to_string()))?;
                Ok(Incoming::Text(text))
            }
            [content, dest] => {
                let content = content.open(self.key.as_bytes())?;
                let dest = dest.open(self.key.as_bytes())?;
                let dest = String::from_utf8(dest).map_err(|_| {
                    ChatError::Decode("destination path is not valid UTF-8".to_string())
                })?;

                let path = self.download_dir.join(sanitize_dest(&dest)?);
                fs::write(&path, &content)?;
                debug!(path = %path.display(), size = content.len(), "wrote received file");

                Ok(Incoming::File {
                    path,
                    size: content.len(),
                })
            }
            other => Err(ChatError::Decode(format!(
                "unexpected number of messages, expecting 1 or 2, got {}",
                other.len()
            ))),
        }
    }
}

/// Reduces a remote-supplied destination path to a bare file name.
///
/// The destination originates from the peer and must not be able to escape
/// the download directory: directory components, absolute prefixes, and
/// `..` segments are all stripped or rejected.
fn sanitize_dest(dest: &str) -> Result<PathBuf, ChatError> {
    let name = Path::new(dest)
        .file_name()
        .ok_or_else(|| ChatError::Decode(format!("invalid destination path: {:?}", dest)))?;

    Ok(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn messenger_pair(dir: &Path) -> (Messenger, Messenger) {
        let key = SessionKey::new([42u8; 32]);
        (
            Messenger::new(key.clone()).with_download_dir(dir),
            Messenger::new(key).with_download_dir(dir),
        )
    }

    #[test]
    fn test_text_roundtrip() {
        let dir = tempdir().unwrap();
        let (sender, receiver) = messenger_pair(dir.path());

        let packet = sender.text_packet("hello").unwrap();
        let incoming = receiver.receive(&packet).unwrap();

        assert_eq!(incoming, Incoming::Text("hello".to_string()));
    }

    #[test]
    fn test_file_roundtrip_writes_exact_bytes() {
        let dir = tempdir().unwrap();
        let (sender, receiver) = messenger_pair(dir.path());

        let source = dir.path().join("source.bin");
        fs::write(&source, [0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        let packet = sender.file_packet_as(&source, "out.bin").unwrap();
        let incoming = receiver.receive(&packet).unwrap();

        let expected = dir.path().join("out.bin");
        assert_eq!(
            incoming,
            Incoming::File {
                path: expected.clone(),
                size: 4
            }
        );
        assert_eq!(fs::read(&expected).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_receive_with_wrong_key_is_authentication_failure() {
        let dir = tempdir().unwrap();
        let (sender, _) = messenger_pair(dir.path());
        let stranger =
            Messenger::new(SessionKey::new([7u8; 32])).with_download_dir(dir.path());

        let packet = sender.text_packet("hello").unwrap();

        assert!(matches!(
            stranger.receive(&packet),
            Err(ChatError::Authentication(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_is_authentication_failure() {
        let dir = tempdir().unwrap();
        let (sender, receiver) = messenger_pair(dir.path());

        let mut packet = sender.text_packet("hello").unwrap();
        packet.messages[0].data[0] ^= 0x01;

        assert!(matches!(
            receiver.receive(&packet),
            Err(ChatError::Authentication(_))
        ));
    }

    #[test]
    fn test_traversal_destinations_stay_in_download_dir() {
        let dir = tempdir().unwrap();
        let (sender, receiver) = messenger_pair(dir.path());

        let source = dir.path().join("source.bin");
        fs::write(&source, b"contained").unwrap();

        for dest in ["../../escape.bin", "/etc/escape.bin", "nested/dir/escape.bin"] {
            let packet = sender.file_packet_as(&source, dest).unwrap();
            let incoming = receiver.receive(&packet).unwrap();

            match incoming {
                Incoming::File { path, .. } => {
                    assert_eq!(path, dir.path().join("escape.bin"));
                }
                other => panic!("expected a file, got {:?}", other),
            }
            fs::remove_file(dir.path().join("escape.bin")).unwrap();
        }
    }

    #[test]
    fn test_destination_without_file_name_rejected() {
        assert!(sanitize_dest("..").is_err());
        assert!(sanitize_dest("/").is_err());
        assert!(sanitize_dest("").is_err());
    }

    #[test]
    fn test_non_utf8_text_is_decode_error() {
        let dir = tempdir().unwrap();
        let (sender, receiver) = messenger_pair(dir.path());

        let packet = Packet::new(vec![Message::seal(
            &[0xFF, 0xFE, 0xFD],
            sender.key.as_bytes(),
        )
        .unwrap()]);

        assert!(matches!(
            receiver.receive(&packet),
            Err(ChatError::Decode(_))
        ));
    }
}
