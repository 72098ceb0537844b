//! Wire packet codec.
//!
//! A [`Packet`] is an ordered list of one or two encrypted [`Message`]s.
//! The message count is the only on-wire discriminator of payload kind:
//! what a packet means depends on the handshake phase or session state of
//! the receiver, never on a type tag.
//!
//! The encoding is JSON with base64 byte fields, reproducing the format of
//! existing deployments byte-for-byte: field names `DataList`, `Data`, `IV`
//! and `Hash` must not change.

use serde::{Deserialize, Serialize};

use crate::crypto::aead::{self, Sealed};
use crate::error::ChatError;

/// Upper bound on an encoded packet, applied before parsing.
pub const MAX_PACKET_BYTES: usize = 10 * 1024 * 1024;

/// A packet carries one or two messages, never more.
pub const MAX_MESSAGES: usize = 2;

/// One encrypted unit on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Ciphertext bytes.
    #[serde(rename = "Data", with = "base64_bytes")]
    pub data: Vec<u8>,

    /// Initialization vector.
    #[serde(rename = "IV", with = "base64_bytes")]
    pub iv: Vec<u8>,

    /// Integrity tag. The wire field is named `Hash` for compatibility with
    /// existing deployments.
    #[serde(rename = "Hash", with = "base64_bytes")]
    pub tag: Vec<u8>,
}

impl Message {
    /// Encrypts `plaintext` under `key` into a wire message.
    pub fn seal(plaintext: &[u8], key: &[u8; 32]) -> Result<Self, ChatError> {
        let Sealed { data, iv, tag } = aead::encrypt(plaintext, key)?;
        Ok(Self { data, iv, tag })
    }

    /// Decrypts and verifies this message under `key`.
    pub fn open(&self, key: &[u8; 32]) -> Result<Vec<u8>, ChatError> {
        aead::decrypt(&self.data, key, &self.iv, &self.tag)
    }
}

/// An ordered sequence of encrypted messages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The messages, in order. Wire field name is `DataList`.
    #[serde(rename = "DataList")]
    pub messages: Vec<Message>,
}

impl Packet {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Deterministic serialization to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ChatError> {
        if self.messages.is_empty() || self.messages.len() > MAX_MESSAGES {
            return Err(ChatError::Decode(format!(
                "packet must carry 1 to {} messages, has {}",
                MAX_MESSAGES,
                self.messages.len()
            )));
        }
        serde_json::to_vec(self).map_err(|e| ChatError::Decode(e.to_string()))
    }

    /// Parses wire bytes into a packet.
    ///
    /// Bounds the accepted size and message count defensively; adversarial
    /// input yields [`ChatError::Decode`], never a panic or over-allocation.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChatError> {
        if bytes.len() > MAX_PACKET_BYTES {
            return Err(ChatError::Decode(format!(
                "packet too large: {} bytes",
                bytes.len()
            )));
        }

        let packet: Packet =
            serde_json::from_slice(bytes).map_err(|e| ChatError::Decode(e.to_string()))?;

        if packet.messages.is_empty() || packet.messages.len() > MAX_MESSAGES {
            return Err(ChatError::Decode(format!(
                "unexpected number of messages, expecting 1 to {}, got {}",
                MAX_MESSAGES,
                packet.messages.len()
            )));
        }

        Ok(packet)
    }
}

/// Base64 byte fields, matching how the deployed implementation serializes
/// `[]byte` (standard alphabet with padding).
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
