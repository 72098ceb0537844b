//! # Nearlink
//!
//! Local-network peer-to-peer encrypted chat and file transfer.
//!
//! Peers discover each other on the local network, establish a mutually
//! authenticated session keyed by a pre-shared per-contact password, and
//! exchange text or file payloads under that session key.
//!
//! ## Security Model
//!
//! - **Password-wrapped key exchange**: ephemeral P-256 public keys travel
//!   encrypted under a key derived from the shared contact password, so a
//!   party without the password can neither complete the exchange nor read
//!   it.
//! - **Mutual challenge-response**: each side proves live knowledge of the
//!   derived session key before any application traffic flows. The session
//!   key is installed only after both proofs succeed.
//! - **Single-use ephemeral keys**: fresh keypair and challenges per
//!   handshake attempt; all key material is zeroized on drop.
//! - **No partial trust**: any decode error, decrypt failure, or challenge
//!   mismatch aborts the handshake, and a message-level authentication
//!   failure drops the whole session.
//!
//! ## Modules
//!
//! - [`crypto`]: key derivation, ephemeral ECDH, authenticated encryption
//! - [`wire`]: the JSON packet codec shared with existing deployments
//! - [`handshake`]: the initiator/responder handshake state machine
//! - [`session`]: session-keyed messaging and the session registry
//! - [`transport`]: length-prefixed packet framing over tokio TCP
//! - [`peer`]: discovery and contact-directory interfaces
//! - [`node`]: connection management tying the above together

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod node;
pub mod peer;
pub mod session;
pub mod transport;
pub mod wire;

pub use error::ChatError;
pub use node::{ChatEvent, Node, NodeConfig};
pub use peer::{ContactDirectory, MemoryContacts, PeerDiscovery, PeerInfo, StaticPeers};
pub use session::{Incoming, Messenger, SessionKey, SessionRegistry};
pub use wire::{Message, Packet};
