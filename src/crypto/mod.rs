//! Cryptographic primitives for the handshake and session traffic.
//!
//! - [`kdf`]: HKDF-SHA256 derivation of the password wrapping key
//! - [`ecdh`]: ephemeral P-256 keypairs and shared-secret computation
//! - [`aead`]: AES-256-GCM authenticated encryption with split iv/tag

pub mod aead;
pub mod ecdh;
pub mod kdf;

pub use aead::{decrypt, encrypt, random_bytes, Sealed};
pub use ecdh::{EphemeralKeypair, SessionKey};
pub use kdf::{derive_wrapping_key, WrappingKey};
