//! Ephemeral P-256 key exchange.
//!
//! Each handshake attempt generates a fresh keypair; the private scalar is
//! consumed by the single Diffie-Hellman computation and zeroized when the
//! `EphemeralSecret` drops. Public keys travel as uncompressed SEC1 bytes.

use std::fmt;

use p256::ecdh::EphemeralSecret;
use p256::{EncodedPoint, PublicKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ChatError;

/// The ECDH shared secret for one authenticated connection.
///
/// Installed in the session registry only after both challenge checks pass,
/// and zeroized when the session is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub(crate) fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes (be careful with this!).
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey(..)")
    }
}

/// A fresh P-256 keypair, used for exactly one handshake attempt.
pub struct EphemeralKeypair {
    secret: EphemeralSecret,
    public: Vec<u8>,
}

impl EphemeralKeypair {
    /// Generate a new ephemeral keypair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = EncodedPoint::from(secret.public_key()).as_bytes().to_vec();

        Self { secret, public }
    }

    /// The public key as uncompressed SEC1 bytes, for the peer.
    pub fn public_bytes(&self) -> &[u8] {
        &self.public
    }

    /// Computes the shared secret with the peer's public key.
    ///
    /// Consumes the keypair: one keypair, one exchange. Fails with
    /// [`ChatError::Crypto`] if the peer bytes are not a valid point on the
    /// curve.
    pub fn diffie_hellman(self, peer_sec1: &[u8]) -> Result<SessionKey, ChatError> {
        let peer = PublicKey::from_sec1_bytes(peer_sec1)
            .map_err(|_| ChatError::Crypto("peer key is not a valid P-256 point".to_string()))?;

        let shared = self.secret.diffie_hellman(&peer);

        let mut key = [0u8; 32];
        key.copy_from_slice(shared.raw_secret_bytes().as_slice());
        Ok(SessionKey::new(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sides_derive_the_same_secret() {
        let alice = EphemeralKeypair::generate();
        let bob = EphemeralKeypair::generate();

        let alice_public = alice.public_bytes().to_vec();
        let bob_public = bob.public_bytes().to_vec();

        let k1 = alice.diffie_hellman(&bob_public).unwrap();
        let k2 = bob.diffie_hellman(&alice_public).unwrap();

        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_fresh_keypair_per_generate() {
        let a = EphemeralKeypair::generate();
        let b = EphemeralKeypair::generate();

        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn test_invalid_point_rejected() {
        let keypair = EphemeralKeypair::generate();
        let result = keypair.diffie_hellman(&[0x42u8; 65]);

        assert!(matches!(result, Err(ChatError::Crypto(_))));
    }

    #[test]
    fn test_empty_peer_key_rejected() {
        let keypair = EphemeralKeypair::generate();

        assert!(keypair.diffie_hellman(&[]).is_err());
    }

    #[test]
    fn test_session_key_debug_is_redacted() {
        let key = SessionKey::new([0xAB; 32]);

        assert_eq!(format!("{:?}", key), "SessionKey(..)");
    }
}
