//! Password-based key derivation.
//!
//! The wrapping key protects the two ephemeral public keys exchanged during
//! the handshake and nothing else. It is derived with HKDF-SHA256 under a
//! wrap-specific info label so it can never collide with keys used for
//! message confidentiality.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::ChatError;

/// Salt for HKDF (fixed for deterministic behavior with same password).
const HKDF_SALT: &[u8] = b"NEARLINK-V1-SALT";

/// HKDF info label for the handshake wrapping key.
const WRAP_INFO: &[u8] = b"NEARLINK-V1-WRAP";

/// Key that wraps ephemeral public keys during the handshake.
///
/// Zeroized on drop; never transmitted.
pub type WrappingKey = Zeroizing<[u8; 32]>;

/// Derives the 256-bit wrapping key from a shared contact password.
///
/// Deterministic: the same password always yields the same key.
pub fn derive_wrapping_key(password: &str) -> Result<WrappingKey, ChatError> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), password.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(WRAP_INFO, key.as_mut())
        .map_err(|_| ChatError::Crypto("key derivation failed".to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        let key1 = derive_wrapping_key("shared secret").unwrap();
        let key2 = derive_wrapping_key("shared secret").unwrap();

        assert_eq!(*key1, *key2);
    }

    #[test]
    fn test_different_passwords_derive_different_keys() {
        let key1 = derive_wrapping_key("alice and bob").unwrap();
        let key2 = derive_wrapping_key("alice and eve").unwrap();

        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_empty_password_is_accepted() {
        // Weak, but the directory decides password policy, not the KDF.
        let key = derive_wrapping_key("").unwrap();
        assert_ne!(*key, [0u8; 32]);
    }
}
