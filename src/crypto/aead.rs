//! Authenticated encryption for handshake and session payloads.
//!
//! AES-256-GCM with a fresh random 96-bit IV per call. The tag is kept
//! separate from the ciphertext because the wire format carries all three
//! fields individually.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::ChatError;

/// Size of the GCM IV in bytes.
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// One encrypted unit: ciphertext, IV, and integrity tag.
#[derive(Debug, Clone)]
pub struct Sealed {
    /// Ciphertext bytes.
    pub data: Vec<u8>,
    /// Initialization vector used for this encryption.
    pub iv: Vec<u8>,
    /// Authentication tag over ciphertext and IV.
    pub tag: Vec<u8>,
}

/// Encrypts `plaintext` under `key` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Sealed, ChatError> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| ChatError::Crypto(e.to_string()))?;

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut combined = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| ChatError::Crypto("encryption failed".to_string()))?;

    // aes-gcm appends the tag to the ciphertext; split it back out.
    let tag = combined.split_off(combined.len() - TAG_SIZE);

    Ok(Sealed {
        data: combined,
        iv: iv.to_vec(),
        tag,
    })
}

/// Decrypts and verifies one encrypted unit.
///
/// Fails with [`ChatError::Authentication`] if tag verification fails; the
/// plaintext is only returned after the tag has been checked. This is the
/// sole gate against a wrong key or tampering.
pub fn decrypt(
    data: &[u8],
    key: &[u8; 32],
    iv: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, ChatError> {
    if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
        return Err(ChatError::Authentication(format!(
            "invalid iv or tag length ({}/{})",
            iv.len(),
            tag.len()
        )));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| ChatError::Crypto(e.to_string()))?;

    let mut combined = Vec::with_capacity(data.len() + TAG_SIZE);
    combined.extend_from_slice(data);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(iv), combined.as_slice())
        .map_err(|_| ChatError::Authentication("tag verification failed".to_string()))
}

/// Returns `N` cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}
