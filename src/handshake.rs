//! Password-wrapped ECDH handshake with mutual challenge-response.
//!
//! Both sides derive a wrapping key `w` from the shared contact password and
//! use it only to protect their ephemeral P-256 public keys. The ECDH shared
//! secret `K` then has to be proven live by both sides through two
//! independent challenge/echo round trips before anyone trusts it.
//!
//! ## Flow
//!
//! 1. Initiator sends `{ E(pub_i, w) }`
//! 2. Responder sends `{ E(pub_r, w), E(challenge_r, K) }`
//! 3. Initiator sends `{ E(challenge_i ++ challenge_r, K) }`
//! 4. Responder verifies its challenge, sends `{ E(challenge_i, K) }`
//! 5. Initiator verifies its challenge
//!
//! Any decode error, message-count mismatch, decrypt failure, or challenge
//! mismatch is fatal to the attempt: no retries, no partial trust. The
//! caller must close the connection and may only start over with fresh
//! ephemeral material and challenges.

use std::time::Duration;

use tracing::{debug, warn};

use crate::crypto::{aead, derive_wrapping_key, EphemeralKeypair, SessionKey};
use crate::error::ChatError;
use crate::transport::{recv_packet_deadline, PacketTransport};
use crate::wire::{Message, Packet};

/// Challenge length in bytes.
pub const CHALLENGE_SIZE: usize = 8;

/// Runs the dialing side of the handshake.
///
/// On success both parties hold the same [`SessionKey`] and have proven it
/// to each other. On any error the caller must close the connection; no key
/// material survives the abort.
pub async fn initiate<T>(
    conn: &mut T,
    password: &str,
    step_deadline: Duration,
) -> Result<SessionKey, ChatError>
where
    T: PacketTransport,
{
    let w = derive_wrapping_key(password)?;
    let keypair = EphemeralKeypair::generate();

    // Round 1: our wrapped public key out, their wrapped key and challenge back.
    let hello = Packet::new(vec![Message::seal(keypair.public_bytes(), &w)?]);
    conn.send_packet(&hello).await?;

    let reply = recv_packet_deadline(conn, step_deadline).await?;
    let [wrapped_public, wrapped_challenge] = expect_messages::<2>(&reply)?;

    // A decrypt failure here means wrong password or tampering.
    let peer_public = wrapped_public.open(&w)?;
    let key = keypair.diffie_hellman(&peer_public)?;

    let peer_challenge = wrapped_challenge.open(key.as_bytes())?;
    if peer_challenge.len() != CHALLENGE_SIZE {
        return Err(ChatError::Decode(format!(
            "challenge must be {} bytes, got {}",
            CHALLENGE_SIZE,
            peer_challenge.len()
        )));
    }

    // Round 2: echo their challenge together with ours, both under K.
    let challenge = aead::random_bytes::<CHALLENGE_SIZE>();
    let mut combined = Vec::with_capacity(2 * CHALLENGE_SIZE);
    combined.extend_from_slice(&challenge);
    combined.extend_from_slice(&peer_challenge);

    let proof = Packet::new(vec![Message::seal(&combined, key.as_bytes())?]);
    conn.send_packet(&proof).await?;

    let reply = recv_packet_deadline(conn, step_deadline).await?;
    let [confirmation] = expect_messages::<1>(&reply)?;

    let echo = confirmation.open(key.as_bytes())?;
    if echo != challenge {
        warn!(peer = %conn.peer_addr(), "handshake aborted: challenge mismatch");
        return Err(ChatError::Authentication("challenge mismatch".to_string()));
    }

    debug!(peer = %conn.peer_addr(), "initiator handshake complete");
    Ok(key)
}

/// Runs the accepting side of the handshake.
///
/// The caller resolves the claimed peer to its contact password before
/// invoking this (an unknown peer is a handshake abort upstream).
pub async fn respond<T>(
    conn: &mut T,
    password: &str,
    step_deadline: Duration,
) -> Result<SessionKey, ChatError>
where
    T: PacketTransport,
{
    let hello = recv_packet_deadline(conn, step_deadline).await?;
    let [wrapped_public] = expect_messages::<1>(&hello)?;

    let w = derive_wrapping_key(password)?;

    // Only a password holder can produce a key we accept here.
    let peer_public = wrapped_public.open(&w)?;

    let keypair = EphemeralKeypair::generate();
    let public_bytes = keypair.public_bytes().to_vec();
    let key = keypair.diffie_hellman(&peer_public)?;

    let challenge = aead::random_bytes::<CHALLENGE_SIZE>();
    let offer = Packet::new(vec![
        Message::seal(&public_bytes, &w)?,
        Message::seal(&challenge, key.as_bytes())?,
    ]);
    conn.send_packet(&offer).await?;

    let reply = recv_packet_deadline(conn, step_deadline).await?;
    let [combined] = expect_messages::<1>(&reply)?;

    let plaintext = combined.open(key.as_bytes())?;
    if plaintext.len() != 2 * CHALLENGE_SIZE {
        return Err(ChatError::Decode(format!(
            "combined challenge must be {} bytes, got {}",
            2 * CHALLENGE_SIZE,
            plaintext.len()
        )));
    }
    let (peer_challenge, echo) = plaintext.split_at(CHALLENGE_SIZE);

    if echo != challenge.as_slice() {
        warn!(peer = %conn.peer_addr(), "handshake aborted: challenge mismatch");
        return Err(ChatError::Authentication("challenge mismatch".to_string()));
    }

    // Final confirmation; no response awaited.
    let confirmation = Packet::new(vec![Message::seal(peer_challenge, key.as_bytes())?]);
    conn.send_packet(&confirmation).await?;

    debug!(peer = %conn.peer_addr(), "responder handshake complete");
    Ok(key)
}

/// Requires exactly `N` messages in a packet.
fn expect_messages<const N: usize>(packet: &Packet) -> Result<&[Message; N], ChatError> {
    packet.messages.as_slice().try_into().map_err(|_| {
        ChatError::Decode(format!(
            "unexpected number of messages, expecting {}, got {}",
            N,
            packet.messages.len()
        ))
    })
}
