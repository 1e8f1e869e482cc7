//! Authenticated channel: per-peer session keys and AEAD wire strings.
//!
//! Wire format is `hex(nonce) ":" hex(ciphertext)` with a fresh random
//! 96-bit nonce per message. Nonce reuse under one key would break both
//! confidentiality and integrity of the AEAD, so nonces are always drawn
//! from the OS RNG rather than counted.

use std::collections::HashMap;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{LinkError, Result};
use crate::identity::{NodeId, SessionKey};

pub const NONCE_LEN: usize = 12;
pub const WIRE_SEPARATOR: char = ':';

/// Session store plus encrypt/decrypt. One instance per node.
///
/// Entries are created or overwritten only from a successful key
/// derivation; the dispatcher keeps the peer `secure` flag in lockstep
/// with `has_session`.
#[derive(Default)]
pub struct SecureChannel {
    keys: HashMap<NodeId, SessionKey>,
}

impl SecureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_key(&mut self, peer: NodeId, key: SessionKey) {
        self.keys.insert(peer, key);
    }

    pub fn has_session(&self, peer: NodeId) -> bool {
        self.keys.contains_key(&peer)
    }

    pub fn encrypt(&self, peer: NodeId, plaintext: &str) -> Result<String> {
        let key = self.keys.get(&peer).ok_or(LinkError::NoSession(peer))?;
        let cipher =
            ChaCha20Poly1305::new_from_slice(key).map_err(|_| LinkError::NoSession(peer))?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| LinkError::TamperDetected)?;
        Ok(format!(
            "{}{}{}",
            hex::encode(nonce),
            WIRE_SEPARATOR,
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, peer: NodeId, wire: &str) -> Result<String> {
        let key = self.keys.get(&peer).ok_or(LinkError::NoSession(peer))?;

        let mut parts = wire.splitn(2, WIRE_SEPARATOR);
        let (nonce_hex, ct_hex) = match (parts.next(), parts.next()) {
            (Some(n), Some(c)) => (n, c),
            _ => return Err(LinkError::MalformedCiphertext),
        };
        let nonce = hex::decode(nonce_hex).map_err(|_| LinkError::MalformedCiphertext)?;
        if nonce.len() != NONCE_LEN {
            return Err(LinkError::MalformedCiphertext);
        }
        let ciphertext = hex::decode(ct_hex).map_err(|_| LinkError::MalformedCiphertext)?;

        let cipher =
            ChaCha20Poly1305::new_from_slice(key).map_err(|_| LinkError::NoSession(peer))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| LinkError::TamperDetected)?;
        String::from_utf8(plaintext).map_err(|_| LinkError::TamperDetected)
    }
}
