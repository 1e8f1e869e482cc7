//! Node identities and the X25519 key exchange.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{LinkError, Result};

/// 256-bit symmetric key derived per peer pair.
pub type SessionKey = [u8; 32];

/// 16-bit node identity, rendered as four uppercase hex digits.
///
/// Drawn once at process start and immutable for the session. Collisions
/// are possible but improbable enough for a room-scale broadcast medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Accepted by every node.
    pub const BROADCAST: NodeId = NodeId(0x0000);
    /// Probe channel: every node treats traffic here as discovery.
    pub const DISCOVERY: NodeId = NodeId(0xFFFF);

    /// Draw a fresh non-reserved identity.
    pub fn random() -> Self {
        loop {
            let id = NodeId(OsRng.gen::<u16>());
            if !id.is_reserved() {
                return id;
            }
        }
    }

    pub fn is_reserved(self) -> bool {
        self == Self::BROADCAST || self == Self::DISCOVERY
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("node id must be exactly 4 hex digits")]
pub struct ParseNodeIdError;

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.len() != 4 {
            return Err(ParseNodeIdError);
        }
        u16::from_str_radix(s, 16)
            .map(NodeId)
            .map_err(|_| ParseNodeIdError)
    }
}

/// Local asymmetric identity. Generated once at startup; the secret half
/// never leaves this struct.
pub struct Keypair {
    secret: StaticSecret,
    public: [u8; 32],
}

impl Keypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret).to_bytes();
        Self { secret, public }
    }

    /// Raw 32-byte public key, as carried in handshake payloads.
    pub fn public_key(&self) -> [u8; 32] {
        self.public
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public)
    }

    /// Derive the shared 256-bit session key for a peer from its raw
    /// public key bytes. Fails with `InvalidPeerKey` when the bytes are
    /// not a usable point encoding (wrong length or low-order point).
    pub fn derive_session_key(&self, peer_raw: &[u8]) -> Result<SessionKey> {
        let raw: [u8; 32] = peer_raw.try_into().map_err(|_| LinkError::InvalidPeerKey)?;
        let shared = self.secret.diffie_hellman(&X25519PublicKey::from(raw));
        if shared.as_bytes().iter().all(|&b| b == 0) {
            return Err(LinkError::InvalidPeerKey);
        }
        let mut hasher = Sha256::new();
        hasher.update(b"tonelink-session-v1");
        hasher.update(shared.as_bytes());
        Ok(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_rendering() {
        assert_eq!(NodeId(0x0001).to_string(), "0001");
        assert_eq!(NodeId(0xA3F0).to_string(), "A3F0");
        assert_eq!("a3f0".parse::<NodeId>().unwrap(), NodeId(0xA3F0));
        assert!("xyz".parse::<NodeId>().is_err());
        assert!("12345".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_random_id_never_reserved() {
        for _ in 0..64 {
            assert!(!NodeId::random().is_reserved());
        }
    }

    #[test]
    fn test_key_exchange_symmetric() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let key_a = a.derive_session_key(&b.public_key()).unwrap();
        let key_b = b.derive_session_key(&a.public_key()).unwrap();
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_distinct_peers_distinct_keys() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let c = Keypair::generate();
        let key_ab = a.derive_session_key(&b.public_key()).unwrap();
        let key_ac = a.derive_session_key(&c.public_key()).unwrap();
        assert_ne!(key_ab, key_ac);
    }

    #[test]
    fn test_invalid_peer_key_rejected() {
        let a = Keypair::generate();
        assert_eq!(
            a.derive_session_key(b"short"),
            Err(LinkError::InvalidPeerKey)
        );
        // The identity point produces an all-zero shared secret.
        assert_eq!(
            a.derive_session_key(&[0u8; 32]),
            Err(LinkError::InvalidPeerKey)
        );
    }
}
