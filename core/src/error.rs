use crate::identity::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("channel busy, transmission refused")]
    ChannelBusy,

    #[error("payload exceeds maximum frame size")]
    PayloadTooLarge,

    #[error("peer key is not a valid public key encoding")]
    InvalidPeerKey,

    #[error("no session key for peer {0}")]
    NoSession(NodeId),

    #[error("ciphertext is not <nonce>:<ciphertext> hex")]
    MalformedCiphertext,

    #[error("authentication failed, message tampered or wrong key")]
    TamperDetected,

    #[error("audio device unavailable: {0}")]
    AudioDevice(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
