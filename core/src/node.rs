//! Session and discovery dispatcher.
//!
//! `Node` owns everything above the link layer: the local identity, the
//! keypair, the peer table and the secure channel. It is host-driven: the
//! host hands every inbound packet to `handle_packet` and executes the
//! returned actions (play a reply, show a delivery). The node never does
//! I/O and holds no global state.
//!
//! Control plane, carried as UTF-8 payloads:
//! `PING` / `ACK` for discovery, `KEY_REQ:<hex pub>` / `KEY_ACK:<hex pub>`
//! for the handshake, and `<hex nonce>:<hex ct>` for sealed traffic.

use std::collections::HashMap;

use log::{debug, info, warn};
use rand::Rng;

use crate::error::{LinkError, Result};
use crate::frame::Packet;
use crate::identity::{Keypair, NodeId};
use crate::secure::SecureChannel;
use crate::DISCOVERY_ACK_JITTER_MS;

pub const MSG_PING: &str = "PING";
pub const MSG_ACK: &str = "ACK";
pub const KEY_REQ_PREFIX: &str = "KEY_REQ:";
pub const KEY_ACK_PREFIX: &str = "KEY_ACK:";

/// Inbound payload, decoded exactly once before dispatch.
///
/// Key offers keep the hex text as received; whether it decodes to a
/// usable key is the dispatcher's concern, so a garbled offer is still
/// handled as an offer (logged, no reply) rather than shown as chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Ping,
    Ack,
    KeyRequest(String),
    KeyAck(String),
    Sealed(String),
    Open(String),
}

impl ControlMessage {
    pub fn decode(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload).into_owned();
        match text.as_str() {
            MSG_PING => return Self::Ping,
            MSG_ACK => return Self::Ack,
            _ => {}
        }
        if let Some(hex_key) = text.strip_prefix(KEY_REQ_PREFIX) {
            return Self::KeyRequest(hex_key.to_string());
        }
        if let Some(hex_key) = text.strip_prefix(KEY_ACK_PREFIX) {
            return Self::KeyAck(hex_key.to_string());
        }
        if text.contains(':') {
            return Self::Sealed(text);
        }
        Self::Open(text)
    }

    /// The payload as display text, for messages that fall through to open
    /// delivery.
    fn into_text(self) -> String {
        match self {
            Self::Ping => MSG_PING.to_string(),
            Self::Ack => MSG_ACK.to_string(),
            Self::KeyRequest(hex_key) => format!("{}{}", KEY_REQ_PREFIX, hex_key),
            Self::KeyAck(hex_key) => format!("{}{}", KEY_ACK_PREFIX, hex_key),
            Self::Sealed(wire) | Self::Open(wire) => wire,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub id: NodeId,
    pub secure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    /// Decrypted and authenticated.
    Secure,
    /// Plaintext from a peer with no session.
    Open,
    /// Plaintext from a peer that has a session. Shown, but flagged.
    OpenDowngrade,
    /// Sealed traffic that failed authentication. Never dropped silently.
    DecryptFailed,
}

/// A message surfaced to the host for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: NodeId,
    pub text: String,
    pub kind: DeliveryKind,
}

/// What the host must do in response to an inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Modulate and play a reply packet after `delay_ms`.
    Transmit {
        target: NodeId,
        payload: Vec<u8>,
        delay_ms: u64,
    },
    Deliver(Delivery),
}

pub struct Node {
    id: NodeId,
    keypair: Keypair,
    peers: HashMap<NodeId, Peer>,
    channel: SecureChannel,
}

impl Node {
    pub fn new() -> Self {
        Self::with_id(NodeId::random())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            keypair: Keypair::generate(),
            peers: HashMap::new(),
            channel: SecureChannel::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn peer(&self, id: NodeId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn is_secure(&self, id: NodeId) -> bool {
        self.channel.has_session(id)
    }

    /// Broadcast a probe on the discovery channel.
    pub fn start_discovery(&self) -> Action {
        info!("{} scanning for peers", self.id);
        Action::Transmit {
            target: NodeId::DISCOVERY,
            payload: MSG_PING.as_bytes().to_vec(),
            delay_ms: 0,
        }
    }

    /// Offer our public key to a peer. No session exists until its
    /// `KEY_ACK` comes back.
    pub fn initiate_handshake(&self, peer: NodeId) -> Action {
        info!("{} offering key to {}", self.id, peer);
        Action::Transmit {
            target: peer,
            payload: format!("{}{}", KEY_REQ_PREFIX, self.keypair.public_key_hex()).into_bytes(),
            delay_ms: 0,
        }
    }

    /// Outbound payload for a user message: sealed when a session exists
    /// with the target, plaintext otherwise.
    pub fn compose(&self, target: NodeId, text: &str) -> Result<Vec<u8>> {
        if self.channel.has_session(target) {
            Ok(self.channel.encrypt(target, text)?.into_bytes())
        } else {
            Ok(text.as_bytes().to_vec())
        }
    }

    /// Dispatch one inbound packet and return the host's work list.
    pub fn handle_packet(&mut self, packet: &Packet) -> Vec<Action> {
        if packet.sender == self.id {
            return Vec::new();
        }
        let to_self = packet.target == self.id;
        let sender = packet.sender;

        match ControlMessage::decode(&packet.payload) {
            ControlMessage::Ping if packet.target == NodeId::DISCOVERY => {
                // Every listener answers; the random delay keeps their
                // replies from colliding on the shared medium.
                let delay_ms = rand::thread_rng().gen_range(0..DISCOVERY_ACK_JITTER_MS);
                debug!("{} answering probe from {} in {} ms", self.id, sender, delay_ms);
                vec![Action::Transmit {
                    target: sender,
                    payload: MSG_ACK.as_bytes().to_vec(),
                    delay_ms,
                }]
            }
            ControlMessage::Ack if to_self => {
                self.register(sender);
                info!("{} discovered peer {}", self.id, sender);
                Vec::new()
            }
            ControlMessage::KeyRequest(hex_key) if to_self => {
                match self.accept_peer_key(sender, &hex_key) {
                    Ok(()) => {
                        info!("{} session established with {} (responder)", self.id, sender);
                        vec![Action::Transmit {
                            target: sender,
                            payload: format!(
                                "{}{}",
                                KEY_ACK_PREFIX,
                                self.keypair.public_key_hex()
                            )
                            .into_bytes(),
                            delay_ms: 0,
                        }]
                    }
                    Err(err) => {
                        warn!("{} rejected key offer from {}: {}", self.id, sender, err);
                        Vec::new()
                    }
                }
            }
            ControlMessage::KeyAck(hex_key) if to_self => {
                match self.accept_peer_key(sender, &hex_key) {
                    Ok(()) => {
                        info!("{} session established with {} (initiator)", self.id, sender);
                    }
                    Err(err) => {
                        warn!("{} rejected key ack from {}: {}", self.id, sender, err);
                    }
                }
                Vec::new()
            }
            ControlMessage::Sealed(wire) if to_self && self.channel.has_session(sender) => {
                let delivery = match self.channel.decrypt(sender, &wire) {
                    Ok(text) => Delivery {
                        from: sender,
                        text,
                        kind: DeliveryKind::Secure,
                    },
                    Err(err) => {
                        warn!("{} failed to open sealed message from {}: {}", self.id, sender, err);
                        Delivery {
                            from: sender,
                            text: err.to_string(),
                            kind: DeliveryKind::DecryptFailed,
                        }
                    }
                };
                vec![Action::Deliver(delivery)]
            }
            other if to_self || packet.target == NodeId::BROADCAST => {
                let kind = if self.channel.has_session(sender) {
                    warn!("{} got plaintext from secure peer {}", self.id, sender);
                    DeliveryKind::OpenDowngrade
                } else {
                    DeliveryKind::Open
                };
                self.register(sender);
                vec![Action::Deliver(Delivery {
                    from: sender,
                    text: other.into_text(),
                    kind,
                })]
            }
            _ => Vec::new(),
        }
    }

    /// Derive and store a session key from a hex-encoded peer public key.
    fn accept_peer_key(&mut self, sender: NodeId, hex_key: &str) -> Result<()> {
        let raw = hex::decode(hex_key).map_err(|_| LinkError::InvalidPeerKey)?;
        let key = self.keypair.derive_session_key(&raw)?;
        self.channel.install_key(sender, key);
        self.mark_secure(sender);
        Ok(())
    }

    fn register(&mut self, id: NodeId) {
        let secure = self.channel.has_session(id);
        self.peers.entry(id).or_insert(Peer { id, secure });
    }

    fn mark_secure(&mut self, id: NodeId) {
        self.peers
            .entry(id)
            .and_modify(|p| p.secure = true)
            .or_insert(Peer { id, secure: true });
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
