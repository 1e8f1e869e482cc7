//! Bit-level framing.
//!
//! Layout, MSB first: `target:16 | sender:16 | len:8 | FEC(payload)`.
//! The 40-bit header is sent uncoded; the payload is Hamming(7,4) coded at
//! 14 bits per byte, so a full frame is `40 + 14 * len` bits.

use crate::error::{LinkError, Result};
use crate::hamming;
use crate::identity::NodeId;
use crate::{CODED_BITS_PER_BYTE, HEADER_BITS, MAX_PAYLOAD_BYTES};

/// One link-layer datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub target: NodeId,
    pub sender: NodeId,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(target: NodeId, sender: NodeId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            sender,
            payload: payload.into(),
        }
    }
}

/// Successful frame decode plus FEC diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDecode {
    pub packet: Packet,
    pub corrections: u32,
}

fn push_u16(bits: &mut Vec<bool>, value: u16) {
    for shift in (0..16).rev() {
        bits.push((value >> shift) & 1 == 1);
    }
}

fn read_u16(bits: &[bool]) -> u16 {
    bits.iter().fold(0u16, |acc, &b| (acc << 1) | b as u16)
}

/// Serialize a packet to the on-air bit sequence.
pub fn to_bits(packet: &Packet) -> Result<Vec<bool>> {
    if packet.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(LinkError::PayloadTooLarge);
    }
    let mut bits = Vec::with_capacity(HEADER_BITS + packet.payload.len() * CODED_BITS_PER_BYTE);
    push_u16(&mut bits, packet.target.0);
    push_u16(&mut bits, packet.sender.0);
    let len = packet.payload.len() as u16;
    for shift in (0..8).rev() {
        bits.push((len >> shift) & 1 == 1);
    }
    bits.extend(hamming::encode_bytes(&packet.payload));
    Ok(bits)
}

/// Total frame length in bits, readable once the 40-bit header is buffered.
pub fn expected_bits(bits: &[bool]) -> Option<usize> {
    if bits.len() < HEADER_BITS {
        return None;
    }
    let len = bits[32..40].iter().fold(0usize, |acc, &b| (acc << 1) | b as usize);
    Some(HEADER_BITS + len * CODED_BITS_PER_BYTE)
}

/// Decode a buffered bit sequence. `None` when the buffer is shorter than
/// the header or than the length the header declares; a frame cut short on
/// the air is dropped here, not repaired.
pub fn from_bits(bits: &[bool]) -> Option<FrameDecode> {
    let total = expected_bits(bits)?;
    if bits.len() < total {
        return None;
    }
    let target = NodeId(read_u16(&bits[0..16]));
    let sender = NodeId(read_u16(&bits[16..32]));
    let (payload, corrections) = hamming::decode_bytes(&bits[HEADER_BITS..total]);
    Some(FrameDecode {
        packet: Packet {
            target,
            sender,
            payload,
        },
        corrections,
    })
}
