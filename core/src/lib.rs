//! Acoustic peer-to-peer link library
//!
//! Near-ultrasonic three-tone FSK with Hamming(7,4) FEC and an
//! X25519 / ChaCha20-Poly1305 session layer. The library does no audio
//! I/O itself: hosts play back the sample buffers it synthesizes and feed
//! it spectral readings taken from the microphone.

pub mod error;
pub mod frame;
pub mod hamming;
pub mod identity;
pub mod modem;
pub mod modulator;
pub mod node;
pub mod receiver;
pub mod secure;
pub mod spectrum;

pub use error::{LinkError, Result};
pub use frame::{FrameDecode, Packet};
pub use identity::{Keypair, NodeId};
pub use modem::Modem;
pub use node::{Action, Delivery, Node};

// Audio configuration
pub const SAMPLE_RATE: usize = 48_000;
pub const SLOT_DURATION_MS: usize = 50;
pub const SLOT_SAMPLES: usize = (SAMPLE_RATE * SLOT_DURATION_MS) / 1000; // 2400

// Each slot is a ramped tone burst followed by a short silent guard.
// The guard gives the receiver a clean energy trough between slots so that
// runs of identical bits stay separable.
pub const GUARD_SAMPLES: usize = SLOT_SAMPLES / 4; // 600
pub const RAMP_SAMPLES: usize = SLOT_SAMPLES / 8; // 300
pub const LEAD_IN_MS: usize = 100;
pub const LEAD_IN_SAMPLES: usize = (SAMPLE_RATE * LEAD_IN_MS) / 1000; // 4800
pub const PREAMBLE_SLOTS: usize = 4;
pub const TONE_AMPLITUDE: f32 = 0.7;

// Tone frequencies (Hz), above the hearing range of most adults
pub const FREQ_PREAMBLE: f32 = 18_000.0;
pub const FREQ_ZERO: f32 = 18_800.0;
pub const FREQ_ONE: f32 = 19_600.0;

// Detection thresholds, in normalized tone power (1.0 = full-scale tone)
pub const NOISE_FLOOR_POWER: f32 = 0.01;
pub const BUSY_THRESHOLD_POWER: f32 = 0.04;

// Receiver discipline
pub const DEBOUNCE_READINGS: i32 = 3;
pub const SYNC_HOLD_BIAS: i32 = -10;
pub const BIT_HOLD_BIAS: i32 = -2;
pub const GAP_REARM_READINGS: u32 = 2;

/// Suggested analysis hop for hosts sampling the channel: eight readings
/// per symbol slot keeps both the debounce and the inter-slot gap visible.
pub const PROBE_HOP_SAMPLES: usize = SLOT_SAMPLES / 8; // 300

// Frame configuration: target:16 | sender:16 | len:8 | FEC(payload)
pub const HEADER_BITS: usize = 40;
pub const CODED_BITS_PER_BYTE: usize = 14;
pub const MAX_PAYLOAD_BYTES: usize = 255;

/// Receive buffer cap, sized for the largest frame the 8-bit length field
/// can declare: 40 + 14 * 255 bits.
pub const RX_BIT_BUDGET: usize = HEADER_BITS + MAX_PAYLOAD_BYTES * CODED_BITS_PER_BYTE; // 3610

/// Upper bound of the random delay before answering a discovery probe.
pub const DISCOVERY_ACK_JITTER_MS: u64 = 2000;
