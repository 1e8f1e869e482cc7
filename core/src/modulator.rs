//! Tone synthesis: packet bits to a playable sample buffer.
//!
//! Every symbol occupies one 50 ms slot. The tone itself fills the first
//! three quarters of the slot with raised-cosine amplitude ramps at both
//! edges; the last quarter is silent. The ramps keep key clicks out of the
//! audible band and the silent guard gives the receiver an energy trough
//! between consecutive slots.

use log::debug;

use crate::error::Result;
use crate::frame::{self, Packet};
use crate::{
    FREQ_ONE, FREQ_PREAMBLE, FREQ_ZERO, GUARD_SAMPLES, LEAD_IN_SAMPLES, PREAMBLE_SLOTS,
    RAMP_SAMPLES, SAMPLE_RATE, SLOT_SAMPLES, TONE_AMPLITUDE,
};

/// Ramp envelope: 0 -> 1 over `RAMP_SAMPLES`, flat, 1 -> 0 over the last
/// `RAMP_SAMPLES` of the burst.
fn envelope(i: usize, burst_len: usize) -> f32 {
    if i < RAMP_SAMPLES {
        let x = i as f32 / RAMP_SAMPLES as f32;
        0.5 * (1.0 - (std::f32::consts::PI * x).cos())
    } else if i >= burst_len - RAMP_SAMPLES {
        let x = (burst_len - i) as f32 / RAMP_SAMPLES as f32;
        0.5 * (1.0 - (std::f32::consts::PI * x).cos())
    } else {
        1.0
    }
}

/// Append one ramped tone burst followed by the silent guard.
fn push_slot(samples: &mut Vec<f32>, freq: f32) {
    let burst_len = SLOT_SAMPLES - GUARD_SAMPLES;
    let step = 2.0 * std::f32::consts::PI * freq / SAMPLE_RATE as f32;
    for i in 0..burst_len {
        let sample = TONE_AMPLITUDE * envelope(i, burst_len) * (step * i as f32).sin();
        samples.push(sample);
    }
    samples.extend(std::iter::repeat(0.0).take(GUARD_SAMPLES));
}

/// Build the full on-air signal for one packet: silent lead-in, preamble
/// tone for `PREAMBLE_SLOTS` slots, then one slot per frame bit. Returns
/// once the buffer is built; playback scheduling is the host's job.
pub fn synthesize(packet: &Packet) -> Result<Vec<f32>> {
    let bits = frame::to_bits(packet)?;
    let slots = PREAMBLE_SLOTS + bits.len();
    let mut samples = Vec::with_capacity(LEAD_IN_SAMPLES + slots * SLOT_SAMPLES);

    samples.extend(std::iter::repeat(0.0).take(LEAD_IN_SAMPLES));
    for _ in 0..PREAMBLE_SLOTS {
        push_slot(&mut samples, FREQ_PREAMBLE);
    }
    for &bit in &bits {
        push_slot(&mut samples, if bit { FREQ_ONE } else { FREQ_ZERO });
    }

    debug!(
        "synthesized {} bits as {} samples ({} ms)",
        bits.len(),
        samples.len(),
        samples.len() * 1000 / SAMPLE_RATE
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeId;

    #[test]
    fn test_signal_length() {
        let packet = Packet::new(NodeId(0x0001), NodeId(0x0002), b"ab".to_vec());
        let samples = synthesize(&packet).unwrap();
        let slots = PREAMBLE_SLOTS + 40 + 14 * 2;
        assert_eq!(samples.len(), LEAD_IN_SAMPLES + slots * SLOT_SAMPLES);
    }

    #[test]
    fn test_lead_in_is_silent() {
        let packet = Packet::new(NodeId(0x0001), NodeId(0x0002), Vec::new());
        let samples = synthesize(&packet).unwrap();
        assert!(samples[..LEAD_IN_SAMPLES].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_slot_edges_are_quiet() {
        let packet = Packet::new(NodeId(0x0001), NodeId(0x0002), b"x".to_vec());
        let samples = synthesize(&packet).unwrap();
        // Every slot ends with a silent guard and starts from a ramp, so the
        // sample at each slot boundary must be near zero.
        for slot in 0..PREAMBLE_SLOTS + 40 + 14 {
            let at = LEAD_IN_SAMPLES + slot * SLOT_SAMPLES;
            assert!(samples[at].abs() < 0.01, "loud edge at slot {}", slot);
            assert!(
                samples[at + SLOT_SAMPLES - 1].abs() < 0.01,
                "loud tail in slot {}",
                slot
            );
        }
    }

    #[test]
    fn test_amplitude_bounded() {
        let packet = Packet::new(NodeId(0xFFFE), NodeId(0x0003), b"loud".to_vec());
        let samples = synthesize(&packet).unwrap();
        assert!(samples.iter().all(|&s| s.abs() <= TONE_AMPLITUDE));
    }
}
