//! Tone detection and carrier sense.
//!
//! A `SpectralReading` is the linear power at the three protocol
//! frequencies for one analysis instant, normalized so a full-scale tone
//! measures 1.0. Hosts with their own spectral pipeline build readings
//! directly; file/buffer hosts use `SpectrumProbe`, a Goertzel probe over
//! blocks of time-domain samples.

use crate::{BUSY_THRESHOLD_POWER, FREQ_ONE, FREQ_PREAMBLE, FREQ_ZERO, NOISE_FLOOR_POWER, SAMPLE_RATE};

/// Power at the three tone frequencies, linear, 1.0 = full-scale tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralReading {
    pub preamble: f32,
    pub zero: f32,
    pub one: f32,
}

/// One classified analysis instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Preamble,
    Zero,
    One,
}

/// Classify a reading. The preamble tone wins whenever it clears the noise
/// floor, even while a data tone is also hot; otherwise the stronger data
/// tone above the floor; `None` when everything sits below the floor.
pub fn classify(reading: &SpectralReading) -> Option<Symbol> {
    if reading.preamble > NOISE_FLOOR_POWER {
        return Some(Symbol::Preamble);
    }
    let best = reading.zero.max(reading.one);
    if best <= NOISE_FLOOR_POWER {
        return None;
    }
    if reading.one > reading.zero {
        Some(Symbol::One)
    } else {
        Some(Symbol::Zero)
    }
}

/// Carrier sense: another transmitter is on the air when either data tone
/// carries real energy. Gates transmission only, never reception.
pub fn is_busy(reading: &SpectralReading) -> bool {
    reading.zero > BUSY_THRESHOLD_POWER || reading.one > BUSY_THRESHOLD_POWER
}

/// Goertzel single-bin probe at the three protocol frequencies.
///
/// Uses the exact tone frequency rather than the nearest DFT bin, so the
/// analysis block length does not have to divide the tone period. Blocks
/// are mean-removed and Hann-tapered before the recurrence to keep
/// neighbouring-tone leakage below the noise floor.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumProbe {
    sample_rate: f32,
}

impl Default for SpectrumProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumProbe {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE as f32,
        }
    }

    /// Probe for hosts whose capture pipeline runs at a different rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
        }
    }

    /// Measure one block of time-domain samples.
    pub fn read(&self, samples: &[f32]) -> SpectralReading {
        SpectralReading {
            preamble: self.power_at(samples, FREQ_PREAMBLE),
            zero: self.power_at(samples, FREQ_ZERO),
            one: self.power_at(samples, FREQ_ONE),
        }
    }

    fn power_at(&self, samples: &[f32], freq: f32) -> f32 {
        let n = samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = samples.iter().sum::<f32>() / n as f32;

        let omega = 2.0 * std::f32::consts::PI * freq / self.sample_rate;
        let coeff = 2.0 * omega.cos();
        let mut s1 = 0.0f32;
        let mut s2 = 0.0f32;
        let mut window_sum = 0.0f32;
        for (i, &x) in samples.iter().enumerate() {
            let w = 0.5
                * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos());
            window_sum += w;
            let s0 = coeff * s1 - s2 + (x - mean) * w;
            s2 = s1;
            s1 = s0;
        }
        let power = s1 * s1 + s2 * s2 - coeff * s1 * s2;
        let scale = window_sum / 2.0;
        (power / (scale * scale)).max(0.0)
    }
}
