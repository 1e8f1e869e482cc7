//! Receive-side synchronization state machine.
//!
//! The receiver consumes one classified reading per analysis window and
//! assembles frame bits. Three disciplines keep a noisy channel decodable:
//!
//! - debounce: a classification must persist for `DEBOUNCE_READINGS`
//!   consecutive windows before it is accepted at all;
//! - hold bias: acceptance drops the hold counter below zero so a tone
//!   held across the rest of its slot cannot re-trigger;
//! - gap re-arm: the silent guard at the end of every slot clears the
//!   last-accepted symbol, so runs of identical bits stay separable while
//!   one continuous tone still yields exactly one bit.

use log::{debug, info};

use crate::frame::{self, FrameDecode};
use crate::spectrum::Symbol;
use crate::{
    BIT_HOLD_BIAS, DEBOUNCE_READINGS, GAP_REARM_READINGS, RX_BIT_BUDGET, SYNC_HOLD_BIAS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Collecting,
}

pub struct Receiver {
    state: State,
    bits: Vec<bool>,
    /// Raw classification currently being debounced.
    current: Option<Symbol>,
    hold: i32,
    /// Last symbol accepted as a bit; cleared by an inter-slot gap.
    last_accepted: Option<Symbol>,
    gap_readings: u32,
    incomplete_frames: u32,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            bits: Vec::new(),
            current: None,
            hold: 0,
            last_accepted: None,
            gap_readings: 0,
            incomplete_frames: 0,
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.state == State::Collecting
    }

    pub fn buffered_bits(&self) -> usize {
        self.bits.len()
    }

    /// Frames that synced but never decoded (resync or truncation).
    pub fn incomplete_frames(&self) -> u32 {
        self.incomplete_frames
    }

    /// Feed one classified reading. Returns a packet when this reading
    /// completes a frame.
    pub fn push(&mut self, symbol: Option<Symbol>) -> Option<FrameDecode> {
        let Some(symbol) = symbol else {
            self.gap_readings += 1;
            if self.gap_readings >= GAP_REARM_READINGS {
                self.last_accepted = None;
            }
            self.current = None;
            self.hold = 0;
            return None;
        };

        self.gap_readings = 0;
        if self.current == Some(symbol) {
            self.hold += 1;
        } else {
            self.current = Some(symbol);
            self.hold = 1;
        }
        if self.hold != DEBOUNCE_READINGS {
            return None;
        }
        self.accept(symbol)
    }

    fn accept(&mut self, symbol: Symbol) -> Option<FrameDecode> {
        match symbol {
            Symbol::Preamble => {
                if self.state == State::Collecting && !self.bits.is_empty() {
                    debug!(
                        "resync with {} bits buffered, dropping partial frame",
                        self.bits.len()
                    );
                    self.incomplete_frames += 1;
                }
                self.state = State::Collecting;
                self.bits.clear();
                self.last_accepted = None;
                self.hold = SYNC_HOLD_BIAS;
                debug!("preamble lock, collecting");
                None
            }
            Symbol::Zero | Symbol::One => {
                if self.state != State::Collecting {
                    return None;
                }
                self.hold = BIT_HOLD_BIAS;
                // Held tone: same symbol with no gap since the last bit.
                if self.last_accepted == Some(symbol) {
                    return None;
                }
                self.last_accepted = Some(symbol);
                self.bits.push(symbol == Symbol::One);
                self.try_complete()
            }
        }
    }

    fn try_complete(&mut self) -> Option<FrameDecode> {
        let declared_done =
            frame::expected_bits(&self.bits).is_some_and(|total| self.bits.len() >= total);
        if !declared_done && self.bits.len() < RX_BIT_BUDGET {
            return None;
        }

        let decoded = frame::from_bits(&self.bits);
        match &decoded {
            Some(frame) => info!(
                "frame complete: {} bits, {} payload bytes, {} corrected",
                self.bits.len(),
                frame.packet.payload.len(),
                frame.corrections
            ),
            None => {
                debug!("undecodable buffer of {} bits dropped", self.bits.len());
                self.incomplete_frames += 1;
            }
        }

        self.state = State::Idle;
        self.bits.clear();
        self.current = None;
        self.hold = 0;
        self.last_accepted = None;
        self.gap_readings = 0;
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Packet;
    use crate::identity::NodeId;
    use crate::PREAMBLE_SLOTS;

    /// Readings for one transmitted slot: a stable burst then the guard.
    fn slot(rx: &mut Receiver, symbol: Symbol) -> Option<FrameDecode> {
        let mut out = None;
        for _ in 0..6 {
            out = out.or(rx.push(Some(symbol)));
        }
        for _ in 0..2 {
            out = out.or(rx.push(None));
        }
        out
    }

    fn sync(rx: &mut Receiver) {
        for _ in 0..PREAMBLE_SLOTS {
            slot(rx, Symbol::Preamble);
        }
        assert!(rx.is_collecting());
    }

    #[test]
    fn test_sync_requires_stable_preamble() {
        let mut rx = Receiver::new();
        rx.push(Some(Symbol::Preamble));
        rx.push(Some(Symbol::Preamble));
        rx.push(None);
        assert!(!rx.is_collecting());

        rx.push(Some(Symbol::Preamble));
        rx.push(Some(Symbol::Preamble));
        rx.push(Some(Symbol::Preamble));
        assert!(rx.is_collecting());
    }

    #[test]
    fn test_data_before_sync_ignored() {
        let mut rx = Receiver::new();
        slot(&mut rx, Symbol::One);
        slot(&mut rx, Symbol::Zero);
        assert!(!rx.is_collecting());
        assert_eq!(rx.buffered_bits(), 0);
    }

    #[test]
    fn test_spike_rejected() {
        let mut rx = Receiver::new();
        sync(&mut rx);
        // Two windows of a tone is below the debounce threshold.
        rx.push(Some(Symbol::One));
        rx.push(Some(Symbol::One));
        rx.push(None);
        assert_eq!(rx.buffered_bits(), 0);
    }

    #[test]
    fn test_held_tone_is_one_bit() {
        let mut rx = Receiver::new();
        sync(&mut rx);
        // A tone held over many windows with no gap.
        for _ in 0..24 {
            rx.push(Some(Symbol::One));
        }
        assert_eq!(rx.buffered_bits(), 1);
    }

    #[test]
    fn test_gap_separates_identical_bits() {
        let mut rx = Receiver::new();
        sync(&mut rx);
        slot(&mut rx, Symbol::Zero);
        slot(&mut rx, Symbol::Zero);
        slot(&mut rx, Symbol::Zero);
        assert_eq!(rx.buffered_bits(), 3);
    }

    #[test]
    fn test_alternating_bits() {
        let mut rx = Receiver::new();
        sync(&mut rx);
        slot(&mut rx, Symbol::One);
        slot(&mut rx, Symbol::Zero);
        slot(&mut rx, Symbol::One);
        assert_eq!(rx.buffered_bits(), 3);
    }

    #[test]
    fn test_full_frame_decodes() {
        let packet = Packet::new(NodeId(0x0001), NodeId(0x0002), b"ok".to_vec());
        let bits = frame::to_bits(&packet).unwrap();

        let mut rx = Receiver::new();
        sync(&mut rx);
        let mut decoded = None;
        for &bit in &bits {
            let symbol = if bit { Symbol::One } else { Symbol::Zero };
            decoded = decoded.or(slot(&mut rx, symbol));
        }
        let decoded = decoded.expect("frame should complete");
        assert_eq!(decoded.packet, packet);
        assert_eq!(decoded.corrections, 0);
        assert!(!rx.is_collecting());
        assert_eq!(rx.incomplete_frames(), 0);
    }

    #[test]
    fn test_frame_completes_at_declared_length() {
        let packet = Packet::new(NodeId(0x0001), NodeId(0x0002), b"z".to_vec());
        let bits = frame::to_bits(&packet).unwrap();

        let mut rx = Receiver::new();
        sync(&mut rx);
        for (i, &bit) in bits.iter().enumerate() {
            let symbol = if bit { Symbol::One } else { Symbol::Zero };
            let out = slot(&mut rx, symbol);
            if i + 1 < bits.len() {
                assert!(out.is_none(), "completed early at bit {}", i);
            } else {
                assert_eq!(out.unwrap().packet, packet);
            }
        }
    }

    #[test]
    fn test_resync_drops_partial_frame() {
        let mut rx = Receiver::new();
        sync(&mut rx);
        slot(&mut rx, Symbol::One);
        slot(&mut rx, Symbol::Zero);
        assert_eq!(rx.buffered_bits(), 2);

        slot(&mut rx, Symbol::Preamble);
        assert!(rx.is_collecting());
        assert_eq!(rx.buffered_bits(), 0);
        assert_eq!(rx.incomplete_frames(), 1);
    }

    #[test]
    fn test_back_to_back_frames() {
        let first = Packet::new(NodeId(0x0001), NodeId(0x0002), b"a".to_vec());
        let second = Packet::new(NodeId(0x0002), NodeId(0x0001), b"b".to_vec());

        let mut rx = Receiver::new();
        for packet in [&first, &second] {
            sync(&mut rx);
            let mut decoded = None;
            for &bit in &frame::to_bits(packet).unwrap() {
                let symbol = if bit { Symbol::One } else { Symbol::Zero };
                decoded = decoded.or(slot(&mut rx, symbol));
            }
            assert_eq!(decoded.unwrap().packet, *packet);
        }
        assert_eq!(rx.incomplete_frames(), 0);
    }
}
