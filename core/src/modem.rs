//! Link-layer façade: half-duplex modem with carrier sense.

use log::{debug, warn};

use crate::error::{LinkError, Result};
use crate::frame::{FrameDecode, Packet};
use crate::modulator;
use crate::receiver::Receiver;
use crate::spectrum::{self, SpectralReading};

/// One acoustic link endpoint. Hosts call `ingest` with every spectral
/// reading taken from the capture pipeline and play back whatever
/// `transmit` returns.
pub struct Modem {
    receiver: Receiver,
    channel_busy: bool,
    corrections_total: u64,
}

impl Default for Modem {
    fn default() -> Self {
        Self::new()
    }
}

impl Modem {
    pub fn new() -> Self {
        Self {
            receiver: Receiver::new(),
            channel_busy: false,
            corrections_total: 0,
        }
    }

    /// Channel state as of the most recent reading.
    pub fn channel_busy(&self) -> bool {
        self.channel_busy
    }

    /// FEC corrections across all decoded frames, a proxy for link quality.
    pub fn corrections_total(&self) -> u64 {
        self.corrections_total
    }

    pub fn incomplete_frames(&self) -> u32 {
        self.receiver.incomplete_frames()
    }

    /// Synthesize a packet for playback. Refuses with `ChannelBusy`, before
    /// any sound is produced, while another transmitter is on the air.
    pub fn transmit(&self, packet: &Packet) -> Result<Vec<f32>> {
        if self.channel_busy {
            warn!("transmit refused, channel busy");
            return Err(LinkError::ChannelBusy);
        }
        modulator::synthesize(packet)
    }

    /// Feed one spectral reading to carrier sense and the state machine.
    pub fn ingest(&mut self, reading: &SpectralReading) -> Option<FrameDecode> {
        self.channel_busy = spectrum::is_busy(reading);
        let decoded = self.receiver.push(spectrum::classify(reading));
        if let Some(frame) = &decoded {
            self.corrections_total += u64::from(frame.corrections);
            debug!(
                "packet {} -> {} ({} bytes)",
                frame.packet.sender,
                frame.packet.target,
                frame.packet.payload.len()
            );
        }
        decoded
    }
}
