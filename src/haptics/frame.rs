use crate::error::FrameError;

/// Bytes per band on the wire.
pub const BYTES_PER_BAND: usize = 2;

/// Levels for one segment, one entry per band in codec order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntensityFrame {
    entries: Vec<(String, u16)>,
}

impl IntensityFrame {
    pub fn new(entries: Vec<(String, u16)>) -> Self {
        Self { entries }
    }

    pub fn level(&self, band: &str) -> Option<u16> {
        self.entries
            .iter()
            .find(|(name, _)| name == band)
            .map(|(_, level)| *level)
    }

    pub fn entries(&self) -> &[(String, u16)] {
        &self.entries
    }

    pub fn is_silent(&self) -> bool {
        self.entries.iter().all(|(_, level)| *level == 0)
    }
}

/// Fixed-width frame layout agreed with the device: every band's level as a
/// big-endian `u16`, in a stable band order.
#[derive(Clone, Debug)]
pub struct FrameCodec {
    band_order: Vec<String>,
    stop: Vec<u8>,
}

impl FrameCodec {
    pub fn new(band_order: Vec<String>) -> Self {
        let stop = vec![0u8; band_order.len() * BYTES_PER_BAND];
        Self { band_order, stop }
    }

    pub fn width(&self) -> usize {
        self.stop.len()
    }

    /// All-zero frame of the same width: halts every actuator.
    pub fn stop_frame(&self) -> &[u8] {
        &self.stop
    }

    pub fn encode(&self, frame: &IntensityFrame) -> Result<Vec<u8>, FrameError> {
        let mut out = Vec::with_capacity(self.width());
        for band in &self.band_order {
            let level = frame
                .level(band)
                .ok_or_else(|| FrameError::MissingBand(band.clone()))?;
            out.extend_from_slice(&level.to_be_bytes());
        }
        Ok(out)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<IntensityFrame, FrameError> {
        if bytes.len() != self.width() {
            return Err(FrameError::WidthMismatch {
                expected: self.width(),
                actual: bytes.len(),
            });
        }
        let entries = self
            .band_order
            .iter()
            .zip(bytes.chunks_exact(BYTES_PER_BAND))
            .map(|(band, pair)| (band.clone(), u16::from_be_bytes([pair[0], pair[1]])))
            .collect();
        Ok(IntensityFrame::new(entries))
    }
}
