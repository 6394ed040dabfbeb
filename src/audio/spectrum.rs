use std::ops::Range;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::AnalysisError;

/// Per-bin power `|X[k]|²` over the full (mirrored) complex spectrum.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerSpectrum {
    pub bins: Vec<f64>,
}

impl PowerSpectrum {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn sum(&self, range: Range<usize>) -> f64 {
        self.bins[range].iter().sum()
    }

    pub fn mean(&self, range: Range<usize>) -> f64 {
        let n = range.len();
        if n == 0 {
            return 0.0;
        }
        self.sum(range) / n as f64
    }
}

/// Fixed-length DFT over sample windows.
///
/// Bin boundaries are only meaningful at the reference sample rate: with the
/// default `fft_size == reference_rate` every bin is 1 Hz wide. Anything else
/// must be resampled before it gets here, so both entry points reject other
/// rates instead of silently shifting every band.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    fft_size: usize,
    reference_rate: u32,
}

impl SpectralAnalyzer {
    pub fn new(fft_size: usize, reference_rate: u32) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            fft,
            fft_size,
            reference_rate,
        }
    }

    /// Power spectrum of `samples[window]`, divided by the window length so
    /// that a short final segment is comparable with full ones.
    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: u32,
        window: Range<usize>,
    ) -> Result<PowerSpectrum, AnalysisError> {
        self.check_rate(sample_rate)?;
        if window.start >= window.end {
            return Err(AnalysisError::EmptyWindow {
                start: window.start,
                end: window.end,
            });
        }
        if window.end > samples.len() {
            return Err(AnalysisError::WindowOutOfBounds {
                start: window.start,
                end: window.end,
                len: samples.len(),
            });
        }

        let window_len = window.len() as f64;
        let mut bins = self.power(&samples[window]);
        for p in bins.iter_mut() {
            *p /= window_len;
        }
        Ok(PowerSpectrum { bins })
    }

    /// Whole-track spectrum used for calibration. The track is cut into
    /// consecutive `fft_size` blocks and their raw power is averaged, so every
    /// sample contributes while the bin layout matches `analyze`. A short
    /// final block counts for the fraction of a block it actually fills, so
    /// the result tracks the signal's level rather than the track's length.
    pub fn analyze_baseline(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<PowerSpectrum, AnalysisError> {
        self.check_rate(sample_rate)?;
        let mut acc = vec![0.0f64; self.fft_size];
        if samples.is_empty() {
            return Ok(PowerSpectrum { bins: acc });
        }

        for block in samples.chunks(self.fft_size) {
            for (a, p) in acc.iter_mut().zip(self.power(block)) {
                *a += p;
            }
        }
        let blocks = samples.len() as f64 / self.fft_size as f64;
        for a in acc.iter_mut() {
            *a /= blocks;
        }
        Ok(PowerSpectrum { bins: acc })
    }

    fn check_rate(&self, sample_rate: u32) -> Result<(), AnalysisError> {
        if sample_rate != self.reference_rate {
            return Err(AnalysisError::UnsupportedSampleRate {
                expected: self.reference_rate,
                actual: sample_rate,
            });
        }
        Ok(())
    }

    // Zero-pads or truncates to fft_size.
    fn power(&self, samples: &[f32]) -> Vec<f64> {
        let mut buffer = vec![Complex::new(0.0f64, 0.0); self.fft_size];
        for (slot, &s) in buffer.iter_mut().zip(samples) {
            slot.re = s as f64;
        }
        self.fft.process(&mut buffer);
        buffer.iter().map(|c| c.norm_sqr()).collect()
    }
}
