//! Per-track threshold calibration.
//!
//! Raw band power depends heavily on recording loudness and mastering. Each
//! band's whole-track average is compared with the same band measured on a
//! reference recording, and the ratio scales that band's tiers. This is a
//! heuristic that makes one set of thresholds roughly transferable between
//! tracks; it does not make the resulting levels an accurate loudness model.

use serde::Serialize;

use super::bands::BandSpec;
use crate::audio::spectrum::PowerSpectrum;

/// Multiplier applied to a band's tiers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Factor {
    /// Observed average ÷ reference baseline, always positive and finite.
    Scale(f64),
    /// The track had no usable energy in this band. Quantizes to the lowest
    /// level.
    NoSignal,
}

/// Exactly one factor per band, in band-table order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationFactors {
    entries: Vec<(String, Factor)>,
}

impl CalibrationFactors {
    /// Builds factors for a band table directly, bypassing measurement.
    #[cfg(test)]
    pub fn uniform(bands: &[BandSpec], factor: Factor) -> Self {
        Self {
            entries: bands.iter().map(|b| (b.name.clone(), factor)).collect(),
        }
    }

    pub fn get(&self, band: &str) -> Option<Factor> {
        self.entries
            .iter()
            .find(|(name, _)| name == band)
            .map(|(_, f)| *f)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, Factor)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), *f))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Mean power over the band's bins divided by the band's reference baseline.
/// Pure: the same spectrum and table always give the same factors.
pub fn calibrate(baseline: &PowerSpectrum, bands: &[BandSpec]) -> CalibrationFactors {
    let entries = bands
        .iter()
        .map(|band| {
            let mean = baseline.mean(band.bin_range(baseline.len()));
            let ratio = mean / band.baseline;
            let factor = if ratio.is_finite() && ratio > 0.0 {
                Factor::Scale(ratio)
            } else {
                log::warn!(
                    "Band '{}' has no usable baseline energy (mean {:.4}); it will stay silent",
                    band.name,
                    mean
                );
                Factor::NoSignal
            };
            log::info!(
                "Calibration '{}': track mean {:.4}, reference {:.4}, factor {:?}",
                band.name,
                mean,
                band.baseline,
                factor
            );
            (band.name.clone(), factor)
        })
        .collect();

    CalibrationFactors { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptics::bands::default_bands;

    fn flat(len: usize, value: f64) -> PowerSpectrum {
        PowerSpectrum {
            bins: vec![value; len],
        }
    }

    #[test]
    fn ratio_against_baseline() {
        let bands = vec![
            BandSpec::full("all", 2.0, [1.0, 2.0, 3.0]),
            BandSpec::ranged("low", 0, 2, 4.0, [1.0, 2.0, 3.0]),
        ];
        let spectrum = PowerSpectrum {
            bins: vec![8.0, 8.0, 0.0, 0.0],
        };
        let factors = calibrate(&spectrum, &bands);
        assert_eq!(factors.len(), 2);
        assert_eq!(factors.get("all"), Some(Factor::Scale(2.0)));
        assert_eq!(factors.get("low"), Some(Factor::Scale(2.0)));
        assert_eq!(factors.get("missing"), None);
    }

    #[test]
    fn silence_yields_sentinel() {
        let factors = calibrate(&flat(8000, 0.0), &default_bands());
        assert_eq!(factors.len(), 4);
        assert!(factors.iter().all(|(_, f)| f == Factor::NoSignal));
    }

    #[test]
    fn nan_energy_yields_sentinel() {
        let bands = vec![BandSpec::full("all", 1.0, [1.0, 2.0, 3.0])];
        let factors = calibrate(&flat(4, f64::NAN), &bands);
        assert_eq!(factors.get("all"), Some(Factor::NoSignal));
    }

    #[test]
    fn idempotent() {
        let spectrum = PowerSpectrum {
            bins: (0..8000).map(|i| (i % 17) as f64 * 0.3).collect(),
        };
        let bands = default_bands();
        assert_eq!(calibrate(&spectrum, &bands), calibrate(&spectrum, &bands));
    }
}
