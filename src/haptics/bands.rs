use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Output level written for each quantizer bucket, highest first. The last
/// entry is the "no vibration" level.
pub const DEFAULT_LEVELS: [u16; 4] = [850, 700, 500, 0];

/// One perceptual channel: a contiguous range of spectrum bins plus the
/// reference statistics its thresholds were tuned against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub name: String,
    /// `[lower, upper)` bin indices; `None` covers the whole spectrum.
    #[serde(default)]
    pub bins: Option<[usize; 2]>,
    /// Average whole-track power of the reference recording in this band.
    pub baseline: f64,
    /// Power thresholds before calibration. Only `tiers[0]` and `tiers[1]`
    /// drive the bucketing today; `tiers[2]` is carried so configs written
    /// for a finer rule keep loading.
    pub tiers: [f64; 3],
    #[serde(default = "default_levels")]
    pub levels: [u16; 4],
}

fn default_levels() -> [u16; 4] {
    DEFAULT_LEVELS
}

impl BandSpec {
    pub fn full(name: &str, baseline: f64, tiers: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            bins: None,
            baseline,
            tiers,
            levels: DEFAULT_LEVELS,
        }
    }

    pub fn ranged(name: &str, lower: usize, upper: usize, baseline: f64, tiers: [f64; 3]) -> Self {
        Self {
            bins: Some([lower, upper]),
            ..Self::full(name, baseline, tiers)
        }
    }

    /// Bin range inside a spectrum of `spectrum_len` bins.
    pub fn bin_range(&self, spectrum_len: usize) -> Range<usize> {
        match self.bins {
            Some([lower, upper]) => lower..upper.min(spectrum_len),
            None => 0..spectrum_len,
        }
    }

    pub fn validate(&self, spectrum_len: usize) -> Result<(), ConfigError> {
        if let Some([lower, upper]) = self.bins {
            if lower >= upper {
                return Err(ConfigError::EmptyBinRange {
                    band: self.name.clone(),
                    lower,
                    upper,
                });
            }
            if upper > spectrum_len {
                return Err(ConfigError::BinRangeOutOfBounds {
                    band: self.name.clone(),
                    lower,
                    upper,
                    len: spectrum_len,
                });
            }
        }
        if !self.baseline.is_finite() || self.baseline <= 0.0 {
            return Err(ConfigError::InvalidBaseline {
                band: self.name.clone(),
                value: self.baseline,
            });
        }
        let increasing = self.tiers.windows(2).all(|w| w[0] < w[1]);
        if !increasing || self.tiers.iter().any(|t| !t.is_finite()) {
            return Err(ConfigError::InvalidTiers {
                band: self.name.clone(),
                tiers: self.tiers,
            });
        }
        Ok(())
    }
}

/// Reference table measured on "Hotel California" at 8 kHz with 1 Hz bins.
pub fn default_bands() -> Vec<BandSpec> {
    vec![
        BandSpec::full("original", 12.86, [20.0, 60.0, 90.0]),
        BandSpec::ranged("low_pass", 0, 1000, 48.51, [5.0, 25.0, 50.0]),
        BandSpec::ranged("band_pass", 1000, 2000, 2.06, [1.0, 3.0, 6.0]),
        BandSpec::ranged("high_pass", 2000, 4000, 0.43, [0.5, 1.5, 5.0]),
    ]
}

/// Checks each band and that names are unique.
pub fn validate_bands(bands: &[BandSpec], spectrum_len: usize) -> Result<(), ConfigError> {
    if bands.is_empty() {
        return Err(ConfigError::NoBands);
    }
    for (i, band) in bands.iter().enumerate() {
        if bands[..i].iter().any(|b| b.name == band.name) {
            return Err(ConfigError::DuplicateBand(band.name.clone()));
        }
        band.validate(spectrum_len)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_at_reference_size() {
        let bands = default_bands();
        assert_eq!(bands.len(), 4);
        validate_bands(&bands, 8000).unwrap();
        assert_eq!(bands[0].bin_range(8000), 0..8000);
        assert_eq!(bands[3].bin_range(8000), 2000..4000);
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        let bands = default_bands();
        assert!(matches!(
            validate_bands(&bands, 3000),
            Err(ConfigError::BinRangeOutOfBounds { upper: 4000, len: 3000, .. })
        ));
    }

    #[test]
    fn rejects_bad_band_definitions() {
        let empty = BandSpec::ranged("x", 5, 5, 1.0, [1.0, 2.0, 3.0]);
        assert!(matches!(empty.validate(100), Err(ConfigError::EmptyBinRange { .. })));

        let zero_baseline = BandSpec::full("x", 0.0, [1.0, 2.0, 3.0]);
        assert!(matches!(zero_baseline.validate(100), Err(ConfigError::InvalidBaseline { .. })));

        let nan_baseline = BandSpec::full("x", f64::NAN, [1.0, 2.0, 3.0]);
        assert!(matches!(nan_baseline.validate(100), Err(ConfigError::InvalidBaseline { .. })));

        let flat = BandSpec::full("x", 1.0, [1.0, 1.0, 3.0]);
        assert!(matches!(flat.validate(100), Err(ConfigError::InvalidTiers { .. })));
    }

    #[test]
    fn rejects_duplicates_and_empty_tables() {
        assert_eq!(validate_bands(&[], 10), Err(ConfigError::NoBands));
        let dup = vec![
            BandSpec::full("a", 1.0, [1.0, 2.0, 3.0]),
            BandSpec::full("a", 1.0, [1.0, 2.0, 3.0]),
        ];
        assert_eq!(validate_bands(&dup, 10), Err(ConfigError::DuplicateBand("a".into())));
    }
}
