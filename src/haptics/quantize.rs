use super::bands::BandSpec;
use super::calibrate::Factor;

/// Buckets a band's segment power into one of the band's four levels.
///
/// Tiers are scaled by the calibration factor, then checked high to low:
///
/// | power                            | level       |
/// |----------------------------------|-------------|
/// | `>= tier[1] / 2`                 | `levels[0]` |
/// | `>= tier[0]`                     | `levels[1]` |
/// | `>= tier[0] / 2`                 | `levels[2]` |
/// | below                            | `levels[3]` |
///
/// Lower bounds are inclusive, so a power sitting exactly on a boundary takes
/// the higher bucket. `tier[2]` does not participate. The thresholds come from
/// listening tests on one reference track and should be read as a tuning
/// heuristic.
pub fn quantize(power: f64, band: &BandSpec, factor: Factor) -> u16 {
    let scale = match factor {
        Factor::Scale(s) => s,
        Factor::NoSignal => return band.levels[3],
    };
    if !power.is_finite() {
        return band.levels[3];
    }

    let t0 = band.tiers[0] * scale;
    let t1 = band.tiers[1] * scale;

    if power >= t1 / 2.0 {
        band.levels[0]
    } else if power >= t0 {
        band.levels[1]
    } else if power >= t0 / 2.0 {
        band.levels[2]
    } else {
        band.levels[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_pass() -> BandSpec {
        BandSpec::ranged("low_pass", 0, 1000, 48.51, [5.0, 25.0, 50.0])
    }

    #[test]
    fn buckets_with_unit_factor() {
        let band = low_pass();
        let one = Factor::Scale(1.0);
        assert_eq!(quantize(100.0, &band, one), 850);
        assert_eq!(quantize(12.5, &band, one), 850);
        assert_eq!(quantize(12.4, &band, one), 700);
        assert_eq!(quantize(5.0, &band, one), 700);
        assert_eq!(quantize(4.9, &band, one), 500);
        assert_eq!(quantize(2.5, &band, one), 500);
        assert_eq!(quantize(2.4, &band, one), 0);
        assert_eq!(quantize(0.0, &band, one), 0);
    }

    #[test]
    fn boundary_goes_to_higher_bucket() {
        let band = BandSpec::full("b", 1.0, [4.0, 10.0, 20.0]);
        let one = Factor::Scale(1.0);
        // tier[0] / 2 is the lower edge of the third level, not zero.
        assert_eq!(quantize(2.0, &band, one), 500);
        assert_eq!(quantize(4.0, &band, one), 700);
        assert_eq!(quantize(5.0, &band, one), 850);
    }

    #[test]
    fn factor_scales_thresholds() {
        let band = low_pass();
        assert_eq!(quantize(5.0, &band, Factor::Scale(2.0)), 500);
        assert_eq!(quantize(5.0, &band, Factor::Scale(0.5)), 700);
    }

    #[test]
    fn third_tier_is_ignored() {
        let mut a = low_pass();
        let mut b = low_pass();
        a.tiers[2] = 26.0;
        b.tiers[2] = 1e9;
        for p in [0.0, 2.5, 5.0, 12.5, 30.0, 1e6] {
            assert_eq!(quantize(p, &a, Factor::Scale(1.0)), quantize(p, &b, Factor::Scale(1.0)));
        }
    }

    #[test]
    fn no_signal_is_always_lowest() {
        let band = low_pass();
        assert_eq!(quantize(0.0, &band, Factor::NoSignal), 0);
        assert_eq!(quantize(1e12, &band, Factor::NoSignal), 0);
        assert_eq!(quantize(f64::NAN, &band, Factor::Scale(1.0)), 0);
    }

    #[test]
    fn custom_levels() {
        let mut band = low_pass();
        band.levels = [1023, 512, 100, 7];
        let one = Factor::Scale(1.0);
        assert_eq!(quantize(50.0, &band, one), 1023);
        assert_eq!(quantize(0.0, &band, one), 7);
    }
}
