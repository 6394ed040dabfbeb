use crate::audio::segment::{samples_per_segment, segments, Segment};
use crate::audio::spectrum::SpectralAnalyzer;
use crate::audio::AudioBuffer;
use crate::config::AudioConfig;
use crate::error::{AnalysisError, ConfigError};

use super::bands::{validate_bands, BandSpec};
use super::calibrate::{calibrate, CalibrationFactors, Factor};
use super::frame::{FrameCodec, IntensityFrame};
use super::quantize::quantize;

/// Everything needed to turn one segment into one frame. Built once per
/// track, before streaming, and only read afterwards.
pub struct HapticPipeline {
    analyzer: SpectralAnalyzer,
    bands: Vec<BandSpec>,
    factors: CalibrationFactors,
    codec: FrameCodec,
    segments: Vec<Segment>,
}

impl HapticPipeline {
    /// Validates the setup against the track, measures the whole-track
    /// baseline and derives calibration factors.
    pub fn calibrate(
        audio: &AudioBuffer,
        config: &AudioConfig,
        bands: Vec<BandSpec>,
    ) -> Result<Self, ConfigError> {
        let analyzer = Self::prepare(audio, config, &bands)?;
        let baseline = analyzer
            .analyze_baseline(&audio.samples, audio.sample_rate)
            .map_err(|_| ConfigError::SampleRateMismatch {
                expected: config.reference_sample_rate,
                actual: audio.sample_rate,
            })?;
        let factors = calibrate(&baseline, &bands);
        Ok(Self::assemble(audio, config, analyzer, bands, factors))
    }

    /// Same as `calibrate` but with externally chosen factors.
    #[cfg(test)]
    pub fn with_factors(
        audio: &AudioBuffer,
        config: &AudioConfig,
        bands: Vec<BandSpec>,
        factors: CalibrationFactors,
    ) -> Result<Self, ConfigError> {
        let analyzer = Self::prepare(audio, config, &bands)?;
        Ok(Self::assemble(audio, config, analyzer, bands, factors))
    }

    fn prepare(
        audio: &AudioBuffer,
        config: &AudioConfig,
        bands: &[BandSpec],
    ) -> Result<SpectralAnalyzer, ConfigError> {
        if config.fft_size() == 0 {
            return Err(ConfigError::ZeroFftSize);
        }
        if !config.interval.is_finite() || config.interval <= 0.0 {
            return Err(ConfigError::InvalidInterval(config.interval));
        }
        audio.ensure_sample_rate(config.reference_sample_rate)?;
        validate_bands(bands, config.fft_size())?;
        Ok(SpectralAnalyzer::new(config.fft_size(), config.reference_sample_rate))
    }

    fn assemble(
        audio: &AudioBuffer,
        config: &AudioConfig,
        analyzer: SpectralAnalyzer,
        bands: Vec<BandSpec>,
        factors: CalibrationFactors,
    ) -> Self {
        let segment_len = samples_per_segment(audio.sample_rate, config.interval);
        let codec = FrameCodec::new(bands.iter().map(|b| b.name.clone()).collect());
        Self {
            analyzer,
            bands,
            factors,
            codec,
            segments: segments(audio.samples.len(), segment_len),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn bands(&self) -> &[BandSpec] {
        &self.bands
    }

    pub fn factors(&self) -> &CalibrationFactors {
        &self.factors
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Summed spectral power of each band over one segment, in band order.
    pub fn band_powers(
        &self,
        audio: &AudioBuffer,
        segment: &Segment,
    ) -> Result<Vec<f64>, AnalysisError> {
        let spectrum =
            self.analyzer
                .analyze(&audio.samples, audio.sample_rate, segment.range.clone())?;
        Ok(self
            .bands
            .iter()
            .map(|band| spectrum.sum(band.bin_range(spectrum.len())))
            .collect())
    }

    pub fn frame_for(
        &self,
        audio: &AudioBuffer,
        segment: &Segment,
    ) -> Result<IntensityFrame, AnalysisError> {
        let powers = self.band_powers(audio, segment)?;
        log::trace!("Segment {} band powers: {:?}", segment.index, powers);

        let entries = self
            .bands
            .iter()
            .zip(powers)
            .map(|(band, power)| {
                let factor = self.factors.get(&band.name).unwrap_or(Factor::NoSignal);
                (band.name.clone(), quantize(power, band, factor))
            })
            .collect();
        Ok(IntensityFrame::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptics::bands::default_bands;

    fn config() -> AudioConfig {
        AudioConfig::default()
    }

    #[test]
    fn silent_track_streams_stop_frames() {
        let audio = AudioBuffer::new(vec![0.0; 8000], 8000);
        let bands = vec![BandSpec::full("only", 1.0, [5.0, 25.0, 50.0])];
        let factors = CalibrationFactors::uniform(&bands, Factor::Scale(1.0));
        let pipeline = HapticPipeline::with_factors(&audio, &config(), bands, factors).unwrap();

        assert_eq!(pipeline.segments().len(), 10);
        for segment in pipeline.segments() {
            let frame = pipeline.frame_for(&audio, segment).unwrap();
            assert_eq!(frame.level("only"), Some(0));
            let bytes = pipeline.codec().encode(&frame).unwrap();
            assert_eq!(bytes, pipeline.codec().stop_frame());
        }
    }

    #[test]
    fn silent_track_calibrates_to_no_signal() {
        let audio = AudioBuffer::new(vec![0.0; 4000], 8000);
        let pipeline = HapticPipeline::calibrate(&audio, &config(), default_bands()).unwrap();
        assert!(pipeline.factors().iter().all(|(_, f)| f == Factor::NoSignal));
        assert_eq!(pipeline.segments().len(), 5);
        assert_eq!(pipeline.codec().width(), 8);
    }

    #[test]
    fn loud_low_tone_drives_low_band() {
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f64::consts::PI * 200.0 * i as f64 / 8000.0).sin() as f32)
            .collect();
        let audio = AudioBuffer::new(samples, 8000);
        let bands = default_bands();
        let factors = CalibrationFactors::uniform(&bands, Factor::Scale(1.0));
        let pipeline = HapticPipeline::with_factors(&audio, &config(), bands, factors).unwrap();

        let segment = &pipeline.segments()[3];
        let frame = pipeline.frame_for(&audio, segment).unwrap();
        assert_eq!(frame.level("low_pass"), Some(850));
        assert_eq!(frame.level("original"), Some(850));

        let powers = pipeline.band_powers(&audio, segment).unwrap();
        // Parseval: fft_size * sum(x^2) / window_len = 8000 * 400 / 800
        assert!((powers[0] - 4000.0).abs() < 1.0);
        assert!(powers[1] > 100.0 * powers[3]);
    }

    #[test]
    fn rejects_mismatched_rate() {
        let audio = AudioBuffer::new(vec![0.0; 100], 44_100);
        assert!(matches!(
            HapticPipeline::calibrate(&audio, &config(), default_bands()),
            Err(ConfigError::SampleRateMismatch { expected: 8000, actual: 44_100 })
        ));
    }

    #[test]
    fn partial_final_segment_is_analyzed() {
        let audio = AudioBuffer::new(vec![0.1; 850], 8000);
        let pipeline = HapticPipeline::calibrate(&audio, &config(), default_bands()).unwrap();
        assert_eq!(pipeline.segments().len(), 2);
        assert_eq!(pipeline.segments()[1].range, 800..850);
        assert!(pipeline.frame_for(&audio, &pipeline.segments()[1]).is_ok());
    }
}
