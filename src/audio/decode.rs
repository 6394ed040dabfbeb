use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::ConfigError;

/// Mono PCM normalised to [-1, 1]. Owned by the caller; analysis and
/// streaming only borrow it.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Band bin ranges assume the reference rate; resampling is up to
    /// whoever produced the buffer.
    pub fn ensure_sample_rate(&self, expected: u32) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::NonPositiveSampleRate);
        }
        if self.sample_rate != expected {
            return Err(ConfigError::SampleRateMismatch {
                expected,
                actual: self.sample_rate,
            });
        }
        Ok(())
    }
}

/// Decodes the first audio track of `path` and downmixes it to mono. No
/// resampling happens here: the rate is reported as found.
pub fn decode_audio(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .with_context(|| format!("No audio tracks found in {}", path.display()))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    log::info!(
        "Decoded {}: {} samples, {}Hz, {} channel(s) -> mono, {:.1}s",
        path.display(),
        all_samples.len(),
        sample_rate,
        channels,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioBuffer::new(all_samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_precondition() {
        let buffer = AudioBuffer::new(vec![0.0; 16_000], 8000);
        assert!(buffer.ensure_sample_rate(8000).is_ok());
        assert_eq!(buffer.duration_secs(), 2.0);
        assert_eq!(
            AudioBuffer::new(vec![], 44_100).ensure_sample_rate(8000),
            Err(ConfigError::SampleRateMismatch { expected: 8000, actual: 44_100 })
        );
        assert_eq!(
            AudioBuffer::new(vec![], 0).ensure_sample_rate(8000),
            Err(ConfigError::NonPositiveSampleRate)
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = decode_audio(Path::new("/nonexistent/track.wav")).unwrap_err();
        assert!(err.to_string().contains("track.wav"));
    }
}
