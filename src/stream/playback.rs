//! Audible playback seam. The scheduler only starts a segment's audio and
//! never waits on it.

pub trait AudioSink {
    /// Starts playing one segment's samples; returns immediately.
    fn play_segment(&mut self, index: usize, samples: &[f32], sample_rate: u32);
    fn stop(&mut self);
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn play_segment(&mut self, index: usize, samples: &[f32], sample_rate: u32) {
        (**self).play_segment(index, samples, sample_rate)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Discards audio. Used with `--mute` and when the `playback` feature is off.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play_segment(&mut self, index: usize, samples: &[f32], _sample_rate: u32) {
        log::trace!("audio segment {} ({} samples) muted", index, samples.len());
    }

    fn stop(&mut self) {}
}

#[cfg(feature = "playback")]
pub use device::CpalSink;

#[cfg(feature = "playback")]
mod device {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{Context, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use super::AudioSink;

    /// Plays segments on the default output device. Each segment replaces
    /// whatever is still queued, so audio never drifts behind the frames.
    pub struct CpalSink {
        queue: Arc<Mutex<VecDeque<f32>>>,
        device_rate: u32,
        channels: usize,
        _stream: cpal::Stream,
    }

    impl CpalSink {
        pub fn open() -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .context("No audio output device available")?;
            let supported = device
                .default_output_config()
                .context("Failed to query output config")?;
            if supported.sample_format() != cpal::SampleFormat::F32 {
                anyhow::bail!(
                    "Output device uses {:?} samples; only f32 output is supported",
                    supported.sample_format()
                );
            }
            let config: cpal::StreamConfig = supported.config();
            let channels = config.channels as usize;
            let device_rate = config.sample_rate.0;

            let queue = Arc::new(Mutex::new(VecDeque::<f32>::new()));
            let reader = Arc::clone(&queue);
            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut queue = match reader.lock() {
                            Ok(q) => q,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        for sample in data.iter_mut() {
                            *sample = queue.pop_front().unwrap_or(0.0);
                        }
                    },
                    |err| log::error!("Audio output error: {}", err),
                    None,
                )
                .context("Failed to open audio output stream")?;
            stream.play().context("Failed to start audio output")?;

            log::info!("Audio output: {} Hz, {} channel(s)", device_rate, channels);
            Ok(Self {
                queue,
                device_rate,
                channels,
                _stream: stream,
            })
        }
    }

    impl AudioSink for CpalSink {
        fn play_segment(&mut self, _index: usize, samples: &[f32], sample_rate: u32) {
            let out_len = samples.len() * self.device_rate as usize / sample_rate.max(1) as usize;
            let mut queue = match self.queue.lock() {
                Ok(q) => q,
                Err(poisoned) => poisoned.into_inner(),
            };
            queue.clear();
            // Sample-and-hold up to the device rate.
            for i in 0..out_len {
                let src = samples[(i * sample_rate as usize / self.device_rate as usize).min(samples.len() - 1)];
                for _ in 0..self.channels {
                    queue.push_back(src);
                }
            }
        }

        fn stop(&mut self) {
            match self.queue.lock() {
                Ok(mut q) => q.clear(),
                Err(poisoned) => poisoned.into_inner().clear(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_anything() {
        let mut sink = NullSink;
        sink.play_segment(0, &[0.0; 800], 8000);
        sink.play_segment(1, &[], 8000);
        sink.stop();
    }
}
