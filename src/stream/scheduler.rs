use std::time::Duration;

use indicatif::ProgressBar;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::playback::AudioSink;
use super::transport::Transport;
use crate::audio::AudioBuffer;
use crate::error::StreamError;
use crate::haptics::HapticPipeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Paused,
    Finished,
    Aborted,
}

/// Scheduler-private bookkeeping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackState {
    pub current_segment_index: usize,
    pub is_paused: bool,
    pub segment_start: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Nominal wall-clock length of one segment.
    pub interval: Duration,
    /// How long a frame drives the actuators before the stop frame.
    pub pulse_width: Duration,
}

/// Remaining sleep after a segment's work took `elapsed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SleepPlan {
    pub sleep: Duration,
    /// Set when the work ran past the interval.
    pub overrun: Option<Duration>,
}

impl SleepPlan {
    pub fn new(interval: Duration, elapsed: Duration) -> Self {
        match interval.checked_sub(elapsed) {
            Some(sleep) => Self {
                sleep,
                overrun: None,
            },
            None => Self {
                sleep: Duration::ZERO,
                overrun: Some(elapsed - interval),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub segments_sent: usize,
    pub timing_misses: usize,
    pub pauses: usize,
}

/// Drives one track through the device in real time.
///
/// Per segment: start its audio, send its frame, hold for the pulse width,
/// send the stop frame, then sleep out the rest of the interval. Pause and
/// cancel are observed before a segment starts and again right after its
/// stop frame, never in the middle of one.
pub struct Scheduler<'a, T, S> {
    pipeline: &'a HapticPipeline,
    audio: &'a AudioBuffer,
    transport: T,
    sink: S,
    timing: Timing,
    pause: watch::Receiver<bool>,
    cancel: CancellationToken,
    progress: ProgressBar,
    state: StreamState,
    playback: PlaybackState,
    report: StreamReport,
}

impl<'a, T: Transport, S: AudioSink> Scheduler<'a, T, S> {
    pub fn new(
        pipeline: &'a HapticPipeline,
        audio: &'a AudioBuffer,
        transport: T,
        sink: S,
        timing: Timing,
        pause: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            audio,
            transport,
            sink,
            timing,
            pause,
            cancel,
            progress: ProgressBar::hidden(),
            state: StreamState::Idle,
            playback: PlaybackState::default(),
            report: StreamReport::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> StreamState {
        self.state
    }

    #[cfg(test)]
    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub async fn run(&mut self) -> Result<StreamReport, StreamError> {
        let total = self.pipeline.segments().len();
        self.state = StreamState::Streaming;
        self.progress.set_length(total as u64);
        log::info!(
            "Streaming {} segments ({:?} each, {:?} pulse)",
            total,
            self.timing.interval,
            self.timing.pulse_width
        );

        match self.stream(total).await {
            Ok(()) => {
                self.state = StreamState::Finished;
                self.progress.finish_with_message("Stream complete");
                log::info!(
                    "Finished: {} segments sent, {} timing misses, {} pauses",
                    self.report.segments_sent,
                    self.report.timing_misses,
                    self.report.pauses
                );
                Ok(self.report.clone())
            }
            Err(err) => {
                self.state = StreamState::Aborted;
                self.sink.stop();
                if !matches!(err, StreamError::Transport { .. }) {
                    // Leave the actuators off.
                    let pipeline = self.pipeline;
                    let stop = pipeline.codec().stop_frame();
                    if let Err(e) = self.transport.write_frame(stop).await {
                        log::warn!("Failed to send stop frame while aborting: {}", e);
                    }
                }
                self.progress.abandon();
                log::error!(
                    "Stream aborted at segment {}{}: {}",
                    self.playback.current_segment_index,
                    if self.playback.is_paused { " while paused" } else { "" },
                    err
                );
                Err(err)
            }
        }
    }

    async fn stream(&mut self, total: usize) -> Result<(), StreamError> {
        let pipeline = self.pipeline;
        let audio = self.audio;

        while self.playback.current_segment_index < total {
            self.checkpoint().await?;

            let index = self.playback.current_segment_index;
            let segment = &pipeline.segments()[index];
            self.playback.segment_start = Some(Instant::now());

            let frame = pipeline.frame_for(audio, segment)?;
            let bytes = pipeline.codec().encode(&frame)?;

            self.sink
                .play_segment(index, &audio.samples[segment.range.clone()], audio.sample_rate);
            self.send(index, &bytes).await?;
            tokio::time::sleep(self.timing.pulse_width).await;
            self.send(index, pipeline.codec().stop_frame()).await?;

            self.playback.current_segment_index += 1;
            self.report.segments_sent += 1;
            self.progress.set_position(self.report.segments_sent as u64);

            self.checkpoint().await?;
            // Cleared by a resume: time spent paused is not caught up.
            let Some(started) = self.playback.segment_start else {
                continue;
            };

            let plan = SleepPlan::new(self.timing.interval, started.elapsed());
            if let Some(overrun) = plan.overrun {
                self.report.timing_misses += 1;
                log::warn!(
                    "Timing miss: segment {} overran its {:?} interval by {:?}",
                    index,
                    self.timing.interval,
                    overrun
                );
            }
            if !plan.sleep.is_zero() {
                tokio::time::sleep(plan.sleep).await;
            }
        }

        self.send(total, pipeline.codec().stop_frame()).await
    }

    async fn send(&mut self, segment: usize, frame: &[u8]) -> Result<(), StreamError> {
        self.transport
            .write_frame(frame)
            .await
            .map_err(|source| StreamError::Transport { segment, source })
    }

    async fn checkpoint(&mut self) -> Result<(), StreamError> {
        let segment = self.playback.current_segment_index;
        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled { segment });
        }
        let paused = *self.pause.borrow_and_update();
        if !paused {
            return Ok(());
        }

        self.state = StreamState::Paused;
        self.playback.is_paused = true;
        self.report.pauses += 1;
        self.sink.stop();
        let pipeline = self.pipeline;
        self.send(segment, pipeline.codec().stop_frame()).await?;
        log::info!("Paused before segment {}", segment);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(StreamError::Cancelled { segment }),
                changed = self.pause.changed() => {
                    if changed.is_err() {
                        return Err(StreamError::ControlClosed { segment });
                    }
                    if !*self.pause.borrow_and_update() {
                        break;
                    }
                }
            }
        }

        self.state = StreamState::Streaming;
        self.playback.is_paused = false;
        self.playback.segment_start = None;
        log::info!("Resumed at segment {}", segment);
        Ok(())
    }
}
