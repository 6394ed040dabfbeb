use std::future::Future;
use std::time::Duration;

use crate::config::DeviceConfig;
use crate::error::TransportError;
use crate::haptics::frame::FrameCodec;

/// Outbound frame channel. Callers hold it exclusively and await each write
/// before issuing the next, so at most one write is ever in flight.
pub trait Transport {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

/// How long to keep trying to reach the device.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// `None` keeps trying forever.
    pub max_attempts: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(device: &DeviceConfig) -> Self {
        Self {
            max_attempts: (device.max_connect_attempts > 0).then_some(device.max_connect_attempts),
            initial_backoff: Duration::from_secs_f64(device.initial_backoff.max(0.0)),
            max_backoff: Duration::from_secs_f64(device.max_backoff.max(0.0)),
        }
    }

    /// Delay after the `attempt`-th failure (1-based): doubles, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// Runs `connect` until it succeeds or the policy's budget is spent. Every
/// failure is logged with the address so an operator can see what is being
/// tried.
pub async fn connect_with_retry<T, F, Fut>(
    address: &str,
    policy: &RetryPolicy,
    mut connect: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match connect().await {
            Ok(handle) => {
                if attempt > 1 {
                    log::info!("Connected to {} after {} attempts", address, attempt);
                }
                return Ok(handle);
            }
            Err(err) => {
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    log::error!("Connecting to {} failed: {} (giving up)", address, err);
                    return Err(TransportError::RetriesExhausted {
                        address: address.to_string(),
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                let delay = policy.backoff(attempt);
                log::warn!(
                    "Connecting to {} failed (attempt {}): {}; retrying in {:?}",
                    address,
                    attempt,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Passes `result` through, but on failure first runs `release` to close a
/// link that was opened before the failing step. A failed release is only
/// logged; the original error is what the caller sees.
pub async fn release_on_error<T, R, Fut>(
    result: Result<T, TransportError>,
    release: R,
) -> Result<T, TransportError>
where
    R: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
{
    if let Err(err) = &result {
        log::debug!("Setup failed ({}), releasing link", err);
        if let Err(e) = release().await {
            log::debug!("Releasing link failed: {}", e);
        }
    }
    result
}

/// Stand-in for the device when running without hardware: frames are decoded
/// back to levels, logged and counted.
#[derive(Debug)]
pub struct LogTransport {
    codec: FrameCodec,
    pub frames_written: usize,
}

impl LogTransport {
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            frames_written: 0,
        }
    }
}

impl Transport for LogTransport {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.frames_written += 1;
        match self.codec.decode(frame) {
            Ok(levels) if levels.is_silent() => {
                log::debug!("frame {:>6}: stop", self.frames_written);
            }
            Ok(levels) => {
                let levels = levels
                    .entries()
                    .iter()
                    .map(|(band, level)| format!("{}={}", band, level))
                    .collect::<Vec<_>>()
                    .join(" ");
                log::info!("frame {:>6}: {}", self.frames_written, levels);
            }
            Err(err) => log::warn!("frame {:>6}: {} ({})", self.frames_written, hex(frame), err),
        }
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(None);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
        assert_eq!(p.backoff(4), Duration::from_millis(500));
        assert_eq!(p.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn zero_attempts_means_unbounded() {
        let mut device = DeviceConfig::default();
        device.max_connect_attempts = 0;
        assert_eq!(RetryPolicy::from_config(&device).max_attempts, None);
        device.max_connect_attempts = 3;
        assert_eq!(RetryPolicy::from_config(&device).max_attempts, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = connect_with_retry("aa:bb:cc:dd:ee:ff", &policy(Some(3)), || {
            calls.set(calls.get() + 1);
            async { Err(TransportError::Disconnected) }
        })
        .await;

        assert_eq!(calls.get(), 3);
        match result {
            Err(TransportError::RetriesExhausted { address, attempts, .. }) => {
                assert_eq!(address, "aa:bb:cc:dd:ee:ff");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();
        let handle = connect_with_retry("aa:bb:cc:dd:ee:ff", &policy(None), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(TransportError::Disconnected)
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(handle, 3);
        // 100ms + 200ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn failed_setup_releases_the_link() {
        let releases = Cell::new(0u32);
        let release = || {
            releases.set(releases.get() + 1);
            async { Err(TransportError::Disconnected) }
        };

        let ok: Result<u8, _> = release_on_error(Ok(7), release).await;
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(releases.get(), 0);

        // The setup error survives a failing release.
        let failed: Result<u8, _> = release_on_error(Err(TransportError::NoAdapter), release).await;
        assert!(matches!(failed, Err(TransportError::NoAdapter)));
        assert_eq!(releases.get(), 1);
    }

    #[tokio::test]
    async fn log_transport_counts_frames() {
        let mut transport = LogTransport::new(FrameCodec::new(vec!["only".into()]));
        transport.write_frame(&[0, 1]).await.unwrap();
        transport.write_frame(&[0, 0]).await.unwrap();
        // Malformed frames are logged, never rejected.
        transport.write_frame(&[0, 0, 0]).await.unwrap();
        assert_eq!(transport.frames_written, 3);
        assert_eq!(hex(&[0x03, 0x52]), "03 52");
    }
}
