use thiserror::Error;
use uuid::Uuid;

/// Malformed configuration or input that must be rejected before streaming.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("reference sample rate must be positive")]
    NonPositiveSampleRate,
    #[error("input is {actual} Hz but processing is only valid at {expected} Hz; resample the track first")]
    SampleRateMismatch { expected: u32, actual: u32 },
    #[error("fft size must be positive")]
    ZeroFftSize,
    #[error("segment interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),
    #[error("pulse width {pulse}s must be positive and no longer than the {interval}s segment interval")]
    InvalidPulseWidth { pulse: f64, interval: f64 },
    #[error("at least one band must be configured")]
    NoBands,
    #[error("band '{0}' is configured more than once")]
    DuplicateBand(String),
    #[error("band '{band}' has an empty bin range {lower}..{upper}")]
    EmptyBinRange { band: String, lower: usize, upper: usize },
    #[error("band '{band}' bin range {lower}..{upper} exceeds the {len}-bin spectrum")]
    BinRangeOutOfBounds {
        band: String,
        lower: usize,
        upper: usize,
        len: usize,
    },
    #[error("band '{band}' baseline reference power must be positive and finite, got {value}")]
    InvalidBaseline { band: String, value: f64 },
    #[error("band '{band}' tiers must be finite and strictly increasing, got {tiers:?}")]
    InvalidTiers { band: String, tiers: [f64; 3] },
    #[error("device {field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidDeviceTiming { field: &'static str, value: f64 },
    #[error("invalid device address '{0}'")]
    InvalidAddress(String),
}

/// Contract violations when handing windows to the spectral analyzer.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("empty analysis window {start}..{end}")]
    EmptyWindow { start: usize, end: usize },
    #[error("analysis window {start}..{end} exceeds buffer of {len} samples")]
    WindowOutOfBounds { start: usize, end: usize, len: usize },
    #[error("spectrum is only defined at {expected} Hz, got {actual} Hz")]
    UnsupportedSampleRate { expected: u32, actual: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame is {actual} bytes, expected {expected}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("frame has no level for band '{0}'")]
    MissingBand(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no bluetooth adapter available")]
    NoAdapter,
    #[error("'{0}' is not a bluetooth hardware address")]
    InvalidAddress(String),
    #[error("device {address} not found within {seconds:.1}s scan")]
    DeviceNotFound { address: String, seconds: f64 },
    #[error("device {address} does not expose characteristic {uuid}")]
    CharacteristicMissing { address: String, uuid: Uuid },
    #[error("gave up connecting to {address} after {attempts} attempts: {last}")]
    RetriesExhausted {
        address: String,
        attempts: u32,
        last: Box<TransportError>,
    },
    #[error("device disconnected")]
    Disconnected,
    #[error("bluetooth: {0}")]
    Ble(#[from] btleplug::Error),
}

/// Reasons a stream ends in the aborted state.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("transport failed at segment {segment}: {source}")]
    Transport {
        segment: usize,
        #[source]
        source: TransportError,
    },
    #[error("stream cancelled at segment {segment}")]
    Cancelled { segment: usize },
    #[error("pause control closed while paused at segment {segment}")]
    ControlClosed { segment: usize },
}
