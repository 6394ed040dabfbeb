pub mod ble;
pub mod control;
pub mod playback;
pub mod scheduler;
pub mod transport;

pub use scheduler::{Scheduler, StreamReport, Timing};
pub use transport::{connect_with_retry, LogTransport, RetryPolicy, Transport};
