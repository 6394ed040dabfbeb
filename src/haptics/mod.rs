pub mod bands;
pub mod calibrate;
pub mod frame;
pub mod pipeline;
pub mod quantize;
pub mod stats;

pub use pipeline::HapticPipeline;
