pub mod decode;
pub mod segment;
pub mod spectrum;

pub use decode::AudioBuffer;
