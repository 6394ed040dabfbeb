use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::haptics::bands::{default_bands, validate_bands, BandSpec};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default = "default_bands")]
    pub bands: Vec<BandSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_reference_sample_rate")]
    pub reference_sample_rate: u32,
    /// Transform length; defaults to the reference rate for 1 Hz bins.
    #[serde(default)]
    pub fft_size: Option<usize>,
    #[serde(default = "default_interval")]
    pub interval: f64,
    #[serde(default = "default_pulse_width")]
    pub pulse_width: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_write_characteristic")]
    pub write_characteristic: Uuid,
    #[serde(default = "default_read_characteristic")]
    pub read_characteristic: Uuid,
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout: f64,
    /// 0 retries forever.
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: f64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            device: DeviceConfig::default(),
            bands: default_bands(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            reference_sample_rate: default_reference_sample_rate(),
            fft_size: None,
            interval: default_interval(),
            pulse_width: default_pulse_width(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            name: default_name(),
            write_characteristic: default_write_characteristic(),
            read_characteristic: default_read_characteristic(),
            scan_timeout: default_scan_timeout(),
            max_connect_attempts: default_max_connect_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

fn default_reference_sample_rate() -> u32 { 8000 }
fn default_interval() -> f64 { 0.1 }
fn default_pulse_width() -> f64 { 0.025 }
fn default_address() -> String { "24:6f:28:7a:91:76".into() }
fn default_name() -> String { "Haptic Sleeve".into() }
fn default_write_characteristic() -> Uuid { Uuid::from_u128(0xb7328f9c_c89e_4d74_9a5e_000000000002) }
fn default_read_characteristic() -> Uuid { Uuid::from_u128(0xb7328f9c_c89e_4d74_9a5e_000000000001) }
fn default_scan_timeout() -> f64 { 5.0 }
fn default_max_connect_attempts() -> u32 { 10 }
fn default_initial_backoff() -> f64 { 0.5 }
fn default_max_backoff() -> f64 { 8.0 }

impl AudioConfig {
    pub fn fft_size(&self) -> usize {
        self.fft_size.unwrap_or(self.reference_sample_rate as usize)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    pub fn pulse_width(&self) -> Duration {
        Duration::from_secs_f64(self.pulse_width)
    }
}

impl Config {
    /// Rejects anything that would make streaming meaningless. Runs before
    /// any audio is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if audio.reference_sample_rate == 0 {
            return Err(ConfigError::NonPositiveSampleRate);
        }
        if audio.fft_size() == 0 {
            return Err(ConfigError::ZeroFftSize);
        }
        if !audio.interval.is_finite() || audio.interval <= 0.0 {
            return Err(ConfigError::InvalidInterval(audio.interval));
        }
        if !audio.pulse_width.is_finite()
            || audio.pulse_width <= 0.0
            || audio.pulse_width > audio.interval
        {
            return Err(ConfigError::InvalidPulseWidth {
                pulse: audio.pulse_width,
                interval: audio.interval,
            });
        }
        validate_bands(&self.bands, audio.fft_size())?;
        let device = &self.device;
        if !is_hardware_address(&device.address) {
            return Err(ConfigError::InvalidAddress(device.address.clone()));
        }
        for (field, value) in [
            ("scan_timeout", device.scan_timeout),
            ("initial_backoff", device.initial_backoff),
            ("max_backoff", device.max_backoff),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDeviceTiming { field, value });
            }
        }
        Ok(())
    }
}

// Six colon-separated hex octets.
fn is_hardware_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.audio.fft_size(), 8000);
        assert_eq!(config.audio.interval(), Duration::from_millis(100));
        assert_eq!(config.audio.pulse_width(), Duration::from_millis(25));
        assert_eq!(config.bands.len(), 4);
        assert_eq!(
            config.device.write_characteristic.to_string(),
            "b7328f9c-c89e-4d74-9a5e-000000000002"
        );
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [audio]
            interval = 0.05

            [device]
            address = "24:0A:C4:60:97:22"
            max_connect_attempts = 0

            [[bands]]
            name = "low"
            bins = [0, 500]
            baseline = 10.0
            tiers = [1.0, 2.0, 3.0]

            [[bands]]
            name = "all"
            baseline = 5.0
            tiers = [1.0, 2.0, 3.0]
            levels = [1023, 512, 100, 0]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.audio.interval, 0.05);
        assert_eq!(config.audio.reference_sample_rate, 8000);
        assert_eq!(config.device.max_connect_attempts, 0);
        assert_eq!(config.bands[0].levels, [850, 700, 500, 0]);
        assert_eq!(config.bands[1].bins, None);
        assert_eq!(config.bands[1].levels[0], 1023);
    }

    #[test]
    fn rejects_invalid_timing() {
        let mut config = Config::default();
        config.audio.interval = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterval(0.0)));

        let mut config = Config::default();
        config.audio.pulse_width = 0.2;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPulseWidth { .. })));

        let mut config = Config::default();
        config.audio.reference_sample_rate = 0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveSampleRate));
    }

    #[test]
    fn rejects_bins_beyond_fft_size() {
        let mut config = Config::default();
        config.audio.fft_size = Some(2048);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BinRangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_bad_address() {
        let mut config = Config::default();
        config.device.address = "not-a-mac".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidAddress("not-a-mac".into()))
        );
    }

    #[test]
    fn rejects_unusable_device_timing() {
        let mut config = Config::default();
        config.device.max_backoff = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDeviceTiming { field: "max_backoff", .. })
        ));
    }
}
