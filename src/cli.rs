use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tactile", about = "Stream music to a haptic wearable as multi-band vibration frames")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG), already at the reference sample rate
    pub input: PathBuf,

    /// Config file (default: ./tactile.toml or ~/.config/tactile/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device hardware address, e.g. 24:6f:28:7a:91:76
    #[arg(short, long)]
    pub address: Option<String>,

    /// Segment interval in seconds
    #[arg(long)]
    pub interval: Option<f64>,

    /// Actuation pulse width per segment in seconds
    #[arg(long)]
    pub pulse_width: Option<f64>,

    /// Connection attempts before giving up (0 = keep trying)
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Log frames instead of sending them to a device
    #[arg(long)]
    pub dry_run: bool,

    /// Print per-band power statistics as JSON and exit
    #[arg(long)]
    pub stats: bool,

    /// Do not play audio locally
    #[arg(long)]
    pub mute: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "tactile",
            "song.wav",
            "--address",
            "24:0a:c4:60:97:22",
            "--interval",
            "0.05",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("song.wav"));
        assert_eq!(cli.address.as_deref(), Some("24:0a:c4:60:97:22"));
        assert_eq!(cli.interval, Some(0.05));
        assert!(cli.dry_run);
        assert!(!cli.stats);
        assert_eq!(cli.pulse_width, None);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["tactile"]).is_err());
    }
}
