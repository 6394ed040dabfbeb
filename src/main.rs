mod audio;
mod cli;
mod config;
mod error;
mod haptics;
mod stream;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use audio::AudioBuffer;
use cli::Cli;
use config::Config;
use haptics::HapticPipeline;
use stream::ble::BleTransport;
use stream::control::{pause_channel, toggle_on_lines};
use stream::playback::{AudioSink, NullSink};
use error::StreamError;
use stream::{
    connect_with_retry, LogTransport, RetryPolicy, Scheduler, StreamReport, Timing, Transport,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect tactile.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("tactile.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("tactile").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("tactile").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut cfg = match config_path {
        Some(ref path) => {
            let cfg = config::load_config(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    // CLI flags win over the config file
    if let Some(address) = &cli.address {
        cfg.device.address = address.clone();
    }
    if let Some(interval) = cli.interval {
        cfg.audio.interval = interval;
    }
    if let Some(pulse_width) = cli.pulse_width {
        cfg.audio.pulse_width = pulse_width;
    }
    if let Some(attempts) = cli.connect_attempts {
        cfg.device.max_connect_attempts = attempts;
    }
    cfg.validate().context("Invalid configuration")?;

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("tactile - music to haptics");
    log::info!("  Input: {}", cli.input.display());
    log::info!(
        "  Bands: {}",
        cfg.bands
            .iter()
            .map(|b| b.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    log::info!("Decoding audio...");
    let audio = audio::decode::decode_audio(&cli.input)?;
    audio.ensure_sample_rate(cfg.audio.reference_sample_rate)?;

    log::info!("Calibrating...");
    let pipeline = HapticPipeline::calibrate(&audio, &cfg.audio, cfg.bands.clone())?;

    if cli.stats {
        let stats = haptics::stats::track_stats(&pipeline, &audio)?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let timing = Timing {
        interval: cfg.audio.interval(),
        pulse_width: cfg.audio.pulse_width(),
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, stopping");
            interrupt.cancel();
        }
    });

    let (pause, pause_rx) = pause_channel();
    let toggler = pause.clone();
    std::thread::spawn(move || toggle_on_lines(std::io::stdin().lock(), toggler));
    log::info!("Press Enter to pause/resume, Ctrl+C to stop");

    let sink = open_sink(cli.mute);

    if cli.dry_run {
        log::info!("Dry run: frames are logged, not sent");
        let transport = LogTransport::new(pipeline.codec().clone());
        let (_, outcome) =
            run_stream(&pipeline, &audio, transport, sink, timing, pause_rx, cancel).await?;
        summarize(&outcome?);
    } else {
        let device = &cfg.device;
        let policy = RetryPolicy::from_config(device);
        log::info!("Connecting to {} ({})...", device.name, device.address);
        let transport = tokio::select! {
            connected = connect_with_retry(&device.address, &policy, || BleTransport::connect(device)) => connected?,
            _ = cancel.cancelled() => anyhow::bail!("Interrupted while connecting to {}", device.address),
        };
        let (transport, outcome) =
            run_stream(&pipeline, &audio, transport, sink, timing, pause_rx, cancel).await?;
        // Release the link whether or not the stream finished.
        if let Err(e) = transport.disconnect().await {
            log::warn!("Failed to disconnect from {}: {}", device.address, e);
        }
        summarize(&outcome?);
    }

    drop(pause);
    Ok(())
}

fn open_sink(mute: bool) -> Box<dyn AudioSink> {
    if mute {
        return Box::new(NullSink);
    }
    #[cfg(feature = "playback")]
    {
        match stream::playback::CpalSink::open() {
            Ok(sink) => return Box::new(sink),
            Err(e) => log::warn!("Audio playback unavailable, continuing muted: {:#}", e),
        }
    }
    Box::new(NullSink)
}

async fn run_stream<T: Transport>(
    pipeline: &HapticPipeline,
    audio: &AudioBuffer,
    transport: T,
    sink: Box<dyn AudioSink>,
    timing: Timing,
    pause: watch::Receiver<bool>,
    cancel: CancellationToken,
) -> Result<(T, std::result::Result<StreamReport, StreamError>)> {
    let pb = ProgressBar::new(pipeline.segments().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} segments ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let mut scheduler =
        Scheduler::new(pipeline, audio, transport, sink, timing, pause, cancel).with_progress(pb);
    let outcome = scheduler.run().await;
    Ok((scheduler.into_transport(), outcome))
}

fn summarize(report: &StreamReport) {
    if report.timing_misses > 0 {
        log::warn!(
            "{} of {} segments overran their interval; a longer --interval keeps frames on time",
            report.timing_misses,
            report.segments_sent
        );
    }
}
