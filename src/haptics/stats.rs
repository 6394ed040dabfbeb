use rayon::prelude::*;
use serde::Serialize;

use super::calibrate::Factor;
use super::pipeline::HapticPipeline;
use super::quantize::quantize;
use crate::audio::AudioBuffer;
use crate::error::AnalysisError;

/// Distribution of per-segment band power over a whole track, for tuning
/// tiers against new material.
#[derive(Debug, Serialize)]
pub struct TrackStats {
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub segments: usize,
    pub bands: Vec<BandStats>,
}

#[derive(Debug, Serialize)]
pub struct BandStats {
    pub name: String,
    pub factor: Factor,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    /// Segments per output level, ordered like the band's `levels`.
    pub level_counts: [usize; 4],
}

pub fn track_stats(
    pipeline: &HapticPipeline,
    audio: &AudioBuffer,
) -> Result<TrackStats, AnalysisError> {
    let per_segment: Vec<Vec<f64>> = pipeline
        .segments()
        .par_iter()
        .map(|segment| pipeline.band_powers(audio, segment))
        .collect::<Result<_, _>>()?;

    let bands = pipeline
        .bands()
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let mut powers: Vec<f64> = per_segment.iter().map(|p| p[i]).collect();
            let factor = pipeline.factors().get(&band.name).unwrap_or(Factor::NoSignal);

            let mut level_counts = [0usize; 4];
            for &p in &powers {
                let level = quantize(p, band, factor);
                if let Some(slot) = band.levels.iter().position(|&l| l == level) {
                    level_counts[slot] += 1;
                }
            }

            powers.sort_by(|a, b| a.total_cmp(b));
            let mean = if powers.is_empty() {
                0.0
            } else {
                powers.iter().sum::<f64>() / powers.len() as f64
            };
            BandStats {
                name: band.name.clone(),
                factor,
                mean,
                median: median(&powers),
                max: powers.last().copied().unwrap_or(0.0),
                level_counts,
            }
        })
        .collect();

    Ok(TrackStats {
        sample_rate: audio.sample_rate,
        duration_secs: audio.duration_secs(),
        segments: pipeline.segments().len(),
        bands,
    })
}

// Expects sorted input.
fn median(sorted: &[f64]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => (sorted[n / 2 - 1] + sorted[n / 2]) * 0.5,
    }
}
