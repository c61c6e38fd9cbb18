//! Audio planner and encoder.
//!
//! The bitrate is planned from the duration so the whole track fits the
//! budget, then the engine encodes mono Opus in WebM with `-fs` as a hard cap.
//! Outputs that still overshoot are re-encoded at a lower bitrate a bounded
//! number of times.

use crate::config::AudioConfig;
use crate::engine::EngineCommand;
use crate::error::{CoreError, CoreResult, size_exceeded};
use crate::job::JobContext;
use crate::progress::LOADING_WEIGHT;
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::{extension_of, format_budget, format_bytes, with_extension};

pub const AUDIO_MIME: &str = "audio/webm";

/// Shortest duration the planner divides by.
const MIN_PLANNING_SECS: f64 = 0.5;

/// Bitrate that spreads the budget (less container overhead) over `duration`.
///
/// An unknown duration is taken as `config.default_duration_secs`. The result
/// is clamped to `[min_kbps, max_kbps]`.
#[must_use]
pub fn plan_audio_kbps(duration: Option<f64>, budget: u64, config: &AudioConfig) -> u32 {
    let duration = duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(config.default_duration_secs)
        .max(MIN_PLANNING_SECS);
    let bits = budget.saturating_sub(config.overhead_bytes) as f64 * 8.0;
    let kbps = (bits / duration / 1000.0).floor();
    (kbps as u32).clamp(config.min_kbps, config.max_kbps)
}

/// Bitrate for the next attempt after an oversized output.
#[must_use]
pub fn retry_kbps(kbps: u32, config: &AudioConfig) -> u32 {
    ((f64::from(kbps) * config.retry_shrink).floor() as u32).max(config.min_kbps)
}

fn encode_command(input: &str, output: &str, kbps: u32, budget: u64, config: &AudioConfig) -> EngineCommand {
    EngineCommand::new(input, output)
        .flag("-vn")
        .opt("-ac", 1)
        .opt("-ar", config.sample_rate)
        .opt("-c:a", "libopus")
        .opt("-b:a", format!("{kbps}k"))
        .max_output_bytes(budget)
        .opt("-f", "webm")
}

/// Compresses an audio file under the budget.
pub fn compress_audio(
    file: &SourceFile,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    let budget = ctx.budget();
    let config = ctx.config.audio.clone();

    let engine = ctx.engine()?;
    let mut scratch = ctx.scratch(&engine);
    let ext = extension_of(file.name()).unwrap_or_else(|| "dat".to_string());
    let input = scratch.write(&format!("in.{ext}"), bytes)?;
    let duration = engine.probe(&input)?.duration_secs;

    let mut kbps = plan_audio_kbps(duration, budget, &config);
    log::info!(
        "{}: duration {}, planned {kbps} kbps",
        file.name(),
        duration.map_or("unknown".to_string(), |d| format!("{d:.1}s"))
    );

    for attempt in 0..=config.max_retries {
        ctx.checkpoint()?;
        if attempt > 0 {
            kbps = retry_kbps(kbps, &config);
            log::info!("{}: retry {attempt} at {kbps} kbps", file.name());
        }

        let output = scratch.clear("out.webm")?;
        let cmd = encode_command(&input, &output, kbps, budget, &config);
        let phase = format!("encoding {kbps}kbps");
        {
            let progress = &mut ctx.progress;
            engine.exec(&cmd, &mut |raw| {
                progress.engine(LOADING_WEIGHT, raw, &phase);
            })?;
        }

        let data = scratch.read(&output)?.ok_or_else(|| CoreError::Engine {
            message: format!("engine produced no output for {output}"),
            log_tail: String::new(),
        })?;
        if data.len() as u64 <= budget {
            log::info!("{}: encoded to {}", file.name(), format_bytes(data.len() as u64));
            ctx.progress.finish();
            return CompressionResult::new(
                data,
                with_extension(file.name(), "webm"),
                AUDIO_MIME,
                None,
                budget,
            );
        }
        log::debug!(
            "{}: {kbps} kbps produced {}, over budget",
            file.name(),
            format_bytes(data.len() as u64)
        );
    }

    Err(size_exceeded(format!(
        "Audio exceeds {} even after multiple passes.",
        format_budget(budget)
    )))
}
