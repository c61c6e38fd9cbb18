// ============================================================================
// squeeze-core/src/processing/exotic.rs
// ============================================================================
//
// EXOTIC-IMAGE FALLBACK CHAIN: TIFF, Huge and Unusual Images
//
// An ordered list of decode strategies driven by a single loop. Each strategy
// either produces a JPEG under the budget or explains why the next one should
// run. Only recognised failure signatures move the chain forward; anything
// unexpected from the engine propagates unchanged.
//
// KEY COMPONENTS:
// - Strategy / strategy_order: which decoders run, and in what order
// - StrategyOutcome: Done(jpeg) or Continue(reason)
// - ladder_encode: long-edge and quality ladder shared by in-memory decoders
// - engine single-frame extraction with strict-demux retry and tightening
//
// AI-ASSISTANT-INFO: Ordered fallback chain for images the fast path cannot handle

// ---- Standard library imports ----
use std::fmt;

// ---- External crate imports ----
use image::DynamicImage;

// ---- Internal crate imports ----
use super::image::JPEG_MIME;
use crate::codecs::{RasterCodec, TiffKind, fit_long_edge, sniff_tiff};
use crate::config::ImageConfig;
use crate::engine::EngineCommand;
use crate::engine::args::FilterChain;
use crate::error::{CoreError, CoreResult, ErrorKind, decode_unsupported};
use crate::job::JobContext;
use crate::progress::{ENGINE_PROGRESS_CAP, LOADING_WEIGHT, ProgressReporter};
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::{extension_of, format_budget, format_bytes, with_extension};

/// Engine allocation ceiling for single-frame extraction.
const ENGINE_MAX_ALLOC: u64 = 128 * 1024 * 1024;

// ============================================================================
// STRATEGIES
// ============================================================================

/// One way of turning the input into a JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The general raster codec, in memory.
    Native,
    /// The specialised large-image decoder, in memory.
    LargeDecoder,
    /// Single-frame extraction with the codec engine.
    Engine,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native decode"),
            Self::LargeDecoder => write!(f, "large-image decoder"),
            Self::Engine => write!(f, "engine decode"),
        }
    }
}

/// Result of one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// A JPEG that fits the budget.
    Done(Vec<u8>),
    /// This strategy cannot handle the input; try the next one.
    Continue(String),
}

/// Strategy order for an input with leading bytes `head` and length `len`.
///
/// The large-image decoder runs before the engine for BigTIFF and very large
/// inputs; otherwise it is only used when the engine gives up.
#[must_use]
pub fn strategy_order(head: &[u8], len: u64, config: &ImageConfig) -> Vec<Strategy> {
    let large_first =
        sniff_tiff(head) == Some(TiffKind::Big) || len > config.large_decoder_threshold_bytes;
    if large_first {
        vec![Strategy::Native, Strategy::LargeDecoder, Strategy::Engine]
    } else {
        vec![Strategy::Native, Strategy::Engine]
    }
}

/// Tries `config.ladder_qualities` at each long edge from `ladder_max_side`
/// down to `ladder_min_side`. `Ok(None)` when no step fits.
pub fn ladder_encode(
    codec: &dyn RasterCodec,
    image: &DynamicImage,
    budget: u64,
    config: &ImageConfig,
    progress: &mut ProgressReporter<'_>,
) -> CoreResult<Option<Vec<u8>>> {
    let start = image.width().max(image.height()).min(config.ladder_max_side);
    let mut side = start;
    loop {
        let scaled = fit_long_edge(image, side);
        let shrunk = 1.0 - f64::from(side) / f64::from(start.max(1));
        progress.update(
            LOADING_WEIGHT + (ENGINE_PROGRESS_CAP - LOADING_WEIGHT) * shrunk,
            &format!("encoding JPEG (max {side}px)"),
        );
        for &quality in &config.ladder_qualities {
            let data = codec.encode_jpeg(&scaled, quality)?;
            if data.len() as u64 <= budget {
                log::debug!(
                    "Ladder fit at {side}px, q={quality:.2}: {}",
                    format_bytes(data.len() as u64)
                );
                return Ok(Some(data));
            }
        }
        if side <= config.ladder_min_side {
            return Ok(None);
        }
        side = ((f64::from(side) * config.ladder_shrink).floor() as u32).max(config.ladder_min_side);
    }
}

/// Runs the ladder on a decode result, mapping decode failures to `Continue`.
fn in_memory(
    decoded: CoreResult<DynamicImage>,
    ctx: &mut JobContext<'_>,
) -> CoreResult<StrategyOutcome> {
    let image = match decoded {
        Ok(image) => image,
        Err(e) if e.kind() == ErrorKind::DecodeUnsupported => {
            return Ok(StrategyOutcome::Continue(e.to_string()));
        }
        Err(e) => return Err(e),
    };
    let budget = ctx.budget();
    match ladder_encode(ctx.services.raster(), &image, budget, &ctx.config.image, &mut ctx.progress)? {
        Some(data) => Ok(StrategyOutcome::Done(data)),
        None => Ok(StrategyOutcome::Continue(format!(
            "even {}px at the lowest quality exceeds {}",
            ctx.config.image.ladder_min_side,
            format_budget(budget)
        ))),
    }
}

// ============================================================================
// ENGINE STRATEGY
// ============================================================================

/// Single-frame JPEG extraction with the long edge capped at `side`.
///
/// `strict` forces the single-image demuxer with larger probe sizes, for
/// inputs the format autodetection cannot make sense of.
#[must_use]
pub fn frame_command(
    input: &str,
    output: &str,
    side: u32,
    qscale: u32,
    budget: u64,
    strict: bool,
) -> EngineCommand {
    let (probesize, analyzeduration) = if strict { ("20M", "400M") } else { ("10M", "200M") };
    let mut cmd = EngineCommand::new(input, output)
        .input_opt("-max_alloc", ENGINE_MAX_ALLOC)
        .input_opt("-probesize", probesize)
        .input_opt("-analyzeduration", analyzeduration);
    if strict {
        cmd = cmd.input_opt("-f", "image2").input_opt("-pattern_type", "none");
    }
    cmd.opt("-frames:v", 1)
        .opt("-vf", FilterChain::new().cap_long_edge(side).build())
        .opt("-sws_flags", "fast_bilinear")
        .opt("-pix_fmt", "yuvj420p")
        .opt("-q:v", qscale)
        .max_output_bytes(budget)
        .opt("-f", "mjpeg")
}

/// Next `(side, qscale)` after an oversized engine output.
#[must_use]
pub fn tighten_frame(side: u32, qscale: u32, config: &ImageConfig) -> (u32, u32) {
    if qscale < config.engine_max_qscale {
        (side, qscale + 3)
    } else {
        let side = (f64::from(side) * 0.85).floor() as u32;
        (side.max(config.engine_min_side), qscale)
    }
}

/// Where the engine strategy goes when it cannot finish.
fn engine_gave_up(
    reason: String,
    large_decoder_tried: &mut bool,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<StrategyOutcome> {
    if *large_decoder_tried {
        return Ok(StrategyOutcome::Continue(reason));
    }
    log::info!("{reason}; trying the large-image decoder");
    *large_decoder_tried = true;
    let decoded = ctx.services.large_decoder().decode(bytes);
    match in_memory(decoded, ctx)? {
        StrategyOutcome::Continue(why) => Ok(StrategyOutcome::Continue(format!(
            "{reason}; large-image decoder: {why}"
        ))),
        done => Ok(done),
    }
}

fn engine_strategy(
    file: &SourceFile,
    bytes: &[u8],
    large_decoder_tried: &mut bool,
    ctx: &mut JobContext<'_>,
) -> CoreResult<StrategyOutcome> {
    let config = ctx.config.image.clone();
    let budget = ctx.budget();

    if file.len() > config.engine_stall_threshold_bytes {
        let reason = format!(
            "{} at {} is likely to stall the codec engine",
            file.name(),
            format_bytes(file.len())
        );
        return engine_gave_up(reason, large_decoder_tried, bytes, ctx);
    }

    let engine = ctx.engine()?;
    let mut scratch = ctx.scratch(&engine);
    let ext = extension_of(file.name()).unwrap_or_else(|| "tiff".to_string());
    let input = scratch.write(&format!("in.{ext}"), bytes)?;

    let mut side = config.engine_start_side;
    let mut qscale = config.engine_start_qscale;
    let mut strict = false;
    let mut last_len = None;

    for pass in 1..=config.engine_max_passes {
        ctx.checkpoint()?;
        let output = scratch.clear("out.jpg")?;
        let phase = format!("decoding & scaling (q={qscale}, max={side}px)");

        let mut result = {
            let cmd = frame_command(&input, &output, side, qscale, budget, strict);
            let progress = &mut ctx.progress;
            engine.exec(&cmd, &mut |raw| {
                progress.engine(LOADING_WEIGHT, raw, &phase);
            })
        };
        if !strict {
            if let Err(CoreError::DecodeUnsupported(msg)) = &result {
                log::info!("{}: engine found no image stream ({msg}), retrying with strict demux", file.name());
                strict = true;
            }
            if strict {
                scratch.clear("out.jpg")?;
                let cmd = frame_command(&input, &output, side, qscale, budget, strict);
                let progress = &mut ctx.progress;
                result = engine.exec(&cmd, &mut |raw| {
                    progress.engine(LOADING_WEIGHT, raw, &phase);
                });
            }
        }

        match result {
            Ok(()) => {}
            Err(CoreError::DecodeUnsupported(msg)) => {
                let reason = format!("engine could not find an image stream: {msg}");
                return engine_gave_up(reason, large_decoder_tried, bytes, ctx);
            }
            Err(CoreError::OutOfMemory(msg)) => {
                let reason = format!("engine ran out of memory: {msg}");
                return engine_gave_up(reason, large_decoder_tried, bytes, ctx);
            }
            Err(e) => return Err(e),
        }

        let data = match scratch.read(&output)? {
            Some(data) if !data.is_empty() => data,
            _ => {
                let reason = "engine produced no output".to_string();
                return engine_gave_up(reason, large_decoder_tried, bytes, ctx);
            }
        };

        if data.len() as u64 <= budget {
            log::debug!(
                "{}: engine pass {pass} fits ({})",
                file.name(),
                format_bytes(data.len() as u64)
            );
            return Ok(StrategyOutcome::Done(data));
        }
        log::debug!(
            "{}: engine pass {pass} at q={qscale}, {side}px is {}, tightening",
            file.name(),
            format_bytes(data.len() as u64)
        );
        last_len = Some(data.len() as u64);
        (side, qscale) = tighten_frame(side, qscale, &config);
    }

    Ok(StrategyOutcome::Continue(format!(
        "engine output stayed above {} after {} passes{}",
        format_budget(budget),
        config.engine_max_passes,
        last_len.map_or(String::new(), |n| format!(" (last {})", format_bytes(n)))
    )))
}

// ============================================================================
// DRIVER
// ============================================================================

/// Compresses an image through the fallback chain.
pub fn compress_exotic(
    file: &SourceFile,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    let budget = ctx.budget();
    let head = &bytes[..bytes.len().min(16)];
    let order = strategy_order(head, file.len(), &ctx.config.image);
    log::debug!("{}: exotic chain order {:?}", file.name(), order);

    let mut large_decoder_tried = false;
    let mut reasons = Vec::new();
    for strategy in order {
        ctx.checkpoint()?;
        let outcome = match strategy {
            Strategy::Native => {
                let decoded = ctx.services.raster().decode(bytes);
                in_memory(decoded, ctx)?
            }
            Strategy::LargeDecoder => {
                large_decoder_tried = true;
                let decoded = ctx.services.large_decoder().decode(bytes);
                in_memory(decoded, ctx)?
            }
            Strategy::Engine => engine_strategy(file, bytes, &mut large_decoder_tried, ctx)?,
        };

        match outcome {
            StrategyOutcome::Done(data) => {
                log::info!(
                    "{}: {strategy} produced {}",
                    file.name(),
                    format_bytes(data.len() as u64)
                );
                ctx.progress.finish();
                return CompressionResult::new(
                    data,
                    with_extension(file.name(), "jpg"),
                    JPEG_MIME,
                    None,
                    budget,
                );
            }
            StrategyOutcome::Continue(reason) => {
                log::info!("{}: {strategy} failed: {reason}", file.name());
                reasons.push(format!("{strategy}: {reason}"));
            }
        }
    }

    log::warn!("{}: every image strategy failed", file.name());
    Err(decode_unsupported(format!(
        "{} is unsuitable for in-environment conversion under {}. Export it as JPEG or PNG and try again. ({})",
        file.name(),
        format_budget(budget),
        reasons.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::ImageCrateCodec;
    use crate::progress::NullProgressSink;

    #[test]
    fn test_strategy_order() {
        let config = ImageConfig::default();
        let classic = b"II*\0\x08\0\0\0";
        let big = b"II+\0\x08\0\0\0";
        assert_eq!(
            strategy_order(classic, 1024, &config),
            vec![Strategy::Native, Strategy::Engine]
        );
        assert_eq!(
            strategy_order(big, 1024, &config),
            vec![Strategy::Native, Strategy::LargeDecoder, Strategy::Engine]
        );
        assert_eq!(
            strategy_order(classic, 150 * 1024 * 1024, &config),
            vec![Strategy::Native, Strategy::LargeDecoder, Strategy::Engine]
        );
    }

    #[test]
    fn test_tighten_frame_raises_qscale_then_shrinks() {
        let config = ImageConfig::default();
        let mut state = (1600, 8);
        let mut seen = Vec::new();
        for _ in 0..6 {
            state = tighten_frame(state.0, state.1, &config);
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![(1600, 11), (1600, 14), (1600, 17), (1600, 20), (1360, 20), (1156, 20)]
        );
        assert_eq!(tighten_frame(700, 20, &config), (640, 20));
    }

    #[test]
    fn test_frame_command_strict_demux() {
        let cmd = frame_command("j_in.tiff", "j_out.jpg", 1600, 8, 1_048_576, true);
        let args = cmd.to_args(&[]);
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(args[..i].windows(2).any(|w| w[0] == "-f" && w[1] == "image2"));
        assert!(args[..i].windows(2).any(|w| w[0] == "-probesize" && w[1] == "20M"));
        assert_eq!(cmd.value_of("-fs"), Some("1048576"));
        assert_eq!(cmd.value_of("-q:v"), Some("8"));
        assert_eq!(cmd.value_of("-f"), Some("mjpeg"));

        let relaxed = frame_command("j_in.tiff", "j_out.jpg", 1600, 8, 1_048_576, false);
        assert!(!relaxed.to_args(&[]).contains(&"image2".to_string()));
    }

    #[test]
    fn test_ladder_shrinks_to_floor() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_fn(600, 300, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        }));
        let mut sink = NullProgressSink;
        let mut progress = ProgressReporter::new(&mut sink);
        let config = ImageConfig::default();

        let fits = ladder_encode(&ImageCrateCodec, &image, 1_048_576, &config, &mut progress).unwrap();
        assert!(fits.is_some());

        let none = ladder_encode(&ImageCrateCodec, &image, 100, &config, &mut progress).unwrap();
        assert!(none.is_none());
    }
}
