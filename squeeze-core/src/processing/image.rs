// ============================================================================
// squeeze-core/src/processing/image.rs
// ============================================================================
//
// RASTER COMPRESSOR: Still-Image Fast Path
//
// Decodes common raster formats in memory, caps the long edge and walks a
// short JPEG quality ladder until the output fits. The engine is never used
// here; TIFF, oversized and undecodable inputs go to the exotic chain.
//
// AI-ASSISTANT-INFO: In-memory image downscale + JPEG quality ladder

// ---- External crate imports ----
use image::DynamicImage;

// ---- Internal crate imports ----
use super::exotic::compress_exotic;
use crate::codecs::{RasterCodec, fit_long_edge};
use crate::config::ImageConfig;
use crate::error::{CoreResult, ErrorKind, size_exceeded};
use crate::job::JobContext;
use crate::progress::{ENGINE_PROGRESS_CAP, LOADING_WEIGHT, ProgressReporter};
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::{format_budget, format_bytes, is_tiff, with_extension};

pub const JPEG_MIME: &str = "image/jpeg";

/// Whether an image skips the fast path and goes straight to the exotic chain.
#[must_use]
pub fn needs_exotic_chain(file: &SourceFile, config: &ImageConfig) -> bool {
    is_tiff(file.name(), file.mime_type()) || file.len() > config.exotic_threshold_bytes
}

/// JPEG qualities tried by the fast path, from `start` down to `floor`.
#[must_use]
pub fn quality_steps(start: f32, floor: f32, step: f32) -> Vec<f32> {
    let mut steps = vec![start];
    let mut quality = start;
    while quality > floor && step > 0.0 {
        // Rounding keeps repeated subtraction from drifting past the floor.
        quality = (((quality - step) * 1000.0).round() / 1000.0).max(floor);
        steps.push(quality);
    }
    steps
}

/// Downscales decoded images wider or taller than `max_side`.
fn guard_oversized(image: DynamicImage, max_side: u32, name: &str) -> DynamicImage {
    let long_edge = image.width().max(image.height());
    if long_edge <= max_side {
        return image;
    }
    log::info!(
        "{name}: {}x{} exceeds {max_side}px, downscaling before compression",
        image.width(),
        image.height()
    );
    fit_long_edge(&image, max_side)
}

/// Encodes `image` with the fast-path ladder. Returns the first output that fits.
pub fn fast_path(
    codec: &dyn RasterCodec,
    image: &DynamicImage,
    budget: u64,
    config: &ImageConfig,
    progress: &mut ProgressReporter<'_>,
) -> CoreResult<Vec<u8>> {
    let scaled = fit_long_edge(image, config.fast_max_side);
    let steps = quality_steps(config.fast_quality, config.fast_min_quality, config.fast_quality_step);
    let span = ENGINE_PROGRESS_CAP - LOADING_WEIGHT;

    for (i, quality) in steps.iter().copied().enumerate() {
        progress.update(
            LOADING_WEIGHT + span * i as f64 / steps.len() as f64,
            &format!("encoding JPEG (q={quality:.2})"),
        );
        let data = codec.encode_jpeg(&scaled, quality)?;
        log::debug!(
            "JPEG {}x{} at q={quality:.2}: {}",
            scaled.width(),
            scaled.height(),
            format_bytes(data.len() as u64)
        );
        if data.len() as u64 <= budget {
            return Ok(data);
        }
    }

    Err(size_exceeded(format!(
        "Exceeds {} even after downscaling.",
        format_budget(budget)
    )))
}

/// Compresses a still image under the budget.
pub fn compress_image(
    file: &SourceFile,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    if needs_exotic_chain(file, &ctx.config.image) {
        log::info!(
            "{}: TIFF or larger than {}, using the exotic-image chain",
            file.name(),
            format_bytes(ctx.config.image.exotic_threshold_bytes)
        );
        return compress_exotic(file, bytes, ctx);
    }

    ctx.checkpoint()?;
    ctx.progress.update(LOADING_WEIGHT, "decoding");
    let decoded = match ctx.services.raster().decode(bytes) {
        Ok(image) => image,
        Err(e) if e.kind() == ErrorKind::DecodeUnsupported => {
            log::info!("{}: fast-path decode failed ({e}), trying the exotic-image chain", file.name());
            return compress_exotic(file, bytes, ctx);
        }
        Err(e) => return Err(e),
    };

    let budget = ctx.budget();
    let decoded = guard_oversized(decoded, ctx.config.image.guard_max_side, file.name());
    let data = fast_path(
        ctx.services.raster(),
        &decoded,
        budget,
        &ctx.config.image,
        &mut ctx.progress,
    )?;

    log::info!("{}: compressed to {}", file.name(), format_bytes(data.len() as u64));
    ctx.progress.finish();
    CompressionResult::new(data, with_extension(file.name(), "jpg"), JPEG_MIME, None, budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::ImageCrateCodec;
    use crate::progress::NullProgressSink;
    use image::{Rgb, RgbImage};

    fn noise(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        }))
    }

    #[test]
    fn test_quality_steps() {
        let steps = quality_steps(0.75, 0.35, 0.1);
        assert_eq!(steps.len(), 5);
        for (got, want) in steps.iter().zip([0.75, 0.65, 0.55, 0.45, 0.35]) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
        assert_eq!(quality_steps(0.3, 0.35, 0.1), vec![0.3]);
    }

    #[test]
    fn test_guard_downscales_only_oversized() {
        let small = noise(64, 32);
        assert_eq!(guard_oversized(small, 100, "a.png").width(), 64);
        let large = noise(200, 100);
        let guarded = guard_oversized(large, 100, "a.png");
        assert_eq!((guarded.width(), guarded.height()), (100, 50));
    }

    #[test]
    fn test_fast_path_fits_small_image() {
        let mut sink = NullProgressSink;
        let mut progress = ProgressReporter::new(&mut sink);
        let data = fast_path(
            &ImageCrateCodec,
            &noise(64, 64),
            1_048_576,
            &ImageConfig::default(),
            &mut progress,
        )
        .unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_fast_path_exhausted() {
        let mut sink = NullProgressSink;
        let mut progress = ProgressReporter::new(&mut sink);
        let err = fast_path(
            &ImageCrateCodec,
            &noise(256, 256),
            1024,
            &ImageConfig::default(),
            &mut progress,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeExceeded);
        assert_eq!(err.to_string(), "Exceeds 1 KB even after downscaling.");
    }
}
