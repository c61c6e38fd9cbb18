// ============================================================================
// squeeze-core/src/processing/generic.rs
// ============================================================================
//
// GENERIC FILE HANDLER: Passthrough or Streaming Gzip
//
// Files that already fit, and previewable text-like files, are passed through
// byte for byte. Everything else is streamed through gzip in fixed-size
// chunks, and the stream is abandoned as soon as the compressed output alone
// is over the budget.
//
// AI-ASSISTANT-INFO: Passthrough and early-abort gzip for non-media files

// ---- Standard library imports ----
use std::io::{ErrorKind as IoErrorKind, Read, Write};

// ---- External crate imports ----
use flate2::Compression;
use flate2::write::GzEncoder;

// ---- Internal crate imports ----
use crate::error::{CoreResult, size_exceeded};
use crate::job::JobContext;
use crate::progress::{ENGINE_PROGRESS_CAP, ProgressReporter};
use crate::result::{CompressionResult, ContentEncoding};
use crate::source::SourceFile;
use crate::utils::{format_budget, format_bytes, is_previewable_mime, is_text_like};

/// MIME type recorded for outputs whose declared type is empty.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Whether a file is shown inline by clients and must never be gzip-wrapped.
#[must_use]
pub fn is_previewable(file: &SourceFile) -> bool {
    is_previewable_mime(file.mime_type()) || is_text_like(file.name(), file.mime_type())
}

/// Gzips `reader` in `chunk_bytes` chunks, failing as soon as the compressed
/// output exceeds `budget`.
///
/// `total` is the expected input length, used only for progress.
pub fn gzip_within_budget<R: Read>(
    mut reader: R,
    total: u64,
    budget: u64,
    chunk_bytes: usize,
    level: u32,
    progress: &mut ProgressReporter<'_>,
) -> CoreResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    let mut chunk = vec![0u8; chunk_bytes.max(1)];
    let mut read_total: u64 = 0;
    let early_abort = || {
        size_exceeded(format!(
            "Exceeds {} even after gzip (early abort).",
            format_budget(budget)
        ))
    };

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        encoder.write_all(&chunk[..n])?;
        read_total += n as u64;

        let compressed = encoder.get_ref().len() as u64;
        if compressed > budget {
            log::info!(
                "gzip aborted after {} of input: output already {}",
                format_bytes(read_total),
                format_bytes(compressed)
            );
            return Err(early_abort());
        }
        progress.update(
            ENGINE_PROGRESS_CAP * read_total as f64 / total.max(1) as f64,
            "gzipping",
        );
    }

    let data = encoder.finish()?;
    if data.len() as u64 > budget {
        return Err(early_abort());
    }
    Ok(data)
}

/// Handles any file that is not image, audio or video.
pub fn compress_generic(
    file: &SourceFile,
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    let budget = ctx.budget();
    let mime = if file.mime_type().trim().is_empty() {
        FALLBACK_MIME.to_string()
    } else {
        file.mime_type().to_string()
    };

    let previewable = is_previewable(file);
    if file.len() <= budget || previewable {
        if file.len() > budget {
            return Err(size_exceeded(format!(
                "{} is {}, over the {} limit, and previewable files are sent unmodified.",
                file.name(),
                format_bytes(file.len()),
                format_budget(budget)
            )));
        }
        let payload = file.read_all(ctx.config.engine.read_chunk_bytes, &mut ctx.progress)?;
        log::info!("{}: passthrough ({})", file.name(), format_bytes(payload.len() as u64));
        ctx.progress.finish();
        return CompressionResult::new(payload, file.name(), mime, None, budget);
    }

    ctx.checkpoint()?;
    let data = gzip_within_budget(
        file.open()?,
        file.len(),
        budget,
        ctx.config.generic.chunk_bytes,
        ctx.config.generic.level,
        &mut ctx.progress,
    )?;
    log::info!(
        "{}: gzipped {} to {}",
        file.name(),
        format_bytes(file.len()),
        format_bytes(data.len() as u64)
    );
    ctx.progress.finish();
    CompressionResult::new(
        data,
        format!("{}.gz", file.name()),
        mime,
        Some(ContentEncoding::Gzip),
        budget,
    )
}
