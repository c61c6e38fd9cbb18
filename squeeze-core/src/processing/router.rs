// ============================================================================
// squeeze-core/src/processing/router.rs
// ============================================================================
//
// FORMAT ROUTER: One Compressor per File
//
// Dispatches each file on its declared MIME type to exactly one compressor
// and runs batches of files concurrently, feeding the pending-attachment list.
//
// KEY COMPONENTS:
// - Route / route_for: MIME based dispatch
// - Pipeline: configuration plus shared services; compresses one file
// - compress_batch: one rayon task per file with per-file progress
//
// AI-ASSISTANT-INFO: Format router and batch runner

// ---- Standard library imports ----
use std::fmt;

// ---- External crate imports ----
use rayon::prelude::*;

// ---- Internal crate imports ----
use super::audio::compress_audio;
use super::exotic::compress_exotic;
use super::generic::compress_generic;
use super::image::{compress_image, needs_exotic_chain};
use super::video::compress_video;
use crate::attachments::{PendingAttachments, TempId};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::job::{CancelToken, JobContext, Services};
use crate::progress::{PHASE_STARTING, ProgressSink};
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::{base_mime, format_bytes};

/// The compressor a file is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Video,
    Audio,
    /// Raster fast path, falling back to the exotic chain on decode failure.
    Image,
    /// TIFF or oversized images, straight into the fallback chain.
    ExoticImage,
    Generic,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Image => write!(f, "image"),
            Self::ExoticImage => write!(f, "exotic image"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Picks the compressor for `file` from its declared MIME type.
#[must_use]
pub fn route_for(file: &SourceFile, config: &Config) -> Route {
    let mime = base_mime(file.mime_type());
    if mime.starts_with("video/") {
        Route::Video
    } else if mime.starts_with("audio/") {
        Route::Audio
    } else if mime.starts_with("image/") {
        if needs_exotic_chain(file, &config.image) {
            Route::ExoticImage
        } else {
            Route::Image
        }
    } else {
        Route::Generic
    }
}

/// Outcome of one file in a batch. Successful results stay in the
/// [`PendingAttachments`] list until drained.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub temp_id: TempId,
    pub name: String,
    /// The user-facing failure message, `None` on success.
    pub error: Option<String>,
}

/// The compression pipeline: configuration plus shared services.
pub struct Pipeline {
    config: Config,
    services: Services,
}

impl Pipeline {
    /// Production pipeline; the engine is loaded by the first job needing it.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let services = Services::new(&config);
        Self { config, services }
    }

    /// Pipeline with explicit services, e.g. a fake engine in tests.
    #[must_use]
    pub fn with_services(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Compresses one file under the configured budget.
    pub fn compress(
        &self,
        file: &SourceFile,
        sink: &mut dyn ProgressSink,
        cancel: CancelToken,
    ) -> CoreResult<CompressionResult> {
        let mut ctx = JobContext::new(&self.config, &self.services, sink, cancel);
        ctx.progress.update(0.0, PHASE_STARTING);
        ctx.checkpoint()?;
        let route = route_for(file, &self.config);
        log::info!(
            target: "squeeze::router",
            "{} ({}, {}) -> {route} [{}]",
            file.name(),
            if file.mime_type().is_empty() { "no type" } else { file.mime_type() },
            format_bytes(file.len()),
            ctx.job_id
        );

        let result = match route {
            Route::Generic => compress_generic(file, &mut ctx),
            media => {
                let bytes = file.read_all(self.config.engine.read_chunk_bytes, &mut ctx.progress)?;
                ctx.checkpoint()?;
                match media {
                    Route::Video => compress_video(file, &bytes, &mut ctx),
                    Route::Audio => compress_audio(file, &bytes, &mut ctx),
                    Route::ExoticImage => compress_exotic(file, &bytes, &mut ctx),
                    _ => compress_image(file, &bytes, &mut ctx),
                }
            }
        };

        match &result {
            Ok(out) => log::info!(
                target: "squeeze::router",
                "{} -> {} ({}, {})",
                file.name(),
                out.filename(),
                out.mime_type(),
                format_bytes(out.len() as u64)
            ),
            Err(e) => log::warn!(target: "squeeze::router", "{} failed: {e}", file.name()),
        }
        result
    }

    /// Compresses every file concurrently, one job per file.
    ///
    /// Each file gets a placeholder in `attachments` that tracks its progress
    /// and, on success, holds its result. `jobs` bounds the number of files in
    /// flight (rayon's default when `None`).
    pub fn compress_batch(
        &self,
        files: &[SourceFile],
        attachments: &PendingAttachments,
        cancel: &CancelToken,
        jobs: Option<usize>,
    ) -> CoreResult<Vec<BatchOutcome>> {
        let ids: Vec<TempId> = files.iter().map(|f| attachments.begin(f.name())).collect();

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = jobs {
            builder = builder.num_threads(n.max(1));
        }
        let pool = builder
            .build()
            .map_err(|e| CoreError::Config(format!("Failed to initialize thread pool: {e}")))?;
        log::info!(
            target: "squeeze::router",
            "Compressing {} file(s) with {} concurrent job(s)",
            files.len(),
            pool.current_num_threads()
        );

        let outcomes = pool.install(|| {
            files
                .par_iter()
                .zip(ids.par_iter())
                .map(|(file, &temp_id)| self.run_one(file, temp_id, attachments, cancel))
                .collect()
        });
        Ok(outcomes)
    }

    fn run_one(
        &self,
        file: &SourceFile,
        temp_id: TempId,
        attachments: &PendingAttachments,
        cancel: &CancelToken,
    ) -> BatchOutcome {
        let mut sink = |fraction: f64, phase: &str| {
            // The placeholder may have been removed by the user meanwhile.
            if let Err(e) = attachments.update_progress(temp_id, fraction, phase) {
                log::debug!("Dropping progress for {temp_id}: {e}");
            }
        };

        let error = match self.compress(file, &mut sink, cancel.clone()) {
            Ok(result) => attachments.complete(temp_id, result).err().map(|e| e.to_string()),
            Err(e) => Some(
                attachments
                    .fail(temp_id, &e)
                    .unwrap_or_else(|_| format!("{}: {e}", file.name())),
            ),
        };

        BatchOutcome {
            temp_id,
            name: file.name().to_string(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str) -> SourceFile {
        SourceFile::from_bytes(name, mime, vec![0u8; 16])
    }

    #[test]
    fn test_route_for_mime_families() {
        let config = Config::default();
        assert_eq!(route_for(&file("a.mp4", "video/mp4"), &config), Route::Video);
        assert_eq!(route_for(&file("a.ogg", "Audio/Ogg; codecs=opus"), &config), Route::Audio);
        assert_eq!(route_for(&file("a.png", "image/png"), &config), Route::Image);
        assert_eq!(route_for(&file("a.tif", "image/tiff"), &config), Route::ExoticImage);
        assert_eq!(route_for(&file("a.zip", "application/zip"), &config), Route::Generic);
        assert_eq!(route_for(&file("a.mp4", ""), &config), Route::Generic);
    }

    #[test]
    fn test_large_images_skip_fast_path() {
        let mut config = Config::default();
        config.image.exotic_threshold_bytes = 8;
        assert_eq!(route_for(&file("a.png", "image/png"), &config), Route::ExoticImage);
    }
}
