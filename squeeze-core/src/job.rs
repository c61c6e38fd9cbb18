//! Per-job context: configuration, shared services, cancellation and progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::codecs::{ImageCrateCodec, LargeImageDecoder, RasterCodec, TiffDecoder};
use crate::config::{Config, EngineConfig};
use crate::engine::{EngineHandle, ScratchSpace, load};
use crate::error::{CoreError, CoreResult};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::temp_files::new_job_id;

/// Cooperative cancellation flag shared between a job and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

enum EngineSource {
    Lazy(EngineConfig),
    Ready(Arc<EngineHandle>),
}

/// Collaborators shared by every job: the engine and the image codecs.
///
/// The engine is only loaded when a job first needs it, so raster and
/// generic jobs never start ffmpeg.
pub struct Services {
    engine: EngineSource,
    raster: Arc<dyn RasterCodec>,
    large_decoder: Arc<dyn LargeImageDecoder>,
}

impl Services {
    /// Production services; the engine is loaded on first use.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            engine: EngineSource::Lazy(config.engine.clone()),
            raster: Arc::new(ImageCrateCodec),
            large_decoder: Arc::new(TiffDecoder),
        }
    }

    /// Services around an already constructed engine.
    #[must_use]
    pub fn with_engine(engine: Arc<EngineHandle>) -> Self {
        Self {
            engine: EngineSource::Ready(engine),
            raster: Arc::new(ImageCrateCodec),
            large_decoder: Arc::new(TiffDecoder),
        }
    }

    #[must_use]
    pub fn raster_codec(mut self, codec: Arc<dyn RasterCodec>) -> Self {
        self.raster = codec;
        self
    }

    #[must_use]
    pub fn large_image_decoder(mut self, decoder: Arc<dyn LargeImageDecoder>) -> Self {
        self.large_decoder = decoder;
        self
    }

    pub fn engine(&self) -> CoreResult<Arc<EngineHandle>> {
        match &self.engine {
            EngineSource::Ready(handle) => Ok(Arc::clone(handle)),
            EngineSource::Lazy(config) => load(config),
        }
    }

    #[must_use]
    pub fn raster(&self) -> &dyn RasterCodec {
        self.raster.as_ref()
    }

    #[must_use]
    pub fn large_decoder(&self) -> &dyn LargeImageDecoder {
        self.large_decoder.as_ref()
    }
}

/// Everything a compressor needs for one job.
pub struct JobContext<'a> {
    pub config: &'a Config,
    pub services: &'a Services,
    pub job_id: String,
    pub cancel: CancelToken,
    pub progress: ProgressReporter<'a>,
}

impl<'a> JobContext<'a> {
    pub fn new(
        config: &'a Config,
        services: &'a Services,
        sink: &'a mut dyn ProgressSink,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            services,
            job_id: new_job_id(),
            cancel,
            progress: ProgressReporter::new(sink),
        }
    }

    #[must_use]
    pub fn budget(&self) -> u64 {
        self.config.budget.bytes
    }

    /// Returns `Err(Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> CoreResult<()> {
        self.cancel.check()
    }

    /// Loads the engine if needed.
    pub fn engine(&self) -> CoreResult<Arc<EngineHandle>> {
        self.services.engine()
    }

    /// Scratch space for this job on `engine`.
    pub fn scratch<'e>(&self, engine: &'e EngineHandle) -> ScratchSpace<'e> {
        ScratchSpace::new(engine, &self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert_eq!(token.check().unwrap_err().kind(), ErrorKind::Cancelled);
    }
}
