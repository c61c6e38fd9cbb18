// ============================================================================
// squeeze-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for Config
//
// This module implements the builder pattern for the Config structure,
// providing a fluent API for the settings callers change most often. Anything
// not covered here can be set on the built Config directly.
//
// KEY COMPONENTS:
// - ConfigBuilder: Builder struct for creating Config instances
//
// AI-ASSISTANT-INFO: Builder pattern implementation for Config

// ---- Standard library imports ----
use std::path::PathBuf;

// ---- Internal crate imports ----
use super::{Config, VideoMode};
use crate::error::CoreResult;

/// Builder for creating Config instances.
///
/// # Examples
///
/// ```rust
/// use squeeze_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .byte_budget(2 * 1024 * 1024)
///     .engine_threads(1)
///     .build();
/// assert_eq!(config.engine.threads, Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new ConfigBuilder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from a file.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Sets the hard byte budget.
    #[must_use]
    pub fn byte_budget(mut self, bytes: u64) -> Self {
        self.config.budget.bytes = bytes;
        self
    }

    /// Sets the fraction of the budget targeted by probe estimates.
    #[must_use]
    pub fn safety_ratio(mut self, ratio: f64) -> Self {
        self.config.budget.safety_ratio = ratio;
        self
    }

    /// Sets the video rate controller mode.
    #[must_use]
    pub fn video_mode(mut self, mode: VideoMode) -> Self {
        self.config.video.mode = mode;
        self
    }

    /// Fixes the engine thread count instead of detecting it.
    #[must_use]
    pub fn engine_threads(mut self, threads: usize) -> Self {
        self.config.engine.threads = Some(threads);
        self
    }

    /// Sets the parent directory of the engine scratch space.
    #[must_use]
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.engine.temp_dir = Some(dir);
        self
    }

    /// Sets the gzip level for generic files.
    #[must_use]
    pub fn gzip_level(mut self, level: u32) -> Self {
        self.config.generic.level = level;
        self
    }

    /// Sets the full-length pass limit.
    #[must_use]
    pub fn max_video_passes(mut self, passes: u32) -> Self {
        self.config.video.max_passes = passes;
        self
    }

    /// Builds the configuration without validating it.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }

    /// Builds and validates the configuration.
    pub fn try_build(self) -> CoreResult<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
