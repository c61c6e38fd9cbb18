//! Configuration structures and constants for the squeeze-core library.
//!
//! This module provides the configuration system for the compression pipeline:
//! the byte budget, the per-format tuning knobs of every compressor and the
//! engine settings. Every numeric policy constant lives here so it can be
//! re-tuned per engine without touching the algorithms.

mod builder;
pub mod utils;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use utils::{get_env_opt_path, get_env_opt_string, get_env_u64, get_env_usize};

pub use builder::ConfigBuilder;

// Default constants

/// Default hard byte budget for a single output (1 MiB).
pub const DEFAULT_BYTE_BUDGET: u64 = 1_048_576;

/// Fraction of the budget the rate controller aims for before the final encode.
pub const DEFAULT_SAFETY_RATIO: f64 = 0.85;

/// Quality ladder of the exotic-image chain, tried in order at each long edge.
pub const DEFAULT_LADDER_QUALITIES: [f32; 9] =
    [0.82, 0.70, 0.60, 0.50, 0.42, 0.35, 0.28, 0.22, 0.18];

/// Width ladder for the full-length video mode.
pub const DEFAULT_WIDTH_LADDER: [u32; 17] = [
    96, 112, 128, 144, 160, 176, 192, 208, 224, 240, 256, 272, 288, 320, 360, 384, 426,
];

/// Width ladder for the excerpt video mode.
pub const DEFAULT_SHORT_WIDTH_LADDER: [u32; 14] = [
    96, 112, 128, 144, 160, 176, 192, 208, 224, 240, 256, 272, 288, 320,
];

const MIB: u64 = 1024 * 1024;

// Environment variable names

pub const ENV_BYTE_BUDGET: &str = "SQUEEZE_BYTE_BUDGET";
pub const ENV_VIDEO_MODE: &str = "SQUEEZE_VIDEO_MODE";
pub const ENV_ENGINE_THREADS: &str = "SQUEEZE_ENGINE_THREADS";
pub const ENV_TEMP_DIR: &str = "SQUEEZE_TEMP_DIR";

/// How the video rate controller treats the source duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoMode {
    /// Keep the entire duration and the audio track.
    #[default]
    FullLength,
    /// Keep a short centred excerpt; audio only when budget allows.
    Excerpt,
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullLength => write!(f, "full-length"),
            Self::Excerpt => write!(f, "excerpt"),
        }
    }
}

impl FromStr for VideoMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-length" | "full_length" | "full" => Ok(Self::FullLength),
            "excerpt" | "clip" | "short" => Ok(Self::Excerpt),
            other => Err(CoreError::Config(format!("unknown video mode '{other}'"))),
        }
    }
}

/// Byte budget shared by every compressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Hard upper bound on the size of any output payload.
    pub bytes: u64,
    /// Target fraction of `bytes` used when estimating from probes.
    pub safety_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_BYTE_BUDGET,
            safety_ratio: DEFAULT_SAFETY_RATIO,
        }
    }
}

impl BudgetConfig {
    /// Byte target for probe-based estimates.
    #[must_use]
    pub fn safe_bytes(&self) -> u64 {
        (self.bytes as f64 * self.safety_ratio).floor() as u64
    }
}

/// Raster fast path and exotic-image chain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub fast_max_side: u32,
    pub fast_quality: f32,
    pub fast_min_quality: f32,
    pub fast_quality_step: f32,

    /// Decoded non-TIFF images above this long edge are downscaled before the fast path.
    pub guard_max_side: u32,

    pub ladder_qualities: Vec<f32>,
    pub ladder_max_side: u32,
    pub ladder_min_side: u32,
    pub ladder_shrink: f64,

    /// Inputs larger than this skip the fast path.
    pub exotic_threshold_bytes: u64,
    /// Inputs larger than this try the large-image decoder before the engine.
    pub large_decoder_threshold_bytes: u64,
    /// Inputs larger than this never reach the engine.
    pub engine_stall_threshold_bytes: u64,

    pub engine_start_side: u32,
    pub engine_min_side: u32,
    pub engine_start_qscale: u32,
    pub engine_max_qscale: u32,
    pub engine_max_passes: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            fast_max_side: 1280,
            fast_quality: 0.75,
            fast_min_quality: 0.35,
            fast_quality_step: 0.1,
            guard_max_side: 8192,
            ladder_qualities: DEFAULT_LADDER_QUALITIES.to_vec(),
            ladder_max_side: 8192,
            ladder_min_side: 480,
            ladder_shrink: 0.86,
            exotic_threshold_bytes: 25 * MIB,
            large_decoder_threshold_bytes: 100 * MIB,
            engine_stall_threshold_bytes: 200 * MIB,
            engine_start_side: 1600,
            engine_min_side: 640,
            engine_start_qscale: 8,
            engine_max_qscale: 18,
            engine_max_passes: 5,
        }
    }
}

/// Audio planner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub min_kbps: u32,
    pub max_kbps: u32,
    /// Bytes reserved for container overhead when planning the bitrate.
    pub overhead_bytes: u64,
    pub max_retries: u32,
    pub retry_shrink: f64,
    pub sample_rate: u32,
    /// Duration assumed when the probe cannot report one.
    pub default_duration_secs: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            min_kbps: 12,
            max_kbps: 64,
            overhead_bytes: 8192,
            max_retries: 3,
            retry_shrink: 0.75,
            sample_rate: 48_000,
            default_duration_secs: 10.0,
        }
    }
}

/// Video rate controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub mode: VideoMode,
    pub width_ladder: Vec<u32>,
    pub short_width_ladder: Vec<u32>,
    /// Bits per pixel per frame used to derive the initial width.
    pub bits_per_pixel: f64,
    pub default_duration_secs: f64,

    pub max_passes: u32,
    pub max_oom_retries: u32,
    pub probe_secs: f64,
    pub bitrate_shrink: f64,
    pub max_grow: f64,

    pub excerpt_max_passes: u32,
    pub excerpt_clip_secs: f64,
    pub excerpt_max_clip_secs: f64,
    pub excerpt_probe_secs: f64,
    pub poster_width: u32,
    pub poster_offsets_secs: Vec<f64>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            mode: VideoMode::FullLength,
            width_ladder: DEFAULT_WIDTH_LADDER.to_vec(),
            short_width_ladder: DEFAULT_SHORT_WIDTH_LADDER.to_vec(),
            bits_per_pixel: 0.035,
            default_duration_secs: 10.0,
            max_passes: 14,
            max_oom_retries: 4,
            probe_secs: 6.0,
            bitrate_shrink: 0.75,
            max_grow: 1.35,
            excerpt_max_passes: 7,
            excerpt_clip_secs: 6.0,
            excerpt_max_clip_secs: 12.0,
            excerpt_probe_secs: 4.0,
            poster_width: 256,
            poster_offsets_secs: vec![60.0, 5.0, 120.0],
        }
    }
}

/// Generic (gzip) handler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericConfig {
    pub chunk_bytes: usize,
    /// flate2 compression level, 0-9.
    pub level: u32,
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 256 * 1024,
            level: 6,
        }
    }
}

/// Codec engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on engine threads for the threaded build.
    pub max_threads: usize,
    /// Fixed thread count, overriding detection. `Some(1)` forces the single-threaded build.
    pub threads: Option<usize>,
    /// Parent directory of the engine scratch space (system temp dir when unset).
    pub temp_dir: Option<PathBuf>,
    /// Chunk size used while loading inputs.
    pub read_chunk_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: 8,
            threads: None,
            temp_dir: None,
            read_chunk_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Main configuration structure for the squeeze-core library.
///
/// All fields have defaults equal to the pipeline's fixed parameters, so an
/// empty TOML file or `Config::default()` gives the standard 1 MiB behaviour.
///
/// # Examples
///
/// ```rust
/// use squeeze_core::config::{ConfigBuilder, VideoMode};
///
/// let config = ConfigBuilder::new()
///     .byte_budget(512 * 1024)
///     .video_mode(VideoMode::Excerpt)
///     .build();
/// assert_eq!(config.budget.bytes, 524_288);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub budget: BudgetConfig,
    pub image: ImageConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
    pub generic: GenericConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Loads a configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SQUEEZE_*` environment overrides on top of this configuration.
    pub fn apply_env_overrides(&mut self) -> CoreResult<()> {
        self.budget.bytes = get_env_u64(ENV_BYTE_BUDGET, self.budget.bytes);
        if let Some(mode) = get_env_opt_string(ENV_VIDEO_MODE) {
            self.video.mode = mode.parse()?;
        }
        let threads = get_env_usize(ENV_ENGINE_THREADS, 0);
        if threads > 0 {
            self.engine.threads = Some(threads);
        }
        if let Some(dir) = get_env_opt_path(ENV_TEMP_DIR) {
            self.engine.temp_dir = Some(dir);
        }
        self.validate()
    }

    /// Rejects configurations the compressors cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        let fail = |msg: String| Err(CoreError::Config(msg));

        if self.budget.bytes == 0 {
            return fail("budget.bytes must be positive".into());
        }
        if !(self.budget.safety_ratio > 0.0 && self.budget.safety_ratio <= 1.0) {
            return fail(format!(
                "budget.safety_ratio must be in (0, 1], got {}",
                self.budget.safety_ratio
            ));
        }

        let img = &self.image;
        for (name, q) in [
            ("image.fast_quality", img.fast_quality),
            ("image.fast_min_quality", img.fast_min_quality),
        ] {
            if !(q > 0.0 && q <= 1.0) {
                return fail(format!("{name} must be in (0, 1], got {q}"));
            }
        }
        if img.fast_min_quality > img.fast_quality {
            return fail("image.fast_min_quality exceeds image.fast_quality".into());
        }
        if img.fast_quality_step <= 0.0 {
            return fail("image.fast_quality_step must be positive".into());
        }
        if img.ladder_qualities.is_empty()
            || img.ladder_qualities.iter().any(|q| !(*q > 0.0 && *q <= 1.0))
        {
            return fail("image.ladder_qualities must be non-empty values in (0, 1]".into());
        }
        if img.ladder_qualities.windows(2).any(|w| w[1] > w[0]) {
            return fail("image.ladder_qualities must be descending".into());
        }
        if img.ladder_min_side == 0 || img.ladder_min_side > img.ladder_max_side {
            return fail("image.ladder_min_side must be in 1..=ladder_max_side".into());
        }
        if !(img.ladder_shrink > 0.0 && img.ladder_shrink < 1.0) {
            return fail("image.ladder_shrink must be in (0, 1)".into());
        }
        if img.engine_min_side == 0 || img.engine_min_side > img.engine_start_side {
            return fail("image.engine_min_side must be in 1..=engine_start_side".into());
        }

        let audio = &self.audio;
        if audio.min_kbps == 0 || audio.min_kbps > audio.max_kbps {
            return fail("audio.min_kbps must be in 1..=audio.max_kbps".into());
        }
        if !(audio.retry_shrink > 0.0 && audio.retry_shrink <= 1.0) {
            return fail("audio.retry_shrink must be in (0, 1]".into());
        }

        let video = &self.video;
        for (name, ladder) in [
            ("video.width_ladder", &video.width_ladder),
            ("video.short_width_ladder", &video.short_width_ladder),
        ] {
            if ladder.is_empty() || ladder.windows(2).any(|w| w[1] <= w[0]) {
                return fail(format!("{name} must be non-empty and strictly ascending"));
            }
        }
        if !(video.bitrate_shrink > 0.0 && video.bitrate_shrink < 1.0) {
            return fail("video.bitrate_shrink must be in (0, 1)".into());
        }
        if video.max_grow < 1.0 {
            return fail("video.max_grow must be at least 1".into());
        }
        if video.max_passes == 0 || video.excerpt_max_passes == 0 {
            return fail("video pass limits must be positive".into());
        }
        if video.probe_secs <= 0.0 || video.excerpt_probe_secs <= 0.0 {
            return fail("video probe lengths must be positive".into());
        }

        if self.generic.chunk_bytes == 0 {
            return fail("generic.chunk_bytes must be positive".into());
        }
        if self.generic.level > 9 {
            return fail("generic.level must be in 0..=9".into());
        }
        if self.engine.max_threads == 0 || self.engine.read_chunk_bytes == 0 {
            return fail("engine.max_threads and engine.read_chunk_bytes must be positive".into());
        }
        Ok(())
    }
}
