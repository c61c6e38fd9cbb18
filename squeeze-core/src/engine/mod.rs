// ============================================================================
// squeeze-core/src/engine/mod.rs
// ============================================================================
//
// CODEC ENGINE: Abstraction over the Transcoding Engine and its Scratch Space
//
// The compressors never talk to ffmpeg directly. They go through the
// CodecEngine trait, which models an engine with its own scratch filesystem:
// inputs are written into it by name, the engine is invoked with a list of
// arguments, and outputs are read back by name.
//
// KEY COMPONENTS:
// - CodecEngine: Trait implemented by the real engine and by test fakes
// - EngineHandle: Shared, mutex-guarded engine plus its detected capabilities
// - ScratchSpace: Per-job scratch names with cleanup on drop
// - MediaProbe: Duration and stream facts reported by the engine
//
// AI-ASSISTANT-INFO: Codec engine abstraction, handle and per-job scratch names

// ---- Standard library imports ----
use std::sync::{Mutex, MutexGuard, PoisonError};

// ---- Internal crate imports ----
use crate::error::CoreResult;

// ============================================================================
// SUBMODULES
// ============================================================================

pub mod args;
pub mod capabilities;
pub mod sidecar;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use args::EngineCommand;
pub use capabilities::{Capabilities, EngineBuild, load};
pub use sidecar::SidecarEngine;

// ============================================================================
// ENGINE TRAIT
// ============================================================================

/// Facts about a media file the engine can report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
}

impl MediaProbe {
    /// Display aspect ratio, when both dimensions are known.
    #[must_use]
    pub fn aspect(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(f64::from(w) / f64::from(h)),
            _ => None,
        }
    }
}

/// A transcoding engine with a private scratch filesystem.
///
/// File names are plain names inside the scratch space, never paths.
pub trait CodecEngine: Send {
    /// Writes (or replaces) a scratch file.
    fn write_file(&mut self, name: &str, data: &[u8]) -> CoreResult<()>;

    /// Reads a scratch file. `Ok(None)` when it does not exist.
    fn read_file(&mut self, name: &str) -> CoreResult<Option<Vec<u8>>>;

    /// Deletes a scratch file. Deleting a missing file is not an error.
    fn delete_file(&mut self, name: &str) -> CoreResult<()>;

    /// Runs one engine invocation. `progress` receives the invocation's own
    /// completion fraction in `[0, 1]`. Failures are classified with
    /// [`crate::error::classify_engine_failure`].
    fn exec(&mut self, args: &[String], progress: &mut dyn FnMut(f64)) -> CoreResult<()>;

    /// Probes a scratch file for duration and streams.
    fn probe(&mut self, name: &str) -> CoreResult<MediaProbe>;
}

// ============================================================================
// ENGINE HANDLE
// ============================================================================

/// The loaded engine, shared by every job.
///
/// Each method holds the engine lock for exactly one step (one write, one
/// read, one invocation). Jobs interleave between steps, which is safe
/// because every job uses its own scratch names.
pub struct EngineHandle {
    capabilities: Capabilities,
    engine: Mutex<Box<dyn CodecEngine>>,
}

impl EngineHandle {
    /// Wraps an engine. Used by [`load`] and for dependency injection.
    pub fn new(engine: Box<dyn CodecEngine>, capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            engine: Mutex::new(engine),
        }
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn CodecEngine>> {
        // A panic while holding the lock leaves the engine itself usable.
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_file(&self, name: &str, data: &[u8]) -> CoreResult<()> {
        self.lock().write_file(name, data)
    }

    pub fn read_file(&self, name: &str) -> CoreResult<Option<Vec<u8>>> {
        self.lock().read_file(name)
    }

    pub fn delete_file(&self, name: &str) -> CoreResult<()> {
        self.lock().delete_file(name)
    }

    pub fn probe(&self, name: &str) -> CoreResult<MediaProbe> {
        self.lock().probe(name)
    }

    /// Runs a command, adding the thread arguments of the loaded build.
    pub fn exec(&self, command: &EngineCommand, progress: &mut dyn FnMut(f64)) -> CoreResult<()> {
        let args = command.to_args(&self.capabilities.thread_args());
        log::debug!(target: "squeeze::engine", "ffmpeg {}", args.join(" "));
        self.lock().exec(&args, progress)
    }
}

// ============================================================================
// PER-JOB SCRATCH NAMES
// ============================================================================

/// Scratch file names owned by one job.
///
/// Names are `<job-id>_<suffix>`. Every name handed out is deleted when the
/// space is dropped; cleanup failures are logged and ignored.
pub struct ScratchSpace<'a> {
    engine: &'a EngineHandle,
    job_id: String,
    names: Vec<String>,
}

impl<'a> ScratchSpace<'a> {
    pub fn new(engine: &'a EngineHandle, job_id: &str) -> Self {
        Self {
            engine,
            job_id: job_id.to_string(),
            names: Vec::new(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &'a EngineHandle {
        self.engine
    }

    /// Returns this job's scratch name for `suffix` (e.g. `"out.webm"`).
    pub fn name(&mut self, suffix: &str) -> String {
        let name = format!("{}_{suffix}", self.job_id);
        if !self.names.contains(&name) {
            self.names.push(name.clone());
        }
        name
    }

    /// Deletes any stale file under `suffix`, then writes `data` there.
    pub fn write(&mut self, suffix: &str, data: &[u8]) -> CoreResult<String> {
        let name = self.name(suffix);
        self.engine.delete_file(&name)?;
        self.engine.write_file(&name, data)?;
        Ok(name)
    }

    /// Deletes the file under `suffix` so the next invocation starts clean.
    pub fn clear(&mut self, suffix: &str) -> CoreResult<String> {
        let name = self.name(suffix);
        self.engine.delete_file(&name)?;
        Ok(name)
    }

    pub fn read(&self, name: &str) -> CoreResult<Option<Vec<u8>>> {
        self.engine.read_file(name)
    }
}

impl Drop for ScratchSpace<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(e) = self.engine.delete_file(name) {
                log::debug!("Failed to delete scratch file {name}: {e}");
            }
        }
    }
}
