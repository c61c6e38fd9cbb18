//! Engine capability detection and the memoised engine handle.
//!
//! The engine comes in two builds: a thread-parallel one, chosen when the
//! host exposes more than one hardware thread, and a single-threaded one.
//! [`load`] initialises the engine once per process and hands out the same
//! handle afterwards.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{EngineHandle, SidecarEngine};
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};

/// Which engine build is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBuild {
    Threaded { threads: usize },
    SingleThreaded,
}

/// Detected host capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub build: EngineBuild,
    pub hardware_threads: usize,
}

impl Capabilities {
    /// Detects capabilities for the current host.
    #[must_use]
    pub fn detect(config: &EngineConfig) -> Self {
        let hardware_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::for_hardware_threads(hardware_threads, config)
    }

    /// Picks the build for a host with `hardware_threads` threads.
    #[must_use]
    pub fn for_hardware_threads(hardware_threads: usize, config: &EngineConfig) -> Self {
        let wanted = config.threads.unwrap_or(hardware_threads);
        let build = if hardware_threads > 1 && wanted > 1 {
            EngineBuild::Threaded {
                threads: wanted.clamp(1, config.max_threads.max(1)),
            }
        } else {
            EngineBuild::SingleThreaded
        };
        Self {
            build,
            hardware_threads,
        }
    }

    #[must_use]
    pub fn single_threaded() -> Self {
        Self {
            build: EngineBuild::SingleThreaded,
            hardware_threads: 1,
        }
    }

    /// Thread count the engine will use.
    #[must_use]
    pub fn threads(&self) -> usize {
        match self.build {
            EngineBuild::Threaded { threads } => threads,
            EngineBuild::SingleThreaded => 1,
        }
    }

    /// Arguments the build contributes to every invocation.
    #[must_use]
    pub fn thread_args(&self) -> Vec<String> {
        match self.build {
            EngineBuild::Threaded { threads } => vec![
                "-threads".to_string(),
                threads.to_string(),
                "-filter_threads".to_string(),
                threads.saturating_sub(1).max(1).to_string(),
            ],
            EngineBuild::SingleThreaded => vec!["-threads".to_string(), "1".to_string()],
        }
    }

    /// Logs the selected build at info level.
    pub fn log_capabilities(&self) {
        match self.build {
            EngineBuild::Threaded { threads } => log::info!(
                "Engine build: threaded ({} threads, {} available)",
                threads,
                self.hardware_threads
            ),
            EngineBuild::SingleThreaded => log::info!("Engine build: single-threaded"),
        }
    }
}

static ENGINE: OnceCell<Arc<EngineHandle>> = OnceCell::new();

/// Loads the engine on first use and returns the shared handle.
///
/// Only the first successful call's configuration takes effect.
///
/// A failed initialisation is never retried within a job: the caller gets
/// [`CoreError::EngineInit`], which is fatal, so the job ends with it instead
/// of falling back. Nothing is memoised on failure, so every later job makes
/// its own single attempt and surfaces its own `EngineInit`.
pub fn load(config: &EngineConfig) -> CoreResult<Arc<EngineHandle>> {
    ENGINE
        .get_or_try_init(|| {
            if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
                return Err(CoreError::EngineInit(
                    "ffmpeg was not found on PATH".to_string(),
                ));
            }
            let capabilities = Capabilities::detect(config);
            capabilities.log_capabilities();
            let engine = SidecarEngine::new(config.temp_dir.as_deref())
                .map_err(|e| CoreError::EngineInit(e.to_string()))?;
            Ok(Arc::new(EngineHandle::new(Box::new(engine), capabilities)))
        })
        .cloned()
}

/// Whether the engine has already been loaded in this process.
#[must_use]
pub fn is_loaded() -> bool {
    ENGINE.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_thread_host_gets_threaded_build() {
        let caps = Capabilities::for_hardware_threads(16, &EngineConfig::default());
        assert_eq!(caps.build, EngineBuild::Threaded { threads: 8 });
        assert_eq!(caps.thread_args(), vec!["-threads", "8", "-filter_threads", "7"]);
    }

    #[test]
    fn test_single_thread_host() {
        let caps = Capabilities::for_hardware_threads(1, &EngineConfig::default());
        assert_eq!(caps.build, EngineBuild::SingleThreaded);
        assert_eq!(caps.thread_args(), vec!["-threads", "1"]);
    }

    #[test]
    fn test_thread_override() {
        let config = EngineConfig {
            threads: Some(1),
            ..EngineConfig::default()
        };
        let caps = Capabilities::for_hardware_threads(12, &config);
        assert_eq!(caps.build, EngineBuild::SingleThreaded);

        let config = EngineConfig {
            threads: Some(2),
            ..EngineConfig::default()
        };
        let caps = Capabilities::for_hardware_threads(12, &config);
        assert_eq!(caps.thread_args(), vec!["-threads", "2", "-filter_threads", "1"]);
    }
}
