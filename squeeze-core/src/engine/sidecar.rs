// ============================================================================
// squeeze-core/src/engine/sidecar.rs
// ============================================================================
//
// SIDECAR ENGINE: CodecEngine Backed by ffmpeg-sidecar and ffprobe
//
// The production engine. Its scratch filesystem is a private temporary
// directory; every invocation runs ffmpeg with that directory as the working
// directory, so scratch names in the argument list resolve inside it.
//
// KEY COMPONENTS:
// - SidecarEngine: CodecEngine implementation
// - EngineEventHandler: Turns ffmpeg events into progress and a log tail
//
// AI-ASSISTANT-INFO: ffmpeg-sidecar engine with a temp-dir scratch filesystem

// ---- External crate imports ----
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel as FfmpegLogLevel};
use tempfile::TempDir;

// ---- Standard library imports ----
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

// ---- Internal crate imports ----
use super::{CodecEngine, MediaProbe};
use crate::error::{CoreError, CoreResult, classify_engine_failure};
use crate::temp_files::create_temp_dir;
use crate::utils::parse_ffmpeg_time;

/// Number of ffmpeg log lines kept for error reports.
const LOG_TAIL_LINES: usize = 80;

/// Engine running the system ffmpeg through `ffmpeg-sidecar`.
pub struct SidecarEngine {
    scratch: TempDir,
}

impl SidecarEngine {
    /// Creates the engine with a fresh scratch directory under `parent`
    /// (the system temp dir when `None`).
    pub fn new(parent: Option<&Path>) -> CoreResult<Self> {
        let scratch = create_temp_dir(parent, "squeeze_scratch_")?;
        log::debug!("Engine scratch directory: {}", scratch.path().display());
        Ok(Self { scratch })
    }

    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    fn path_of(&self, name: &str) -> CoreResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid scratch file name '{name}'"),
            )));
        }
        Ok(self.scratch.path().join(name))
    }
}

impl CodecEngine for SidecarEngine {
    fn write_file(&mut self, name: &str, data: &[u8]) -> CoreResult<()> {
        std::fs::write(self.path_of(name)?, data)?;
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> CoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_of(name)?) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_file(&mut self, name: &str) -> CoreResult<()> {
        match std::fs::remove_file(self.path_of(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exec(&mut self, args: &[String], progress: &mut dyn FnMut(f64)) -> CoreResult<()> {
        let mut cmd = FfmpegCommand::new();
        cmd.args(args);
        cmd.as_inner_mut().current_dir(self.scratch.path());

        let mut child = cmd.spawn().map_err(|e| CoreError::Engine {
            message: format!("failed to start ffmpeg: {e}"),
            log_tail: String::new(),
        })?;

        let mut handler = EngineEventHandler::new(clip_limit(args));
        let events = child.iter().map_err(|e| CoreError::Engine {
            message: format!("failed to read ffmpeg events: {e}"),
            log_tail: String::new(),
        })?;
        for event in events {
            handler.handle_event(event, progress);
        }

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(classify_engine_failure(
                &format!("ffmpeg exited with {status}"),
                &handler.log_tail(),
            ))
        }
    }

    fn probe(&mut self, name: &str) -> CoreResult<MediaProbe> {
        let path = self.path_of(name)?;
        match ffprobe::ffprobe(&path) {
            Ok(info) => {
                let duration_secs = info
                    .format
                    .duration
                    .as_deref()
                    .and_then(|d| d.parse::<f64>().ok())
                    .filter(|d| d.is_finite() && *d > 0.0);
                let video = info
                    .streams
                    .iter()
                    .find(|s| s.codec_type.as_deref() == Some("video"));
                let has_audio = info
                    .streams
                    .iter()
                    .any(|s| s.codec_type.as_deref() == Some("audio"));
                Ok(MediaProbe {
                    duration_secs,
                    width: video.and_then(|s| s.width).and_then(|w| u32::try_from(w).ok()),
                    height: video.and_then(|s| s.height).and_then(|h| u32::try_from(h).ok()),
                    has_video: video.is_some(),
                    has_audio,
                })
            }
            Err(e) => {
                log::warn!("ffprobe failed for {name}: {e}; continuing with unknown metadata");
                Ok(MediaProbe::default())
            }
        }
    }
}

/// Value of the `-t` option, which bounds the encoded duration.
fn clip_limit(args: &[String]) -> Option<f64> {
    args.windows(2)
        .find(|w| w[0] == "-t")
        .and_then(|w| w[1].parse::<f64>().ok())
        .filter(|t| *t > 0.0)
}

/// Handler for ffmpeg events of one invocation.
struct EngineEventHandler {
    duration: Option<f64>,
    clip_limit: Option<f64>,
    tail: VecDeque<String>,
}

impl EngineEventHandler {
    fn new(clip_limit: Option<f64>) -> Self {
        Self {
            duration: None,
            clip_limit,
            tail: VecDeque::with_capacity(LOG_TAIL_LINES),
        }
    }

    fn handle_event(&mut self, event: FfmpegEvent, progress: &mut dyn FnMut(f64)) {
        match event {
            FfmpegEvent::ParsedDuration(d) => {
                if d.duration > 0.0 {
                    self.duration = Some(d.duration);
                }
            }
            FfmpegEvent::Progress(p) => self.handle_time(&p.time, progress),
            FfmpegEvent::Log(level, message) => {
                match level {
                    FfmpegLogLevel::Error | FfmpegLogLevel::Fatal => {
                        log::debug!(target: "ffmpeg_log", "{message}");
                    }
                    _ => log::trace!(target: "ffmpeg_log", "{message}"),
                }
                self.push(message);
            }
            FfmpegEvent::Error(message) => {
                log::debug!(target: "ffmpeg_log", "error: {message}");
                self.push(message);
            }
            _ => {}
        }
    }

    fn handle_time(&mut self, time: &str, progress: &mut dyn FnMut(f64)) {
        let total = match (self.duration, self.clip_limit) {
            (Some(d), Some(t)) => Some(d.min(t)),
            (d, t) => d.or(t),
        };
        if let (Some(total), Some(current)) = (total, parse_ffmpeg_time(time)) {
            if total > 0.0 {
                progress((current / total).clamp(0.0, 1.0));
            }
        }
    }

    fn push(&mut self, line: String) {
        if self.tail.len() == LOG_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line);
    }

    fn log_tail(&self) -> String {
        self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_file_roundtrip() {
        let parent = tempfile::tempdir().unwrap();
        let mut engine = SidecarEngine::new(Some(parent.path())).unwrap();

        assert_eq!(engine.read_file("job_in.bin").unwrap(), None);
        engine.write_file("job_in.bin", b"abc").unwrap();
        assert_eq!(engine.read_file("job_in.bin").unwrap(), Some(b"abc".to_vec()));
        engine.delete_file("job_in.bin").unwrap();
        engine.delete_file("job_in.bin").unwrap();
        assert_eq!(engine.read_file("job_in.bin").unwrap(), None);
    }

    #[test]
    fn test_scratch_names_cannot_escape() {
        let parent = tempfile::tempdir().unwrap();
        let mut engine = SidecarEngine::new(Some(parent.path())).unwrap();
        assert!(engine.write_file("../evil", b"x").is_err());
        assert!(engine.write_file("a/b", b"x").is_err());
    }

    #[test]
    fn test_clip_limit_bounds_progress() {
        let args: Vec<String> = ["-ss", "10", "-t", "4", "out.webm"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut handler = EngineEventHandler::new(clip_limit(&args));
        let mut seen = Vec::new();
        let mut record = |f: f64| seen.push(f);
        handler.handle_time("00:00:02.00", &mut record);
        assert_eq!(seen, vec![0.5]);
    }

    #[test]
    fn test_log_tail_is_bounded() {
        let mut handler = EngineEventHandler::new(None);
        for i in 0..(LOG_TAIL_LINES + 5) {
            handler.push(format!("line {i}"));
        }
        let tail = handler.log_tail();
        assert!(tail.starts_with("line 5\n"));
        assert!(tail.ends_with(&format!("line {}", LOG_TAIL_LINES + 4)));
    }
}
