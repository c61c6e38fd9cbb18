// squeeze-core/tests/common/mod.rs
//
// Shared fake engine for the integration tests. Output sizes are a
// deterministic function of the requested bitrates and the encoded length,
// and every invocation is recorded for inspection.

#![allow(dead_code)]

use squeeze_core::engine::args::parse_kbps;
use squeeze_core::error::classify_engine_failure;
use squeeze_core::{
    Capabilities, CodecEngine, Config, CoreResult, EngineHandle, MediaProbe, Pipeline, Services,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Bytes the fake engine overshoots `-fs` by, like a real muxer finishing its packet.
pub const FS_OVERSHOOT: u64 = 4096;

pub type Invocations = Arc<Mutex<Vec<Vec<String>>>>;

/// Behaviour knobs of [`FakeEngine`].
pub struct FakeBehavior {
    pub probe: MediaProbe,
    /// Multiplier applied to probe encodes (`*probe.webm`).
    pub probe_factor: f64,
    /// Multiplier applied to every other encode.
    pub full_factor: f64,
    /// Content density by start offset (`-ss`), in seconds.
    pub density: Box<dyn Fn(f64) -> f64 + Send>,
    /// Encodes mapping audio fail as if the source had no audio stream.
    pub missing_audio: bool,
    /// Zero-based indices of `out.*` encodes that die with an OOM signature.
    pub oom_on_outputs: Vec<usize>,
    /// Size of extracted JPEG frames.
    pub frame_bytes: u64,
    /// JPEG extractions fail with this engine log line.
    pub frame_failure: Option<String>,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            probe: MediaProbe {
                duration_secs: Some(60.0),
                width: Some(1280),
                height: Some(720),
                has_video: true,
                has_audio: true,
            },
            probe_factor: 1.0,
            full_factor: 1.0,
            density: Box::new(|_| 1.0),
            missing_audio: false,
            oom_on_outputs: Vec::new(),
            frame_bytes: 20_000,
            frame_failure: None,
        }
    }
}

pub struct FakeEngine {
    files: HashMap<String, Vec<u8>>,
    behavior: FakeBehavior,
    invocations: Invocations,
    out_encodes: usize,
}

impl FakeEngine {
    pub fn new(behavior: FakeBehavior) -> (Self, Invocations) {
        let invocations: Invocations = Arc::new(Mutex::new(Vec::new()));
        let engine = Self {
            files: HashMap::new(),
            behavior,
            invocations: Arc::clone(&invocations),
            out_encodes: 0,
        };
        (engine, invocations)
    }

    fn encoded_size(&self, args: &[String], output: &str) -> u64 {
        let input_end = args.iter().position(|a| a == "-i").unwrap_or(0);
        let start = value_in(&args[..input_end], "-ss")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let duration = self.behavior.probe.duration_secs.unwrap_or(10.0);
        let length = value_in(&args[input_end..], "-t")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(duration)
            .min((duration - start).max(0.0));

        let video = value_in(args, "-b:v").and_then(parse_kbps).unwrap_or(0);
        let audio = if args.iter().any(|a| a == "-an") {
            0
        } else {
            value_in(args, "-b:a").and_then(parse_kbps).unwrap_or(0)
        };
        let factor = if output.contains("probe") {
            self.behavior.probe_factor
        } else {
            self.behavior.full_factor
        };
        let density = (self.behavior.density)(start);
        (f64::from(video + audio) * 125.0 * length * factor * density).round() as u64
    }
}

/// Value following the last `key` in `args`.
pub fn value_in<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.windows(2)
        .rev()
        .find(|w| w[0] == key)
        .map(|w| w[1].as_str())
}

impl CodecEngine for FakeEngine {
    fn write_file(&mut self, name: &str, data: &[u8]) -> CoreResult<()> {
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.files.get(name).cloned())
    }

    fn delete_file(&mut self, name: &str) -> CoreResult<()> {
        self.files.remove(name);
        Ok(())
    }

    fn exec(&mut self, args: &[String], progress: &mut dyn FnMut(f64)) -> CoreResult<()> {
        self.invocations.lock().unwrap().push(args.to_vec());
        let output = args.last().cloned().unwrap_or_default();

        let size = if output.ends_with(".jpg") {
            if let Some(line) = &self.behavior.frame_failure {
                return Err(classify_engine_failure("ffmpeg exited with status 1", line));
            }
            self.behavior.frame_bytes
        } else {
            let maps_audio = value_in(args, "-c:a").is_some() && !args.iter().any(|a| a == "-an");
            let maps_video = value_in(args, "-b:v").is_some();
            if self.behavior.missing_audio && maps_audio && maps_video {
                return Err(classify_engine_failure(
                    "ffmpeg exited with status 1",
                    "Stream map '0:a:0' matches no streams.",
                ));
            }
            if output.contains("out.") {
                let index = self.out_encodes;
                self.out_encodes += 1;
                if self.behavior.oom_on_outputs.contains(&index) {
                    return Err(classify_engine_failure(
                        "ffmpeg exited with status 134",
                        "RuntimeError: Aborted(). Cannot allocate memory",
                    ));
                }
            }
            self.encoded_size(args, &output)
        };

        let size = match value_in(args, "-fs").and_then(|v| v.parse::<u64>().ok()) {
            Some(cap) if size > cap => cap + FS_OVERSHOOT,
            _ => size,
        };
        progress(0.5);
        progress(1.0);
        self.files.insert(output, vec![0u8; size as usize]);
        Ok(())
    }

    fn probe(&mut self, _name: &str) -> CoreResult<MediaProbe> {
        Ok(self.behavior.probe)
    }
}

/// Services around a fake engine, plus the shared invocation log.
pub fn fake_services(behavior: FakeBehavior) -> (Services, Invocations) {
    let (engine, invocations) = FakeEngine::new(behavior);
    let handle = Arc::new(EngineHandle::new(Box::new(engine), Capabilities::single_threaded()));
    (Services::with_engine(handle), invocations)
}

/// A pipeline around a fake engine, plus the shared invocation log.
pub fn fake_pipeline(config: Config, behavior: FakeBehavior) -> (Pipeline, Invocations) {
    let (services, invocations) = fake_services(behavior);
    (Pipeline::with_services(config, services), invocations)
}

/// Invocations whose output name ends with `suffix`.
pub fn outputs_ending(invocations: &Invocations, suffix: &str) -> Vec<Vec<String>> {
    invocations
        .lock()
        .unwrap()
        .iter()
        .filter(|args| args.last().is_some_and(|o| o.ends_with(suffix)))
        .cloned()
        .collect()
}

/// Width from a `scale=W:-2` filter.
pub fn scale_width(args: &[String]) -> Option<u32> {
    let vf = value_in(args, "-vf")?;
    vf.strip_prefix("scale=")?.split(':').next()?.parse().ok()
}

/// Frame rate from an `fps=N` filter.
pub fn fps(args: &[String]) -> Option<u32> {
    let vf = value_in(args, "-vf")?;
    vf.split(',').find_map(|f| f.strip_prefix("fps="))?.parse().ok()
}

pub fn kbps(args: &[String], key: &str) -> u32 {
    value_in(args, key).and_then(parse_kbps).unwrap_or(0)
}
