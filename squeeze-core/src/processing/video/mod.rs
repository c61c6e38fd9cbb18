// ============================================================================
// squeeze-core/src/processing/video/mod.rs
// ============================================================================
//
// VIDEO RATE CONTROLLER: Fitting Video Under the Byte Budget
//
// Video is the only format where the output size cannot be computed up
// front. The controller plans bitrate, width and frame rate from the budget,
// measures short probe encodes, adjusts the plan from the worst measurement,
// then runs bounded encode passes that only ever tighten once they overshoot.
//
// KEY COMPONENTS:
// - plan: EncodingPlan with clamped setters and the initial heuristics
// - probe: multi-offset probe encodes, worst case wins
// - full_length: keeps the whole duration and the audio track
// - excerpt: keeps a short centred clip, with a poster-frame last resort
// - VideoSession: scratch input, source facts and the encode invocation
//
// AI-ASSISTANT-INFO: Budgeted video transcoding with probe-driven rate control

pub mod excerpt;
pub mod full_length;
pub mod plan;
pub mod probe;

pub use excerpt::compress_excerpt;
pub use full_length::compress_full_length;
pub use plan::{EncodingPlan, PlanFloors};
pub use probe::ProbeSample;

// ---- Internal crate imports ----
use crate::config::VideoMode;
use crate::engine::{EngineCommand, EngineHandle, MediaProbe, ScratchSpace};
use crate::engine::args::FilterChain;
use crate::error::{CoreError, CoreResult};
use crate::job::JobContext;
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::extension_of;

pub const VIDEO_MIME: &str = "video/webm";

/// Compresses a video with the configured mode.
pub fn compress_video(
    file: &SourceFile,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    match ctx.config.video.mode {
        VideoMode::FullLength => compress_full_length(file, bytes, ctx),
        VideoMode::Excerpt => compress_excerpt(file, bytes, ctx),
    }
}

/// Part of the source to encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start_secs: f64,
    pub length_secs: f64,
}

/// A video job's view of the engine: its input in scratch and the source facts.
pub struct VideoSession<'e> {
    scratch: ScratchSpace<'e>,
    input: String,
    source: MediaProbe,
    audio_available: bool,
}

impl<'e> VideoSession<'e> {
    /// Writes the input into scratch and probes it.
    pub fn open(
        engine: &'e EngineHandle,
        ctx: &JobContext<'_>,
        file: &SourceFile,
        bytes: &[u8],
    ) -> CoreResult<Self> {
        let mut scratch = ctx.scratch(engine);
        let ext = extension_of(file.name()).unwrap_or_else(|| "bin".to_string());
        let input = scratch.write(&format!("in.{ext}"), bytes)?;
        let source = engine.probe(&input)?;
        log::debug!(
            target: "squeeze::video",
            "{}: duration {:?}, {:?}x{:?}, audio: {}",
            file.name(),
            source.duration_secs,
            source.width,
            source.height,
            source.has_audio
        );
        Ok(Self {
            scratch,
            input,
            source,
            audio_available: true,
        })
    }

    #[must_use]
    pub fn source(&self) -> &MediaProbe {
        &self.source
    }

    /// Whether audio may still be mapped; false after the source proved to have none.
    #[must_use]
    pub fn audio_available(&self) -> bool {
        self.audio_available
    }

    fn command(
        &self,
        plan: &EncodingPlan,
        segment: Option<Segment>,
        output: &str,
        gop: u32,
        cap_bytes: Option<u64>,
        with_audio: bool,
    ) -> EngineCommand {
        let mut cmd = EngineCommand::new(&self.input, output);
        if let Some(seg) = segment {
            if seg.start_secs > 0.0 {
                cmd = cmd.input_opt("-ss", format_secs(seg.start_secs));
            }
            cmd = cmd.opt("-t", format_secs(seg.length_secs));
        }

        let v = plan.video_kbps();
        cmd = cmd
            .opt("-map", "0:v:0")
            .opt("-vf", FilterChain::new().scale_width(plan.width()).fps(plan.fps()).build())
            .opt("-c:v", "libvpx")
            .opt("-b:v", format!("{v}k"))
            .opt("-maxrate", format!("{v}k"))
            .opt("-bufsize", format!("{}k", (v * 2).max(32)))
            .opt("-quality", "realtime")
            .opt("-cpu-used", 8)
            .opt("-lag-in-frames", 0)
            .opt("-g", gop)
            .opt("-deadline", "realtime");

        cmd = if with_audio && plan.has_audio() {
            cmd.opt("-map", "0:a:0?")
                .opt("-c:a", "libopus")
                .opt("-b:a", format!("{}k", plan.audio_kbps()))
                .opt("-ac", 1)
                .opt("-ar", 48_000)
        } else {
            cmd.flag("-an")
        };

        if let Some(cap) = cap_bytes {
            cmd = cmd.max_output_bytes(cap);
        }
        cmd.opt("-f", "webm")
    }

    /// Encodes `segment` (or everything) with `plan` into the scratch file
    /// named by `output_suffix` and returns its bytes.
    ///
    /// A source without an audio stream is retried once without audio; later
    /// encodes of this session skip audio altogether.
    pub fn encode(
        &mut self,
        ctx: &mut JobContext<'_>,
        plan: &EncodingPlan,
        segment: Option<Segment>,
        output_suffix: &str,
        gop: u32,
        cap_bytes: Option<u64>,
        phase: &str,
    ) -> CoreResult<Vec<u8>> {
        ctx.checkpoint()?;
        let output = self.scratch.clear(output_suffix)?;
        let engine = self.scratch.engine();

        let with_audio = self.audio_available;
        let cmd = self.command(plan, segment, &output, gop, cap_bytes, with_audio);
        let first = {
            let progress = &mut ctx.progress;
            engine.exec(&cmd, &mut |raw| {
                progress.engine(crate::progress::LOADING_WEIGHT, raw, phase);
            })
        };

        match first {
            Ok(()) => {}
            Err(CoreError::MissingStream(msg)) if with_audio && plan.has_audio() => {
                log::info!(
                    target: "squeeze::video",
                    "Source has no usable audio stream ({msg}); retrying without audio"
                );
                self.audio_available = false;
                self.scratch.clear(output_suffix)?;
                let cmd = self.command(plan, segment, &output, gop, cap_bytes, false);
                let progress = &mut ctx.progress;
                engine.exec(&cmd, &mut |raw| {
                    progress.engine(crate::progress::LOADING_WEIGHT, raw, phase);
                })?;
            }
            Err(e) => return Err(e),
        }

        match self.scratch.read(&output)? {
            Some(data) if !data.is_empty() => Ok(data),
            _ => Err(CoreError::Engine {
                message: format!("engine produced no output for {output}"),
                log_tail: String::new(),
            }),
        }
    }

    /// Extracts one JPEG frame at `offset_secs`, `width` wide.
    pub fn extract_frame(
        &mut self,
        ctx: &mut JobContext<'_>,
        offset_secs: f64,
        width: u32,
    ) -> CoreResult<Option<Vec<u8>>> {
        ctx.checkpoint()?;
        let output = self.scratch.clear("poster.jpg")?;
        let cmd = EngineCommand::new(&self.input, &output)
            .input_opt("-ss", format_secs(offset_secs))
            .opt("-vframes", 1)
            .opt("-vf", FilterChain::new().scale_width_with(width, "fast_bilinear").build())
            .opt("-qscale:v", 7)
            .flag("-an");
        let engine = self.scratch.engine();
        engine.exec(&cmd, &mut |_| {})?;
        Ok(self.scratch.read(&output)?.filter(|d| !d.is_empty()))
    }
}

/// Formats seconds for `-ss`/`-t` without float noise.
fn format_secs(secs: f64) -> String {
    let rounded = (secs * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}
