// ============================================================================
// squeeze-core/src/processing/video/full_length.rs
// ============================================================================
//
// FULL-LENGTH MODE: Keep Every Second and the Audio Track
//
// Plan from the budget, probe and pre-adjust toward 85% of the budget
// (re-probing a shrunken plan for a few rounds), refuse early when even the
// floor plan cannot fit, then run bounded full encodes.
// After an overshoot every field only shrinks, so the passes converge.
//
// AI-ASSISTANT-INFO: Full-length video rate control loop

// ---- Internal crate imports ----
use super::plan::{INITIAL_FPS, MAX_VIDEO_KBPS, MAX_WIDTH, RICH_AUDIO_KBPS, initial_full_length};
use super::probe::{FULL_LENGTH_GOP, multi_probe};
use super::{EncodingPlan, VIDEO_MIME, VideoSession};
use crate::error::{CoreError, CoreResult, size_exceeded};
use crate::job::JobContext;
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::{format_budget, format_bytes, with_extension};

/// Ratio of the safe target below which the plan is grown.
const GROW_BELOW: f64 = 0.65;
/// Ratio of the safe target below which audio is upgraded.
const RICH_AUDIO_BELOW: f64 = 0.5;
/// Shrink factor below which width and frame rate also drop.
const STRUCTURAL_SHRINK: f64 = 0.85;
/// Probe rounds spent moving an over-target plan under the safe target.
const MAX_PRE_ADJUST_ROUNDS: u32 = 3;

// ============================================================================
// PLAN ADJUSTMENTS
// ============================================================================

/// Moves the plan toward `safe` bytes given an estimate of `est` bytes.
pub fn pre_adjust(plan: &mut EncodingPlan, est: f64, safe: f64, max_grow: f64) {
    if est > safe {
        let shrink = safe / est;
        plan.set_video_kbps((f64::from(plan.video_kbps()) * shrink).floor() as u32);
        if shrink < STRUCTURAL_SHRINK {
            plan.set_width((f64::from(plan.width()) * shrink.sqrt()).floor() as u32);
            plan.set_fps((f64::from(plan.fps()) * shrink.max(0.80)).floor() as u32);
        }
    } else if est < GROW_BELOW * safe {
        let grow = if est > 0.0 { (safe / est).min(max_grow) } else { max_grow };
        let video = (f64::from(plan.video_kbps()) * grow.min(1.25)).ceil() as u32;
        plan.set_video_kbps(video.min(MAX_VIDEO_KBPS.max(plan.video_kbps())));
        if plan.audio_kbps() == super::plan::INITIAL_AUDIO_KBPS && est < RICH_AUDIO_BELOW * safe {
            plan.set_audio_kbps(RICH_AUDIO_KBPS);
        }
        let width = (f64::from(plan.width()) * grow.sqrt().min(1.15)).ceil() as u32;
        plan.set_width(width.min(MAX_WIDTH.max(plan.width())));
        if plan.fps() < INITIAL_FPS {
            plan.set_fps(((f64::from(plan.fps()) * 1.1).ceil() as u32).min(INITIAL_FPS));
        }
    }
}

/// Tightens every field after an over-budget pass. Never grows a field.
pub fn tighten(plan: &mut EncodingPlan, bitrate_shrink: f64) {
    plan.set_video_kbps((f64::from(plan.video_kbps()) * bitrate_shrink).floor() as u32);
    if plan.has_audio() {
        plan.set_audio_kbps((f64::from(plan.audio_kbps()) * 0.85).floor() as u32);
    }
    plan.set_width((f64::from(plan.width()) * 0.90).floor() as u32);
    plan.set_fps((f64::from(plan.fps()) * 0.92).floor() as u32);
    plan.next_pass();
}

/// Cheaper plan after the engine ran out of memory.
pub fn shrink_after_oom(plan: &mut EncodingPlan) {
    plan.set_width((f64::from(plan.width()) * 0.85).floor() as u32);
    plan.set_fps((f64::from(plan.fps()) * 0.90).floor() as u32);
    plan.set_video_kbps((f64::from(plan.video_kbps()) * 0.85).floor() as u32);
    if plan.has_audio() {
        plan.set_audio_kbps((f64::from(plan.audio_kbps()) * 0.90).floor() as u32);
    }
}

/// "1mb"-style token used in machine-readable failure reasons.
pub(super) fn budget_token(budget: u64) -> String {
    format_budget(budget).replace(' ', "").to_lowercase()
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Compresses a video keeping its full duration and audio.
pub fn compress_full_length(
    file: &SourceFile,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    let budget = ctx.budget();
    let safe = ctx.config.budget.safe_bytes() as f64;
    let video_cfg = ctx.config.video.clone();

    let engine = ctx.engine()?;
    let mut session = VideoSession::open(&engine, ctx, file, bytes)?;
    let duration = session
        .source()
        .duration_secs
        .unwrap_or(video_cfg.default_duration_secs)
        .max(0.5);

    let mut plan = initial_full_length(duration, session.source(), budget, &video_cfg);
    log::info!(target: "squeeze::video", "{}: initial plan {}", file.name(), plan);

    // Pre-adjust from the densest probe, re-probing while the estimate is over target.
    for round in 1..=MAX_PRE_ADJUST_ROUNDS {
        let sample = multi_probe(&mut session, ctx, &plan, duration, video_cfg.probe_secs, FULL_LENGTH_GOP)?;
        let est = sample.estimate(duration);
        pre_adjust(&mut plan, est, safe, video_cfg.max_grow);
        log::info!(
            target: "squeeze::video",
            "{}: round {round} estimate {} vs target {}, adjusted plan {}",
            file.name(),
            format_bytes(est as u64),
            format_bytes(safe as u64),
            plan
        );
        if est <= safe {
            break;
        }
    }

    // Refuse before any full pass when even the floor plan cannot fit.
    let mut floor_plan = plan.at_floors();
    if !session.audio_available() {
        floor_plan.drop_audio();
    }
    let floor = multi_probe(&mut session, ctx, &floor_plan, duration, video_cfg.probe_secs, FULL_LENGTH_GOP)?;
    let floor_est = floor.estimate(duration);
    if floor_est > safe {
        log::warn!(
            target: "squeeze::video",
            "{}: infeasible, minimum settings estimate {} bytes",
            file.name(),
            floor_est.round()
        );
        return Err(CoreError::InfeasibleUnderBudget(format!(
            "cannot_preserve_full_length_under_{} (min settings estimate {} bytes)",
            budget_token(budget),
            floor_est.round() as u64
        )));
    }

    let mut pass = 0;
    let mut oom_retries = 0;
    let mut last_size = None;
    while pass < video_cfg.max_passes {
        let phase = format!("encode pass {}", pass + 1);
        match session.encode(ctx, &plan, None, "out.webm", FULL_LENGTH_GOP, Some(budget), &phase) {
            Ok(data) if data.len() as u64 <= budget => {
                log::info!(
                    target: "squeeze::video",
                    "{}: pass {} fits ({}), {}",
                    file.name(),
                    pass + 1,
                    format_bytes(data.len() as u64),
                    plan
                );
                ctx.progress.finish();
                return CompressionResult::new(
                    data,
                    with_extension(file.name(), "webm"),
                    VIDEO_MIME,
                    None,
                    budget,
                );
            }
            Ok(data) => {
                log::info!(
                    target: "squeeze::video",
                    "{}: pass {} over budget ({}), tightening",
                    file.name(),
                    pass + 1,
                    format_bytes(data.len() as u64)
                );
                last_size = Some(data.len());
                tighten(&mut plan, video_cfg.bitrate_shrink);
                pass += 1;
            }
            Err(CoreError::OutOfMemory(msg)) if oom_retries < video_cfg.max_oom_retries => {
                log::warn!(
                    target: "squeeze::video",
                    "{}: engine ran out of memory ({msg}); retrying with a cheaper plan",
                    file.name()
                );
                shrink_after_oom(&mut plan);
                oom_retries += 1;
            }
            Err(e) => return Err(e),
        }
    }

    let mut final_plan = plan;
    if !session.audio_available() {
        final_plan.drop_audio();
    }
    Err(size_exceeded(format!(
        "Could not fit under {} while preserving full length and audio. Final attempt: {}{}.",
        format_budget(budget),
        final_plan,
        last_size.map_or(String::new(), |s| format!(" produced {}", format_bytes(s as u64)))
    )))
}
