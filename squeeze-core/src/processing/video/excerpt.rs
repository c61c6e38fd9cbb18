//! Excerpt mode: a short centred clip that may drop audio.
//!
//! When even the floor settings are too dense for a two-second clip the
//! controller hands back a single poster frame instead of failing. Once a
//! pass has fit, a later failed pass falls back to that output.

use super::plan::{INITIAL_FPS, MAX_EXCERPT_VIDEO_KBPS, MAX_WIDTH, RICH_AUDIO_KBPS, initial_excerpt};
use super::full_length::budget_token;
use super::probe::multi_probe;
use super::{EncodingPlan, Segment, VIDEO_MIME, VideoSession};
use crate::error::{CoreError, CoreResult, size_exceeded};
use crate::job::JobContext;
use crate::result::CompressionResult;
use crate::source::SourceFile;
use crate::utils::{format_budget, format_bytes, with_extension};

/// Key-frame interval for excerpt passes.
pub const EXCERPT_GOP: u32 = 60;

const MAX_PRE_ADJUST_ROUNDS: u32 = 6;
/// Outputs below this share of the budget lengthen the clip.
const EXTEND_CLIP_BELOW: f64 = 300.0 / 1024.0;
/// Outputs below this share of the budget spend the headroom on quality.
const SPEND_HEADROOM_BELOW: f64 = 700.0 / 1024.0;
/// Outputs above this share of the budget can afford an audio track.
const ADD_AUDIO_ABOVE: f64 = 200.0 / 1024.0;

/// One pre-adjust round; rounds start at 1.
pub fn pre_adjust_round(plan: &mut EncodingPlan, round: u32) {
    plan.set_video_kbps((f64::from(plan.video_kbps()) * 0.8).floor() as u32);
    plan.set_width((f64::from(plan.width()) * 0.9).floor() as u32);
    if round >= 2 {
        plan.set_fps((f64::from(plan.fps()) * 0.92).floor() as u32);
    }
    if round >= 3 {
        plan.set_clip_secs(plan.clip_secs() * 0.9);
    }
}

/// Tightens after an over-budget pass; passes start at 1.
pub fn tighten(plan: &mut EncodingPlan, pass: u32) {
    plan.set_video_kbps((f64::from(plan.video_kbps()) * 0.72).floor() as u32);
    plan.set_width((f64::from(plan.width()) * 0.88).floor() as u32);
    if pass >= 2 {
        plan.set_fps((f64::from(plan.fps()) * 0.9).floor() as u32);
    }
    if pass >= 3 {
        plan.set_clip_secs(plan.clip_secs() * 0.85);
    }
    plan.next_pass();
}

/// Cheaper excerpt after the engine ran out of memory.
pub fn shrink_after_oom(plan: &mut EncodingPlan) {
    plan.set_width((f64::from(plan.width()) * 0.85).floor() as u32);
    plan.set_fps((f64::from(plan.fps()) * 0.90).floor() as u32);
    plan.set_video_kbps((f64::from(plan.video_kbps()) * 0.85).floor() as u32);
    plan.set_clip_secs((plan.clip_secs() * 0.85).floor());
}

/// Spends unused budget after an under-budget pass. Returns whether anything changed.
pub fn grow(
    plan: &mut EncodingPlan,
    size: u64,
    budget: u64,
    duration: Option<f64>,
    max_clip_secs: f64,
    audio_available: bool,
) -> bool {
    let before = *plan;
    let size = size as f64;
    let budget = budget as f64;
    let clip_cap = duration.map_or(max_clip_secs, |d| d.min(max_clip_secs));

    if size < EXTEND_CLIP_BELOW * budget && plan.clip_secs() < clip_cap {
        plan.set_clip_secs((plan.clip_secs() * 1.6).ceil().min(clip_cap));
    }
    if size < SPEND_HEADROOM_BELOW * budget {
        let video = (f64::from(plan.video_kbps()) * 1.35).ceil() as u32;
        plan.set_video_kbps(video.min(MAX_EXCERPT_VIDEO_KBPS.max(plan.video_kbps())));
        let width = (f64::from(plan.width()) * 1.15).ceil() as u32;
        plan.set_width(width.min(MAX_WIDTH.max(plan.width())));
        if plan.fps() < INITIAL_FPS {
            plan.set_fps(((f64::from(plan.fps()) * 1.1).ceil() as u32).min(INITIAL_FPS));
        }
        if !plan.has_audio() && audio_available && size > ADD_AUDIO_ABOVE * budget {
            plan.set_audio_kbps(RICH_AUDIO_KBPS);
        }
    }
    *plan != before
}

/// Centred start offset for a clip of `clip` seconds.
#[must_use]
pub fn centred_start(duration: Option<f64>, clip: f64) -> f64 {
    match duration {
        Some(d) if d > clip + 2.0 => ((d - clip) / 2.0).floor().max(1.0),
        _ => 0.0,
    }
}

fn result_for(
    data: Vec<u8>,
    file: &SourceFile,
    budget: u64,
) -> CoreResult<CompressionResult> {
    CompressionResult::new(data, with_extension(file.name(), "webm"), VIDEO_MIME, None, budget)
}

/// Compresses a video into a short excerpt.
pub fn compress_excerpt(
    file: &SourceFile,
    bytes: &[u8],
    ctx: &mut JobContext<'_>,
) -> CoreResult<CompressionResult> {
    let budget = ctx.budget();
    let safe = ctx.config.budget.safe_bytes() as f64;
    let video_cfg = ctx.config.video.clone();

    let engine = ctx.engine()?;
    let mut session = VideoSession::open(&engine, ctx, file, bytes)?;
    let known_duration = session.source().duration_secs;
    let duration = known_duration.unwrap_or(video_cfg.excerpt_clip_secs);

    let mut plan = initial_excerpt(known_duration, session.source(), budget, &video_cfg);
    log::info!(target: "squeeze::video", "{}: initial excerpt plan {}", file.name(), plan);

    for round in 1..=MAX_PRE_ADJUST_ROUNDS {
        let sample_secs = plan.clip_secs().min(video_cfg.probe_secs);
        let sample = multi_probe(&mut session, ctx, &plan, duration, sample_secs, EXCERPT_GOP)?;
        if sample.estimate(plan.clip_secs()) <= safe {
            break;
        }
        pre_adjust_round(&mut plan, round);
        log::debug!(target: "squeeze::video", "{}: pre-adjust round {round}: {}", file.name(), plan);
    }

    let mut floor_plan = plan.at_floors();
    floor_plan.drop_audio();
    let floor = multi_probe(&mut session, ctx, &floor_plan, duration, video_cfg.excerpt_probe_secs, EXCERPT_GOP)?;
    if floor.estimate(floor_plan.floors().clip_secs) > safe {
        log::warn!(
            target: "squeeze::video",
            "{}: too dense even at minimum settings; extracting a poster frame",
            file.name()
        );
        return poster_frame(&mut session, ctx, file, known_duration);
    }

    let mut best: Option<Vec<u8>> = None;
    let mut overshot = false;
    let mut oom_retries = 0;
    let mut pass = 0;
    while pass < video_cfg.excerpt_max_passes {
        let segment = Segment {
            start_secs: centred_start(known_duration, plan.clip_secs()),
            length_secs: plan.clip_secs(),
        };
        let phase = format!("encode pass {}", pass + 1);
        let data = match session.encode(ctx, &plan, Some(segment), "out.webm", EXCERPT_GOP, Some(budget), &phase) {
            Ok(data) => data,
            Err(CoreError::OutOfMemory(msg)) if oom_retries < video_cfg.max_oom_retries => {
                log::warn!(
                    target: "squeeze::video",
                    "{}: engine ran out of memory ({msg}); retrying with a cheaper excerpt",
                    file.name()
                );
                shrink_after_oom(&mut plan);
                oom_retries += 1;
                continue;
            }
            Err(e) if best.is_some() && !e.is_fatal() => {
                log::warn!(
                    target: "squeeze::video",
                    "{}: pass {} failed ({e}); keeping the last excerpt that fit",
                    file.name(),
                    pass + 1
                );
                break;
            }
            Err(e) => return Err(e),
        };
        pass += 1;
        let size = data.len() as u64;

        if size <= budget {
            log::info!(
                target: "squeeze::video",
                "{}: pass {pass} fits ({}), {}",
                file.name(),
                format_bytes(size),
                plan
            );
            best = Some(data);
            let grew = !overshot
                && grow(
                    &mut plan,
                    size,
                    budget,
                    known_duration,
                    video_cfg.excerpt_max_clip_secs,
                    session.audio_available(),
                );
            if !grew {
                break;
            }
            log::debug!(target: "squeeze::video", "{}: spending headroom, next plan {}", file.name(), plan);
        } else {
            log::info!(
                target: "squeeze::video",
                "{}: pass {pass} over budget ({}), tightening",
                file.name(),
                format_bytes(size)
            );
            overshot = true;
            tighten(&mut plan, pass);
        }
    }

    match best {
        Some(data) => {
            ctx.progress.finish();
            result_for(data, file, budget)
        }
        None => Err(size_exceeded(format!(
            "Could not fit an excerpt under {} after {} passes. Final attempt: {}.",
            format_budget(budget),
            video_cfg.excerpt_max_passes,
            plan
        ))),
    }
}

/// Extracts a poster frame, trying each configured offset in order.
fn poster_frame(
    session: &mut VideoSession<'_>,
    ctx: &mut JobContext<'_>,
    file: &SourceFile,
    duration: Option<f64>,
) -> CoreResult<CompressionResult> {
    let budget = ctx.budget();
    let width = ctx.config.video.poster_width;
    let mut offsets: Vec<f64> = ctx
        .config
        .video
        .poster_offsets_secs
        .iter()
        .copied()
        .filter(|o| duration.is_none_or(|d| *o < d))
        .collect();
    if offsets.is_empty() {
        offsets.push(0.0);
    }

    for offset in offsets {
        match session.extract_frame(ctx, offset, width) {
            Ok(Some(frame)) if frame.len() as u64 <= budget => {
                log::info!(
                    target: "squeeze::video",
                    "{}: poster frame at {offset}s ({})",
                    file.name(),
                    format_bytes(frame.len() as u64)
                );
                ctx.progress.finish();
                return CompressionResult::new(
                    frame,
                    with_extension(file.name(), "jpg"),
                    "image/jpeg",
                    None,
                    budget,
                );
            }
            Ok(_) => log::debug!("No usable poster frame at {offset}s"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::debug!("Poster frame at {offset}s failed: {e}"),
        }
    }

    Err(CoreError::InfeasibleUnderBudget(format!(
        "video_too_dense_for_{}",
        budget_token(budget)
    )))
}
