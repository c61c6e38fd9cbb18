//! The per-job encoding plan and the initial planning heuristics.
//!
//! An [`EncodingPlan`] is only ever changed through its setters, which clamp
//! every field to its floor, so a plan can never describe settings below the
//! minimum the rate controller is willing to try.

use std::fmt;

use crate::config::VideoConfig;
use crate::engine::MediaProbe;

/// Audio bitrate of a fresh full-length plan.
pub const INITIAL_AUDIO_KBPS: u32 = 20;
/// Audio bitrate after the controller decides the budget can afford more.
pub const RICH_AUDIO_KBPS: u32 = 24;
/// Frame rate of a fresh full-length plan, and the cap when growing.
pub const INITIAL_FPS: u32 = 12;

/// Container and audio overhead reserved by the full-length planner.
pub const FULL_LENGTH_OVERHEAD_BYTES: u64 = 24 * 1024;
/// Container overhead reserved by the excerpt planner.
pub const EXCERPT_OVERHEAD_BYTES: u64 = 20 * 1024;
/// Smallest bit budget the planners will assume.
pub const MIN_PLANNING_BITS: u64 = 8 * 1024 * 8;

pub const MAX_VIDEO_KBPS: u32 = 220;
pub const MAX_EXCERPT_VIDEO_KBPS: u32 = 200;
pub const MAX_WIDTH: u32 = 426;

const DEFAULT_ASPECT: f64 = 16.0 / 9.0;

/// Lower bounds for every plan field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanFloors {
    pub width: u32,
    pub fps: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    pub clip_secs: f64,
}

impl PlanFloors {
    pub const FULL_LENGTH: Self = Self {
        width: 96,
        fps: 5,
        video_kbps: 6,
        audio_kbps: 6,
        clip_secs: 2.0,
    };

    pub const EXCERPT: Self = Self {
        width: 96,
        fps: 5,
        video_kbps: 8,
        audio_kbps: 6,
        clip_secs: 2.0,
    };
}

/// Mutable encoding parameters of one video job.
///
/// `audio_kbps == 0` means the output carries no audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingPlan {
    width: u32,
    fps: u32,
    video_kbps: u32,
    audio_kbps: u32,
    clip_secs: f64,
    pass: u32,
    floors: PlanFloors,
}

impl EncodingPlan {
    #[must_use]
    pub fn new(
        floors: PlanFloors,
        width: u32,
        fps: u32,
        video_kbps: u32,
        audio_kbps: u32,
        clip_secs: f64,
    ) -> Self {
        let mut plan = Self {
            width: floors.width,
            fps: floors.fps,
            video_kbps: floors.video_kbps,
            audio_kbps: 0,
            clip_secs: floors.clip_secs,
            pass: 0,
            floors,
        };
        plan.set_width(width);
        plan.set_fps(fps);
        plan.set_video_kbps(video_kbps);
        plan.set_audio_kbps(audio_kbps);
        plan.set_clip_secs(clip_secs);
        plan
    }

    /// The cheapest plan with the same floors, audio presence and clip length.
    #[must_use]
    pub fn at_floors(&self) -> Self {
        let audio = if self.has_audio() { self.floors.audio_kbps } else { 0 };
        Self::new(self.floors, 0, 0, 0, audio, self.clip_secs)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn fps(&self) -> u32 {
        self.fps
    }

    #[must_use]
    pub fn video_kbps(&self) -> u32 {
        self.video_kbps
    }

    #[must_use]
    pub fn audio_kbps(&self) -> u32 {
        self.audio_kbps
    }

    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio_kbps > 0
    }

    #[must_use]
    pub fn clip_secs(&self) -> f64 {
        self.clip_secs
    }

    #[must_use]
    pub fn pass(&self) -> u32 {
        self.pass
    }

    #[must_use]
    pub fn floors(&self) -> PlanFloors {
        self.floors
    }

    /// Sets the output width, clamped to the floor and rounded down to even.
    pub fn set_width(&mut self, width: u32) {
        self.width = (width & !1).max(self.floors.width);
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.max(self.floors.fps);
    }

    pub fn set_video_kbps(&mut self, kbps: u32) {
        self.video_kbps = kbps.max(self.floors.video_kbps);
    }

    /// Sets the audio bitrate; `0` drops audio, anything else is floored.
    pub fn set_audio_kbps(&mut self, kbps: u32) {
        self.audio_kbps = if kbps == 0 {
            0
        } else {
            kbps.max(self.floors.audio_kbps)
        };
    }

    pub fn drop_audio(&mut self) {
        self.audio_kbps = 0;
    }

    pub fn set_clip_secs(&mut self, secs: f64) {
        self.clip_secs = if secs.is_finite() {
            secs.max(self.floors.clip_secs)
        } else {
            self.floors.clip_secs
        };
    }

    pub fn next_pass(&mut self) {
        self.pass += 1;
    }

    /// Total bitrate in kbps.
    #[must_use]
    pub fn total_kbps(&self) -> u32 {
        self.video_kbps + self.audio_kbps
    }
}

impl fmt::Display for EncodingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px, {}fps, {}k video, ",
            self.width, self.fps, self.video_kbps
        )?;
        if self.has_audio() {
            write!(f, "{}k audio", self.audio_kbps)?;
        } else {
            write!(f, "no audio")?;
        }
        write!(f, ", {:.1}s", self.clip_secs)
    }
}

/// Picks the ladder width nearest to `target`, capped at the source width.
#[must_use]
pub fn snap_width(target: f64, ladder: &[u32], source_width: Option<u32>) -> u32 {
    let nearest = ladder
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (f64::from(*a) - target).abs();
            let db = (f64::from(*b) - target).abs();
            da.total_cmp(&db)
        })
        .unwrap_or(PlanFloors::FULL_LENGTH.width);
    match source_width {
        Some(src) if src > 0 => nearest.min(src),
        _ => nearest,
    }
}

fn width_for_bitrate(video_kbps: u32, fps: u32, source: &MediaProbe, bpp: f64) -> f64 {
    let aspect = source.aspect().unwrap_or(DEFAULT_ASPECT);
    (f64::from(video_kbps) * 1000.0 / (bpp * f64::from(fps) * aspect)).sqrt()
}

fn planning_bits(budget: u64, overhead_bytes: u64) -> f64 {
    (budget.saturating_mul(8))
        .saturating_sub(overhead_bytes * 8)
        .max(MIN_PLANNING_BITS) as f64
}

/// Initial plan for the full-length mode.
#[must_use]
pub fn initial_full_length(
    duration: f64,
    source: &MediaProbe,
    budget: u64,
    config: &VideoConfig,
) -> EncodingPlan {
    let duration = duration.max(0.5);
    let total = (planning_bits(budget, FULL_LENGTH_OVERHEAD_BYTES) / duration / 1000.0).floor();
    let video = (total - f64::from(INITIAL_AUDIO_KBPS)).max(8.0) as u32;
    let width = snap_width(
        width_for_bitrate(video, INITIAL_FPS, source, config.bits_per_pixel),
        &config.width_ladder,
        source.width,
    );
    EncodingPlan::new(
        PlanFloors::FULL_LENGTH,
        width,
        INITIAL_FPS,
        video,
        INITIAL_AUDIO_KBPS,
        duration,
    )
}

/// Initial plan for the excerpt mode. Starts without audio.
#[must_use]
pub fn initial_excerpt(
    duration: Option<f64>,
    source: &MediaProbe,
    budget: u64,
    config: &VideoConfig,
) -> EncodingPlan {
    let clip = duration
        .map_or(config.excerpt_clip_secs, |d| d.min(config.excerpt_clip_secs))
        .max(PlanFloors::EXCERPT.clip_secs);
    let video = (planning_bits(budget, EXCERPT_OVERHEAD_BYTES) / clip / 1000.0)
        .floor()
        .max(10.0) as u32;
    let fps = if clip >= 5.0 { 8 } else { 10 };
    let width = snap_width(
        width_for_bitrate(video, fps, source, config.bits_per_pixel),
        &config.short_width_ladder,
        source.width,
    );
    EncodingPlan::new(PlanFloors::EXCERPT, width, fps, video, 0, clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp_to_floors() {
        let mut plan = EncodingPlan::new(PlanFloors::FULL_LENGTH, 320, 12, 100, 20, 30.0);
        plan.set_width(10);
        plan.set_fps(1);
        plan.set_video_kbps(0);
        plan.set_audio_kbps(2);
        plan.set_clip_secs(0.1);
        assert_eq!(plan.width(), 96);
        assert_eq!(plan.fps(), 5);
        assert_eq!(plan.video_kbps(), 6);
        assert_eq!(plan.audio_kbps(), 6);
        assert_eq!(plan.clip_secs(), 2.0);

        plan.set_width(201);
        assert_eq!(plan.width(), 200);
        plan.set_audio_kbps(0);
        assert!(!plan.has_audio());
    }

    #[test]
    fn test_at_floors() {
        let plan = EncodingPlan::new(PlanFloors::EXCERPT, 320, 8, 300, 0, 6.0);
        let floor = plan.at_floors();
        assert_eq!(
            (floor.width(), floor.fps(), floor.video_kbps(), floor.audio_kbps()),
            (96, 5, 8, 0)
        );
        assert_eq!(floor.clip_secs(), 6.0);
    }

    #[test]
    fn test_snap_width() {
        let ladder = crate::config::DEFAULT_WIDTH_LADDER;
        assert_eq!(snap_width(250.0, &ladder, None), 256);
        assert_eq!(snap_width(5000.0, &ladder, None), 426);
        assert_eq!(snap_width(5000.0, &ladder, Some(200)), 200);
        assert_eq!(snap_width(10.0, &ladder, None), 96);
    }

    #[test]
    fn test_initial_full_length_budget_split() {
        let config = VideoConfig::default();
        let source = MediaProbe {
            width: Some(1920),
            height: Some(1080),
            ..Default::default()
        };
        // (1 MiB * 8 - 24 KiB * 8) / 600 s / 1000 = 13.65 -> 13 total, minus 20 audio -> floor 8
        let plan = initial_full_length(600.0, &source, 1_048_576, &config);
        assert_eq!(plan.video_kbps(), 8);
        assert_eq!(plan.audio_kbps(), 20);
        assert_eq!(plan.fps(), 12);
        assert_eq!(plan.width(), 96);

        let plan = initial_full_length(60.0, &source, 1_048_576, &config);
        assert_eq!(plan.video_kbps(), 136 - 20);
        assert!(plan.width() > 96 && plan.width() <= 426);
    }

    #[test]
    fn test_initial_excerpt() {
        let config = VideoConfig::default();
        let plan = initial_excerpt(Some(120.0), &MediaProbe::default(), 1_048_576, &config);
        assert_eq!(plan.clip_secs(), 6.0);
        assert_eq!(plan.fps(), 8);
        assert!(!plan.has_audio());
        assert_eq!(plan.video_kbps(), 1370);
        assert_eq!(plan.width(), 320);

        let short = initial_excerpt(Some(3.0), &MediaProbe::default(), 1_048_576, &config);
        assert_eq!(short.clip_secs(), 3.0);
        assert_eq!(short.fps(), 10);
    }
}
