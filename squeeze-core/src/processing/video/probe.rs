//! Probe encodes: short samples at the current plan to measure bytes/second.
//!
//! Several offsets are sampled and the densest one wins, so a quiet intro
//! cannot talk the controller into a plan the rest of the video breaks.

use super::{EncodingPlan, Segment, VideoSession};
use crate::error::{CoreError, CoreResult};
use crate::job::JobContext;

/// Key-frame interval used for probes and full-length passes.
pub const FULL_LENGTH_GOP: u32 = 90;

/// Shortest stretch a probe's bytes are divided by.
const MIN_EFFECTIVE_SECS: f64 = 0.1;

/// One probe measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub bytes_per_second: f64,
    pub plan: EncodingPlan,
    pub offset_secs: f64,
}

impl ProbeSample {
    /// Estimated output size for `secs` of video.
    #[must_use]
    pub fn estimate(&self, secs: f64) -> f64 {
        self.bytes_per_second * secs
    }
}

/// Probe start offsets for a source of `duration` seconds: one at 10% and,
/// for sources longer than 12 s, one centred.
#[must_use]
pub fn probe_offsets(duration: f64, sample_secs: f64) -> Vec<f64> {
    let mut offsets = vec![(duration * 0.10).floor().max(0.0)];
    if duration > 12.0 {
        let mid = ((duration - sample_secs) / 2.0).floor().max(0.0);
        if !offsets.contains(&mid) {
            offsets.push(mid);
        }
    }
    offsets
}

/// Length actually encoded by a probe starting at `offset`.
#[must_use]
pub fn effective_length(sample_secs: f64, offset: f64, duration: Option<f64>) -> f64 {
    let len = match duration {
        Some(d) => sample_secs.min(d - offset),
        None => sample_secs,
    };
    len.max(MIN_EFFECTIVE_SECS)
}

/// Picks the densest sample.
#[must_use]
pub fn worst(samples: &[ProbeSample]) -> Option<ProbeSample> {
    samples
        .iter()
        .copied()
        .max_by(|a, b| a.bytes_per_second.total_cmp(&b.bytes_per_second))
}

/// Runs one probe encode per offset and returns the worst measurement.
pub fn multi_probe(
    session: &mut VideoSession<'_>,
    ctx: &mut JobContext<'_>,
    plan: &EncodingPlan,
    duration: f64,
    sample_secs: f64,
    gop: u32,
) -> CoreResult<ProbeSample> {
    let known = session.source().duration_secs;
    let mut samples = Vec::new();

    for offset in probe_offsets(duration, sample_secs) {
        let length = effective_length(sample_secs, offset, known);
        let segment = Segment {
            start_secs: offset,
            length_secs: sample_secs,
        };
        let data = session.encode(ctx, plan, Some(segment), "probe.webm", gop, None, "probing")?;
        let sample = ProbeSample {
            bytes_per_second: data.len() as f64 / length,
            plan: *plan,
            offset_secs: offset,
        };
        log::debug!(
            target: "squeeze::video",
            "Probe at {:.0}s ({}): {} bytes over {:.1}s = {:.0} B/s",
            offset,
            plan,
            data.len(),
            length,
            sample.bytes_per_second
        );
        samples.push(sample);
    }

    // probe_offsets always yields at least one offset
    worst(&samples).ok_or_else(|| CoreError::Engine {
        message: "no probe samples were taken".to_string(),
        log_tail: String::new(),
    })
}
