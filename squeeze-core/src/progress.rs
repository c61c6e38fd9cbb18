// ============================================================================
// squeeze-core/src/progress.rs
// ============================================================================
//
// PROGRESS REPORTING: Throttled, Phase-Labelled Progress Callbacks
//
// Compressors emit fine-grained progress (engine ticks, chunk reads, ladder
// steps). This module coalesces them into ticks the UI can afford to render
// and labels each tick with the phase that produced it.
//
// KEY COMPONENTS:
// - ProgressSink: Trait for receiving (fraction, phase) ticks
// - NullProgressSink: No-op sink for callers that do not render progress
// - ProgressReporter: Throttling adapter in front of a sink
//
// AI-ASSISTANT-INFO: Progress throttling and phase labelling

/// Minimum change in fraction before a tick is forwarded.
pub const MIN_PROGRESS_DELTA: f64 = 0.01;

/// Input loading occupies the first quarter of the progress bar.
pub const LOADING_WEIGHT: f64 = 0.25;

/// Engine progress never claims completion; the final tick comes from the compressor.
pub const ENGINE_PROGRESS_CAP: f64 = 0.97;

pub const PHASE_STARTING: &str = "starting";
pub const PHASE_LOADING: &str = "loading input";
pub const PHASE_DONE: &str = "done";

/// Receives progress ticks. Fractions are in `[0, 1]`.
pub trait ProgressSink: Send {
    fn report(&mut self, fraction: f64, phase: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(f64, &str) + Send,
{
    fn report(&mut self, fraction: f64, phase: &str) {
        self(fraction, phase);
    }
}

/// A sink that drops every tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn report(&mut self, _fraction: f64, _phase: &str) {}
}

/// Coalesces progress updates before they reach a [`ProgressSink`].
///
/// A tick is forwarded when the phase changes, when the fraction advanced by at
/// least [`MIN_PROGRESS_DELTA`] since the last forwarded tick of the same
/// phase, or when the fraction first reaches 1. Within a phase the forwarded
/// fraction never decreases; a new phase may start lower.
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    phase: Option<String>,
    last_fraction: f64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            phase: None,
            last_fraction: 0.0,
        }
    }

    /// Offers a tick; returns whether it was forwarded.
    pub fn update(&mut self, fraction: f64, phase: &str) -> bool {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let forward = match self.phase.as_deref() {
            Some(current) if current == phase => {
                (fraction - self.last_fraction >= MIN_PROGRESS_DELTA)
                    || (fraction >= 1.0 && self.last_fraction < 1.0)
            }
            _ => {
                self.phase = Some(phase.to_string());
                true
            }
        };

        if forward {
            self.last_fraction = fraction;
            self.sink.report(fraction, phase);
        }
        forward
    }

    /// Maps raw engine progress of one invocation into `[start, ENGINE_PROGRESS_CAP]`.
    pub fn engine(&mut self, start: f64, raw: f64, phase: &str) -> bool {
        let raw = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        let start = start.clamp(0.0, ENGINE_PROGRESS_CAP);
        self.update(start + raw * (ENGINE_PROGRESS_CAP - start), phase)
    }

    /// Reports completion of the job.
    pub fn finish(&mut self) {
        self.update(1.0, PHASE_DONE);
    }

    /// The phase of the last forwarded tick.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }
}
