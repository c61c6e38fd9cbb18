// ============================================================================
// squeeze-cli/src/progress.rs
// ============================================================================
//
// PROGRESS DISPLAY: One Progress Bar per Pending Attachment
//
// Renders the pending-attachment list of squeeze-core as an indicatif
// MultiProgress. Every list event maps to a change on exactly one bar, so the
// display is driven entirely by the core's state machine.
//
// KEY COMPONENTS:
// - AttachmentBars: Listener that owns the bars, keyed by temporary id
//
// AI-ASSISTANT-INFO: indicatif rendering of attachment progress events

// ---- External crate imports ----
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use squeeze_core::{AttachmentEvent, TempId, format_bytes};

// ---- Standard library imports ----
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Bar resolution; fractions are scaled to this many steps.
const BAR_STEPS: u64 = 1000;

/// Progress bars for the attachments of one batch.
pub struct AttachmentBars {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<TempId, ProgressBar>>,
}

impl AttachmentBars {
    pub fn new(multi: MultiProgress) -> Self {
        let style = ProgressStyle::with_template(
            "{spinner:.green} {prefix:<28!} [{bar:30.cyan/blue}] {percent:>3}% {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        Self {
            multi,
            style,
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Applies one pending-attachment event to the display.
    pub fn handle(&self, event: &AttachmentEvent) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            AttachmentEvent::Added { temp_id, name } => {
                let bar = self.multi.add(ProgressBar::new(BAR_STEPS));
                bar.set_style(self.style.clone());
                bar.set_prefix(name.clone());
                bar.set_message("starting");
                bars.insert(*temp_id, bar);
            }
            AttachmentEvent::Progress {
                temp_id,
                progress,
                phase,
            } => {
                if let Some(bar) = bars.get(temp_id) {
                    bar.set_position((progress * BAR_STEPS as f64).round() as u64);
                    bar.set_message(phase.clone());
                }
            }
            AttachmentEvent::Ready {
                temp_id,
                filename,
                size,
            } => {
                if let Some(bar) = bars.get(temp_id) {
                    bar.set_position(BAR_STEPS);
                    bar.finish_with_message(format!(
                        "{} {filename} ({})",
                        style("done").green(),
                        format_bytes(*size as u64)
                    ));
                }
            }
            AttachmentEvent::Failed { temp_id, message, .. } => {
                if let Some(bar) = bars.remove(temp_id) {
                    bar.abandon_with_message(style(message).red().to_string());
                }
            }
            AttachmentEvent::Removed { temp_id } => {
                if let Some(bar) = bars.remove(temp_id) {
                    bar.finish_and_clear();
                }
            }
        }
    }

    /// Number of bars still tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use squeeze_core::PendingAttachments;
    use std::sync::Arc;

    #[test]
    fn test_bars_follow_attachment_events() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let bars = Arc::new(AttachmentBars::new(multi));
        let listener = Arc::clone(&bars);
        let list = PendingAttachments::with_listener(move |e| listener.handle(e));

        let a = list.begin("a.png");
        let b = list.begin("b.txt");
        assert_eq!(bars.len(), 2);

        list.update_progress(a, 0.5, "encoding").unwrap();
        list.fail(b, &squeeze_core::CoreError::Cancelled).unwrap();
        assert_eq!(bars.len(), 1);

        list.remove(a);
        assert!(bars.is_empty());
    }
}
