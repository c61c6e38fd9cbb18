// ============================================================================
// squeeze-core/src/attachments.rs
// ============================================================================
//
// PENDING ATTACHMENTS: Placeholder State Machine for In-Flight Jobs
//
// Every submitted file gets a placeholder with a temporary id while its job
// runs. A placeholder only moves forward:
//
//   Compressing --complete--> Ready
//   Compressing --fail------> (removed, message handed back)
//
// Settled placeholders reject progress updates, and a failed job has to be
// submitted again as a new placeholder. Ready placeholders are drained when
// the message they belong to is sent.
//
// KEY COMPONENTS:
// - TempId: placeholder identifier
// - PendingAttachment: status, progress, phase and the finished result
// - PendingAttachments: thread-safe list shared by concurrent jobs
// - AttachmentEvent: notifications for presentation layers
//
// AI-ASSISTANT-INFO: Attachment lifecycle tracking for concurrent compression jobs

// ---- Standard library imports ----
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};
use crate::progress::PHASE_STARTING;
use crate::result::CompressionResult;

/// Temporary identifier of a pending attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(u64);

impl TempId {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStatus {
    Compressing,
    Ready,
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compressing => write!(f, "compressing"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// One placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAttachment {
    pub temp_id: TempId,
    pub name: String,
    pub status: AttachmentStatus,
    pub progress: f64,
    pub phase: String,
    /// Set once the placeholder is `Ready`.
    pub result: Option<CompressionResult>,
}

/// A change to the list, as seen by a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentEvent {
    Added { temp_id: TempId, name: String },
    Progress { temp_id: TempId, progress: f64, phase: String },
    Ready { temp_id: TempId, filename: String, size: usize },
    Failed { temp_id: TempId, name: String, message: String },
    Removed { temp_id: TempId },
}

type Listener = Box<dyn Fn(&AttachmentEvent) + Send + Sync>;

/// The pending-attachment list.
///
/// All methods take `&self`; the list is shared between the jobs of a batch.
/// The listener runs after the list lock is released.
#[derive(Default)]
pub struct PendingAttachments {
    entries: Mutex<Vec<PendingAttachment>>,
    next_id: AtomicU64,
    listener: Option<Listener>,
}

impl fmt::Debug for PendingAttachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAttachments")
            .field("entries", &*self.lock())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl PendingAttachments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A list that reports every change to `listener`.
    #[must_use]
    pub fn with_listener(listener: impl Fn(&AttachmentEvent) + Send + Sync + 'static) -> Self {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingAttachment>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: AttachmentEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    fn compressing<'g>(
        entries: &'g mut [PendingAttachment],
        temp_id: TempId,
        action: &str,
    ) -> CoreResult<&'g mut PendingAttachment> {
        let entry = entries
            .iter_mut()
            .find(|e| e.temp_id == temp_id)
            .ok_or_else(|| CoreError::InvalidTransition(format!("{action}: no attachment {temp_id}")))?;
        if entry.status != AttachmentStatus::Compressing {
            return Err(CoreError::InvalidTransition(format!(
                "{action}: attachment {temp_id} is already {}",
                entry.status
            )));
        }
        Ok(entry)
    }

    /// Adds a `Compressing` placeholder for `name`.
    pub fn begin(&self, name: impl Into<String>) -> TempId {
        let temp_id = TempId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let name = name.into();
        self.lock().push(PendingAttachment {
            temp_id,
            name: name.clone(),
            status: AttachmentStatus::Compressing,
            progress: 0.0,
            phase: PHASE_STARTING.to_string(),
            result: None,
        });
        log::debug!("Attachment {temp_id} ({name}) compressing");
        self.emit(AttachmentEvent::Added { temp_id, name });
        temp_id
    }

    /// Records progress of a `Compressing` placeholder.
    pub fn update_progress(&self, temp_id: TempId, progress: f64, phase: &str) -> CoreResult<()> {
        let progress = progress.clamp(0.0, 1.0);
        {
            let mut entries = self.lock();
            let entry = Self::compressing(&mut entries, temp_id, "progress")?;
            entry.progress = progress;
            entry.phase = phase.to_string();
        }
        self.emit(AttachmentEvent::Progress {
            temp_id,
            progress,
            phase: phase.to_string(),
        });
        Ok(())
    }

    /// `Compressing` to `Ready`, storing the result.
    pub fn complete(&self, temp_id: TempId, result: CompressionResult) -> CoreResult<()> {
        let event = {
            let mut entries = self.lock();
            let entry = Self::compressing(&mut entries, temp_id, "complete")?;
            let event = AttachmentEvent::Ready {
                temp_id,
                filename: result.filename().to_string(),
                size: result.len(),
            };
            entry.status = AttachmentStatus::Ready;
            entry.progress = 1.0;
            entry.phase = crate::progress::PHASE_DONE.to_string();
            entry.result = Some(result);
            event
        };
        log::debug!("Attachment {temp_id} ready");
        self.emit(event);
        Ok(())
    }

    /// Removes a `Compressing` placeholder whose job failed and returns the
    /// message to show the user.
    pub fn fail(&self, temp_id: TempId, error: &CoreError) -> CoreResult<String> {
        let name = {
            let mut entries = self.lock();
            Self::compressing(&mut entries, temp_id, "fail")?;
            let index = entries
                .iter()
                .position(|e| e.temp_id == temp_id)
                .ok_or_else(|| CoreError::InvalidTransition(format!("fail: no attachment {temp_id}")))?;
            entries.remove(index).name
        };
        let message = format!("{name}: {error}");
        log::debug!("Attachment {temp_id} failed: {error}");
        self.emit(AttachmentEvent::Failed {
            temp_id,
            name,
            message: message.clone(),
        });
        Ok(message)
    }

    /// Removes a placeholder in any state, as when the user discards it.
    pub fn remove(&self, temp_id: TempId) -> Option<PendingAttachment> {
        let removed = {
            let mut entries = self.lock();
            let index = entries.iter().position(|e| e.temp_id == temp_id)?;
            entries.remove(index)
        };
        self.emit(AttachmentEvent::Removed { temp_id });
        Some(removed)
    }

    #[must_use]
    pub fn get(&self, temp_id: TempId) -> Option<PendingAttachment> {
        self.lock().iter().find(|e| e.temp_id == temp_id).cloned()
    }

    /// Copy of the list in submission order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingAttachment> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether any job is still running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock()
            .iter()
            .any(|e| e.status == AttachmentStatus::Compressing)
    }

    /// Removes and returns every `Ready` result, in submission order.
    pub fn take_ready(&self) -> Vec<(TempId, CompressionResult)> {
        let mut entries = self.lock();
        let mut ready = Vec::new();
        entries.retain_mut(|e| match (e.status, e.result.take()) {
            (AttachmentStatus::Ready, Some(result)) => {
                ready.push((e.temp_id, result));
                false
            }
            (_, result) => {
                e.result = result;
                true
            }
        });
        ready
    }

    /// Empties the list, as after the message was sent.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
