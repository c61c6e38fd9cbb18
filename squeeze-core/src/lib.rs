//! Core library that fits arbitrary user files under a hard byte budget.
//!
//! Images are re-encoded as JPEG, audio as Opus and video as VP8/Opus in WebM,
//! with ffmpeg as the codec engine; anything else is passed through or
//! gzipped. Every result is checked against the budget before it is returned.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use squeeze_core::{CancelToken, ConfigBuilder, Pipeline, SourceFile};
//! use std::path::Path;
//!
//! let config = ConfigBuilder::new().byte_budget(1_048_576).build();
//! let pipeline = Pipeline::new(config);
//!
//! let file = SourceFile::from_path(Path::new("holiday.mp4"), "video/mp4").unwrap();
//! let mut progress = |fraction: f64, phase: &str| println!("{:>3.0}% {phase}", fraction * 100.0);
//! let result = pipeline.compress(&file, &mut progress, CancelToken::new()).unwrap();
//!
//! assert!(result.len() <= 1_048_576);
//! println!("{} ({})", result.filename(), result.mime_type());
//! ```

pub mod attachments;
pub mod codecs;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod processing;
pub mod progress;
pub mod result;
pub mod source;
pub mod temp_files;
pub mod utils;

// Re-exports for public API
pub use attachments::{AttachmentEvent, AttachmentStatus, PendingAttachment, PendingAttachments, TempId};
pub use config::{Config, ConfigBuilder, VideoMode};
pub use engine::{Capabilities, CodecEngine, EngineBuild, EngineHandle, MediaProbe, load};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use job::{CancelToken, Services};
pub use processing::{BatchOutcome, Pipeline, Route, route_for};
pub use progress::{NullProgressSink, ProgressReporter, ProgressSink};
pub use result::{CompressionResult, ContentEncoding};
pub use source::SourceFile;
pub use utils::{format_budget, format_bytes};
