//! The compressors and the router that picks one per file.
//!
//! Each compressor takes a [`crate::source::SourceFile`] and a
//! [`crate::job::JobContext`], exhausts its own retries and fallbacks, and
//! returns either a budget-checked [`crate::result::CompressionResult`] or the
//! terminal error. The router never retries on a compressor's behalf.

/// Audio planning and encoding
pub mod audio;

/// Fallback chain for TIFF, oversized and undecodable images
pub mod exotic;

/// Passthrough and streaming gzip
pub mod generic;

/// Still-image fast path
pub mod image;

/// MIME dispatch and the batch runner
pub mod router;

/// Probe-driven video rate control
pub mod video;

pub use router::{BatchOutcome, Pipeline, Route, route_for};
