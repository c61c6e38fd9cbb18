// ============================================================================
// squeeze-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Custom Error Types for the Compression Pipeline
//
// This module defines the error types used throughout the squeeze-core library.
// Every compressor exhausts its own retries and fallbacks internally; only a
// terminal failure leaves a compressor, and the router hands it to the caller
// unchanged.
//
// KEY COMPONENTS:
// - CoreError: Enum of all failures a job can end with
// - ErrorKind: Flat classification used by callers and the state machine
// - CoreResult: Type alias for Result<T, CoreError>
// - classify_engine_failure: Maps engine stderr to a specific failure class
//
// AI-ASSISTANT-INFO: Error handling for squeeze-core

use std::io;
use thiserror::Error;

/// Custom error type for squeeze-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The codec engine could not be initialized. Fatal for every job.
    #[error("Codec engine failed to initialize: {0}")]
    EngineInit(String),

    /// The input could not be decoded by the strategy that tried it.
    #[error("Unsupported input: {0}")]
    DecodeUnsupported(String),

    /// The output is still larger than the byte budget after all retries.
    #[error("{0}")]
    SizeExceeded(String),

    /// The engine aborted with a memory-exhaustion class error.
    #[error("Codec engine ran out of memory: {0}")]
    OutOfMemory(String),

    /// Even the minimum-quality plan cannot fit under the budget.
    #[error("{0}")]
    InfeasibleUnderBudget(String),

    /// A stream the invocation mapped does not exist in the input.
    #[error("Missing stream: {0}")]
    MissingStream(String),

    /// Any other engine failure, with the tail of its log output.
    #[error("Codec engine error: {message}\n--- engine log tail ---\n{log_tail}")]
    Engine { message: String, log_tail: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid attachment transition: {0}")]
    InvalidTransition(String),
}

/// Flat classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EngineInit,
    DecodeUnsupported,
    SizeExceeded,
    OutOfMemory,
    InfeasibleUnderBudget,
    MissingStream,
    Engine,
    Cancelled,
    Io,
    Config,
    InvalidTransition,
}

impl CoreError {
    /// Returns the kind of this error, for callers that present failures.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EngineInit(_) => ErrorKind::EngineInit,
            Self::DecodeUnsupported(_) | Self::Image(_) => ErrorKind::DecodeUnsupported,
            Self::SizeExceeded(_) => ErrorKind::SizeExceeded,
            Self::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Self::InfeasibleUnderBudget(_) => ErrorKind::InfeasibleUnderBudget,
            Self::MissingStream(_) => ErrorKind::MissingStream,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
        }
    }

    /// Whether the job must stop immediately instead of trying a fallback.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EngineInit | ErrorKind::InfeasibleUnderBudget | ErrorKind::Cancelled
        )
    }
}

/// Result type for squeeze-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Creates a `SizeExceeded` error with the given message.
pub fn size_exceeded(message: impl Into<String>) -> CoreError {
    CoreError::SizeExceeded(message.into())
}

/// Creates a `DecodeUnsupported` error with the given message.
pub fn decode_unsupported(message: impl Into<String>) -> CoreError {
    CoreError::DecodeUnsupported(message.into())
}

// ============================================================================
// ENGINE FAILURE CLASSIFICATION
// ============================================================================

const OUT_OF_MEMORY_SIGNATURES: &[&str] = &[
    "index out of bounds",
    "aborted()",
    "cannot allocate memory",
    "out of memory",
    "memory allocation failed",
];

const NO_IMAGE_STREAM_SIGNATURES: &[&str] = &[
    "unknown input format",
    "could not find codec",
    "invalid data",
    "unspecified size",
    "does not contain any stream",
];

const MISSING_STREAM_SIGNATURES: &[&str] = &[
    "stream specifier",
    "matches no streams",
    "cannot find a stream",
];

/// Maps a failed engine invocation to the most specific error class.
///
/// The signatures are matched case-insensitively against the collected log
/// output. Memory exhaustion wins over everything else since an aborted engine
/// often prints decode noise before dying.
pub fn classify_engine_failure(message: &str, log_tail: &str) -> CoreError {
    let haystack = format!("{message}\n{log_tail}").to_lowercase();
    let matches_any = |sigs: &[&str]| sigs.iter().any(|sig| haystack.contains(sig));

    if matches_any(OUT_OF_MEMORY_SIGNATURES) {
        CoreError::OutOfMemory(message.to_string())
    } else if matches_any(MISSING_STREAM_SIGNATURES) {
        CoreError::MissingStream(message.to_string())
    } else if matches_any(NO_IMAGE_STREAM_SIGNATURES) {
        CoreError::DecodeUnsupported(message.to_string())
    } else {
        CoreError::Engine {
            message: message.to_string(),
            log_tail: log_tail.to_string(),
        }
    }
}
