// ============================================================================
// squeeze-cli/src/error.rs
// ============================================================================
//
// CLI ERROR HANDLING: Error types and utilities for the CLI
//
// The CLI reports failures through anyhow so that every core error reaches
// the user with the context of what the CLI was doing at the time. A batch in
// which some files failed is its own error, raised after the summary has been
// printed, so the process still exits non-zero.
//
// KEY COMPONENTS:
// - CliResult: Type alias for CLI operations
// - BatchFailed: Raised when at least one file could not be compressed
// - exit_code: Maps an error to the process exit status
//
// AI-ASSISTANT-INFO: CLI error handling utilities

// ---- Standard library imports ----
use std::fmt;

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type for CLI operations.
pub type CliResult<T> = anyhow::Result<T>;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Some files of a batch failed; the per-file messages were already printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFailed {
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for BatchFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} file(s) failed", self.failed, self.total)
    }
}

impl std::error::Error for BatchFailed {}

/// Exit status for a failed command: 2 for partial batch failures, 1 otherwise.
#[must_use]
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<BatchFailed>().is_some() { 2 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let batch = anyhow::Error::new(BatchFailed { failed: 1, total: 3 });
        assert_eq!(batch.to_string(), "1 of 3 file(s) failed");
        assert_eq!(exit_code(&batch), 2);

        let other: CliResult<()> = Err(std::io::Error::other("disk full")).context("Writing out/a.jpg");
        let other = other.unwrap_err();
        assert_eq!(format!("{other:#}"), "Writing out/a.jpg: disk full");
        assert_eq!(exit_code(&other), 1);
    }
}
