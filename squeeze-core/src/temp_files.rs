//! Temporary file management utilities.
//!
//! This module provides helpers for the engine scratch directory and for the
//! random identifiers that keep scratch names of concurrent jobs apart. The
//! scratch directory is a `TempDir`, so it is removed when the engine drops.

use crate::error::CoreResult;
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use std::path::Path;
use tempfile::{Builder as TempFileBuilder, TempDir};

/// Creates a temporary directory with prefix inside `parent` (or the system
/// temp dir). Auto-cleaned when dropped.
pub fn create_temp_dir(parent: Option<&Path>, prefix: &str) -> CoreResult<TempDir> {
    match parent {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok(TempFileBuilder::new().prefix(prefix).tempdir_in(dir)?)
        }
        None => Ok(TempFileBuilder::new().prefix(prefix).tempdir()?),
    }
}

/// Returns a random alphanumeric string of `len` characters.
#[must_use]
pub fn random_suffix(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Returns a fresh job identifier, e.g. `job_a1B2c3`.
#[must_use]
pub fn new_job_id() -> String {
    format!("job_{}", random_suffix(6))
}
