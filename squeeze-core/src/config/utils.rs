//! Configuration utility functions
//!
//! This module provides helper functions for reading configuration
//! overrides from environment variables.

use std::path::PathBuf;

/// Get a u64 value from an environment variable or use the default
pub fn get_env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Get a usize value from an environment variable or use the default
pub fn get_env_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Get a non-empty string value from an environment variable
pub fn get_env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get a path value from an environment variable
pub fn get_env_opt_path(key: &str) -> Option<PathBuf> {
    get_env_opt_string(key).map(PathBuf::from)
}
