//! Tests for configuration loading
//!
//! These tests verify:
//! - Parsing of TOML configuration files, with defaults for missing keys
//! - Rejection of values the compressors cannot run with
//! - SQUEEZE_* environment overrides on top of a loaded file

use squeeze_core::config::{
    ENV_BYTE_BUDGET, ENV_ENGINE_THREADS, ENV_TEMP_DIR, ENV_VIDEO_MODE,
};
use squeeze_core::{Config, ErrorKind, VideoMode};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_file_parsing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("squeeze.toml");
    fs::write(
        &config_path,
        r#"
[budget]
bytes = 524288

[image]
fast_max_side = 1024
ladder_qualities = [0.8, 0.5, 0.3]

[video]
mode = "excerpt"
poster_offsets_secs = [30.0, 2.0]

[generic]
level = 9
"#,
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.budget.bytes, 524_288);
    assert_eq!(config.budget.safety_ratio, 0.85);
    assert_eq!(config.image.fast_max_side, 1024);
    assert_eq!(config.image.ladder_qualities, vec![0.8, 0.5, 0.3]);
    assert_eq!(config.image.fast_quality, 0.75);
    assert_eq!(config.video.mode, VideoMode::Excerpt);
    assert_eq!(config.video.poster_offsets_secs, vec![30.0, 2.0]);
    assert_eq!(config.generic.level, 9);
    assert_eq!(config.audio.max_kbps, 64);
    Ok(())
}

#[test]
fn test_empty_file_gives_defaults() {
    assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = Config::from_toml_str("[budget]\nbytes = 0\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = Config::from_toml_str("[video]\nmode = \"slideshow\"\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = Config::from_toml_str("[generic]\nlevel = 12\n").unwrap_err();
    assert!(err.to_string().contains("generic.level"), "{err}");
}

#[test]
fn test_env_var_overrides() {
    // SAFETY: this is the only test in this binary touching these variables.
    unsafe {
        std::env::set_var(ENV_BYTE_BUDGET, "2097152");
        std::env::set_var(ENV_VIDEO_MODE, "excerpt");
        std::env::set_var(ENV_ENGINE_THREADS, "1");
        std::env::set_var(ENV_TEMP_DIR, "/tmp/squeeze-scratch");
    }

    let mut config = Config::from_toml_str("[budget]\nbytes = 1000\n").unwrap();
    let applied = config.apply_env_overrides();

    unsafe {
        std::env::remove_var(ENV_BYTE_BUDGET);
        std::env::remove_var(ENV_VIDEO_MODE);
        std::env::remove_var(ENV_ENGINE_THREADS);
        std::env::remove_var(ENV_TEMP_DIR);
    }

    applied.unwrap();
    assert_eq!(config.budget.bytes, 2_097_152);
    assert_eq!(config.video.mode, VideoMode::Excerpt);
    assert_eq!(config.engine.threads, Some(1));
    assert_eq!(config.engine.temp_dir, Some(PathBuf::from("/tmp/squeeze-scratch")));
}
