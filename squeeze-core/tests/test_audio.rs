//! Tests for the audio planner and encoder
//!
//! These tests verify:
//! - Short tracks are capped at the maximum bitrate
//! - Oversized outputs are re-encoded at a lower bitrate
//! - Retries stop at the minimum bitrate with a size error

mod common;

use common::{FakeBehavior, fake_pipeline, kbps, outputs_ending};
use squeeze_core::{CancelToken, Config, ErrorKind, NullProgressSink, SourceFile};

fn song() -> SourceFile {
    SourceFile::from_bytes("song.mp3", "audio/mpeg", vec![3u8; 2048])
}

fn song_behavior(duration: f64, full_factor: f64) -> FakeBehavior {
    let mut behavior = FakeBehavior {
        full_factor,
        ..FakeBehavior::default()
    };
    behavior.probe.duration_secs = Some(duration);
    behavior
}

#[test]
fn test_short_track_uses_max_bitrate() -> Result<(), Box<dyn std::error::Error>> {
    let (pipeline, invocations) = fake_pipeline(Config::default(), song_behavior(30.0, 1.0));
    let result = pipeline.compress(&song(), &mut NullProgressSink, CancelToken::new())?;

    assert_eq!(result.filename(), "song.webm");
    assert_eq!(result.mime_type(), "audio/webm");
    assert!(result.len() <= 1_048_576);

    let encodes = outputs_ending(&invocations, "out.webm");
    assert_eq!(encodes.len(), 1);
    assert_eq!(kbps(&encodes[0], "-b:a"), 64);
    assert!(encodes[0].iter().any(|a| a == "-vn"));
    Ok(())
}

#[test]
fn test_overshoot_retries_lower() {
    let (pipeline, invocations) = fake_pipeline(Config::default(), song_behavior(300.0, 1.1));
    let result = pipeline
        .compress(&song(), &mut NullProgressSink, CancelToken::new())
        .unwrap();
    assert!(result.len() <= 1_048_576);

    let rates: Vec<u32> = outputs_ending(&invocations, "out.webm")
        .iter()
        .map(|args| kbps(args, "-b:a"))
        .collect();
    assert_eq!(rates, vec![27, 20]);
}

#[test]
fn test_retries_exhausted() {
    let (pipeline, invocations) = fake_pipeline(Config::default(), song_behavior(300.0, 10.0));
    let err = pipeline
        .compress(&song(), &mut NullProgressSink, CancelToken::new())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    assert_eq!(err.to_string(), "Audio exceeds 1 MB even after multiple passes.");

    let rates: Vec<u32> = outputs_ending(&invocations, "out.webm")
        .iter()
        .map(|args| kbps(args, "-b:a"))
        .collect();
    assert_eq!(rates, vec![27, 20, 15, 12]);
}
