//! Tests for the generic file handler
//!
//! These tests verify:
//! - Files under the budget pass through byte for byte
//! - Previewable files are never gzip-wrapped
//! - Compressible files are gzipped with the original MIME type kept
//! - Incompressible input aborts before the whole file is read

use flate2::read::GzDecoder;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use squeeze_core::processing::generic::gzip_within_budget;
use squeeze_core::{
    CancelToken, Config, ContentEncoding, ErrorKind, NullProgressSink, Pipeline, ProgressReporter,
    SourceFile,
};
use std::io::{Cursor, Read};

const BUDGET: u64 = 1_048_576;

/// Seeded random bytes that deflate cannot shrink.
fn noise(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    StdRng::seed_from_u64(7).fill_bytes(&mut out);
    out
}

/// Reader that counts how many bytes were pulled from it.
struct CountingReader {
    inner: Cursor<Vec<u8>>,
    read: u64,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}

#[test]
fn test_small_text_passes_through() -> Result<(), Box<dyn std::error::Error>> {
    let text: Vec<u8> = "line of notes\n".repeat(730).into_bytes();
    let file = SourceFile::from_bytes("notes.txt", "text/plain", text.clone());
    let pipeline = Pipeline::new(Config::default());

    let result = pipeline.compress(&file, &mut NullProgressSink, CancelToken::new())?;
    assert_eq!(result.payload(), &text[..]);
    assert_eq!(result.filename(), "notes.txt");
    assert_eq!(result.mime_type(), "text/plain");
    assert!(result.content_encoding().is_none());
    Ok(())
}

#[test]
fn test_missing_mime_falls_back_to_octet_stream() {
    let file = SourceFile::from_bytes("blob", "", vec![1u8; 100]);
    let pipeline = Pipeline::new(Config::default());
    let result = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap();
    assert_eq!(result.mime_type(), "application/octet-stream");
    assert_eq!(result.len(), 100);
}

#[test]
fn test_compressible_binary_is_gzipped() {
    let data: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 64) as u8).collect();
    let file = SourceFile::from_bytes("logs.tar", "application/x-tar", data.clone());
    let pipeline = Pipeline::new(Config::default());

    let result = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap();
    assert_eq!(result.filename(), "logs.tar.gz");
    assert_eq!(result.mime_type(), "application/x-tar");
    assert_eq!(result.content_encoding(), Some(ContentEncoding::Gzip));
    assert!(result.len() as u64 <= BUDGET);

    let mut decoded = Vec::new();
    GzDecoder::new(result.payload()).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_oversized_previewable_file_is_rejected() {
    let text = "x".repeat(2 * 1024 * 1024);
    let file = SourceFile::from_bytes("big.txt", "text/plain", text.into_bytes());
    let pipeline = Pipeline::new(Config::default());

    let err = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
}

#[test]
fn test_incompressible_input_aborts_early() {
    let file = SourceFile::from_bytes("backup.bin", "application/octet-stream", noise(50 * 1024 * 1024));
    let pipeline = Pipeline::new(Config::default());

    let err = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    assert_eq!(err.to_string(), "Exceeds 1 MB even after gzip (early abort).");
}

#[test]
fn test_early_abort_stops_reading() {
    let total = 50 * 1024 * 1024u64;
    let mut reader = CountingReader {
        inner: Cursor::new(noise(total as usize)),
        read: 0,
    };
    let mut sink = NullProgressSink;
    let mut progress = ProgressReporter::new(&mut sink);

    let err = gzip_within_budget(&mut reader, total, BUDGET, 256 * 1024, 6, &mut progress)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    assert!(
        reader.read < total / 10,
        "read {} of {total} bytes before aborting",
        reader.read
    );
}
