//! Tests for the raster compressor and the exotic-image chain
//!
//! These tests verify:
//! - The fast path walks its quality ladder before giving up
//! - Common formats and TIFF are handled without the engine
//! - Undecodable images fall through to single-frame engine extraction
//! - An engine that runs out of memory hands over to the large-image decoder

mod common;

use common::{FakeBehavior, fake_services, outputs_ending, value_in};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use squeeze_core::codecs::{ImageCrateCodec, LargeImageDecoder, RasterCodec};
use squeeze_core::error::decode_unsupported;
use squeeze_core::{
    CancelToken, Config, CoreResult, ErrorKind, NullProgressSink, Pipeline, Services, SourceFile,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    }))
}

fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Decodes fine, but every JPEG it writes is over any sane budget.
#[derive(Default)]
struct BloatedCodec {
    qualities: Mutex<Vec<f32>>,
}

impl RasterCodec for BloatedCodec {
    fn decode(&self, _bytes: &[u8]) -> CoreResult<DynamicImage> {
        Ok(gradient(320, 240))
    }

    fn encode_jpeg(&self, _image: &DynamicImage, quality: f32) -> CoreResult<Vec<u8>> {
        self.qualities.lock().unwrap().push(quality);
        Ok(vec![0u8; 2 * 1024 * 1024])
    }
}

/// Refuses to decode anything; encodes with the real codec.
struct UndecodableCodec;

impl RasterCodec for UndecodableCodec {
    fn decode(&self, _bytes: &[u8]) -> CoreResult<DynamicImage> {
        Err(decode_unsupported("no decoder for this format"))
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: f32) -> CoreResult<Vec<u8>> {
        ImageCrateCodec.encode_jpeg(image, quality)
    }
}

/// Large-image decoder that counts its calls.
#[derive(Default)]
struct CountingDecoder {
    calls: AtomicUsize,
    fail: bool,
}

impl LargeImageDecoder for CountingDecoder {
    fn decode(&self, _bytes: &[u8]) -> CoreResult<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(decode_unsupported("not a TIFF"))
        } else {
            Ok(gradient(800, 600))
        }
    }
}

#[test]
fn test_fast_path_exhausts_quality_ladder() {
    let codec = Arc::new(BloatedCodec::default());
    let config = Config::default();
    let services = Services::new(&config).raster_codec(codec.clone());
    let pipeline = Pipeline::with_services(config, services);
    let file = SourceFile::from_bytes("photo.png", "image/png", vec![0u8; 512]);

    let err = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeExceeded);
    assert_eq!(err.to_string(), "Exceeds 1 MB even after downscaling.");

    let qualities = codec.qualities.lock().unwrap().clone();
    assert_eq!(qualities.len(), 5);
    for (got, want) in qualities.iter().zip([0.75, 0.65, 0.55, 0.45, 0.35]) {
        assert!((got - want).abs() < 1e-6, "{got} != {want}");
    }
}

#[test]
fn test_png_becomes_jpeg() -> Result<(), Box<dyn std::error::Error>> {
    let png = encoded(&gradient(1600, 900), ImageFormat::Png);
    let file = SourceFile::from_bytes("photo.png", "image/png", png);
    let pipeline = Pipeline::new(Config::default());

    let result = pipeline.compress(&file, &mut NullProgressSink, CancelToken::new())?;
    assert_eq!(result.filename(), "photo.jpg");
    assert_eq!(result.mime_type(), "image/jpeg");
    assert_eq!(&result.payload()[..2], &[0xFF, 0xD8]);

    let decoded = ImageCrateCodec.decode(result.payload())?;
    assert_eq!((decoded.width(), decoded.height()), (1280, 720));
    Ok(())
}

#[test]
fn test_tiff_is_decoded_natively() {
    let tiff = encoded(&gradient(400, 300), ImageFormat::Tiff);
    let file = SourceFile::from_bytes("scan.tiff", "image/tiff", tiff);
    let pipeline = Pipeline::new(Config::default());

    let result = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap();
    assert_eq!(result.filename(), "scan.jpg");
    assert_eq!(result.mime_type(), "image/jpeg");
}

#[test]
fn test_undecodable_image_uses_engine_frame() {
    let (services, invocations) = fake_services(FakeBehavior::default());
    let services = services.raster_codec(Arc::new(UndecodableCodec));
    let pipeline = Pipeline::with_services(Config::default(), services);
    let file = SourceFile::from_bytes("odd.heic", "image/heic", vec![5u8; 4096]);

    let result = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap();
    assert_eq!(result.filename(), "odd.jpg");
    assert_eq!(result.len(), 20_000);

    let frames = outputs_ending(&invocations, "out.jpg");
    assert_eq!(frames.len(), 1);
    assert_eq!(value_in(&frames[0], "-q:v"), Some("8"));
    assert_eq!(value_in(&frames[0], "-frames:v"), Some("1"));
}

#[test]
fn test_engine_oom_falls_back_to_large_decoder() {
    let behavior = FakeBehavior {
        frame_failure: Some("RuntimeError: Aborted()".to_string()),
        ..FakeBehavior::default()
    };
    let decoder = Arc::new(CountingDecoder::default());
    let (services, _) = fake_services(behavior);
    let services = services
        .raster_codec(Arc::new(UndecodableCodec))
        .large_image_decoder(decoder.clone());
    let pipeline = Pipeline::with_services(Config::default(), services);
    let file = SourceFile::from_bytes("odd.heic", "image/heic", vec![5u8; 4096]);

    let result = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap();
    assert_eq!(result.filename(), "odd.jpg");
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_exhausted_chain_asks_for_export() {
    let behavior = FakeBehavior {
        frame_failure: Some("RuntimeError: Aborted()".to_string()),
        ..FakeBehavior::default()
    };
    let decoder = Arc::new(CountingDecoder {
        fail: true,
        ..CountingDecoder::default()
    });
    let (services, _) = fake_services(behavior);
    let services = services
        .raster_codec(Arc::new(UndecodableCodec))
        .large_image_decoder(decoder);
    let pipeline = Pipeline::with_services(Config::default(), services);
    let file = SourceFile::from_bytes("odd.heic", "image/heic", vec![5u8; 4096]);

    let err = pipeline
        .compress(&file, &mut NullProgressSink, CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeUnsupported);
    assert!(
        err.to_string()
            .contains("odd.heic is unsuitable for in-environment conversion under 1 MB"),
        "{err}"
    );
}
