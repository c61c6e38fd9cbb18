// ============================================================================
// squeeze-core/src/codecs.rs
// ============================================================================
//
// IMAGE CODECS: Raster Decode/Encode and the Large-Image Decoder
//
// The still-image compressors depend on two collaborators: a general raster
// codec (decode anything common, encode JPEG) and a specialised decoder for
// archival TIFF files, including 64-bit-offset BigTIFF, that the general
// codec refuses or cannot size.
//
// KEY COMPONENTS:
// - RasterCodec / ImageCrateCodec: decode via `image`, JPEG encode
// - LargeImageDecoder / TiffDecoder: `tiff` crate with unlimited limits
// - sniff_tiff: classic vs BigTIFF header detection
// - fit_long_edge: uniform downscale, never upscaling
//
// AI-ASSISTANT-INFO: Image decode/encode traits and their production implementations

// ---- External crate imports ----
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, ImageReader, Luma, Rgb, RgbImage,
    Rgba, RgbaImage,
};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};

// ---- Standard library imports ----
use std::io::Cursor;

// ---- Internal crate imports ----
use crate::error::{CoreResult, decode_unsupported};

// ============================================================================
// RASTER CODEC
// ============================================================================

/// General-purpose raster decode and JPEG encode.
pub trait RasterCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> CoreResult<DynamicImage>;

    /// Encodes as baseline JPEG; `quality` is in `(0, 1]`.
    fn encode_jpeg(&self, image: &DynamicImage, quality: f32) -> CoreResult<Vec<u8>>;
}

/// [`RasterCodec`] backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl RasterCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> CoreResult<DynamicImage> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()
            .map_err(|e| decode_unsupported(e.to_string()))
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: f32) -> CoreResult<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality));
        // JPEG has no alpha channel.
        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        Ok(out)
    }
}

/// Maps a `(0, 1]` quality to the encoder's 1-100 scale.
#[must_use]
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Downscales uniformly so the long edge is at most `max_side`. Never upscales.
#[must_use]
pub fn fit_long_edge(image: &DynamicImage, max_side: u32) -> DynamicImage {
    let long_edge = image.width().max(image.height());
    if long_edge <= max_side || max_side == 0 {
        return image.clone();
    }
    image.resize(max_side, max_side, FilterType::Triangle)
}

// ============================================================================
// LARGE-IMAGE DECODER
// ============================================================================

/// Decoder for inputs the general codec cannot handle (huge or BigTIFF).
pub trait LargeImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> CoreResult<DynamicImage>;
}

/// [`LargeImageDecoder`] for classic TIFF and BigTIFF via the `tiff` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffDecoder;

impl LargeImageDecoder for TiffDecoder {
    fn decode(&self, bytes: &[u8]) -> CoreResult<DynamicImage> {
        let tiff_err = |e: tiff::TiffError| decode_unsupported(format!("TIFF decode failed: {e}"));

        let mut decoder = Decoder::new(Cursor::new(bytes))
            .map_err(tiff_err)?
            .with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions().map_err(tiff_err)?;
        let color = decoder.colortype().map_err(tiff_err)?;
        let pixels = decoder.read_image().map_err(tiff_err)?;

        let image = match (color, pixels) {
            (ColorType::Gray(8), DecodingResult::U8(buf)) => {
                GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
            }
            (ColorType::GrayA(8), DecodingResult::U8(buf)) => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            (ColorType::RGB(8), DecodingResult::U8(buf)) => {
                RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
            }
            (ColorType::RGBA(8), DecodingResult::U8(buf)) => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            (ColorType::CMYK(8), DecodingResult::U8(buf)) => {
                RgbImage::from_raw(width, height, cmyk_to_rgb(&buf)).map(DynamicImage::ImageRgb8)
            }
            (ColorType::Gray(16), DecodingResult::U16(buf)) => {
                ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageLuma16)
            }
            (ColorType::RGB(16), DecodingResult::U16(buf)) => {
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgb16)
            }
            (ColorType::RGBA(16), DecodingResult::U16(buf)) => {
                ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgba16)
            }
            (other, _) => {
                return Err(decode_unsupported(format!(
                    "unsupported TIFF color type {other:?}"
                )));
            }
        };

        image.ok_or_else(|| decode_unsupported("TIFF pixel buffer does not match its dimensions"))
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            [px[0], px[1], px[2]].map(|c| ((255 - u16::from(c)) * k / 255) as u8)
        })
        .collect()
}

// ============================================================================
// FORMAT SNIFFING
// ============================================================================

/// TIFF container variant found in a file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffKind {
    Classic,
    /// 64-bit offsets (version 43).
    Big,
}

/// Detects a TIFF header (`II*\0`, `MM\0*` or their BigTIFF forms).
#[must_use]
pub fn sniff_tiff(head: &[u8]) -> Option<TiffKind> {
    if head.len() < 4 {
        return None;
    }
    let version = match &head[..2] {
        b"II" => u16::from_le_bytes([head[2], head[3]]),
        b"MM" => u16::from_be_bytes([head[2], head[3]]),
        _ => return None,
    };
    match version {
        42 => Some(TiffKind::Classic),
        43 => Some(TiffKind::Big),
        _ => None,
    }
}
