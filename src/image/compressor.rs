//! Size-targeting JPEG recompression.
//!
//! Decodes an image, bakes in its EXIF orientation, caps the long edge and
//! then binary-searches the JPEG quality for the largest encoding that still
//! fits the byte budget.

use crate::models::{CompressionRequest, CompressionResult};
use crate::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use std::io::Cursor;
use tracing::debug;

/// Result of [`compress`]: the outcome plus the bytes to persist when changed.
#[derive(Debug)]
pub struct Compressed {
    pub result: CompressionResult,
    pub output: Option<Vec<u8>>,
}

pub fn compress(image_bytes: &[u8], request: &CompressionRequest) -> Result<Compressed> {
    request.validate()?;
    let original_bytes = image_bytes.len() as u64;

    let image = decode_oriented(image_bytes)?.to_rgb8();
    let (image, resized) = fit_long_edge(image, request.max_dim);

    if !resized && original_bytes <= request.skip_under_bytes {
        debug!(
            "Skipping {}x{} image ({} bytes), already under {} bytes",
            image.width(),
            image.height(),
            original_bytes,
            request.skip_under_bytes
        );
        return Ok(Compressed {
            result: CompressionResult::unchanged(original_bytes, image.width(), image.height()),
            output: None,
        });
    }

    let (quality, encoded) = search_quality(
        request.min_quality,
        request.max_quality,
        request.target_bytes,
        |q| encode_jpeg(&image, q),
    )?;

    Ok(Compressed {
        result: CompressionResult {
            changed: true,
            original_bytes,
            final_bytes: encoded.len() as u64,
            quality: Some(quality),
            width: image.width(),
            height: image.height(),
        },
        output: Some(encoded),
    })
}

/// Decode and apply the EXIF orientation so rotation lives in the pixels.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Target dimensions for a long edge of at most `max_dim`, or `None` when the
/// image already fits.
pub fn scaled_dimensions(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dim {
        return None;
    }
    let scale = f64::from(max_dim) / f64::from(longest);
    let scale_edge = |edge: u32| ((f64::from(edge) * scale).round() as u32).max(1);
    Some((scale_edge(width), scale_edge(height)))
}

fn fit_long_edge(image: RgbImage, max_dim: u32) -> (RgbImage, bool) {
    match scaled_dimensions(image.width(), image.height(), max_dim) {
        Some((width, height)) => {
            debug!(
                "Resizing {}x{} -> {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            let resized = image::imageops::resize(&image, width, height, FilterType::Lanczos3);
            (resized, true)
        }
        None => (image, false),
    }
}

/// Find the highest quality in `[min_quality, max_quality]` whose encoding is
/// at most `target_bytes`. Falls back to `min_quality` when nothing fits.
///
/// Assumes encoded size is non-decreasing in quality.
pub fn search_quality<F>(
    min_quality: u8,
    max_quality: u8,
    target_bytes: u64,
    mut encode: F,
) -> Result<(u8, Vec<u8>)>
where
    F: FnMut(u8) -> Result<Vec<u8>>,
{
    // Signed so `hi = mid - 1` cannot underflow.
    let mut lo = i16::from(min_quality);
    let mut hi = i16::from(max_quality);
    let mut best: Option<(u8, Vec<u8>)> = None;

    while lo <= hi {
        let mid = (lo + hi) / 2;
        let quality = mid as u8;
        let encoded = encode(quality)?;
        debug!("quality {} -> {} bytes", quality, encoded.len());

        if encoded.len() as u64 <= target_bytes {
            best = Some((quality, encoded));
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }

    match best {
        Some(found) => Ok(found),
        None => {
            debug!(
                "No quality in {}-{} fits {} bytes, using floor",
                min_quality, max_quality, target_bytes
            );
            Ok((min_quality, encode(min_quality)?))
        }
    }
}

/// Progressive RGB JPEG with 4:2:0 subsampling, optimized Huffman tables and no
/// metadata segments.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let width = u16::try_from(image.width())
        .map_err(|_| Error::Encode(format!("width {} exceeds JPEG limit", image.width())))?;
    let height = u16::try_from(image.height())
        .map_err(|_| Error::Encode(format!("height {} exceeds JPEG limit", image.height())))?;

    let mut buf = Vec::new();
    let mut encoder = Encoder::new(&mut buf, quality);
    encoder.set_sampling_factor(SamplingFactor::R_4_2_0);
    encoder.set_optimized_huffman_tables(true);
    encoder.set_progressive(true);
    encoder.encode(image.as_raw(), width, height, ColorType::Rgb)?;
    Ok(buf)
}
