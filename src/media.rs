// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Image decode/encode for the watermark pipelines.
//!
//! Accepts JPEG, PNG and WebP input and produces JPEG (default, quality 95)
//! or PNG output. All pipelines operate on 8-bit RGB with alpha stripped;
//! the decoder exposes width, height and the raw interleaved RGB samples.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use crate::mark::error::MarkError;

/// Default JPEG output quality. Robustness is tuned against subsequent
/// JPEG recompression, so the default output format is JPEG itself.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Output encoding for watermarked buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JPEG at the given quality (>= 95 recommended).
    Jpeg(u8),
    /// Lossless PNG.
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jpeg(DEFAULT_JPEG_QUALITY)
    }
}

/// A decoded image: dimensions plus interleaved 8-bit RGB samples.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major interleaved RGB, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl DecodedImage {
    /// Wrap raw RGB samples. Panics if the buffer length does not match.
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        assert_eq!(
            rgb.len(),
            width as usize * height as usize * 3,
            "RGB buffer length mismatch"
        );
        Self { width, height, rgb }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// BT.601 luminance plane: `Y = 0.299 R + 0.587 G + 0.114 B`.
    pub fn luminance(&self) -> Vec<f64> {
        self.rgb
            .chunks_exact(3)
            .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
            .collect()
    }

    /// BT.601 grayscale as 8-bit samples (rounded).
    pub fn grayscale(&self) -> Vec<u8> {
        self.rgb
            .chunks_exact(3)
            .map(|p| {
                let y = 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    pub(crate) fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.rgb.clone())
            .expect("dimensions validated at construction")
    }

    pub(crate) fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, rgb: img.into_raw() }
    }
}

/// Decode JPEG/PNG/WebP bytes to 8-bit RGB (alpha stripped).
///
/// # Errors
/// [`MarkError::InputUnreadable`] for malformed bytes or unsupported formats.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, MarkError> {
    let dynamic = image::load_from_memory(bytes)?;
    Ok(DecodedImage::from_rgb_image(dynamic.to_rgb8()))
}

/// Encode an image in the requested output format.
pub fn encode_image(img: &DecodedImage, format: OutputFormat) -> Result<Vec<u8>, MarkError> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg(quality) => {
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                &img.rgb,
                img.width,
                img.height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut out).write_image(
                &img.rgb,
                img.width,
                img.height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> DecodedImage {
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let v = ((x + y) % 200 + 30) as u8;
                rgb.extend_from_slice(&[v, v / 2 + 40, 255 - v]);
            }
        }
        DecodedImage::from_rgb(width, height, rgb)
    }

    #[test]
    fn png_roundtrip_is_lossless() {
        let img = gradient(37, 21);
        let png = encode_image(&img, OutputFormat::Png).unwrap();
        let back = decode_image(&png).unwrap();
        assert_eq!(back.width, 37);
        assert_eq!(back.height, 21);
        assert_eq!(back.rgb, img.rgb);
    }

    #[test]
    fn jpeg_roundtrip_preserves_dimensions() {
        let img = gradient(64, 48);
        let jpg = encode_image(&img, OutputFormat::Jpeg(95)).unwrap();
        let back = decode_image(&jpg).unwrap();
        assert_eq!((back.width, back.height), (64, 48));
    }

    #[test]
    fn malformed_bytes_rejected() {
        assert!(decode_image(b"not an image").is_err());
        assert!(decode_image(&[]).is_err());
    }

    #[test]
    fn luminance_matches_bt601() {
        let img = DecodedImage::from_rgb(1, 1, vec![100, 150, 200]);
        let y = img.luminance();
        let expected = 0.299 * 100.0 + 0.587 * 150.0 + 0.114 * 200.0;
        assert!((y[0] - expected).abs() < 1e-9);
    }
}
