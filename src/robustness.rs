// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Robustness harness: simulated delivery-channel attacks.
//!
//! Re-runs extraction after JPEG recompression, bilinear down-then-up
//! resizing, center cropping, and an "Instagram profile" (long edge to 1080,
//! JPEG Q72), emitting one record per case. The harness documents behavior —
//! including expected failures such as heavy crops desynchronizing the block
//! grid — it does not promise recovery.

use image::imageops::{self, FilterType};
use serde::Serialize;
use tracing::debug;

use crate::mark::error::MarkError;
use crate::mark::pipeline::extract_in_decoded;
use crate::mark::progress;
use crate::media::{self, DecodedImage, OutputFormat};

/// JPEG qualities exercised by the harness.
pub const JPEG_QUALITIES: [u8; 4] = [95, 85, 75, 65];

/// Down-then-up resize scales.
pub const RESIZE_SCALES: [f64; 4] = [0.5, 0.75, 1.25, 1.5];

/// Center-crop fractions, per side.
pub const CROP_FRACTIONS: [f64; 3] = [0.05, 0.10, 0.15];

/// One attack-simulation result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobustnessCase {
    pub transformation: String,
    pub params: String,
    pub detected: bool,
    pub confidence: f64,
    pub errors_found: i32,
    pub errors_corrected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

fn jpeg_cycle(image: &DecodedImage, quality: u8) -> Result<DecodedImage, MarkError> {
    media::decode_image(&media::encode_image(image, OutputFormat::Jpeg(quality))?)
}

fn resize_cycle(image: &DecodedImage, scale: f64) -> DecodedImage {
    let rgb = image.to_rgb_image();
    let (w, h) = (image.width, image.height);
    let sw = ((w as f64 * scale).round() as u32).max(1);
    let sh = ((h as f64 * scale).round() as u32).max(1);
    let down = imageops::resize(&rgb, sw, sh, FilterType::Triangle);
    let up = imageops::resize(&down, w, h, FilterType::Triangle);
    DecodedImage::from_rgb_image(up)
}

fn center_crop(image: &DecodedImage, fraction: f64) -> DecodedImage {
    let rgb = image.to_rgb_image();
    let dx = (image.width as f64 * fraction).round() as u32;
    let dy = (image.height as f64 * fraction).round() as u32;
    let cw = image.width.saturating_sub(2 * dx).max(1);
    let ch = image.height.saturating_sub(2 * dy).max(1);
    DecodedImage::from_rgb_image(imageops::crop_imm(&rgb, dx, dy, cw, ch).to_image())
}

fn instagram_profile(image: &DecodedImage) -> Result<DecodedImage, MarkError> {
    let long_edge = image.width.max(image.height);
    let scaled = if long_edge > 1080 {
        let scale = 1080.0 / long_edge as f64;
        let rgb = image.to_rgb_image();
        let sw = ((image.width as f64 * scale).round() as u32).max(1);
        let sh = ((image.height as f64 * scale).round() as u32).max(1);
        DecodedImage::from_rgb_image(imageops::resize(&rgb, sw, sh, FilterType::Triangle))
    } else {
        image.clone()
    };
    jpeg_cycle(&scaled, 72)
}

/// Run the full attack battery against a watermarked buffer.
///
/// # Errors
/// [`MarkError::InputUnreadable`] for an undecodable input buffer,
/// [`MarkError::Cancelled`] between cases. Individual extraction failures
/// are recorded per case, never raised.
pub fn run_robustness(
    watermarked: &[u8],
    work_id: &str,
    payload_hash: &str,
    payload_len: usize,
    ecc_bytes: usize,
    strength: f64,
) -> Result<Vec<RobustnessCase>, MarkError> {
    progress::init(0);
    let image = media::decode_image(watermarked)?;
    let mut cases = Vec::new();

    let record = |transformation: &str,
                      params: String,
                      transformed: DecodedImage,
                      cases: &mut Vec<RobustnessCase>|
     -> Result<(), MarkError> {
        progress::check_cancelled()?;
        let outcome = extract_in_decoded(
            &transformed,
            work_id,
            payload_hash,
            payload_len,
            ecc_bytes,
            strength,
        )?;
        debug!(
            transformation,
            %params,
            confidence = outcome.confidence,
            "robustness case"
        );
        cases.push(RobustnessCase {
            transformation: transformation.to_string(),
            params,
            detected: outcome.detected(),
            confidence: outcome.confidence,
            errors_found: outcome.errors_found,
            errors_corrected: outcome.errors_corrected,
            payload: outcome.payload,
        });
        Ok(())
    };

    for quality in JPEG_QUALITIES {
        let transformed = jpeg_cycle(&image, quality)?;
        record("jpeg", format!("quality={quality}"), transformed, &mut cases)?;
    }
    for scale in RESIZE_SCALES {
        let transformed = resize_cycle(&image, scale);
        record("resize", format!("scale={scale}"), transformed, &mut cases)?;
    }
    for fraction in CROP_FRACTIONS {
        let transformed = center_crop(&image, fraction);
        record(
            "crop",
            format!("perSide={}%", (fraction * 100.0).round()),
            transformed,
            &mut cases,
        )?;
    }
    let transformed = instagram_profile(&image)?;
    record(
        "instagram",
        "longEdge=1080,quality=72".to_string(),
        transformed,
        &mut cases,
    )?;

    Ok(cases)
}
