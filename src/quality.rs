// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Quality validation: MSE, PSNR and SSIM between original and watermarked
//! images.
//!
//! Operates on raw RGB of equal dimensions; a dimension mismatch is fatal.
//! "Perceptually indistinguishable" means `psnr >= 40 && ssim >= 0.95`. The
//! global SSIM runs over the full RGB sample; a windowed variant averages
//! per-window SSIM over non-overlapping 8×8 grayscale tiles and exists for
//! callers that want local structure sensitivity — the global variant is
//! faster and sufficient for the thresholds.

use serde::{Deserialize, Serialize};

use crate::mark::error::MarkError;
use crate::media::DecodedImage;

/// PSNR floor for a perceptually indistinguishable embed, in dB.
pub const PSNR_FLOOR: f64 = 40.0;

/// SSIM floor for a perceptually indistinguishable embed.
pub const SSIM_FLOOR: f64 = 0.95;

const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Quality metrics of a watermarked image against its original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QualityMetrics {
    /// Peak signal-to-noise ratio in dB; +infinity when the images are equal.
    pub psnr: f64,
    /// Global structural similarity, in [-1, 1].
    pub ssim: f64,
    /// Mean squared error over all RGB samples.
    pub mse: f64,
    /// Largest absolute per-channel difference.
    pub max_diff: u8,
}

impl QualityMetrics {
    /// Whether the embed meets the perceptual-indistinguishability floor.
    pub fn meets_floor(&self) -> bool {
        self.psnr >= PSNR_FLOOR && self.ssim >= SSIM_FLOOR
    }
}

fn check_dimensions(a: &DecodedImage, b: &DecodedImage) -> Result<(), MarkError> {
    if a.width != b.width || a.height != b.height {
        return Err(MarkError::DimensionMismatch {
            expected: (a.width, a.height),
            actual: (b.width, b.height),
        });
    }
    Ok(())
}

/// SSIM of two equally sized f64 sample sets.
fn ssim_of(o: &[f64], w: &[f64]) -> f64 {
    let n = o.len() as f64;
    let mu_o: f64 = o.iter().sum::<f64>() / n;
    let mu_w: f64 = w.iter().sum::<f64>() / n;

    let mut var_o = 0.0;
    let mut var_w = 0.0;
    let mut cov = 0.0;
    for (&a, &b) in o.iter().zip(w.iter()) {
        let da = a - mu_o;
        let db = b - mu_w;
        var_o += da * da;
        var_w += db * db;
        cov += da * db;
    }
    var_o /= n;
    var_w /= n;
    cov /= n;

    ((2.0 * mu_o * mu_w + C1) * (2.0 * cov + C2))
        / ((mu_o * mu_o + mu_w * mu_w + C1) * (var_o + var_w + C2))
}

/// Compute PSNR, global SSIM, MSE and max difference.
///
/// # Errors
/// [`MarkError::DimensionMismatch`] when the inputs differ in size.
pub fn quality_metrics(
    original: &DecodedImage,
    watermarked: &DecodedImage,
) -> Result<QualityMetrics, MarkError> {
    check_dimensions(original, watermarked)?;

    let mut sq_sum = 0.0f64;
    let mut max_diff = 0u8;
    for (&a, &b) in original.rgb.iter().zip(watermarked.rgb.iter()) {
        let d = a.abs_diff(b);
        max_diff = max_diff.max(d);
        sq_sum += (d as f64) * (d as f64);
    }
    let mse = sq_sum / original.rgb.len() as f64;
    let psnr = if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (255.0 * 255.0 / mse).log10()
    };

    let o: Vec<f64> = original.rgb.iter().map(|&v| v as f64).collect();
    let w: Vec<f64> = watermarked.rgb.iter().map(|&v| v as f64).collect();
    let ssim = ssim_of(&o, &w);

    Ok(QualityMetrics { psnr, ssim, mse, max_diff })
}

/// Windowed SSIM: average per-window SSIM over non-overlapping 8×8 tiles of
/// the BT.601 grayscale image.
pub fn windowed_ssim(
    original: &DecodedImage,
    watermarked: &DecodedImage,
) -> Result<f64, MarkError> {
    check_dimensions(original, watermarked)?;

    const WIN: usize = 8;
    let width = original.width as usize;
    let gray_o: Vec<f64> = original.grayscale().iter().map(|&v| v as f64).collect();
    let gray_w: Vec<f64> = watermarked.grayscale().iter().map(|&v| v as f64).collect();

    let tiles_x = width / WIN;
    let tiles_y = original.height as usize / WIN;
    if tiles_x == 0 || tiles_y == 0 {
        // Image smaller than a window: fall back to a single global window.
        return Ok(ssim_of(&gray_o, &gray_w));
    }

    let mut sum = 0.0;
    let mut wo = [0.0f64; WIN * WIN];
    let mut ww = [0.0f64; WIN * WIN];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            for r in 0..WIN {
                let row = (ty * WIN + r) * width + tx * WIN;
                wo[r * WIN..(r + 1) * WIN].copy_from_slice(&gray_o[row..row + WIN]);
                ww[r * WIN..(r + 1) * WIN].copy_from_slice(&gray_w[row..row + WIN]);
            }
            sum += ssim_of(&wo, &ww);
        }
    }
    Ok(sum / (tiles_x * tiles_y) as f64)
}
