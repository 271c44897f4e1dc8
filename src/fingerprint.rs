// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Perceptual fingerprints: the aHash / dHash / pHash trio.
//!
//! Each hash is 64 bits, rendered as 16 lowercase hex characters, with
//! row-major MSB-first bit order:
//!
//! - **aHash**: 8×8 grayscale, threshold each pixel at the sample mean.
//! - **dHash**: 9×8 grayscale, sign of each horizontal neighbor difference.
//! - **pHash**: 32×32 grayscale, 8×8 grid of 4×4 tile means (a coarse
//!   low-frequency proxy for the DCT), thresholded at the median of the 63
//!   non-DC cells. The DC-equivalent top-left cell emits bit 0.
//!
//! Similarity is Hamming-based per hash; the combined score weights
//! `0.3 pHash + 0.2 aHash + 0.5 dHash` and feeds the acceptance ladder.

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::media::DecodedImage;

/// Combined-similarity floor for a detection match.
pub const DETECTION_THRESHOLD: f64 = 0.85;

/// The fingerprint trio of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub phash: u64,
    pub ahash: u64,
    pub dhash: u64,
}

/// Acceptance ladder for combined similarity scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRating {
    Excellent,
    Good,
    Fair,
    Marginal,
    None,
}

impl MatchRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            Self::Excellent
        } else if score >= 0.90 {
            Self::Good
        } else if score >= 0.85 {
            Self::Fair
        } else if score >= 0.75 {
            Self::Marginal
        } else {
            Self::None
        }
    }
}

impl Fingerprint {
    /// Compute all three hashes of an image.
    pub fn compute(img: &DecodedImage) -> Self {
        let gray = gray_image(img);
        Self {
            phash: phash(&gray),
            ahash: ahash(&gray),
            dhash: dhash(&gray),
        }
    }

    /// Combined similarity against another fingerprint.
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        0.3 * hash_similarity(self.phash, other.phash)
            + 0.2 * hash_similarity(self.ahash, other.ahash)
            + 0.5 * hash_similarity(self.dhash, other.dhash)
    }

    /// Whether the pair clears the default detection threshold.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.similarity(other) >= DETECTION_THRESHOLD
    }
}

/// Per-hash similarity: `(64 - hamming) / 64`.
pub fn hash_similarity(a: u64, b: u64) -> f64 {
    (64 - (a ^ b).count_ones()) as f64 / 64.0
}

/// Render a 64-bit hash as 16 lowercase hex characters.
pub fn hash_to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Parse a 16-hex-char hash back to its 64-bit value.
pub fn hash_from_hex(s: &str) -> Option<u64> {
    if s.len() != 16 {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

fn gray_image(img: &DecodedImage) -> GrayImage {
    GrayImage::from_raw(img.width, img.height, img.grayscale())
        .expect("grayscale buffer matches dimensions")
}

fn resize_gray(gray: &GrayImage, w: u32, h: u32) -> Vec<u8> {
    imageops::resize(gray, w, h, FilterType::Triangle).into_raw()
}

/// Pack a row-major bit sequence MSB first.
fn pack_bits(bits: impl IntoIterator<Item = bool>) -> u64 {
    let mut hash = 0u64;
    for bit in bits {
        hash = (hash << 1) | u64::from(bit);
    }
    hash
}

/// aHash: 8×8, threshold at the sample mean.
fn ahash(gray: &GrayImage) -> u64 {
    let px = resize_gray(gray, 8, 8);
    let mean = px.iter().map(|&v| v as f64).sum::<f64>() / 64.0;
    pack_bits(px.iter().map(|&v| v as f64 > mean))
}

/// dHash: 9×8, sign of each horizontal neighbor difference.
fn dhash(gray: &GrayImage) -> u64 {
    let px = resize_gray(gray, 9, 8);
    pack_bits((0..8).flat_map(|row| {
        let base = row * 9;
        let px = &px;
        (0..8).map(move |col| px[base + col + 1] > px[base + col])
    }))
}

/// pHash: 32×32, 8×8 grid of 4×4 tile means, median threshold excluding the
/// DC-equivalent top-left cell (which emits bit 0).
fn phash(gray: &GrayImage) -> u64 {
    let px = resize_gray(gray, 32, 32);

    let mut means = [0.0f64; 64];
    for ty in 0..8 {
        for tx in 0..8 {
            let mut sum = 0.0;
            for r in 0..4 {
                for c in 0..4 {
                    sum += px[(ty * 4 + r) * 32 + tx * 4 + c] as f64;
                }
            }
            means[ty * 8 + tx] = sum / 16.0;
        }
    }

    let mut ac: Vec<f64> = means[1..].to_vec();
    ac.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = ac[31]; // median of the 63 non-DC cells

    pack_bits(
        means
            .iter()
            .enumerate()
            .map(|(i, &m)| i != 0 && m > median),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::DecodedImage;

    fn image_of(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> DecodedImage {
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let v = f(x, y);
                rgb.extend_from_slice(&[v, v, v]);
            }
        }
        DecodedImage::from_rgb(width, height, rgb)
    }

    #[test]
    fn deterministic() {
        let img = image_of(100, 80, |x, y| ((x * 3 + y * 7) % 256) as u8);
        let a = Fingerprint::compute(&img);
        let b = Fingerprint::compute(&img);
        assert_eq!(a, b);
    }

    #[test]
    fn identical_images_score_one() {
        let img = image_of(120, 90, |x, y| ((x ^ y) % 200) as u8 + 20);
        let fp = Fingerprint::compute(&img);
        assert_eq!(fp.similarity(&fp), 1.0);
        assert!(fp.matches(&fp));
    }

    #[test]
    fn hex_rendering_roundtrip() {
        for h in [0u64, 1, 0xdead_beef_cafe_f00d, u64::MAX] {
            let hex = hash_to_hex(h);
            assert_eq!(hex.len(), 16);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            assert_eq!(hash_from_hex(&hex), Some(h));
        }
        assert_eq!(hash_from_hex("short"), None);
        assert_eq!(hash_from_hex("zzzzzzzzzzzzzzzz"), None);
    }

    #[test]
    fn hamming_similarity_counts() {
        assert_eq!(hash_similarity(0, 0), 1.0);
        assert_eq!(hash_similarity(0, u64::MAX), 0.0);
        assert_eq!(hash_similarity(0, 1), 63.0 / 64.0);
        assert_eq!(hash_similarity(0b1111, 0), 60.0 / 64.0);
    }

    #[test]
    fn distinct_content_scores_low() {
        let a = image_of(64, 64, |x, _| if x < 32 { 30 } else { 220 });
        let b = image_of(64, 64, |_, y| if y < 32 { 220 } else { 30 });
        let fa = Fingerprint::compute(&a);
        let fb = Fingerprint::compute(&b);
        assert!(fa.similarity(&fb) < DETECTION_THRESHOLD);
    }

    #[test]
    fn small_brightness_shift_stays_similar() {
        let a = image_of(128, 96, |x, y| (20 + (x * 2 + y * 3) % 200) as u8);
        let mut shifted = a.clone();
        for v in shifted.rgb.iter_mut() {
            *v = v.saturating_add(4);
        }
        let fa = Fingerprint::compute(&a);
        let fb = Fingerprint::compute(&shifted);
        // All three hashes are threshold-relative, so a uniform shift
        // barely moves them.
        assert!(fa.similarity(&fb) >= 0.9, "sim={}", fa.similarity(&fb));
    }

    #[test]
    fn rating_ladder_boundaries() {
        assert_eq!(MatchRating::from_score(0.95), MatchRating::Excellent);
        assert_eq!(MatchRating::from_score(0.94), MatchRating::Good);
        assert_eq!(MatchRating::from_score(0.90), MatchRating::Good);
        assert_eq!(MatchRating::from_score(0.86), MatchRating::Fair);
        assert_eq!(MatchRating::from_score(0.80), MatchRating::Marginal);
        assert_eq!(MatchRating::from_score(0.5), MatchRating::None);
    }

    #[test]
    fn phash_dc_cell_is_zero() {
        let img = image_of(64, 64, |x, y| ((x * y) % 251) as u8);
        let fp = Fingerprint::compute(&img);
        // Bit 63 (first packed, row-major MSB) is the DC-equivalent cell.
        assert_eq!(fp.phash >> 63, 0);
    }
}
