// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! QIM bit embedding on the luminance plane.
//!
//! One bit per 8×8 block, row-major over the complete blocks: the
//! hopper-selected mid-frequency DCT coefficient of block `i` is forced onto
//! the even- or odd-indexed quantization lattice for bit `b_i` (step
//! `Δ = strength · 255`). Blocks beyond the bit string are left untouched,
//! which keeps the distortion proportional to the payload, not the image.
//!
//! The decoder assumes perfect block alignment. That is a documented weakness
//! against resize and crop, exercised by the robustness harness and never
//! promised as a guarantee.

use crate::dct::{self, BLOCK_SIZE};
use crate::mark::error::MarkError;
use crate::mark::hopper::CoefficientHopper;
use crate::mark::progress;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Quantization step for a given embedding strength.
#[inline]
pub fn quantization_step(strength: f64) -> f64 {
    strength * 255.0
}

/// Apply the QIM lattice rule to one coefficient value.
///
/// `k = round(D / Δ)`; if the parity of `|k|` disagrees with the bit, `|k|`
/// grows by one. The result is `sign(k) · |k| · Δ` with sign(0) treated as +1.
#[inline]
fn quantize_for_bit(coeff: f64, delta: f64, bit: u8) -> f64 {
    let k = (coeff / delta).round() as i64;
    let mut k_abs = k.unsigned_abs();
    if (k_abs % 2) as u8 != bit {
        k_abs += 1;
    }
    let sign = if k < 0 { -1.0 } else { 1.0 };
    sign * k_abs as f64 * delta
}

/// Read the bit carried by one coefficient value.
#[inline]
fn bit_from_coeff(coeff: f64, delta: f64) -> u8 {
    (((coeff / delta).round() as i64).unsigned_abs() % 2) as u8
}

/// Process one block within a row band: level shift, DCT, quantize the
/// hopper position, IDCT, inverse shift, write back clamped.
fn embed_block(band: &mut [f64], width: usize, bx: usize, bit: u8, position: (usize, usize), delta: f64) {
    let mut block = dct::read_block(band, width, BLOCK_SIZE, bx, 0);
    for v in block.iter_mut() {
        *v = dct::level_shift(*v);
    }
    let mut coeffs = dct::dct2(&block);
    let (r, c) = position;
    let idx = r * BLOCK_SIZE + c;
    coeffs[idx] = quantize_for_bit(coeffs[idx], delta, bit);
    let spatial = dct::idct2(&coeffs);
    let mut out = [0.0f64; 64];
    for i in 0..64 {
        out[i] = dct::inverse_level_shift(spatial[i]);
    }
    dct::write_block(band, width, BLOCK_SIZE, bx, 0, &out);
}

/// Embed `bits` into the first `bits.len()` complete blocks, row-major.
///
/// The caller has already checked `bits.len() <= total_blocks`. Cancellation
/// is observed between block rows. With the `parallel` feature the affected
/// row bands run on rayon; each band is a disjoint slice of the plane and the
/// bit-index ↔ block-index mapping is row-major either way, so the parallel
/// path emits the same plane as the serial one.
pub fn embed_bits(
    y: &mut [f64],
    width: usize,
    height: usize,
    bits: &[u8],
    hopper: &CoefficientHopper,
    strength: f64,
) -> Result<(), MarkError> {
    assert!(!bits.is_empty(), "no bits to embed");
    let blocks_wide = width / BLOCK_SIZE;
    let blocks_tall = height / BLOCK_SIZE;
    assert!(bits.len() <= blocks_wide * blocks_tall, "capacity checked by caller");
    let delta = quantization_step(strength);

    // Only the rows that actually carry bits are touched.
    let rows_needed = bits.len().div_ceil(blocks_wide).min(blocks_tall);
    let band_len = width * BLOCK_SIZE;

    progress::set_total(rows_needed as u32);

    let body = |by: usize, band: &mut [f64]| -> Result<(), MarkError> {
        progress::check_cancelled()?;
        for bx in 0..blocks_wide {
            let block_index = by * blocks_wide + bx;
            if block_index >= bits.len() {
                break;
            }
            embed_block(band, width, bx, bits[block_index], hopper.position(block_index), delta);
        }
        progress::advance();
        Ok(())
    };

    #[cfg(feature = "parallel")]
    {
        y[..rows_needed * band_len]
            .par_chunks_mut(band_len)
            .enumerate()
            .try_for_each(|(by, band)| body(by, band))?;
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (by, band) in y[..rows_needed * band_len].chunks_mut(band_len).enumerate() {
            body(by, band)?;
        }
    }

    progress::finish();
    Ok(())
}

/// Extract `nbits` bits from the first `nbits` complete blocks, row-major.
pub fn extract_bits(
    y: &[f64],
    width: usize,
    height: usize,
    nbits: usize,
    hopper: &CoefficientHopper,
    strength: f64,
) -> Result<Vec<u8>, MarkError> {
    assert!(nbits > 0, "no bits to extract");
    let blocks_wide = width / BLOCK_SIZE;
    let blocks_tall = height / BLOCK_SIZE;
    assert!(nbits <= blocks_wide * blocks_tall, "bounds checked by caller");
    let delta = quantization_step(strength);

    let rows_needed = nbits.div_ceil(blocks_wide).min(blocks_tall);
    let mut bits = Vec::with_capacity(nbits);

    progress::set_total(rows_needed as u32);
    for by in 0..rows_needed {
        progress::check_cancelled()?;
        for bx in 0..blocks_wide {
            let block_index = by * blocks_wide + bx;
            if block_index >= nbits {
                break;
            }
            let mut block = dct::read_block(y, width, height, bx, by);
            for v in block.iter_mut() {
                *v = dct::level_shift(*v);
            }
            let coeffs = dct::dct2(&block);
            let (r, c) = hopper.position(block_index);
            bits.push(bit_from_coeff(coeffs[r * BLOCK_SIZE + c], delta));
        }
        progress::advance();
    }
    progress::finish();

    Ok(bits)
}

/// Number of complete 8×8 blocks in a plane of the given dimensions.
pub fn total_blocks(width: u32, height: u32) -> usize {
    (width as usize / BLOCK_SIZE) * (height as usize / BLOCK_SIZE)
}
