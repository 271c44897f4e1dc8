// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Reed-Solomon error correction over GF(2^8).
//!
//! RS(255, k) with the primitive polynomial 0x11D (x^8+x^4+x^3+x^2+1),
//! generator roots α^0..α^{parity-1} with α = 2. Systematic encoding appends
//! `parity` bytes; decoding runs syndromes, Berlekamp-Massey, Chien search and
//! Forney, then re-checks the syndromes — a correction that leaves residual
//! syndromes is reported as a decode failure, never as a silent success.
//!
//! The watermark payloads here are a few dozen bytes, so a codec instance
//! covers a single shortened block. Correction capacity is t = parity / 2
//! symbol errors. Message bytes enter and leave the bit layer MSB first.

use std::sync::OnceLock;

/// Primitive polynomial for GF(2^8): x^8 + x^4 + x^3 + x^2 + 1 = 0x11D.
const PRIM_POLY: u16 = 0x11D;

/// Maximum RS block size.
const N_MAX: usize = 255;

/// Parity lengths admitted by the embedding contract.
pub const ADMITTED_PARITY: [usize; 3] = [8, 12, 16];

/// Default parity for still images (t = 4).
pub const IMAGE_PARITY: usize = 8;

/// Default parity for video frames (t = 6).
pub const VIDEO_PARITY: usize = 12;

// --- GF(2^8) arithmetic ---

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn build_gf_tables() -> GfTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..255u16 {
        exp[i as usize] = x as u8;
        exp[(i + 255) as usize] = x as u8; // wrap-around for easy modular access
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIM_POLY;
        }
    }
    exp[510] = exp[0];
    exp[511] = exp[1];

    GfTables { exp, log }
}

fn gf_tables() -> &'static GfTables {
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(build_gf_tables)
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = gf_tables();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

fn gf_add(a: u8, b: u8) -> u8 {
    a ^ b
}

fn gf_inv(a: u8) -> u8 {
    assert_ne!(a, 0, "cannot invert zero in GF(2^8)");
    let t = gf_tables();
    t.exp[255 - t.log[a as usize] as usize]
}

/// α^p, with p taken mod 255.
fn alpha_pow(p: usize) -> u8 {
    gf_tables().exp[p % 255]
}

/// α^{-p}.
fn alpha_pow_neg(p: usize) -> u8 {
    gf_tables().exp[(255 - p % 255) % 255]
}

/// Horner evaluation of an ascending-power polynomial at x.
fn poly_eval_asc(poly: &[u8], x: u8) -> u8 {
    poly.iter()
        .rev()
        .fold(0u8, |acc, &coef| gf_add(gf_mul(acc, x), coef))
}

/// Product of two ascending-power polynomials, truncated below x^cap.
fn poly_mul_mod(a: &[u8], b: &[u8], cap: usize) -> Vec<u8> {
    let mut out = vec![0u8; cap];
    for (i, &ac) in a.iter().enumerate().take(cap) {
        if ac == 0 {
            continue;
        }
        for (j, &bc) in b.iter().enumerate().take(cap - i) {
            out[i + j] ^= gf_mul(ac, bc);
        }
    }
    out
}

/// g(x) = prod_{i=0}^{parity-1} (x - α^i), returned highest-degree-first
/// for the encoder's shift-register taps.
fn build_gen_poly(parity: usize) -> Vec<u8> {
    let mut gen = vec![1u8];
    for i in 0..parity {
        let root = alpha_pow(i);
        let mut next = vec![0u8; gen.len() + 1];
        for (j, &coef) in gen.iter().enumerate() {
            next[j + 1] ^= coef;
            next[j] ^= gf_mul(root, coef);
        }
        gen = next;
    }
    gen.reverse();
    gen
}

/// Error returned when RS decoding fails (too many errors).
#[derive(Debug, PartialEq, Eq)]
pub struct RsDecodeError;

impl core::fmt::Display for RsDecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Reed-Solomon: too many errors to correct")
    }
}

impl std::error::Error for RsDecodeError {}

/// A Reed-Solomon codec with a fixed parity length.
///
/// Codecs are per-call values deriving all state from `parity`; the generator
/// polynomial is 9-17 coefficients, cheap enough to build per instance.
#[derive(Debug, Clone)]
pub struct RsCodec {
    parity: usize,
    gen: Vec<u8>,
}

impl RsCodec {
    /// Create a codec with `parity` parity bytes (even, 2..=64).
    ///
    /// The embedding contract admits [`ADMITTED_PARITY`]; other even values
    /// are accepted for the robustness harness's sweeps.
    pub fn new(parity: usize) -> Self {
        assert!(parity >= 2 && parity <= 64, "parity {parity} out of range");
        assert!(parity % 2 == 0, "parity must be even");
        Self {
            parity,
            gen: build_gen_poly(parity),
        }
    }

    pub fn parity(&self) -> usize {
        self.parity
    }

    /// Correction capacity in symbol errors: t = parity / 2.
    pub fn t(&self) -> usize {
        self.parity / 2
    }

    /// Systematic encode: returns `data || parity`.
    ///
    /// # Panics
    /// Panics if `data.len() + parity > 255` (single-block codec).
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        assert!(
            data.len() + self.parity <= N_MAX,
            "data length {} exceeds single-block capacity for parity {}",
            data.len(),
            self.parity
        );

        let mut shift_reg = vec![0u8; self.parity];
        for &byte in data {
            let feedback = gf_add(byte, shift_reg[0]);
            for j in 0..self.parity - 1 {
                shift_reg[j] = gf_add(shift_reg[j + 1], gf_mul(feedback, self.gen[j + 1]));
            }
            shift_reg[self.parity - 1] = gf_mul(feedback, self.gen[self.parity]);
        }

        let mut encoded = Vec::with_capacity(data.len() + self.parity);
        encoded.extend_from_slice(data);
        encoded.extend_from_slice(&shift_reg);
        encoded
    }

    /// Decode a received block of `data_len + parity` bytes.
    ///
    /// Returns `(corrected data, symbol errors corrected)`.
    ///
    /// # Errors
    /// [`RsDecodeError`] when more than t symbols are corrupted, when an
    /// error locator root falls in the shortened padding region, or when the
    /// verification syndrome pass is non-zero after correction.
    pub fn decode(&self, received: &[u8], data_len: usize) -> Result<(Vec<u8>, usize), RsDecodeError> {
        let block_len = data_len + self.parity;
        assert_eq!(
            received.len(),
            block_len,
            "received length {} != expected {}",
            received.len(),
            block_len
        );

        // Shortened code: conceptually zero-padded at the front to 255 symbols.
        let padding = N_MAX - block_len;
        let mut full_block = vec![0u8; N_MAX];
        full_block[padding..].copy_from_slice(received);

        let syndromes = self.syndromes(&full_block);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok((received[..data_len].to_vec(), 0));
        }

        let locator = error_locator(&syndromes);
        let num_errors = locator.len() - 1;
        if num_errors == 0 || num_errors > self.t() {
            return Err(RsDecodeError);
        }

        let mut corrected = full_block;
        for (index, magnitude) in solve_errors(&locator, &syndromes).ok_or(RsDecodeError)? {
            if index < padding {
                // Error located in the zero-padded region — cannot be real.
                return Err(RsDecodeError);
            }
            corrected[index] ^= magnitude;
        }

        // Verify the correction actually zeroed the syndromes.
        if self.syndromes(&corrected).iter().any(|&s| s != 0) {
            return Err(RsDecodeError);
        }

        Ok((corrected[padding..padding + data_len].to_vec(), num_errors))
    }

    /// Encoded length for a given data length.
    pub fn encoded_len(&self, data_len: usize) -> usize {
        data_len + self.parity
    }

    /// S_i = r(α^i) for i = 0..parity-1 (FCR = 0). The received block is
    /// read as a polynomial with its first symbol at the highest degree.
    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        (0..self.parity)
            .map(|i| {
                let x = alpha_pow(i);
                received
                    .iter()
                    .fold(0u8, |acc, &sym| gf_add(gf_mul(acc, x), sym))
            })
            .collect()
    }
}

/// Berlekamp-Massey: the shortest LFSR generating the syndrome sequence.
///
/// Returns the error locator Λ(x) in ascending powers with Λ(0) = 1 and
/// trailing zero coefficients trimmed, so `len() - 1` is the claimed error
/// count.
fn error_locator(syndromes: &[u8]) -> Vec<u8> {
    let mut locator = vec![1u8];
    // The locator saved at the last length change, its discrepancy, and the
    // number of steps since (the x^gap shift applied on reuse).
    let mut support = vec![1u8];
    let mut support_scale = 1u8;
    let mut gap = 1usize;
    let mut length = 0usize;

    for step in 0..syndromes.len() {
        let discrepancy = locator
            .iter()
            .enumerate()
            .take(step + 1)
            .fold(0u8, |acc, (i, &coef)| acc ^ gf_mul(coef, syndromes[step - i]));
        if discrepancy == 0 {
            gap += 1;
            continue;
        }

        // updated = Λ(x) − (δ/δ_support) · x^gap · support(x)
        let scale = gf_mul(discrepancy, gf_inv(support_scale));
        let mut updated = locator.clone();
        if updated.len() < support.len() + gap {
            updated.resize(support.len() + gap, 0);
        }
        for (i, &coef) in support.iter().enumerate() {
            updated[i + gap] ^= gf_mul(scale, coef);
        }

        if 2 * length <= step {
            support = std::mem::replace(&mut locator, updated);
            support_scale = discrepancy;
            length = step + 1 - length;
            gap = 1;
        } else {
            locator = updated;
            gap += 1;
        }
    }

    while locator.len() > 1 && locator.last() == Some(&0) {
        locator.pop();
    }
    locator
}

/// Locate errors and compute their magnitudes in one pass over the
/// (conceptually full) 255-symbol block.
///
/// A locator root at x = α^{-p} marks an error at symbol index `254 - p`;
/// its magnitude follows Forney with FCR = 0:
/// `e = X · Ω(X^{-1}) / Λ'(X^{-1})` with X = α^p and Ω = S·Λ mod x^{2t}.
/// Returns `(symbol index, magnitude)` pairs, or `None` when the root count
/// disagrees with the locator degree or a derivative vanishes.
fn solve_errors(locator: &[u8], syndromes: &[u8]) -> Option<Vec<(usize, u8)>> {
    let omega = poly_mul_mod(syndromes, locator, syndromes.len());

    let expected = locator.len() - 1;
    let mut corrections = Vec::with_capacity(expected);
    for pos in 0..N_MAX {
        let x_inv = alpha_pow_neg(pos);
        if poly_eval_asc(locator, x_inv) != 0 {
            continue;
        }

        // Λ'(x) over GF(2^m) keeps only odd-degree terms:
        // Λ'(x_inv) = Σ_{odd i} Λ_i · x_inv^{i-1}, walked in steps of x_inv².
        let step = gf_mul(x_inv, x_inv);
        let mut x_pow = 1u8;
        let mut derivative = 0u8;
        for i in (1..locator.len()).step_by(2) {
            derivative ^= gf_mul(locator[i], x_pow);
            x_pow = gf_mul(x_pow, step);
        }
        if derivative == 0 {
            return None;
        }

        let magnitude = gf_mul(
            alpha_pow(pos),
            gf_mul(poly_eval_asc(&omega, x_inv), gf_inv(derivative)),
        );
        corrections.push((N_MAX - 1 - pos, magnitude));
    }

    if corrections.len() != expected {
        return None;
    }
    Some(corrections)
}

// --- Bit packing ---

/// Expand bytes to bits, MSB first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bp in (0..8).rev() {
            bits.push((byte >> bp) & 1);
        }
    }
    bits
}

/// Pack bits (MSB first) back into bytes. A trailing partial byte is
/// zero-padded at the least significant end.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= (bit & 1) << (7 - i);
        }
        bytes.push(byte);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gf_mul_identity_and_zero() {
        for a in 0..=255u16 {
            assert_eq!(gf_mul(a as u8, 1), a as u8);
            assert_eq!(gf_mul(1, a as u8), a as u8);
            assert_eq!(gf_mul(a as u8, 0), 0);
            assert_eq!(gf_mul(0, a as u8), 0);
        }
    }

    #[test]
    fn gf_inverse_roundtrip() {
        for a in 1..=255u16 {
            let inv = gf_inv(a as u8);
            assert_eq!(gf_mul(a as u8, inv), 1, "a={a}, inv={inv}");
        }
    }

    #[test]
    fn generator_polynomial_roots() {
        for &parity in &ADMITTED_PARITY {
            let codec = RsCodec::new(parity);
            assert_eq!(codec.gen.len(), parity + 1);
            assert_eq!(codec.gen[0], 1, "generator must be monic");
            for i in 0..parity {
                let root = alpha_pow(i);
                let value = codec
                    .gen
                    .iter()
                    .fold(0u8, |acc, &coef| gf_add(gf_mul(acc, root), coef));
                assert_eq!(value, 0, "root α^{i} failed");
            }
        }
    }

    #[test]
    fn encode_decode_no_errors() {
        let codec = RsCodec::new(8);
        let data = b"(c)AB|Alex|GJP-MEDIA-2026-XYZ";
        let encoded = codec.encode(data);
        assert_eq!(encoded.len(), data.len() + 8);
        let (decoded, errors) = codec.decode(&encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(errors, 0);
    }

    #[test]
    fn corrects_up_to_t_errors() {
        for &parity in &ADMITTED_PARITY {
            let codec = RsCodec::new(parity);
            let data: Vec<u8> = (0..30u8).collect();
            let mut encoded = codec.encode(&data);
            for i in 0..codec.t() {
                encoded[i * 3] ^= 0xA5;
            }
            let (decoded, errors) = codec.decode(&encoded, data.len()).unwrap();
            assert_eq!(decoded, data, "parity={parity}");
            assert_eq!(errors, codec.t(), "parity={parity}");
        }
    }

    #[test]
    fn fails_cleanly_beyond_t() {
        let codec = RsCodec::new(8);
        let data = vec![0u8; 30];
        let mut encoded = codec.encode(&data);
        for i in 0..codec.t() + 1 {
            encoded[i * 2] ^= 0xFF;
        }
        assert_eq!(codec.decode(&encoded, data.len()), Err(RsDecodeError));
    }

    #[test]
    fn parity_errors_also_corrected() {
        let codec = RsCodec::new(12);
        let data = b"payload under test";
        let mut encoded = codec.encode(data);
        encoded[data.len()] ^= 0x77;
        encoded[data.len() + 5] ^= 0x88;
        let (decoded, errors) = codec.decode(&encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(errors, 2);
    }

    #[test]
    fn empty_data() {
        let codec = RsCodec::new(8);
        let encoded = codec.encode(&[]);
        assert_eq!(encoded.len(), 8);
        let (decoded, errors) = codec.decode(&encoded, 0).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(errors, 0);
    }

    #[test]
    fn encoded_bit_count_matches_contract() {
        // encode emits exactly (len(payload) + parity) * 8 bits.
        let codec = RsCodec::new(16);
        let data = vec![0x5Au8; 40];
        let bits = bytes_to_bits(&codec.encode(&data));
        assert_eq!(bits.len(), (40 + 16) * 8);
    }

    #[test]
    fn bit_packing_msb_first() {
        let bits = bytes_to_bits(&[0b1010_0001, 0xFF]);
        assert_eq!(&bits[..8], &[1, 0, 1, 0, 0, 0, 0, 1]);
        assert_eq!(&bits[8..], &[1; 8]);
        assert_eq!(bits_to_bytes(&bits), vec![0b1010_0001, 0xFF]);
    }

    #[test]
    fn bit_packing_partial_byte_pads_zero() {
        let bytes = bits_to_bytes(&[1, 1, 1]);
        assert_eq!(bytes, vec![0b1110_0000]);
    }

    #[test]
    fn decode_rejects_miscounted_locator() {
        // Stress the verification pass: random-looking corruption beyond t
        // must never produce a silent wrong answer.
        let codec = RsCodec::new(8);
        let data: Vec<u8> = (0..32u8).map(|i| i.wrapping_mul(37)).collect();
        let encoded = codec.encode(&data);
        for burst in 0..20 {
            let mut corrupted = encoded.clone();
            for k in 0..8 {
                let idx = (burst + k * 3) % corrupted.len();
                corrupted[idx] ^= 0x3C + burst as u8;
            }
            match codec.decode(&corrupted, data.len()) {
                Ok((decoded, _)) => assert_eq!(decoded, data, "burst {burst} mis-decoded"),
                Err(RsDecodeError) => {}
            }
        }
    }
}
