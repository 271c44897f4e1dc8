// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Embed and extract pipelines.
//!
//! Embedding runs the full data flow: capacity check → Reed-Solomon encode →
//! hopper schedule → per-block QIM on the luminance plane → RGB
//! reconstruction → output encoding → quality validation → fingerprints →
//! evidence signing. Failures short-circuit; quality-below-target and
//! missing-signer are non-fatal warnings carried in the outcome.
//!
//! Extraction is the reverse path. It never throws for decodable inputs:
//! Reed-Solomon failure is reported as `payload = None, confidence = 0,
//! errorsFound = -1`.

use chrono::Utc;
use tracing::debug;

use crate::evidence::{
    sha256_hex, EmbeddingParams, EvidenceRecord, EvidenceSigner, FingerprintHex,
    SIGNATURE_ALGORITHM,
};
use crate::fingerprint::Fingerprint;
use crate::mark::ecc::{self, RsCodec};
use crate::mark::error::{EmbedWarning, MarkError};
use crate::mark::hopper::CoefficientHopper;
use crate::mark::qim;
use crate::media::{self, DecodedImage, OutputFormat};
use crate::payload::{self, UserProfile};
use crate::quality::{self, QualityMetrics};

/// Default embedding strength for still images.
pub const DEFAULT_STRENGTH: f64 = 0.15;

/// Admitted strength range; out-of-range values are clamped.
pub const MIN_STRENGTH: f64 = 0.05;
pub const MAX_STRENGTH: f64 = 0.20;

/// Embed configuration. Strength outside [0.05, 0.20] is clamped.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub strength: f64,
    pub ecc_bytes: usize,
    pub output: OutputFormat,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            ecc_bytes: ecc::IMAGE_PARITY,
            output: OutputFormat::default(),
        }
    }
}

/// Result of a raw payload embed (no evidence assembly).
#[derive(Debug, Clone)]
pub struct MarkedImage {
    /// Encoded output buffer (JPEG or PNG per the config).
    pub bytes: Vec<u8>,
    /// The watermarked pixels before output encoding.
    pub image: DecodedImage,
    /// Quality of the watermarked pixels against the decoded original.
    pub metrics: QualityMetrics,
}

/// Result of an extraction attempt.
///
/// On Reed-Solomon failure: `payload = None`, `confidence = 0`,
/// `errors_found = -1`. On success the confidence drops by half a point per
/// fraction of the correction capacity used.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOutcome {
    pub payload: Option<String>,
    pub confidence: f64,
    pub errors_found: i32,
    pub errors_corrected: usize,
}

impl ExtractOutcome {
    fn failure() -> Self {
        Self {
            payload: None,
            confidence: 0.0,
            errors_found: -1,
            errors_corrected: 0,
        }
    }

    /// Whether the payload was recovered with usable confidence.
    pub fn detected(&self) -> bool {
        self.payload.is_some() && self.confidence >= 0.5
    }
}

/// Outcome of a full embed operation.
#[derive(Debug)]
pub struct EmbedOutcome {
    pub watermarked: Vec<u8>,
    pub record: EvidenceRecord,
    pub fingerprint: Fingerprint,
    pub metrics: QualityMetrics,
    pub work_id: String,
    /// The compact payload text embedded in the image.
    pub compact_payload: String,
    pub warnings: Vec<EmbedWarning>,
}

/// Maximum embeddable payload bytes for the given dimensions and parity.
///
/// `floor(blocks / 8) - eccBytes`, zero when parity alone exceeds capacity.
pub fn capacity_for(width: u32, height: u32, ecc_bytes: usize) -> usize {
    (qim::total_blocks(width, height) / 8).saturating_sub(ecc_bytes)
}

fn clamp_strength(strength: f64) -> f64 {
    strength.clamp(MIN_STRENGTH, MAX_STRENGTH)
}

/// Reconstruct RGB from a modified luminance plane: the per-pixel Y delta is
/// added equally to R, G and B (a luminance-preserving approximation).
fn apply_luma_delta(rgb: &[u8], y_old: &[f64], y_new: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len());
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let delta = y_new[i] - y_old[i];
        for &ch in px {
            out.push((ch as f64 + delta).round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Embed a payload into an already decoded image.
///
/// The RS-encoded bit string occupies the leading complete 8×8 blocks in
/// row-major order; the hopper schedule derives from `(work_id, payload_hash)`.
///
/// # Errors
/// - [`MarkError::CapacityExceeded`] when `(payload + parity) · 8` bits
///   exceed the block count.
/// - [`MarkError::Cancelled`] when cancellation is observed.
pub fn embed_in_decoded(
    image: &DecodedImage,
    payload: &str,
    work_id: &str,
    payload_hash: &str,
    strength: f64,
    ecc_bytes: usize,
) -> Result<DecodedImage, MarkError> {
    let strength = clamp_strength(strength);
    let total_blocks = qim::total_blocks(image.width, image.height);
    let required_bits = (payload.len() + ecc_bytes) * 8;
    if required_bits > total_blocks {
        return Err(MarkError::CapacityExceeded {
            required_bits,
            total_blocks,
        });
    }
    debug!(work_id, required_bits, total_blocks, "capacity checked");

    let codec = RsCodec::new(ecc_bytes);
    let bits = ecc::bytes_to_bits(&codec.encode(payload.as_bytes()));
    debug!(encoded_bits = bits.len(), "ecc encoded");

    let hopper = CoefficientHopper::new(work_id, payload_hash);

    let mut y = image.luminance();
    let y_old = y.clone();
    qim::embed_bits(
        &mut y,
        image.width as usize,
        image.height as usize,
        &bits,
        &hopper,
        strength,
    )?;
    debug!(blocks = total_blocks, "blocks written");

    Ok(DecodedImage::from_rgb(
        image.width,
        image.height,
        apply_luma_delta(&image.rgb, &y_old, &y),
    ))
}

/// Embed a payload into an encoded image buffer.
///
/// Decodes, embeds, re-encodes, and reports quality of the watermarked
/// pixels against the decoded original.
pub fn embed_payload(
    image_bytes: &[u8],
    payload: &str,
    work_id: &str,
    payload_hash: &str,
    cfg: &EmbedConfig,
) -> Result<MarkedImage, MarkError> {
    crate::mark::progress::init(0);
    let original = media::decode_image(image_bytes)?;
    let watermarked = embed_in_decoded(
        &original,
        payload,
        work_id,
        payload_hash,
        cfg.strength,
        cfg.ecc_bytes,
    )?;
    let bytes = media::encode_image(&watermarked, cfg.output)?;
    let metrics = quality::quality_metrics(&original, &watermarked)?;
    Ok(MarkedImage {
        bytes,
        image: watermarked,
        metrics,
    })
}

/// Extract a payload from an already decoded image.
///
/// Never fails for decodable inputs except on cancellation.
pub fn extract_in_decoded(
    image: &DecodedImage,
    work_id: &str,
    payload_hash: &str,
    payload_len: usize,
    ecc_bytes: usize,
    strength: f64,
) -> Result<ExtractOutcome, MarkError> {
    let strength = clamp_strength(strength);
    let total_blocks = qim::total_blocks(image.width, image.height);
    let nbits = (payload_len + ecc_bytes) * 8;
    if nbits == 0 || nbits > total_blocks {
        // The claimed payload could never have fit this image.
        return Ok(ExtractOutcome::failure());
    }

    let hopper = CoefficientHopper::new(work_id, payload_hash);
    let bits = qim::extract_bits(
        &image.luminance(),
        image.width as usize,
        image.height as usize,
        nbits,
        &hopper,
        strength,
    )?;

    let codec = RsCodec::new(ecc_bytes);
    let received = ecc::bits_to_bytes(&bits);
    match codec.decode(&received, payload_len) {
        Ok((data, errors)) => match String::from_utf8(data) {
            // Payloads are printable text. Control characters mean the
            // corrector locked onto a degenerate word — an unmarked smooth
            // region reads as the all-zero codeword, which is valid RS but
            // decodes to NUL bytes.
            Ok(text) if !text.chars().any(char::is_control) => {
                let confidence = 1.0 - 0.5 * errors as f64 / codec.t() as f64;
                Ok(ExtractOutcome {
                    payload: Some(text),
                    confidence,
                    errors_found: errors as i32,
                    errors_corrected: errors,
                })
            }
            // Non-UTF-8 likewise means the correction locked onto noise;
            // report it as a failure, not an error.
            _ => Ok(ExtractOutcome::failure()),
        },
        Err(_) => Ok(ExtractOutcome::failure()),
    }
}

/// Extract a payload from an encoded image buffer.
pub fn extract_payload(
    image_bytes: &[u8],
    work_id: &str,
    payload_hash: &str,
    payload_len: usize,
    ecc_bytes: usize,
    strength: f64,
) -> Result<ExtractOutcome, MarkError> {
    crate::mark::progress::init(0);
    let image = media::decode_image(image_bytes)?;
    extract_in_decoded(&image, work_id, payload_hash, payload_len, ecc_bytes, strength)
}

/// Extraction with an unknown parity: sweeps the admitted parity set and
/// returns the highest-confidence recovery.
pub fn smart_extract(
    image_bytes: &[u8],
    work_id: &str,
    payload_hash: &str,
    payload_len: usize,
    strength: f64,
) -> Result<ExtractOutcome, MarkError> {
    crate::mark::progress::init(0);
    let image = media::decode_image(image_bytes)?;
    let mut best = ExtractOutcome::failure();
    for &parity in &ecc::ADMITTED_PARITY {
        let outcome =
            extract_in_decoded(&image, work_id, payload_hash, payload_len, parity, strength)?;
        if outcome.confidence >= 1.0 {
            return Ok(outcome);
        }
        if (outcome.payload.is_some(), outcome.confidence)
            > (best.payload.is_some(), best.confidence)
        {
            best = outcome;
        }
    }
    Ok(best)
}

/// Run the full embed operation: canonical payload, compact payload, QIM
/// embedding, quality validation, perceptual fingerprints, and the signed
/// evidence record.
///
/// Signing is skippable: with `signer = None` the record carries explicit
/// absent fields and the outcome a [`EmbedWarning::SignerUnconfigured`].
/// Quality below target is a warning, never a failure.
pub fn embed_image(
    original_bytes: &[u8],
    profile: &UserProfile,
    media_type: &str,
    signer: Option<&EvidenceSigner>,
    cfg: &EmbedConfig,
) -> Result<EmbedOutcome, MarkError> {
    let strength = clamp_strength(cfg.strength);
    crate::mark::progress::init(0);
    let now = Utc::now();
    let timestamp_millis = now.timestamp_millis();

    let original = media::decode_image(original_bytes)?;
    let work_id = payload::generate_work_id(now);
    let aspect_ratio = payload::detect_aspect_ratio(original.width, original.height);

    let canonical =
        payload::canonical_payload(profile, &work_id, media_type, &aspect_ratio, now);
    let payload_hash = sha256_hex(canonical.as_bytes());
    let compact = payload::compact_payload(profile, &work_id);
    debug!(%work_id, %payload_hash, "payload canonicalized");

    let watermarked = embed_in_decoded(
        &original,
        &compact,
        &work_id,
        &payload_hash,
        strength,
        cfg.ecc_bytes,
    )?;
    let bytes = media::encode_image(&watermarked, cfg.output)?;
    debug!(out_bytes = bytes.len(), "encoded");

    let metrics = quality::quality_metrics(&original, &watermarked)?;
    let mut warnings = Vec::new();
    if !metrics.meets_floor() {
        warnings.push(EmbedWarning::QualityBelowTarget {
            psnr: metrics.psnr,
            ssim: metrics.ssim,
        });
    }
    debug!(psnr = metrics.psnr, ssim = metrics.ssim, "validated");

    // Fingerprint the artifact as delivered: the re-decoded output bytes.
    let fingerprint = Fingerprint::compute(&media::decode_image(&bytes)?);

    let original_hash = sha256_hex(original_bytes);
    let (signature, signature_public_key) = match signer {
        Some(signer) => (
            Some(signer.sign_evidence(&original_hash, &payload_hash, timestamp_millis)),
            Some(signer.public_key_hex().to_string()),
        ),
        None => {
            warnings.push(EmbedWarning::SignerUnconfigured);
            (None, None)
        }
    };
    debug!(signed = signature.is_some(), "evidence assembled");

    let record = EvidenceRecord {
        work_id: work_id.clone(),
        original_hash,
        payload_hash: payload_hash.clone(),
        canonical_payload: canonical,
        embedding_params: EmbeddingParams::new(strength, cfg.ecc_bytes, &work_id, &payload_hash),
        quality_metrics: metrics.clone(),
        fingerprint: FingerprintHex::from(&fingerprint),
        signature,
        signature_public_key,
        signature_algorithm: SIGNATURE_ALGORITHM.to_string(),
        timestamp_millis,
    };

    Ok(EmbedOutcome {
        watermarked: bytes,
        record,
        fingerprint,
        metrics,
        work_id,
        compact_payload: compact,
        warnings,
    })
}
