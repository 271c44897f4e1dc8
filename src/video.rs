// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Temporal wrapper: sharding a payload across video frames.
//!
//! The Reed-Solomon-encoded bit string is split into S contiguous shards
//! (S ≈ min(3, ⌈N/10⌉) for N frames); each shard is re-encoded to a hex
//! string that serves as the per-shard payload for the still-image embedder,
//! and frames are partitioned into S contiguous intervals, one shard each.
//! Each shard runs its own hopper via `workId = base || "-shard" || s`.
//!
//! Frame extraction and container re-muxing belong to an external video I/O
//! collaborator; this module only consumes and produces per-frame image
//! buffers, holding one frame at a time.
//!
//! Shards carry no index byte; shard identity comes from the interval
//! schedule, so heavy frame reordering is a documented limitation.

use std::collections::HashMap;

use tracing::debug;

use crate::mark::ecc::{self, RsCodec};
use crate::mark::error::MarkError;
use crate::mark::pipeline::{embed_in_decoded, extract_in_decoded, DEFAULT_STRENGTH};
use crate::mark::progress;
use crate::media::{self, OutputFormat};

/// Extraction samples every 5th frame of each shard interval.
pub const SHARD_SAMPLE_STRIDE: usize = 5;

/// Default texture-gate threshold on normalized grayscale variance.
pub const DEFAULT_TEXTURE_THRESHOLD: f64 = 0.3;

/// Low-visibility strength for video, only used on explicit request. The
/// embedding contract admits strengths down to 0.05; requests below the
/// floor are clamped by the still engine.
pub const LOW_VISIBILITY_STRENGTH: f64 = 0.05;

/// Metadata supplied by the video I/O collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
    pub codec: String,
}

/// Configuration of the temporal wrapper.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Embedding strength. Defaults to the still-image 0.15;
    /// [`LOW_VISIBILITY_STRENGTH`] is available on explicit request.
    pub strength: f64,
    pub ecc_bytes: usize,
    /// Normalized-variance threshold below which a frame is emitted
    /// verbatim. `None` disables the gate.
    pub texture_threshold: Option<f64>,
    /// When > 1, frames whose index is not a multiple of the rate are
    /// emitted verbatim.
    pub frame_sampling_rate: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            ecc_bytes: ecc::VIDEO_PARITY,
            texture_threshold: None,
            frame_sampling_rate: 1,
        }
    }
}

/// Number of shards for a frame count: min(3, ⌈N/10⌉).
pub fn shard_count(frame_count: usize) -> usize {
    frame_count.div_ceil(10).min(3).max(1)
}

/// First frame index of interval `s` when `frame_count` frames are split
/// into `shards` contiguous intervals.
fn interval_start(s: usize, frame_count: usize, shards: usize) -> usize {
    s * frame_count / shards
}

/// Which shard interval frame `i` falls in.
fn shard_for_frame(i: usize, frame_count: usize, shards: usize) -> usize {
    for s in (0..shards).rev() {
        if i >= interval_start(s, frame_count, shards) {
            return s;
        }
    }
    0
}

/// Bit length of shard `s` when `total_bits` are split near-evenly into
/// `shards` contiguous runs (remainder spread over the leading shards).
fn shard_bit_len(s: usize, total_bits: usize, shards: usize) -> usize {
    total_bits / shards + usize::from(s < total_bits % shards)
}

/// The per-shard hex payloads and their exact bit lengths.
fn shard_hex_payloads(encoded: &[u8], shards: usize) -> Vec<(String, usize)> {
    let bits = ecc::bytes_to_bits(encoded);
    let mut out = Vec::with_capacity(shards);
    let mut offset = 0;
    for s in 0..shards {
        let len = shard_bit_len(s, bits.len(), shards);
        let shard_bits = &bits[offset..offset + len];
        // Zero-padded to a byte boundary; the extractor truncates by length.
        out.push((hex::encode(ecc::bits_to_bytes(shard_bits)), len));
        offset += len;
    }
    out
}

/// Per-shard work ID for the still engine's hopper.
fn shard_work_id(base_work_id: &str, s: usize) -> String {
    format!("{base_work_id}-shard{s}")
}

/// Normalized grayscale variance of a frame: `min(var / 5000, 1)`.
fn normalized_texture(image: &media::DecodedImage) -> f64 {
    let gray = image.grayscale();
    let n = gray.len() as f64;
    let mean = gray.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = gray
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (var / 5000.0).min(1.0)
}

/// Report of one video embed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEmbedReport {
    pub shard_count: usize,
    pub frames_embedded: usize,
    pub frames_skipped_texture: usize,
    pub frames_skipped_sampling: usize,
}

/// Shard a payload across a frame sequence.
///
/// `frames` yields encoded per-frame buffers (JPEG/PNG); every frame is
/// passed to `emit` exactly once, watermarked or verbatim, in input order.
/// The caller knows `frame_count` from the collaborator's metadata.
///
/// # Errors
/// - [`MarkError::CapacityExceeded`] when a shard payload cannot fit a frame.
/// - [`MarkError::InputUnreadable`] for an undecodable frame buffer.
/// - [`MarkError::Cancelled`] when cancellation is observed between frames.
pub fn embed_video_frames<I, F>(
    frames: I,
    frame_count: usize,
    payload: &str,
    base_work_id: &str,
    payload_hash: &str,
    cfg: &VideoConfig,
    mut emit: F,
) -> Result<VideoEmbedReport, MarkError>
where
    I: IntoIterator<Item = Vec<u8>>,
    F: FnMut(Vec<u8>),
{
    progress::init(frame_count as u32);
    let shards = shard_count(frame_count);
    let codec = RsCodec::new(cfg.ecc_bytes);
    let shard_payloads = shard_hex_payloads(&codec.encode(payload.as_bytes()), shards);
    debug!(shards, frame_count, "video shard plan ready");

    let mut report = VideoEmbedReport {
        shard_count: shards,
        frames_embedded: 0,
        frames_skipped_texture: 0,
        frames_skipped_sampling: 0,
    };

    for (i, frame) in frames.into_iter().enumerate() {
        progress::check_cancelled()?;

        if cfg.frame_sampling_rate > 1 && i % cfg.frame_sampling_rate != 0 {
            report.frames_skipped_sampling += 1;
            emit(frame);
            continue;
        }

        let image = media::decode_image(&frame)?;

        if let Some(threshold) = cfg.texture_threshold {
            if normalized_texture(&image) < threshold {
                report.frames_skipped_texture += 1;
                emit(frame);
                continue;
            }
        }

        let s = shard_for_frame(i, frame_count, shards);
        let (shard_hex, _) = &shard_payloads[s];
        let marked = embed_in_decoded(
            &image,
            shard_hex,
            &shard_work_id(base_work_id, s),
            payload_hash,
            cfg.strength,
            cfg.ecc_bytes,
        )?;
        emit(media::encode_image(&marked, OutputFormat::default())?);
        report.frames_embedded += 1;
    }

    Ok(report)
}

/// Outcome of a video extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoExtractOutcome {
    pub payload: Option<String>,
    pub confidence: f64,
    pub errors_found: i32,
    pub errors_corrected: usize,
    pub shards_recovered: usize,
    pub shard_count: usize,
}

impl VideoExtractOutcome {
    fn failure(shards_recovered: usize, shard_count: usize) -> Self {
        Self {
            payload: None,
            confidence: 0.0,
            errors_found: -1,
            errors_corrected: 0,
            shards_recovered,
            shard_count,
        }
    }
}

/// Recover a sharded payload from a frame sequence.
///
/// Samples every [`SHARD_SAMPLE_STRIDE`]th frame of each shard interval,
/// keeps candidates with confidence > 0.5, and takes the plurality hex
/// string per shard. When all shards recover, the concatenated bit stream
/// is Reed-Solomon decoded once more.
///
/// Undecodable frames are skipped as candidates; extraction itself never
/// fails except on cancellation.
pub fn extract_video_frames<I>(
    frames: I,
    frame_count: usize,
    base_work_id: &str,
    payload_hash: &str,
    payload_len: usize,
    cfg: &VideoConfig,
) -> Result<VideoExtractOutcome, MarkError>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    progress::init(frame_count as u32);
    let shards = shard_count(frame_count);
    let total_bits = (payload_len + cfg.ecc_bytes) * 8;
    let shard_bits: Vec<usize> = (0..shards)
        .map(|s| shard_bit_len(s, total_bits, shards))
        .collect();
    // Hex payload length in characters: two per zero-padded shard byte.
    let shard_hex_len: Vec<usize> = shard_bits.iter().map(|&b| b.div_ceil(8) * 2).collect();

    let mut candidates: Vec<Vec<String>> = vec![Vec::new(); shards];

    for (i, frame) in frames.into_iter().enumerate() {
        progress::check_cancelled()?;

        let s = shard_for_frame(i, frame_count, shards);
        if (i - interval_start(s, frame_count, shards)) % SHARD_SAMPLE_STRIDE != 0 {
            continue;
        }
        let Ok(image) = media::decode_image(&frame) else {
            continue;
        };
        let outcome = extract_in_decoded(
            &image,
            &shard_work_id(base_work_id, s),
            payload_hash,
            shard_hex_len[s],
            cfg.ecc_bytes,
            cfg.strength,
        )?;
        if outcome.confidence <= 0.5 {
            continue;
        }
        if let Some(text) = outcome.payload {
            let is_hex = text.len() == shard_hex_len[s]
                && text
                    .chars()
                    .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
            if is_hex {
                candidates[s].push(text);
            }
        }
    }

    // Plurality per shard, first-seen winning ties.
    let mut winners: Vec<Option<String>> = Vec::with_capacity(shards);
    for shard_candidates in &candidates {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for c in shard_candidates {
            *counts.entry(c.as_str()).or_default() += 1;
        }
        let mut best: Option<(&str, usize)> = None;
        for c in shard_candidates {
            let count = counts[c.as_str()];
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((c.as_str(), count));
            }
        }
        winners.push(best.map(|(text, _)| text.to_string()));
    }

    let recovered = winners.iter().filter(|w| w.is_some()).count();
    debug!(recovered, shards, "shard recovery");
    if recovered < shards {
        return Ok(VideoExtractOutcome::failure(recovered, shards));
    }

    // Reassemble the bit stream, trimming each shard's byte padding.
    let mut bits = Vec::with_capacity(total_bits);
    for (s, winner) in winners.iter().enumerate() {
        let Ok(bytes) = hex::decode(winner.as_ref().expect("all shards recovered")) else {
            return Ok(VideoExtractOutcome::failure(recovered, shards));
        };
        bits.extend_from_slice(&ecc::bytes_to_bits(&bytes)[..shard_bits[s]]);
    }

    let codec = RsCodec::new(cfg.ecc_bytes);
    match codec.decode(&ecc::bits_to_bytes(&bits), payload_len) {
        Ok((data, errors)) => match String::from_utf8(data) {
            Ok(text) => {
                let confidence = 1.0 - 0.5 * errors as f64 / codec.t() as f64;
                Ok(VideoExtractOutcome {
                    payload: Some(text),
                    confidence,
                    errors_found: errors as i32,
                    errors_corrected: errors,
                    shards_recovered: recovered,
                    shard_count: shards,
                })
            }
            Err(_) => Ok(VideoExtractOutcome::failure(recovered, shards)),
        },
        Err(_) => Ok(VideoExtractOutcome::failure(recovered, shards)),
    }
}
