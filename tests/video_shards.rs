// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Temporal shard recovery tests.
//!
//! A payload sharded across 30 synthetic frames must survive losing 20% of
//! the frames: every shard interval retains sampled candidates, plurality
//! voting recovers each shard's hex payload, and the final Reed-Solomon pass
//! reassembles the original text.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sigil_core::evidence::sha256_hex;
use sigil_core::media::{self, DecodedImage, OutputFormat};
use sigil_core::video::{self, VideoConfig};

const PAYLOAD: &str = "©AB|Alex|GJP-MEDIA-2026-VID01";
const WORK_ID: &str = "GJP-MEDIA-2026-VID01";

/// Deterministic noise frame, mid-range to keep the luminance delta exact.
fn noise_frame(rng: &mut ChaCha20Rng, width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for _ in 0..width as usize * height as usize * 3 {
        rgb.push(rng.gen_range(30..=225) as u8);
    }
    let img = DecodedImage::from_rgb(width, height, rgb);
    media::encode_image(&img, OutputFormat::Png).unwrap()
}

fn noise_frames(count: usize) -> Vec<Vec<u8>> {
    let mut rng = ChaCha20Rng::from_seed([11u8; 32]);
    (0..count).map(|_| noise_frame(&mut rng, 192, 192)).collect()
}

fn embed_all(frames: Vec<Vec<u8>>, cfg: &VideoConfig) -> (Vec<Vec<u8>>, video::VideoEmbedReport) {
    let payload_hash = sha256_hex(PAYLOAD.as_bytes());
    let count = frames.len();
    let mut out = Vec::with_capacity(count);
    let report = video::embed_video_frames(
        frames,
        count,
        PAYLOAD,
        WORK_ID,
        &payload_hash,
        cfg,
        |frame| out.push(frame),
    )
    .unwrap();
    (out, report)
}

#[test]
fn thirty_frames_three_shards() {
    let (marked, report) = embed_all(noise_frames(30), &VideoConfig::default());
    assert_eq!(marked.len(), 30);
    assert_eq!(report.shard_count, 3);
    assert_eq!(report.frames_embedded, 30);
    assert_eq!(report.frames_skipped_texture, 0);
    assert_eq!(report.frames_skipped_sampling, 0);
}

#[test]
fn full_sequence_recovers() {
    let (marked, _) = embed_all(noise_frames(30), &VideoConfig::default());
    let payload_hash = sha256_hex(PAYLOAD.as_bytes());

    let outcome = video::extract_video_frames(
        marked,
        30,
        WORK_ID,
        &payload_hash,
        PAYLOAD.len(),
        &VideoConfig::default(),
    )
    .unwrap();
    assert_eq!(outcome.payload.as_deref(), Some(PAYLOAD));
    assert_eq!(outcome.shards_recovered, 3);
    assert!(outcome.confidence >= 0.6, "confidence={}", outcome.confidence);
}

#[test]
fn survives_dropping_one_fifth_of_frames() {
    let (marked, _) = embed_all(noise_frames(30), &VideoConfig::default());
    let payload_hash = sha256_hex(PAYLOAD.as_bytes());

    // Drop 6 of 30 frames (20%), pre-drawn uniformly across the sequence.
    let dropped = [2usize, 7, 13, 18, 23, 28];
    let remaining: Vec<Vec<u8>> = marked
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, f)| f)
        .collect();
    assert_eq!(remaining.len(), 24);

    let count = remaining.len();
    let outcome = video::extract_video_frames(
        remaining,
        count,
        WORK_ID,
        &payload_hash,
        PAYLOAD.len(),
        &VideoConfig::default(),
    )
    .unwrap();
    assert_eq!(outcome.shard_count, 3);
    assert_eq!(outcome.shards_recovered, 3, "all shards must recover");
    assert_eq!(outcome.payload.as_deref(), Some(PAYLOAD));
    assert!(outcome.confidence >= 0.6, "confidence={}", outcome.confidence);
}

#[test]
fn texture_gate_skips_flat_frames() {
    // Frames 0 and 15 are flat grey; with the gate on they pass through
    // verbatim and are counted.
    let mut frames = noise_frames(20);
    let flat = media::encode_image(
        &DecodedImage::from_rgb(192, 192, vec![128; 192 * 192 * 3]),
        OutputFormat::Png,
    )
    .unwrap();
    frames[0] = flat.clone();
    frames[15] = flat.clone();

    let cfg = VideoConfig {
        texture_threshold: Some(video::DEFAULT_TEXTURE_THRESHOLD),
        ..VideoConfig::default()
    };
    let (marked, report) = embed_all(frames, &cfg);
    assert_eq!(report.frames_skipped_texture, 2);
    assert_eq!(report.frames_embedded, 18);
    assert_eq!(marked[0], flat, "gated frame must be emitted verbatim");
    assert_eq!(marked[15], flat);
}

#[test]
fn sampling_rate_passes_untouched_frames() {
    let frames = noise_frames(12);
    let originals = frames.clone();
    let cfg = VideoConfig {
        frame_sampling_rate: 3,
        ..VideoConfig::default()
    };
    let (marked, report) = embed_all(frames, &cfg);
    assert_eq!(report.frames_embedded, 4);
    assert_eq!(report.frames_skipped_sampling, 8);
    for (i, (out, orig)) in marked.iter().zip(originals.iter()).enumerate() {
        if i % 3 != 0 {
            assert_eq!(out, orig, "frame {i} should pass through verbatim");
        } else {
            assert_ne!(out, orig, "frame {i} should be watermarked");
        }
    }
}

#[test]
fn single_shard_for_short_clips() {
    // One shard means the whole hex-encoded stream rides every frame, so a
    // short clip needs a short payload to stay within frame capacity.
    let payload = "©A|A|VID-SHORT";
    let payload_hash = sha256_hex(payload.as_bytes());
    let frames = noise_frames(8);
    let mut marked = Vec::new();
    let report = video::embed_video_frames(
        frames,
        8,
        payload,
        WORK_ID,
        &payload_hash,
        &VideoConfig::default(),
        |frame| marked.push(frame),
    )
    .unwrap();
    assert_eq!(report.shard_count, 1);

    let outcome = video::extract_video_frames(
        marked,
        8,
        WORK_ID,
        &payload_hash,
        payload.len(),
        &VideoConfig::default(),
    )
    .unwrap();
    assert_eq!(outcome.payload.as_deref(), Some(payload));
}
