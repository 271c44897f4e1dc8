// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Evidence signing and export tests.
//!
//! The signature binds `mediaHash:payloadHash:timestampMillis` under a
//! deterministic secp256k1 key; the export is a versioned JSON object that
//! rejects unknown fields.

use sigil_core::evidence::{
    find_match, sha256_hex, verify_evidence, EvidenceSigner, EvidenceStore, MemoryEvidenceStore,
};
use sigil_core::fingerprint::Fingerprint;
use sigil_core::mark::{self, EmbedConfig};
use sigil_core::media::{self, DecodedImage, OutputFormat};
use sigil_core::payload::UserProfile;

fn synth_photo(width: u32, height: u32) -> DecodedImage {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let base = 128.0
                + 45.0 * (x as f64 / 37.0).sin() * (y as f64 / 29.0).cos()
                + 30.0 * ((x + y) as f64 / 53.0).sin();
            let r = (base + 12.0).clamp(40.0, 215.0) as u8;
            let g = base.clamp(40.0, 215.0) as u8;
            let b = (base - 18.0).clamp(40.0, 215.0) as u8;
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    DecodedImage::from_rgb(width, height, rgb)
}

fn profile() -> UserProfile {
    UserProfile {
        legal_name: "Alex Berg".to_string(),
        display_name: "Alex".to_string(),
        copyright_year: 2026,
        primary_source: "https://alex.example".to_string(),
    }
}

#[test]
fn fixed_inputs_sign_deterministically() {
    // mediaHash = "0"*64, payloadHash = "f"*64, timestamp = 1700000000000,
    // sk = "01"*32: the signature is a fixed 128-hex-char string.
    let signer = EvidenceSigner::from_hex(&"01".repeat(32)).unwrap();
    let media_hash = "0".repeat(64);
    let payload_hash = "f".repeat(64);
    let ts = 1_700_000_000_000i64;

    let first = signer.sign_evidence(&media_hash, &payload_hash, ts);
    let second = signer.sign_evidence(&media_hash, &payload_hash, ts);
    assert_eq!(first, second, "deterministic signing must reproduce");
    assert_eq!(first.len(), 128);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    assert!(verify_evidence(signer.public_key_hex(), &media_hash, &payload_hash, ts, &first));

    let mut flipped = first.clone();
    let last = flipped.pop().unwrap();
    flipped.push(if last == '0' { '1' } else { '0' });
    assert!(!verify_evidence(signer.public_key_hex(), &media_hash, &payload_hash, ts, &flipped));
}

#[test]
fn signed_embed_produces_verifiable_record() {
    let cover = media::encode_image(&synth_photo(256, 256), OutputFormat::Jpeg(95)).unwrap();
    let signer = EvidenceSigner::from_hex(&"42".repeat(32)).unwrap();

    let outcome =
        mark::embed_image(&cover, &profile(), "image", Some(&signer), &EmbedConfig::default())
            .unwrap();
    let record = &outcome.record;

    assert!(record.verify_signature());
    assert!(record.payload_hash_consistent());
    assert_eq!(record.original_hash, sha256_hex(&cover));
    assert_eq!(record.signature_algorithm, "secp256k1");
    assert_eq!(
        record.signature_public_key.as_deref(),
        Some(signer.public_key_hex())
    );
    assert_eq!(
        record.embedding_params.coefficient_seed,
        format!("{}:{}", record.work_id, record.payload_hash)
    );

    // Tampering with any signed component breaks verification.
    let mut tampered = record.clone();
    tampered.timestamp_millis += 1;
    assert!(!tampered.verify_signature());
    let mut tampered = record.clone();
    tampered.original_hash = "c".repeat(64);
    assert!(!tampered.verify_signature());
}

#[test]
fn record_json_roundtrip_rejects_unknown_fields() {
    let cover = media::encode_image(&synth_photo(192, 192), OutputFormat::Png).unwrap();
    let outcome =
        mark::embed_image(&cover, &profile(), "image", None, &EmbedConfig::default()).unwrap();

    let json = serde_json::to_string_pretty(&outcome.record).unwrap();
    let back: sigil_core::EvidenceRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, outcome.record);

    let poisoned = json.replacen('{', "{\n  \"injected\": true,", 1);
    assert!(serde_json::from_str::<sigil_core::EvidenceRecord>(&poisoned).is_err());
}

#[test]
fn store_lookup_finds_recompressed_artifact() {
    let cover = media::encode_image(&synth_photo(384, 384), OutputFormat::Jpeg(95)).unwrap();
    let outcome =
        mark::embed_image(&cover, &profile(), "image", None, &EmbedConfig::default()).unwrap();

    let mut store = MemoryEvidenceStore::new();
    store.put(outcome.record.clone()).unwrap();

    // The library-scale lookup: fingerprint a recompressed copy and scan
    // the recent records.
    let recompressed = media::encode_image(
        &media::decode_image(&outcome.watermarked).unwrap(),
        OutputFormat::Jpeg(80),
    )
    .unwrap();
    let probe = Fingerprint::compute(&media::decode_image(&recompressed).unwrap());

    let (work_id, score) = find_match(&store, &probe, 10).expect("recompressed copy must match");
    assert_eq!(work_id, outcome.record.work_id);
    assert!(score >= 0.85, "score={score}");
}

#[test]
fn unrelated_image_does_not_match() {
    let cover = media::encode_image(&synth_photo(384, 384), OutputFormat::Jpeg(95)).unwrap();
    let outcome =
        mark::embed_image(&cover, &profile(), "image", None, &EmbedConfig::default()).unwrap();

    let mut store = MemoryEvidenceStore::new();
    store.put(outcome.record).unwrap();

    // Structurally different content: vertical bars instead of smooth blobs.
    let mut rgb = Vec::with_capacity(384 * 384 * 3);
    for y in 0..384u32 {
        for x in 0..384u32 {
            let v = if (x / 16) % 2 == 0 { 45 } else { 210 };
            let w = if (y / 24) % 2 == 0 { v } else { 255 - v };
            rgb.extend_from_slice(&[w, 255 - w, w]);
        }
    }
    let probe = Fingerprint::compute(&DecodedImage::from_rgb(384, 384, rgb));
    assert!(find_match(&store, &probe, 10).is_none());
}
