// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! The evidence record and its persisted JSON export shape.
//!
//! An embedding is atomic: it consumes the original buffer and emits the
//! watermarked buffer plus an evidence record binding the artifact's hash,
//! the payload's hash, the embedding parameters, the quality metrics, the
//! perceptual fingerprint and a signer-authoritative timestamp. The record
//! is immutable thereafter.
//!
//! The export is a versioned, explicit schema; parsers reject unknown
//! fields loudly (`deny_unknown_fields`) rather than preserving them — the
//! artifacts are court-facing, and silent field loss is worse than a parse
//! error.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::evidence::signer::{self, SIGNATURE_ALGORITHM};
use crate::fingerprint::{hash_to_hex, Fingerprint};
use crate::payload::UserProfile;
use crate::quality::QualityMetrics;

/// Version tag of the persisted export shape.
pub const EXPORT_VERSION: &str = "1.0";

/// Parameters of one embed, immutable once the embed is performed and
/// recorded verbatim in the evidence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmbeddingParams {
    pub strength: f64,
    pub ecc_bytes: usize,
    pub block_size: usize,
    /// `<workId>:<payloadHash>` — the hopper's seed input, verbatim.
    pub coefficient_seed: String,
}

impl EmbeddingParams {
    pub fn new(strength: f64, ecc_bytes: usize, work_id: &str, payload_hash: &str) -> Self {
        Self {
            strength,
            ecc_bytes,
            block_size: crate::dct::BLOCK_SIZE,
            coefficient_seed: format!("{work_id}:{payload_hash}"),
        }
    }
}

/// Hex-rendered perceptual fingerprint trio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FingerprintHex {
    #[serde(rename = "pHash")]
    pub p_hash: String,
    #[serde(rename = "aHash")]
    pub a_hash: String,
    #[serde(rename = "dHash")]
    pub d_hash: String,
}

impl From<&Fingerprint> for FingerprintHex {
    fn from(fp: &Fingerprint) -> Self {
        Self {
            p_hash: hash_to_hex(fp.phash),
            a_hash: hash_to_hex(fp.ahash),
            d_hash: hash_to_hex(fp.dhash),
        }
    }
}

impl FingerprintHex {
    /// Parse back to the numeric trio; `None` if any hash is malformed.
    pub fn to_fingerprint(&self) -> Option<Fingerprint> {
        Some(Fingerprint {
            phash: crate::fingerprint::hash_from_hex(&self.p_hash)?,
            ahash: crate::fingerprint::hash_from_hex(&self.a_hash)?,
            dhash: crate::fingerprint::hash_from_hex(&self.d_hash)?,
        })
    }
}

/// The immutable evidence record of one embed operation.
///
/// `signature` and `signature_public_key` are `None` (serialized as explicit
/// nulls) when no signer was configured; the watermark result is still valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvidenceRecord {
    pub work_id: String,
    /// SHA-256 of the original media bytes, lowercase hex.
    pub original_hash: String,
    /// SHA-256 of the canonical payload UTF-8, lowercase hex.
    pub payload_hash: String,
    pub canonical_payload: String,
    pub embedding_params: EmbeddingParams,
    pub quality_metrics: QualityMetrics,
    pub fingerprint: FingerprintHex,
    pub signature: Option<String>,
    pub signature_public_key: Option<String>,
    pub signature_algorithm: String,
    pub timestamp_millis: i64,
}

impl EvidenceRecord {
    /// Verify the record's signature covers `originalHash:payloadHash:timestampMillis`.
    ///
    /// Returns `false` when the record is unsigned.
    pub fn verify_signature(&self) -> bool {
        match (&self.signature, &self.signature_public_key) {
            (Some(sig), Some(pk)) => signer::verify_evidence(
                pk,
                &self.original_hash,
                &self.payload_hash,
                self.timestamp_millis,
                sig,
            ),
            _ => false,
        }
    }

    /// Invariant check: recomputing SHA-256 over the canonical payload must
    /// reproduce `payloadHash`.
    pub fn payload_hash_consistent(&self) -> bool {
        signer::hashes_equal(
            &signer::sha256_hex(self.canonical_payload.as_bytes()),
            &self.payload_hash,
        )
    }
}

/// Default algorithm tag helper for record construction.
pub fn signature_algorithm() -> String {
    SIGNATURE_ALGORITHM.to_string()
}

// --- Persisted export shape ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CryptographicProof {
    pub original_hash: String,
    pub payload_hash: String,
    /// The compact payload text that was embedded.
    pub watermark_payload: String,
    pub evidence_signature: Option<String>,
    pub signature_algorithm: String,
    pub signature_public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnchorInfo {
    pub tx_id: String,
    pub network: String,
    pub block_number: Option<u64>,
    pub timestamp: String,
    pub verification_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Timestamps {
    pub created: String,
    pub uploaded: String,
    pub processed: String,
}

/// One perceptual-hash detection hit against this work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DetectionEvent {
    pub detected_at: String,
    pub combined_similarity: f64,
    pub source: String,
}

/// The stable one-object export of an evidence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvidenceExport {
    pub exported_at: String,
    pub version: String,
    pub work_id: String,
    pub media_type: String,
    pub original_file_name: String,
    pub original_file_size: u64,
    pub aspect_ratio: String,
    pub owner: UserProfile,
    pub cryptographic_proof: CryptographicProof,
    pub perceptual_hashes: FingerprintHex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorInfo>,
    pub embedding_params: EmbeddingParams,
    pub quality_metrics: QualityMetrics,
    pub metadata: MediaMetadata,
    pub timestamps: Timestamps,
    pub detection_history: Vec<DetectionEvent>,
}

impl EvidenceExport {
    /// Assemble the export from a record and its surrounding context.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        record: &EvidenceRecord,
        owner: &UserProfile,
        media_type: &str,
        original_file_name: &str,
        original_file_size: u64,
        aspect_ratio: &str,
        watermark_payload: &str,
        metadata: MediaMetadata,
        anchor: Option<AnchorInfo>,
        detection_history: Vec<DetectionEvent>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        let created = DateTime::<Utc>::from_timestamp_millis(record.timestamp_millis)
            .unwrap_or(exported_at)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        Self {
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            version: EXPORT_VERSION.to_string(),
            work_id: record.work_id.clone(),
            media_type: media_type.to_string(),
            original_file_name: original_file_name.to_string(),
            original_file_size,
            aspect_ratio: aspect_ratio.to_string(),
            owner: owner.clone(),
            cryptographic_proof: CryptographicProof {
                original_hash: record.original_hash.clone(),
                payload_hash: record.payload_hash.clone(),
                watermark_payload: watermark_payload.to_string(),
                evidence_signature: record.signature.clone(),
                signature_algorithm: record.signature_algorithm.clone(),
                signature_public_key: record.signature_public_key.clone(),
            },
            perceptual_hashes: record.fingerprint.clone(),
            anchor,
            embedding_params: record.embedding_params.clone(),
            quality_metrics: record.quality_metrics.clone(),
            metadata,
            timestamps: Timestamps {
                created: created.clone(),
                uploaded: created.clone(),
                processed: created,
            },
            detection_history,
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse an export, rejecting unknown fields.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
