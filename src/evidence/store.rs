// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Collaborator interfaces: evidence storage and timestamp anchoring.
//!
//! The core never opens databases or RPC connections itself; it emits
//! records and consumes these narrow traits. The in-memory store exists for
//! hosts that keep evidence in-process and for the test suites.

use std::collections::HashMap;
use core::fmt;

use crate::evidence::record::EvidenceRecord;
use crate::fingerprint::{Fingerprint, DETECTION_THRESHOLD};

/// Storage failure surfaced by a collaborator.
#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    /// A record with this work ID already exists; records are immutable.
    Duplicate(String),
    /// Backend-specific failure, opaque to the core.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(id) => write!(f, "evidence record already exists: {id}"),
            Self::Backend(msg) => write!(f, "evidence store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Key-value evidence storage by work ID, ordered by insertion time.
pub trait EvidenceStore {
    /// Insert a new immutable record.
    fn put(&mut self, record: EvidenceRecord) -> Result<(), StoreError>;

    /// Fetch a record by work ID.
    fn get(&self, work_id: &str) -> Option<EvidenceRecord>;

    /// The most recent `n` records, newest first. Used by perceptual-hash
    /// lookup.
    fn recent(&self, n: usize) -> Vec<EvidenceRecord>;
}

/// In-memory evidence store preserving insertion order.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    records: Vec<EvidenceRecord>,
    by_work_id: HashMap<String, usize>,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn put(&mut self, record: EvidenceRecord) -> Result<(), StoreError> {
        if self.by_work_id.contains_key(&record.work_id) {
            return Err(StoreError::Duplicate(record.work_id));
        }
        self.by_work_id
            .insert(record.work_id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    fn get(&self, work_id: &str) -> Option<EvidenceRecord> {
        self.by_work_id
            .get(work_id)
            .map(|&idx| self.records[idx].clone())
    }

    fn recent(&self, n: usize) -> Vec<EvidenceRecord> {
        self.records.iter().rev().take(n).cloned().collect()
    }
}

/// Best fingerprint match among the most recent `scan` records.
///
/// Returns `(workId, combined similarity)` for the best record clearing the
/// default detection threshold.
pub fn find_match(
    store: &dyn EvidenceStore,
    fingerprint: &Fingerprint,
    scan: usize,
) -> Option<(String, f64)> {
    let mut best: Option<(String, f64)> = None;
    for record in store.recent(scan) {
        let Some(candidate) = record.fingerprint.to_fingerprint() else {
            continue;
        };
        let score = fingerprint.similarity(&candidate);
        if score >= DETECTION_THRESHOLD && best.as_ref().map_or(true, |(_, s)| score > *s) {
            best = Some((record.work_id.clone(), score));
        }
    }
    best
}

/// Receipt from a successful timestamp anchoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorReceipt {
    pub anchor_id: String,
    pub block_time: i64,
    /// Opaque to the core; recorded verbatim in the export.
    pub receipt: String,
}

/// Anchoring failure. Never affects the embed's main result.
#[derive(Debug)]
pub struct AnchorError(pub String);

impl fmt::Display for AnchorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timestamp anchor failed: {}", self.0)
    }
}

impl std::error::Error for AnchorError {}

/// External timestamp anchor collaborator.
pub trait TimestampAnchor {
    fn anchor(
        &self,
        work_id: &str,
        media_hash: &str,
        payload_hash: &str,
    ) -> Result<AnchorReceipt, AnchorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::record::{EmbeddingParams, FingerprintHex};
    use crate::evidence::signer::sha256_hex;
    use crate::fingerprint::hash_to_hex;
    use crate::quality::QualityMetrics;

    fn record_with(work_id: &str, fp: Fingerprint) -> EvidenceRecord {
        EvidenceRecord {
            work_id: work_id.to_string(),
            original_hash: "0".repeat(64),
            payload_hash: sha256_hex(b"x"),
            canonical_payload: "x".to_string(),
            embedding_params: EmbeddingParams::new(0.15, 8, work_id, "h"),
            quality_metrics: QualityMetrics { psnr: 45.0, ssim: 0.99, mse: 2.0, max_diff: 6 },
            fingerprint: FingerprintHex {
                p_hash: hash_to_hex(fp.phash),
                a_hash: hash_to_hex(fp.ahash),
                d_hash: hash_to_hex(fp.dhash),
            },
            signature: None,
            signature_public_key: None,
            signature_algorithm: "secp256k1".to_string(),
            timestamp_millis: 1,
        }
    }

    #[test]
    fn put_get_and_duplicate() {
        let fp = Fingerprint { phash: 1, ahash: 2, dhash: 3 };
        let mut store = MemoryEvidenceStore::new();
        store.put(record_with("W1", fp)).unwrap();
        assert!(store.get("W1").is_some());
        assert!(store.get("W2").is_none());
        assert_eq!(
            store.put(record_with("W1", fp)),
            Err(StoreError::Duplicate("W1".to_string()))
        );
    }

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let mut store = MemoryEvidenceStore::new();
        for i in 0..5 {
            let fp = Fingerprint { phash: i, ahash: i, dhash: i };
            store.put(record_with(&format!("W{i}"), fp)).unwrap();
        }
        let recent = store.recent(3);
        let ids: Vec<&str> = recent.iter().map(|r| r.work_id.as_str()).collect();
        assert_eq!(ids, ["W4", "W3", "W2"]);
    }

    #[test]
    fn find_match_picks_best_above_threshold() {
        let mut store = MemoryEvidenceStore::new();
        let exact = Fingerprint { phash: 0xAAAA, ahash: 0xBBBB, dhash: 0xCCCC };
        // One bit of dHash off: similarity just below 1.
        let near = Fingerprint { phash: 0xAAAA, ahash: 0xBBBB, dhash: 0xCCCD };
        let far = Fingerprint { phash: !0xAAAA, ahash: !0xBBBB, dhash: !0xCCCC };
        store.put(record_with("FAR", far)).unwrap();
        store.put(record_with("NEAR", near)).unwrap();
        store.put(record_with("EXACT", exact)).unwrap();

        let (id, score) = find_match(&store, &exact, 10).unwrap();
        assert_eq!(id, "EXACT");
        assert_eq!(score, 1.0);

        // Scan window of 1 only sees the newest record.
        let (id, _) = find_match(&store, &exact, 1).unwrap();
        assert_eq!(id, "EXACT");
    }

    #[test]
    fn find_match_returns_none_below_threshold() {
        let mut store = MemoryEvidenceStore::new();
        let a = Fingerprint { phash: 0, ahash: 0, dhash: 0 };
        let b = Fingerprint { phash: u64::MAX, ahash: u64::MAX, dhash: u64::MAX };
        store.put(record_with("A", a)).unwrap();
        assert!(find_match(&store, &b, 10).is_none());
    }
}
