// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Evidence hashing, signing, records and collaborator interfaces.
//!
//! The evidence layer binds a watermarked artifact to its payload: SHA-256
//! of the media and of the canonical payload, a deterministic secp256k1
//! signature over `mediaHash:payloadHash:timestampMillis`, and the immutable
//! record carrying parameters, quality metrics and perceptual fingerprints.
//! Storage and timestamp anchoring are external collaborators behind narrow
//! traits; their failures never roll back a completed embed.

pub mod record;
pub mod signer;
pub mod store;

pub use record::{
    AnchorInfo, CryptographicProof, DetectionEvent, EmbeddingParams, EvidenceExport,
    EvidenceRecord, FingerprintHex, MediaMetadata, Timestamps, EXPORT_VERSION,
};
pub use signer::{
    hashes_equal, sha256_hex, signing_message, verify_evidence, EvidenceSigner,
    SIGNATURE_ALGORITHM,
};
pub use store::{
    find_match, AnchorError, AnchorReceipt, EvidenceStore, MemoryEvidenceStore, StoreError,
    TimestampAnchor,
};
