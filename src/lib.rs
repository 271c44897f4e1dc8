// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! # sigil-core
//!
//! Forensic watermarking engine for still images and video frames. Embeds a
//! short identity payload so that:
//!
//! - the modification is perceptually indistinguishable from the original
//!   (PSNR >= 40 dB, SSIM >= 0.95);
//! - the payload survives lossy recompression and mild geometric distortion
//!   (QIM on hopper-selected mid-frequency DCT coefficients, protected by
//!   Reed-Solomon error correction);
//! - an independent perceptual fingerprint (pHash/aHash/dHash) is produced
//!   for library-scale lookup;
//! - a cryptographic evidence bundle binds the artifact's hash, the
//!   payload's hash and an authoritative timestamp under a deterministic
//!   secp256k1 signature.
//!
//! The core is single-threaded per operation and CPU-bound; all engines are
//! per-call values deriving determinism purely from their inputs. File I/O,
//! storage, anchoring and container muxing belong to external collaborators.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use sigil_core::{embed_image, EmbedConfig, UserProfile};
//!
//! let original = std::fs::read("photo.jpg").unwrap();
//! let profile = UserProfile {
//!     legal_name: "Alex Berg".into(),
//!     display_name: "Alex".into(),
//!     copyright_year: 2026,
//!     primary_source: "https://alex.example".into(),
//! };
//! let outcome = embed_image(&original, &profile, "image", None, &EmbedConfig::default()).unwrap();
//! std::fs::write("photo_marked.jpg", &outcome.watermarked).unwrap();
//! println!("{}", outcome.record.work_id);
//! ```

pub mod dct;
pub mod evidence;
pub mod fingerprint;
pub mod mark;
pub mod media;
pub mod payload;
pub mod quality;
pub mod robustness;
pub mod video;

pub use evidence::{
    sha256_hex, verify_evidence, EvidenceExport, EvidenceRecord, EvidenceSigner,
    EvidenceStore, MemoryEvidenceStore, TimestampAnchor,
};
pub use fingerprint::{Fingerprint, MatchRating};
pub use mark::{
    capacity_for, embed_image, embed_payload, extract_payload, smart_extract, EmbedConfig,
    EmbedOutcome, EmbedWarning, ExtractOutcome, MarkError, DEFAULT_STRENGTH,
};
pub use media::{decode_image, encode_image, DecodedImage, OutputFormat};
pub use payload::{
    canonical_payload, compact_payload, detect_aspect_ratio, generate_work_id, UserProfile,
};
pub use quality::{quality_metrics, windowed_ssim, QualityMetrics};
pub use robustness::{run_robustness, RobustnessCase};
pub use video::{
    embed_video_frames, extract_video_frames, shard_count, VideoConfig, VideoEmbedReport,
    VideoExtractOutcome, VideoMetadata,
};
