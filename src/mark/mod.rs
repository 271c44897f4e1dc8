// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! The forensic watermarking engine.
//!
//! One bit per 8×8 luminance block: a hopper-selected mid-frequency DCT
//! coefficient is parity-quantized (QIM) with step `Δ = strength · 255`.
//! Payloads are Reed-Solomon protected; distortion stays proportional to
//! the payload because blocks beyond the bit string are never touched.
//!
//! All engines are per-call values deriving determinism purely from their
//! inputs; there is no shared mutable state between operations, and hosts
//! may dispatch embeds concurrently as long as each owns its buffers.

pub mod ecc;
pub mod error;
pub mod hopper;
pub mod pipeline;
pub mod progress;
pub mod qim;

pub use error::{EmbedWarning, MarkError};
pub use pipeline::{
    capacity_for, embed_image, embed_in_decoded, embed_payload, extract_in_decoded,
    extract_payload, smart_extract, EmbedConfig, EmbedOutcome, ExtractOutcome, MarkedImage,
    DEFAULT_STRENGTH, MAX_STRENGTH, MIN_STRENGTH,
};
