// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Error types for the watermarking pipeline.
//!
//! [`MarkError`] covers the fatal failure modes from image decoding through
//! embedding. Reed-Solomon decode failure is deliberately NOT here: extraction
//! never throws for decodable inputs, it reports failure inside the extract
//! outcome instead.

use core::fmt;

/// Errors that can occur during watermark embedding or extraction.
#[derive(Debug)]
pub enum MarkError {
    /// The input could not be decoded as a supported image.
    InputUnreadable(image::ImageError),
    /// Quality validator inputs have different dimensions.
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Payload + ECC parity exceeds the block capacity of the luminance plane.
    CapacityExceeded {
        required_bits: usize,
        total_blocks: usize,
    },
    /// The signing key is missing or malformed.
    SignerUnconfigured,
    /// The operation was cancelled by the caller.
    Cancelled,
}

impl fmt::Display for MarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputUnreadable(e) => write!(f, "unreadable input image: {e}"),
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            Self::CapacityExceeded {
                required_bits,
                total_blocks,
            } => write!(
                f,
                "capacity exceeded: payload needs {required_bits} bits but only {total_blocks} blocks are available"
            ),
            Self::SignerUnconfigured => write!(f, "signing key missing or malformed"),
            Self::Cancelled => write!(f, "operation cancelled by caller"),
        }
    }
}

impl std::error::Error for MarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InputUnreadable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for MarkError {
    fn from(e: image::ImageError) -> Self {
        Self::InputUnreadable(e)
    }
}

/// Non-fatal conditions surfaced by an embed alongside its result.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedWarning {
    /// PSNR or SSIM fell below the perceptual-indistinguishability floor.
    QualityBelowTarget { psnr: f64, ssim: f64 },
    /// No signer was configured; the evidence record carries no signature.
    SignerUnconfigured,
}

impl fmt::Display for EmbedWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QualityBelowTarget { psnr, ssim } => {
                write!(f, "quality below target: psnr={psnr:.2} dB, ssim={ssim:.4}")
            }
            Self::SignerUnconfigured => write!(f, "no signer configured, record unsigned"),
        }
    }
}
