// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Deterministic coefficient hopping over the mid-frequency band.
//!
//! The hopper owns an ordered list of mid-frequency DCT coordinates and
//! permutes it with a Fisher-Yates shuffle driven directly by the bytes of
//! SHA-256(`workId ":" payloadHash`). Both embedder and extractor rebuild the
//! identical schedule from those two strings alone; the schedule is a pure
//! function of its inputs.
//!
//! DC carries visible luminance changes and high frequencies vanish under
//! JPEG quantization; the selected band survives the standard quantization
//! matrix at quality >= 65.

use sha2::{Digest, Sha256};

/// Mid-frequency coordinate band, in (row, col) order of the 8×8 spectrum.
pub const MID_FREQUENCY_BAND: [(usize, usize); 13] = [
    (2, 2),
    (2, 3),
    (3, 2),
    (3, 3),
    (2, 4),
    (4, 2),
    (3, 4),
    (4, 3),
    (4, 4),
    (2, 5),
    (5, 2),
    (3, 5),
    (5, 3),
];

/// A shuffled schedule of mid-frequency coefficient positions.
///
/// `position(i)` wraps around the schedule; the hopping pattern cycles
/// across blocks, not within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientHopper {
    schedule: [(usize, usize); MID_FREQUENCY_BAND.len()],
}

impl CoefficientHopper {
    /// Build the schedule for `(workId, payloadHash)`.
    ///
    /// Seed = SHA-256(`workId || ":" || payloadHash`). The Fisher-Yates pass
    /// uses seed byte `i mod 32` (wrapping) as the modular index source:
    /// `j = seed[i mod 32] mod (i + 1)`, then swaps positions `i` and `j`.
    pub fn new(work_id: &str, payload_hash: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(work_id.as_bytes());
        hasher.update(b":");
        hasher.update(payload_hash.as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();

        let mut schedule = MID_FREQUENCY_BAND;
        for i in 1..schedule.len() {
            let j = seed[i % seed.len()] as usize % (i + 1);
            schedule.swap(i, j);
        }
        Self { schedule }
    }

    /// The coefficient position for block `block_index` (wraps around).
    pub fn position(&self, block_index: usize) -> (usize, usize) {
        self.schedule[block_index % self.schedule.len()]
    }

    /// The full shuffled schedule.
    pub fn schedule(&self) -> &[(usize, usize)] {
        &self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = CoefficientHopper::new("GJP-MEDIA-2026-TEST", "abc123");
        let b = CoefficientHopper::new("GJP-MEDIA-2026-TEST", "abc123");
        assert_eq!(a, b);
        for i in 0..100 {
            assert_eq!(a.position(i), b.position(i));
        }
    }

    #[test]
    fn schedule_is_permutation_of_band() {
        let hopper = CoefficientHopper::new("W", "H");
        let mut seen = hopper.schedule().to_vec();
        seen.sort();
        let mut band = MID_FREQUENCY_BAND.to_vec();
        band.sort();
        assert_eq!(seen, band);
    }

    #[test]
    fn different_payload_hash_differs() {
        // Differing payloadHash should give a different sequence at index 0
        // with overwhelming probability; test over a handful of hashes.
        let base = CoefficientHopper::new("WORK", "hash-a");
        let mut any_differs = false;
        for suffix in ["hash-b", "hash-c", "hash-d", "hash-e"] {
            let other = CoefficientHopper::new("WORK", suffix);
            if other.schedule() != base.schedule() {
                any_differs = true;
            }
        }
        assert!(any_differs);
    }

    #[test]
    fn position_wraps() {
        let hopper = CoefficientHopper::new("W", "H");
        let len = MID_FREQUENCY_BAND.len();
        for i in 0..len {
            assert_eq!(hopper.position(i), hopper.position(i + len));
            assert_eq!(hopper.position(i), hopper.position(i + 7 * len));
        }
    }

    #[test]
    fn all_positions_are_mid_frequency() {
        let hopper = CoefficientHopper::new("ANY", "SEED");
        for i in 0..50 {
            let (r, c) = hopper.position(i);
            assert!(MID_FREQUENCY_BAND.contains(&(r, c)));
            assert!(r >= 2 && c >= 2, "DC/low band excluded");
            assert!(r <= 5 && c <= 5, "high band excluded");
        }
    }
}
