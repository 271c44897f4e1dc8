// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Global progress tracking and cooperative cancellation.
//!
//! Step and total live in one packed atomic word, so `advance` and
//! `set_total` are single read-modify-write operations and a reader never
//! observes a step from one operation paired with a total from another.
//! Every long-running entry point (embed, extract, robustness, video shard
//! loop) checks the cancellation flag between block rows or frames and
//! returns `MarkError::Cancelled` when it is set.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::error::MarkError;

/// High 32 bits: total. Low 32 bits: step.
static STATE: AtomicU64 = AtomicU64::new(0);
static CANCELLED: AtomicBool = AtomicBool::new(false);

#[inline]
fn pack(step: u32, total: u32) -> u64 {
    (u64::from(total) << 32) | u64::from(step)
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    (word as u32, (word >> 32) as u32)
}

fn update(f: impl Fn(u32, u32) -> (u32, u32)) {
    let _ = STATE.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |word| {
        let (step, total) = unpack(word);
        let (step, total) = f(step, total);
        Some(pack(step, total))
    });
}

/// Reset progress to 0 and set the total step count.
/// Also resets the cancellation flag so a fresh operation starts clean.
pub fn init(total: u32) {
    CANCELLED.store(false, Ordering::Relaxed);
    STATE.store(pack(0, total), Ordering::Relaxed);
}

/// Set (or update) the total without resetting the step or the cancellation
/// flag. Used by inner pipeline stages once the real work size is known, so
/// a cancellation requested mid-operation is never silently cleared.
pub fn set_total(total: u32) {
    update(|step, _| (step, total));
}

/// Request cancellation of the current operation.
///
/// The pipelines observe this flag at natural loop boundaries (block rows,
/// frames, robustness cases) and return `Err(MarkError::Cancelled)`.
pub fn cancel() {
    CANCELLED.store(true, Ordering::Relaxed);
}

/// Returns `true` if cancellation has been requested.
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::Relaxed)
}

/// Check for cancellation and return an error if requested.
pub fn check_cancelled() -> Result<(), MarkError> {
    if is_cancelled() {
        Err(MarkError::Cancelled)
    } else {
        Ok(())
    }
}

/// Advance progress by one step.
///
/// With a known total the step saturates at `total - 1`; only [`finish`]
/// reports 100%. With total 0 (indeterminate) the step counts freely.
pub fn advance() {
    update(|step, total| {
        let ceiling = if total == 0 { u32::MAX } else { total - 1 };
        (step.saturating_add(1).min(ceiling), total)
    });
}

/// Read the current (step, total) progress.
pub fn get() -> (u32, u32) {
    unpack(STATE.load(Ordering::Relaxed))
}

/// Mark progress as complete (step = total).
pub fn finish() {
    update(|_, total| (total, total));
}

// No inline tests: the state is process-global, so asserting on it here
// would race against concurrently running pipeline tests. The module is
// exercised through every embed/extract entry point.
