// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Payload canonicalization: the canonical identity payload, the compact
//! embeddable payload, and the work-ID generator.
//!
//! The canonical form is UTF-8 text with one `KEY=VALUE` per line, the nine
//! keys in ascending lexicographic order, no trailing newline. It is
//! deterministic for a given `(profile, workId, mediaType, aspect, instant)`
//! and is the input of the payload hash that seeds the coefficient hopper.

use std::collections::BTreeMap;
use core::fmt;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// The nine canonical payload keys, ascending lexicographic order.
pub const CANONICAL_KEYS: [&str; 9] = [
    "ASPECTRATIO",
    "AUTHOR",
    "COPYRIGHT",
    "CREATEDUTC",
    "KNOWNAS",
    "MEDIATYPE",
    "RIGHTS",
    "SOURCE",
    "WORKID",
];

/// Rights statement recorded in every canonical payload.
pub const RIGHTS_STATEMENT: &str = "ALL RIGHTS RESERVED";

/// Owner identity consumed read-only by the canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserProfile {
    pub legal_name: String,
    pub display_name: String,
    pub copyright_year: i32,
    pub primary_source: String,
}

/// Errors from canonical payload parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum PayloadError {
    /// A line without a `KEY=VALUE` shape.
    MalformedLine(String),
    /// A key outside the canonical set. Unknown fields are rejected loudly.
    UnknownKey(String),
    /// The same key appeared twice.
    DuplicateKey(String),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine(line) => write!(f, "malformed payload line: {line:?}"),
            Self::UnknownKey(key) => write!(f, "unknown payload key: {key}"),
            Self::DuplicateKey(key) => write!(f, "duplicate payload key: {key}"),
        }
    }
}

impl std::error::Error for PayloadError {}

/// Build the canonical payload text for an embed operation.
pub fn canonical_payload(
    profile: &UserProfile,
    work_id: &str,
    media_type: &str,
    aspect_ratio: &str,
    created: DateTime<Utc>,
) -> String {
    let mut fields = BTreeMap::new();
    fields.insert("ASPECTRATIO".to_string(), aspect_ratio.to_string());
    fields.insert("AUTHOR".to_string(), profile.legal_name.clone());
    fields.insert("COPYRIGHT".to_string(), profile.copyright_year.to_string());
    fields.insert(
        "CREATEDUTC".to_string(),
        created.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    fields.insert("KNOWNAS".to_string(), profile.display_name.clone());
    fields.insert("MEDIATYPE".to_string(), media_type.to_string());
    fields.insert("RIGHTS".to_string(), RIGHTS_STATEMENT.to_string());
    fields.insert("SOURCE".to_string(), profile.primary_source.clone());
    fields.insert("WORKID".to_string(), work_id.to_string());
    serialize_fields(&fields)
}

/// Serialize a field map in canonical form: ascending keys, `KEY=VALUE`
/// lines joined by `\n`, no trailing newline.
pub fn serialize_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse canonical payload text back into its field map.
///
/// # Errors
/// [`PayloadError`] on malformed lines, unknown keys, or duplicates.
pub fn parse_canonical(text: &str) -> Result<BTreeMap<String, String>, PayloadError> {
    let mut fields = BTreeMap::new();
    for line in text.lines() {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| PayloadError::MalformedLine(line.to_string()))?;
        if !CANONICAL_KEYS.contains(&key) {
            return Err(PayloadError::UnknownKey(key.to_string()));
        }
        if fields.insert(key.to_string(), value.to_string()).is_some() {
            return Err(PayloadError::DuplicateKey(key.to_string()));
        }
    }
    Ok(fields)
}

/// Uppercase initials of the whitespace-delimited name components.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// The compact embeddable payload: `©<initials>|<displayName>|<workId>`.
pub fn compact_payload(profile: &UserProfile, work_id: &str) -> String {
    format!(
        "\u{a9}{}|{}|{}",
        initials(&profile.legal_name),
        profile.display_name,
        work_id
    )
}

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 digits are ASCII")
}

/// Generate a fresh work identifier:
/// `GJP-MEDIA-<year>-<base36 millis><6 base36 random>`, uppercase.
///
/// Unique per embed operation; the identifier domain-separates every seed
/// derived from it.
pub fn generate_work_id(now: DateTime<Utc>) -> String {
    work_id_with_rng(now, &mut ChaCha20Rng::from_entropy())
}

/// Deterministic variant for callers that control the RNG.
pub fn work_id_with_rng<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..36u32) as usize] as char)
        .collect();
    format!(
        "GJP-MEDIA-{}-{}{}",
        now.year(),
        base36(now.timestamp_millis() as u64),
        suffix
    )
}

/// Common aspect ratios and their labels.
const ASPECT_TABLE: [(&str, f64); 7] = [
    ("16:9", 16.0 / 9.0),
    ("4:3", 4.0 / 3.0),
    ("1:1", 1.0),
    ("3:2", 3.0 / 2.0),
    ("21:9", 21.0 / 9.0),
    ("9:16", 9.0 / 16.0),
    ("4:5", 4.0 / 5.0),
];

/// Label the closest common aspect ratio within 0.05 tolerance, else `custom`.
pub fn detect_aspect_ratio(width: u32, height: u32) -> String {
    if height == 0 {
        return "custom".to_string();
    }
    let ratio = width as f64 / height as f64;
    let mut best: Option<(&str, f64)> = None;
    for (label, value) in ASPECT_TABLE {
        let diff = (ratio - value).abs();
        if diff <= 0.05 && best.map_or(true, |(_, d)| diff < d) {
            best = Some((label, diff));
        }
    }
    best.map_or_else(|| "custom".to_string(), |(label, _)| label.to_string())
}
