// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Evidence hashing and signing.
//!
//! SHA-256 over media bytes and the canonical payload, and deterministic
//! (RFC 6979) secp256k1 signatures over the binding message
//! `mediaHash:payloadHash:timestampMillis`. Signatures are the 64-byte
//! compact form (r || s), hex-encoded; public keys are 33-byte compressed,
//! hex-encoded. Verification is pure.
//!
//! The 32-byte private key arrives out-of-band as 64 lowercase hex chars
//! (environment or secret store), is never logged, and its intermediate
//! buffer is zeroized.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::mark::error::MarkError;

/// The only signature algorithm emitted by this crate.
pub const SIGNATURE_ALGORITHM: &str = "secp256k1";

/// SHA-256 of a byte buffer, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Constant-time equality for hash strings.
///
/// Hash comparisons in evidence verification must not leak a matching
/// prefix length through timing.
pub fn hashes_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// The exact byte string covered by an evidence signature.
pub fn signing_message(media_hash: &str, payload_hash: &str, timestamp_millis: i64) -> Vec<u8> {
    format!("{media_hash}:{payload_hash}:{timestamp_millis}").into_bytes()
}

/// A configured secp256k1 evidence signer.
pub struct EvidenceSigner {
    key: SigningKey,
    public_key_hex: String,
}

impl EvidenceSigner {
    /// Construct from a 64-char lowercase hex private key.
    ///
    /// Derives the compressed public key on construction.
    ///
    /// # Errors
    /// [`MarkError::SignerUnconfigured`] for malformed hex or an invalid
    /// scalar.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, MarkError> {
        if private_key_hex.len() != 64
            || !private_key_hex
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(MarkError::SignerUnconfigured);
        }
        let bytes = Zeroizing::new(
            hex::decode(private_key_hex).map_err(|_| MarkError::SignerUnconfigured)?,
        );
        let key = SigningKey::from_slice(&bytes).map_err(|_| MarkError::SignerUnconfigured)?;
        let public_key_hex = hex::encode(VerifyingKey::from(&key).to_encoded_point(true).as_bytes());
        Ok(Self { key, public_key_hex })
    }

    /// The 33-byte compressed public key, hex-encoded.
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Sign `mediaHash:payloadHash:timestampMillis`.
    ///
    /// The message is hashed with SHA-256 and signed deterministically;
    /// the same inputs always produce the same 128-hex-char signature.
    pub fn sign_evidence(
        &self,
        media_hash: &str,
        payload_hash: &str,
        timestamp_millis: i64,
    ) -> String {
        let message = signing_message(media_hash, payload_hash, timestamp_millis);
        let signature: Signature = self.key.sign(&message);
        hex::encode(signature.to_bytes())
    }
}

impl core::fmt::Debug for EvidenceSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Never expose key material, even through Debug.
        f.debug_struct("EvidenceSigner")
            .field("public_key", &self.public_key_hex)
            .finish()
    }
}

/// Verify an evidence signature against a compressed public key.
///
/// Pure function; returns `false` for malformed keys or signatures.
pub fn verify_evidence(
    public_key_hex: &str,
    media_hash: &str,
    payload_hash: &str,
    timestamp_millis: i64,
    signature_hex: &str,
) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    let message = signing_message(media_hash, payload_hash, timestamp_millis);
    verifying_key.verify(&message, &signature).is_ok()
}
