// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 digests for the body `DigestValue` and certificate fingerprints.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use eetgateway_core::error::VerificationError;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data`, base64-encoded as it appears in `DigestValue`.
pub fn digest_base64(data: &[u8]) -> String {
    BASE64.encode(sha256(data))
}

/// Verify that `data` hashes to the base64 digest `expected`.
///
/// The comparison is on decoded bytes, so an undecodable `expected` is a
/// mismatch rather than a separate error.
pub fn verify_digest(data: &[u8], expected: &str) -> Result<(), VerificationError> {
    let actual = sha256(data);
    match BASE64.decode(expected.trim()) {
        Ok(decoded) if decoded == actual => Ok(()),
        _ => Err(VerificationError::DigestMismatch {
            expected: expected.to_owned(),
            actual: BASE64.encode(actual),
        }),
    }
}
