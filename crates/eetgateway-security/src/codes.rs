// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security code calculator.
//
// The signature code (PKP) is an RSA-SHA256 PKCS#1 v1.5 signature over
//
//     dic_popl|id_provoz|id_pokl|porad_cis|dat_trzby|celk_trzba
//
// and the hash code (BKP) is the SHA-1 of the raw signature bytes, printed as
// five groups of eight uppercase hex digits.  Both depend only on the data
// block, so resubmissions of the same sale carry the same codes.

use eetgateway_core::error::SigningError;
use eetgateway_core::sale::{HashCode, SaleData, SaleRecord, SecurityCodes, SignatureCode};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::keys::SigningKey;

/// The pipe-delimited plaintext the signature code is computed over.
pub fn signature_plaintext(data: &SaleData) -> Zeroizing<String> {
    Zeroizing::new(format!(
        "{}|{}|{}|{}|{}|{}",
        data.taxpayer_id,
        data.premises_id,
        data.register_id,
        data.receipt_number,
        data.sold_at,
        data.total,
    ))
}

/// Sign the record's plaintext with `key`.
pub fn compute_signature_code(
    record: &SaleRecord,
    key: &SigningKey,
) -> Result<SignatureCode, SigningError> {
    let plaintext = signature_plaintext(record.data());
    let signature = key.sign(plaintext.as_bytes())?;
    Ok(SignatureCode::from_bytes(signature.to_vec()))
}

/// Format the SHA-1 of `signature` as `XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX`.
pub fn compute_hash_code(signature: &[u8]) -> HashCode {
    HashCode::from_signature(signature)
}

/// Compute both codes and attach them to `record`.
///
/// Deterministic for a given data block and key, so calling it again on the
/// same record yields the same codes.
#[instrument(skip_all, fields(uuid = %record.header().message_uuid))]
pub fn set_security_codes(record: &mut SaleRecord, key: &SigningKey) -> Result<(), SigningError> {
    let signature_code = compute_signature_code(record, key)?;
    debug!("security codes computed");
    record
        .attach_security_codes(SecurityCodes::from_signature_code(signature_code))
        .map_err(|e| SigningError::Operation(e.to_string()))
}
