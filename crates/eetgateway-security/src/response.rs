// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Response envelope parser and verifier.
//
// Verification runs five checks in a fixed order and stops at the first
// failure: message UUID, hash code, body digest, signature over SignedInfo,
// trust in the signing certificate.  The two correlation checks need nothing
// but the parsed confirmation; the envelope is only parsed once they pass.
//
// Responses to verification-only submissions and error responses are not
// authenticated at all.  The authority does not sign anything of value in
// them, and the gateway has always accepted them unchecked.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use eetgateway_core::confirmation::ConfirmationRecord;
use eetgateway_core::error::{Result, SchemaError, VerificationError};
use eetgateway_core::sale::SaleRecord;
use tracing::{debug, instrument};

use crate::envelope::{
    BODY_PATH, DIGEST_VALUE_PATH, SIGNATURE_VALUE_PATH, SIGNED_INFO_PATH, TOKEN_PATH,
    canonical_body, canonical_signed_info,
};
use crate::integrity::verify_digest;
use crate::keys::Certificate;
use crate::path::find_element;
use crate::schema::confirmation_from_element;
use crate::trust::TrustVerifier;
use crate::xml::Element;

const ODPOVED_PATH: &str = "./Body/Odpoved";

/// Decode the confirmation carried in a response envelope.
#[instrument(skip_all, fields(len = response.len()))]
pub fn parse_response(response: &[u8]) -> Result<ConfirmationRecord> {
    let envelope = Element::parse(response)?;
    find_element(&envelope, BODY_PATH)?;
    let odpoved = find_element(&envelope, ODPOVED_PATH)?;
    let record = confirmation_from_element(odpoved)?;
    debug!(error_code = record.error_code(), "response parsed");
    Ok(record)
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

/// Check the body digest and the signature of a signed envelope and return
/// the certificate that signed it.
///
/// Says nothing about whether that certificate is trusted.
pub fn verify_signed_envelope(envelope: &Element) -> Result<Certificate> {
    let body = find_element(envelope, BODY_PATH)?;
    let digest_value = find_element(envelope, DIGEST_VALUE_PATH)?.text();
    verify_digest(&canonical_body(body), &compact(&digest_value))?;

    let token = find_element(envelope, TOKEN_PATH)?.text();
    let certificate =
        Certificate::from_base64(&token).map_err(|e| VerificationError::SignatureInvalid {
            reason: format!("security token: {e}"),
        })?;
    let signature_value = find_element(envelope, SIGNATURE_VALUE_PATH)?.text();
    let signature =
        BASE64
            .decode(compact(&signature_value))
            .map_err(|e| VerificationError::SignatureInvalid {
                reason: format!("signature value is not base64: {e}"),
            })?;
    let signed_info = canonical_signed_info(find_element(envelope, SIGNED_INFO_PATH)?);
    certificate.verify_signature(&signed_info, &signature)?;
    Ok(certificate)
}

/// Authenticate `response` as the answer to `original`.
///
/// `confirmation` is the record [`parse_response`] produced from the same
/// bytes.
#[instrument(skip_all, fields(uuid = %original.header().message_uuid))]
pub fn verify_response(
    original: &SaleRecord,
    response: &[u8],
    confirmation: &ConfirmationRecord,
    trust: &dyn TrustVerifier,
) -> Result<()> {
    if original.header().verification_only || confirmation.is_error() {
        debug!(
            verification_only = original.header().verification_only,
            error_code = confirmation.error_code(),
            "response authentication skipped"
        );
        return Ok(());
    }

    let expected_uuid = original.header().message_uuid.as_str();
    if confirmation.header.message_uuid.as_deref() != Some(expected_uuid) {
        return Err(VerificationError::UuidMismatch {
            expected: expected_uuid.to_owned(),
            actual: confirmation.header.message_uuid.clone(),
        }
        .into());
    }

    let expected_hash = original
        .security_codes()
        .ok_or(SchemaError::MissingSecurityCodes)?
        .hash_code
        .as_str();
    if confirmation.header.hash_code.as_deref() != Some(expected_hash) {
        return Err(VerificationError::HashCodeMismatch {
            expected: expected_hash.to_owned(),
            actual: confirmation.header.hash_code.clone(),
        }
        .into());
    }

    let envelope = Element::parse(response)?;
    let certificate = verify_signed_envelope(&envelope)?;

    trust
        .verify_certificate(&certificate)
        .map_err(VerificationError::CertificateUntrusted)?;

    debug!("response authenticated");
    Ok(())
}
