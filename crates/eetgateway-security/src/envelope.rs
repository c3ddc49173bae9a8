// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signed SOAP envelope builder.
//
// The envelope is a fixed WS-Security skeleton.  Building one means filling
// four slots: the body payload, the base64 certificate in
// `BinarySecurityToken`, the SHA-256 body digest in `DigestValue` and the
// RSA-SHA256 signature over `SignedInfo` in `SignatureValue`.  Digest and
// signature are both computed over exclusive-canonical octets of subtrees
// that first receive the namespace declarations they inherit in the
// envelope, so that the verifier on the other end arrives at the same bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use eetgateway_core::confirmation::ConfirmationRecord;
use eetgateway_core::error::Result;
use eetgateway_core::sale::SaleRecord;
use tracing::{debug, instrument};

use crate::c14n::{canonicalize, with_namespaces};
use crate::integrity::digest_base64;
use crate::keys::{Certificate, SigningKey};
use crate::path::{find_element, find_element_mut};
use crate::schema::{EET_NS, confirmation_to_element, sale_to_element};
use crate::xml::Element;

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

pub(crate) const BODY_PATH: &str = "./Body";
pub(crate) const TOKEN_PATH: &str = "./Header/Security/BinarySecurityToken";
pub(crate) const SIGNED_INFO_PATH: &str = "./Header/Security/Signature/SignedInfo";
pub(crate) const DIGEST_VALUE_PATH: &str =
    "./Header/Security/Signature/SignedInfo/Reference/DigestValue";
pub(crate) const SIGNATURE_VALUE_PATH: &str = "./Header/Security/Signature/SignatureValue";

const TEMPLATE: &str = concat!(
    r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:eet="http://fs.mfcr.cz/eet/schema/v3" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">"#,
    r#"<soapenv:Header>"#,
    r#"<wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" soapenv:mustUnderstand="1">"#,
    r#"<wsse:BinarySecurityToken EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary" ValueType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3" wsu:Id="id-token"></wsse:BinarySecurityToken>"#,
    r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="id-signature">"#,
    r#"<ds:SignedInfo>"#,
    r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"></ds:CanonicalizationMethod>"#,
    r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"></ds:SignatureMethod>"#,
    r##"<ds:Reference URI="#id-body">"##,
    r#"<ds:Transforms><ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"></ds:Transform></ds:Transforms>"#,
    r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"></ds:DigestMethod>"#,
    r#"<ds:DigestValue></ds:DigestValue>"#,
    r#"</ds:Reference>"#,
    r#"</ds:SignedInfo>"#,
    r#"<ds:SignatureValue></ds:SignatureValue>"#,
    r#"<ds:KeyInfo Id="id-keyinfo">"#,
    r#"<wsse:SecurityTokenReference wsu:Id="id-str">"#,
    r##"<wsse:Reference URI="#id-token" ValueType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3"></wsse:Reference>"##,
    r#"</wsse:SecurityTokenReference>"#,
    r#"</ds:KeyInfo>"#,
    r#"</ds:Signature>"#,
    r#"</wsse:Security>"#,
    r#"</soapenv:Header>"#,
    r#"<soapenv:Body wsu:Id="id-body"></soapenv:Body>"#,
    r#"</soapenv:Envelope>"#,
);

/// Canonical body octets, after declaring the namespaces the body inherits
/// from the envelope.
pub(crate) fn canonical_body(body: &Element) -> Vec<u8> {
    canonicalize(&with_namespaces(
        body,
        &[("eet", EET_NS), ("soapenv", SOAP_ENV_NS), ("wsu", WSU_NS)],
    ))
}

/// Base64 SHA-256 of [`canonical_body`].
pub(crate) fn body_digest(body: &Element) -> String {
    digest_base64(&canonical_body(body))
}

/// Canonical `SignedInfo` octets, with the XML-DSig namespace declared under
/// whatever prefix the element uses.
pub(crate) fn canonical_signed_info(signed_info: &Element) -> Vec<u8> {
    let prefix = signed_info.prefix.as_deref().unwrap_or("");
    canonicalize(&with_namespaces(signed_info, &[(prefix, DSIG_NS)]))
}

/// Wrap `payload` in a signed envelope.
#[instrument(skip_all, fields(payload = %payload.name))]
pub fn sign_envelope(payload: Element, certificate: &Certificate, key: &SigningKey) -> Result<Vec<u8>> {
    let mut envelope = Element::parse(TEMPLATE.as_bytes())?;

    find_element_mut(&mut envelope, TOKEN_PATH)?.set_text(certificate.to_base64());

    let body = find_element_mut(&mut envelope, BODY_PATH)?;
    body.push_child(payload);
    let digest = body_digest(body);
    find_element_mut(&mut envelope, DIGEST_VALUE_PATH)?.set_text(digest);

    let signed_info = canonical_signed_info(find_element(&envelope, SIGNED_INFO_PATH)?);
    let signature = key.sign(&signed_info)?;
    find_element_mut(&mut envelope, SIGNATURE_VALUE_PATH)?.set_text(BASE64.encode(signature.as_slice()));

    let bytes = envelope.to_bytes();
    debug!(len = bytes.len(), "envelope signed");
    Ok(bytes)
}

/// Signed request envelope for a sale record whose security codes are set.
#[instrument(skip_all, fields(uuid = %record.header().message_uuid))]
pub fn build_request_envelope(
    record: &SaleRecord,
    certificate: &Certificate,
    key: &SigningKey,
) -> Result<Vec<u8>> {
    let trzba = sale_to_element(record)?;
    sign_envelope(trzba, certificate, key)
}

/// Signed response envelope carrying `record`, as the authority sends it.
pub fn build_response_envelope(
    record: &ConfirmationRecord,
    certificate: &Certificate,
    key: &SigningKey,
) -> Result<Vec<u8>> {
    sign_envelope(confirmation_to_element(record), certificate, key)
}
