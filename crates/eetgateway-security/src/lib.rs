// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! eetgateway-security: the cryptographic envelope of the EET protocol.
//!
//! Computes the two security codes of a sale record, wraps records in
//! WS-Security signed SOAP envelopes, and authenticates the authority's
//! signed confirmations.  Everything here is synchronous and holds no state
//! between calls; key material is only borrowed for the duration of a call.

pub mod c14n;
pub mod codes;
pub mod envelope;
pub mod integrity;
pub mod keys;
pub mod path;
pub mod response;
pub mod schema;
pub mod trust;
pub mod xml;

// PUBLIC API: Re-export the envelope pipeline
pub use codes::{compute_hash_code, compute_signature_code, set_security_codes, signature_plaintext};
pub use envelope::{build_request_envelope, build_response_envelope, sign_envelope};
pub use keys::{Certificate, SigningKey, TaxpayerCredentials};
pub use path::{find_element, find_element_mut};
pub use response::{parse_response, verify_response, verify_signed_envelope};
pub use trust::{AnyOf, CertificateAuthorities, PinnedCertificates, TrustVerifier};
pub use xml::Element;
