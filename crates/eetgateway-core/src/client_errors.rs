// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client-facing error categories.
//
// Every core error is mapped to a coarse category with a plain message that
// does not leak digests, key details or certificate contents.  The outer
// layers (HTTP handlers, CLI) report these instead of the specific error.

use crate::error::{GatewayError, SchemaError, SigningError, VerificationError};

/// Coarse error category shown to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller's sale record or document is wrong; fix and resend.
    InvalidInput,
    /// The taxpayer's key or certificate cannot be used for signing.
    Credentials,
    /// The authority's response could not be decoded.
    MalformedResponse,
    /// The authority's response failed authentication.
    ResponseRejected,
}

/// A client-facing error with a safe message.
#[derive(Debug, Clone)]
pub struct ClientError {
    pub category: ErrorCategory,
    pub message: String,
    /// Whether sending again (as a fresh record) can help.
    pub retriable: bool,
    /// Whether the failure needs an operator's attention.
    pub escalate: bool,
}

/// Map a core error onto its client-facing category.
///
/// `response_stage` tells schema errors raised while decoding the authority's
/// answer apart from those raised while building the request.
pub fn classify(err: &GatewayError, response_stage: bool) -> ClientError {
    match err {
        GatewayError::Schema(schema) if response_stage => ClientError {
            category: ErrorCategory::MalformedResponse,
            message: match schema {
                SchemaError::MalformedXml(_) => "The tax authority returned an unreadable response.".into(),
                _ => "The tax authority's response has an unexpected structure.".into(),
            },
            retriable: true,
            escalate: false,
        },

        GatewayError::Schema(SchemaError::InvalidField { field, .. }) => ClientError {
            category: ErrorCategory::InvalidInput,
            message: format!("The sale record field '{field}' has an invalid value."),
            retriable: false,
            escalate: false,
        },

        GatewayError::Schema(SchemaError::MissingSecurityCodes) => ClientError {
            category: ErrorCategory::InvalidInput,
            message: "The sale record was not prepared for signing.".into(),
            retriable: false,
            escalate: false,
        },

        GatewayError::Schema(_) => ClientError {
            category: ErrorCategory::InvalidInput,
            message: "The request envelope could not be assembled.".into(),
            retriable: false,
            escalate: true,
        },

        GatewayError::Signing(SigningError::InvalidCertificate(_)) => ClientError {
            category: ErrorCategory::Credentials,
            message: "The taxpayer's certificate cannot be used.".into(),
            retriable: false,
            escalate: false,
        },

        GatewayError::Signing(_) => ClientError {
            category: ErrorCategory::Credentials,
            message: "The sale record could not be signed with the taxpayer's key.".into(),
            retriable: false,
            escalate: false,
        },

        GatewayError::Verification(verification) => ClientError {
            category: ErrorCategory::ResponseRejected,
            message: match verification {
                VerificationError::UuidMismatch { .. } | VerificationError::HashCodeMismatch { .. } => {
                    "The tax authority's response does not belong to this sale.".into()
                }
                VerificationError::CertificateUntrusted(_) => {
                    "The tax authority's response was signed by an untrusted certificate.".into()
                }
                _ => "The tax authority's response failed its integrity check.".into(),
            },
            retriable: false,
            escalate: true,
        },
    }
}
