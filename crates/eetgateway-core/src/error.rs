// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error taxonomy for the EET envelope core.
//
// Three families: schema (document shape and field formats), signing (key
// material and cryptographic operations), and verification (the five response
// checks).  `GatewayError` unifies them so callers can use `?` across the
// whole build/parse/verify pipeline.

use thiserror::Error;

/// The document or one of its fields does not have the mandated shape.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// An expected element is absent at `path` below `root_tag`.
    #[error("element in {path} of {root_tag} element not found")]
    MalformedEnvelope { path: String, root_tag: String },

    #[error("malformed XML document: {0}")]
    MalformedXml(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The sale record was handed to the builder before its codes were set.
    #[error("sale record has no security codes")]
    MissingSecurityCodes,
}

impl SchemaError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Key material is unusable or a cryptographic operation failed.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("unusable private key: {0}")]
    UnusableKey(String),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("signing failed: {0}")]
    Operation(String),
}

/// Failure reported by an external trust verifier (chain or revocation).
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct TrustError {
    pub reason: String,
}

impl TrustError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// One of the response authentication checks failed.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("response message UUID {actual:?} differs from the submitted {expected}")]
    UuidMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("response hash code {actual:?} differs from the submitted {expected}")]
    HashCodeMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("computed digest {actual} differs from the digest {expected} in the envelope")]
    DigestMismatch { expected: String, actual: String },

    #[error("response signature is invalid: {reason}")]
    SignatureInvalid { reason: String },

    #[error("response certificate is not trusted: {0}")]
    CertificateUntrusted(#[source] TrustError),
}

/// Top-level error type for all envelope operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl GatewayError {
    /// Whether this error signals a potential security problem with the
    /// authority's response rather than a local or transport failure.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GatewayError>;
