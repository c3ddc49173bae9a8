// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborators of the gateway service.
//
// The key store and the transport live outside the envelope core.  The
// service only sees these traits; deployments plug in an encrypted database
// and an HTTPS client, tests and the CLI use the implementations in `stub`.

use std::time::Duration;

use eetgateway_core::error::SigningError;
use eetgateway_security::TaxpayerCredentials;
use thiserror::Error;

/// Failure to hand out a taxpayer's credentials.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("no credentials stored under id {0:?}")]
    NotFound(String),

    /// The password does not open the stored record.
    #[error("invalid password for credentials {0:?}")]
    InvalidPassword(String),

    #[error("credentials already stored under id {0:?}")]
    AlreadyExists(String),

    /// The certificate or key cannot be used for signing.
    #[error("credentials rejected: {0}")]
    Rejected(#[from] SigningError),

    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

/// Sealed storage of taxpayer certificates and private keys.
pub trait KeyStore: Send + Sync {
    /// Open the record stored under `id` with `password`.
    fn get(&self, id: &str, password: &[u8]) -> Result<TaxpayerCredentials, KeyStoreError>;

    /// Seal a PEM certificate and key under a new `id`.
    fn insert(
        &self,
        id: &str,
        password: &[u8],
        certificate_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<(), KeyStoreError>;

    /// Re-seal the record under `new_password`; `old_password` must open it.
    fn update_password(
        &self,
        id: &str,
        old_password: &[u8],
        new_password: &[u8],
    ) -> Result<(), KeyStoreError>;

    /// Move the record stored under `old_id` to `new_id`.
    fn rename(&self, old_id: &str, new_id: &str) -> Result<(), KeyStoreError>;

    fn delete(&self, id: &str) -> Result<(), KeyStoreError>;

    /// Stored ids in ascending order.
    fn ids(&self) -> Result<Vec<String>, KeyStoreError>;
}

/// Failure to exchange an envelope with the authority.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Carries envelopes to the authority's endpoint.
pub trait Transport: Send + Sync {
    /// Post a request envelope and return the raw response envelope.
    fn send(&self, envelope: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Check that the endpoint is reachable.
    fn ping(&self) -> Result<(), TransportError>;
}
