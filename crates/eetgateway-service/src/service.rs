// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway service: one sale in, one authenticated confirmation out.
//
// The pipeline is key store -> security codes -> request envelope ->
// transport -> response parse -> response verification.  Each stage has its
// own `ServiceError` variant so callers can tell a wrong password from a
// forged response without inspecting the underlying error.

use eetgateway_core::client_errors::{ClientError, classify};
use eetgateway_core::confirmation::ConfirmationRecord;
use eetgateway_core::error::GatewayError;
use eetgateway_core::sale::SaleRecord;
use eetgateway_security::{
    TaxpayerCredentials, TrustVerifier, build_request_envelope, parse_response,
    set_security_codes, verify_response,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::traits::{KeyStore, KeyStoreError, Transport, TransportError};

/// Failure of one stage of [`GatewayService::send_sale`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("taxpayer's certificate not found")]
    CertificateNotFound(#[source] KeyStoreError),

    #[error("invalid password for the decryption of the taxpayer's certificate")]
    InvalidCertificatePassword(#[source] KeyStoreError),

    #[error("taxpayer's certificate not retrieved")]
    CertificateGet(#[source] KeyStoreError),

    #[error("taxpayer's certificate with the ID already exists")]
    IdAlreadyExists(#[source] KeyStoreError),

    #[error("invalid taxpayer's certificate")]
    InvalidTaxpayerCertificate(#[source] KeyStoreError),

    #[error("taxpayer's certificate not stored")]
    CertificateStore(#[source] KeyStoreError),

    #[error("password to the taxpayer's certificate not updated")]
    CertificateUpdatePassword(#[source] KeyStoreError),

    #[error("id of the taxpayer's certificate not updated")]
    CertificateUpdateId(#[source] KeyStoreError),

    #[error("taxpayer's certificate not deleted")]
    CertificateDelete(#[source] KeyStoreError),

    #[error("taxpayer's certificate ids not listed")]
    CertificateList(#[source] KeyStoreError),

    #[error("request to the tax authority not constructed")]
    RequestBuild(#[source] GatewayError),

    #[error("tax authority connection error")]
    Connection(#[source] TransportError),

    #[error("tax authority response parse error")]
    ResponseParse(#[source] GatewayError),

    #[error("tax authority response not successfully verified")]
    ResponseVerify(#[source] GatewayError),
}

impl From<KeyStoreError> for ServiceError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::NotFound(_) => Self::CertificateNotFound(err),
            KeyStoreError::InvalidPassword(_) => Self::InvalidCertificatePassword(err),
            _ => Self::CertificateGet(err),
        }
    }
}

impl ServiceError {
    /// Map the distinct key-store failures of a management call to their own
    /// variants and everything else to `fallback`.
    fn from_key_store(err: KeyStoreError, fallback: fn(KeyStoreError) -> Self) -> Self {
        match err {
            KeyStoreError::NotFound(_) => Self::CertificateNotFound(err),
            KeyStoreError::InvalidPassword(_) => Self::InvalidCertificatePassword(err),
            KeyStoreError::AlreadyExists(_) => Self::IdAlreadyExists(err),
            KeyStoreError::Rejected(_) => Self::InvalidTaxpayerCertificate(err),
            KeyStoreError::Unavailable(_) => fallback(err),
        }
    }

    /// Client-facing view of an envelope failure, if this is one.
    pub fn client_error(&self) -> Option<ClientError> {
        match self {
            Self::RequestBuild(err) => Some(classify(err, false)),
            Self::ResponseParse(err) | Self::ResponseVerify(err) => Some(classify(err, true)),
            _ => None,
        }
    }
}

/// Submits sale records and authenticates the authority's answers.
pub struct GatewayService<K, T, V> {
    key_store: K,
    transport: T,
    trust: V,
}

impl<K: KeyStore, T: Transport, V: TrustVerifier> GatewayService<K, T, V> {
    pub fn new(key_store: K, transport: T, trust: V) -> Self {
        Self {
            key_store,
            transport,
            trust,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check that the authority's endpoint answers.
    pub fn ping(&self) -> Result<(), ServiceError> {
        self.transport.ping().map_err(ServiceError::Connection)
    }

    /// Seal a taxpayer's certificate and key under a new `cert_id`.
    pub fn store_certificate(
        &self,
        cert_id: &str,
        password: &[u8],
        certificate_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<(), ServiceError> {
        self.key_store
            .insert(cert_id, password, certificate_pem, key_pem)
            .map_err(|e| ServiceError::from_key_store(e, ServiceError::CertificateStore))?;
        info!(cert_id, "taxpayer certificate stored");
        Ok(())
    }

    pub fn update_certificate_password(
        &self,
        cert_id: &str,
        old_password: &[u8],
        new_password: &[u8],
    ) -> Result<(), ServiceError> {
        self.key_store
            .update_password(cert_id, old_password, new_password)
            .map_err(|e| ServiceError::from_key_store(e, ServiceError::CertificateUpdatePassword))?;
        info!(cert_id, "taxpayer certificate password updated");
        Ok(())
    }

    pub fn rename_certificate(&self, old_id: &str, new_id: &str) -> Result<(), ServiceError> {
        self.key_store
            .rename(old_id, new_id)
            .map_err(|e| ServiceError::from_key_store(e, ServiceError::CertificateUpdateId))?;
        info!(old_id, new_id, "taxpayer certificate renamed");
        Ok(())
    }

    pub fn delete_certificate(&self, cert_id: &str) -> Result<(), ServiceError> {
        self.key_store
            .delete(cert_id)
            .map_err(|e| ServiceError::from_key_store(e, ServiceError::CertificateDelete))?;
        info!(cert_id, "taxpayer certificate deleted");
        Ok(())
    }

    pub fn certificate_ids(&self) -> Result<Vec<String>, ServiceError> {
        self.key_store.ids().map_err(ServiceError::CertificateList)
    }

    /// Sign `record` with the credentials stored under `cert_id` and submit it.
    ///
    /// The security codes are written into `record`, so a caller that keeps
    /// it can print them on the receipt even when the submission fails.  A
    /// retry after a failure must go through [`SaleRecord::for_resubmission`].
    #[instrument(skip_all, fields(cert_id = %cert_id, uuid = %record.header().message_uuid))]
    pub fn send_sale(
        &self,
        cert_id: &str,
        password: &[u8],
        record: &mut SaleRecord,
    ) -> Result<ConfirmationRecord, ServiceError> {
        let credentials = self.key_store.get(cert_id, password)?;

        let request = prepare_request(record, &credentials).map_err(ServiceError::RequestBuild)?;

        let response = self
            .transport
            .send(&request)
            .map_err(ServiceError::Connection)?;

        let confirmation = parse_response(&response).map_err(ServiceError::ResponseParse)?;

        verify_response(record, &response, &confirmation, &self.trust).map_err(|err| {
            warn!(%err, "response rejected");
            ServiceError::ResponseVerify(err)
        })?;

        info!(
            error_code = confirmation.error_code(),
            accepted = confirmation.fiscal_code().is_some(),
            "sale submitted"
        );
        Ok(confirmation)
    }
}

fn prepare_request(
    record: &mut SaleRecord,
    credentials: &TaxpayerCredentials,
) -> Result<Vec<u8>, GatewayError> {
    record.validate()?;
    set_security_codes(record, &credentials.signing_key)?;
    build_request_envelope(record, &credentials.certificate, &credentials.signing_key)
}
