// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process collaborators for tests, the CLI and offline development.
//
// `InMemoryKeyStore` keeps PEM documents behind a PBKDF2 password check,
// `SimulatedAuthority` answers request envelopes the way the playground
// endpoint does, and `UnreachableTransport` stands in when no endpoint is
// configured.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use eetgateway_core::confirmation::{ConfirmationHeader, ConfirmationRecord, ErrorIndicator};
use eetgateway_core::error::Result as GatewayResult;
use eetgateway_core::types::EetDateTime;
use eetgateway_security::{
    Certificate, Element, TaxpayerCredentials, build_response_envelope, find_element,
    verify_signed_envelope,
};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::traits::{KeyStore, KeyStoreError, Transport, TransportError};

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(10_000) {
    Some(n) => n,
    None => panic!("PBKDF2 iteration count must be non-zero"),
};

struct SealedRecord {
    salt: [u8; 16],
    password_hash: [u8; 32],
    certificate_pem: Zeroizing<Vec<u8>>,
    key_pem: Zeroizing<Vec<u8>>,
}

impl SealedRecord {
    fn seal(&mut self, password: &[u8]) -> Result<(), KeyStoreError> {
        SystemRandom::new()
            .fill(&mut self.salt)
            .map_err(|_| KeyStoreError::Unavailable("system RNG failed".into()))?;
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            &self.salt,
            password,
            &mut self.password_hash,
        );
        Ok(())
    }

    fn open(&self, id: &str, password: &[u8]) -> Result<(), KeyStoreError> {
        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            &self.salt,
            password,
            &self.password_hash,
        )
        .map_err(|_| KeyStoreError::InvalidPassword(id.to_owned()))
    }
}

/// Key store holding PEM credentials in memory.
#[derive(Default)]
pub struct InMemoryKeyStore {
    records: RwLock<HashMap<String, SealedRecord>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, SealedRecord>>, KeyStoreError> {
        self.records
            .read()
            .map_err(|_| KeyStoreError::Unavailable("lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, SealedRecord>>, KeyStoreError> {
        self.records
            .write()
            .map_err(|_| KeyStoreError::Unavailable("lock poisoned".into()))
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get(&self, id: &str, password: &[u8]) -> Result<TaxpayerCredentials, KeyStoreError> {
        let records = self.read()?;
        let record = records
            .get(id)
            .ok_or_else(|| KeyStoreError::NotFound(id.to_owned()))?;
        record.open(id, password)?;

        Ok(TaxpayerCredentials::from_pem(
            &record.certificate_pem,
            &record.key_pem,
        )?)
    }

    /// Both documents are parsed first so that unusable credentials are
    /// refused here rather than on the first sale.
    fn insert(
        &self,
        id: &str,
        password: &[u8],
        certificate_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<(), KeyStoreError> {
        TaxpayerCredentials::from_pem(certificate_pem, key_pem)?;

        let mut record = SealedRecord {
            salt: [0u8; 16],
            password_hash: [0u8; 32],
            certificate_pem: Zeroizing::new(certificate_pem.to_vec()),
            key_pem: Zeroizing::new(key_pem.to_vec()),
        };
        record.seal(password)?;

        let mut records = self.write()?;
        if records.contains_key(id) {
            return Err(KeyStoreError::AlreadyExists(id.to_owned()));
        }
        records.insert(id.to_owned(), record);
        debug!(id, "credentials stored");
        Ok(())
    }

    fn update_password(
        &self,
        id: &str,
        old_password: &[u8],
        new_password: &[u8],
    ) -> Result<(), KeyStoreError> {
        let mut records = self.write()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| KeyStoreError::NotFound(id.to_owned()))?;
        record.open(id, old_password)?;
        record.seal(new_password)?;
        debug!(id, "credentials re-sealed");
        Ok(())
    }

    fn rename(&self, old_id: &str, new_id: &str) -> Result<(), KeyStoreError> {
        let mut records = self.write()?;
        if !records.contains_key(old_id) {
            return Err(KeyStoreError::NotFound(old_id.to_owned()));
        }
        if records.contains_key(new_id) {
            return Err(KeyStoreError::AlreadyExists(new_id.to_owned()));
        }
        if let Some(record) = records.remove(old_id) {
            records.insert(new_id.to_owned(), record);
        }
        debug!(old_id, new_id, "credentials renamed");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), KeyStoreError> {
        self.write()?
            .remove(id)
            .ok_or_else(|| KeyStoreError::NotFound(id.to_owned()))?;
        debug!(id, "credentials deleted");
        Ok(())
    }

    fn ids(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut ids: Vec<String> = self.read()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Transport for deployments without a configured endpoint.
pub struct UnreachableTransport;

impl Transport for UnreachableTransport {
    fn send(&self, _envelope: &[u8]) -> Result<Vec<u8>, TransportError> {
        warn!("Transport::send called on the unreachable transport");
        Err(TransportError::Connection("no endpoint configured".into()))
    }

    fn ping(&self) -> Result<(), TransportError> {
        Err(TransportError::Connection("no endpoint configured".into()))
    }
}

/// Plays the authority: checks the request signature and answers with a
/// signed confirmation.
///
/// Requests with a bad digest or signature are rejected with error code 4,
/// malformed ones with code 3, and verification-only ones are acknowledged
/// with code 0, as the playground does.
pub struct SimulatedAuthority {
    credentials: TaxpayerCredentials,
}

impl SimulatedAuthority {
    pub fn new(credentials: TaxpayerCredentials) -> Self {
        Self { credentials }
    }

    /// The certificate responses are signed with.
    pub fn certificate(&self) -> &Certificate {
        &self.credentials.certificate
    }

    fn confirm(&self, request: &[u8]) -> ConfirmationRecord {
        let envelope = match Element::parse(request) {
            Ok(envelope) => envelope,
            Err(_) => return rejection(3, "Chybny format zpravy"),
        };
        let (uuid, bkp, verification_only) = match sale_identity(&envelope) {
            Ok(identity) => identity,
            Err(_) => return rejection(3, "Chybny format zpravy"),
        };
        if let Err(err) = verify_signed_envelope(&envelope) {
            debug!(%err, "request signature rejected");
            return rejection(4, "Neplatny podpis SOAP zpravy");
        }

        let mut confirmation = ConfirmationRecord {
            header: ConfirmationHeader {
                message_uuid: Some(uuid),
                hash_code: Some(bkp),
                fiscal_code: None,
                received_at: Some(EetDateTime::now()),
                rejected_at: None,
            },
            test: true,
            error: None,
            warnings: Vec::new(),
        };
        if verification_only {
            confirmation.error = Some(ErrorIndicator {
                code: 0,
                description: "Datovou zpravu evidovanou v overovacim modu".into(),
            });
        } else {
            confirmation.header.fiscal_code = Some(format!("{}-ff", uuid::Uuid::new_v4()));
        }
        confirmation
    }
}

fn sale_identity(envelope: &Element) -> GatewayResult<(String, String, bool)> {
    let hlavicka = find_element(envelope, "./Body/Trzba/Hlavicka")?;
    let bkp = find_element(envelope, "./Body/Trzba/KontrolniKody/bkp")?.text();
    let uuid = hlavicka.attr("uuid_zpravy").unwrap_or_default().to_owned();
    let verification_only = matches!(hlavicka.attr("overeni"), Some("true" | "1"));
    Ok((uuid, bkp, verification_only))
}

fn rejection(code: i32, description: &str) -> ConfirmationRecord {
    ConfirmationRecord {
        header: ConfirmationHeader {
            rejected_at: Some(EetDateTime::now()),
            ..ConfirmationHeader::default()
        },
        test: true,
        error: Some(ErrorIndicator {
            code,
            description: description.to_owned(),
        }),
        warnings: Vec::new(),
    }
}

impl Transport for SimulatedAuthority {
    fn send(&self, envelope: &[u8]) -> Result<Vec<u8>, TransportError> {
        let confirmation = self.confirm(envelope);
        build_response_envelope(
            &confirmation,
            &self.credentials.certificate,
            &self.credentials.signing_key,
        )
        .map_err(|e| TransportError::Connection(e.to_string()))
    }

    fn ping(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAXPAYER_KEY: &[u8] = include_bytes!("../../eetgateway-security/testdata/taxpayer.key");
    const TAXPAYER_CERT: &[u8] = include_bytes!("../../eetgateway-security/testdata/taxpayer.crt");
    const WEAK_KEY: &[u8] = include_bytes!("../../eetgateway-security/testdata/weak.key");

    #[test]
    fn key_store_distinguishes_missing_and_wrong_password() {
        let store = InMemoryKeyStore::new();
        store.insert("shop-1", b"hunter2", TAXPAYER_CERT, TAXPAYER_KEY).unwrap();

        let creds = store.get("shop-1", b"hunter2").unwrap();
        assert_eq!(creds.signing_key.modulus_bits(), 2048);

        assert!(matches!(store.get("shop-2", b"hunter2"), Err(KeyStoreError::NotFound(_))));
        assert!(matches!(
            store.get("shop-1", b"hunter3"),
            Err(KeyStoreError::InvalidPassword(_))
        ));
    }

    #[test]
    fn key_store_refuses_duplicates_and_unusable_keys() {
        let store = InMemoryKeyStore::new();
        store.insert("shop-1", b"pw", TAXPAYER_CERT, TAXPAYER_KEY).unwrap();
        assert!(matches!(
            store.insert("shop-1", b"pw", TAXPAYER_CERT, TAXPAYER_KEY),
            Err(KeyStoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.insert("shop-2", b"pw", TAXPAYER_CERT, WEAK_KEY),
            Err(KeyStoreError::Rejected(_))
        ));
    }

    #[test]
    fn password_update_reseals_the_record() {
        let store = InMemoryKeyStore::new();
        store.insert("shop-1", b"old", TAXPAYER_CERT, TAXPAYER_KEY).unwrap();

        assert!(matches!(
            store.update_password("shop-1", b"wrong", b"new"),
            Err(KeyStoreError::InvalidPassword(_))
        ));
        assert!(matches!(
            store.update_password("shop-2", b"old", b"new"),
            Err(KeyStoreError::NotFound(_))
        ));
        store.update_password("shop-1", b"old", b"new").unwrap();

        assert!(matches!(store.get("shop-1", b"old"), Err(KeyStoreError::InvalidPassword(_))));
        assert!(store.get("shop-1", b"new").is_ok());
    }

    #[test]
    fn rename_delete_and_list() {
        let store = InMemoryKeyStore::new();
        store.insert("b", b"pw", TAXPAYER_CERT, TAXPAYER_KEY).unwrap();
        store.insert("a", b"pw", TAXPAYER_CERT, TAXPAYER_KEY).unwrap();
        assert_eq!(store.ids().unwrap(), ["a", "b"]);

        assert!(matches!(store.rename("a", "b"), Err(KeyStoreError::AlreadyExists(_))));
        assert!(matches!(store.rename("x", "y"), Err(KeyStoreError::NotFound(_))));
        store.rename("a", "c").unwrap();
        assert_eq!(store.ids().unwrap(), ["b", "c"]);
        assert!(store.get("c", b"pw").is_ok());

        store.delete("b").unwrap();
        assert!(matches!(store.delete("b"), Err(KeyStoreError::NotFound(_))));
        assert_eq!(store.ids().unwrap(), ["c"]);
    }

    #[test]
    fn unreachable_transport_fails() {
        assert!(matches!(
            UnreachableTransport.send(b"<x/>"),
            Err(TransportError::Connection(_))
        ));
        assert!(UnreachableTransport.ping().is_err());
    }

    #[test]
    fn authority_rejects_garbage() {
        let authority =
            SimulatedAuthority::new(TaxpayerCredentials::from_pem(TAXPAYER_CERT, TAXPAYER_KEY).unwrap());
        let response = authority.send(b"not xml").unwrap();
        let confirmation = eetgateway_security::parse_response(&response).unwrap();
        assert_eq!(confirmation.error_code(), 3);
    }
}
