// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Taxpayer key material and X.509 certificates.
//
// `ring` does the RSA signing; `rustls-webpki` parses certificates and checks
// signatures made by their public key.  Neither crate decodes PEM, so the
// `rustls::pki_types` PEM reader sits in front of both.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use eetgateway_core::error::{SigningError, VerificationError};
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;
use zeroize::Zeroizing;

/// Smallest RSA modulus the authority accepts.
pub const MIN_MODULUS_BITS: usize = 2048;

/// RSA private key used for the signature code and the envelope signature.
pub struct SigningKey {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl SigningKey {
    /// Load a DER private key (PKCS#8 or PKCS#1).
    ///
    /// Non-RSA keys and keys shorter than 2048 bits are refused.
    pub fn from_der(key: &PrivateKeyDer<'_>) -> Result<Self, SigningError> {
        let key_pair = match key {
            PrivateKeyDer::Pkcs8(der) => RsaKeyPair::from_pkcs8(der.secret_pkcs8_der()),
            PrivateKeyDer::Pkcs1(der) => RsaKeyPair::from_der(der.secret_pkcs1_der()),
            _ => {
                return Err(SigningError::UnusableKey(
                    "only RSA keys in PKCS#8 or PKCS#1 form are supported".into(),
                ));
            }
        }
        .map_err(|e| SigningError::UnusableKey(e.to_string()))?;

        let bits = key_pair.public().modulus_len() * 8;
        if bits < MIN_MODULUS_BITS {
            return Err(SigningError::UnusableKey(format!(
                "RSA modulus of {bits} bits is shorter than {MIN_MODULUS_BITS}"
            )));
        }
        debug!(bits, "RSA signing key loaded");

        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Load the first private key found in a PEM document.
    pub fn from_pem(pem: &[u8]) -> Result<Self, SigningError> {
        let key = PrivateKeyDer::from_pem_slice(pem)
            .map_err(|e| SigningError::UnusableKey(format!("no private key in PEM: {e:?}")))?;
        Self::from_der(&key)
    }

    pub fn modulus_bits(&self) -> usize {
        self.key_pair.public().modulus_len() * 8
    }

    /// RSASSA-PKCS1-v1_5 signature over SHA-256 of `message`.
    ///
    /// PKCS#1 v1.5 padding is deterministic, so the same key and message
    /// always produce the same signature.
    pub fn sign(&self, message: &[u8]) -> Result<Zeroizing<Vec<u8>>, SigningError> {
        let mut signature = Zeroizing::new(vec![0u8; self.key_pair.public().modulus_len()]);
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
            .map_err(|e| SigningError::Operation(e.to_string()))?;
        Ok(signature)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("modulus_bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}

/// A parsed X.509 certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: CertificateDer<'static>,
}

impl Certificate {
    /// Wrap DER bytes after checking that they parse as an end-entity
    /// certificate.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self, SigningError> {
        let der = CertificateDer::from(der.into());
        webpki::EndEntityCert::try_from(&der)
            .map_err(|e| SigningError::InvalidCertificate(format!("{e:?}")))?;
        Ok(Self { der })
    }

    /// Load the first certificate found in a PEM document.
    pub fn from_pem(pem: &[u8]) -> Result<Self, SigningError> {
        let der = CertificateDer::from_pem_slice(pem)
            .map_err(|e| SigningError::InvalidCertificate(format!("no certificate in PEM: {e:?}")))?;
        Self::from_der(der.as_ref())
    }

    /// Decode the base64 DER carried in a `BinarySecurityToken`.
    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let der = BASE64
            .decode(compact)
            .map_err(|e| SigningError::InvalidCertificate(format!("token is not base64: {e}")))?;
        Self::from_der(der)
    }

    pub fn as_der(&self) -> &[u8] {
        self.der.as_ref()
    }

    pub(crate) fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.as_der())
    }

    /// Check an RSA-SHA256 PKCS#1 v1.5 `signature` over `message` against
    /// this certificate's public key.
    pub fn verify_signature(&self, message: &[u8], signature: &[u8]) -> Result<(), VerificationError> {
        let cert = webpki::EndEntityCert::try_from(&self.der).map_err(|e| {
            VerificationError::SignatureInvalid {
                reason: format!("certificate cannot be parsed: {e:?}"),
            }
        })?;
        cert.verify_signature(webpki::ring::RSA_PKCS1_2048_8192_SHA256, message, signature)
            .map_err(|e| VerificationError::SignatureInvalid {
                reason: format!("{e:?}"),
            })
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// A taxpayer's certificate and the matching private key.
#[derive(Debug)]
pub struct TaxpayerCredentials {
    pub certificate: Certificate,
    pub signing_key: SigningKey,
}

impl TaxpayerCredentials {
    /// Load a certificate and key from two PEM documents.
    pub fn from_pem(certificate: &[u8], key: &[u8]) -> Result<Self, SigningError> {
        Ok(Self {
            certificate: Certificate::from_pem(certificate)?,
            signing_key: SigningKey::from_pem(key)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TAXPAYER_KEY: &[u8] = include_bytes!("../testdata/taxpayer.key");
    pub(crate) const TAXPAYER_CERT: &[u8] = include_bytes!("../testdata/taxpayer.crt");
    const TAXPAYER_PKCS1_KEY: &[u8] = include_bytes!("../testdata/taxpayer-pkcs1.key");
    const AUTHORITY_CERT: &[u8] = include_bytes!("../testdata/authority.crt");
    const WEAK_KEY: &[u8] = include_bytes!("../testdata/weak.key");
    const EC_KEY: &[u8] = include_bytes!("../testdata/ec.key");

    pub(crate) fn taxpayer() -> TaxpayerCredentials {
        TaxpayerCredentials::from_pem(TAXPAYER_CERT, TAXPAYER_KEY).unwrap()
    }

    #[test]
    fn loads_pkcs8_and_pkcs1_keys() {
        let pkcs8 = SigningKey::from_pem(TAXPAYER_KEY).unwrap();
        let pkcs1 = SigningKey::from_pem(TAXPAYER_PKCS1_KEY).unwrap();
        assert_eq!(pkcs8.modulus_bits(), 2048);
        assert_eq!(
            pkcs8.sign(b"message").unwrap().as_slice(),
            pkcs1.sign(b"message").unwrap().as_slice()
        );
    }

    #[test]
    fn rejects_short_and_non_rsa_keys() {
        assert!(matches!(SigningKey::from_pem(WEAK_KEY), Err(SigningError::UnusableKey(_))));
        assert!(matches!(SigningKey::from_pem(EC_KEY), Err(SigningError::UnusableKey(_))));
        assert!(SigningKey::from_pem(b"not a key").is_err());
    }

    #[test]
    fn signatures_verify_against_the_certificate() {
        let creds = taxpayer();
        let signature = creds.signing_key.sign(b"payload").unwrap();
        assert!(creds.certificate.verify_signature(b"payload", &signature).is_ok());
        assert!(matches!(
            creds.certificate.verify_signature(b"tampered", &signature),
            Err(VerificationError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn other_certificate_does_not_verify() {
        let creds = taxpayer();
        let authority = Certificate::from_pem(AUTHORITY_CERT).unwrap();
        let signature = creds.signing_key.sign(b"payload").unwrap();
        assert!(authority.verify_signature(b"payload", &signature).is_err());
    }

    #[test]
    fn base64_round_trip_through_token_form() {
        let cert = Certificate::from_pem(TAXPAYER_CERT).unwrap();
        let wrapped: String = cert
            .to_base64()
            .as_bytes()
            .chunks(64)
            .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
            .collect();
        assert_eq!(Certificate::from_base64(&wrapped).unwrap(), cert);
    }

    #[test]
    fn rejects_garbage_certificates() {
        assert!(matches!(
            Certificate::from_der(vec![0x30, 0x03, 0x02, 0x01, 0x00]),
            Err(SigningError::InvalidCertificate(_))
        ));
        assert!(Certificate::from_base64("!!!").is_err());
    }

    #[test]
    fn debug_does_not_print_key_material() {
        let key = SigningKey::from_pem(TAXPAYER_KEY).unwrap();
        assert_eq!(format!("{key:?}"), "SigningKey { modulus_bits: 2048, .. }");
    }
}
