// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trust decisions for the certificate that signed a response.
//
// `CertificateAuthorities` is the production verifier: the signer must chain
// to one of the authority's CA roots and carry the authority's organisation
// name.  `PinnedCertificates` trusts individual leaf certificates and backs
// the simulated authority.  `AnyOf` lets a deployment combine the two.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use eetgateway_core::error::{SigningError, TrustError};
use rustls::pki_types::{CertificateDer, TrustAnchor, UnixTime};
use tracing::{debug, warn};

use crate::integrity::sha256;
use crate::keys::Certificate;

/// Decides whether a response-signing certificate is trusted.
pub trait TrustVerifier: Send + Sync {
    fn verify_certificate(&self, certificate: &Certificate) -> Result<(), TrustError>;
}

impl<V: TrustVerifier + ?Sized> TrustVerifier for Box<V> {
    fn verify_certificate(&self, certificate: &Certificate) -> Result<(), TrustError> {
        (**self).verify_certificate(certificate)
    }
}

/// Lowercase hex SHA-256 of the DER certificate.
pub fn fingerprint(certificate: &Certificate) -> String {
    hex::encode(sha256(certificate.as_der()))
}

/// Read every certificate in the given PEM files.
pub fn load_certificates<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Certificate>, SigningError> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let pem = std::fs::read(path).map_err(|e| {
                SigningError::InvalidCertificate(format!("{}: {e}", path.display()))
            })?;
            Certificate::from_pem(&pem)
        })
        .collect()
}

/// Trusts exactly the certificates it was given, unless revoked.
#[derive(Debug, Default, Clone)]
pub struct PinnedCertificates {
    pinned: BTreeMap<String, Certificate>,
    revoked: BTreeSet<String>,
}

impl PinnedCertificates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a certificate and return its fingerprint.
    pub fn pin(&mut self, certificate: Certificate) -> String {
        let id = fingerprint(&certificate);
        debug!(fingerprint = %id, "certificate pinned");
        self.pinned.insert(id.clone(), certificate);
        id
    }

    /// Pin every certificate in the given PEM files.
    pub fn from_pem_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SigningError> {
        let mut store = Self::new();
        for certificate in load_certificates(paths)? {
            store.pin(certificate);
        }
        Ok(store)
    }

    /// Stop trusting the certificate with `fingerprint`, pinned or not.
    pub fn revoke(&mut self, fingerprint: &str) {
        self.revoked.insert(fingerprint.to_ascii_lowercase());
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

impl TrustVerifier for PinnedCertificates {
    fn verify_certificate(&self, certificate: &Certificate) -> Result<(), TrustError> {
        let id = fingerprint(certificate);
        if self.revoked.contains(&id) {
            warn!(fingerprint = %id, "response signed by a revoked certificate");
            return Err(TrustError::new(format!("certificate {id} is revoked")));
        }
        if !self.pinned.contains_key(&id) {
            warn!(fingerprint = %id, "response signed by an unknown certificate");
            return Err(TrustError::new(format!("certificate {id} is not pinned")));
        }
        Ok(())
    }
}

/// Trusts signers issued under one of the configured roots whose subject
/// names the expected organisation.
///
/// Leaf certificates can be rotated without reconfiguring the gateway; only
/// a change of CA needs new roots.
#[derive(Debug, Clone)]
pub struct CertificateAuthorities {
    anchors: Vec<TrustAnchor<'static>>,
    intermediates: Vec<CertificateDer<'static>>,
    organization: String,
    time: Option<UnixTime>,
}

impl CertificateAuthorities {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            anchors: Vec::new(),
            intermediates: Vec::new(),
            organization: organization.into(),
            time: None,
        }
    }

    /// Load roots and intermediates from PEM files.
    pub fn from_pem_files<P: AsRef<Path>>(
        organization: impl Into<String>,
        roots: &[P],
        intermediates: &[P],
    ) -> Result<Self, SigningError> {
        let mut authorities = Self::new(organization);
        for root in load_certificates(roots)? {
            authorities.add_root(&root)?;
        }
        for intermediate in load_certificates(intermediates)? {
            authorities.add_intermediate(intermediate);
        }
        Ok(authorities)
    }

    /// Accept chains ending in `certificate`.
    pub fn add_root(&mut self, certificate: &Certificate) -> Result<(), SigningError> {
        let anchor = webpki::anchor_from_trusted_cert(certificate.der())
            .map_err(|e| SigningError::InvalidCertificate(format!("unusable CA root: {e:?}")))?;
        self.anchors.push(anchor.to_owned());
        debug!(fingerprint = %fingerprint(certificate), "CA root added");
        Ok(())
    }

    /// Offer `certificate` as an intermediate when building chains.
    pub fn add_intermediate(&mut self, certificate: Certificate) {
        self.intermediates.push(certificate.der().clone());
    }

    /// Validate at a fixed time instead of the system clock.
    pub fn at(mut self, time: UnixTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl TrustVerifier for CertificateAuthorities {
    fn verify_certificate(&self, certificate: &Certificate) -> Result<(), TrustError> {
        let id = fingerprint(certificate);
        let end_entity = webpki::EndEntityCert::try_from(certificate.der())
            .map_err(|e| TrustError::new(format!("certificate cannot be parsed: {e:?}")))?;

        end_entity
            .verify_for_usage(
                webpki::ALL_VERIFICATION_ALGS,
                &self.anchors,
                &self.intermediates,
                self.time.unwrap_or_else(UnixTime::now),
                AnyKeyPurpose,
                None,
                None,
            )
            .map_err(|e| {
                warn!(fingerprint = %id, error = ?e, "response signer does not chain to a CA root");
                TrustError::new(format!("certificate {id} is not issued by a trusted CA: {e:?}"))
            })?;

        let organizations = organization_names(end_entity.subject())?;
        if !organizations.iter().any(|o| *o == self.organization) {
            warn!(fingerprint = %id, ?organizations, "response signer belongs to another organisation");
            return Err(TrustError::new(format!(
                "certificate {id} is not issued to {:?}",
                self.organization
            )));
        }
        Ok(())
    }
}

/// Response signing is not a TLS purpose, so any well-formed extended key
/// usage is accepted.
struct AnyKeyPurpose;

impl webpki::ExtendedKeyUsageValidator for AnyKeyPurpose {
    fn validate(&self, iter: webpki::KeyPurposeIdIter<'_, '_>) -> Result<(), webpki::Error> {
        for purpose in iter {
            purpose?;
        }
        Ok(())
    }
}

/// Accepts a certificate that any one of its verifiers accepts.
#[derive(Default)]
pub struct AnyOf {
    verifiers: Vec<Box<dyn TrustVerifier>>,
}

impl AnyOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, verifier: impl TrustVerifier + 'static) {
        self.verifiers.push(Box::new(verifier));
    }

    pub fn with(mut self, verifier: impl TrustVerifier + 'static) -> Self {
        self.push(verifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

impl TrustVerifier for AnyOf {
    fn verify_certificate(&self, certificate: &Certificate) -> Result<(), TrustError> {
        let mut reasons = Vec::new();
        for verifier in &self.verifiers {
            match verifier.verify_certificate(certificate) {
                Ok(()) => return Ok(()),
                Err(err) => reasons.push(err.reason),
            }
        }
        if reasons.is_empty() {
            return Err(TrustError::new("no trusted certificates configured"));
        }
        Err(TrustError::new(reasons.join("; ")))
    }
}

const ORGANIZATION_NAME_OID: &[u8] = &[0x55, 0x04, 0x0a];

/// `organizationName` values of a DER `Name`, given without its outer
/// SEQUENCE header.
fn organization_names(name: &[u8]) -> Result<Vec<String>, TrustError> {
    let mut names = Vec::new();
    let mut rdns = name;
    while !rdns.is_empty() {
        let (set, rest) = expect_tlv(rdns, 0x31)?;
        rdns = rest;
        let mut attributes = set;
        while !attributes.is_empty() {
            let (attribute, rest) = expect_tlv(attributes, 0x30)?;
            attributes = rest;
            let (oid, value) = expect_tlv(attribute, 0x06)?;
            if oid == ORGANIZATION_NAME_OID {
                let (tag, contents, _) = read_tlv(value)?;
                names.push(directory_string(tag, contents)?);
            }
        }
    }
    Ok(names)
}

fn bad_name(what: &str) -> TrustError {
    TrustError::new(format!("certificate subject is not valid DER: {what}"))
}

fn expect_tlv(input: &[u8], tag: u8) -> Result<(&[u8], &[u8]), TrustError> {
    match read_tlv(input)? {
        (found, contents, rest) if found == tag => Ok((contents, rest)),
        _ => Err(bad_name("unexpected tag")),
    }
}

/// Split one definite-length TLV off `input`: (tag, contents, rest).
fn read_tlv(input: &[u8]) -> Result<(u8, &[u8], &[u8]), TrustError> {
    let (&tag, input) = input.split_first().ok_or_else(|| bad_name("truncated"))?;
    let (&first, mut input) = input.split_first().ok_or_else(|| bad_name("truncated"))?;
    let len = match first {
        0..=0x7f => usize::from(first),
        0x81..=0x84 => {
            let count = usize::from(first & 0x7f);
            if input.len() < count {
                return Err(bad_name("truncated length"));
            }
            let (bytes, rest) = input.split_at(count);
            input = rest;
            bytes.iter().fold(0usize, |len, &b| (len << 8) | usize::from(b))
        }
        _ => return Err(bad_name("unsupported length")),
    };
    if input.len() < len {
        return Err(bad_name("truncated value"));
    }
    let (contents, rest) = input.split_at(len);
    Ok((tag, contents, rest))
}

fn directory_string(tag: u8, contents: &[u8]) -> Result<String, TrustError> {
    match tag {
        // UTF8String, PrintableString, IA5String
        0x0c | 0x13 | 0x16 => String::from_utf8(contents.to_vec()).map_err(|_| bad_name("bad UTF-8")),
        // BMPString
        0x1e => {
            if contents.len() % 2 != 0 {
                return Err(bad_name("odd BMPString length"));
            }
            let units: Vec<u16> = contents
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| bad_name("bad BMPString"))
        }
        _ => Err(bad_name("unsupported string type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::TAXPAYER_CERT;
    use eetgateway_core::config::AUTHORITY_ORGANIZATION as ORGANIZATION;
    use std::time::Duration;

    const AUTHORITY_CERT: &[u8] = include_bytes!("../testdata/authority.crt");
    const AUTHORITY_ISSUED_CERT: &[u8] = include_bytes!("../testdata/authority-issued.crt");
    const OTHER_ORG_CERT: &[u8] = include_bytes!("../testdata/authority-other-org.crt");
    const CA_CERT: &[u8] = include_bytes!("../testdata/authority-ca.crt");

    fn authorities() -> CertificateAuthorities {
        let mut ca = CertificateAuthorities::new(ORGANIZATION);
        ca.add_root(&Certificate::from_pem(CA_CERT).unwrap()).unwrap();
        ca
    }

    #[test]
    fn trusts_only_pinned_certificates() {
        let authority = Certificate::from_pem(AUTHORITY_CERT).unwrap();
        let taxpayer = Certificate::from_pem(TAXPAYER_CERT).unwrap();

        let mut trust = PinnedCertificates::new();
        assert!(trust.is_empty());
        trust.pin(authority.clone());

        assert!(trust.verify_certificate(&authority).is_ok());
        let err = trust.verify_certificate(&taxpayer).unwrap_err();
        assert!(err.reason.contains("not pinned"));
    }

    #[test]
    fn revocation_wins_over_pinning() {
        let authority = Certificate::from_pem(AUTHORITY_CERT).unwrap();
        let mut trust = PinnedCertificates::new();
        let id = trust.pin(authority.clone());
        trust.revoke(&id.to_ascii_uppercase());

        let err = trust.verify_certificate(&authority).unwrap_err();
        assert!(err.reason.contains("revoked"));
    }

    #[test]
    fn loads_pem_files() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata");
        let trust =
            PinnedCertificates::from_pem_files(&[dir.join("authority.crt"), dir.join("taxpayer.crt")])
                .unwrap();
        assert_eq!(trust.len(), 2);
        assert!(PinnedCertificates::from_pem_files(&[dir.join("missing.crt")]).is_err());

        let ca = CertificateAuthorities::from_pem_files(
            ORGANIZATION,
            &[dir.join("authority-ca.crt")],
            &[],
        )
        .unwrap();
        assert_eq!(ca.len(), 1);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let id = fingerprint(&Certificate::from_pem(AUTHORITY_CERT).unwrap());
        assert_eq!(id.len(), 64);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn ca_issued_signer_of_the_authority_is_trusted() {
        let signer = Certificate::from_pem(AUTHORITY_ISSUED_CERT).unwrap();
        assert!(authorities().verify_certificate(&signer).is_ok());
    }

    #[test]
    fn self_signed_signer_does_not_chain() {
        let signer = Certificate::from_pem(AUTHORITY_CERT).unwrap();
        let err = authorities().verify_certificate(&signer).unwrap_err();
        assert!(err.reason.contains("not issued by a trusted CA"), "{}", err.reason);

        let issued = Certificate::from_pem(AUTHORITY_ISSUED_CERT).unwrap();
        assert!(CertificateAuthorities::new(ORGANIZATION).verify_certificate(&issued).is_err());
    }

    #[test]
    fn signer_of_another_organisation_is_refused() {
        let signer = Certificate::from_pem(OTHER_ORG_CERT).unwrap();
        let err = authorities().verify_certificate(&signer).unwrap_err();
        assert!(err.reason.contains("is not issued to"), "{}", err.reason);
    }

    #[test]
    fn expired_chain_is_refused() {
        // 2200-01-01, past the validity of the test certificates.
        let later = UnixTime::since_unix_epoch(Duration::from_secs(7_258_118_400));
        let signer = Certificate::from_pem(AUTHORITY_ISSUED_CERT).unwrap();
        assert!(authorities().at(later).verify_certificate(&signer).is_err());

        let valid = UnixTime::since_unix_epoch(Duration::from_secs(1_800_000_000));
        assert!(authorities().at(valid).verify_certificate(&signer).is_ok());
    }

    #[test]
    fn any_of_accepts_when_one_verifier_does() {
        let pinned_only = Certificate::from_pem(AUTHORITY_CERT).unwrap();
        let issued = Certificate::from_pem(AUTHORITY_ISSUED_CERT).unwrap();
        let mut pinned = PinnedCertificates::new();
        pinned.pin(pinned_only.clone());

        let trust = AnyOf::new().with(authorities()).with(pinned);
        assert!(trust.verify_certificate(&pinned_only).is_ok());
        assert!(trust.verify_certificate(&issued).is_ok());

        let taxpayer = Certificate::from_pem(TAXPAYER_CERT).unwrap();
        let err = trust.verify_certificate(&taxpayer).unwrap_err();
        assert!(err.reason.contains("not issued by a trusted CA"));
        assert!(err.reason.contains("not pinned"));

        assert!(AnyOf::new().verify_certificate(&issued).is_err());
    }

    #[test]
    fn organisation_names_are_read_from_the_subject() {
        // SEQUENCE contents: SET { SEQUENCE { O, UTF8String "ACME" } },
        //                    SET { SEQUENCE { CN, PrintableString "x" } }
        let name = [
            0x31, 0x0d, 0x30, 0x0b, 0x06, 0x03, 0x55, 0x04, 0x0a, 0x0c, 0x04, b'A', b'C', b'M',
            b'E', 0x31, 0x0a, 0x30, 0x08, 0x06, 0x03, 0x55, 0x04, 0x03, 0x13, 0x01, b'x',
        ];
        assert_eq!(organization_names(&name).unwrap(), vec!["ACME".to_owned()]);
        assert!(organization_names(&name[..6]).is_err());
    }
}
