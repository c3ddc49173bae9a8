// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for security codes, envelope signing, canonicalisation
// and response verification in the eetgateway-security crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use eetgateway_core::confirmation::{ConfirmationHeader, ConfirmationRecord};
use eetgateway_core::sale::{SaleData, SaleHeader, SaleRecord, VatBreakdown};
use eetgateway_core::types::{Amount, EetDateTime, Regime};
use eetgateway_security::c14n::canonicalize;
use eetgateway_security::{
    Element, PinnedCertificates, TaxpayerCredentials, build_request_envelope,
    build_response_envelope, parse_response, set_security_codes, verify_response,
};

const TAXPAYER_KEY: &[u8] = include_bytes!("../testdata/taxpayer.key");
const TAXPAYER_CERT: &[u8] = include_bytes!("../testdata/taxpayer.crt");
const AUTHORITY_KEY: &[u8] = include_bytes!("../testdata/authority.key");
const AUTHORITY_CERT: &[u8] = include_bytes!("../testdata/authority.crt");

fn record() -> SaleRecord {
    let data = SaleData {
        taxpayer_id: "CZ00000019".into(),
        delegating_taxpayer_id: None,
        premises_id: 141,
        register_id: "1patro-vpravo".into(),
        receipt_number: "141-18543-05".into(),
        sold_at: EetDateTime::parse("2019-08-11T15:36:14+02:00").expect("timestamp"),
        total: Amount::parse("236.00").expect("amount"),
        vat: VatBreakdown::default(),
        regime: Regime::Standard,
    };
    SaleRecord::new(SaleHeader::new(), data)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// One RSA-2048 signature plus the SHA-1 hash code.
fn bench_security_codes(c: &mut Criterion) {
    let creds = TaxpayerCredentials::from_pem(TAXPAYER_CERT, TAXPAYER_KEY).expect("credentials");
    let mut record = record();

    c.bench_function("set_security_codes (RSA-2048)", |b| {
        b.iter(|| {
            set_security_codes(black_box(&mut record), &creds.signing_key).expect("codes");
        });
    });
}

/// Template parse, body digest, SignedInfo signature and serialisation.
fn bench_request_envelope(c: &mut Criterion) {
    let creds = TaxpayerCredentials::from_pem(TAXPAYER_CERT, TAXPAYER_KEY).expect("credentials");
    let mut record = record();
    set_security_codes(&mut record, &creds.signing_key).expect("codes");

    c.bench_function("build_request_envelope", |b| {
        b.iter(|| {
            let bytes = build_request_envelope(
                black_box(&record),
                &creds.certificate,
                &creds.signing_key,
            )
            .expect("envelope");
            black_box(bytes);
        });
    });
}

/// Exclusive canonicalisation of a parsed request envelope.
fn bench_canonicalize(c: &mut Criterion) {
    let creds = TaxpayerCredentials::from_pem(TAXPAYER_CERT, TAXPAYER_KEY).expect("credentials");
    let mut record = record();
    set_security_codes(&mut record, &creds.signing_key).expect("codes");
    let bytes = build_request_envelope(&record, &creds.certificate, &creds.signing_key)
        .expect("envelope");
    let envelope = Element::parse(&bytes).expect("parse");

    c.bench_function("canonicalize (request envelope)", |b| {
        b.iter(|| black_box(canonicalize(black_box(&envelope))));
    });
}

/// Parse plus the full five-step verification of an accepted confirmation.
fn bench_verify_response(c: &mut Criterion) {
    let taxpayer = TaxpayerCredentials::from_pem(TAXPAYER_CERT, TAXPAYER_KEY).expect("taxpayer");
    let authority =
        TaxpayerCredentials::from_pem(AUTHORITY_CERT, AUTHORITY_KEY).expect("authority");
    let mut record = record();
    set_security_codes(&mut record, &taxpayer.signing_key).expect("codes");

    let confirmation = ConfirmationRecord {
        header: ConfirmationHeader {
            message_uuid: Some(record.header().message_uuid.to_string()),
            hash_code: record.security_codes().map(|c| c.hash_code.to_string()),
            fiscal_code: Some("b3a09b52-7c87-4014-a496-4c7a53cf9120-ff".into()),
            received_at: Some(EetDateTime::now()),
            rejected_at: None,
        },
        ..ConfirmationRecord::default()
    };
    let response =
        build_response_envelope(&confirmation, &authority.certificate, &authority.signing_key)
            .expect("response");
    let mut trust = PinnedCertificates::new();
    trust.pin(authority.certificate.clone());

    c.bench_function("parse_and_verify_response", |b| {
        b.iter(|| {
            let parsed = parse_response(black_box(&response)).expect("parse");
            verify_response(&record, &response, &parsed, &trust).expect("verify");
        });
    });
}

criterion_group!(
    benches,
    bench_security_codes,
    bench_request_envelope,
    bench_canonicalize,
    bench_verify_response,
);
criterion_main!(benches);
