// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations.
//
// Sale input is a JSON document with the fields of `SaleData`.  The message
// header is generated here: a fresh UUID unless `--uuid` pins one, which is
// how `verify` reconstructs the record a response answers.  Security codes
// are deterministic, so rebuilding them from the same data and key gives the
// codes that were submitted.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use eetgateway_core::config::GatewayConfig;
use eetgateway_core::confirmation::ConfirmationRecord;
use eetgateway_core::error::GatewayError;
use eetgateway_core::sale::{SaleData, SaleHeader, SaleRecord};
use eetgateway_core::types::MessageUuid;
use eetgateway_security::{
    AnyOf, CertificateAuthorities, PinnedCertificates, SigningKey, TaxpayerCredentials,
    build_request_envelope, parse_response, set_security_codes, verify_response,
};
use eetgateway_service::{
    Deadline, GatewayService, InMemoryKeyStore, ServiceError, SimulatedAuthority,
};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct SaleArgs {
    /// Sale data file (JSON)
    #[arg(long, short)]
    pub sale: PathBuf,

    /// Message UUID to use instead of a fresh one
    #[arg(long)]
    pub uuid: Option<MessageUuid>,

    /// Mark the submission as a verification-only check
    #[arg(long)]
    pub verification_only: bool,

    /// Mark the submission as a resend of an earlier attempt
    #[arg(long)]
    pub resubmission: bool,
}

impl SaleArgs {
    fn record(&self) -> Result<SaleRecord> {
        let raw = fs::read(&self.sale)
            .with_context(|| format!("failed to read sale file: {}", self.sale.display()))?;
        let data: SaleData = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse sale JSON: {}", self.sale.display()))?;

        let mut header = SaleHeader::new();
        if let Some(uuid) = &self.uuid {
            header.message_uuid = uuid.clone();
        }
        header.verification_only = self.verification_only;
        header.first_submission = !self.resubmission;
        Ok(SaleRecord::new(header, data))
    }
}

#[derive(Args, Debug)]
pub struct CodesArgs {
    #[command(flatten)]
    pub sale: SaleArgs,

    /// Taxpayer private key (PEM)
    #[arg(long, short)]
    pub key: PathBuf,
}

#[derive(Args, Debug)]
pub struct EnvelopeArgs {
    #[command(flatten)]
    pub sale: SaleArgs,

    /// Taxpayer certificate (PEM)
    #[arg(long, short)]
    pub cert: PathBuf,

    /// Taxpayer private key (PEM)
    #[arg(long, short)]
    pub key: PathBuf,

    /// Output file (stdout when absent)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub sale: SaleArgs,

    /// Taxpayer private key the sale was signed with (PEM)
    #[arg(long, short)]
    pub key: PathBuf,

    /// Response envelope returned by the authority
    #[arg(long, short)]
    pub response: PathBuf,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub sale: SaleArgs,

    /// Taxpayer certificate (PEM)
    #[arg(long, short)]
    pub cert: PathBuf,

    /// Taxpayer private key (PEM)
    #[arg(long, short)]
    pub key: PathBuf,

    /// Certificate the simulated authority signs with (PEM)
    #[arg(long)]
    pub authority_cert: PathBuf,

    /// Private key of the simulated authority (PEM)
    #[arg(long)]
    pub authority_key: PathBuf,

    /// Trust the simulated authority in addition to the configured certificates
    #[arg(long)]
    pub pin_authority: bool,
}

fn read(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {what}: {}", path.display()))
}

fn signing_key(path: &Path) -> Result<SigningKey> {
    let pem = read(path, "private key")?;
    let key = SigningKey::from_pem(&pem).map_err(|e| ServiceError::RequestBuild(e.into()))?;
    Ok(key)
}

fn credentials(cert: &Path, key: &Path) -> Result<TaxpayerCredentials> {
    let cert = read(cert, "certificate")?;
    let key = read(key, "private key")?;
    let creds = TaxpayerCredentials::from_pem(&cert, &key)
        .map_err(|e| ServiceError::RequestBuild(e.into()))?;
    Ok(creds)
}

/// Response signers accepted under `config`: CA-issued ones, pinned ones,
/// and `extra` when given.
fn response_trust(config: &GatewayConfig, extra: Option<PinnedCertificates>) -> Result<AnyOf> {
    let mut trust = AnyOf::new();

    let authorities = CertificateAuthorities::from_pem_files(
        config.authority_organization.clone(),
        &config.ca_certificates,
        &config.intermediate_certificates,
    )
    .map_err(GatewayError::from)
    .context("failed to load CA certificates")?;
    if !authorities.is_empty() {
        trust.push(authorities);
    }

    let pinned = PinnedCertificates::from_pem_files(&config.trusted_certificates)
        .map_err(GatewayError::from)
        .context("failed to load trusted certificates")?;
    if !pinned.is_empty() {
        trust.push(pinned);
    }
    if let Some(extra) = extra {
        trust.push(extra);
    }

    if trust.is_empty() {
        warn!("no trusted certificates configured; signed responses will be rejected");
    }
    Ok(trust)
}

/// Sign the sale and print its codes.
pub fn codes(args: &CodesArgs, out: &mut impl Write) -> Result<()> {
    let mut record = args.sale.record()?;
    let key = signing_key(&args.key)?;
    record
        .validate()
        .map_err(GatewayError::from)
        .and_then(|()| set_security_codes(&mut record, &key).map_err(GatewayError::from))
        .map_err(ServiceError::RequestBuild)?;

    if let Some(codes) = record.security_codes() {
        writeln!(out, "pkp: {}", codes.signature_code.to_base64())?;
        writeln!(out, "bkp: {}", codes.hash_code)?;
    }
    Ok(())
}

/// Build a signed request envelope.
pub fn envelope(args: &EnvelopeArgs, out: &mut impl Write) -> Result<()> {
    let mut record = args.sale.record()?;
    let creds = credentials(&args.cert, &args.key)?;
    let request = prepare(&mut record, &creds).map_err(ServiceError::RequestBuild)?;

    info!(uuid = %record.header().message_uuid, "request envelope built");
    match &args.out {
        Some(path) => fs::write(path, &request)
            .with_context(|| format!("failed to write envelope: {}", path.display()))?,
        None => out.write_all(&request)?,
    }
    Ok(())
}

fn prepare(record: &mut SaleRecord, creds: &TaxpayerCredentials) -> Result<Vec<u8>, GatewayError> {
    record.validate()?;
    set_security_codes(record, &creds.signing_key)?;
    build_request_envelope(record, &creds.certificate, &creds.signing_key)
}

/// Authenticate a response envelope against the sale it answers.
pub fn verify(args: &VerifyArgs, config: &GatewayConfig, out: &mut impl Write) -> Result<()> {
    let mut record = args.sale.record()?;
    let key = signing_key(&args.key)?;
    set_security_codes(&mut record, &key)
        .map_err(GatewayError::from)
        .map_err(ServiceError::RequestBuild)?;
    let trust = response_trust(config, None)?;

    let response = read(&args.response, "response envelope")?;
    let confirmation = parse_response(&response).map_err(ServiceError::ResponseParse)?;
    verify_response(&record, &response, &confirmation, &trust)
        .map_err(ServiceError::ResponseVerify)?;

    report_confirmation(&confirmation, out)
}

/// Run the whole pipeline against an in-process authority.
pub fn submit(args: &SubmitArgs, config: &GatewayConfig, out: &mut impl Write) -> Result<()> {
    const CERT_ID: &str = "cli";

    let mut record = args.sale.record()?;
    let authority = SimulatedAuthority::new(credentials(&args.authority_cert, &args.authority_key)?);
    let pinned = args.pin_authority.then(|| {
        let mut pinned = PinnedCertificates::new();
        pinned.pin(authority.certificate().clone());
        pinned
    });
    let trust = response_trust(config, pinned)?;

    let transport = Deadline::new(authority, config.request_timeout());
    let gateway = GatewayService::new(InMemoryKeyStore::new(), transport, trust);
    let cert = read(&args.cert, "certificate")?;
    let key = read(&args.key, "private key")?;
    gateway.store_certificate(CERT_ID, b"", &cert, &key)?;

    let confirmation = gateway.send_sale(CERT_ID, b"", &mut record)?;

    if let Some(codes) = record.security_codes() {
        writeln!(out, "bkp: {}", codes.hash_code)?;
    }
    report_confirmation(&confirmation, out)
}

fn report_confirmation(confirmation: &ConfirmationRecord, out: &mut impl Write) -> Result<()> {
    if let Some(fik) = confirmation.fiscal_code() {
        writeln!(out, "fik: {fik}")?;
    }
    if let Some(error) = &confirmation.error {
        writeln!(out, "error {}: {}", error.code, error.description)?;
    }
    for warning in &confirmation.warnings {
        writeln!(out, "warning {}: {}", warning.code, warning.description)?;
    }
    Ok(())
}
