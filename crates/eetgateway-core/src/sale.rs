// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sale record (`Trzba`): one taxable transaction and its security codes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::types::{Amount, EetDateTime, MessageUuid, Regime};

/// Message header (`Hlavicka`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleHeader {
    pub message_uuid: MessageUuid,
    pub sent_at: EetDateTime,
    /// `prvni_zaslani`: false when the same sale is being resubmitted.
    pub first_submission: bool,
    /// `overeni`: connectivity check only, the sale is not registered.
    pub verification_only: bool,
}

impl SaleHeader {
    /// Header for a first submission sent now, under a fresh message UUID.
    pub fn new() -> Self {
        Self {
            message_uuid: MessageUuid::generate(),
            sent_at: EetDateTime::now(),
            first_submission: true,
            verification_only: false,
        }
    }
}

impl Default for SaleHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Optional per-regime VAT bases and amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VatBreakdown {
    /// `zakl_nepodl_dph`: amount not subject to VAT.
    pub exempt: Option<Amount>,
    /// `zakl_dan1` / `dan1`: standard rate.
    pub standard_base: Option<Amount>,
    pub standard_tax: Option<Amount>,
    /// `zakl_dan2` / `dan2`: first reduced rate.
    pub reduced1_base: Option<Amount>,
    pub reduced1_tax: Option<Amount>,
    /// `zakl_dan3` / `dan3`: second reduced rate.
    pub reduced2_base: Option<Amount>,
    pub reduced2_tax: Option<Amount>,
    /// `cest_sluz`: travel services.
    pub travel_service: Option<Amount>,
    /// `pouzit_zboz1..3`: used goods at the standard and reduced rates.
    pub used_goods_standard: Option<Amount>,
    pub used_goods_reduced1: Option<Amount>,
    pub used_goods_reduced2: Option<Amount>,
    /// `urceno_cerp_zuct`: amount intended for later drawing or settlement.
    pub voucher_issued: Option<Amount>,
    /// `cerp_zuct`: amount drawn or settled.
    pub voucher_redeemed: Option<Amount>,
}

/// Sale data (`Data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleData {
    /// `dic_popl`
    pub taxpayer_id: String,
    /// `dic_poverujiciho`
    #[serde(default)]
    pub delegating_taxpayer_id: Option<String>,
    /// `id_provoz`
    pub premises_id: u32,
    /// `id_pokl`
    pub register_id: String,
    /// `porad_cis`
    pub receipt_number: String,
    /// `dat_trzby`
    pub sold_at: EetDateTime,
    /// `celk_trzba`
    pub total: Amount,
    #[serde(default)]
    pub vat: VatBreakdown,
    /// `rezim`
    #[serde(default)]
    pub regime: Regime,
}

/// Signature code (`pkp`): RSA-SHA256 signature over the sale's key fields.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureCode {
    bytes: Vec<u8>,
}

impl SignatureCode {
    pub const DIGEST: &'static str = "SHA256";
    pub const CIPHER: &'static str = "RSA2048";
    pub const ENCODING: &'static str = "base64";

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

impl std::fmt::Debug for SignatureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SignatureCode").field(&self.to_base64()).finish()
    }
}

/// Hash code (`bkp`): formatted SHA-1 of the signature code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCode {
    value: String,
}

impl HashCode {
    pub const DIGEST: &'static str = "SHA1";
    pub const ENCODING: &'static str = "base16";

    /// Wrap an already formatted `XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX` value.
    pub fn new(value: String) -> Self {
        Self { value }
    }

    /// SHA-1 of the signature code bytes as five groups of eight uppercase
    /// hex digits.
    pub fn from_signature(signature: &[u8]) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, signature);
        let hex = hex::encode_upper(digest.as_ref());
        let groups: Vec<&str> = (0..5).map(|i| &hex[i * 8..(i + 1) * 8]).collect();
        Self::new(groups.join("-"))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for HashCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// Security codes block (`KontrolniKody`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityCodes {
    pub signature_code: SignatureCode,
    pub hash_code: HashCode,
}

impl SecurityCodes {
    /// Pair a signature code with the hash code derived from it.
    pub fn from_signature_code(signature_code: SignatureCode) -> Self {
        let hash_code = HashCode::from_signature(signature_code.as_bytes());
        Self {
            signature_code,
            hash_code,
        }
    }
}

/// One sale record (`Trzba`).
///
/// Header and data are fixed at construction.  The security codes start out
/// empty and are attached by the code calculator just before signing; they
/// are derived from the data block alone, which cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    header: SaleHeader,
    data: SaleData,
    codes: Option<SecurityCodes>,
}

impl SaleRecord {
    pub fn new(header: SaleHeader, data: SaleData) -> Self {
        Self {
            header,
            data,
            codes: None,
        }
    }

    pub fn header(&self) -> &SaleHeader {
        &self.header
    }

    pub fn data(&self) -> &SaleData {
        &self.data
    }

    pub fn security_codes(&self) -> Option<&SecurityCodes> {
        self.codes.as_ref()
    }

    /// Store codes computed from this record's data.  Only the code
    /// calculator should call this.
    ///
    /// Codes whose hash code is not derived from their signature code are
    /// refused and leave the record unchanged.
    pub fn attach_security_codes(&mut self, codes: SecurityCodes) -> Result<(), SchemaError> {
        if codes.hash_code != HashCode::from_signature(codes.signature_code.as_bytes()) {
            return Err(SchemaError::invalid_field(
                "bkp",
                "not the SHA-1 of the signature code",
            ));
        }
        self.codes = Some(codes);
        Ok(())
    }

    /// A fresh record for resubmitting the same sale: new message UUID,
    /// new send time, `first_submission` cleared and no codes.
    ///
    /// Resending an unchanged record would reuse its UUID and risk a
    /// duplicate registration.
    pub fn for_resubmission(&self) -> Self {
        Self {
            header: SaleHeader {
                message_uuid: MessageUuid::generate(),
                sent_at: EetDateTime::now(),
                first_submission: false,
                verification_only: self.header.verification_only,
            },
            data: self.data.clone(),
            codes: None,
        }
    }

    /// Check the lexical formats the schema imposes on identifiers.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let data = &self.data;
        validate_tax_id("dic_popl", &data.taxpayer_id)?;
        if let Some(delegating) = &data.delegating_taxpayer_id {
            validate_tax_id("dic_poverujiciho", delegating)?;
        }
        if !(1..=999_999).contains(&data.premises_id) {
            return Err(SchemaError::invalid_field("id_provoz", "must be between 1 and 999999"));
        }
        validate_identifier("id_pokl", &data.register_id, 20)?;
        validate_identifier("porad_cis", &data.receipt_number, 25)
    }
}

fn validate_tax_id(field: &str, value: &str) -> Result<(), SchemaError> {
    let digits = value.strip_prefix("CZ").unwrap_or("");
    if (8..=10).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(SchemaError::invalid_field(field, format!("{value:?} is not CZ followed by 8-10 digits")))
    }
}

fn validate_identifier(field: &str, value: &str, max_len: usize) -> Result<(), SchemaError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || ".,:;/#-_ ".contains(c);
    if value.is_empty() || value.chars().count() > max_len {
        return Err(SchemaError::invalid_field(field, format!("length must be 1-{max_len}")));
    }
    if let Some(bad) = value.chars().find(|c| !allowed(*c)) {
        return Err(SchemaError::invalid_field(field, format!("character {bad:?} not allowed")));
    }
    Ok(())
}
