// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EET gateway: sale and confirmation records, error taxonomy, and
// configuration shared across all crates.

pub mod client_errors;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod sale;
pub mod types;

pub use client_errors::{ClientError, ErrorCategory, classify};
pub use config::{AUTHORITY_ORGANIZATION, GatewayConfig};
pub use confirmation::{ConfirmationHeader, ConfirmationRecord, ErrorIndicator, Warning};
pub use error::{
    ConfigError, GatewayError, Result, SchemaError, SigningError, TrustError, VerificationError,
};
pub use sale::{
    HashCode, SaleData, SaleHeader, SaleRecord, SecurityCodes, SignatureCode, VatBreakdown,
};
pub use types::{Amount, EetDateTime, MessageUuid, Regime};
