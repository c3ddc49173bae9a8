// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Primitive value types shared by sale and confirmation records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SubsecRound};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchemaError;

/// Message identifier carried in `uuid_zpravy`.
///
/// Always the lowercase, hyphenated form of an RFC 4122 version 4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageUuid(String);

impl MessageUuid {
    /// A fresh random message identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::invalid_field("uuid_zpravy", reason);

        let uuid = Uuid::try_parse(s).map_err(|e| invalid(&e.to_string()))?;
        if s.len() != 36 || s.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("expected lowercase hyphenated form"));
        }
        if uuid.get_version_num() != 4 || uuid.get_variant() != uuid::Variant::RFC4122 {
            return Err(invalid("expected an RFC 4122 version 4 UUID"));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageUuid {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MessageUuid {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MessageUuid> for String {
    fn from(value: MessageUuid) -> Self {
        value.0
    }
}

/// Timestamp with an explicit UTC offset, at whole-second precision.
///
/// The offset given at construction is kept verbatim, so
/// `2019-08-11T15:37:52+02:00` formats back to exactly the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EetDateTime(DateTime<FixedOffset>);

impl EetDateTime {
    /// Wire format: ISO 8601 with a `±hh:mm` offset and no fractional seconds.
    pub const FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%:z";

    pub fn new(value: DateTime<FixedOffset>) -> Self {
        Self(value.trunc_subsecs(0))
    }

    /// The current local time.
    pub fn now() -> Self {
        Self::new(chrono::Local::now().fixed_offset())
    }

    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        DateTime::parse_from_str(s, Self::FORMAT)
            .map(Self::new)
            .map_err(|e| SchemaError::invalid_field("datetime", format!("{s:?}: {e}")))
    }

    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }
}

impl fmt::Display for EetDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for EetDateTime {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EetDateTime {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EetDateTime> for String {
    fn from(value: EetDateTime) -> Self {
        value.to_string()
    }
}

/// Non-negative monetary amount in hundredths of a crown.
///
/// Rendered with exactly two decimal digits (`236.00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(i64);

impl Amount {
    /// Largest value the schema allows (eight integer digits).
    pub const MAX_CENTS: i64 = 99_999_999_99;

    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Result<Self, SchemaError> {
        if cents < 0 {
            return Err(SchemaError::invalid_field("amount", "must not be negative"));
        }
        if cents > Self::MAX_CENTS {
            return Err(SchemaError::invalid_field("amount", "exceeds eight integer digits"));
        }
        Ok(Self(cents))
    }

    /// Parse the `N.NN` form: at least one integer digit, exactly two
    /// fractional digits.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::invalid_field("amount", format!("{s:?} is not of the form N.NN"));

        let (whole, fraction) = s.split_once('.').ok_or_else(invalid)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(whole) || fraction.len() != 2 || !digits(fraction) || whole.len() > 8 {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = fraction.parse().map_err(|_| invalid())?;
        Self::from_cents(whole * 100 + fraction)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Amount {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

/// Registration regime (`rezim`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Regime {
    /// Online registration.
    #[default]
    Standard,
    /// Simplified (offline) registration.
    Simplified,
}

impl Regime {
    pub fn code(&self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Simplified => 1,
        }
    }
}

impl TryFrom<u8> for Regime {
    type Error = SchemaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Standard),
            1 => Ok(Self::Simplified),
            other => Err(SchemaError::invalid_field("rezim", format!("unknown regime {other}"))),
        }
    }
}

impl From<Regime> for u8 {
    fn from(value: Regime) -> Self {
        value.code()
    }
}
