// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confirmation record (`Odpoved`): the authority's answer to a submission.

use serde::{Deserialize, Serialize};

use crate::types::EetDateTime;

/// Response header (`Hlavicka`) plus the fiscal receipt identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationHeader {
    /// Echoed `uuid_zpravy`.
    pub message_uuid: Option<String>,
    /// Echoed `bkp`.
    pub hash_code: Option<String>,
    /// `fik` from `Potvrzeni`; absent on rejection.
    pub fiscal_code: Option<String>,
    /// `dat_prij`
    pub received_at: Option<EetDateTime>,
    /// `dat_odmit`
    pub rejected_at: Option<EetDateTime>,
}

/// Error indicator (`Chyba`).
///
/// Code 0 acknowledges a verification-only submission; anything else is a
/// rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorIndicator {
    pub code: i32,
    pub description: String,
}

/// Warning (`Varovani`) attached to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: i32,
    pub description: String,
}

/// Parsed confirmation.  Produced once per response and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub header: ConfirmationHeader,
    /// `test` attribute: the playground answered.
    pub test: bool,
    pub error: Option<ErrorIndicator>,
    pub warnings: Vec<Warning>,
}

impl ConfirmationRecord {
    /// Error code carried by the response, 0 when there is none.
    pub fn error_code(&self) -> i32 {
        self.error.as_ref().map_or(0, |e| e.code)
    }

    /// Whether the authority rejected the submission.
    pub fn is_error(&self) -> bool {
        self.error_code() != 0
    }

    pub fn fiscal_code(&self) -> Option<&str> {
        self.header.fiscal_code.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_acknowledgement_is_not_an_error() {
        let record = ConfirmationRecord {
            error: Some(ErrorIndicator {
                code: 0,
                description: "Datovou zpravu evidovanou v overovacim modu".into(),
            }),
            ..ConfirmationRecord::default()
        };
        assert!(!record.is_error());
        assert_eq!(record.error_code(), 0);
    }

    #[test]
    fn rejection_is_an_error() {
        let record = ConfirmationRecord {
            error: Some(ErrorIndicator {
                code: -1,
                description: "Docasna technicka chyba zpracovani".into(),
            }),
            ..ConfirmationRecord::default()
        };
        assert!(record.is_error());
        assert!(record.fiscal_code().is_none());
    }
}
