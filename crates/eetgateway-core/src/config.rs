// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Organisation named in the subject of the authority's response-signing
/// certificates.
pub const AUTHORITY_ORGANIZATION: &str = "Česká republika - Generální finanční ředitelství";

/// Persistent gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Budget for one exchange with the authority; online registration must
    /// complete within two seconds.
    pub request_timeout_ms: u64,
    /// PEM files with individual certificates accepted as response signers.
    pub trusted_certificates: Vec<PathBuf>,
    /// PEM files with the CA roots response signers must chain to.
    pub ca_certificates: Vec<PathBuf>,
    /// PEM files with intermediate CA certificates offered during chain
    /// building.
    pub intermediate_certificates: Vec<PathBuf>,
    /// Organisation a CA-issued signer must name in its subject.
    pub authority_organization: String,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl GatewayConfig {
    /// Read a JSON config file.  Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 2_000,
            trusted_certificates: Vec::new(),
            ca_certificates: Vec::new(),
            intermediate_certificates: Vec::new(),
            authority_organization: AUTHORITY_ORGANIZATION.into(),
            log_filter: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.authority_organization, AUTHORITY_ORGANIZATION);
        assert!(config.ca_certificates.is_empty());
    }

    #[test]
    fn load_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "request_timeout_ms": 500, "ca_certificates": ["ca.pem"] }}"#
        )
        .unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.ca_certificates, vec![PathBuf::from("ca.pem")]);
        assert!(config.trusted_certificates.is_empty());
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(GatewayConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }
}
