// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EET gateway command-line front end.
//
// Entry point. Loads the configuration, initialises logging and dispatches to
// the subcommands in `commands`.

mod commands;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eetgateway_core::config::GatewayConfig;
use eetgateway_service::ServiceError;

#[derive(Parser)]
#[command(
    name = "eetgateway",
    version,
    about = "Sign EET sale records and authenticate the tax authority's confirmations"
)]
struct Cli {
    /// Gateway configuration file (JSON)
    #[arg(long, global = true, env = "EETGATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the signature code (PKP) and hash code (BKP) of a sale
    Codes(commands::CodesArgs),
    /// Build a signed request envelope for a sale
    Envelope(commands::EnvelopeArgs),
    /// Authenticate a saved response envelope
    Verify(commands::VerifyArgs),
    /// Submit a sale to a simulated authority and verify its answer
    Submit(commands::SubmitArgs),
}

fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    match path {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => Ok(GatewayConfig::default()),
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.log_filter);
    tracing::debug!(timeout_ms = config.request_timeout_ms, "configuration loaded");

    let mut out = io::stdout().lock();
    match &cli.command {
        Command::Codes(args) => commands::codes(args, &mut out),
        Command::Envelope(args) => commands::envelope(args, &mut out),
        Command::Verify(args) => commands::verify(args, &config, &mut out),
        Command::Submit(args) => commands::submit(args, &config, &mut out),
    }
}

/// Print the client-facing message for envelope failures and the full chain
/// for everything else.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ServiceError>() {
        Some(service) => {
            tracing::debug!(error = ?service, "command failed");
            match service.client_error() {
                Some(client) => {
                    eprintln!("error: {}", client.message);
                    if client.escalate {
                        eprintln!("note: this failure should be reported to an operator");
                    }
                }
                None => eprintln!("error: {err:#}"),
            }
        }
        None => eprintln!("error: {err:#}"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from([
            "eetgateway",
            "verify",
            "--sale",
            "sale.json",
            "--key",
            "taxpayer.key",
            "--response",
            "response.xml",
            "--uuid",
            "e3ac1ba5-1a4e-4e8b-9c46-6a3a0e7c2c7d",
            "--config",
            "gateway.json",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("gateway.json")));
        match cli.command {
            Command::Verify(args) => {
                assert_eq!(
                    args.sale.uuid.map(|u| u.to_string()).as_deref(),
                    Some("e3ac1ba5-1a4e-4e8b-9c46-6a3a0e7c2c7d")
                );
                assert!(!args.sale.verification_only);
            }
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn malformed_uuid_is_refused_at_parse_time() {
        let parsed = Cli::try_parse_from([
            "eetgateway",
            "codes",
            "--sale",
            "sale.json",
            "--key",
            "taxpayer.key",
            "--uuid",
            "E3AC1BA5-1A4E-4E8B-9C46-6A3A0E7C2C7D",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "log_filter": "eetgateway_security=debug" }}"#).unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.log_filter, "eetgateway_security=debug");
    }

    #[test]
    fn missing_config_names_the_path() {
        let err = load_config(Some(Path::new("/nonexistent/gateway.json"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/gateway.json"));
    }
}
