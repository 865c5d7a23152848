//! # CLI Interface
//!
//! Defines the command-line argument structure for `bftx-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `schema`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BFTX operation gateway.
///
/// Serves the BFTX query/mutation surface over HTTP, backed by the bundled
/// ledger, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "bftx-node",
    about = "BFTX operation gateway",
    version,
    propagate_version = true
)]
pub struct BftxNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the gateway binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway.
    Run(RunArgs),
    /// Initialize a data directory and generate the signer and cipher keys.
    Init(InitArgs),
    /// Print the operation schema in SDL form and exit.
    Schema,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the GraphQL endpoints and the explorer page.
    #[arg(long, short = 'p', env = "BFTX_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "BFTX_METRICS_PORT", default_value_t = 9742)]
    pub metrics_port: u16,

    /// Data directory holding the ledger store and key files.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "BFTX_DATA_DIR", default_value = "./bftx-data")]
    pub data_dir: PathBuf,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "BFTX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "BFTX_DATA_DIR", default_value = "./bftx-data")]
    pub data_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        BftxNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = BftxNodeCli::try_parse_from(["bftx-node", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.port, 8080);
        assert_eq!(args.metrics_port, 9742);
        assert_eq!(args.log_format, "pretty");
    }

    #[test]
    fn run_flags_override_defaults() {
        let cli = BftxNodeCli::try_parse_from([
            "bftx-node",
            "run",
            "--port",
            "9000",
            "--log-format",
            "json",
            "-d",
            "/tmp/bftx",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.log_format, "json");
        assert_eq!(args.data_dir, PathBuf::from("/tmp/bftx"));
    }
}
