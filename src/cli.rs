//! Command-line flags, mirroring the teacher's own `CliArgs` in
//! `config.rs`: a `clap::Parser` struct whose only job is to describe the
//! surface a real entry point would parse.

use std::path::PathBuf;

use clap::Parser;

/// Flags accepted by the watcher binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "evm-watcher")]
#[command(about = "Multi-chain EVM balance and transaction watcher")]
pub struct Cli {
    /// Run the config self-test instead of starting the watcher.
    #[arg(long = "test", short = 't')]
    pub test: bool,

    /// Produce a machine-readable report (used with `--test`).
    #[arg(long = "json")]
    pub json: bool,

    /// Suppress any writes to the config file.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Override the config file location.
    #[arg(long = "config", env = "WATCHER_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Run headless, without the TUI.
    #[arg(long = "server")]
    pub server: bool,

    /// Port for the local HTTP/WebSocket surface (used with `--server`).
    #[arg(long = "port", default_value_t = 8080)]
    pub port: u16,

    /// Print the version and exit.
    #[arg(long = "version")]
    pub version: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_test_and_json_flags() {
        let cli = Cli::parse_from(["evm-watcher", "--test", "--json"]);
        assert!(cli.test);
        assert!(cli.json);
        assert!(!cli.dry_run);
    }

    #[test]
    fn short_test_flag_matches_long_form() {
        let cli = Cli::parse_from(["evm-watcher", "-t"]);
        assert!(cli.test);
    }

    #[test]
    fn defaults_match_spec() {
        let cli = Cli::parse_from(["evm-watcher"]);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.port, 8080);
        assert!(!cli.server);
        assert!(!cli.version);
    }
}
