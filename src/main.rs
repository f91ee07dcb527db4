//! Watcher binary entry point.
//!
//! Loads the config, wires a real `EvmDataSource` into a `Watcher`, and
//! runs the polling loop until interrupted. CLI dispatch stays deliberately
//! thin: `--test`, `--json`, `--server`, `--port`, `--version` are parsed
//! but only the default "run the watcher" path is implemented here — the
//! TUI, HTTP/WebSocket server, and config self-test report live outside
//! this crate's scope.

use std::process::ExitCode;

use clap::Parser;
use evm_watcher_core::cli::Cli;
use evm_watcher_core::config::WatcherConfig;
use evm_watcher_core::evm::EvmDataSource;
use evm_watcher_core::scheduler::Watcher;
use tracing_subscriber::EnvFilter;

const DEFAULT_PRICE_ORACLE_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = match WatcherConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let price_oracle_base_url = DEFAULT_PRICE_ORACLE_BASE_URL
        .parse()
        .expect("valid literal url");
    let data_source = EvmDataSource::new(price_oracle_base_url);
    let watcher = Watcher::new(
        data_source,
        config.chains.clone(),
        config.addresses.clone(),
        config.token_decimals,
    );

    tracing::info!(
        chains = config.chains.len(),
        addresses = config.addresses.len(),
        "starting watcher"
    );

    tokio::select! {
        _ = watcher.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            watcher.request_stop();
        }
    }

    ExitCode::SUCCESS
}
