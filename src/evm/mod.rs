//! The real [`DataSource`] implementation: EVM JSON-RPC (via `alloy`) for
//! chain data, gas price, and transactions; a plain HTTP client for the
//! fiat price oracle.

pub mod bulk_fetch;
pub mod price_oracle;
pub mod rpc;
pub mod scanner;

use std::time::{Duration, Instant};

use alloy_primitives::Address;
use async_trait::async_trait;
use url::Url;

use crate::config::ChainIdProbe;
use crate::datasource::{ChainFetchOutcome, DataSource};
use crate::error::{FetchError, TransportError};
use crate::health::{LatencyMeasurement, RpcHealthTable};
use crate::types::{ChainDescriptor, PriceId, TransactionRecord};
use price_oracle::PriceOracleClient;

/// Shared timeout for gas-price and transaction-scan operations.
const T_SHORT: Duration = Duration::from_secs(10);

/// Binds [`DataSource`] to a live EVM JSON-RPC fleet plus the HTTP price
/// oracle. Holds the one [`RpcHealthTable`] shared across every chain.
pub struct EvmDataSource {
    health: RpcHealthTable,
    price_oracle: PriceOracleClient,
}

impl EvmDataSource {
    pub fn new(price_oracle_base_url: url::Url) -> Self {
        Self {
            health: RpcHealthTable::new(),
            price_oracle: PriceOracleClient::new(price_oracle_base_url),
        }
    }

    /// Exposes the health table for the scheduler's "force refresh" command
    /// and for read-only introspection.
    pub fn health(&self) -> &RpcHealthTable {
        &self.health
    }
}

#[async_trait]
impl DataSource for EvmDataSource {
    async fn fetch_price(&self, price_id: &PriceId) -> Result<f64, FetchError> {
        self.price_oracle.fetch_price(price_id).await
    }

    async fn fetch_chain_data(
        &self,
        chain: &ChainDescriptor,
        addresses: &[Address],
    ) -> Result<ChainFetchOutcome, FetchError> {
        Ok(bulk_fetch::fetch_chain_data(&self.health, chain, addresses).await)
    }

    async fn fetch_gas_price(&self, chain: &ChainDescriptor) -> Result<u128, FetchError> {
        let prioritized = self.health.prioritize(&chain.rpc_urls);
        let mut last_err: Option<TransportError> = None;

        for url in &prioritized {
            let started = Instant::now();
            match rpc::gas_price(url, T_SHORT).await {
                Ok(price) => {
                    self.health
                        .record_latency(url, LatencyMeasurement::Measured(started.elapsed()));
                    return Ok(price);
                }
                Err(e) => {
                    self.health.record_latency(url, LatencyMeasurement::Error);
                    self.health.mark_cooldown(url);
                    last_err = Some(e);
                }
            }
        }

        Err(FetchError::Transport(last_err.unwrap_or_else(|| {
            TransportError::Dial {
                url: chain
                    .rpc_urls
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "https://unconfigured.invalid".parse().unwrap()),
                reason: "no rpc urls configured".into(),
            }
        })))
    }

    async fn fetch_transactions(
        &self,
        chain: &ChainDescriptor,
        address: Address,
        decimals: u32,
    ) -> Result<Vec<TransactionRecord>, FetchError> {
        scanner::fetch_transactions(&self.health, chain, address, decimals).await
    }

    async fn probe_latencies(&self, chain: &ChainDescriptor) {
        for url in &chain.rpc_urls {
            match rpc::probe_latency(url).await {
                Ok(latency) => self
                    .health
                    .record_latency(url, LatencyMeasurement::Measured(latency)),
                Err(_) => self.health.record_latency(url, LatencyMeasurement::Error),
            }
        }
    }
}

/// Backs the config self-test with a real `eth_chainId` dial.
#[async_trait]
impl ChainIdProbe for EvmDataSource {
    async fn chain_id(&self, url: &Url) -> Result<u64, TransportError> {
        rpc::chain_id(url, T_SHORT).await
    }
}
