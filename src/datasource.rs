//! The watcher's one external-dependency boundary.
//!
//! Everything the scheduler needs from the outside world — a fiat price, a
//! chain's balances, a gas price, or a list of recent transactions — goes
//! through this trait. The real implementation lives in [`crate::evm`]; a
//! scripted double lives here so the scheduler and snapshot merge logic are
//! unit-testable without a network.

use std::collections::HashMap;

use alloy_primitives::Address;
use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;
use crate::events::ChainFetchResult;
use crate::types::{ChainDescriptor, PriceId, TransactionRecord};

/// Result of a bulk fetch against one chain: the per-address results that
/// succeeded, the subset of configured URLs that were still failing when
/// the operation gave up, and any address left in `pending` once every
/// prioritized URL was exhausted.
#[derive(Debug, Clone, Default)]
pub struct ChainFetchOutcome {
    pub results: Vec<ChainFetchResult>,
    pub failed_urls: Vec<Url>,
    pub still_pending: Vec<Address>,
}

/// Injectable source of all external chain/price data.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch a single fiat price for `price_id`, published as `PriceUpdated`.
    async fn fetch_price(&self, price_id: &PriceId) -> Result<f64, FetchError>;

    /// Bulk-fetch native and token balances for every address against one
    /// chain's RPC fleet.
    async fn fetch_chain_data(
        &self,
        chain: &ChainDescriptor,
        addresses: &[Address],
    ) -> Result<ChainFetchOutcome, FetchError>;

    /// Fetch the current gas price for one chain.
    async fn fetch_gas_price(&self, chain: &ChainDescriptor) -> Result<u128, FetchError>;

    /// Scan the most recent blocks for transactions touching `address`.
    async fn fetch_transactions(
        &self,
        chain: &ChainDescriptor,
        address: Address,
        decimals: u32,
    ) -> Result<Vec<TransactionRecord>, FetchError>;

    /// Dial every RPC URL configured for `chain` with the cheapest possible
    /// call and record its latency. Never returns an error: a single URL
    /// failing to answer is expected operational noise recorded as a health
    /// entry, not something a caller needs to branch on.
    async fn probe_latencies(&self, chain: &ChainDescriptor);
}

/// A test double returning pre-scripted results, keyed by price id / chain
/// name. Unset keys produce [`FetchError::Protocol`] so a test must wire up
/// every call path it exercises.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDataSource {
    pub prices: HashMap<PriceId, Result<f64, String>>,
    pub chain_data: HashMap<String, Result<ChainFetchOutcome, String>>,
    pub gas_prices: HashMap<String, Result<u128, String>>,
    pub transactions: HashMap<String, Result<Vec<TransactionRecord>, String>>,
}

impl ScriptedDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, price_id: impl Into<PriceId>, usd: f64) -> Self {
        self.prices.insert(price_id.into(), Ok(usd));
        self
    }

    pub fn with_chain_data(mut self, chain: impl Into<String>, outcome: ChainFetchOutcome) -> Self {
        self.chain_data.insert(chain.into(), Ok(outcome));
        self
    }

    pub fn with_gas_price(mut self, chain: impl Into<String>, wei: u128) -> Self {
        self.gas_prices.insert(chain.into(), Ok(wei));
        self
    }

    pub fn with_transactions(
        mut self,
        chain: impl Into<String>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        self.transactions.insert(chain.into(), Ok(transactions));
        self
    }

    pub fn with_chain_error(mut self, chain: impl Into<String>, reason: impl Into<String>) -> Self {
        self.chain_data.insert(chain.into(), Err(reason.into()));
        self
    }
}

fn scripted<T: Clone>(
    table: &HashMap<String, Result<T, String>>,
    key: &str,
) -> Result<T, FetchError> {
    match table.get(key) {
        Some(Ok(v)) => Ok(v.clone()),
        Some(Err(reason)) => Err(FetchError::Protocol(
            crate::error::ProtocolError::UnexpectedResult {
                method: "scripted",
                detail: reason.clone(),
            },
        )),
        None => Err(FetchError::Protocol(
            crate::error::ProtocolError::UnexpectedResult {
                method: "scripted",
                detail: format!("no entry for {key}"),
            },
        )),
    }
}

#[async_trait]
impl DataSource for ScriptedDataSource {
    async fn fetch_price(&self, price_id: &PriceId) -> Result<f64, FetchError> {
        scripted(&self.prices, price_id)
    }

    async fn fetch_chain_data(
        &self,
        chain: &ChainDescriptor,
        _addresses: &[Address],
    ) -> Result<ChainFetchOutcome, FetchError> {
        scripted(&self.chain_data, &chain.name)
    }

    async fn fetch_gas_price(&self, chain: &ChainDescriptor) -> Result<u128, FetchError> {
        scripted(&self.gas_prices, &chain.name)
    }

    async fn fetch_transactions(
        &self,
        chain: &ChainDescriptor,
        _address: Address,
        _decimals: u32,
    ) -> Result<Vec<TransactionRecord>, FetchError> {
        scripted(&self.transactions, &chain.name)
    }

    async fn probe_latencies(&self, _chain: &ChainDescriptor) {
        // No health table behind a scripted double: nothing to record.
    }
}
