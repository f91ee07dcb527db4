//! Polling scheduler: drives the whole fan-out on a fixed 30-second
//! cadence, with one immediate fetch on start.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::datasource::DataSource;
use crate::events::{Event, EventBus};
use crate::snapshot::SnapshotStore;
use crate::types::{AddressDescriptor, ChainDescriptor};

/// Fixed polling cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Drives the scheduler loop, holding the handles it fans work out to on
/// every tick.
pub struct Watcher<D: DataSource> {
    data_source: Arc<D>,
    snapshot: Arc<SnapshotStore>,
    events: Arc<EventBus>,
    chains: Vec<ChainDescriptor>,
    addresses: Vec<AddressDescriptor>,
    token_decimals: u32,
    stop: Arc<Notify>,
}

impl<D: DataSource + 'static> Watcher<D> {
    pub fn new(
        data_source: D,
        chains: Vec<ChainDescriptor>,
        addresses: Vec<AddressDescriptor>,
        token_decimals: u32,
    ) -> Self {
        let snapshot = Arc::new(SnapshotStore::new(&addresses));
        Self {
            data_source: Arc::new(data_source),
            snapshot,
            events: Arc::new(EventBus::new()),
            chains,
            addresses,
            token_decimals,
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<SnapshotStore> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Signal the scheduler loop to stop after its current tick boundary.
    pub fn request_stop(&self) {
        self.stop.notify_one();
    }

    /// Run the scheduler loop: one immediate fetch, then every
    /// [`POLL_INTERVAL`] until [`Watcher::request_stop`] is called.
    pub async fn run(&self) {
        self.fetch_once().await;

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consumes the immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => self.fetch_once().await,
                _ = self.stop.notified() => {
                    debug!("watcher scheduler stopping");
                    break;
                }
            }
        }
    }

    /// One full fan-out: per-chain latency probe, per-chain bulk fetch,
    /// per-chain gas price, per-(chain, address) transaction scan, and one
    /// task per distinct price id. Exposed directly so tests can drive a
    /// single tick without waiting on the 30s cadence.
    pub async fn fetch_once(&self) {
        let addresses: Vec<Address> = self.addresses.iter().map(|a| a.address()).collect();

        let probes = self.chains.iter().map(|chain| self.data_source.probe_latencies(chain));
        join_all(probes).await;

        let chain_data = self.chains.iter().map(|chain| self.run_chain_data(chain, &addresses));
        let gas_prices = self.chains.iter().map(|chain| self.run_gas_price(chain));
        let transactions = self.chains.iter().flat_map(|chain| {
            self.addresses
                .iter()
                .map(move |addr| self.run_transactions(chain, addr))
        });
        let prices = self.distinct_price_ids().into_iter().map(|id| self.run_price(id));

        join_all(chain_data).await;
        join_all(gas_prices).await;
        join_all(transactions).await;
        join_all(prices).await;
    }

    fn distinct_price_ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for chain in &self.chains {
            ids.insert(chain.price_id.clone());
            for token in &chain.tokens {
                ids.insert(token.price_id.clone());
            }
        }
        ids
    }

    async fn run_chain_data(&self, chain: &ChainDescriptor, addresses: &[Address]) {
        match self.data_source.fetch_chain_data(chain, addresses).await {
            Ok(outcome) => {
                self.snapshot.merge_chain_data(&chain.name, &outcome.results).await;
                if !outcome.still_pending.is_empty() {
                    self.snapshot
                        .set_chain_error(
                            &chain.name,
                            &outcome.still_pending,
                            format!(
                                "no RPC endpoint for {} returned a result this tick",
                                chain.name
                            ),
                        )
                        .await;
                }
                self.events.publish(Event::ChainDataUpdated {
                    chain_name: chain.name.clone(),
                    results: outcome.results,
                    failed_urls: outcome.failed_urls,
                });
            }
            Err(e) => {
                warn!(chain = %chain.name, error = %e, "chain data fetch failed; skipping this tick");
            }
        }
    }

    async fn run_gas_price(&self, chain: &ChainDescriptor) {
        match self.data_source.fetch_gas_price(chain).await {
            Ok(wei) => {
                self.snapshot.set_gas_price(chain.name.clone(), wei).await;
                self.events.publish(Event::GasPriceUpdated {
                    chain_name: chain.name.clone(),
                    wei,
                });
            }
            Err(e) => {
                warn!(chain = %chain.name, error = %e, "gas price fetch failed; skipping this tick");
            }
        }
    }

    async fn run_transactions(&self, chain: &ChainDescriptor, address: &AddressDescriptor) {
        match self
            .data_source
            .fetch_transactions(chain, address.address(), self.token_decimals)
            .await
        {
            Ok(transactions) => {
                self.snapshot
                    .set_transactions(address.address(), transactions.clone())
                    .await;
                self.events.publish(Event::TransactionsUpdated {
                    address: address.address(),
                    transactions,
                });
            }
            Err(e) => {
                warn!(chain = %chain.name, address = %address, error = %e, "transaction scan failed; skipping this tick");
            }
        }
    }

    async fn run_price(&self, price_id: String) {
        match self.data_source.fetch_price(&price_id).await {
            Ok(usd) => {
                self.snapshot.set_price(price_id.clone(), usd).await;
                self.events.publish(Event::PriceUpdated { price_id, usd });
            }
            Err(e) => {
                warn!(price_id = %price_id, error = %e, "price fetch failed; skipping this tick");
            }
        }
    }
}
