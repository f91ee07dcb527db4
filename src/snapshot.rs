//! Thread-safe in-memory snapshot store.
//!
//! All state lives behind a single `tokio::sync::RwLock`: given the fetch
//! cadence (30s) and the small size of the state, one lock over the whole
//! snapshot is sufficient and deliberately not sharded. No writer ever
//! awaits while holding the write guard, so a merge is always observed as
//! atomic by readers.

use std::collections::HashMap;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::events::ChainFetchResult;
use crate::types::{AddressDescriptor, ChainName, PriceId, TransactionRecord};

/// Bound on [`AccountSnapshot::transactions`].
pub const MAX_TRANSACTIONS: usize = 5;

/// The per-address projection of all observations at a given instant.
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub display_name: Option<String>,
    /// chainName → native balance, scaled by 10^18.
    pub balances: HashMap<ChainName, Decimal>,
    /// chainName → tokenSymbol → token balance, scaled by token decimals.
    pub token_balances: HashMap<ChainName, HashMap<String, Decimal>>,
    /// chainName → best-effort balance ~24h ago. Absent unless the optional
    /// historical read succeeded; never gated on by UI rendering.
    pub balances_24h: HashMap<ChainName, Decimal>,
    /// chainName → last failure reason; deleted on successful refresh.
    pub errors: HashMap<ChainName, String>,
    /// Most-recent-first, bounded at [`MAX_TRANSACTIONS`].
    pub transactions: Vec<TransactionRecord>,
}

struct Inner {
    accounts: HashMap<Address, AccountSnapshot>,
    prices: HashMap<PriceId, f64>,
    gas_prices: HashMap<ChainName, u128>,
}

/// Holds the mutable watcher state behind one lock.
pub struct SnapshotStore {
    inner: RwLock<Inner>,
}

impl SnapshotStore {
    /// Construct the store with one empty [`AccountSnapshot`] per configured
    /// address: snapshot fields are created empty at watcher construction.
    pub fn new(addresses: &[AddressDescriptor]) -> Self {
        let accounts = addresses
            .iter()
            .map(|a| {
                (
                    a.address(),
                    AccountSnapshot {
                        display_name: a.display_name.clone(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            inner: RwLock::new(Inner {
                accounts,
                prices: HashMap::new(),
                gas_prices: HashMap::new(),
            }),
        }
    }

    /// Returns every address's snapshot, keyed by its case-folded address.
    pub async fn get_accounts(&self) -> HashMap<Address, AccountSnapshot> {
        self.inner.read().await.accounts.clone()
    }

    /// Returns a copy of the global fiat price map.
    pub async fn get_prices(&self) -> HashMap<PriceId, f64> {
        self.inner.read().await.prices.clone()
    }

    /// Returns a copy of the global gas price map.
    pub async fn get_gas_prices(&self) -> HashMap<ChainName, u128> {
        self.inner.read().await.gas_prices.clone()
    }

    /// Merge one chain's bulk-fetch results into the snapshot. Holds the
    /// write lock for the whole merge: no partial-chain state is ever
    /// observable to a concurrent reader.
    pub async fn merge_chain_data(&self, chain: &ChainName, results: &[ChainFetchResult]) {
        let mut inner = self.inner.write().await;
        for result in results {
            let Some(account) = inner.accounts.get_mut(&result.address) else {
                continue;
            };
            account.balances.insert(chain.clone(), result.balance);
            match result.balance_24h {
                Some(b) => {
                    account.balances_24h.insert(chain.clone(), b);
                }
                None => {
                    account.balances_24h.remove(chain);
                }
            }
            let tokens: HashMap<String, Decimal> = result.token_balances.iter().cloned().collect();
            account.token_balances.insert(chain.clone(), tokens);
            account.errors.remove(chain);
        }
    }

    /// Record a chain-wide failure for the given addresses, but only where
    /// that address has never had a successful balance for this chain — a
    /// stale successful read is preferred over flashing a transient error.
    pub async fn set_chain_error(&self, chain: &ChainName, addresses: &[Address], reason: String) {
        let mut inner = self.inner.write().await;
        for address in addresses {
            if let Some(account) = inner.accounts.get_mut(address)
                && !account.balances.contains_key(chain)
            {
                account.errors.insert(chain.clone(), reason.clone());
            }
        }
    }

    /// Replace an address's recent-transactions list, truncated to
    /// [`MAX_TRANSACTIONS`] even if the caller over-supplies.
    pub async fn set_transactions(&self, address: Address, mut list: Vec<TransactionRecord>) {
        list.truncate(MAX_TRANSACTIONS);
        let mut inner = self.inner.write().await;
        if let Some(account) = inner.accounts.get_mut(&address) {
            account.transactions = list;
        }
    }

    pub async fn set_gas_price(&self, chain: ChainName, wei: u128) {
        self.inner.write().await.gas_prices.insert(chain, wei);
    }

    pub async fn set_price(&self, price_id: PriceId, usd: f64) {
        self.inner.write().await.prices.insert(price_id, usd);
    }
}
