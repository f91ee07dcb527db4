//! Per-chain bulk fetch: native + token balances for every configured
//! address against one chain's prioritized RPC fleet.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use url::Url;

use crate::datasource::ChainFetchOutcome;
use crate::events::ChainFetchResult;
use crate::evm::rpc;
use crate::health::{LatencyMeasurement, RpcHealthTable};
use crate::types::ChainDescriptor;

/// Per-operation timeout for bulk fetch.
const T_CHAIN: Duration = Duration::from_secs(30);
/// Blocks-per-day at ~12s/block, used to locate the "24h ago" block.
const BLOCKS_PER_DAY: u64 = 7200;
const WORKER_POOL_CAP: usize = 5;
const BALANCE_RETRIES: u32 = 3;

fn wei_to_decimal(value: U256) -> Decimal {
    Decimal::from_str(&value.to_string()).unwrap_or(Decimal::ZERO)
}

/// Run the bulk-fetch algorithm against `chain`'s prioritized URL list.
///
/// Never returns `Err`: every local failure is absorbed into `failed_urls`
/// and `still_pending`, which is what makes "terminal error iff pending is
/// still non-empty" a caller-observable flag rather than an exception.
pub async fn fetch_chain_data(
    health: &RpcHealthTable,
    chain: &ChainDescriptor,
    addresses: &[Address],
) -> ChainFetchOutcome {
    let mut pending: HashSet<Address> = addresses.iter().copied().collect();
    let mut successes: Vec<ChainFetchResult> = Vec::new();
    let mut failed_urls: Vec<Url> = Vec::new();

    let prioritized = health.prioritize(&chain.rpc_urls);
    for url in &prioritized {
        if pending.is_empty() {
            break;
        }

        let started = Instant::now();
        let head = match rpc::head_block(url, T_CHAIN).await {
            Ok(block) => {
                health.record_latency(url, LatencyMeasurement::Measured(started.elapsed()));
                block
            }
            Err(_) => {
                health.record_latency(url, LatencyMeasurement::Error);
                health.mark_cooldown(url);
                failed_urls.push(url.clone());
                continue;
            }
        };

        let head_number = head.header.number;
        let old_block = head_number.saturating_sub(BLOCKS_PER_DAY);
        let pool_size = WORKER_POOL_CAP.min(pending.len()).max(1);

        let batch: Vec<Address> = pending.iter().copied().collect();
        let mut url_failed = false;

        let results: Vec<(Address, Option<ChainFetchResult>)> = stream::iter(batch)
            .map(|address| fetch_one_address(url, chain, address, head_number, old_block, T_CHAIN))
            .buffer_unordered(pool_size)
            .collect()
            .await;

        for (address, outcome) in results {
            match outcome {
                Some(result) => {
                    pending.remove(&address);
                    successes.push(result);
                }
                None => url_failed = true,
            }
        }

        if url_failed {
            health.mark_cooldown(url);
            failed_urls.push(url.clone());
        }
    }

    ChainFetchOutcome {
        results: successes,
        failed_urls,
        still_pending: pending.into_iter().collect(),
    }
}

async fn fetch_one_address(
    url: &Url,
    chain: &ChainDescriptor,
    address: Address,
    head_number: u64,
    old_block: u64,
    timeout: Duration,
) -> (Address, Option<ChainFetchResult>) {
    let mut balance = None;
    for attempt in 1..=BALANCE_RETRIES {
        match rpc::native_balance(url, address, Some(head_number), timeout).await {
            Ok(b) => {
                balance = Some(b);
                break;
            }
            Err(_) if attempt < BALANCE_RETRIES => {
                tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
            }
            Err(_) => {}
        }
    }
    let Some(balance) = balance else {
        return (address, None);
    };

    // Best-effort, no retry: absence just means balances24h stays unset.
    let balance_24h = rpc::native_balance(url, address, Some(old_block), timeout)
        .await
        .ok()
        .map(wei_to_decimal);

    let mut token_balances = Vec::with_capacity(chain.tokens.len());
    for token in &chain.tokens {
        match rpc::erc20_balance_of(url, token.contract_address, address, timeout).await {
            Ok(raw) => token_balances.push((token.symbol.clone(), wei_to_decimal(raw))),
            Err(_) => return (address, None),
        }
    }

    (
        address,
        Some(ChainFetchResult {
            address,
            balance: wei_to_decimal(balance),
            balance_24h,
            token_balances,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wei_to_decimal_preserves_exact_value() {
        let value = U256::from(2_500_000_000_000_000_000u128);
        assert_eq!(wei_to_decimal(value), Decimal::from(2_500_000_000_000_000_000u128));
    }

    #[test]
    fn old_block_floors_at_zero() {
        let head: u64 = 100;
        assert_eq!(head.saturating_sub(BLOCKS_PER_DAY), 0);
    }
}
