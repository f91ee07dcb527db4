//! Raw per-URL EVM JSON-RPC primitives.
//!
//! Every call here dials a fresh [`RootProvider`] for the given URL — bulk
//! fetch and the scanner open one connection per URL per tick rather than
//! holding a long-lived pool: open a connection, make the call, close the
//! connection. Callers are responsible for applying a timeout; nothing in
//! this module blocks indefinitely on its own.

use std::time::Duration;

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types_eth::{Block, BlockId, BlockNumberOrTag, TransactionRequest};
use url::Url;

use crate::error::TransportError;

/// Selector for ERC-20 `balanceOf(address)`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Per-operation timeout for the dedicated latency probe: shorter than bulk
/// fetch's and the scanner's own head-call budgets because it exists only
/// to measure reachability, not to do useful work on success.
pub const T_PROBE: Duration = Duration::from_secs(5);

fn connect(url: &Url) -> RootProvider {
    ProviderBuilder::new().on_http(url.clone())
}

fn to_transport_error(url: &Url, err: impl std::fmt::Display) -> TransportError {
    TransportError::Dial {
        url: url.clone(),
        reason: err.to_string(),
    }
}

/// Fetch the chain's head block header (no transaction bodies) — the
/// cheapest "head" call used both as the latency probe and as bulk fetch's
/// first per-URL step.
pub async fn head_block(url: &Url, timeout: Duration) -> Result<Block, TransportError> {
    let provider = connect(url);
    let fut = provider.get_block_by_number(BlockNumberOrTag::Latest);
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(Some(block))) => Ok(block),
        Ok(Ok(None)) => Err(TransportError::Rpc {
            url: url.clone(),
            code: 0,
            message: "node returned no head block".into(),
        }),
        Ok(Err(e)) => Err(to_transport_error(url, e)),
        Err(_) => Err(TransportError::Timeout {
            url: url.clone(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Fetch a full block (with transaction bodies) by number, used by the
/// transaction scanner.
pub async fn block_with_transactions(
    url: &Url,
    number: u64,
    timeout: Duration,
) -> Result<Option<Block>, TransportError> {
    let provider = connect(url);
    let fut = provider
        .get_block_by_number(BlockNumberOrTag::Number(number))
        .full();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(block)) => Ok(block),
        Ok(Err(e)) => Err(to_transport_error(url, e)),
        Err(_) => Err(TransportError::Timeout {
            url: url.clone(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Read a native balance, optionally pinned to a historical block.
pub async fn native_balance(
    url: &Url,
    address: Address,
    block: Option<u64>,
    timeout: Duration,
) -> Result<U256, TransportError> {
    let provider = connect(url);
    let mut call = provider.get_balance(address);
    if let Some(n) = block {
        call = call.block_id(BlockId::Number(BlockNumberOrTag::Number(n)));
    }
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(balance)) => Ok(balance),
        Ok(Err(e)) => Err(to_transport_error(url, e)),
        Err(_) => Err(TransportError::Timeout {
            url: url.clone(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Issue a read-only `balanceOf(address)` call against an ERC-20 contract:
/// the selector followed by the holder address, right-padded to 32 bytes.
pub async fn erc20_balance_of(
    url: &Url,
    token_contract: Address,
    holder: Address,
    timeout: Duration,
) -> Result<U256, TransportError> {
    let mut calldata = Vec::with_capacity(36);
    calldata.extend_from_slice(&BALANCE_OF_SELECTOR);
    calldata.extend_from_slice(&[0u8; 12]);
    calldata.extend_from_slice(holder.as_slice());

    let provider = connect(url);
    let request = TransactionRequest::default()
        .with_to(token_contract)
        .with_input(Bytes::from(calldata));
    let fut = provider.call(request);
    let raw = match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => return Err(to_transport_error(url, e)),
        Err(_) => {
            return Err(TransportError::Timeout {
                url: url.clone(),
                elapsed_ms: timeout.as_millis() as u64,
            });
        }
    };
    if raw.len() < 32 {
        return Err(TransportError::Rpc {
            url: url.clone(),
            code: 0,
            message: format!("balanceOf returned {} bytes, expected >= 32", raw.len()),
        });
    }
    Ok(U256::from_be_slice(&raw[raw.len() - 32..]))
}

/// Fetch the chain's current gas price in wei.
pub async fn gas_price(url: &Url, timeout: Duration) -> Result<u128, TransportError> {
    let provider = connect(url);
    let fut = provider.get_gas_price();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(price)) => Ok(price),
        Ok(Err(e)) => Err(to_transport_error(url, e)),
        Err(_) => Err(TransportError::Timeout {
            url: url.clone(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Fetch the chain's numeric id, used to pick the right signing rules when
/// recovering a transaction's sender.
pub async fn chain_id(url: &Url, timeout: Duration) -> Result<u64, TransportError> {
    let provider = connect(url);
    let fut = provider.get_chain_id();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(id)) => Ok(id),
        Ok(Err(e)) => Err(to_transport_error(url, e)),
        Err(_) => Err(TransportError::Timeout {
            url: url.clone(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Dial `url` and time its cheapest possible call — the head block, with
/// no transaction bodies — under the dedicated 5-second probe budget. This
/// is the only operation whose sole purpose is a latency measurement; bulk
/// fetch and the scanner measure latency only as a side effect of work they
/// need to do anyway, under their own longer budgets.
pub async fn probe_latency(url: &Url) -> Result<Duration, TransportError> {
    let started = std::time::Instant::now();
    head_block(url, T_PROBE).await?;
    Ok(started.elapsed())
}
