//! Transaction scanner: the 5 most recent transactions touching one
//! address on one chain, found by walking the last 10 blocks.

use std::time::{Duration, Instant};

use alloy_consensus::Transaction as _;
use alloy_primitives::Address;
use alloy_rpc_types_eth::Transaction;

use crate::error::{FetchError, TransportError};
use crate::evm::rpc;
use crate::format;
use crate::health::{LatencyMeasurement, RpcHealthTable};
use crate::types::{ChainDescriptor, TransactionRecord, CONTRACT_RECIPIENT};

/// Per-operation timeout for the scanner.
const T_SCAN: Duration = Duration::from_secs(10);
const MAX_RECORDS: usize = 5;
const BLOCKS_TO_SCAN: u64 = 10;

fn matches(tx: &Transaction, target: Address) -> bool {
    tx.from == target || tx.to() == Some(target)
}

fn to_record(tx: &Transaction, block_number: u64, decimals: u32) -> TransactionRecord {
    let to = tx
        .to()
        .map(|a| format!("{a:#x}"))
        .unwrap_or_else(|| CONTRACT_RECIPIENT.to_string());
    TransactionRecord {
        hash: tx.inner.tx_hash().to_string(),
        from: format!("{:#x}", tx.from),
        to,
        value_formatted: format::render_scaled(
            rust_decimal::Decimal::from_str_exact(&tx.value().to_string()).unwrap_or_default(),
            18,
            decimals,
        ),
        block_number,
        gas_limit: tx.gas_limit(),
        gas_price_formatted: format::gas_price_gwei(tx.max_fee_per_gas()),
        nonce: tx.nonce(),
    }
}

/// Run the transaction-scan algorithm against `chain`'s prioritized URL list.
pub async fn fetch_transactions(
    health: &RpcHealthTable,
    chain: &ChainDescriptor,
    address: Address,
    decimals: u32,
) -> Result<Vec<TransactionRecord>, FetchError> {
    let prioritized = health.prioritize(&chain.rpc_urls);
    let mut last_err: Option<TransportError> = None;

    for url in &prioritized {
        let started = Instant::now();
        let head = match rpc::head_block(url, T_SCAN).await {
            Ok(block) => {
                health.record_latency(url, LatencyMeasurement::Measured(started.elapsed()));
                block
            }
            Err(e) => {
                health.record_latency(url, LatencyMeasurement::Error);
                health.mark_cooldown(url);
                last_err = Some(e);
                continue;
            }
        };

        // Read and discard: resolving chain id is what the signing rules
        // used to recover each transaction's sender would need. The
        // node-populated `from` field already reflects that recovery; we
        // still perform the read so a chain whose id endpoint is broken is
        // correctly treated as a failed URL.
        if let Err(e) = rpc::chain_id(url, T_SCAN).await {
            health.mark_cooldown(url);
            last_err = Some(e);
            continue;
        }

        let head_number = head.header.number;
        let mut records = Vec::new();
        let mut scan_error = None;

        for i in 0..BLOCKS_TO_SCAN {
            if records.len() >= MAX_RECORDS {
                break;
            }
            let Some(block_number) = head_number.checked_sub(i) else {
                break;
            };
            match rpc::block_with_transactions(url, block_number, T_SCAN).await {
                Ok(Some(block)) => {
                    let txs = block.transactions.as_transactions().unwrap_or_default();
                    for tx in txs {
                        if records.len() >= MAX_RECORDS {
                            break;
                        }
                        if matches(tx, address) {
                            records.push(to_record(tx, block_number, decimals));
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    scan_error = Some(e);
                    break;
                }
            }
        }

        if records.is_empty() {
            if let Some(e) = scan_error {
                health.mark_cooldown(url);
                last_err = Some(e);
                continue;
            }
        }
        return Ok(records);
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
