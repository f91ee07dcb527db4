//! Shared descriptor and record types for the watcher's data model.
//!
//! Addresses fold case for equality and hashing: [`alloy_primitives::Address`]
//! already normalizes any mixed-case/checksummed hex string into 20 raw
//! bytes at parse time, so two differently-cased spellings of the same
//! address compare and hash identically. The *display* form supplied in
//! config is kept alongside, unmodified, for anything user-facing.

use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use url::Url;

/// A chain's unique name, used as the join key across every per-chain map
/// in the snapshot.
pub type ChainName = String;

/// An opaque identifier passed to the external price oracle.
pub type PriceId = String;

/// An ERC-20-style token deployed on one chain. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub contract_address: Address,
    pub decimals: u8,
    pub price_id: PriceId,
}

/// A single EVM-compatible network and its RPC fleet. Immutable during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub name: ChainName,
    pub symbol: String,
    pub price_id: PriceId,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub explorer_base_url: Option<Url>,
    pub rpc_urls: Vec<Url>,
    #[serde(default)]
    pub tokens: Vec<TokenDescriptor>,
}

impl ChainDescriptor {
    /// True iff every structural requirement holds: a non-empty name and a
    /// non-empty RPC list.
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && !self.rpc_urls.is_empty()
    }
}

/// One configured wallet to watch. `address` folds case for equality;
/// `display_name` is an optional human label, never used for lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressDescriptor {
    address: Address,
    /// The exact spelling supplied in config, kept for round-tripping display.
    raw: String,
    pub display_name: Option<String>,
}

impl AddressDescriptor {
    pub fn new(
        raw: impl Into<String>,
        display_name: Option<String>,
    ) -> Result<Self, AddressParseError> {
        let raw = raw.into();
        let address = raw
            .parse::<Address>()
            .map_err(|_| AddressParseError(raw.clone()))?;
        Ok(Self {
            address,
            raw,
            display_name,
        })
    }

    /// The case-folded address, used as the lookup/equality key everywhere.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The exact string as supplied in config.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for AddressDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(pub String);

/// One observed transaction touching a watched address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    /// Literal `"Contract"` when the underlying transaction has no recipient
    /// (contract creation).
    pub to: String,
    /// Native-decimal string, already scaled by 10^18, rendered at the
    /// configured token-decimal precision.
    pub value_formatted: String,
    pub block_number: u64,
    pub gas_limit: u64,
    /// `"<f2> Gwei"`.
    pub gas_price_formatted: String,
    pub nonce: u64,
}

pub const CONTRACT_RECIPIENT: &str = "Contract";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_equality_folds_case() {
        let lower = AddressDescriptor::new("0xab5801a7d398351b8be11c439e05c5b3259aec9b", None)
            .expect("valid address");
        let mixed = AddressDescriptor::new("0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B", None)
            .expect("valid address");
        assert_eq!(lower.address(), mixed.address());
        assert_ne!(lower.raw(), mixed.raw());
    }

    #[test]
    fn invalid_address_rejected() {
        assert!(AddressDescriptor::new("not-an-address", None).is_err());
    }

    #[test]
    fn chain_well_formed_requires_name_and_rpc_urls() {
        let mut chain = ChainDescriptor {
            name: "Ethereum".into(),
            symbol: "ETH".into(),
            price_id: "ethereum".into(),
            chain_id: Some(1),
            explorer_base_url: None,
            rpc_urls: vec!["https://rpc.example".parse().unwrap()],
            tokens: vec![],
        };
        assert!(chain.is_well_formed());
        chain.rpc_urls.clear();
        assert!(!chain.is_well_formed());
    }
}
