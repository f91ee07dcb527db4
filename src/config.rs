//! Persisted watcher configuration: load, validate, save, and the
//! non-fatal "merge fault" self-test.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, TransportError};
use crate::types::{AddressDescriptor, ChainDescriptor, ChainName};

fn default_privacy_timeout_seconds() -> u64 {
    60
}
fn default_fiat_decimals() -> u32 {
    2
}
fn default_token_decimals() -> u32 {
    2
}
fn default_auto_cycle_enabled() -> bool {
    false
}
fn default_auto_cycle_interval_seconds() -> u64 {
    15
}

/// One entry of the `addresses` array: either `{address, name?}` or a bare
/// legacy address string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AddressEntry {
    Named {
        address: String,
        #[serde(default)]
        name: Option<String>,
    },
    Bare(String),
}

/// The config file's on-disk shape, before legacy synthesis and validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    addresses: Vec<AddressEntry>,
    #[serde(default)]
    chains: Vec<ChainDescriptor>,
    #[serde(default)]
    rpc_urls: Vec<Url>,
    #[serde(default)]
    selected_chain: Option<String>,
    #[serde(default = "default_privacy_timeout_seconds")]
    privacy_timeout_seconds: u64,
    #[serde(default = "default_fiat_decimals")]
    fiat_decimals: u32,
    #[serde(default = "default_token_decimals")]
    token_decimals: u32,
    #[serde(default = "default_auto_cycle_enabled")]
    auto_cycle_enabled: bool,
    #[serde(default = "default_auto_cycle_interval_seconds")]
    auto_cycle_interval_seconds: u64,
}

/// The on-disk shape written by [`WatcherConfig::save`]. Addresses are
/// always written in the `{address, name}` form; the legacy bare-string and
/// root-level `rpc_urls` forms are accepted on load but never re-emitted.
#[derive(Debug, Serialize)]
struct SavedAddress {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SavedConfig<'a> {
    addresses: Vec<SavedAddress>,
    chains: &'a [ChainDescriptor],
    selected_chain: Option<&'a ChainName>,
    privacy_timeout_seconds: u64,
    fiat_decimals: u32,
    token_decimals: u32,
    auto_cycle_enabled: bool,
    auto_cycle_interval_seconds: u64,
}

/// A loaded, validated watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub addresses: Vec<AddressDescriptor>,
    pub chains: Vec<ChainDescriptor>,
    /// Resolved index into `chains`; falls back to 0 when `selected_chain`
    /// is absent or names an unknown chain.
    pub selected_chain_index: usize,
    pub privacy_timeout_seconds: u64,
    pub fiat_decimals: u32,
    pub token_decimals: u32,
    pub auto_cycle_enabled: bool,
    pub auto_cycle_interval_seconds: u64,
}

const ETHERSCAN_BASE_URL: &str = "https://etherscan.io";

impl WatcherConfig {
    /// Load and validate a config file from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let addresses = raw
            .addresses
            .into_iter()
            .map(|entry| match entry {
                AddressEntry::Named { address, name } => AddressDescriptor::new(address, name),
                AddressEntry::Bare(address) => AddressDescriptor::new(address, None),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidAddress {
                address: e.0.clone(),
                reason: e.to_string(),
            })?;

        let mut chains = raw.chains;
        if chains.is_empty() && !raw.rpc_urls.is_empty() {
            chains.push(ChainDescriptor {
                name: "Ethereum".into(),
                symbol: "ETH".into(),
                price_id: "ethereum".into(),
                chain_id: None,
                explorer_base_url: Some(ETHERSCAN_BASE_URL.parse().expect("valid literal url")),
                rpc_urls: raw.rpc_urls,
                tokens: Vec::new(),
            });
        }
        if chains.is_empty() {
            return Err(ConfigError::NoChains);
        }

        let selected_chain_index = raw
            .selected_chain
            .as_ref()
            .and_then(|name| chains.iter().position(|c| &c.name == name))
            .unwrap_or(0);

        let config = WatcherConfig {
            addresses,
            chains,
            selected_chain_index,
            privacy_timeout_seconds: raw.privacy_timeout_seconds,
            fiat_decimals: raw.fiat_decimals,
            token_decimals: raw.token_decimals,
            auto_cycle_enabled: raw.auto_cycle_enabled,
            auto_cycle_interval_seconds: raw.auto_cycle_interval_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Non-empty chain list, non-empty chain names, non-empty RPC lists.
    /// Run both after load and again before save, since the in-memory
    /// config can be mutated between the two.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        for (index, chain) in self.chains.iter().enumerate() {
            if chain.name.trim().is_empty() {
                return Err(ConfigError::EmptyChainName(index));
            }
            if chain.rpc_urls.is_empty() {
                return Err(ConfigError::EmptyRpcList {
                    name: chain.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Atomically save this config to `path`: write to `<path>.tmp`
    /// then rename over the destination, after first copying any existing
    /// destination to a timestamped `<path>.<YYYYMMDD-HHMMSS>.bak`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();

        if path.exists() {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            let backup = backup_path(path, &stamp.to_string());
            fs::copy(path, &backup).map_err(|source| ConfigError::Write {
                path: backup.display().to_string(),
                source,
            })?;
        }

        let saved = SavedConfig {
            addresses: self
                .addresses
                .iter()
                .map(|a| SavedAddress {
                    address: a.raw().to_string(),
                    name: a.display_name.clone(),
                })
                .collect(),
            chains: &self.chains,
            selected_chain: self.chains.get(self.selected_chain_index).map(|c| &c.name),
            privacy_timeout_seconds: self.privacy_timeout_seconds,
            fiat_decimals: self.fiat_decimals,
            token_decimals: self.token_decimals,
            auto_cycle_enabled: self.auto_cycle_enabled,
            auto_cycle_interval_seconds: self.auto_cycle_interval_seconds,
        };
        let body = serde_json::to_string_pretty(&saved).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source: std::io::Error::other(source),
        })?;

        let tmp_path = tmp_path(path);
        fs::write(&tmp_path, body).map_err(|source| ConfigError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}

fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".{stamp}.bak"));
    PathBuf::from(s)
}

/// Capability [`self_test`] needs: resolve the chain id a given RPC URL
/// reports. The real implementation forwards to [`crate::evm::rpc::chain_id`];
/// tests supply a scripted double instead of dialing a network.
#[async_trait]
pub trait ChainIdProbe: Send + Sync {
    async fn chain_id(&self, url: &Url) -> Result<u64, TransportError>;
}

/// Non-fatal merge-fault detection: report every configured chain whose RPC
/// URLs disagree about the chain id they serve. A URL that fails to answer
/// is skipped, not treated as a disagreement.
pub async fn self_test(
    chains: &[ChainDescriptor],
    probe: &dyn ChainIdProbe,
) -> Vec<(ChainName, String)> {
    let mut faults = Vec::new();
    for chain in chains {
        let mut seen: Option<u64> = None;
        let mut inconsistent = false;
        for url in &chain.rpc_urls {
            if let Ok(id) = probe.chain_id(url).await {
                match seen {
                    None => seen = Some(id),
                    Some(expected) if expected != id => inconsistent = true,
                    Some(_) => {}
                }
            }
        }
        if inconsistent {
            faults.push((
                chain.name.clone(),
                format!(
                    "chain {} reports inconsistent chain ids across its configured RPC URLs",
                    chain.name
                ),
            ));
        }
    }
    faults
}
