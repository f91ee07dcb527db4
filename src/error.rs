//! Error taxonomy for the watcher subsystem.
//!
//! Mirrors the failure classes a multi-chain RPC fleet actually produces:
//! configuration faults are fatal at startup, transport and protocol faults
//! are always local to a single URL attempt and never escape a fetch task,
//! and merge faults are reported (not raised) by the config self-test.

use url::Url;

/// Fatal at startup: malformed config, missing chains, empty RPC lists.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config has no chains and no legacy rpc_urls")]
    NoChains,
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("chain {0} has an empty name")]
    EmptyChainName(usize),
    #[error("chain {name} has no RPC URLs")]
    EmptyRpcList { name: String },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Local to a single RPC URL attempt. Never escapes a fetch task; it is
/// always summarized into a failed-URL set or a pending-address set.
#[derive(Debug, thiserror::Error, Clone)]
pub enum TransportError {
    #[error("dial failed for {url}: {reason}")]
    Dial { url: Url, reason: String },
    #[error("request to {url} timed out after {elapsed_ms}ms")]
    Timeout { url: Url, elapsed_ms: u64 },
    #[error("http error from {url}: status {status}")]
    Http { url: Url, status: u16 },
    #[error("rpc error from {url}: {code} {message}")]
    Rpc {
        url: Url,
        code: i64,
        message: String,
    },
}

impl TransportError {
    pub fn url(&self) -> &Url {
        match self {
            TransportError::Dial { url, .. } => url,
            TransportError::Timeout { url, .. } => url,
            TransportError::Http { url, .. } => url,
            TransportError::Rpc { url, .. } => url,
        }
    }
}

/// Local to a single item within an otherwise-successful RPC response: an
/// unexpected shape, or a signature that didn't recover.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ProtocolError {
    #[error("unexpected result shape for {method}: {detail}")]
    UnexpectedResult { method: &'static str, detail: String },
    #[error("failed to recover transaction sender: {0}")]
    SignatureRecovery(String),
}

/// Union of the two local fault classes, used by the parts of the bulk-fetch
/// and scanner algorithms that don't need to distinguish them further.
#[derive(Debug, thiserror::Error, Clone)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
