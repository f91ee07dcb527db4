//! Watcher subsystem for a multi-chain EVM balance and transaction observer.
//!
//! This crate is the core of a headless watcher: it polls a configured set
//! of EVM chains and wallet addresses on a fixed cadence, resolves native
//! and token balances, gas prices, fiat prices, and recent transactions,
//! and republishes every change as a typed event. It deliberately stops at
//! that boundary — no TUI, no HTTP/WebSocket server, no CLI dispatch logic
//! lives here; those are thin collaborators that read the snapshot and
//! subscribe to the event bus.
//!
//! # Modules
//!
//! - [`types`] — shared descriptor and record types (chains, tokens,
//!   addresses, transaction records).
//! - [`error`] — the four-part error taxonomy (config, transport, protocol,
//!   fetch).
//! - [`format`] — pure number/string formatting helpers.
//! - [`health`] — RPC endpoint health tracking and prioritization.
//! - [`events`] — the typed, multi-subscriber event bus.
//! - [`datasource`] — the one external-dependency boundary, plus a scripted
//!   test double.
//! - [`evm`] — the real [`datasource::DataSource`] implementation: EVM
//!   JSON-RPC via `alloy`, and an HTTP price oracle client.
//! - [`snapshot`] — the thread-safe in-memory snapshot store.
//! - [`scheduler`] — the polling loop that ties everything together.
//! - [`config`] — persisted configuration: load, save, and self-test.
//! - [`cli`] — command-line flag definitions consumed by the entry point.

pub mod cli;
pub mod config;
pub mod datasource;
pub mod error;
pub mod events;
pub mod evm;
pub mod format;
pub mod health;
pub mod scheduler;
pub mod snapshot;
pub mod types;
