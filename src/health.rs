//! RPC endpoint health and prioritization.
//!
//! Tracks, per URL, the last latency measurement, a bounded rolling history
//! of measurements, and an optional cooldown expiry. [`RpcHealthTable::prioritize`]
//! is total: given any URL list (including an empty one) it always produces
//! a permutation, never an error.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::seq::SliceRandom;
use url::Url;

/// Cap on [`RpcHealthEntry::latency_history`].
const LATENCY_HISTORY_CAP: usize = 15;

/// Cooldown window applied when a caller reports a URL as having produced
/// a failure during a bulk operation.
pub const COOLDOWN_DURATION: Duration = Duration::from_secs(5 * 60);

/// A single latency measurement, or the distinguished "error" sentinel —
/// distinguishable from both absence and any valid positive duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMeasurement {
    Measured(Duration),
    Error,
}

/// Per-URL health record.
#[derive(Debug, Clone, Default)]
pub struct RpcHealthEntry {
    last_latency: Option<LatencyMeasurement>,
    latency_history: VecDeque<LatencyMeasurement>,
    cooldown_expiry: Option<Instant>,
}

impl RpcHealthEntry {
    pub fn last_latency(&self) -> Option<LatencyMeasurement> {
        self.last_latency
    }

    pub fn latency_history(&self) -> &VecDeque<LatencyMeasurement> {
        &self.latency_history
    }

    pub fn cooldown_expiry(&self) -> Option<Instant> {
        self.cooldown_expiry
    }

    fn is_cooling(&self, now: Instant) -> bool {
        self.cooldown_expiry.is_some_and(|expiry| expiry > now)
    }

    fn push_measurement(&mut self, measurement: LatencyMeasurement) {
        self.last_latency = Some(measurement);
        self.latency_history.push_back(measurement);
        while self.latency_history.len() > LATENCY_HISTORY_CAP {
            self.latency_history.pop_front();
        }
    }
}

/// Shared, concurrently-updated table of [`RpcHealthEntry`] keyed by URL.
///
/// Writes (new latency, new cooldown) are brief dashmap operations; no lock
/// is ever held across a network call.
#[derive(Debug, Default)]
pub struct RpcHealthTable {
    entries: DashMap<Url, RpcHealthEntry>,
}

/// Sort bucket used internally by [`RpcHealthTable::prioritize`], in the
/// strict order the fleet prioritization requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    HealthyMeasured,
    HealthyUnknown,
    HealthyError,
    Cooling,
}

impl RpcHealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a latency probe.
    pub fn record_latency(&self, url: &Url, measurement: LatencyMeasurement) {
        self.entries
            .entry(url.clone())
            .or_default()
            .push_measurement(measurement);
    }

    /// Mark a URL as having produced a failure during a bulk operation:
    /// sets its cooldown expiry to `now + 5 minutes`.
    pub fn mark_cooldown(&self, url: &Url) {
        let mut entry = self.entries.entry(url.clone()).or_default();
        entry.cooldown_expiry = Some(Instant::now() + COOLDOWN_DURATION);
    }

    /// Operator action ("force refresh"): clear a URL's cooldown early.
    pub fn clear_cooldown(&self, url: &Url) {
        if let Some(mut entry) = self.entries.get_mut(url) {
            entry.cooldown_expiry = None;
        }
    }

    /// Snapshot a single URL's health entry, if one has been observed yet.
    pub fn entry(&self, url: &Url) -> Option<RpcHealthEntry> {
        self.entries.get(url).map(|e| e.clone())
    }

    /// Order `urls` so the most promising endpoint is attempted first.
    /// Total: an empty input produces an empty output.
    pub fn prioritize(&self, urls: &[Url]) -> Vec<Url> {
        let now = Instant::now();
        let mut shuffled = urls.to_vec();
        let mut rng = rand::rng();
        shuffled.shuffle(&mut rng);

        let mut keyed: Vec<(Bucket, Option<Duration>, Url)> = shuffled
            .into_iter()
            .map(|url| {
                let Some(entry) = self.entries.get(&url) else {
                    return (Bucket::HealthyUnknown, None, url);
                };
                if entry.is_cooling(now) {
                    return (Bucket::Cooling, None, url.clone());
                }
                match entry.last_latency {
                    Some(LatencyMeasurement::Measured(d)) => {
                        (Bucket::HealthyMeasured, Some(d), url.clone())
                    }
                    Some(LatencyMeasurement::Error) => (Bucket::HealthyError, None, url.clone()),
                    None => (Bucket::HealthyUnknown, None, url.clone()),
                }
            })
            .collect();

        // Stable sort: the shuffle above breaks ties within a bucket (and
        // within the measured bucket, ties at equal latency) without
        // disturbing the strict bucket/latency ordering across buckets.
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| match (a.1, b.1) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => std::cmp::Ordering::Equal,
        }));

        keyed.into_iter().map(|(_, _, url)| url).collect()
    }
}
