//! Typed event bus: fans out [`Event`]s to N dynamically registered
//! subscribers via bounded channels. A slow subscriber has its event for
//! that publish dropped; it is never blocked, and it is never unsubscribed
//! for being slow.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::types::{ChainName, PriceId, TransactionRecord};

/// Capacity of each subscriber's buffered channel.
pub const SUBSCRIBER_CAPACITY: usize = 100;

/// One result from a per-chain bulk fetch, as published on
/// [`Event::ChainDataUpdated`].
#[derive(Debug, Clone)]
pub struct ChainFetchResult {
    pub address: alloy_primitives::Address,
    pub balance: Decimal,
    pub balance_24h: Option<Decimal>,
    pub token_balances: Vec<(String, Decimal)>,
}

/// A typed notification published by the watcher.
#[derive(Debug, Clone)]
pub enum Event {
    PriceUpdated {
        price_id: PriceId,
        usd: f64,
    },
    ChainDataUpdated {
        chain_name: ChainName,
        results: Vec<ChainFetchResult>,
        failed_urls: Vec<url::Url>,
    },
    GasPriceUpdated {
        chain_name: ChainName,
        wei: u128,
    },
    TransactionsUpdated {
        address: alloy_primitives::Address,
        transactions: Vec<TransactionRecord>,
    },
    /// Reserved; never published by the scheduler today.
    StatusUpdated,
}

/// Opaque handle returned by [`EventBus::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

/// A subscriber's receiving end, paired with its capacity-100 channel.
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::Receiver<Event>,
}

/// Fans out [`Event`]s to every live subscriber. `publish` never blocks:
/// a full sink drops that event and is left in place.
#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<SubscriptionId, mpsc::Sender<Event>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.insert(id, tx);
        Subscription { id, receiver: rx }
    }

    /// Detach and close a subscriber. Idempotent: unsubscribing twice, or a
    /// never-subscribed id, is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(&id);
    }

    /// Send `event` to every live subscriber non-blockingly. A subscriber
    /// whose channel is at capacity has this event dropped for it, but
    /// remains subscribed.
    pub fn publish(&self, event: Event) {
        for entry in self.subscribers.iter() {
            // try_send never awaits: a full channel returns immediately,
            // which is the required drop-on-full behavior.
            let _ = entry.value().try_send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_event() -> Event {
        Event::PriceUpdated {
            price_id: "ethereum".into(),
            usd: 2500.5,
        }
    }

    #[tokio::test]
    async fn publish_delivers_to_all_subscribers() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(price_event());

        let got_a = a.receiver.recv().await.expect("event for a");
        let got_b = b.receiver.recv().await.expect("event for b");
        assert!(matches!(got_a, Event::PriceUpdated { .. }));
        assert!(matches!(got_b, Event::PriceUpdated { .. }));
    }

    #[tokio::test]
    async fn unsubscribe_detaches_and_closes_sink() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let id = sub.id;
        let mut receiver = sub.receiver;
        bus.unsubscribe(id);
        bus.publish(price_event());
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_subscriber_drops_events_but_drained_subscriber_gets_every_one() {
        let bus = EventBus::new();
        let drained = bus.subscribe();
        let mut drained_rx = drained.receiver;
        let stuck = bus.subscribe();
        let mut stuck_rx = stuck.receiver;

        let drain_handle = tokio::spawn(async move {
            let mut count = 0;
            while drained_rx.recv().await.is_some() {
                count += 1;
            }
            count
        });

        for _ in 0..101 {
            bus.publish(price_event());
            // Give the drain task a chance to run concurrently with
            // publishing; otherwise both channels fill before it's ever
            // polled and the drained subscriber would miss events too.
            tokio::task::yield_now().await;
        }

        // The stuck subscriber's buffer holds at most SUBSCRIBER_CAPACITY;
        // later events were dropped, not blocked.
        let mut stuck_received = 0;
        while stuck_rx.try_recv().is_ok() {
            stuck_received += 1;
        }
        assert!(stuck_received <= SUBSCRIBER_CAPACITY);
        assert!(stuck_received > 0);
        assert_eq!(bus.subscriber_count(), 2);

        drop(bus);
        let drained_count = drain_handle.await.expect("drain task");
        assert_eq!(drained_count, 101);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.publish(price_event());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
