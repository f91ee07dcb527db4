//! End-to-end scenarios against a scripted `DataSource`, driven one tick at
//! a time through `Watcher::fetch_once`.

use std::time::{Duration, Instant};

use alloy_primitives::Address;
use evm_watcher_core::datasource::{ChainFetchOutcome, ScriptedDataSource};
use evm_watcher_core::events::ChainFetchResult;
use evm_watcher_core::format;
use evm_watcher_core::health::{LatencyMeasurement, RpcHealthTable, COOLDOWN_DURATION};
use evm_watcher_core::scheduler::Watcher;
use evm_watcher_core::types::{AddressDescriptor, ChainDescriptor, TransactionRecord};
use rust_decimal::Decimal;

const TARGET: &str = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B";
const TOKEN_DECIMALS: u32 = 2;

fn chain(name: &str, url: &str) -> ChainDescriptor {
    ChainDescriptor {
        name: name.into(),
        symbol: "ETH".into(),
        price_id: "ethereum".into(),
        chain_id: Some(1),
        explorer_base_url: None,
        rpc_urls: vec![url.parse().unwrap()],
        tokens: vec![],
    }
}

fn address() -> Address {
    TARGET.parse().unwrap()
}

fn descriptor() -> AddressDescriptor {
    AddressDescriptor::new(TARGET, None).unwrap()
}

#[tokio::test]
async fn bulk_fetch_success_updates_snapshot_and_clears_errors() {
    let c = chain("MockChain", "https://rpc.example");
    let result = ChainFetchResult {
        address: address(),
        balance: Decimal::from(2_500_000_000_000_000_000u128),
        balance_24h: None,
        token_balances: vec![("TEST".into(), Decimal::from(500_000_000u128))],
    };
    let outcome = ChainFetchOutcome {
        results: vec![result],
        failed_urls: vec![],
        still_pending: vec![],
    };
    let ds = ScriptedDataSource::new().with_chain_data("MockChain", outcome);

    let watcher = Watcher::new(ds, vec![c], vec![descriptor()], TOKEN_DECIMALS);
    watcher.fetch_once().await;

    let accounts = watcher.snapshot().get_accounts().await;
    let snapshot = accounts.get(&address()).expect("address tracked");
    assert_eq!(
        format::render_scaled(snapshot.balances["MockChain"], 18, 4),
        "2.5000"
    );
    assert_eq!(
        format::render_scaled(snapshot.token_balances["MockChain"]["TEST"], 6, 1),
        "500.0"
    );
    assert!(snapshot.errors.is_empty());
}

#[tokio::test]
async fn failover_reports_failed_url_and_applies_cooldown() {
    let bad: url::Url = "https://bad.example".parse().unwrap();
    let c = chain("MockChain", "https://good.example");
    let result = ChainFetchResult {
        address: address(),
        balance: Decimal::from(2_500_000_000_000_000_000u128),
        balance_24h: None,
        token_balances: vec![],
    };
    let outcome = ChainFetchOutcome {
        results: vec![result],
        failed_urls: vec![bad.clone()],
        still_pending: vec![],
    };
    let ds = ScriptedDataSource::new().with_chain_data("MockChain", outcome);

    let watcher = Watcher::new(ds, vec![c], vec![descriptor()], TOKEN_DECIMALS);
    let mut sub = watcher.events().subscribe();
    watcher.fetch_once().await;

    let accounts = watcher.snapshot().get_accounts().await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(
        format::render_scaled(accounts[&address()].balances["MockChain"], 18, 1),
        "2.5"
    );

    let event = sub.receiver.recv().await.expect("ChainDataUpdated published");
    match event {
        evm_watcher_core::events::Event::ChainDataUpdated { failed_urls, .. } => {
            assert_eq!(failed_urls, vec![bad.clone()]);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Cooldown semantics proven directly against the health table (the
    // watcher's scripted double never touches one).
    let health = RpcHealthTable::new();
    let before = Instant::now();
    health.mark_cooldown(&bad);
    let entry = health.entry(&bad).expect("entry recorded");
    let expiry = entry.cooldown_expiry().expect("cooldown set");
    assert!(expiry >= before + COOLDOWN_DURATION);
    assert!(expiry <= Instant::now() + COOLDOWN_DURATION + Duration::from_secs(1));
}

#[tokio::test]
async fn gas_price_updates_snapshot_and_publishes_event() {
    let c = chain("MockChain", "https://rpc.example");
    let ds = ScriptedDataSource::new().with_gas_price("MockChain", 20_000_000_000u128);

    let watcher = Watcher::new(ds, vec![c], vec![descriptor()], TOKEN_DECIMALS);
    let mut sub = watcher.events().subscribe();
    watcher.fetch_once().await;

    let gas_prices = watcher.snapshot().get_gas_prices().await;
    assert_eq!(gas_prices["MockChain"], 20_000_000_000u128);

    let mut saw_gas_price_updated = false;
    while let Ok(event) = sub.receiver.try_recv() {
        if matches!(event, evm_watcher_core::events::Event::GasPriceUpdated { wei, .. } if wei == 20_000_000_000u128)
        {
            saw_gas_price_updated = true;
        }
    }
    assert!(saw_gas_price_updated);
}

#[tokio::test]
async fn price_oracle_updates_snapshot_and_publishes_event() {
    let c = chain("MockChain", "https://rpc.example");
    let ds = ScriptedDataSource::new().with_price("ethereum", 2500.50);

    let watcher = Watcher::new(ds, vec![c], vec![descriptor()], TOKEN_DECIMALS);
    let mut sub = watcher.events().subscribe();
    watcher.fetch_once().await;

    let prices = watcher.snapshot().get_prices().await;
    assert_eq!(prices["ethereum"], 2500.50);

    let mut saw_price_updated = false;
    while let Ok(event) = sub.receiver.try_recv() {
        if matches!(event, evm_watcher_core::events::Event::PriceUpdated { usd, .. } if usd == 2500.50)
        {
            saw_price_updated = true;
        }
    }
    assert!(saw_price_updated);
}

#[tokio::test]
async fn transaction_scan_updates_snapshot_using_configured_token_decimals() {
    let c = chain("MockChain", "https://rpc.example");
    let record = TransactionRecord {
        hash: "0xhash".into(),
        from: "0x1234000000000000000000000000000000000000".into(),
        to: TARGET.to_lowercase(),
        value_formatted: "1.0000".into(),
        block_number: 0x1000,
        gas_limit: 0x5208,
        gas_price_formatted: "20.00 Gwei".into(),
        nonce: 1,
    };
    let ds = ScriptedDataSource::new().with_transactions("MockChain", vec![record.clone()]);

    let watcher = Watcher::new(ds, vec![c], vec![descriptor()], TOKEN_DECIMALS);
    let mut sub = watcher.events().subscribe();
    watcher.fetch_once().await;

    let accounts = watcher.snapshot().get_accounts().await;
    let transactions = &accounts[&address()].transactions;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].value_formatted, "1.0000");
    assert_eq!(transactions[0].gas_price_formatted, "20.00 Gwei");

    let mut saw_transactions_updated = false;
    while let Ok(event) = sub.receiver.try_recv() {
        if matches!(event, evm_watcher_core::events::Event::TransactionsUpdated { .. }) {
            saw_transactions_updated = true;
        }
    }
    assert!(saw_transactions_updated);
}

#[tokio::test]
async fn prioritization_orders_measured_then_unknown_then_error_then_cooldown() {
    // Duplicates health::tests::prioritization_orders_measured_then_unknown_then_error_then_cooldown.
    let table = RpcHealthTable::new();
    let rpc_slow: url::Url = "https://rpc-slow.example".parse().unwrap();
    let rpc_cooldown: url::Url = "https://rpc-cooldown.example".parse().unwrap();
    let rpc_error: url::Url = "https://rpc-error.example".parse().unwrap();
    let rpc_fast: url::Url = "https://rpc-fast.example".parse().unwrap();
    let rpc_unknown: url::Url = "https://rpc-unknown.example".parse().unwrap();

    table.record_latency(&rpc_slow, LatencyMeasurement::Measured(Duration::from_millis(100)));
    table.record_latency(&rpc_fast, LatencyMeasurement::Measured(Duration::from_millis(10)));
    table.record_latency(&rpc_error, LatencyMeasurement::Error);
    table.mark_cooldown(&rpc_cooldown);

    let order = table.prioritize(&[
        rpc_slow.clone(),
        rpc_cooldown.clone(),
        rpc_error.clone(),
        rpc_fast.clone(),
        rpc_unknown.clone(),
    ]);
    assert_eq!(
        order,
        vec![rpc_fast, rpc_slow, rpc_unknown, rpc_error, rpc_cooldown]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn subscriber_isolation_drops_for_stuck_but_drains_fully_for_attentive() {
    // Duplicates events::tests::slow_subscriber_drops_events_but_drained_subscriber_gets_every_one.
    use evm_watcher_core::events::{Event, EventBus, SUBSCRIBER_CAPACITY};

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

    let started = Instant::now();
    for _ in 0..101 {
        bus.publish(Event::PriceUpdated {
            price_id: "ethereum".into(),
            usd: 1.0,
        });
        // Give the drain task a chance to run concurrently with publishing;
        // otherwise both channels fill before it's ever polled and the
        // drained subscriber would miss events too.
        tokio::task::yield_now().await;
    }
    // 101 non-blocking sends, each yielding once: publishing must not have
    // waited on either subscriber's drain rate.
    assert!(started.elapsed() < Duration::from_secs(1));

    let mut stuck_received = 0;
    while stuck_rx.try_recv().is_ok() {
        stuck_received += 1;
    }
    assert!(stuck_received >= 100);
    assert!(stuck_received <= SUBSCRIBER_CAPACITY);

    drop(bus);
    let drained_count = drain_handle.await.expect("drain task");
    assert_eq!(drained_count, 101);
}
