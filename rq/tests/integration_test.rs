//! Integration tests for rentquery
//!
//! End-to-end collection rounds: coordinator and providers running as
//! independent tasks, talking only through a bus.

use std::time::Duration;

use rust_decimal::Decimal;

use rentquery::bus::{LocalBus, TcpCoordinatorBus, TcpProviderBus};
use rentquery::coordinator::Coordinator;
use rentquery::provider::{CycleOutcome, Fleet, Provider, RentalUnit};

fn fleet_of(available: usize) -> Fleet {
    let units = (0..available)
        .map(|i| RentalUnit::available(i as u32 + 1, format!("unit-{i}"), Decimal::new(10_000 + i as i64 * 500, 2)))
        .collect();
    Fleet::new(units)
}

// =============================================================================
// Local bus
// =============================================================================

#[tokio::test]
async fn test_local_round_two_providers() {
    let bus = LocalBus::default();

    // Providers with 2 and 3 available units respectively
    let provider_a = Provider::new("provider-a", "uri://a", fleet_of(2));
    let provider_b = Provider::new("provider-b", "uri://b", fleet_of(3));

    let mut tasks = Vec::new();
    for provider in [provider_a, provider_b] {
        let mut endpoint = bus.provider_side();
        tasks.push(tokio::spawn(async move {
            provider
                .await_and_respond(&mut endpoint, Some(Duration::from_secs(2)))
                .await
                .unwrap()
        }));
    }

    let mut coordinator = Coordinator::new(bus.into_coordinator_side());
    let result = coordinator
        .request_availability(2, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(result.reply_count(), 2);
    assert_eq!(result.total_offers, 5);
    assert!(result.cheapest.is_some());

    for task in tasks {
        assert_eq!(task.await.unwrap(), CycleOutcome::Answered { confirmed: true });
    }
}

#[tokio::test]
async fn test_local_round_ranks_across_providers() {
    let bus = LocalBus::default();

    let pricey = Provider::new(
        "pricey",
        "uri://pricey",
        Fleet::new(vec![RentalUnit::available(1, "2023/Ferrari/F8 Tributo", Decimal::new(350000, 2))]),
    );
    let bargain = Provider::new(
        "bargain",
        "uri://bargain",
        Fleet::new(vec![
            RentalUnit::available(1, "2024/BMW/M4 Competition", Decimal::new(180000, 2)),
            RentalUnit::available(2, "2022/Nissan/GT-R", Decimal::new(220000, 2)),
        ]),
    );

    let mut tasks = Vec::new();
    for provider in [pricey, bargain] {
        let mut endpoint = bus.provider_side();
        tasks.push(tokio::spawn(async move {
            provider
                .await_and_respond(&mut endpoint, Some(Duration::from_secs(2)))
                .await
                .unwrap()
        }));
    }

    let mut coordinator = Coordinator::new(bus.into_coordinator_side());
    let result = coordinator
        .request_availability(2, Duration::from_secs(2))
        .await
        .unwrap();

    let best = result.cheapest.expect("offers were collected");
    assert_eq!(best.provider_name, "bargain");
    assert_eq!(best.offer.name, "2024/BMW/M4 Competition");
    assert_eq!(best.offer.daily_rate, Decimal::new(180000, 2));

    for task in tasks {
        task.await.unwrap();
    }
}

// =============================================================================
// TCP bus
// =============================================================================

#[tokio::test]
async fn test_tcp_round_two_providers() {
    let bus = TcpCoordinatorBus::bind("127.0.0.1:0", "127.0.0.1:0").await.unwrap();
    let broadcast_addr = bus.broadcast_addr().to_string();
    let reply_addr = bus.reply_addr().unwrap().to_string();

    let mut tasks = Vec::new();
    for (name, fleet) in [("provider-a", fleet_of(2)), ("provider-b", fleet_of(3))] {
        let broadcast_addr = broadcast_addr.clone();
        let reply_addr = reply_addr.clone();
        tasks.push(tokio::spawn(async move {
            let mut endpoint = TcpProviderBus::connect(&broadcast_addr, &reply_addr).await.unwrap();
            let provider = Provider::new(name, format!("uri://{name}"), fleet);
            provider
                .await_and_respond(&mut endpoint, Some(Duration::from_secs(5)))
                .await
                .unwrap()
        }));
    }

    // Let both subscribers land before broadcasting
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bus.subscriber_count().await, 2);

    let mut coordinator = Coordinator::new(bus);
    let result = coordinator
        .request_availability(2, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(result.reply_count(), 2);
    assert_eq!(result.total_offers, 5);
    assert_eq!(result.discarded, 0);

    for task in tasks {
        assert_eq!(task.await.unwrap(), CycleOutcome::Answered { confirmed: true });
    }
}

#[tokio::test]
async fn test_tcp_round_truncates_when_a_provider_is_missing() {
    let bus = TcpCoordinatorBus::bind("127.0.0.1:0", "127.0.0.1:0").await.unwrap();
    let broadcast_addr = bus.broadcast_addr().to_string();
    let reply_addr = bus.reply_addr().unwrap().to_string();

    let task = tokio::spawn(async move {
        let mut endpoint = TcpProviderBus::connect(&broadcast_addr, &reply_addr).await.unwrap();
        let provider = Provider::new("lonely", "uri://lonely", fleet_of(1));
        provider
            .await_and_respond(&mut endpoint, Some(Duration::from_secs(5)))
            .await
            .unwrap()
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Expect three replies; only one provider exists
    let mut coordinator = Coordinator::new(bus);
    let result = coordinator
        .request_availability(3, Duration::from_millis(300))
        .await
        .unwrap();

    assert_eq!(result.reply_count(), 1);
    assert_eq!(result.replies[0].provider_name, "lonely");
    assert_eq!(result.total_offers, 1);

    task.await.unwrap();
}

#[tokio::test]
async fn test_tcp_collect_with_no_providers_returns_empty_result() {
    let bus = TcpCoordinatorBus::bind("127.0.0.1:0", "127.0.0.1:0").await.unwrap();

    let mut coordinator = Coordinator::new(bus);
    let result = coordinator
        .request_availability(2, Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(result.reply_count(), 0);
    assert_eq!(result.total_offers, 0);
    assert!(result.cheapest.is_none());
}
