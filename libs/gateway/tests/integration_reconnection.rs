//! Integration tests for reconnection strategies and the retry cap
//!
//! These tests verify reconnect pacing and that repeated failed attempts end
//! the session instead of looping forever.

mod common;

use common::{wait_for_event, DroppingListener, MockGateway, GATEWAY_LOCK, TEST_TOKEN};
use inkcord_gateway::traits::reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
use inkcord_gateway::{builder, ClientEvent, GatewayError, GatewayState};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_exponential_backoff_full_sequence() {
    verbose_println!("Testing exponential backoff full sequence...");

    let strategy = ExponentialBackoff::new(
        Duration::from_millis(100),
        Duration::from_secs(10),
        Some(5),
    );

    let expected_delays = [100, 200, 400, 800, 1600];

    for (attempt, &expected_ms) in expected_delays.iter().enumerate() {
        let delay = strategy.next_delay(attempt).unwrap();
        verbose_println!("  Attempt {}: {:?}", attempt, delay);
        assert_eq!(
            delay.as_millis(),
            expected_ms,
            "Unexpected delay at attempt {}",
            attempt
        );
    }

    assert!(
        strategy.next_delay(5).is_none(),
        "Should return None after max attempts"
    );
}

#[test]
fn test_exponential_backoff_with_capping() {
    let strategy = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(2), None);

    let delays: Vec<u64> = (0..6)
        .map(|i| strategy.next_delay(i).unwrap().as_millis() as u64)
        .collect();

    verbose_println!("  Delays: {:?}", delays);
    assert_eq!(delays, vec![500, 1000, 2000, 2000, 2000, 2000]);
}

#[test]
fn test_exponential_backoff_overflow_safety() {
    let strategy = ExponentialBackoff::new(
        Duration::from_millis(100),
        Duration::from_secs(3600),
        None,
    );

    assert!(strategy.next_delay(30).unwrap() <= Duration::from_secs(3600));
    let _ = strategy.next_delay(100);
    let _ = strategy.next_delay(1000);
}

#[test]
fn test_fixed_delay_with_max_attempts() {
    let strategy = FixedDelay::new(Duration::from_millis(500), Some(3));

    assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(500)));
    assert!(strategy.next_delay(1).is_some());
    assert!(strategy.next_delay(2).is_some());
    assert!(strategy.next_delay(3).is_none());
    assert!(!strategy.should_reconnect(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_three_failed_attempts_go_fatal() {
    let _lock = GATEWAY_LOCK.lock().await;
    verbose_println!("Testing the retry cap against a listener that drops every connection...");

    let listener = DroppingListener::start().await;
    let mut client = builder()
        .url(listener.ws_url())
        .token(TEST_TOKEN)
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(20), Some(3)))
        .build()
        .await
        .unwrap();

    let fatal = wait_for_event(&client, WAIT, |e| matches!(e, ClientEvent::Fatal { .. })).await;
    match fatal {
        Some(ClientEvent::Fatal { attempts, reason }) => {
            verbose_println!("  fatal after {} attempts: {}", attempts, reason);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Fatal, got {:?}", other),
    }

    // The run task ends on its own and makes no further attempts
    tokio::time::timeout(WAIT, client.wait()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(listener.accepted(), 3);
    assert_eq!(client.state(), GatewayState::Fatal);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_hello_counts_as_failed_attempt() {
    let _lock = GATEWAY_LOCK.lock().await;
    verbose_println!("Testing HELLO timeout...");

    // No scripts: every connection is held open without a HELLO
    let server = MockGateway::start(Vec::new()).await;
    let client = builder()
        .url(server.ws_url())
        .token(TEST_TOKEN)
        .hello_timeout(Duration::from_millis(100))
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(10), Some(2)))
        .build()
        .await
        .unwrap();

    let fatal = wait_for_event(&client, WAIT, |e| matches!(e, ClientEvent::Fatal { .. })).await;
    assert!(matches!(fatal, Some(ClientEvent::Fatal { attempts: 2, .. })));
    assert_eq!(server.connections(), 2);

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_client_is_rejected() {
    let _lock = GATEWAY_LOCK.lock().await;

    let server = MockGateway::start(Vec::new()).await;
    let first = builder()
        .url(server.ws_url())
        .token(TEST_TOKEN)
        .build()
        .await
        .unwrap();

    let second = builder().url(server.ws_url()).token(TEST_TOKEN).build().await;
    assert!(matches!(second, Err(GatewayError::Configuration(_))));

    first.shutdown().await.unwrap();

    // The guard is released once the first client is gone
    let third = builder()
        .url(server.ws_url())
        .token(TEST_TOKEN)
        .build()
        .await
        .unwrap();
    third.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_empty_token_is_rejected_before_connecting() {
    let result = builder().url("ws://127.0.0.1:1").token("  ").build().await;
    assert!(matches!(result, Err(GatewayError::Configuration(_))));
}
