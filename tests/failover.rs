mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use bdk_utxo::blockchain::{MultiProvider, ProviderError, UtxoProvider};
use bdk_utxo::Error;

use common::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_failover_reaches_working_provider() {
    init();
    let providers = vec![
        MockProvider::failing("a").into_arc(),
        MockProvider::failing("b").into_arc(),
        MockProvider::new("c").with_fee_rate(7).into_arc(),
    ];
    let multi = MultiProvider::new(providers.clone()).unwrap();

    let fee = multi.get_fee().await.unwrap();
    assert_eq!(fee.slow.as_sat_per_vb(), 7);
    assert_eq!(multi.current_index(), 2);
    for provider in &providers {
        assert_eq!(provider.calls(), 1);
    }
}

#[tokio::test]
async fn test_successful_provider_is_sticky() {
    init();
    let providers = vec![
        MockProvider::failing("a").into_arc(),
        MockProvider::new("b").into_arc(),
    ];
    let multi = MultiProvider::new(providers.clone()).unwrap();

    multi.get_unspent_outputs(ADDRESS).await.unwrap();
    multi.get_unspent_outputs(ADDRESS).await.unwrap();
    multi.get_fee().await.unwrap();

    assert_eq!(multi.current_index(), 1);
    assert_eq!(providers[0].calls(), 1);
    assert_eq!(providers[1].calls(), 3);
}

#[tokio::test]
async fn test_failover_wraps_around() {
    init();
    let providers = vec![
        MockProvider::new("a").into_arc(),
        MockProvider::failing("b").into_arc(),
    ];
    let multi = MultiProvider::new(providers.clone()).unwrap();

    // move the cursor to the failing provider
    providers[0]
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);
    providers[1]
        .fail
        .store(false, std::sync::atomic::Ordering::SeqCst);
    multi.get_fee().await.unwrap();
    assert_eq!(multi.current_index(), 1);

    providers[0]
        .fail
        .store(false, std::sync::atomic::Ordering::SeqCst);
    providers[1]
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);
    multi.get_fee().await.unwrap();
    assert_eq!(multi.current_index(), 0);
}

#[tokio::test]
async fn test_exhaustion_returns_last_error() {
    init();
    let providers = vec![
        MockProvider::failing("a").into_arc(),
        MockProvider::failing("b").into_arc(),
        MockProvider::failing("c").into_arc(),
    ];
    let multi = MultiProvider::new(providers.clone()).unwrap();

    let err = multi.send("00").await.unwrap_err();
    match err {
        Error::Provider(inner) => assert_matches!(
            *inner,
            ProviderError::HttpResponse { status: 503, ref message } if message == "c is down"
        ),
        other => panic!("unexpected error {:?}", other),
    }
    for provider in &providers {
        assert_eq!(provider.calls(), 1);
    }
}

#[tokio::test]
async fn test_cancellation_does_not_advance_cursor() {
    init();
    let providers = vec![
        MockProvider::hanging("a").into_arc(),
        MockProvider::new("b").into_arc(),
    ];
    let multi = MultiProvider::new(providers.clone()).unwrap();

    let result = tokio::time::timeout(Duration::from_millis(50), multi.get_fee()).await;
    assert!(result.is_err());
    assert_eq!(multi.current_index(), 0);
    assert_eq!(providers[0].calls(), 1);
    assert_eq!(providers[1].calls(), 0);
}

#[tokio::test]
async fn test_concurrent_failures_advance_cursor_once() {
    init();
    let providers = vec![
        MockProvider::failing("a").into_arc(),
        MockProvider::new("b").into_arc(),
        MockProvider::new("c").into_arc(),
    ];
    let multi = MultiProvider::new(providers.clone()).unwrap();

    let (first, second) = futures::join!(multi.get_fee(), multi.get_fee());
    first.unwrap();
    second.unwrap();

    assert_eq!(multi.current_index(), 1);
    assert_eq!(providers[0].calls(), 2);
    assert_eq!(providers[1].calls(), 2);
    assert_eq!(providers[2].calls(), 0);
}

#[test]
fn test_empty_provider_set() {
    assert_matches!(
        MultiProvider::<MockProvider>::new(vec![]),
        Err(Error::NoProviders)
    );
}
