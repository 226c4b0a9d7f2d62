mod common;

use assert_matches::assert_matches;
use bdk_utxo::bitcoin::OutPoint;
use bdk_utxo::blockchain::{ChainConfig, ProviderError};
use bdk_utxo::*;

use common::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_get_info_fetches_each_pending_tx_once() {
    init();
    let provider = MockProvider::new("a")
        .with_utxos(vec![
            utxo(1, 0, 40_000, Some(700_000)),
            utxo(2, 0, 10_000, None),
            utxo(2, 1, 15_000, None),
            utxo(3, 0, 5_000, None),
        ])
        .with_transaction(pending_tx(2, &[OutPoint::new(txid(9), 0)], 25_000))
        .with_transaction(pending_tx(3, &[OutPoint::new(txid(8), 0)], 5_000))
        .into_arc();
    let facade = UtxoFacade::new(Chain::Bitcoin, provider.clone());

    let info = facade.get_info(ADDRESS).await.unwrap();

    assert_eq!(info.outputs.len(), 4);
    assert_eq!(info.balance(), 70_000);
    let pending = info.pending.iter().map(|tx| tx.txid).collect::<Vec<_>>();
    assert_eq!(pending, vec![txid(2), txid(3)]);
    let mut requested = provider.tx_requests.lock().unwrap().clone();
    requested.sort();
    assert_eq!(requested, vec![txid(2), txid(3)]);
}

#[tokio::test]
async fn test_get_info_is_all_or_nothing() {
    init();
    let provider = MockProvider::new("a")
        .with_utxos(vec![utxo(2, 0, 10_000, None), utxo(3, 0, 5_000, None)])
        .with_transaction(pending_tx(2, &[], 10_000))
        .into_arc();
    let facade = UtxoFacade::new(Chain::Bitcoin, provider);

    let err = facade.get_info(ADDRESS).await.unwrap_err();
    match err {
        Error::Provider(inner) => {
            assert_matches!(*inner, ProviderError::TransactionNotFound(t) if t == txid(3))
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_build_pre_image_skips_outputs_spent_by_pending() {
    init();
    let spent = utxo(1, 0, 50_000, Some(700_000));
    let change = utxo(2, 1, 30_000, None);
    let provider = MockProvider::new("a")
        .with_utxos(vec![spent.clone(), change.clone()])
        .with_transaction(pending_tx(2, &[spent.outpoint], 30_000))
        .into_arc();
    let facade = UtxoFacade::new(Chain::Bitcoin, provider);

    let info = facade.get_info(ADDRESS).await.unwrap();
    assert_eq!(info.spendable_outputs(), vec![change.clone()]);

    let pre_image = facade
        .build_pre_image(
            ADDRESS,
            &p2pkh_script(1),
            &PreImageDestination::new(20_000, p2pkh_script(2)),
            FeePolicy::Calculate(FeeRate::from_sat_per_vb(2)),
        )
        .await
        .unwrap();

    assert_eq!(pre_image.selected_outputs, vec![change]);
    assert_eq!(pre_image.estimated_size, 226);
    assert_eq!(pre_image.fee, 452);
    assert_eq!(pre_image.change_amount, 30_000 - 20_000 - 452);
}

#[tokio::test]
async fn test_build_pre_image_insufficient_funds() {
    init();
    let provider = MockProvider::new("a")
        .with_utxos(vec![utxo(1, 0, 5_000, Some(700_000))])
        .into_arc();
    let facade = UtxoFacade::new(Chain::Litecoin, provider);

    let result = facade
        .build_pre_image(
            ADDRESS,
            &p2pkh_script(1),
            &PreImageDestination::new(20_000, p2pkh_script(2)),
            FeePolicy::Exact(1_000),
        )
        .await;
    assert_matches!(
        result,
        Err(Error::InsufficientFunds {
            needed: 20_000,
            available: 5_000
        })
    );
}

#[tokio::test]
async fn test_fee_and_send_fail_over() {
    init();
    let providers = vec![
        MockProvider::failing("a").into_arc(),
        MockProvider::new("b")
            .with_fee_rate(10)
            .with_broadcast_txid(txid(7))
            .into_arc(),
    ];
    let facade = UtxoFacade::with_providers(Chain::Dogecoin, providers.clone()).unwrap();

    let fee = facade.get_fee().await.unwrap();
    assert_eq!(fee.slow.as_sat_per_vb(), 10);
    assert_eq!(fee.market.as_sat_per_vb(), 12);
    assert_eq!(fee.priority.as_sat_per_vb(), 15);

    assert_eq!(facade.send("0100000001").await.unwrap(), txid(7));
    assert_eq!(facade.provider().current_index(), 1);
    assert_eq!(providers[0].calls(), 1);
    assert_eq!(providers[1].calls(), 2);
}

#[test]
fn test_facade_from_config() {
    let config: ChainConfig = serde_json::from_str(
        r#"{
            "chain": "dash",
            "providers": [
                { "type": "insight", "base_url": "https://insight.dash.org/insight-api", "timeout": 5 },
                { "type": "esplora", "base_url": "https://blockstream.info/api" }
            ]
        }"#,
    )
    .unwrap();

    let facade = UtxoFacade::from_config(&config).unwrap();
    assert_eq!(facade.chain(), Chain::Dash);
    assert_eq!(facade.network().p2pkh_prefix, 0x4c);
    assert_eq!(facade.provider().providers().len(), 2);
}
