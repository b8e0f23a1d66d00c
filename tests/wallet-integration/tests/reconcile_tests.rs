use clarity_common::wallet::{TransactionType, TxStatus};
use clarity_wallet_integration::harness::{TestHarness, T0};
use clarity_wallet_integration::{confirmed_transfer, FRIEND, ME};

#[tokio::test]
async fn chain_balance_never_feeds_the_ledger() {
    let mut h = TestHarness::setup();
    h.chain.set_balance(250_000_000);
    h.chain
        .push(confirmed_transfer("0xin", FRIEND, ME, 250_000_000, T0 / 1000 - 600));

    let (outcome, _) = h.refresh().await;
    assert!(!outcome.is_stale());
    assert_eq!(h.reconciler.snapshot().balance, 250.0);
    assert_eq!(h.state().balance, 0.0);
    assert!(h.state().transactions.is_empty());

    let incoming = &h.reconciler.snapshot().transactions[0];
    assert_eq!(incoming.kind, TransactionType::Deposit);
    assert_eq!(incoming.amount, 250.0);
    assert_eq!(incoming.description, "Received from SP3FBR...");
}

#[tokio::test]
async fn feed_interleaves_local_and_chain_newest_first() {
    let mut h = TestHarness::setup();
    h.chain
        .push(confirmed_transfer("0xold", FRIEND, ME, 1_000_000, T0 / 1000 - 60));
    h.chain
        .push(confirmed_transfer("0xnew", ME, FRIEND, 2_000_000, T0 / 1000 + 60));
    h.check_in().unwrap();
    h.refresh().await;

    let ids: Vec<String> = h.feed().into_iter().map(|tx| tx.id).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "0xnew");
    assert!(ids[1].starts_with("local-"));
    assert_eq!(ids[2], "0xold");
}

#[tokio::test]
async fn outage_serves_last_known_snapshot() {
    let mut h = TestHarness::setup();
    h.chain.set_balance(5_000_000);
    h.chain
        .push(confirmed_transfer("0xin", FRIEND, ME, 5_000_000, T0 / 1000));
    h.refresh().await;

    h.chain.set_online(false);
    h.chain.set_balance(1);
    h.advance(30_000);
    let (outcome, settled) = h.refresh().await;
    assert!(outcome.is_stale());
    assert!(settled.is_empty());
    assert_eq!(h.reconciler.snapshot().balance, 5.0);
    assert_eq!(h.reconciler.snapshot().fetched_at, Some(T0));
    assert!(h.reconciler.last_error().is_some());
    assert!(h.feed().iter().any(|tx| tx.id == "0xin"));

    h.chain.set_online(true);
    let (outcome, _) = h.refresh().await;
    assert!(!outcome.is_stale());
    assert_eq!(h.reconciler.last_error(), None);
    assert_eq!(h.reconciler.snapshot().fetched_at, Some(T0 + 30_000));
}

#[tokio::test]
async fn unconfirmed_chain_entries_stay_pending() {
    let mut h = TestHarness::setup();
    h.check_in().unwrap();
    let tx_id = h.broadcast(FRIEND, 1.0).await.unwrap().transaction.id;

    for _ in 0..3 {
        h.advance(1_000);
        let (_, settled) = h.refresh().await;
        assert!(settled.is_empty());
    }
    assert_eq!(h.state().find(&tx_id).unwrap().status, Some(TxStatus::Pending));
    assert_eq!(h.state().pending_transactions().count(), 1);
}
