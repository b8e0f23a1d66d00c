use clarity_common::cooldown::CHECK_IN_COOLDOWN_MS;
use clarity_common::ledger::{load, LedgerOrigin, LoadOutcome, STORAGE_KEY};
use clarity_common::storage::{FileStore, StateStore};
use clarity_common::wallet::{Rejection, TransactionType, TxStatus, WalletState};
use clarity_wallet_integration::harness::{TestHarness, T0};

/// Check-in, immediate retry refused, then eligible again one millisecond
/// after the cooldown.
#[test]
fn check_in_respects_cooldown() {
    let mut h = TestHarness::setup();
    assert_eq!(h.state(), &WalletState::default());

    let first = h.check_in().unwrap();
    assert_eq!(first.balance, 10.0);
    assert_eq!(h.state().last_check_in, Some(T0));
    assert_eq!(h.state().transactions.len(), 1);
    assert_eq!(h.state().transactions[0].kind, TransactionType::CheckIn);
    assert_eq!(h.state().transactions[0].amount, 10.0);

    let before = h.state().clone();
    assert_eq!(h.check_in().unwrap_err(), Rejection::CooldownActive);
    assert_eq!(h.state(), &before);

    h.advance(CHECK_IN_COOLDOWN_MS);
    assert_eq!(h.check_in().unwrap_err(), Rejection::CooldownActive);

    h.advance(1);
    let second = h.check_in().unwrap();
    assert_eq!(second.balance, 20.0);
    assert_eq!(second.streak, 2);
    assert_eq!(h.state().last_check_in, Some(T0 + CHECK_IN_COOLDOWN_MS + 1));
}

/// Overdraft refused without side effects, then a valid transfer debits.
#[test]
fn insufficient_then_valid_transfer() {
    let mut h = TestHarness::with_state(WalletState {
        balance: 100.0,
        ..WalletState::default()
    });

    assert_eq!(
        h.transfer("SP123", 150.0).unwrap_err(),
        Rejection::InsufficientBalance
    );
    assert_eq!(h.state().balance, 100.0);
    assert!(h.state().transactions.is_empty());

    let applied = h.transfer("SP123", 40.0).unwrap();
    assert_eq!(applied.balance, 60.0);
    assert_eq!(h.state().balance, 60.0);
    assert_eq!(h.state().transactions.len(), 1);
    let tx = &h.state().transactions[0];
    assert_eq!(tx.kind, TransactionType::Withdrawal);
    assert_eq!(tx.amount, 40.0);
    assert_eq!(tx.recipient.as_deref(), Some("SP123"));
    assert_eq!(tx.status, Some(TxStatus::Success));
    assert_eq!(tx.description, "Sent to SP123...");
}

#[test]
fn validation_rules_report_first_failure() {
    let mut h = TestHarness::with_state(WalletState {
        balance: 5.0,
        ..WalletState::default()
    });
    assert_eq!(h.transfer("   ", -1.0).unwrap_err(), Rejection::InvalidRecipient);
    assert_eq!(h.transfer("SP1", 0.0).unwrap_err(), Rejection::InvalidAmount);
    assert_eq!(h.transfer("SP1", f64::NAN).unwrap_err(), Rejection::InvalidAmount);
    assert_eq!(h.transfer("SP1", 5.01).unwrap_err(), Rejection::InsufficientBalance);
    assert_eq!(h.transfer("SP1", 5.0).unwrap().balance, 0.0);
}

#[test]
fn state_survives_restart() {
    let mut h = TestHarness::setup();
    h.check_in().unwrap();
    h.transfer("SPFRIEND", 2.5).unwrap();
    let before = h.state().clone();

    h.reopen();
    assert_eq!(h.ledger.origin(), &LedgerOrigin::Loaded);
    assert_eq!(h.state(), &before);
    assert_eq!(h.state().derive_balance(), 7.5);
}

#[test]
fn corrupt_document_recovers_to_default() {
    let mut h = TestHarness::setup();
    h.check_in().unwrap();
    std::fs::write(
        h.dir.path().join(format!("{STORAGE_KEY}.json")),
        "{\"balance\": \"lots\"",
    )
    .unwrap();

    h.reopen();
    assert!(matches!(h.ledger.origin(), LedgerOrigin::Recovered(_)));
    assert_eq!(h.state(), &WalletState::default());
    // A fresh check-in is allowed and overwrites the corrupt document.
    h.check_in().unwrap();
    h.reopen();
    assert_eq!(h.ledger.origin(), &LedgerOrigin::Loaded);
}

#[test]
fn commit_of_load_is_idempotent_on_disk() {
    let mut h = TestHarness::setup();
    h.check_in().unwrap();
    h.transfer("SPFRIEND", 1.0).unwrap();

    let mut store = FileStore::new(h.dir.path());
    let original = store.read(STORAGE_KEY).unwrap().unwrap();
    for _ in 0..2 {
        let LoadOutcome::Loaded(state) = load(&store, STORAGE_KEY) else {
            panic!("expected a stored document");
        };
        clarity_common::ledger::commit(&mut store, STORAGE_KEY, &state);
    }
    assert_eq!(store.read(STORAGE_KEY).unwrap().unwrap(), original);
}

#[test]
fn unknown_fields_and_kinds_are_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path());
    store
        .write(
            STORAGE_KEY,
            r#"{"balance": 3, "theme": "dark", "transactions": [
                {"id": "a", "type": "AIRDROP", "amount": 1, "timestamp": 5, "description": "?"}
            ]}"#,
        )
        .unwrap();
    let state = load(&store, STORAGE_KEY).into_state();
    assert_eq!(state.balance, 3.0);
    assert_eq!(state.last_check_in, None);
    assert_eq!(state.transactions[0].kind, TransactionType::Unknown);
}
