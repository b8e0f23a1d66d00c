use tempfile::TempDir;

use clarity_common::ledger::{AppliedCheckIn, AppliedTransfer, LedgerStore};
use clarity_common::reconcile::{Reconciler, RefreshOutcome};
use clarity_common::session::{broadcast_transfer, settle_from_chain, TransferError};
use clarity_common::storage::FileStore;
use clarity_common::wallet::{Rejection, Transaction, TxStatus, WalletState};

use crate::{init_tracing, ChainConnector, ChainExplorer, FakeChain, ME};

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000_000;

/// One wallet on disk wired to a fake chain, with a manual clock.
pub struct TestHarness {
    pub dir: TempDir,
    pub chain: FakeChain,
    pub ledger: LedgerStore<FileStore>,
    pub reconciler: Reconciler<ChainExplorer>,
    pub connector: ChainConnector,
    pub now: i64,
}

impl TestHarness {
    pub fn setup() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let chain = FakeChain::new();
        Self {
            ledger: LedgerStore::open(FileStore::new(dir.path())),
            reconciler: Reconciler::new(chain.explorer()),
            connector: chain.connector(Some(ME)),
            chain,
            dir,
            now: T0,
        }
    }

    /// Start from a given ledger state, persisted.
    pub fn with_state(state: WalletState) -> Self {
        let mut h = Self::setup();
        h.ledger.commit(state);
        h
    }

    pub fn advance(&mut self, ms: i64) {
        self.now += ms;
    }

    pub fn state(&self) -> &WalletState {
        self.ledger.state()
    }

    pub fn check_in(&mut self) -> Result<AppliedCheckIn, Rejection> {
        self.ledger.check_in(self.now)
    }

    pub fn transfer(&mut self, recipient: &str, amount: f64) -> Result<AppliedTransfer, Rejection> {
        self.ledger.transfer(recipient, amount, self.now)
    }

    pub async fn broadcast(
        &mut self,
        recipient: &str,
        amount: f64,
    ) -> Result<AppliedTransfer, TransferError> {
        broadcast_transfer(&mut self.ledger, &self.connector, recipient, amount, self.now).await
    }

    /// Refresh the chain view and settle pending entries, as the front end does.
    pub async fn refresh(&mut self) -> (RefreshOutcome, Vec<(String, TxStatus)>) {
        let outcome = self.reconciler.refresh(ME, self.now).await;
        let settled = if outcome.is_stale() {
            Vec::new()
        } else {
            settle_from_chain(&mut self.ledger, &self.reconciler.snapshot().transactions)
        };
        (outcome, settled)
    }

    pub fn feed(&self) -> Vec<Transaction> {
        self.reconciler.feed(&self.ledger.state().transactions)
    }

    /// Reopen the ledger from disk, as after a restart.
    pub fn reopen(&mut self) {
        self.ledger = LedgerStore::open(FileStore::new(self.dir.path()));
    }
}
