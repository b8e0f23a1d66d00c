//! Shared wallet state for the CLI and the HTTP server.
//!
//! The ledger and the reconciler sit behind separate locks so a slow explorer
//! never blocks a check-in. Transfers are serialized by their own gate: the
//! ledger lock is released while the connector waits for approval.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use clarity_common::advisor::{analyze_activity, daily_wisdom, AnalysisTrigger};
use clarity_common::cooldown::{next_check_in_at, CHECK_IN_COOLDOWN_MS};
use clarity_common::ledger::{AppliedCheckIn, AppliedTransfer, LedgerOrigin, LedgerStore};
use clarity_common::reconcile::{fetch_snapshot, Reconciler, RefreshOutcome};
use clarity_common::session::{
    clear_session, load_session, save_session, settle_from_chain, submit_broadcast,
    SessionInfo, TransferError,
};
use clarity_common::storage::{FileStore, StorageError};
use clarity_common::units::micro_to_tokens;
use clarity_common::wallet::{Rejection, Transaction, TxStatus, WalletState};
use clarity_common::wallet_backend::ConnectorError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::gemini::GeminiAdvisor;
use crate::hiro::HiroExplorer;
use crate::relay::HttpConnector;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Rejected(Rejection),
    #[error(transparent)]
    Connector(ConnectorError),
    #[error("no wallet address connected")]
    NoAddress,
    #[error("no wallet connector configured (set --connector-url)")]
    NoConnector,
    #[error("a refresh is already in progress")]
    RefreshInProgress,
    #[error("wallet address changed during refresh")]
    AddressChanged,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<Rejection> for ActionError {
    fn from(r: Rejection) -> Self {
        ActionError::Rejected(r)
    }
}

impl From<TransferError> for ActionError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Rejected(r) => ActionError::Rejected(r),
            TransferError::Connector(c) => ActionError::Connector(c),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    #[serde(flatten)]
    pub state: WalletState,
    pub can_check_in: bool,
    pub next_check_in_at: Option<i64>,
    pub streak: usize,
    pub address: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub address: Option<String>,
    pub transactions: Vec<Transaction>,
    /// On-chain balance from the last successful refresh, display tokens.
    pub chain_balance: f64,
    pub local_balance: f64,
    pub fetched_at: Option<i64>,
    pub last_error: Option<String>,
    pub refreshing: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReport {
    #[serde(flatten)]
    pub applied: AppliedCheckIn,
    pub wisdom: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReport {
    #[serde(flatten)]
    pub applied: AppliedTransfer,
    pub analysis: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub outcome: RefreshOutcome,
    pub settled: Vec<(String, TxStatus)>,
}

/// Holds the `refreshing` flag up until dropped, even if the request is abandoned.
struct RefreshFlag<'a>(&'a AtomicBool);

impl<'a> RefreshFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct SessionSlot {
    store: FileStore,
    current: Option<SessionInfo>,
}

pub struct App {
    ledger: Mutex<LedgerStore<FileStore>>,
    reconciler: Mutex<Reconciler<HiroExplorer>>,
    session: Mutex<SessionSlot>,
    refreshing: AtomicBool,
    transfer_gate: Mutex<()>,
    /// `--address`/`CLARITY_ADDRESS`, takes precedence over the persisted session.
    address_override: Option<String>,
    relay: Option<HttpConnector>,
    advisor: GeminiAdvisor,
    trigger: AnalysisTrigger,
    clock: fn() -> i64,
}

impl App {
    pub fn new(
        store: FileStore,
        explorer: HiroExplorer,
        relay: Option<HttpConnector>,
        advisor: GeminiAdvisor,
        trigger: AnalysisTrigger,
        address_override: Option<String>,
    ) -> Self {
        let ledger = LedgerStore::open(store.clone());
        if let LedgerOrigin::Recovered(reason) = ledger.origin() {
            error!("Wallet data was unreadable and has been reset: {reason}");
        }
        let current = load_session(&store);
        Self {
            ledger: Mutex::new(ledger),
            reconciler: Mutex::new(Reconciler::new(explorer)),
            session: Mutex::new(SessionSlot { store, current }),
            refreshing: AtomicBool::new(false),
            transfer_gate: Mutex::new(()),
            address_override: address_override.filter(|a| !a.trim().is_empty()),
            relay,
            advisor,
            trigger,
            clock: now_millis,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub async fn address(&self) -> Option<String> {
        if let Some(address) = &self.address_override {
            return Some(address.clone());
        }
        self.session
            .lock()
            .await
            .current
            .as_ref()
            .map(|s| s.address.clone())
    }

    pub async fn wallet(&self) -> WalletView {
        let now = (self.clock)();
        let address = self.address().await;
        let ledger = self.ledger.lock().await;
        let state = ledger.state().clone();
        WalletView {
            can_check_in: ledger.can_check_in(now),
            next_check_in_at: next_check_in_at(state.last_check_in, CHECK_IN_COOLDOWN_MS),
            streak: state.check_in_streak(),
            state,
            address,
        }
    }

    pub async fn feed(&self) -> FeedView {
        let address = self.address().await;
        let (local, local_balance) = {
            let ledger = self.ledger.lock().await;
            (ledger.state().transactions.clone(), ledger.state().balance)
        };
        let reconciler = self.reconciler.lock().await;
        let snapshot = reconciler.snapshot();
        FeedView {
            address,
            transactions: reconciler.feed(&local),
            chain_balance: snapshot.balance,
            local_balance,
            fetched_at: snapshot.fetched_at,
            last_error: reconciler.last_error().map(str::to_string),
            refreshing: self.is_refreshing(),
        }
    }

    pub async fn check_in(&self) -> Result<CheckInReport, ActionError> {
        let applied = self.ledger.lock().await.check_in((self.clock)())?;
        let wisdom = daily_wisdom(&self.advisor, applied.streak).await;
        Ok(CheckInReport { applied, wisdom })
    }

    pub async fn transfer(
        &self,
        recipient: &str,
        amount: f64,
        broadcast: bool,
    ) -> Result<TransferReport, ActionError> {
        let _gate = self.transfer_gate.lock().await;
        let applied = if broadcast {
            let relay = self.relay.as_ref().ok_or(ActionError::NoConnector)?;
            let connector = relay.with_address(self.address().await);
            let balance = self.ledger.lock().await.state().balance;
            let receipt = submit_broadcast(&connector, recipient, amount, balance).await?;
            let sent = micro_to_tokens(receipt.amount_micro);
            self.ledger
                .lock()
                .await
                .record_broadcast(recipient, sent, receipt.tx_id, (self.clock)())
                .inspect_err(|e| error!("Broadcast succeeded but could not be recorded: {e}"))?
        } else {
            self.ledger
                .lock()
                .await
                .transfer(recipient, amount, (self.clock)())?
        };

        let analyze = self.trigger.should_analyze(&mut rand::thread_rng());
        let analysis = if analyze {
            let recent = self.ledger.lock().await.state().transactions.clone();
            Some(analyze_activity(&self.advisor, &recent, applied.balance).await)
        } else {
            None
        };
        Ok(TransferReport { applied, analysis })
    }

    /// Pull chain data for the current address and settle confirmed entries.
    ///
    /// The fetch runs without the reconciler lock so the feed stays readable
    /// (and reports `refreshing`) while it is in flight.
    pub async fn refresh(&self) -> Result<RefreshReport, ActionError> {
        let address = self.address().await.ok_or(ActionError::NoAddress)?;
        let flag = RefreshFlag::raise(&self.refreshing).ok_or(ActionError::RefreshInProgress)?;

        let (explorer, limit) = {
            let reconciler = self.reconciler.lock().await;
            (reconciler.explorer().clone(), reconciler.limit())
        };
        let fetched = fetch_snapshot(&explorer, &address, limit, (self.clock)()).await;

        let mut reconciler = self.reconciler.lock().await;
        // A disconnect or reconnect while the fetch was in flight wins.
        if self.address().await.as_deref() != Some(address.as_str()) {
            info!("Discarding chain data for {address}, no longer the wallet address");
            return Err(ActionError::AddressChanged);
        }
        let outcome = reconciler.apply(&address, fetched);
        drop(flag);

        let settled = if outcome.is_stale() {
            Vec::new()
        } else {
            settle_from_chain(
                &mut *self.ledger.lock().await,
                &reconciler.snapshot().transactions,
            )
        };
        Ok(RefreshReport { outcome, settled })
    }

    /// Commentary on the local history, on demand.
    pub async fn advise(&self) -> String {
        let (recent, balance) = {
            let ledger = self.ledger.lock().await;
            (ledger.state().transactions.clone(), ledger.state().balance)
        };
        analyze_activity(&self.advisor, &recent, balance).await
    }

    pub async fn connect(&self, address: &str) -> Result<SessionInfo, ActionError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ActionError::NoAddress);
        }
        let session = SessionInfo {
            address: address.to_string(),
            connected_at: (self.clock)(),
        };
        let mut slot = self.session.lock().await;
        save_session(&mut slot.store, &session)?;
        slot.current = Some(session.clone());
        Ok(session)
    }

    pub async fn disconnect(&self) -> Result<(), ActionError> {
        {
            let mut slot = self.session.lock().await;
            clear_session(&mut slot.store)?;
            slot.current = None;
        }
        self.reconciler.lock().await.disconnect();
        Ok(())
    }

    pub async fn reset(&self) {
        let _gate = self.transfer_gate.lock().await;
        self.ledger.lock().await.reset();
        info!("Local wallet history cleared");
    }
}
