//! Local wallet ledger: pure state transitions plus the persisting store.
//!
//! Every transition is "read current state, compute next state, persist next
//! state". The transition functions on [`WalletState`] never touch storage;
//! [`LedgerStore`] wraps them and commits after each successful change.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cooldown::{can_check_in, CHECK_IN_COOLDOWN_MS, DAILY_REWARD_AMOUNT};
use crate::storage::StateStore;
use crate::transfer::{abbreviate_address, validate_transfer};
use crate::wallet::{Rejection, Transaction, TransactionType, TxStatus, WalletState};

/// Storage key of the persisted wallet document. Bump the suffix on schema breaks.
pub const STORAGE_KEY: &str = "clarity_wallet_v1";

pub const CHECK_IN_DESCRIPTION: &str = "Daily Reward Mined";

/// How a transfer settles once accepted by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Purely local transfer, final immediately.
    Simulated { id: String },
    /// Already handed to the wallet connector; confirmed later by the chain.
    Broadcast { tx_id: String },
}

impl Settlement {
    fn id(&self) -> &str {
        match self {
            Settlement::Simulated { id } => id,
            Settlement::Broadcast { tx_id } => tx_id,
        }
    }

    fn initial_status(&self) -> TxStatus {
        match self {
            Settlement::Simulated { .. } => TxStatus::Success,
            Settlement::Broadcast { .. } => TxStatus::Pending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedCheckIn {
    pub transaction: Transaction,
    pub balance: f64,
    pub streak: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedTransfer {
    pub transaction: Transaction,
    pub balance: f64,
}

impl WalletState {
    /// Award the daily reward if the cooldown has elapsed.
    pub fn apply_check_in(
        &self,
        id: String,
        now: i64,
    ) -> Result<(WalletState, AppliedCheckIn), Rejection> {
        if !can_check_in(self.last_check_in, now, CHECK_IN_COOLDOWN_MS) {
            return Err(Rejection::CooldownActive);
        }

        let transaction = Transaction {
            id,
            kind: TransactionType::CheckIn,
            amount: DAILY_REWARD_AMOUNT,
            timestamp: now,
            description: CHECK_IN_DESCRIPTION.to_string(),
            recipient: None,
            sender: None,
            status: None,
            is_real_chain: false,
        };

        let mut next = self.clone();
        next.balance += DAILY_REWARD_AMOUNT;
        next.last_check_in = Some(now);
        next.transactions.insert(0, transaction.clone());

        let applied = AppliedCheckIn {
            transaction,
            balance: next.balance,
            streak: next.check_in_streak(),
        };
        Ok((next, applied))
    }

    /// Debit `amount` to `recipient` if the validator accepts it at the current balance.
    pub fn apply_transfer(
        &self,
        recipient: &str,
        amount: f64,
        settlement: Settlement,
        now: i64,
    ) -> Result<(WalletState, AppliedTransfer), Rejection> {
        validate_transfer(recipient, amount, self.balance)?;

        let recipient = recipient.trim();
        let transaction = Transaction {
            id: settlement.id().to_string(),
            kind: TransactionType::Withdrawal,
            amount,
            timestamp: now,
            description: format!("Sent to {}", abbreviate_address(recipient)),
            recipient: Some(recipient.to_string()),
            sender: None,
            status: Some(settlement.initial_status()),
            is_real_chain: false,
        };

        let mut next = self.clone();
        next.balance -= amount;
        next.transactions.insert(0, transaction.clone());

        let applied = AppliedTransfer {
            transaction,
            balance: next.balance,
        };
        Ok((next, applied))
    }

    /// Settle a pending entry. Entries that are missing or already final are left alone.
    pub fn mark_transaction_status(&self, id: &str, status: TxStatus) -> WalletState {
        let mut next = self.clone();
        if let Some(tx) = next
            .transactions
            .iter_mut()
            .find(|tx| tx.id == id && tx.is_pending())
        {
            tx.status = Some(status);
        }
        next
    }
}

/// Generate a local transaction id: `local-{millis}-{random}`.
pub fn generate_tx_id(now: i64) -> String {
    format!("local-{now}-{:08x}", rand::random::<u32>())
}

/// Why `load` fell back to the default state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefaultReason {
    /// Nothing persisted yet (fresh install).
    Missing,
    /// A document exists but could not be read or parsed.
    Corrupt(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    Loaded(WalletState),
    Defaulted(DefaultReason),
}

impl LoadOutcome {
    pub fn into_state(self) -> WalletState {
        match self {
            LoadOutcome::Loaded(state) => state,
            LoadOutcome::Defaulted(_) => WalletState::default(),
        }
    }
}

/// Read and parse the wallet document under `key`. Never fails.
pub fn load<S: StateStore>(store: &S, key: &str) -> LoadOutcome {
    let raw = match store.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return LoadOutcome::Defaulted(DefaultReason::Missing),
        Err(e) => {
            warn!("Wallet storage unreadable, starting from default: {e}");
            return LoadOutcome::Defaulted(DefaultReason::Corrupt(e.to_string()));
        }
    };
    match serde_json::from_str::<WalletState>(&raw) {
        Ok(state) => LoadOutcome::Loaded(state),
        Err(e) => {
            warn!("Wallet document under {key} is corrupt, starting from default: {e}");
            LoadOutcome::Defaulted(DefaultReason::Corrupt(e.to_string()))
        }
    }
}

/// Serialize and persist `state` under `key`. Failures are logged, not returned.
pub fn commit<S: StateStore>(store: &mut S, key: &str, state: &WalletState) {
    let data = match serde_json::to_string(state) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to serialize wallet state: {e}");
            return;
        }
    };
    if let Err(e) = store.write(key, &data) {
        error!("Failed to persist wallet state: {e}");
    }
}

/// Single source of truth for the local wallet.
///
/// Owns the in-memory state and its backing store; reads always reflect the
/// latest committed mutation.
pub struct LedgerStore<S> {
    store: S,
    key: String,
    state: WalletState,
    origin: LedgerOrigin,
}

/// How the current state was obtained at open time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerOrigin {
    Loaded,
    Fresh,
    Recovered(String),
}

impl<S: StateStore> LedgerStore<S> {
    /// Open the ledger under the default storage key.
    pub fn open(store: S) -> Self {
        Self::open_with_key(store, STORAGE_KEY)
    }

    pub fn open_with_key(store: S, key: &str) -> Self {
        let (state, origin) = match load(&store, key) {
            LoadOutcome::Loaded(state) => (state, LedgerOrigin::Loaded),
            LoadOutcome::Defaulted(DefaultReason::Missing) => {
                (WalletState::default(), LedgerOrigin::Fresh)
            }
            LoadOutcome::Defaulted(DefaultReason::Corrupt(reason)) => {
                (WalletState::default(), LedgerOrigin::Recovered(reason))
            }
        };
        debug!(
            "Opened wallet ledger {key}: {} transactions, balance {}",
            state.transactions.len(),
            state.balance
        );
        Self {
            store,
            key: key.to_string(),
            state,
            origin,
        }
    }

    pub fn state(&self) -> &WalletState {
        &self.state
    }

    pub fn origin(&self) -> &LedgerOrigin {
        &self.origin
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the current state and persist it.
    pub fn commit(&mut self, state: WalletState) {
        commit(&mut self.store, &self.key, &state);
        self.state = state;
    }

    pub fn can_check_in(&self, now: i64) -> bool {
        can_check_in(self.state.last_check_in, now, CHECK_IN_COOLDOWN_MS)
    }

    pub fn check_in(&mut self, now: i64) -> Result<AppliedCheckIn, Rejection> {
        let id = self.fresh_id(now);
        let (next, applied) = self.state.apply_check_in(id, now)?;
        self.commit(next);
        info!(
            "Check-in recorded: +{} (balance {})",
            applied.transaction.amount, applied.balance
        );
        Ok(applied)
    }

    /// Apply a purely local transfer, final immediately.
    pub fn transfer(
        &mut self,
        recipient: &str,
        amount: f64,
        now: i64,
    ) -> Result<AppliedTransfer, Rejection> {
        let id = self.fresh_id(now);
        self.settle_transfer(recipient, amount, Settlement::Simulated { id }, now)
    }

    /// Record a transfer the connector already broadcast, pending confirmation.
    ///
    /// A tx id already in the ledger is not recorded twice; the existing entry
    /// is returned unchanged.
    pub fn record_broadcast(
        &mut self,
        recipient: &str,
        amount: f64,
        tx_id: String,
        now: i64,
    ) -> Result<AppliedTransfer, Rejection> {
        if let Some(existing) = self.state.find(&tx_id) {
            warn!("Connector returned known tx id {tx_id}, not recording it again");
            return Ok(AppliedTransfer {
                transaction: existing.clone(),
                balance: self.state.balance,
            });
        }
        self.settle_transfer(recipient, amount, Settlement::Broadcast { tx_id }, now)
    }

    fn settle_transfer(
        &mut self,
        recipient: &str,
        amount: f64,
        settlement: Settlement,
        now: i64,
    ) -> Result<AppliedTransfer, Rejection> {
        let (next, applied) = self
            .state
            .apply_transfer(recipient, amount, settlement, now)?;
        self.commit(next);
        info!(
            "Transfer {} recorded: -{} to {} ({:?})",
            applied.transaction.id,
            amount,
            recipient.trim(),
            applied.transaction.status
        );
        Ok(applied)
    }

    /// Settle a pending entry. Returns whether anything changed.
    pub fn mark_status(&mut self, id: &str, status: TxStatus) -> bool {
        let next = self.state.mark_transaction_status(id, status);
        if next == self.state {
            debug!("Status update for {id} ignored (unknown or already final)");
            return false;
        }
        self.commit(next);
        info!("Transaction {id} is now {status:?}");
        true
    }

    /// Drop all local history and persist the zero state.
    pub fn reset(&mut self) {
        self.commit(WalletState::default());
        info!("Wallet ledger {} reset", self.key);
    }

    fn fresh_id(&self, now: i64) -> String {
        loop {
            let id = generate_tx_id(now);
            if self.state.find(&id).is_none() {
                return id;
            }
        }
    }
}
