//! Reconciliation of remote chain data with the local ledger.
//!
//! The chain snapshot is authoritative for anything it contains; local entries
//! fill in whatever the chain has not indexed yet. Nothing here mutates the
//! ledger directly: [`confirm_pending`] returns the next state for the caller
//! to commit.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::explorer::{classify, ExplorerApi, ExplorerError, RECENT_TX_LIMIT};
use crate::units::micro_to_tokens;
use crate::wallet::{Transaction, TxStatus, WalletState};

/// Last successfully fetched view of an address.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChainSnapshot {
    pub address: Option<String>,
    /// Display tokens.
    pub balance: f64,
    pub transactions: Vec<Transaction>,
    /// Millis of the last successful refresh, `None` before the first one.
    pub fetched_at: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Updated { transactions: usize },
    /// Fetch failed; the previous snapshot is still being served.
    Stale { error: String },
}

impl RefreshOutcome {
    pub fn is_stale(&self) -> bool {
        matches!(self, RefreshOutcome::Stale { .. })
    }
}

/// Combine remote entries with local ones into one display feed.
///
/// A local entry is dropped once a remote entry carries the same id. The result
/// is ordered by descending timestamp; ties keep remote entries ahead of local
/// ones and otherwise preserve input order.
pub fn merge(remote: &[Transaction], local: &[Transaction]) -> Vec<Transaction> {
    let remote_ids: HashSet<&str> = remote.iter().map(|tx| tx.id.as_str()).collect();
    let mut feed: Vec<Transaction> = remote
        .iter()
        .chain(local.iter().filter(|tx| !remote_ids.contains(tx.id.as_str())))
        .cloned()
        .collect();
    feed.sort_by_key(|tx| Reverse(tx.timestamp));
    feed
}

/// Settle local pending entries the chain now reports on.
///
/// Returns the next state and the `(id, status)` transitions applied. A remote
/// status of `pending` leaves the local entry pending.
pub fn confirm_pending(
    state: &WalletState,
    remote: &[Transaction],
) -> (WalletState, Vec<(String, TxStatus)>) {
    let mut next = state.clone();
    let mut applied = Vec::new();
    let pending: Vec<String> = state.pending_transactions().map(|tx| tx.id.clone()).collect();
    for id in pending {
        let Some(status) = remote
            .iter()
            .find(|tx| tx.id == id)
            .and_then(|tx| tx.status)
            .filter(|status| status.is_final())
        else {
            continue;
        };
        next = next.mark_transaction_status(&id, status);
        applied.push((id, status));
    }
    (next, applied)
}

/// Fetch balance and recent history for `address` as one snapshot.
pub async fn fetch_snapshot<E: ExplorerApi>(
    explorer: &E,
    address: &str,
    limit: usize,
    now: i64,
) -> Result<ChainSnapshot, ExplorerError> {
    let micro = explorer.balance(address).await?;
    let raw = explorer.transactions(address, limit).await?;
    let transactions = raw
        .iter()
        .take(limit)
        .map(|record| classify(record, address, now))
        .collect();
    Ok(ChainSnapshot {
        address: Some(address.to_string()),
        balance: micro_to_tokens(micro),
        transactions,
        fetched_at: Some(now),
    })
}

/// Holds the latest chain snapshot and refreshes it on demand.
pub struct Reconciler<E> {
    explorer: E,
    limit: usize,
    snapshot: ChainSnapshot,
    last_error: Option<String>,
}

impl<E: ExplorerApi> Reconciler<E> {
    pub fn new(explorer: E) -> Self {
        Self::with_limit(explorer, RECENT_TX_LIMIT)
    }

    pub fn with_limit(explorer: E, limit: usize) -> Self {
        Self {
            explorer,
            limit,
            snapshot: ChainSnapshot::default(),
            last_error: None,
        }
    }

    pub fn explorer(&self) -> &E {
        &self.explorer
    }

    pub fn snapshot(&self) -> &ChainSnapshot {
        &self.snapshot
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Pull fresh data for `address`.
    ///
    /// On failure the previous snapshot for the same address is kept. Switching
    /// to another address starts from an empty snapshot.
    pub async fn refresh(&mut self, address: &str, now: i64) -> RefreshOutcome {
        let fetched = fetch_snapshot(&self.explorer, address, self.limit, now).await;
        self.apply(address, fetched)
    }

    /// Install the result of a fetch made elsewhere (e.g. without holding a lock
    /// on this reconciler).
    pub fn apply(
        &mut self,
        address: &str,
        fetched: Result<ChainSnapshot, ExplorerError>,
    ) -> RefreshOutcome {
        if self.snapshot.address.as_deref() != Some(address) {
            debug!("Reconciler switching to address {address}");
            self.snapshot = ChainSnapshot {
                address: Some(address.to_string()),
                ..ChainSnapshot::default()
            };
        }

        match fetched {
            Ok(snapshot) => {
                let transactions = snapshot.transactions.len();
                info!(
                    "Refreshed {address}: balance {}, {transactions} transactions",
                    snapshot.balance
                );
                self.snapshot = snapshot;
                self.last_error = None;
                RefreshOutcome::Updated { transactions }
            }
            Err(e) => {
                warn!("Refresh of {address} failed, keeping last known data: {e}");
                let error = e.to_string();
                self.last_error = Some(error.clone());
                RefreshOutcome::Stale { error }
            }
        }
    }

    /// Forget the current address (wallet disconnected).
    pub fn disconnect(&mut self) {
        self.snapshot = ChainSnapshot::default();
        self.last_error = None;
    }

    /// Display feed: chain entries merged with the given local entries.
    pub fn feed(&self, local: &[Transaction]) -> Vec<Transaction> {
        merge(&self.snapshot.transactions, local)
    }
}
