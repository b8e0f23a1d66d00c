//! Wallet connection session and the connector-facing transfer flow.
//!
//! The session only records which address is connected; keys never leave the
//! external wallet. A broadcast transfer is validated against the ledger
//! balance, handed to the connector, and recorded only once the connector
//! returns a broadcast id.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::{AppliedTransfer, LedgerStore};
use crate::reconcile::confirm_pending;
use crate::storage::{StateStore, StorageError};
use crate::transfer::validate_transfer;
use crate::units::{micro_to_tokens, tokens_to_micro};
use crate::wallet::{Rejection, Transaction, TxStatus};
use crate::wallet_backend::{BroadcastReceipt, ConnectorError, WalletConnector};

pub const SESSION_KEY: &str = "clarity_session_v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub address: String,
    /// Millis since epoch.
    pub connected_at: i64,
}

/// Read the persisted session. A missing or unreadable document means "not connected".
pub fn load_session<S: StateStore>(store: &S) -> Option<SessionInfo> {
    let raw = match store.read(SESSION_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!("Session storage unreadable: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("Session document is corrupt, treating as disconnected: {e}");
            None
        }
    }
}

pub fn save_session<S: StateStore>(store: &mut S, session: &SessionInfo) -> Result<(), StorageError> {
    let data =
        serde_json::to_string(session).map_err(|e| StorageError::Encode(e.to_string()))?;
    store.write(SESSION_KEY, &data)?;
    info!("Connected {}", session.address);
    Ok(())
}

pub fn clear_session<S: StateStore>(store: &mut S) -> Result<(), StorageError> {
    store.remove(SESSION_KEY)?;
    info!("Session cleared");
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Validate a transfer against `balance` and ask the connector to broadcast it.
///
/// Nothing is recorded here. On `Ok` the caller records the receipt with
/// [`LedgerStore::record_broadcast`]; on any error the ledger stays as it was.
pub async fn submit_broadcast<C: WalletConnector>(
    connector: &C,
    recipient: &str,
    amount: f64,
    balance: f64,
) -> Result<BroadcastReceipt, TransferError> {
    validate_transfer(recipient, amount, balance)?;
    // The chain only moves whole minor units.
    let amount_micro = tokens_to_micro(amount);
    if amount_micro == 0 {
        return Err(Rejection::InvalidAmount.into());
    }
    if micro_to_tokens(amount_micro) > balance {
        return Err(Rejection::InsufficientBalance.into());
    }
    let recipient = recipient.trim();
    match connector.submit_transfer(recipient, amount_micro).await {
        Ok(receipt) => {
            info!(
                "{} broadcast {} to {recipient}",
                connector.connector_name(),
                receipt.tx_id
            );
            Ok(receipt)
        }
        Err(ConnectorError::Cancelled) => {
            info!("Transfer to {recipient} cancelled, ledger untouched");
            Err(ConnectorError::Cancelled.into())
        }
        Err(e) => {
            warn!("Transfer to {recipient} not broadcast: {e}");
            Err(e.into())
        }
    }
}

/// Validate, broadcast and record in one go, for callers that own the ledger
/// exclusively (CLI, tests). The HTTP server splits these steps so the ledger
/// lock is not held while the connector waits on the user.
pub async fn broadcast_transfer<S: StateStore, C: WalletConnector>(
    ledger: &mut LedgerStore<S>,
    connector: &C,
    recipient: &str,
    amount: f64,
    now: i64,
) -> Result<AppliedTransfer, TransferError> {
    let receipt = submit_broadcast(connector, recipient, amount, ledger.state().balance).await?;
    let sent = micro_to_tokens(receipt.amount_micro);
    Ok(ledger.record_broadcast(recipient, sent, receipt.tx_id, now)?)
}

/// Settle pending ledger entries from freshly fetched chain entries and commit
/// if anything changed.
pub fn settle_from_chain<S: StateStore>(
    ledger: &mut LedgerStore<S>,
    remote: &[Transaction],
) -> Vec<(String, TxStatus)> {
    let (next, applied) = confirm_pending(ledger.state(), remote);
    if !applied.is_empty() {
        for (id, status) in &applied {
            info!("Chain settled {id} as {status:?}");
        }
        ledger.commit(next);
    }
    applied
}
