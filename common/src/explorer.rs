//! Block-explorer read model.
//!
//! Raw records follow the Hiro Stacks API shape
//! (`/extended/v1/address/{addr}/transactions`). Classification into ledger
//! entries is pure so it can be tested without a network.

use serde::{Deserialize, Serialize};

use crate::transfer::abbreviate_address;
use crate::units::{micro_to_tokens, parse_micro};
use crate::wallet::{Transaction, TransactionType, TxStatus};

/// Most recent transactions pulled per refresh.
pub const RECENT_TX_LIMIT: usize = 10;

/// Default explorer base URL (Stacks mainnet).
pub const DEFAULT_EXPLORER_URL: &str = "https://api.mainnet.hiro.so";

#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("explorer request failed: {0}")]
    Request(String),
    #[error("explorer returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("explorer response could not be parsed: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawTokenTransfer {
    #[serde(default)]
    pub recipient_address: String,
    /// Minor units, usually encoded as a decimal string.
    #[serde(default)]
    pub amount: serde_json::Value,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawContractCall {
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub function_name: String,
}

/// One explorer transaction record, restricted to the fields the ledger reads.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    pub tx_id: String,
    #[serde(default)]
    pub tx_type: String,
    #[serde(default)]
    pub tx_status: String,
    #[serde(default)]
    pub sender_address: String,
    /// Seconds since epoch; absent while unconfirmed.
    #[serde(default)]
    pub burn_block_time: Option<i64>,
    #[serde(default)]
    pub token_transfer: Option<RawTokenTransfer>,
    #[serde(default)]
    pub contract_call: Option<RawContractCall>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub results: Vec<RawTransaction>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StxBalance {
    #[serde(default)]
    pub balance: serde_json::Value,
}

/// `/extended/v1/address/{addr}/balances` response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(default)]
    pub stx: StxBalance,
}

impl BalanceResponse {
    pub fn micro(&self) -> Result<u64, ExplorerError> {
        parse_micro(&self.stx.balance)
            .ok_or_else(|| ExplorerError::Decode(format!("bad stx.balance {}", self.stx.balance)))
    }
}

/// Read access to a block explorer.
#[allow(async_fn_in_trait)]
pub trait ExplorerApi {
    /// Current balance of `address` in minor units.
    async fn balance(&self, address: &str) -> Result<u64, ExplorerError>;

    /// Up to `limit` most recent transactions touching `address`, newest first.
    async fn transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<RawTransaction>, ExplorerError>;
}

/// Turn a raw explorer record into a display-unit ledger entry.
///
/// `fetched_at` (ms) stands in for the confirmation time of unconfirmed records.
pub fn classify(raw: &RawTransaction, address: &str, fetched_at: i64) -> Transaction {
    let is_sender = raw.sender_address == address;
    let mut amount = 0.0;
    let mut kind = TransactionType::Unknown;
    let mut recipient = None;

    let description = match raw.tx_type.as_str() {
        "token_transfer" => {
            let transfer = raw.token_transfer.clone().unwrap_or_default();
            amount = parse_micro(&transfer.amount).map(micro_to_tokens).unwrap_or(0.0);
            let description = if is_sender {
                kind = TransactionType::Withdrawal;
                format!("Sent to {}", abbreviate_address(&transfer.recipient_address))
            } else {
                kind = TransactionType::Deposit;
                format!("Received from {}", abbreviate_address(&raw.sender_address))
            };
            if !transfer.recipient_address.is_empty() {
                recipient = Some(transfer.recipient_address);
            }
            description
        }
        "contract_call" => {
            let function = raw
                .contract_call
                .as_ref()
                .map(|c| c.function_name.as_str())
                .unwrap_or_default();
            format!("Contract Call: {function}")
        }
        "coinbase" => {
            kind = TransactionType::Deposit;
            "Mining Reward".to_string()
        }
        _ => "Blockchain Interaction".to_string(),
    };

    Transaction {
        id: raw.tx_id.clone(),
        kind,
        amount,
        timestamp: raw
            .burn_block_time
            .map(|secs| secs.saturating_mul(1000))
            .unwrap_or(fetched_at),
        description,
        recipient,
        sender: (!raw.sender_address.is_empty()).then(|| raw.sender_address.clone()),
        status: Some(TxStatus::from_chain(&raw.tx_status)),
        is_real_chain: true,
    }
}
