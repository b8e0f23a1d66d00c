use serde::{Deserialize, Serialize};

/// Kind of ledger entry. Drives the sign of the amount in the running balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    CheckIn,
    #[serde(other)]
    Unknown,
}

impl TransactionType {
    /// Signed multiplier applied to the amount when deriving the balance.
    pub fn sign(self) -> f64 {
        match self {
            TransactionType::Deposit | TransactionType::CheckIn => 1.0,
            TransactionType::Withdrawal => -1.0,
            TransactionType::Unknown => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::CheckIn => "CHECK_IN",
            TransactionType::Unknown => "UNKNOWN",
        }
    }
}

/// Settlement state of a transaction. Only `Pending` may ever change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Pending,
    Failed,
}

impl TxStatus {
    /// Map an explorer status string. Every abort/drop variant counts as failed.
    pub fn from_chain(status: &str) -> Self {
        match status {
            "success" => TxStatus::Success,
            "pending" => TxStatus::Pending,
            _ => TxStatus::Failed,
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, TxStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Success => "success",
            TxStatus::Pending => "pending",
            TxStatus::Failed => "failed",
        }
    }
}

/// A single ledger or chain entry, amounts in whole display tokens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "unknown_type")]
    pub kind: TransactionType,
    #[serde(default)]
    pub amount: f64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TxStatus>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_real_chain: bool,
}

fn unknown_type() -> TransactionType {
    TransactionType::Unknown
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == Some(TxStatus::Pending)
    }
}

/// The local wallet aggregate persisted by the ledger store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub last_check_in: Option<i64>,
    /// Newest first.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl WalletState {
    /// Recompute the balance from the ledger entries.
    ///
    /// Failed withdrawals still count: the optimistic deduction is never
    /// rolled back.
    pub fn derive_balance(&self) -> f64 {
        self.transactions
            .iter()
            .fold(0.0, |acc, tx| acc + tx.kind.sign() * tx.amount)
    }

    /// Number of check-in rewards recorded so far.
    pub fn check_in_streak(&self) -> usize {
        self.transactions
            .iter()
            .filter(|tx| tx.kind == TransactionType::CheckIn)
            .count()
    }

    /// Locally originated entries still awaiting chain confirmation.
    pub fn pending_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_pending())
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }
}

/// Why a ledger mutation was refused. The state is never touched on rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    CooldownActive,
    InsufficientBalance,
    InvalidRecipient,
    InvalidAmount,
}

impl Rejection {
    /// Stable machine-readable reason code.
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::CooldownActive => "cooldown_active",
            Rejection::InsufficientBalance => "insufficient_balance",
            Rejection::InvalidRecipient => "invalid_recipient",
            Rejection::InvalidAmount => "invalid_amount",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CooldownActive => write!(f, "check-in still in cooldown"),
            Self::InsufficientBalance => write!(f, "insufficient balance"),
            Self::InvalidRecipient => write!(f, "recipient address is required"),
            Self::InvalidAmount => write!(f, "amount must be a positive number"),
        }
    }
}

impl std::error::Error for Rejection {}
