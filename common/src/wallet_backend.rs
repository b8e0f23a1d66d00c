use serde::{Deserialize, Serialize};

/// Receipt returned once the connector has broadcast a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    /// Chain transaction id; becomes the id of the pending ledger entry.
    pub tx_id: String,
    /// Amount handed to the network, in minor units.
    pub amount_micro: u64,
    pub recipient: String,
}

/// Errors from the wallet connector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorError {
    /// The user dismissed the approval prompt.
    Cancelled,
    /// No session: the wallet is not connected.
    NotConnected,
    BroadcastFailed(String),
    Unavailable(String),
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "transfer cancelled by user"),
            Self::NotConnected => write!(f, "wallet not connected"),
            Self::BroadcastFailed(msg) => write!(f, "broadcast failed: {msg}"),
            Self::Unavailable(msg) => write!(f, "connector unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ConnectorError {}

/// Abstraction over the external wallet that signs and broadcasts transfers.
///
/// The ledger never holds this handle; callers validate locally, hand the
/// transfer over, and record the outcome through the ledger store.
#[allow(async_fn_in_trait)]
pub trait WalletConnector {
    /// Address of the connected account, if any.
    fn address(&self) -> Option<&str>;

    /// Ask the wallet to sign and broadcast `amount_micro` to `recipient`.
    async fn submit_transfer(
        &self,
        recipient: &str,
        amount_micro: u64,
    ) -> Result<BroadcastReceipt, ConnectorError>;

    /// Human-readable connector name (e.g. "http-relay").
    fn connector_name(&self) -> &str;
}
