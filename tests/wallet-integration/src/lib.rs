//! Scripted collaborators for end-to-end wallet scenarios.
//!
//! [`FakeChain`] stands in for the network: the explorer reads from it and the
//! connector writes broadcasts into its mempool, so a test can drive a
//! transfer from submission through confirmation without any I/O.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use clarity_common::explorer::{ExplorerApi, ExplorerError, RawTokenTransfer, RawTransaction};
use clarity_common::wallet_backend::{BroadcastReceipt, ConnectorError, WalletConnector};
use tracing_subscriber::EnvFilter;

pub mod harness;

pub const ME: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
pub const FRIEND: &str = "SP3FBR2AGK5H9QBDH3EEN6DF8EK8JY7RX8QJ5SVTE";

/// Route `tracing` output through the test writer. Safe to call repeatedly.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
pub struct ChainState {
    pub balance_micro: u64,
    /// Newest first, as the explorer returns them.
    pub transactions: Vec<RawTransaction>,
    pub online: bool,
}

/// Shared in-memory chain.
#[derive(Clone, Debug)]
pub struct FakeChain {
    inner: Arc<Mutex<ChainState>>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChainState {
                online: true,
                ..ChainState::default()
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ChainState> {
        self.inner.lock().unwrap()
    }

    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    pub fn set_balance(&self, micro: u64) {
        self.state().balance_micro = micro;
    }

    /// Push a record on top of the history.
    pub fn push(&self, tx: RawTransaction) {
        self.state().transactions.insert(0, tx);
    }

    /// Mine a mempool entry with the given final status.
    pub fn settle(&self, tx_id: &str, status: &str, burn_block_time: i64) {
        let mut state = self.state();
        if let Some(tx) = state.transactions.iter_mut().find(|tx| tx.tx_id == tx_id) {
            tx.tx_status = status.to_string();
            tx.burn_block_time = Some(burn_block_time);
        }
    }

    pub fn explorer(&self) -> ChainExplorer {
        ChainExplorer {
            chain: self.clone(),
        }
    }

    pub fn connector(&self, address: Option<&str>) -> ChainConnector {
        ChainConnector {
            chain: self.clone(),
            address: address.map(str::to_string),
            scripted: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            replayed_id: Mutex::new(None),
        }
    }
}

/// Explorer reading from a [`FakeChain`].
pub struct ChainExplorer {
    chain: FakeChain,
}

impl ExplorerApi for ChainExplorer {
    async fn balance(&self, _address: &str) -> Result<u64, ExplorerError> {
        let state = self.chain.state();
        if !state.online {
            return Err(ExplorerError::Request("connection refused".into()));
        }
        Ok(state.balance_micro)
    }

    async fn transactions(
        &self,
        _address: &str,
        limit: usize,
    ) -> Result<Vec<RawTransaction>, ExplorerError> {
        let state = self.chain.state();
        if !state.online {
            return Err(ExplorerError::Request("connection refused".into()));
        }
        Ok(state.transactions.iter().take(limit).cloned().collect())
    }
}

/// Connector that "broadcasts" into the fake chain's mempool.
///
/// Outcomes queued with [`ChainConnector::script`] are consumed first; with an
/// empty queue every submission is approved.
pub struct ChainConnector {
    chain: FakeChain,
    address: Option<String>,
    scripted: Mutex<VecDeque<ConnectorError>>,
    submissions: Mutex<Vec<(String, u64)>>,
    replayed_id: Mutex<Option<String>>,
}

impl ChainConnector {
    pub fn script(&self, outcome: ConnectorError) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    /// Answer every later approved submission with `tx_id`, as a relay
    /// replaying a cached response would.
    pub fn replay_tx_id(&self, tx_id: &str) {
        *self.replayed_id.lock().unwrap() = Some(tx_id.to_string());
    }

    /// `(recipient, amount_micro)` of every submission that reached the connector.
    pub fn submissions(&self) -> Vec<(String, u64)> {
        self.submissions.lock().unwrap().clone()
    }
}

impl WalletConnector for ChainConnector {
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    async fn submit_transfer(
        &self,
        recipient: &str,
        amount_micro: u64,
    ) -> Result<BroadcastReceipt, ConnectorError> {
        let sender = self.address.clone().ok_or(ConnectorError::NotConnected)?;
        self.submissions
            .lock()
            .unwrap()
            .push((recipient.to_string(), amount_micro));
        if let Some(outcome) = self.scripted.lock().unwrap().pop_front() {
            return Err(outcome);
        }
        if let Some(tx_id) = self.replayed_id.lock().unwrap().clone() {
            return Ok(BroadcastReceipt {
                tx_id,
                amount_micro,
                recipient: recipient.to_string(),
            });
        }
        let tx_id = format!("0x{:064x}", rand::random::<u128>());
        self.chain.push(pending_transfer(&tx_id, &sender, recipient, amount_micro));
        Ok(BroadcastReceipt {
            tx_id,
            amount_micro,
            recipient: recipient.to_string(),
        })
    }

    fn connector_name(&self) -> &str {
        "fake-chain"
    }
}

/// Unconfirmed STX transfer as the explorer reports it.
pub fn pending_transfer(tx_id: &str, sender: &str, recipient: &str, micro: u64) -> RawTransaction {
    RawTransaction {
        tx_id: tx_id.to_string(),
        tx_type: "token_transfer".into(),
        tx_status: "pending".into(),
        sender_address: sender.to_string(),
        burn_block_time: None,
        token_transfer: Some(RawTokenTransfer {
            recipient_address: recipient.to_string(),
            amount: serde_json::Value::String(micro.to_string()),
            memo: None,
        }),
        contract_call: None,
    }
}

/// Confirmed STX transfer.
pub fn confirmed_transfer(
    tx_id: &str,
    sender: &str,
    recipient: &str,
    micro: u64,
    burn_block_time: i64,
) -> RawTransaction {
    RawTransaction {
        tx_status: "success".into(),
        burn_block_time: Some(burn_block_time),
        ..pending_transfer(tx_id, sender, recipient, micro)
    }
}
