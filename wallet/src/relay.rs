//! Wallet connector that forwards transfers to an HTTP signing relay.
//!
//! The relay owns the keys and the approval prompt. It answers
//! `POST {url}` with `{"txid": "..."}` on broadcast, HTTP 499/409 or
//! `{"cancelled": true}` when the user declined, and any other error status
//! when the broadcast failed.

use std::time::Duration;

use clarity_common::wallet_backend::{BroadcastReceipt, ConnectorError, WalletConnector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Non-standard "client closed request" status used by relays for a declined prompt.
const STATUS_CANCELLED: u16 = 499;
const STATUS_CONFLICT: u16 = 409;

#[derive(Clone, Debug)]
pub struct HttpConnector {
    client: reqwest::Client,
    url: String,
    address: Option<String>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    sender: Option<&'a str>,
    recipient: &'a str,
    /// Minor units.
    amount: u64,
}

#[derive(Deserialize, Default)]
struct SubmitResponse {
    #[serde(default, alias = "tx_id", alias = "txId")]
    txid: Option<String>,
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    error: Option<String>,
}

impl HttpConnector {
    pub fn new(
        url: &str,
        address: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::Unavailable(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
            address,
        })
    }

    /// Same relay, acting for another connected account.
    pub fn with_address(&self, address: Option<String>) -> Self {
        Self {
            client: self.client.clone(),
            url: self.url.clone(),
            address,
        }
    }
}

impl WalletConnector for HttpConnector {
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    async fn submit_transfer(
        &self,
        recipient: &str,
        amount_micro: u64,
    ) -> Result<BroadcastReceipt, ConnectorError> {
        let sender = self.address.as_deref().ok_or(ConnectorError::NotConnected)?;
        let resp = self
            .client
            .post(&self.url)
            .json(&SubmitRequest {
                sender: Some(sender),
                recipient,
                amount: amount_micro,
            })
            .send()
            .await
            .map_err(|e| ConnectorError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if matches!(status.as_u16(), STATUS_CANCELLED | STATUS_CONFLICT) {
            info!("Relay reports transfer to {recipient} cancelled");
            return Err(ConnectorError::Cancelled);
        }
        let body: SubmitResponse = resp.json().await.unwrap_or_default();
        if body.cancelled {
            info!("Relay reports transfer to {recipient} cancelled");
            return Err(ConnectorError::Cancelled);
        }
        if !status.is_success() {
            let reason = body.error.unwrap_or_else(|| format!("HTTP {status}"));
            warn!("Relay broadcast failed: {reason}");
            return Err(ConnectorError::BroadcastFailed(reason));
        }
        match body.txid.filter(|id| !id.is_empty()) {
            Some(tx_id) => Ok(BroadcastReceipt {
                tx_id,
                amount_micro,
                recipient: recipient.to_string(),
            }),
            None => Err(ConnectorError::BroadcastFailed(
                "relay returned no transaction id".to_string(),
            )),
        }
    }

    fn connector_name(&self) -> &str {
        "http-relay"
    }
}
