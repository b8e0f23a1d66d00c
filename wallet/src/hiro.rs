//! Hiro Stacks API client.

use std::time::Duration;

use clarity_common::explorer::{
    BalanceResponse, ExplorerApi, ExplorerError, RawTransaction, TransactionPage,
};
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct HiroExplorer {
    client: reqwest::Client,
    base_url: String,
}

impl HiroExplorer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExplorerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExplorerError::Request(format!("HTTP client error: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ExplorerError> {
        debug!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExplorerError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ExplorerError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ExplorerError::Decode(e.to_string()))
    }
}

impl ExplorerApi for HiroExplorer {
    async fn balance(&self, address: &str) -> Result<u64, ExplorerError> {
        let url = format!("{}/extended/v1/address/{address}/balances", self.base_url);
        let body: BalanceResponse = self.get_json(url).await?;
        body.micro()
    }

    async fn transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<RawTransaction>, ExplorerError> {
        let url = format!(
            "{}/extended/v1/address/{address}/transactions?limit={limit}",
            self.base_url
        );
        let page: TransactionPage = self.get_json(url).await?;
        Ok(page.results)
    }
}
