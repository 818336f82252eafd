//! Mirror node REST client
//!
//! Answers ledger queries from the public mirror node. Mirror nodes are
//! read-only, so transaction submission is rejected.

use super::{
    EntityId, LedgerClient, LedgerNetwork, LedgerQuery, LedgerTransaction, Operator,
    TransactionReceipt,
};
use crate::error::LedgerError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger client backed by the mirror node REST API
pub struct MirrorNodeClient {
    http: reqwest::Client,
    base_url: String,
    network: LedgerNetwork,
    operator: Option<Operator>,
}

impl MirrorNodeClient {
    /// Create a client for `network`, optionally overriding the mirror node URL
    pub fn new(
        network: LedgerNetwork,
        base_url: Option<String>,
        operator: Option<Operator>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LedgerError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| network.mirror_node_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            base_url,
            network,
            operator,
        })
    }

    /// GET a mirror node path and decode the JSON body
    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}/api/v1/{}", self.base_url, path);
        debug!("Mirror node request: {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(e.to_string()))
    }

    async fn hbar_balance(&self, account_id: EntityId) -> Result<Value> {
        let account = self.get_json(&format!("accounts/{}", account_id)).await?;
        let tinybars = account["balance"]["balance"]
            .as_i64()
            .ok_or_else(|| LedgerError::Parse("account has no balance field".to_string()))?;

        Ok(json!({
            "accountId": account_id.to_string(),
            "tinybars": tinybars,
            "timestamp": account["balance"]["timestamp"],
        }))
    }

    async fn topic_messages(&self, topic_id: EntityId, limit: u32) -> Result<Value> {
        let body = self
            .get_json(&format!("topics/{}/messages?limit={}&order=desc", topic_id, limit))
            .await?;

        let messages: Vec<Value> = body["messages"]
            .as_array()
            .map(|list| list.iter().map(decode_topic_message).collect())
            .unwrap_or_default();

        Ok(json!({
            "topicId": topic_id.to_string(),
            "messages": messages,
        }))
    }
}

/// Decode the base64 payload of a mirror node topic message
fn decode_topic_message(raw: &Value) -> Value {
    let message = raw["message"]
        .as_str()
        .and_then(|b64| STANDARD.decode(b64).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default();

    json!({
        "sequenceNumber": raw["sequence_number"],
        "consensusTimestamp": raw["consensus_timestamp"],
        "message": message,
    })
}

#[async_trait]
impl LedgerClient for MirrorNodeClient {
    fn network(&self) -> LedgerNetwork {
        self.network
    }

    fn operator(&self) -> Option<&Operator> {
        self.operator.as_ref()
    }

    async fn query(&self, query: LedgerQuery) -> Result<Value> {
        match query {
            LedgerQuery::AccountInfo(id) => self.get_json(&format!("accounts/{}", id)).await,
            LedgerQuery::HbarBalance(id) => self.hbar_balance(id).await,
            LedgerQuery::TokenBalances(id) => {
                self.get_json(&format!("accounts/{}/tokens?limit=100", id)).await
            }
            LedgerQuery::TokenInfo(id) => self.get_json(&format!("tokens/{}", id)).await,
            LedgerQuery::TopicMessages { topic_id, limit } => {
                self.topic_messages(topic_id, limit).await
            }
        }
    }

    async fn submit(&self, transaction: LedgerTransaction) -> Result<TransactionReceipt> {
        Err(LedgerError::Unsupported(format!(
            "{} cannot be submitted through the read-only mirror node ({})",
            transaction.kind(),
            self.network
        )))
    }

    async fn prepare(&self, transaction: LedgerTransaction) -> Result<Vec<u8>> {
        Err(LedgerError::Unsupported(format!(
            "{} cannot be prepared without a transaction builder ({})",
            transaction.kind(),
            self.network
        )))
    }
}
