//! Mock implementations of the ledger and model seams for testing.

use crate::error::{AiError, LedgerError};
use crate::ledger::{
    ClientOptions, EntityId, LedgerClient, LedgerConnector, LedgerNetwork, LedgerQuery,
    LedgerTransaction, Operator, TransactionReceipt,
};
use crate::llm::{ModelClient, ModelType};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Mock ledger
// =============================================================================

/// In-memory ledger that records submitted transactions.
pub struct MockLedger {
    network: LedgerNetwork,
    operator: Option<Operator>,
    responses: Vec<(LedgerQuery, Value)>,
    submit_error: Option<String>,
    submitted: Mutex<Vec<LedgerTransaction>>,
    prepared: Mutex<Vec<LedgerTransaction>>,
    next_entity: Mutex<u64>,
}

impl MockLedger {
    /// Account id of the default operator
    pub const OPERATOR_ACCOUNT: &'static str = "0.0.1001";

    /// Hex key of the default operator
    pub const OPERATOR_KEY: &'static str =
        "1f2e3d4c5b6a79881f2e3d4c5b6a79881f2e3d4c5b6a79881f2e3d4c5b6a7988";

    pub fn new() -> Self {
        let operator = Operator::new(Self::OPERATOR_ACCOUNT, Self::OPERATOR_KEY).ok();
        Self::with_operator(operator)
    }

    /// Ledger with a specific operator, or none
    pub fn with_operator(operator: Option<Operator>) -> Self {
        Self {
            network: LedgerNetwork::Testnet,
            operator,
            responses: Vec::new(),
            submit_error: None,
            submitted: Mutex::new(Vec::new()),
            prepared: Mutex::new(Vec::new()),
            next_entity: Mutex::new(5000),
        }
    }

    /// Answer `query` with `response`
    pub fn with_query_response(mut self, query: LedgerQuery, response: Value) -> Self {
        self.responses.push((query, response));
        self
    }

    /// Reject every submission with the given status
    pub fn failing_submit(mut self, status: &str) -> Self {
        self.submit_error = Some(status.to_string());
        self
    }

    /// Transactions submitted so far
    pub fn submitted(&self) -> Vec<LedgerTransaction> {
        lock(&self.submitted).clone()
    }

    /// Transactions frozen without submission
    pub fn prepared(&self) -> Vec<LedgerTransaction> {
        lock(&self.prepared).clone()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn network(&self) -> LedgerNetwork {
        self.network
    }

    fn operator(&self) -> Option<&Operator> {
        self.operator.as_ref()
    }

    async fn query(&self, query: LedgerQuery) -> Result<Value, LedgerError> {
        self.responses
            .iter()
            .find(|(q, _)| *q == query)
            .map(|(_, response)| response.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("{:?}", query)))
    }

    async fn submit(&self, transaction: LedgerTransaction) -> Result<TransactionReceipt, LedgerError> {
        if let Some(status) = &self.submit_error {
            return Err(LedgerError::Rejected(status.clone()));
        }

        let mut submitted = lock(&self.submitted);
        let sequence = submitted.len() as u64 + 1;
        let transaction_id = format!("{}@1700000000.{:09}", Self::OPERATOR_ACCOUNT, sequence);

        let (entity_id, topic_sequence_number) = match &transaction {
            LedgerTransaction::CreateFungibleToken(_)
            | LedgerTransaction::CreateNonFungibleToken(_)
            | LedgerTransaction::CreateTopic { .. } => {
                let mut next = lock(&self.next_entity);
                *next += 1;
                let id = EntityId {
                    shard: 0,
                    realm: 0,
                    num: *next,
                };
                (Some(id), None)
            }
            LedgerTransaction::SubmitTopicMessage { .. } => (None, Some(sequence)),
            LedgerTransaction::TransferHbar { .. } => (None, None),
        };

        submitted.push(transaction);
        Ok(TransactionReceipt {
            status: "SUCCESS".to_string(),
            transaction_id,
            entity_id,
            topic_sequence_number,
        })
    }

    async fn prepare(&self, transaction: LedgerTransaction) -> Result<Vec<u8>, LedgerError> {
        if let Some(status) = &self.submit_error {
            return Err(LedgerError::Rejected(status.clone()));
        }
        let bytes = serde_json::to_vec(&transaction).map_err(|e| LedgerError::Parse(e.to_string()))?;
        lock(&self.prepared).push(transaction);
        Ok(bytes)
    }
}

/// Connector handing out [`MockLedger`]s and remembering the options it saw.
#[derive(Default)]
pub struct MockConnector {
    seen: Mutex<Vec<ClientOptions>>,
    fail: Option<String>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose every connection attempt fails
    pub fn failing(message: &str) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail: Some(message.to_string()),
        }
    }

    /// Options passed to `connect`, in call order
    pub fn connections(&self) -> Vec<ClientOptions> {
        lock(&self.seen).clone()
    }
}

impl LedgerConnector for MockConnector {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        lock(&self.seen).push(options.clone());
        if let Some(message) = &self.fail {
            return Err(LedgerError::Network(message.clone()));
        }
        Ok(Arc::new(MockLedger::with_operator(Some(options.operator.clone()))))
    }
}

// =============================================================================
// Scripted model
// =============================================================================

/// Model that replays queued responses and records prompts.
pub struct ScriptedModel {
    responses: Mutex<Vec<String>>,
    prompts: Mutex<Vec<(ModelType, String)>>,
    failure: Option<String>,
}

impl ScriptedModel {
    /// Responses are returned in order; the last one repeats once the queue runs dry
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Model whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<(ModelType, String)> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, model: ModelType, prompt: &str) -> Result<String, AiError> {
        lock(&self.prompts).push((model, prompt.to_string()));
        if let Some(message) = &self.failure {
            return Err(AiError::Unavailable(message.clone()));
        }

        let mut responses = lock(&self.responses);
        match responses.len() {
            0 => Ok(String::new()),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.remove(0)),
        }
    }
}
