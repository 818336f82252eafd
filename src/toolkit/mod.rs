//! Hedera toolkit
//!
//! Tools grouped into capability modules. Each tool declares its
//! parameters and runs against a [`LedgerClient`].

mod account;
mod consensus;
mod hts;
mod queries;

pub use account::TransferHbarTool;
pub use consensus::{CreateTopicTool, SubmitTopicMessageTool};
pub use hts::{CreateFungibleTokenTool, CreateNonFungibleTokenTool};
pub use queries::{
    GetAccountQueryTool, GetAccountTokenBalancesQueryTool, GetHbarBalanceQueryTool,
    GetTokenInfoQueryTool, GetTopicMessagesQueryTool,
};

use crate::error::ToolError;
use crate::ledger::{AccountId, LedgerClient, LedgerTransaction, TransactionReceipt, TINYBARS_PER_HBAR};
use crate::schema::ParameterSchema;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// A unit of ledger functionality
#[async_trait]
pub trait Tool: Send + Sync {
    /// Method identifier, e.g. `create_fungible_token_tool`
    fn method(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ParameterSchema;

    /// Run the tool with validated parameters
    async fn execute(
        &self,
        client: &dyn LedgerClient,
        context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError>;
}

/// Group of related tools that can be enabled together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityModule {
    CoreHts,
    CoreAccount,
    CoreConsensus,
    CoreQueries,
}

impl CapabilityModule {
    pub const ALL: [CapabilityModule; 4] = [
        CapabilityModule::CoreHts,
        CapabilityModule::CoreQueries,
        CapabilityModule::CoreAccount,
        CapabilityModule::CoreConsensus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CapabilityModule::CoreHts => "core-hts",
            CapabilityModule::CoreAccount => "core-account",
            CapabilityModule::CoreConsensus => "core-consensus",
            CapabilityModule::CoreQueries => "core-queries",
        }
    }

    /// Tools provided by this module
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        match self {
            CapabilityModule::CoreHts => vec![
                Arc::new(CreateFungibleTokenTool::new()),
                Arc::new(CreateNonFungibleTokenTool::new()),
            ],
            CapabilityModule::CoreAccount => vec![Arc::new(TransferHbarTool::new())],
            CapabilityModule::CoreConsensus => vec![
                Arc::new(CreateTopicTool::new()),
                Arc::new(SubmitTopicMessageTool::new()),
            ],
            CapabilityModule::CoreQueries => vec![
                Arc::new(GetHbarBalanceQueryTool::new()),
                Arc::new(GetAccountQueryTool::new()),
                Arc::new(GetAccountTokenBalancesQueryTool::new()),
                Arc::new(GetTokenInfoQueryTool::new()),
                Arc::new(GetTopicMessagesQueryTool::new()),
            ],
        }
    }
}

impl FromStr for CapabilityModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CapabilityModule::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| format!("unknown capability module '{}'", s))
    }
}

impl fmt::Display for CapabilityModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How state-changing tools treat their transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentMode {
    /// Sign and submit through the client
    #[default]
    Autonomous,
    /// Return the prepared transaction without submitting it
    ReturnBytes,
}

impl FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "autonomous" => Ok(AgentMode::Autonomous),
            "return-bytes" | "returnbytes" | "return_bytes" => Ok(AgentMode::ReturnBytes),
            other => Err(format!("unknown agent mode '{}'", other)),
        }
    }
}

/// Context shared by every tool invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    pub mode: AgentMode,
    /// Account used when a tool's account parameter is omitted
    pub account_id: Option<AccountId>,
}

/// Which modules (and optionally which tools) to expose
#[derive(Debug, Clone, PartialEq)]
pub struct ToolkitConfiguration {
    pub plugins: Vec<CapabilityModule>,
    /// Allow-list of tool methods; empty means all
    pub tools: Vec<String>,
    pub context: ToolContext,
}

/// Resolves the tools of a configuration
pub struct ToolDiscovery {
    modules: Vec<CapabilityModule>,
}

impl ToolDiscovery {
    pub fn from_configuration(configuration: &ToolkitConfiguration) -> Self {
        Self {
            modules: configuration.plugins.clone(),
        }
    }

    /// All tools of the configured modules, deduplicated by method
    pub fn all_tools(
        &self,
        _context: &ToolContext,
        configuration: &ToolkitConfiguration,
    ) -> Vec<Arc<dyn Tool>> {
        let mut seen = HashSet::new();
        let tools: Vec<Arc<dyn Tool>> = self
            .modules
            .iter()
            .flat_map(|m| m.tools())
            .filter(|t| {
                configuration.tools.is_empty()
                    || configuration.tools.iter().any(|allowed| allowed == t.method())
            })
            .filter(|t| seen.insert(t.method().to_string()))
            .collect();

        debug!(
            "Discovered {} tools from {} modules",
            tools.len(),
            self.modules.len()
        );
        tools
    }
}

/// Deserialize validated parameters into a typed struct
pub(crate) fn parse_params<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(params)).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Explicit account id, else the context account, else the operator
pub(crate) fn resolve_account(
    explicit: Option<&str>,
    client: &dyn LedgerClient,
    context: &ToolContext,
) -> Result<AccountId, ToolError> {
    if let Some(id) = explicit {
        return Ok(id.parse()?);
    }
    context
        .account_id
        .or_else(|| client.operator().map(|op| op.account_id))
        .ok_or_else(|| {
            ToolError::InvalidParams("no account id given and no operator configured".to_string())
        })
}

/// Result of a state-changing tool
pub(crate) enum Outcome {
    Submitted(TransactionReceipt),
    Prepared(Value),
}

impl Outcome {
    pub(crate) fn raw(&self) -> Value {
        match self {
            Outcome::Submitted(receipt) => json!(receipt),
            Outcome::Prepared(prepared) => prepared.clone(),
        }
    }
}

/// Submit the transaction, or prepare it when the agent only returns bytes
pub(crate) async fn submit_or_prepare(
    client: &dyn LedgerClient,
    context: &ToolContext,
    transaction: LedgerTransaction,
) -> Result<Outcome, ToolError> {
    match context.mode {
        AgentMode::Autonomous => {
            debug!("Submitting {}", transaction.kind());
            Ok(Outcome::Submitted(client.submit(transaction).await?))
        }
        AgentMode::ReturnBytes => {
            debug!("Preparing {}", transaction.kind());
            let bytes = client.prepare(transaction.clone()).await?;
            Ok(Outcome::Prepared(json!({
                "bytes": STANDARD.encode(bytes),
                "transaction": transaction,
            })))
        }
    }
}

/// Standard tool output shape
pub(crate) fn tool_output(raw: Value, human_message: String) -> Value {
    json!({
        "raw": raw,
        "humanMessage": human_message,
    })
}

/// Format tinybars as an hbar amount without trailing zeros
pub(crate) fn format_hbar(tinybars: i64) -> String {
    let sign = if tinybars < 0 { "-" } else { "" };
    let abs = tinybars.unsigned_abs();
    let whole = abs / TINYBARS_PER_HBAR as u64;
    let frac = abs % TINYBARS_PER_HBAR as u64;
    if frac == 0 {
        format!("{}{}", sign, whole)
    } else {
        let frac = format!("{:08}", frac);
        format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
    }
}
