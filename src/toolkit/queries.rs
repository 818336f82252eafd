//! Read-only query tools

use super::{format_hbar, parse_params, resolve_account, tool_output, Tool, ToolContext};
use crate::error::ToolError;
use crate::ledger::{LedgerClient, LedgerQuery, TokenId, TopicId};
use crate::schema::{FieldKind, FieldSpec, ParameterSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountParams {
    account_id: Option<String>,
}

fn account_schema(required: bool) -> ParameterSchema {
    let kind = if required {
        FieldKind::String
    } else {
        FieldKind::optional(FieldKind::String)
    };
    ParameterSchema::object(vec![FieldSpec::new(
        "accountId",
        kind,
        "Account id (e.g. \"0.0.1234\"), defaults to the operator",
    )])
}

/// Queries the hbar balance of an account
pub struct GetHbarBalanceQueryTool {
    parameters: ParameterSchema,
}

impl GetHbarBalanceQueryTool {
    pub fn new() -> Self {
        Self {
            parameters: account_schema(false),
        }
    }
}

impl Default for GetHbarBalanceQueryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetHbarBalanceQueryTool {
    fn method(&self) -> &str {
        "get_hbar_balance_query_tool"
    }

    fn name(&self) -> &str {
        "Get HBAR Balance"
    }

    fn description(&self) -> &str {
        "Return the HBAR balance of an account"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: AccountParams = parse_params(params)?;
        let account_id = resolve_account(params.account_id.as_deref(), client, context)?;

        let raw = client.query(LedgerQuery::HbarBalance(account_id)).await?;
        let tinybars = raw["tinybars"].as_i64().unwrap_or_default();
        let message = format!(
            "Account {} has a balance of {} HBAR",
            account_id,
            format_hbar(tinybars)
        );

        Ok(tool_output(raw, message))
    }
}

/// Queries account details
pub struct GetAccountQueryTool {
    parameters: ParameterSchema,
}

impl GetAccountQueryTool {
    pub fn new() -> Self {
        Self {
            parameters: account_schema(true),
        }
    }
}

impl Default for GetAccountQueryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetAccountQueryTool {
    fn method(&self) -> &str {
        "get_account_query_tool"
    }

    fn name(&self) -> &str {
        "Get Account"
    }

    fn description(&self) -> &str {
        "Return the details of an account: key, balance, memo, EVM address"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: AccountParams = parse_params(params)?;
        let account_id = resolve_account(params.account_id.as_deref(), client, context)?;

        let raw = client.query(LedgerQuery::AccountInfo(account_id)).await?;
        let mut lines = vec![format!("Details for account {}:", account_id)];
        if let Some(tinybars) = raw["balance"]["balance"].as_i64() {
            lines.push(format!("- Balance: {} HBAR", format_hbar(tinybars)));
        }
        if let Some(key) = raw["key"]["key"].as_str() {
            lines.push(format!("- Public key: {}", key));
        }
        if let Some(evm) = raw["evm_address"].as_str() {
            lines.push(format!("- EVM address: {}", evm));
        }
        if let Some(memo) = raw["memo"].as_str().filter(|m| !m.is_empty()) {
            lines.push(format!("- Memo: {}", memo));
        }

        Ok(tool_output(raw, lines.join("\n")))
    }
}

/// Queries the token balances of an account
pub struct GetAccountTokenBalancesQueryTool {
    parameters: ParameterSchema,
}

impl GetAccountTokenBalancesQueryTool {
    pub fn new() -> Self {
        Self {
            parameters: account_schema(false),
        }
    }
}

impl Default for GetAccountTokenBalancesQueryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetAccountTokenBalancesQueryTool {
    fn method(&self) -> &str {
        "get_account_token_balances_query_tool"
    }

    fn name(&self) -> &str {
        "Get Account Token Balances"
    }

    fn description(&self) -> &str {
        "Return the token balances held by an account"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: AccountParams = parse_params(params)?;
        let account_id = resolve_account(params.account_id.as_deref(), client, context)?;

        let raw = client.query(LedgerQuery::TokenBalances(account_id)).await?;
        let tokens = raw["tokens"].as_array().cloned().unwrap_or_default();

        let message = if tokens.is_empty() {
            format!("Account {} holds no tokens", account_id)
        } else {
            let lines: Vec<String> = tokens
                .iter()
                .map(|t| {
                    format!(
                        "- {}: {} (decimals: {})",
                        t["token_id"].as_str().unwrap_or("?"),
                        t["balance"],
                        t["decimals"]
                    )
                })
                .collect();
            format!("Token balances for account {}:\n{}", account_id, lines.join("\n"))
        };

        Ok(tool_output(raw, message))
    }
}

/// Queries token details
pub struct GetTokenInfoQueryTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfoParams {
    token_id: String,
}

impl GetTokenInfoQueryTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![FieldSpec::new(
                "tokenId",
                FieldKind::String,
                "Token id (e.g. \"0.0.5678\")",
            )]),
        }
    }
}

impl Default for GetTokenInfoQueryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetTokenInfoQueryTool {
    fn method(&self) -> &str {
        "get_token_info_query_tool"
    }

    fn name(&self) -> &str {
        "Get Token Info"
    }

    fn description(&self) -> &str {
        "Return the details of a token: name, symbol, supply, treasury"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        _context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: TokenInfoParams = parse_params(params)?;
        let token_id: TokenId = params.token_id.parse()?;

        let raw = client.query(LedgerQuery::TokenInfo(token_id)).await?;
        let field = |name: &str| match &raw[name] {
            Value::String(s) => s.clone(),
            Value::Null => "n/a".to_string(),
            other => other.to_string(),
        };
        let message = format!(
            "Token {}:\n- Name: {}\n- Symbol: {}\n- Type: {}\n- Decimals: {}\n- Total supply: {}\n- Max supply: {}\n- Treasury: {}",
            token_id,
            field("name"),
            field("symbol"),
            field("type"),
            field("decimals"),
            field("total_supply"),
            field("max_supply"),
            field("treasury_account_id"),
        );

        Ok(tool_output(raw, message))
    }
}

/// Queries recent messages of a topic
pub struct GetTopicMessagesQueryTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicMessagesParams {
    topic_id: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    10
}

impl GetTopicMessagesQueryTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![
                FieldSpec::new("topicId", FieldKind::String, "Topic id (e.g. \"0.0.5005\")"),
                FieldSpec::new(
                    "limit",
                    FieldKind::with_default(FieldKind::Integer, json!(default_limit())),
                    "Maximum number of messages to return",
                ),
            ]),
        }
    }
}

impl Default for GetTopicMessagesQueryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetTopicMessagesQueryTool {
    fn method(&self) -> &str {
        "get_topic_messages_query_tool"
    }

    fn name(&self) -> &str {
        "Get Topic Messages"
    }

    fn description(&self) -> &str {
        "Return the most recent messages of a consensus topic"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        _context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: TopicMessagesParams = parse_params(params)?;
        let topic_id: TopicId = params.topic_id.parse()?;

        let raw = client
            .query(LedgerQuery::TopicMessages {
                topic_id,
                limit: params.limit.clamp(1, 100),
            })
            .await?;

        let messages = raw["messages"].as_array().cloned().unwrap_or_default();
        let message = if messages.is_empty() {
            format!("Topic {} has no messages", topic_id)
        } else {
            let lines: Vec<String> = messages
                .iter()
                .map(|m| {
                    format!(
                        "- #{} at {}: {}",
                        m["sequenceNumber"],
                        m["consensusTimestamp"].as_str().unwrap_or("?"),
                        m["message"].as_str().unwrap_or_default()
                    )
                })
                .collect();
            format!("Messages for topic {}:\n{}", topic_id, lines.join("\n"))
        };

        Ok(tool_output(raw, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLedger;

    #[tokio::test]
    async fn test_hbar_balance_defaults_to_operator() {
        let ledger = MockLedger::new().with_query_response(
            LedgerQuery::HbarBalance(MockLedger::OPERATOR_ACCOUNT.parse().unwrap()),
            json!({"accountId": MockLedger::OPERATOR_ACCOUNT, "tinybars": 1_234_500_000i64}),
        );
        let tool = GetHbarBalanceQueryTool::new();
        let params = tool.parameters().safe_parse(&json!({})).unwrap();

        let output = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap();

        assert_eq!(
            output["humanMessage"],
            format!("Account {} has a balance of 12.345 HBAR", MockLedger::OPERATOR_ACCOUNT)
        );
    }

    #[tokio::test]
    async fn test_account_query_requires_account() {
        let tool = GetAccountQueryTool::new();
        assert!(tool.parameters().safe_parse(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_token_info_message() {
        let ledger = MockLedger::new().with_query_response(
            LedgerQuery::TokenInfo("0.0.5678".parse().unwrap()),
            json!({"name": "GameGold", "symbol": "GG", "type": "FUNGIBLE_COMMON", "decimals": "2", "total_supply": "750000", "max_supply": "0", "treasury_account_id": "0.0.2"}),
        );
        let tool = GetTokenInfoQueryTool::new();
        let params = tool
            .parameters()
            .safe_parse(&json!({"tokenId": "0.0.5678"}))
            .unwrap();

        let output = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap();
        let message = output["humanMessage"].as_str().unwrap();
        assert!(message.contains("- Name: GameGold"));
        assert!(message.contains("- Total supply: 750000"));
    }

    #[tokio::test]
    async fn test_token_balances_empty() {
        let account = "0.0.3030";
        let ledger = MockLedger::new().with_query_response(
            LedgerQuery::TokenBalances(account.parse().unwrap()),
            json!({"tokens": []}),
        );
        let tool = GetAccountTokenBalancesQueryTool::new();
        let params = tool
            .parameters()
            .safe_parse(&json!({"accountId": account}))
            .unwrap();

        let output = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap();
        assert_eq!(output["humanMessage"], "Account 0.0.3030 holds no tokens");
    }

    #[tokio::test]
    async fn test_topic_messages_unknown_query_fails() {
        let ledger = MockLedger::new();
        let tool = GetTopicMessagesQueryTool::new();
        let params = tool
            .parameters()
            .safe_parse(&json!({"topicId": "0.0.1"}))
            .unwrap();
        assert_eq!(params.get("limit"), Some(&json!(10)));

        let err = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Ledger(_)));
    }
}
