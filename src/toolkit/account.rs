//! Account tools

use super::{
    format_hbar, parse_params, resolve_account, submit_or_prepare, tool_output, Outcome, Tool,
    ToolContext,
};
use crate::error::ToolError;
use crate::ledger::{AccountId, LedgerClient, LedgerTransaction, TINYBARS_PER_HBAR};
use crate::schema::{FieldKind, FieldSpec, ParameterSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Transfers hbar between accounts
pub struct TransferHbarTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferHbarParams {
    to_account_id: String,
    amount: f64,
    source_account_id: Option<String>,
    transaction_memo: Option<String>,
}

impl TransferHbarTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![
                FieldSpec::new("toAccountId", FieldKind::String, "Recipient account id"),
                FieldSpec::new("amount", FieldKind::Number, "Amount of HBAR to transfer"),
                FieldSpec::new(
                    "sourceAccountId",
                    FieldKind::optional(FieldKind::String),
                    "Paying account, defaults to the operator",
                ),
                FieldSpec::new(
                    "transactionMemo",
                    FieldKind::optional(FieldKind::String),
                    "Memo attached to the transfer",
                ),
            ]),
        }
    }
}

impl Default for TransferHbarTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TransferHbarTool {
    fn method(&self) -> &str {
        "transfer_hbar_tool"
    }

    fn name(&self) -> &str {
        "Transfer HBAR"
    }

    fn description(&self) -> &str {
        "Transfer HBAR from the operator (or a given account) to another account"
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
        let params: TransferHbarParams = parse_params(params)?;
        if !(params.amount > 0.0) {
            return Err(ToolError::InvalidParams(format!(
                "amount must be positive, got {}",
                params.amount
            )));
        }

        let from = resolve_account(params.source_account_id.as_deref(), client, context)?;
        let to: AccountId = params.to_account_id.parse()?;
        let tinybars = (params.amount * TINYBARS_PER_HBAR as f64).round() as i64;

        let outcome = submit_or_prepare(
            client,
            context,
            LedgerTransaction::TransferHbar {
                from,
                to,
                tinybars,
                memo: params.transaction_memo,
            },
        )
        .await?;

        let message = match &outcome {
            Outcome::Submitted(receipt) => format!(
                "Transferred {} HBAR from {} to {}. Transaction id: {}",
                format_hbar(tinybars),
                from,
                to,
                receipt.transaction_id
            ),
            Outcome::Prepared(_) => format!(
                "Prepared transfer of {} HBAR from {} to {}",
                format_hbar(tinybars),
                from,
                to
            ),
        };

        Ok(tool_output(outcome.raw(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLedger;
    use serde_json::json;

    #[tokio::test]
    async fn test_transfer_converts_to_tinybars() {
        let ledger = MockLedger::new();
        let tool = TransferHbarTool::new();
        let params = tool
            .parameters()
            .safe_parse(&json!({"toAccountId": "0.0.800", "amount": 1.5}))
            .unwrap();

        let output = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap();

        match &ledger.submitted()[0] {
            LedgerTransaction::TransferHbar { from, to, tinybars, memo } => {
                assert_eq!(from.to_string(), MockLedger::OPERATOR_ACCOUNT);
                assert_eq!(to.to_string(), "0.0.800");
                assert_eq!(*tinybars, 150_000_000);
                assert!(memo.is_none());
            }
            other => panic!("unexpected transaction {:?}", other),
        }
        assert!(output["humanMessage"]
            .as_str()
            .unwrap()
            .starts_with("Transferred 1.5 HBAR"));
    }

    #[tokio::test]
    async fn test_transfer_rejects_non_positive_amount() {
        let ledger = MockLedger::new();
        let tool = TransferHbarTool::new();
        let params = json!({"toAccountId": "0.0.800", "amount": 0})
            .as_object()
            .cloned()
            .unwrap();

        let err = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_rejects_bad_recipient() {
        let ledger = MockLedger::new();
        let tool = TransferHbarTool::new();
        let params = json!({"toAccountId": "alice", "amount": 1})
            .as_object()
            .cloned()
            .unwrap();

        let err = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("alice"));
    }
}
