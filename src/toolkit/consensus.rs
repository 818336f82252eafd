//! Consensus service tools

use super::{parse_params, submit_or_prepare, tool_output, Outcome, Tool, ToolContext};
use crate::error::ToolError;
use crate::ledger::{LedgerClient, LedgerTransaction, TopicId};
use crate::schema::{FieldKind, FieldSpec, ParameterSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Creates a consensus topic
pub struct CreateTopicTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTopicParams {
    topic_memo: Option<String>,
    #[serde(default)]
    is_submit_key: bool,
}

impl CreateTopicTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![
                FieldSpec::new(
                    "topicMemo",
                    FieldKind::optional(FieldKind::String),
                    "Memo describing the topic",
                ),
                FieldSpec::new(
                    "isSubmitKey",
                    FieldKind::with_default(FieldKind::Boolean, json!(false)),
                    "Whether only the operator may submit messages",
                ),
            ]),
        }
    }
}

impl Default for CreateTopicTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CreateTopicTool {
    fn method(&self) -> &str {
        "create_topic_tool"
    }

    fn name(&self) -> &str {
        "Create Topic"
    }

    fn description(&self) -> &str {
        "Create a new topic on the Hedera consensus service"
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
        let params: CreateTopicParams = parse_params(params)?;
        let outcome = submit_or_prepare(
            client,
            context,
            LedgerTransaction::CreateTopic {
                memo: params.topic_memo,
                submit_key: params.is_submit_key,
            },
        )
        .await?;

        let message = match &outcome {
            Outcome::Submitted(receipt) => format!(
                "Topic created with id {}. Transaction id: {}",
                receipt
                    .entity_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                receipt.transaction_id
            ),
            Outcome::Prepared(_) => "Prepared topic creation transaction".to_string(),
        };

        Ok(tool_output(outcome.raw(), message))
    }
}

/// Submits a message to a consensus topic
pub struct SubmitTopicMessageTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitTopicMessageParams {
    topic_id: String,
    message: String,
}

impl SubmitTopicMessageTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![
                FieldSpec::new("topicId", FieldKind::String, "Topic id (e.g. \"0.0.5005\")"),
                FieldSpec::new("message", FieldKind::String, "Message to submit"),
            ]),
        }
    }
}

impl Default for SubmitTopicMessageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SubmitTopicMessageTool {
    fn method(&self) -> &str {
        "submit_topic_message_tool"
    }

    fn name(&self) -> &str {
        "Submit Topic Message"
    }

    fn description(&self) -> &str {
        "Submit a message to a topic on the Hedera consensus service"
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
        let params: SubmitTopicMessageParams = parse_params(params)?;
        if params.message.is_empty() {
            return Err(ToolError::InvalidParams("message must not be empty".to_string()));
        }
        let topic_id: TopicId = params.topic_id.parse()?;

        let outcome = submit_or_prepare(
            client,
            context,
            LedgerTransaction::SubmitTopicMessage {
                topic_id,
                message: params.message,
            },
        )
        .await?;

        let message = match &outcome {
            Outcome::Submitted(receipt) => match receipt.topic_sequence_number {
                Some(seq) => format!(
                    "Message submitted to topic {} with sequence number {}. Transaction id: {}",
                    topic_id, seq, receipt.transaction_id
                ),
                None => format!(
                    "Message submitted to topic {}. Transaction id: {}",
                    topic_id, receipt.transaction_id
                ),
            },
            Outcome::Prepared(_) => format!("Prepared message submission to topic {}", topic_id),
        };

        Ok(tool_output(outcome.raw(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLedger;
    use crate::toolkit::AgentMode;

    #[tokio::test]
    async fn test_create_topic_defaults() {
        let ledger = MockLedger::new();
        let tool = CreateTopicTool::new();
        let params = tool.parameters().safe_parse(&json!({})).unwrap();

        let output = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap();

        assert_eq!(
            ledger.submitted()[0],
            LedgerTransaction::CreateTopic {
                memo: None,
                submit_key: false
            }
        );
        assert!(output["humanMessage"]
            .as_str()
            .unwrap()
            .starts_with("Topic created with id"));
    }

    #[tokio::test]
    async fn test_submit_message_return_bytes() {
        let ledger = MockLedger::new();
        let tool = SubmitTopicMessageTool::new();
        let context = ToolContext {
            mode: AgentMode::ReturnBytes,
            account_id: None,
        };
        let params = tool
            .parameters()
            .safe_parse(&json!({"topicId": "0.0.5005", "message": "gm"}))
            .unwrap();

        let output = tool.execute(&ledger, &context, params).await.unwrap();

        assert!(ledger.submitted().is_empty());
        assert_eq!(output["raw"]["transaction"]["message"], "gm");
        assert_eq!(
            output["humanMessage"],
            "Prepared message submission to topic 0.0.5005"
        );
    }

    #[tokio::test]
    async fn test_submit_message_requires_text() {
        let ledger = MockLedger::new();
        let tool = SubmitTopicMessageTool::new();
        let params = tool
            .parameters()
            .safe_parse(&json!({"topicId": "0.0.5005", "message": ""}))
            .unwrap();

        let err = tool
            .execute(&ledger, &ToolContext::default(), params)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
