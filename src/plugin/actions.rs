//! Tool-backed actions
//!
//! Each action extracts tool parameters from the conversation with the
//! large model, validates them, runs the tool and has the small model
//! summarize the result.

use super::service::{HederaService, SERVICE_TYPE};
use super::templates::{compose_prompt, extraction_template, response_prompt, CREATE_FUNGIBLE_TOKEN_TEMPLATE};
use crate::audit::AuditLogger;
use crate::coerce::coerce_numeric_params;
use crate::error::ActionError;
use crate::llm::{parse_json_object_from_text, ModelType};
use crate::runtime::{
    get_service_as, Action, ActionExample, ActionResult, AgentRuntime, Content, HandlerCallback,
    Memory, State,
};
use crate::toolkit::Tool;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Reply sent when extracted parameters fail validation
pub const INVALID_PARAMETERS_TEXT: &str = "Invalid or incomplete parameters.";

/// Action running one toolkit tool
pub struct ToolAction {
    name: String,
    description: String,
    template: String,
    similes: Vec<String>,
    examples: Vec<Vec<ActionExample>>,
    audit: Arc<AuditLogger>,
}

impl ToolAction {
    /// Action for a discovered tool, with a prompt generated from its schema
    pub fn for_tool(tool: &dyn Tool, audit: Arc<AuditLogger>) -> Self {
        Self {
            name: tool.method().to_uppercase(),
            description: tool.description().to_string(),
            template: extraction_template(tool),
            similes: Vec::new(),
            examples: Vec::new(),
            audit,
        }
    }

    /// Hand-tuned fungible token creation action
    pub fn create_fungible_token(audit: Arc<AuditLogger>) -> Self {
        Self {
            name: "CREATE_FUNGIBLE_TOKEN_TOOL".to_string(),
            description: "Create a new fungible token on the Hedera network".to_string(),
            template: CREATE_FUNGIBLE_TOKEN_TEMPLATE.to_string(),
            similes: ["HEDERA_NEW_TOKEN", "HEDERA_CREATE_NEW_TOKEN", "HEDERA_NEW_FUNGIBLE_TOKEN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            examples: create_token_examples(),
            audit,
        }
    }

    /// Extraction prompt template
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Run the tool and summarize its output
    async fn execute(
        &self,
        runtime: &dyn AgentRuntime,
        service: &HederaService,
        tool: &dyn Tool,
        params: Map<String, Value>,
    ) -> Result<(Value, String), String> {
        let client = service.get_client();
        let context = &service.get_configuration().context;

        let result = tool
            .execute(client.as_ref(), context, params)
            .await
            .map_err(|e| e.to_string())?;

        let text = runtime
            .use_model(ModelType::TextSmall, &response_prompt(&result, &self.name))
            .await
            .map_err(|e| e.to_string())?;

        Ok((result, text))
    }
}

fn reply(callback: &mut Option<HandlerCallback<'_>>, content: Content) {
    if let Some(callback) = callback {
        (*callback)(content);
    }
}

#[async_trait]
impl Action for ToolAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn similes(&self) -> &[String] {
        &self.similes
    }

    fn examples(&self) -> &[Vec<ActionExample>] {
        &self.examples
    }

    async fn validate(&self, runtime: &dyn AgentRuntime, _message: &Memory, _state: Option<&State>) -> bool {
        runtime.get_service(SERVICE_TYPE).is_some()
    }

    async fn handle(
        &self,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: Option<&State>,
        mut callback: Option<HandlerCallback<'_>>,
    ) -> Result<ActionResult, ActionError> {
        info!("Running hedera's {} handler...", self.name);
        self.audit.log_invoked(&self.name, &message.content.text);

        let service = get_service_as::<HederaService>(runtime, SERVICE_TYPE)
            .ok_or_else(|| ActionError::ServiceNotFound(SERVICE_TYPE.to_string()))?;
        let tool = service
            .get_tool(&self.name)
            .ok_or_else(|| ActionError::ToolNotFound(self.name.clone()))?;
        let state = state.ok_or(ActionError::MissingState)?;

        let prompt = compose_prompt(state, &self.template)?;
        let model_output = runtime.use_model(ModelType::TextLarge, &prompt).await?;
        debug!("Model output: {}", model_output);

        let parsed = parse_json_object_from_text(&model_output)
            .map(Value::Object)
            .unwrap_or(Value::Null);
        let fixed = coerce_numeric_params(parsed, tool.parameters());
        debug!("Coerced parameters: {}", fixed);

        let params = match tool.parameters().safe_parse(&fixed) {
            Ok(params) => params,
            Err(issues) => {
                warn!("Invalid parameters for {}: {}", self.name, issues);
                self.audit.log_rejected(&self.name, &issues.to_string());
                reply(
                    &mut callback,
                    Content::with_content(INVALID_PARAMETERS_TEXT, json!({ "error": issues.format() })),
                );
                return Ok(ActionResult::failure(issues.to_string()));
            }
        };

        let audited_params = Value::Object(params.clone());
        let started = Instant::now();
        match self.execute(runtime, &service, tool.as_ref(), params).await {
            Ok((result, text)) => {
                self.audit.log_succeeded(
                    &self.name,
                    &audited_params,
                    &text,
                    started.elapsed().as_millis() as u64,
                );
                reply(&mut callback, Content::with_content(text.clone(), result.clone()));
                Ok(ActionResult {
                    success: true,
                    text: Some(text),
                    error: None,
                    data: Some(result),
                })
            }
            Err(message) => {
                error!("Error running tool {}: {}", tool.method(), message);
                self.audit.log_failed(
                    &self.name,
                    &audited_params,
                    &message,
                    started.elapsed().as_millis() as u64,
                );
                let text = format!("Execution failed: {}", message);
                reply(
                    &mut callback,
                    Content::with_content(text.clone(), json!({ "error": message })),
                );
                Ok(ActionResult {
                    success: false,
                    text: Some(text),
                    error: Some(message),
                    data: None,
                })
            }
        }
    }
}

fn create_token_examples() -> Vec<Vec<ActionExample>> {
    const ACTION: &str = "HEDERA_CREATE_TOKEN";
    [
        (
            "Create new token with name MyToken with symbol MTK, 8 decimals and 1000 initial supply.",
            "I'll create a new HTS token for you with the specified parameters.",
        ),
        (
            "Create a new token named HederaDollar with ticker H$, 4 decimals, and 1000000 initial supply. I want to set the supply key so I could add more tokens later.",
            "I'll create the HederaDollar token with a supply key so you can mint additional tokens later.",
        ),
        (
            "Create token GameGold with symbol GG, 2 decimal places, and starting supply of 750000. This is the final supply, don't set a supply key.",
            "I'll create the GameGold token with a fixed supply - no supply key will be set.",
        ),
        (
            "Deploy a token named SuperToken with short code STK, 5 decimal places, and an issuance of 100000. No additional tokens will be minted.",
            "I'll deploy the SuperToken with a fixed supply - no additional minting capability.",
        ),
        (
            "Create new HTS token PixelCoin with symbol PXN, 3 decimal places, and 500 tokens minted. I want to control supply changes, so set the supply key.",
            "I'll create the PixelCoin token with a supply key so you can control future supply changes.",
        ),
        (
            "Launch a new HTS token called SkyCredits with ticker SKC, 9 decimal places, and a total supply of 25000. The supply is fixed.",
            "I'll launch the SkyCredits token with a fixed supply - no future minting will be possible.",
        ),
    ]
    .iter()
    .map(|(user, assistant)| {
        vec![
            ActionExample::new("{{user}}", user, ACTION),
            ActionExample::new("{{assistant}}", assistant, ACTION),
        ]
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerTransaction;
    use crate::mocks::{MockLedger, ScriptedModel};
    use crate::runtime::LocalRuntime;
    use crate::toolkit::{CapabilityModule, ToolContext, ToolkitConfiguration};
    use std::collections::HashMap;

    fn runtime_with(model: ScriptedModel, ledger: MockLedger) -> (LocalRuntime, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let runtime = LocalRuntime::new("Hedy", HashMap::new(), model.clone());
        runtime.register_service(Arc::new(HederaService::new(
            Arc::new(ledger),
            ToolkitConfiguration {
                plugins: vec![CapabilityModule::CoreHts, CapabilityModule::CoreConsensus],
                tools: vec![],
                context: ToolContext::default(),
            },
        )));
        (runtime, model)
    }

    fn action() -> ToolAction {
        ToolAction::create_fungible_token(Arc::new(AuditLogger::disabled()))
    }

    fn state() -> State {
        let mut state = State::default();
        state.values.insert(
            "recentMessages".to_string(),
            json!("alice: Create token GameGold with symbol GG, 2 decimals and 750000 supply"),
        );
        state
    }

    #[tokio::test]
    async fn test_handle_success() {
        let (runtime, model) = runtime_with(
            ScriptedModel::new(vec![
                "```json\n{\"tokenName\": \"GameGold\", \"tokenSymbol\": \"GG\", \"decimals\": \"2\", \"initialSupply\": \"750000\"}\n```",
                "GameGold (GG) was created.",
            ]),
            MockLedger::new(),
        );

        let mut replies = Vec::new();
        let mut callback = |content: Content| replies.push(content);
        let result = action()
            .handle(&runtime, &Memory::new("alice", "create"), Some(&state()), Some(&mut callback))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.text.as_deref(), Some("GameGold (GG) was created."));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "GameGold (GG) was created.");
        assert!(replies[0].content.as_ref().unwrap()["humanMessage"]
            .as_str()
            .unwrap()
            .contains("GameGold created successfully"));

        let prompts = model.prompts();
        assert_eq!(prompts[0].0, ModelType::TextLarge);
        assert!(prompts[0].1.contains("alice: Create token GameGold"));
        assert_eq!(prompts[1].0, ModelType::TextSmall);
        assert!(prompts[1].1.contains("Generate response for CREATE_FUNGIBLE_TOKEN_TOOL tool."));
    }

    #[tokio::test]
    async fn test_handle_coerces_numbers_before_submit() {
        let ledger = Arc::new(MockLedger::new());
        let model = Arc::new(ScriptedModel::new(vec![
            r#"{"tokenName": "X", "initialSupply": "1000", "decimals": "8"}"#,
            "done",
        ]));
        let runtime = LocalRuntime::new("Hedy", HashMap::new(), model);
        runtime.register_service(Arc::new(HederaService::new(
            ledger.clone(),
            ToolkitConfiguration {
                plugins: vec![CapabilityModule::CoreHts],
                tools: vec![],
                context: ToolContext::default(),
            },
        )));

        action()
            .handle(&runtime, &Memory::new("alice", "create"), Some(&state()), None)
            .await
            .unwrap();

        match &ledger.submitted()[0] {
            LedgerTransaction::CreateFungibleToken(spec) => {
                assert_eq!(spec.initial_supply, 1000);
                assert_eq!(spec.decimals, 8);
            }
            other => panic!("unexpected transaction {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_invalid_parameters() {
        let (runtime, model) = runtime_with(
            ScriptedModel::new(vec![r#"{"tokenSymbol": "GG", "decimals": "abc"}"#]),
            MockLedger::new(),
        );

        let mut replies = Vec::new();
        let mut callback = |content: Content| replies.push(content);
        let result = action()
            .handle(&runtime, &Memory::new("alice", "create"), Some(&state()), Some(&mut callback))
            .await
            .unwrap();

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("tokenName: Required"));
        assert!(error.contains("decimals"));
        assert_eq!(replies[0].text, INVALID_PARAMETERS_TEXT);
        assert_eq!(
            replies[0].content.as_ref().unwrap()["error"]["tokenName"]["_errors"][0],
            "Required"
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_unparseable_model_output() {
        let (runtime, _) = runtime_with(ScriptedModel::new(vec!["I cannot help with that."]), MockLedger::new());
        let result = action()
            .handle(&runtime, &Memory::new("alice", "create"), Some(&state()), None)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Expected object, received null"));
    }

    #[tokio::test]
    async fn test_handle_tool_failure() {
        let (runtime, model) = runtime_with(
            ScriptedModel::new(vec![r#"{"tokenName": "X"}"#]),
            MockLedger::new().failing_submit("INSUFFICIENT_PAYER_BALANCE"),
        );

        let mut replies = Vec::new();
        let mut callback = |content: Content| replies.push(content);
        let result = action()
            .handle(&runtime, &Memory::new("alice", "create"), Some(&state()), Some(&mut callback))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Transaction rejected: INSUFFICIENT_PAYER_BALANCE"));
        assert_eq!(
            result.text.as_deref(),
            Some("Execution failed: Transaction rejected: INSUFFICIENT_PAYER_BALANCE")
        );
        assert_eq!(replies[0].content.as_ref().unwrap()["error"], result.error.unwrap());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_preconditions() {
        let model = Arc::new(ScriptedModel::new(vec!["{}"]));
        let bare = LocalRuntime::new("Hedy", HashMap::new(), model);
        let message = Memory::new("alice", "create");

        assert!(!action().validate(&bare, &message, None).await);
        assert!(matches!(
            action().handle(&bare, &message, Some(&state()), None).await,
            Err(ActionError::ServiceNotFound(_))
        ));

        let (runtime, _) = runtime_with(ScriptedModel::new(vec!["{}"]), MockLedger::new());
        assert!(action().validate(&runtime, &message, None).await);
        assert!(matches!(
            action().handle(&runtime, &message, None, None).await,
            Err(ActionError::MissingState)
        ));
    }

    #[tokio::test]
    async fn test_extraction_model_failure_is_error() {
        let (runtime, _) = runtime_with(ScriptedModel::failing("offline"), MockLedger::new());
        let err = action()
            .handle(&runtime, &Memory::new("alice", "create"), Some(&state()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Model(_)));
    }

    #[test]
    fn test_generated_action_metadata() {
        let tool = crate::toolkit::CreateTopicTool::new();
        let action = ToolAction::for_tool(&tool, Arc::new(AuditLogger::disabled()));
        assert_eq!(action.name(), "CREATE_TOPIC_TOOL");
        assert!(action.similes().is_empty());
        assert!(action.template().contains("**topicMemo**"));
    }

    #[test]
    fn test_starter_action_metadata() {
        let action = action();
        assert_eq!(action.similes().len(), 3);
        assert_eq!(action.examples().len(), 6);
        assert_eq!(action.examples()[0][1].name, "{{assistant}}");
    }
}
