//! End-to-end action runs through the local runtime

use hedera_agent_plugin::audit::AuditLogger;
use hedera_agent_plugin::config::{ACCOUNT_ID_KEY, PRIVATE_KEY_KEY};
use hedera_agent_plugin::error::ActionError;
use hedera_agent_plugin::llm::ModelType;
use hedera_agent_plugin::mocks::{MockConnector, MockLedger, ScriptedModel};
use hedera_agent_plugin::plugin::{HederaPlugin, PluginVariant, ToolAction, INVALID_PARAMETERS_TEXT};
use hedera_agent_plugin::runtime::{Action, AgentRuntime, Content, LocalRuntime, Memory};
use std::collections::HashMap;
use std::sync::Arc;

fn settings() -> HashMap<String, String> {
    let mut settings = HashMap::new();
    settings.insert(ACCOUNT_ID_KEY.to_string(), MockLedger::OPERATOR_ACCOUNT.to_string());
    settings.insert(PRIVATE_KEY_KEY.to_string(), MockLedger::OPERATOR_KEY.to_string());
    settings
}

fn start(variant: PluginVariant, responses: Vec<&str>) -> (LocalRuntime, Arc<ScriptedModel>) {
    let model = Arc::new(ScriptedModel::new(responses));
    let runtime = LocalRuntime::new("Hedy", settings(), model.clone());
    HederaPlugin::new(variant, Arc::new(MockConnector::new()))
        .init(&settings(), &runtime)
        .unwrap();
    (runtime, model)
}

#[tokio::test]
async fn test_adapter_transfer_end_to_end() {
    let (runtime, model) = start(
        PluginVariant::Adapter,
        vec![
            "```json\n{\"toAccountId\": \"0.0.800\", \"amount\": \"2\"}\n```",
            "Sent 2 HBAR to 0.0.800.",
        ],
    );
    let message = Memory::new("alice", "Send 2 HBAR to 0.0.800");
    runtime.remember(message.clone());

    let mut replies: Vec<Content> = Vec::new();
    let mut callback = |content: Content| replies.push(content);
    let result = runtime
        .run_action("transfer_hbar_tool", &message, Some(&mut callback))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.text.as_deref(), Some("Sent 2 HBAR to 0.0.800."));
    let data = result.data.unwrap();
    assert!(data["humanMessage"].as_str().unwrap().contains("0.0.800"));
    assert_eq!(replies.len(), 1);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].0, ModelType::TextLarge);
    assert!(prompts[0].1.contains("alice: Send 2 HBAR to 0.0.800"));
    assert!(prompts[0].1.contains("respond with: 0.0.1001."));
    assert_eq!(prompts[1].0, ModelType::TextSmall);
}

#[tokio::test]
async fn test_starter_action_found_by_simile() {
    let (runtime, _) = start(
        PluginVariant::Starter,
        vec![
            r#"{"tokenName": "SkyCredits", "tokenSymbol": "SKC", "decimals": 9, "initialSupply": 25000}"#,
            "SkyCredits is live.",
        ],
    );
    let message = Memory::new("alice", "Launch a new HTS token called SkyCredits");
    runtime.remember(message.clone());

    let result = runtime
        .run_action("hedera_new_fungible_token", &message, None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.text.as_deref(), Some("SkyCredits is live."));
}

#[tokio::test]
async fn test_invalid_parameters_never_reach_ledger() {
    let (runtime, model) = start(PluginVariant::Adapter, vec![r#"{"amount": "lots"}"#]);
    let message = Memory::new("alice", "Send some HBAR");

    let mut replies: Vec<Content> = Vec::new();
    let mut callback = |content: Content| replies.push(content);
    let result = runtime
        .run_action("TRANSFER_HBAR_TOOL", &message, Some(&mut callback))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("toAccountId: Required"));
    assert_eq!(replies[0].text, INVALID_PARAMETERS_TEXT);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_tool_error_reported_as_execution_failure() {
    let (runtime, _) = start(
        PluginVariant::Adapter,
        vec![r#"{"toAccountId": "not-an-account", "amount": 1}"#],
    );
    let message = Memory::new("alice", "Send 1 HBAR to not-an-account");

    let result = runtime
        .run_action("TRANSFER_HBAR_TOOL", &message, None)
        .await
        .unwrap();

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("not-an-account"));
    assert_eq!(result.text.unwrap(), format!("Execution failed: {}", error));
}

#[tokio::test]
async fn test_unknown_action() {
    let (runtime, _) = start(PluginVariant::Starter, vec![]);
    let err = runtime
        .run_action("TRANSFER_HBAR_TOOL", &Memory::new("alice", "hi"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::UnknownAction(_)));
}

#[tokio::test]
async fn test_action_unavailable_without_service() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let runtime = LocalRuntime::new("Hedy", settings(), model.clone());
    let action = Arc::new(ToolAction::create_fungible_token(Arc::new(AuditLogger::disabled())));
    runtime.register_action(action.clone());

    let message = Memory::new("alice", "Create token X");
    assert!(!action.validate(&runtime, &message, None).await);

    let err = runtime
        .run_action("CREATE_FUNGIBLE_TOKEN_TOOL", &message, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::NotAvailable(_)));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_shutdown_after_actions() {
    let (runtime, _) = start(PluginVariant::Adapter, vec![]);
    assert_eq!(runtime.actions().len(), 10);
    runtime.shutdown().await;
}
