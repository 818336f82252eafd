//! Agent runtime contract
//!
//! The host runtime owns settings, the model, and the registries of
//! services, actions and providers. Plugins only talk to it through
//! [`AgentRuntime`].

mod local;

pub use local::LocalRuntime;

use crate::error::{ActionError, AiError};
use crate::llm::ModelType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// Host runtime as seen by a plugin
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn agent_name(&self) -> &str;

    /// Setting by key, e.g. `HEDERA_ACCOUNT_ID`
    fn get_setting(&self, key: &str) -> Option<String>;

    async fn use_model(&self, model: ModelType, prompt: &str) -> Result<String, AiError>;

    fn get_service(&self, service_type: &str) -> Option<Arc<dyn Service>>;

    fn register_service(&self, service: Arc<dyn Service>);

    fn register_action(&self, action: Arc<dyn Action>);

    fn register_provider(&self, provider: Arc<dyn Provider>);
}

/// Look up a service and downcast it to its concrete type
pub fn get_service_as<T: Service>(runtime: &dyn AgentRuntime, service_type: &str) -> Option<Arc<T>> {
    runtime
        .get_service(service_type)
        .and_then(|service| service.into_any().downcast::<T>().ok())
}

/// Long-lived object holding shared resources
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn service_type(&self) -> &str;

    fn capability_description(&self) -> &str;

    async fn stop(&self) {}

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Message body exchanged with the agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_content(text: impl Into<String>, content: Value) -> Self {
        Self {
            text: text.into(),
            actions: vec![],
            content: Some(content),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: Uuid,
    /// Display name of the sender
    pub sender: String,
    pub content: Content,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Memory {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            content: Content::text(text),
            created_at: chrono::Utc::now(),
        }
    }
}

/// Conversation state handed to actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Template variables, e.g. `recentMessages`
    pub values: Map<String, Value>,
    pub data: Map<String, Value>,
    pub text: String,
}

/// One turn of an action example conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExample {
    pub name: String,
    pub content: Content,
}

impl ActionExample {
    pub fn new(name: &str, text: &str, action: &str) -> Self {
        Self {
            name: name.to_string(),
            content: Content {
                text: text.to_string(),
                actions: vec![action.to_string()],
                content: None,
            },
        }
    }
}

/// Outcome of an action handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Invoked with intermediate or final replies
pub type HandlerCallback<'a> = &'a mut (dyn FnMut(Content) + Send);

/// Named operation the agent can invoke
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Alternative names the agent may use
    fn similes(&self) -> &[String] {
        &[]
    }

    fn examples(&self) -> &[Vec<ActionExample>] {
        &[]
    }

    /// Whether the action can run at all
    async fn validate(&self, runtime: &dyn AgentRuntime, message: &Memory, state: Option<&State>) -> bool;

    async fn handle(
        &self,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: Option<&State>,
        callback: Option<HandlerCallback<'_>>,
    ) -> Result<ActionResult, ActionError>;
}

/// Contextual text and data injected into conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub text: String,
    pub values: Map<String, Value>,
    pub data: Map<String, Value>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn get(&self, runtime: &dyn AgentRuntime, message: &Memory, state: Option<&State>) -> ProviderResult;
}
