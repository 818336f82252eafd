//! In-process agent runtime
//!
//! Minimal host used by the CLI and the tests: registries behind
//! `RwLock`s, a conversation log, and state composition from providers.

use super::{
    Action, ActionResult, AgentRuntime, HandlerCallback, Memory, Provider, Service, State,
};
use crate::error::{ActionError, AiError};
use crate::llm::{ModelClient, ModelType};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Number of messages rendered into `recentMessages`
const RECENT_MESSAGE_COUNT: usize = 10;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct LocalRuntime {
    agent_name: String,
    settings: HashMap<String, String>,
    model: Arc<dyn ModelClient>,
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    actions: RwLock<Vec<Arc<dyn Action>>>,
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    messages: RwLock<Vec<Memory>>,
}

impl LocalRuntime {
    pub fn new(
        agent_name: impl Into<String>,
        settings: HashMap<String, String>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            settings,
            model,
            services: RwLock::new(HashMap::new()),
            actions: RwLock::new(Vec::new()),
            providers: RwLock::new(Vec::new()),
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Registered actions, in registration order
    pub fn actions(&self) -> Vec<Arc<dyn Action>> {
        read(&self.actions).clone()
    }

    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        read(&self.providers).clone()
    }

    /// Find an action by name or simile, ignoring case
    pub fn find_action(&self, name: &str) -> Option<Arc<dyn Action>> {
        let wanted = name.trim().to_uppercase();
        read(&self.actions)
            .iter()
            .find(|action| {
                action.name().to_uppercase() == wanted
                    || action.similes().iter().any(|s| s.to_uppercase() == wanted)
            })
            .cloned()
    }

    /// Append a message to the conversation log
    pub fn remember(&self, message: Memory) {
        write(&self.messages).push(message);
    }

    /// Build conversation state from the log and every provider
    pub async fn compose_state(&self, message: &Memory) -> State {
        let recent_messages = {
            let messages = read(&self.messages);
            let start = messages.len().saturating_sub(RECENT_MESSAGE_COUNT);
            messages[start..]
                .iter()
                .map(|m| format!("{}: {}", m.sender, m.content.text))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut state = State::default();
        let mut provider_texts = Vec::new();
        for provider in self.providers() {
            let result = provider.get(self, message, Some(&state)).await;
            debug!("Provider {} contributed {} values", provider.name(), result.values.len());
            if !result.text.trim().is_empty() {
                provider_texts.push(result.text.trim().to_string());
            }
            state.values.extend(result.values);
            state
                .data
                .insert(provider.name().to_string(), Value::Object(result.data));
        }

        let providers = provider_texts.join("\n\n");
        state.values.insert("agentName".to_string(), json!(self.agent_name));
        state.values.insert("recentMessages".to_string(), json!(recent_messages));
        state.values.insert("providers".to_string(), json!(providers));
        state.text = [providers, recent_messages]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        state
    }

    /// Validate and run an action against the current conversation
    pub async fn run_action(
        &self,
        name: &str,
        message: &Memory,
        callback: Option<HandlerCallback<'_>>,
    ) -> Result<ActionResult, ActionError> {
        let action = self
            .find_action(name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;

        let state = self.compose_state(message).await;
        if !action.validate(self, message, Some(&state)).await {
            return Err(ActionError::NotAvailable(action.name().to_string()));
        }

        info!("Running action {}", action.name());
        action.handle(self, message, Some(&state), callback).await
    }

    /// Stop every registered service
    pub async fn shutdown(&self) {
        let services: Vec<Arc<dyn Service>> = read(&self.services).values().cloned().collect();
        for service in services {
            debug!("Stopping service {}", service.service_type());
            service.stop().await;
        }
    }
}

#[async_trait]
impl AgentRuntime for LocalRuntime {
    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).cloned()
    }

    async fn use_model(&self, model: ModelType, prompt: &str) -> Result<String, AiError> {
        self.model.generate(model, prompt).await
    }

    fn get_service(&self, service_type: &str) -> Option<Arc<dyn Service>> {
        read(&self.services).get(service_type).cloned()
    }

    fn register_service(&self, service: Arc<dyn Service>) {
        debug!("Registering service {}", service.service_type());
        write(&self.services).insert(service.service_type().to_string(), service);
    }

    fn register_action(&self, action: Arc<dyn Action>) {
        debug!("Registering action {}", action.name());
        let mut actions = write(&self.actions);
        actions.retain(|existing| existing.name() != action.name());
        actions.push(action);
    }

    fn register_provider(&self, provider: Arc<dyn Provider>) {
        debug!("Registering provider {}", provider.name());
        write(&self.providers).push(provider);
    }
}
