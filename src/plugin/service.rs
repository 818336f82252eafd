//! Long-lived service holding the ledger client and discovered tools

use crate::config::{ACCOUNT_ID_KEY, MIRROR_NODE_URL_KEY, NETWORK_KEY, PRIVATE_KEY_KEY};
use crate::error::{ConfigError, PluginError};
use crate::ledger::{ClientOptions, LedgerClient, LedgerConnector, LedgerNetwork, Operator};
use crate::runtime::{AgentRuntime, Service};
use crate::toolkit::{Tool, ToolDiscovery, ToolkitConfiguration};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info};

/// Service type under which [`HederaService`] is registered
pub const SERVICE_TYPE: &str = "hedera-service";

pub struct HederaService {
    client: Arc<dyn LedgerClient>,
    configuration: ToolkitConfiguration,
    tools: Vec<Arc<dyn Tool>>,
}

impl HederaService {
    /// Wrap an existing client and discover the configured tools
    pub fn new(client: Arc<dyn LedgerClient>, configuration: ToolkitConfiguration) -> Self {
        let tools = ToolDiscovery::from_configuration(&configuration)
            .all_tools(&configuration.context, &configuration);
        Self {
            client,
            configuration,
            tools,
        }
    }

    /// Build the client from runtime settings and discover tools
    pub fn start(
        runtime: &dyn AgentRuntime,
        connector: &dyn LedgerConnector,
        configuration: ToolkitConfiguration,
        timeout_secs: u64,
    ) -> Result<Self, PluginError> {
        let options = client_options(runtime, timeout_secs)?;
        info!(
            "Connecting to Hedera {} as {}",
            options.network, options.operator.account_id
        );
        let client = connector.connect(&options)?;

        let service = Self::new(client, configuration);
        debug!("Hedera service started with {} tools", service.tools.len());
        Ok(service)
    }

    /// Tool whose upper-cased method equals `name`
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.method().to_uppercase() == name)
            .cloned()
    }

    pub fn get_tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn get_configuration(&self) -> &ToolkitConfiguration {
        &self.configuration
    }

    pub fn get_client(&self) -> Arc<dyn LedgerClient> {
        Arc::clone(&self.client)
    }
}

#[async_trait]
impl Service for HederaService {
    fn service_type(&self) -> &str {
        SERVICE_TYPE
    }

    fn capability_description(&self) -> &str {
        "Provides Hedera functionality and interactions"
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Client options from the runtime's Hedera settings
fn client_options(runtime: &dyn AgentRuntime, timeout_secs: u64) -> Result<ClientOptions, PluginError> {
    let setting = |key: &str| {
        runtime
            .get_setting(key)
            .filter(|value| !value.trim().is_empty())
    };

    let account_id =
        setting(ACCOUNT_ID_KEY).ok_or_else(|| ConfigError::MissingField(ACCOUNT_ID_KEY.to_string()))?;
    let private_key =
        setting(PRIVATE_KEY_KEY).ok_or_else(|| ConfigError::MissingField(PRIVATE_KEY_KEY.to_string()))?;
    let network = match setting(NETWORK_KEY) {
        Some(name) => name.parse::<LedgerNetwork>()?,
        None => LedgerNetwork::default(),
    };

    Ok(ClientOptions {
        network,
        mirror_node_url: setting(MIRROR_NODE_URL_KEY),
        operator: Operator::new(&account_id, &private_key)?,
        timeout_secs,
    })
}
