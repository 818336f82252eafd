//! Hedera plugin for the agent runtime
//!
//! Two flavours are available:
//!
//! - **adapter** (default): every tool of the configured capability modules
//!   becomes an action with a prompt generated from its schema, and the
//!   account details provider is registered.
//! - **starter**: a single hand-tuned fungible token creation action.
//!
//! Both register [`HederaService`], which the actions resolve at runtime.

mod actions;
mod provider;
mod service;
mod templates;

pub use actions::{ToolAction, INVALID_PARAMETERS_TEXT};
pub use provider::AccountDetailsProvider;
pub use service::{HederaService, SERVICE_TYPE};
pub use templates::{compose_prompt, extraction_template, response_prompt, CREATE_FUNGIBLE_TOKEN_TEMPLATE};

use crate::audit::AuditLogger;
use crate::config::{Config, ACCOUNT_ID_KEY, PRIVATE_KEY_KEY};
use crate::error::{ConfigError, PluginError};
use crate::ledger::LedgerConnector;
use crate::runtime::{Action, AgentRuntime};
use crate::toolkit::{AgentMode, CapabilityModule, ToolContext, ToolkitConfiguration};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub const PLUGIN_NAME: &str = "plugin-hedera";
pub const PLUGIN_DESCRIPTION: &str = "Plugin for agent interactions with Hedera";

/// Which set of actions the plugin registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginVariant {
    #[default]
    Adapter,
    Starter,
}

impl PluginVariant {
    /// Capability modules loaded when none are configured
    pub fn default_modules(&self) -> Vec<CapabilityModule> {
        match self {
            PluginVariant::Adapter => CapabilityModule::ALL.to_vec(),
            PluginVariant::Starter => vec![
                CapabilityModule::CoreHts,
                CapabilityModule::CoreQueries,
                CapabilityModule::CoreAccount,
            ],
        }
    }
}

impl FromStr for PluginVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "adapter" => Ok(PluginVariant::Adapter),
            "starter" => Ok(PluginVariant::Starter),
            other => Err(format!("unknown plugin variant '{}'", other)),
        }
    }
}

impl fmt::Display for PluginVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginVariant::Adapter => write!(f, "adapter"),
            PluginVariant::Starter => write!(f, "starter"),
        }
    }
}

/// Validated plugin configuration
pub struct PluginSettings {
    pub account_id: String,
    pub private_key: SecretString,
}

impl PluginSettings {
    /// Both strings must be present and non-empty.
    ///
    /// Every failing field is reported, not just the first.
    pub fn validate(config: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let mut check = |key: &str| match config.get(key) {
            None => {
                problems.push(format!("{}: Required", key));
                None
            }
            Some(value) if value.trim().is_empty() => {
                problems.push(format!("{}: must not be empty", key));
                None
            }
            Some(value) => Some(value.trim().to_string()),
        };

        let private_key = check(PRIVATE_KEY_KEY);
        let account_id = check(ACCOUNT_ID_KEY);

        match (account_id, private_key) {
            (Some(account_id), Some(private_key)) => Ok(Self {
                account_id,
                private_key: SecretString::new(private_key),
            }),
            _ => Err(ConfigError::InvalidPluginConfig(problems)),
        }
    }
}

impl fmt::Debug for PluginSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSettings")
            .field("account_id", &self.account_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// The plugin registrar
pub struct HederaPlugin {
    variant: PluginVariant,
    connector: Arc<dyn LedgerConnector>,
    audit: Arc<AuditLogger>,
    modules: Option<Vec<CapabilityModule>>,
    tools: Vec<String>,
    mode: AgentMode,
    timeout_secs: u64,
}

impl HederaPlugin {
    pub fn new(variant: PluginVariant, connector: Arc<dyn LedgerConnector>) -> Self {
        Self {
            variant,
            connector,
            audit: Arc::new(AuditLogger::disabled()),
            modules: None,
            tools: Vec::new(),
            mode: AgentMode::Autonomous,
            timeout_secs: 30,
        }
    }

    /// Plugin configured from the `[plugin]`, `[toolkit]` and `[audit]` sections
    pub fn from_config(config: &Config, connector: Arc<dyn LedgerConnector>) -> Result<Self, ConfigError> {
        Ok(Self {
            variant: config.variant()?,
            connector,
            audit: Arc::new(AuditLogger::new(config.audit.clone())),
            modules: config.explicit_capability_modules()?,
            tools: config.toolkit.tools.clone(),
            mode: config.agent_mode()?,
            timeout_secs: config.hedera.timeout,
        })
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_modules(mut self, modules: Vec<CapabilityModule>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn with_mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        PLUGIN_NAME
    }

    pub fn description(&self) -> &str {
        PLUGIN_DESCRIPTION
    }

    pub fn variant(&self) -> PluginVariant {
        self.variant
    }

    /// Toolkit configuration the service is built with
    pub fn toolkit_configuration(&self) -> ToolkitConfiguration {
        ToolkitConfiguration {
            plugins: self
                .modules
                .clone()
                .unwrap_or_else(|| self.variant.default_modules()),
            tools: self.tools.clone(),
            context: ToolContext {
                mode: self.mode,
                account_id: None,
            },
        }
    }

    /// Validate configuration, start the service and register actions.
    ///
    /// Runs once at startup; any error aborts plugin loading.
    pub fn init(&self, config: &HashMap<String, String>, runtime: &dyn AgentRuntime) -> Result<(), PluginError> {
        debug!("Initializing {} ({})", PLUGIN_NAME, self.variant);
        let settings = PluginSettings::validate(config)?;
        debug!("Validated plugin configuration for {}", settings.account_id);

        let mut configuration = self.toolkit_configuration();
        configuration.context.account_id = settings.account_id.parse().ok();

        let service = Arc::new(HederaService::start(
            runtime,
            self.connector.as_ref(),
            configuration,
            self.timeout_secs,
        )?);

        let actions: Vec<Arc<dyn Action>> = match self.variant {
            PluginVariant::Adapter => {
                runtime.register_provider(Arc::new(AccountDetailsProvider));
                service
                    .get_tools()
                    .iter()
                    .map(|tool| {
                        Arc::new(ToolAction::for_tool(tool.as_ref(), Arc::clone(&self.audit))) as Arc<dyn Action>
                    })
                    .collect()
            }
            PluginVariant::Starter => {
                vec![Arc::new(ToolAction::create_fungible_token(Arc::clone(&self.audit)))]
            }
        };

        runtime.register_service(service);
        let count = actions.len();
        for action in actions {
            runtime.register_action(action);
        }

        info!("{} initialized with {} actions", PLUGIN_NAME, count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockConnector, MockLedger, ScriptedModel};
    use crate::runtime::LocalRuntime;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn valid_settings() -> HashMap<String, String> {
        settings(&[
            (ACCOUNT_ID_KEY, MockLedger::OPERATOR_ACCOUNT),
            (PRIVATE_KEY_KEY, MockLedger::OPERATOR_KEY),
        ])
    }

    fn runtime(settings: HashMap<String, String>) -> LocalRuntime {
        LocalRuntime::new("Hedy", settings, Arc::new(ScriptedModel::new(vec![])))
    }

    #[test]
    fn test_settings_missing_field_named() {
        let err = PluginSettings::validate(&settings(&[(PRIVATE_KEY_KEY, "abc")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid plugin configuration: HEDERA_ACCOUNT_ID: Required"
        );

        let err = PluginSettings::validate(&settings(&[(ACCOUNT_ID_KEY, "0.0.2")])).unwrap_err();
        assert!(err.to_string().contains("HEDERA_PRIVATE_KEY: Required"));
    }

    #[test]
    fn test_settings_lists_every_problem() {
        let err = PluginSettings::validate(&settings(&[(ACCOUNT_ID_KEY, "  ")])).unwrap_err();
        match err {
            ConfigError::InvalidPluginConfig(problems) => assert_eq!(
                problems,
                vec![
                    "HEDERA_PRIVATE_KEY: Required".to_string(),
                    "HEDERA_ACCOUNT_ID: must not be empty".to_string()
                ]
            ),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let settings = PluginSettings::validate(&valid_settings()).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains(MockLedger::OPERATOR_KEY));
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("Starter".parse::<PluginVariant>().unwrap(), PluginVariant::Starter);
        assert!("manual".parse::<PluginVariant>().is_err());
        assert_eq!(PluginVariant::default().to_string(), "adapter");
        assert_eq!(PluginVariant::Starter.default_modules().len(), 3);
    }

    #[test]
    fn test_adapter_init_registers_everything() {
        let runtime = runtime(valid_settings());
        let plugin = HederaPlugin::new(PluginVariant::Adapter, Arc::new(MockConnector::new()));

        plugin.init(&valid_settings(), &runtime).unwrap();

        assert!(runtime.get_service(SERVICE_TYPE).is_some());
        assert_eq!(runtime.actions().len(), 10);
        assert_eq!(runtime.providers().len(), 1);
        assert!(runtime.find_action("TRANSFER_HBAR_TOOL").is_some());
    }

    #[test]
    fn test_starter_init_registers_single_action() {
        let runtime = runtime(valid_settings());
        let plugin = HederaPlugin::new(PluginVariant::Starter, Arc::new(MockConnector::new()));

        plugin.init(&valid_settings(), &runtime).unwrap();

        let actions = runtime.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name(), "CREATE_FUNGIBLE_TOKEN_TOOL");
        assert!(runtime.find_action("HEDERA_NEW_TOKEN").is_some());
        assert!(runtime.providers().is_empty());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let runtime = runtime(HashMap::new());
        let connector = Arc::new(MockConnector::new());
        let plugin = HederaPlugin::new(PluginVariant::Adapter, connector.clone());

        let err = plugin.init(&HashMap::new(), &runtime).unwrap_err();
        assert!(matches!(
            err,
            PluginError::Config(ConfigError::InvalidPluginConfig(_))
        ));
        assert!(connector.connections().is_empty());
        assert!(runtime.actions().is_empty());
    }

    #[test]
    fn test_init_connection_failure() {
        let runtime = runtime(valid_settings());
        let plugin = HederaPlugin::new(PluginVariant::Adapter, Arc::new(MockConnector::failing("unreachable")));

        assert!(matches!(
            plugin.init(&valid_settings(), &runtime),
            Err(PluginError::Ledger(_))
        ));
        assert!(runtime.get_service(SERVICE_TYPE).is_none());
    }

    #[test]
    fn test_toolkit_configuration_overrides() {
        let plugin = HederaPlugin::new(PluginVariant::Adapter, Arc::new(MockConnector::new()))
            .with_modules(vec![CapabilityModule::CoreConsensus])
            .with_mode(AgentMode::ReturnBytes);
        let configuration = plugin.toolkit_configuration();
        assert_eq!(configuration.plugins, vec![CapabilityModule::CoreConsensus]);
        assert_eq!(configuration.context.mode, AgentMode::ReturnBytes);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.plugin.variant = "starter".to_string();
        config.audit.enabled = false;
        let plugin = HederaPlugin::from_config(&config, Arc::new(MockConnector::new())).unwrap();
        assert_eq!(plugin.variant(), PluginVariant::Starter);
        assert_eq!(
            plugin.toolkit_configuration().plugins,
            PluginVariant::Starter.default_modules()
        );

        config.toolkit.plugins = vec!["core-consensus".to_string()];
        let plugin = HederaPlugin::from_config(&config, Arc::new(MockConnector::new())).unwrap();
        assert_eq!(
            plugin.toolkit_configuration().plugins,
            vec![CapabilityModule::CoreConsensus]
        );

        config.toolkit.mode = "sideways".to_string();
        assert!(HederaPlugin::from_config(&config, Arc::new(MockConnector::new())).is_err());
    }
}
