//! Configuration management for hedera-agent-plugin
//!
//! Handles loading and merging configuration from multiple sources:
//! 1. Compiled defaults
//! 2. User config (~/.hedera-agent/config.toml)
//! 3. CLI-specified config file
//! 4. Environment variables

use crate::error::ConfigError;
use crate::ledger::LedgerNetwork;
use crate::plugin::PluginVariant;
use crate::toolkit::{AgentMode, CapabilityModule};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings key of the operator account id
pub const ACCOUNT_ID_KEY: &str = "HEDERA_ACCOUNT_ID";
/// Settings key of the operator private key
pub const PRIVATE_KEY_KEY: &str = "HEDERA_PRIVATE_KEY";
/// Settings key of the network name
pub const NETWORK_KEY: &str = "HEDERA_NETWORK";
/// Settings key of the mirror node URL override
pub const MIRROR_NODE_URL_KEY: &str = "HEDERA_MIRROR_NODE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hedera: HederaConfig,
    pub toolkit: ToolkitConfig,
    pub plugin: PluginSection,
    pub ai: AiConfig,
    pub audit: AuditConfig,
}

/// Network and operator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HederaConfig {
    /// Operator account id (prefer HEDERA_ACCOUNT_ID)
    pub account_id: Option<String>,
    /// Operator private key (prefer HEDERA_PRIVATE_KEY)
    pub private_key: Option<String>,
    /// testnet, mainnet or previewnet
    pub network: String,
    /// Mirror node base URL override
    pub mirror_node_url: Option<String>,
    /// Ledger request timeout in seconds
    pub timeout: u64,
}

/// Toolkit selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Capability modules to enable
    pub plugins: Vec<String>,
    /// Tool methods to expose; empty means every tool of the modules
    pub tools: Vec<String>,
    /// autonomous or return-bytes
    pub mode: String,
}

/// Which plugin flavour to register
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSection {
    /// adapter or starter
    pub variant: String,
}

/// AI/LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Chat completions endpoint URL
    pub endpoint: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Model used for response summaries
    pub small_model: String,
    /// Model used for parameter extraction
    pub large_model: String,
    /// Maximum tokens for response
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Temperature for generation
    pub temperature: f32,
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record action invocations
    pub enabled: bool,
    /// Log file path
    pub path: PathBuf,
    /// Maximum log file size before rotation
    pub max_log_size: u64,
    /// Number of rotated logs to keep
    pub log_retention: u32,
    /// Redact secrets from logs
    pub redact_secrets: bool,
}

// Default implementations

impl Default for HederaConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            private_key: None,
            network: "testnet".to_string(),
            mirror_node_url: None,
            timeout: 30,
        }
    }
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            plugins: CapabilityModule::ALL
                .iter()
                .map(|m| m.name().to_string())
                .collect(),
            tools: vec![],
            mode: "autonomous".to_string(),
        }
    }
}

impl Default for PluginSection {
    fn default() -> Self {
        Self {
            variant: "adapter".to_string(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            small_model: "gpt-4o-mini".to_string(),
            large_model: "gpt-4o".to_string(),
            max_tokens: 2048,
            timeout: 30,
            temperature: 0.2,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            enabled: true,
            path: home.join(".hedera-agent/logs/actions.log"),
            max_log_size: 10 * 1024 * 1024, // 10MB
            log_retention: 5,
            redact_secrets: true,
        }
    }
}

impl AiConfig {
    /// Get API key from environment
    pub fn get_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(cli_config: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Load user config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hedera-agent/config.toml");
            if user_config.exists() {
                debug!("Loading user config from {:?}", user_config);
                config.merge_from_file(&user_config)?;
            }
        }

        // Load CLI-specified config
        if let Some(path) = cli_config {
            debug!("Loading CLI config from {:?}", path);
            config.merge_from_file(path)?;
        }

        // Apply environment overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Merge configuration from a file
    fn merge_from_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        let file_config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        self.merge(file_config);
        Ok(())
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        // Hedera config
        if other.hedera.account_id.is_some() {
            self.hedera.account_id = other.hedera.account_id;
        }
        if other.hedera.private_key.is_some() {
            self.hedera.private_key = other.hedera.private_key;
        }
        if other.hedera.network != HederaConfig::default().network {
            self.hedera.network = other.hedera.network;
        }
        if other.hedera.mirror_node_url.is_some() {
            self.hedera.mirror_node_url = other.hedera.mirror_node_url;
        }
        if other.hedera.timeout != HederaConfig::default().timeout {
            self.hedera.timeout = other.hedera.timeout;
        }

        // Toolkit config
        if other.toolkit.plugins != ToolkitConfig::default().plugins {
            self.toolkit.plugins = other.toolkit.plugins;
        }
        if !other.toolkit.tools.is_empty() {
            self.toolkit.tools = other.toolkit.tools;
        }
        if other.toolkit.mode != ToolkitConfig::default().mode {
            self.toolkit.mode = other.toolkit.mode;
        }

        if other.plugin.variant != PluginSection::default().variant {
            self.plugin.variant = other.plugin.variant;
        }

        // AI config
        let ai_default = AiConfig::default();
        if other.ai.endpoint != ai_default.endpoint {
            self.ai.endpoint = other.ai.endpoint;
        }
        if other.ai.api_key_env != ai_default.api_key_env {
            self.ai.api_key_env = other.ai.api_key_env;
        }
        if other.ai.small_model != ai_default.small_model {
            self.ai.small_model = other.ai.small_model;
        }
        if other.ai.large_model != ai_default.large_model {
            self.ai.large_model = other.ai.large_model;
        }
        if other.ai.max_tokens != ai_default.max_tokens {
            self.ai.max_tokens = other.ai.max_tokens;
        }
        if other.ai.timeout != ai_default.timeout {
            self.ai.timeout = other.ai.timeout;
        }
        if other.ai.temperature != ai_default.temperature {
            self.ai.temperature = other.ai.temperature;
        }

        // Audit config - always take explicit values
        self.audit = other.audit;
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(ACCOUNT_ID_KEY) {
            self.hedera.account_id = Some(id);
        }
        if let Some(key) = lookup(PRIVATE_KEY_KEY) {
            self.hedera.private_key = Some(key);
        }
        if let Some(network) = lookup(NETWORK_KEY) {
            self.hedera.network = network;
        }
        if let Some(url) = lookup(MIRROR_NODE_URL_KEY) {
            self.hedera.mirror_node_url = Some(url);
        }
        if let Some(mode) = lookup("HEDERA_AGENT_MODE") {
            self.toolkit.mode = mode;
        }
        if let Some(variant) = lookup("HEDERA_PLUGIN_VARIANT") {
            self.plugin.variant = variant;
        }
        if let Some(path) = lookup("HEDERA_AGENT_AUDIT_LOG") {
            self.audit.path = PathBuf::from(path);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hedera
            .network
            .parse::<LedgerNetwork>()
            .map_err(|e| ConfigError::Invalid(format!("hedera.network: {}", e)))?;
        self.agent_mode()?;
        self.capability_modules()?;
        self.variant()?;

        if self.ai.endpoint.is_empty() {
            return Err(ConfigError::MissingField("ai.endpoint".to_string()));
        }
        if self.ai.small_model.is_empty() || self.ai.large_model.is_empty() {
            return Err(ConfigError::MissingField("ai.small_model/ai.large_model".to_string()));
        }

        Ok(())
    }

    /// Enabled capability modules
    pub fn capability_modules(&self) -> Result<Vec<CapabilityModule>, ConfigError> {
        if self.toolkit.plugins.is_empty() {
            return Err(ConfigError::MissingField("toolkit.plugins".to_string()));
        }
        self.toolkit
            .plugins
            .iter()
            .map(|name| name.parse().map_err(ConfigError::Invalid))
            .collect()
    }

    /// Capability modules named explicitly, or `None` when `[toolkit].plugins`
    /// is left at its default so the plugin variant chooses
    pub fn explicit_capability_modules(&self) -> Result<Option<Vec<CapabilityModule>>, ConfigError> {
        let modules = self.capability_modules()?;
        if self.toolkit.plugins == ToolkitConfig::default().plugins {
            return Ok(None);
        }
        Ok(Some(modules))
    }

    pub fn agent_mode(&self) -> Result<AgentMode, ConfigError> {
        self.toolkit.mode.parse().map_err(ConfigError::Invalid)
    }

    pub fn variant(&self) -> Result<PluginVariant, ConfigError> {
        self.plugin.variant.parse().map_err(ConfigError::Invalid)
    }

    /// Runtime settings derived from the configuration
    pub fn settings(&self) -> HashMap<String, String> {
        let mut settings = HashMap::new();
        if let Some(id) = &self.hedera.account_id {
            settings.insert(ACCOUNT_ID_KEY.to_string(), id.clone());
        }
        if let Some(key) = &self.hedera.private_key {
            settings.insert(PRIVATE_KEY_KEY.to_string(), key.clone());
        }
        settings.insert(NETWORK_KEY.to_string(), self.hedera.network.clone());
        if let Some(url) = &self.hedera.mirror_node_url {
            settings.insert(MIRROR_NODE_URL_KEY.to_string(), url.clone());
        }
        settings
    }
}
