//! Error types for hedera-agent-plugin

use thiserror::Error;

/// Main error type for plugin startup
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid plugin configuration: {}", .0.join(", "))]
    InvalidPluginConfig(Vec<String>),
}

/// Model-related errors
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse AI response: {0}")]
    Parse(String),

    #[error("AI unavailable: {0}")]
    Unavailable(String),
}

/// Ledger client errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Mirror node error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse ledger response: {0}")]
    Parse(String),

    #[error("Invalid entity id '{0}': expected shard.realm.num")]
    InvalidEntityId(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Tool execution errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

/// Errors raised by an action handler before a tool runs
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("State is undefined")]
    MissingState,

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Failed to compose prompt: {0}")]
    Prompt(String),

    #[error("Model error: {0}")]
    Model(#[from] AiError),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action {0} is not available")]
    NotAvailable(String),
}

/// Result type alias using PluginError
pub type Result<T> = std::result::Result<T, PluginError>;
