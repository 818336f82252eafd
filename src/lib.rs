//! hedera-agent-plugin - Hedera network operations as conversational agent actions
//!
//! The [`plugin`] module is the entry point: it validates operator settings,
//! connects a ledger client, and registers actions, a provider and the
//! Hedera service with an [`runtime::AgentRuntime`].

pub mod audit;
pub mod coerce;
pub mod config;
pub mod error;
pub mod ledger;
pub mod llm;
pub mod mocks;
pub mod plugin;
pub mod runtime;
pub mod schema;
pub mod toolkit;

pub use error::{PluginError, Result};
pub use plugin::{HederaPlugin, PluginVariant};
