//! Command-line argument parsing for hedera-agent

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hedera-agent - Hedera network actions for conversational agents
#[derive(Parser, Debug)]
#[command(name = "hedera-agent")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Plugin variant: adapter or starter
    #[arg(long, value_name = "VARIANT", global = true)]
    pub variant: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Validate configuration and operator settings
    Check,

    /// List the actions the plugin registers
    Actions,

    /// Show the operator account balance
    Account,

    /// Run one action against a message
    Run {
        /// Action name or simile, e.g. CREATE_FUNGIBLE_TOKEN_TOOL
        #[arg(short, long)]
        action: String,

        /// The user message
        message: String,

        /// Print the action result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_check() {
        let args = Args::parse_from(["hedera-agent", "check"]);
        assert_eq!(args.command, Command::Check);
        assert!(args.config.is_none());
        assert!(!args.debug);
    }

    #[test]
    fn test_args_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "hedera-agent",
            "actions",
            "--debug",
            "--config",
            "/tmp/config.toml",
            "--variant",
            "starter",
        ]);
        assert!(args.debug);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/config.toml")));
        assert_eq!(args.variant.as_deref(), Some("starter"));
    }

    #[test]
    fn test_args_run() {
        let args = Args::parse_from([
            "hedera-agent",
            "run",
            "-a",
            "HEDERA_NEW_TOKEN",
            "Create token GameGold",
        ]);
        assert_eq!(
            args.command,
            Command::Run {
                action: "HEDERA_NEW_TOKEN".to_string(),
                message: "Create token GameGold".to_string(),
                json: false,
            }
        );
    }

    #[test]
    fn test_args_require_subcommand() {
        assert!(Args::try_parse_from(["hedera-agent"]).is_err());
    }
}
