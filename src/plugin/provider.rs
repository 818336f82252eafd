//! Operator account details for conversation state

use crate::config::ACCOUNT_ID_KEY;
use crate::runtime::{AgentRuntime, Memory, Provider, ProviderResult, State};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::error;

/// Tells the agent which account "me", "my wallet" and "the operator" refer to
pub struct AccountDetailsProvider;

#[async_trait]
impl Provider for AccountDetailsProvider {
    fn name(&self) -> &str {
        "hederaAccountDetails"
    }

    fn description(&self) -> &str {
        "Provides Hedera account details"
    }

    async fn get(&self, runtime: &dyn AgentRuntime, _message: &Memory, _state: Option<&State>) -> ProviderResult {
        let address = match runtime
            .get_setting(ACCOUNT_ID_KEY)
            .filter(|id| !id.trim().is_empty())
        {
            Some(address) => address,
            None => {
                let message = format!("{} is not set", ACCOUNT_ID_KEY);
                error!("Error in Hedera operator details provider: {}", message);
                return ProviderResult {
                    text: "Unable to retrieve operator details".to_string(),
                    values: object(json!({ "error": true })),
                    data: object(json!({ "error": message })),
                };
            }
        };

        let text = [
            "operators Hedera Account ID",
            "my Hedera Account ID",
            "my Hedera Wallet Address",
        ]
        .iter()
        .map(|question| format!("When user asks for \"{}\", respond with: {}.", question, address))
        .collect::<Vec<_>>()
        .join("\n");

        ProviderResult {
            text,
            values: object(json!({
                "operatorAccountId": address,
                "operatorAddress": address,
                "myAccountId": address,
            })),
            data: object(json!({
                "hederaAccountId": address,
                "operatorInfo": {
                    "accountId": address,
                    "aliases": ["operator", "me", "myself", "I", "we"],
                },
                "myInfo": {
                    "accountId": address,
                    "aliases": ["me", "myself", "I", "we"],
                },
            })),
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
