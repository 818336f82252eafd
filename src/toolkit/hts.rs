//! Token service tools

use super::{parse_params, resolve_account, submit_or_prepare, tool_output, Outcome, Tool, ToolContext};
use crate::error::ToolError;
use crate::ledger::{
    FungibleTokenSpec, LedgerClient, LedgerTransaction, NonFungibleTokenSpec, SupplyType,
};
use crate::schema::{FieldKind, FieldSpec, ParameterSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Creates a fungible token
pub struct CreateFungibleTokenTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFungibleTokenParams {
    token_name: String,
    token_symbol: Option<String>,
    #[serde(default)]
    initial_supply: u64,
    supply_type: Option<SupplyType>,
    max_supply: Option<u64>,
    #[serde(default)]
    decimals: u32,
    treasury_account_id: Option<String>,
    is_supply_key: Option<bool>,
}

impl CreateFungibleTokenTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![
                FieldSpec::new("tokenName", FieldKind::String, "The name of the token to create"),
                FieldSpec::new(
                    "tokenSymbol",
                    FieldKind::optional(FieldKind::String),
                    "The symbol of the token (e.g. \"MTK\")",
                ),
                FieldSpec::new(
                    "initialSupply",
                    FieldKind::with_default(FieldKind::Integer, json!(0)),
                    "The initial supply of the token",
                ),
                FieldSpec::new(
                    "supplyType",
                    FieldKind::optional(FieldKind::one_of(&["finite", "infinite"])),
                    "Whether the supply is capped",
                ),
                FieldSpec::new(
                    "maxSupply",
                    FieldKind::optional(FieldKind::Integer),
                    "The maximum supply, only for a finite supply",
                ),
                FieldSpec::new(
                    "decimals",
                    FieldKind::with_default(FieldKind::Integer, json!(0)),
                    "Number of decimal places the token supports",
                ),
                FieldSpec::new(
                    "treasuryAccountId",
                    FieldKind::optional(FieldKind::String),
                    "Treasury account (e.g. \"0.0.123456\"), defaults to the operator",
                ),
                FieldSpec::new(
                    "isSupplyKey",
                    FieldKind::optional(FieldKind::Boolean),
                    "Whether a supply key is set so more tokens can be minted",
                ),
            ]),
        }
    }
}

impl Default for CreateFungibleTokenTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CreateFungibleTokenTool {
    fn method(&self) -> &str {
        "create_fungible_token_tool"
    }

    fn name(&self) -> &str {
        "Create Fungible Token"
    }

    fn description(&self) -> &str {
        "Create a new fungible token on the Hedera network"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: CreateFungibleTokenParams = parse_params(params)?;
        let treasury = resolve_account(params.treasury_account_id.as_deref(), client, context)?;

        // A max supply only makes sense for a capped token
        let supply_type = params.supply_type.unwrap_or(if params.max_supply.is_some() {
            SupplyType::Finite
        } else {
            SupplyType::Infinite
        });

        if supply_type == SupplyType::Finite {
            let max = params.max_supply.ok_or_else(|| {
                ToolError::InvalidParams("maxSupply is required for a finite supply".to_string())
            })?;
            if max < params.initial_supply {
                return Err(ToolError::InvalidParams(format!(
                    "initialSupply {} exceeds maxSupply {}",
                    params.initial_supply, max
                )));
            }
        }

        let spec = FungibleTokenSpec {
            symbol: params
                .token_symbol
                .unwrap_or_else(|| derive_symbol(&params.token_name)),
            name: params.token_name,
            decimals: params.decimals,
            initial_supply: params.initial_supply,
            supply_type,
            max_supply: match supply_type {
                SupplyType::Finite => params.max_supply,
                SupplyType::Infinite => None,
            },
            treasury_account_id: treasury,
            supply_key: params
                .is_supply_key
                .unwrap_or(supply_type == SupplyType::Infinite),
        };

        let name = spec.name.clone();
        let outcome = submit_or_prepare(client, context, LedgerTransaction::CreateFungibleToken(spec)).await?;
        let message = match &outcome {
            Outcome::Submitted(receipt) => format!(
                "Token {} created successfully at address {} with transaction id {}",
                name,
                receipt
                    .entity_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                receipt.transaction_id
            ),
            Outcome::Prepared(_) => format!("Prepared token creation transaction for {}", name),
        };

        Ok(tool_output(outcome.raw(), message))
    }
}

/// Creates a non-fungible token collection
pub struct CreateNonFungibleTokenTool {
    parameters: ParameterSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNonFungibleTokenParams {
    token_name: String,
    token_symbol: Option<String>,
    max_supply: Option<u64>,
    treasury_account_id: Option<String>,
}

impl CreateNonFungibleTokenTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::object(vec![
                FieldSpec::new("tokenName", FieldKind::String, "The name of the collection"),
                FieldSpec::new(
                    "tokenSymbol",
                    FieldKind::optional(FieldKind::String),
                    "The symbol of the collection",
                ),
                FieldSpec::new(
                    "maxSupply",
                    FieldKind::with_default(FieldKind::Integer, json!(100)),
                    "Maximum number of NFTs in the collection",
                ),
                FieldSpec::new(
                    "treasuryAccountId",
                    FieldKind::optional(FieldKind::String),
                    "Treasury account, defaults to the operator",
                ),
            ]),
        }
    }
}

impl Default for CreateNonFungibleTokenTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CreateNonFungibleTokenTool {
    fn method(&self) -> &str {
        "create_non_fungible_token_tool"
    }

    fn name(&self) -> &str {
        "Create Non-Fungible Token"
    }

    fn description(&self) -> &str {
        "Create a new non-fungible token collection on the Hedera network"
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        client: &dyn LedgerClient,
        context: &ToolContext,
        params: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let params: CreateNonFungibleTokenParams = parse_params(params)?;
        let treasury = resolve_account(params.treasury_account_id.as_deref(), client, context)?;

        let spec = NonFungibleTokenSpec {
            symbol: params
                .token_symbol
                .unwrap_or_else(|| derive_symbol(&params.token_name)),
            name: params.token_name,
            max_supply: params.max_supply,
            treasury_account_id: treasury,
        };

        let name = spec.name.clone();
        let outcome =
            submit_or_prepare(client, context, LedgerTransaction::CreateNonFungibleToken(spec)).await?;
        let message = match &outcome {
            Outcome::Submitted(receipt) => format!(
                "NFT collection {} created with token id {} (transaction {})",
                name,
                receipt
                    .entity_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                receipt.transaction_id
            ),
            Outcome::Prepared(_) => format!("Prepared NFT collection creation transaction for {}", name),
        };

        Ok(tool_output(outcome.raw(), message))
    }
}

/// Upper-cased alphanumerics of the name, at most four
fn derive_symbol(name: &str) -> String {
    let symbol: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    if symbol.is_empty() {
        "TKN".to_string()
    } else {
        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLedger;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_fungible_token_submits_spec() {
        let ledger = MockLedger::new();
        let tool = CreateFungibleTokenTool::new();
        let validated = tool
            .parameters()
            .safe_parse(&json!({"tokenName": "MyToken", "tokenSymbol": "MTK", "initialSupply": 1000, "decimals": 8}))
            .unwrap();

        let output = tool
            .execute(&ledger, &ToolContext::default(), validated)
            .await
            .unwrap();

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        match &submitted[0] {
            LedgerTransaction::CreateFungibleToken(spec) => {
                assert_eq!(spec.symbol, "MTK");
                assert_eq!(spec.initial_supply, 1000);
                assert_eq!(spec.decimals, 8);
                assert_eq!(spec.supply_type, SupplyType::Infinite);
                assert!(spec.supply_key);
                assert_eq!(spec.treasury_account_id.to_string(), MockLedger::OPERATOR_ACCOUNT);
            }
            other => panic!("unexpected transaction {:?}", other),
        }
        assert!(output["humanMessage"]
            .as_str()
            .unwrap()
            .contains("MyToken created successfully"));
        assert_eq!(output["raw"]["status"], "SUCCESS");
    }

    #[tokio::test]
    async fn test_max_supply_implies_finite() {
        let ledger = MockLedger::new();
        let tool = CreateFungibleTokenTool::new();
        tool.execute(
            &ledger,
            &ToolContext::default(),
            params(json!({"tokenName": "Capped", "initialSupply": 10, "maxSupply": 100, "isSupplyKey": false})),
        )
        .await
        .unwrap();

        match &ledger.submitted()[0] {
            LedgerTransaction::CreateFungibleToken(spec) => {
                assert_eq!(spec.supply_type, SupplyType::Finite);
                assert_eq!(spec.max_supply, Some(100));
                assert!(!spec.supply_key);
                assert_eq!(spec.symbol, "CAPP");
            }
            other => panic!("unexpected transaction {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finite_supply_checks() {
        let ledger = MockLedger::new();
        let tool = CreateFungibleTokenTool::new();

        let missing_max = tool
            .execute(
                &ledger,
                &ToolContext::default(),
                params(json!({"tokenName": "X", "supplyType": "finite"})),
            )
            .await
            .unwrap_err();
        assert!(missing_max.to_string().contains("maxSupply is required"));

        let too_big = tool
            .execute(
                &ledger,
                &ToolContext::default(),
                params(json!({"tokenName": "X", "initialSupply": 500, "maxSupply": 100})),
            )
            .await
            .unwrap_err();
        assert!(too_big.to_string().contains("exceeds maxSupply"));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_propagates() {
        let ledger = MockLedger::new().failing_submit("INSUFFICIENT_PAYER_BALANCE");
        let tool = CreateFungibleTokenTool::new();
        let err = tool
            .execute(&ledger, &ToolContext::default(), params(json!({"tokenName": "X"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INSUFFICIENT_PAYER_BALANCE"));
    }

    #[tokio::test]
    async fn test_create_nft_collection() {
        let ledger = MockLedger::new();
        let tool = CreateNonFungibleTokenTool::new();
        let validated = tool
            .parameters()
            .safe_parse(&json!({"tokenName": "Pixels", "tokenSymbol": "PXL"}))
            .unwrap();
        let output = tool
            .execute(&ledger, &ToolContext::default(), validated)
            .await
            .unwrap();

        match &ledger.submitted()[0] {
            LedgerTransaction::CreateNonFungibleToken(spec) => {
                assert_eq!(spec.max_supply, Some(100));
                assert_eq!(spec.symbol, "PXL");
            }
            other => panic!("unexpected transaction {:?}", other),
        }
        assert!(output["humanMessage"].as_str().unwrap().contains("Pixels"));
    }

    #[test]
    fn test_derive_symbol() {
        assert_eq!(derive_symbol("Game Gold"), "GAME");
        assert_eq!(derive_symbol("h$"), "H");
        assert_eq!(derive_symbol("$$"), "TKN");
    }
}
