//! Prompt templates for parameter extraction and response summaries

use crate::error::ActionError;
use crate::runtime::State;
use crate::schema::{FieldKind, ParameterSchema};
use crate::toolkit::Tool;
use serde_json::Value;
use tera::{Context, Tera};

/// Variables every template may reference, even before any provider ran
const STATE_KEYS: [&str; 3] = ["recentMessages", "providers", "agentName"];

/// Hand-written extraction prompt for fungible token creation
pub const CREATE_FUNGIBLE_TOKEN_TEMPLATE: &str = r#"Given the recent messages and Hedera wallet information below:
{{recentMessages}}

Extract the following parameters required to create a fungible token on the Hedera network.

### Required:
- **tokenName** (string): The name of the token to create.

### Optional (Include only if **explicitly mentioned** in the latest user message):
- **tokenSymbol** (string): The symbol of the token (e.g., "MTK").
- **initialSupply** (integer): The initial supply of the token.
- **supplyType** (string): Can be "finite" or "infinite".
- **maxSupply** (integer): The maximum supply of the token. Only relevant if supplyType is "finite".
- **decimals** (integer): Number of decimal places the token supports.
- **treasuryAccountId** (string): The Hedera account ID of the treasury (e.g., "0.0.123456").
- **isSupplyKey** (boolean): Indicates whether a supply key should be set. Set to `true` if user wants to mint more tokens. Set to `false` if user says the supply is final or fixed.

⚠️ Do **not** assume values or apply defaults. Do **not** set a field unless it is clearly specified in the latest user input.

---

### Response format:

Respond with a JSON markdown block that includes **only** the fields that were explicitly mentioned in the most recent user message.

```json
{
  "tokenName": string,
  // Optional fields only if present in input:
  // "tokenSymbol": string,
  // "initialSupply": number,
  // "supplyType": "finite" | "infinite",
  // "maxSupply": number,
  // "decimals": number,
  // "treasuryAccountId": string,
  // "isSupplyKey": boolean
}
```

---

### Example

#### Input:
"Create new token with name MyToken with symbol MTK, 8 decimals and 1000 initial supply. The supply is fixed, don't allow further minting."

#### Output:
```json
{
  "tokenName": "MyToken",
  "tokenSymbol": "MTK",
  "initialSupply": 1000,
  "decimals": 8,
  "isSupplyKey": false
}
```

---

Always extract values **only from the last user message**. Do not infer or carry forward values from previous interactions.
"#;

/// Build an extraction prompt from a tool's declared parameters
pub fn extraction_template(tool: &dyn Tool) -> String {
    let mut template = String::from(
        "Given the recent messages and Hedera wallet information below:\n{{recentMessages}}\n\n{{providers}}\n\n",
    );
    template.push_str(&format!(
        "Extract the parameters required by the **{}** tool on the Hedera network: {}\n\n",
        escape(tool.name()),
        escape(tool.description())
    ));

    match tool.parameters() {
        ParameterSchema::Object(fields) if !fields.is_empty() => {
            let (required, optional): (Vec<_>, Vec<_>) =
                fields.iter().partition(|f| f.kind.is_required());

            if !required.is_empty() {
                template.push_str("### Required:\n");
                for field in &required {
                    template.push_str(&format!(
                        "- **{}** ({}): {}\n",
                        field.name,
                        field.kind.type_name(),
                        escape(&field.description)
                    ));
                }
                template.push('\n');
            }

            if !optional.is_empty() {
                template.push_str(
                    "### Optional (Include only if **explicitly mentioned** in the latest user message):\n",
                );
                for field in &optional {
                    let default = match &field.kind {
                        FieldKind::Default(_, value) => format!(" Defaults to {}.", value),
                        _ => String::new(),
                    };
                    template.push_str(&format!(
                        "- **{}** ({}): {}{}\n",
                        field.name,
                        field.kind.type_name(),
                        escape(&field.description),
                        default
                    ));
                }
                template.push('\n');
            }
        }
        ParameterSchema::Object(_) => template.push_str("This tool takes no parameters.\n\n"),
        ParameterSchema::Opaque(schema) => {
            template.push_str("### Parameters (JSON schema):\n```json\n");
            template.push_str(&escape(&schema.to_string()));
            template.push_str("\n```\n\n");
        }
    }

    template.push_str(
        "Do **not** assume values. Respond with a JSON markdown block containing only the fields \
         that were explicitly mentioned in the most recent user message.\n\n\
         Always extract values **only from the last user message**.\n",
    );
    template
}

/// Render a template with the values of the conversation state
pub fn compose_prompt(state: &State, template: &str) -> Result<String, ActionError> {
    let mut context = Context::new();
    for key in STATE_KEYS {
        context.insert(key, "");
    }
    for (key, value) in &state.values {
        context.insert(key.as_str(), value);
    }

    Tera::default()
        .render_str(template, &context)
        .map_err(|e| ActionError::Prompt(e.to_string()))
}

/// Prompt asking the small model to summarize a tool result
pub fn response_prompt(data: &Value, tool_name: &str) -> String {
    format!(
        "Based on this data: {}\n\n\
         Generate response for {} tool.\n\
         This should be string with summary of the data in user readable format. Show only relevant information.\n\n\
         If applicable provide:\n\
         - whole transaction hash\n\
         - token details\n\
         - topic details\n\
         - smart contract details\n\
         - other relevant information\n",
        data, tool_name
    )
}

/// Keep literal text from being read as template syntax
fn escape(text: &str) -> String {
    text.replace("{{", "{ {").replace("{%", "{ %").replace("{#", "{ #")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{CreateFungibleTokenTool, GetTopicMessagesQueryTool};
    use serde_json::json;

    fn state_with_messages(messages: &str) -> State {
        let mut state = State::default();
        state
            .values
            .insert("recentMessages".to_string(), json!(messages));
        state
    }

    #[test]
    fn test_starter_template_renders() {
        let prompt = compose_prompt(
            &state_with_messages("user: Create token GameGold with symbol GG"),
            CREATE_FUNGIBLE_TOKEN_TEMPLATE,
        )
        .unwrap();
        assert!(prompt.contains("user: Create token GameGold with symbol GG"));
        assert!(prompt.contains("\"supplyType\": \"finite\" | \"infinite\""));
        assert!(!prompt.contains("{{recentMessages}}"));
    }

    #[test]
    fn test_missing_state_values_render_empty() {
        let prompt = compose_prompt(&State::default(), "[{{recentMessages}}][{{agentName}}]").unwrap();
        assert_eq!(prompt, "[][]");
    }

    #[test]
    fn test_unknown_variable_is_error() {
        let err = compose_prompt(&State::default(), "{{walletBalance}}").unwrap_err();
        assert!(matches!(err, ActionError::Prompt(_)));
    }

    #[test]
    fn test_generated_template_lists_fields() {
        let tool = CreateFungibleTokenTool::new();
        let template = extraction_template(&tool);
        assert!(template.contains("### Required:\n- **tokenName** (string)"));
        assert!(template.contains("- **supplyType** (\"finite\" | \"infinite\")"));
        assert!(template.contains("**decimals** (integer)"));
        assert!(template.contains("Defaults to 0."));

        let prompt = compose_prompt(&state_with_messages("user: hi"), &template).unwrap();
        assert!(prompt.contains("user: hi"));
    }

    #[test]
    fn test_generated_template_topic_messages() {
        let tool = GetTopicMessagesQueryTool::new();
        let template = extraction_template(&tool);
        assert!(template.contains("### Required:\n- **topicId**"));
        assert!(template.contains("Defaults to 10."));
    }

    #[test]
    fn test_response_prompt() {
        let prompt = response_prompt(&json!({"humanMessage": "done"}), "CREATE_TOPIC_TOOL");
        assert!(prompt.starts_with("Based on this data: {\"humanMessage\":\"done\"}"));
        assert!(prompt.contains("Generate response for CREATE_TOPIC_TOOL tool."));
        assert!(prompt.contains("- whole transaction hash"));
    }
}
