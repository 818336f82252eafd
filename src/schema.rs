//! Declared parameter schemas
//!
//! Tools describe their parameters with explicit field kinds. The same
//! declaration drives model prompts, numeric coercion and validation.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Kind of a single declared field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    /// String restricted to the listed values
    Enum(Vec<String>),
    /// Field may be absent
    Optional(Box<FieldKind>),
    /// Field may be absent, in which case the value is filled in
    Default(Box<FieldKind>, Value),
}

impl FieldKind {
    /// Wrap a kind as optional
    pub fn optional(inner: FieldKind) -> Self {
        FieldKind::Optional(Box::new(inner))
    }

    /// Wrap a kind with a default value
    pub fn with_default(inner: FieldKind, value: Value) -> Self {
        FieldKind::Default(Box::new(inner), value)
    }

    /// Build an enum kind from string slices
    pub fn one_of(values: &[&str]) -> Self {
        FieldKind::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// The kind underneath any optional/default wrapping
    pub fn base(&self) -> &FieldKind {
        let mut kind = self;
        while let FieldKind::Optional(inner) | FieldKind::Default(inner, _) = kind {
            kind = inner.as_ref();
        }
        kind
    }

    /// Whether values of this kind are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self.base(), FieldKind::Number | FieldKind::Integer)
    }

    /// Whether the field must be present in the input
    pub fn is_required(&self) -> bool {
        !matches!(self, FieldKind::Optional(_) | FieldKind::Default(_, _))
    }

    /// Short type name used in prompts
    pub fn type_name(&self) -> String {
        match self.base() {
            FieldKind::String => "string".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Enum(values) => values
                .iter()
                .map(|v| format!("\"{}\"", v))
                .collect::<Vec<_>>()
                .join(" | "),
            FieldKind::Optional(_) | FieldKind::Default(_, _) => unreachable!("base() unwraps"),
        }
    }

    /// Check a field value, returning the value to keep (if any)
    fn check(&self, value: Option<&Value>) -> std::result::Result<Option<Value>, String> {
        let value = value.filter(|v| !v.is_null());

        match self {
            FieldKind::Optional(inner) => match value {
                None => Ok(None),
                Some(v) => inner.check(Some(v)),
            },
            FieldKind::Default(inner, default) => match value {
                None => Ok(Some(default.clone())),
                Some(v) => inner.check(Some(v)),
            },
            _ => {
                let v = value.ok_or_else(|| "Required".to_string())?;
                self.check_present(v)?;
                // 1000.0 is kept as 1000 so integer fields deserialize cleanly
                match (self, v.as_f64()) {
                    (FieldKind::Integer, Some(f)) if !v.is_i64() && !v.is_u64() => {
                        integral_value(f).map(Some)
                    }
                    _ => Ok(Some(v.clone())),
                }
            }
        }
    }

    fn check_present(&self, v: &Value) -> std::result::Result<(), String> {
        match self {
            FieldKind::String if v.is_string() => Ok(()),
            FieldKind::Number if v.is_number() => Ok(()),
            FieldKind::Integer if v.is_i64() || v.is_u64() => Ok(()),
            FieldKind::Integer if v.as_f64().is_some_and(|f| f.fract() == 0.0) => Ok(()),
            FieldKind::Integer if v.is_number() => {
                Err("Expected integer, received float".to_string())
            }
            FieldKind::Boolean if v.is_boolean() => Ok(()),
            FieldKind::Enum(values) => match v.as_str() {
                Some(s) if values.iter().any(|allowed| allowed == s) => Ok(()),
                Some(s) => Err(format!(
                    "Invalid enum value. Expected {}, received '{}'",
                    values
                        .iter()
                        .map(|v| format!("'{}'", v))
                        .collect::<Vec<_>>()
                        .join(" | "),
                    s
                )),
                None => Err(format!("Expected string, received {}", value_type(v))),
            },
            other => Err(format!(
                "Expected {}, received {}",
                other.type_name(),
                value_type(v)
            )),
        }
    }
}

/// A named, documented field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
        }
    }
}

/// Schema could not be inspected for field kinds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema does not declare its fields")]
    NotIntrospectable,
}

/// Parameter schema of a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSchema {
    /// Object with explicitly declared fields
    Object(Vec<FieldSpec>),
    /// Schema supplied without field declarations (e.g. a raw JSON schema)
    Opaque(Value),
}

impl ParameterSchema {
    pub fn object(fields: Vec<FieldSpec>) -> Self {
        ParameterSchema::Object(fields)
    }

    /// Declared fields
    pub fn fields(&self) -> std::result::Result<&[FieldSpec], SchemaError> {
        match self {
            ParameterSchema::Object(fields) => Ok(fields),
            ParameterSchema::Opaque(_) => Err(SchemaError::NotIntrospectable),
        }
    }

    /// Names of fields declared as numbers, under any wrapping
    pub fn numeric_fields(&self) -> std::result::Result<Vec<&str>, SchemaError> {
        Ok(self
            .fields()?
            .iter()
            .filter(|f| f.kind.is_numeric())
            .map(|f| f.name.as_str())
            .collect())
    }

    /// Validate an input object.
    ///
    /// Defaults are applied and undeclared keys are dropped. Opaque schemas
    /// accept any object unchanged.
    pub fn safe_parse(&self, input: &Value) -> std::result::Result<Map<String, Value>, SchemaIssues> {
        let object = match input.as_object() {
            Some(o) => o,
            None => {
                return Err(SchemaIssues {
                    issues: vec![Issue {
                        path: None,
                        message: format!("Expected object, received {}", value_type(input)),
                    }],
                })
            }
        };

        let fields = match self {
            ParameterSchema::Opaque(_) => return Ok(object.clone()),
            ParameterSchema::Object(fields) => fields,
        };

        let mut output = Map::new();
        let mut issues = Vec::new();

        for field in fields {
            match field.kind.check(object.get(&field.name)) {
                Ok(Some(value)) => {
                    output.insert(field.name.clone(), value);
                }
                Ok(None) => {}
                Err(message) => issues.push(Issue {
                    path: Some(field.name.clone()),
                    message,
                }),
            }
        }

        if issues.is_empty() {
            Ok(output)
        } else {
            Err(SchemaIssues { issues })
        }
    }
}

/// A single validation problem
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Field name, or `None` for the object itself
    pub path: Option<String>,
    pub message: String,
}

/// Validation failure listing every problem found
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssues {
    pub issues: Vec<Issue>,
}

impl SchemaIssues {
    /// Error tree keyed by field name
    pub fn format(&self) -> Value {
        let mut root = Map::new();
        let mut root_errors = Vec::new();

        for issue in &self.issues {
            match &issue.path {
                None => root_errors.push(Value::String(issue.message.clone())),
                Some(field) => {
                    let entry = root
                        .entry(field.clone())
                        .or_insert_with(|| serde_json::json!({ "_errors": [] }));
                    if let Some(errors) = entry.get_mut("_errors").and_then(Value::as_array_mut) {
                        errors.push(Value::String(issue.message.clone()));
                    }
                }
            }
        }

        root.insert("_errors".to_string(), Value::Array(root_errors));
        Value::Object(root)
    }
}

impl fmt::Display for SchemaIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .issues
            .iter()
            .map(|issue| match &issue.path {
                Some(field) => format!("{}: {}", field, issue.message),
                None => issue.message.clone(),
            })
            .collect();
        write!(f, "{}", lines.join("; "))
    }
}

impl std::error::Error for SchemaIssues {}

fn value_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integral float as an exact integer, rejecting values no integer type holds
fn integral_value(f: f64) -> std::result::Result<Value, String> {
    // 2^64 and -2^63 are exact in f64
    const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;
    const I64_FLOOR: f64 = -9_223_372_036_854_775_808.0;

    if f >= U64_LIMIT {
        Err(format!("Number must be less than or equal to {}", u64::MAX))
    } else if f < I64_FLOOR {
        Err(format!("Number must be greater than or equal to {}", i64::MIN))
    } else if f < 0.0 {
        Ok(Value::from(f as i64))
    } else {
        Ok(Value::from(f as u64))
    }
}
