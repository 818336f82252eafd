//! Audit trail for action invocations
//!
//! Every action run is recorded as one JSON line: invoked, then exactly
//! one of succeeded, rejected (invalid parameters) or failed.

use crate::config::AuditConfig;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Session ID for the current process
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Secret patterns for redaction
static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // API keys, tokens, private keys given as key=value
        r#"(?i)(api[_-]?key|private[_-]?key|token|secret|password|passwd|pwd)\s*[=:]\s*['"]?([^'"\s]+)['"]?"#,
        // Bearer tokens
        r"(?i)bearer\s+[a-zA-Z0-9._-]+",
        // PEM headers
        r"-----BEGIN\s+(?:[A-Z]+\s+)?PRIVATE\s+KEY-----",
        // Long hex or base64-ish strings (raw and DER encoded keys)
        r"[a-zA-Z0-9_-]{32,}",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Audit entry structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// Action name, e.g. `CREATE_FUNGIBLE_TOKEN_TOOL`
    pub action: String,
    /// Text of the triggering message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Validated tool parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Result summary or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Types of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Invoked,
    Succeeded,
    Rejected,
    Failed,
}

/// Append-only JSONL audit log shared by all actions
pub struct AuditLogger {
    config: AuditConfig,
    log_file: Mutex<Option<BufWriter<File>>>,
}

impl AuditLogger {
    pub fn new(config: AuditConfig) -> Self {
        let log_file = if config.enabled {
            Self::open_log_file(&config.path)
        } else {
            None
        };

        Self {
            config,
            log_file: Mutex::new(log_file),
        }
    }

    /// Logger that records nothing
    pub fn disabled() -> Self {
        Self::new(AuditConfig {
            enabled: false,
            ..AuditConfig::default()
        })
    }

    fn open_log_file(path: &Path) -> Option<BufWriter<File>> {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create audit log directory: {}", e);
                return None;
            }
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                error!("Failed to open audit log {:?}: {}", path, e);
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        self.log_file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn log_invoked(&self, action: &str, request: &str) {
        self.record(AuditEvent::Invoked, action, Some(request), None, None, None);
    }

    pub fn log_succeeded(&self, action: &str, params: &Value, summary: &str, duration_ms: u64) {
        self.record(
            AuditEvent::Succeeded,
            action,
            None,
            Some(params),
            Some(summary),
            Some(duration_ms),
        );
    }

    /// Parameters failed schema validation
    pub fn log_rejected(&self, action: &str, issues: &str) {
        self.record(AuditEvent::Rejected, action, None, None, Some(issues), None);
    }

    pub fn log_failed(&self, action: &str, params: &Value, error: &str, duration_ms: u64) {
        self.record(
            AuditEvent::Failed,
            action,
            None,
            Some(params),
            Some(error),
            Some(duration_ms),
        );
    }

    fn record(
        &self,
        event: AuditEvent,
        action: &str,
        request: Option<&str>,
        params: Option<&Value>,
        detail: Option<&str>,
        duration_ms: Option<u64>,
    ) {
        if !self.config.enabled {
            return;
        }

        let entry = AuditEntry {
            session_id: SESSION_ID.clone(),
            timestamp: Utc::now(),
            event,
            action: action.to_string(),
            request: request.map(|r| truncate_preview(&self.redact_if_needed(r))),
            params: params.map(|p| self.redact_value(p)),
            detail: detail.map(|d| truncate_preview(&self.redact_if_needed(d))),
            duration_ms,
        };

        self.maybe_rotate();
        self.write_entry(&entry);
    }

    fn write_entry(&self, entry: &AuditEntry) {
        let mut guard = self.lock();
        if let Some(ref mut file) = *guard {
            match serde_json::to_string(entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{}", json) {
                        error!("Failed to write audit entry: {}", e);
                    }
                    if let Err(e) = file.flush() {
                        warn!("Failed to flush audit log: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize audit entry: {}", e);
                }
            }
        }
    }

    fn redact_if_needed(&self, text: &str) -> String {
        if self.config.redact_secrets {
            redact_secrets(text)
        } else {
            text.to_string()
        }
    }

    fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.redact_if_needed(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.redact_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Rotate the log file once it exceeds the configured size
    pub fn maybe_rotate(&self) {
        if !self.config.enabled {
            return;
        }

        if let Ok(metadata) = fs::metadata(&self.config.path) {
            if metadata.len() > self.config.max_log_size {
                self.rotate_logs();
            }
        }
    }

    fn rotate_logs(&self) {
        let path = &self.config.path;
        debug!("Rotating audit logs");

        let mut guard = self.lock();
        *guard = None;

        for i in (1..self.config.log_retention).rev() {
            let old = format!("{}.{}", path.display(), i);
            let new = format!("{}.{}", path.display(), i + 1);
            let _ = fs::rename(&old, &new);
        }

        let rotated = format!("{}.1", path.display());
        let _ = fs::rename(path, &rotated);

        *guard = Self::open_log_file(path);
    }

    pub fn session_id() -> &'static str {
        &SESSION_ID
    }
}

/// Redact secrets from text
pub fn redact_secrets(text: &str) -> String {
    let mut result = text.to_string();

    for pattern in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    result
}

fn truncate_preview(text: &str) -> String {
    const MAX_PREVIEW: usize = 500;
    if text.len() > MAX_PREVIEW {
        let mut end = MAX_PREVIEW;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &text[..end])
    } else {
        text.to_string()
    }
}
