//! Log entry and per-call logging options.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use portal_core::Severity;

/// Per-call options accepted by every logger method.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub context: Option<String>,
    pub data: Option<Value>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Forward the entry to the metrics sink (production only).
    pub forward_to_metrics: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            context: None,
            data: None,
            user_id: None,
            session_id: None,
            forward_to_metrics: true,
        }
    }
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn without_metrics(mut self) -> Self {
        self.forward_to_metrics = false;
        self
    }
}

/// A single accepted log record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    severity: Severity,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structured_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>, options: &LogOptions) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
            context: options.context.clone(),
            structured_data: options.data.clone(),
            user_id: options.user_id.clone(),
            session_id: options.session_id.clone(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn structured_data(&self) -> Option<&Value> {
        self.structured_data.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Render the entry as a single console line:
    /// `<rfc3339> [SEVERITY] [context] message {data} user=<id> session=<id>`.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} [{}]",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.severity
        );
        if let Some(ref context) = self.context {
            line.push_str(&format!(" [{}]", context));
        }
        line.push(' ');
        line.push_str(&self.message);
        if let Some(ref data) = self.structured_data {
            line.push(' ');
            line.push_str(&data.to_string());
        }
        if let Some(ref user) = self.user_id {
            line.push_str(&format!(" user={}", user));
        }
        if let Some(ref session) = self.session_id {
            line.push_str(&format!(" session={}", session));
        }
        line
    }
}
