//! Severity-filtered structured logger.
//!
//! Every accepted entry goes to the console sink. ERROR entries always bump
//! the `ErrorCount` metric; other forwarding happens only in production and
//! only when the caller leaves `forward_to_metrics` set.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use portal_core::{RuntimeProfile, Severity};

use crate::entry::{LogEntry, LogOptions};
use crate::metrics::{Delivery, Dimension, MetricUnit, MetricsSink};
use crate::sink::LogSink;

/// Context recorded when the caller supplies none.
const DEFAULT_CONTEXT: &str = "General";

/// Runtime-adjustable logger settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerOptions {
    pub min_severity: Severity,
    /// Write accepted entries to the console sink.
    pub console: bool,
    /// Forward accepted entries to metrics. Does not gate `ErrorCount`.
    pub metrics: bool,
}

impl LoggerOptions {
    pub fn for_profile(profile: RuntimeProfile) -> Self {
        Self {
            min_severity: Severity::default_for(profile),
            console: true,
            metrics: true,
        }
    }
}

/// Partial update applied by [`StructuredLogger::configure`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerPatch {
    pub min_severity: Option<Severity>,
    pub console: Option<bool>,
    pub metrics: Option<bool>,
}

pub struct StructuredLogger {
    profile: RuntimeProfile,
    namespace: String,
    options: RwLock<LoggerOptions>,
    sink: Arc<dyn LogSink>,
    metrics: Arc<MetricsSink>,
}

impl StructuredLogger {
    pub fn new(
        profile: RuntimeProfile,
        namespace: impl Into<String>,
        sink: Arc<dyn LogSink>,
        metrics: Arc<MetricsSink>,
    ) -> Self {
        Self {
            profile,
            namespace: namespace.into(),
            options: RwLock::new(LoggerOptions::for_profile(profile)),
            sink,
            metrics,
        }
    }

    pub fn profile(&self) -> RuntimeProfile {
        self.profile
    }

    pub fn metrics(&self) -> &Arc<MetricsSink> {
        &self.metrics
    }

    pub fn options(&self) -> LoggerOptions {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adjust minimum severity and sink toggles at runtime.
    pub fn configure(&self, patch: LoggerPatch) {
        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(min) = patch.min_severity {
            options.min_severity = min;
        }
        if let Some(console) = patch.console {
            options.console = console;
        }
        if let Some(metrics) = patch.metrics {
            options.metrics = metrics;
        }
    }

    pub async fn log(&self, severity: Severity, message: impl Into<String>, options: LogOptions) {
        let settings = self.options();
        if severity < settings.min_severity {
            return;
        }

        let entry = LogEntry::new(severity, message, &options);
        if settings.console {
            self.sink.write(&entry);
        }

        let context = entry.context().unwrap_or(DEFAULT_CONTEXT).to_string();

        if severity == Severity::Error {
            self.metrics
                .emit(
                    &self.namespace,
                    "ErrorCount",
                    1.0,
                    MetricUnit::Count,
                    vec![
                        Dimension::new("Context", context.as_str()),
                        Dimension::new("Environment", self.profile.as_str()),
                    ],
                )
                .await;
        }

        // ERROR is already counted above.
        if severity != Severity::Error
            && options.forward_to_metrics
            && settings.metrics
            && self.profile.is_production()
        {
            self.metrics
                .emit(
                    &self.namespace,
                    "LogEntries",
                    1.0,
                    MetricUnit::Count,
                    vec![
                        Dimension::new("Severity", severity.as_str()),
                        Dimension::new("Context", context),
                        Dimension::new("Environment", self.profile.as_str()),
                    ],
                )
                .await;
        }
    }

    pub async fn debug(&self, message: impl Into<String>, options: LogOptions) {
        self.log(Severity::Debug, message, options).await;
    }

    pub async fn info(&self, message: impl Into<String>, options: LogOptions) {
        self.log(Severity::Info, message, options).await;
    }

    pub async fn warn(&self, message: impl Into<String>, options: LogOptions) {
        self.log(Severity::Warn, message, options).await;
    }

    pub async fn error(&self, message: impl Into<String>, options: LogOptions) {
        self.log(Severity::Error, message, options).await;
    }

    /// Record a user action as a `UserActions` counter plus an INFO entry.
    ///
    /// The INFO entry is not forwarded to metrics since the counter already
    /// covers it. A failed counter degrades to a local debug note.
    pub async fn track_user_action(
        &self,
        action: &str,
        user_id: Option<&str>,
        details: Option<Value>,
    ) {
        let delivery = self
            .metrics
            .emit(
                &self.namespace,
                "UserActions",
                1.0,
                MetricUnit::Count,
                vec![
                    Dimension::new("Action", action),
                    Dimension::new("Environment", self.profile.as_str()),
                ],
            )
            .await;

        if delivery == Delivery::Failed {
            self.debug(
                format!("User action metric not recorded: {}", action),
                LogOptions::new().context("UserAction").without_metrics(),
            )
            .await;
        }

        let mut options = LogOptions::new()
            .context("UserAction")
            .user(user_id)
            .without_metrics();
        if let Some(details) = details {
            options = options.data(details);
        }
        self.info(format!("User action: {}", action), options).await;
    }
}
