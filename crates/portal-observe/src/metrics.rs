//! Fire-and-forget metrics emission.
//!
//! [`MetricsSink`] is the only place that talks to a [`MetricsBackend`].
//! Outside production it never dispatches; in production every failure is
//! absorbed and reported straight to a [`LogSink`], never through the
//! structured logger, so a broken backend cannot recurse back into the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use portal_core::{RuntimeProfile, ServiceError, ServiceKind, ServiceResult, Severity};

use crate::entry::{LogEntry, LogOptions};
use crate::sink::LogSink;

/// Unit attached to a metric sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricUnit {
    Count,
    Milliseconds,
    Seconds,
    Bytes,
    Percent,
    None,
}

/// A single `(name, value)` dimension tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One emitted data point. Built at emission time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub namespace: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub dimensions: Vec<Dimension>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    /// Value of the named dimension, if present.
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    fn dimensions_json(&self) -> Value {
        let map: Map<String, Value> = self
            .dimensions
            .iter()
            .map(|d| (d.name.clone(), Value::String(d.value.clone())))
            .collect();
        Value::Object(map)
    }
}

/// Remote metrics/observability service.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn put_metric(&self, sample: &MetricSample) -> ServiceResult<()>;
}

/// Outcome of a single emission, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the backend successfully.
    Sent,
    /// Not dispatched because the process is not in production.
    Suppressed,
    /// The backend failed or timed out; the failure was logged.
    Failed,
}

/// Wraps a [`MetricsBackend`] with environment gating and failure absorption.
pub struct MetricsSink {
    profile: RuntimeProfile,
    backend: Arc<dyn MetricsBackend>,
    failure_sink: Arc<dyn LogSink>,
    timeout: Duration,
}

impl MetricsSink {
    pub fn new(
        profile: RuntimeProfile,
        backend: Arc<dyn MetricsBackend>,
        failure_sink: Arc<dyn LogSink>,
        timeout: Duration,
    ) -> Self {
        Self {
            profile,
            backend,
            failure_sink,
            timeout,
        }
    }

    pub fn profile(&self) -> RuntimeProfile {
        self.profile
    }

    /// Emit one sample. Never fails; the returned [`Delivery`] is informational.
    pub async fn emit(
        &self,
        namespace: &str,
        metric_name: &str,
        value: f64,
        unit: MetricUnit,
        dimensions: Vec<Dimension>,
    ) -> Delivery {
        let sample = MetricSample {
            namespace: namespace.to_string(),
            metric_name: metric_name.to_string(),
            value,
            unit,
            dimensions,
            timestamp: Utc::now(),
        };

        if !self.profile.is_production() {
            tracing::debug!(
                namespace = %sample.namespace,
                metric = %sample.metric_name,
                value = sample.value,
                dimensions = %sample.dimensions_json(),
                "Metric suppressed outside production"
            );
            return Delivery::Suppressed;
        }

        let result = match tokio::time::timeout(self.timeout, self.backend.put_metric(&sample)).await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::unavailable(
                ServiceKind::Metrics,
                format!("timed out after {}ms", self.timeout.as_millis()),
            )),
        };

        match result {
            Ok(()) => Delivery::Sent,
            Err(err) => {
                self.report_failure(&sample, &err);
                Delivery::Failed
            }
        }
    }

    fn report_failure(&self, sample: &MetricSample, err: &ServiceError) {
        let options = LogOptions::new().context("MetricsSink").data(json!({
            "namespace": sample.namespace,
            "metricName": sample.metric_name,
            "dimensions": sample.dimensions_json(),
            "error": err.to_string(),
        }));
        let entry = LogEntry::new(Severity::Error, "Failed to emit metric", &options);
        self.failure_sink.write(&entry);
    }
}

/// In-process metrics backend that records every sample.
///
/// Can be switched into a rejecting mode to exercise failure handling.
#[derive(Debug, Default)]
pub struct MemoryMetricsBackend {
    samples: Mutex<Vec<MetricSample>>,
    reject: AtomicBool,
}

impl MemoryMetricsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that rejects every call.
    pub fn rejecting() -> Self {
        let backend = Self::default();
        backend.set_rejecting(true);
        backend
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Samples recorded under `metric_name`.
    pub fn named(&self, metric_name: &str) -> Vec<MetricSample> {
        self.samples()
            .into_iter()
            .filter(|s| s.metric_name == metric_name)
            .collect()
    }
}

#[async_trait]
impl MetricsBackend for MemoryMetricsBackend {
    async fn put_metric(&self, sample: &MetricSample) -> ServiceResult<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable(
                ServiceKind::Metrics,
                "backend rejected the sample",
            ));
        }
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    struct StalledBackend;

    #[async_trait]
    impl MetricsBackend for StalledBackend {
        async fn put_metric(&self, _sample: &MetricSample) -> ServiceResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn sink_with(
        profile: RuntimeProfile,
        backend: Arc<dyn MetricsBackend>,
    ) -> (MetricsSink, Arc<MemorySink>) {
        let log = Arc::new(MemorySink::new());
        let sink = MetricsSink::new(profile, backend, log.clone(), Duration::from_millis(200));
        (sink, log)
    }

    #[tokio::test]
    async fn test_non_production_is_suppressed() {
        let backend = Arc::new(MemoryMetricsBackend::new());
        let (sink, log) = sink_with(RuntimeProfile::NonProduction, backend.clone());
        let delivery = sink
            .emit("Portal", "UserActions", 1.0, MetricUnit::Count, vec![])
            .await;
        assert_eq!(delivery, Delivery::Suppressed);
        assert!(backend.samples().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_production_dispatches_sample() {
        let backend = Arc::new(MemoryMetricsBackend::new());
        let (sink, _log) = sink_with(RuntimeProfile::Production, backend.clone());
        let delivery = sink
            .emit(
                "Portal",
                "UserActions",
                1.0,
                MetricUnit::Count,
                vec![Dimension::new("Action", "Login"), Dimension::new("Environment", "production")],
            )
            .await;
        assert_eq!(delivery, Delivery::Sent);
        let samples = backend.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].namespace, "Portal");
        assert_eq!(samples[0].dimension("Action"), Some("Login"));
        assert_eq!(samples[0].dimensions[1].name, "Environment");
    }

    #[tokio::test]
    async fn test_rejected_sample_logged_once_at_error() {
        let backend = Arc::new(MemoryMetricsBackend::rejecting());
        let (sink, log) = sink_with(RuntimeProfile::Production, backend);
        let delivery = sink
            .emit(
                "Portal",
                "ErrorCount",
                1.0,
                MetricUnit::Count,
                vec![Dimension::new("Context", "Upload")],
            )
            .await;
        assert_eq!(delivery, Delivery::Failed);

        let errors = log.at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context(), Some("MetricsSink"));
        let data = errors[0].structured_data().unwrap();
        assert_eq!(data["metricName"], "ErrorCount");
        assert_eq!(data["dimensions"]["Context"], "Upload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_times_out() {
        let (sink, log) = sink_with(RuntimeProfile::Production, Arc::new(StalledBackend));
        let delivery = sink
            .emit("Portal", "Latency", 12.0, MetricUnit::Milliseconds, vec![])
            .await;
        assert_eq!(delivery, Delivery::Failed);
        let errors = log.at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].structured_data().unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_backend_can_recover_from_rejecting() {
        let backend = Arc::new(MemoryMetricsBackend::rejecting());
        let (sink, _log) = sink_with(RuntimeProfile::Production, backend.clone());
        sink.emit("Portal", "A", 1.0, MetricUnit::Count, vec![]).await;
        backend.set_rejecting(false);
        sink.emit("Portal", "B", 1.0, MetricUnit::Count, vec![]).await;
        assert_eq!(backend.named("B").len(), 1);
        assert!(backend.named("A").is_empty());
    }
}
