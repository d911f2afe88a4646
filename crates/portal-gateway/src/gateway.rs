//! The credential-gated dispatcher in front of every managed service.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::json;

use portal_core::config::GatewayConfig;
use portal_core::{RuntimeProfile, ServiceError, ServiceKind, ServiceResult};
use portal_observe::{Delivery, Dimension, LogOptions, MetricUnit, StructuredLogger};

use crate::backend::{ServiceBackends, ServiceContext};
use crate::cache::{CacheKey, CacheStats, ResponseCache};
use crate::credentials::Credentials;
use crate::mock;
use crate::region::RegionResolver;
use crate::types::{
    ConverseFailure, ConverseReply, ConverseRequest, ObjectSummary, PutObjectOutput,
    QueueMessage, ReplyOrigin, SentMessage, SignedUrl, StoredObject, Translation,
    MAX_SIGNED_URL_EXPIRY_SECS,
};

const LOG_CONTEXT: &str = "ServiceGateway";

/// Largest batch a single queue receive may ask for.
pub const MAX_RECEIVE_MESSAGES: u32 = 10;
/// Longest long-poll wait a queue receive may ask for.
pub const MAX_RECEIVE_WAIT_SECS: u32 = 20;

/// Result of the credential gate for one call.
enum Dispatch<'a> {
    Live(ServiceContext<'a>),
    Mock,
}

/// Fronts the five service facades with one dispatch discipline: credential
/// gate, region resolution, then the backend. Only the conversational facade
/// is cached.
pub struct ServiceGateway {
    profile: RuntimeProfile,
    credentials: Option<Credentials>,
    regions: RegionResolver,
    backends: ServiceBackends,
    logger: Arc<StructuredLogger>,
    cache: Mutex<ResponseCache<ConverseReply>>,
    signed_url_expiry_secs: u64,
}

impl ServiceGateway {
    pub fn new(
        profile: RuntimeProfile,
        config: &GatewayConfig,
        credentials: Option<Credentials>,
        backends: ServiceBackends,
        logger: Arc<StructuredLogger>,
    ) -> Self {
        Self {
            profile,
            credentials,
            regions: RegionResolver::from_config(&config.region),
            backends,
            logger,
            cache: Mutex::new(ResponseCache::new(config.cache_capacity)),
            signed_url_expiry_secs: config.signed_url_expiry_secs,
        }
    }

    /// Replace the region resolver, e.g. with one built from the environment.
    pub fn with_regions(mut self, regions: RegionResolver) -> Self {
        self.regions = regions;
        self
    }

    pub fn profile(&self) -> RuntimeProfile {
        self.profile
    }

    pub fn regions(&self) -> &RegionResolver {
        &self.regions
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    /// True when calls fall back to canned responses.
    pub fn is_mock_mode(&self) -> bool {
        self.credentials.is_none() && !self.profile.is_production()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).stats()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn dispatch(&self, service: ServiceKind) -> ServiceResult<Dispatch<'_>> {
        match &self.credentials {
            Some(credentials) => Ok(Dispatch::Live(ServiceContext {
                region: self.regions.region_for(service),
                credentials,
            })),
            None if self.profile.is_production() => Err(ServiceError::CredentialsMissing(service)),
            None => {
                tracing::debug!(service = %service, "Credentials absent, using mock response");
                Ok(Dispatch::Mock)
            }
        }
    }

    /// Log a failed facade call at WARN and hand the result back.
    async fn logged<T>(
        &self,
        operation: &str,
        mut data: serde_json::Value,
        result: ServiceResult<T>,
    ) -> ServiceResult<T> {
        if let Err(err) = &result {
            if let Some(map) = data.as_object_mut() {
                map.insert("error".to_string(), json!(err.to_string()));
                map.insert("kind".to_string(), json!(err.kind()));
            }
            self.logger
                .warn(
                    format!("{} failed", operation),
                    LogOptions::new().context(LOG_CONTEXT).data(data),
                )
                .await;
        }
        result
    }

    // ---- conversational agent ----

    /// Send one utterance to the conversational agent.
    ///
    /// Replies are cached by `(bot_id, bot_alias, utterance)`; the session id
    /// is not part of the key, so identical utterances from different
    /// sessions share a reply. Failures are never cached and carry a single
    /// fallback message for the caller to render.
    pub async fn converse(
        &self,
        request: &ConverseRequest,
    ) -> Result<ConverseReply, ConverseFailure> {
        let ctx = match self.dispatch(ServiceKind::ConversationalAgent) {
            Ok(Dispatch::Live(ctx)) => ctx,
            Ok(Dispatch::Mock) => {
                return Ok(mock::converse_reply(&request.session_id, &request.utterance))
            }
            Err(err) => {
                self.report_converse_failure(request, &err).await;
                return Err(ConverseFailure::new(err));
            }
        };

        let key = CacheKey::new(
            ServiceKind::ConversationalAgent,
            &[&request.bot_id, &request.bot_alias, &request.utterance],
        );

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key);
        if let Some(mut reply) = cached {
            tracing::debug!(bot_id = %request.bot_id, "Conversational cache hit");
            reply.origin = ReplyOrigin::Cache;
            reply.session_id = request.session_id.clone();
            return Ok(reply);
        }

        let result = self
            .backends
            .agent
            .converse(ctx, request)
            .await
            .and_then(|reply| {
                if reply.is_empty() {
                    Err(ServiceError::EmptyOrMalformedResponse(
                        ServiceKind::ConversationalAgent,
                    ))
                } else {
                    Ok(reply)
                }
            });

        match result {
            Ok(mut reply) => {
                reply.origin = ReplyOrigin::Backend;
                let evicted = self
                    .cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, reply.clone());
                if evicted.is_some() {
                    tracing::debug!("Conversational cache full, evicted oldest entry");
                }
                Ok(reply)
            }
            Err(err) => {
                self.report_converse_failure(request, &err).await;
                Err(ConverseFailure::new(err))
            }
        }
    }

    async fn report_converse_failure(&self, request: &ConverseRequest, err: &ServiceError) {
        self.logger
            .error(
                "Conversational agent call failed",
                LogOptions::new().context(LOG_CONTEXT).data(json!({
                    "botId": request.bot_id,
                    "utterance": request.utterance,
                    "error": err.to_string(),
                })),
            )
            .await;
    }

    // ---- object storage ----

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ServiceResult<PutObjectOutput> {
        require_object_path(bucket, key)?;
        let result = match self.dispatch(ServiceKind::ObjectStorage)? {
            Dispatch::Mock => Ok(PutObjectOutput {
                bucket: bucket.to_string(),
                key: key.to_string(),
                url: mock::object_url(bucket, key),
            }),
            Dispatch::Live(ctx) => {
                self.backends
                    .objects
                    .put_object(ctx, bucket, key, bytes, content_type)
                    .await
            }
        };
        self.logged("putObject", json!({ "bucket": bucket, "key": key }), result).await
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> ServiceResult<StoredObject> {
        require_object_path(bucket, key)?;
        let result = match self.dispatch(ServiceKind::ObjectStorage)? {
            Dispatch::Mock => Ok(StoredObject {
                bytes: Vec::new(),
                content_type: "application/octet-stream".to_string(),
                last_modified: Utc::now(),
            }),
            Dispatch::Live(ctx) => self.backends.objects.get_object(ctx, bucket, key).await,
        };
        self.logged("getObject", json!({ "bucket": bucket, "key": key }), result).await
    }

    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> ServiceResult<Vec<ObjectSummary>> {
        if bucket.trim().is_empty() {
            return Err(ServiceError::Validation("bucket must not be empty".to_string()));
        }
        let result = match self.dispatch(ServiceKind::ObjectStorage)? {
            Dispatch::Mock => Ok(Vec::new()),
            Dispatch::Live(ctx) => self.backends.objects.list_objects(ctx, bucket, prefix).await,
        };
        self.logged("listObjects", json!({ "bucket": bucket, "prefix": prefix }), result).await
    }

    /// Time-boxed retrieval URL. `expiry_secs` defaults to the configured
    /// expiry (3600 unless overridden) and may not exceed
    /// [`MAX_SIGNED_URL_EXPIRY_SECS`]. Never cached.
    pub async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u64>,
    ) -> ServiceResult<SignedUrl> {
        require_object_path(bucket, key)?;
        let expiry_secs = expiry_secs.unwrap_or(self.signed_url_expiry_secs);
        if !(1..=MAX_SIGNED_URL_EXPIRY_SECS).contains(&expiry_secs) {
            return Err(ServiceError::Validation(format!(
                "signed URL expiry must be between 1 and {} seconds",
                MAX_SIGNED_URL_EXPIRY_SECS
            )));
        }
        let result = match self.dispatch(ServiceKind::ObjectStorage)? {
            Dispatch::Mock => Ok(SignedUrl {
                url: format!("{}?expires={}", mock::object_url(bucket, key), expiry_secs),
                expires_at: SignedUrl::deadline(expiry_secs).ok_or_else(|| {
                    ServiceError::Validation(format!("expiry out of range: {}s", expiry_secs))
                })?,
            }),
            Dispatch::Live(ctx) => {
                self.backends
                    .objects
                    .signed_url(ctx, bucket, key, expiry_secs)
                    .await
            }
        };
        self.logged("signedUrl", json!({ "bucket": bucket, "key": key }), result).await
    }

    // ---- metrics ----

    /// Emit one metric through the logger's sink. Outside production the
    /// sink suppresses the call; a backend failure is absorbed and logged by
    /// the sink and reported here as [`Delivery::Failed`].
    pub async fn emit_metric(
        &self,
        namespace: &str,
        metric_name: &str,
        value: f64,
        unit: MetricUnit,
        dimensions: Vec<Dimension>,
    ) -> ServiceResult<Delivery> {
        self.dispatch(ServiceKind::Metrics)?;
        Ok(self
            .logger
            .metrics()
            .emit(namespace, metric_name, value, unit, dimensions)
            .await)
    }

    // ---- queue ----

    pub async fn send_to_queue(&self, queue_url: &str, body: &str) -> ServiceResult<SentMessage> {
        require_queue(queue_url)?;
        let result = match self.dispatch(ServiceKind::Queue)? {
            Dispatch::Mock => Ok(SentMessage {
                message_id: mock_message_id(queue_url, body),
            }),
            Dispatch::Live(ctx) => self.backends.queue.send(ctx, queue_url, body).await,
        };
        self.logged("sendToQueue", json!({ "queueUrl": queue_url }), result).await
    }

    /// Long-poll `queue_url`. The call may block for up to `wait_seconds`
    /// and may return no messages; it is dispatched exactly once.
    pub async fn receive_from_queue(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_seconds: u32,
    ) -> ServiceResult<Vec<QueueMessage>> {
        require_queue(queue_url)?;
        if !(1..=MAX_RECEIVE_MESSAGES).contains(&max_messages) {
            return Err(ServiceError::Validation(format!(
                "max_messages must be between 1 and {}",
                MAX_RECEIVE_MESSAGES
            )));
        }
        if wait_seconds > MAX_RECEIVE_WAIT_SECS {
            return Err(ServiceError::Validation(format!(
                "wait_seconds must be at most {}",
                MAX_RECEIVE_WAIT_SECS
            )));
        }
        let result = match self.dispatch(ServiceKind::Queue)? {
            Dispatch::Mock => Ok(Vec::new()),
            Dispatch::Live(ctx) => {
                self.backends
                    .queue
                    .receive(ctx, queue_url, max_messages, wait_seconds)
                    .await
            }
        };
        self.logged("receiveFromQueue", json!({ "queueUrl": queue_url }), result).await
    }

    pub async fn delete_from_queue(&self, queue_url: &str, receipt_handle: &str) -> ServiceResult<()> {
        require_queue(queue_url)?;
        if receipt_handle.trim().is_empty() {
            return Err(ServiceError::Validation(
                "receipt handle must not be empty".to_string(),
            ));
        }
        let result = match self.dispatch(ServiceKind::Queue)? {
            Dispatch::Mock => Ok(()),
            Dispatch::Live(ctx) => self.backends.queue.delete(ctx, queue_url, receipt_handle).await,
        };
        self.logged("deleteFromQueue", json!({ "queueUrl": queue_url }), result).await
    }

    // ---- translation ----

    /// Stateless passthrough; translations are never cached.
    pub async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> ServiceResult<Translation> {
        let result = match self.dispatch(ServiceKind::Translation)? {
            Dispatch::Mock => Ok(Translation {
                text: text.to_string(),
                source_locale: source_locale.to_string(),
                target_locale: target_locale.to_string(),
            }),
            Dispatch::Live(ctx) => {
                self.backends
                    .translate
                    .translate(ctx, text, source_locale, target_locale)
                    .await
            }
        };
        let data = json!({ "sourceLocale": source_locale, "targetLocale": target_locale });
        self.logged("translate", data, result).await
    }
}

fn require_object_path(bucket: &str, key: &str) -> ServiceResult<()> {
    if bucket.trim().is_empty() {
        return Err(ServiceError::Validation("bucket must not be empty".to_string()));
    }
    if key.trim().is_empty() {
        return Err(ServiceError::Validation("object key must not be empty".to_string()));
    }
    Ok(())
}

fn require_queue(queue_url: &str) -> ServiceResult<()> {
    if queue_url.trim().is_empty() {
        return Err(ServiceError::Validation("queue URL must not be empty".to_string()));
    }
    Ok(())
}

fn mock_message_id(queue_url: &str, body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    queue_url.hash(&mut hasher);
    body.hash(&mut hasher);
    format!("mock-{:016x}", hasher.finish())
}
