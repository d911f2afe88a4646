//! Backend seams for the managed services.
//!
//! Vendor clients implement these traits; the gateway owns credential
//! gating, caching and fallback around them. Each call receives the
//! [`ServiceContext`] resolved by the gateway so backends never read
//! credentials or regions on their own.

use std::sync::Arc;

use async_trait::async_trait;

use portal_core::ServiceResult;

use crate::credentials::Credentials;
use crate::memory::{EchoTranslator, InMemoryObjectStore, InMemoryQueue, ScriptedAgent};
use crate::types::{
    ConverseReply, ConverseRequest, ObjectSummary, PutObjectOutput, QueueMessage, SentMessage,
    SignedUrl, StoredObject, Translation,
};

/// Per-call context handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    pub region: &'a str,
    pub credentials: &'a Credentials,
}

#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn converse(
        &self,
        ctx: ServiceContext<'_>,
        request: &ConverseRequest,
    ) -> ServiceResult<ConverseReply>;
}

#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
    async fn put_object(
        &self,
        ctx: ServiceContext<'_>,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ServiceResult<PutObjectOutput>;

    async fn get_object(
        &self,
        ctx: ServiceContext<'_>,
        bucket: &str,
        key: &str,
    ) -> ServiceResult<StoredObject>;

    async fn list_objects(
        &self,
        ctx: ServiceContext<'_>,
        bucket: &str,
        prefix: &str,
    ) -> ServiceResult<Vec<ObjectSummary>>;

    async fn signed_url(
        &self,
        ctx: ServiceContext<'_>,
        bucket: &str,
        key: &str,
        expiry_secs: u64,
    ) -> ServiceResult<SignedUrl>;
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn send(
        &self,
        ctx: ServiceContext<'_>,
        queue_url: &str,
        body: &str,
    ) -> ServiceResult<SentMessage>;

    /// Long-poll for up to `max_messages`, waiting at most `wait_seconds`.
    async fn receive(
        &self,
        ctx: ServiceContext<'_>,
        queue_url: &str,
        max_messages: u32,
        wait_seconds: u32,
    ) -> ServiceResult<Vec<QueueMessage>>;

    async fn delete(
        &self,
        ctx: ServiceContext<'_>,
        queue_url: &str,
        receipt_handle: &str,
    ) -> ServiceResult<()>;
}

#[async_trait]
pub trait TranslateBackend: Send + Sync {
    async fn translate(
        &self,
        ctx: ServiceContext<'_>,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> ServiceResult<Translation>;
}

/// The set of backends a gateway dispatches to.
///
/// Metrics are not listed here: the metrics facade delegates to the
/// logger's `MetricsSink`, which owns its backend.
#[derive(Clone)]
pub struct ServiceBackends {
    pub agent: Arc<dyn AgentBackend>,
    pub objects: Arc<dyn ObjectStoreBackend>,
    pub queue: Arc<dyn QueueBackend>,
    pub translate: Arc<dyn TranslateBackend>,
}

impl ServiceBackends {
    /// In-process backends for local runs and tests.
    pub fn in_memory() -> Self {
        Self {
            agent: Arc::new(ScriptedAgent::new()),
            objects: Arc::new(InMemoryObjectStore::new()),
            queue: Arc::new(InMemoryQueue::new()),
            translate: Arc::new(EchoTranslator),
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn AgentBackend>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_objects(mut self, objects: Arc<dyn ObjectStoreBackend>) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn QueueBackend>) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_translate(mut self, translate: Arc<dyn TranslateBackend>) -> Self {
        self.translate = translate;
        self
    }
}
