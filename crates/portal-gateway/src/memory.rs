//! In-process backends.
//!
//! Used by the `portal` binary for local runs and by tests. Each one can be
//! told to fail so failure isolation can be exercised end to end.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

use portal_core::{ServiceError, ServiceKind, ServiceResult};

use crate::backend::{
    AgentBackend, ObjectStoreBackend, QueueBackend, ServiceContext, TranslateBackend,
};
use crate::types::{
    ConverseReply, ConverseRequest, ObjectSummary, PutObjectOutput, QueueMessage, ReplyOrigin,
    SentMessage, SignedUrl, StoredObject, Translation,
};

// ---------------------------------------------------------------------------
// ScriptedAgent
// ---------------------------------------------------------------------------

/// Conversational backend that echoes the utterance or returns a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    script: Mutex<Option<Vec<String>>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with these messages.
    pub fn with_script(messages: Vec<String>) -> Self {
        let agent = Self::default();
        agent.set_script(messages);
        agent
    }

    pub fn set_script(&self, messages: Vec<String>) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = Some(messages);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of backend dispatches received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBackend for ScriptedAgent {
    async fn converse(
        &self,
        _ctx: ServiceContext<'_>,
        request: &ConverseRequest,
    ) -> ServiceResult<ConverseReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable(
                ServiceKind::ConversationalAgent,
                "agent runtime unreachable",
            ));
        }
        let messages = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| vec![format!("You said: {}", request.utterance)]);
        Ok(ConverseReply {
            messages,
            session_id: request.session_id.clone(),
            intent: None,
            dialog_state: Some("ElicitIntent".to_string()),
            origin: ReplyOrigin::Backend,
        })
    }
}

// ---------------------------------------------------------------------------
// InMemoryObjectStore
// ---------------------------------------------------------------------------

/// Object store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    fail_all: AtomicBool,
    fail_keys_containing: Mutex<Vec<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Make puts fail for any key containing `fragment`.
    pub fn fail_keys_containing(&self, fragment: impl Into<String>) {
        self.fail_keys_containing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fragment.into());
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys stored in `bucket`, in lexical order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn should_fail(&self, key: &str) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_keys_containing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|fragment| key.contains(fragment.as_str()))
    }
}

fn object_url(region: &str, bucket: &str, key: &str) -> String {
    format!("https://{}.objects.{}.portal.internal/{}", bucket, region, key)
}

#[async_trait]
impl ObjectStoreBackend for InMemoryObjectStore {
    async fn put_object(
        &self,
        ctx: ServiceContext<'_>,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ServiceResult<PutObjectOutput> {
        if self.should_fail(key) {
            return Err(ServiceError::unavailable(
                ServiceKind::ObjectStorage,
                format!("put rejected for {}", key),
            ));
        }
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                    last_modified: Utc::now(),
                },
            );
        Ok(PutObjectOutput {
            bucket: bucket.to_string(),
            key: key.to_string(),
            url: object_url(ctx.region, bucket, key),
        })
    }

    async fn get_object(
        &self,
        _ctx: ServiceContext<'_>,
        bucket: &str,
        key: &str,
    ) -> ServiceResult<StoredObject> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable(ServiceKind::ObjectStorage, "get rejected"));
        }
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| {
                ServiceError::unavailable(
                    ServiceKind::ObjectStorage,
                    format!("no such key: {}/{}", bucket, key),
                )
            })
    }

    async fn list_objects(
        &self,
        _ctx: ServiceContext<'_>,
        bucket: &str,
        prefix: &str,
    ) -> ServiceResult<Vec<ObjectSummary>> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable(ServiceKind::ObjectStorage, "list rejected"));
        }
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), obj)| ObjectSummary {
                key: k.clone(),
                size: obj.bytes.len() as u64,
                last_modified: obj.last_modified,
            })
            .collect())
    }

    async fn signed_url(
        &self,
        ctx: ServiceContext<'_>,
        bucket: &str,
        key: &str,
        expiry_secs: u64,
    ) -> ServiceResult<SignedUrl> {
        let expires_at = SignedUrl::deadline(expiry_secs).ok_or_else(|| {
            ServiceError::Validation(format!("expiry out of range: {}s", expiry_secs))
        })?;
        Ok(SignedUrl {
            url: format!(
                "{}?expires={}&signature={}",
                object_url(ctx.region, bucket, key),
                expires_at.timestamp(),
                Uuid::new_v4().simple()
            ),
            expires_at,
        })
    }
}

// ---------------------------------------------------------------------------
// InMemoryQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QueueState {
    ready: HashMap<String, VecDeque<(String, String)>>,
    in_flight: HashMap<String, (String, String)>,
}

/// Long-polling message queue. Received messages stay in flight until
/// deleted by receipt handle.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    arrivals: Notify,
    receive_calls: AtomicUsize,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting to be received on `queue_url`.
    pub fn ready_len(&self, queue_url: &str) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ready
            .get(queue_url)
            .map_or(0, VecDeque::len)
    }

    /// Messages received but not yet deleted, across all queues.
    pub fn in_flight_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .len()
    }

    /// Number of `receive` calls served.
    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    fn take(&self, queue_url: &str, max_messages: u32) -> Vec<QueueMessage> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut taken = Vec::new();
        for _ in 0..max_messages {
            let Some((message_id, body)) = state
                .ready
                .get_mut(queue_url)
                .and_then(VecDeque::pop_front)
            else {
                break;
            };
            let receipt_handle = Uuid::new_v4().to_string();
            state
                .in_flight
                .insert(receipt_handle.clone(), (message_id.clone(), body.clone()));
            taken.push(QueueMessage {
                message_id,
                receipt_handle,
                body,
            });
        }
        taken
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueue {
    async fn send(
        &self,
        _ctx: ServiceContext<'_>,
        queue_url: &str,
        body: &str,
    ) -> ServiceResult<SentMessage> {
        let message_id = Uuid::new_v4().to_string();
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ready
            .entry(queue_url.to_string())
            .or_default()
            .push_back((message_id.clone(), body.to_string()));
        self.arrivals.notify_waiters();
        Ok(SentMessage { message_id })
    }

    async fn receive(
        &self,
        _ctx: ServiceContext<'_>,
        queue_url: &str,
        max_messages: u32,
        wait_seconds: u32,
    ) -> ServiceResult<Vec<QueueMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);

        let arrival = self.arrivals.notified();
        tokio::pin!(arrival);
        arrival.as_mut().enable();

        let batch = self.take(queue_url, max_messages);
        if !batch.is_empty() || wait_seconds == 0 {
            return Ok(batch);
        }

        let _ = tokio::time::timeout(Duration::from_secs(u64::from(wait_seconds)), arrival).await;
        Ok(self.take(queue_url, max_messages))
    }

    async fn delete(
        &self,
        _ctx: ServiceContext<'_>,
        _queue_url: &str,
        receipt_handle: &str,
    ) -> ServiceResult<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| {
                ServiceError::Validation(format!("unknown receipt handle: {}", receipt_handle))
            })
    }
}

// ---------------------------------------------------------------------------
// EchoTranslator
// ---------------------------------------------------------------------------

/// Translator that tags the text with the target locale.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTranslator;

#[async_trait]
impl TranslateBackend for EchoTranslator {
    async fn translate(
        &self,
        _ctx: ServiceContext<'_>,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> ServiceResult<Translation> {
        Ok(Translation {
            text: format!("[{}] {}", target_locale, text),
            source_locale: source_locale.to_string(),
            target_locale: target_locale.to_string(),
        })
    }
}
