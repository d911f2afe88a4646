//! The batch upload workflow.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use portal_core::config::UploadConfig;
use portal_core::ServiceError;
use portal_gateway::ServiceGateway;
use portal_observe::{LogOptions, StructuredLogger};

use crate::clock::MonotonicKeyClock;
use crate::error::UploadError;
use crate::key::derive_key;

const LOG_CONTEXT: &str = "DocumentUpload";

/// User action recorded for every successful upload.
pub const UPLOAD_ACTION: &str = "DocumentUploads";

/// One file submitted for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.content.len()
    }
}

/// Batch parameters.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bucket: String,
    pub folder_prefix: String,
    pub allowed_mime_types: Vec<String>,
    pub max_size_mb: f64,
    pub user_id: Option<String>,
}

impl UploadRequest {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            folder_prefix: config.folder_prefix.clone(),
            allowed_mime_types: config.allowed_mime_types.clone(),
            max_size_mb: config.max_size_mb,
            user_id: None,
        }
    }

    fn validate(&self) -> Result<(), UploadError> {
        if self.bucket.trim().is_empty() {
            return Err(UploadError::InvalidRequest("bucket must not be empty".into()));
        }
        if !self.max_size_mb.is_finite() || self.max_size_mb < 0.0 {
            return Err(UploadError::InvalidRequest(format!(
                "max_size_mb must be a non-negative number, got {}",
                self.max_size_mb
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    MimeTypeNotAllowed,
    TooLarge,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::MimeTypeNotAllowed => "mime-type-not-allowed",
            RejectReason::TooLarge => "too-large",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Pending,
    Uploaded { url: String },
    Rejected(RejectReason),
    Failed(ServiceError),
}

impl UploadOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadOutcome::Pending)
    }
}

/// Per-file record for one batch.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file_name: String,
    pub mime_type: String,
    pub byte_size: usize,
    /// Storage key; `None` for files rejected before a key was derived.
    pub derived_key: Option<String>,
    pub outcome: UploadOutcome,
}

impl UploadItem {
    fn pending(file: &UploadFile) -> Self {
        Self {
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            byte_size: file.byte_size(),
            derived_key: None,
            outcome: UploadOutcome::Pending,
        }
    }

    /// Move from `Pending` to a terminal outcome. Later calls are ignored.
    fn settle(&mut self, outcome: UploadOutcome) {
        if self.outcome.is_terminal() {
            tracing::warn!(file = %self.file_name, "Upload item already settled");
            return;
        }
        self.outcome = outcome;
    }
}

/// Progress snapshot reported after each file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub processed: usize,
    pub total: usize,
    pub percent: f64,
}

impl UploadProgress {
    fn after(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

/// Outcomes in input order plus the final progress.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub items: Vec<UploadItem>,
    pub progress: UploadProgress,
}

impl UploadReport {
    pub fn outcomes(&self) -> Vec<&UploadOutcome> {
        self.items.iter().map(|i| &i.outcome).collect()
    }

    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Uploaded { .. }))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Rejected(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

pub struct DocumentUploadPipeline {
    gateway: Arc<ServiceGateway>,
    logger: Arc<StructuredLogger>,
    clock: MonotonicKeyClock,
}

impl DocumentUploadPipeline {
    pub fn new(gateway: Arc<ServiceGateway>, logger: Arc<StructuredLogger>) -> Self {
        Self::with_clock(gateway, logger, MonotonicKeyClock::system())
    }

    pub fn with_clock(
        gateway: Arc<ServiceGateway>,
        logger: Arc<StructuredLogger>,
        clock: MonotonicKeyClock,
    ) -> Self {
        Self {
            gateway,
            logger,
            clock,
        }
    }

    /// Upload `files` sequentially.
    ///
    /// `on_progress` is called after every file, in input order, with the
    /// item just settled and the running progress. Only a malformed request
    /// fails the call; it is logged before being returned.
    pub async fn upload_batch<F>(
        &self,
        request: &UploadRequest,
        files: Vec<UploadFile>,
        mut on_progress: F,
    ) -> Result<UploadReport, UploadError>
    where
        F: FnMut(&UploadItem, UploadProgress),
    {
        if let Err(err) = request.validate() {
            self.logger
                .error(
                    "Upload batch rejected",
                    LogOptions::new()
                        .context(LOG_CONTEXT)
                        .user(request.user_id.as_deref())
                        .data(json!({ "bucket": request.bucket, "error": err.to_string() })),
                )
                .await;
            return Err(err);
        }

        let total = files.len();
        tracing::info!(bucket = %request.bucket, files = total, "Starting upload batch");

        let mut items = Vec::with_capacity(total);
        let mut progress = UploadProgress::after(0, total);

        for (index, file) in files.into_iter().enumerate() {
            let mut item = UploadItem::pending(&file);
            let outcome = self.upload_one(request, file, &mut item).await;
            item.settle(outcome);

            progress = UploadProgress::after(index + 1, total);
            on_progress(&item, progress);
            items.push(item);
        }

        let report = UploadReport { items, progress };
        tracing::info!(
            uploaded = report.uploaded(),
            rejected = report.rejected(),
            failed = report.failed(),
            "Upload batch finished"
        );
        Ok(report)
    }

    async fn upload_one(
        &self,
        request: &UploadRequest,
        file: UploadFile,
        item: &mut UploadItem,
    ) -> UploadOutcome {
        if !request.allowed_mime_types.iter().any(|m| m == &file.mime_type) {
            return self.reject(request, &file, RejectReason::MimeTypeNotAllowed).await;
        }
        if file.byte_size() as f64 / 1e6 > request.max_size_mb {
            return self.reject(request, &file, RejectReason::TooLarge).await;
        }

        let key = derive_key(&request.folder_prefix, self.clock.next_stamp(), &file.name);
        item.derived_key = Some(key.clone());

        let size = file.byte_size();
        match self
            .gateway
            .put_object(&request.bucket, &key, file.content, &file.mime_type)
            .await
        {
            Ok(output) => {
                self.logger
                    .track_user_action(
                        UPLOAD_ACTION,
                        request.user_id.as_deref(),
                        Some(json!({
                            "fileName": file.name,
                            "key": key,
                            "size": size,
                            "mimeType": file.mime_type,
                        })),
                    )
                    .await;
                UploadOutcome::Uploaded { url: output.url }
            }
            Err(err) => {
                self.logger
                    .error(
                        "Document upload failed",
                        LogOptions::new()
                            .context(LOG_CONTEXT)
                            .user(request.user_id.as_deref())
                            .data(json!({ "fileName": file.name, "error": err.to_string() })),
                    )
                    .await;
                UploadOutcome::Failed(err)
            }
        }
    }

    async fn reject(
        &self,
        request: &UploadRequest,
        file: &UploadFile,
        reason: RejectReason,
    ) -> UploadOutcome {
        self.logger
            .warn(
                format!("Rejected {}: {}", file.name, reason),
                LogOptions::new()
                    .context(LOG_CONTEXT)
                    .user(request.user_id.as_deref())
                    .data(json!({
                        "fileName": file.name,
                        "mimeType": file.mime_type,
                        "size": file.byte_size(),
                        "reason": reason.as_str(),
                    })),
            )
            .await;
        UploadOutcome::Rejected(reason)
    }
}
