use thiserror::Error;

/// Errors that abort a whole batch. Per-file problems never surface here;
/// they become [`crate::UploadOutcome`] values instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),
}
