//! Batch document uploads through the gateway's object-storage facade.
//!
//! Files are processed one at a time in input order. Each file ends in
//! exactly one terminal outcome and no file's outcome affects its siblings.

pub mod clock;
pub mod error;
pub mod key;
pub mod pipeline;

pub use clock::{Clock, MonotonicKeyClock, SystemClock};
pub use error::UploadError;
pub use key::{derive_key, sanitize_file_name};
pub use pipeline::{
    DocumentUploadPipeline, RejectReason, UploadFile, UploadItem, UploadOutcome, UploadProgress,
    UploadReport, UploadRequest,
};
