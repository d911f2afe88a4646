pub mod config;
pub mod error;
pub mod types;

pub use config::PortalConfig;
pub use error::{PortalError, Result, ServiceError, ServiceResult};
pub use types::*;
