use thiserror::Error;

use crate::types::ServiceKind;

/// Top-level error type for configuration and programmer-error conditions.
///
/// Expected service failures never travel as `PortalError`; they are modeled
/// as [`ServiceError`] values returned from every gateway facade.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PortalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for PortalError {
    fn from(err: toml::de::Error) -> Self {
        PortalError::Config(err.to_string())
    }
}

/// A specialized `Result` type for portal operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Failure taxonomy shared by all five gateway facades.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("credentials missing for {0}")]
    CredentialsMissing(ServiceKind),

    #[error("{service} unavailable: {message}")]
    ServiceUnavailable {
        service: ServiceKind,
        message: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} returned an empty or malformed response")]
    EmptyOrMalformedResponse(ServiceKind),
}

impl ServiceError {
    pub fn unavailable(service: ServiceKind, message: impl Into<String>) -> Self {
        ServiceError::ServiceUnavailable {
            service,
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::CredentialsMissing(_) => "credentials_missing",
            ServiceError::ServiceUnavailable { .. } => "service_unavailable",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::EmptyOrMalformedResponse(_) => "empty_or_malformed_response",
        }
    }

    /// The service the failure originated from, when known.
    pub fn service(&self) -> Option<ServiceKind> {
        match self {
            ServiceError::CredentialsMissing(service)
            | ServiceError::EmptyOrMalformedResponse(service) => Some(*service),
            ServiceError::ServiceUnavailable { service, .. } => Some(*service),
            ServiceError::Validation(_) => None,
        }
    }

    /// Text safe to show to an end user. Never includes vendor detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "The request was not valid.",
            _ => "The service is temporarily unavailable. Please try again later.",
        }
    }
}

/// Result returned by every gateway facade.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortalError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let portal_err: PortalError = io_err.into();
        assert!(matches!(portal_err, PortalError::Io(_)));
        assert!(portal_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let portal_err: PortalError = err.unwrap_err().into();
        assert!(matches!(portal_err, PortalError::Config(_)));
    }

    #[test]
    fn test_service_error_display() {
        let cases: Vec<(ServiceError, &str)> = vec![
            (
                ServiceError::CredentialsMissing(ServiceKind::Queue),
                "credentials missing for queue",
            ),
            (
                ServiceError::unavailable(ServiceKind::ObjectStorage, "connection reset"),
                "object_storage unavailable: connection reset",
            ),
            (
                ServiceError::Validation("bucket is empty".into()),
                "validation failed: bucket is empty",
            ),
            (
                ServiceError::EmptyOrMalformedResponse(ServiceKind::Translation),
                "translation returned an empty or malformed response",
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_service_error_kind_and_service() {
        let err = ServiceError::unavailable(ServiceKind::Metrics, "timeout");
        assert_eq!(err.kind(), "service_unavailable");
        assert_eq!(err.service(), Some(ServiceKind::Metrics));
        assert_eq!(ServiceError::Validation("x".into()).service(), None);
    }

    #[test]
    fn test_user_message_hides_vendor_detail() {
        let err = ServiceError::unavailable(ServiceKind::ObjectStorage, "AccessDenied: 403 xyz");
        assert!(!err.user_message().contains("403"));
    }
}
