//! Shared vocabulary types used across the portal crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortalError;

/// Environment the process runs in.
///
/// Injected once at construction into every component that branches on the
/// environment (mock fallback, metrics suppression, default log level) so the
/// behavior can be exercised in tests without touching process env vars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeProfile {
    Production,
    #[default]
    NonProduction,
}

impl RuntimeProfile {
    /// Name of the environment variable consulted by [`RuntimeProfile::from_env`].
    pub const ENV_VAR: &'static str = "PORTAL_ENV";

    pub fn is_production(self) -> bool {
        matches!(self, RuntimeProfile::Production)
    }

    /// Dimension value used when tagging metrics with the environment.
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeProfile::Production => "production",
            RuntimeProfile::NonProduction => "non-production",
        }
    }

    /// Interpret a free-form environment name. Anything other than
    /// `production` / `prod` is treated as non-production.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => RuntimeProfile::Production,
            _ => RuntimeProfile::NonProduction,
        }
    }

    /// Read the profile from `PORTAL_ENV`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(Self::ENV_VAR)
            .ok()
            .map(|value| Self::from_name(&value))
    }
}

impl fmt::Display for RuntimeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five managed services mediated by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    ObjectStorage,
    ConversationalAgent,
    Metrics,
    Queue,
    Translation,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::ObjectStorage,
        ServiceKind::ConversationalAgent,
        ServiceKind::Metrics,
        ServiceKind::Queue,
        ServiceKind::Translation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::ObjectStorage => "object_storage",
            ServiceKind::ConversationalAgent => "conversational_agent",
            ServiceKind::Metrics => "metrics",
            ServiceKind::Queue => "queue",
            ServiceKind::Translation => "translation",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "DEBUG")]
    Debug,
    #[serde(alias = "INFO")]
    Info,
    #[serde(alias = "WARN", alias = "warning")]
    Warn,
    #[serde(alias = "ERROR")]
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Minimum severity used when nothing is configured explicitly.
    pub fn default_for(profile: RuntimeProfile) -> Self {
        if profile.is_production() {
            Severity::Info
        } else {
            Severity::Debug
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            other => Err(PortalError::InvalidArgument(format!(
                "unknown severity: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_name() {
        assert_eq!(RuntimeProfile::from_name("production"), RuntimeProfile::Production);
        assert_eq!(RuntimeProfile::from_name(" PROD "), RuntimeProfile::Production);
        assert_eq!(RuntimeProfile::from_name("staging"), RuntimeProfile::NonProduction);
        assert_eq!(RuntimeProfile::from_name(""), RuntimeProfile::NonProduction);
    }

    #[test]
    fn test_profile_default_is_non_production() {
        assert_eq!(RuntimeProfile::default(), RuntimeProfile::NonProduction);
        assert!(!RuntimeProfile::default().is_production());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_severity_default_per_profile() {
        assert_eq!(Severity::default_for(RuntimeProfile::Production), Severity::Info);
        assert_eq!(
            Severity::default_for(RuntimeProfile::NonProduction),
            Severity::Debug
        );
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("ERROR".parse::<Severity>().unwrap(), Severity::Error);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_serde_accepts_both_cases() {
        let lower: Severity = serde_json::from_str("\"warn\"").unwrap();
        let upper: Severity = serde_json::from_str("\"WARN\"").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), "\"info\"");
    }

    #[test]
    fn test_service_kind_display() {
        assert_eq!(ServiceKind::ObjectStorage.to_string(), "object_storage");
        assert_eq!(ServiceKind::ALL.len(), 5);
    }
}
