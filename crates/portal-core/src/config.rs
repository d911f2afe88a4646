use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PortalError, Result};
use crate::types::{RuntimeProfile, Severity};

/// Top-level configuration for the portal gateway.
///
/// Loaded from `~/.portal/config.toml` by default. Each section corresponds
/// to one component of the gateway layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl PortalConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PortalConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PortalError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Resolve the runtime profile: `PORTAL_ENV` wins over the file value.
    pub fn runtime_profile(&self) -> RuntimeProfile {
        RuntimeProfile::from_env().unwrap_or(self.general.environment)
    }

    /// Minimum severity for the structured logger, falling back to the
    /// profile default when unset.
    pub fn min_severity(&self, profile: RuntimeProfile) -> Severity {
        self.logging
            .min_severity
            .unwrap_or_else(|| Severity::default_for(profile))
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// `production` or `non-production`.
    pub environment: RuntimeProfile,
    /// Filter for the tracing subscriber: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            environment: RuntimeProfile::NonProduction,
            log_level: "info".to_string(),
        }
    }
}

/// Structured logger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Entries below this severity are dropped. Unset means INFO in
    /// production and DEBUG elsewhere.
    pub min_severity: Option<Severity>,
    /// Write accepted entries to the console sink.
    pub console: bool,
    /// Forward accepted entries to the metrics sink (production only).
    pub metrics: bool,
    /// Namespace used for every metric emitted by the logger.
    pub metrics_namespace: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_severity: None,
            console: true,
            metrics: true,
            metrics_namespace: "ReinsurancePortal".to_string(),
        }
    }
}

/// Service gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Maximum number of cached conversational replies.
    pub cache_capacity: usize,
    /// Default expiry for signed object URLs.
    pub signed_url_expiry_secs: u64,
    /// Upper bound on a single metrics dispatch.
    pub metrics_timeout_ms: u64,
    #[serde(default)]
    pub region: RegionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            signed_url_expiry_secs: 3600,
            metrics_timeout_ms: 5_000,
            region: RegionConfig::default(),
        }
    }
}

/// Region overrides. Environment variables take precedence over these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub primary: String,
    /// Declared for multi-region routing; no failover reads it.
    pub secondary: Option<String>,
    /// Explicit active region; defaults to `primary`.
    pub current: Option<String>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            primary: "us-east-1".to_string(),
            secondary: None,
            current: None,
        }
    }
}

/// Document upload defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub bucket: String,
    pub folder_prefix: String,
    pub allowed_mime_types: Vec<String>,
    pub max_size_mb: f64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: "reinsurance-documents".to_string(),
            folder_prefix: "uploads".to_string(),
            allowed_mime_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string(),
            ],
            max_size_mb: 10.0,
        }
    }
}

/// Conversational agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub bot_id: String,
    pub bot_alias: String,
    pub locale: String,
    /// Submissions closer together than this collapse to the last one.
    pub debounce_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_id: "ReinsuranceAssistant".to_string(),
            bot_alias: "TSTALIASID".to_string(),
            locale: "en_US".to_string(),
            debounce_ms: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PortalConfig::default();
        assert_eq!(config.general.environment, RuntimeProfile::NonProduction);
        assert_eq!(config.general.log_level, "info");
        assert!(config.logging.min_severity.is_none());
        assert!(config.logging.console);
        assert_eq!(config.gateway.cache_capacity, 100);
        assert_eq!(config.gateway.signed_url_expiry_secs, 3600);
        assert_eq!(config.gateway.region.primary, "us-east-1");
        assert!((config.upload.max_size_mb - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.chat.debounce_ms, 300);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
environment = "production"
log_level = "debug"

[logging]
min_severity = "warn"
metrics = false

[gateway]
cache_capacity = 50

[gateway.region]
primary = "eu-west-1"
secondary = "eu-central-1"

[upload]
bucket = "treaty-docs"
allowed_mime_types = ["application/pdf"]
max_size_mb = 2.5

[chat]
bot_id = "Claims"
"#;
        let file = create_temp_config(content);
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.general.environment, RuntimeProfile::Production);
        assert_eq!(config.logging.min_severity, Some(Severity::Warn));
        assert!(!config.logging.metrics);
        assert_eq!(config.gateway.cache_capacity, 50);
        assert_eq!(config.gateway.region.primary, "eu-west-1");
        assert_eq!(
            config.gateway.region.secondary.as_deref(),
            Some("eu-central-1")
        );
        assert_eq!(config.upload.bucket, "treaty-docs");
        assert_eq!(config.upload.allowed_mime_types, vec!["application/pdf"]);
        assert_eq!(config.chat.bot_id, "Claims");
        // Untouched fields keep their defaults
        assert_eq!(config.chat.locale, "en_US");
        assert_eq!(config.gateway.signed_url_expiry_secs, 3600);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = PortalConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.gateway.cache_capacity, 100);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(PortalConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = PortalConfig::default();
        config.logging.min_severity = Some(Severity::Error);
        config.save(&path).unwrap();

        let reloaded = PortalConfig::load(&path).unwrap();
        assert_eq!(reloaded.logging.min_severity, Some(Severity::Error));
        assert_eq!(reloaded.upload.bucket, config.upload.bucket);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.gateway.cache_capacity, 100);
        assert_eq!(config.upload.folder_prefix, "uploads");
    }

    #[test]
    fn test_min_severity_falls_back_to_profile_default() {
        let config = PortalConfig::default();
        assert_eq!(config.min_severity(RuntimeProfile::Production), Severity::Info);
        assert_eq!(
            config.min_severity(RuntimeProfile::NonProduction),
            Severity::Debug
        );

        let mut config = PortalConfig::default();
        config.logging.min_severity = Some(Severity::Warn);
        assert_eq!(config.min_severity(RuntimeProfile::Production), Severity::Warn);
    }
}
