//! Active-region resolution.
//!
//! The region is resolved once per gateway. A secondary region may be
//! configured, but nothing routes to it: there is no failover.

use portal_core::config::RegionConfig;
use portal_core::ServiceKind;

pub const REGION_VAR: &str = "AWS_REGION";
pub const PRIMARY_REGION_VAR: &str = "AWS_PRIMARY_REGION";
pub const SECONDARY_REGION_VAR: &str = "AWS_SECONDARY_REGION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionResolver {
    primary: String,
    secondary: Option<String>,
    active: String,
}

impl RegionResolver {
    pub fn from_config(config: &RegionConfig) -> Self {
        Self::from_lookup(config, |_| None)
    }

    /// Environment variables override the configured values.
    pub fn from_env(config: &RegionConfig) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(config: &RegionConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let primary = non_blank(PRIMARY_REGION_VAR).unwrap_or_else(|| config.primary.clone());
        let secondary = non_blank(SECONDARY_REGION_VAR).or_else(|| config.secondary.clone());
        let active = non_blank(REGION_VAR)
            .or_else(|| config.current.clone())
            .unwrap_or_else(|| primary.clone());
        Self {
            primary,
            secondary,
            active,
        }
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// Routing hook for multi-region dispatch. Every service currently
    /// resolves to the active region.
    pub fn region_for(&self, _service: ServiceKind) -> &str {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_primary() {
        let resolver = RegionResolver::from_config(&RegionConfig::default());
        assert_eq!(resolver.active(), "us-east-1");
        assert_eq!(resolver.primary(), "us-east-1");
        assert!(resolver.secondary().is_none());
    }

    #[test]
    fn test_current_overrides_primary() {
        let config = RegionConfig {
            primary: "eu-west-1".into(),
            secondary: Some("eu-central-1".into()),
            current: Some("eu-central-1".into()),
        };
        let resolver = RegionResolver::from_config(&config);
        assert_eq!(resolver.active(), "eu-central-1");
        assert_eq!(resolver.primary(), "eu-west-1");
    }

    #[test]
    fn test_env_overrides_config() {
        let resolver = RegionResolver::from_lookup(&RegionConfig::default(), |name| match name {
            REGION_VAR => Some("ap-southeast-2".to_string()),
            SECONDARY_REGION_VAR => Some("ap-northeast-1".to_string()),
            _ => None,
        });
        assert_eq!(resolver.active(), "ap-southeast-2");
        assert_eq!(resolver.primary(), "us-east-1");
        assert_eq!(resolver.secondary(), Some("ap-northeast-1"));
    }

    #[test]
    fn test_every_service_routes_to_active_region() {
        let config = RegionConfig {
            secondary: Some("us-west-2".into()),
            ..RegionConfig::default()
        };
        let resolver = RegionResolver::from_config(&config);
        for service in ServiceKind::ALL {
            assert_eq!(resolver.region_for(service), "us-east-1");
        }
    }
}
