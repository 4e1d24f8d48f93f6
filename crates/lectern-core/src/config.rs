//! Gateway configuration.
//!
//! Built either programmatically or from `LECTERN_*` environment variables.

use std::time::Duration;

use lectern_store::DatasetRef;

use crate::domain::{GatewayError, Result};

/// Maximum number of documents a release may carry when it is published.
pub const RELEASE_DOCUMENT_LIMIT: usize = 50;

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2025-02-19";

pub const ENV_PROJECT_ID: &str = "LECTERN_PROJECT_ID";
pub const ENV_DATASET: &str = "LECTERN_DATASET";
pub const ENV_API_VERSION: &str = "LECTERN_API_VERSION";
pub const ENV_TOKEN: &str = "LECTERN_TOKEN";
pub const ENV_SUBSCRIPTION_IDLE_SECS: &str = "LECTERN_SUBSCRIPTION_IDLE_SECS";

/// Settings shared by every gateway component.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    /// Passed through to the transport collaborator; never logged
    pub token: Option<String>,
    pub release_document_limit: usize,
    /// Subscriptions idle for longer than this are evicted; `None` keeps them
    pub subscription_idle_timeout: Option<Duration>,
}

impl GatewayConfig {
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: None,
            release_document_limit: RELEASE_DOCUMENT_LIMIT,
            subscription_idle_timeout: None,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_subscription_idle_timeout(mut self, timeout: Duration) -> Self {
        self.subscription_idle_timeout = Some(timeout);
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GatewayError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(required(ENV_PROJECT_ID)?, required(ENV_DATASET)?);
        if let Some(version) = lookup(ENV_API_VERSION) {
            config.api_version = version;
        }
        config.token = lookup(ENV_TOKEN);
        if let Some(raw) = lookup(ENV_SUBSCRIPTION_IDLE_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GatewayError::Config(format!(
                    "{ENV_SUBSCRIPTION_IDLE_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            config.subscription_idle_timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef::new(&self.project_id, &self.dataset)
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("release_document_limit", &self.release_document_limit)
            .field("subscription_idle_timeout", &self.subscription_idle_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn loads_required_and_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup(&[(ENV_PROJECT_ID, "abc"), (ENV_DATASET, "prod")]))
                .unwrap();
        assert_eq!(config.project_id, "abc");
        assert_eq!(config.dataset, "prod");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.release_document_limit, RELEASE_DOCUMENT_LIMIT);
        assert!(config.token.is_none());
        assert!(config.subscription_idle_timeout.is_none());
    }

    #[test]
    fn missing_project_is_a_config_error() {
        let err = GatewayConfig::from_lookup(lookup(&[(ENV_DATASET, "prod")])).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains(ENV_PROJECT_ID));
    }

    #[test]
    fn parses_idle_timeout_and_rejects_garbage() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (ENV_PROJECT_ID, "abc"),
            (ENV_DATASET, "prod"),
            (ENV_SUBSCRIPTION_IDLE_SECS, "90"),
        ]))
        .unwrap();
        assert_eq!(config.subscription_idle_timeout, Some(Duration::from_secs(90)));

        let err = GatewayConfig::from_lookup(lookup(&[
            (ENV_PROJECT_ID, "abc"),
            (ENV_DATASET, "prod"),
            (ENV_SUBSCRIPTION_IDLE_SECS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let config = GatewayConfig::new("abc", "prod").with_token("sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
