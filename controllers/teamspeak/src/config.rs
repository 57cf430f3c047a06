//! Controller configuration.
//!
//! All settings come from environment variables and are read once at
//! startup. Unset variables fall back to defaults; unparseable values are
//! rejected.

use crate::error::ControllerError;
use crds::DEFAULT_ADDRESS_ANNOTATION;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Default image repository; the tag is the resource's `spec.version`.
pub const DEFAULT_IMAGE_REPOSITORY: &str = "teamspeak";

/// Runtime configuration of the Teamspeak Controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch Teamspeak resources in (`None` = all namespaces)
    pub namespace: Option<String>,
    /// Node annotation holding the comma-separated address pool
    pub address_annotation: String,
    /// Image repository for game-server Pods
    pub image_repository: String,
    /// Bind address of the probe and metrics server
    pub metrics_addr: SocketAddr,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Debounce window for watch events
    pub debounce: Duration,
    /// Requeue backoff lower bound in minutes
    pub backoff_min_minutes: u64,
    /// Requeue backoff upper bound in minutes
    pub backoff_max_minutes: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            address_annotation: DEFAULT_ADDRESS_ANNOTATION.to_string(),
            image_repository: DEFAULT_IMAGE_REPOSITORY.to_string(),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            concurrency: 4,
            debounce: Duration::from_secs(1),
            backoff_min_minutes: 1,
            backoff_max_minutes: 10,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            namespace: get("WATCH_NAMESPACE"),
            address_annotation: get("ADDRESS_ANNOTATION").unwrap_or(defaults.address_annotation),
            image_repository: get("TEAMSPEAK_IMAGE").unwrap_or(defaults.image_repository),
            metrics_addr: parse_or(get("METRICS_ADDR"), "METRICS_ADDR", defaults.metrics_addr)?,
            concurrency: parse_or(get("RECONCILE_CONCURRENCY"), "RECONCILE_CONCURRENCY", defaults.concurrency)?,
            debounce: Duration::from_secs(parse_or(
                get("RECONCILE_DEBOUNCE_SECS"),
                "RECONCILE_DEBOUNCE_SECS",
                defaults.debounce.as_secs(),
            )?),
            backoff_min_minutes: parse_or(get("BACKOFF_MIN_MINUTES"), "BACKOFF_MIN_MINUTES", defaults.backoff_min_minutes)?,
            backoff_max_minutes: parse_or(get("BACKOFF_MAX_MINUTES"), "BACKOFF_MAX_MINUTES", defaults.backoff_max_minutes)?,
        };

        if config.backoff_min_minutes == 0 || config.backoff_min_minutes > config.backoff_max_minutes {
            return Err(ControllerError::InvalidConfig(format!(
                "backoff bounds must satisfy 0 < BACKOFF_MIN_MINUTES ({}) <= BACKOFF_MAX_MINUTES ({})",
                config.backoff_min_minutes, config.backoff_max_minutes
            )));
        }

        Ok(config)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{} = {:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<OperatorConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OperatorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.address_annotation, "chinchilla.gameservers.addresses");
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WATCH_NAMESPACE", "games"),
            ("ADDRESS_ANNOTATION", "example.com/addresses"),
            ("TEAMSPEAK_IMAGE", "registry.local/teamspeak"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
            ("RECONCILE_CONCURRENCY", "8"),
            ("RECONCILE_DEBOUNCE_SECS", "0"),
            ("BACKOFF_MIN_MINUTES", "2"),
            ("BACKOFF_MAX_MINUTES", "5"),
        ])
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("games"));
        assert_eq!(config.address_annotation, "example.com/addresses");
        assert_eq!(config.image_repository, "registry.local/teamspeak");
        assert_eq!(config.metrics_addr, "127.0.0.1:9090".parse().unwrap());
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.debounce, Duration::ZERO);
        assert_eq!((config.backoff_min_minutes, config.backoff_max_minutes), (2, 5));
    }

    #[test]
    fn test_empty_namespace_means_all() {
        let config = load(&[("WATCH_NAMESPACE", "  ")]).unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = load(&[("RECONCILE_CONCURRENCY", "many")]).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("RECONCILE_CONCURRENCY")));
    }

    #[test]
    fn test_inverted_backoff_bounds_rejected() {
        let err = load(&[("BACKOFF_MIN_MINUTES", "10"), ("BACKOFF_MAX_MINUTES", "1")]).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
