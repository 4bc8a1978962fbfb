use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, StashError};

/// Environment variable holding the artifact registry base URI.
pub const STORAGE_BASEURI_ENV: &str = "STORAGE_BASEURI";

/// Environment variable that switches the artifact registry to plain HTTP.
pub const STORAGE_BASEURI_PLAINHTTP_ENV: &str = "STORAGE_BASEURI_PLAINHTTP";

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URI of the artifact registry (e.g. `docker://registry.example/appstash`)
    pub base_uri: String,

    /// Talk plain HTTP instead of HTTPS
    pub plain_http: bool,

    /// Transport timeout for a single push or pull, in seconds
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_uri: String::new(),
            plain_http: false,
            timeout_secs: 300,
        }
    }
}

impl StorageConfig {
    /// Create a storage configuration for the given base URI.
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ..Default::default()
        }
    }

    /// Read `STORAGE_BASEURI` and `STORAGE_BASEURI_PLAINHTTP`.
    pub fn from_env() -> Result<Self> {
        let base_uri = std::env::var(STORAGE_BASEURI_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                StashError::ConfigError(format!("{} is not set", STORAGE_BASEURI_ENV))
            })?;
        let plain_http = std::env::var(STORAGE_BASEURI_PLAINHTTP_ENV)
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(Self {
            base_uri,
            plain_http,
            ..Default::default()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// First-party (vendor) registry that serves licensed images
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRegistry {
    /// Registry host (e.g. `registry.replicated.com`)
    pub endpoint: String,

    /// Pull-through proxy host for images hosted elsewhere
    pub proxy_endpoint: String,

    /// Repository path prefixes known to be licensed content.
    /// Empty means everything on the endpoint is licensed.
    #[serde(default)]
    pub licensed_paths: Vec<String>,
}

impl SourceRegistry {
    /// Whether `host` is this registry or its proxy.
    pub fn is_first_party(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        (!self.endpoint.is_empty() && host == self.endpoint.to_lowercase())
            || (!self.proxy_endpoint.is_empty() && host == self.proxy_endpoint.to_lowercase())
    }

    /// Whether `repository` falls under a licensed path.
    pub fn is_licensed_path(&self, repository: &str) -> bool {
        self.licensed_paths.is_empty()
            || self.licensed_paths.iter().any(|prefix| {
                let prefix = prefix.trim_matches('/');
                repository == prefix || repository.starts_with(&format!("{}/", prefix))
            })
    }
}

/// Mirror registry images are relocated into
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationRegistry {
    /// Registry host, optionally with port (e.g. `ttl.sh`)
    pub endpoint: String,

    /// Namespace under the endpoint (may be empty)
    pub namespace: String,
}

impl DestinationRegistry {
    pub fn new(endpoint: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: namespace.into(),
        }
    }
}

/// Which classified images get a relocation directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelocationPolicy {
    /// Relocate every image (air-gapped installs)
    RelocateAll,
    /// Relocate only images that need credentials
    #[default]
    RelocatePrivateOnly,
}

/// Treatment of digest-qualified image references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DigestPolicy {
    /// Relocate and carry the digest through in the directive
    #[default]
    Carry,
    /// Leave digest-qualified references where they are
    Exclude,
}

/// Log level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = StashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(StashError::ConfigError(format!("unknown log level '{}'", other))),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default_timeout() {
        let config = StorageConfig::new("docker://registry.example/base");
        assert_eq!(config.base_uri, "docker://registry.example/base");
        assert!(!config.plain_http);
        assert_eq!(config.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_first_party_matches_endpoint_and_proxy() {
        let source = SourceRegistry {
            endpoint: "registry.replicated.com".to_string(),
            proxy_endpoint: "proxy.replicated.com".to_string(),
            ..Default::default()
        };
        assert!(source.is_first_party("registry.replicated.com"));
        assert!(source.is_first_party("Proxy.Replicated.com"));
        assert!(!source.is_first_party("quay.io"));
    }

    #[test]
    fn test_first_party_empty_endpoint_matches_nothing() {
        let source = SourceRegistry::default();
        assert!(!source.is_first_party(""));
        assert!(!source.is_first_party("docker.io"));
    }

    #[test]
    fn test_licensed_paths() {
        let mut source = SourceRegistry::default();
        assert!(source.is_licensed_path("anything/at/all"));

        source.licensed_paths = vec!["appslug".to_string()];
        assert!(source.is_licensed_path("appslug/image"));
        assert!(source.is_licensed_path("appslug"));
        assert!(!source.is_licensed_path("appslug-other/image"));
    }

    #[test]
    fn test_registries_carry_no_credentials() {
        let source = SourceRegistry {
            endpoint: "registry.replicated.com".to_string(),
            proxy_endpoint: "proxy.replicated.com".to_string(),
            licensed_paths: Vec::new(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert!(json.get("username").is_none());
        assert!(json.get("password").is_none());

        let json = serde_json::to_value(DestinationRegistry::new("ttl.sh", "testing-ns")).unwrap();
        assert_eq!(json, serde_json::json!({"endpoint": "ttl.sh", "namespace": "testing-ns"}));
    }

    #[test]
    fn test_policy_defaults() {
        assert_eq!(RelocationPolicy::default(), RelocationPolicy::RelocatePrivateOnly);
        assert_eq!(DigestPolicy::default(), DigestPolicy::Carry);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing::Level::from(LogLevel::Debug), tracing::Level::DEBUG);
        assert_eq!(tracing::Level::from(LogLevel::default()), tracing::Level::WARN);
    }

    #[test]
    fn test_log_level_from_str() {
        assert!(matches!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info)));
        assert!(matches!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn)));
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
