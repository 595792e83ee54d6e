//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream endpoints and HTTP behavior
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache backend and freshness settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log filtering
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.upstream.list_url)?;
        Url::parse(&self.upstream.schedule_url)?;

        if self.upstream.user_agent.trim().is_empty() {
            return Err(AppError::validation("upstream.user_agent is empty"));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(AppError::validation("upstream.timeout_secs must be > 0"));
        }
        if encoding_rs::Encoding::for_label(self.upstream.charset.trim().as_bytes()).is_none() {
            return Err(AppError::validation(format!(
                "upstream.charset '{}' is not a known encoding",
                self.upstream.charset
            )));
        }
        for (name, value) in &self.upstream.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::validation(format!("header name '{name}': {e}")))?;
            reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| AppError::validation(format!("header '{name}' value: {e}")))?;
        }
        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.trim().is_empty() {
            return Err(AppError::validation(
                "cache.redis_url is required for the redis backend",
            ));
        }
        Ok(())
    }
}

/// Upstream endpoints and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Endpoint answering the list protocol (form POST)
    #[serde(default = "defaults::list_url")]
    pub list_url: String,

    /// Endpoint answering the HTML schedule protocol (GET)
    #[serde(default = "defaults::schedule_url")]
    pub schedule_url: String,

    /// Charset used to decode bodies that do not declare one
    #[serde(default = "defaults::charset")]
    pub charset: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra headers sent with list requests
    #[serde(default = "defaults::headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            list_url: defaults::list_url(),
            schedule_url: defaults::schedule_url(),
            charset: defaults::charset(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            headers: defaults::headers(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which cache store backs the cache-aside wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local store
    #[default]
    Memory,
    /// Redis server (requires the `redis` feature)
    Redis,
}

impl CacheBackend {
    /// Whether entries outlive the process and are seen by later runs.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Redis)
    }
}

/// How a TTL is attached to a freshly stored entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlPolicy {
    /// TTL is part of the store operation
    #[default]
    Atomic,
    /// Plain store followed by a separate expire when a TTL is requested
    SetThenExpire,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    #[serde(default = "defaults::redis_url")]
    pub redis_url: String,

    /// TTL for faculties, courses, groups, departments and teachers (0 = never expires)
    #[serde(default = "defaults::reference_ttl")]
    pub reference_ttl_secs: u64,

    /// TTL for student and teacher schedules (0 = never expires)
    #[serde(default = "defaults::schedule_ttl")]
    pub schedule_ttl_secs: u64,

    #[serde(default)]
    pub ttl_policy: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: defaults::redis_url(),
            reference_ttl_secs: defaults::reference_ttl(),
            schedule_ttl_secs: defaults::schedule_ttl(),
            ttl_policy: TtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn reference_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.reference_ttl_secs)
    }

    pub fn schedule_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.schedule_ttl_secs)
    }
}

fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    // Upstream defaults
    pub fn list_url() -> String {
        "http://www.osu.ru/pages/schedule/index.php".into()
    }
    pub fn schedule_url() -> String {
        "http://www.osu.ru/pages/schedule/".into()
    }
    pub fn charset() -> String {
        "windows-1251".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; osu-schedule/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn headers() -> BTreeMap<String, String> {
        BTreeMap::from([("X-Requested-With".to_string(), "XMLHttpRequest".to_string())])
    }

    // Cache defaults
    pub fn redis_url() -> String {
        "redis://127.0.0.1:6379".into()
    }
    pub fn reference_ttl() -> u64 {
        8 * 60 * 60
    }
    pub fn schedule_ttl() -> u64 {
        60 * 60
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.upstream.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.upstream.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn only_redis_backend_is_shared() {
        assert!(!CacheBackend::Memory.is_shared());
        assert!(!CacheConfig::default().backend.is_shared());
        assert!(CacheBackend::Redis.is_shared());
    }

    #[test]
    fn validate_rejects_unknown_charset() {
        let mut config = Config::default();
        config.upstream.charset = "klingon".to_string();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = Config::default();
        config.upstream.list_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn validate_rejects_bad_header() {
        let mut config = Config::default();
        config
            .upstream
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_ttls() {
        let cache = CacheConfig::default();
        assert_eq!(cache.reference_ttl(), Some(Duration::from_secs(28_800)));
        assert_eq!(cache.schedule_ttl(), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let cache = CacheConfig {
            schedule_ttl_secs: 0,
            ..CacheConfig::default()
        };
        assert_eq!(cache.schedule_ttl(), None);
    }

    #[test]
    fn load_partial_toml_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[cache]
backend = "redis"
ttl_policy = "set_then_expire"
schedule_ttl_secs = 120
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.ttl_policy, TtlPolicy::SetThenExpire);
        assert_eq!(config.cache.schedule_ttl_secs, 120);
        assert_eq!(config.cache.reference_ttl_secs, 28_800);
        assert_eq!(config.upstream.charset, "windows-1251");
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let config = Config::load_or_default("/nonexistent/config.toml");
        assert_eq!(config.upstream.timeout_secs, 30);
    }
}
