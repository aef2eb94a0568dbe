use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Client tuning knobs consumed by the embedding application.
///
/// The error core itself reads `dictionary_cache_capacity`; the retry
/// and timeout fields are handed to the outer request loop that drives
/// the retryability classifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Entries kept per dictionary direction.
    pub dictionary_cache_capacity: usize,
    /// Attempts the retry policy may make for a retryable failure.
    pub max_retry_attempts: u32,
    /// Per-request deadline, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dictionary_cache_capacity: 100,
            max_retry_attempts: 3,
            request_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| format!("read config.toml: {e}"))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| format!("parse config.toml: {e}"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = ClientConfig::parse("max_retry_attempts = 5").unwrap();
        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.dictionary_cache_capacity, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(ClientConfig::parse("max_retry_attempts = ").is_err());
    }
}
