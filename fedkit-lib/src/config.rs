//! Configuration for the federation pipelines.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Tunables shared by the codecs, the document cache and the HTTP client.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use fedkit_lib::FederationConfig;
///
/// let config = FederationConfig::from_json(r#"{"fetch_timeout_secs": 5}"#).unwrap();
/// assert_eq!(config.fetch_timeout_secs, 5);
/// assert_eq!(config.cache_ttl_secs, 3600);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// User-Agent sent with fetches and deliveries.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for blocking fetch/send calls.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// How long fetched documents stay in the cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached documents.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Oldest acceptable HTTP signature `Date`.
    #[serde(default = "default_signature_max_age")]
    pub signature_max_age_secs: i64,

    /// How far into the future an HTTP signature `Date` may be.
    #[serde(default = "default_signature_max_skew")]
    pub signature_max_skew_secs: i64,

    /// Base URL for rendered hashtag links (`{base}{tag}`).
    #[serde(default)]
    pub tag_base_url: Option<String>,

    /// Attach LD signatures to public ActivityPub deliveries.
    #[serde(default = "default_true")]
    pub ld_sign_public_activities: bool,
}

fn default_user_agent() -> String {
    format!("fedkit/{}", env!("CARGO_PKG_VERSION"))
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_max_entries() -> usize {
    1024
}

fn default_signature_max_age() -> i64 {
    24 * 60 * 60
}

fn default_signature_max_skew() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            cache_max_entries: default_cache_max_entries(),
            signature_max_age_secs: default_signature_max_age(),
            signature_max_skew_secs: default_signature_max_skew(),
            tag_base_url: None,
            ld_sign_public_activities: true,
        }
    }
}

impl FederationConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON, filling gaps with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the fetch/send timeout.
    pub fn with_fetch_timeout(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    /// Set cache TTL and capacity.
    pub fn with_cache(mut self, ttl_secs: u64, max_entries: usize) -> Self {
        self.cache_ttl_secs = ttl_secs;
        self.cache_max_entries = max_entries;
        self
    }

    /// Set the HTTP signature replay window.
    pub fn with_signature_window(mut self, max_age_secs: i64, max_skew_secs: i64) -> Self {
        self.signature_max_age_secs = max_age_secs;
        self.signature_max_skew_secs = max_skew_secs;
        self
    }

    /// Set the hashtag link base.
    pub fn with_tag_base_url(mut self, url: impl Into<String>) -> Self {
        self.tag_base_url = Some(url.into());
        self
    }

    /// Toggle LD signatures on public ActivityPub deliveries.
    pub fn with_ld_signatures(mut self, enabled: bool) -> Self {
        self.ld_sign_public_activities = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FederationConfig::default();
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.signature_max_age_secs, 86_400);
        assert_eq!(config.signature_max_skew_secs, 30);
        assert!(config.ld_sign_public_activities);
        assert!(config.user_agent.starts_with("fedkit/"));
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            FederationConfig::from_json(r#"{"tag_base_url": "https://example.com/tag/"}"#)
                .unwrap();
        assert_eq!(
            config.tag_base_url.as_deref(),
            Some("https://example.com/tag/")
        );
        assert_eq!(config.cache_max_entries, 1024);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(FederationConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_builders() {
        let config = FederationConfig::new()
            .with_fetch_timeout(3)
            .with_cache(60, 8)
            .with_signature_window(600, 5)
            .with_ld_signatures(false);
        assert_eq!(config.fetch_timeout_secs, 3);
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.cache_max_entries, 8);
        assert_eq!(config.signature_max_age_secs, 600);
        assert!(!config.ld_sign_public_activities);
    }
}
