//! API Configuration
//!
//! Serving options read from the environment at startup. Defaults are
//! development-friendly: every origin allowed, no seed data.

use std::path::PathBuf;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty means allow any origin (dev mode).
    pub cors_origins: Vec<String>,
    /// Whether CORS responses allow credentials. Only honored when an
    /// explicit origin list is configured; the wildcard origin cannot
    /// carry credentials.
    pub cors_allow_credentials: bool,
    /// Max age for CORS preflight caching, in seconds.
    pub cors_max_age_secs: u64,
    /// Optional JSON file of collections to load into the store at startup.
    pub seed_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86_400,
            seed_file: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// - `TALLY_CORS_ORIGINS`: comma-separated origin list
    /// - `TALLY_CORS_ALLOW_CREDENTIALS`: `true`/`false`
    /// - `TALLY_CORS_MAX_AGE_SECS`: preflight cache seconds
    /// - `TALLY_SEED_FILE`: path to a JSON seed file
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("TALLY_CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        let cors_allow_credentials = std::env::var("TALLY_CORS_ALLOW_CREDENTIALS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.cors_allow_credentials);

        let cors_max_age_secs = std::env::var("TALLY_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let seed_file = std::env::var("TALLY_SEED_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            seed_file,
        }
    }

    /// An explicit origin list marks a production deployment.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Whether the given origin passes the configured CORS policy.
    /// Entries of the form `*.example.com` match any subdomain.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            if let Some(domain) = allowed.strip_prefix("*.") {
                if let Some(host) = origin.split("//").nth(1) {
                    return host == domain || host.ends_with(&format!(".{}", domain));
                }
            }
            false
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_dev_mode() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86_400);
        assert!(config.seed_file.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_dev_mode_allows_any_origin() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("http://localhost:5173"));
        assert!(config.is_origin_allowed("https://anything.example"));
    }

    #[test]
    fn test_exact_origin_match() {
        let config = ApiConfig {
            cors_origins: vec!["https://app.tally.dev".to_string()],
            ..ApiConfig::default()
        };
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://app.tally.dev"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }

    #[test]
    fn test_wildcard_subdomain_match() {
        let config = ApiConfig {
            cors_origins: vec!["*.tally.dev".to_string()],
            ..ApiConfig::default()
        };
        assert!(config.is_origin_allowed("https://app.tally.dev"));
        assert!(config.is_origin_allowed("https://staging.app.tally.dev"));
        assert!(config.is_origin_allowed("https://tally.dev"));
        assert!(!config.is_origin_allowed("https://tally.dev.evil.example"));
    }
}
