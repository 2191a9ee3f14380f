//! Configuration loading (environment).

use std::time::Duration;

use tracing::warn;

use haulway_core::{CoreError, CoreResult};

pub const ROLE_API_URL_VAR: &str = "HAULWAY_ROLE_API_URL";
pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const HTTP_TIMEOUT_VAR: &str = "HAULWAY_HTTP_TIMEOUT_SECS";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and credentials for the auth provider and role service.
///
/// Loading never fails. Missing values surface as `Misconfigured` when an
/// operation that needs them runs, so a half-configured build can still start
/// and show its sign-in screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub role_api_base_url: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub http_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            role_api_base_url: None,
            supabase_url: None,
            supabase_anon_key: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of touching the
    /// process environment).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_timeout = match lookup(HTTP_TIMEOUT_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "ignoring invalid {HTTP_TIMEOUT_VAR}");
                    DEFAULT_HTTP_TIMEOUT
                }
            },
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Self {
            role_api_base_url: lookup(ROLE_API_URL_VAR).and_then(normalize_url),
            supabase_url: lookup(SUPABASE_URL_VAR).and_then(normalize_url),
            supabase_anon_key: lookup(SUPABASE_ANON_KEY_VAR)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            http_timeout,
        }
    }

    /// Role-assignment base URL, or `Misconfigured`.
    pub fn role_api_base_url(&self) -> CoreResult<&str> {
        self.role_api_base_url
            .as_deref()
            .ok_or_else(|| CoreError::misconfigured(format!("{ROLE_API_URL_VAR} is not set")))
    }

    /// Auth provider URL and anon key, or `Misconfigured`.
    pub fn supabase(&self) -> CoreResult<(&str, &str)> {
        let url = self
            .supabase_url
            .as_deref()
            .ok_or_else(|| CoreError::misconfigured(format!("{SUPABASE_URL_VAR} is not set")))?;
        let key = self
            .supabase_anon_key
            .as_deref()
            .ok_or_else(|| CoreError::misconfigured(format!("{SUPABASE_ANON_KEY_VAR} is not set")))?;
        Ok((url, key))
    }

    /// Shared HTTP client honoring the configured timeout.
    pub fn http_client(&self) -> CoreResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| CoreError::misconfigured(format!("cannot build HTTP client: {e}")))
    }
}

fn normalize_url(raw: String) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
