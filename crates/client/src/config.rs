use std::time::Duration;

use reqwest::Url;

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Resolved base address of the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse an `http` or `https` base URL, e.g.
    /// `https://api.example.com/prod/`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            var: "MMM_API_ENDPOINT",
            reason,
        };
        let base = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(invalid(format!("{raw} is not an http(s) base URL")));
        }
        Ok(Self { base })
    }

    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    /// Append path segments to the base URL. Each segment is
    /// percent-encoded, so opaque ids cannot alter the path.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Client configuration loaded from environment variables.
///
/// | Env Var                    | Default |
/// |----------------------------|---------|
/// | `MMM_API_ENDPOINT`         | required |
/// | `MMM_API_TOKEN`            | unset   |
/// | `MMM_REQUEST_TIMEOUT_SECS` | `30`    |
/// | `MMM_CATALOG_REFRESH_SECS` | `0` (off) |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    /// Bearer token for the static auth provider.
    pub token: Option<String>,
    /// Applied to every fetch; expiry counts as a network failure.
    pub request_timeout: Duration,
    /// Interval for periodic catalog refresh, if enabled.
    pub catalog_refresh: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            catalog_refresh: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup("MMM_API_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("MMM_API_ENDPOINT"))?;
        let endpoint = Endpoint::parse(&endpoint)?;

        let token = lookup("MMM_API_TOKEN").filter(|v| !v.trim().is_empty());

        let timeout_secs = parse_secs(&lookup, "MMM_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "MMM_REQUEST_TIMEOUT_SECS",
                reason: "must be at least 1".into(),
            });
        }

        let catalog_refresh = parse_secs(&lookup, "MMM_CATALOG_REFRESH_SECS")?
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            endpoint,
            token,
            request_timeout: Duration::from_secs(timeout_secs),
            catalog_refresh,
        })
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(var)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                var,
                reason: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}
