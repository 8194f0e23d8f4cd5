//! Portal runtime configuration.
//!
//! Resolved once at process startup and then passed into the backend
//! explicitly, so nothing reads environment variables while requests are
//! in flight.

use crate::error::{PortalError, PortalResult};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_FILTER: &str = "uhs_portal=info";

/// Configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    api_base_url: String,
    timeout_secs: u64,
    log_filter: String,
}

impl PortalConfig {
    pub fn new(api_base_url: &str, timeout_secs: u64, log_filter: &str) -> PortalResult<Self> {
        let api_base_url = api_base_url.trim().trim_end_matches('/');
        if api_base_url.is_empty() {
            return Err(PortalError::Config("UHS_API_URL cannot be empty".into()));
        }
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(PortalError::Config(format!(
                "UHS_API_URL must start with http:// or https://, got '{}'",
                api_base_url
            )));
        }
        if timeout_secs == 0 {
            return Err(PortalError::Config("UHS_TIMEOUT_SECS must be positive".into()));
        }

        Ok(Self {
            api_base_url: api_base_url.to_string(),
            timeout_secs,
            log_filter: log_filter.to_string(),
        })
    }

    /// Build from optional raw values, applying defaults for missing or
    /// blank entries.
    pub fn from_values(
        api_url: Option<String>,
        timeout_secs: Option<String>,
        log_filter: Option<String>,
    ) -> PortalResult<Self> {
        fn non_blank(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        let api_url = non_blank(api_url).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout_secs = match non_blank(timeout_secs) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                PortalError::Config(format!("UHS_TIMEOUT_SECS is not a number: '{}'", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let log_filter = non_blank(log_filter).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self::new(&api_url, timeout_secs, &log_filter)
    }

    /// Read `UHS_API_URL`, `UHS_TIMEOUT_SECS` and `UHS_LOG` from the
    /// environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> PortalResult<Self> {
        Self::from_values(
            std::env::var("UHS_API_URL").ok(),
            std::env::var("UHS_TIMEOUT_SECS").ok(),
            std::env::var("UHS_LOG").ok(),
        )
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = PortalConfig::from_values(None, Some("  ".into()), None).unwrap();
        assert_eq!(config.api_base_url(), DEFAULT_API_URL);
        assert_eq!(config.timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = PortalConfig::new("https://clinic.example.edu/api/", 10, "info").unwrap();
        assert_eq!(config.api_base_url(), "https://clinic.example.edu/api");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(PortalConfig::from_values(None, Some("0".into()), None).is_err());
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let err = PortalConfig::from_values(None, Some("soon".into()), None).unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn url_scheme_is_required() {
        assert!(PortalConfig::new("clinic.example.edu", 10, "info").is_err());
    }
}
