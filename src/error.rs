use chrono::NaiveDateTime;
use thiserror::Error;

/// Banner text used when nothing more specific is available.
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("not logged in")]
    NotAuthenticated,

    #[error("session expired or access denied, please log in again")]
    Unauthorized,

    #[error("clinic backend is not reachable at {0}")]
    Connection(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("backend returned error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parsing error: {0}")]
    ResponseParsing(String),

    #[error(
        "appointments can only be changed at least {} days in advance (earliest: {earliest})",
        crate::policy::LEAD_TIME_DAYS
    )]
    LeadTime { earliest: NaiveDateTime },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("appointment {0} not found")]
    NotFound(i64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// Build an `Api` error from a non-success response body.
    ///
    /// The message is the body's `error` field, then `detail`, then the raw
    /// text, then the fallback.
    pub fn from_response(status: u16, body: &str) -> Self {
        let from_json = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["error", "detail", "message"]
                    .iter()
                    .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
            });

        let message = from_json
            .filter(|m| !m.trim().is_empty())
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        PortalError::Api { status, message }
    }

    /// Single human-readable line for an alert or banner.
    pub fn user_message(&self) -> String {
        let message = match self {
            PortalError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }

    /// Whether the session must be discarded after this error.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, PortalError::Unauthorized | PortalError::NotAuthenticated)
    }
}
