//! Explicit session context.
//!
//! Created at login, read on every request, and cleared on logout or when
//! the backend rejects the credentials.

use chrono::{DateTime, Local};

use crate::error::{PortalError, PortalResult};
use crate::models::{LoginResponse, User};

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: User,
    pub started_at: DateTime<Local>,
}

impl Session {
    pub fn from_login(response: LoginResponse) -> PortalResult<Self> {
        if response.access.trim().is_empty() {
            return Err(PortalError::ResponseParsing(
                "login response carried an empty access token".to_string(),
            ));
        }

        Ok(Session {
            access_token: response.access,
            refresh_token: response.refresh,
            user: response.user,
            started_at: Local::now(),
        })
    }
}

/// Holder for the current session, passed explicitly to every backend call.
#[derive(Debug, Default)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&mut self, session: Session) {
        tracing::info!(user_id = session.user.id, "Session established");
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Bearer token for the next request.
    pub fn access_token(&self) -> PortalResult<&str> {
        self.session
            .as_ref()
            .map(|s| s.access_token.as_str())
            .ok_or(PortalError::NotAuthenticated)
    }

    /// Drop the session. Returns the session that was cleared, if any.
    pub fn clear(&mut self) -> Option<Session> {
        let previous = self.session.take();
        if let Some(session) = &previous {
            tracing::info!(user_id = session.user.id, "Session cleared");
        }
        previous
    }

    /// Clear the session if `error` is an authentication failure, then hand
    /// the error back.
    pub fn absorb(&mut self, error: PortalError) -> PortalError {
        if error.is_auth_failure() {
            self.clear();
        }
        error
    }
}
