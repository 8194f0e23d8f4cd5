use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ClinicBackend;
use crate::config::PortalConfig;
use crate::documents::{Document, DocumentKind};
use crate::error::{PortalError, PortalResult};
use crate::models::{
    Appointment, BookingRequest, LoginResponse, PatientProfile, RescheduleRequest, StatusUpdate,
};
use crate::session::{Session, SessionContext};

/// Blocking HTTP client for the clinic backend.
pub struct HttpBackend {
    base_url: String,
    client: Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LogoutBody<'a> {
    refresh: Option<&'a str>,
}

/// The list endpoint answers with a bare array or, when paginated, with
/// `{"results": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AppointmentList {
    Plain(Vec<Appointment>),
    Paged { results: Vec<Appointment> },
}

impl AppointmentList {
    fn into_vec(self) -> Vec<Appointment> {
        match self {
            AppointmentList::Plain(list) => list,
            AppointmentList::Paged { results } => results,
        }
    }
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> PortalResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PortalError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &PortalConfig) -> PortalResult<Self> {
        Self::new(config.api_base_url(), config.timeout_secs())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(%method, path, request_id = %request_id, "Sending request");
        self.client
            .request(method, self.url(path))
            .header("X-Request-ID", request_id)
    }

    fn authorized(&self, ctx: &SessionContext, method: Method, path: &str) -> PortalResult<RequestBuilder> {
        let token = ctx.access_token()?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    fn transport_error(&self, e: reqwest::Error) -> PortalError {
        if e.is_connect() {
            PortalError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            PortalError::Timeout(self.timeout_secs)
        } else {
            PortalError::HttpClient(e.to_string())
        }
    }

    /// Send an authenticated request. A 401 clears the session.
    fn send(&self, ctx: &mut SessionContext, request: RequestBuilder) -> PortalResult<Response> {
        let response = request.send().map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected credentials, clearing session");
            return Err(ctx.absorb(PortalError::Unauthorized));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PortalError::from_response(status.as_u16(), &body));
        }

        Ok(response)
    }

    fn parse<T: DeserializeOwned>(response: Response) -> PortalResult<T> {
        response
            .json()
            .map_err(|e| PortalError::ResponseParsing(e.to_string()))
    }
}

impl ClinicBackend for HttpBackend {
    fn login(&self, ctx: &mut SessionContext, email: &str, password: &str) -> PortalResult<()> {
        let response = self
            .request(Method::POST, "auth/login/")
            .json(&LoginBody { email, password })
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PortalError::from_response(status.as_u16(), &body));
        }

        let login: LoginResponse = Self::parse(response)?;
        ctx.establish(Session::from_login(login)?);
        Ok(())
    }

    fn logout(&self, ctx: &mut SessionContext) -> PortalResult<()> {
        let result = match ctx.session() {
            Some(session) => {
                let body = LogoutBody {
                    refresh: session.refresh_token.as_deref(),
                };
                self.request(Method::POST, "auth/logout/")
                    .bearer_auth(&session.access_token)
                    .json(&body)
                    .send()
                    .map_err(|e| self.transport_error(e))
                    .map(|response| {
                        let status = response.status();
                        if !status.is_success() {
                            tracing::warn!(
                                status = status.as_u16(),
                                "Logout not acknowledged by backend, clearing session anyway"
                            );
                        }
                    })
            }
            None => Ok(()),
        };
        if let Err(e) = &result {
            tracing::warn!("Logout request failed: {e}");
        }
        ctx.clear();
        result
    }

    fn list_appointments(&self, ctx: &mut SessionContext) -> PortalResult<Vec<Appointment>> {
        let request = self.authorized(ctx, Method::GET, "appointments/")?;
        let response = self.send(ctx, request)?;
        let list: AppointmentList = Self::parse(response)?;
        Ok(list.into_vec())
    }

    fn book_appointment(&self, ctx: &mut SessionContext, request: &BookingRequest) -> PortalResult<()> {
        let builder = self
            .authorized(ctx, Method::POST, "appointments/")?
            .json(request);
        self.send(ctx, builder)?;
        Ok(())
    }

    fn update_status(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        update: &StatusUpdate,
    ) -> PortalResult<()> {
        let path = format!("appointments/{}/", appointment_id);
        let builder = self.authorized(ctx, Method::PATCH, &path)?.json(update);
        self.send(ctx, builder)?;
        Ok(())
    }

    fn reschedule(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        request: &RescheduleRequest,
    ) -> PortalResult<()> {
        let path = format!("appointments/{}/reschedule/", appointment_id);
        let builder = self.authorized(ctx, Method::POST, &path)?.json(request);
        self.send(ctx, builder)?;
        Ok(())
    }

    fn fetch_document(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        kind: DocumentKind,
    ) -> PortalResult<Document> {
        let path = format!("appointments/{}/{}/", appointment_id, kind.endpoint());
        let builder = self.authorized(ctx, Method::GET, &path)?;
        let response = self.send(ctx, builder)?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|e| PortalError::ResponseParsing(e.to_string()))?;

        Ok(Document {
            kind,
            appointment_id,
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    fn get_profile(&self, ctx: &mut SessionContext) -> PortalResult<PatientProfile> {
        let builder = self.authorized(ctx, Method::GET, "patients/profile/")?;
        let response = self.send(ctx, builder)?;
        Self::parse(response)
    }
}
