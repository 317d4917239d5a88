//! Blocking reqwest client (no Tokio runtime required).

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{RequestBuilder, Response};
use reqwest::StatusCode;
use shiftgrid_config::{credentials, Settings};
use shiftgrid_engine::{AuditFeed, BackendError, MonthKey, Notifier, ScheduleBackend};
use shiftgrid_protocol::{
    AuditRecord, MonthData, NotificationRequest, RejectionKind, SaveRequest, SaveResponse,
};

/// Carries `SaveRequest::request_id` so a retried submission is applied once.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Schedule backend client (blocking).
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::blocking::Client,
    api_base: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("sgrid/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("cannot create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client for the configured backend, authenticated with the stored token
    /// if there is one.
    pub fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        let lookup = credentials::get_token(&settings.backend_url);
        log::debug!("Backend token source: {}", lookup.source.as_str());
        Self::new(&settings.backend_url, lookup.token, settings.timeout())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn month_url(&self, month: MonthKey, suffix: &str) -> String {
        format!("{}/api/schedules/{}/{:02}{}", self.api_base, month.year, month.month, suffix)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request
            .send()
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }

    fn check(response: Response) -> Result<Response, BackendError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response))
        }
    }
}

/// Error for a non-success response. 5xx is transient.
fn status_error(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    if (500..600).contains(&status) {
        BackendError::Unavailable(format!("HTTP {}: {}", status, body))
    } else {
        BackendError::Http(status, body)
    }
}

impl ScheduleBackend for HttpBackend {
    fn fetch_month(&self, month: MonthKey) -> Result<MonthData, BackendError> {
        let url = self.month_url(month, "");
        let response = Self::check(self.send(self.http.get(&url))?)?;
        response
            .json::<MonthData>()
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    fn submit(&self, request: &SaveRequest) -> Result<SaveResponse, BackendError> {
        let month = MonthKey { year: request.year, month: request.month };
        let url = self.month_url(month, "/changes");
        let response = self.send(
            self.http
                .post(&url)
                .header(IDEMPOTENCY_HEADER, request.request_id.to_string())
                .json(request),
        )?;

        // 409 and 422 carry a verdict, not a transport failure.
        let status = response.status();
        let rejection = match status {
            StatusCode::CONFLICT => Some(RejectionKind::Conflict),
            StatusCode::UNPROCESSABLE_ENTITY => Some(RejectionKind::Validation),
            _ => None,
        };
        if !status.is_success() && rejection.is_none() {
            return Err(status_error(response));
        }

        let body = response
            .text()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        match (serde_json::from_str::<SaveResponse>(&body), rejection) {
            (Ok(parsed), _) => Ok(parsed),
            (Err(_), Some(kind)) => Ok(SaveResponse::Rejected { kind, message: body }),
            (Err(e), None) => Err(BackendError::Parse(e.to_string())),
        }
    }
}

impl Notifier for HttpBackend {
    fn notify(&self, request: &NotificationRequest) -> Result<(), BackendError> {
        let url = format!("{}/api/notifications", self.api_base);
        Self::check(self.send(self.http.post(&url).json(request))?)?;
        Ok(())
    }
}

impl AuditFeed for HttpBackend {
    fn fetch(&self, month: MonthKey, since: Option<DateTime<Utc>>) -> Result<Vec<AuditRecord>, BackendError> {
        let url = self.month_url(month, "/audit");
        let mut request = self.http.get(&url);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339_opts(SecondsFormat::Millis, true))]);
        }
        let response = Self::check(self.send(request)?)?;
        response
            .json::<Vec<AuditRecord>>()
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}
