//! Typed requests against the alert backend.
//!
//! [`AlertApi`] issues exactly one `Http` effect per call and hands the
//! decoded outcome back as an event. Decoding lives in plain functions over
//! [`HttpResponse`] so it can be tested without a shell. Non-2xx responses
//! become [`ApiError::Remote`] carrying the server's `message`.

use crux_http::protocol::HttpResponse;
use crux_http::Http;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::capabilities::{into_response, HttpError, ValidatedUrl};
use crate::model::{CreateIncidentRequest, IncidentReport, UserId};

pub const REPORTS_PATH: &str = "reportes";
pub const LOGIN_PATH: &str = "login";
pub const REGISTER_PATH: &str = "register";
pub const SAVE_TOKEN_PATH: &str = "save-token";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(HttpError),

    #[error("request rejected ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<HttpError> for ApiError {
    fn from(e: HttpError) -> Self {
        if e.is_transport() {
            Self::Transport(e)
        } else {
            Self::InvalidRequest(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Result of a successful create. The backend may echo the stored record or
/// answer with a bare confirmation.
#[derive(Debug, Clone)]
pub enum CreatedIncident {
    Record(IncidentReport),
    Confirmation { message: Option<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedInUser {
    pub id: UserId,
    #[serde(default, rename = "nombre")]
    pub name: Option<String>,
    #[serde(default, rename = "correo")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "usuario")]
    pub user: LoggedInUser,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    correo: &'a str,
    contrasena: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    nombre: &'a str,
    correo: &'a str,
    contrasena: &'a str,
}

#[derive(Serialize)]
struct SaveTokenBody<'a> {
    usuario_id: UserId,
    token: &'a str,
}

fn is_success(response: &HttpResponse) -> bool {
    (200..300).contains(&response.status)
}

fn remote_error(response: &HttpResponse) -> ApiError {
    let message = serde_json::from_slice::<ApiErrorResponse>(&response.body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("HTTP error: {}", response.status));
    ApiError::Remote {
        status: response.status,
        message,
    }
}

fn decode_json<T: for<'de> Deserialize<'de>>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Answer to `GET /reportes`. Records that cannot be decoded are skipped.
pub fn decode_reports(response: &HttpResponse) -> Result<Vec<IncidentReport>, ApiError> {
    if !is_success(response) {
        return Err(remote_error(response));
    }

    let raw: Vec<serde_json::Value> = decode_json(response)?;
    let total = raw.len();
    let reports: Vec<IncidentReport> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "skipping undecodable incident record");
                None
            }
        })
        .collect();

    debug!(total, decoded = reports.len(), "incident list fetched");
    Ok(reports)
}

/// Answer to `POST /reportes`. Any 2xx is success, whatever the body.
pub fn decode_created(response: &HttpResponse) -> Result<CreatedIncident, ApiError> {
    if !is_success(response) {
        return Err(remote_error(response));
    }

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreatedIncident::Confirmation { message: None });
    }

    let body: serde_json::Value = decode_json(response)?;
    match serde_json::from_value::<IncidentReport>(body.clone()) {
        Ok(record) => Ok(CreatedIncident::Record(record)),
        Err(_) => Ok(CreatedIncident::Confirmation {
            message: body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        }),
    }
}

pub fn decode_login(response: &HttpResponse) -> Result<LoginResponse, ApiError> {
    if !is_success(response) {
        return Err(remote_error(response));
    }
    decode_json(response)
}

/// Only `201 Created` counts as a registration; the server's message is
/// returned either way.
pub fn decode_register(response: &HttpResponse) -> Result<String, ApiError> {
    if response.status != 201 {
        return Err(remote_error(response));
    }
    Ok(serde_json::from_slice::<ApiErrorResponse>(&response.body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_default())
}

pub fn decode_ack(response: &HttpResponse) -> Result<(), ApiError> {
    if !is_success(response) {
        return Err(remote_error(response));
    }
    Ok(())
}

/// Borrowed view over the `Http` capability for one backend.
pub struct AlertApi<'a, Ev> {
    http: &'a Http<Ev>,
    base: &'a ValidatedUrl,
}

impl<'a, Ev> AlertApi<'a, Ev>
where
    Ev: 'static,
{
    pub fn new(http: &'a Http<Ev>, base: &'a ValidatedUrl) -> Self {
        Self { http, base }
    }

    fn endpoint(&self, path: &str) -> Result<ValidatedUrl, ApiError> {
        Ok(self.base.join_path(path)?)
    }

    /// Sends `body` as JSON to `path` and decodes the answer with `decode`.
    fn post<B, T: 'static, F>(
        &self,
        path: &str,
        body: &B,
        decode: fn(&HttpResponse) -> Result<T, ApiError>,
        on_done: F,
    ) -> Result<(), ApiError>
    where
        B: Serialize,
        F: FnOnce(Result<T, ApiError>) -> Ev + Send + 'static,
    {
        let url = self.endpoint(path)?;
        self.http
            .post(url.as_str())
            .header("Accept", "application/json")
            .body_json(body)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
            .send(move |result| {
                on_done(into_response(result).map_err(ApiError::from).and_then(|r| decode(&r)))
            });
        Ok(())
    }

    /// `GET /reportes`.
    pub fn list_reports<F>(&self, on_done: F) -> Result<(), ApiError>
    where
        F: FnOnce(Result<Vec<IncidentReport>, ApiError>) -> Ev + Send + 'static,
    {
        let url = self.endpoint(REPORTS_PATH)?;
        self.http
            .get(url.as_str())
            .header("Accept", "application/json")
            .send(move |result| {
                on_done(
                    into_response(result)
                        .map_err(ApiError::from)
                        .and_then(|r| decode_reports(&r)),
                )
            });
        Ok(())
    }

    /// `POST /reportes`.
    pub fn create_report<F>(&self, request: &CreateIncidentRequest, on_done: F) -> Result<(), ApiError>
    where
        F: FnOnce(Result<CreatedIncident, ApiError>) -> Ev + Send + 'static,
    {
        debug!(severity = %request.severity, "creating incident");
        self.post(REPORTS_PATH, request, decode_created, on_done)
    }

    /// `POST /login`.
    pub fn login<F>(&self, email: &str, password: &SecretString, on_done: F) -> Result<(), ApiError>
    where
        F: FnOnce(Result<LoginResponse, ApiError>) -> Ev + Send + 'static,
    {
        let body = LoginBody {
            correo: email,
            contrasena: password.expose_secret(),
        };
        self.post(LOGIN_PATH, &body, decode_login, on_done)
    }

    /// `POST /register`.
    pub fn register<F>(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
        on_done: F,
    ) -> Result<(), ApiError>
    where
        F: FnOnce(Result<String, ApiError>) -> Ev + Send + 'static,
    {
        let body = RegisterBody {
            nombre: name,
            correo: email,
            contrasena: password.expose_secret(),
        };
        self.post(REGISTER_PATH, &body, decode_register, on_done)
    }

    /// `POST /save-token`.
    pub fn save_push_token<F>(&self, user_id: UserId, token: &str, on_done: F) -> Result<(), ApiError>
    where
        F: FnOnce(Result<(), ApiError>) -> Ev + Send + 'static,
    {
        let body = SaveTokenBody {
            usuario_id: user_id,
            token,
        };
        self.post(SAVE_TOKEN_PATH, &body, decode_ack, on_done)
    }
}
