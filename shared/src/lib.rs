//! Shared core of the traffic-alert map client.
//!
//! A Crux app: the platform shell sends [`Event`]s, performs the requested
//! [`Effect`]s and renders [`view::PanelView`]. Foreign shells talk to it
//! through the serialized bridge below; Rust shells can use [`shell`].

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod app;
pub mod auth;
pub mod capabilities;
pub mod config;
pub mod incidents;
pub mod location;
pub mod model;
pub mod session;
pub mod shell;
pub mod validation;
pub mod view;

use crux_core::bridge::Bridge;
use crux_core::Core;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

pub use api::{AlertApi, ApiError, CreatedIncident};
pub use app::{App, Event, Model};
pub use auth::AuthError;
pub use capabilities::{Capabilities, Effect};
pub use config::{ClientConfig, ConfigError};
pub use incidents::{IncidentStore, Snapshot};
pub use location::{LocationOutcome, LocationState};
pub use model::{
    Coordinate, CoordinateError, IncidentId, IncidentReport, Severity, UserId,
    REFERENCE_LOCATION, REFERENCE_LOCATION_TITLE,
};
pub use session::Session;
pub use validation::{validate, ReportDraft, SubmissionPhase, ValidatedReport, ValidationError};
pub use view::{PanelView, ToastKind, ToastView};

use capabilities::{HttpError, KvError, LocationError};

static CORE: LazyLock<Bridge<Effect, App>> =
    LazyLock::new(|| Bridge::new(Core::new::<Capabilities>()));

/// Bincode-encoded [`Event`] in, bincode-encoded effect requests out.
pub fn process_event(data: &[u8]) -> Vec<u8> {
    CORE.process_event(data)
}

/// Resolves the effect request `uuid` with a bincode-encoded output.
pub fn handle_response(uuid: &[u8], data: &[u8]) -> Vec<u8> {
    CORE.handle_response(uuid, data)
}

/// Bincode-encoded [`PanelView`].
pub fn view() -> Vec<u8> {
    CORE.view()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Storage,
    Deserialization,
    Location,
    LocationPermissionDenied,
    Configuration,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Storage => "STORAGE_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Location => "LOCATION_ERROR",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network
            | Self::Timeout
            | Self::Conflict
            | Self::RateLimited
            | Self::Storage
            | Self::Location => ErrorSeverity::Transient,

            Self::Deserialization | Self::Configuration | Self::Internal | Self::InvalidState => {
                ErrorSeverity::Fatal
            }

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::LocationPermissionDenied
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Timeout
                | Self::RateLimited
                | Self::Storage
                | Self::Conflict
                | Self::Location
        )
    }

    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    /// Text the backend asked to show, e.g. the `message` of a rejected request.
    pub server_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            server_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_server_message(mut self, message: impl Into<String>) -> Self {
        self.server_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        if let Some(server) = &self.server_message {
            return server.clone();
        }
        match self.kind {
            ErrorKind::Network => {
                "Could not connect to the server. Check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Incorrect email or password.".into(),
            ErrorKind::Authorization => "You don't have permission to perform this action.".into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Conflict => {
                "This action conflicts with a recent change. Please refresh and try again.".into()
            }
            ErrorKind::RateLimited => {
                "Too many requests. Please wait a moment and try again.".into()
            }
            ErrorKind::Storage => "Unable to read or save data on this device.".into(),
            ErrorKind::Deserialization => {
                "The server sent a response the app could not read.".into()
            }
            ErrorKind::Location => {
                "Unable to determine your location. Please check your GPS settings.".into()
            }
            ErrorKind::LocationPermissionDenied => {
                "No access to location. Reports need your current position.".into()
            }
            ErrorKind::Configuration => "The app is not configured correctly.".into(),
            ErrorKind::InvalidState => "Please wait for the current action to finish.".into(),
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let kind = match &e {
            HttpError::Timeout => ErrorKind::Timeout,
            HttpError::Network { .. } => ErrorKind::Network,
            HttpError::InvalidUrl { .. } => ErrorKind::Configuration,
        };
        let err = AppError::new(kind, e.to_string());
        match e {
            HttpError::InvalidUrl { url, .. } if !url.is_empty() => err.with_context("url", url),
            _ => err,
        }
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Transport(http) => http.into(),
            ApiError::Remote { status, message } => {
                AppError::new(ErrorKind::from_http_status(status), message.clone())
                    .with_server_message(message)
                    .with_context("http_status", status.to_string())
            }
            ApiError::Decode(reason) => AppError::new(ErrorKind::Deserialization, reason),
            ApiError::InvalidRequest(reason) => AppError::new(ErrorKind::Internal, reason),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::new(ErrorKind::Validation, e.user_facing_message())
            .with_context("rule", format!("{e:?}"))
    }
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        let kind = match e {
            LocationError::PermissionDenied => ErrorKind::LocationPermissionDenied,
            _ => ErrorKind::Location,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        AppError::new(ErrorKind::Storage, e.to_string())
    }
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingFields(_) => {
                AppError::new(ErrorKind::Validation, "Please fill in all fields.")
            }
            AuthError::Api(api) => api.into(),
            AuthError::Storage(kv) => kv.into(),
        }
    }
}

/// Blocking alert shown by the shell until dismissed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingAlert {
    pub title: String,
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingAlert {
    fn from(e: &AppError) -> Self {
        let title = match e.kind {
            ErrorKind::LocationPermissionDenied => "Permission denied",
            _ => "Error",
        };
        Self {
            title: title.to_string(),
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}
