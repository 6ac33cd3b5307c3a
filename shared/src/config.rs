use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::{HttpError, ValidatedUrl};
use crate::model::{Coordinate, REFERENCE_LOCATION};

pub const API_URL_ENV: &str = "ALERT_API_URL";
pub const API_TIMEOUT_ENV: &str = "ALERT_API_TIMEOUT_MS";

/// Span of the visible map region, in degrees, on both axes.
pub const DEFAULT_REGION_DELTA: f64 = 0.01;

pub const MIN_TIMEOUT_MS: u64 = 1;
pub const MAX_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not set")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] HttpError),
}

/// Client settings shared by the API client and the panel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ConfigFields")]
pub struct ClientConfig {
    api_base: ValidatedUrl,
    reference_location: Coordinate,
    region_delta: f64,
    request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: ValidatedUrl::new(api_base)?,
            reference_location: REFERENCE_LOCATION,
            region_delta: DEFAULT_REGION_DELTA,
            request_timeout: None,
        })
    }

    /// Reads `ALERT_API_URL` (required) and `ALERT_API_TIMEOUT_MS` (optional).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = lookup(API_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { name: API_URL_ENV })?;
        let mut config = Self::new(base.trim())?;

        if let Some(raw) = lookup(API_TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            let millis: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                name: API_TIMEOUT_ENV,
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
            config = config
                .with_request_timeout(Duration::from_millis(millis))
                .map_err(|e| match e {
                    ConfigError::Invalid { reason, .. } => ConfigError::Invalid {
                        name: API_TIMEOUT_ENV,
                        value: raw,
                        reason,
                    },
                    other => other,
                })?;
        }

        Ok(config)
    }

    /// Accepts timeouts from 1 ms up to [`MAX_TIMEOUT_MS`].
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        let millis = timeout.as_millis();
        if millis < u128::from(MIN_TIMEOUT_MS) || millis > u128::from(MAX_TIMEOUT_MS) {
            return Err(ConfigError::Invalid {
                name: "request_timeout",
                value: format!("{timeout:?}"),
                reason: format!(
                    "timeout must be between {MIN_TIMEOUT_MS} ms and {MAX_TIMEOUT_MS} ms"
                ),
            });
        }
        self.request_timeout = Some(timeout);
        Ok(self)
    }

    #[must_use]
    pub fn with_reference_location(mut self, location: Coordinate) -> Self {
        self.reference_location = location;
        self
    }

    /// Non-finite or non-positive deltas are ignored.
    #[must_use]
    pub fn with_region_delta(mut self, delta: f64) -> Self {
        if delta.is_finite() && delta > 0.0 {
            self.region_delta = delta;
        }
        self
    }

    pub fn api_base(&self) -> &ValidatedUrl {
        &self.api_base
    }

    pub fn reference_location(&self) -> Coordinate {
        self.reference_location
    }

    pub fn region_delta(&self) -> f64 {
        self.region_delta
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

/// What a shell sends in `Event::Configure`.
#[derive(Deserialize)]
struct ConfigFields {
    api_base: String,
    #[serde(default)]
    reference_location: Option<Coordinate>,
    #[serde(default)]
    region_delta: Option<f64>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}

impl TryFrom<ConfigFields> for ClientConfig {
    type Error = ConfigError;

    fn try_from(fields: ConfigFields) -> Result<Self, Self::Error> {
        let mut config = Self::new(fields.api_base)?;
        if let Some(location) = fields.reference_location {
            config = config.with_reference_location(location);
        }
        if let Some(delta) = fields.region_delta {
            config = config.with_region_delta(delta);
        }
        if let Some(millis) = fields.request_timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(millis))?;
        }
        Ok(config)
    }
}
