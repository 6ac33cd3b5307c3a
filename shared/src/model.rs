use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(IncidentId);
numeric_id!(UserId);

// --- Coordinate: validated, NaN-safe ---

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

/// Fixed fallback center of the map, also drawn as its own marker.
pub const REFERENCE_LOCATION: Coordinate = Coordinate {
    latitude: 20.655788,
    longitude: -100.405107,
};

pub const REFERENCE_LOCATION_TITLE: &str = "UTEQ";

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.longitude
    }
}

/// Parses a number the way JavaScript's `parseFloat` does: leading
/// whitespace is skipped and the longest numeric prefix wins. Text without
/// a numeric prefix yields NaN.
#[must_use]
pub fn parse_float_lenient(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        end = frac_end;
    }

    if mantissa_digits == 0 {
        return f64::NAN;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoordinateField {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

fn lenient_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CoordinateField::deserialize(deserializer)? {
        CoordinateField::Number(n) => n,
        CoordinateField::Text(text) => parse_float_lenient(&text),
        CoordinateField::Other(_) => f64::NAN,
    })
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Severity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "verde")]
    Low,
    #[serde(rename = "naranja")]
    Medium,
    #[default]
    #[serde(rename = "rojo")]
    High,
}

impl Severity {
    /// Selector order shown in the report editor.
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Low => "verde",
            Self::Medium => "naranja",
            Self::High => "rojo",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "VERDE",
            Self::Medium => "NARANJA",
            Self::High => "ROJO",
        }
    }

    #[must_use]
    pub const fn color_hex(self) -> &'static str {
        match self {
            Self::Low => "#10b981",
            Self::Medium => "#f59e0b",
            Self::High => "#dc2626",
        }
    }

    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "verde" => Some(Self::Low),
            "naranja" => Some(Self::Medium),
            "rojo" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- Incident records ---

/// One record of the remote collection, as last fetched.
///
/// Coordinates are kept exactly as decoded (possibly NaN); use
/// [`IncidentReport::coordinate`] before drawing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub id: IncidentId,
    #[serde(rename = "descripcion", default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(
        rename = "latitud",
        deserialize_with = "lenient_coordinate",
        default = "missing_coordinate"
    )]
    pub latitude: f64,
    #[serde(
        rename = "longitud",
        deserialize_with = "lenient_coordinate",
        default = "missing_coordinate"
    )]
    pub longitude: f64,
    #[serde(rename = "nivel", default, deserialize_with = "null_as_default")]
    pub level: String,
    /// Missing on records whose author was deleted server-side.
    #[serde(rename = "usuario_id", default)]
    pub reporter_id: Option<UserId>,
}

impl IncidentReport {
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude).ok()
    }

    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        Severity::from_wire(&self.level)
    }

    /// Upper-cased level text; unknown levels are shown as sent.
    #[must_use]
    pub fn level_label(&self) -> String {
        match self.severity() {
            Some(severity) => severity.label().to_string(),
            None => self.level.trim().to_uppercase(),
        }
    }
}

/// Body of `POST /reportes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIncidentRequest {
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "latitud")]
    pub latitude: f64,
    #[serde(rename = "longitud")]
    pub longitude: f64,
    #[serde(rename = "nivel")]
    pub severity: Severity,
    #[serde(rename = "usuario_id")]
    pub reporter_id: UserId,
}
