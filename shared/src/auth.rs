//! Sign-in and registration checks run before anything is sent.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::api::ApiError;
use crate::capabilities::KvError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("could not persist session: {0}")]
    Storage(#[from] KvError),
}

fn missing(fields: &[(&'static str, bool)]) -> Result<(), AuthError> {
    let empty: Vec<&'static str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if empty.is_empty() {
        Ok(())
    } else {
        Err(AuthError::MissingFields(empty))
    }
}

/// Both fields must be non-empty. Text is sent as typed.
pub fn check_login(email: &str, password: &SecretString) -> Result<(), AuthError> {
    missing(&[
        ("email", !email.is_empty()),
        ("password", !password.expose_secret().is_empty()),
    ])
}

pub fn check_register(name: &str, email: &str, password: &SecretString) -> Result<(), AuthError> {
    missing(&[
        ("name", !name.is_empty()),
        ("email", !email.is_empty()),
        ("password", !password.expose_secret().is_empty()),
    ])
}
