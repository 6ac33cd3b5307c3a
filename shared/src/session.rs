//! Session context: who is signed in, and the device's push token.
//!
//! Both live in the `KeyValue` store under the keys below. The app loads
//! them when it is configured and writes them on login, logout and when the
//! shell hands over a push token.

use tracing::warn;

use crate::model::UserId;

pub const USER_ID_KEY: &str = "session:usuario_id";
pub const PUSH_TOKEN_KEY: &str = "session:push_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    pub user_id: Option<UserId>,
}

impl Session {
    #[must_use]
    pub fn signed_in(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}

fn decode_text(key: &str, stored: Option<Vec<u8>>) -> Option<String> {
    match String::from_utf8(stored?) {
        Ok(text) => Some(text),
        Err(_) => {
            warn!(key, "stored session value is not UTF-8, ignoring");
            None
        }
    }
}

/// Stored user id. Values that do not parse as an integer read as absent.
#[must_use]
pub fn decode_user_id(stored: Option<Vec<u8>>) -> Option<UserId> {
    let text = decode_text(USER_ID_KEY, stored)?;
    match text.trim().parse::<i64>() {
        Ok(id) => Some(UserId::new(id)),
        Err(_) => {
            warn!("stored user id is not numeric, treating session as absent");
            None
        }
    }
}

#[must_use]
pub fn encode_user_id(user_id: UserId) -> Vec<u8> {
    user_id.to_string().into_bytes()
}

/// Push token registered by the platform shell. Blank tokens read as absent.
#[must_use]
pub fn decode_push_token(stored: Option<Vec<u8>>) -> Option<String> {
    decode_text(PUSH_TOKEN_KEY, stored).filter(|token| !token.trim().is_empty())
}
