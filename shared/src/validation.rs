//! Pre-submission checks for a report draft, and the submission lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Coordinate, CreateIncidentRequest, Severity, UserId};
use crate::session::Session;

/// Content of the open report editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub description: String,
    pub severity: Severity,
}

impl ReportDraft {
    #[must_use]
    pub fn new(description: impl Into<String>, severity: Severity) -> Self {
        Self {
            description: description.into(),
            severity,
        }
    }
}

/// Rules are checked in declaration order; the first failure wins.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("description is empty")]
    EmptyDescription,

    #[error("no signed-in user")]
    NoSession,

    #[error("current location is unknown")]
    NoLocation,
}

impl ValidationError {
    #[must_use]
    pub fn user_facing_message(&self) -> &'static str {
        match self {
            Self::EmptyDescription => "Describe the incident before sending it.",
            Self::NoSession => "User not identified. Sign in to send reports.",
            Self::NoLocation => "Your location is not available yet.",
        }
    }
}

/// A draft that passed validation, bound to its reporter and position.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReport {
    description: String,
    severity: Severity,
    location: Coordinate,
    reporter_id: UserId,
}

impl ValidatedReport {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn location(&self) -> Coordinate {
        self.location
    }

    pub fn reporter_id(&self) -> UserId {
        self.reporter_id
    }

    #[must_use]
    pub fn to_request(&self) -> CreateIncidentRequest {
        CreateIncidentRequest {
            description: self.description.clone(),
            latitude: self.location.latitude(),
            longitude: self.location.longitude(),
            severity: self.severity,
            reporter_id: self.reporter_id,
        }
    }
}

/// `location` must be the device fix; the map's fallback center never
/// qualifies. The description is sent exactly as typed.
pub fn validate(
    draft: &ReportDraft,
    session: &Session,
    location: Option<Coordinate>,
) -> Result<ValidatedReport, ValidationError> {
    if draft.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    let reporter_id = session.user_id.ok_or(ValidationError::NoSession)?;
    let location = location.ok_or(ValidationError::NoLocation)?;

    Ok(ValidatedReport {
        description: draft.description.clone(),
        severity: draft.severity,
        location,
        reporter_id,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl SubmissionPhase {
    /// `Idle -> Validating -> Submitting -> Succeeded|Failed -> Idle`.
    /// Validation failures go straight to `Failed`.
    #[must_use]
    pub fn can_transition_to(self, next: SubmissionPhase) -> bool {
        use SubmissionPhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Submitting)
                | (Validating, Failed)
                | (Submitting, Succeeded)
                | (Submitting, Failed)
                | (Succeeded, Idle)
                | (Failed, Idle)
        )
    }

    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Validating | Self::Submitting)
    }
}
