//! Acquiring the device position: permission once, then a single fix.

use tracing::{debug, info, warn};

use crate::capabilities::{LocationError, PermissionStatus};
use crate::model::Coordinate;
use crate::view::LocationStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    Resolved(Coordinate),
    PermissionDenied,
    /// Permission was granted but no usable fix came back.
    Unavailable(LocationError),
}

impl LocationOutcome {
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Resolved(coordinate) => Some(*coordinate),
            _ => None,
        }
    }
}

/// What to do once the permission prompt has been answered.
#[derive(Debug, Clone, PartialEq)]
pub enum AfterPermission {
    ReadPosition,
    Finished(LocationOutcome),
}

#[must_use]
pub fn after_permission(status: PermissionStatus) -> AfterPermission {
    if status.is_granted() {
        AfterPermission::ReadPosition
    } else {
        info!(?status, "location permission not granted");
        AfterPermission::Finished(LocationOutcome::PermissionDenied)
    }
}

/// A `PermissionDenied` from the read itself (revoked between prompt and
/// read) counts as a denial.
#[must_use]
pub fn after_position(result: Result<Coordinate, LocationError>) -> LocationOutcome {
    match result {
        Ok(coordinate) => {
            debug!("location resolved");
            LocationOutcome::Resolved(coordinate)
        }
        Err(LocationError::PermissionDenied) => LocationOutcome::PermissionDenied,
        Err(e) => {
            warn!(error = %e, "could not read current position");
            LocationOutcome::Unavailable(e)
        }
    }
}

/// Where the panel is in acquiring a position for the current activation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum LocationState {
    #[default]
    Loading,
    Resolved(Coordinate),
    Denied,
    Unavailable,
}

impl LocationState {
    /// Only a real device fix; never the map's fallback center.
    #[must_use]
    pub fn coordinate(self) -> Option<Coordinate> {
        match self {
            Self::Resolved(coordinate) => Some(coordinate),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(self) -> LocationStatus {
        match self {
            Self::Loading => LocationStatus::Loading,
            Self::Resolved(_) => LocationStatus::Resolved,
            Self::Denied => LocationStatus::Denied,
            Self::Unavailable => LocationStatus::Unavailable,
        }
    }
}

impl From<&LocationOutcome> for LocationState {
    fn from(outcome: &LocationOutcome) -> Self {
        match outcome {
            LocationOutcome::Resolved(coordinate) => Self::Resolved(*coordinate),
            LocationOutcome::PermissionDenied => Self::Denied,
            LocationOutcome::Unavailable(_) => Self::Unavailable,
        }
    }
}
