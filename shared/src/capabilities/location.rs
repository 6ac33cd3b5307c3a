use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::Coordinate;

pub struct Location<E> {
    context: CapabilityContext<LocationOperation, E>,
}

impl<E> Clone for Location<E> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Location<Ev> {
    type Operation = LocationOperation;
    type MappedSelf<MappedEv> = Location<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Location::new(self.context.map_event(f))
    }
}

impl<E> Location<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<LocationOperation, E>) -> Self {
        Self { context }
    }

    /// Asks for foreground location permission. A shell failure or an
    /// answer of the wrong shape counts as a denial.
    pub fn request_permission<F>(&self, callback: F)
    where
        F: FnOnce(PermissionStatus) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let status = match context
                .request_from_shell(LocationOperation::RequestForegroundPermission)
                .await
            {
                Ok(LocationOutput::Permission(status)) => status,
                Ok(other) => {
                    warn!(?other, "unexpected answer to permission request");
                    PermissionStatus::Denied
                }
                Err(e) => {
                    warn!(error = %e, "permission request failed");
                    PermissionStatus::Denied
                }
            };
            context.update_app(callback(status));
        });
    }

    /// Reads one fix at the highest accuracy the device offers.
    pub fn current_position<F>(&self, callback: F)
    where
        F: FnOnce(Result<Coordinate, LocationError>) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(LocationOperation::CurrentPosition)
                .await
                .and_then(position_from_output);
            context.update_app(callback(result));
        });
    }
}

fn position_from_output(output: LocationOutput) -> Result<Coordinate, LocationError> {
    match output {
        LocationOutput::Position {
            latitude,
            longitude,
        } => Coordinate::new(latitude, longitude).map_err(|_| LocationError::InvalidPosition {
            lat: latitude.to_string(),
            lng: longitude.to_string(),
        }),
        LocationOutput::Permission(_) => Err(LocationError::Unavailable {
            reason: "shell answered a position read with a permission status".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationOperation {
    RequestForegroundPermission,
    CurrentPosition,
}

impl Operation for LocationOperation {
    type Output = LocationResult;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LocationOutput {
    Permission(PermissionStatus),
    Position { latitude: f64, longitude: f64 },
}

pub type LocationResult = Result<LocationOutput, LocationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    DeniedPermanently,
    Restricted,
    NotDetermined,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location services disabled")]
    ServicesDisabled,

    #[error("location unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("provider returned an invalid position: lat={lat}, lng={lng}")]
    InvalidPosition { lat: String, lng: String },
}

/// Device position source for native shells.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_foreground_permission(&self) -> PermissionStatus;
    /// Single point-in-time read as `(latitude, longitude)`.
    async fn current_position(&self) -> Result<(f64, f64), LocationError>;
}

/// Answers one `Location` effect from `provider`.
pub async fn execute(provider: &dyn LocationProvider, operation: LocationOperation) -> LocationResult {
    match operation {
        LocationOperation::RequestForegroundPermission => Ok(LocationOutput::Permission(
            provider.request_foreground_permission().await,
        )),
        LocationOperation::CurrentPosition => {
            let (latitude, longitude) = provider.current_position().await?;
            Ok(LocationOutput::Position {
                latitude,
                longitude,
            })
        }
    }
}
