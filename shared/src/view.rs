//! What the shell renders for the map screen.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Coordinate, IncidentId, IncidentReport, Severity};
use crate::UserFacingAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Error => 5000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastView {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapMarker {
    /// `None` for the reference marker.
    pub id: Option<IncidentId>,
    pub lat: f64,
    pub lon: f64,
    pub title: String,
    pub severity: Option<Severity>,
    pub color_hex: Option<String>,
    pub is_reference: bool,
}

impl MapMarker {
    #[must_use]
    pub fn reference(location: Coordinate, title: &str) -> Self {
        Self {
            id: None,
            lat: location.latitude(),
            lon: location.longitude(),
            title: title.to_string(),
            severity: None,
            color_hex: None,
            is_reference: true,
        }
    }

    /// `None` when the record has no drawable position.
    #[must_use]
    pub fn from_report(report: &IncidentReport) -> Option<Self> {
        let coordinate = report.coordinate()?;
        let severity = report.severity();
        Some(Self {
            id: Some(report.id),
            lat: coordinate.latitude(),
            lon: coordinate.longitude(),
            title: format!("[{}] {}", report.level_label(), report.description),
            severity,
            color_hex: severity.map(|s| s.color_hex().to_string()),
            is_reference: false,
        })
    }
}

/// One marker per drawable record, in snapshot order.
#[must_use]
pub fn build_markers(reports: &[IncidentReport]) -> Vec<MapMarker> {
    let markers: Vec<MapMarker> = reports.iter().filter_map(MapMarker::from_report).collect();
    if markers.len() < reports.len() {
        debug!(
            skipped = reports.len() - markers.len(),
            "records without a valid position not drawn"
        );
    }
    markers
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeverityOption {
    pub severity: Severity,
    pub label: String,
    pub color_hex: String,
    pub is_selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EditorView {
    pub is_open: bool,
    pub description: String,
    pub selected_severity: Severity,
    pub options: Vec<SeverityOption>,
}

impl EditorView {
    #[must_use]
    pub fn new(is_open: bool, description: &str, selected: Severity) -> Self {
        Self {
            is_open,
            description: description.to_string(),
            selected_severity: selected,
            options: Severity::ALL
                .iter()
                .map(|&severity| SeverityOption {
                    severity,
                    label: severity.label().to_string(),
                    color_hex: severity.color_hex().to_string(),
                    is_selected: severity == selected,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    Loading,
    Resolved,
    Denied,
    Unavailable,
}

impl LocationStatus {
    #[must_use]
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PanelView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
    pub location_status: LocationStatus,
    pub reference_marker: MapMarker,
    pub markers: Vec<MapMarker>,
    pub editor: EditorView,
    pub is_submitting: bool,
    pub signed_in: bool,
    pub alert: Option<UserFacingAlert>,
    pub toast: Option<ToastView>,
}

impl PanelView {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.location_status.is_loading()
    }

    /// Reference marker first, then the incident markers.
    #[must_use]
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = std::iter::once(&self.reference_marker)
            .chain(self.markers.iter())
            .map(marker_feature)
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn marker_feature(marker: &MapMarker) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("title".into(), marker.title.clone().into());
    properties.insert("reference".into(), marker.is_reference.into());
    if let Some(id) = marker.id {
        properties.insert("id".into(), id.get().into());
    }
    if let Some(severity) = marker.severity {
        properties.insert("nivel".into(), severity.wire_name().into());
    }
    if let Some(color) = &marker.color_hex {
        properties.insert("color".into(), color.clone().into());
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![marker.lon, marker.lat]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
