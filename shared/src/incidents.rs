use tracing::info;

use crate::api::{AlertApi, ApiError, CreatedIncident};
use crate::model::IncidentReport;
use crate::validation::ValidatedReport;

/// Last successfully fetched collection. Always replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    reports: Vec<IncidentReport>,
    fetches: u64,
}

impl Snapshot {
    pub fn replace(&mut self, reports: Vec<IncidentReport>) {
        self.reports = reports;
        self.fetches += 1;
    }

    pub fn reports(&self) -> &[IncidentReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Number of successful fetches applied; zero until the first one lands.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }
}

/// Remote incident collection. Holds no state; results come back as
/// events and the app applies them to its [`Snapshot`].
pub struct IncidentStore<'a, Ev> {
    api: AlertApi<'a, Ev>,
}

impl<'a, Ev> IncidentStore<'a, Ev>
where
    Ev: 'static,
{
    pub fn new(api: AlertApi<'a, Ev>) -> Self {
        Self { api }
    }

    pub fn fetch_incidents<F>(&self, on_done: F) -> Result<(), ApiError>
    where
        F: FnOnce(Result<Vec<IncidentReport>, ApiError>) -> Ev + Send + 'static,
    {
        self.api.list_reports(on_done)
    }

    pub fn submit_incident<F>(&self, report: &ValidatedReport, on_done: F) -> Result<(), ApiError>
    where
        F: FnOnce(Result<CreatedIncident, ApiError>) -> Ev + Send + 'static,
    {
        info!(severity = %report.severity(), "submitting incident");
        self.api.create_report(&report.to_request(), on_done)
    }
}
