//! The map screen as a Crux app: live incident markers, the report editor,
//! and the sign-in flow that feeds the session.
//!
//! Requests are never cancelled. Each [`Event::Activate`] starts a new
//! generation; location and list results carry the generation they were
//! issued under and are dropped if it is no longer current. Core serialises
//! `update` calls, so the check and the write happen under the same lock.

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::api::{AlertApi, ApiError, CreatedIncident, LoginResponse};
use crate::auth::{check_login, check_register, AuthError};
use crate::capabilities::{Capabilities, KvError, LocationError, PermissionStatus};
use crate::config::{ClientConfig, DEFAULT_REGION_DELTA};
use crate::incidents::{IncidentStore, Snapshot};
use crate::location::{after_permission, after_position, AfterPermission, LocationOutcome, LocationState};
use crate::model::{Coordinate, IncidentReport, Severity, REFERENCE_LOCATION, REFERENCE_LOCATION_TITLE};
use crate::session::{
    decode_push_token, decode_user_id, encode_user_id, Session, PUSH_TOKEN_KEY, USER_ID_KEY,
};
use crate::validation::{validate, ReportDraft, SubmissionPhase};
use crate::view::{build_markers, EditorView, MapMarker, PanelView, ToastKind, ToastView};
use crate::{AppError, ErrorKind, UserFacingAlert};

const REPORT_SENT_MESSAGE: &str = "Report sent";
const ACCOUNT_CREATED_MESSAGE: &str = "Account created";

#[derive(Debug, Clone, Deserialize)]
pub enum Event {
    // --- Shell ---
    Configure(ClientConfig),
    Activate,
    Deactivate,
    Refresh,
    OpenEditor,
    /// Hides the editor; the draft is kept for the next time it opens.
    CloseEditor,
    SetDescription(String),
    SelectSeverity(Severity),
    /// Validates the draft and sends it, without refreshing the list.
    Submit,
    /// `Submit`, then exactly one refresh if it succeeded.
    SubmitAndRefresh,
    DismissAlert,
    DismissToast,
    Login {
        email: String,
        password: SecretString,
    },
    Register {
        name: String,
        email: String,
        password: SecretString,
    },
    Logout,
    SetPushToken(String),

    // --- Effect results ---
    #[serde(skip)]
    SessionLoaded {
        epoch: u64,
        result: Result<Option<Vec<u8>>, KvError>,
    },
    #[serde(skip)]
    PushTokenLoaded(Result<Option<Vec<u8>>, KvError>),
    #[serde(skip)]
    LocationPermissionResult {
        generation: u64,
        status: PermissionStatus,
    },
    #[serde(skip)]
    LocationReceived {
        generation: u64,
        result: Result<Coordinate, LocationError>,
    },
    #[serde(skip)]
    IncidentsFetched {
        generation: u64,
        result: Result<Vec<IncidentReport>, ApiError>,
    },
    #[serde(skip)]
    ReportCreated {
        generation: u64,
        result: Result<CreatedIncident, ApiError>,
    },
    #[serde(skip)]
    LoggedIn(Result<LoginResponse, ApiError>),
    #[serde(skip)]
    Registered(Result<String, ApiError>),
    #[serde(skip)]
    PushTokenSaved(Result<(), ApiError>),
    #[serde(skip)]
    Stored(Result<Option<Vec<u8>>, KvError>),
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Refresh => "refresh",
            Self::OpenEditor => "open_editor",
            Self::CloseEditor => "close_editor",
            Self::SetDescription(_) => "set_description",
            Self::SelectSeverity(_) => "select_severity",
            Self::Submit => "submit",
            Self::SubmitAndRefresh => "submit_and_refresh",
            Self::DismissAlert => "dismiss_alert",
            Self::DismissToast => "dismiss_toast",
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Logout => "logout",
            Self::SetPushToken(_) => "set_push_token",
            Self::SessionLoaded { .. } => "session_loaded",
            Self::PushTokenLoaded(_) => "push_token_loaded",
            Self::LocationPermissionResult { .. } => "location_permission_result",
            Self::LocationReceived { .. } => "location_received",
            Self::IncidentsFetched { .. } => "incidents_fetched",
            Self::ReportCreated { .. } => "report_created",
            Self::LoggedIn(_) => "logged_in",
            Self::Registered(_) => "registered",
            Self::PushTokenSaved(_) => "push_token_saved",
            Self::Stored(_) => "stored",
        }
    }
}

#[derive(Debug, Default)]
pub struct Model {
    config: Option<ClientConfig>,
    generation: u64,
    /// Bumped on every login and logout so a slow startup read cannot
    /// overwrite a newer session.
    session_epoch: u64,
    session: Session,
    push_token: Option<String>,
    snapshot: Snapshot,
    location: LocationState,
    editor_open: bool,
    draft: ReportDraft,
    phase: SubmissionPhase,
    refresh_after_submit: bool,
    alert: Option<UserFacingAlert>,
    toast: Option<ToastView>,
}

impl Model {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn push_token(&self) -> Option<&str> {
        self.push_token.as_deref()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn location(&self) -> LocationState {
        self.location
    }

    pub fn draft(&self) -> &ReportDraft {
        &self.draft
    }

    pub fn editor_open(&self) -> bool {
        self.editor_open
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    pub fn alert(&self) -> Option<&UserFacingAlert> {
        self.alert.as_ref()
    }

    pub fn toast(&self) -> Option<&ToastView> {
        self.toast.as_ref()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn advance(&mut self, next: SubmissionPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(from = ?self.phase, to = ?next, "unexpected submission phase transition");
        }
        self.phase = next;
    }

    fn show_error(&mut self, err: &AppError) {
        self.alert = Some(UserFacingAlert::from(err));
    }

    fn api_base(&self) -> Result<&crate::capabilities::ValidatedUrl, AppError> {
        self.config
            .as_ref()
            .map(ClientConfig::api_base)
            .ok_or_else(|| AppError::new(ErrorKind::Configuration, "client is not configured"))
    }
}

#[derive(Default)]
pub struct App;

impl App {
    fn fetch_incidents(model: &mut Model, caps: &Capabilities) {
        let generation = model.generation;
        let sent = model.api_base().and_then(|base| {
            IncidentStore::new(AlertApi::new(&caps.http, base))
                .fetch_incidents(move |result| Event::IncidentsFetched { generation, result })
                .map_err(AppError::from)
        });
        if let Err(e) = sent {
            error!(error = %e, "could not request incident list");
            model.show_error(&e);
        }
    }

    fn apply_location(model: &mut Model, outcome: &LocationOutcome) {
        model.location = LocationState::from(outcome);
        if *outcome == LocationOutcome::PermissionDenied {
            model.show_error(&AppError::from(LocationError::PermissionDenied));
        }
    }

    fn fail_submission(model: &mut Model, err: &AppError) {
        model.advance(SubmissionPhase::Failed);
        model.show_error(err);
        model.advance(SubmissionPhase::Idle);
        model.refresh_after_submit = false;
    }

    fn submit(model: &mut Model, caps: &Capabilities, refresh: bool) {
        if model.phase.is_in_flight() {
            info!("submission already in flight, ignoring");
            return;
        }
        model.advance(SubmissionPhase::Validating);

        let report = match validate(&model.draft, &model.session, model.location.coordinate()) {
            Ok(report) => report,
            Err(e) => {
                info!(error = %e, "submission rejected before sending");
                Self::fail_submission(model, &e.into());
                return;
            }
        };

        model.advance(SubmissionPhase::Submitting);
        model.refresh_after_submit = refresh;
        let generation = model.generation;
        let sent = model.api_base().and_then(|base| {
            IncidentStore::new(AlertApi::new(&caps.http, base))
                .submit_incident(&report, move |result| Event::ReportCreated { generation, result })
                .map_err(AppError::from)
        });
        if let Err(e) = sent {
            error!(error = %e, "could not send report");
            Self::fail_submission(model, &e);
        }
    }

    fn report_created(
        model: &mut Model,
        caps: &Capabilities,
        generation: u64,
        result: Result<CreatedIncident, ApiError>,
    ) {
        let refresh = std::mem::take(&mut model.refresh_after_submit);
        if !model.is_current(generation) {
            debug!(generation, "discarding stale submission result");
            model.phase = SubmissionPhase::Idle;
            return;
        }

        match result {
            Ok(_) => {
                info!("incident submitted");
                model.advance(SubmissionPhase::Succeeded);
                model.editor_open = false;
                model.draft.description.clear();
                model.toast = Some(ToastView::new(REPORT_SENT_MESSAGE, ToastKind::Success));
                model.advance(SubmissionPhase::Idle);
                if refresh {
                    Self::fetch_incidents(model, caps);
                }
            }
            Err(e) => {
                warn!(error = %e, "submission failed");
                Self::fail_submission(model, &e.into());
            }
        }
    }

    fn save_push_token(model: &mut Model, caps: &Capabilities) {
        let (Some(user_id), Some(token)) = (model.session.user_id, model.push_token.clone()) else {
            return;
        };
        let sent = model.api_base().and_then(|base| {
            AlertApi::new(&caps.http, base)
                .save_push_token(user_id, &token, Event::PushTokenSaved)
                .map_err(AppError::from)
        });
        if let Err(e) = sent {
            warn!(error = %e, "could not register push token");
        }
    }

    fn login(model: &mut Model, caps: &Capabilities, email: &str, password: &SecretString) {
        if let Err(e) = check_login(email, password) {
            model.show_error(&e.into());
            return;
        }
        let sent = model.api_base().and_then(|base| {
            AlertApi::new(&caps.http, base)
                .login(email, password, Event::LoggedIn)
                .map_err(AppError::from)
        });
        if let Err(e) = sent {
            model.show_error(&e);
        }
    }

    fn logged_in(model: &mut Model, caps: &Capabilities, result: Result<LoginResponse, ApiError>) {
        match result {
            Ok(response) => {
                let user_id = response.user.id;
                info!(%user_id, "signed in");
                model.session = Session::signed_in(user_id);
                model.session_epoch += 1;
                caps.kv.set(USER_ID_KEY.to_string(), encode_user_id(user_id), |result| {
                    Event::Stored(result.map_err(KvError::from))
                });
                Self::save_push_token(model, caps);
            }
            Err(e) => {
                info!(error = %e, "sign-in rejected");
                model.show_error(&AuthError::Api(e).into());
            }
        }
    }

    fn register(
        model: &mut Model,
        caps: &Capabilities,
        name: &str,
        email: &str,
        password: &SecretString,
    ) {
        if let Err(e) = check_register(name, email, password) {
            model.show_error(&e.into());
            return;
        }
        let sent = model.api_base().and_then(|base| {
            AlertApi::new(&caps.http, base)
                .register(name, email, password, Event::Registered)
                .map_err(AppError::from)
        });
        if let Err(e) = sent {
            model.show_error(&e);
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = PanelView;
    type Capabilities = Capabilities;

    #[allow(clippy::too_many_lines)]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), generation = model.generation, "update");

        match event {
            Event::Configure(config) => {
                info!(api = %config.api_base(), "client configured");
                model.config = Some(config);
                let epoch = model.session_epoch;
                caps.kv.get(USER_ID_KEY.to_string(), move |result| Event::SessionLoaded {
                    epoch,
                    result: result.map_err(KvError::from),
                });
                caps.kv.get(PUSH_TOKEN_KEY.to_string(), |result| {
                    Event::PushTokenLoaded(result.map_err(KvError::from))
                });
            }

            Event::SessionLoaded { epoch, result } => {
                if epoch != model.session_epoch {
                    debug!(epoch, "discarding stale session read");
                    return;
                }
                match result {
                    Ok(stored) => model.session = Session {
                        user_id: decode_user_id(stored),
                    },
                    Err(e) => warn!(error = %e, "could not read session"),
                }
            }

            Event::PushTokenLoaded(result) => match result {
                Ok(stored) => {
                    if model.push_token.is_none() {
                        model.push_token = decode_push_token(stored);
                    }
                }
                Err(e) => warn!(error = %e, "could not read push token"),
            },

            Event::Activate => {
                model.generation += 1;
                model.location = LocationState::Loading;
                model.alert = None;
                let generation = model.generation;
                debug!(generation, "panel activated");
                caps.location.request_permission(move |status| {
                    Event::LocationPermissionResult { generation, status }
                });
                Self::fetch_incidents(model, caps);
            }

            Event::Deactivate => {
                model.generation += 1;
                debug!(generation = model.generation, "panel deactivated");
            }

            Event::LocationPermissionResult { generation, status } => {
                if !model.is_current(generation) {
                    debug!(generation, "discarding stale permission answer");
                    return;
                }
                match after_permission(status) {
                    AfterPermission::ReadPosition => {
                        caps.location.current_position(move |result| Event::LocationReceived {
                            generation,
                            result,
                        });
                        return;
                    }
                    AfterPermission::Finished(outcome) => Self::apply_location(model, &outcome),
                }
            }

            Event::LocationReceived { generation, result } => {
                if !model.is_current(generation) {
                    debug!(generation, "discarding stale location result");
                    return;
                }
                Self::apply_location(model, &after_position(result));
            }

            Event::Refresh => {
                Self::fetch_incidents(model, caps);
                return;
            }

            Event::IncidentsFetched { generation, result } => {
                if !model.is_current(generation) {
                    debug!(generation, "discarding stale incident list");
                    return;
                }
                match result {
                    Ok(reports) => {
                        let count = reports.len();
                        model.snapshot.replace(reports);
                        debug!(count, "snapshot replaced");
                    }
                    Err(e) => {
                        error!(error = %e, "failed to fetch incidents");
                        return;
                    }
                }
            }

            Event::OpenEditor => model.editor_open = true,
            Event::CloseEditor => model.editor_open = false,
            Event::SetDescription(description) => model.draft.description = description,
            Event::SelectSeverity(severity) => model.draft.severity = severity,
            Event::DismissAlert => model.alert = None,
            Event::DismissToast => model.toast = None,

            Event::Submit => Self::submit(model, caps, false),
            Event::SubmitAndRefresh => Self::submit(model, caps, true),
            Event::ReportCreated { generation, result } => {
                Self::report_created(model, caps, generation, result);
            }

            Event::Login { email, password } => Self::login(model, caps, &email, &password),
            Event::LoggedIn(result) => Self::logged_in(model, caps, result),

            Event::Register {
                name,
                email,
                password,
            } => Self::register(model, caps, &name, &email, &password),
            Event::Registered(result) => match result {
                Ok(message) => {
                    info!("account registered");
                    let message = if message.is_empty() {
                        ACCOUNT_CREATED_MESSAGE.to_string()
                    } else {
                        message
                    };
                    model.toast = Some(ToastView::new(message, ToastKind::Success));
                }
                Err(e) => model.show_error(&AuthError::Api(e).into()),
            },

            Event::Logout => {
                info!("signed out");
                model.session = Session::anonymous();
                model.session_epoch += 1;
                caps.kv.delete(USER_ID_KEY.to_string(), |result| {
                    Event::Stored(result.map_err(KvError::from))
                });
            }

            Event::SetPushToken(token) => {
                if token.trim().is_empty() {
                    debug!("ignoring blank push token");
                    return;
                }
                caps.kv.set(PUSH_TOKEN_KEY.to_string(), token.clone().into_bytes(), |result| {
                    Event::Stored(result.map_err(KvError::from))
                });
                model.push_token = Some(token);
                Self::save_push_token(model, caps);
            }

            Event::PushTokenSaved(result) => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to register push token");
                }
                return;
            }

            Event::Stored(result) => match result {
                Ok(_) => return,
                Err(e) => {
                    error!(error = %e, "could not persist session");
                    model.show_error(&AuthError::Storage(e).into());
                }
            },
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> PanelView {
        let (reference, delta) = model.config.as_ref().map_or(
            (REFERENCE_LOCATION, DEFAULT_REGION_DELTA),
            |config| (config.reference_location(), config.region_delta()),
        );
        let center = model.location.coordinate().unwrap_or(reference);

        PanelView {
            center_lat: center.latitude(),
            center_lon: center.longitude(),
            latitude_delta: delta,
            longitude_delta: delta,
            location_status: model.location.status(),
            reference_marker: MapMarker::reference(reference, REFERENCE_LOCATION_TITLE),
            markers: build_markers(model.snapshot.reports()),
            editor: EditorView::new(
                model.editor_open,
                &model.draft.description,
                model.draft.severity,
            ),
            is_submitting: model.phase == SubmissionPhase::Submitting,
            signed_in: model.session.is_signed_in(),
            alert: model.alert.clone(),
            toast: model.toast.clone(),
        }
    }
}
