mod common;

use alert_map_shared::view::LocationStatus;
use alert_map_shared::{Effect, Event, Severity, SubmissionPhase, REFERENCE_LOCATION};
use common::{record, Driver, FakeBackend, ScriptedLocation};
use serde_json::json;

fn split_http(effects: Vec<Effect>) -> (Vec<Effect>, Vec<Effect>) {
    effects.into_iter().partition(Effect::is_http)
}

#[test]
fn string_coordinates_render_one_labeled_marker() {
    let backend = FakeBackend::new(vec![record(
        1,
        "choque",
        json!("20.66"),
        json!("-100.40"),
        "rojo",
    )]);
    let mut d = Driver::new(backend, ScriptedLocation::granted_at(20.65, -100.41));

    d.send(Event::Activate);
    let view = d.view();

    assert_eq!(view.markers.len(), 1);
    let marker = &view.markers[0];
    assert!(marker.title.contains("ROJO"));
    assert!(marker.title.contains("choque"));
    assert_eq!(marker.lat, 20.66);
    assert_eq!(marker.lon, -100.40);
    assert!(view.reference_marker.is_reference);
    assert_eq!(view.location_status, LocationStatus::Resolved);
    assert_eq!(view.center_lat, 20.65);
}

#[test]
fn unparseable_and_partial_records_do_not_break_rendering() {
    let backend = FakeBackend::new(vec![
        record(1, "ok", json!(20.66), json!(-100.40), "verde"),
        record(2, "garbage coords", json!("abc"), json!("-100.40"), "rojo"),
        record(3, "prefix coords", json!("20.7xyz"), json!("-100.4 "), "naranja"),
        json!({"descripcion": "no id at all"}),
    ]);
    let mut d = Driver::new(backend, ScriptedLocation::granted_at(20.65, -100.41));

    d.send(Event::Activate);
    let view = d.view();

    assert_eq!(d.model.snapshot().len(), 3);
    let titles: Vec<&str> = view.markers.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["[VERDE] ok", "[NARANJA] prefix coords"]);
    assert_eq!(view.markers[1].lat, 20.7);
}

#[test]
fn permission_denied_still_shows_incidents_and_reference() {
    let backend = FakeBackend::new(vec![record(
        1,
        "choque",
        json!(20.66),
        json!(-100.40),
        "naranja",
    )]);
    let mut d = Driver::new(backend.clone(), ScriptedLocation::denied());

    d.send(Event::Activate);
    let view = d.view();

    assert_eq!(view.location_status, LocationStatus::Denied);
    assert!(!view.is_loading());
    assert_eq!(view.markers.len(), 1);
    assert_eq!(view.center_lat, REFERENCE_LOCATION.latitude());
    assert_eq!(view.center_lon, REFERENCE_LOCATION.longitude());
    assert_eq!(view.alert.expect("alert shown").title, "Permission denied");
    assert_eq!(backend.count("GET", "/reportes"), 1);
}

#[test]
fn location_failure_resolves_loading_without_center() {
    let mut d = Driver::new(
        FakeBackend::new(vec![]),
        ScriptedLocation::granted_but_failing(),
    );

    d.send(Event::Activate);
    let view = d.view();

    assert_eq!(view.location_status, LocationStatus::Unavailable);
    assert!(view.alert.is_none());
    assert_eq!(view.center_lat, REFERENCE_LOCATION.latitude());
}

#[test]
fn markers_show_while_location_is_still_loading() {
    let backend = FakeBackend::new(vec![record(1, "a", json!(20.66), json!(-100.40), "verde")]);
    let mut d = Driver::new(backend, ScriptedLocation::granted_at(20.6, -100.4));

    let (http, location) = split_http(d.send_held(Event::Activate));
    assert_eq!(http.len(), 1);
    assert_eq!(location.len(), 1);

    // list first, permission prompt still open
    for effect in http {
        d.resolve(effect);
    }
    let view = d.view();
    assert!(view.is_loading());
    assert_eq!(view.markers.len(), 1);

    for effect in location {
        d.resolve(effect);
    }
    let view = d.view();
    assert_eq!(view.location_status, LocationStatus::Resolved);
    assert_eq!(view.markers.len(), 1);
}

#[test]
fn empty_description_issues_no_request() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));
    d.send(Event::Activate);

    for text in ["", "   ", "\n\t"] {
        d.send(Event::SetDescription(text.into()));
        d.send(Event::Submit);
        let alert = d.model.alert().expect("alert shown");
        assert_eq!(alert.message, "Describe the incident before sending it.");
        assert_eq!(d.model.phase(), SubmissionPhase::Idle);
        d.send(Event::DismissAlert);
    }

    assert_eq!(backend.count("POST", "/reportes"), 0);
}

#[test]
fn missing_session_wins_over_location() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::new(backend.clone(), ScriptedLocation::denied());
    d.send(Event::Activate);
    d.send(Event::DismissAlert);

    d.send(Event::SetDescription("choque".into()));
    d.send(Event::Submit);

    assert_eq!(
        d.model.alert().expect("alert shown").message,
        "User not identified. Sign in to send reports."
    );
    assert_eq!(backend.count("POST", "/reportes"), 0);
}

#[test]
fn successful_submission_grows_list_after_one_refetch() {
    let backend = FakeBackend::new(vec![
        record(1, "a", json!(20.66), json!(-100.40), "verde"),
        record(2, "b", json!(20.67), json!(-100.41), "rojo"),
    ]);
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));

    // 1. Activate: one fetch, N markers
    d.send(Event::Activate);
    assert_eq!(d.view().markers.len(), 2);

    // 2. Fill in the editor
    d.send(Event::OpenEditor);
    d.send(Event::SetDescription("choque en glorieta".into()));
    d.send(Event::SelectSeverity(Severity::Medium));

    // 3. Submit and let the app re-fetch
    d.send(Event::SubmitAndRefresh);

    // 4. Exactly one create and one extra fetch
    assert_eq!(backend.count("POST", "/reportes"), 1);
    assert_eq!(backend.count("GET", "/reportes"), 2);
    assert!(backend.requests().iter().all(|r| r.accepts_json));
    assert_eq!(
        backend.body_of("/reportes"),
        Some(json!({
            "descripcion": "choque en glorieta",
            "latitud": 20.6,
            "longitud": -100.4,
            "nivel": "naranja",
            "usuario_id": 5,
        }))
    );

    // 5. N + 1 markers, editor closed and cleared
    let view = d.view();
    assert_eq!(view.markers.len(), 3);
    assert!(!view.editor.is_open);
    assert!(view.editor.description.is_empty());
    assert!(view.alert.is_none());
    assert_eq!(view.toast.expect("toast shown").message, "Report sent");
    assert_eq!(d.model.phase(), SubmissionPhase::Idle);
}

#[test]
fn plain_submit_does_not_refetch() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));
    d.send(Event::Activate);

    d.send(Event::SetDescription("choque".into()));
    d.send(Event::Submit);

    assert_eq!(backend.count("POST", "/reportes"), 1);
    assert_eq!(backend.count("GET", "/reportes"), 1);
    assert!(d.view().markers.is_empty());
}

#[test]
fn second_submit_while_sending_is_ignored() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));
    d.send(Event::Activate);
    d.send(Event::SetDescription("choque".into()));

    let first = d.send_held(Event::Submit);
    assert_eq!(first.len(), 1);
    assert!(d.view().is_submitting);

    let second = d.send_held(Event::SubmitAndRefresh);
    assert!(second.is_empty());

    for effect in first {
        d.resolve(effect);
    }
    assert_eq!(backend.count("POST", "/reportes"), 1);
    assert_eq!(backend.count("GET", "/reportes"), 1);
    assert!(!d.view().is_submitting);
}

#[test]
fn rejected_submission_keeps_draft_and_shows_server_message() {
    let backend = FakeBackend::new(vec![]);
    backend.reject_creates(400, "Nivel inválido");
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));
    d.send(Event::Activate);

    d.send(Event::OpenEditor);
    d.send(Event::SetDescription("choque".into()));
    d.send(Event::SelectSeverity(Severity::Low));
    d.send(Event::SubmitAndRefresh);

    let view = d.view();
    assert!(view.editor.is_open);
    assert_eq!(view.editor.description, "choque");
    assert_eq!(view.editor.selected_severity, Severity::Low);
    let alert = view.alert.expect("alert shown");
    assert_eq!(alert.message, "Nivel inválido");
    assert!(!alert.is_retryable);
    assert_eq!(backend.count("GET", "/reportes"), 1);
    assert_eq!(d.model.phase(), SubmissionPhase::Idle);
}

#[test]
fn network_failure_during_submit_is_retryable_alert() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));
    d.send(Event::Activate);

    backend.set_offline(true);
    d.send(Event::OpenEditor);
    d.send(Event::SetDescription("choque".into()));
    d.send(Event::Submit);

    let view = d.view();
    let alert = view.alert.expect("alert shown");
    assert!(alert.is_retryable);
    assert_eq!(alert.error_code, "NETWORK_ERROR");
    assert!(view.editor.is_open);
}

#[test]
fn stale_create_response_leaves_draft_and_editor_alone() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::signed_in(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));
    d.send(Event::Activate);
    d.send(Event::OpenEditor);
    d.send(Event::SetDescription("choque".into()));

    let create = d.send_held(Event::SubmitAndRefresh);
    assert_eq!(create.len(), 1);

    // leave and come back while the create is in flight
    d.send(Event::Deactivate);
    d.send(Event::Activate);
    assert_eq!(backend.count("GET", "/reportes"), 2);

    for effect in create {
        d.resolve(effect);
    }

    let view = d.view();
    assert!(view.editor.is_open);
    assert_eq!(view.editor.description, "choque");
    assert!(view.toast.is_none());
    assert!(view.alert.is_none());
    assert!(!view.is_submitting);
    assert_eq!(d.model.phase(), SubmissionPhase::Idle);
    assert_eq!(backend.count("GET", "/reportes"), 2);
}

#[test]
fn failed_refresh_keeps_previous_snapshot() {
    let backend = FakeBackend::new(vec![record(1, "a", json!(20.66), json!(-100.40), "verde")]);
    let mut d = Driver::new(backend.clone(), ScriptedLocation::denied());
    d.send(Event::Activate);

    backend.fail_lists(true);
    backend.push_report(record(2, "b", json!(20.67), json!(-100.41), "rojo"));
    d.send(Event::Refresh);
    assert_eq!(d.view().markers.len(), 1);

    backend.set_offline(true);
    d.send(Event::Refresh);
    assert_eq!(d.model.snapshot().fetch_count(), 1);

    backend.set_offline(false);
    backend.fail_lists(false);
    d.send(Event::Refresh);
    assert_eq!(d.model.snapshot().fetch_count(), 2);
    assert_eq!(d.view().markers.len(), 2);
}

#[test]
fn list_arriving_after_deactivate_is_discarded() {
    let backend = FakeBackend::new(vec![record(1, "a", json!(20.66), json!(-100.40), "verde")]);
    let mut d = Driver::new(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));

    let (http, location) = split_http(d.send_held(Event::Activate));
    d.send(Event::Deactivate);
    for effect in http.into_iter().chain(location) {
        d.resolve(effect);
    }

    assert_eq!(backend.count("GET", "/reportes"), 1);
    assert!(d.model.snapshot().is_empty());
    assert!(d.view().markers.is_empty());
    assert!(d.view().is_loading());
}

#[test]
fn second_activation_refetches() {
    let backend = FakeBackend::new(vec![]);
    let mut d = Driver::new(backend.clone(), ScriptedLocation::granted_at(20.6, -100.4));

    d.send(Event::Activate);
    d.send(Event::Deactivate);
    backend.push_report(record(1, "a", json!(20.66), json!(-100.40), "verde"));
    d.send(Event::Activate);

    assert_eq!(backend.count("GET", "/reportes"), 2);
    assert_eq!(d.view().markers.len(), 1);
}
