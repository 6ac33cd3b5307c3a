#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use alert_map_shared::capabilities::{
    kv, location, HttpTransport, LocationError, LocationProvider, MemoryKvStore, PermissionStatus,
};
use alert_map_shared::{App, ClientConfig, Effect, Event, Model, PanelView};
use crux_core::testing::{AppTester, Update};
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::sync::Notify;

pub const BASE_URL: &str = "https://alerts.example.com/api";

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
    pub accepts_json: bool,
}

/// In-memory stand-in for the alert backend. `POST /reportes` appends to the
/// collection so a later `GET` sees it.
pub struct FakeBackend {
    reports: Mutex<Vec<Value>>,
    next_id: AtomicI64,
    offline: AtomicBool,
    reject_create: Mutex<Option<(u16, String)>>,
    reject_login: Mutex<Option<(u16, String)>>,
    fail_list: AtomicBool,
    hold_list: Mutex<Option<Arc<Notify>>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl FakeBackend {
    pub fn new(reports: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(reports.len() as i64 + 100),
            reports: Mutex::new(reports),
            offline: AtomicBool::new(false),
            reject_create: Mutex::new(None),
            reject_login: Mutex::new(None),
            fail_list: AtomicBool::new(false),
            hold_list: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn reject_creates(&self, status: u16, message: &str) {
        *self.reject_create.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn reject_logins(&self, status: u16, message: &str) {
        *self.reject_login.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// `GET /reportes` waits until the returned handle is notified.
    pub fn hold_lists(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_list.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn push_report(&self, report: Value) {
        self.reports.lock().unwrap().push(report);
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn body_of(&self, path: &str) -> Option<Value> {
        self.requests()
            .into_iter()
            .find(|r| r.method == "POST" && r.path == path)
            .and_then(|r| r.body)
    }

    fn respond(status: u16, body: &Value) -> HttpResult {
        HttpResult::Ok(HttpResponse::status(status).json(body).build())
    }

    fn record(&self, request: &HttpRequest) -> (String, Option<Value>) {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let body = (!request.body.is_empty())
            .then(|| serde_json::from_slice::<Value>(&request.body).unwrap());
        let accepts_json = request
            .headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("accept") && h.value.contains("application/json"));
        self.seen.lock().unwrap().push(SeenRequest {
            method: request.method.clone(),
            path: path.clone(),
            body: body.clone(),
            accepts_json,
        });
        (path, body)
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeBackend {
    async fn execute(&self, request: &HttpRequest) -> HttpResult {
        let (path, body) = self.record(request);

        if self.offline.load(Ordering::SeqCst) {
            return HttpResult::Err(crux_http::Error::Io("network unreachable".into()));
        }

        match (request.method.as_str(), path.as_str()) {
            ("GET", "/reportes") => {
                let gate = self.hold_list.lock().unwrap().clone();
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                if self.fail_list.load(Ordering::SeqCst) {
                    return Self::respond(500, &json!({"message": "db down"}));
                }
                let reports = Value::Array(self.reports.lock().unwrap().clone());
                Self::respond(200, &reports)
            }
            ("POST", "/reportes") => {
                let rejection = self.reject_create.lock().unwrap().clone();
                if let Some((status, message)) = rejection {
                    return Self::respond(status, &json!({ "message": message }));
                }
                let mut record = body.unwrap_or(Value::Null);
                let new_id = self.next_id.fetch_add(1, Ordering::SeqCst);
                record["id"] = json!(new_id);
                self.reports.lock().unwrap().push(record.clone());
                Self::respond(201, &record)
            }
            ("POST", "/login") => {
                let rejection = self.reject_login.lock().unwrap().clone();
                if let Some((status, message)) = rejection {
                    return Self::respond(status, &json!({ "message": message }));
                }
                Self::respond(200, &json!({"usuario": {"id": 5, "nombre": "Ana"}}))
            }
            ("POST", "/save-token") => Self::respond(200, &json!({})),
            ("POST", "/register") => Self::respond(201, &json!({"message": "Usuario registrado"})),
            _ => Self::respond(404, &json!({"message": "not found"})),
        }
    }
}

pub struct ScriptedLocation {
    permission: PermissionStatus,
    position: Result<(f64, f64), LocationError>,
    /// When set, position reads wait until notified.
    gate: Option<Arc<Notify>>,
}

impl ScriptedLocation {
    pub fn granted_at(lat: f64, lon: f64) -> Arc<Self> {
        Arc::new(Self {
            permission: PermissionStatus::Granted,
            position: Ok((lat, lon)),
            gate: None,
        })
    }

    /// Granted, but the fix only arrives once the returned gate is notified.
    pub fn held_at(lat: f64, lon: f64) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let location = Arc::new(Self {
            permission: PermissionStatus::Granted,
            position: Ok((lat, lon)),
            gate: Some(gate.clone()),
        });
        (location, gate)
    }

    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            permission: PermissionStatus::Denied,
            position: Err(LocationError::PermissionDenied),
            gate: None,
        })
    }

    pub fn granted_but_failing() -> Arc<Self> {
        Arc::new(Self {
            permission: PermissionStatus::Granted,
            position: Err(LocationError::Unavailable {
                reason: "no fix".into(),
            }),
            gate: None,
        })
    }
}

#[async_trait::async_trait]
impl LocationProvider for ScriptedLocation {
    async fn request_foreground_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn current_position(&self) -> Result<(f64, f64), LocationError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.position.clone()
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new(BASE_URL).unwrap()
}

pub fn record(id: i64, description: &str, lat: Value, lon: Value, level: &str) -> Value {
    json!({
        "id": id,
        "descripcion": description,
        "latitud": lat,
        "longitud": lon,
        "nivel": level,
        "usuario_id": 5,
    })
}

/// Drives the app through `AppTester`, answering effects from the fakes.
/// Effects can be held back and resolved later to force orderings.
pub struct Driver {
    pub app: AppTester<App, Effect>,
    pub model: Model,
    pub backend: Arc<FakeBackend>,
    pub kv: Arc<MemoryKvStore>,
    pub location: Arc<ScriptedLocation>,
    pub renders: usize,
    runtime: tokio::runtime::Runtime,
}

impl Driver {
    /// A configured app with an empty device store.
    pub fn new(backend: Arc<FakeBackend>, location: Arc<ScriptedLocation>) -> Self {
        let mut driver = Self {
            app: AppTester::default(),
            model: Model::default(),
            backend,
            kv: Arc::new(MemoryKvStore::new()),
            location,
            renders: 0,
            runtime: tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap(),
        };
        driver.send(Event::Configure(config()));
        driver
    }

    pub fn signed_in(backend: Arc<FakeBackend>, location: Arc<ScriptedLocation>) -> Self {
        let mut driver = Self::new(backend, location);
        driver.send(Event::Login {
            email: "ana@example.com".into(),
            password: SecretString::new("secreto".into()),
        });
        assert!(driver.model.session().is_signed_in());
        driver
    }

    /// Runs `event` and everything that follows from it.
    pub fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.absorb(update);
    }

    /// Runs `event` but hands back its effects unanswered.
    pub fn send_held(&mut self, event: Event) -> Vec<Effect> {
        let update = self.app.update(event, &mut self.model);
        self.collect(update)
    }

    /// Answers one held effect, and everything that follows from it.
    pub fn resolve(&mut self, effect: Effect) {
        let update = match effect {
            Effect::Http(mut request) => {
                let result = self.runtime.block_on(self.backend.execute(&request.operation));
                self.app.resolve(&mut request, result).unwrap()
            }
            Effect::KeyValue(mut request) => {
                let result = self
                    .runtime
                    .block_on(kv::execute(self.kv.as_ref(), request.operation.clone()));
                self.app.resolve(&mut request, result).unwrap()
            }
            Effect::Location(mut request) => {
                let result = self
                    .runtime
                    .block_on(location::execute(self.location.as_ref(), request.operation.clone()));
                self.app.resolve(&mut request, result).unwrap()
            }
            Effect::Render(_) => {
                self.renders += 1;
                return;
            }
        };
        self.absorb(update);
    }

    pub fn view(&self) -> PanelView {
        self.app.view(&self.model)
    }

    fn absorb(&mut self, update: Update<Effect, Event>) {
        for effect in self.collect(update) {
            self.resolve(effect);
        }
    }

    /// Applies follow-up events and returns the effects still to answer.
    fn collect(&mut self, update: Update<Effect, Event>) -> Vec<Effect> {
        let mut pending = Vec::new();
        for effect in update.effects {
            if let Effect::Render(_) = effect {
                self.renders += 1;
            } else {
                pending.push(effect);
            }
        }
        for event in update.events {
            let next = self.app.update(event, &mut self.model);
            pending.extend(self.collect(next));
        }
        pending
    }
}
