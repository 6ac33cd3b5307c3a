//! In-process shell for Rust hosts and integration tests.
//!
//! Answers every effect the core requests with the injected services and
//! feeds the results back until the core goes quiet. Independent effects
//! run concurrently, so a slow location fix never holds up the list fetch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crux_core::Core;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::app::{App, Event};
use crate::capabilities::{kv, location, Capabilities, Effect, HttpTransport, KeyValueStore, LocationProvider};
use crate::view::PanelView;

pub struct NativeShell {
    core: Core<Effect, App>,
    http: Arc<dyn HttpTransport>,
    kv: Arc<dyn KeyValueStore>,
    location: Arc<dyn LocationProvider>,
    renders: AtomicUsize,
}

impl NativeShell {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        kv: Arc<dyn KeyValueStore>,
        location: Arc<dyn LocationProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: Core::new::<Capabilities>(),
            http,
            kv,
            location,
            renders: AtomicUsize::new(0),
        })
    }

    /// Shell backed by [`crate::capabilities::ReqwestTransport`], using the
    /// configured request timeout. The config still has to be sent with
    /// [`Event::Configure`].
    #[cfg(feature = "native-http")]
    pub fn with_reqwest(
        config: &crate::config::ClientConfig,
        kv: Arc<dyn KeyValueStore>,
        location: Arc<dyn LocationProvider>,
    ) -> Result<Arc<Self>, crate::capabilities::HttpError> {
        let http = crate::capabilities::ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(Arc::new(http), kv, location))
    }

    /// Processes `event` and every effect that follows from it.
    pub async fn dispatch(self: &Arc<Self>, event: Event) {
        debug!(event = event.name(), "dispatching");
        let effects = self.core.process_event(event);

        let mut tasks = JoinSet::new();
        self.spawn_all(&mut tasks, effects);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(effects) => self.spawn_all(&mut tasks, effects),
                Err(e) => error!(error = %e, "effect task failed"),
            }
        }
    }

    pub fn view(&self) -> PanelView {
        self.core.view()
    }

    /// Render requests seen so far.
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn spawn_all(self: &Arc<Self>, tasks: &mut JoinSet<Vec<Effect>>, effects: Vec<Effect>) {
        for effect in effects {
            if let Effect::Render(_) = effect {
                self.renders.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            let shell = Arc::clone(self);
            tasks.spawn(async move { shell.resolve(effect).await });
        }
    }

    async fn resolve(&self, effect: Effect) -> Vec<Effect> {
        match effect {
            Effect::Http(mut request) => {
                let result = self.http.execute(&request.operation).await;
                self.core.resolve(&mut request, result)
            }
            Effect::KeyValue(mut request) => {
                let result = kv::execute(self.kv.as_ref(), request.operation.clone()).await;
                self.core.resolve(&mut request, result)
            }
            Effect::Location(mut request) => {
                let result =
                    location::execute(self.location.as_ref(), request.operation.clone()).await;
                self.core.resolve(&mut request, result)
            }
            Effect::Render(_) => Vec::new(),
        }
    }
}
