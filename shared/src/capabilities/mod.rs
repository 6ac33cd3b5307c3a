//! Effects the core asks the shell to perform.
//!
//! `Http`, `KeyValue` and `Render` come from Crux; `Location` is ours. The
//! `*Store`, `*Transport` and `*Provider` traits are what a native shell
//! implements to answer those effects (see [`crate::shell`]).

pub mod http;
pub mod kv;
pub mod location;

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

pub use self::http::{into_response, HttpError, HttpTransport, ValidatedUrl};
#[cfg(feature = "native-http")]
pub use self::http::ReqwestTransport;
pub use self::kv::{KeyValueStore, KvError, MemoryKvStore};
#[cfg(not(target_arch = "wasm32"))]
pub use self::kv::SqliteKvStore;
pub use self::location::{
    Location, LocationError, LocationOperation, LocationOutput, LocationProvider,
    LocationResult, PermissionStatus,
};

use crate::app::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "crate::app::App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub location: Location<Event>,
    pub render: Render<Event>,
}
