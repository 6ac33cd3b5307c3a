use crux_kv::error::KeyValueError;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage backend error: {message}")]
    Backend { message: String },

    #[error("storage timed out")]
    Timeout,
}

impl From<KeyValueError> for KvError {
    fn from(e: KeyValueError) -> Self {
        match e {
            KeyValueError::Timeout => KvError::Timeout,
            KeyValueError::Io { message } | KeyValueError::Other { message } => {
                KvError::Backend { message }
            }
            KeyValueError::CursorNotFound => KvError::Backend {
                message: "cursor not found".to_string(),
            },
        }
    }
}

impl From<KvError> for KeyValueError {
    fn from(e: KvError) -> Self {
        match e {
            KvError::Timeout => KeyValueError::Timeout,
            KvError::Backend { message } => KeyValueError::Io { message },
            other @ KvError::ValueTooLarge { .. } => KeyValueError::Other {
                message: other.to_string(),
            },
        }
    }
}

/// Device key/value storage backing the `KeyValue` effect in native shells.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
    /// Returns the value previously stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, KvError>;
    /// Returns the value that was removed.
    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
    /// Keys starting with `prefix`, in lexical order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

/// Answers one `KeyValue` effect from `store`. Listing is never paged, so
/// only cursor `0` is known.
pub async fn execute(store: &dyn KeyValueStore, operation: KeyValueOperation) -> KeyValueResult {
    let response = match operation {
        KeyValueOperation::Get { key } => store
            .get(&key)
            .await
            .map(|value| KeyValueResponse::Get { value: value.into() }),
        KeyValueOperation::Set { key, value } => store
            .set(&key, value)
            .await
            .map(|previous| KeyValueResponse::Set {
                previous: previous.into(),
            }),
        KeyValueOperation::Delete { key } => store
            .delete(&key)
            .await
            .map(|previous| KeyValueResponse::Delete {
                previous: previous.into(),
            }),
        KeyValueOperation::Exists { key } => store
            .get(&key)
            .await
            .map(|value| KeyValueResponse::Exists {
                is_present: value.is_some(),
            }),
        KeyValueOperation::ListKeys { prefix, cursor } => {
            if cursor != 0 {
                return KeyValueResult::Err {
                    error: KeyValueError::CursorNotFound,
                };
            }
            store.keys(&prefix).await.map(|keys| KeyValueResponse::ListKeys {
                keys,
                next_cursor: 0,
            })
        }
    };

    match response {
        Ok(response) => KeyValueResult::Ok { response },
        Err(e) => KeyValueResult::Err { error: e.into() },
    }
}

fn check_value_size(value: &[u8]) -> Result<(), KvError> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

/// Process-local store, for shells without persistent storage.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, KvError> {
        check_value_size(&value)?;
        Ok(self.entries.write().await.insert(key.to_string(), value))
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.write().await.remove(key))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use self::sqlite::SqliteKvStore;

#[cfg(not(target_arch = "wasm32"))]
mod sqlite {
    use super::{check_value_size, KeyValueStore, KvError};
    use rusqlite::{params, Connection, OptionalExtension};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// SQLite-backed store; each call runs on the blocking pool.
    pub struct SqliteKvStore {
        conn: Arc<Mutex<Connection>>,
    }

    fn backend(e: impl std::fmt::Display) -> KvError {
        KvError::Backend {
            message: e.to_string(),
        }
    }

    impl SqliteKvStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
            let conn = Connection::open(path).map_err(backend)?;
            Self::init(conn)
        }

        pub fn open_in_memory() -> Result<Self, KvError> {
            let conn = Connection::open_in_memory().map_err(backend)?;
            Self::init(conn)
        }

        fn init(conn: Connection) -> Result<Self, KvError> {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_entries (
                    key TEXT PRIMARY KEY,
                    value BLOB NOT NULL
                );",
            )
            .map_err(backend)?;
            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        async fn with_conn<T, F>(&self, f: F) -> Result<T, KvError>
        where
            T: Send + 'static,
            F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        {
            let conn = Arc::clone(&self.conn);
            tokio::task::spawn_blocking(move || {
                let guard = conn
                    .lock()
                    .map_err(|_| backend("sqlite connection lock poisoned"))?;
                f(&guard).map_err(backend)
            })
            .await
            .map_err(backend)?
        }
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>, rusqlite::Error> {
        conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
    }

    #[async_trait::async_trait]
    impl KeyValueStore for SqliteKvStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
            let key = key.to_string();
            self.with_conn(move |conn| read(conn, &key)).await
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, KvError> {
            check_value_size(&value)?;
            let key = key.to_string();
            self.with_conn(move |conn| {
                let previous = read(conn, &key)?;
                conn.execute(
                    "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
                Ok(previous)
            })
            .await
        }

        async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
            let key = key.to_string();
            self.with_conn(move |conn| {
                let previous = read(conn, &key)?;
                conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
                Ok(previous)
            })
            .await
        }

        async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
            let pattern = format!(
                "{}%",
                prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
            );
            self.with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key FROM kv_entries WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
                )?;
                let keys = stmt
                    .query_map(params![pattern], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
        }
    }
}
