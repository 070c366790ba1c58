#![allow(dead_code)]
//! An in-memory document store that records every call made against it.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use mongolog::{
    certificate::ClientCertificate,
    expiry::ExpiryIndex,
    provision::CappedOptions,
    store::{ConnectionSettings, DocumentStore, StoreCollection, StoreDatabase, StoreError},
    value::LogDocument,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Insert {
    One(LogDocument),
    Many(Vec<LogDocument>),
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub existing: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, CappedOptions)>>,
    pub inserts: Mutex<Vec<Insert>>,
    pub indexes: Mutex<Vec<ExpiryIndex>>,
    pub connected: Mutex<Vec<(String, MemorySettings)>>,

    pub parse_calls: AtomicUsize,
    pub connect_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,

    pub fail_connect: AtomicBool,
    pub fail_inserts: AtomicBool,
    /// Makes create_collection report that someone else created it first.
    pub lose_create_race: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_index: AtomicBool,
    pub connect_delay: Mutex<Option<Duration>>,
}

impl MemoryState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Every document inserted so far, in insert order.
    pub fn documents(&self) -> Vec<LogDocument> {
        self.inserts
            .lock()
            .iter()
            .flat_map(|insert| match insert {
                Insert::One(doc) => vec![doc.clone()],
                Insert::Many(docs) => docs.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySettings {
    pub uri: String,
    pub tls: bool,
    pub default_database: Option<String>,
    pub certificate: Option<PathBuf>,
}

impl ConnectionSettings for MemorySettings {
    fn tls_requested(&self) -> bool {
        self.tls
    }

    fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }

    fn set_client_certificate(&mut self, certificate: &ClientCertificate) {
        self.certificate = Some(certificate.path.clone());
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(names: &[&str]) -> Self {
        let store = Self::default();
        store
            .state
            .existing
            .lock()
            .extend(names.iter().map(|n| n.to_string()));
        store
    }
}

#[derive(Debug)]
struct Unreachable;

impl std::fmt::Display for Unreachable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("server unreachable")
    }
}

impl std::error::Error for Unreachable {}

impl DocumentStore for MemoryStore {
    type Settings = MemorySettings;
    type Database = MemoryDatabase;
    type Collection = MemoryCollection;

    /// Understands `mongodb://host[/database][?tls=true]`.
    fn parse(&self, connection_string: &str) -> Result<MemorySettings, StoreError> {
        self.state.parse_calls.fetch_add(1, Ordering::SeqCst);
        let rest = connection_string
            .strip_prefix("mongodb://")
            .ok_or_else(|| StoreError::InvalidConnectionString(connection_string.to_string()))?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let default_database = path
            .split_once('/')
            .map(|(_, db)| db.to_string())
            .filter(|db| !db.is_empty());
        Ok(MemorySettings {
            uri: connection_string.to_string(),
            tls: query.split('&').any(|kv| kv == "tls=true"),
            default_database,
            certificate: None,
        })
    }

    fn connect(
        &self,
        settings: MemorySettings,
        database: &str,
    ) -> Result<MemoryDatabase, StoreError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.state.connect_delay.lock() {
            std::thread::sleep(delay);
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(StoreError::backend(Unreachable));
        }
        self.state
            .connected
            .lock()
            .push((database.to_string(), settings));
        Ok(MemoryDatabase {
            name: database.to_string(),
            state: self.state.clone(),
        })
    }
}

pub struct MemoryDatabase {
    name: String,
    state: Arc<MemoryState>,
}

impl StoreDatabase for MemoryDatabase {
    type Collection = MemoryCollection;

    fn name(&self) -> &str {
        &self.name
    }

    fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.existing.lock().clone())
    }

    fn create_collection(&self, name: &str, options: &CappedOptions) -> Result<(), StoreError> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::backend(Unreachable));
        }
        if self.state.lose_create_race.load(Ordering::SeqCst) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        self.state.existing.lock().push(name.to_string());
        self.state.created.lock().push((name.to_string(), *options));
        Ok(())
    }

    fn collection(&self, name: &str) -> MemoryCollection {
        MemoryCollection {
            name: name.to_string(),
            state: self.state.clone(),
        }
    }
}

pub struct MemoryCollection {
    name: String,
    state: Arc<MemoryState>,
}

impl MemoryCollection {
    fn check_insert(&self) -> Result<(), StoreError> {
        if self.state.fail_inserts.load(Ordering::SeqCst) {
            Err(StoreError::backend(Unreachable))
        } else {
            Ok(())
        }
    }
}

impl StoreCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_one(&self, document: &LogDocument) -> Result<(), StoreError> {
        self.check_insert()?;
        self.state
            .inserts
            .lock()
            .push(Insert::One(document.clone()));
        Ok(())
    }

    fn insert_many(&self, documents: &[LogDocument]) -> Result<(), StoreError> {
        self.check_insert()?;
        self.state
            .inserts
            .lock()
            .push(Insert::Many(documents.to_vec()));
        Ok(())
    }

    fn create_index(&self, index: &ExpiryIndex) -> Result<(), StoreError> {
        if self.state.fail_index.load(Ordering::SeqCst) {
            return Err(StoreError::backend(Unreachable));
        }
        // Re-creating an identical index is a no-op, so every request is simply recorded.
        self.state.indexes.lock().push(*index);
        Ok(())
    }
}
