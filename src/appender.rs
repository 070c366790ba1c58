//! The appender: lazily provisions its collection on first use and turns appended events into writes.

use std::{path::PathBuf, sync::Arc, sync::OnceLock};

use derive_builder::Builder;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    certificate::{CertificateStore, PemDirectoryStore},
    connection::{open_database, ConnectionDescriptor, DEFAULT_COLLECTION},
    dispatch::{AppenderStats, StatsSnapshot, WriteDispatcher, WriteJob, WriteMode},
    document::{DocumentBuilder, FieldMapping},
    error::AppenderError,
    event::LogEvent,
    expiry::{ensure_expiry_index, ExpiryIndex},
    provision::{provision_collection, CappedOptions},
    store::DocumentStore,
    sync::TryOnce,
};

/// Everything an appender needs to know before its first append.
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct AppenderOptions {
    #[builder(default, setter(into, strip_option))]
    pub connection_string: Option<String>,

    /// Name looked up in `connection_strings`; takes precedence over `connection_string` when it resolves.
    #[builder(default, setter(into, strip_option))]
    pub connection_string_name: Option<String>,

    #[builder(default)]
    pub connection_strings: FxHashMap<String, String>,

    #[builder(default, setter(into, strip_option))]
    pub database: Option<String>,

    #[builder(default = "DEFAULT_COLLECTION.to_string()", setter(into))]
    pub collection: String,

    #[builder(default, setter(into, strip_option))]
    pub certificate_friendly_name: Option<String>,

    /// Directory used as the personal certificate store. Defaults to [PemDirectoryStore::personal].
    #[builder(default, setter(into, strip_option))]
    pub certificate_store: Option<PathBuf>,

    /// Zero or negative disables the expiry index.
    #[builder(default)]
    pub expire_after_seconds: i64,

    /// Capped size for a newly created collection, e.g. `"100MB"`.
    #[builder(default, setter(into, strip_option))]
    pub new_collection_max_size: Option<String>,

    /// Capped document count for a newly created collection. Only applies together with a size.
    #[builder(default, setter(into, strip_option))]
    pub new_collection_max_docs: Option<String>,

    #[builder(default)]
    pub write_mode: WriteMode,

    #[builder(default, setter(each(name = "field")))]
    pub fields: Vec<FieldMapping>,
}

impl AppenderOptions {
    pub fn descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            connection_string: self.connection_string.clone(),
            connection_string_name: self.connection_string_name.clone(),
            named_connection_strings: self.connection_strings.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            certificate_friendly_name: self.certificate_friendly_name.clone(),
        }
    }

    pub fn capped(&self) -> CappedOptions {
        CappedOptions::from_capacity_strings(
            self.new_collection_max_size.as_deref(),
            self.new_collection_max_docs.as_deref(),
        )
    }
}

/// Persists log events into a document store collection.
///
/// The connection and collection are resolved on the first append, exactly once per appender no matter how many
/// threads append concurrently. After that, appends only build documents and hand them to the write path.
pub struct Appender<S: DocumentStore> {
    store: S,
    certificates: Box<dyn CertificateStore>,
    descriptor: ConnectionDescriptor,
    capped: CappedOptions,
    expiry: Option<ExpiryIndex>,
    documents: DocumentBuilder,
    write_mode: WriteMode,
    stats: Arc<AppenderStats>,
    ready: TryOnce<WriteDispatcher<S::Collection>>,
    // Configuration errors can't fix themselves, so they are remembered.
    fatal: OnceLock<AppenderError>,
}

#[cfg(feature = "mongo")]
pub type MongoAppender = Appender<crate::store::mongo::MongoStore>;

#[cfg(feature = "mongo")]
impl Appender<crate::store::mongo::MongoStore> {
    pub fn mongo(options: AppenderOptions) -> Result<Self, AppenderError> {
        Self::new(crate::store::mongo::MongoStore::new(), options)
    }
}

impl<S: DocumentStore> Appender<S> {
    pub fn new(store: S, options: AppenderOptions) -> Result<Self, AppenderError> {
        let certificates: Box<dyn CertificateStore> = match &options.certificate_store {
            Some(path) => Box::new(PemDirectoryStore::new(path)),
            None => Box::new(PemDirectoryStore::personal()),
        };

        Ok(Self {
            store,
            certificates,
            descriptor: options.descriptor(),
            capped: options.capped(),
            expiry: ExpiryIndex::from_seconds(options.expire_after_seconds),
            documents: DocumentBuilder::new(options.fields)?,
            write_mode: options.write_mode,
            stats: Arc::default(),
            ready: TryOnce::new(),
            fatal: OnceLock::new(),
        })
    }

    pub fn with_certificate_store(mut self, certificates: impl CertificateStore + 'static) -> Self {
        self.certificates = Box::new(certificates);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the collection has been resolved.
    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The collection handle, once resolved.
    pub fn collection(&self) -> Option<&Arc<S::Collection>> {
        self.ready.get().map(WriteDispatcher::collection)
    }

    fn resolve(&self) -> Result<&WriteDispatcher<S::Collection>, AppenderError> {
        if let Some(ready) = self.ready.get() {
            return Ok(ready);
        }
        if let Some(err) = self.fatal.get() {
            return Err(err.clone());
        }

        self.ready
            .get_or_try_init(|| {
                let database = open_database(&self.store, &self.descriptor, &*self.certificates)?;
                let collection =
                    provision_collection(&database, &self.descriptor.collection, &self.capped)?;
                debug!(
                    collection = %self.descriptor.collection,
                    "Log collection ready"
                );
                WriteDispatcher::new(Arc::new(collection), self.write_mode, self.stats.clone())
            })
            .map_err(|err| {
                if let AppenderError::ConfigurationError(_) = err {
                    let _ = self.fatal.set(err.clone());
                }
                err
            })
    }

    /// Appends a single event.
    pub fn append(&self, event: &LogEvent) -> Result<(), AppenderError> {
        let dispatcher = self.resolve()?;
        let document = self.documents.build(event)?;
        dispatcher.submit(WriteJob::One(document))?;
        ensure_expiry_index(dispatcher.collection().as_ref(), self.expiry.as_ref())
    }

    /// Appends a batch as a single multi-document insert, preserving order. An empty batch does nothing.
    pub fn append_batch(&self, events: &[LogEvent]) -> Result<(), AppenderError> {
        if events.is_empty() {
            return Ok(());
        }
        let dispatcher = self.resolve()?;
        let documents = self.documents.build_all(events)?;
        dispatcher.submit(WriteJob::Many(documents))?;
        ensure_expiry_index(dispatcher.collection().as_ref(), self.expiry.as_ref())
    }
}
