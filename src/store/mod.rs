//! The document store as seen by the appender.
//!
//! The appender is generic over [DocumentStore] so that provisioning and write paths can be driven by any backend.
//! MongoDB is the only backend shipped, behind the `mongo` feature.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    certificate::ClientCertificate, expiry::ExpiryIndex, provision::CappedOptions,
    value::LogDocument,
};

#[cfg_attr(docsrs, doc(cfg(feature = "mongo")))]
#[cfg(feature = "mongo")]
pub mod mongo;

/// Errors reported by a store backend.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The collection (or another named resource) already exists. Provisioning treats this as success.
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("{0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        StoreError::Backend(Arc::new(err))
    }
}

/// Structured settings parsed out of a connection string.
pub trait ConnectionSettings {
    /// Whether the connection string asks for TLS.
    fn tls_requested(&self) -> bool;

    /// Database name embedded in the connection string, if any.
    fn default_database(&self) -> Option<&str>;

    fn set_client_certificate(&mut self, certificate: &ClientCertificate);
}

/// Entry point of a backend: parses connection strings and opens databases.
pub trait DocumentStore: Send + Sync {
    type Settings: ConnectionSettings;
    type Database: StoreDatabase<Collection = Self::Collection>;
    type Collection: StoreCollection;

    fn parse(&self, connection_string: &str) -> Result<Self::Settings, StoreError>;

    /// Opens a live session against `database`. Connect and authentication failures surface here.
    fn connect(
        &self,
        settings: Self::Settings,
        database: &str,
    ) -> Result<Self::Database, StoreError>;
}

pub trait StoreDatabase {
    type Collection;

    fn name(&self) -> &str;

    fn list_collection_names(&self) -> Result<Vec<String>, StoreError>;

    fn create_collection(&self, name: &str, options: &CappedOptions) -> Result<(), StoreError>;

    fn collection(&self, name: &str) -> Self::Collection;
}

/// A handle on one collection. Shared between the appender and its write workers.
pub trait StoreCollection: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn insert_one(&self, document: &LogDocument) -> Result<(), StoreError>;

    fn insert_many(&self, documents: &[LogDocument]) -> Result<(), StoreError>;

    fn create_index(&self, index: &ExpiryIndex) -> Result<(), StoreError>;
}
