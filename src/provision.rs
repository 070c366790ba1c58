//! Makes sure the destination collection exists before the first write.

use tracing::{debug, info};

use crate::{
    capacity::resolve_capacity,
    error::AppenderError,
    store::{StoreDatabase, StoreError},
};

/// Limits applied when a collection is created by the appender.
///
/// A capped collection is only requested when the size resolves above zero; the document limit is ignored without a size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CappedOptions {
    max_size_bytes: u64,
    max_documents: u64,
}

impl CappedOptions {
    pub fn new(max_size_bytes: u64, max_documents: u64) -> Self {
        Self {
            max_size_bytes,
            max_documents,
        }
    }

    /// Derives the limits from the two human-readable settings, e.g. `"100MB"` and `"5000"`.
    pub fn from_capacity_strings(max_size: Option<&str>, max_documents: Option<&str>) -> Self {
        Self::new(resolve_capacity(max_size), resolve_capacity(max_documents))
    }

    pub fn enabled(&self) -> bool {
        self.max_size_bytes > 0
    }

    pub fn max_size_bytes(&self) -> Option<u64> {
        self.enabled().then_some(self.max_size_bytes)
    }

    pub fn max_documents(&self) -> Option<u64> {
        (self.enabled() && self.max_documents > 0).then_some(self.max_documents)
    }
}

/// Returns a handle on `name`, creating the collection first if the database doesn't list it.
///
/// The existence check and the create are not atomic; losing a creation race to another writer is fine.
pub fn provision_collection<D: StoreDatabase>(
    database: &D,
    name: &str,
    capped: &CappedOptions,
) -> Result<D::Collection, AppenderError> {
    let existing = database
        .list_collection_names()
        .map_err(AppenderError::ProvisioningError)?;

    if existing.iter().any(|existing| existing == name) {
        debug!(database = database.name(), collection = name, "Collection exists");
    } else {
        match database.create_collection(name, capped) {
            Ok(()) => info!(
                database = database.name(),
                collection = name,
                capped = capped.enabled(),
                max_size_bytes = capped.max_size_bytes(),
                max_documents = capped.max_documents(),
                "Created log collection"
            ),
            Err(StoreError::AlreadyExists(_)) => {
                debug!(collection = name, "Collection was created concurrently")
            }
            Err(err) => return Err(AppenderError::ProvisioningError(err)),
        }
    }

    Ok(database.collection(name))
}
