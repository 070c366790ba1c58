use tracing::trace;

use crate::{error::AppenderError, store::StoreCollection};

/// Name of the expiry index. Reusing it makes repeated creation a no-op on the server.
pub const EXPIRY_INDEX_NAME: &str = "TTL";

/// Field the expiry index is built on.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Definition of the time-to-live index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryIndex {
    pub name: &'static str,
    pub field: &'static str,
    pub expire_after_seconds: u64,
}

impl ExpiryIndex {
    /// `None` unless `expire_after_seconds` is strictly positive.
    pub fn from_seconds(expire_after_seconds: i64) -> Option<Self> {
        u64::try_from(expire_after_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(|expire_after_seconds| Self {
                name: EXPIRY_INDEX_NAME,
                field: TIMESTAMP_FIELD,
                expire_after_seconds,
            })
    }
}

/// Requests the expiry index if one is configured. Called after every write.
pub fn ensure_expiry_index<C: StoreCollection + ?Sized>(
    collection: &C,
    index: Option<&ExpiryIndex>,
) -> Result<(), AppenderError> {
    let Some(index) = index else {
        return Ok(());
    };
    trace!(
        collection = collection.name(),
        expire_after_seconds = index.expire_after_seconds,
        "Ensuring expiry index"
    );
    collection
        .create_index(index)
        .map_err(AppenderError::ProvisioningError)
}
