use thiserror::Error;

use crate::{layout::LayoutError, store::StoreError};

/// Errors surfaced by the appender to the host pipeline.
#[derive(Error, Debug, Clone)]
pub enum AppenderError {
    /// No usable connection string, or an invalid layout/config entry.
    /// Once hit during resolution, every later append fails the same way.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The connection string could not be parsed, or connecting/authenticating failed.
    #[error("Connection error: {0}")]
    ConnectionError(StoreError),

    /// Creating the collection or the expiry index failed for a reason other than "already exists", or the write
    /// workers could not be started. Not sticky: the next append retries.
    #[error("Provisioning error: {0}")]
    ProvisioningError(StoreError),

    /// A formatted field value could not be coerced into a storable value.
    #[error("Could not serialize field {field:?}: {reason}")]
    SerializationError { field: String, reason: String },

    /// An inline write was rejected by the store. Background writes never produce this.
    #[error("Write error: {0}")]
    WriteError(StoreError),
}

impl From<LayoutError> for AppenderError {
    fn from(value: LayoutError) -> Self {
        AppenderError::ConfigurationError(value.to_string())
    }
}
