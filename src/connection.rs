//! Turns the configured connection descriptor into a live database handle.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::{
    certificate::CertificateStore,
    error::AppenderError,
    store::{ConnectionSettings, DocumentStore},
};

/// Database used when neither the configuration nor the connection string names one.
pub const DEFAULT_DATABASE: &str = "Logging";

pub const DEFAULT_COLLECTION: &str = "Logs";

/// Where the appender writes to.
#[derive(Debug, Clone, Default)]
pub struct ConnectionDescriptor {
    /// Raw connection string, used when no named reference resolves.
    pub connection_string: Option<String>,
    /// Key into `named_connection_strings`.
    pub connection_string_name: Option<String>,
    pub named_connection_strings: FxHashMap<String, String>,
    pub database: Option<String>,
    pub collection: String,
    /// Friendly name of the client certificate presented when the connection string asks for TLS.
    pub certificate_friendly_name: Option<String>,
}

fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ConnectionDescriptor {
    /// The named reference wins if it resolves to something non-blank, otherwise the raw string is used.
    pub fn resolve_connection_string(&self) -> Result<&str, AppenderError> {
        let named = non_blank(self.connection_string_name.as_ref())
            .and_then(|name| non_blank(self.named_connection_strings.get(name)));

        named
            .or_else(|| non_blank(self.connection_string.as_ref()))
            .ok_or_else(|| {
                AppenderError::ConfigurationError(match &self.connection_string_name {
                    Some(name) => format!(
                        "No connection string configured: {name:?} is not a known named connection string and no raw connection string was given"
                    ),
                    None => "No connection string configured".to_string(),
                })
            })
    }

    /// Explicit database name, else the one embedded in the connection string, else [DEFAULT_DATABASE].
    pub fn select_database<'a>(&'a self, embedded: Option<&'a str>) -> &'a str {
        non_blank(self.database.as_ref())
            .or(embedded.map(str::trim).filter(|s| !s.is_empty()))
            .unwrap_or(DEFAULT_DATABASE)
    }
}

/// Resolves, parses and connects. No retries.
pub fn open_database<S: DocumentStore + ?Sized>(
    store: &S,
    descriptor: &ConnectionDescriptor,
    certificates: &dyn CertificateStore,
) -> Result<S::Database, AppenderError> {
    let connection_string = descriptor.resolve_connection_string()?;
    let mut settings = store
        .parse(connection_string)
        .map_err(AppenderError::ConnectionError)?;

    if settings.tls_requested() {
        if let Some(friendly_name) = non_blank(descriptor.certificate_friendly_name.as_ref()) {
            match certificates.find_by_friendly_name(friendly_name) {
                Some(certificate) => {
                    debug!(certificate = ?certificate.path, "Using client certificate");
                    settings.set_client_certificate(&certificate);
                }
                None => warn!(
                    friendly_name,
                    "No client certificate with this friendly name; connecting without one"
                ),
            }
        }
    }

    let database = descriptor
        .select_database(settings.default_database())
        .to_string();
    debug!(database = %database, "Connecting to document store");
    store
        .connect(settings, &database)
        .map_err(AppenderError::ConnectionError)
}
