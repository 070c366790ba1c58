//! MongoDB backend, using the driver's synchronous API.

use std::time::Duration;

use bson::{doc, Document};
use mongodb::{
    error::{Error, ErrorKind},
    options::{ClientOptions, CreateCollectionOptions, IndexOptions, Tls},
    sync::{Client, Collection, Database},
    IndexModel,
};

use super::{ConnectionSettings, DocumentStore, StoreCollection, StoreDatabase, StoreError};
use crate::{
    certificate::ClientCertificate, expiry::ExpiryIndex, provision::CappedOptions,
    value::LogDocument,
};

pub use mongodb;

/// Server error code for "namespace already exists".
const NAMESPACE_EXISTS: i32 = 48;

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        match *err.kind {
            ErrorKind::Command(ref command) if command.code == NAMESPACE_EXISTS => {
                StoreError::AlreadyExists(command.message.clone())
            }
            _ => StoreError::backend(err),
        }
    }
}

/// Argument errors raised while parsing mean the connection string itself is malformed.
fn parse_error(err: Error) -> StoreError {
    match *err.kind {
        ErrorKind::InvalidArgument { ref message, .. } => {
            StoreError::InvalidConnectionString(message.clone())
        }
        _ => StoreError::from(err),
    }
}

impl ConnectionSettings for ClientOptions {
    fn tls_requested(&self) -> bool {
        matches!(self.tls, Some(Tls::Enabled(_)))
    }

    fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }

    fn set_client_certificate(&mut self, certificate: &ClientCertificate) {
        if let Some(Tls::Enabled(ref mut tls)) = self.tls {
            tls.cert_key_file_path = Some(certificate.path.clone());
        }
    }
}

/// Connects to MongoDB deployments with the synchronous driver.
#[derive(Clone, Debug, Default)]
pub struct MongoStore {
    app_name: Option<String>,
}

impl MongoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported to the server in the connection handshake, unless the connection string already names one.
    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: Some(app_name.into()),
        }
    }
}

impl DocumentStore for MongoStore {
    type Settings = ClientOptions;
    type Database = Database;
    type Collection = Collection<LogDocument>;

    fn parse(&self, connection_string: &str) -> Result<ClientOptions, StoreError> {
        let mut options = ClientOptions::parse(connection_string).map_err(parse_error)?;
        if options.app_name.is_none() {
            options.app_name = self.app_name.clone();
        }
        Ok(options)
    }

    fn connect(&self, settings: ClientOptions, database: &str) -> Result<Database, StoreError> {
        let client = Client::with_options(settings)?;
        let database = client.database(database);
        // The driver connects lazily; ping so that connect/auth failures show up now.
        database.run_command(doc! { "ping": 1 }, None)?;
        Ok(database)
    }
}

impl StoreDatabase for Database {
    type Collection = Collection<LogDocument>;

    fn name(&self) -> &str {
        Database::name(self)
    }

    fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(Database::list_collection_names(self, None)?)
    }

    fn create_collection(&self, name: &str, capped: &CappedOptions) -> Result<(), StoreError> {
        let mut options = CreateCollectionOptions::default();
        if let Some(size) = capped.max_size_bytes() {
            options.capped = Some(true);
            options.size = Some(size);
            options.max = capped.max_documents();
        }
        Ok(Database::create_collection(self, name, options)?)
    }

    fn collection(&self, name: &str) -> Collection<LogDocument> {
        Database::collection::<LogDocument>(self, name)
    }
}

impl StoreCollection for Collection<LogDocument> {
    fn name(&self) -> &str {
        Collection::name(self)
    }

    fn insert_one(&self, document: &LogDocument) -> Result<(), StoreError> {
        Collection::insert_one(self, document, None)?;
        Ok(())
    }

    fn insert_many(&self, documents: &[LogDocument]) -> Result<(), StoreError> {
        Collection::insert_many(self, documents, None)?;
        Ok(())
    }

    fn create_index(&self, index: &ExpiryIndex) -> Result<(), StoreError> {
        let mut options = IndexOptions::default();
        options.name = Some(index.name.to_string());
        options.expire_after = Some(Duration::from_secs(index.expire_after_seconds));
        let mut keys = Document::new();
        keys.insert(index.field, 1);
        let model = IndexModel::builder()
            .keys(keys)
            .options(Some(options))
            .build();
        Collection::create_index(self, model, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MongoStore;
    use crate::store::{DocumentStore, StoreError};

    #[test]
    fn malformed_uri_is_an_invalid_connection_string() {
        assert!(matches!(
            MongoStore::new().parse("localhost:27017"),
            Err(StoreError::InvalidConnectionString(_))
        ));
    }

    #[test]
    fn driver_errors_outside_parsing_stay_backend_errors() {
        let err = mongodb::error::Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(matches!(StoreError::from(err), StoreError::Backend(_)));
    }
}
