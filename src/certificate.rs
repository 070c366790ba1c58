//! Lookup of TLS client certificates by friendly name.
//!
//! The local "personal" store is a directory of PEM bundles (certificate plus private key). OpenSSL writes the
//! friendly name of an exported identity as a bag attribute:
//!
//! ```text
//! Bag Attributes
//!     friendlyName: log-writer
//! -----BEGIN CERTIFICATE-----
//! ```
//!
//! Files without the attribute are known by their file stem.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use cfg_if::cfg_if;
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the location of the personal store.
pub const CERT_STORE_ENV: &str = "MONGOLOG_CERT_STORE";

const FRIENDLY_NAME_ATTRIBUTE: &str = "friendlyName:";

cfg_if! {
    if #[cfg(windows)] {
        /// `%APPDATA%\mongolog\certs\my`, falling back to the home directory.
        pub fn default_store_dir() -> PathBuf {
            std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .or_else(home::home_dir)
                .unwrap_or_default()
                .join("mongolog")
                .join("certs")
                .join("my")
        }
    } else {
        /// `$HOME/.mongolog/certs/my`.
        pub fn default_store_dir() -> PathBuf {
            home::home_dir()
                .unwrap_or_default()
                .join(".mongolog")
                .join("certs")
                .join("my")
        }
    }
}

#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("Could not read certificate store entry {path:?}: {source}")]
    UnreadableEntry { path: PathBuf, source: io::Error },
}

/// A client identity usable for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    pub friendly_name: String,
    /// PEM file holding the certificate and its key.
    pub path: PathBuf,
}

/// Read-only access to a store of client certificates.
pub trait CertificateStore: Send + Sync {
    /// First certificate whose friendly name equals `friendly_name` exactly. Absence is not an error.
    fn find_by_friendly_name(&self, friendly_name: &str) -> Option<ClientCertificate>;
}

/// A directory of PEM files acting as the personal certificate store.
#[derive(Debug, Clone)]
pub struct PemDirectoryStore {
    root: PathBuf,
}

impl PemDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The current user's personal store: `$MONGOLOG_CERT_STORE` if set, else [default_store_dir].
    pub fn personal() -> Self {
        match std::env::var_os(CERT_STORE_ENV) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::new(default_store_dir()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn friendly_name_of(path: &Path) -> Result<Option<String>, CertificateError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            CertificateError::UnreadableEntry {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let attribute = contents.lines().find_map(|line| {
            line.trim_start()
                .strip_prefix(FRIENDLY_NAME_ATTRIBUTE)
                .map(|name| name.trim().to_string())
        });
        Ok(attribute.or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        }))
    }
}

impl CertificateStore for PemDirectoryStore {
    fn find_by_friendly_name(&self, friendly_name: &str) -> Option<ClientCertificate> {
        // The directory handle lives only as long as this scan.
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(store = ?self.root, "Certificate store unavailable: {err}");
                return None;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("pem"))
                        .unwrap_or(false)
            })
            .collect();
        // read_dir order is platform dependent; keep "first match" stable.
        candidates.sort();

        candidates.into_iter().find_map(|path| {
            match Self::friendly_name_of(&path) {
                Ok(Some(name)) if name == friendly_name => Some(ClientCertificate {
                    friendly_name: name,
                    path,
                }),
                Ok(_) => None,
                Err(err) => {
                    debug!("Skipping certificate entry: {err}");
                    None
                }
            }
        })
    }
}
