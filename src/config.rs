// Appender configuration is read from `mongolog.toml` in, in order of increasing precedence:
// $HOME
// $PWD
// $MONGOLOG_CONFIG_PATH (if set)

use std::{
    fs,
    path::{Path, PathBuf},
};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    appender::{AppenderOptions, AppenderOptionsBuilder},
    dispatch::WriteMode,
    document::FieldMapping,
    error::AppenderError,
    layout::{Formatter, LayoutKind},
};

pub const FILE_NAME: &str = "mongolog.toml";

pub const CONFIG_PATH_ENV: &str = "MONGOLOG_CONFIG_PATH";

/// One `[[field]]` entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub kind: LayoutKind,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppenderConfig {
    pub connection_string: Option<String>,
    pub connection_string_name: Option<String>,
    pub connection_strings: FxHashMap<String, String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub certificate_friendly_name: Option<String>,
    pub certificate_store: Option<PathBuf>,
    pub expire_after_seconds: Option<i64>,
    pub new_collection_max_size: Option<String>,
    pub new_collection_max_docs: Option<String>,
    pub write_mode: Option<WriteMode>,
    #[serde(rename = "field")]
    pub fields: Vec<FieldConfig>,
}

impl AppenderConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, AppenderError> {
        toml::from_str(contents)
            .map_err(|err| AppenderError::ConfigurationError(format!("Invalid config: {err}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, AppenderError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AppenderError::ConfigurationError(format!("Could not read {path:?}: {err}"))
        })?;
        Self::from_toml_str(&contents).map_err(|err| match err {
            AppenderError::ConfigurationError(msg) => {
                AppenderError::ConfigurationError(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Layers every `mongolog.toml` found in the standard locations. Missing files are skipped.
    pub fn load() -> Result<Self, AppenderError> {
        let mut dirs = vec![home::home_dir(), std::env::current_dir().ok()];
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            dirs.push(Some(PathBuf::from(path)));
        }
        Self::load_from(dirs.into_iter().flatten())
    }

    pub fn load_from(dirs: impl IntoIterator<Item = PathBuf>) -> Result<Self, AppenderError> {
        let mut config = AppenderConfig::default();
        for dir in dirs {
            let path = dir.join(FILE_NAME);
            if path.is_file() {
                debug!(path = ?path, "Loading appender config");
                config.update(Self::from_file(&path)?);
            }
        }
        Ok(config)
    }

    /// Overlays `other` on top of `self`. Named connection strings merge; a non-empty field list replaces the old one.
    pub fn update(&mut self, other: AppenderConfig) {
        fn overlay<T>(base: &mut Option<T>, new: Option<T>) {
            if new.is_some() {
                *base = new;
            }
        }

        overlay(&mut self.connection_string, other.connection_string);
        overlay(&mut self.connection_string_name, other.connection_string_name);
        self.connection_strings.extend(other.connection_strings);
        overlay(&mut self.database, other.database);
        overlay(&mut self.collection, other.collection);
        overlay(
            &mut self.certificate_friendly_name,
            other.certificate_friendly_name,
        );
        overlay(&mut self.certificate_store, other.certificate_store);
        overlay(&mut self.expire_after_seconds, other.expire_after_seconds);
        overlay(
            &mut self.new_collection_max_size,
            other.new_collection_max_size,
        );
        overlay(
            &mut self.new_collection_max_docs,
            other.new_collection_max_docs,
        );
        overlay(&mut self.write_mode, other.write_mode);
        if !other.fields.is_empty() {
            self.fields = other.fields;
        }
    }

    /// Parses the field layouts and produces appender options.
    pub fn into_options(self) -> Result<AppenderOptions, AppenderError> {
        let mut builder = AppenderOptionsBuilder::default()
            .connection_strings(self.connection_strings)
            .expire_after_seconds(self.expire_after_seconds.unwrap_or(0))
            .write_mode(self.write_mode.unwrap_or_default());

        if let Some(s) = self.connection_string {
            builder = builder.connection_string(s);
        }
        if let Some(s) = self.connection_string_name {
            builder = builder.connection_string_name(s);
        }
        if let Some(s) = self.database {
            builder = builder.database(s);
        }
        if let Some(s) = self.collection {
            builder = builder.collection(s);
        }
        if let Some(s) = self.certificate_friendly_name {
            builder = builder.certificate_friendly_name(s);
        }
        if let Some(path) = self.certificate_store {
            builder = builder.certificate_store(path);
        }
        if let Some(s) = self.new_collection_max_size {
            builder = builder.new_collection_max_size(s);
        }
        if let Some(s) = self.new_collection_max_docs {
            builder = builder.new_collection_max_docs(s);
        }
        for field in self.fields {
            let formatter = Formatter::from_config(field.kind, &field.layout).map_err(|err| {
                AppenderError::ConfigurationError(format!("Field {:?}: {err}", field.name))
            })?;
            builder = builder.field(FieldMapping::new(field.name, formatter));
        }

        builder
            .build()
            .map_err(|err| AppenderError::ConfigurationError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{AppenderConfig, FieldConfig, FILE_NAME};
    use crate::{
        dispatch::{Overflow, WriteMode},
        error::AppenderError,
        layout::LayoutKind,
    };

    const BASE: &str = r#"
connection_string = "mongodb://localhost:27017"
collection = "app_logs"
expire_after_seconds = 86400
new_collection_max_size = "100MB"

[connection_strings]
primary = "mongodb://primary:27017/logs"

[write_mode]
mode = "background"
queue_capacity = 64
workers = 2
overflow = "block"

[[field]]
name = "timestamp"
kind = "timestamp"

[[field]]
name = "level"
layout = "%level"

[[field]]
name = "request"
kind = "property"
layout = "request_id"
"#;

    #[test]
    fn parses_full_config() {
        let config = AppenderConfig::from_toml_str(BASE).unwrap();
        assert_eq!(config.collection.as_deref(), Some("app_logs"));
        assert_eq!(
            config.write_mode,
            Some(WriteMode::Background {
                queue_capacity: 64,
                workers: 2,
                overflow: Overflow::Block
            })
        );
        assert_eq!(
            config.fields[2],
            FieldConfig {
                name: "request".into(),
                layout: "request_id".into(),
                kind: LayoutKind::Property
            }
        );

        let options = config.into_options().unwrap();
        assert_eq!(options.collection, "app_logs");
        assert_eq!(options.expire_after_seconds, 86400);
        assert_eq!(
            options
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>(),
            vec!["timestamp", "level", "request"]
        );
        assert_eq!(options.capped().max_size_bytes(), Some(100 * 1024 * 1024));
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        fs::write(home.path().join(FILE_NAME), BASE).unwrap();
        fs::write(
            project.path().join(FILE_NAME),
            r#"
collection = "override"
connection_string_name = "primary"

[write_mode]
mode = "inline"
"#,
        )
        .unwrap();

        let config = AppenderConfig::load_from([
            home.path().to_path_buf(),
            project.path().to_path_buf(),
            project.path().join("does-not-exist"),
        ])
        .unwrap();
        assert_eq!(config.collection.as_deref(), Some("override"));
        assert_eq!(config.connection_string_name.as_deref(), Some("primary"));
        assert_eq!(
            config.connection_string.as_deref(),
            Some("mongodb://localhost:27017")
        );
        assert_eq!(config.write_mode, Some(WriteMode::Inline));
        assert_eq!(config.fields.len(), 3);

        let descriptor = config.into_options().unwrap().descriptor();
        assert_eq!(
            descriptor.resolve_connection_string().unwrap(),
            "mongodb://primary:27017/logs"
        );
    }

    #[test]
    fn bad_layout_is_a_configuration_error() {
        let config = AppenderConfig::from_toml_str(
            r#"
[[field]]
name = "oops"
layout = "%nonsense"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.into_options(),
            Err(AppenderError::ConfigurationError(msg)) if msg.contains("oops")
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            AppenderConfig::from_toml_str("colection = \"typo\""),
            Err(AppenderError::ConfigurationError(_))
        ));
    }
}
