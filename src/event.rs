use std::{fmt, str::FromStr, time::SystemTime};

use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Severity of a [LogEvent]. Displayed the way log pipelines conventionally render it: `INFO`, `WARN`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" | "CRITICAL" => Ok(Level::Fatal),
            other => Err(format!("Unknown level {other:?}")),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(value: tracing::Level) -> Self {
        if value == tracing::Level::TRACE {
            Level::Trace
        } else if value == tracing::Level::DEBUG {
            Level::Debug
        } else if value == tracing::Level::INFO {
            Level::Info
        } else if value == tracing::Level::WARN {
            Level::Warn
        } else {
            Level::Error
        }
    }
}

/// Where in the source a log call was made.
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub method: String,
}

/// A single log record as delivered by the host pipeline. The appender only ever reads it.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: SystemTime,
    pub level: Level,
    pub logger: String,
    pub message: String,
    pub thread: String,
    pub exception: Option<String>,
    pub location: Option<SourceLocation>,
    /// Arbitrary structured context attached to the event, in insertion order.
    pub properties: Vec<(String, serde_json::Value)>,
}

impl LogEvent {
    /// An event stamped with the current time and thread.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        let current = std::thread::current();
        Self {
            timestamp: SystemTime::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            thread: current
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", current.id())),
            exception: None,
            location: None,
            properties: vec![],
        }
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Looks up a property by exact key. The first occurrence wins.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }
}
