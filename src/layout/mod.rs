//! Formatting of a [LogEvent] into a single field value.
//!
//! The appender only needs the [FormatEvent] capability; [Formatter] bundles the layouts that ship with the crate
//! plus arbitrary closures for anything else the host wants to emit.

use std::{fmt, sync::Arc};

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    event::LogEvent,
    value::{Formatted, Value},
};

mod pattern;
pub use pattern::PatternLayout;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Unknown conversion %{0} in layout pattern")]
    UnknownConversion(String),

    #[error("Conversion %{0} requires an option, e.g. %{0}{{key}}")]
    MissingOption(String),

    #[error("Conversion %{0} does not take an option")]
    UnexpectedOption(String),

    #[error("Dangling '%' at position {0}; use %% for a literal percent sign")]
    DanglingPercent(usize),

    #[error("Layout kind {0:?} requires a non-empty expression")]
    MissingExpression(LayoutKind),
}

/// Turns a log event into the value stored under one field.
#[enum_dispatch(Formatter)]
pub trait FormatEvent {
    fn format(&self, event: &LogEvent) -> Formatted;
}

/// All of the layouts a field mapping can use.
#[enum_dispatch]
#[derive(Clone, Debug)]
pub enum Formatter {
    PatternLayout,
    TimestampLayout,
    LevelLayout,
    PropertyLayout,
    PropertiesLayout,
    ExceptionLayout,
    CustomLayout,
}

/// Which layout a configured field uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Pattern,
    Timestamp,
    Level,
    Property,
    Properties,
    Exception,
}

impl Formatter {
    /// Builds a formatter from its configured kind and expression.
    /// The expression is the pattern for [LayoutKind::Pattern] and the key for [LayoutKind::Property]; other kinds ignore it.
    pub fn from_config(kind: LayoutKind, expression: &str) -> Result<Self, LayoutError> {
        Ok(match kind {
            LayoutKind::Pattern => PatternLayout::parse(expression)?.into(),
            LayoutKind::Timestamp => TimestampLayout.into(),
            LayoutKind::Level => LevelLayout.into(),
            LayoutKind::Property if expression.trim().is_empty() => {
                return Err(LayoutError::MissingExpression(kind))
            }
            LayoutKind::Property => PropertyLayout::new(expression.trim()).into(),
            LayoutKind::Properties => PropertiesLayout.into(),
            LayoutKind::Exception => ExceptionLayout.into(),
        })
    }

    pub fn pattern(pattern: &str) -> Result<Self, LayoutError> {
        Ok(PatternLayout::parse(pattern)?.into())
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&LogEvent) -> Formatted + Send + Sync + 'static,
    {
        CustomLayout(Arc::new(f)).into()
    }
}

/// The event time as a native timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimestampLayout;

impl FormatEvent for TimestampLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        Formatted::Time(event.timestamp)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LevelLayout;

impl FormatEvent for LevelLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        Formatted::Value(Value::String(event.level.to_string()))
    }
}

/// A single event property, keeping its structure rather than rendering it as text.
#[derive(Clone, Debug)]
pub struct PropertyLayout {
    key: String,
}

impl PropertyLayout {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl FormatEvent for PropertyLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        event
            .property(&self.key)
            .cloned()
            .map(Formatted::Json)
            .unwrap_or(Formatted::Value(Value::Null))
    }
}

/// Every event property as a nested document.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropertiesLayout;

impl FormatEvent for PropertiesLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        let mut object = serde_json::Map::with_capacity(event.properties.len());
        for (key, value) in &event.properties {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Formatted::Json(serde_json::Value::Object(object))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ExceptionLayout;

impl FormatEvent for ExceptionLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        match &event.exception {
            Some(exception) => Formatted::Text(exception.clone()),
            None => Formatted::Value(Value::Null),
        }
    }
}

/// A host-supplied closure.
#[derive(Clone)]
pub struct CustomLayout(Arc<dyn Fn(&LogEvent) -> Formatted + Send + Sync>);

impl fmt::Debug for CustomLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomLayout")
    }
}

impl FormatEvent for CustomLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{FormatEvent, Formatter, LayoutError, LayoutKind};
    use crate::{
        event::{Level, LogEvent},
        value::{Formatted, Value},
    };

    #[test]
    fn configured_kinds() {
        let event = LogEvent::new(Level::Error, "svc", "failed")
            .with_property("request", json!({"id": 9}))
            .with_exception("stack");

        let level = Formatter::from_config(LayoutKind::Level, "").unwrap();
        assert_eq!(
            level.format(&event),
            Formatted::Value(Value::String("ERROR".into()))
        );

        let ts = Formatter::from_config(LayoutKind::Timestamp, "").unwrap();
        assert_eq!(ts.format(&event), Formatted::Time(event.timestamp));

        let prop = Formatter::from_config(LayoutKind::Property, "request").unwrap();
        assert_eq!(prop.format(&event), Formatted::Json(json!({"id": 9})));

        let exc = Formatter::from_config(LayoutKind::Exception, "").unwrap();
        assert_eq!(exc.format(&event), Formatted::Text("stack".into()));

        assert_eq!(
            Formatter::from_config(LayoutKind::Property, " ").unwrap_err(),
            LayoutError::MissingExpression(LayoutKind::Property)
        );
    }

    #[test]
    fn missing_property_is_null() {
        let event = LogEvent::new(Level::Info, "svc", "ok");
        let prop = Formatter::from_config(LayoutKind::Property, "absent").unwrap();
        assert_eq!(prop.format(&event), Formatted::Value(Value::Null));
    }

    #[test]
    fn custom_closures() {
        let formatter = Formatter::custom(|event| Formatted::Unsigned(event.message.len() as u64));
        let event = LogEvent::new(Level::Info, "svc", "four");
        assert_eq!(formatter.format(&event), Formatted::Unsigned(4));
    }
}
