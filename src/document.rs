//! Builds one [LogDocument] per [LogEvent].

use derive_more::Constructor;

use crate::{
    error::AppenderError,
    event::LogEvent,
    layout::{FormatEvent, Formatter},
    value::{CoercionError, Formatted, LogDocument, Value},
};

/// A named rule producing one key/value pair of the document.
#[derive(Debug, Clone, Constructor)]
pub struct FieldMapping {
    pub name: String,
    pub formatter: Formatter,
}

/// Converts events into documents using an ordered list of field mappings.
///
/// With no mappings configured, a fixed default layout is used instead (see [DocumentBuilder::default_document]).
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    fields: Vec<FieldMapping>,
}

impl DocumentBuilder {
    pub fn new(fields: Vec<FieldMapping>) -> Result<Self, AppenderError> {
        if let Some(position) = fields.iter().position(|f| f.name.trim().is_empty()) {
            return Err(AppenderError::ConfigurationError(format!(
                "Field mapping #{position} has an empty name"
            )));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn build(&self, event: &LogEvent) -> Result<LogDocument, AppenderError> {
        if self.fields.is_empty() {
            return Self::default_document(event);
        }

        let mut doc = LogDocument::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = field
                .formatter
                .format(event)
                .coerce()
                .map_err(|err| serialization_error(&field.name, err))?;
            doc.push(field.name.clone(), value);
        }
        Ok(doc)
    }

    /// Builds every document of a batch in order. The first failure aborts the whole batch.
    pub fn build_all(&self, events: &[LogEvent]) -> Result<Vec<LogDocument>, AppenderError> {
        events.iter().map(|event| self.build(event)).collect()
    }

    /// The document written when no field mappings are configured.
    pub fn default_document(event: &LogEvent) -> Result<LogDocument, AppenderError> {
        let mut doc = LogDocument::with_capacity(11);
        doc.push("timestamp", event.timestamp);
        doc.push("level", event.level.to_string());
        doc.push("thread", event.thread.clone());
        doc.push("loggerName", event.logger.clone());
        doc.push("message", event.message.clone());

        if let Some(location) = &event.location {
            doc.push("fileName", location.file.clone());
            doc.push("method", location.method.clone());
            doc.push("lineNumber", Value::Int64(location.line.into()));
        }

        if let Some(exception) = &event.exception {
            doc.push("exception", exception.clone());
        }

        if !event.properties.is_empty() {
            let mut properties = LogDocument::with_capacity(event.properties.len());
            for (key, value) in &event.properties {
                let value = Formatted::Json(value.clone())
                    .coerce()
                    .map_err(|err| serialization_error(key, err))?;
                properties.push(key.clone(), value);
            }
            doc.push("properties", properties);
        }

        Ok(doc)
    }
}

fn serialization_error(field: &str, err: CoercionError) -> AppenderError {
    AppenderError::SerializationError {
        field: field.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DocumentBuilder, FieldMapping};
    use crate::{
        error::AppenderError,
        event::{Level, LogEvent, SourceLocation},
        layout::Formatter,
        value::{Formatted, Value},
    };

    fn mapping(name: &str, pattern: &str) -> FieldMapping {
        FieldMapping::new(name.into(), Formatter::pattern(pattern).unwrap())
    }

    #[test]
    fn keys_follow_mapping_order() {
        let builder = DocumentBuilder::new(vec![
            mapping("level", "%level"),
            mapping("message", "%message"),
        ])
        .unwrap();
        let doc = builder
            .build(&LogEvent::new(Level::Info, "app", "hello"))
            .unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["level", "message"]);
        assert_eq!(
            doc.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>(),
            vec![Value::String("INFO".into()), Value::String("hello".into())]
        );
    }

    #[test]
    fn duplicate_names_are_not_merged() {
        let builder =
            DocumentBuilder::new(vec![mapping("msg", "%message"), mapping("msg", "%level")])
                .unwrap();
        let doc = builder
            .build(&LogEvent::new(Level::Debug, "app", "x"))
            .unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["msg", "msg"]);
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(matches!(
            DocumentBuilder::new(vec![mapping(" ", "%message")]),
            Err(AppenderError::ConfigurationError(_))
        ));
    }

    #[test]
    fn coercion_failure_names_the_field() {
        let builder = DocumentBuilder::new(vec![
            mapping("message", "%message"),
            FieldMapping::new(
                "big".into(),
                Formatter::custom(|_| Formatted::Unsigned(u64::MAX)),
            ),
        ])
        .unwrap();
        let events = vec![LogEvent::new(Level::Info, "app", "a"); 3];
        match builder.build_all(&events) {
            Err(AppenderError::SerializationError { field, .. }) => assert_eq!(field, "big"),
            other => panic!("expected a serialization error, got {other:?}"),
        }
    }

    #[test]
    fn default_layout() {
        let event = LogEvent::new(Level::Error, "app.io", "boom")
            .with_exception("trace")
            .with_location(SourceLocation::new("io.rs".into(), 7, "read".into()))
            .with_property("user", json!("alice"));
        let doc = DocumentBuilder::default().build(&event).unwrap();
        assert_eq!(
            doc.keys().collect::<Vec<_>>(),
            vec![
                "timestamp",
                "level",
                "thread",
                "loggerName",
                "message",
                "fileName",
                "method",
                "lineNumber",
                "exception",
                "properties"
            ]
        );
        assert!(matches!(doc.get("timestamp"), Some(Value::Timestamp(_))));
        assert_eq!(doc.get("lineNumber"), Some(&Value::Int64(7)));
        let Some(Value::Document(properties)) = doc.get("properties") else {
            panic!("properties should be a nested document");
        };
        assert_eq!(properties.get("user"), Some(&Value::String("alice".into())));
    }

    #[test]
    fn minimal_default_layout() {
        let doc = DocumentBuilder::default()
            .build(&LogEvent::new(Level::Info, "app", "plain"))
            .unwrap();
        assert_eq!(doc.len(), 5);
        assert!(doc.get("properties").is_none());
    }
}
