use std::fmt::Write;

use super::{FormatEvent, LayoutError};
use crate::{event::LogEvent, value::Formatted};

/// One piece of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Level,
    Message,
    Logger,
    Thread,
    Date,
    Timestamp,
    Exception,
    File,
    Line,
    Method,
    Property(String),
}

/// A `%conversion` pattern such as `"[%level] %logger - %message"`, rendered to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternLayout {
    segments: Vec<Segment>,
}

impl PatternLayout {
    pub fn parse(pattern: &str) -> Result<Self, LayoutError> {
        let mut segments = vec![];
        let mut literal = String::new();
        let mut chars = pattern.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let mut name = String::new();
            while let Some((_, next)) = chars.peek() {
                if next.is_ascii_alphabetic() {
                    name.push(*next);
                    chars.next();
                } else {
                    break;
                }
            }

            if name.is_empty() {
                match chars.next() {
                    Some((_, '%')) => literal.push('%'),
                    _ => return Err(LayoutError::DanglingPercent(pos)),
                }
                continue;
            }

            let segment = match name.as_str() {
                "n" | "newline" => None,
                "level" | "p" => Some(Segment::Level),
                "message" | "m" => Some(Segment::Message),
                "logger" | "c" => Some(Segment::Logger),
                "thread" | "t" => Some(Segment::Thread),
                "date" | "utcdate" | "d" => Some(Segment::Date),
                "timestamp" => Some(Segment::Timestamp),
                "exception" => Some(Segment::Exception),
                "file" | "F" => Some(Segment::File),
                "line" | "L" => Some(Segment::Line),
                "method" | "M" => Some(Segment::Method),
                "property" | "X" => {
                    let key = Self::parse_option(&mut chars)
                        .ok_or_else(|| LayoutError::MissingOption(name.clone()))?;
                    Some(Segment::Property(key))
                }
                _ => return Err(LayoutError::UnknownConversion(name)),
            };

            // Only %property takes an option; anything else would leak `{...}` into the output.
            if matches!(chars.peek(), Some((_, '{'))) && !matches!(segment, Some(Segment::Property(_)))
            {
                return Err(LayoutError::UnexpectedOption(name));
            }

            let Some(segment) = segment else {
                literal.push('\n');
                continue;
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Reads a `{option}` directly following a conversion name.
    fn parse_option(
        chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    ) -> Option<String> {
        if !matches!(chars.peek(), Some((_, '{'))) {
            return None;
        }
        chars.next();
        let mut option = String::new();
        for (_, c) in chars.by_ref() {
            if c == '}' {
                return (!option.is_empty()).then_some(option);
            }
            option.push(c);
        }
        None
    }

    pub fn render(&self, event: &LogEvent) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            // Writing into a String can't fail.
            let _ = match segment {
                Segment::Literal(text) => out.write_str(text),
                Segment::Level => out.write_str(event.level.as_str()),
                Segment::Message => out.write_str(&event.message),
                Segment::Logger => out.write_str(&event.logger),
                Segment::Thread => out.write_str(&event.thread),
                Segment::Date => out.write_str(
                    &bson::DateTime::from_system_time(event.timestamp)
                        .try_to_rfc3339_string()
                        .unwrap_or_default(),
                ),
                Segment::Timestamp => write!(
                    out,
                    "{}",
                    bson::DateTime::from_system_time(event.timestamp).timestamp_millis()
                ),
                Segment::Exception => out.write_str(event.exception.as_deref().unwrap_or("")),
                Segment::File => out.write_str(
                    event
                        .location
                        .as_ref()
                        .map(|loc| loc.file.as_str())
                        .unwrap_or(""),
                ),
                Segment::Line => match &event.location {
                    Some(loc) => write!(out, "{}", loc.line),
                    None => Ok(()),
                },
                Segment::Method => out.write_str(
                    event
                        .location
                        .as_ref()
                        .map(|loc| loc.method.as_str())
                        .unwrap_or(""),
                ),
                Segment::Property(key) => match event.property(key) {
                    Some(serde_json::Value::String(s)) => out.write_str(s),
                    Some(other) => write!(out, "{other}"),
                    None => Ok(()),
                },
            };
        }
        out
    }
}

impl FormatEvent for PatternLayout {
    fn format(&self, event: &LogEvent) -> Formatted {
        Formatted::Text(self.render(event))
    }
}
