//! A log sink that persists structured log events into a document store.
//!
//! The destination collection is created on first use (optionally capped, optionally with a time-to-live index)
//! and every event is mapped into a document through an ordered list of named field mappings.

pub mod appender;
pub mod capacity;
pub mod certificate;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod document;
pub mod event;
pub mod expiry;
pub mod layout;
pub mod provision;
pub mod store;
pub mod value;

mod error;
mod sync;

pub use appender::{Appender, AppenderOptions, AppenderOptionsBuilder};
#[cfg(feature = "mongo")]
pub use appender::MongoAppender;
pub use error::AppenderError;
pub use sync::TryOnce;

// Re-exports the common structures needed to configure and feed an appender.
pub mod prelude {
    pub use crate::appender::{Appender, AppenderOptions, AppenderOptionsBuilder};
    pub use crate::config::AppenderConfig;
    pub use crate::dispatch::{Overflow, WriteMode};
    pub use crate::document::FieldMapping;
    pub use crate::error::AppenderError;
    pub use crate::event::{Level, LogEvent, SourceLocation};
    pub use crate::layout::{FormatEvent, Formatter, LayoutKind};
    pub use crate::value::{Formatted, LogDocument, Value};
}
