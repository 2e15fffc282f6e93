//! Error types for document reading and record construction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading an XML envelope.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The XML is not well formed.
    #[error("malformed XML in {origin}: {message}")]
    Xml {
        /// Where the document came from (path or `<memory>`).
        origin: String,
        /// Parser message.
        message: String,
    },

    /// A required attribute or body element is absent.
    #[error("missing required field {field} in {origin}")]
    MissingField {
        /// Where the document came from.
        origin: String,
        /// Field locator, e.g. `article@pubDate` or `body/Texto`.
        field: String,
    },
}

impl DocumentError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed-XML error.
    pub fn xml(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Xml {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Creates a missing-field error.
    pub fn missing(origin: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            origin: origin.into(),
            field: field.into(),
        }
    }
}

/// Errors raised while building a [`Record`](super::Record) from raw fields.
#[derive(Debug, Error)]
pub enum RecordError {
    /// `pubName` carries no digit, so no section number can be derived.
    #[error("no section number in publication name '{pub_name}' (act {act_id})")]
    MissingSectionNumber {
        /// The act identity key.
        act_id: String,
        /// The offending `pubName` value.
        pub_name: String,
    },

    /// The section digits do not fit a section number.
    #[error("invalid section number '{digits}' in publication name (act {act_id})")]
    InvalidSectionNumber {
        /// The act identity key.
        act_id: String,
        /// The digits found.
        digits: String,
    },

    /// `pubDate` is not a `dd/mm/yyyy` date.
    #[error("invalid publication date '{value}' (act {act_id}): {source}")]
    InvalidPublicationDate {
        /// The act identity key.
        act_id: String,
        /// The offending value.
        value: String,
        /// The underlying chrono error.
        #[source]
        source: chrono::ParseError,
    },
}
