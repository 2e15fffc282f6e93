//! Turning unpacked XML envelopes into normalized act records.
//!
//! The flow for one document is:
//!
//! 1. [`read_document`] parses the envelope into a [`RawDocument`]
//! 2. [`Record::build`] derives identity, section, edition kind and dates
//! 3. [`classify`] splits the HTML body into principal text, excerpt,
//!    signatures and roles (called by the constructor, never afterwards)

pub mod classifier;
mod document;
mod error;
mod record;

pub use classifier::{TextClassification, classify, excerpt_of};
pub use document::{RawDocument, parse_document, read_document, xml_documents};
pub use error::{DocumentError, RecordError};
pub use record::{EditionKind, PUB_DATE_FORMAT, Record};

#[cfg(test)]
pub(crate) use document::tests::SAMPLE_XML;

use std::path::Path;

use thiserror::Error;

/// Failure to turn one document into a record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The envelope could not be read or parsed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The raw fields could not be normalized.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Reads one envelope from disk and builds its record.
///
/// # Errors
///
/// Returns [`ExtractError`] when reading, parsing or normalization fails.
pub fn extract_record(path: &Path) -> Result<Record, ExtractError> {
    let raw = read_document(path)?;
    Ok(Record::build(raw)?)
}
