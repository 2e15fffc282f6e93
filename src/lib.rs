//! DOU Extractor Library
//!
//! Pulls the daily Diário Oficial da União section bundles from INLabs and
//! turns every act inside them into a flat, normalized record.
//!
//! # Architecture
//!
//! - [`dates`] - inclusive date ranges
//! - [`config`] - `config.json` loading and section lists
//! - [`session`] - login, session cookie and bundle download
//! - [`archive`] - bundle unpacking
//! - [`extract`] - XML envelope parsing, record construction, text classification
//! - [`pipeline`] - the end-to-end run
//! - [`export`] - JSON output

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod dates;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod session;

// Re-export commonly used types
pub use config::{Config, ConfigError, SectionList};
pub use dates::{DateRangeError, generate};
pub use extract::{EditionKind, Record, TextClassification, classify};
pub use pipeline::{DouExtractor, Extraction, ExtractionReport, PipelineError};
pub use session::{ArchiveSession, Bundle, BundleOutcome, Credentials, SessionError};
