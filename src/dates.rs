//! Inclusive calendar-day ranges.
//!
//! Bounds may be given either as strings in a caller-supplied `strftime`
//! format or as [`NaiveDate`] values. Reversed bounds are swapped rather than
//! rejected, so `generate(a, b)` and `generate(b, a)` return the same list.
//!
//! # Example
//!
//! ```
//! use dou_extractor::dates::generate;
//!
//! let days = generate("2023-09-14", "2023-09-16", "%Y-%m-%d").unwrap();
//! assert_eq!(days, vec!["2023-09-14", "2023-09-15", "2023-09-16"]);
//! ```

use chrono::NaiveDate;
use thiserror::Error;

/// Date format used by INLabs URLs and by default on the command line.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors produced while building a date range.
#[derive(Debug, Error)]
pub enum DateRangeError {
    /// A bound could not be parsed with the supplied format.
    #[error("cannot parse date '{input}' with format '{format}': {source}")]
    Parse {
        /// The offending input string.
        input: String,
        /// The format it was parsed with.
        format: String,
        /// The underlying chrono error.
        #[source]
        source: chrono::ParseError,
    },
}

/// One bound of a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound<'a> {
    /// A date string still to be parsed.
    Text(&'a str),
    /// An already-parsed calendar date.
    Date(NaiveDate),
}

impl<'a> From<&'a str> for DateBound<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for DateBound<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value.as_str())
    }
}

impl From<NaiveDate> for DateBound<'_> {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl DateBound<'_> {
    /// Resolves the bound to a calendar date.
    ///
    /// # Errors
    ///
    /// Returns [`DateRangeError::Parse`] when a text bound does not match `format`.
    pub fn resolve(self, format: &str) -> Result<NaiveDate, DateRangeError> {
        match self {
            Self::Date(date) => Ok(date),
            Self::Text(text) => parse_date(text, format),
        }
    }
}

/// Parses a single date string with the given format.
///
/// # Errors
///
/// Returns [`DateRangeError::Parse`] on malformed input.
pub fn parse_date(input: &str, format: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(input.trim(), format).map_err(|source| DateRangeError::Parse {
        input: input.to_string(),
        format: format.to_string(),
        source,
    })
}

/// Every calendar day between two dates, inclusive, in ascending order.
#[must_use]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> Vec<NaiveDate> {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Generates the inclusive list of days between `start` and `end`, formatted
/// back with `format`.
///
/// # Errors
///
/// Returns [`DateRangeError::Parse`] when a text bound does not match `format`.
pub fn generate<'a, 'b>(
    start: impl Into<DateBound<'a>>,
    end: impl Into<DateBound<'b>>,
    format: &str,
) -> Result<Vec<String>, DateRangeError> {
    let start: DateBound<'a> = start.into();
    let end: DateBound<'b> = end.into();
    let start = start.resolve(format)?;
    let end = end.resolve(format)?;
    Ok(days_between(start, end)
        .into_iter()
        .map(|day| day.format(format).to_string())
        .collect())
}
