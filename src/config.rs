//! Run configuration loaded from `config.json`.
//!
//! The file keeps the key names INLabs integrations have always used:
//!
//! ```json
//! {
//!   "URL_LOGIN": "https://inlabs.in.gov.br/logar.php",
//!   "URL_DOWNLOAD": "https://inlabs.in.gov.br/index.php?p=",
//!   "SECOES": ["DO1", "DO2", "DO3", "DO1E", "DO2E", "DO3E"],
//!   "DOWNLOAD_FOLDER": "temp/download",
//!   "UNZIP_FOLDER": "temp/unziped"
//! }
//! ```
//!
//! Optional keys: `DATE_FORMAT`, `LOGIN_MAX_ATTEMPTS`, `CONNECT_TIMEOUT_SECS`,
//! `READ_TIMEOUT_SECS`, `ACCEPT_INVALID_CERTS`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::dates::ISO_DATE_FORMAT;

/// Default login attempts before giving up on a transient network failure.
pub const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 5;

/// Default HTTP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout in seconds (bundles can be large).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

const MAX_LOGIN_ATTEMPTS: u32 = 50;
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON or lacks a required key.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Sections were given as something other than a list of codes.
    #[error("sections must be a list of section codes, got a {found}")]
    SectionsNotSequence {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// A section list entry is not a non-empty string.
    #[error("invalid section code at position {index}: {value}")]
    InvalidSectionCode {
        /// Position in the list.
        index: usize,
        /// The offending value.
        value: String,
    },

    /// The section list is empty.
    #[error("section list is empty")]
    EmptySections,

    /// A configured URL does not parse.
    #[error("invalid URL for `{field}`: {value}")]
    InvalidUrl {
        /// Config key.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// A numeric setting is out of its allowed range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {min}..={max}")]
    OutOfRange {
        /// Config key.
        field: &'static str,
        /// The offending value.
        value: u64,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },
}

/// Ordered list of gazette section codes (`DO1`, `DO2E`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionList(Vec<String>);

impl SectionList {
    /// Builds a list from codes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptySections`] for an empty list and
    /// [`ConfigError::InvalidSectionCode`] for blank codes.
    pub fn new<I, S>(codes: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes
            .into_iter()
            .map(|code| {
                let code: String = code.into();
                code.trim().to_string()
            })
            .collect();
        if codes.is_empty() {
            return Err(ConfigError::EmptySections);
        }
        if let Some(index) = codes.iter().position(String::is_empty) {
            return Err(ConfigError::InvalidSectionCode {
                index,
                value: String::new(),
            });
        }
        Ok(Self(codes))
    }

    /// Builds a list from a JSON value, which must be an array of strings.
    ///
    /// A bare string is rejected rather than split into characters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SectionsNotSequence`] when the value is not an
    /// array, plus the errors of [`SectionList::new`].
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(ConfigError::SectionsNotSequence {
                    found: json_type_name(other),
                });
            }
        };
        let codes = items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(code) => Ok(code.clone()),
                other => Err(ConfigError::InvalidSectionCode {
                    index,
                    value: other.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(codes)
    }

    /// Parses a comma-separated override such as `DO1,DO3E`.
    ///
    /// # Errors
    ///
    /// Same as [`SectionList::new`].
    pub fn parse_csv(input: &str) -> Result<Self, ConfigError> {
        Self::new(input.split(',').filter(|code| !code.trim().is_empty()))
    }

    /// Iterates the codes in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed list; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "URL_LOGIN")]
    url_login: String,
    #[serde(rename = "URL_DOWNLOAD")]
    url_download: String,
    #[serde(rename = "SECOES")]
    sections: Value,
    #[serde(rename = "DOWNLOAD_FOLDER")]
    download_folder: PathBuf,
    #[serde(rename = "UNZIP_FOLDER")]
    unzip_folder: PathBuf,
    #[serde(rename = "DATE_FORMAT", default)]
    date_format: Option<String>,
    #[serde(rename = "LOGIN_MAX_ATTEMPTS", default)]
    login_max_attempts: Option<u32>,
    #[serde(rename = "CONNECT_TIMEOUT_SECS", default)]
    connect_timeout_secs: Option<u64>,
    #[serde(rename = "READ_TIMEOUT_SECS", default)]
    read_timeout_secs: Option<u64>,
    #[serde(rename = "ACCEPT_INVALID_CERTS", default)]
    accept_invalid_certs: Option<bool>,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Login form endpoint.
    pub login_url: String,
    /// Bundle download base; date and section are appended.
    pub download_base: String,
    /// Default sections when the caller does not override them.
    pub sections: SectionList,
    /// Where bundles are saved.
    pub download_dir: PathBuf,
    /// Where bundles are unpacked.
    pub unzip_dir: PathBuf,
    /// `strftime` format of date bounds given as text.
    pub date_format: String,
    /// Login attempts before a transient failure becomes fatal.
    pub login_max_attempts: u32,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Skip TLS certificate verification (the portal has served broken chains).
    pub accept_invalid_certs: bool,
}

impl Config {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is not valid JSON,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses and validates config JSON.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus IO.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        validate_url("URL_LOGIN", &raw.url_login)?;
        validate_url("URL_DOWNLOAD", &raw.url_download)?;
        let sections = SectionList::from_value(&raw.sections)?;

        let login_max_attempts = raw
            .login_max_attempts
            .unwrap_or(DEFAULT_LOGIN_MAX_ATTEMPTS);
        validate_range(
            "LOGIN_MAX_ATTEMPTS",
            u64::from(login_max_attempts),
            1,
            u64::from(MAX_LOGIN_ATTEMPTS),
        )?;
        let connect_timeout_secs = raw
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        validate_range("CONNECT_TIMEOUT_SECS", connect_timeout_secs, 1, MAX_TIMEOUT_SECS)?;
        let read_timeout_secs = raw.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        validate_range("READ_TIMEOUT_SECS", read_timeout_secs, 1, MAX_TIMEOUT_SECS)?;

        Ok(Self {
            login_url: raw.url_login,
            download_base: raw.url_download,
            sections,
            download_dir: raw.download_folder,
            unzip_dir: raw.unzip_folder,
            date_format: raw
                .date_format
                .unwrap_or_else(|| ISO_DATE_FORMAT.to_string()),
            login_max_attempts,
            connect_timeout_secs,
            read_timeout_secs,
            accept_invalid_certs: raw.accept_invalid_certs.unwrap_or(false),
        })
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    Ok(())
}

fn validate_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
