//! INLabs login and bundle download.
//!
//! The portal hands out an `inlabs_session_cookie` on login; every bundle
//! request must carry it. One [`ArchiveSession`] owns the HTTP client and the
//! cookie jar for a whole run.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use chrono::NaiveDate;
//! use dou_extractor::config::Config;
//! use dou_extractor::session::{ArchiveSession, Credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(Path::new("config.json"))?;
//! let session = ArchiveSession::new(&config, Credentials::new("me@example.com", "secret"))?;
//! session.login().await?;
//! let date = NaiveDate::from_ymd_opt(2024, 1, 2).ok_or("bad date")?;
//! let outcomes = session.download(date, &config.sections, &config.download_dir).await?;
//! println!("{} sections requested", outcomes.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod retry;

pub use client::{
    ArchiveSession, Bundle, BundleOutcome, Credentials, ORIGIN_HEADER, ORIGIN_HEADER_VALUE,
    SESSION_COOKIE, bundle_file_name, bundle_url, default_user_agent,
};
pub use error::SessionError;
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
