//! Authenticated INLabs HTTP session.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::StreamExt;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::SessionError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::config::{Config, SectionList};

/// Name of the cookie INLabs issues on a successful login.
pub const SESSION_COOKIE: &str = "inlabs_session_cookie";

/// Marker header the portal expects on scripted bundle requests.
pub const ORIGIN_HEADER: &str = "origem";

/// Value of [`ORIGIN_HEADER`].
pub const ORIGIN_HEADER_VALUE: &str = "736372697074";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const LOGIN_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const BUNDLE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default User-Agent sent on every request.
pub fn default_user_agent() -> String {
    format!(
        "{}/{} (INLabs DOU extractor)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// INLabs account credentials.
///
/// `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Account e-mail.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    fn form_body(&self) -> String {
        format!(
            "email={}&password={}",
            urlencoding::encode(&self.email),
            urlencoding::encode(&self.password)
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A bundle saved to disk for one (date, section) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Publication date.
    pub date: NaiveDate,
    /// Section code.
    pub section: String,
    /// Saved archive path.
    pub path: PathBuf,
}

impl Bundle {
    /// `{YYYY-MM-DD}-{section}`, the bundle file name without extension.
    #[must_use]
    pub fn stem(&self) -> String {
        format!("{}-{}", self.date.format(BUNDLE_DATE_FORMAT), self.section)
    }
}

/// Result of requesting one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
    /// HTTP 200; the body was written to disk.
    Saved(Bundle),
    /// HTTP 404; nothing was published for that section on that date.
    NotFound {
        /// Publication date.
        date: NaiveDate,
        /// Section code.
        section: String,
    },
    /// Any other non-auth status; logged and skipped.
    Skipped {
        /// Publication date.
        date: NaiveDate,
        /// Section code.
        section: String,
        /// HTTP status code.
        status: u16,
    },
}

/// Builds the bundle URL for a date and section.
///
/// INLabs addresses a bundle as `{base}{YYYY-MM-DD}&dl={YYYY-MM-DD}-{section}.zip`.
#[must_use]
pub fn bundle_url(download_base: &str, date: NaiveDate, section: &str) -> String {
    let day = date.format(BUNDLE_DATE_FORMAT);
    format!("{download_base}{day}&dl={day}-{section}.zip")
}

/// File name a bundle is saved under.
#[must_use]
pub fn bundle_file_name(date: NaiveDate, section: &str) -> String {
    format!("{}-{section}.zip", date.format(BUNDLE_DATE_FORMAT))
}

/// Authenticated session against the INLabs portal.
///
/// The client is created once and reused, so the login cookie and the
/// connection pool are shared by every bundle request.
#[derive(Debug)]
pub struct ArchiveSession {
    client: Client,
    cookies: Arc<Jar>,
    credentials: Credentials,
    login_url: Url,
    download_base: String,
    retry_policy: RetryPolicy,
}

impl ArchiveSession {
    /// Creates an unauthenticated session from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidUrl`] for a bad login URL and
    /// [`SessionError::Client`] when the HTTP client cannot be built.
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self, SessionError> {
        let login_url = Url::parse(&config.login_url)
            .map_err(|_| SessionError::invalid_url(config.login_url.clone()))?;
        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .cookie_provider(Arc::clone(&cookies))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(SessionError::Client)?;

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            cookies,
            credentials,
            login_url,
            download_base: config.download_base.clone(),
            retry_policy: RetryPolicy::with_max_attempts(config.login_max_attempts),
        })
    }

    /// Replaces the login retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Posts the login form, retrying transient network failures.
    ///
    /// Any HTTP response ends the loop; whether it carried a session cookie
    /// is checked by [`ArchiveSession::session_cookie`].
    ///
    /// # Errors
    ///
    /// Returns the last network or timeout error once the retry policy gives up.
    #[instrument(skip(self), fields(url = %self.login_url, email = %self.credentials.email))]
    pub async fn login(&self) -> Result<(), SessionError> {
        let body = self.credentials.form_body();
        let mut attempt = 1;

        loop {
            let result = self
                .client
                .post(self.login_url.clone())
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .header(ACCEPT, LOGIN_ACCEPT)
                .body(body.clone())
                .send()
                .await;

            let error = match result {
                Ok(response) => {
                    let status = response.status();
                    info!(status = status.as_u16(), attempt, "login response received");
                    if self.is_authenticated() {
                        debug!("session cookie stored");
                    } else {
                        warn!("login response carried no session cookie");
                    }
                    return Ok(());
                }
                Err(error) => SessionError::from_request(self.login_url.as_str(), error),
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "login failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(attempt, %reason, error = %error, "login failed");
                    return Err(error);
                }
            }
        }
    }

    /// Current value of the INLabs session cookie, if any.
    #[must_use]
    pub fn session_cookie(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.login_url)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    /// Whether a session cookie is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session_cookie().is_some()
    }

    /// URL of the bundle for a date and section.
    #[must_use]
    pub fn bundle_url(&self, date: NaiveDate, section: &str) -> String {
        bundle_url(&self.download_base, date, section)
    }

    /// Downloads every section's bundle for one date into `dir`.
    ///
    /// Sections are requested in list order. A 404 or other non-auth status
    /// only skips that section.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotAuthenticated`] when no session cookie is held
    /// - [`SessionError::AuthRejected`] on HTTP 401/403
    /// - network, timeout and IO errors
    #[instrument(skip(self, sections, dir), fields(date = %date, dir = %dir.display()))]
    pub async fn download(
        &self,
        date: NaiveDate,
        sections: &SectionList,
        dir: &Path,
    ) -> Result<Vec<BundleOutcome>, SessionError> {
        let cookie = self
            .session_cookie()
            .ok_or(SessionError::NotAuthenticated)?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| SessionError::io(dir, e))?;

        let mut outcomes = Vec::with_capacity(sections.len());
        for section in sections.iter() {
            outcomes.push(self.download_section(date, section, &cookie, dir).await?);
        }
        Ok(outcomes)
    }

    async fn download_section(
        &self,
        date: NaiveDate,
        section: &str,
        cookie: &str,
        dir: &Path,
    ) -> Result<BundleOutcome, SessionError> {
        let url = self.bundle_url(date, section);
        info!(%url, section, "requesting bundle");

        let response = self
            .client
            .get(&url)
            .header(COOKIE, format!("{SESSION_COOKIE}={cookie}"))
            .header(ORIGIN_HEADER, ORIGIN_HEADER_VALUE)
            .send()
            .await
            .map_err(|e| SessionError::from_request(&url, e))?;

        match response.status() {
            StatusCode::OK => {
                let path = dir.join(bundle_file_name(date, section));
                let bytes = write_bundle(response, &url, &path).await?;
                info!(section, path = %path.display(), bytes, "bundle saved");
                Ok(BundleOutcome::Saved(Bundle {
                    date,
                    section: section.to_string(),
                    path,
                }))
            }
            StatusCode::NOT_FOUND => {
                info!(section, "bundle not found");
                Ok(BundleOutcome::NotFound {
                    date,
                    section: section.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SessionError::AuthRejected {
                url,
                status: response.status().as_u16(),
            }),
            status => {
                warn!(section, status = status.as_u16(), "unexpected status, skipping bundle");
                Ok(BundleOutcome::Skipped {
                    date,
                    section: section.to_string(),
                    status: status.as_u16(),
                })
            }
        }
    }
}

/// Writes a bundle body to `path`, replacing any earlier file.
///
/// A partially written file is removed on error.
async fn write_bundle(
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, SessionError> {
    let mut file = File::create(path)
        .await
        .map_err(|e| SessionError::io(path, e))?;
    let result = stream_to_file(&mut file, response, url, path).await;
    if result.is_err() {
        debug!(path = %path.display(), "cleaning up partial bundle after error");
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
    }
    result
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, SessionError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SessionError::from_request(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| SessionError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| SessionError::io(path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_json_str(
            r#"{
                "URL_LOGIN": "https://inlabs.in.gov.br/logar.php",
                "URL_DOWNLOAD": "https://inlabs.in.gov.br/index.php?p=",
                "SECOES": ["DO1", "DO2"],
                "DOWNLOAD_FOLDER": "temp/download",
                "UNZIP_FOLDER": "temp/unziped"
            }"#,
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bundle_url_layout() {
        assert_eq!(
            bundle_url("https://inlabs.in.gov.br/index.php?p=", date(2023, 9, 14), "DO1E"),
            "https://inlabs.in.gov.br/index.php?p=2023-09-14&dl=2023-09-14-DO1E.zip"
        );
    }

    #[test]
    fn test_bundle_stem_matches_file_name() {
        let bundle = Bundle {
            date: date(2024, 1, 2),
            section: "DO2E".to_string(),
            path: PathBuf::from("2024-01-02-DO2E.zip"),
        };
        assert_eq!(bundle.stem(), "2024-01-02-DO2E");
        assert_eq!(format!("{}.zip", bundle.stem()), bundle_file_name(bundle.date, "DO2E"));
    }

    #[test]
    fn test_bundle_file_name_pads_date() {
        assert_eq!(bundle_file_name(date(2024, 1, 2), "DO3"), "2024-01-02-DO3.zip");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("user@example.com", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"), "password leaked: {debug}");
    }

    #[test]
    fn test_form_body_is_url_encoded() {
        let credentials = Credentials::new("a+b@example.com", "p&ss=word");
        assert_eq!(
            credentials.form_body(),
            "email=a%2Bb%40example.com&password=p%26ss%3Dword"
        );
    }

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session =
            ArchiveSession::new(&test_config(), Credentials::new("user@example.com", "x")).unwrap();
        assert!(session.session_cookie().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_session_cookie_read_from_jar() {
        let session =
            ArchiveSession::new(&test_config(), Credentials::new("user@example.com", "x")).unwrap();
        let url = Url::parse("https://inlabs.in.gov.br/logar.php").unwrap();
        session
            .cookies
            .add_cookie_str("other=1; Path=/", &url);
        session
            .cookies
            .add_cookie_str("inlabs_session_cookie=abc123; Path=/", &url);
        assert_eq!(session.session_cookie().as_deref(), Some("abc123"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_download_without_cookie_is_refused() {
        let session =
            ArchiveSession::new(&test_config(), Credentials::new("user@example.com", "x")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let sections = SectionList::new(["DO1"]).unwrap();
        let result = session.download(date(2024, 1, 2), &sections, dir.path()).await;
        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
    }
}
