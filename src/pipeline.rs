//! End-to-end extraction run.
//!
//! dates → login → bundle download → unpack → one [`Record`] per document.
//! Work directories are created up front. Whatever the run wrote into them is
//! removed when it ends, whether it succeeded or not; anything else is left
//! alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::archive::{ArchiveError, unpack_bundles};
use crate::config::{Config, SectionList};
use crate::dates::{DateBound, DateRangeError, days_between};
use crate::extract::{ExtractError, Record, extract_record, xml_documents};
use crate::session::{ArchiveSession, BundleOutcome, Credentials, RetryPolicy, SessionError};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A date bound is malformed.
    #[error(transparent)]
    Dates(#[from] DateRangeError),

    /// Login or download failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unpacking could not write its output.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A work directory could not be prepared.
    #[error("cannot prepare work directory {path}: {source}")]
    WorkDir {
        /// The directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A document failed in strict mode.
    #[error("failed to extract {path}: {source}")]
    Document {
        /// The document path.
        path: PathBuf,
        /// What went wrong.
        #[source]
        source: ExtractError,
    },
}

/// Counters describing one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Days in the requested range.
    pub dates: usize,
    /// Bundles written to disk.
    pub bundles_saved: usize,
    /// Bundles the portal answered 404 for.
    pub bundles_not_found: usize,
    /// Bundles skipped on another non-auth status.
    pub bundles_skipped: usize,
    /// Saved bundles that were not readable archives.
    pub corrupt_archives: usize,
    /// XML documents found in the bundles.
    pub documents: usize,
    /// Records built.
    pub records: usize,
    /// Documents that could not be turned into records.
    pub failed_documents: usize,
}

/// Records plus the run report.
#[derive(Debug)]
pub struct Extraction {
    /// Records in date, section, archive-entry order.
    pub records: Vec<Record>,
    /// Run counters.
    pub report: ExtractionReport,
}

/// Removes the files a run wrote into the work directories when dropped.
///
/// Only tracked files go, plus any directory under a work root left empty by
/// their removal. The work roots themselves stay.
struct WorkDirs {
    download: PathBuf,
    unzip: PathBuf,
    produced: Vec<PathBuf>,
    produced_dirs: Vec<PathBuf>,
}

impl WorkDirs {
    fn create(download: &Path, unzip: &Path) -> Result<Self, PipelineError> {
        for dir in [download, unzip] {
            fs::create_dir_all(dir).map_err(|source| PipelineError::WorkDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            download: download.to_path_buf(),
            unzip: unzip.to_path_buf(),
            produced: Vec::new(),
            produced_dirs: Vec::new(),
        })
    }

    fn track(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.produced.extend(paths);
    }

    /// Directories removed after the files, if nothing else landed in them.
    fn track_dirs(&mut self, dirs: impl IntoIterator<Item = PathBuf>) {
        self.produced_dirs.extend(dirs);
    }

    /// The deepest work root holding `path`; the roots may nest.
    fn root_of(&self, path: &Path) -> Option<&Path> {
        [&self.download, &self.unzip]
            .into_iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }
}

impl Drop for WorkDirs {
    fn drop(&mut self) {
        let produced = std::mem::take(&mut self.produced);
        for path in &produced {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(path = %path.display(), %error, "cannot remove work file");
                    continue;
                }
            }
            if let Some(root) = self.root_of(path) {
                prune_empty_parents(path, root);
            }
        }
        for dir in &self.produced_dirs {
            if dir.is_dir() {
                let _ = fs::remove_dir(dir);
            }
        }
        debug!(files = produced.len(), "work files removed");
    }
}

/// Removes the now-empty directories between `path` and `root`, innermost
/// first. Stops at the first directory that is not empty.
fn prune_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) || fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Runs extractions against INLabs.
#[derive(Debug)]
pub struct DouExtractor {
    config: Config,
    credentials: Credentials,
    strict: bool,
    show_progress: bool,
    login_retry: Option<RetryPolicy>,
}

impl DouExtractor {
    /// Creates an extractor; lenient, no progress bar.
    #[must_use]
    pub fn new(config: Config, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            strict: false,
            show_progress: false,
            login_retry: None,
        }
    }

    /// Abort on the first document that cannot be extracted.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Show a progress bar while records are built.
    #[must_use]
    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Overrides the login retry policy derived from the config.
    #[must_use]
    pub fn with_login_retry(mut self, policy: RetryPolicy) -> Self {
        self.login_retry = Some(policy);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extracts every act published between `start` and `end` (inclusive,
    /// either order) in `sections`, or the configured sections when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on malformed dates, login/download failures,
    /// unwritable work directories, and (in strict mode) the first document
    /// failure.
    #[instrument(skip(self, start, end, sections), fields(strict = self.strict))]
    pub async fn extract<'a, 'b>(
        &self,
        start: impl Into<DateBound<'a>>,
        end: impl Into<DateBound<'b>>,
        sections: Option<&SectionList>,
    ) -> Result<Extraction, PipelineError> {
        let mut workdirs = WorkDirs::create(&self.config.download_dir, &self.config.unzip_dir)?;

        let format = self.config.date_format.as_str();
        let start: DateBound<'_> = start.into();
        let end: DateBound<'_> = end.into();
        let dates = days_between(start.resolve(format)?, end.resolve(format)?);
        let sections = sections.unwrap_or(&self.config.sections);
        let mut report = ExtractionReport {
            dates: dates.len(),
            ..ExtractionReport::default()
        };
        info!(
            dates = dates.len(),
            sections = sections.len(),
            "starting extraction"
        );

        let mut session = ArchiveSession::new(&self.config, self.credentials.clone())?;
        if let Some(policy) = &self.login_retry {
            session = session.with_retry_policy(policy.clone());
        }
        session.login().await?;

        let mut bundles = Vec::new();
        for date in &dates {
            let outcomes = session
                .download(*date, sections, &workdirs.download)
                .await?;
            for outcome in outcomes {
                match outcome {
                    BundleOutcome::Saved(bundle) => {
                        report.bundles_saved += 1;
                        workdirs.track([bundle.path.clone()]);
                        bundles.push(bundle);
                    }
                    BundleOutcome::NotFound { .. } => report.bundles_not_found += 1,
                    BundleOutcome::Skipped { .. } => report.bundles_skipped += 1,
                }
            }
        }

        let unpacked = unpack_bundles(&bundles, &workdirs.unzip)?;
        workdirs.track(unpacked.files.iter().cloned());
        workdirs.track_dirs(unpacked.dirs.iter().cloned());
        report.corrupt_archives = unpacked.corrupt.len();
        let documents = xml_documents(&unpacked.files);
        report.documents = documents.len();

        let records = self.build_records(&documents, &mut report)?;
        report.records = records.len();

        info!(
            records = report.records,
            failed = report.failed_documents,
            not_found = report.bundles_not_found,
            "extraction complete"
        );
        drop(workdirs);
        Ok(Extraction { records, report })
    }

    fn build_records(
        &self,
        documents: &[PathBuf],
        report: &mut ExtractionReport,
    ) -> Result<Vec<Record>, PipelineError> {
        let progress = self.progress_bar(documents.len());
        let mut records = Vec::with_capacity(documents.len());

        for path in documents {
            progress.inc(1);
            match extract_record(path) {
                Ok(record) => {
                    debug!(act_id = record.act_id(), path = %path.display(), "record extracted");
                    records.push(record);
                }
                Err(source) if self.strict => {
                    progress.abandon();
                    return Err(PipelineError::Document {
                        path: path.clone(),
                        source,
                    });
                }
                Err(error) => {
                    report.failed_documents += 1;
                    warn!(path = %path.display(), %error, "skipping document");
                }
            }
        }

        progress.finish_and_clear();
        Ok(records)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} documents")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    }
}
