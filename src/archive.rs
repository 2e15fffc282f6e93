//! Unpacking downloaded bundles.
//!
//! Each bundle is a ZIP of XML envelopes (plus the occasional image), unpacked
//! into its own `{YYYY-MM-DD}-{section}` directory so entries of different
//! bundles never collide. A bundle that cannot be opened or read is logged and
//! skipped; a failure to write into the destination directory aborts.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument, warn};
use zip::ZipArchive;

use crate::session::Bundle;

/// Errors that abort unpacking.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The destination could not be written.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// What unpacking a batch of bundles produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnpackReport {
    /// Every extracted file, in bundle then archive order.
    pub files: Vec<PathBuf>,
    /// Per-bundle directories, in bundle order.
    pub dirs: Vec<PathBuf>,
    /// Bundles skipped because they are not readable archives.
    pub corrupt: Vec<PathBuf>,
}

/// Unpacks every bundle into `dest/{bundle stem}/`.
///
/// Entries overwrite files of the same name, so unpacking twice is harmless.
/// Entries whose names would escape the bundle directory are ignored.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] when `dest` or an extracted file cannot be
/// written.
#[instrument(skip(bundles), fields(bundles = bundles.len(), dest = %dest.display()))]
pub fn unpack_bundles(bundles: &[Bundle], dest: &Path) -> Result<UnpackReport, ArchiveError> {
    fs::create_dir_all(dest).map_err(|e| ArchiveError::io(dest, e))?;

    let mut report = UnpackReport::default();
    for bundle in bundles {
        let bundle_dir = dest.join(bundle.stem());
        match unpack_one(&bundle.path, &bundle_dir)? {
            Some(files) => {
                info!(
                    bundle = %bundle.path.display(),
                    dir = %bundle_dir.display(),
                    files = files.len(),
                    "bundle unpacked"
                );
                report.files.extend(files);
                report.dirs.push(bundle_dir);
            }
            None => report.corrupt.push(bundle.path.clone()),
        }
    }

    info!(
        files = report.files.len(),
        corrupt = report.corrupt.len(),
        "unpacking complete"
    );
    Ok(report)
}

/// Unpacks one archive; `Ok(None)` means it was corrupt and skipped.
fn unpack_one(archive_path: &Path, dest: &Path) -> Result<Option<Vec<PathBuf>>, ArchiveError> {
    let file = match fs::File::open(archive_path) {
        Ok(file) => file,
        Err(error) => {
            warn!(bundle = %archive_path.display(), %error, "cannot open bundle, skipping");
            return Ok(None);
        }
    };
    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(error) => {
            warn!(bundle = %archive_path.display(), %error, "corrupt bundle, skipping");
            return Ok(None);
        }
    };

    // Read everything first so a bad entry leaves nothing half-extracted.
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(bundle = %archive_path.display(), index, %error, "corrupt bundle entry, skipping bundle");
                return Ok(None);
            }
        };
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!(bundle = %archive_path.display(), name = entry.name(), "unsafe entry name, ignoring");
            continue;
        };
        let mut contents = Vec::new();
        if let Err(error) = entry.read_to_end(&mut contents) {
            warn!(bundle = %archive_path.display(), index, %error, "corrupt bundle entry, skipping bundle");
            return Ok(None);
        }
        entries.push((dest.join(relative), contents));
    }

    fs::create_dir_all(dest).map_err(|e| ArchiveError::io(dest, e))?;
    let mut files = Vec::with_capacity(entries.len());
    for (path, contents) in entries {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| ArchiveError::io(&path, e))?;
        files.push(path);
    }
    Ok(Some(files))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    fn bundle(path: PathBuf, section: &str) -> Bundle {
        Bundle {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            section: section.to_string(),
            path,
        }
    }

    #[test]
    fn test_unpack_lists_files_in_order() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("2024-01-02-DO1.zip");
        let second = temp.path().join("2024-01-02-DO2.zip");
        write_zip(&first, &[("a.xml", b"<a/>"), ("b.xml", b"<b/>")]);
        write_zip(&second, &[("c.xml", b"<c/>")]);
        let dest = temp.path().join("unzip");

        let report = unpack_bundles(&[bundle(first, "DO1"), bundle(second, "DO2")], &dest).unwrap();

        assert_eq!(
            report.files,
            vec![
                dest.join("2024-01-02-DO1/a.xml"),
                dest.join("2024-01-02-DO1/b.xml"),
                dest.join("2024-01-02-DO2/c.xml"),
            ]
        );
        assert_eq!(
            report.dirs,
            vec![dest.join("2024-01-02-DO1"), dest.join("2024-01-02-DO2")]
        );
        assert!(report.corrupt.is_empty());
        assert_eq!(fs::read(dest.join("2024-01-02-DO2/c.xml")).unwrap(), b"<c/>");
    }

    #[test]
    fn test_same_entry_name_in_two_bundles_kept_apart() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("2024-01-02-DO1.zip");
        let second = temp.path().join("2024-01-02-DO1E.zip");
        write_zip(&first, &[("act.xml", b"<first/>")]);
        write_zip(&second, &[("act.xml", b"<second/>")]);
        let dest = temp.path().join("unzip");

        let report =
            unpack_bundles(&[bundle(first, "DO1"), bundle(second, "DO1E")], &dest).unwrap();

        assert_eq!(report.files.len(), 2);
        assert_ne!(report.files[0], report.files[1]);
        let contents: Vec<Vec<u8>> = report
            .files
            .iter()
            .map(|path| fs::read(path).unwrap())
            .collect();
        assert_eq!(contents, vec![b"<first/>".to_vec(), b"<second/>".to_vec()]);
    }

    #[test]
    fn test_corrupt_bundle_is_skipped() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good.zip");
        let bad = temp.path().join("bad.zip");
        write_zip(&good, &[("a.xml", b"<a/>")]);
        fs::write(&bad, b"<html>login</html>").unwrap();
        let dest = temp.path().join("unzip");

        let report = unpack_bundles(
            &[bundle(bad.clone(), "DO1"), bundle(good, "DO2")],
            &dest,
        )
        .unwrap();

        assert_eq!(report.files, vec![dest.join("2024-01-02-DO2/a.xml")]);
        assert_eq!(report.dirs, vec![dest.join("2024-01-02-DO2")]);
        assert_eq!(report.corrupt, vec![bad]);
        assert!(!dest.join("2024-01-02-DO1").exists());
    }

    #[test]
    fn test_missing_bundle_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone.zip");
        let report = unpack_bundles(&[bundle(missing.clone(), "DO1")], temp.path()).unwrap();
        assert!(report.files.is_empty());
        assert_eq!(report.corrupt, vec![missing]);
    }

    #[test]
    fn test_unpack_twice_overwrites() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("2024-01-02-DO3.zip");
        write_zip(&archive, &[("a.xml", b"<new/>")]);
        let dest = temp.path().join("unzip");
        fs::create_dir_all(dest.join("2024-01-02-DO3")).unwrap();
        fs::write(dest.join("2024-01-02-DO3/a.xml"), b"<old/>").unwrap();

        let bundles = [bundle(archive, "DO3")];
        let first = unpack_bundles(&bundles, &dest).unwrap();
        let second = unpack_bundles(&bundles, &dest).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(dest.join("2024-01-02-DO3/a.xml")).unwrap(), b"<new/>");
    }

    #[test]
    fn test_nested_entries_create_directories() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("nested.zip");
        write_zip(&archive, &[("sub/dir/a.xml", b"<a/>")]);
        let dest = temp.path().join("unzip");

        let report = unpack_bundles(&[bundle(archive, "DO1")], &dest).unwrap();

        let expected = dest.join("2024-01-02-DO1/sub/dir/a.xml");
        assert_eq!(report.files, vec![expected.clone()]);
        assert!(expected.is_file());
    }

    #[test]
    fn test_escaping_entry_is_ignored() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("../evil.xml", b"<x/>"), ("ok.xml", b"<ok/>")]);
        let dest = temp.path().join("unzip");

        let report = unpack_bundles(&[bundle(archive, "DO1")], &dest).unwrap();

        assert_eq!(report.files, vec![dest.join("2024-01-02-DO1/ok.xml")]);
        assert!(!dest.join("evil.xml").exists());
        assert!(!temp.path().join("evil.xml").exists());
    }

    #[test]
    fn test_empty_batch() {
        let temp = TempDir::new().unwrap();
        let report = unpack_bundles(&[], temp.path()).unwrap();
        assert_eq!(report, UnpackReport::default());
    }
}
