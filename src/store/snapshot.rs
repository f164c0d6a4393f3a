//! File-backed snapshot store.
//!
//! Two JSON documents per project, named after the project token:
//! `<token>-details.json` for the project metadata and
//! `<token>-translation-keys.json` for the key index. Every write goes to a
//! temporary file in the same directory and is renamed over the target, so a
//! reader sees either the old document or the new one. A full snapshot is
//! staged in two temporary files before either is renamed into place.

use std::fs;
use std::io::{
    BufWriter,
    ErrorKind,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::types::{
    ProjectSnapshot,
    TranslationKeyRecord,
};

/// Failure reading or writing a snapshot document.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File system error, including a failed rename of the staged file.
    #[error("Snapshot I/O failed for {path:?}: {source}")]
    Io {
        /// File or directory the operation touched.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document exists but does not parse.
    #[error("Snapshot {path:?} is not valid JSON: {source}")]
    Corrupt {
        /// Offending document.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The value could not be encoded.
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// [`StoreError::Io`] for `path`.
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Snapshot files of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    /// Cache directory, created on first write.
    dir: PathBuf,
    /// Encoded project token shared by both file names.
    file_stem: String,
}

impl SnapshotStore {
    /// Store for `project_token` under `dir`. Nothing is touched on disk.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, project_token: &str) -> Self {
        Self { dir: dir.into(), file_stem: file_stem(project_token) }
    }

    /// Location of the project document.
    #[must_use]
    pub fn project_path(&self) -> PathBuf {
        self.dir.join(format!("{}-details.json", self.file_stem))
    }

    /// Location of the key index document.
    #[must_use]
    pub fn keys_path(&self) -> PathBuf {
        self.dir.join(format!("{}-translation-keys.json", self.file_stem))
    }

    /// Last stored project snapshot, `None` if nothing was stored yet.
    pub fn read_project(&self) -> Result<Option<ProjectSnapshot>, StoreError> {
        read_json(&self.project_path())
    }

    /// Atomically replaces the project document.
    pub fn write_project(&self, project: &ProjectSnapshot) -> Result<(), StoreError> {
        let staged = stage_json(&self.dir, project)?;
        persist(staged, &self.project_path())
    }

    /// Last stored key index, empty if nothing was stored yet.
    pub fn read_keys(&self) -> Result<Vec<TranslationKeyRecord>, StoreError> {
        Ok(read_json(&self.keys_path())?.unwrap_or_default())
    }

    /// Atomically replaces the key index document.
    pub fn write_keys(&self, keys: &[TranslationKeyRecord]) -> Result<(), StoreError> {
        let staged = stage_json(&self.dir, keys)?;
        persist(staged, &self.keys_path())
    }

    /// Replaces both documents.
    ///
    /// Both values are serialized and flushed to temporary files first, so an
    /// encoding or disk-full error leaves both old documents in place. The key
    /// index is renamed first; if that rename fails the project document is
    /// left untouched too.
    pub fn write_snapshot(
        &self,
        project: &ProjectSnapshot,
        keys: &[TranslationKeyRecord],
    ) -> Result<(), StoreError> {
        let staged_keys = stage_json(&self.dir, keys)?;
        let staged_project = stage_json(&self.dir, project)?;
        persist(staged_keys, &self.keys_path())?;
        persist(staged_project, &self.project_path())
    }

    /// Deletes both documents. Missing files are not an error.
    pub fn purge(&self) -> Result<(), StoreError> {
        for path in [self.keys_path(), self.project_path()] {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Deleted snapshot"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Ok(())
    }
}

/// Percent-encodes the token so distinct tokens never share a file and no
/// token can name a path outside the cache directory.
fn file_stem(project_token: &str) -> String {
    urlencoding::encode(project_token).into_owned()
}

/// Parses `path`, `None` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Corrupt { path: path.to_path_buf(), source })
}

/// Writes `value` to a synced temporary file in `dir`.
///
/// The file is deleted when dropped unless [`persist`] renames it.
fn stage_json<T: Serialize + ?Sized>(dir: &Path, value: &T) -> Result<NamedTempFile, StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(|e| StoreError::io(temp.path(), e))?;
    }
    temp.as_file().sync_all().map_err(|e| StoreError::io(temp.path(), e))?;
    Ok(temp)
}

/// Renames a staged file over `path`.
fn persist(staged: NamedTempFile, path: &Path) -> Result<(), StoreError> {
    staged.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    tracing::debug!(path = %path.display(), "Wrote snapshot");
    Ok(())
}
