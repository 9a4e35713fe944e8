//! Local JSON file sink.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::document::Document;
use crate::error::PersistError;

const EXTENSION: &str = "json";

/// Writes documents as pretty JSON files.
///
/// Writes go to a uniquely named temporary file in the target directory, are
/// fsynced, then renamed over the target, so readers never observe a partial
/// file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl FileSink {
    /// A file sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Final file path for `path`: `.json` is appended unless already present.
    #[must_use]
    pub fn resolve_path(path: &Path) -> PathBuf {
        if path.extension().is_some_and(|e| e == EXTENSION) {
            return path.to_path_buf();
        }
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(".");
        name.push(EXTENSION);
        PathBuf::from(name)
    }

    /// Serialize `document` to `<path>.json`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when the document is
    /// empty, otherwise the path written.
    ///
    /// # Errors
    /// `Serialization` if the document cannot be encoded, `FileWrite` on any
    /// I/O failure. The temporary file is removed on failure.
    pub fn save(&self, document: &Document, path: &Path) -> Result<Option<PathBuf>, PersistError> {
        if document.is_empty() {
            return Ok(None);
        }

        let target = Self::resolve_path(path);
        let mut text = document.to_pretty_string()?;
        text.push('\n');

        let write_err = |source| PersistError::FileWrite {
            path: target.clone(),
            source,
        };

        let mut temp = TempFile::create(&target).map_err(write_err)?;
        temp.write_all(text.as_bytes()).map_err(write_err)?;
        temp.commit(&target).map_err(write_err)?;

        debug!(path = %target.display(), bytes = text.len(), "journal file written");
        Ok(Some(target))
    }

    /// Read a document previously written by [`FileSink::save`].
    ///
    /// `path` is resolved the same way as for `save`.
    pub fn load(&self, path: &Path) -> Result<Document, PersistError> {
        let target = Self::resolve_path(path);
        let text = fs::read_to_string(&target).map_err(|source| PersistError::FileRead {
            path: target.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Temporary sibling of the target; deleted on drop unless committed.
struct TempFile {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl TempFile {
    fn create(target: &Path) -> std::io::Result<Self> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = dir.join(format!(".{base}.tmp.{}", Uuid::new_v4()));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self {
            path: Some(path),
            writer: Some(BufWriter::new(file)),
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(consumed)?;
        writer.write_all(bytes)
    }

    /// Flush, fsync and atomically rename onto `target`.
    fn commit(mut self, target: &Path) -> std::io::Result<()> {
        let mut writer = self.writer.take().ok_or_else(consumed)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        let path = self.path.take().ok_or_else(consumed)?;
        if let Err(err) = fs::rename(&path, target) {
            let _ = fs::remove_file(&path);
            return Err(err);
        }
        Ok(())
    }
}

fn consumed() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "temporary file already consumed")
}

impl Drop for TempFile {
    fn drop(&mut self) {
        self.writer.take();
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_value(json!({"mesh": {"n": 100}, "solver": {"iters": 12}})).unwrap()
    }

    #[test]
    fn test_resolve_path_appends_extension() {
        assert_eq!(FileSink::resolve_path(Path::new("run1")), PathBuf::from("run1.json"));
        assert_eq!(FileSink::resolve_path(Path::new("a/run.v2")), PathBuf::from("a/run.v2.json"));
        assert_eq!(FileSink::resolve_path(Path::new("x.json")), PathBuf::from("x.json"));
    }

    #[test]
    fn test_empty_document_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        assert!(FileSink::new().save(&Document::new(), &path).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run1");
        let written = FileSink::new().save(&sample(), &path).unwrap().unwrap();
        assert_eq!(written, dir.path().join("run1.json"));

        let loaded = FileSink::new().load(&path).unwrap();
        assert_eq!(loaded, sample());

        // Only the final file remains.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_floats_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floats");
        let mut doc = Document::new();
        doc.put("solver.residual", 1.071_566_039_146_582_6e-75);
        doc.put("solver.tolerance", 0.1 + 0.2);
        doc.put("solver.huge", f64::MAX);
        FileSink::new().save(&doc, &path).unwrap();
        assert_eq!(FileSink::new().load(&path).unwrap(), doc);
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run");
        FileSink::new().save(&sample(), &path).unwrap();

        let mut other = Document::new();
        other.put("only", true);
        FileSink::new().save(&other, &path).unwrap();
        assert_eq!(FileSink::new().load(&path).unwrap(), other);
    }

    #[test]
    fn test_output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileSink::new().save(&sample(), &dir.path().join("a")).unwrap().unwrap();
        let b = FileSink::new().save(&sample(), &dir.path().join("b")).unwrap().unwrap();
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }

    #[test]
    fn test_missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/run");
        let err = FileSink::new().save(&sample(), &path).unwrap_err();
        assert!(matches!(err, PersistError::FileWrite { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSink::new().load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, PersistError::FileRead { .. }));
    }
}
