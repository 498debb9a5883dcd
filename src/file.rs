//! Uploaded files and their on-disk lifetime.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::shape::{self, Shape, ShapeExt};

/// Where an upload's bytes live.
#[derive(Clone, Debug, PartialEq)]
pub enum FileContent {
    Memory(Bytes),
    /// Spooled to disk; deleted once the handler has returned.
    Disk(PathBuf),
}

/// One file part of a multipart request, as handed to handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub mime_type: String,
    pub content: FileContent,
    pub size: Option<u64>,
}

impl UploadedFile {
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Disk(path) => Some(path),
            FileContent::Memory(_) => None,
        }
    }

    /// Reads the whole file, from memory or disk.
    pub async fn bytes(&self) -> std::io::Result<Bytes> {
        match &self.content {
            FileContent::Memory(bytes) => Ok(bytes.clone()),
            FileContent::Disk(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }

    /// The metadata view the per-file shape is checked against.
    pub(crate) fn describe(&self) -> Value {
        let mut v = json!({ "filename": self.filename, "mimetype": self.mime_type });
        if let (Some(size), Value::Object(map)) = (self.size, &mut v) {
            map.insert("size".to_owned(), Value::from(size));
        }
        v
    }
}

/// Declared limits for one file field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileField {
    pub min_count: usize,
    pub max_count: usize,
}

impl FileField {
    /// Zero up to `max_count` files.
    pub fn up_to(max_count: usize) -> Self {
        Self { min_count: 0, max_count }
    }

    /// At least one file is required.
    pub fn required(mut self) -> Self {
        self.min_count = self.min_count.max(1);
        self
    }

    pub(crate) fn shape(&self) -> Shape {
        shape::array(file_shape()).min(self.min_count).max(self.max_count).into()
    }
}

/// Every upload must carry a name and a MIME type; a known size must be positive.
pub fn file_shape() -> Shape {
    shape::object()
        .field("filename", shape::string().min(1))
        .field("mimetype", shape::string().min(1))
        .field("size", shape::number().int().positive().optional())
        .into()
}

// ── Temp file ownership ──────────────────────────────────────────────────────

/// Owns the disk-backed uploads of one request.
///
/// [`TempFiles::remove_all`] deletes them on the normal path. If the owner is
/// dropped first (a middleware short-circuits, the handler panics, the
/// connection goes away) `Drop` schedules the deletion instead.
#[derive(Debug, Default)]
pub(crate) struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub(crate) fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub(crate) async fn remove_all(mut self) {
        for path in std::mem::take(&mut self.paths) {
            remove(&path).await;
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        if self.paths.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.paths);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for path in paths {
                        remove(&path).await;
                    }
                });
            }
            Err(_) => {
                for path in paths {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), "failed to remove upload: {e}");
                    }
                }
            }
        }
    }
}

async fn remove(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "failed to remove upload: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::validate::validate;

    fn memory_file(filename: &str, mime: &str) -> UploadedFile {
        UploadedFile {
            field: "avatar".into(),
            filename: filename.into(),
            mime_type: mime.into(),
            content: FileContent::Memory(Bytes::from_static(b"png")),
            size: Some(3),
        }
    }

    #[test]
    fn describes_metadata_for_validation() {
        let f = memory_file("a.png", "image/png");
        assert_eq!(f.describe(), json!({"filename": "a.png", "mimetype": "image/png", "size": 3}));
        assert!(validate(&file_shape(), &f.describe()).is_ok());
        assert!(validate(&file_shape(), &memory_file("", "image/png").describe()).is_err());
    }

    #[test]
    fn field_limits() {
        let one = FileField::up_to(1);
        let f = memory_file("a.png", "image/png").describe();
        assert!(validate(&one.shape(), &json!([])).is_ok());
        assert!(validate(&one.shape(), &json!([f.clone()])).is_ok());
        assert!(validate(&one.shape(), &json!([f.clone(), f])).is_err());
        assert!(validate(&one.required().shape(), &json!([])).is_err());
    }

    #[tokio::test]
    async fn remove_all_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, b"x").unwrap();

        let mut temp = TempFiles::default();
        temp.push(path.clone());
        temp.remove_all().await;
        assert!(!path.exists());
    }

    #[test]
    fn drop_outside_runtime_deletes_synchronously() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, b"x").unwrap();

        let mut temp = TempFiles::default();
        temp.push(path.clone());
        drop(temp);
        assert!(!path.exists());
    }
}
