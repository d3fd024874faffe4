//! On-disk persistence of fetched documents.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bf_model::{Document, DocumentId};

use crate::SyncError;

/// Stores one JSON file per document id in a flat directory.
///
/// Writes go through a temp file in the same directory followed by a
/// rename, so a crash mid-write never leaves a corrupt stored document.
/// The store is only written during sync; once sync completes, renderers
/// treat it as read-only.
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the file backing `id`.
    #[must_use]
    pub fn path_for(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Load a previously stored document.
    ///
    /// Returns `Ok(None)` when the document was never stored. A file that
    /// exists but fails to decode is [`SyncError::CorruptStore`] — the
    /// caller must not treat corruption as a cache miss and quietly
    /// re-fetch over it.
    pub fn load(&self, id: &DocumentId) -> Result<Option<Document>, SyncError> {
        let path = self.path_for(id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc = serde_json::from_slice(&data).map_err(|source| SyncError::CorruptStore {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(doc))
    }

    /// Persist a document atomically (temp file, then rename).
    pub fn store(&self, doc: &Document) -> Result<(), SyncError> {
        let data = serde_json::to_vec_pretty(doc).map_err(|source| SyncError::CorruptStore {
            path: self.path_for(&doc.id).display().to_string(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&data)?;
        tmp.persist(self.path_for(&doc.id))
            .map_err(|e| SyncError::Io(e.error))?;
        tracing::debug!(id = %doc.id, version = doc.version, "stored document");
        Ok(())
    }

    /// Load every document in the store.
    ///
    /// Files whose stem is not a valid document id are skipped — the
    /// directory may hold editor droppings or temp files.
    pub fn load_all(&self) -> Result<Vec<Document>, SyncError> {
        let mut docs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(id) = id_from_file_name(&path) else {
                continue;
            };
            if let Some(doc) = self.load(&id)? {
                docs.push(doc);
            }
        }
        tracing::debug!(count = docs.len(), dir = %self.dir.display(), "loaded stored documents");
        Ok(docs)
    }
}

/// Document id from a store file name (`{id}.json`), or `None` for files
/// that are not store entries.
fn id_from_file_name(path: &Path) -> Option<DocumentId> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}
