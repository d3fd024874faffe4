//! Content-addressed cache of derived artifacts.
//!
//! Executing a code snippet in the remote sandbox and registering a
//! shareable snippet are the most expensive parts of a build, so their
//! results are cached durably, keyed by a hash of the inputs that produced
//! them ([`content_hash`]).
//!
//! The cache is an append-only log of self-describing records (see
//! [`Record`]) replayed fully into an in-memory index at load time. Reads
//! are served from memory; every write appends to the log first and only
//! then updates the index, so the two can never drift. Writes are
//! serialized — renderers run in parallel across documents and share one
//! cache.
//!
//! A `put` for a key that already holds a *different* value is rejected
//! with [`CacheError::Conflict`]: the key is a pure function of the cached
//! inputs, so a differing value means a broken invariant somewhere, not
//! data to be overwritten.

mod record;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

pub use record::Record;

/// Error from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// I/O error reading or appending the log.
    #[error("cache I/O error")]
    Io(#[from] std::io::Error),

    /// The log contains a record that cannot be decoded.
    #[error("malformed cache record: {0}")]
    Malformed(String),

    /// The log contains a record kind this version does not know.
    #[error("unknown cache record kind: '{0}'")]
    UnknownKind(String),

    /// A `put` targeted an existing key with a different value.
    #[error("cache conflict for {kind} key '{key}'")]
    Conflict {
        kind: RecordKind,
        key: String,
    },
}

/// Kinds of derived artifacts the cache stores.
///
/// Each kind populates its own in-memory map on load. Adding a kind means
/// adding a map and a replay arm; an unknown kind in an existing log is a
/// load error, not something to skip silently.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RecordKind {
    /// Captured output of executing a snippet.
    RunOutput,
    /// Shareable snippet id from the playground service.
    SnippetId,
}

impl RecordKind {
    /// Kind tag as written to the log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunOutput => "runoutput",
            Self::SnippetId => "snippetid",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "runoutput" => Some(Self::RunOutput),
            "snippetid" => Some(Self::SnippetId),
            _ => None,
        }
    }

    /// Name of the payload field in the log record.
    fn value_field(self) -> &'static str {
        match self {
            Self::RunOutput => "Output",
            Self::SnippetId => "SnippetId",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name carrying the content hash in every record.
const FIELD_HASH: &str = "Hash";

#[derive(Debug)]
struct Index {
    run_output: HashMap<String, String>,
    snippet_id: HashMap<String, String>,
}

impl Index {
    fn map(&self, kind: RecordKind) -> &HashMap<String, String> {
        match kind {
            RecordKind::RunOutput => &self.run_output,
            RecordKind::SnippetId => &self.snippet_id,
        }
    }

    fn map_mut(&mut self, kind: RecordKind) -> &mut HashMap<String, String> {
        match kind {
            RecordKind::RunOutput => &mut self.run_output,
            RecordKind::SnippetId => &mut self.snippet_id,
        }
    }
}

/// Durable content-addressed cache backed by an append-only log.
#[derive(Debug)]
pub struct ContentCache {
    path: PathBuf,
    index: Mutex<Index>,
}

impl ContentCache {
    /// Load the cache by replaying the log at `path` top-to-bottom.
    ///
    /// A missing log file is an empty cache; its parent directory must
    /// exist. A record that cannot be decoded, or whose kind is unknown,
    /// fails the load — a corrupt cache must not be silently truncated.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            // surface a missing cache directory as the I/O error it is
            std::fs::metadata(dir)?;
        }

        let mut index = Index {
            run_output: HashMap::new(),
            snippet_id: HashMap::new(),
        };

        match File::open(&path) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                let mut n_records = 0usize;
                while let Some(rec) = Record::read_from(&mut reader)? {
                    let kind = RecordKind::from_tag(&rec.kind)
                        .ok_or_else(|| CacheError::UnknownKind(rec.kind.clone()))?;
                    let hash = rec.get_required(FIELD_HASH)?.to_owned();
                    let value = rec
                        .get(kind.value_field())
                        .ok_or_else(|| {
                            CacheError::Malformed(format!(
                                "record '{}' is missing field '{}'",
                                rec.kind,
                                kind.value_field()
                            ))
                        })?
                        .to_owned();
                    // last record wins during replay; appends are validated,
                    // so duplicates in the log carry identical values
                    index.map_mut(kind).insert(hash, value);
                    n_records += 1;
                }
                tracing::debug!(path = %path.display(), records = n_records, "loaded cache log");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no cache log yet, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    /// Look up the cached value for `key` under `kind`.
    #[must_use]
    pub fn get(&self, kind: RecordKind, key: &str) -> Option<String> {
        self.index.lock().unwrap().map(kind).get(key).cloned()
    }

    /// Store `value` for `key` under `kind`.
    ///
    /// Re-submitting an identical value is a no-op. A different value for
    /// an existing key is rejected with [`CacheError::Conflict`] and
    /// logged. The log append happens before the index update; if the
    /// append fails the index is left untouched.
    pub fn put(&self, kind: RecordKind, key: &str, value: &str) -> Result<(), CacheError> {
        let mut index = self.index.lock().unwrap();
        match index.map(kind).get(key) {
            Some(existing) if existing == value => return Ok(()),
            Some(_) => {
                tracing::error!(%kind, key, "cache put conflicts with existing value");
                return Err(CacheError::Conflict {
                    kind,
                    key: key.to_owned(),
                });
            }
            None => {}
        }

        let rec = Record::new(kind.as_str())
            .field(FIELD_HASH, key)
            .field(kind.value_field(), value);
        self.append(&rec)?;
        index.map_mut(kind).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    /// Number of entries held for `kind`.
    #[must_use]
    pub fn len(&self, kind: RecordKind) -> usize {
        self.index.lock().unwrap().map(kind).len()
    }

    /// Whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let index = self.index.lock().unwrap();
        index.run_output.is_empty() && index.snippet_id.is_empty()
    }

    /// Path of the backing log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, rec: &Record) -> Result<(), CacheError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut w = BufWriter::new(file);
        rec.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }
}

/// Content hash of a snippet's executable inputs.
///
/// SHA-256 over `"{language}:{code}"`, hex-encoded. Display-only
/// differences (annotation lines, visible-region markers) are stripped
/// before hashing by the caller, so snippets that execute identically
/// share one cache entry.
#[must_use]
pub fn content_hash(language: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}
