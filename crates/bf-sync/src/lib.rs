//! Incremental synchronization of a remote document tree.
//!
//! The pipeline's first phase: walk a document tree breadth-first from a
//! root id and end up with a local, current copy of every reachable
//! document while fetching as little as possible.
//!
//! Components:
//!
//! - [`DocumentStore`]: one JSON file per document id, written atomically,
//!   carrying the version used for staleness checks
//! - [`DocumentService`]: the remote service seam — full-content fetch
//!   plus an order-preserving batched version query
//! - [`SyncEngine`]: the walk itself — version-check first, fetch only
//!   documents whose remote version moved past the stored one
//!
//! The two-phase protocol (batch-query versions, then selectively fetch)
//! is a design invariant, not an optimization detail: a no-change sync
//! must perform zero content fetches.

mod engine;
mod service;
mod store;

pub use engine::{SyncEngine, SyncOptions, SyncResult, SyncStats};
pub use service::{DocumentService, HttpDocumentService, ServiceError};
pub use store::DocumentStore;

use bf_model::DocumentId;

/// Error from the sync phase.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// I/O error in the document store.
    #[error("document store I/O error")]
    Io(#[from] std::io::Error),

    /// A stored document failed to decode. The store is corrupt; this is
    /// never skipped over.
    #[error("stored document is corrupt: {path}")]
    CorruptStore {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A version-query batch failed; no partial degradation.
    #[error("version query failed")]
    VersionQuery(#[source] ServiceError),

    /// Version query returned the wrong number of results.
    #[error("version query returned {got} results for {want} ids")]
    VersionCountMismatch { want: usize, got: usize },

    /// A document could not be fetched even after retries.
    #[error("failed to fetch document {id} after {attempts} attempts")]
    FetchFailed {
        id: DocumentId,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    /// Offline sync needed a document the store does not have.
    #[error("document {0} is not in the store and downloads are disabled")]
    NotInStore(DocumentId),
}
