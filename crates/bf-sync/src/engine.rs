//! The sync walk.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use bf_model::{Document, DocumentId};

use crate::service::{DocumentService, ServiceError};
use crate::store::DocumentStore;
use crate::SyncError;

/// Knobs for [`SyncEngine`].
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Maximum ids per version-query call (service limit).
    pub batch_size: usize,
    /// Attempts per document fetch before giving up.
    pub fetch_attempts: u32,
    /// Pause between fetch attempts.
    pub retry_pause: Duration,
    /// Offline mode: reuse whatever the store has, never touch the
    /// network. A document missing from the store fails the sync.
    pub no_download: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 256,
            fetch_attempts: 3,
            retry_pause: Duration::from_secs(3),
            no_download: false,
        }
    }
}

/// Counters for one sync run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncStats {
    /// Documents reused from the store (stored version was current).
    pub from_store: usize,
    /// Documents fetched from the service.
    pub downloaded: usize,
    /// Version-query calls issued.
    pub version_batches: usize,
}

/// Result of syncing one root: every reachable document, keyed by id.
#[derive(Debug)]
pub struct SyncResult {
    pub documents: BTreeMap<DocumentId, Document>,
    pub stats: SyncStats,
}

/// Walks a document tree and brings the store up to date.
///
/// The walk is breadth-first with a visited set, so a document referenced
/// by several parents (the source is a DAG, not strictly a tree) is
/// processed at most once. Each wave of newly discovered ids is
/// version-checked in batches before anything is fetched.
pub struct SyncEngine<'a> {
    service: &'a dyn DocumentService,
    store: &'a DocumentStore,
    options: SyncOptions,
}

impl<'a> SyncEngine<'a> {
    #[must_use]
    pub fn new(service: &'a dyn DocumentService, store: &'a DocumentStore) -> Self {
        Self::with_options(service, store, SyncOptions::default())
    }

    #[must_use]
    pub fn with_options(
        service: &'a dyn DocumentService,
        store: &'a DocumentStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            service,
            store,
            options,
        }
    }

    /// Sync the tree rooted at `root`.
    ///
    /// A document that cannot be fetched fails the whole sync — a missing
    /// document breaks tree structure, so it is surfaced to the caller
    /// rather than silently skipped.
    pub fn sync(&self, root: &DocumentId) -> Result<SyncResult, SyncError> {
        let mut documents = BTreeMap::new();
        let mut stats = SyncStats::default();
        let mut visited: HashSet<DocumentId> = HashSet::new();
        let mut queue: VecDeque<DocumentId> = VecDeque::from([root.clone()]);

        while !queue.is_empty() {
            // take the current wave, deduplicated against everything seen
            let mut wave = Vec::new();
            while let Some(id) = queue.pop_front() {
                if visited.insert(id.clone()) {
                    wave.push(id);
                }
            }
            if wave.is_empty() {
                continue;
            }

            let stored: Vec<Option<Document>> = wave
                .iter()
                .map(|id| self.store.load(id))
                .collect::<Result<_, _>>()?;

            let remote_versions = if self.options.no_download {
                // offline: pretend nothing moved
                vec![0; wave.len()]
            } else {
                self.query_versions_batched(&wave, &mut stats)?
            };

            for ((id, stored), remote_version) in
                wave.iter().zip(stored).zip(remote_versions)
            {
                let doc = match stored {
                    Some(doc) if doc.version >= remote_version => {
                        tracing::debug!(%id, version = doc.version, "stored copy is current");
                        stats.from_store += 1;
                        doc
                    }
                    stored => {
                        if self.options.no_download {
                            debug_assert!(stored.is_none());
                            return Err(SyncError::NotInStore(id.clone()));
                        }
                        let doc = self.fetch_with_retry(id)?;
                        self.store.store(&doc)?;
                        stats.downloaded += 1;
                        doc
                    }
                };
                queue.extend(doc.sub_document_ids());
                documents.insert(id.clone(), doc);
            }
        }

        tracing::info!(
            total = documents.len(),
            from_store = stats.from_store,
            downloaded = stats.downloaded,
            "sync complete"
        );
        Ok(SyncResult { documents, stats })
    }

    /// Version-query `ids` in service-sized batches.
    ///
    /// The result is positional, so each batch's length is verified
    /// against its input; a mismatch is a hard error, and a batch failure
    /// propagates immediately (no partial degradation).
    fn query_versions_batched(
        &self,
        ids: &[DocumentId],
        stats: &mut SyncStats,
    ) -> Result<Vec<i64>, SyncError> {
        let mut versions = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.options.batch_size.max(1)) {
            let got = self
                .service
                .query_versions(batch)
                .map_err(SyncError::VersionQuery)?;
            stats.version_batches += 1;
            if got.len() != batch.len() {
                return Err(SyncError::VersionCountMismatch {
                    want: batch.len(),
                    got: got.len(),
                });
            }
            versions.extend(got);
        }
        Ok(versions)
    }

    /// Fetch one document, retrying transient failures a bounded number
    /// of times with a fixed pause.
    fn fetch_with_retry(&self, id: &DocumentId) -> Result<Document, SyncError> {
        let attempts = self.options.fetch_attempts.max(1);
        let mut last: Option<ServiceError> = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::warn!(%id, attempt, "retrying document fetch");
                std::thread::sleep(self.options.retry_pause);
            }
            match self.service.fetch_document(id) {
                Ok(doc) => return Ok(doc),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "document fetch failed");
                    last = Some(e);
                }
            }
        }
        Err(SyncError::FetchFailed {
            id: id.clone(),
            attempts,
            source: last.expect("at least one attempt"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_model::{BlockKind, BlockNode};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn id_of(n: u8) -> DocumentId {
        format!("{n:032x}").parse().unwrap()
    }

    fn doc_with_children(n: u8, version: i64, children: &[u8]) -> Document {
        let id = id_of(n);
        let mut root = BlockNode::new(id.as_str(), BlockKind::Text);
        for c in children {
            root.children.push(BlockNode::new(
                id_of(*c).as_str(),
                BlockKind::Page {
                    title: format!("child {c}"),
                },
            ));
        }
        Document {
            id,
            version,
            title: format!("doc {n}"),
            root,
        }
    }

    /// In-memory service that records traffic.
    #[derive(Default)]
    struct FakeService {
        docs: Vec<Document>,
        fetches: Mutex<Vec<DocumentId>>,
        batches: Mutex<Vec<usize>>,
        /// When set, `query_versions` returns a short result.
        truncate_versions: bool,
    }

    impl FakeService {
        fn with_docs(docs: Vec<Document>) -> Self {
            Self {
                docs,
                ..Self::default()
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    impl DocumentService for FakeService {
        fn fetch_document(&self, id: &DocumentId) -> Result<Document, ServiceError> {
            self.fetches.lock().unwrap().push(id.clone());
            self.docs
                .iter()
                .find(|d| d.id == *id)
                .cloned()
                .ok_or_else(|| ServiceError::Status {
                    status: 404,
                    body: "no such document".to_owned(),
                })
        }

        fn query_versions(&self, ids: &[DocumentId]) -> Result<Vec<i64>, ServiceError> {
            self.batches.lock().unwrap().push(ids.len());
            let mut versions: Vec<i64> = ids
                .iter()
                .map(|id| {
                    self.docs
                        .iter()
                        .find(|d| d.id == *id)
                        .map_or(0, |d| d.version)
                })
                .collect();
            if self.truncate_versions {
                versions.pop();
            }
            Ok(versions)
        }
    }

    fn options() -> SyncOptions {
        SyncOptions {
            retry_pause: Duration::ZERO,
            ..SyncOptions::default()
        }
    }

    fn engine<'a>(service: &'a FakeService, store: &'a DocumentStore) -> SyncEngine<'a> {
        SyncEngine::with_options(service, store, options())
    }

    #[test]
    fn test_first_sync_fetches_whole_tree() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2, 3]),
            doc_with_children(2, 1, &[]),
            doc_with_children(3, 1, &[]),
        ]);

        let result = engine(&service, &store).sync(&id_of(1)).unwrap();
        assert_eq!(result.documents.len(), 3);
        assert_eq!(result.stats.downloaded, 3);
        assert_eq!(result.stats.from_store, 0);
        // everything landed in the store
        assert!(store.load(&id_of(3)).unwrap().is_some());
    }

    #[test]
    fn test_second_sync_fetches_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2]),
            doc_with_children(2, 1, &[]),
        ]);

        engine(&service, &store).sync(&id_of(1)).unwrap();
        let fetched_before = service.fetch_count();

        let result = engine(&service, &store).sync(&id_of(1)).unwrap();
        // version queries ran, content fetches did not
        assert_eq!(service.fetch_count(), fetched_before);
        assert_eq!(result.stats.downloaded, 0);
        assert_eq!(result.stats.from_store, 2);
        assert!(result.stats.version_batches > 0);
    }

    #[test]
    fn test_bumped_version_refetches_only_that_document() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2]),
            doc_with_children(2, 1, &[]),
        ]);
        engine(&service, &store).sync(&id_of(1)).unwrap();

        // remote bumps document 2
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2]),
            doc_with_children(2, 4, &[]),
        ]);
        let result = engine(&service, &store).sync(&id_of(1)).unwrap();
        assert_eq!(result.stats.downloaded, 1);
        assert_eq!(result.stats.from_store, 1);
        assert_eq!(store.load(&id_of(2)).unwrap().unwrap().version, 4);
    }

    #[test]
    fn test_diamond_reference_processed_once() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        // 1 -> {2, 3}, 2 -> {3}: document 3 has two parents
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2, 3]),
            doc_with_children(2, 1, &[3]),
            doc_with_children(3, 1, &[]),
        ]);

        let result = engine(&service, &store).sync(&id_of(1)).unwrap();
        assert_eq!(result.documents.len(), 3);
        let fetches = service.fetches.lock().unwrap();
        assert_eq!(
            fetches.iter().filter(|id| **id == id_of(3)).count(),
            1,
            "document 3 must be fetched exactly once"
        );
    }

    #[test]
    fn test_version_queries_respect_batch_cap() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2, 3, 4, 5, 6]),
            doc_with_children(2, 1, &[]),
            doc_with_children(3, 1, &[]),
            doc_with_children(4, 1, &[]),
            doc_with_children(5, 1, &[]),
            doc_with_children(6, 1, &[]),
        ]);
        let opts = SyncOptions {
            batch_size: 2,
            ..options()
        };
        SyncEngine::with_options(&service, &store, opts)
            .sync(&id_of(1))
            .unwrap();

        let batches = service.batches.lock().unwrap();
        assert!(batches.iter().all(|n| *n <= 2), "batches: {batches:?}");
        // the 5-child wave must have been split into 3 calls
        assert!(batches.len() >= 3);
    }

    #[test]
    fn test_version_count_mismatch_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        let service = FakeService {
            truncate_versions: true,
            ..FakeService::with_docs(vec![doc_with_children(1, 1, &[2]), doc_with_children(2, 1, &[])])
        };

        // root wave has one id; its (truncated) result is empty
        let err = engine(&service, &store).sync(&id_of(1)).unwrap_err();
        assert!(matches!(err, SyncError::VersionCountMismatch { .. }));
    }

    #[test]
    fn test_unfetchable_document_fails_sync_after_retries() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        // document 2 is referenced but the service cannot serve it
        let service = FakeService::with_docs(vec![doc_with_children(1, 1, &[2])]);

        let err = engine(&service, &store).sync(&id_of(1)).unwrap_err();
        match err {
            SyncError::FetchFailed { id, attempts, .. } => {
                assert_eq!(id, id_of(2));
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        // all three attempts hit the service
        let fetches = service.fetches.lock().unwrap();
        assert_eq!(fetches.iter().filter(|id| **id == id_of(2)).count(), 3);
    }

    #[test]
    fn test_offline_sync_uses_store_only() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        let service = FakeService::with_docs(vec![
            doc_with_children(1, 1, &[2]),
            doc_with_children(2, 1, &[]),
        ]);
        engine(&service, &store).sync(&id_of(1)).unwrap();

        let offline = FakeService::default();
        let opts = SyncOptions {
            no_download: true,
            ..options()
        };
        let result = SyncEngine::with_options(&offline, &store, opts)
            .sync(&id_of(1))
            .unwrap();
        assert_eq!(result.documents.len(), 2);
        assert_eq!(offline.fetch_count(), 0);
        assert!(offline.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_offline_sync_fails_on_missing_document() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(tmp.path()).unwrap();
        store.store(&doc_with_children(1, 1, &[2])).unwrap();

        let offline = FakeService::default();
        let opts = SyncOptions {
            no_download: true,
            ..options()
        };
        let err = SyncEngine::with_options(&offline, &store, opts)
            .sync(&id_of(1))
            .unwrap_err();
        assert!(matches!(err, SyncError::NotInStore(id) if id == id_of(2)));
    }
}
