//! The build pipeline.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use bf_cache::ContentCache;
use bf_model::{Document, DocumentId};
use bf_render::{
    CodeRunner, LinkReport, Overrides, PageEntry, PageIndex, RenderContext, Renderer,
    SnippetEvaluator, slugify,
};
use bf_sync::{DocumentService, DocumentStore, SyncEngine, SyncOptions, SyncStats};

use crate::BuildError;

/// One document tree to build, e.g. one book.
#[derive(Clone, Debug)]
pub struct Collection {
    /// Root document of the tree.
    pub root_id: DocumentId,
    /// URL segment the collection's pages live under.
    pub slug: String,
}

/// Build configuration.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Directory for the on-disk document store.
    pub store_dir: PathBuf,
    /// Path of the content cache log.
    pub cache_path: PathBuf,
    /// Directory the rendered pages are written into.
    pub output_dir: PathBuf,
    /// Sync knobs (batching, retries, offline mode).
    pub sync: SyncOptions,
}

/// One collection that failed, with the error that stopped it.
#[derive(Debug)]
pub struct CollectionFailure {
    pub collection: String,
    pub error: BuildError,
}

/// Outcome of a whole build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Pages written across all collections.
    pub pages_written: usize,
    /// Aggregated sync counters.
    pub sync_stats: SyncStats,
    /// Collections that failed to sync or render.
    pub failures: Vec<CollectionFailure>,
    /// Unresolved cross-document references, across all collections.
    pub link_reports: Vec<LinkReport>,
}

impl BuildReport {
    /// Whether the build should exit non-zero.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Builds a static site from remote document trees.
pub struct Builder<'a> {
    service: &'a dyn DocumentService,
    runner: Option<&'a dyn CodeRunner>,
    options: BuildOptions,
}

impl<'a> Builder<'a> {
    #[must_use]
    pub fn new(
        service: &'a dyn DocumentService,
        runner: Option<&'a dyn CodeRunner>,
        options: BuildOptions,
    ) -> Self {
        Self {
            service,
            runner,
            options,
        }
    }

    /// Build all `collections`.
    ///
    /// Returns `Err` only for setup failures (store or cache unusable);
    /// per-collection failures are reported in the [`BuildReport`].
    pub fn build(&self, collections: &[Collection]) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let store = DocumentStore::open(&self.options.store_dir)?;
        let cache = ContentCache::load(&self.options.cache_path)?;

        let mut report = BuildReport::default();

        // Phase 1: sync. Sequential per collection; a collection whose
        // sync fails is dropped from the build and reported.
        let engine = SyncEngine::with_options(self.service, &store, self.options.sync.clone());
        let mut synced: Vec<(Collection, Vec<Document>)> = Vec::new();
        for collection in collections {
            match engine.sync(&collection.root_id) {
                Ok(result) => {
                    report.sync_stats.from_store += result.stats.from_store;
                    report.sync_stats.downloaded += result.stats.downloaded;
                    report.sync_stats.version_batches += result.stats.version_batches;
                    synced.push((
                        collection.clone(),
                        result.documents.into_values().collect(),
                    ));
                }
                Err(e) => {
                    tracing::error!(collection = %collection.slug, error = %e, "sync failed");
                    report.failures.push(CollectionFailure {
                        collection: collection.slug.clone(),
                        error: e.into(),
                    });
                }
            }
        }

        // Phase 2: resolved page index across all collections, so
        // cross-collection links rewrite too.
        let pages = build_page_index(&synced);

        // Phase 3: render, one worker per collection. The content cache
        // is the only shared mutable state; its writes are serialized.
        let evaluator = SnippetEvaluator::new(&cache, self.runner);
        let overrides = Overrides::new();
        let outcomes: Vec<(String, Result<CollectionOutcome, BuildError>)> = synced
            .par_iter()
            .map(|(collection, documents)| {
                let outcome = self.render_collection(
                    collection,
                    documents,
                    &pages,
                    &evaluator,
                    &overrides,
                );
                (collection.slug.clone(), outcome)
            })
            .collect();

        for (slug, outcome) in outcomes {
            match outcome {
                Ok(mut done) => {
                    report.pages_written += done.pages_written;
                    report.link_reports.append(&mut done.link_reports);
                }
                Err(error) => {
                    tracing::error!(collection = %slug, error = %error, "render failed");
                    report.failures.push(CollectionFailure {
                        collection: slug,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            pages = report.pages_written,
            failures = report.failures.len(),
            unresolved_links = report.link_reports.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "build finished"
        );
        Ok(report)
    }

    /// Render one collection's documents, in document order.
    fn render_collection(
        &self,
        collection: &Collection,
        documents: &[Document],
        pages: &PageIndex,
        evaluator: &SnippetEvaluator<'_>,
        overrides: &Overrides,
    ) -> Result<CollectionOutcome, BuildError> {
        let ctx = RenderContext { pages, evaluator };
        let mut outcome = CollectionOutcome::default();
        for doc in documents {
            let rendered = Renderer::render(doc, &ctx, overrides)?;
            outcome.link_reports.extend(rendered.reports);

            let Some(entry) = pages.get(&doc.id) else {
                // the index is built from the same documents, so this
                // cannot happen short of a bug
                continue;
            };
            let dir = self
                .options
                .output_dir
                .join(entry.path.trim_start_matches('/'));
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("index.html"), rendered.html.as_bytes())?;
            outcome.pages_written += 1;
        }
        tracing::info!(
            collection = %collection.slug,
            pages = outcome.pages_written,
            "collection rendered"
        );
        Ok(outcome)
    }
}

#[derive(Default)]
struct CollectionOutcome {
    pages_written: usize,
    link_reports: Vec<LinkReport>,
}

/// Page path for a document within its collection.
fn page_path(collection: &Collection, doc: &Document) -> String {
    format!("/{}/{}/{}", collection.slug, doc.id, slugify(&doc.title))
}

fn build_page_index(synced: &[(Collection, Vec<Document>)]) -> PageIndex {
    let mut pages = PageIndex::new();
    for (collection, documents) in synced {
        for doc in documents {
            pages.insert(
                doc.id.clone(),
                PageEntry {
                    path: page_path(collection, doc),
                    title: doc.title.clone(),
                },
            );
        }
    }
    pages
}
