//! Site build orchestration.
//!
//! Wires the pipeline end to end: sync every collection's document tree,
//! build the cross-collection page index, then render collections in
//! parallel — one worker per collection, sharing one content cache.
//!
//! Sync strictly precedes render, so the document store is read-only by
//! the time renderers run; the content cache is the only resource they
//! share, through its serialized-write contract.
//!
//! Failures aggregate: one collection failing to sync or render drops
//! that collection from the build and lands in the [`BuildReport`], it
//! does not abort the others. The caller turns a non-empty failure list
//! into a non-zero exit.

mod builder;

pub use builder::{Builder, BuildOptions, BuildReport, Collection, CollectionFailure};

use bf_cache::CacheError;
use bf_render::RenderError;
use bf_sync::SyncError;

/// Error from building the site.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("sync failed")]
    Sync(#[from] SyncError),

    #[error("cache failed")]
    Cache(#[from] CacheError),

    #[error("render failed")]
    Render(#[from] RenderError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
