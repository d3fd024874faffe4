//! Document and block tree model for Bookforge.
//!
//! This crate defines the types shared between the sync engine and the
//! renderer:
//!
//! - [`Document`]: one fetched unit of remote content, identified by a
//!   [`DocumentId`] and a monotonic version number
//! - [`BlockNode`] / [`BlockKind`]: one node in a document's typed content
//!   tree (text, headers, code, images, sub-pages, ...)
//! - [`InlineSpan`]: a run of text with emphasis flags and an optional
//!   link target
//!
//! All types serialize round-trippable as JSON so documents can be
//! persisted to disk by the sync engine and reloaded unchanged.

mod block;
mod document;
mod id;

pub use block::{BlockKind, BlockNode, InlineSpan};
pub use document::Document;
pub use id::{DocumentId, ParseIdError, extract_id_from_url};
