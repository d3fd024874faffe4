//! Block tree to HTML rendering.
//!
//! The pipeline's second phase: given a synced [`bf_model::Document`],
//! produce output markup. The walk is a recursive descent over the block
//! tree with per-kind behavior that callers can replace through an
//! override table ([`Overrides`]).
//!
//! Code blocks are the expensive case: they are parsed into a
//! [`SourceFile`] (directive extraction, visible-region selection), and
//! when a directive requests execution, the [`SnippetEvaluator`] consults
//! the content-addressed cache before ever touching the sandbox.

mod directive;
mod eval;
mod html;
mod renderer;
mod source_file;

pub use directive::{Directive, DirectiveError};
pub use eval::{CodeRunner, EvalError, Evaluated, SnippetEvaluator};
pub use html::{escape_html, slugify};
pub use renderer::{
    Heading, LinkReport, Overrides, PageEntry, PageIndex, RenderContext, RenderFn, RenderOutput,
    Renderer,
};
pub use source_file::SourceFile;

/// Error from rendering one document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A code block's directive line was marked as a directive but does
    /// not parse.
    #[error("bad directive in code block: {0}")]
    Directive(#[from] DirectiveError),

    /// A code snippet could not be evaluated (execution failed and the
    /// directive did not allow it, or the sandbox was unreachable).
    #[error("snippet evaluation failed: {0}")]
    Eval(#[from] EvalError),

    /// An embedded-content block points somewhere this renderer does not
    /// understand. Loud by design: silently dropping an embed would
    /// corrupt output invisibly.
    #[error("unsupported embed URL: '{0}'")]
    UnsupportedEmbed(String),
}
