//! Typed block tree.
//!
//! A document's content is a tree of [`BlockNode`]s. Children are strictly
//! owned by their parent, so the tree is acyclic by construction. Blocks
//! that point at other documents (sub-pages, page links) do so by id, and
//! consumers must tolerate ids that no longer resolve.

use serde::{Deserialize, Serialize};

/// One run of text with formatting flags.
///
/// The emphasis flags are independent wrappers. A span carrying a `link`
/// renders as a hyperlink instead of raw text; `mention` and `date`
/// similarly substitute for the plain text.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct InlineSpan {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub code: bool,
    /// Link target URL. Cross-document links carry a document URL here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// User mention, substituted for the span text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
    /// Date reference, substituted for the span text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl InlineSpan {
    /// Plain-text span with no formatting.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Closed set of block kinds.
///
/// Adding a kind here forces every dispatch table to account for it; the
/// renderer treats a kind it has no handler for as a hard error rather
/// than silently dropping content.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Header,
    SubHeader,
    SubSubHeader,
    Code { language: String, source: String },
    Image { url: String },
    Embed { url: String },
    /// Sub-page; the block id is the target document id.
    Page { title: String },
    /// Link to a page elsewhere in the tree; the block id is the target.
    PageLink { title: String },
    Toggle,
    BulletedItem,
    NumberedItem,
    Quote,
    Callout,
    Todo { checked: bool },
    Divider,
    Table { rows: Vec<Vec<String>> },
}

impl BlockKind {
    /// Discriminant name used for dispatch-table keys and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Header => "header",
            Self::SubHeader => "sub_header",
            Self::SubSubHeader => "sub_sub_header",
            Self::Code { .. } => "code",
            Self::Image { .. } => "image",
            Self::Embed { .. } => "embed",
            Self::Page { .. } => "page",
            Self::PageLink { .. } => "page_link",
            Self::Toggle => "toggle",
            Self::BulletedItem => "bulleted_item",
            Self::NumberedItem => "numbered_item",
            Self::Quote => "quote",
            Self::Callout => "callout",
            Self::Todo { .. } => "todo",
            Self::Divider => "divider",
            Self::Table { .. } => "table",
        }
    }

    /// Whether this kind participates in list grouping.
    #[must_use]
    pub fn is_list_item(&self) -> bool {
        matches!(self, Self::BulletedItem | Self::NumberedItem)
    }
}

/// One node in a document's content tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    /// Opaque block id, unique within the tree. For `Page`/`PageLink`
    /// blocks this doubles as the target document id.
    pub id: String,
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline: Vec<InlineSpan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    /// Create a childless block with no inline content.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inline: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Visit this block and all descendants, depth-first, parents before
    /// children.
    pub fn for_each(&self, f: &mut impl FnMut(&BlockNode)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }
}
