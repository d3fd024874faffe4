//! Recursive block tree renderer.
//!
//! Per-kind rendering lives in one exhaustive dispatch, so adding a block
//! kind to the model forces an explicit decision here at compile time.
//! Callers can replace the behavior for any kind through [`Overrides`]
//! without touching the defaults.
//!
//! All counters the walk needs (toggle ids) are renderer-local: rendering
//! the same document twice in one process produces byte-identical markup.

use std::collections::HashMap;
use std::fmt::Write as _;

use bf_model::{BlockKind, BlockNode, Document, DocumentId, InlineSpan, extract_id_from_url};

use crate::RenderError;
use crate::eval::SnippetEvaluator;
use crate::html::{escape_html, slugify};
use crate::source_file::SourceFile;

/// One rendered page in the site, as link targets see it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageEntry {
    /// Site-relative path, e.g. `/essential/go/hello-world-abc123`.
    pub path: String,
    pub title: String,
}

/// Resolved index of document id to generated page.
#[derive(Debug, Default)]
pub struct PageIndex {
    map: HashMap<DocumentId, PageEntry>,
}

impl PageIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: DocumentId, entry: PageEntry) {
        self.map.insert(id, entry);
    }

    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<&PageEntry> {
        self.map.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Heading collected during the walk, for tables of contents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Heading {
    /// Anchor id (the heading block's id).
    pub id: String,
    /// Plain text of the heading.
    pub text: String,
    /// 1-3.
    pub level: u8,
}

/// One unresolved cross-document reference, reported but non-fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkReport {
    /// Document the reference appeared in.
    pub document: DocumentId,
    /// The target that did not resolve (id or raw URL).
    pub target: String,
}

/// Everything a render pass needs besides the document itself.
pub struct RenderContext<'a> {
    /// Resolved pages for cross-document link rewriting.
    pub pages: &'a PageIndex,
    /// Snippet evaluator shared across all render tasks.
    pub evaluator: &'a SnippetEvaluator<'a>,
}

/// Render function installed for one block kind.
pub type RenderFn = Box<
    dyn for<'a, 'b> Fn(&'b mut Renderer<'a>, &BlockNode) -> Result<(), RenderError> + Send + Sync,
>;

/// Per-kind overrides, keyed by [`BlockKind::name`].
///
/// An override fully replaces the default for that kind; it can call back
/// into the renderer ([`Renderer::write`], [`Renderer::render_children`],
/// [`Renderer::inline_html`]) to reuse the walk.
#[derive(Default)]
pub struct Overrides {
    map: HashMap<&'static str, RenderFn>,
}

impl Overrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an override for the kind named `tag`.
    #[must_use]
    pub fn set(mut self, tag: &'static str, f: RenderFn) -> Self {
        self.map.insert(tag, f);
        self
    }

    fn get(&self, tag: &str) -> Option<&RenderFn> {
        self.map.get(tag)
    }
}

/// Result of rendering one document.
#[derive(Debug)]
pub struct RenderOutput {
    pub html: String,
    pub headings: Vec<Heading>,
    /// Unresolved cross-document references, one entry per occurrence.
    pub reports: Vec<LinkReport>,
}

/// The recursive-descent walk over one document.
///
/// Create one per document via [`Renderer::render`]; the struct is the
/// walk's state and is not reused.
pub struct Renderer<'a> {
    ctx: &'a RenderContext<'a>,
    overrides: &'a Overrides,
    document: &'a Document,
    out: String,
    toggle_seq: u32,
    headings: Vec<Heading>,
    reports: Vec<LinkReport>,
}

impl<'a> Renderer<'a> {
    /// Render `document` to HTML.
    pub fn render(
        document: &'a Document,
        ctx: &'a RenderContext<'a>,
        overrides: &'a Overrides,
    ) -> Result<RenderOutput, RenderError> {
        let mut r = Self {
            ctx,
            overrides,
            document,
            out: String::with_capacity(4096),
            toggle_seq: 0,
            headings: Vec::new(),
            reports: Vec::new(),
        };
        r.render_children(&document.root.children)?;
        Ok(RenderOutput {
            html: r.out,
            headings: r.headings,
            reports: r.reports,
        })
    }

    /// The document being rendered.
    #[must_use]
    pub fn document(&self) -> &Document {
        self.document
    }

    /// Append raw markup to the output.
    pub fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Render a run of sibling blocks.
    ///
    /// Handles the sibling-level rules: consecutive list items of the same
    /// kind share one container (a kind switch closes and reopens, even
    /// with no block in between), and empty text blocks are suppressed
    /// when they are the first or last sibling — blank lines from careless
    /// editing cluster at the edges.
    pub fn render_children(&mut self, blocks: &[BlockNode]) -> Result<(), RenderError> {
        let mut open_list: Option<&'static str> = None;
        let last = blocks.len().saturating_sub(1);
        for (i, block) in blocks.iter().enumerate() {
            if (i == 0 || i == last) && is_empty_text(block) {
                continue;
            }
            if is_todo_note(block) {
                continue;
            }

            let list_tag = match block.kind {
                BlockKind::BulletedItem => Some("ul"),
                BlockKind::NumberedItem => Some("ol"),
                _ => None,
            };
            if open_list != list_tag {
                if let Some(tag) = open_list {
                    let _ = writeln!(self.out, "</{tag}>");
                }
                if let Some(tag) = list_tag {
                    let _ = writeln!(self.out, "<{tag}>");
                }
                open_list = list_tag;
            }

            self.render_block(block)?;
        }
        if let Some(tag) = open_list {
            let _ = writeln!(self.out, "</{tag}>");
        }
        Ok(())
    }

    /// Render one block, dispatching through the override table first.
    pub fn render_block(&mut self, block: &BlockNode) -> Result<(), RenderError> {
        let overrides = self.overrides;
        if let Some(f) = overrides.get(block.kind.name()) {
            return f(self, block);
        }
        self.default_render(block)
    }

    /// Default per-kind behavior. Exhaustive over [`BlockKind`]: a new
    /// kind will not compile until it gets an arm here.
    fn default_render(&mut self, block: &BlockNode) -> Result<(), RenderError> {
        match &block.kind {
            BlockKind::Text => {
                let inline = self.inline_html(&block.inline);
                let _ = writeln!(self.out, "<p>{inline}</p>");
                self.render_children(&block.children)?;
            }
            BlockKind::Header => self.heading(block, 1)?,
            BlockKind::SubHeader => self.heading(block, 2)?,
            BlockKind::SubSubHeader => self.heading(block, 3)?,
            BlockKind::Code { language, source } => {
                self.code_block(language, source)?;
            }
            BlockKind::Image { url } => {
                let _ = writeln!(self.out, r#"<img class="img" src="{}">"#, escape_html(url));
            }
            BlockKind::Embed { url } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(RenderError::UnsupportedEmbed(url.clone()));
                }
                let url = escape_html(url);
                let _ = writeln!(
                    self.out,
                    r#"<div class="embed"><a href="{url}">{url}</a></div>"#
                );
            }
            BlockKind::Page { title } => self.page_link(block, title, "page"),
            BlockKind::PageLink { title } => self.page_link(block, title, "page-link"),
            BlockKind::Toggle => self.toggle(block)?,
            BlockKind::BulletedItem | BlockKind::NumberedItem => {
                let inline = self.inline_html(&block.inline);
                let _ = write!(self.out, "<li>{inline}");
                self.render_children(&block.children)?;
                self.out.push_str("</li>\n");
            }
            BlockKind::Quote => {
                let inline = self.inline_html(&block.inline);
                let _ = write!(self.out, "<blockquote>{inline}");
                self.render_children(&block.children)?;
                self.out.push_str("</blockquote>\n");
            }
            BlockKind::Callout => {
                let inline = self.inline_html(&block.inline);
                let _ = write!(self.out, r#"<div class="callout">{inline}"#);
                self.render_children(&block.children)?;
                self.out.push_str("</div>\n");
            }
            BlockKind::Todo { checked } => {
                let inline = self.inline_html(&block.inline);
                let checked = if *checked { " checked" } else { "" };
                let _ = writeln!(
                    self.out,
                    r#"<div class="todo"><input type="checkbox" disabled{checked}> {inline}</div>"#
                );
            }
            BlockKind::Divider => self.out.push_str("<hr>\n"),
            BlockKind::Table { rows } => {
                self.out.push_str("<table class=\"table\">\n");
                for row in rows {
                    self.out.push_str("<tr>");
                    for cell in row {
                        let _ = write!(self.out, "<td>{}</td>", escape_html(cell));
                    }
                    self.out.push_str("</tr>\n");
                }
                self.out.push_str("</table>\n");
            }
        }
        Ok(())
    }

    fn heading(&mut self, block: &BlockNode, level: u8) -> Result<(), RenderError> {
        self.headings.push(Heading {
            id: block.id.clone(),
            text: plain_text(&block.inline),
            level,
        });
        let inline = self.inline_html(&block.inline);
        let _ = writeln!(
            self.out,
            r#"<h{level} class="hdr" id="{}">{inline}</h{level}>"#,
            escape_html(&block.id)
        );
        self.render_children(&block.children)
    }

    /// Collapsible block. The control/panel pairing uses a renderer-local
    /// sequence number so nested toggles stay independent and re-renders
    /// stay deterministic.
    fn toggle(&mut self, block: &BlockNode) -> Result<(), RenderError> {
        self.toggle_seq += 1;
        let n = self.toggle_seq;
        let inline = self.inline_html(&block.inline);
        let _ = writeln!(
            self.out,
            r#"<div class="toggle">
<div class="toggle-title" data-target="toggle-body-{n}">{inline}</div>
<div class="toggle-body" id="toggle-body-{n}">"#
        );
        self.render_children(&block.children)?;
        self.out.push_str("</div>\n</div>\n");
        Ok(())
    }

    /// Sub-page and page-link blocks.
    ///
    /// The target id is looked up in the resolved page index; a dangling
    /// id gets a best-effort fallback link and one report entry — a
    /// missing target page must never crash the render.
    fn page_link(&mut self, block: &BlockNode, title: &str, cls: &str) {
        let pages = self.ctx.pages;
        let (href, text) = match block.id.parse::<DocumentId>() {
            Ok(id) => match pages.get(&id) {
                Some(entry) => (entry.path.clone(), entry.title.clone()),
                None => {
                    self.report_unresolved(id.as_str());
                    (
                        format!("/article/{id}/{}", slugify(title)),
                        title.to_owned(),
                    )
                }
            },
            Err(_) => {
                self.report_unresolved(&block.id);
                (
                    format!("/article/{}/{}", block.id, slugify(title)),
                    title.to_owned(),
                )
            }
        };
        let _ = writeln!(
            self.out,
            r#"<div class="{cls}"><a href="{}">{}</a></div>"#,
            escape_html(&href),
            escape_html(&text)
        );
    }

    fn report_unresolved(&mut self, target: &str) {
        tracing::warn!(
            document = %self.document.id,
            target,
            "unresolved cross-document reference"
        );
        self.reports.push(LinkReport {
            document: self.document.id.clone(),
            target: target.to_owned(),
        });
    }

    /// Code block: source file extraction, cache-first evaluation, code
    /// panel, then the optional output panel and playground link.
    fn code_block(&mut self, language: &str, source: &str) -> Result<(), RenderError> {
        let sf = SourceFile::parse(language, source)?;
        let title = if self.document.title.is_empty() {
            "untitled"
        } else {
            self.document.title.as_str()
        };
        let evaluated = self.ctx.evaluator.evaluate(&sf, title)?;

        let _ = writeln!(
            self.out,
            r#"<pre class="code lang-{}"><code>{}</code></pre>"#,
            escape_html(&bf_sandbox::normalize_language(&sf.language)),
            escape_html(&sf.code_to_show())
        );

        if let Some(url) = &evaluated.playground_url {
            let _ = writeln!(
                self.out,
                r#"<div class="playground-link"><a href="{}">try it online</a></div>"#,
                escape_html(url)
            );
        }

        let show_output = !sf.directive.no_output || sf.directive.force_output;
        if let Some(output) = &evaluated.output
            && show_output
            && !output.is_empty()
        {
            let shown = match sf.directive.line_limit {
                Some(limit) => output.lines().take(limit).collect::<Vec<_>>().join("\n"),
                None => output.clone(),
            };
            let _ = writeln!(
                self.out,
                r#"<pre class="code-output"><code>{}</code></pre>"#,
                escape_html(&shown)
            );
        }
        Ok(())
    }

    /// Render inline spans to HTML.
    ///
    /// Emphasis wrappers apply in a fixed order (bold, italic, strike,
    /// code) regardless of how the flags combine. A link, mention, or
    /// date substitutes for the span's plain text.
    pub fn inline_html(&mut self, spans: &[InlineSpan]) -> String {
        let mut out = String::new();
        for span in spans {
            let core = self.span_core(span);
            out.push_str(&wrap_emphasis(span, &core));
        }
        out
    }

    fn span_core(&mut self, span: &InlineSpan) -> String {
        if let Some(mention) = &span.mention {
            return format!(r#"<span class="mention">@{}</span>"#, escape_html(mention));
        }
        if let Some(date) = &span.date {
            return format!(r#"<span class="date">{}</span>"#, escape_html(date));
        }
        if let Some(link) = &span.link {
            let href = self.rewrite_link(link);
            return format!(
                r#"<a href="{}">{}</a>"#,
                escape_html(&href),
                escape_html(&span.text)
            );
        }
        escape_html(&span.text)
    }

    /// Rewrite a link that targets a document in this site to the local
    /// page path. Links to unknown documents are left untouched and
    /// reported; external links pass through.
    fn rewrite_link(&mut self, link: &str) -> String {
        let Some(id) = extract_id_from_url(link) else {
            return link.to_owned();
        };
        let pages = self.ctx.pages;
        match pages.get(&id) {
            Some(entry) => entry.path.clone(),
            None => {
                self.report_unresolved(id.as_str());
                link.to_owned()
            }
        }
    }
}

/// Plain text of inline spans, for headings and titles.
fn plain_text(spans: &[InlineSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

fn wrap_emphasis(span: &InlineSpan, core: &str) -> String {
    let mut out = String::new();
    let wrappers: [(&str, bool); 4] = [
        ("b", span.bold),
        ("i", span.italic),
        ("del", span.strike),
        ("code", span.code),
    ];
    for (tag, on) in &wrappers {
        if *on {
            let _ = write!(out, "<{tag}>");
        }
    }
    out.push_str(core);
    for (tag, on) in wrappers.iter().rev() {
        if *on {
            let _ = write!(out, "</{tag}>");
        }
    }
    out
}

fn is_empty_text(block: &BlockNode) -> bool {
    matches!(block.kind, BlockKind::Text) && block.inline.is_empty()
}

/// Authoring convention: a text block starting with `@TODO` is a note to
/// the author, never rendered.
fn is_todo_note(block: &BlockNode) -> bool {
    matches!(block.kind, BlockKind::Text)
        && block
            .inline
            .first()
            .is_some_and(|s| s.text.starts_with("@TODO"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_cache::{ContentCache, RecordKind};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn doc_id(n: u8) -> DocumentId {
        format!("{n:032x}").parse().unwrap()
    }

    fn text_block(id: &str, text: &str) -> BlockNode {
        let mut b = BlockNode::new(id, BlockKind::Text);
        b.inline.push(InlineSpan::text(text));
        b
    }

    fn empty_text(id: &str) -> BlockNode {
        BlockNode::new(id, BlockKind::Text)
    }

    fn list_item(id: &str, kind: BlockKind, text: &str) -> BlockNode {
        let mut b = BlockNode::new(id, kind);
        b.inline.push(InlineSpan::text(text));
        b
    }

    fn document_with(children: Vec<BlockNode>) -> Document {
        let id = doc_id(1);
        let mut root = BlockNode::new(
            id.as_str(),
            BlockKind::Page {
                title: "root".to_owned(),
            },
        );
        root.children = children;
        Document {
            id,
            version: 1,
            title: "Test Page".to_owned(),
            root,
        }
    }

    struct Fixture {
        _tmp: TempDir,
        cache: ContentCache,
        pages: PageIndex,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let cache = ContentCache::load(tmp.path().join("cache.log")).unwrap();
            Self {
                _tmp: tmp,
                cache,
                pages: PageIndex::new(),
            }
        }

        fn render(&self, doc: &Document) -> RenderOutput {
            self.try_render(doc).unwrap()
        }

        fn try_render(&self, doc: &Document) -> Result<RenderOutput, RenderError> {
            let evaluator = SnippetEvaluator::new(&self.cache, None);
            let ctx = RenderContext {
                pages: &self.pages,
                evaluator: &evaluator,
            };
            Renderer::render(doc, &ctx, &Overrides::new())
        }
    }

    #[test]
    fn test_text_renders_as_paragraph() {
        let f = Fixture::new();
        let doc = document_with(vec![text_block("b1", "hello <world>")]);
        assert_eq!(f.render(&doc).html, "<p>hello &lt;world&gt;</p>\n");
    }

    #[test]
    fn test_emphasis_wrapper_order_is_fixed() {
        let f = Fixture::new();
        let mut b = BlockNode::new("b1", BlockKind::Text);
        b.inline.push(InlineSpan {
            text: "x".to_owned(),
            bold: true,
            code: true,
            ..InlineSpan::default()
        });
        b.inline.push(InlineSpan {
            text: "y".to_owned(),
            strike: true,
            italic: true,
            ..InlineSpan::default()
        });
        let doc = document_with(vec![b]);
        assert_eq!(
            f.render(&doc).html,
            "<p><b><code>x</code></b><i><del>y</del></i></p>\n"
        );
    }

    #[test]
    fn test_list_grouping_by_kind() {
        let f = Fixture::new();
        let doc = document_with(vec![
            list_item("b1", BlockKind::BulletedItem, "one"),
            list_item("b2", BlockKind::BulletedItem, "two"),
            list_item("b3", BlockKind::BulletedItem, "three"),
            list_item("b4", BlockKind::NumberedItem, "first"),
        ]);
        assert_eq!(
            f.render(&doc).html,
            "<ul>\n<li>one</li>\n<li>two</li>\n<li>three</li>\n</ul>\n<ol>\n<li>first</li>\n</ol>\n"
        );
    }

    #[test]
    fn test_list_interrupted_by_paragraph() {
        let f = Fixture::new();
        let doc = document_with(vec![
            list_item("b1", BlockKind::BulletedItem, "a"),
            text_block("b2", "break"),
            list_item("b3", BlockKind::BulletedItem, "b"),
        ]);
        assert_eq!(
            f.render(&doc).html,
            "<ul>\n<li>a</li>\n</ul>\n<p>break</p>\n<ul>\n<li>b</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_nested_list_items() {
        let f = Fixture::new();
        let mut parent = list_item("b1", BlockKind::BulletedItem, "outer");
        parent
            .children
            .push(list_item("b2", BlockKind::BulletedItem, "inner"));
        let doc = document_with(vec![parent]);
        assert_eq!(
            f.render(&doc).html,
            "<ul>\n<li>outer<ul>\n<li>inner</li>\n</ul>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_edge_empty_text_suppressed() {
        let f = Fixture::new();
        let doc = document_with(vec![
            empty_text("b1"),
            text_block("b2", "content"),
            empty_text("b3"),
        ]);
        assert_eq!(f.render(&doc).html, "<p>content</p>\n");
    }

    #[test]
    fn test_interior_empty_text_still_renders() {
        let f = Fixture::new();
        let doc = document_with(vec![
            text_block("b1", "a"),
            empty_text("b2"),
            text_block("b3", "b"),
        ]);
        assert_eq!(f.render(&doc).html, "<p>a</p>\n<p></p>\n<p>b</p>\n");
    }

    #[test]
    fn test_todo_note_suppressed() {
        let f = Fixture::new();
        let doc = document_with(vec![
            text_block("b1", "@TODO: fix this section"),
            text_block("b2", "real content"),
        ]);
        assert_eq!(f.render(&doc).html, "<p>real content</p>\n");
    }

    #[test]
    fn test_headings_collected_with_levels() {
        let f = Fixture::new();
        let mut h1 = BlockNode::new("h1id", BlockKind::Header);
        h1.inline.push(InlineSpan::text("Top"));
        let mut h3 = BlockNode::new("h3id", BlockKind::SubSubHeader);
        h3.inline.push(InlineSpan::text("Deep"));
        let doc = document_with(vec![h1, h3]);
        let out = f.render(&doc);
        assert!(out.html.contains(r#"<h1 class="hdr" id="h1id">Top</h1>"#));
        assert!(out.html.contains(r#"<h3 class="hdr" id="h3id">Deep</h3>"#));
        assert_eq!(
            out.headings,
            vec![
                Heading {
                    id: "h1id".to_owned(),
                    text: "Top".to_owned(),
                    level: 1
                },
                Heading {
                    id: "h3id".to_owned(),
                    text: "Deep".to_owned(),
                    level: 3
                },
            ]
        );
    }

    #[test]
    fn test_toggle_ids_are_sequential_and_nested() {
        let f = Fixture::new();
        let mut outer = BlockNode::new("t1", BlockKind::Toggle);
        outer.inline.push(InlineSpan::text("outer"));
        let mut inner = BlockNode::new("t2", BlockKind::Toggle);
        inner.inline.push(InlineSpan::text("inner"));
        inner.children.push(text_block("b1", "deep"));
        outer.children.push(inner);
        let doc = document_with(vec![outer]);

        let html = f.render(&doc).html;
        assert!(html.contains(r#"id="toggle-body-1""#));
        assert!(html.contains(r#"id="toggle-body-2""#));
    }

    #[test]
    fn test_render_twice_is_byte_identical() {
        let f = Fixture::new();
        let mut toggle = BlockNode::new("t1", BlockKind::Toggle);
        toggle.inline.push(InlineSpan::text("t"));
        toggle.children.push(text_block("b", "inside"));
        let doc = document_with(vec![toggle, text_block("b2", "after")]);

        let first = f.render(&doc).html;
        let second = f.render(&doc).html;
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolved_page_link_uses_index() {
        let mut f = Fixture::new();
        f.pages.insert(
            doc_id(2),
            PageEntry {
                path: "/essential/go/child-page".to_owned(),
                title: "Child Page".to_owned(),
            },
        );
        let doc = document_with(vec![BlockNode::new(
            doc_id(2).as_str(),
            BlockKind::Page {
                title: "stale title".to_owned(),
            },
        )]);
        let out = f.render(&doc);
        assert_eq!(
            out.html,
            "<div class=\"page\"><a href=\"/essential/go/child-page\">Child Page</a></div>\n"
        );
        assert!(out.reports.is_empty());
    }

    #[test]
    fn test_dangling_page_link_falls_back_and_reports_once() {
        let f = Fixture::new();
        let doc = document_with(vec![BlockNode::new(
            doc_id(9).as_str(),
            BlockKind::PageLink {
                title: "Gone Page".to_owned(),
            },
        )]);
        let out = f.render(&doc);
        assert!(
            out.html
                .contains(&format!("/article/{}/gone-page", doc_id(9)))
        );
        assert_eq!(out.reports.len(), 1);
        assert_eq!(out.reports[0].target, doc_id(9).as_str());
    }

    #[test]
    fn test_inline_link_rewritten_to_local_path() {
        let mut f = Fixture::new();
        f.pages.insert(
            doc_id(2),
            PageEntry {
                path: "/essential/go/target".to_owned(),
                title: "Target".to_owned(),
            },
        );
        let mut b = BlockNode::new("b1", BlockKind::Text);
        b.inline.push(InlineSpan {
            text: "see here".to_owned(),
            link: Some(format!("https://docs.example.com/Target-{}", doc_id(2))),
            ..InlineSpan::default()
        });
        let doc = document_with(vec![b]);
        assert_eq!(
            f.render(&doc).html,
            "<p><a href=\"/essential/go/target\">see here</a></p>\n"
        );
    }

    #[test]
    fn test_unresolved_document_link_left_untouched_and_reported() {
        let f = Fixture::new();
        let url = format!("https://docs.example.com/Missing-{}", doc_id(7));
        let mut b = BlockNode::new("b1", BlockKind::Text);
        b.inline.push(InlineSpan {
            text: "dangling".to_owned(),
            link: Some(url.clone()),
            ..InlineSpan::default()
        });
        let doc = document_with(vec![b]);
        let out = f.render(&doc);
        assert!(out.html.contains(&format!("href=\"{url}\"")));
        assert_eq!(out.reports.len(), 1);
    }

    #[test]
    fn test_external_link_passes_through_without_report() {
        let f = Fixture::new();
        let mut b = BlockNode::new("b1", BlockKind::Text);
        b.inline.push(InlineSpan {
            text: "rust".to_owned(),
            link: Some("https://www.rust-lang.org/".to_owned()),
            ..InlineSpan::default()
        });
        let doc = document_with(vec![b]);
        let out = f.render(&doc);
        assert!(out.html.contains(r#"href="https://www.rust-lang.org/""#));
        assert!(out.reports.is_empty());
    }

    #[test]
    fn test_mention_and_date_substitute_for_text() {
        let f = Fixture::new();
        let mut b = BlockNode::new("b1", BlockKind::Text);
        b.inline.push(InlineSpan {
            text: "ignored".to_owned(),
            mention: Some("maria".to_owned()),
            ..InlineSpan::default()
        });
        b.inline.push(InlineSpan {
            text: "ignored".to_owned(),
            date: Some("2019-03-01".to_owned()),
            ..InlineSpan::default()
        });
        let doc = document_with(vec![b]);
        assert_eq!(
            f.render(&doc).html,
            "<p><span class=\"mention\">@maria</span><span class=\"date\">2019-03-01</span></p>\n"
        );
    }

    #[test]
    fn test_code_block_with_cached_output() {
        let f = Fixture::new();
        let source = "// :glot, no playground\npackage main\n";
        let sf = SourceFile::parse("go", source).unwrap();
        f.cache
            .put(RecordKind::RunOutput, &sf.cache_key(), "42\n")
            .unwrap();

        let doc = document_with(vec![BlockNode::new(
            "b1",
            BlockKind::Code {
                language: "go".to_owned(),
                source: source.to_owned(),
            },
        )]);
        let html = f.render(&doc).html;
        assert!(html.contains(r#"<pre class="code lang-go"><code>package main"#));
        assert!(html.contains(r#"<pre class="code-output"><code>42"#));
        assert!(!html.contains("playground-link"));
    }

    #[test]
    fn test_code_block_no_output_directive_suppresses_panel() {
        let f = Fixture::new();
        let source = "// :glot, no output, no playground\npackage main\n";
        let sf = SourceFile::parse("go", source).unwrap();
        f.cache
            .put(RecordKind::RunOutput, &sf.cache_key(), "hidden\n")
            .unwrap();

        let doc = document_with(vec![BlockNode::new(
            "b1",
            BlockKind::Code {
                language: "go".to_owned(),
                source: source.to_owned(),
            },
        )]);
        let html = f.render(&doc).html;
        assert!(html.contains("lang-go"));
        assert!(!html.contains("code-output"));
    }

    #[test]
    fn test_code_block_playground_link() {
        let f = Fixture::new();
        let source = "// :glot\npackage main\n";
        let sf = SourceFile::parse("go", source).unwrap();
        f.cache
            .put(RecordKind::RunOutput, &sf.cache_key(), "")
            .unwrap();
        f.cache
            .put(RecordKind::SnippetId, &sf.cache_key(), "abc123")
            .unwrap();

        let doc = document_with(vec![BlockNode::new(
            "b1",
            BlockKind::Code {
                language: "go".to_owned(),
                source: source.to_owned(),
            },
        )]);
        let html = f.render(&doc).html;
        assert!(html.contains(r#"<a href="https://glot.io/snippets/abc123">try it online</a>"#));
        // empty output: no output panel
        assert!(!html.contains("code-output"));
    }

    #[test]
    fn test_code_block_output_line_limit() {
        let f = Fixture::new();
        let source = "// :glot, no playground, line 2\npackage main\n";
        let sf = SourceFile::parse("go", source).unwrap();
        f.cache
            .put(RecordKind::RunOutput, &sf.cache_key(), "1\n2\n3\n4\n")
            .unwrap();

        let doc = document_with(vec![BlockNode::new(
            "b1",
            BlockKind::Code {
                language: "go".to_owned(),
                source: source.to_owned(),
            },
        )]);
        let html = f.render(&doc).html;
        assert!(html.contains("<code>1\n2</code>"));
        assert!(!html.contains('3'));
    }

    #[test]
    fn test_plain_code_block_never_evaluates() {
        let f = Fixture::new();
        // no directive: must render fine with no runner and no cache entry
        let doc = document_with(vec![BlockNode::new(
            "b1",
            BlockKind::Code {
                language: "go".to_owned(),
                source: "package main\n".to_owned(),
            },
        )]);
        let html = f.render(&doc).html;
        assert!(html.contains("lang-go"));
        assert!(!html.contains("code-output"));
        assert!(!html.contains("playground-link"));
    }

    #[test]
    fn test_unsupported_embed_fails_loudly() {
        let f = Fixture::new();
        let doc = document_with(vec![BlockNode::new(
            "b1",
            BlockKind::Embed {
                url: "ftp://weird.example.com/thing".to_owned(),
            },
        )]);
        let err = f.try_render(&doc).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedEmbed(_)));
    }

    #[test]
    fn test_override_replaces_default() {
        let f = Fixture::new();
        let overrides = Overrides::new().set(
            "divider",
            Box::new(|r: &mut Renderer<'_>, _b: &BlockNode| {
                r.write("<hr class=\"fancy\">\n");
                Ok(())
            }),
        );
        let doc = document_with(vec![BlockNode::new("b1", BlockKind::Divider)]);
        let evaluator = SnippetEvaluator::new(&f.cache, None);
        let ctx = RenderContext {
            pages: &f.pages,
            evaluator: &evaluator,
        };
        let out = Renderer::render(&doc, &ctx, &overrides).unwrap();
        assert_eq!(out.html, "<hr class=\"fancy\">\n");
    }

    #[test]
    fn test_quote_and_divider_and_table() {
        let f = Fixture::new();
        let mut quote = BlockNode::new("q", BlockKind::Quote);
        quote.inline.push(InlineSpan::text("wise words"));
        let table = BlockNode::new(
            "t",
            BlockKind::Table {
                rows: vec![
                    vec!["a".to_owned(), "b".to_owned()],
                    vec!["c".to_owned(), "d & e".to_owned()],
                ],
            },
        );
        let doc = document_with(vec![quote, BlockNode::new("d", BlockKind::Divider), table]);
        let html = f.render(&doc).html;
        assert!(html.contains("<blockquote>wise words</blockquote>"));
        assert!(html.contains("<hr>"));
        assert!(html.contains("<td>d &amp; e</td>"));
    }
}
