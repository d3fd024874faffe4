//! Source files extracted from code blocks.
//!
//! A code block is more than the text the reader sees: leading comment
//! lines carry a [`Directive`], and `:show` annotation lines select the
//! region presented on the page while the full program is what actually
//! executes. A [`SourceFile`] holds both views plus the parsed directive.

use bf_cache::content_hash;
use bf_sandbox::normalize_language;

use crate::directive::{Directive, DirectiveError};

/// Annotation marking the start of a visible region.
const SHOW_START: &str = ":show start";
/// Annotation marking the end of a visible region.
const SHOW_END: &str = ":show end";

/// A code block split into its executable and displayable views.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceFile {
    /// Language as the document declared it (unnormalized).
    pub language: String,
    pub directive: Directive,
    /// Lines submitted for execution: directive and annotation lines
    /// stripped, doubled blank lines collapsed.
    lines_to_run: Vec<String>,
    /// Lines shown on the page: the `:show` regions, or everything when
    /// the block carries no annotations.
    lines_to_show: Vec<String>,
}

impl SourceFile {
    /// Parse a code block's raw source.
    ///
    /// Line endings are normalized to `\n` first so hashes do not depend
    /// on the editor that produced the document.
    pub fn parse(language: &str, source: &str) -> Result<Self, DirectiveError> {
        let normalized = source.replace("\r\n", "\n");
        let lines: Vec<String> = normalized.split('\n').map(str::to_owned).collect();
        let (directive, rest) = Directive::extract(&lines)?;
        Ok(Self {
            language: language.to_owned(),
            directive,
            lines_to_run: strip_annotation_lines(rest),
            lines_to_show: extract_show_regions(rest),
        })
    }

    /// The content to execute.
    #[must_use]
    pub fn code_to_run(&self) -> String {
        self.lines_to_run.join("\n")
    }

    /// The content to present on the page.
    #[must_use]
    pub fn code_to_show(&self) -> String {
        self.lines_to_show.join("\n")
    }

    /// Cache key for this snippet's derived artifacts.
    ///
    /// Computed over the normalized language and the executable content
    /// only — display-only differences must not split the cache.
    #[must_use]
    pub fn cache_key(&self) -> String {
        content_hash(&normalize_language(&self.language), &self.code_to_run())
    }

    /// File name for the sandbox: the directive's explicit name, or a
    /// language-derived default.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.directive
            .file_name
            .clone()
            .or_else(|| default_file_name(&normalize_language(&self.language)).map(str::to_owned))
    }
}

/// Default sandbox file name by (normalized) language.
fn default_file_name(language: &str) -> Option<&'static str> {
    match language {
        "go" => Some("main.go"),
        "javascript" => Some("main.js"),
        "cpp" => Some("main.cpp"),
        "python" => Some("main.py"),
        "rust" => Some("main.rs"),
        _ => None,
    }
}

fn is_annotation(line: &str) -> bool {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("//")
        .or_else(|| trimmed.strip_prefix('#'));
    rest.is_some_and(|r| {
        let r = r.trim();
        r.starts_with(SHOW_START) || r.starts_with(SHOW_END)
    })
}

/// Drop annotation lines, collapsing the blank-line runs they leave.
fn strip_annotation_lines(lines: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut prev_was_empty = false;
    for line in lines {
        if is_annotation(line) {
            continue;
        }
        if line.is_empty() && prev_was_empty {
            continue;
        }
        prev_was_empty = line.is_empty();
        out.push(line.clone());
    }
    out
}

/// Collect the regions between `:show start` and `:show end` annotations.
///
/// Multiple regions concatenate. A block without a start annotation shows
/// everything (minus the annotations themselves).
fn extract_show_regions(lines: &[String]) -> Vec<String> {
    if !lines.iter().any(|l| is_annotation(l)) {
        return strip_annotation_lines(lines);
    }
    let mut out = Vec::new();
    let mut showing = false;
    for line in lines {
        if is_annotation(line) {
            showing = line.trim().contains(SHOW_START);
            continue;
        }
        if showing {
            out.push(line.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_block_runs_and_shows_everything() {
        let sf = SourceFile::parse("go", "package main\n\nfunc main() {}\n").unwrap();
        assert_eq!(sf.code_to_run(), "package main\n\nfunc main() {}\n");
        assert_eq!(sf.code_to_show(), sf.code_to_run());
        assert_eq!(sf.directive, Directive::default());
    }

    #[test]
    fn test_directive_lines_are_not_part_of_the_code() {
        let sf = SourceFile::parse("go", "// :glot, no output\npackage main\n").unwrap();
        assert!(sf.directive.execute);
        assert!(sf.directive.no_output);
        assert_eq!(sf.code_to_run(), "package main\n");
    }

    #[test]
    fn test_show_region_limits_display_not_execution() {
        let source = "\
package main

import \"fmt\"

func main() {
\t// :show start
\tfmt.Println(42)
\t// :show end
}";
        let sf = SourceFile::parse("go", source).unwrap();
        assert_eq!(sf.code_to_show(), "\tfmt.Println(42)");
        // executable code keeps everything except the annotations
        assert!(sf.code_to_run().contains("package main"));
        assert!(!sf.code_to_run().contains(":show"));
    }

    #[test]
    fn test_multiple_show_regions_concatenate() {
        let source = "a\n// :show start\nb\n// :show end\nc\n// :show start\nd\n// :show end\n";
        let sf = SourceFile::parse("text", source).unwrap();
        assert_eq!(sf.code_to_show(), "b\nd");
    }

    #[test]
    fn test_hash_ignores_display_only_differences() {
        let annotated = "package main\n// :show start\nx\n// :show end\n";
        let plain = "package main\nx\n";
        let a = SourceFile::parse("go", annotated).unwrap();
        let b = SourceFile::parse("go", plain).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        // ...but the displayed code differs
        assert_ne!(a.code_to_show(), b.code_to_show());
    }

    #[test]
    fn test_hash_depends_on_language() {
        let a = SourceFile::parse("go", "x\n").unwrap();
        let b = SourceFile::parse("rust", "x\n").unwrap();
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_hash_normalizes_language_aliases() {
        let a = SourceFile::parse("C++", "x\n").unwrap();
        let b = SourceFile::parse("cpp", "x\n").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_crlf_normalized_before_hashing() {
        let a = SourceFile::parse("go", "a\r\nb\r\n").unwrap();
        let b = SourceFile::parse("go", "a\nb\n").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_file_name_prefers_directive() {
        let sf = SourceFile::parse("go", "// :glot, name prog.go\nx\n").unwrap();
        assert_eq!(sf.file_name().as_deref(), Some("prog.go"));
    }

    #[test]
    fn test_file_name_default_from_language() {
        let sf = SourceFile::parse("JavaScript", "x\n").unwrap();
        assert_eq!(sf.file_name().as_deref(), Some("main.js"));
        let sf = SourceFile::parse("c++", "x\n").unwrap();
        assert_eq!(sf.file_name().as_deref(), Some("main.cpp"));
    }

    #[test]
    fn test_file_name_unknown_language_is_none() {
        let sf = SourceFile::parse("brainfuck", "x\n").unwrap();
        assert_eq!(sf.file_name(), None);
    }

    #[test]
    fn test_annotation_blank_runs_collapse() {
        let source = "a\n\n// :show start\n\nb\n// :show end\n";
        let sf = SourceFile::parse("text", source).unwrap();
        assert!(!sf.code_to_run().contains("\n\n\n"));
    }

    #[test]
    fn test_bad_directive_propagates() {
        assert!(SourceFile::parse("go", "// :glot, :bogus\nx\n").is_err());
    }
}
