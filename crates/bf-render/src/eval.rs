//! Cache-first snippet evaluation.
//!
//! Executing a snippet and registering a shareable playground snippet are
//! both remote calls, so both go through the content-addressed cache
//! first. The cache key is the snippet's [`SourceFile::cache_key`]; two
//! blocks that execute the same code share one cache entry no matter how
//! differently they are displayed.

use bf_cache::{CacheError, ContentCache, RecordKind};
use bf_sandbox::{RunOutcome, SandboxError, SandboxFile};

use crate::source_file::SourceFile;

/// Error from evaluating one snippet.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Transport-level sandbox failure.
    #[error("sandbox error")]
    Sandbox(#[from] SandboxError),

    /// Cache failure (I/O, or a conflicting entry).
    #[error("cache error")]
    Cache(#[from] CacheError),

    /// The program failed and the directive did not allow it.
    #[error("snippet '{title}' failed: {error}")]
    ExecutionFailed { title: String, error: String },

    /// No file name: the language has no default and the directive named
    /// none.
    #[error("no file name for language '{0}'; add a 'name' directive")]
    NoFileName(String),

    /// Execution was requested but no sandbox is configured and the cache
    /// has no entry.
    #[error("snippet requires execution but no sandbox is configured")]
    NoRunner,
}

/// Seam over the sandbox client so tests can substitute a fake.
pub trait CodeRunner: Send + Sync {
    fn run(
        &self,
        language: &str,
        files: &[SandboxFile],
        command: Option<&str>,
        stdin: Option<&str>,
    ) -> Result<RunOutcome, SandboxError>;

    fn create_snippet(
        &self,
        language: &str,
        title: &str,
        file: &SandboxFile,
    ) -> Result<String, SandboxError>;
}

impl CodeRunner for bf_sandbox::SandboxClient {
    fn run(
        &self,
        language: &str,
        files: &[SandboxFile],
        command: Option<&str>,
        stdin: Option<&str>,
    ) -> Result<RunOutcome, SandboxError> {
        Self::run(self, language, files, command, stdin)
    }

    fn create_snippet(
        &self,
        language: &str,
        title: &str,
        file: &SandboxFile,
    ) -> Result<String, SandboxError> {
        Self::create_snippet(self, language, title, file)
    }
}

/// Derived artifacts for one snippet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Evaluated {
    /// Captured execution output, when the directive requested execution.
    pub output: Option<String>,
    /// Shareable playground URL, when one was registered.
    pub playground_url: Option<String>,
}

/// Evaluates snippets through the cache, falling back to the sandbox.
pub struct SnippetEvaluator<'a> {
    cache: &'a ContentCache,
    runner: Option<&'a dyn CodeRunner>,
    playground_base: String,
}

impl<'a> SnippetEvaluator<'a> {
    /// Default base URL for shareable snippet links.
    pub const DEFAULT_PLAYGROUND_BASE: &'static str = "https://glot.io/snippets";

    #[must_use]
    pub fn new(cache: &'a ContentCache, runner: Option<&'a dyn CodeRunner>) -> Self {
        Self {
            cache,
            runner,
            playground_base: Self::DEFAULT_PLAYGROUND_BASE.to_owned(),
        }
    }

    /// Override the base URL used to build shareable links.
    #[must_use]
    pub fn with_playground_base(mut self, base: &str) -> Self {
        self.playground_base = base.trim_end_matches('/').to_owned();
        self
    }

    /// Evaluate one snippet: execute (cache-first) when the directive asks
    /// for it, and register a shareable snippet unless suppressed.
    ///
    /// `title` names the snippet in the playground and in errors; it is
    /// the page title of the document the block came from.
    pub fn evaluate(&self, sf: &SourceFile, title: &str) -> Result<Evaluated, EvalError> {
        if !sf.directive.execute {
            return Ok(Evaluated::default());
        }

        let language = bf_sandbox::normalize_language(&sf.language);
        let file_name = sf
            .file_name()
            .ok_or_else(|| EvalError::NoFileName(sf.language.clone()))?;
        let key = sf.cache_key();

        let output = self.run_output(sf, &language, &file_name, &key, title)?;

        let playground_url = if sf.directive.no_playground {
            None
        } else {
            let id = self.snippet_id(sf, &language, &file_name, &key, title)?;
            Some(format!("{}/{id}", self.playground_base))
        };

        Ok(Evaluated {
            output: Some(output),
            playground_url,
        })
    }

    fn run_output(
        &self,
        sf: &SourceFile,
        language: &str,
        file_name: &str,
        key: &str,
        title: &str,
    ) -> Result<String, EvalError> {
        if let Some(output) = self.cache.get(RecordKind::RunOutput, key) {
            tracing::debug!(key, "run output from cache");
            return Ok(output);
        }
        let runner = self.runner.ok_or(EvalError::NoRunner)?;

        tracing::info!(%language, title, "executing snippet in sandbox");
        let files = [SandboxFile::new(file_name, sf.code_to_run())];
        let outcome = runner.run(
            language,
            &files,
            sf.directive.run_cmd.as_deref(),
            None,
        )?;

        if outcome.failed() && !sf.directive.allow_error {
            return Err(EvalError::ExecutionFailed {
                title: title.to_owned(),
                error: outcome.error,
            });
        }

        let output = compose_output(&outcome, sf.directive.allow_error);
        self.cache.put(RecordKind::RunOutput, key, &output)?;
        Ok(output)
    }

    fn snippet_id(
        &self,
        sf: &SourceFile,
        language: &str,
        file_name: &str,
        key: &str,
        title: &str,
    ) -> Result<String, EvalError> {
        if let Some(id) = self.cache.get(RecordKind::SnippetId, key) {
            tracing::debug!(key, "snippet id from cache");
            return Ok(id);
        }
        let runner = self.runner.ok_or(EvalError::NoRunner)?;

        tracing::info!(%language, title, "registering playground snippet");
        let file = SandboxFile::new(file_name, sf.code_to_run());
        let id = runner.create_snippet(language, title, &file)?;
        self.cache.put(RecordKind::SnippetId, key, &id)?;
        Ok(id)
    }
}

/// Combine a run's streams into the text shown beneath the code panel.
///
/// With `allow_error`, the sandbox's error report is included — the point
/// of an intentionally failing example is to show the failure.
fn compose_output(outcome: &RunOutcome, allow_error: bool) -> String {
    let mut out = String::new();
    out.push_str(&outcome.stdout);
    if !outcome.stderr.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&outcome.stderr);
    }
    if allow_error && outcome.failed() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&outcome.error);
    }
    out
}
