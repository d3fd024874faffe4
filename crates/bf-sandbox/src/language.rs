//! Sandbox language table.
//!
//! The run service exposes one endpoint per language. The table is
//! compiled in; submitting an unlisted language is caught here instead of
//! as a confusing 404 from the service.

use crate::SandboxError;

/// Languages the run service accepts, by endpoint name.
const LANGUAGES: &[&str] = &[
    "assembly",
    "ats",
    "bash",
    "c",
    "clojure",
    "cobol",
    "coffeescript",
    "cpp",
    "crystal",
    "csharp",
    "d",
    "elixir",
    "elm",
    "erlang",
    "fsharp",
    "go",
    "groovy",
    "haskell",
    "idris",
    "java",
    "javascript",
    "julia",
    "kotlin",
    "lua",
    "mercury",
    "nim",
    "ocaml",
    "perl",
    "php",
    "python",
    "ruby",
    "rust",
    "scala",
    "swift",
    "typescript",
];

/// Map a user-facing language name to the sandbox's endpoint name.
///
/// Lowercases and folds the aliases document authors actually use
/// (`C++` / `cplusplus` name the `cpp` endpoint).
#[must_use]
pub fn normalize_language(language: &str) -> String {
    let lower = language.to_ascii_lowercase();
    match lower.as_str() {
        "c++" | "cplusplus" => "cpp".to_owned(),
        _ => lower,
    }
}

/// Run-endpoint URL for a (normalized) language.
pub(crate) fn run_url(base: &str, language: &str) -> Result<String, SandboxError> {
    if LANGUAGES.contains(&language) {
        Ok(format!("{base}/languages/{language}/latest"))
    } else {
        Err(SandboxError::UnknownLanguage(language.to_owned()))
    }
}
