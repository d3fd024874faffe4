//! Remote code-execution sandbox client.
//!
//! Submits labeled source files to a glot-style sandbox service and
//! returns the captured output, and registers public snippets to obtain
//! shareable ids. One HTTP POST per operation, JSON request and response,
//! token-authenticated.
//!
//! This layer deliberately does **no** retrying: the caller can tell a
//! transport failure ([`SandboxError`]) from a sandbox-reported program
//! error ([`RunOutcome::error`]) and decide per call site.

mod language;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ureq::Agent;

pub use language::normalize_language;

/// Default HTTP timeout. Sandbox runs compile code remotely, so this is
/// much longer than an ordinary API call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Error from sandbox operations.
///
/// All variants are transport-level: the request never completed, or the
/// response could not be understood. A program that ran and failed is
/// *not* an error here — see [`RunOutcome::error`].
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Request failed (network error, timeout, TLS, ...).
    #[error("sandbox request failed")]
    Http(#[from] ureq::Error),

    /// Service returned an error status.
    #[error("sandbox HTTP error: {status} - {body}")]
    Status {
        status: u16,
        body: String,
    },

    /// Response body was not valid JSON for the expected shape.
    ///
    /// Distinct from a valid empty response: HTTP 204 means the program
    /// ran and printed nothing, which decodes to an all-empty outcome.
    #[error("sandbox returned an undecodable response: {0}")]
    Decode(String),

    /// The language is not in the sandbox's language table.
    #[error("'{0}' is not a recognized sandbox language")]
    UnknownLanguage(String),
}

/// One named source file submitted for execution.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SandboxFile {
    pub name: String,
    pub content: String,
}

impl SandboxFile {
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Result of a sandbox run.
///
/// `error` is the sandbox's own report (compile error, crash, resource
/// limit); it is empty for a clean run. An empty `stdout` with an empty
/// `error` is a valid outcome — a program may simply print nothing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct RunOutcome {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub error: String,
}

impl RunOutcome {
    /// Whether the sandbox reported the program itself failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.error.is_empty()
    }
}

#[derive(Serialize)]
struct RunRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdin: Option<&'a str>,
    files: &'a [SandboxFile],
}

#[derive(Serialize)]
struct SnippetRequest<'a> {
    language: &'a str,
    title: &'a str,
    public: bool,
    files: &'a [SandboxFile],
}

#[derive(Deserialize)]
struct SnippetResponse {
    id: String,
}

/// Client for the sandbox's run and snippet endpoints.
pub struct SandboxClient {
    agent: Agent,
    run_base: String,
    snippets_url: String,
    token: String,
}

impl SandboxClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `run_base` - base URL of the run service (e.g. `https://run.glot.io`)
    /// * `snippets_url` - URL of the snippet-creation endpoint
    /// * `token` - API token sent as the `Authorization` header
    #[must_use]
    pub fn new(run_base: &str, snippets_url: &str, token: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(DEFAULT_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            run_base: run_base.trim_end_matches('/').to_owned(),
            snippets_url: snippets_url.to_owned(),
            token: token.to_owned(),
        }
    }

    /// Execute `files` under `language` and return the captured output.
    ///
    /// `command` overrides the sandbox's default run command; `stdin` is
    /// fed to the program. A timeout surfaces as [`SandboxError::Http`],
    /// never as program output.
    pub fn run(
        &self,
        language: &str,
        files: &[SandboxFile],
        command: Option<&str>,
        stdin: Option<&str>,
    ) -> Result<RunOutcome, SandboxError> {
        let language = normalize_language(language);
        let url = language::run_url(&self.run_base, &language)?;
        let req = RunRequest {
            command,
            stdin,
            files,
        };

        tracing::debug!(%language, files = files.len(), "sandbox run");
        let (status, body) = self.post_json(&url, &req)?;
        parse_run_response(status, &body).inspect_err(|_| {
            for f in files {
                tracing::debug!(name = %f.name, "file submitted in failing run");
            }
        })
    }

    /// Register a public snippet and return its shareable id.
    pub fn create_snippet(
        &self,
        language: &str,
        title: &str,
        file: &SandboxFile,
    ) -> Result<String, SandboxError> {
        let language = normalize_language(language);
        // validates the language is one the playground can open
        language::run_url(&self.run_base, &language)?;

        let files = [file.clone()];
        let req = SnippetRequest {
            language: &language,
            title,
            public: true,
            files: &files,
        };
        let (status, body) = self.post_json(&self.snippets_url, &req)?;
        if status >= 400 {
            return Err(SandboxError::Status { status, body });
        }
        let rsp: SnippetResponse =
            serde_json::from_str(&body).map_err(|e| SandboxError::Decode(e.to_string()))?;
        Ok(rsp.id)
    }

    fn post_json<T: Serialize>(&self, url: &str, req: &T) -> Result<(u16, String), SandboxError> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", &format!("Token {}", self.token))
            .header("Content-Type", "application/json")
            .send_json(req)?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .unwrap_or_else(|_| String::from("(unable to read body)"));
        Ok((status, body))
    }
}

/// Decode a run response body.
///
/// HTTP 204 is a valid run with no output at all; an error status carries
/// the service's explanation in the body; anything else must decode as
/// the JSON outcome shape.
fn parse_run_response(status: u16, body: &str) -> Result<RunOutcome, SandboxError> {
    if status == 204 {
        tracing::debug!("sandbox returned 204 No Content (program printed nothing)");
        return Ok(RunOutcome::default());
    }
    if status >= 400 {
        return Err(SandboxError::Status {
            status,
            body: body.to_owned(),
        });
    }
    serde_json::from_str(body).map_err(|e| SandboxError::Decode(e.to_string()))
}
