//! `bf eval` command - run one source file through the sandbox.

use std::path::PathBuf;

use clap::Args;

use bf_sandbox::{SandboxClient, SandboxFile};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for `bf eval`.
#[derive(Args)]
pub(crate) struct EvalArgs {
    /// Source file to execute.
    file: PathBuf,

    /// Language; defaults to the file extension.
    #[arg(long)]
    language: Option<String>,

    /// Sandbox run service base URL.
    #[arg(long, env = "BF_SANDBOX_URL", default_value = "https://run.glot.io")]
    sandbox_url: String,

    /// Sandbox API token.
    #[arg(long, env = "BF_SANDBOX_TOKEN", hide_env_values = true, default_value = "")]
    sandbox_token: String,

    /// Enable verbose (info-level) logging.
    #[arg(long, short)]
    pub(crate) verbose: bool,
}

impl EvalArgs {
    pub(crate) fn execute(&self, output: &Output) -> Result<(), CliError> {
        let content = std::fs::read_to_string(&self.file)?;
        let name = self
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CliError::Validation("file has no usable name".to_owned()))?;
        let language = match &self.language {
            Some(lang) => lang.clone(),
            None => self
                .file
                .extension()
                .and_then(|e| e.to_str())
                .map(language_from_extension)
                .ok_or_else(|| {
                    CliError::Validation("cannot infer language; pass --language".to_owned())
                })?,
        };

        let client = SandboxClient::new(&self.sandbox_url, "", &self.sandbox_token);
        let outcome = client.run(
            &language,
            &[SandboxFile::new(name, content)],
            None,
            None,
        )?;

        if !outcome.stdout.is_empty() {
            output.info(&outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            output.warning(&outcome.stderr);
        }
        if outcome.failed() {
            return Err(CliError::Validation(format!(
                "sandbox reported: {}",
                outcome.error
            )));
        }
        output.success("OK");
        Ok(())
    }
}

/// Language name from a file extension.
fn language_from_extension(ext: &str) -> String {
    match ext {
        "go" => "go",
        "js" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "cpp" | "cc" | "cxx" => "cpp",
        "c" => "c",
        "rb" => "ruby",
        other => other,
    }
    .to_owned()
}
