//! `bf build` command.

use std::path::PathBuf;

use clap::Args;

use bf_model::DocumentId;
use bf_render::CodeRunner;
use bf_sandbox::SandboxClient;
use bf_site::{BuildOptions, Builder, Collection};
use bf_sync::{HttpDocumentService, SyncOptions};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for `bf build`.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Collections to build, as `slug=root-document-id` pairs.
    #[arg(required = true, value_name = "SLUG=ROOT_ID")]
    collections: Vec<String>,

    /// Document service base URL.
    #[arg(long, env = "BF_SERVICE_URL")]
    service_url: String,

    /// Document service API token.
    #[arg(long, env = "BF_SERVICE_TOKEN", hide_env_values = true)]
    service_token: String,

    /// Sandbox run service base URL. Omit to skip snippet execution
    /// (cached results are still used).
    #[arg(long, env = "BF_SANDBOX_URL")]
    sandbox_url: Option<String>,

    /// Sandbox snippet service URL.
    #[arg(long, env = "BF_SNIPPETS_URL", default_value = "https://snippets.glot.io/snippets")]
    snippets_url: String,

    /// Sandbox API token.
    #[arg(long, env = "BF_SANDBOX_TOKEN", hide_env_values = true, default_value = "")]
    sandbox_token: String,

    /// Directory for raw fetched documents.
    #[arg(long, default_value = "store")]
    store_dir: PathBuf,

    /// Content cache log file.
    #[arg(long, default_value = "cache/eval.log")]
    cache_file: PathBuf,

    /// Output directory for rendered pages.
    #[arg(long, default_value = "www")]
    out_dir: PathBuf,

    /// Build from the store only; never fetch.
    #[arg(long)]
    no_download: bool,

    /// Enable verbose (info-level) logging.
    #[arg(long, short)]
    pub(crate) verbose: bool,
}

impl BuildArgs {
    pub(crate) fn execute(&self, output: &Output) -> Result<(), CliError> {
        let collections = self.parse_collections()?;

        if let Some(dir) = self.cache_file.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let service = HttpDocumentService::new(&self.service_url, &self.service_token);
        let sandbox = self
            .sandbox_url
            .as_deref()
            .map(|url| SandboxClient::new(url, &self.snippets_url, &self.sandbox_token));
        let runner = sandbox.as_ref().map(|s| s as &dyn CodeRunner);

        let options = BuildOptions {
            store_dir: self.store_dir.clone(),
            cache_path: self.cache_file.clone(),
            output_dir: self.out_dir.clone(),
            sync: SyncOptions {
                no_download: self.no_download,
                ..SyncOptions::default()
            },
        };

        let report = Builder::new(&service, runner, options).build(&collections)?;

        output.info(&format!(
            "{} pages written ({} fetched, {} from store)",
            report.pages_written, report.sync_stats.downloaded, report.sync_stats.from_store
        ));
        for link in &report.link_reports {
            output.warning(&format!(
                "unresolved link in {}: {}",
                link.document, link.target
            ));
        }
        if report.has_failures() {
            for failure in &report.failures {
                output.error(&format!("{}: {}", failure.collection, failure.error));
            }
            return Err(CliError::Validation(format!(
                "{} collection(s) failed",
                report.failures.len()
            )));
        }
        output.success("Build complete");
        Ok(())
    }

    /// Parse `slug=root-id` collection arguments.
    fn parse_collections(&self) -> Result<Vec<Collection>, CliError> {
        self.collections
            .iter()
            .map(|pair| {
                let (slug, id) = pair.split_once('=').ok_or_else(|| {
                    CliError::Validation(format!("expected SLUG=ROOT_ID, got '{pair}'"))
                })?;
                let root_id: DocumentId = id
                    .parse()
                    .map_err(|e| CliError::Validation(format!("{e}")))?;
                Ok(Collection {
                    root_id,
                    slug: slug.to_owned(),
                })
            })
            .collect()
    }
}
