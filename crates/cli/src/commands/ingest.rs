//! Ingest command handler.
//!
//! Walks a file or directory and brings the document store up to date.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{FsSource, IngestOptions, IngestReport, KnowledgeBase};
use std::path::{Path, PathBuf};

/// Ingest a file or directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// File or directory to ingest
    pub path: PathBuf,

    /// Re-embed documents even when their content is unchanged
    #[arg(long)]
    pub force_rebuild: bool,

    /// Keep stored documents that no longer exist under PATH
    #[arg(long)]
    pub no_prune: bool,

    /// Only ingest paths containing this text (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing this text (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Documents processed in parallel
    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Ingesting {:?}", self.path);

        let kb = KnowledgeBase::open(config)?;
        let source = FsSource::new(&self.path, config.chunking.max_document_bytes)
            .with_base(&config.workspace)
            .with_include(self.include.clone())
            .with_exclude(self.exclude.clone());
        // A single file says nothing about its siblings
        let options = IngestOptions {
            force_rebuild: self.force_rebuild,
            prune_removed: !self.no_prune && !self.path.is_file(),
            concurrency: self.concurrency.max(1),
        };

        let report = kb.ingest(&source, &options).await?;

        if self.json {
            super::print_json(&report)?;
        } else {
            println!("{}", summary(&report));
        }

        Ok(())
    }
}

/// Load `path` into the store before answering. Nothing is pruned.
pub(crate) async fn preload(kb: &KnowledgeBase, path: &Path) -> AppResult<IngestReport> {
    let source = FsSource::new(path, kb.config().chunking.max_document_bytes)
        .with_base(&kb.config().workspace);
    let options = IngestOptions {
        prune_removed: false,
        ..IngestOptions::default()
    };
    let report = kb.ingest(&source, &options).await?;
    tracing::info!("{}", summary(&report));
    Ok(report)
}

fn summary(report: &IngestReport) -> String {
    format!(
        "Ingested: {} new, {} changed, {} unchanged, {} removed, {} failed ({} chunks) in {:.2}s",
        report.new,
        report.changed,
        report.unchanged,
        report.removed,
        report.failed,
        report.chunks_written,
        report.duration_secs
    )
}
