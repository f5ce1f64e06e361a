//! Stats command handler.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{DocumentStore, KnowledgeBase};

/// Show document store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// List every stored document
    #[arg(short, long)]
    pub detailed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let kb = KnowledgeBase::open(config)?;
        let stats = kb.stats().await?;
        let documents = kb.list_documents().await?;

        if self.json {
            return super::print_json(&serde_json::json!({
                "backend": kb.store().backend_name(),
                "documents": stats.documents,
                "chunks": stats.chunks,
                "avgChunksPerDoc": stats.avg_chunks_per_doc,
                "dimension": stats.dimension,
                "items": documents,
            }));
        }

        println!("Store:      {}", kb.store().backend_name());
        println!("Documents:  {}", stats.documents);
        println!("Chunks:     {}", stats.chunks);
        println!("Avg/doc:    {:.1}", stats.avg_chunks_per_doc);
        match stats.dimension {
            Some(dim) => println!("Dimension:  {}", dim),
            None => println!("Dimension:  (no vectors)"),
        }

        if self.detailed {
            println!();
            for doc in &documents {
                println!(
                    "{:>4}  {}  {}",
                    doc.chunk_count,
                    doc.updated_at.format("%Y-%m-%d %H:%M"),
                    doc.id
                );
            }
        }

        Ok(())
    }
}
