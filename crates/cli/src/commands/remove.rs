//! Remove command handler.

use clap::Args;
use docent_core::{config::AppConfig, AppError, AppResult};
use docent_knowledge::KnowledgeBase;

/// Remove a document and its chunks
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Document id as shown by `docent stats --detailed`
    pub id: String,
}

impl RemoveCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let kb = KnowledgeBase::open(config)?;

        if !kb.remove(&self.id).await? {
            return Err(AppError::Knowledge(format!(
                "No document with id '{}'",
                self.id
            )));
        }

        println!("Removed {}", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_unknown_document_fails() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();

        let cmd = RemoveCommand {
            id: "missing.md".to_string(),
        };
        let result = cmd.execute(&config).await;
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }
}
