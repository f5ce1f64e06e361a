//! Chat command handler.
//!
//! A line-oriented REPL bound to one session. The loop ends on `/quit`, on
//! end of input, or when the session sits idle past its timeout.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{AskPipeline, KnowledgeBase, SessionManager};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Interactive question session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Never fall back to general knowledge
    #[arg(long)]
    pub no_extended_knowledge: bool,

    /// Ingest this file or directory first (useful with --store memory)
    #[arg(long)]
    pub source: Option<PathBuf>,
}

/// Why the REPL stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatEnd {
    Quit,
    EndOfInput,
    Expired,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let kb = KnowledgeBase::open(config)?;
        if let Some(path) = &self.source {
            super::ingest::preload(&kb, path).await?;
        }
        let pipeline = kb.ask_pipeline().await?;
        let extended = config.extended_knowledge && !self.no_extended_knowledge;

        let sessions = SessionManager::from_config(&config.session);
        let session_id = sessions.create();
        tracing::info!("Chat session {} started", session_id);

        println!("Ask a question, or /quit to leave.");
        let stdin = BufReader::new(tokio::io::stdin());
        let end = run_session(&pipeline, &sessions, &session_id, extended, stdin).await?;

        match end {
            ChatEnd::Expired => println!(
                "Session expired after {} minutes of inactivity.",
                config.session.timeout_minutes
            ),
            ChatEnd::Quit | ChatEnd::EndOfInput => {}
        }

        sessions.clear(&session_id);
        sessions.shutdown().await;
        tracing::info!("Chat session {} ended ({:?})", session_id, end);
        Ok(())
    }
}

async fn run_session<R>(
    pipeline: &AskPipeline,
    sessions: &SessionManager,
    session_id: &str,
    extended: bool,
    input: R,
) -> AppResult<ChatEnd>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            _ = sessions.expired(session_id) => return Ok(ChatEnd::Expired),
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            println!();
            return Ok(ChatEnd::EndOfInput);
        };

        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => return Ok(ChatEnd::Quit),
            "/session" => {
                if let Some(info) = sessions.info(session_id) {
                    println!("Session {} expires in {}s", info.id, info.remaining_secs);
                }
                continue;
            }
            _ => {}
        }

        sessions.touch(session_id);
        match pipeline.ask(question, extended).await {
            Ok(outcome) => println!("{}\n", outcome.render()),
            // One failed question does not end the session
            Err(e) => {
                tracing::error!("Failed to answer: {}", e);
                println!("Sorry, that question could not be answered: {}\n", e);
            }
        }
        sessions.touch(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docent_core::StoreBackend;
    use docent_knowledge::rag::AssembledContext;
    use docent_knowledge::{AnswerSynthesizer, SourceKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSynthesizer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AnswerSynthesizer for CountingSynthesizer {
        async fn synthesize(
            &self,
            _question: &str,
            _context: &AssembledContext,
            _sources: &[SourceKind],
        ) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("An answer.".to_string())
        }
    }

    async fn pipeline(synth: Arc<CountingSynthesizer>) -> AskPipeline {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.web.enabled = false;
        let kb = KnowledgeBase::open(&config).unwrap();
        kb.ask_pipeline_with(synth, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_quit_ends_session_after_answering() {
        let synth = Arc::new(CountingSynthesizer::default());
        let pipeline = pipeline(synth.clone()).await;
        let sessions = SessionManager::new(Duration::from_secs(60));
        let id = sessions.create();

        let input: &[u8] = b"What is docent?\n\n/quit\nnever asked\n";
        let end = run_session(&pipeline, &sessions, &id, true, input).await.unwrap();

        assert_eq!(end, ChatEnd::Quit);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
        sessions.shutdown().await;
    }

    #[tokio::test]
    async fn test_end_of_input_ends_session() {
        let synth = Arc::new(CountingSynthesizer::default());
        let pipeline = pipeline(synth.clone()).await;
        let sessions = SessionManager::new(Duration::from_secs(60));
        let id = sessions.create();

        let input: &[u8] = b"one question";
        let end = run_session(&pipeline, &sessions, &id, true, input).await.unwrap();

        assert_eq!(end, ChatEnd::EndOfInput);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
        sessions.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_expires() {
        let synth = Arc::new(CountingSynthesizer::default());
        let pipeline = pipeline(synth.clone()).await;
        let sessions = SessionManager::new(Duration::from_secs(300));
        let id = sessions.create();

        // Writer stays open, so reads never complete
        let (_writer, reader) = tokio::io::duplex(64);
        let end = run_session(&pipeline, &sessions, &id, true, BufReader::new(reader))
            .await
            .unwrap();

        assert_eq!(end, ChatEnd::Expired);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
        sessions.shutdown().await;
    }
}
