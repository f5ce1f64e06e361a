//! Configuration management for Docent.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.docent/config.yaml`, or the path in `DOCENT_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with most state stored in `.docent/`.
//! Validation runs once at startup; any violation is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docent/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    pub store: StoreConfig,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub web: WebConfig,
    pub synthesis: SynthesisConfig,
    pub session: SessionConfig,

    /// Allow answers from general knowledge when no source is relevant
    pub extended_knowledge: bool,
}

/// Which document store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Persistent SQLite file
    Sqlite,
    /// Ephemeral in-process store, searched by keyword
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "ephemeral" => Ok(Self::Memory),
            other => Err(AppError::Config(format!(
                "Unknown store backend: {}. Supported: sqlite, memory",
                other
            ))),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// SQLite path, relative to the workspace unless absolute
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from(".docent/store.sqlite"),
        }
    }
}

/// Answer synthesizer (language model) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    /// Provider identifier ("ollama", "gemini")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Custom endpoint URL
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    /// Environment variable consulted for the API key.
    pub fn api_key_env(&self) -> Option<String> {
        self.api_key_env.clone().or_else(|| match self.provider.as_str() {
            "gemini" => Some("GEMINI_API_KEY".to_string()),
            _ => None,
        })
    }
}

/// Embedding capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "trigram", "ollama", or "none" (keyword retrieval only)
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum texts per embedding request
    pub batch_size: usize,

    /// Custom endpoint URL
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: 32,
            endpoint: None,
        }
    }
}

/// Chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingConfig {
    /// Window size in characters
    pub size: usize,

    /// Overlap between consecutive windows in characters
    pub overlap: usize,

    /// Documents larger than this are skipped as defects
    pub max_document_bytes: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 100,
            max_document_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Retrieval and routing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Maximum hits fetched from the store per query
    pub top_k: usize,

    /// Best relevance at or above this activates the document source
    pub answer_threshold: f32,

    /// Hits above this are scanned for embedded URLs
    pub discovery_threshold: f32,

    /// Scan hits for URLs even when the document source is inactive
    pub discover_when_inactive: bool,

    /// Maximum document chunks placed in the context
    pub max_context_chunks: usize,

    /// Context length budget in characters
    pub context_budget_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            answer_threshold: 0.4,
            discovery_threshold: 0.3,
            discover_when_inactive: true,
            max_context_chunks: 3,
            context_budget_chars: 12_000,
        }
    }
}

/// Web fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebConfig {
    pub enabled: bool,

    /// URLs taken from the question text
    pub max_query_urls: usize,

    /// URLs taken from discovery hits
    pub max_discovered_urls: usize,

    pub timeout_secs: u64,

    /// Abort the download past this many bytes
    pub max_bytes: usize,

    /// Truncate extracted text to this many characters
    pub max_chars: usize,

    /// Hosts that are never fetched (substring match)
    pub blocked_hosts: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_query_urls: 2,
            max_discovered_urls: 3,
            timeout_secs: 10,
            max_bytes: 1_000_000,
            max_chars: 10_000,
            blocked_hosts: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "0.0.0.0".to_string(),
                "::1".to_string(),
            ],
        }
    }
}

/// Synthesizer retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthesisConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2,
        }
    }
}

/// Interactive session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub timeout_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_minutes: 5 }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    store: Option<StoreConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    chunking: Option<ChunkingConfig>,
    retrieval: Option<RetrievalConfig>,
    web: Option<WebConfig>,
    synthesis: Option<SynthesisConfig>,
    session: Option<SessionConfig>,
    extended_knowledge: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            store: StoreConfig::default(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            web: WebConfig::default(),
            synthesis: SynthesisConfig::default(),
            session: SessionConfig::default(),
            extended_knowledge: true,
        }
    }
}

/// Parse a permissive boolean flag ("true", "1", "yes").
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl AppConfig {
    /// Load configuration from the config file, environment variables, and defaults.
    ///
    /// Environment variables:
    /// - `DOCENT_WORKSPACE`: Override workspace path
    /// - `DOCENT_CONFIG`: Path to config file
    /// - `DOCENT_STORE`: Store backend (`sqlite`, `memory`)
    /// - `DOCENT_LLM_PROVIDER`: Answer synthesizer provider
    /// - `DOCENT_LLM_MODEL`: Answer synthesizer model
    /// - `DOCENT_EXTENDED_KNOWLEDGE`: Allow general-knowledge answers
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docent_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], but an explicit workspace or config file
    /// (e.g. from command-line flags) wins over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("DOCENT_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        if let Some(config_file) = config_file
            .or_else(|| std::env::var("DOCENT_CONFIG").ok().map(PathBuf::from))
        {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".docent/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env();

        Ok(config)
    }

    /// Apply environment variable overrides (env beats YAML).
    fn apply_env(&mut self) {
        if let Ok(backend) = std::env::var("DOCENT_STORE") {
            match backend.parse() {
                Ok(backend) => self.store.backend = backend,
                Err(e) => tracing::warn!("Ignoring DOCENT_STORE: {}", e),
            }
        }

        if let Ok(provider) = std::env::var("DOCENT_LLM_PROVIDER") {
            self.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCENT_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(flag) = std::env::var("DOCENT_EXTENDED_KNOWLEDGE") {
            self.extended_knowledge = parse_flag(&flag);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(store) = file.store {
            result.store = store;
        }
        if let Some(llm) = file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }
        if let Some(chunking) = file.chunking {
            result.chunking = chunking;
        }
        if let Some(retrieval) = file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(web) = file.web {
            result.web = web;
        }
        if let Some(synthesis) = file.synthesis {
            result.synthesis = synthesis;
        }
        if let Some(session) = file.session {
            result.session = session;
        }
        if let Some(extended) = file.extended_knowledge {
            result.extended_knowledge = extended;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        store: Option<StoreBackend>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(store) = store {
            self.store.backend = store;
        }

        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docent directory.
    pub fn docent_dir(&self) -> PathBuf {
        self.workspace.join(".docent")
    }

    /// Ensure the .docent directory exists.
    pub fn ensure_docent_dir(&self) -> AppResult<()> {
        let dir = self.docent_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docent directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Absolute path of the SQLite store.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            self.workspace.join(&self.store.path)
        }
    }

    /// Resolve the synthesizer API key from its environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.llm
            .api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    /// Validate the configuration. Any error here is fatal at startup.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "gemini"];
        if !known_providers.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                known_providers.join(", ")
            )));
        }

        if self.llm.provider == "gemini" && self.resolve_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.llm.api_key_env().unwrap_or_default()
            )));
        }

        let known_embedders = ["trigram", "ollama", "none"];
        if !known_embedders.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedders.join(", ")
            )));
        }

        if self.embedding.provider != "none" && self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config("Embedding batch size must be positive".to_string()));
        }

        if self.chunking.size == 0 || self.chunking.overlap >= self.chunking.size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunking.overlap, self.chunking.size
            )));
        }

        let r = &self.retrieval;
        for (name, value) in [
            ("answerThreshold", r.answer_threshold),
            ("discoveryThreshold", r.discovery_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if r.discovery_threshold > r.answer_threshold {
            return Err(AppError::Config(format!(
                "discoveryThreshold ({}) must not exceed answerThreshold ({})",
                r.discovery_threshold, r.answer_threshold
            )));
        }

        if r.top_k == 0 || r.context_budget_chars == 0 {
            return Err(AppError::Config(
                "topK and contextBudgetChars must be positive".to_string(),
            ));
        }

        if self.synthesis.max_attempts == 0 {
            return Err(AppError::Config("maxAttempts must be at least 1".to_string()));
        }

        if self.web.enabled && (self.web.timeout_secs == 0 || self.web.max_bytes == 0) {
            return Err(AppError::Config(
                "Web fetch timeout and byte limit must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.chunking.size, 1000);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.retrieval.answer_threshold, 0.4);
        assert_eq!(config.web.max_query_urls, 2);
        assert!(config.extended_knowledge);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_docent_dir() {
        let config = AppConfig::default();
        assert!(config.docent_dir().ends_with(".docent"));
        assert!(config.store_path().ends_with(".docent/store.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some(StoreBackend::Memory),
            Some("gemini".to_string()),
            Some("gemini-2.0-flash".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.store.backend, StoreBackend::Memory);
        assert_eq!(overridden.llm.provider, "gemini");
        assert_eq!(overridden.llm.model, "gemini-2.0-flash");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
extendedKnowledge: false
store:
  backend: memory
retrieval:
  answerThreshold: 0.5
  discoveryThreshold: 0.25
chunking:
  size: 800
  overlap: 80
logging:
  json: true
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert!(!merged.extended_knowledge);
        assert_eq!(merged.store.backend, StoreBackend::Memory);
        assert_eq!(merged.retrieval.answer_threshold, 0.5);
        assert_eq!(merged.retrieval.top_k, 5);
        assert_eq!(merged.chunking.size, 800);
        assert!(merged.log_json);
    }

    #[test]
    fn test_merge_yaml_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "llm:\n  provider: ollama\n  model: mistral\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.llm.model, "mistral");
    }

    #[test]
    fn test_load_with_reads_workspace_config() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".docent")).unwrap();
        std::fs::write(
            temp.path().join(".docent/config.yaml"),
            "chunking:\n  size: 640\n  overlap: 64\n",
        )
        .unwrap();

        let config = AppConfig::load_with(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.chunking.size, 640);
    }

    #[test]
    fn test_load_with_missing_workspace_fails() {
        let result = AppConfig::load_with(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval: [not, a, map]").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_gemini_requires_key() {
        let mut config = AppConfig::default();
        config.llm.provider = "gemini".to_string();
        config.llm.api_key_env = Some("DOCENT_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DOCENT_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_validate_overlap_must_be_smaller() {
        let mut config = AppConfig::default();
        config.chunking.overlap = config.chunking.size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_discovery_not_above_answer() {
        let mut config = AppConfig::default();
        config.retrieval.discovery_threshold = 0.6;
        assert!(config.validate().is_err());

        config.retrieval.discovery_threshold = 0.2;
        config.retrieval.answer_threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("sqlite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("YES"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
