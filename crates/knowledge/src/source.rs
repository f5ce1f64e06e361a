//! Document sources: enumerate stable ids with raw text.

use crate::parser;
use crate::types::SourceDocument;
use docent_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Enumerates the documents that should currently be in the store.
///
/// A document missing from the listing is treated as removed.
pub trait DocumentSource: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    fn list(&self) -> AppResult<Vec<SourceDocument>>;

    /// Id prefix this listing is authoritative for.
    ///
    /// Only stored ids equal to it or below it (`scope/...`) can be treated
    /// as removed. `None` covers the whole store.
    fn scope(&self) -> Option<String> {
        None
    }
}

/// Files under a directory.
///
/// Ids are paths relative to the listed root, or relative to a base
/// directory set with [`FsSource::with_base`].
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
    base: Option<PathBuf>,
    include: Vec<String>,
    exclude: Vec<String>,
    max_bytes: usize,
}

/// Path fragments never worth ingesting.
const DEFAULT_EXCLUDES: &[&str] = &["/.git/", "/.docent/", "/target/", "/node_modules/"];

impl FsSource {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            base: None,
            include: Vec::new(),
            exclude: Vec::new(),
            max_bytes,
        }
    }

    /// Key ids by their path below `base`, so a file keeps one id whichever
    /// directory it is ingested through. Roots outside `base` are keyed by
    /// their canonical absolute path.
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Only keep paths containing one of these substrings.
    pub fn with_include(mut self, patterns: Vec<String>) -> Self {
        self.include = patterns;
        self
    }

    /// Drop paths containing any of these substrings.
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    fn should_include(&self, relative: &str) -> bool {
        let padded = format!("/{}", relative);
        if DEFAULT_EXCLUDES.iter().any(|p| padded.contains(p)) {
            return false;
        }
        if self.exclude.iter().any(|p| relative.contains(p.as_str())) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| relative.contains(p.as_str()))
    }

    fn relative_path(&self, path: &Path) -> String {
        join_components(path.strip_prefix(&self.root).unwrap_or(path))
    }

    /// Id of the root itself; empty when ids are root-relative.
    fn root_id(&self) -> String {
        let Some(base) = &self.base else {
            return String::new();
        };
        let root = canonical(&self.root);
        match root.strip_prefix(canonical(base)) {
            Ok(relative) => join_components(relative),
            Err(_) => root.to_string_lossy().replace('\\', "/"),
        }
    }

    fn file_id(&self, root_id: &str, relative: &str) -> String {
        if root_id.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", root_id, relative)
        }
    }

    fn single_file_id(&self) -> String {
        match self.root_id() {
            id if !id.is_empty() => id,
            _ => self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.root.display().to_string()),
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn join_components(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl DocumentSource for FsSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list(&self) -> AppResult<Vec<SourceDocument>> {
        if !self.root.exists() {
            return Err(AppError::Knowledge(format!(
                "Source path does not exist: {}",
                self.root.display()
            )));
        }

        // A single file is its own listing
        if self.root.is_file() {
            let name = self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.root.display().to_string());
            let content = parser::parse_file(&self.root, self.max_bytes)?;
            return Ok(vec![SourceDocument::new(self.single_file_id(), name, content)]);
        }

        let root_id = self.root_id();
        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = self.relative_path(entry.path());
            if !self.should_include(&relative) {
                continue;
            }
            let id = self.file_id(&root_id, &relative);

            match parser::parse_file(entry.path(), self.max_bytes) {
                Ok(content) => {
                    debug!("Listed {} ({} bytes)", id, content.len());
                    let name = entry.file_name().to_string_lossy().to_string();
                    documents.push(SourceDocument::new(id, name, content));
                }
                Err(e) => warn!("Skipping {}: {}", id, e),
            }
        }

        Ok(documents)
    }

    fn scope(&self) -> Option<String> {
        if self.root.is_file() {
            return Some(self.single_file_id());
        }
        self.base.as_ref().map(|_| self.root_id())
    }
}

/// In-memory listing, for embedding callers and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<SourceDocument>,
}

impl StaticSource {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }
}

impl DocumentSource for StaticSource {
    fn describe(&self) -> String {
        format!("{} static documents", self.documents.len())
    }

    fn list(&self) -> AppResult<Vec<SourceDocument>> {
        Ok(self.documents.clone())
    }
}
