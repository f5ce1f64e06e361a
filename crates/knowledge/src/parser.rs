//! Text extraction from local files.

use crate::web::fetcher::collect_text;
use docent_core::{AppError, AppResult};
use scraper::Html;
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Code,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("rs") | Some("py") | Some("js") | Some("ts") | Some("go") | Some("c")
            | Some("cpp") | Some("java") | Some("sh") | Some("yaml") | Some("yml")
            | Some("json") | Some("toml") => Self::Code,
            Some("txt") | Some("text") | Some("rst") | Some("csv") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Code => "code",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Read `path` and extract clean text.
///
/// Oversized, binary and non-UTF-8 files are rejected with
/// `AppError::Knowledge` so the caller can log and skip them.
pub fn parse_file(path: &Path, max_bytes: usize) -> AppResult<String> {
    let size = fs::metadata(path)?.len();
    if size > max_bytes as u64 {
        return Err(AppError::Knowledge(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            size,
            max_bytes
        )));
    }

    let bytes = fs::read(path)?;
    if bytes.contains(&0) {
        return Err(AppError::Knowledge(format!(
            "{} looks binary",
            path.display()
        )));
    }

    let raw = String::from_utf8(bytes).map_err(|_| {
        AppError::Knowledge(format!("{} is not valid UTF-8", path.display()))
    })?;

    Ok(match ContentType::from_path(path) {
        ContentType::Markdown => clean_markdown(&raw),
        ContentType::Html => clean_html(&raw),
        ContentType::Code => clean_code(&raw),
        ContentType::PlainText | ContentType::Unknown => raw,
    })
}

/// Drop heading markers, rules and fences; keep link targets for URL discovery.
fn clean_markdown(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start_matches('#').trim())
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("---")
                && !line.starts_with("```")
                && !line.starts_with("~~~")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_html(text: &str) -> String {
    let document = Html::parse_document(text);
    let mut parts = Vec::new();
    collect_text(document.root_element(), &mut parts);
    parts.join(" ")
}

/// Drop blank lines and whole-line comments.
fn clean_code(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_path(Path::new("file.md")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("FILE.HTML")), ContentType::Html);
        assert_eq!(ContentType::from_path(Path::new("file.rs")), ContentType::Code);
        assert_eq!(ContentType::from_path(Path::new("file.txt")), ContentType::PlainText);
        assert_eq!(ContentType::from_path(Path::new("file")), ContentType::Unknown);
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSee [docs](https://docs.rs)\n\n```rust\ncode\n```\n\n---\nMore text";
        let output = clean_markdown(input);
        assert_eq!(output, "Header\nSee [docs](https://docs.rs)\ncode\nMore text");
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><style>b{}</style></head><body><p>Héllo <b>world</b></p><script>x()</script></body></html>";
        assert_eq!(clean_html(input), "Héllo world");
    }

    #[test]
    fn test_clean_code() {
        let input = "// Comment\nfn main() {\n    println!(\"hello\");\n}";
        let output = clean_code(input);
        assert!(!output.contains("// Comment"));
        assert!(output.starts_with("fn main()"));
    }

    #[test]
    fn test_parse_file_rejects_defects() {
        let dir = TempDir::new().unwrap();

        let big = dir.path().join("big.txt");
        fs::write(&big, "x".repeat(64)).unwrap();
        assert!(matches!(parse_file(&big, 16), Err(AppError::Knowledge(_))));
        assert_eq!(parse_file(&big, 64).unwrap().len(), 64);

        let binary = dir.path().join("blob.bin");
        fs::write(&binary, [0x89, b'P', b'N', b'G', 0, 1]).unwrap();
        assert!(parse_file(&binary, 1024).is_err());

        let latin1 = dir.path().join("old.txt");
        fs::write(&latin1, [b'c', b'a', 0xE9]).unwrap();
        assert!(parse_file(&latin1, 1024).is_err());
    }
}
