//! Raw source documents for evidence checks.

use crate::error::{GraphError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drop a leading YAML front-matter block and the metadata preamble.
///
/// After the front matter, everything before the first line that is non-blank,
/// does not start with `http`, contains no `|` and is not a `#` heading is
/// treated as preamble. If no line qualifies the text is returned as is.
pub fn strip_preamble(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();

    let mut start = 0;
    if lines.first().map(|l| l.trim_end()) == Some("---") {
        if let Some(end) = lines
            .iter()
            .skip(1)
            .position(|l| l.trim_end() == "---")
        {
            start = end + 2;
        }
    }

    let body = &lines[start.min(lines.len())..];
    let first = body
        .iter()
        .position(|line| {
            !line.trim().is_empty()
                && !line.starts_with("http")
                && !line.contains('|')
                && !line.starts_with('#')
        })
        .unwrap_or(0);
    body[first..].join("\n")
}

/// Read a source document and strip its preamble.
pub fn load_source_text(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    Ok(strip_preamble(&raw))
}

/// Resolves section ids to source documents, caching what it has read.
///
/// Lookup order for a section: the explicit mapping, then
/// `<dir>/<section>.md`, then `<dir>/<n>.md` for `<prefix>-<n>` section ids.
#[derive(Debug, Default)]
pub struct SourceCatalog {
    dir: Option<PathBuf>,
    mapping: BTreeMap<String, PathBuf>,
    cache: HashMap<PathBuf, Option<Arc<str>>>,
}

impl SourceCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn with_mapping(mut self, mapping: BTreeMap<String, PathBuf>) -> Self {
        self.mapping.extend(mapping);
        self
    }

    pub fn insert(&mut self, section: impl Into<String>, path: impl Into<PathBuf>) {
        self.mapping.insert(section.into(), path.into());
    }

    /// Read a JSON `{ "<section>": "<path>" }` table. Relative paths are taken
    /// relative to the table's own directory.
    pub fn load_mapping(path: &Path) -> Result<BTreeMap<String, PathBuf>> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
        let raw: BTreeMap<String, PathBuf> =
            serde_json::from_str(&text).map_err(|e| GraphError::json(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(raw
            .into_iter()
            .map(|(section, p)| {
                let p = if p.is_relative() { base.join(p) } else { p };
                (section, p)
            })
            .collect())
    }

    /// Path a section's source is expected at. The first existing candidate
    /// wins; if none exists the primary candidate is returned for reporting.
    pub fn resolve(&self, section: &str) -> PathBuf {
        if let Some(path) = self.mapping.get(section) {
            return path.clone();
        }
        let dir = self.dir.clone().unwrap_or_default();
        let primary = dir.join(format!("{section}.md"));
        if primary.exists() {
            return primary;
        }
        if let Some((_, n)) = section.rsplit_once('-') {
            let numbered = dir.join(format!("{n}.md"));
            if !n.is_empty() && numbered.exists() {
                return numbered;
            }
        }
        primary
    }

    /// Source text for a section, or `None` when it cannot be read.
    pub fn load(&mut self, section: &str) -> (PathBuf, Option<Arc<str>>) {
        let path = self.resolve(section);
        if let Some(cached) = self.cache.get(&path) {
            return (path, cached.clone());
        }
        let text = match load_source_text(&path) {
            Ok(text) => {
                debug!(section, path = %path.display(), "loaded source document");
                Some(Arc::<str>::from(text))
            }
            Err(e) => {
                warn!(section, "source unavailable: {e}");
                None
            }
        };
        self.cache.insert(path.clone(), text.clone());
        (path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_lines_are_skipped() {
        let text = "# Title\nhttps://example.com/post\n| a | b |\n\nBody starts here.\nMore.";
        assert_eq!(strip_preamble(text), "Body starts here.\nMore.");
    }

    #[test]
    fn front_matter_is_skipped() {
        let text = "---\ntitle: x\n---\n# Heading\nBody";
        assert_eq!(strip_preamble(text), "Body");
    }

    #[test]
    fn text_without_body_line_is_returned_whole() {
        let text = "# Only a heading\n";
        assert_eq!(strip_preamble(text), text);
    }

    #[test]
    fn catalog_resolves_mapping_then_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s01_01.md"), "Alpha body").unwrap();
        std::fs::write(dir.path().join("2.md"), "Numbered body").unwrap();
        std::fs::write(dir.path().join("mapped.txt"), "Mapped body").unwrap();

        let mut catalog = SourceCatalog::new(dir.path());
        catalog.insert("custom", dir.path().join("mapped.txt"));

        assert_eq!(catalog.load("s01_01").1.as_deref(), Some("Alpha body"));
        assert_eq!(catalog.load("extra-2").1.as_deref(), Some("Numbered body"));
        assert_eq!(catalog.load("custom").1.as_deref(), Some("Mapped body"));

        let (path, text) = catalog.load("nowhere");
        assert!(text.is_none());
        assert!(path.ends_with("nowhere.md"));
    }

    #[test]
    fn mapping_file_paths_are_relative_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("sources.json");
        std::fs::write(&map, r#"{"extra-1": "input/a.md"}"#).unwrap();
        let mapping = SourceCatalog::load_mapping(&map).unwrap();
        assert_eq!(mapping["extra-1"], dir.path().join("input/a.md"));
    }
}
