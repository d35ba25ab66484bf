//! Markdown segmentation.
//!
//! A chapter file is split at headings of one level into [`Section`]s, or kept
//! whole (one section per file). Section ids are stable for a given file
//! listing: `s<file>_<section>` in heading mode, `<prefix>-<n>` in whole-file
//! mode.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// One unit of text handed to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    /// File name of the chapter the section came from.
    pub chapter: String,
    pub title: String,
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentLevel {
    H1,
    #[default]
    H2,
    H3,
}

impl SegmentLevel {
    fn regex(self) -> &'static Regex {
        static H1: OnceLock<Regex> = OnceLock::new();
        static H2: OnceLock<Regex> = OnceLock::new();
        static H3: OnceLock<Regex> = OnceLock::new();
        match self {
            SegmentLevel::H1 => H1.get_or_init(|| Regex::new(r"(?m)^# ").expect("static regex")),
            SegmentLevel::H2 => H2.get_or_init(|| Regex::new(r"(?m)^## ").expect("static regex")),
            SegmentLevel::H3 => H3.get_or_init(|| Regex::new(r"(?m)^### ").expect("static regex")),
        }
    }
}

impl std::str::FromStr for SegmentLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "h1" => Ok(SegmentLevel::H1),
            "h2" => Ok(SegmentLevel::H2),
            "h3" => Ok(SegmentLevel::H3),
            other => Err(format!("unknown segment level '{other}' (expected h1, h2 or h3)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentMode {
    Headings(SegmentLevel),
    /// One section per file, ids `<prefix>-<n>` (1-based over the sorted listing).
    WholeFile { prefix: String },
}

impl Default for SegmentMode {
    fn default() -> Self {
        SegmentMode::Headings(SegmentLevel::default())
    }
}

/// Split markdown at headings of `level` into `(title, body)` pairs.
///
/// Text before the first heading is not a section. Without any heading the
/// whole text is one section titled `Whole`.
pub fn split_sections(markdown: &str, level: SegmentLevel) -> Vec<(String, String)> {
    let starts: Vec<usize> = level.regex().find_iter(markdown).map(|m| m.start()).collect();
    if starts.is_empty() {
        return vec![("Whole".to_string(), markdown.to_string())];
    }

    let mut out = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(markdown.len());
        let chunk = markdown[start..end].trim();
        let mut lines = chunk.lines();
        let title = lines
            .next()
            .map(|l| l.trim_start_matches('#').trim())
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
            .to_string();
        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        out.push((title, body));
    }
    out
}

/// Markdown files under `dir`, sorted by path.
pub fn find_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("md")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn chapter_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn whole_file_title(path: &Path, text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        })
}

/// Segment already-read chapter files. `files` must be in the order ids are
/// to be assigned.
pub fn segment_files(files: &[(PathBuf, String)], mode: &SegmentMode) -> Vec<Section> {
    let mut sections = Vec::new();
    for (idx, (path, text)) in files.iter().enumerate() {
        match mode {
            SegmentMode::Headings(level) => {
                for (j, (title, body)) in split_sections(text, *level).into_iter().enumerate() {
                    sections.push(Section {
                        id: format!("s{idx:02}_{j:02}"),
                        chapter: chapter_name(path),
                        title,
                        path: path.clone(),
                        text: body,
                    });
                }
            }
            SegmentMode::WholeFile { prefix } => sections.push(Section {
                id: format!("{prefix}-{}", idx + 1),
                chapter: chapter_name(path),
                title: whole_file_title(path, text),
                path: path.clone(),
                text: text.clone(),
            }),
        }
    }
    sections
}

/// Read every markdown file under `dir` and segment it.
pub fn load_sections(dir: &Path, mode: &SegmentMode) -> Result<Vec<Section>> {
    let mut files = Vec::new();
    for path in find_markdown_files(dir)? {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        files.push((path, text));
    }
    Ok(segment_files(&files, mode))
}
