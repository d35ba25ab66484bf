//! Evidence validation and repair.
//!
//! A quotation is checked against the normalized text of its section's source
//! document. Exact substrings score 1.0; otherwise windows of 100%, 120% and
//! 80% of the quotation's length slide over the source and the best character
//! diff ratio above the threshold wins.
//!
//! Repair is best-effort. A manual substitution table is consulted first; the
//! fuzzy path only rewrites a quotation when it can cut a span out of the
//! source that still clears the repair threshold.

use crate::config::ReconcileConfig;
use crate::error::{GraphError, Result};
use crate::model::GraphDocument;
use crate::sources::SourceCatalog;
use regex::Regex;
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

// ============================================================================
// Matching
// ============================================================================

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn padded_cjk_punct() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*([。、！？])\s*").expect("static regex"))
}

/// Collapse whitespace, tighten spacing around CJK punctuation, fold
/// ideographic spaces, trim.
pub fn normalize_evidence_text(text: &str) -> String {
    let collapsed = whitespace_runs().replace_all(text, " ");
    let tightened = padded_cjk_punct().replace_all(&collapsed, "$1");
    tightened.replace('\u{3000}', " ").trim().to_string()
}

/// Best match of a quotation inside a source, in normalized coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMatch {
    pub text: String,
    pub similarity: f64,
    /// Character offsets into the normalized source.
    pub start: usize,
    pub end: usize,
}

impl SourceMatch {
    pub fn is_exact(&self) -> bool {
        self.similarity >= 1.0
    }
}

fn similarity(a: &str, b: &str) -> f64 {
    TextDiff::from_chars(a, b).ratio() as f64
}

// Byte offset of every char boundary, including the end of the string.
fn char_bounds(s: &str) -> Vec<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect()
}

/// Find `evidence` in `source`; `None` when nothing reaches `threshold`.
pub fn find_in_source(evidence: &str, source: &str, threshold: f64) -> Option<SourceMatch> {
    let ev = normalize_evidence_text(evidence);
    let src = normalize_evidence_text(source);
    best_window(&ev, &src, threshold)
}

fn best_window(ev: &str, src: &str, threshold: f64) -> Option<SourceMatch> {
    if ev.is_empty() {
        return None;
    }
    if let Some(pos) = src.find(ev) {
        let start = src[..pos].chars().count();
        return Some(SourceMatch {
            text: ev.to_string(),
            similarity: 1.0,
            start,
            end: start + ev.chars().count(),
        });
    }

    let bounds = char_bounds(src);
    let src_len = bounds.len() - 1;
    if src_len == 0 {
        return None;
    }
    let ev_len = ev.chars().count();

    // a source shorter than the quotation is compared whole
    let mut sizes: Vec<usize> = Vec::with_capacity(3);
    for size in [ev_len, ev_len * 6 / 5, ev_len * 4 / 5] {
        let size = size.min(src_len);
        if size > 0 && !sizes.contains(&size) {
            sizes.push(size);
        }
    }

    let mut best: Option<SourceMatch> = None;
    let mut best_sim = 0.0;
    for size in sizes {
        for i in 0..=(src_len - size) {
            let window = &src[bounds[i]..bounds[i + size]];
            let sim = similarity(ev, window);
            if sim > best_sim && sim >= threshold {
                best_sim = sim;
                best = Some(SourceMatch {
                    text: window.to_string(),
                    similarity: sim,
                    start: i,
                    end: i + size,
                });
            }
        }
    }
    best
}

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceIssueKind {
    MissingSource,
    EvidenceNotFound,
    EvidenceMismatch,
}

impl EvidenceIssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceIssueKind::MissingSource => "missing_source",
            EvidenceIssueKind::EvidenceNotFound => "evidence_not_found",
            EvidenceIssueKind::EvidenceMismatch => "evidence_mismatch",
        }
    }
}

/// The node or edge a quotation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOwner {
    NodeId(String),
    /// `source -> target`
    Edge(String),
}

impl std::fmt::Display for EvidenceOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceOwner::NodeId(id) => write!(f, "Node: {id}"),
            EvidenceOwner::Edge(key) => write!(f, "Edge: {key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceIssue {
    #[serde(rename = "type")]
    pub kind: EvidenceIssueKind,
    #[serde(flatten)]
    pub owner: Option<EvidenceOwner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub graph_file: PathBuf,
    pub source_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

enum RecordRef {
    Node(usize),
    Edge(usize),
}

struct Quote {
    record: RecordRef,
    owner: EvidenceOwner,
    section: Option<String>,
    index: usize,
    text: String,
}

// Every non-blank quotation in document order, nodes first.
fn collect_quotes(graph: &GraphDocument, default_section: Option<&str>) -> Vec<Quote> {
    let mut quotes = Vec::with_capacity(graph.evidence_count());
    for (n, node) in graph.nodes.iter().enumerate() {
        let section = node.section().or(default_section).map(str::to_string);
        for (index, ev) in node.evidence.iter().enumerate() {
            if ev.text.trim().is_empty() {
                continue;
            }
            quotes.push(Quote {
                record: RecordRef::Node(n),
                owner: EvidenceOwner::NodeId(node.id.clone()),
                section: section.clone(),
                index,
                text: ev.text.clone(),
            });
        }
    }
    for (n, edge) in graph.edges.iter().enumerate() {
        let section = edge.section().or(default_section).map(str::to_string);
        for (index, ev) in edge.evidence.iter().enumerate() {
            if ev.text.trim().is_empty() {
                continue;
            }
            quotes.push(Quote {
                record: RecordRef::Edge(n),
                owner: EvidenceOwner::Edge(edge.display_key()),
                section: section.clone(),
                index,
                text: ev.text.clone(),
            });
        }
    }
    quotes
}

// Loads (and normalizes once) the source behind a quotation's section.
// Reports each unreadable source a single time.
struct SourceCursor<'a> {
    catalog: &'a mut SourceCatalog,
    normalized: BTreeMap<PathBuf, String>,
    reported_missing: HashSet<PathBuf>,
}

enum SourceState {
    Ready(PathBuf),
    Missing { path: PathBuf, first_report: bool },
}

impl<'a> SourceCursor<'a> {
    fn new(catalog: &'a mut SourceCatalog) -> Self {
        Self {
            catalog,
            normalized: BTreeMap::new(),
            reported_missing: HashSet::new(),
        }
    }

    fn open(&mut self, section: Option<&str>) -> SourceState {
        let Some(section) = section else {
            let path = PathBuf::new();
            let first_report = self.reported_missing.insert(path.clone());
            return SourceState::Missing { path, first_report };
        };
        let (path, text) = self.catalog.load(section);
        match text {
            Some(text) => {
                self.normalized
                    .entry(path.clone())
                    .or_insert_with(|| normalize_evidence_text(&text));
                SourceState::Ready(path)
            }
            None => {
                let first_report = self.reported_missing.insert(path.clone());
                SourceState::Missing { path, first_report }
            }
        }
    }

    fn text(&self, path: &Path) -> &str {
        self.normalized.get(path).map(String::as_str).unwrap_or("")
    }
}

fn missing_source_issue(graph_file: &Path, path: PathBuf) -> EvidenceIssue {
    let message = if path.as_os_str().is_empty() {
        "No source section recorded for evidence".to_string()
    } else {
        format!("Source file not found: {}", path.display())
    };
    EvidenceIssue {
        kind: EvidenceIssueKind::MissingSource,
        owner: None,
        evidence_index: None,
        evidence_text: None,
        matched_text: None,
        similarity: None,
        graph_file: graph_file.to_path_buf(),
        source_file: path,
        message: Some(message),
    }
}

/// Check every quotation of a graph against its source.
///
/// A record's section is its `source_section`, else `default_section` (the
/// section of a per-section graph file). Quotations whose source cannot be
/// read are skipped after a single `missing_source` issue for that source.
pub fn validate_graph_evidence(
    graph: &GraphDocument,
    graph_file: &Path,
    default_section: Option<&str>,
    catalog: &mut SourceCatalog,
    threshold: f64,
) -> Vec<EvidenceIssue> {
    let mut cursor = SourceCursor::new(catalog);
    let mut issues = Vec::new();
    let mut checked = 0usize;

    for quote in collect_quotes(graph, default_section) {
        let path = match cursor.open(quote.section.as_deref()) {
            SourceState::Ready(path) => path,
            SourceState::Missing { path, first_report } => {
                if first_report {
                    issues.push(missing_source_issue(graph_file, path));
                }
                continue;
            }
        };
        checked += 1;

        let ev = normalize_evidence_text(&quote.text);
        match best_window(&ev, cursor.text(&path), threshold) {
            None => issues.push(EvidenceIssue {
                kind: EvidenceIssueKind::EvidenceNotFound,
                owner: Some(quote.owner),
                evidence_index: Some(quote.index),
                evidence_text: Some(quote.text),
                matched_text: None,
                similarity: None,
                graph_file: graph_file.to_path_buf(),
                source_file: path,
                message: None,
            }),
            Some(m) if !m.is_exact() => issues.push(EvidenceIssue {
                kind: EvidenceIssueKind::EvidenceMismatch,
                owner: Some(quote.owner),
                evidence_index: Some(quote.index),
                evidence_text: Some(quote.text),
                matched_text: Some(m.text),
                similarity: Some(m.similarity),
                graph_file: graph_file.to_path_buf(),
                source_file: path,
                message: None,
            }),
            Some(_) => {}
        }
    }

    info!(
        graph = %graph_file.display(),
        checked,
        issues = issues.len(),
        "validated evidence"
    );
    issues
}

// ============================================================================
// Repair
// ============================================================================

/// Known-bad quotation -> verbatim replacement, matched on the exact string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManualFixes(BTreeMap<String, String>);

impl ManualFixes {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| GraphError::json(path, e))
    }

    pub fn get(&self, quotation: &str) -> Option<&str> {
        self.0.get(quotation).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ManualFixes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub manual: ManualFixes,
    /// Run the fuzzy path after the manual table.
    pub auto: bool,
    pub threshold: f64,
    pub min_chars: usize,
    pub anchor_words: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}

impl RepairOptions {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            manual: ManualFixes::default(),
            auto: true,
            threshold: config.repair_threshold,
            min_chars: config.min_repair_chars,
            anchor_words: config.repair_anchor_words.max(1),
        }
    }

    pub fn with_manual(mut self, manual: ManualFixes) -> Self {
        self.manual = manual;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixMethod {
    Manual,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceFix {
    #[serde(flatten)]
    pub owner: EvidenceOwner,
    pub evidence_index: usize,
    pub before: String,
    pub after: String,
    pub method: FixMethod,
    pub similarity: f64,
}

/// What a repair pass changed, and which sources it could not read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairOutcome {
    pub fixes: Vec<EvidenceFix>,
    /// Sources that were needed for fuzzy repair but could not be read.
    pub missing_sources: Vec<PathBuf>,
}

impl RepairOutcome {
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

/// Rewrite defective quotations in place and report what changed.
///
/// The caller persists the graph only when `fixes` is non-empty.
pub fn repair_graph_evidence(
    graph: &mut GraphDocument,
    default_section: Option<&str>,
    catalog: &mut SourceCatalog,
    options: &RepairOptions,
) -> RepairOutcome {
    let quotes = collect_quotes(graph, default_section);
    let mut cursor = SourceCursor::new(catalog);
    let mut fixes = Vec::new();
    let mut missing_sources = Vec::new();

    for quote in quotes {
        let repaired = match options.manual.get(&quote.text) {
            Some(manual) if manual != quote.text => Some((
                manual.to_string(),
                FixMethod::Manual,
                similarity(
                    &normalize_evidence_text(&quote.text),
                    &normalize_evidence_text(manual),
                ),
            )),
            _ if options.auto => match cursor.open(quote.section.as_deref()) {
                SourceState::Ready(path) => fuzzy_repair(&quote.text, cursor.text(&path), options)
                    .map(|(text, sim)| (text, FixMethod::Fuzzy, sim)),
                SourceState::Missing { path, first_report } => {
                    if first_report {
                        warn!(source = %path.display(), "source not found, skipping fuzzy repair");
                        missing_sources.push(path);
                    }
                    None
                }
            },
            _ => None,
        };

        let Some((after, method, sim)) = repaired else {
            continue;
        };
        if after == quote.text {
            continue;
        }

        let slot = match quote.record {
            RecordRef::Node(n) => graph.nodes.get_mut(n).and_then(|c| c.evidence.get_mut(quote.index)),
            RecordRef::Edge(n) => graph.edges.get_mut(n).and_then(|e| e.evidence.get_mut(quote.index)),
        };
        let Some(slot) = slot else {
            continue;
        };
        slot.text = after.clone();
        debug!(owner = %quote.owner, ?method, similarity = sim, "repaired evidence");

        fixes.push(EvidenceFix {
            owner: quote.owner,
            evidence_index: quote.index,
            before: quote.text,
            after,
            method,
            similarity: sim,
        });
    }

    RepairOutcome {
        fixes,
        missing_sources,
    }
}

fn is_edge_punct(c: char) -> bool {
    matches!(
        c,
        '。' | '、' | '！' | '？' | '.' | ',' | '!' | '?' | '"' | '\'' | '「' | '」' | '『' | '』'
    )
}

// Corrected span for a quotation, cut out of the normalized source.
fn fuzzy_repair(evidence: &str, src: &str, options: &RepairOptions) -> Option<(String, f64)> {
    let ev = normalize_evidence_text(evidence);
    let ev_len = ev.chars().count();
    if ev_len < options.min_chars || src.contains(ev.as_str()) {
        return None;
    }
    let window = best_window(&ev, src, options.threshold)?;

    let bounds = char_bounds(src);
    let src_len = bounds.len() - 1;
    let lo = bounds[window.start.saturating_sub(ev_len)];
    let hi = bounds[(window.end + ev_len).min(src_len)];

    let plausible = |span: &String| {
        let n = span.chars().count();
        n * 2 >= ev_len && n <= ev_len * 2
    };
    let span = anchored_span(&ev, &src[lo..hi], options.anchor_words)
        .filter(plausible)
        .unwrap_or_else(|| widened_window(&ev, src, &bounds, &window));

    let sim = similarity(&ev, &span);
    (sim >= options.threshold && !span.is_empty()).then_some((span, sim))
}

// Span from the quotation's first anchor to its last anchor inside `region`.
// Word anchors for spaced text, character anchors otherwise.
fn anchored_span(ev: &str, region: &str, anchor_words: usize) -> Option<String> {
    let core = ev.trim_matches(is_edge_punct);
    let words: Vec<&str> = core.split(' ').filter(|w| !w.is_empty()).collect();
    let (head, tail) = if words.len() >= anchor_words * 2 {
        (
            words[..anchor_words].join(" "),
            words[words.len() - anchor_words..].join(" "),
        )
    } else {
        let chars: Vec<char> = core.chars().collect();
        let k = anchor_words * 2;
        if chars.len() < k * 2 {
            return None;
        }
        (
            chars[..k].iter().collect(),
            chars[chars.len() - k..].iter().collect(),
        )
    };

    let start = region.find(&head)?;
    let after_head = start + head.len();
    let end = region[after_head..].find(&tail)? + after_head + tail.len();
    Some(region[start..end].trim().to_string())
}

// Fallback: the matched window, widened to whole words for spaced text or
// trimmed by up to two characters per side for unspaced text.
fn widened_window(ev: &str, src: &str, bounds: &[usize], window: &SourceMatch) -> String {
    if ev.contains(' ') {
        let bytes = src.as_bytes();
        let mut lo = bounds[window.start];
        let mut hi = bounds[window.end];
        while lo > 0 && bytes[lo - 1] != b' ' {
            lo -= 1;
        }
        while hi < bytes.len() && bytes[hi] != b' ' {
            hi += 1;
        }
        // the loops above only stop on ASCII spaces or the ends, both char boundaries
        return src[lo..hi].trim().to_string();
    }

    let size = window.end - window.start;
    let mut best = (window.similarity, window.start, window.end);
    for ds in 0..=2usize {
        for de in 0..=2usize {
            if ds + de == 0 || ds + de >= size {
                continue;
            }
            let (s, e) = (window.start + ds, window.end - de);
            let sim = similarity(ev, &src[bounds[s]..bounds[e]]);
            if sim > best.0 {
                best = (sim, s, e);
            }
        }
    }
    src[bounds[best.1]..bounds[best.2]].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Concept, Edge};

    #[test]
    fn normalization_collapses_space_and_cjk_punct_padding() {
        assert_eq!(normalize_evidence_text("  a\n\n b  "), "a b");
        assert_eq!(normalize_evidence_text("これ 。 あれ"), "これ。あれ");
        assert_eq!(normalize_evidence_text("全角\u{3000}空白"), "全角 空白");
    }

    #[test]
    fn exact_substring_scores_one() {
        let m = find_in_source("quick  brown\nfox", "The quick brown fox jumps.", 0.8).unwrap();
        assert!(m.is_exact());
        assert_eq!((m.start, m.end), (4, 19));
    }

    #[test]
    fn unrelated_text_is_not_found() {
        assert!(find_in_source("zzzz qqqq", "The quick brown fox jumps.", 0.8).is_none());
    }

    #[test]
    fn trailing_period_is_a_close_mismatch() {
        let m = find_in_source(
            "私たちこそが未来の共同設計者である。",
            "私たちこそが未来の共同設計者である",
            0.8,
        )
        .unwrap();
        assert!(!m.is_exact());
        assert!(m.similarity >= 0.9, "similarity {}", m.similarity);
    }

    #[test]
    fn anchored_span_recovers_dropped_middle_clause() {
        let src = "冒頭の文。中央集権的なプラットフォームが、価値を搾取する一方で、現実感を損なわせ、社会的な結びつきを根こそぎ奪う恐れがある。次の文。";
        let ev = "中央集権的なプラットフォームが、価値を搾取する一方で、社会的な結びつきを根こそぎ奪う恐れがある。";
        let (span, sim) = fuzzy_repair(ev, &normalize_evidence_text(src), &RepairOptions::default())
            .unwrap();
        assert_eq!(
            span,
            "中央集権的なプラットフォームが、価値を搾取する一方で、現実感を損なわせ、社会的な結びつきを根こそぎ奪う恐れがある"
        );
        assert!(sim >= 0.7);
    }

    #[test]
    fn spaced_text_uses_word_anchors() {
        let src = "Intro. The gradient of a function points in the direction of steepest ascent everywhere. Outro.";
        let ev = "The gradient of the function points toward the direction of steepest ascent everywhere";
        let (span, _) =
            fuzzy_repair(ev, &normalize_evidence_text(src), &RepairOptions::default()).unwrap();
        assert_eq!(
            span,
            "The gradient of a function points in the direction of steepest ascent everywhere"
        );
    }

    #[test]
    fn short_quotations_are_left_alone() {
        assert!(fuzzy_repair("ab", "abc", &RepairOptions::default()).is_none());
    }

    fn catalog_with(section: &str, text: &str) -> (tempfile::TempDir, SourceCatalog) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{section}.md")), text).unwrap();
        let catalog = SourceCatalog::new(dir.path());
        (dir, catalog)
    }

    #[test]
    fn validation_classifies_and_reports_missing_sources_once() {
        let (_dir, mut catalog) = catalog_with("s1", "Alpha beta gamma delta epsilon.");
        let mut graph = GraphDocument::new(
            vec![
                Concept::new("a", "Alpha")
                    .with_evidence("Alpha beta gamma")
                    .with_evidence("Alpha beta gamma delta epsilon!")
                    .with_evidence("nothing like it at all here"),
                Concept::new("b", "Beta").with_evidence("   "),
            ],
            vec![Edge::new("a", "b", "uses").with_evidence("beta gamma")],
        );
        graph.nodes.push({
            let mut c = Concept::new("c", "Gamma").with_evidence("gamma");
            c.source_section = Some("s9".into());
            c.evidence.push(crate::model::Evidence::new("gamma again"));
            c
        });

        let issues = validate_graph_evidence(&graph, Path::new("graph_s1.json"), Some("s1"), &mut catalog, 0.8);
        let kinds: Vec<EvidenceIssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EvidenceIssueKind::EvidenceMismatch,
                EvidenceIssueKind::EvidenceNotFound,
                EvidenceIssueKind::MissingSource,
            ]
        );
        assert_eq!(issues[0].owner, Some(EvidenceOwner::NodeId("a".into())));
        assert_eq!(issues[0].evidence_index, Some(1));

        let json = serde_json::to_value(&issues[1]).unwrap();
        assert_eq!(json["type"], "evidence_not_found");
        assert_eq!(json["node_id"], "a");
    }

    #[test]
    fn repair_applies_manual_table_before_fuzzy_search() {
        let (_dir, mut catalog) = catalog_with("s1", "私たちこそが未来の共同設計者である");
        let mut graph = GraphDocument::new(
            vec![Concept::new("a", "A").with_evidence("私たちこそが未来の共同設計者である。")],
            vec![],
        );
        let manual: ManualFixes = [(
            "私たちこそが未来の共同設計者である。",
            "私たちこそが未来の共同設計者である",
        )]
        .into_iter()
        .collect();
        let options = RepairOptions::default().with_manual(manual);

        let fixes = repair_graph_evidence(&mut graph, Some("s1"), &mut catalog, &options).fixes;
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].method, FixMethod::Manual);
        assert_eq!(graph.nodes[0].evidence[0].text, "私たちこそが未来の共同設計者である");

        // already exact now
        let again = repair_graph_evidence(&mut graph, Some("s1"), &mut catalog, &options);
        assert!(again.is_empty());
    }

    #[test]
    fn fuzzy_repair_rewrites_edge_evidence() {
        let (_dir, mut catalog) = catalog_with("s1", "前文。私たちこそが未来の共同設計者であると彼は言った。");
        let mut graph = GraphDocument::new(
            vec![Concept::new("a", "A"), Concept::new("b", "B")],
            vec![Edge::new("a", "b", "uses").with_evidence("私たちこそが未来の共同設計者である。")],
        );
        let fixes = repair_graph_evidence(&mut graph, Some("s1"), &mut catalog, &RepairOptions::default()).fixes;
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].method, FixMethod::Fuzzy);
        assert_eq!(graph.edges[0].evidence[0].text, "私たちこそが未来の共同設計者である");
    }

    #[test]
    fn repair_without_auto_only_uses_manual_table() {
        let (_dir, mut catalog) = catalog_with("s1", "私たちこそが未来の共同設計者である");
        let mut graph = GraphDocument::new(
            vec![Concept::new("a", "A").with_evidence("私たちこそが未来の共同設計者である。")],
            vec![],
        );
        let options = RepairOptions {
            auto: false,
            ..RepairOptions::default()
        };
        assert!(repair_graph_evidence(&mut graph, Some("s1"), &mut catalog, &options).is_empty());
    }

    #[test]
    fn repair_reports_each_missing_source_once() {
        let (_dir, mut catalog) = catalog_with("s1", "Quadratic voting lets people express intensity.");
        let mut graph = GraphDocument::new(
            vec![
                Concept::new("a", "A")
                    .with_evidence("Quadratic voting lets people expres intensity.")
                    .with_evidence("another quotation nobody can find"),
                Concept::new("b", "B").with_evidence("a third quotation from the same place"),
            ],
            vec![],
        );
        graph.nodes[1].source_section = Some("s1".into());

        let outcome = repair_graph_evidence(&mut graph, Some("gone"), &mut catalog, &RepairOptions::default());
        assert!(outcome.fixes.is_empty());
        assert_eq!(outcome.missing_sources.len(), 1);
        assert!(outcome.missing_sources[0].ends_with("gone.md"));
        assert_eq!(graph.nodes[0].evidence[0].text, "Quadratic voting lets people expres intensity.");
    }
}
