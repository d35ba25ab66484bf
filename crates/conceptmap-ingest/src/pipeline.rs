//! Per-section extraction driver.
//!
//! For each section: ask the oracle for concepts, assign ids, dedup within the
//! section, ask for relations, bind their labels to ids, filter edges, write
//! `graph_<section>.json`. A failing section is recorded and the run moves on.

use crate::ledger::{content_hash, ProcessedLedger};
use crate::oracle::{ConceptOracle, OracleError, RawConcept, RawRelation};
use crate::sections::Section;
use anyhow::{Context, Result};
use conceptmap_graph::{
    dedupe_concepts, filter_edges_with_stats, save_graph, short_hash, slugify, write_json,
    Concept, ConceptIndex, Edge, EdgeFilterStats, Evidence, GraphDocument, ReconcileConfig,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Section -> source file table written next to the section graphs.
pub const SOURCES_FILE: &str = "sources.json";

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub max_concepts: usize,
    pub relation_kinds: Vec<String>,
    /// Re-extract files the ledger says are unchanged.
    pub force: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}

impl ExtractOptions {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            max_concepts: 15,
            relation_kinds: config.relation_kinds.clone(),
            force: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionOutcome {
    pub section_id: String,
    pub title: String,
    pub source: PathBuf,
    pub status: SectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_file: Option<PathBuf>,
    pub nodes: usize,
    pub edges: usize,
    pub edge_stats: EdgeFilterStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub sections: Vec<SectionOutcome>,
}

impl RunReport {
    pub fn count(&self, status: SectionStatus) -> usize {
        self.sections.iter().filter(|s| s.status == status).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(SectionStatus::Error) > 0
    }
}

fn concept_from_raw(raw: RawConcept) -> Option<Concept> {
    let label = raw.label.trim().to_string();
    if label.is_empty() {
        return None;
    }
    let id = match slugify(&label) {
        slug if !slug.is_empty() => slug,
        _ => format!("tmp_{}", short_hash(&label, 8)),
    };
    let mut concept = Concept::new(id, label).with_aliases(
        raw.aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
    );
    concept.definition = raw
        .definition
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    concept.tier = raw.tier.unwrap_or_default();
    concept.evidence = keep_evidence(raw.evidence);
    Some(concept)
}

fn keep_evidence(evidence: Vec<Evidence>) -> Vec<Evidence> {
    evidence
        .into_iter()
        .filter(|e| !e.text.trim().is_empty())
        .collect()
}

/// Unresolvable labels become slugs so the edge filter counts them as dangling.
fn edge_from_raw(raw: RawRelation, index: &ConceptIndex) -> Edge {
    let bind = |label: &str| {
        index
            .resolve(label.trim())
            .map(str::to_string)
            .unwrap_or_else(|| slugify(label))
    };
    let mut edge = Edge::new(
        bind(&raw.source_label),
        bind(&raw.target_label),
        raw.kind.trim(),
    )
    .with_confidence(raw.confidence.clamp(0.0, 1.0));
    edge.evidence = keep_evidence(raw.evidence);
    if let Some(label) = raw.label.filter(|l| !l.trim().is_empty()) {
        edge.extra.insert("label".into(), Value::String(label));
    }
    if let Some(desc) = raw.relation_description.filter(|d| !d.trim().is_empty()) {
        edge.extra
            .insert("relation_description".into(), Value::String(desc));
    }
    edge
}

/// Build one section graph from oracle output.
pub fn extract_section(
    oracle: &dyn ConceptOracle,
    section: &Section,
    options: &ExtractOptions,
) -> Result<(GraphDocument, EdgeFilterStats), OracleError> {
    let raw_concepts = oracle.extract_concepts(section, options.max_concepts)?;
    let concepts = dedupe_concepts(raw_concepts.into_iter().filter_map(concept_from_raw).collect());

    let raw_relations = oracle.extract_relations(section, &concepts, &options.relation_kinds)?;
    let index = ConceptIndex::new(&concepts);
    let edges: Vec<Edge> = raw_relations
        .into_iter()
        .map(|r| edge_from_raw(r, &index))
        .collect();

    let ids: HashSet<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
    let kinds: HashSet<&str> = options.relation_kinds.iter().map(String::as_str).collect();
    let (edges, stats) = filter_edges_with_stats(edges, &ids, &kinds);
    Ok((GraphDocument::new(concepts, edges), stats))
}

pub fn section_graph_path(out_dir: &Path, section_id: &str) -> PathBuf {
    out_dir.join(format!("graph_{section_id}.json"))
}

/// Extract every section into `out_dir`, consulting and updating `ledger`.
///
/// Sections of a file the ledger knows with the same content hash are skipped
/// unless `options.force`. A file is recorded in the ledger only when all of
/// its sections succeeded. `sources.json` maps every section id seen in this
/// run to its chapter file.
pub fn run_extraction(
    oracle: &dyn ConceptOracle,
    sections: &[Section],
    out_dir: &Path,
    ledger: &mut ProcessedLedger,
    options: &ExtractOptions,
) -> Result<RunReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut by_file: BTreeMap<&Path, Vec<&Section>> = BTreeMap::new();
    for section in sections {
        by_file.entry(section.path.as_path()).or_default().push(section);
    }

    let mut report = RunReport::default();
    let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();

    for (path, file_sections) in by_file {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let hash = content_hash(&bytes);
        let source = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        for section in &file_sections {
            sources.insert(section.id.clone(), source.clone());
        }

        if !options.force && ledger.is_unchanged(path, &hash) {
            info!(file = %path.display(), "unchanged since last run, skipping");
            for section in file_sections {
                report.sections.push(SectionOutcome {
                    section_id: section.id.clone(),
                    title: section.title.clone(),
                    source: section.path.clone(),
                    status: SectionStatus::Skipped,
                    message: Some("unchanged since last run".to_string()),
                    graph_file: None,
                    nodes: 0,
                    edges: 0,
                    edge_stats: EdgeFilterStats::default(),
                });
            }
            continue;
        }

        let mut all_ok = true;
        for section in &file_sections {
            let outcome = match extract_section(oracle, section, options) {
                Ok((graph, stats)) => {
                    let graph_file = section_graph_path(out_dir, &section.id);
                    save_graph(&graph_file, &graph)?;
                    info!(
                        section = %section.id,
                        nodes = graph.nodes.len(),
                        edges = graph.edges.len(),
                        dropped_edges = stats.dropped(),
                        "extracted section graph"
                    );
                    SectionOutcome {
                        section_id: section.id.clone(),
                        title: section.title.clone(),
                        source: section.path.clone(),
                        status: SectionStatus::Success,
                        message: None,
                        graph_file: Some(graph_file),
                        nodes: graph.nodes.len(),
                        edges: graph.edges.len(),
                        edge_stats: stats,
                    }
                }
                Err(e) => {
                    warn!(section = %section.id, "extraction failed: {e}");
                    all_ok = false;
                    SectionOutcome {
                        section_id: section.id.clone(),
                        title: section.title.clone(),
                        source: section.path.clone(),
                        status: SectionStatus::Error,
                        message: Some(e.to_string()),
                        graph_file: None,
                        nodes: 0,
                        edges: 0,
                        edge_stats: EdgeFilterStats::default(),
                    }
                }
            };
            report.sections.push(outcome);
        }

        if all_ok {
            let ids = file_sections.iter().map(|s| s.id.clone()).collect();
            ledger.record(path, hash, ids, out_dir);
        }
    }

    write_json(&out_dir.join(SOURCES_FILE), &sources)?;
    info!(
        success = report.count(SectionStatus::Success),
        skipped = report.count(SectionStatus::Skipped),
        error = report.count(SectionStatus::Error),
        "extraction run finished"
    );
    Ok(report)
}
