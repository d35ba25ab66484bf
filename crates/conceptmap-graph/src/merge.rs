//! Merging section graphs.
//!
//! Section graphs are produced independently, so the same raw id routinely
//! shows up in several of them. A raw id used by two or more sections is a
//! collision: every section's copy is renamed with a section suffix, while ids
//! unique to one section pass through untouched. Provenance (`original_id`,
//! `source_section`, `original_source`, `original_target`) is recorded on every
//! merged record so each one can be traced back to its section.

use crate::model::{Edge, GraphDocument, GraphMetadata, MergeStatistics, MergedFrom};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// One per-section graph handed to the merger.
#[derive(Debug, Clone)]
pub struct SectionGraph {
    pub section_id: String,
    /// File the graph was loaded from, recorded in `metadata.merged_from`.
    pub file: String,
    pub graph: GraphDocument,
}

impl SectionGraph {
    pub fn new(section_id: impl Into<String>, file: impl Into<String>, graph: GraphDocument) -> Self {
        Self {
            section_id: section_id.into(),
            file: file.into(),
            graph,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub graph: GraphDocument,
    /// Colliding raw id -> sections it appeared in, in merge order.
    pub collisions: BTreeMap<String, Vec<String>>,
    /// Recoverable anomalies (duplicate sections, id-less nodes, ...).
    pub warnings: Vec<String>,
}

/// Disambiguated id for a colliding node.
fn section_scoped_id(raw_id: &str, section_id: &str) -> String {
    if section_id.starts_with("sec") {
        format!("{raw_id}_{section_id}")
    } else {
        format!("{raw_id}_sec{section_id}")
    }
}

/// Merge section graphs into one graph with unique node ids.
///
/// Never fails: anomalies end up in [`MergeOutcome::warnings`] and dangling
/// edges are kept for [`validate_merged_graph`] to flag.
pub fn merge_section_graphs(sections: Vec<SectionGraph>) -> MergeOutcome {
    let mut warnings = Vec::new();

    // 1. index by section id; the first occurrence of a section id wins
    let mut seen_sections = HashSet::new();
    let mut indexed: Vec<SectionGraph> = Vec::with_capacity(sections.len());
    for section in sections {
        if !seen_sections.insert(section.section_id.clone()) {
            let msg = format!(
                "duplicate section id '{}' in {}; keeping the first occurrence",
                section.section_id, section.file
            );
            warn!("{msg}");
            warnings.push(msg);
            continue;
        }
        indexed.push(section);
    }

    // 2. collisions: raw ids used by two or more sections
    let mut id_sections: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut id_order: Vec<&str> = Vec::new();
    for section in &indexed {
        for node in &section.graph.nodes {
            if node.id.is_empty() {
                continue;
            }
            let owners = id_sections.entry(node.id.as_str()).or_insert_with(|| {
                id_order.push(node.id.as_str());
                Vec::new()
            });
            if !owners.contains(&section.section_id.as_str()) {
                owners.push(section.section_id.as_str());
            }
        }
    }
    let collisions: BTreeMap<String, Vec<String>> = id_order
        .iter()
        .filter_map(|id| {
            let owners = &id_sections[id];
            (owners.len() > 1).then(|| {
                (
                    id.to_string(),
                    owners.iter().map(|s| s.to_string()).collect(),
                )
            })
        })
        .collect();

    // 3. per-section rewrite maps
    let mut taken: HashSet<String> = id_sections.keys().map(|id| id.to_string()).collect();
    let mut rewrites: Vec<HashMap<String, String>> = Vec::with_capacity(indexed.len());
    for section in &indexed {
        let mut map: HashMap<String, String> = HashMap::new();
        for node in &section.graph.nodes {
            if node.id.is_empty() || map.contains_key(&node.id) {
                continue;
            }
            let new_id = if collisions.contains_key(&node.id) {
                let base = section_scoped_id(&node.id, &section.section_id);
                let mut candidate = base.clone();
                let mut n = 2;
                while taken.contains(&candidate) {
                    candidate = format!("{base}_{n}");
                    n += 1;
                }
                taken.insert(candidate.clone());
                debug!(
                    raw = %node.id,
                    section = %section.section_id,
                    new = %candidate,
                    "renamed colliding node id"
                );
                candidate
            } else {
                node.id.clone()
            };
            map.insert(node.id.clone(), new_id);
        }
        rewrites.push(map);
    }

    // 4-5. emit nodes and edges
    let mut merged = GraphDocument::default();
    let mut merged_from = Vec::with_capacity(indexed.len());
    let mut emitted_nodes: HashSet<String> = HashSet::new();
    let mut emitted_edges: HashSet<(String, String, String)> = HashSet::new();

    for (section, map) in indexed.into_iter().zip(&rewrites) {
        let SectionGraph {
            section_id,
            file,
            graph,
        } = section;

        for mut node in graph.nodes {
            if node.id.is_empty() {
                let msg = format!(
                    "section {section_id}: skipped node without id (label '{}')",
                    node.label
                );
                warn!("{msg}");
                warnings.push(msg);
                continue;
            }
            let new_id = map.get(&node.id).cloned().unwrap_or_else(|| node.id.clone());
            if !emitted_nodes.insert(new_id.clone()) {
                debug!(id = %new_id, section = %section_id, "skipping already emitted node");
                continue;
            }
            node.original_id = Some(std::mem::replace(&mut node.id, new_id));
            node.source_section = Some(section_id.clone());
            merged.nodes.push(node);
        }

        for edge in graph.edges {
            if edge.source.is_empty() || edge.target.is_empty() {
                debug!(section = %section_id, "skipping edge with empty endpoint");
                continue;
            }
            let edge = rewrite_edge(edge, map, &section_id);
            let key = (
                edge.source.clone(),
                edge.target.clone(),
                edge.relation.clone(),
            );
            if emitted_edges.insert(key) {
                merged.edges.push(edge);
            }
        }

        merged_from.push(MergedFrom { section_id, file });
    }

    merged.metadata = Some(GraphMetadata {
        total_sections: merged_from.len(),
        merged_from,
        statistics: MergeStatistics {
            total_nodes: merged.nodes.len(),
            total_edges: merged.edges.len(),
            id_collisions_resolved: collisions.len(),
            unique_node_ids: emitted_nodes.len(),
        },
    });

    info!(
        nodes = merged.nodes.len(),
        edges = merged.edges.len(),
        collisions = collisions.len(),
        "merged section graphs"
    );

    MergeOutcome {
        graph: merged,
        collisions,
        warnings,
    }
}

fn rewrite_edge(mut edge: Edge, map: &HashMap<String, String>, section_id: &str) -> Edge {
    let new_source = map.get(&edge.source).cloned().unwrap_or_else(|| edge.source.clone());
    let new_target = map.get(&edge.target).cloned().unwrap_or_else(|| edge.target.clone());
    edge.original_source = Some(std::mem::replace(&mut edge.source, new_source));
    edge.original_target = Some(std::mem::replace(&mut edge.target, new_target));
    edge.source_section = Some(section_id.to_string());
    edge
}

/// Structural checks on a merged graph.
///
/// Returns human-readable issues; an empty list means the graph passed.
pub fn validate_merged_graph(graph: &GraphDocument) -> Vec<String> {
    let mut issues = Vec::new();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) && !duplicates.contains(&node.id.as_str()) {
            duplicates.push(node.id.as_str());
        }
    }
    if !duplicates.is_empty() {
        issues.push(format!(
            "Duplicate node IDs found in merged graph: {}",
            duplicates.join(", ")
        ));
    }

    for edge in &graph.edges {
        if !seen.contains(edge.source.as_str()) {
            issues.push(format!("Edge references non-existent source: {}", edge.source));
        }
        if !seen.contains(edge.target.as_str()) {
            issues.push(format!("Edge references non-existent target: {}", edge.target));
        }
    }

    issues
}
