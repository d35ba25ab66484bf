//! Cross-section link candidates.
//!
//! Pairs of concepts from different sections that probably denote the same or
//! a closely related idea. This is a cheap string heuristic meant to seed a
//! review pass; it never touches the graph.

use crate::canonical::canonicalize;
use crate::model::{Concept, GraphDocument};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEnd {
    pub id: String,
    pub label: String,
    pub section: String,
}

impl LinkEnd {
    fn of(concept: &Concept, section: &str) -> Self {
        Self {
            id: concept.id.clone(),
            label: concept.label.clone(),
            section: section.to_string(),
        }
    }
}

/// An unordered candidate pair; `a` precedes `b` in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCandidate {
    pub a: LinkEnd,
    pub b: LinkEnd,
    pub similarity: f64,
    /// Both concepts carried the same pre-merge id.
    pub original_id_match: bool,
}

/// A candidate seen from one of its sections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkView {
    pub from_section: String,
    pub from_concept: String,
    pub from_id: String,
    pub to_section: String,
    pub to_concept: String,
    pub to_id: String,
    pub similarity: f64,
    pub original_id_match: bool,
}

impl LinkCandidate {
    fn view(&self, from: &LinkEnd, to: &LinkEnd) -> LinkView {
        LinkView {
            from_section: from.section.clone(),
            from_concept: from.label.clone(),
            from_id: from.id.clone(),
            to_section: to.section.clone(),
            to_concept: to.label.clone(),
            to_id: to.id.clone(),
            similarity: self.similarity,
            original_id_match: self.original_id_match,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrossSectionAnalysis {
    /// Section -> ids of its concepts, in document order.
    pub section_nodes: BTreeMap<String, Vec<String>>,
    /// Candidates by descending similarity.
    pub candidates: Vec<LinkCandidate>,
    /// Section -> candidates involving it, oriented from that section.
    pub per_section: BTreeMap<String, Vec<LinkView>>,
}

impl CrossSectionAnalysis {
    pub fn views_for(&self, section: &str) -> &[LinkView] {
        self.per_section
            .get(section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Both concepts carry the same non-empty pre-merge id (case-insensitive).
fn same_original_id(a: &Concept, b: &Concept) -> bool {
    match (a.original_id.as_deref(), b.original_id.as_deref()) {
        (Some(x), Some(y)) => !x.is_empty() && x.to_lowercase() == y.to_lowercase(),
        _ => false,
    }
}

fn pair_score(a: &Concept, a_key: &str, b: &Concept, b_key: &str, threshold: f64) -> Option<f64> {
    if same_original_id(a, b) {
        return Some(1.0);
    }
    if a_key.is_empty() || b_key.is_empty() {
        return None;
    }
    if !(a_key.contains(b_key) || b_key.contains(a_key)) {
        return None;
    }
    let (la, lb) = (a_key.chars().count(), b_key.chars().count());
    let score = la.min(lb) as f64 / la.max(lb) as f64;
    (score > threshold).then_some(score)
}

/// Score every pair of concepts from different sections.
///
/// Same pre-merge id scores 1.0; otherwise, when one canonical label contains
/// the other, the score is the length ratio and must exceed `threshold`.
/// Concepts without a section are ignored.
pub fn discover_cross_section_links(graph: &GraphDocument, threshold: f64) -> CrossSectionAnalysis {
    let sectioned: Vec<(&Concept, &str, String)> = graph
        .nodes
        .iter()
        .filter_map(|c| c.section().map(|s| (c, s, canonicalize(&c.label))))
        .collect();

    let mut section_nodes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (concept, section, _) in &sectioned {
        section_nodes
            .entry(section.to_string())
            .or_default()
            .push(concept.id.clone());
    }

    let mut candidates = Vec::new();
    for (i, (a, a_section, a_key)) in sectioned.iter().enumerate() {
        for (b, b_section, b_key) in &sectioned[i + 1..] {
            if a_section == b_section {
                continue;
            }
            if let Some(similarity) = pair_score(a, a_key, b, b_key, threshold) {
                candidates.push(LinkCandidate {
                    a: LinkEnd::of(a, a_section),
                    b: LinkEnd::of(b, b_section),
                    similarity,
                    original_id_match: same_original_id(a, b),
                });
            }
        }
    }
    // stable: ties keep document order
    candidates.sort_by(|x, y| y.similarity.total_cmp(&x.similarity));

    let mut per_section: BTreeMap<String, Vec<LinkView>> = BTreeMap::new();
    for candidate in &candidates {
        per_section
            .entry(candidate.a.section.clone())
            .or_default()
            .push(candidate.view(&candidate.a, &candidate.b));
        per_section
            .entry(candidate.b.section.clone())
            .or_default()
            .push(candidate.view(&candidate.b, &candidate.a));
    }

    debug!(
        sections = section_nodes.len(),
        candidates = candidates.len(),
        "discovered cross-section link candidates"
    );

    CrossSectionAnalysis {
        section_nodes,
        candidates,
        per_section,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, label: &str, section: &str, original: Option<&str>) -> Concept {
        let mut c = Concept::new(id, label);
        c.source_section = Some(section.to_string());
        c.original_id = original.map(str::to_string);
        c
    }

    #[test]
    fn same_original_id_scores_one() {
        let graph = GraphDocument::new(
            vec![
                node("x_secA", "Entropy", "A", Some("x")),
                node("x_secB", "Thermodynamics", "B", Some("x")),
            ],
            vec![],
        );
        let analysis = discover_cross_section_links(&graph, 0.7);
        assert_eq!(analysis.candidates.len(), 1);
        assert!((analysis.candidates[0].similarity - 1.0).abs() < f64::EPSILON);
        assert!(analysis.candidates[0].original_id_match);
    }

    #[test]
    fn original_id_match_ignores_case_like_the_score() {
        let graph = GraphDocument::new(
            vec![
                node("qv_secA", "Quadratic Voting", "A", Some("QV")),
                node("qv_secB", "Plural Voting", "B", Some("qv")),
                node("y", "Unrelated", "B", Some("")),
                node("z", "Elsewhere", "C", Some("")),
            ],
            vec![],
        );
        let analysis = discover_cross_section_links(&graph, 0.7);
        assert_eq!(analysis.candidates.len(), 1);
        let candidate = &analysis.candidates[0];
        assert!((candidate.similarity - 1.0).abs() < f64::EPSILON);
        assert!(candidate.original_id_match);
        assert!(analysis.views_for("B")[0].original_id_match);
    }

    #[test]
    fn label_containment_uses_length_ratio() {
        let graph = GraphDocument::new(
            vec![
                node("a", "Digital Democracy", "1", None),
                node("b", "digital democracy!", "2", None),
                node("c", "Democracy", "2", None),
                node("d", "Plural Digital Democracy", "3", None),
            ],
            vec![],
        );
        let analysis = discover_cross_section_links(&graph, 0.7);
        let pairs: Vec<(&str, &str)> = analysis
            .candidates
            .iter()
            .map(|c| (c.a.id.as_str(), c.b.id.as_str()))
            .collect();
        // a~b exact (1.0); a~d 17/24 = 0.708; b~d same; c is too short against everything
        assert_eq!(pairs, vec![("a", "b"), ("a", "d"), ("b", "d")]);
    }

    #[test]
    fn same_section_and_unsectioned_nodes_are_ignored() {
        let mut loose = Concept::new("z", "Entropy");
        loose.source_section = None;
        let graph = GraphDocument::new(
            vec![
                node("a", "Entropy", "1", None),
                node("b", "Entropy", "1", None),
                loose,
            ],
            vec![],
        );
        let analysis = discover_cross_section_links(&graph, 0.7);
        assert!(analysis.candidates.is_empty());
        assert_eq!(analysis.section_nodes["1"], vec!["a", "b"]);
    }

    #[test]
    fn views_exist_in_both_directions() {
        let graph = GraphDocument::new(
            vec![node("a", "Voting", "1", None), node("b", "voting", "2", None)],
            vec![],
        );
        let analysis = discover_cross_section_links(&graph, 0.7);
        assert_eq!(analysis.views_for("1")[0].to_id, "b");
        assert_eq!(analysis.views_for("2")[0].to_id, "a");
        assert!(analysis.views_for("3").is_empty());
    }
}
