//! Property-based tests for the reconciliation core
//!
//! 1. Canonicalization is idempotent
//! 2. Deduplication conserves evidence and alias coverage
//! 3. Merging yields unique ids and never invents edges
//! 4. Connectivity of edgeless graphs

use conceptmap_graph::*;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Strategies
// ============================================================================

/// Labels mixing case, width, punctuation and scripts so that collisions happen.
fn label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("AI".to_string()),
        Just("ＡＩ".to_string()),
        Just("ai!".to_string()),
        Just("人工知能".to_string()),
        Just("人工知能。".to_string()),
        Just("Machine Learning".to_string()),
        Just("machine  learning".to_string()),
        Just("ML".to_string()),
        Just("".to_string()),
        Just("???".to_string()),
        "[A-Za-z ]{1,12}",
    ]
}

fn tier_strategy() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Core), Just(Tier::Supplementary), Just(Tier::Advanced)]
}

fn concept_strategy() -> impl Strategy<Value = Concept> {
    (
        "[a-z]{1,6}",
        label_strategy(),
        prop::collection::vec(label_strategy(), 0..3),
        tier_strategy(),
        prop::collection::vec("[a-z ]{0,20}", 0..3),
    )
        .prop_map(|(id, label, aliases, tier, evidence)| {
            let mut c = Concept::new(id, label).with_aliases(aliases).with_tier(tier);
            for text in evidence {
                c = c.with_evidence(text);
            }
            c
        })
}

/// A section graph whose edges only join its own nodes.
fn section_strategy() -> impl Strategy<Value = GraphDocument> {
    prop::collection::vec(prop_oneof![Just("x"), Just("y"), Just("z"), Just("x_secA"), Just("w")], 1..5)
        .prop_flat_map(|ids| {
            let n = ids.len();
            let edges = prop::collection::vec(
                (
                    0..n,
                    0..n,
                    prop_oneof![Just("is_a"), Just("uses"), Just("part_of")],
                ),
                0..6,
            );
            (Just(ids), edges)
        })
        .prop_map(|(ids, edges)| {
            let nodes = ids.iter().map(|id| Concept::new(*id, id.to_uppercase())).collect();
            let edges = edges
                .into_iter()
                .map(|(s, t, rel)| Edge::new(ids[s], ids[t], rel))
                .collect();
            GraphDocument::new(nodes, edges)
        })
}

fn keys_of(concept: &Concept) -> HashSet<String> {
    concept
        .names()
        .map(canonicalize)
        .filter(|k| !k.is_empty())
        .collect()
}

// ============================================================================
// Canonicalization
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn canonicalize_is_idempotent(text in "\\PC{0,40}") {
        let once = canonicalize(&text);
        prop_assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn canonicalize_is_idempotent_on_mixed_labels(label in label_strategy()) {
        let once = canonicalize(&label);
        prop_assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn slugs_are_bounded_and_space_free(text in "\\PC{0,120}") {
        let slug = slugify(&text);
        prop_assert!(slug.chars().count() <= SLUG_MAX_CHARS);
        prop_assert!(!slug.contains(' '));
    }
}

// ============================================================================
// Deduplication
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn dedup_conserves_evidence(concepts in prop::collection::vec(concept_strategy(), 0..12)) {
        let before: usize = concepts.iter().map(|c| c.evidence.len()).sum();
        let out = dedupe_concepts(concepts);
        let after: usize = out.iter().map(|c| c.evidence.len()).sum();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn dedup_covers_every_name_exactly_once(concepts in prop::collection::vec(concept_strategy(), 0..12)) {
        let input_keys: HashSet<String> = concepts.iter().flat_map(keys_of).collect();
        let out = dedupe_concepts(concepts);
        for key in input_keys {
            let owners = out.iter().filter(|c| keys_of(c).contains(&key)).count();
            prop_assert_eq!(owners, 1, "key {:?}", key);
        }
    }

    #[test]
    fn dedup_aliases_are_distinct_by_key(concepts in prop::collection::vec(concept_strategy(), 0..12)) {
        for concept in dedupe_concepts(concepts) {
            let keys: HashSet<String> = concept.aliases.iter().map(|a| canonicalize(a)).collect();
            prop_assert_eq!(keys.len(), concept.aliases.len(), "{:?}", concept.aliases);
        }
    }

    #[test]
    fn dedup_ids_are_unique_and_stable(concepts in prop::collection::vec(concept_strategy(), 0..12)) {
        let first = dedupe_concepts(concepts.clone());
        let second = dedupe_concepts(concepts);
        let ids: HashSet<&str> = first.iter().map(|c| c.id.as_str()).collect();
        prop_assert_eq!(ids.len(), first.len());
        prop_assert!(first.iter().all(|c| !c.id.is_empty()));
        let a: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        let b: Vec<&str> = second.iter().map(|c| c.id.as_str()).collect();
        prop_assert_eq!(a, b);
    }
}

// ============================================================================
// Merging
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn merged_ids_are_unique(graphs in prop::collection::vec(section_strategy(), 1..5)) {
        let sections: Vec<SectionGraph> = graphs
            .into_iter()
            .enumerate()
            .map(|(i, g)| SectionGraph::new(format!("S{i}"), format!("graph_secS{i}.json"), g))
            .collect();
        let out = merge_section_graphs(sections);
        let ids: HashSet<&str> = out.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        prop_assert_eq!(ids.len(), out.graph.nodes.len());
    }

    #[test]
    fn merge_never_invents_or_dangles_edges(graphs in prop::collection::vec(section_strategy(), 1..5)) {
        let input_edges: usize = graphs.iter().map(|g| g.edges.len()).sum();
        let sections: Vec<SectionGraph> = graphs
            .into_iter()
            .enumerate()
            .map(|(i, g)| SectionGraph::new(format!("S{i}"), format!("graph_secS{i}.json"), g))
            .collect();
        let out = merge_section_graphs(sections);
        prop_assert!(out.graph.edges.len() <= input_edges);
        prop_assert!(validate_merged_graph(&out.graph).is_empty());
    }

    #[test]
    fn sections_reusing_one_id_still_merge_uniquely(n in 1usize..8) {
        let sections: Vec<SectionGraph> = (0..n)
            .map(|i| SectionGraph::new(
                i.to_string(),
                format!("graph_sec{i}.json"),
                GraphDocument::new(vec![Concept::new("x", "X")], vec![]),
            ))
            .collect();
        let out = merge_section_graphs(sections);
        let ids: HashSet<&str> = out.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        prop_assert_eq!(ids.len(), n);
        let originals: HashMap<&str, usize> = out.graph.nodes.iter().fold(HashMap::new(), |mut acc, node| {
            *acc.entry(node.original_id.as_deref().unwrap_or("")).or_default() += 1;
            acc
        });
        prop_assert_eq!(originals.get("x").copied(), Some(n));
    }
}

// ============================================================================
// Connectivity
// ============================================================================

proptest! {
    #[test]
    fn edgeless_graph_has_singleton_components(k in 0usize..30) {
        let nodes = (0..k).map(|i| Concept::new(format!("n{i}"), format!("N{i}"))).collect();
        let report = analyze_connectivity(&GraphDocument::new(nodes, vec![]));
        prop_assert_eq!(report.num_components, k);
        prop_assert_eq!(report.isolated_nodes.len(), k);
        prop_assert_eq!(report.is_connected, k == 1);
    }

    #[test]
    fn a_path_through_all_nodes_is_one_component(k in 2usize..30) {
        let nodes = (0..k).map(|i| Concept::new(format!("n{i}"), format!("N{i}"))).collect();
        let edges = (1..k).map(|i| Edge::new(format!("n{}", i - 1), format!("n{i}"), "uses")).collect();
        let report = analyze_connectivity(&GraphDocument::new(nodes, edges));
        prop_assert!(report.is_connected);
        prop_assert!(report.isolated_nodes.is_empty());
    }
}
