//! Edge filtering.
//!
//! An edge survives only if its relation kind is known, both endpoints are
//! known concept ids, and it is not a self-loop. Everything else is dropped
//! without error; the counters exist for reporting.

use crate::model::Edge;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeFilterStats {
    pub kept: usize,
    pub unknown_relation: usize,
    pub dangling_endpoint: usize,
    pub self_loop: usize,
}

impl EdgeFilterStats {
    pub fn dropped(&self) -> usize {
        self.unknown_relation + self.dangling_endpoint + self.self_loop
    }
}

pub fn filter_edges(
    edges: Vec<Edge>,
    concept_ids: &HashSet<&str>,
    relation_kinds: &HashSet<&str>,
) -> Vec<Edge> {
    filter_edges_with_stats(edges, concept_ids, relation_kinds).0
}

/// Like [`filter_edges`], also counting why edges were dropped.
///
/// When an edge fails several checks it is counted under the first failing
/// one, in the order relation, endpoints, self-loop.
pub fn filter_edges_with_stats(
    edges: Vec<Edge>,
    concept_ids: &HashSet<&str>,
    relation_kinds: &HashSet<&str>,
) -> (Vec<Edge>, EdgeFilterStats) {
    let mut stats = EdgeFilterStats::default();
    let mut kept = Vec::with_capacity(edges.len());

    for edge in edges {
        if !relation_kinds.contains(edge.relation.as_str()) {
            debug!(edge = %edge.display_key(), relation = %edge.relation, "dropping edge: unknown relation");
            stats.unknown_relation += 1;
        } else if !concept_ids.contains(edge.source.as_str())
            || !concept_ids.contains(edge.target.as_str())
        {
            debug!(edge = %edge.display_key(), "dropping edge: dangling endpoint");
            stats.dangling_endpoint += 1;
        } else if edge.source == edge.target {
            debug!(edge = %edge.display_key(), "dropping edge: self-loop");
            stats.self_loop += 1;
        } else {
            kept.push(edge);
        }
    }

    stats.kept = kept.len();
    (kept, stats)
}
