//! Connected components of a concept graph, edges taken as undirected.

use crate::model::GraphDocument;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub num_components: usize,
    /// Components in order of their first node in the document.
    pub components: Vec<BTreeSet<String>>,
    /// Nodes with no incident edge.
    pub isolated_nodes: Vec<String>,
    pub is_connected: bool,
}

impl ConnectivityReport {
    /// The component with the most nodes (first one on ties).
    pub fn largest_component(&self) -> Option<&BTreeSet<String>> {
        self.components
            .iter()
            .rev()
            .max_by_key(|c| c.len())
    }
}

/// Compute components and isolated nodes.
///
/// Only edges whose endpoints are both nodes of the graph contribute to
/// adjacency. A self-loop gives its node a neighbor (itself), so it is not
/// reported as isolated. The graph is never mutated.
pub fn analyze_connectivity(graph: &GraphDocument) -> ConnectivityReport {
    let mut order: Vec<&str> = Vec::with_capacity(graph.nodes.len());
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if !adjacency.contains_key(node.id.as_str()) {
            adjacency.insert(node.id.as_str(), Vec::new());
            order.push(node.id.as_str());
        }
    }

    for edge in &graph.edges {
        let (s, t) = (edge.source.as_str(), edge.target.as_str());
        if !adjacency.contains_key(s) || !adjacency.contains_key(t) {
            continue;
        }
        if let Some(neighbors) = adjacency.get_mut(s) {
            neighbors.push(t);
        }
        if s != t {
            if let Some(neighbors) = adjacency.get_mut(t) {
                neighbors.push(s);
            }
        }
    }

    let mut visited: HashMap<&str, bool> = order.iter().map(|id| (*id, false)).collect();
    let mut components = Vec::new();
    for &start in &order {
        if visited[start] {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            match visited.get_mut(id) {
                Some(seen) if !*seen => *seen = true,
                _ => continue,
            }
            component.insert(id.to_string());
            for &next in &adjacency[id] {
                if !visited[next] {
                    stack.push(next);
                }
            }
        }
        components.push(component);
    }

    let isolated_nodes: Vec<String> = order
        .iter()
        .filter(|id| adjacency[*id].is_empty())
        .map(|id| id.to_string())
        .collect();

    ConnectivityReport {
        total_nodes: graph.nodes.len(),
        total_edges: graph.edges.len(),
        num_components: components.len(),
        is_connected: components.len() == 1,
        components,
        isolated_nodes,
    }
}
