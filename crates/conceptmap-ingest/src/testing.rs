//! Deterministic oracle for tests and offline runs.

use crate::oracle::{ConceptOracle, OracleError, RawConcept, RawRelation};
use crate::sections::Section;
use anyhow::Context;
use conceptmap_graph::Concept;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replies from a per-section script. Unscripted sections get no concepts and
/// no relations; sections marked failing get a transport error.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    concepts: HashMap<String, Vec<RawConcept>>,
    relations: HashMap<String, Vec<RawRelation>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concepts(mut self, section_id: &str, concepts: Vec<RawConcept>) -> Self {
        self.concepts.insert(section_id.to_string(), concepts);
        self
    }

    pub fn with_relations(mut self, section_id: &str, relations: Vec<RawRelation>) -> Self {
        self.relations.insert(section_id.to_string(), relations);
        self
    }

    /// Load a script of recorded replies:
    /// `{ "<section id>": { "concepts": [...], "edges": [...] } }`.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct Entry {
            #[serde(default)]
            concepts: Vec<RawConcept>,
            #[serde(default, alias = "relations")]
            edges: Vec<RawRelation>,
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading oracle script {}", path.display()))?;
        let script: BTreeMap<String, Entry> = serde_json::from_str(&text)
            .with_context(|| format!("parsing oracle script {}", path.display()))?;
        let mut oracle = Self::new();
        for (section_id, entry) in script {
            oracle = oracle
                .with_concepts(&section_id, entry.concepts)
                .with_relations(&section_id, entry.edges);
        }
        Ok(oracle)
    }

    pub fn failing(mut self, section_id: &str) -> Self {
        self.failing.insert(section_id.to_string());
        self
    }

    /// Number of oracle calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn serve(&self, section: &Section) -> Result<(), OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&section.id) {
            return Err(OracleError::Transport(format!(
                "scripted failure for section {}",
                section.id
            )));
        }
        Ok(())
    }
}

impl ConceptOracle for ScriptedOracle {
    fn extract_concepts(
        &self,
        section: &Section,
        max_concepts: usize,
    ) -> Result<Vec<RawConcept>, OracleError> {
        self.serve(section)?;
        Ok(self
            .concepts
            .get(&section.id)
            .map(|c| c.iter().take(max_concepts).cloned().collect())
            .unwrap_or_default())
    }

    fn extract_relations(
        &self,
        section: &Section,
        _concepts: &[Concept],
        _relation_kinds: &[String],
    ) -> Result<Vec<RawRelation>, OracleError> {
        self.serve(section)?;
        Ok(self.relations.get(&section.id).cloned().unwrap_or_default())
    }
}
