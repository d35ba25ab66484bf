//! Tunable knobs for reconciliation.
//!
//! The similarity thresholds are string heuristics standing in for semantic
//! similarity. They are approximate and meant to be tuned per corpus.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Relation kinds accepted by the edge filter unless configured otherwise.
pub const DEFAULT_RELATION_KINDS: [&str; 8] = [
    "is_a",
    "part_of",
    "prerequisite_of",
    "example_of",
    "contrasts_with",
    "parameter_of",
    "returns",
    "uses",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// The fixed relation-kind enumeration.
    pub relation_kinds: Vec<String>,
    /// Minimum similarity for a quotation to count as present (check mode).
    pub validation_threshold: f64,
    /// Minimum similarity for fuzzy evidence repair.
    pub repair_threshold: f64,
    /// Minimum label containment ratio for cross-section link candidates.
    pub link_threshold: f64,
    /// Shortest normalized quotation (in characters) fuzzy repair will rewrite.
    pub min_repair_chars: usize,
    /// Words (or characters, for unspaced scripts) used to anchor a repaired span.
    pub repair_anchor_words: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            relation_kinds: DEFAULT_RELATION_KINDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            validation_threshold: 0.8,
            repair_threshold: 0.7,
            link_threshold: 0.7,
            min_repair_chars: 8,
            repair_anchor_words: 3,
        }
    }
}

impl ReconcileConfig {
    /// Load a JSON config file; absent keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
        let config: ReconcileConfig =
            serde_json::from_str(&text).map_err(|e| GraphError::json(path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("validation_threshold", self.validation_threshold),
            ("repair_threshold", self.repair_threshold),
            ("link_threshold", self.link_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.relation_kinds.is_empty() {
            return Err(GraphError::InvalidConfig(
                "relation_kinds must not be empty".to_string(),
            ));
        }
        if self.repair_anchor_words == 0 {
            return Err(GraphError::InvalidConfig(
                "repair_anchor_words must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn relation_kind_set(&self) -> HashSet<&str> {
        self.relation_kinds.iter().map(String::as_str).collect()
    }
}
