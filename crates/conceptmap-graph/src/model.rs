//! Graph document model.
//!
//! One JSON shape is shared by per-section graphs and merged graphs; the merge
//! provenance fields (`original_id`, `source_section`, `original_source`,
//! `original_target`) are simply absent on per-section graphs.
//!
//! Loading is lenient: missing `nodes`/`edges`/`metadata` mean "empty", evidence
//! may be a bare string, and unknown fields are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Importance classification of a concept. Ordered `core > supplementary > advanced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Tier {
    #[default]
    Core,
    Supplementary,
    Advanced,
}

impl Tier {
    pub fn rank(self) -> u8 {
        match self {
            Tier::Core => 3,
            Tier::Supplementary => 2,
            Tier::Advanced => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Core => "core",
            Tier::Supplementary => "supplementary",
            Tier::Advanced => "advanced",
        }
    }

    /// The higher-ranked of the two tiers.
    pub fn promote(self, other: Tier) -> Tier {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

// Unrecognized tiers fall back to `core`, the extraction default.
impl From<String> for Tier {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "supplementary" => Tier::Supplementary,
            "advanced" => Tier::Advanced,
            _ => Tier::Core,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quotation of source text grounding a concept or an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EvidenceRepr")]
pub struct Evidence {
    pub text: String,
}

impl Evidence {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EvidenceRepr {
    Bare(String),
    Object {
        #[serde(default)]
        text: Option<String>,
    },
}

impl From<EvidenceRepr> for Evidence {
    fn from(repr: EvidenceRepr) -> Self {
        match repr {
            EvidenceRepr::Bare(text) => Evidence { text },
            EvidenceRepr::Object { text } => Evidence {
                text: text.unwrap_or_default(),
            },
        }
    }
}

/// A concept (graph node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// Pre-merge identifier (merged graphs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    /// Section that produced this concept (merged graphs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Concept {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            aliases: Vec::new(),
            definition: None,
            tier: Tier::default(),
            evidence: Vec::new(),
            original_id: None,
            source_section: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_evidence(mut self, text: impl Into<String>) -> Self {
        self.evidence.push(Evidence::new(text));
        self
    }

    /// Label followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Section this record is attributed to, if any.
    pub fn section(&self) -> Option<&str> {
        self.source_section.as_deref().filter(|s| !s.is_empty())
    }
}

fn default_confidence() -> f64 {
    0.7
}

/// A directed, typed relation between two concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, alias = "type")]
    pub relation: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            confidence: default_confidence(),
            evidence: Vec::new(),
            original_source: None,
            original_target: None,
            source_section: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_evidence(mut self, text: impl Into<String>) -> Self {
        self.evidence.push(Evidence::new(text));
        self
    }

    pub fn section(&self) -> Option<&str> {
        self.source_section.as_deref().filter(|s| !s.is_empty())
    }

    /// `source -> target`, used when reporting on an edge.
    pub fn display_key(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedFrom {
    pub section_id: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStatistics {
    #[serde(default)]
    pub total_nodes: usize,
    #[serde(default)]
    pub total_edges: usize,
    #[serde(default)]
    pub id_collisions_resolved: usize,
    #[serde(default)]
    pub unique_node_ids: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetadata {
    #[serde(default)]
    pub merged_from: Vec<MergedFrom>,
    #[serde(default)]
    pub total_sections: usize,
    #[serde(default)]
    pub statistics: MergeStatistics,
}

/// A concept graph document (per-section or merged).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Concept>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GraphMetadata>,
}

impl GraphDocument {
    pub fn new(nodes: Vec<Concept>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            metadata: None,
        }
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn node(&self, id: &str) -> Option<&Concept> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Total number of evidence quotations on nodes and edges.
    pub fn evidence_count(&self) -> usize {
        self.nodes.iter().map(|n| n.evidence.len()).sum::<usize>()
            + self.edges.iter().map(|e| e.evidence.len()).sum::<usize>()
    }
}
