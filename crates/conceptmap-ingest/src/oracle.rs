//! The extraction oracle.
//!
//! An oracle reads a section and proposes concepts, then relations between
//! them. Its output is untrusted: labels are free text, relation kinds may be
//! outside the enumeration, quotations may be paraphrased. Everything it
//! returns goes through dedup and the edge filter before it reaches a graph.

use crate::prompts::{concept_prompt, relation_prompt};
use crate::sections::Section;
use conceptmap_graph::{Concept, Evidence, Tier};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A concept as proposed by the oracle, before ids are assigned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawConcept {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: Vec<Evidence>,
}

impl RawConcept {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
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

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_evidence(mut self, text: impl Into<String>) -> Self {
        self.evidence.push(Evidence::new(text));
        self
    }
}

fn default_confidence() -> f64 {
    0.7
}

/// A relation as proposed by the oracle. Endpoints are concept labels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRelation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_label: String,
    /// Relation kind; expected to be one of the configured kinds.
    #[serde(default, rename = "type", alias = "relation_type", deserialize_with = "null_as_default")]
    pub kind: String,
    /// Short free-text name of the relation, kept for display.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub relation_description: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: Vec<Evidence>,
}

impl RawRelation {
    pub fn new(
        source_label: impl Into<String>,
        target_label: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source_label: source_label.into(),
            target_label: target_label.into(),
            kind: kind.into(),
            label: None,
            relation_description: None,
            confidence: default_confidence(),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, text: impl Into<String>) -> Self {
        self.evidence.push(Evidence::new(text));
        self
    }
}

/// Proposes concepts and relations for a section.
pub trait ConceptOracle {
    fn extract_concepts(
        &self,
        section: &Section,
        max_concepts: usize,
    ) -> Result<Vec<RawConcept>, OracleError>;

    fn extract_relations(
        &self,
        section: &Section,
        concepts: &[Concept],
        relation_kinds: &[String],
    ) -> Result<Vec<RawRelation>, OracleError>;
}

/// A text-in, text-out model endpoint.
pub trait Completion {
    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// A [`ConceptOracle`] that renders prompts, sends them to a [`Completion`]
/// backend and parses the JSON it answers with.
pub struct PromptOracle<C> {
    backend: C,
}

#[derive(Deserialize)]
struct ConceptsReply {
    #[serde(default, deserialize_with = "null_as_default")]
    concepts: Vec<RawConcept>,
}

#[derive(Deserialize)]
struct RelationsReply {
    #[serde(default, alias = "relations", deserialize_with = "null_as_default")]
    edges: Vec<RawRelation>,
}

impl<C: Completion> PromptOracle<C> {
    pub fn new(backend: C) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }
}

impl<C: Completion> ConceptOracle for PromptOracle<C> {
    fn extract_concepts(
        &self,
        section: &Section,
        max_concepts: usize,
    ) -> Result<Vec<RawConcept>, OracleError> {
        let reply = self.backend.complete(&concept_prompt(section, max_concepts))?;
        let parsed: ConceptsReply = parse_json_block(&reply)?;
        Ok(parsed.concepts)
    }

    fn extract_relations(
        &self,
        section: &Section,
        concepts: &[Concept],
        relation_kinds: &[String],
    ) -> Result<Vec<RawRelation>, OracleError> {
        let prompt = relation_prompt(section, concepts, relation_kinds);
        let reply = self.backend.complete(&prompt)?;
        let parsed: RelationsReply = parse_json_block(&reply)?;
        Ok(parsed.edges)
    }
}

/// Parse the first complete JSON object or array in `text` that reads as `T`.
///
/// Models wrap JSON in prose or markdown fences, or emit trailing content.
/// Candidate blocks start at each `{` or `[` and end where brackets balance
/// outside of string literals; the first one that deserializes wins.
pub fn parse_json_block<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, OracleError> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }

    let mut last_err: Option<serde_json::Error> = None;
    let mut saw_open = false;
    for (start, ch) in trimmed.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        saw_open = true;
        let Some(len) = balanced_len(&trimmed[start..]) else {
            continue;
        };
        match serde_json::from_str(&trimmed[start..start + len]) {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }

    match last_err {
        Some(e) => Err(OracleError::Parse(e)),
        None if saw_open => Err(OracleError::InvalidResponse(
            "unterminated JSON value in reply".to_string(),
        )),
        None => Err(OracleError::InvalidResponse(
            "no JSON value in reply".to_string(),
        )),
    }
}

/// Byte length of the bracket-balanced block at the start of `text`.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn parses_fenced_json_with_trailing_prose() {
        let text = "Sure!\n```json\n{\"concepts\": [{\"label\": \"a } b\"}]}\n```\nHope this helps {";
        let v: Value = parse_json_block(text).unwrap();
        assert_eq!(v["concepts"][0]["label"], "a } b");
    }

    #[test]
    fn missing_object_is_invalid_response() {
        let err = parse_json_block::<Value>("no json here").unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
        let err = parse_json_block::<Value>("{\"a\": [1, 2").unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
    }

    #[test]
    fn parses_arrays_and_skips_bracketed_prose() {
        let text = "Found [2] concepts:\n[{\"label\": \"Voting\"}, {\"label\": \"Plurality ]\"}]\nDone.";
        let concepts: Vec<RawConcept> = parse_json_block(text).unwrap();
        assert_eq!(concepts.len(), 2);
        assert_eq!(concepts[1].label, "Plurality ]");

        let reply: ConceptsReply =
            parse_json_block("See [1] below. {\"concepts\": [{\"label\": \"Voting\"}]}").unwrap();
        assert_eq!(reply.concepts[0].label, "Voting");
    }

    #[test]
    fn raw_concepts_tolerate_nulls_and_bare_evidence() {
        let raw: RawConcept = serde_json::from_str(
            r#"{"label": "AI", "aliases": null, "evidence": ["quote", {"text": "other"}], "tier": "advanced"}"#,
        )
        .unwrap();
        assert!(raw.aliases.is_empty());
        assert_eq!(raw.evidence.len(), 2);
        assert_eq!(raw.evidence[0].text, "quote");
        assert_eq!(raw.tier, Some(Tier::Advanced));
    }

    #[test]
    fn raw_relation_reads_type_and_defaults_confidence() {
        let raw: RawRelation = serde_json::from_str(
            r#"{"source_label": "A", "target_label": "B", "type": "uses", "label": "relies on"}"#,
        )
        .unwrap();
        assert_eq!(raw.kind, "uses");
        assert_eq!(raw.label.as_deref(), Some("relies on"));
        assert!((raw.confidence - 0.7).abs() < 1e-9);
    }

    struct Canned(&'static str);

    impl Completion for Canned {
        fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn prompt_oracle_parses_replies() {
        let section = Section {
            id: "s00_00".into(),
            chapter: "a.md".into(),
            title: "T".into(),
            path: "a.md".into(),
            text: "text".into(),
        };
        let oracle = PromptOracle::new(Canned(r#"{"edges": [{"source_label": "A", "target_label": "B", "type": "is_a"}]}"#));
        let relations = oracle.extract_relations(&section, &[], &[]).unwrap();
        assert_eq!(relations.len(), 1);
        // no "concepts" key means no concepts
        assert!(oracle.extract_concepts(&section, 10).unwrap().is_empty());
    }
}
