//! Prompt templates.
//!
//! Every prompt asks for strict JSON; replies are read with
//! [`parse_json_block`](crate::oracle::parse_json_block).

use crate::sections::Section;
use conceptmap_graph::{Concept, ConnectivityReport, CrossSectionAnalysis, GraphDocument};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Section text beyond this many characters is not sent.
pub const MAX_SECTION_CHARS: usize = 12_000;

const LINK_PROMPT_CONCEPTS_PER_SECTION: usize = 10;
const LINK_PROMPT_PAIRS: usize = 20;

/// The first `max_chars` characters of `text`.
pub fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn concept_prompt(section: &Section, max_concepts: usize) -> String {
    format!(
        r#"You extract the key concepts of a textbook section for a study concept map.

Return JSON of the form:
{{
  "concepts": [
    {{
      "label": "short concept name",
      "aliases": ["other names used in the text"],
      "definition": "one sentence, at most 30 words",
      "tier": "core | supplementary | advanced",
      "evidence": [{{"text": "verbatim quotation from the section"}}]
    }}
  ]
}}

Rules:
- At most {max_concepts} concepts; prefer what a learner must understand.
- Labels are short noun phrases in the language of the text.
- Evidence must be copied verbatim from the section, never paraphrased.

Section: {title}
Chapter file: {chapter}

Text:
{text}
"#,
        title = section.title,
        chapter = section.chapter,
        text = clip(&section.text, MAX_SECTION_CHARS),
    )
}

pub fn relation_prompt(section: &Section, concepts: &[Concept], relation_kinds: &[String]) -> String {
    let mut listing = String::new();
    for concept in concepts {
        let _ = writeln!(listing, "- {}", concept.label);
    }
    format!(
        r#"You connect the concepts of a textbook section with typed relations.

Concepts (use these labels exactly):
{listing}
Return JSON of the form:
{{
  "edges": [
    {{
      "source_label": "a label from the list",
      "target_label": "a label from the list",
      "type": "one of: {kinds}",
      "label": "short name of the relation",
      "relation_description": "one sentence",
      "confidence": 0.0,
      "evidence": [{{"text": "verbatim quotation that grounds the relation"}}]
    }}
  ]
}}

Rules:
- Only relate concepts from the list; 3 to 12 edges.
- Evidence must be copied verbatim from the section.

Section: {title}

Text:
{text}
"#,
        kinds = relation_kinds.join(", "),
        title = section.title,
        text = clip(&section.text, MAX_SECTION_CHARS),
    )
}

/// Prompt asking for edges and merges that reconnect a disconnected section graph.
pub fn connectivity_fix_prompt(
    section_id: &str,
    markdown: &str,
    graph: &GraphDocument,
    report: &ConnectivityReport,
    relation_kinds: &[String],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# The concept graph of section {section_id} is disconnected\n");
    let _ = writeln!(out, "## Statistics\n");
    let _ = writeln!(out, "- Nodes: {}", report.total_nodes);
    let _ = writeln!(out, "- Edges: {}", report.total_edges);
    let _ = writeln!(out, "- Connected components: {}", report.num_components);
    let _ = writeln!(out, "- Isolated nodes: {}\n", report.isolated_nodes.len());

    let _ = writeln!(out, "## Components\n");
    for (i, component) in report.components.iter().enumerate() {
        let labels: Vec<&str> = component
            .iter()
            .map(|id| graph.node(id).map(|c| c.label.as_str()).unwrap_or(id.as_str()))
            .collect();
        let _ = writeln!(out, "{}. {}", i + 1, labels.join(", "));
    }
    if !report.isolated_nodes.is_empty() {
        let _ = writeln!(out, "\nIsolated: {}", report.isolated_nodes.join(", "));
    }

    let _ = writeln!(out, "\n## Source section\n\n{}\n", clip(markdown, MAX_SECTION_CHARS));
    let _ = writeln!(out, "## Current graph\n");
    let nodes = serde_json::to_string_pretty(&graph.nodes).unwrap_or_default();
    let edges = serde_json::to_string_pretty(&graph.edges).unwrap_or_default();
    let _ = writeln!(out, "Nodes:\n```json\n{nodes}\n```\n");
    let _ = writeln!(out, "Edges:\n```json\n{edges}\n```\n");

    let _ = writeln!(
        out,
        r#"## Task

1. Add edges that connect isolated nodes and separate components, grounded in the text.
2. Propose merges for concepts that denote the same thing.
3. Use only these relation types: {kinds}

Return JSON of the form:
{{
  "new_edges": [
    {{"source_label": "...", "target_label": "...", "type": "...", "relation_description": "...", "confidence": 0.0, "evidence": [{{"text": "verbatim quotation"}}]}}
  ],
  "concept_merges": [
    {{"keep": "label to keep", "merge": ["labels folded into it"], "reason": "..."}}
  ]
}}"#,
        kinds = relation_kinds.join(", ")
    );
    out
}

fn describe(concept: &Concept) -> String {
    match concept.definition.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(def) => format!("- {}: {}", concept.label, def),
        None => format!("- {}", concept.label),
    }
}

fn link_reply_format() -> &'static str {
    r#"Return JSON of the form:
{
  "cross_chapter_links": [
    {
      "source_section": "...",
      "source_concept": "...",
      "target_section": "...",
      "target_concept": "...",
      "relation": "...",
      "relation_description": "...",
      "confidence": 0.0,
      "reasoning": "..."
    }
  ]
}"#
}

/// Prompt asking which candidate pairs seen from `section` are real links.
pub fn section_link_prompt(
    graph: &GraphDocument,
    analysis: &CrossSectionAnalysis,
    section: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Cross-section links for section {section}\n");
    let _ = writeln!(out, "## Concepts in this section\n");
    for id in analysis.section_nodes.get(section).into_iter().flatten() {
        if let Some(concept) = graph.node(id) {
            let _ = writeln!(out, "{}", describe(concept));
        }
    }

    let mut by_target: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for view in analysis.views_for(section) {
        by_target.entry(view.to_section.as_str()).or_default().push(format!(
            "- {} ~ {} (similarity {:.2})",
            view.from_concept, view.to_concept, view.similarity
        ));
    }
    let _ = writeln!(out, "\n## Possibly related concepts in other sections\n");
    if by_target.is_empty() {
        let _ = writeln!(out, "(none found)");
    }
    for (target, lines) in by_target {
        let _ = writeln!(out, "### Section {target}");
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "\n## Task\n\nKeep only pairs that are genuinely related and name the relation.\n"
    );
    out.push_str(link_reply_format());
    out.push('\n');
    out
}

/// One prompt over the whole graph: a sample of concepts per section and the
/// strongest candidate pairs.
pub fn batch_link_prompt(graph: &GraphDocument, analysis: &CrossSectionAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Cross-section links\n");
    let _ = writeln!(out, "## Concepts by section\n");
    for (section, ids) in &analysis.section_nodes {
        let _ = writeln!(out, "### Section {section}");
        for id in ids.iter().take(LINK_PROMPT_CONCEPTS_PER_SECTION) {
            if let Some(concept) = graph.node(id) {
                let _ = writeln!(out, "{}", describe(concept));
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Candidate pairs\n");
    for candidate in analysis.candidates.iter().take(LINK_PROMPT_PAIRS) {
        let _ = writeln!(
            out,
            "- [{}] {} ~ [{}] {} (similarity {:.2})",
            candidate.a.section,
            candidate.a.label,
            candidate.b.section,
            candidate.b.label,
            candidate.similarity
        );
    }

    let _ = writeln!(
        out,
        "\n## Task\n\nPropose links between concepts of different sections, including ones not listed above.\n"
    );
    out.push_str(link_reply_format());
    out.push('\n');
    out
}
