//! Flat exports of a graph: CSV tables and a Mermaid diagram.

use anyhow::{Context, Result};
use conceptmap_graph::{Evidence, GraphDocument, Tier};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const NODES_CSV: &str = "nodes.csv";
pub const EDGES_CSV: &str = "edges.csv";
pub const MERMAID_MD: &str = "mermaid.md";

const EVIDENCE_CELL_CHARS: usize = 200;

/// Keep the head and tail of long evidence: `head...tail`, at most `max_chars`.
pub fn truncate_evidence(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let half = (max_chars / 2).saturating_sub(5);
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{head}...{tail}")
}

fn evidence_cell(evidence: &[Evidence]) -> String {
    evidence
        .iter()
        .map(|e| truncate_evidence(&e.text, EVIDENCE_CELL_CHARS))
        .collect::<Vec<_>>()
        .join("|")
}

fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn write_row<W: Write>(out: &mut W, fields: &[&str]) -> std::io::Result<()> {
    let row: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
    writeln!(out, "{}", row.join(","))
}

pub fn write_nodes_csv<W: Write>(graph: &GraphDocument, mut out: W) -> Result<()> {
    write_row(&mut out, &["id", "label", "tier", "definition", "aliases", "evidence"])?;
    for node in &graph.nodes {
        write_row(
            &mut out,
            &[
                &node.id,
                &node.label,
                node.tier.as_str(),
                node.definition.as_deref().unwrap_or(""),
                &node.aliases.join("|"),
                &evidence_cell(&node.evidence),
            ],
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_edges_csv<W: Write>(graph: &GraphDocument, mut out: W) -> Result<()> {
    write_row(&mut out, &["source", "target", "relation", "confidence", "evidence"])?;
    for edge in &graph.edges {
        write_row(
            &mut out,
            &[
                &edge.source,
                &edge.target,
                &edge.relation,
                &format!("{:.2}", edge.confidence),
                &evidence_cell(&edge.evidence),
            ],
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Mermaid flowchart of the core concepts and their hierarchy edges.
pub fn mermaid(graph: &GraphDocument) -> String {
    let mut lines = vec!["```mermaid".to_string(), "graph TD".to_string()];
    for node in graph.nodes.iter().filter(|n| n.tier == Tier::Core) {
        let label = node.label.replace('"', "'");
        lines.push(format!("  {}[\"{}\"]", node.id, label));
    }
    for edge in &graph.edges {
        if matches!(edge.relation.as_str(), "prerequisite_of" | "is_a") {
            lines.push(format!("  {} -->|{}| {}", edge.source, edge.relation, edge.target));
        }
    }
    lines.push("```".to_string());
    lines.join("\n") + "\n"
}

/// Write `nodes.csv`, `edges.csv` and `mermaid.md` into `dir`.
pub fn export_all(graph: &GraphDocument, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let nodes = dir.join(NODES_CSV);
    let edges = dir.join(EDGES_CSV);
    let diagram = dir.join(MERMAID_MD);

    let file = std::fs::File::create(&nodes).with_context(|| format!("creating {}", nodes.display()))?;
    write_nodes_csv(graph, file)?;
    let file = std::fs::File::create(&edges).with_context(|| format!("creating {}", edges.display()))?;
    write_edges_csv(graph, file)?;
    std::fs::write(&diagram, mermaid(graph))
        .with_context(|| format!("writing {}", diagram.display()))?;

    Ok(vec![nodes, edges, diagram])
}
