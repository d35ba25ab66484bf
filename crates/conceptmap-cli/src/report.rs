//! Human-readable reports.

use colored::Colorize;
use conceptmap_graph::{
    ConnectivityReport, CrossSectionAnalysis, EvidenceIssue, EvidenceIssueKind, FixMethod,
    MergeOutcome, RepairOutcome,
};
use conceptmap_ingest::{RunReport, SectionStatus};
use std::path::Path;

const SHOWN_CHARS: usize = 100;
const SHOWN_COMPONENT_NODES: usize = 8;

fn shorten(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SHOWN_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub(crate) fn print_run(report: &RunReport) {
    for outcome in &report.sections {
        let status = match outcome.status {
            SectionStatus::Success => "ok".green().bold(),
            SectionStatus::Skipped => "skipped".yellow().bold(),
            SectionStatus::Error => "error".red().bold(),
        };
        match outcome.status {
            SectionStatus::Success => println!(
                "{status} {} {} ({} nodes, {} edges, {} edges dropped)",
                outcome.section_id.bold(),
                outcome.title,
                outcome.nodes,
                outcome.edges,
                outcome.edge_stats.dropped()
            ),
            _ => println!(
                "{status} {} {}: {}",
                outcome.section_id.bold(),
                outcome.title,
                outcome.message.as_deref().unwrap_or("")
            ),
        }
    }
    println!(
        "\n{} {} succeeded, {} skipped, {} failed",
        "Summary:".bold(),
        report.count(SectionStatus::Success),
        report.count(SectionStatus::Skipped),
        report.count(SectionStatus::Error)
    );
}

pub(crate) fn print_merge(outcome: &MergeOutcome) {
    for warning in &outcome.warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
    if outcome.collisions.is_empty() {
        println!("No id collisions.");
    } else {
        println!("{}", "ID collisions resolved:".bold());
        for (id, sections) in &outcome.collisions {
            println!("  {id}: sections {}", sections.join(", "));
        }
    }
    if let Some(stats) = outcome.graph.metadata.as_ref().map(|m| &m.statistics) {
        println!(
            "{} {} nodes, {} edges, {} collisions resolved",
            "Merged:".green().bold(),
            stats.total_nodes,
            stats.total_edges,
            stats.id_collisions_resolved
        );
    }
}

pub(crate) fn print_validation(problems: &[String]) {
    if problems.is_empty() {
        println!("{}", "Valid.".green());
        return;
    }
    println!("{} {} problem(s)", "Invalid:".red().bold(), problems.len());
    for problem in problems {
        println!("  - {problem}");
    }
}

pub(crate) fn print_connectivity(report: &ConnectivityReport) {
    println!("{} {}", "Nodes:".bold(), report.total_nodes);
    println!("{} {}", "Edges:".bold(), report.total_edges);
    println!("{} {}", "Components:".bold(), report.num_components);
    if report.is_connected {
        println!("{}", "Connected.".green());
    } else {
        println!("{}", "Disconnected.".yellow());
    }
    for (i, component) in report.components.iter().enumerate() {
        let shown: Vec<&str> = component
            .iter()
            .take(SHOWN_COMPONENT_NODES)
            .map(String::as_str)
            .collect();
        let more = component.len().saturating_sub(shown.len());
        let suffix = if more > 0 { format!(" (+{more} more)") } else { String::new() };
        println!("  {}. [{}] {}{suffix}", i + 1, component.len(), shown.join(", "));
    }
    if !report.isolated_nodes.is_empty() {
        println!(
            "{} {}",
            "Isolated:".yellow().bold(),
            report.isolated_nodes.join(", ")
        );
    }
}

pub(crate) fn print_issues(issues: &[EvidenceIssue]) {
    if issues.is_empty() {
        println!("{}", "All evidence found in sources.".green());
        return;
    }
    println!("{} {} issue(s)", "Evidence problems:".red().bold(), issues.len());
    for issue in issues {
        let kind = match issue.kind {
            EvidenceIssueKind::MissingSource => issue.kind.as_str().red(),
            _ => issue.kind.as_str().yellow(),
        };
        match &issue.owner {
            Some(owner) => println!("\n[{kind}] {owner}"),
            None => println!("\n[{kind}] {}", issue.graph_file.display()),
        }
        if let Some(text) = &issue.evidence_text {
            println!("  evidence: {}", shorten(text));
        }
        if let (Some(matched), Some(similarity)) = (&issue.matched_text, issue.similarity) {
            println!("  closest ({similarity:.2}): {}", shorten(matched));
        }
        if let Some(message) = &issue.message {
            println!("  {}", message.dimmed());
        }
    }
}

pub(crate) fn print_skipped(graph: &Path, error: &anyhow::Error) {
    eprintln!(
        "{} skipping {}: {error:#}",
        "warning:".yellow().bold(),
        graph.display()
    );
}

pub(crate) fn print_fixes(outcome: &RepairOutcome, dry_run: bool) {
    for source in &outcome.missing_sources {
        eprintln!(
            "{} source not found, fuzzy repair skipped: {}",
            "warning:".yellow().bold(),
            source.display()
        );
    }
    let fixes = &outcome.fixes;
    if fixes.is_empty() {
        println!("No evidence fixes applied.");
        return;
    }
    let verb = if dry_run { "Would fix" } else { "Fixed" };
    println!("{} {} quotation(s)", verb.green().bold(), fixes.len());
    for fix in fixes {
        let method = match fix.method {
            FixMethod::Manual => "manual",
            FixMethod::Fuzzy => "fuzzy",
        };
        println!("\n{} [{method} {:.2}]", fix.owner, fix.similarity);
        println!("  - {}", shorten(&fix.before).red());
        println!("  + {}", shorten(&fix.after).green());
    }
}

pub(crate) fn print_links(analysis: &CrossSectionAnalysis, limit: usize) {
    println!(
        "{} {} candidate pair(s) across {} section(s)",
        "Links:".bold(),
        analysis.candidates.len(),
        analysis.section_nodes.len()
    );
    for candidate in analysis.candidates.iter().take(limit) {
        let marker = if candidate.original_id_match { " (same id)" } else { "" };
        println!(
            "  {:.2} [{}] {} ~ [{}] {}{marker}",
            candidate.similarity,
            candidate.a.section,
            candidate.a.label,
            candidate.b.section,
            candidate.b.label
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_marks_truncation() {
        assert_eq!(shorten("short"), "short");
        let long = "é".repeat(150);
        let out = shorten(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), SHOWN_CHARS + 3);
    }
}
