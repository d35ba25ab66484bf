//! Conceptmap CLI
//!
//! Command-line interface for:
//! - Extracting per-section concept graphs from markdown chapters
//! - Merging section graphs and validating the result
//! - Connectivity diagnostics and repair prompts
//! - Checking and repairing evidence quotations against their sources
//! - Cross-section link candidates and flat exports

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use conceptmap_graph::{
    analyze_connectivity, discover_cross_section_links, discover_section_graphs, load_graph,
    load_section_graphs, merge_section_graphs, repair_graph_evidence, save_graph,
    section_id_from_filename, validate_graph_evidence, validate_merged_graph, GraphDocument,
    ManualFixes, ReconcileConfig, RepairOptions, SourceCatalog, MERGED_GRAPH_FILE,
};
use conceptmap_ingest::{
    batch_link_prompt, connectivity_fix_prompt, export_all, load_sections, run_extraction,
    section_link_prompt, ConceptOracle, ExtractOptions, ProcessedLedger, ScriptedOracle,
    SegmentLevel, SegmentMode, SOURCES_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod llm;
mod report;

const DEFAULT_LEDGER_FILE: &str = "processed_files.json";
const SHOWN_LINKS: usize = 20;

#[derive(Parser)]
#[command(name = "conceptmap")]
#[command(author, version, about = "Concept maps from textbook chapters")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with reconciliation settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one concept graph per section of the markdown under `--input`.
    Extract(ExtractArgs),

    /// Merge the section graphs of a directory into one graph.
    Merge {
        #[arg(long)]
        graph_dir: PathBuf,
        /// Output file (default: <graph-dir>/graph_merged.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check a merged graph for duplicate ids and dangling edges.
    Validate {
        #[arg(long)]
        graph: PathBuf,
    },

    /// Connected components and isolated concepts of a graph.
    Connectivity {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Render a prompt asking an LLM to reconnect a disconnected section graph.
    FixPrompt {
        #[arg(long)]
        graph: PathBuf,
        /// The section's markdown source
        #[arg(long)]
        markdown: PathBuf,
        #[arg(long)]
        section_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Evidence quotations against source documents.
    Evidence {
        #[command(subcommand)]
        command: EvidenceCommands,
    },

    /// Cross-section link candidates of a merged graph.
    Links {
        #[arg(long)]
        graph: PathBuf,
        /// Minimum label containment ratio
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        /// Write a review prompt to this file
        #[arg(long)]
        prompt_out: Option<PathBuf>,
        /// Render the prompt for one section instead of the whole graph
        #[arg(long, requires = "prompt_out")]
        section: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Write nodes.csv, edges.csv and mermaid.md.
    Export {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// Directory of markdown chapters
    #[arg(long)]
    input: PathBuf,
    /// Directory for section graphs
    #[arg(long)]
    out: PathBuf,
    /// Heading level sections are split at (h1, h2, h3)
    #[arg(long, default_value = "h2", conflicts_with = "whole_file")]
    segment_level: SegmentLevel,
    /// One section per file instead of splitting at headings
    #[arg(long)]
    whole_file: bool,
    /// Section id prefix in whole-file mode
    #[arg(long, default_value = "sec")]
    prefix: String,
    #[arg(long, default_value_t = 15)]
    max_concepts: usize,
    /// Model name (default: $OPENAI_MODEL or gpt-4o-mini)
    #[arg(long)]
    model: Option<String>,
    /// Request timeout in seconds (0 disables)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Replay recorded oracle replies from a JSON script instead of calling an LLM
    #[arg(long)]
    script: Option<PathBuf>,
    /// Re-extract files that are unchanged since the last run
    #[arg(long)]
    force: bool,
    /// Processed-file ledger (default: <out>/processed_files.json)
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum EvidenceCommands {
    /// Report quotations that cannot be found in their source.
    Check {
        #[command(flatten)]
        sources: SourceArgs,
        /// Minimum similarity for a quotation to count as found
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        #[arg(long)]
        json: bool,
    },

    /// Rewrite defective quotations to the matching source text.
    Fix {
        #[command(flatten)]
        sources: SourceArgs,
        /// JSON object mapping wrong quotations to corrections
        #[arg(long)]
        manual: Option<PathBuf>,
        /// Only apply manual corrections
        #[arg(long)]
        no_auto: bool,
        /// Minimum similarity for fuzzy repair
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        /// Report fixes without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Graph files to check
    #[arg(long = "graph", required = true, num_args = 1..)]
    graphs: Vec<PathBuf>,
    /// Directory holding `<section>.md` sources
    #[arg(long)]
    source_dir: PathBuf,
    /// JSON section -> source path table (default: sources.json next to the graph, if present)
    #[arg(long)]
    sources: Option<PathBuf>,
}

fn parse_threshold(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside [0, 1]"))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ReconcileConfig::from_path(path)?,
        None => ReconcileConfig::default(),
    };

    match cli.command {
        Commands::Extract(args) => cmd_extract(&args, &config)?,
        Commands::Merge { graph_dir, out } => cmd_merge(&graph_dir, out.as_deref())?,
        Commands::Validate { graph } => {
            if !cmd_validate(&graph)? {
                std::process::exit(1);
            }
        }
        Commands::Connectivity { graph, json } => cmd_connectivity(&graph, json)?,
        Commands::FixPrompt {
            graph,
            markdown,
            section_id,
            out,
        } => cmd_fix_prompt(&graph, &markdown, &section_id, out.as_deref(), &config)?,
        Commands::Evidence { command } => match command {
            EvidenceCommands::Check {
                sources,
                threshold,
                json,
            } => {
                let threshold = threshold.unwrap_or(config.validation_threshold);
                if !cmd_evidence_check(&sources, threshold, json)? {
                    std::process::exit(1);
                }
            }
            EvidenceCommands::Fix {
                sources,
                manual,
                no_auto,
                threshold,
                dry_run,
            } => {
                let mut options = RepairOptions::from_config(&config);
                if let Some(t) = threshold {
                    options.threshold = t;
                }
                options.auto = !no_auto;
                if let Some(path) = &manual {
                    options = options.with_manual(ManualFixes::from_path(path)?);
                }
                if !cmd_evidence_fix(&sources, &options, dry_run)? {
                    std::process::exit(1);
                }
            }
        },
        Commands::Links {
            graph,
            threshold,
            prompt_out,
            section,
            json,
        } => {
            let threshold = threshold.unwrap_or(config.link_threshold);
            cmd_links(&graph, threshold, prompt_out.as_deref(), section.as_deref(), json)?;
        }
        Commands::Export { graph, out } => cmd_export(&graph, &out)?,
    }
    Ok(())
}

// ============================================================================
// Extraction
// ============================================================================

fn build_oracle(args: &ExtractArgs) -> Result<Box<dyn ConceptOracle>> {
    match &args.script {
        Some(script) => Ok(Box::new(ScriptedOracle::from_path(script)?)),
        None => llm_oracle(args),
    }
}

#[cfg(feature = "llm-openai")]
fn llm_oracle(args: &ExtractArgs) -> Result<Box<dyn ConceptOracle>> {
    let chat = llm::OpenAiChat::from_env(args.model.as_deref(), args.timeout_secs)?;
    info!(model = chat.model(), "using OpenAI-compatible oracle");
    Ok(Box::new(conceptmap_ingest::PromptOracle::new(chat)))
}

#[cfg(not(feature = "llm-openai"))]
fn llm_oracle(_args: &ExtractArgs) -> Result<Box<dyn ConceptOracle>> {
    Err(anyhow!(
        "built without the `llm-openai` feature; pass --script to replay recorded replies"
    ))
}

fn cmd_extract(args: &ExtractArgs, config: &ReconcileConfig) -> Result<()> {
    let mode = if args.whole_file {
        SegmentMode::WholeFile {
            prefix: args.prefix.clone(),
        }
    } else {
        SegmentMode::Headings(args.segment_level)
    };
    let sections = load_sections(&args.input, &mode)?;
    if sections.is_empty() {
        return Err(anyhow!("no markdown sections under {}", args.input.display()));
    }
    println!(
        "{} {} section(s) from {}",
        "Extracting".green().bold(),
        sections.len(),
        args.input.display()
    );

    let oracle = build_oracle(args)?;
    let ledger_path = args
        .ledger
        .clone()
        .unwrap_or_else(|| args.out.join(DEFAULT_LEDGER_FILE));
    let mut ledger = ProcessedLedger::load(&ledger_path)?;
    let options = ExtractOptions {
        max_concepts: args.max_concepts,
        force: args.force,
        ..ExtractOptions::from_config(config)
    };

    let run = run_extraction(oracle.as_ref(), &sections, &args.out, &mut ledger, &options)?;
    ledger.save(&ledger_path)?;
    report::print_run(&run);
    eprintln!("{} {}", "wrote".green().bold(), args.out.display().to_string().bold());
    Ok(())
}

// ============================================================================
// Merge / validate / connectivity
// ============================================================================

fn cmd_merge(graph_dir: &Path, out: Option<&Path>) -> Result<()> {
    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| graph_dir.join(MERGED_GRAPH_FILE));
    let files = discover_section_graphs(graph_dir, Some(&out))?;
    if files.is_empty() {
        return Err(anyhow!("no section graphs in {}", graph_dir.display()));
    }
    println!(
        "{} {} section graph(s) from {}",
        "Merging".green().bold(),
        files.len(),
        graph_dir.display()
    );

    let (sections, load_warnings) = load_section_graphs(&files);
    for warning in &load_warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
    let outcome = merge_section_graphs(sections);
    report::print_merge(&outcome);

    let problems = validate_merged_graph(&outcome.graph);
    report::print_validation(&problems);

    save_graph(&out, &outcome.graph)?;
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}

fn cmd_validate(graph: &Path) -> Result<bool> {
    println!("{} {}", "Validating".green().bold(), graph.display());
    let doc = load_graph(graph)?;
    let problems = validate_merged_graph(&doc);
    report::print_validation(&problems);
    Ok(problems.is_empty())
}

fn cmd_connectivity(graph: &Path, json: bool) -> Result<()> {
    let doc = load_graph(graph)?;
    let report = analyze_connectivity(&doc);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_connectivity(&report);
    }
    Ok(())
}

fn cmd_fix_prompt(
    graph: &Path,
    markdown: &Path,
    section_id: &str,
    out: Option<&Path>,
    config: &ReconcileConfig,
) -> Result<()> {
    let doc = load_graph(graph)?;
    let report = analyze_connectivity(&doc);
    if report.is_connected {
        println!("{} nothing to fix", "Connected:".green().bold());
        return Ok(());
    }
    let text = fs::read_to_string(markdown)
        .with_context(|| format!("reading {}", markdown.display()))?;
    let prompt = connectivity_fix_prompt(section_id, &text, &doc, &report, &config.relation_kinds);
    write_or_print(out, &prompt)
}

fn write_or_print(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => print!("{text}"),
    }
    Ok(())
}

// ============================================================================
// Evidence
// ============================================================================

/// Section a graph file is checked against when its records carry none.
fn default_section(graph: &Path) -> Option<String> {
    let name = graph.file_name()?.to_str()?;
    if name == MERGED_GRAPH_FILE {
        return None;
    }
    section_id_from_filename(name)
}

fn catalog_for(args: &SourceArgs, graph: &Path) -> Result<SourceCatalog> {
    let mut catalog = SourceCatalog::new(&args.source_dir);
    let mapping = match &args.sources {
        Some(path) => Some(path.clone()),
        None => graph
            .parent()
            .map(|dir| dir.join(SOURCES_FILE))
            .filter(|p| p.exists()),
    };
    if let Some(path) = mapping {
        catalog = catalog.with_mapping(SourceCatalog::load_mapping(&path)?);
    }
    Ok(catalog)
}

/// Load a graph and its source catalog; a broken graph or source table is
/// reported and skipped.
fn open_graph(args: &SourceArgs, path: &Path) -> Option<(GraphDocument, SourceCatalog)> {
    let loaded = load_graph(path)
        .map_err(anyhow::Error::from)
        .and_then(|graph| Ok((graph, catalog_for(args, path)?)));
    match loaded {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!(graph = %path.display(), "skipping graph: {e:#}");
            report::print_skipped(path, &e);
            None
        }
    }
}

/// `Ok(false)` when a graph could not be read or evidence problems were found.
fn cmd_evidence_check(args: &SourceArgs, threshold: f64, json: bool) -> Result<bool> {
    let mut all_issues = Vec::new();
    let mut skipped = 0usize;
    for path in &args.graphs {
        let Some((graph, mut catalog)) = open_graph(args, path) else {
            skipped += 1;
            continue;
        };
        let section = default_section(path);
        let issues = validate_graph_evidence(&graph, path, section.as_deref(), &mut catalog, threshold);
        info!(
            graph = %path.display(),
            quotations = graph.evidence_count(),
            issues = issues.len(),
            "checked evidence"
        );
        all_issues.extend(issues);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all_issues)?);
    } else {
        report::print_issues(&all_issues);
    }
    Ok(all_issues.is_empty() && skipped == 0)
}

/// `Ok(false)` when a graph could not be read.
fn cmd_evidence_fix(args: &SourceArgs, options: &RepairOptions, dry_run: bool) -> Result<bool> {
    let mut skipped = 0usize;
    for path in &args.graphs {
        println!("{} {}", "Repairing".green().bold(), path.display());
        let Some((mut graph, mut catalog)) = open_graph(args, path) else {
            skipped += 1;
            continue;
        };
        let section = default_section(path);
        let outcome = repair_graph_evidence(&mut graph, section.as_deref(), &mut catalog, options);
        report::print_fixes(&outcome, dry_run);
        if !outcome.fixes.is_empty() && !dry_run {
            save_graph(path, &graph)?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
    }
    Ok(skipped == 0)
}

// ============================================================================
// Links / export
// ============================================================================

fn cmd_links(
    graph: &Path,
    threshold: f64,
    prompt_out: Option<&Path>,
    section: Option<&str>,
    json: bool,
) -> Result<()> {
    let doc = load_graph(graph)?;
    let analysis = discover_cross_section_links(&doc, threshold);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        report::print_links(&analysis, SHOWN_LINKS);
    }
    if let Some(out) = prompt_out {
        let prompt = match section {
            Some(section) => section_link_prompt(&doc, &analysis, section),
            None => batch_link_prompt(&doc, &analysis),
        };
        write_or_print(Some(out), &prompt)?;
    }
    Ok(())
}

fn cmd_export(graph: &Path, out: &Path) -> Result<()> {
    let doc = load_graph(graph)?;
    for path in export_all(&doc, out)? {
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
    Ok(())
}
