//! Concept graph reconciliation
//!
//! Section-scoped concept graphs come out of independent oracle calls that know
//! nothing about each other. This crate turns many of them into one globally
//! consistent graph:
//!
//! ```text
//! section graphs ──► dedup + edge filter ──► merge ──► connectivity (diagnostic)
//!                      (per section)            │
//!                                               ├──► evidence check / repair
//!                                               └──► cross-section link candidates
//! ```
//!
//! - [`canonical`]: label keys and graph-safe ids
//! - [`dedup`]: synonym-aware concept deduplication
//! - [`filter`]: drop edges with unknown relations, dangling endpoints, self-loops
//! - [`merge`]: id-collision-aware union of section graphs, plus validation
//! - [`connectivity`]: undirected components and isolated concepts
//! - [`evidence`]: quotation matching against source text, and repair
//! - [`links`]: cross-section concept pairs worth reviewing
//!
//! Every recoverable problem (dangling edges, missing sources, collisions) is
//! reported as data. [`GraphError`] is reserved for I/O and configuration
//! failures.

pub mod canonical;
pub mod config;
pub mod connectivity;
pub mod dedup;
pub mod error;
pub mod evidence;
pub mod filter;
pub mod io;
pub mod links;
pub mod merge;
pub mod model;
pub mod sources;

pub use canonical::{canonicalize, sha256_hex, short_hash, slugify, SLUG_MAX_CHARS};
pub use config::{ReconcileConfig, DEFAULT_RELATION_KINDS};
pub use connectivity::{analyze_connectivity, ConnectivityReport};
pub use dedup::{dedupe_concepts, dedupe_concepts_with_map, ConceptIndex, DedupOutcome};
pub use error::{GraphError, Result};
pub use evidence::{
    find_in_source, normalize_evidence_text, repair_graph_evidence, validate_graph_evidence,
    EvidenceFix, EvidenceIssue, EvidenceIssueKind, EvidenceOwner, FixMethod, ManualFixes,
    RepairOptions, RepairOutcome, SourceMatch,
};
pub use filter::{filter_edges, filter_edges_with_stats, EdgeFilterStats};
pub use io::{
    discover_section_graphs, load_graph, load_section_graphs, save_graph, section_id_from_filename,
    write_json, MERGED_GRAPH_FILE,
};
pub use links::{
    discover_cross_section_links, CrossSectionAnalysis, LinkCandidate, LinkEnd, LinkView,
};
pub use merge::{merge_section_graphs, validate_merged_graph, MergeOutcome, SectionGraph};
pub use model::{
    Concept, Edge, Evidence, GraphDocument, GraphMetadata, MergeStatistics, MergedFrom, Tier,
};
pub use sources::{load_source_text, strip_preamble, SourceCatalog};
