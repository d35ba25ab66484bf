//! Getting concept graphs out of documents, and back out again.
//!
//! - [`sections`]: markdown chapters to [`Section`]s
//! - [`oracle`]: the [`ConceptOracle`] capability and reply parsing
//! - [`prompts`]: prompt templates for extraction, connectivity fixes and links
//! - [`pipeline`]: the per-section extraction driver
//! - [`ledger`]: which chapter files are already processed
//! - [`export`]: CSV tables and a Mermaid diagram
//! - [`testing`]: a scripted oracle

pub mod export;
pub mod ledger;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod sections;
pub mod testing;

pub use export::{export_all, mermaid, truncate_evidence, write_edges_csv, write_nodes_csv};
pub use ledger::{content_hash, LedgerEntry, ProcessedLedger};
pub use oracle::{
    parse_json_block, Completion, ConceptOracle, OracleError, PromptOracle, RawConcept,
    RawRelation,
};
pub use pipeline::{
    extract_section, run_extraction, section_graph_path, ExtractOptions, RunReport,
    SectionOutcome, SectionStatus, SOURCES_FILE,
};
pub use prompts::{
    batch_link_prompt, concept_prompt, connectivity_fix_prompt, relation_prompt,
    section_link_prompt,
};
pub use sections::{
    find_markdown_files, load_sections, segment_files, split_sections, Section, SegmentLevel,
    SegmentMode,
};
pub use testing::ScriptedOracle;
