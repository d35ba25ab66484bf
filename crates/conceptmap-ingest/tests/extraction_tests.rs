//! Extraction runs over a chapter directory with a scripted oracle.

use conceptmap_graph::{
    discover_section_graphs, load_graph, load_section_graphs, merge_section_graphs,
    validate_graph_evidence, SourceCatalog, MERGED_GRAPH_FILE,
};
use conceptmap_ingest::*;
use std::fs;
use std::path::Path;

fn write_book(dir: &Path) {
    fs::write(
        dir.join("01.md"),
        "# Plurality\n\nPlurality is technology for collaboration across social difference.\n\
         Quadratic voting is one plural institution.\n",
    )
    .unwrap();
    fs::write(
        dir.join("02.md"),
        "# Voting\n\nQuadratic voting lets people express how strongly they care.\n",
    )
    .unwrap();
}

fn oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .with_concepts(
            "book-1",
            vec![
                RawConcept::new("Plurality")
                    .with_evidence("Plurality is technology for collaboration across social difference."),
                RawConcept::new("Quadratic Voting").with_aliases(["QV"]),
            ],
        )
        .with_relations(
            "book-1",
            vec![RawRelation::new("QV", "plurality", "example_of")
                .with_evidence("Quadratic voting is one plural institution.")],
        )
        .with_concepts(
            "book-2",
            vec![RawConcept::new("Quadratic Voting")
                .with_evidence("Quadratic voting lets people express how strongly they care.")],
        )
}

#[test]
fn whole_file_run_writes_graphs_sources_and_ledger_entries() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("book");
    let out = dir.path().join("graphs");
    fs::create_dir_all(&book).unwrap();
    write_book(&book);

    let mode = SegmentMode::WholeFile { prefix: "book".into() };
    let sections = load_sections(&book, &mode).unwrap();
    assert_eq!(sections.len(), 2);

    let mut ledger = ProcessedLedger::default();
    let report = run_extraction(&oracle(), &sections, &out, &mut ledger, &ExtractOptions::default()).unwrap();
    assert_eq!(report.count(SectionStatus::Success), 2);
    assert_eq!(ledger.len(), 2);

    let first = load_graph(&out.join("graph_book-1.json")).unwrap();
    assert_eq!(first.nodes.len(), 2);
    assert_eq!(first.edges.len(), 1);
    assert_eq!(first.edges[0].source, "quadratic_voting");

    // merge, then check every quotation against its own chapter
    let files = discover_section_graphs(&out, Some(&out.join(MERGED_GRAPH_FILE))).unwrap();
    let (graphs, warnings) = load_section_graphs(&files);
    assert!(warnings.is_empty());
    let merged = merge_section_graphs(graphs);
    assert_eq!(merged.collisions["quadratic_voting"], vec!["book-1", "book-2"]);

    let mapping = SourceCatalog::load_mapping(&out.join(SOURCES_FILE)).unwrap();
    let mut catalog = SourceCatalog::new(&book).with_mapping(mapping);
    let issues = validate_graph_evidence(&merged.graph, &out.join(MERGED_GRAPH_FILE), None, &mut catalog, 0.8);
    assert!(issues.is_empty(), "{issues:?}");
}

#[test]
fn unchanged_files_are_skipped_and_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("book");
    let out = dir.path().join("graphs");
    fs::create_dir_all(&book).unwrap();
    write_book(&book);

    let mode = SegmentMode::WholeFile { prefix: "book".into() };
    let sections = load_sections(&book, &mode).unwrap();
    let mut ledger = ProcessedLedger::default();

    let flaky = oracle().failing("book-2");
    let report = run_extraction(&flaky, &sections, &out, &mut ledger, &ExtractOptions::default()).unwrap();
    assert_eq!(report.count(SectionStatus::Success), 1);
    assert_eq!(report.count(SectionStatus::Error), 1);
    assert!(report.has_errors());
    assert!(report.sections[1].message.as_deref().unwrap().contains("book-2"));
    assert_eq!(ledger.len(), 1);

    let second = oracle();
    let report = run_extraction(&second, &sections, &out, &mut ledger, &ExtractOptions::default()).unwrap();
    assert_eq!(report.sections[0].status, SectionStatus::Skipped);
    assert_eq!(report.sections[1].status, SectionStatus::Success);
    // only book-2 asked the oracle: concepts + relations
    assert_eq!(second.calls(), 2);

    fs::write(book.join("01.md"), "# Plurality\n\nRewritten.\n").unwrap();
    let third = oracle();
    let forced = ExtractOptions {
        force: true,
        ..ExtractOptions::default()
    };
    let report = run_extraction(&third, &sections, &out, &mut ledger, &forced).unwrap();
    assert_eq!(report.count(SectionStatus::Success), 2);
    assert_eq!(third.calls(), 4);
}

#[test]
fn heading_sections_share_their_chapter_as_source() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("book");
    let out = dir.path().join("graphs");
    fs::create_dir_all(&book).unwrap();
    fs::write(book.join("ch.md"), "## One\n\nalpha\n\n## Two\n\nbeta\n").unwrap();

    let sections = load_sections(&book, &SegmentMode::Headings(SegmentLevel::H2)).unwrap();
    let mut ledger = ProcessedLedger::default();
    run_extraction(&ScriptedOracle::new(), &sections, &out, &mut ledger, &ExtractOptions::default()).unwrap();

    let mapping = SourceCatalog::load_mapping(&out.join(SOURCES_FILE)).unwrap();
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping["s00_00"], mapping["s00_01"]);
    assert!(mapping["s00_00"].ends_with("ch.md"));
    assert_eq!(ledger.get(&book.join("ch.md")).unwrap().section_ids, vec!["s00_00", "s00_01"]);
}
