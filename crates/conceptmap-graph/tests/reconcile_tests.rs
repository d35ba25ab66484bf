//! Reconciliation over files: section graphs on disk, merged, checked against
//! their sources, repaired and reloaded.

use approx::assert_relative_eq;
use conceptmap_graph::*;
use std::fs;
use std::path::Path;

fn write_section(dir: &Path, name: &str, graph: &GraphDocument) {
    save_graph(&dir.join(name), graph).unwrap();
}

fn sample_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let graphs = dir.path().join("graphs");
    let sources = dir.path().join("sources");
    fs::create_dir_all(&sources).unwrap();

    write_section(
        &graphs,
        "graph_secA.json",
        &GraphDocument::new(
            vec![
                Concept::new("plurality", "Plurality")
                    .with_evidence("Plurality is technology for collaboration across social difference."),
                Concept::new("x", "Broad Listening"),
            ],
            vec![Edge::new("x", "plurality", "part_of")
                .with_evidence("broad listening is part of plurality")],
        ),
    );
    write_section(
        &graphs,
        "graph_secB.json",
        &GraphDocument::new(
            vec![
                Concept::new("x", "Quadratic Voting")
                    .with_evidence("Quadratic voting lets people express intensity of preference!"),
                Concept::new("plurality_tech", "Plurality Tech"),
            ],
            vec![Edge::new("x", "plurality_tech", "example_of")],
        ),
    );
    fs::write(graphs.join(MERGED_GRAPH_FILE), "{}").unwrap();

    fs::write(
        sources.join("A.md"),
        "# Chapter A\nhttps://example.org\n\nPlurality is technology for collaboration across social difference.\nIn practice, broad listening is part of plurality.\n",
    )
    .unwrap();
    fs::write(
        sources.join("B.md"),
        "Quadratic voting lets people express intensity of preference.\n",
    )
    .unwrap();
    dir
}

#[test]
fn merge_from_directory_resolves_collisions_and_validates() {
    let dir = sample_dir();
    let graphs = dir.path().join("graphs");
    let files = discover_section_graphs(&graphs, None).unwrap();
    assert_eq!(files.len(), 2);

    let (sections, warnings) = load_section_graphs(&files);
    assert!(warnings.is_empty());
    let outcome = merge_section_graphs(sections);

    assert_eq!(outcome.collisions.len(), 1);
    assert_eq!(outcome.collisions["x"], vec!["A", "B"]);
    let ids: Vec<&str> = outcome.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["plurality", "x_secA", "x_secB", "plurality_tech"]);
    assert!(validate_merged_graph(&outcome.graph).is_empty());

    let meta = outcome.graph.metadata.as_ref().unwrap();
    assert_eq!(meta.total_sections, 2);
    assert_eq!(meta.merged_from[0].file, "graph_secA.json");
}

#[test]
fn merged_graph_evidence_is_checked_per_source_section() {
    let dir = sample_dir();
    let graphs = dir.path().join("graphs");
    let (sections, _) = load_section_graphs(&discover_section_graphs(&graphs, None).unwrap());
    let merged = merge_section_graphs(sections).graph;

    let mut catalog = SourceCatalog::new(dir.path().join("sources"));
    let issues = validate_graph_evidence(&merged, &graphs.join(MERGED_GRAPH_FILE), None, &mut catalog, 0.8);

    assert_eq!(issues.len(), 1);
    let issue = &issues[0];
    assert_eq!(issue.kind, EvidenceIssueKind::EvidenceMismatch);
    assert_eq!(issue.owner, Some(EvidenceOwner::NodeId("x_secB".into())));
    assert!(issue.source_file.ends_with("B.md"));
    // one substituted char out of 62
    assert_relative_eq!(issue.similarity.unwrap(), 122.0 / 124.0, epsilon = 1e-6);
}

#[test]
fn repaired_graph_round_trips_through_disk() {
    let dir = sample_dir();
    let path = dir.path().join("graphs/graph_secB.json");
    let mut graph = load_graph(&path).unwrap();
    let mut catalog = SourceCatalog::new(dir.path().join("sources"));

    let fixes = repair_graph_evidence(&mut graph, Some("B"), &mut catalog, &RepairOptions::default()).fixes;
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].method, FixMethod::Fuzzy);
    save_graph(&path, &graph).unwrap();

    let reloaded = load_graph(&path).unwrap();
    assert_eq!(
        reloaded.nodes[0].evidence[0].text,
        "Quadratic voting lets people express intensity of preference"
    );
    let issues = validate_graph_evidence(&reloaded, &path, Some("B"), &mut catalog, 0.8);
    assert!(issues.is_empty());
}

#[test]
fn link_candidates_over_merged_graph() {
    let dir = sample_dir();
    let graphs = dir.path().join("graphs");
    let (sections, _) = load_section_graphs(&discover_section_graphs(&graphs, None).unwrap());
    let merged = merge_section_graphs(sections).graph;

    let analysis = discover_cross_section_links(&merged, 0.7);
    let first = &analysis.candidates[0];
    assert_eq!((first.a.id.as_str(), first.b.id.as_str()), ("x_secA", "x_secB"));
    assert_relative_eq!(first.similarity, 1.0);
    // "plurality" in "plurality tech": 9/14 is below 0.7
    assert_eq!(analysis.candidates.len(), 1);
    assert_eq!(analysis.section_nodes["A"], vec!["plurality", "x_secA"]);
}
