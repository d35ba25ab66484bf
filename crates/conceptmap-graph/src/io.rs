//! Graph document files.

use crate::error::{GraphError, Result};
use crate::merge::SectionGraph;
use crate::model::GraphDocument;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default file name of a merged graph inside a graph directory.
pub const MERGED_GRAPH_FILE: &str = "graph_merged.json";

pub fn load_graph(path: &Path) -> Result<GraphDocument> {
    let text = fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| GraphError::json(path, e))
}

pub fn save_graph(path: &Path, graph: &GraphDocument) -> Result<()> {
    write_json(path, graph)
}

/// Pretty-print `value` to `path` through a temporary file and a rename.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| GraphError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| GraphError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| GraphError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| GraphError::io(path, e))?;
    Ok(())
}

/// Section id encoded in a graph file name.
///
/// `graph_sec0-2.json` -> `0-2`, `graph_s01_02.json` -> `s01_02`.
pub fn section_id_from_filename(name: &str) -> Option<String> {
    let stem = name.strip_prefix("graph_")?.strip_suffix(".json")?;
    let id = stem.strip_prefix("sec").unwrap_or(stem);
    (!id.is_empty()).then(|| id.to_string())
}

/// Section graph files in `dir`, sorted by name, excluding `exclude`.
pub fn discover_section_graphs(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let excluded_name = exclude.and_then(|p| p.file_name()).map(|n| n.to_os_string());
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| GraphError::io(dir, e))? {
        let entry = entry.map_err(|e| GraphError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == MERGED_GRAPH_FILE
            || excluded_name.as_deref() == Some(std::ffi::OsStr::new(name))
        {
            continue;
        }
        if section_id_from_filename(name).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load section graphs; unreadable files are skipped and reported.
pub fn load_section_graphs(paths: &[PathBuf]) -> (Vec<SectionGraph>, Vec<String>) {
    let mut sections = Vec::with_capacity(paths.len());
    let mut warnings = Vec::new();
    for path in paths {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(section_id) = section_id_from_filename(&file) else {
            warnings.push(format!("{}: not a section graph file name", path.display()));
            continue;
        };
        match load_graph(path) {
            Ok(graph) => sections.push(SectionGraph::new(section_id, file, graph)),
            Err(e) => {
                warn!("skipping section graph: {e}");
                warnings.push(e.to_string());
            }
        }
    }
    (sections, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Concept;

    #[test]
    fn section_ids_from_file_names() {
        assert_eq!(section_id_from_filename("graph_sec0-2.json").as_deref(), Some("0-2"));
        assert_eq!(section_id_from_filename("graph_s01_02.json").as_deref(), Some("s01_02"));
        assert_eq!(section_id_from_filename("graph_extra-1.json").as_deref(), Some("extra-1"));
        assert_eq!(section_id_from_filename("graph_sec.json"), None);
        assert_eq!(section_id_from_filename("nodes.csv"), None);
    }

    #[test]
    fn discovery_is_sorted_and_skips_the_merge_output() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["graph_secB.json", "graph_secA.json", MERGED_GRAPH_FILE, "notes.json"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let files = discover_section_graphs(dir.path(), None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["graph_secA.json", "graph_secB.json"]);
    }

    #[test]
    fn save_then_load_keeps_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/graph_secA.json");
        let mut graph = GraphDocument::new(vec![Concept::new("a", "A")], vec![]);
        graph.nodes[0]
            .extra
            .insert("color".into(), serde_json::Value::String("red".into()));
        save_graph(&path, &graph).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(load_graph(&path).unwrap(), graph);
    }

    #[test]
    fn broken_section_files_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("graph_secA.json");
        let bad = dir.path().join("graph_secB.json");
        fs::write(&good, r#"{"nodes":[{"id":"x","label":"X"}]}"#).unwrap();
        fs::write(&bad, "{ not json").unwrap();
        let (sections, warnings) = load_section_graphs(&[good, bad]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_id, "A");
        assert_eq!(warnings.len(), 1);
    }
}
