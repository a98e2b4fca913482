use crate::error::Result;
use crate::paths::{LeftKind, RepoPath, NAMESPACE};
use crate::search::{Query, SearchTool};
use crate::tables::GENERATED_LEFT;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Key of the synthetic shared-bundle entry in the namespace root group.
pub const FLAT_GROUP_KEY: &str = "idl_headers_flat";

/// `left` includes or imports `right`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub left: RepoPath,
    pub right: RepoPath,
}

/// Parses one `file:path` match line, splitting on the first colon only.
///
/// Returns `None` for malformed lines, right sides outside the namespace and
/// anything touching third-party code.
pub fn parse_match_line(line: &str) -> Option<Edge> {
    let (left, right) = line.split_once(':')?;
    let left = RepoPath::parse(left)?;
    let right = RepoPath::parse(right)?;
    if !right.in_namespace() {
        return None;
    }
    Some(Edge { left, right })
}

/// Sorted, deduplicated listing of every tracked file.
pub async fn list_files<T: SearchTool>(tool: &T, cwd: &Path) -> Result<Vec<RepoPath>> {
    let mut files = BTreeSet::new();
    tool.stream(Query::Files, cwd, &mut |line| {
        if let Some(path) = RepoPath::parse(line).filter(RepoPath::in_namespace) {
            files.insert(path);
        }
    })
    .await?;
    debug!(count = files.len(), "enumerated files");
    Ok(files.into_iter().collect())
}

/// Runs the include and import scans and merges their edges.
pub async fn extract_edges<T: SearchTool>(tool: &T, cwd: &Path) -> Result<BTreeSet<Edge>> {
    let mut edges = BTreeSet::new();
    for query in [Query::Includes, Query::Imports] {
        let mut skipped = 0usize;
        tool.stream(query, cwd, &mut |line| match parse_match_line(line) {
            Some(edge) => {
                edges.insert(edge);
            }
            None => skipped += 1,
        })
        .await?;
        debug!(query = query.describe(), skipped, "scanned edges");
    }
    Ok(edges)
}

/// `dir -> file -> set(right)`, ordered at every level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex {
    groups: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `edges` by the including file's directory.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut index = Self::new();
        for edge in edges {
            if let Some(rights) = index.entry(&edge.left) {
                rights.insert(edge.right.as_str().to_string());
            }
        }
        index
    }

    /// Entry for a left file; `None` when the file cannot own a filegroup.
    fn entry(&mut self, left: &RepoPath) -> Option<&mut BTreeSet<String>> {
        if !left.in_namespace() {
            return None;
        }
        LeftKind::classify(left.file_name())?;
        Some(
            self.groups
                .entry(left.dir().to_string())
                .or_default()
                .entry(left.file_name().to_string())
                .or_default(),
        )
    }

    /// Ensures every enumerated IDL and C/C++ file has an (possibly empty) entry.
    pub fn augment_files(&mut self, files: &[RepoPath]) {
        for file in files {
            let _ = self.entry(file);
        }
    }

    /// Merges the fixed synthetic edges for generated sources.
    pub fn augment_generated(&mut self) {
        for (left, rights) in GENERATED_LEFT {
            let Some(left) = RepoPath::parse(left) else {
                continue;
            };
            let Some(entry) = self.entry(&left) else {
                continue;
            };
            entry.extend(
                rights
                    .iter()
                    .filter_map(|r| RepoPath::parse(r))
                    .filter(RepoPath::in_namespace)
                    .map(RepoPath::into_string),
            );
        }
    }

    /// Stores the flattened bundle under the namespace root directory.
    pub fn insert_flat(&mut self, labels: BTreeSet<String>) {
        self.groups
            .entry(NAMESPACE.to_string())
            .or_default()
            .insert(FLAT_GROUP_KEY.to_string(), labels);
    }

    /// `left path -> rights` over every real left file.
    pub fn adjacency(&self) -> BTreeMap<String, &BTreeSet<String>> {
        self.groups
            .iter()
            .flat_map(|(dir, files)| {
                files
                    .iter()
                    .filter(|(file, _)| file.as_str() != FLAT_GROUP_KEY)
                    .map(move |(file, rights)| (format!("{dir}/{file}"), rights))
            })
            .collect()
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, BTreeSet<String>>)> {
        self.groups.iter().map(|(dir, files)| (dir.as_str(), files))
    }

    pub fn get(&self, dir: &str) -> Option<&BTreeMap<String, BTreeSet<String>>> {
        self.groups.get(dir)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> RepoPath {
        RepoPath::parse(p).unwrap()
    }

    #[test]
    fn parses_first_colon_only() {
        let edge = parse_match_line("mongo/a/b.cpp:mongo/a/c.h").unwrap();
        assert_eq!(edge.left.as_str(), "mongo/a/b.cpp");
        assert_eq!(edge.right.as_str(), "mongo/a/c.h");

        let edge = parse_match_line(".\\mongo\\a\\b.cpp:mongo/a/weird:name.h").unwrap();
        assert_eq!(edge.left.as_str(), "mongo/a/b.cpp");
        assert_eq!(edge.right.as_str(), "mongo/a/weird:name.h");
    }

    #[test]
    fn drops_malformed_foreign_and_third_party() {
        assert!(parse_match_line("no separator here").is_none());
        assert!(parse_match_line("mongo/a.cpp:").is_none());
        assert!(parse_match_line("mongo/a.cpp:boost/optional.hpp").is_none());
        assert!(parse_match_line("mongo/a.cpp:mongo/third_party/x.h").is_none());
        assert!(parse_match_line("mongo/third_party/y.cpp:mongo/a.h").is_none());
    }

    #[test]
    fn groups_by_left_directory() {
        let edges = BTreeSet::from([
            Edge {
                left: path("mongo/c/h1.h"),
                right: path("mongo/c/h2.h"),
            },
            Edge {
                left: path("mongo/c/h1.h"),
                right: path("mongo/d/x.h"),
            },
            Edge {
                left: path("mongo/d/f.cpp"),
                right: path("mongo/c/h1.h"),
            },
            Edge {
                left: path("mongo/d/notes.txt"),
                right: path("mongo/c/h1.h"),
            },
        ]);
        let index = GroupIndex::from_edges(&edges);
        assert_eq!(index.dirs().collect::<Vec<_>>(), vec!["mongo/c", "mongo/d"]);
        let c = index.get("mongo/c").unwrap();
        assert_eq!(
            c["h1.h"].iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["mongo/c/h2.h", "mongo/d/x.h"]
        );
        assert!(!index.get("mongo/d").unwrap().contains_key("notes.txt"));
    }

    #[test]
    fn augmentation_adds_empty_entries_and_generated_edges() {
        let mut index = GroupIndex::new();
        index.augment_files(&[path("mongo/a/b/x.idl"), path("mongo/a/b/y.cpp")]);
        index.augment_generated();

        let ab = index.get("mongo/a/b").unwrap();
        assert!(ab["x.idl"].is_empty());
        assert!(ab["y.cpp"].is_empty());

        let util = index.get("mongo/util").unwrap();
        assert!(util["version_constants_gen"].contains("mongo/util/version.h"));
    }

    #[test]
    fn adjacency_skips_flat_bundle() {
        let mut index = GroupIndex::new();
        index.augment_files(&[path("mongo/a.h")]);
        index.insert_flat(BTreeSet::from(["//src/mongo:a.h".to_string()]));
        let adjacency = index.adjacency();
        assert_eq!(adjacency.keys().collect::<Vec<_>>(), vec!["mongo/a.h"]);
        assert!(index.get("mongo").unwrap().contains_key(FLAT_GROUP_KEY));
    }
}
