use crate::labels::{Labeler, RightKind};
use crate::paths::{is_third_party, NAMESPACE_PREFIX};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Collects the labels reachable from `seeds` into one flat bundle.
///
/// A single visited set spans all seeds, so every path is expanded at most
/// once. Generated headers pull in their owning IDL so the IDL's own imports
/// are part of the closure.
pub fn flatten_seeds<S: AsRef<str>>(
    adjacency: &BTreeMap<String, &BTreeSet<String>>,
    seeds: &[S],
    labeler: &Labeler,
) -> BTreeSet<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut labels = BTreeSet::new();
    let mut stack: Vec<String> = seeds.iter().rev().map(|s| s.as_ref().to_string()).collect();

    while let Some(node) = stack.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }
        if !node.starts_with(NAMESPACE_PREFIX) || is_third_party(&node) {
            continue;
        }
        let kind = RightKind::classify(&node);
        if kind.is_suppressed() {
            continue;
        }

        if let Some(label) = labeler.flat_node_label(&node) {
            labels.insert(label);
        }

        if kind == RightKind::GeneratedHeader {
            if let Some(idl) = owning_idl(&node, adjacency) {
                stack.push(idl);
            }
        }

        if let Some(children) = adjacency.get(&node) {
            stack.extend(children.iter().rev().cloned());
        }
    }

    labels
}

/// `foo_gen.h` -> `foo.idl`, else `foo.idl.tpl`, if either is a known node.
fn owning_idl(gen_header: &str, adjacency: &BTreeMap<String, &BTreeSet<String>>) -> Option<String> {
    let stem = gen_header.strip_suffix("_gen.h")?;
    [".idl", ".idl.tpl"]
        .iter()
        .map(|ext| format!("{stem}{ext}"))
        .find(|candidate| adjacency.contains_key(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        entries
            .iter()
            .map(|(left, rights)| {
                (
                    left.to_string(),
                    rights.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    fn borrowed(owned: &BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, &BTreeSet<String>> {
        owned.iter().map(|(k, v)| (k.clone(), v)).collect()
    }

    #[test]
    fn follows_headers_and_generated_idl_imports() {
        let owned = graph(&[
            ("mongo/idl/idl_parser.h", &["mongo/base/status.h", "mongo/idl/basic_types_gen.h"]),
            ("mongo/idl/basic_types.idl", &["mongo/db/common.idl"]),
            ("mongo/db/common.idl", &[]),
            ("mongo/base/status.h", &["mongo/platform/windows_basic.h", "mongo/x/y.pb.h"]),
        ]);
        let adjacency = borrowed(&owned);
        let labels = flatten_seeds(&adjacency, &["mongo/idl/idl_parser.h"], &Labeler::new());

        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec![
                "//src/mongo/base:status.h",
                "//src/mongo/db:common_gen.h",
                "//src/mongo/idl:basic_types_gen.h",
                "//src/mongo/idl:idl_parser.h",
            ]
        );
    }

    #[test]
    fn terminates_on_cycles_and_skips_third_party() {
        let owned = graph(&[
            ("mongo/a.h", &["mongo/b.h"]),
            ("mongo/b.h", &["mongo/a.h", "mongo/third_party/z.h"]),
        ]);
        let adjacency = borrowed(&owned);
        let labels = flatten_seeds(&adjacency, &["mongo/a.h", "mongo/b.h"], &Labeler::new());
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| !l.contains("third_party")));
    }

    #[test]
    fn prefers_idl_over_template() {
        let owned = graph(&[
            ("mongo/q/opts.idl.tpl", &["mongo/q/tpl_only.h"]),
            ("mongo/q/opts.idl", &["mongo/q/idl_only.h"]),
        ]);
        let adjacency = borrowed(&owned);
        let labels = flatten_seeds(&adjacency, &["mongo/q/opts_gen.h"], &Labeler::new());
        assert!(labels.contains("//src/mongo/q:idl_only.h"));
        assert!(!labels.contains("//src/mongo/q:tpl_only.h"));
    }
}
