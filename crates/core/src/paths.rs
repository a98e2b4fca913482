use std::fmt;
use std::path::{Path, PathBuf};

/// Directory under the repository root that tools run from and labels start at.
pub const SOURCE_ROOT: &str = "src";
/// Top-level directory every tracked path lives under.
pub const NAMESPACE: &str = "mongo";
pub const NAMESPACE_PREFIX: &str = "mongo/";
/// Per-directory subpackage holding the generated rule file.
pub const AUTO_SUBDIR: &str = ".auto_header";
pub const BUILD_FILE_NAME: &str = "BUILD.bazel";
pub const MANIFEST_FILE_NAME: &str = "last_run.json";

const THIRD_PARTY: &str = "third_party";

pub const HEADER_EXTS: &[&str] = &[".h", ".hh", ".hpp", ".hxx", ".inl"];
pub const SOURCE_EXTS: &[&str] = &[".c", ".cc", ".cpp", ".cxx"];

/// Normalizes a tool-reported path to forward-slash repo-relative form.
pub fn normalize(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/");
    while let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }
    path
}

/// Text containment check for the vendored segment in any position.
pub fn is_third_party(path: &str) -> bool {
    path.contains("/third_party/")
        || path.starts_with("third_party/")
        || path.ends_with("/third_party")
        || path == THIRD_PARTY
}

/// A forward-slash path relative to the source root, e.g. `mongo/db/foo.h`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoPath(String);

impl RepoPath {
    /// Normalizes `raw`, rejecting empty and third-party paths.
    pub fn parse(raw: &str) -> Option<Self> {
        let path = normalize(raw);
        if path.is_empty() || is_third_party(&path) {
            return None;
        }
        Some(RepoPath(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn in_namespace(&self) -> bool {
        self.0.starts_with(NAMESPACE_PREFIX)
    }

    pub fn dir(&self) -> &str {
        split_dir(&self.0).0
    }

    pub fn file_name(&self) -> &str {
        split_dir(&self.0).1
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<repo>/src/<dir>/.auto_header/BUILD.bazel`
pub fn rule_file_path(repo_root: &Path, dir: &str) -> PathBuf {
    auto_dir_path(repo_root, dir).join(BUILD_FILE_NAME)
}

pub fn auto_dir_path(repo_root: &Path, dir: &str) -> PathBuf {
    repo_root.join(SOURCE_ROOT).join(dir).join(AUTO_SUBDIR)
}

pub fn manifest_path(repo_root: &Path) -> PathBuf {
    auto_dir_path(repo_root, NAMESPACE).join(MANIFEST_FILE_NAME)
}

/// Splits `a/b/c.h` into (`a/b`, `c.h`); a bare name has an empty dir.
pub fn split_dir(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

pub fn header_ext(name: &str) -> Option<&'static str> {
    HEADER_EXTS.iter().copied().find(|ext| name.ends_with(ext))
}

fn source_ext(name: &str) -> Option<&'static str> {
    SOURCE_EXTS.iter().copied().find(|ext| name.ends_with(ext))
}

/// What kind of file owns a filegroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeftKind {
    Source(&'static str),
    Header(&'static str),
    Idl,
    IdlTemplate,
    HeaderTemplate,
    SourceTemplate,
    /// Bare `_gen` pseudo-file declared by the generated-left table.
    Generated,
}

impl LeftKind {
    pub fn classify(name: &str) -> Option<Self> {
        if name.ends_with(".idl.tpl") {
            return Some(LeftKind::IdlTemplate);
        }
        if name.ends_with(".idl") {
            return Some(LeftKind::Idl);
        }
        if name.ends_with(".tpl.h") {
            return Some(LeftKind::HeaderTemplate);
        }
        if name.ends_with(".tpl.cpp") {
            return Some(LeftKind::SourceTemplate);
        }
        if let Some(ext) = header_ext(name) {
            return Some(LeftKind::Header(ext));
        }
        if let Some(ext) = source_ext(name) {
            return Some(LeftKind::Source(ext));
        }
        if name.ends_with("_gen") && name.len() > "_gen".len() {
            return Some(LeftKind::Generated);
        }
        None
    }

    pub fn is_idl_like(self) -> bool {
        matches!(
            self,
            LeftKind::Idl | LeftKind::IdlTemplate | LeftKind::Generated
        )
    }

    /// Strips the kind's suffix, e.g. `foo.tpl.h` -> `foo`.
    pub fn stem(self, name: &str) -> &str {
        let suffix = match self {
            LeftKind::Source(ext) | LeftKind::Header(ext) => ext,
            LeftKind::Idl => ".idl",
            LeftKind::IdlTemplate => ".idl.tpl",
            LeftKind::HeaderTemplate => ".tpl.h",
            LeftKind::SourceTemplate => ".tpl.cpp",
            LeftKind::Generated => "_gen",
        };
        name.strip_suffix(suffix).unwrap_or(name)
    }
}
