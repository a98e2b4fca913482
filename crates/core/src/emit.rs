use crate::edges::FLAT_GROUP_KEY;
use crate::error::{AutoHeaderError, Result};
use crate::labels::{
    auto_label, auto_package, flat_label, Labeler, FLAT_TARGET, PLACEHOLDER_LABEL,
};
use crate::paths::{rule_file_path, LeftKind, SOURCE_ROOT};
use hex::encode as hex_encode;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Mixed into every digest; bump when the rendered layout changes.
pub const EMISSION_SALT: &str = "auto-header-emit-v1";
pub const DIGEST_MARKER: &str = "# DIGEST:";
const DIGEST_SCAN_LINES: usize = 5;
const DIGEST_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Wrote,
    Unchanged,
}

/// First 16 hex chars of SHA-256 over the directory's canonical inputs.
pub fn compute_digest(
    dir: &str,
    visibility: &[String],
    files: &BTreeMap<String, BTreeSet<String>>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{EMISSION_SALT}|{}|{dir}\n", visibility.join(",")));
    for (left, rights) in files {
        let rights: Vec<&str> = rights.iter().map(String::as_str).collect();
        hasher.update(format!("{left}:{}\n", rights.join(",")));
    }
    let mut digest = hex_encode(hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// One `filegroup` ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filegroup {
    pub name: String,
    pub srcs: Vec<String>,
}

/// Builds the filegroup owned by `name` in `dir`, or `None` for files that
/// cannot own one.
pub fn filegroup_for(
    dir: &str,
    name: &str,
    rights: &BTreeSet<String>,
    labeler: &mut Labeler,
) -> Option<Filegroup> {
    if name == FLAT_GROUP_KEY {
        return Some(Filegroup {
            name: FLAT_TARGET.to_string(),
            srcs: with_placeholder(rights.iter().cloned().collect()),
        });
    }

    let kind = LeftKind::classify(name)?;
    let target = labeler.target_name(name, kind);
    let own = auto_label(dir, &target);

    let mapped: BTreeSet<String> = rights
        .iter()
        .map(|right| labeler.label_for_right(right))
        .filter(|label| !label.is_empty())
        .collect();

    let mut seen = HashSet::new();
    let srcs = labeler
        .owning_labels(dir, name, kind)
        .into_iter()
        .chain(kind.is_idl_like().then(flat_label))
        .chain(mapped)
        .filter(|label| *label != own && seen.insert(label.clone()))
        .collect();

    Some(Filegroup {
        name: target,
        srcs: with_placeholder(srcs),
    })
}

fn with_placeholder(srcs: Vec<String>) -> Vec<String> {
    if srcs.is_empty() {
        vec![PLACEHOLDER_LABEL.to_string()]
    } else {
        srcs
    }
}

/// Renders the complete rule file for one directory.
pub fn render(
    dir: &str,
    visibility: &[String],
    files: &BTreeMap<String, BTreeSet<String>>,
    digest: &str,
    labeler: &mut Labeler,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{DIGEST_MARKER}{digest}");
    let _ = writeln!(out, "# AUTO-GENERATED by auto-header. DO NOT EDIT.");
    let _ = writeln!(out, "# package: {}", auto_package(dir));
    let _ = writeln!(
        out,
        "# generated from #include and IDL import edges under {SOURCE_ROOT}/{dir}"
    );
    out.push('\n');
    let _ = writeln!(
        out,
        "package(default_visibility = [{}])",
        quoted_list(visibility)
    );

    let mut declared = HashSet::new();
    for (name, rights) in files {
        let Some(group) = filegroup_for(dir, name, rights, labeler) else {
            continue;
        };
        // A package may declare each target once; the first file in order wins.
        if !declared.insert(group.name.clone()) {
            warn!(dir, file = %name, target = %group.name, "skipping duplicate filegroup name");
            continue;
        }
        out.push('\n');
        let _ = writeln!(out, "filegroup(");
        let _ = writeln!(out, "    name = \"{}\",", group.name);
        let _ = writeln!(out, "    srcs = [");
        for src in &group.srcs {
            let _ = writeln!(out, "        \"{src}\",");
        }
        let _ = writeln!(out, "    ],");
        let _ = writeln!(out, ")");
    }
    out
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads `name -> srcs` back out of a rendered rule file.
pub fn parse_filegroups(content: &str) -> BTreeMap<String, Vec<String>> {
    let mut groups = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;
    for line in content.lines() {
        let line = line.trim();
        if let Some(name) = line
            .strip_prefix("name = \"")
            .and_then(|rest| rest.strip_suffix("\","))
        {
            current = Some((name.to_string(), Vec::new()));
        } else if line == ")" {
            if let Some((name, srcs)) = current.take() {
                groups.insert(name, srcs);
            }
        } else if let Some((_, srcs)) = current.as_mut() {
            if let Some(label) = line
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix("\","))
            {
                srcs.push(label.to_string());
            }
        }
    }
    groups
}

/// Digest recorded in the first few lines of an existing rule file.
pub fn existing_digest(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    BufReader::new(file)
        .lines()
        .take(DIGEST_SCAN_LINES)
        .map_while(|line| line.ok())
        .find_map(|line| line.strip_prefix(DIGEST_MARKER).map(|d| d.trim().to_string()))
}

/// Writes rule files under `<repo>/src`, skipping unchanged content.
#[derive(Debug, Clone)]
pub struct Emitter<'a> {
    repo_root: &'a Path,
    durable: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(repo_root: &'a Path, durable: bool) -> Self {
        Self { repo_root, durable }
    }

    pub fn emit_dir(
        &self,
        dir: &str,
        visibility: &[String],
        files: &BTreeMap<String, BTreeSet<String>>,
        labeler: &mut Labeler,
    ) -> Result<WriteOutcome> {
        let path = rule_file_path(self.repo_root, dir);
        let digest = compute_digest(dir, visibility, files);
        if existing_digest(&path).as_deref() == Some(digest.as_str()) {
            debug!(dir, %digest, "digest unchanged");
            return Ok(WriteOutcome::Unchanged);
        }

        let content = render(dir, visibility, files, &digest, labeler);
        if same_bytes(&path, content.as_bytes())? {
            debug!(dir, %digest, "content unchanged");
            return Ok(WriteOutcome::Unchanged);
        }

        write_atomic(&path, content.as_bytes(), self.durable)?;
        debug!(dir, %digest, path = %path.display(), "wrote rule file");
        Ok(WriteOutcome::Wrote)
    }
}

fn same_bytes(path: &Path, bytes: &[u8]) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == bytes.len() as u64 => {
            let existing =
                fs::read(path).map_err(|e| AutoHeaderError::io("failed to read", path, e))?;
            Ok(existing == bytes)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AutoHeaderError::io("failed to stat", path, e)),
    }
}

/// Replaces `path` through a temporary sibling so readers never observe a
/// partial file.
pub fn write_atomic(path: &Path, bytes: &[u8], durable: bool) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| AutoHeaderError::io("failed to create directory", parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| AutoHeaderError::io("failed to create temporary file in", parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| AutoHeaderError::io("failed to write", tmp.path(), e))?;
    if durable {
        tmp.as_file()
            .sync_all()
            .map_err(|e| AutoHeaderError::io("failed to sync", tmp.path(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| AutoHeaderError::io("failed to replace", path, e.error))?;
    Ok(())
}
