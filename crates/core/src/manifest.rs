use crate::emit::write_atomic;
use crate::error::{AutoHeaderError, Result};
use crate::paths::{auto_dir_path, manifest_path, rule_file_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;

/// Directories that had a rule file after the last successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub dirs: Vec<String>,
}

impl Manifest {
    pub fn from_dirs<I, S>(dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = dirs.into_iter().map(Into::into).collect();
        Self {
            dirs: set.into_iter().collect(),
        }
    }

    pub fn dir_set(&self) -> BTreeSet<&str> {
        self.dirs.iter().map(String::as_str).collect()
    }
}

/// Reads the previous manifest; a missing one counts as empty.
///
/// Any other failure is an error, since overwriting an unreadable manifest
/// would forget directories that still hold rule files.
pub fn read_manifest(repo_root: &Path) -> Result<Manifest> {
    let path = manifest_path(repo_root);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no previous manifest");
            return Ok(Manifest::default());
        }
        Err(e) => return Err(AutoHeaderError::io("failed to open manifest", &path, e)),
    };
    let manifest: Manifest = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AutoHeaderError::io("failed to parse manifest", &path, io::Error::from(e)))?;
    Ok(Manifest::from_dirs(manifest.dirs))
}

pub fn write_manifest(repo_root: &Path, manifest: &Manifest, durable: bool) -> Result<()> {
    let path = manifest_path(repo_root);
    let mut bytes = serde_json::to_vec_pretty(manifest).map_err(|e| {
        AutoHeaderError::io("failed to encode manifest", &path, io::Error::other(e))
    })?;
    bytes.push(b'\n');
    write_atomic(&path, &bytes, durable)
}

/// Deletes rule files for directories in `previous` but not in `current`.
///
/// Missing files and non-empty auto-subdirectories are not errors. Returns
/// the number of rule files removed.
pub fn cleanup_stale(repo_root: &Path, previous: &Manifest, current: &Manifest) -> Result<usize> {
    let keep = current.dir_set();
    let mut removed = 0;
    for dir in previous.dirs.iter().filter(|d| !keep.contains(d.as_str())) {
        let path = rule_file_path(repo_root, dir);
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                debug!(dir = %dir, "removed stale rule file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AutoHeaderError::io("failed to remove", &path, e)),
        }
        let _ = fs::remove_dir(auto_dir_path(repo_root, dir));
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn from_dirs_sorts_and_dedupes() {
        let manifest = Manifest::from_dirs(["mongo/b", "mongo/a", "mongo/b"]);
        assert_eq!(manifest.dirs, vec!["mongo/a", "mongo/b"]);
    }

    #[test]
    fn round_trips_through_disk() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        assert_eq!(read_manifest(tmp.path())?, Manifest::default());

        let manifest = Manifest::from_dirs(["mongo", "mongo/db"]);
        write_manifest(tmp.path(), &manifest, false)?;
        assert_eq!(read_manifest(tmp.path())?, manifest);

        let raw = fs::read_to_string(manifest_path(tmp.path()))?;
        assert!(raw.contains("\"dirs\""));
        Ok(())
    }

    #[test]
    fn malformed_manifest_is_an_io_error() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = manifest_path(tmp.path());
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, "{\"dirs\": [\"mongo/x\",")?;
        let err = read_manifest(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), "IOError");
        assert!(err.to_string().contains("failed to parse manifest"), "{err}");
        Ok(())
    }

    #[test]
    fn cleanup_removes_only_stale_dirs() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path();
        for dir in ["mongo/x", "mongo/y"] {
            write_atomic(&rule_file_path(root, dir), b"# DIGEST:0\n", false)?;
        }

        let previous = Manifest::from_dirs(["mongo/x", "mongo/y", "mongo/gone"]);
        let current = Manifest::from_dirs(["mongo/y"]);
        let removed = cleanup_stale(root, &previous, &current)?;

        assert_eq!(removed, 1);
        assert!(!rule_file_path(root, "mongo/x").exists());
        assert!(!auto_dir_path(root, "mongo/x").exists());
        assert!(rule_file_path(root, "mongo/y").exists());
        Ok(())
    }
}
