use crate::edges::{extract_edges, list_files, GroupIndex};
use crate::emit::{Emitter, WriteOutcome};
use crate::error::{AutoHeaderError, Result};
use crate::flatten::flatten_seeds;
use crate::labels::Labeler;
use crate::manifest::{cleanup_stale, read_manifest, write_manifest, Manifest};
use crate::paths::{RepoPath, SOURCE_ROOT};
use crate::search::{locate_ripgrep, Ripgrep, SearchTool};
use crate::tables::IDL_RUNTIME_SEEDS;
use crate::visibility::VisibilityPolicy;
use serde::Serialize;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Set to a truthy value to fsync every rule file before it is renamed.
pub const FSYNC_ENV: &str = "AUTO_HEADER_FSYNC";

#[derive(Debug, Clone)]
pub struct AutoHeaderConfig {
    /// Repository root; rule files go under `<repo_root>/src`.
    pub repo_root: PathBuf,
    /// Explicit ripgrep binary, bypassing environment and `PATH` lookup.
    pub rg_path: Option<PathBuf>,
    pub durable: bool,
}

impl Default for AutoHeaderConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            rg_path: None,
            durable: false,
        }
    }
}

impl AutoHeaderConfig {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            durable: durable_from_env(),
            ..Self::default()
        }
    }
}

pub fn durable_from_env() -> bool {
    env::var(FSYNC_ENV).map(|v| is_truthy(&v)).unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Outcome of one invocation; failures are reported, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    pub wrote: usize,
    pub skipped: usize,
    pub removed: usize,
    pub dirs: usize,
    pub t_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub wrote: usize,
    pub skipped: usize,
    pub removed: usize,
    pub dirs: usize,
}

/// Generates auto-header rule files for the repository at `config.repo_root`.
pub async fn generate_auto_headers(config: &AutoHeaderConfig) -> RunReport {
    let started = Instant::now();
    let rg = match locate_ripgrep(config.rg_path.as_deref()) {
        Ok(rg) => rg,
        Err(err) => return report(Err(err), started),
    };
    debug!(rg = %rg.display(), "using ripgrep");
    let tool = Ripgrep::new(rg);
    let mut run = Run::new(&tool, &config.repo_root, config.durable);
    let outcome = run.execute().await;
    report(outcome, started)
}

/// Same as [`generate_auto_headers`] with a caller-provided search tool.
pub async fn generate_with_tool<T: SearchTool>(
    tool: &T,
    repo_root: &Path,
    durable: bool,
) -> RunReport {
    let started = Instant::now();
    let mut run = Run::new(tool, repo_root, durable);
    let outcome = run.execute().await;
    report(outcome, started)
}

fn report(outcome: Result<RunStats>, started: Instant) -> RunReport {
    let t_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match outcome {
        Ok(stats) => {
            info!(
                wrote = stats.wrote,
                skipped = stats.skipped,
                removed = stats.removed,
                dirs = stats.dirs,
                t_ms,
                "auto-header run finished"
            );
            RunReport {
                ok: true,
                err: None,
                wrote: stats.wrote,
                skipped: stats.skipped,
                removed: stats.removed,
                dirs: stats.dirs,
                t_ms,
            }
        }
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "auto-header run failed");
            RunReport {
                ok: false,
                err: Some(format!("{}: {err}", err.kind())),
                t_ms,
                ..RunReport::default()
            }
        }
    }
}

/// State for one invocation. Every cache lives here and dies with the run.
pub struct Run<'a, T: SearchTool> {
    tool: &'a T,
    repo_root: &'a Path,
    source_root: PathBuf,
    durable: bool,
    files: OnceCell<Vec<RepoPath>>,
    labeler: Labeler,
    visibility: VisibilityPolicy,
}

impl<'a, T: SearchTool> Run<'a, T> {
    pub fn new(tool: &'a T, repo_root: &'a Path, durable: bool) -> Self {
        Self {
            tool,
            repo_root,
            source_root: repo_root.join(SOURCE_ROOT),
            durable,
            files: OnceCell::new(),
            labeler: Labeler::new(),
            visibility: VisibilityPolicy::new(),
        }
    }

    /// Every tracked file, enumerated once per run.
    pub async fn files(&self) -> Result<&[RepoPath]> {
        self.files
            .get_or_try_init(|| list_files(self.tool, &self.source_root))
            .await
            .map(Vec::as_slice)
    }

    /// Enumeration, extraction, grouping, augmentation and flattening.
    pub async fn build_index(&mut self) -> Result<GroupIndex> {
        if !self.source_root.is_dir() {
            return Err(AutoHeaderError::io(
                "missing source root",
                &self.source_root,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        let files = self.files().await?.to_vec();
        let edges = extract_edges(self.tool, &self.source_root).await?;
        debug!(files = files.len(), edges = edges.len(), "scanned tree");

        let mut index = GroupIndex::from_edges(&edges);
        index.augment_files(&files);
        index.augment_generated();

        let flat = flatten_seeds(&index.adjacency(), IDL_RUNTIME_SEEDS, &self.labeler);
        debug!(labels = flat.len(), "flattened idl runtime headers");
        index.insert_flat(flat);
        Ok(index)
    }

    pub async fn execute(&mut self) -> Result<RunStats> {
        let index = self.build_index().await?;
        let previous = read_manifest(self.repo_root)?;
        let emitter = Emitter::new(self.repo_root, self.durable);

        let mut stats = RunStats {
            dirs: index.len(),
            ..RunStats::default()
        };
        for (dir, files) in index.iter() {
            let visibility = self.visibility.for_dir(dir).to_vec();
            match emitter.emit_dir(dir, &visibility, files, &mut self.labeler)? {
                WriteOutcome::Wrote => stats.wrote += 1,
                WriteOutcome::Unchanged => stats.skipped += 1,
            }
        }

        let current = Manifest::from_dirs(index.dirs());
        stats.removed = cleanup_stale(self.repo_root, &previous, &current)?;
        write_manifest(self.repo_root, &current, self.durable)?;
        Ok(stats)
    }
}
