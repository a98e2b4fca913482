use crate::error::{AutoHeaderError, Result};
use crate::paths::NAMESPACE;
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Environment override for the ripgrep binary.
pub const RG_ENV: &str = "AUTO_HEADER_RG";

pub const INCLUDE_PATTERN: &str = r#"^\s*#\s*include\s*[<"](mongo/[^\s">]+)[">]"#;
pub const IMPORT_PATTERN: &str = r#"^\s*-\s*"?(mongo/[^\s">]+)"?"#;

const CXX_GLOBS: &[&str] = &[
    "*.c", "*.cc", "*.cpp", "*.cxx", "*.h", "*.hh", "*.hpp", "*.hxx", "*.inl",
];
const IDL_GLOBS: &[&str] = &["*.idl", "*.idl.tpl"];
const THIRD_PARTY_GLOB: &str = "!**/third_party/**";

static RESOLVED_RG: OnceCell<PathBuf> = OnceCell::new();

/// One of the three scans the pipeline needs from the search tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Every source, header and IDL file under the namespace root.
    Files,
    /// `file:mongo/...` for each `#include` of a namespace header.
    Includes,
    /// `file:mongo/...` for each IDL `imports:` list entry.
    Imports,
}

impl Query {
    pub fn describe(self) -> &'static str {
        match self {
            Query::Files => "file listing",
            Query::Includes => "include edges",
            Query::Imports => "import edges",
        }
    }

    /// ripgrep arguments, run from the source root.
    pub fn ripgrep_args(self) -> Vec<String> {
        let mut args: Vec<String> = vec!["--no-config".into(), "--color=never".into()];
        let globs: Vec<&str> = match self {
            Query::Files => {
                args.push("--files".into());
                CXX_GLOBS.iter().chain(IDL_GLOBS).copied().collect()
            }
            Query::Includes | Query::Imports => {
                args.extend(
                    [
                        "--no-heading",
                        "--with-filename",
                        "--no-line-number",
                        "--only-matching",
                        "--replace=$1",
                    ]
                    .map(String::from),
                );
                if self == Query::Includes {
                    CXX_GLOBS.to_vec()
                } else {
                    IDL_GLOBS.to_vec()
                }
            }
        };
        for glob in globs.into_iter().chain([THIRD_PARTY_GLOB]) {
            args.push("-g".into());
            args.push(glob.into());
        }
        match self {
            Query::Files => {}
            Query::Includes => args.extend(["-e", INCLUDE_PATTERN].map(String::from)),
            Query::Imports => args.extend(["-e", IMPORT_PATTERN].map(String::from)),
        }
        args.push(NAMESPACE.into());
        args
    }
}

/// Line-oriented scanner over a source tree.
///
/// Implementations feed each output line to `sink` as it is produced so the
/// caller can parse while the tool is still running.
#[allow(async_fn_in_trait)]
pub trait SearchTool {
    async fn stream(&self, query: Query, cwd: &Path, sink: &mut dyn FnMut(&str)) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Ripgrep {
    path: PathBuf,
}

impl Ripgrep {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SearchTool for Ripgrep {
    async fn stream(&self, query: Query, cwd: &Path, sink: &mut dyn FnMut(&str)) -> Result<()> {
        let mut cmd = Command::new(&self.path);
        cmd.args(query.ripgrep_args());
        cmd.current_dir(cwd);
        cmd.env("LC_ALL", "C").env("LANG", "C");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = %self.path.display(), query = query.describe(), "running search");
        let mut child = cmd
            .spawn()
            .map_err(|e| AutoHeaderError::io("failed to spawn", &self.path, e))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            AutoHeaderError::io("missing stdout pipe for", &self.path, broken_pipe())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            AutoHeaderError::io("missing stderr pipe for", &self.path, broken_pipe())
        })?;

        let mut err_buf = Vec::new();
        let read_stdout = async {
            let mut segments = BufReader::new(stdout).split(b'\n');
            while let Some(segment) = segments.next_segment().await? {
                sink(String::from_utf8_lossy(&segment).as_ref());
            }
            Ok::<_, std::io::Error>(())
        };
        let (out, err) = tokio::join!(read_stdout, stderr.read_to_end(&mut err_buf));
        out.map_err(|e| AutoHeaderError::io("failed to read output of", &self.path, e))?;
        err.map_err(|e| AutoHeaderError::io("failed to read stderr of", &self.path, e))?;

        let status = child
            .wait()
            .await
            .map_err(|e| AutoHeaderError::io("failed to wait for", &self.path, e))?;
        // 0: matches, 1: no matches.
        if !matches!(status.code(), Some(0) | Some(1)) {
            return Err(AutoHeaderError::ToolExit {
                tool: self.path.display().to_string(),
                query: query.describe(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&err_buf).trim().to_string(),
            });
        }
        Ok(())
    }
}

fn broken_pipe() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe not captured")
}

/// Resolves the ripgrep binary: explicit path, then `AUTO_HEADER_RG`, then `PATH`.
pub fn locate_ripgrep(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return existing_file(path.to_path_buf(), "--rg");
    }
    RESOLVED_RG.get_or_try_init(resolve_from_env).cloned()
}

fn resolve_from_env() -> Result<PathBuf> {
    if let Some(value) = env::var_os(RG_ENV).filter(|v| !v.is_empty()) {
        return existing_file(PathBuf::from(value), RG_ENV);
    }
    let name = if cfg!(windows) { "rg.exe" } else { "rg" };
    env::var_os("PATH")
        .iter()
        .flat_map(env::split_paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            AutoHeaderError::ToolBootstrap(format!("{name} not found on PATH; set {RG_ENV}"))
        })
}

fn existing_file(path: PathBuf, source: &str) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(AutoHeaderError::ToolBootstrap(format!(
            "{} (from {source}) is not a file",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_listing_args() {
        let args = Query::Files.ripgrep_args();
        assert!(args.contains(&"--files".to_string()));
        assert!(args.contains(&"*.idl.tpl".to_string()));
        assert!(args.contains(&THIRD_PARTY_GLOB.to_string()));
        assert!(!args.contains(&"-e".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(NAMESPACE));
    }

    #[test]
    fn edge_query_args_carry_pattern_and_globs() {
        let includes = Query::Includes.ripgrep_args();
        assert!(includes.contains(&INCLUDE_PATTERN.to_string()));
        assert!(includes.contains(&"*.hpp".to_string()));
        assert!(!includes.contains(&"*.idl".to_string()));
        assert!(includes.contains(&"--replace=$1".to_string()));

        let imports = Query::Imports.ripgrep_args();
        assert!(imports.contains(&IMPORT_PATTERN.to_string()));
        assert!(imports.contains(&"*.idl".to_string()));
        assert!(!imports.contains(&"*.cpp".to_string()));
    }

    #[test]
    fn explicit_path_must_exist() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let missing = tmp.path().join("rg");
        let err = locate_ripgrep(Some(&missing)).unwrap_err();
        assert_eq!(err.kind(), "ToolBootstrapError");

        std::fs::write(&missing, b"")?;
        assert_eq!(locate_ripgrep(Some(&missing)).unwrap(), missing);
        Ok(())
    }

    /// Writes an executable `/bin/sh` script standing in for ripgrep.
    #[cfg(unix)]
    fn fake_rg(dir: &Path, body: &str) -> anyhow::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-rg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_two_is_tool_exit_with_stderr() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let rg = Ripgrep::new(fake_rg(
            tmp.path(),
            "echo 'rg: mongo: IO error for operation on mongo' >&2\nexit 2\n",
        )?);

        let mut lines = Vec::new();
        let err = rg
            .stream(Query::Includes, tmp.path(), &mut |line| lines.push(line.to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ToolExitError");
        let message = err.to_string();
        assert!(message.contains("include edges"), "{message}");
        assert!(message.contains("rg: mongo: IO error"), "{message}");
        assert!(lines.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_one_streams_lines_into_edges() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let rg = Ripgrep::new(fake_rg(
            tmp.path(),
            "printf 'mongo/a/b.cpp:mongo/a/c.h\\nmongo/a/c.h:mongo/d/e.h\\nnot an edge\\n'\nexit 1\n",
        )?);

        let mut lines = Vec::new();
        rg.stream(Query::Includes, tmp.path(), &mut |line| lines.push(line.to_string()))
            .await?;
        assert_eq!(
            lines,
            vec!["mongo/a/b.cpp:mongo/a/c.h", "mongo/a/c.h:mongo/d/e.h", "not an edge"]
        );

        let edges = crate::edges::extract_edges(&rg, tmp.path()).await?;
        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.left.as_str(), e.right.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("mongo/a/b.cpp", "mongo/a/c.h"), ("mongo/a/c.h", "mongo/d/e.h")]
        );
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_given_directory_with_query_args() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let cwd = tmp.path().join("src");
        std::fs::create_dir_all(&cwd)?;
        std::fs::write(cwd.join("marker"), "mongo/from_cwd.h\n")?;
        let rg = Ripgrep::new(fake_rg(
            tmp.path(),
            "cat marker\nprintf '%s\\n' \"$@\"\n",
        )?);

        let mut lines = Vec::new();
        rg.stream(Query::Files, &cwd, &mut |line| lines.push(line.to_string()))
            .await?;
        assert_eq!(lines.first().map(String::as_str), Some("mongo/from_cwd.h"));
        assert_eq!(lines[1..], Query::Files.ripgrep_args()[..]);
        Ok(())
    }
}
