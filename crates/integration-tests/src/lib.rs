use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;
use std::process::Command as StdCommand;

static CLI_PATH: OnceCell<PathBuf> = OnceCell::new();

/// Root of the workspace (two levels up from this crate).
pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root is two directories above the integration-tests crate")
        .to_path_buf()
}

/// Location of a ripgrep binary, from `AUTO_HEADER_RG` or `PATH`.
pub fn rg_path() -> Option<PathBuf> {
    let name = if cfg!(windows) { "rg.exe" } else { "rg" };
    let found = env::var_os("AUTO_HEADER_RG")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .or_else(|| {
            env::var_os("PATH")
                .iter()
                .flat_map(env::split_paths)
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
        });
    if found.is_none() {
        eprintln!("skipping auto-header end-to-end tests; ripgrep not found");
    }
    found
}

/// Build (once) and return the path to the auto-header CLI binary.
pub fn cli_path() -> Result<PathBuf> {
    CLI_PATH.get_or_try_init(build_cli).cloned()
}

fn build_cli() -> Result<PathBuf> {
    let root = workspace_root();
    let status = StdCommand::new("cargo")
        .args(["build", "-p", "auto-header-cli", "--bin", "auto-header"])
        .current_dir(&root)
        .status()
        .context("failed to start cargo build for auto-header")?;

    if !status.success() {
        return Err(anyhow!("cargo build for auto-header failed with {status:?}"));
    }

    let mut path = root.join("target/debug/auto-header");
    if cfg!(windows) {
        path.set_extension("exe");
    }
    Ok(path)
}
