use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoHeaderError {
    #[error("could not locate ripgrep: {0}")]
    ToolBootstrap(String),

    #[error("{tool} {query} exited with {status}: {stderr}")]
    ToolExit {
        tool: String,
        query: &'static str,
        status: String,
        stderr: String,
    },

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AutoHeaderError {
    pub fn io(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        AutoHeaderError::Io {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Stable kind name used as the prefix of the report's error string.
    pub fn kind(&self) -> &'static str {
        match self {
            AutoHeaderError::ToolBootstrap(_) => "ToolBootstrapError",
            AutoHeaderError::ToolExit { .. } => "ToolExitError",
            AutoHeaderError::Io { .. } => "IOError",
        }
    }
}

pub type Result<T, E = AutoHeaderError> = std::result::Result<T, E>;
