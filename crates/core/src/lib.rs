pub mod edges;
pub mod emit;
pub mod error;
pub mod flatten;
pub mod labels;
pub mod manifest;
pub mod paths;
pub mod run;
pub mod search;
pub mod tables;
pub mod visibility;

pub use error::{AutoHeaderError, Result};
pub use labels::Labeler;
pub use manifest::Manifest;
pub use run::{
    durable_from_env, generate_auto_headers, generate_with_tool, AutoHeaderConfig, RunReport,
    FSYNC_ENV,
};
pub use search::{locate_ripgrep, Query, Ripgrep, SearchTool};

/// Returns the current crate version; helpful for tracing and diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
