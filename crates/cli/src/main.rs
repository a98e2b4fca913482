use anyhow::{Context, Result};
use auto_header_core as core;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "auto-header",
    about = "Generate per-directory header filegroups from #include and IDL import edges",
    version,
    author,
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(short = 'v', long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the tree and rewrite every out-of-date rule file.
    Generate(GenerateArgs),
    /// Print the label each path maps to (empty for suppressed paths).
    Label(LabelArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Repository root containing the `src` directory.
    #[arg(
        short = 'r',
        long = "repo-root",
        value_name = "DIR",
        default_value = "."
    )]
    repo_root: PathBuf,
    /// ripgrep binary to use instead of AUTO_HEADER_RG or PATH lookup.
    #[arg(long = "rg", value_name = "PATH")]
    rg_path: Option<PathBuf>,
    /// fsync rule files before renaming them (also AUTO_HEADER_FSYNC).
    #[arg(long, action = ArgAction::SetTrue)]
    durable: bool,
}

#[derive(Args, Debug)]
struct LabelArgs {
    /// Repository paths relative to `src`, e.g. mongo/db/foo.h.
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    paths: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{err:#}");
            process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Generate(args) => handle_generate(args).await,
        Commands::Label(args) => handle_label(args).map(|()| true),
    }
}

async fn handle_generate(args: GenerateArgs) -> Result<bool> {
    let config = core::AutoHeaderConfig {
        repo_root: args.repo_root,
        rg_path: args.rg_path,
        durable: args.durable || core::durable_from_env(),
    };
    debug!(
        repo_root = %config.repo_root.display(),
        durable = config.durable,
        version = core::version(),
        "starting generate"
    );

    let report = core::generate_auto_headers(&config).await;

    let mut writer = BufWriter::new(io::stdout());
    serde_json::to_writer(&mut writer, &report).context("failed to write run report")?;
    writeln!(writer).context("failed to write run report")?;
    writer.flush().context("failed to flush output")?;
    Ok(report.ok)
}

fn handle_label(args: LabelArgs) -> Result<()> {
    let mut labeler = core::Labeler::new();
    let mut writer = BufWriter::new(io::stdout());
    for raw in &args.paths {
        let path = core::paths::normalize(raw);
        writeln!(writer, "{}", labeler.label_for_right(&path))
            .context("failed to write label")?;
    }
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
