//! snippet-runner-mcp
//!
//! Runs short code snippets under a hard deadline, either as an MCP server
//! over stdio or once from the command line. Configuration is read from the
//! `SNIPPET_RUNNER_CONFIG` env var (JSON).

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snippet_runner_mcp::{
    backend::{ExecutionBackend, ExecutionRequest, ProcessBackend},
    config::Config,
    language::Language,
    mcp,
};

#[derive(Parser, Debug)]
#[command(name = "snippet-runner-mcp")]
#[command(about = "Run code snippets with a hard time limit")]
struct Args {
    /// Run in stdio mode (for MCP clients)
    #[arg(long, conflicts_with_all = ["language", "file"])]
    stdio: bool,

    /// Language of the snippet to run once (javascript, typescript, python, go)
    #[arg(long, requires = "file")]
    language: Option<String>,

    /// Snippet file to run once, or `-` for stdin
    #[arg(long, requires = "language")]
    file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries MCP frames or the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        scratch_root = %config.scratch_root.display(),
        timeout_ms = config.timeout_ms,
        "Loaded configuration"
    );

    let backend = ProcessBackend::from_config(&config);

    if args.stdio {
        mcp::serve_stdio(config.registry(), backend).await?;
    } else if let (Some(language), Some(file)) = (args.language, args.file) {
        let code = read_snippet(&file)?;
        let language: Language = language.parse()?;
        anyhow::ensure!(!code.is_empty(), "Snippet is empty");

        let result = backend.execute(&ExecutionRequest::new(language, code)).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        anyhow::bail!("Pass --stdio, or --language and --file to run one snippet");
    }

    Ok(())
}

fn read_snippet(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read snippet from stdin")?;
        Ok(code)
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read snippet {}", file.display()))
    }
}
