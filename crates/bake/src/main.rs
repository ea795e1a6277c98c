//! bake CLI - offline Mermaid diagram pre-rendering.
//!
//! Scans a markdown tree, renders every ```` ```mermaid ```` block to an image
//! with the Mermaid CLI and rewrites documents to reference the images.
//! Unchanged diagrams are served from a render cache in `.bake/`.

mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::RenderArgs;
use error::CliError;
use output::Output;

/// bake - pre-render Mermaid diagrams in markdown.
#[derive(Parser)]
#[command(name = "bake", version, about)]
struct Cli {
    #[command(flatten)]
    render: RenderArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    if let Err(err) = run(&cli, &output) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(cli: &Cli, output: &Output) -> Result<(), CliError> {
    let config = cli.render.load_config()?;

    // Verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if config.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(preset = %config.preset, "configuration loaded");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(RenderArgs::execute(config, output))
}
