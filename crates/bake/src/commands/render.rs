//! Default `bake` command: pre-render every diagram in the input tree.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bake_build::{Batch, Statistics};
use bake_config::{CliSettings, Config};
use bake_diagrams::MermaidCli;
use clap::Args;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Path to configuration file (default: auto-discover bake.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Named preset from the configuration file.
    #[arg(long)]
    preset: Option<String>,

    /// Enable verbose output (per-file and per-diagram progress).
    #[arg(short, long)]
    verbose: bool,

    /// Directory scanned for documents (overrides config).
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory receiving rendered images (overrides config).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl RenderArgs {
    /// Load the configuration these arguments select.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is missing or invalid, or the
    /// preset is unknown.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            preset: self.preset.clone(),
            verbose: self.verbose.then_some(true),
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if the project directory or render cache cannot be
    /// created. Diagram failures are reported in the summary only.
    pub(crate) async fn execute(config: Config, output: &Output) -> Result<(), CliError> {
        ensure_project_dir(&config.project_dir)?;

        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }
        output.info(&format!("Input: {}", config.input.dir.display()));
        output.info(&format!("Output: {}", config.output.dir.display()));
        output.info(&format!(
            "Theme: {}{}",
            config.theme.default.as_str(),
            if config.theme.both { " (both themes)" } else { "" }
        ));

        let started = Instant::now();
        let renderer = MermaidCli::from_config(&config);
        let batch = Batch::new(config, renderer);
        let stats = batch.run().await?;

        print_summary(output, &stats, started, &batch.config().output.dir);
        Ok(())
    }
}

fn print_summary(output: &Output, stats: &Statistics, started: Instant, output_dir: &Path) {
    output.info("");
    output.separator();
    output.highlight("Processing complete");
    output.separator();
    output.field("Files scanned", stats.files_scanned);
    output.field("Files updated", stats.files_updated);
    output.field("Files unchanged", stats.files_unchanged);
    output.field("Files without diagrams", stats.files_without_diagrams);
    output.field("Diagrams found", stats.diagrams_found);
    output.field("Diagrams rendered", stats.diagrams_rendered);
    output.field("Diagrams from cache", stats.diagrams_cached);
    output.field("Errors", stats.errors);
    output.field(
        "Duration",
        format!("{:.2}s", started.elapsed().as_secs_f64()),
    );
    output.field("Output directory", output_dir.display());
    output.separator();

    if stats.errors == 0 {
        output.success("All diagrams up to date");
    } else {
        output.warning(&format!(
            "{} error(s); failed diagrams were left in place and will be retried on the next run",
            stats.errors
        ));
    }
}

/// Ensure the `.bake/` project directory exists with a `.gitignore`.
fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by bake\n*\n");
    }

    Ok(())
}
