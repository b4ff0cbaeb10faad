//! `plantbuild build` command implementation.

use std::path::PathBuf;

use clap::Args;
use plantbuild_config::{CliSettings, Config, RenderMode};
use plantbuild_diagrams::{BuildReport, DiagramBuilder, VariantStatus};

use crate::error::CliError;
use crate::output::{Output, Tone};
use crate::pipeline::{build_options, render_backend};

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover plantbuild.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render mode: local or server (overrides config).
    #[arg(long)]
    render: Option<RenderMode>,

    /// PlantUML server URL (overrides config).
    #[arg(long, env = "PLANTUML_SERVER")]
    server: Option<String>,

    /// Local PlantUML command (overrides config).
    #[arg(long)]
    bin_path: Option<String>,

    /// Output format, e.g. png or svg (overrides config).
    #[arg(short, long)]
    format: Option<String>,

    /// Stop at the first failed diagram.
    #[arg(long)]
    fail_fast: bool,

    /// Print the build report as JSON to stdout.
    #[arg(long)]
    json: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl BuildArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            mode: self.render,
            server: self.server,
            bin_path: self.bin_path,
            output_format: self.format,
            fail_fast: self.fail_fast.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        tracing::debug!(project_dir = %config.project_dir.display(), "Loaded configuration");

        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }
        match config.render.mode {
            RenderMode::Local => {
                output.info(&format!("Renderer: {}", config.render.bin_path));
            }
            RenderMode::Server => output.info(&format!("Server: {}", config.render.server)),
        }

        let backend = render_backend(&config)?;
        let report = DiagramBuilder::new(backend, build_options(&config)).build();

        if self.json {
            output.data(&serde_json::to_string_pretty(&report)?)?;
        } else {
            print_summary(&output, &report);
        }

        if report.is_success() {
            Ok(())
        } else {
            Err(CliError::BuildFailed {
                failed: report.failures.len(),
            })
        }
    }
}

fn print_summary(output: &Output, report: &BuildReport) {
    for entry in &report.variants {
        match &entry.status {
            VariantStatus::Rendered => {
                output.status(Tone::Success, "rendered", &entry.output.display().to_string());
            }
            VariantStatus::Skipped { reason } => output.status(
                Tone::Warning,
                "skipped",
                &format!("{} ({reason})", entry.source.display()),
            ),
            VariantStatus::UpToDate => {}
        }
    }
    for failure in &report.failures {
        output.status(Tone::Error, "failed", &failure.message);
    }
    if report.aborted {
        output.message(Tone::Warning, "Stopped after first failure (--fail-fast)");
    }

    output.highlight(&format!(
        "{} rendered, {} up to date, {} skipped, {} failed",
        report.rendered,
        report.up_to_date,
        report.skipped,
        report.failures.len()
    ));
}
