//! `plantbuild encode` command implementation.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use plantbuild_config::Config;
use plantbuild_diagrams::{IncludeContext, diagram_url, encode_source, flatten_source};

use crate::error::CliError;
use crate::output::Output;
use crate::pipeline::{root_for, theme_substitution};

/// Arguments for the encode command.
#[derive(Args)]
pub(crate) struct EncodeArgs {
    /// Diagram source file.
    file: PathBuf,

    /// Path to configuration file (default: auto-discover plantbuild.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve includes with the dark theme.
    #[arg(long)]
    dark: bool,

    /// Print the full server URL instead of the token.
    #[arg(long)]
    url: bool,
}

impl EncodeArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;

        let source = fs::read_to_string(&self.file)?;
        let root_dir = root_for(&config, &self.file);
        let theme = theme_substitution(&config);
        let ctx = IncludeContext {
            root_dir: &root_dir,
            theme: self.dark.then_some(&theme),
        };
        let dir = self.file.parent().unwrap_or(Path::new("."));

        let flattened = flatten_source(&source, dir, &ctx)?;
        let token = encode_source(&flattened.text)?;

        if self.url {
            let format = &config.render.output_format;
            output.data(&diagram_url(&config.render.server, format, &token))?;
        } else {
            output.data(&token)?;
        }
        Ok(())
    }
}
