//! CLI error types.

use plantbuild_config::ConfigError;
use plantbuild_diagrams::{EncodeError, IncludeError, RenderError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Encode(#[from] EncodeError),

    #[error("{0}")]
    Include(#[from] IncludeError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{failed} diagram(s) failed")]
    BuildFailed { failed: usize },
}
