//! Render backends.
//!
//! A backend turns one diagram variant into output bytes. Two backends
//! exist:
//!
//! - [`LocalRenderer`] runs the `PlantUML` executable in a scratch directory
//! - [`ServerRenderer`] fetches `<server>/<format>/<token>` over HTTP
//!
//! Backends never write to the final output path; the builder does that
//! once it has the bytes.

mod local;
mod server;

#[cfg(any(test, feature = "mock"))]
mod mock;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use local::LocalRenderer;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockServer;
pub use server::{DiagramServer, HttpServer, ServerRenderer, ServerResponse, diagram_url};

use crate::catalog::Variant;

/// One diagram variant ready to be rendered.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// Original source file on disk.
    pub source_path: &'a Path,
    /// Source with includes expanded for this variant.
    pub flattened: &'a str,
    /// Server token of `flattened`.
    pub token: &'a str,
    /// Theme pass.
    pub variant: Variant,
    /// Output format (`png`, `svg`, ...).
    pub format: &'a str,
}

/// Result of a render attempt that did not fail hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Output bytes for the variant.
    Rendered(Vec<u8>),
    /// Nothing produced; the diagram is left as is and the batch continues.
    Skipped { reason: String },
}

/// Render failure. Aborts the current diagram.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer command is empty")]
    EmptyCommand,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
    #[error("renderer produced no output for {}", input.display())]
    NoOutput { input: PathBuf },
    #[error("renderer I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },
}

/// Strategy producing diagram output bytes.
pub trait RenderBackend {
    /// Render a single diagram variant.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when rendering fails in a way that should
    /// abort the diagram.
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderOutcome, RenderError>;
}

impl<T: RenderBackend + ?Sized> RenderBackend for Box<T> {
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderOutcome, RenderError> {
        (**self).render(job)
    }
}
