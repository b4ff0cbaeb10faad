//! Batch driver.
//!
//! [`DiagramBuilder`] walks every diagram root and, for each source file,
//! runs the pipeline once per theme variant:
//!
//! ```text
//! flatten includes -> encode token -> staleness check -> render -> write
//! ```
//!
//! The normal pass always runs; the dark pass runs when themes are enabled.
//! Each pass recomputes its own include times. A failure aborts only the
//! diagram it happened in unless `fail_fast` is set.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{
    CatalogOptions, DiagramDescriptor, DiagramRoot, SourceFile, Variant, discover_roots,
    scan_sources,
};
use crate::encoder::encode_or_empty;
use crate::includes::{IncludeContext, IncludeError, ThemeSubstitution, flatten_source};
use crate::render::{RenderBackend, RenderError, RenderJob, RenderOutcome};
use crate::staleness::needs_regeneration;
use crate::svg::prettify_or_raw;

/// Light/dark theme settings.
#[derive(Debug, Clone)]
pub struct ThemeOptions {
    /// Theme folder relative to each diagram root.
    pub folder: String,
    /// File names swapped on the dark pass.
    pub substitution: ThemeSubstitution,
}

/// Settings for a batch build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub catalog: CatalogOptions,
    /// Enables the dark pass when set.
    pub theme: Option<ThemeOptions>,
    /// Pretty-print SVG output.
    pub prettify_svg: bool,
    /// Stop at the first failed diagram.
    pub fail_fast: bool,
}

/// Failure of a single diagram.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Include {
        path: PathBuf,
        #[source]
        source: IncludeError,
    },
    #[error("failed to render {} ({}): {source}", path.display(), variant.as_str())]
    Render {
        path: PathBuf,
        variant: Variant,
        #[source]
        source: RenderError,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to one diagram variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum VariantStatus {
    Rendered,
    UpToDate,
    Skipped { reason: String },
}

/// Report entry for one diagram variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub variant: Variant,
    #[serde(flatten)]
    pub status: VariantStatus,
}

/// Report entry for a failed diagram.
#[derive(Debug, Clone, Serialize)]
pub struct BuildFailure {
    pub source: PathBuf,
    pub message: String,
}

/// Outcome of a batch build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub rendered: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub variants: Vec<VariantReport>,
    pub failures: Vec<BuildFailure>,
    /// Set when `fail_fast` stopped the batch early.
    pub aborted: bool,
}

impl BuildReport {
    /// Whether every diagram was processed without failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, entry: VariantReport) {
        match entry.status {
            VariantStatus::Rendered => self.rendered += 1,
            VariantStatus::UpToDate => self.up_to_date += 1,
            VariantStatus::Skipped { .. } => self.skipped += 1,
        }
        self.variants.push(entry);
    }
}

/// Runs the diagram pipeline over every discovered source file.
pub struct DiagramBuilder<R> {
    backend: R,
    options: BuildOptions,
}

impl<R: RenderBackend> DiagramBuilder<R> {
    #[must_use]
    pub fn new(backend: R, options: BuildOptions) -> Self {
        Self { backend, options }
    }

    /// Process every diagram in every root.
    pub fn build(&self) -> BuildReport {
        let mut report = BuildReport::default();

        for root in discover_roots(&self.options.catalog) {
            tracing::debug!(root = %root.root_dir.display(), "Scanning diagram root");
            self.check_dark_theme(&root);

            for file in scan_sources(&root, &self.options.catalog.input_extensions) {
                match self.build_diagram(&file, &root) {
                    Ok(entries) => {
                        for entry in entries {
                            report.record(entry);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Diagram failed");
                        report.failures.push(BuildFailure {
                            source: file.path(),
                            message: e.to_string(),
                        });
                        if self.options.fail_fast {
                            report.aborted = true;
                            return report;
                        }
                    }
                }
            }
        }

        report
    }

    /// Process one source file, normal pass first.
    ///
    /// # Errors
    ///
    /// Returns [`DiagramError`] on the first pass that fails; outputs of
    /// earlier passes stay written.
    pub fn build_diagram(
        &self,
        file: &SourceFile,
        root: &DiagramRoot,
    ) -> Result<Vec<VariantReport>, DiagramError> {
        let mut descriptor = DiagramDescriptor::load(file, root, &self.options.catalog).map_err(
            |source| DiagramError::Read {
                path: file.path(),
                source,
            },
        )?;

        let mut entries = vec![self.build_variant(&mut descriptor, Variant::Normal)?];
        if self.options.theme.is_some() {
            entries.push(self.build_variant(&mut descriptor, Variant::Dark)?);
        }
        Ok(entries)
    }

    fn build_variant(
        &self,
        descriptor: &mut DiagramDescriptor,
        variant: Variant,
    ) -> Result<VariantReport, DiagramError> {
        let source_path = descriptor.source_path();
        let theme = match variant {
            Variant::Normal => None,
            Variant::Dark => self.options.theme.as_ref().map(|t| &t.substitution),
        };
        let ctx = IncludeContext {
            root_dir: &descriptor.root_dir,
            theme,
        };

        let flattened = flatten_source(&descriptor.source, &descriptor.directory, &ctx)
            .map_err(|source| DiagramError::Include {
                path: source_path.clone(),
                source,
            })?;
        descriptor.flattened = flattened.text;
        descriptor.include_mtime = flattened.include_mtime;
        descriptor.token = encode_or_empty(&descriptor.flattened);

        let output = descriptor.output_path(variant).to_path_buf();
        let report = |status: VariantStatus| VariantReport {
            source: source_path.clone(),
            output: output.clone(),
            variant,
            status,
        };

        if !needs_regeneration(
            descriptor.source_mtime,
            descriptor.include_mtime,
            descriptor.output_mtime(variant),
        ) {
            tracing::debug!(output = %output.display(), "Diagram up to date");
            return Ok(report(VariantStatus::UpToDate));
        }

        tracing::info!(
            source = %source_path.display(),
            variant = variant.as_str(),
            "Converting diagram"
        );
        let format = self.options.catalog.output_format.as_str();
        let job = RenderJob {
            source_path: &source_path,
            flattened: &descriptor.flattened,
            token: &descriptor.token,
            variant,
            format,
        };
        let outcome = self
            .backend
            .render(&job)
            .map_err(|source| DiagramError::Render {
                path: source_path.clone(),
                variant,
                source,
            })?;

        let content = match outcome {
            RenderOutcome::Rendered(content) => content,
            RenderOutcome::Skipped { reason } => {
                return Ok(report(VariantStatus::Skipped { reason }));
            }
        };
        let content = if self.options.prettify_svg && format == "svg" {
            prettify_or_raw(content)
        } else {
            content
        };

        write_output(&output, &content).map_err(|source| DiagramError::Write {
            path: output.clone(),
            source,
        })?;
        descriptor.refresh_output_mtimes();

        Ok(report(VariantStatus::Rendered))
    }

    fn check_dark_theme(&self, root: &DiagramRoot) {
        let Some(theme) = &self.options.theme else {
            return;
        };
        let dark = root
            .root_dir
            .join(&theme.folder)
            .join(&theme.substitution.dark);
        if !dark.is_file() {
            tracing::warn!(
                path = %dark.display(),
                "Dark theme file not found, dark diagrams will fail to resolve"
            );
        }
    }
}

fn write_output(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}
