//! `PlantUML` diagram build pipeline.
//!
//! Turns a tree of `.puml` sources into rendered images, re-rendering only
//! what changed:
//! - Include flattening for `!include`, `!includeurl` and `!includesub`, with
//!   light/dark theme substitution
//! - Server token encoding (deflate + `PlantUML` base64 alphabet) and decoding
//! - Modification-time staleness checks covering transitive includes
//! - Rendering through a local executable or a `PlantUML` server
//! - Optional SVG pretty-printing
//!
//! # Architecture
//!
//! - [`catalog`]: diagram roots, source scanning, output naming
//! - [`includes`]: include flattening
//! - [`encoder`]: server tokens
//! - [`staleness`]: regeneration decisions
//! - [`render`]: local and server backends
//! - [`builder`]: the batch driver tying it together
//!
//! # Example
//!
//! ```ignore
//! use plantbuild_diagrams::{DiagramBuilder, HttpServer, ServerRenderer};
//!
//! let server = HttpServer::new(DEFAULT_TIMEOUT, false);
//! let renderer = ServerRenderer::new(server, "https://www.plantuml.com/plantuml");
//! let report = DiagramBuilder::new(renderer, options).build();
//! println!("{} rendered, {} failed", report.rendered, report.failures.len());
//! ```

pub mod builder;
pub mod catalog;
mod consts;
pub mod encoder;
pub mod includes;
pub mod render;
pub mod staleness;
pub mod svg;

pub use builder::{
    BuildFailure, BuildOptions, BuildReport, DiagramBuilder, DiagramError, ThemeOptions,
    VariantReport, VariantStatus,
};
pub use catalog::{CatalogOptions, DiagramDescriptor, DiagramRoot, SourceFile, Variant};
pub use consts::DEFAULT_TIMEOUT;
pub use encoder::{EncodeError, decode_token, encode_or_empty, encode_source};
pub use includes::{Flattened, IncludeContext, IncludeError, ThemeSubstitution, flatten_source};
#[cfg(any(test, feature = "mock"))]
pub use render::MockServer;
pub use render::{
    DiagramServer, HttpServer, LocalRenderer, RenderBackend, RenderError, RenderJob,
    RenderOutcome, ServerRenderer, ServerResponse, diagram_url,
};
pub use staleness::{file_mtime, needs_regeneration};
pub use svg::{PrettifyError, prettify, prettify_or_raw};
