//! Internal constants for diagram processing.

use std::time::Duration;

/// Default timeout for a renderer process or server request (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker opening a diagram; may carry an explicit output name.
pub(crate) const START_TAG: &str = "@startuml";

/// Suffix appended to the output stem of the dark variant.
pub(crate) const DARK_SUFFIX: &str = "_dark";

/// Poll interval while waiting for the local renderer to exit.
pub(crate) const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(50);
