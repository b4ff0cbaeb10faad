//! Modification-time based regeneration checks.
//!
//! Times are seconds since the Unix epoch as `f64`. An output is stale when it
//! is older than its source or than the newest file its source includes. A
//! missing output is always stale.

use std::path::Path;
use std::time::UNIX_EPOCH;

/// Modification time of `path`, or `None` if it can't be read.
#[must_use]
pub fn file_mtime(path: &Path) -> Option<f64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(
        modified
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64()),
    )
}

/// Decide whether an output has to be regenerated.
///
/// * `source_mtime` - top-level diagram source
/// * `include_mtime` - newest include seen while flattening (`0.0` if none)
/// * `output_mtime` - existing output, `None` if it doesn't exist
#[must_use]
pub fn needs_regeneration(source_mtime: f64, include_mtime: f64, output_mtime: Option<f64>) -> bool {
    let Some(output_mtime) = output_mtime else {
        return true;
    };
    output_mtime < source_mtime || include_mtime > output_mtime
}
