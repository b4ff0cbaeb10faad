//! Environment variable expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

use std::sync::LazyLock;

use regex::Regex;

use crate::ConfigError;

/// `${VAR}` references without a default value.
static REQUIRED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Any braced reference, with or without a default.
static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").unwrap());

/// Expand environment variable references in a string.
///
/// Returns the original string unchanged if no `${}` patterns are present.
/// Bare `$VAR` syntax is not expanded (only `${VAR}` with braces), so text
/// outside the braced references is copied through verbatim.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    // Required variables are checked up front so that a missing one is an
    // error instead of being left in the output verbatim.
    for caps in REQUIRED_VAR.captures_iter(value) {
        let name = &caps[1];
        if std::env::var(name).is_err() {
            return Err(ConfigError::EnvVar {
                field: field.to_owned(),
                message: format!("${{{name}}} not set"),
            });
        }
    }

    let mut expanded = String::with_capacity(value.len());
    let mut last = 0;
    for reference in BRACED_VAR.find_iter(value) {
        expanded.push_str(&value[last..reference.start()]);
        expanded.push_str(&expand_reference(reference.as_str(), field)?);
        last = reference.end();
    }
    expanded.push_str(&value[last..]);
    Ok(expanded)
}

/// Expand a single `${...}` reference.
fn expand_reference(reference: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env_with_context(reference, |var| -> Result<Option<String>, std::env::VarError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(e),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}}: {}", e.var_name, e.cause),
    })
}
