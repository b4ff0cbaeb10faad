//! `PlantUML` include resolution.
//!
//! Flattens diagram source by replacing include directives with the content
//! they reference, recursively:
//!
//! - `!includeurl <url>` is kept verbatim; remote content is never fetched
//! - `!include <file>` is replaced by the flattened file, unless the target is
//!   a URL or a `<stdlib>` reference, which is kept verbatim
//! - `!includesub <file>!<name>` is replaced by the flattened lines between
//!   `!startsub <name>` and the next `!endsub` (or `@enduml`) in `<file>`
//!
//! Local targets are looked up next to the including file first and then in
//! the diagram root. On the dark pass the light theme file name inside a
//! target is swapped for the dark one before lookup.
//!
//! Along with the text, flattening reports the newest modification time among
//! all included files, which drives the staleness check.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::staleness::file_mtime;

static INCLUDE_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!includeurl\s+\S+\s*$").unwrap());

static INCLUDE_SUB_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!includesub\s+(\S+)\s*$").unwrap());

static INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!include\s+(\S+)\s*$").unwrap());

static URL_SCHEME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap());

const INCLUDE_KEYWORD: &str = "!include";

/// Include resolution error. Any of these aborts the current diagram.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("unknown include directive: {line}")]
    Malformed { line: String },
    #[error("invalid !includesub syntax, expected !includesub <file>!<name>: {line}")]
    InvalidSubInclude { line: String },
    #[error("include could not be resolved: {line} (searched: {searched})")]
    Unresolved { line: String, searched: String },
    #[error("include cycle detected at {}", path.display())]
    Cycle { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Theme file names swapped in include targets on the dark pass.
#[derive(Debug, Clone)]
pub struct ThemeSubstitution {
    /// Light theme file name as written in the diagram source.
    pub light: String,
    /// Dark theme file name it is replaced with.
    pub dark: String,
}

impl ThemeSubstitution {
    fn apply(&self, target: &str) -> String {
        target.replace(&self.light, &self.dark)
    }
}

/// Settings shared by every lookup during one flatten pass.
#[derive(Debug, Clone, Copy)]
pub struct IncludeContext<'a> {
    /// Diagram root, the fallback directory for include lookups.
    pub root_dir: &'a Path,
    /// Theme substitution, set only on the dark pass.
    pub theme: Option<&'a ThemeSubstitution>,
}

/// Result of flattening diagram source.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    /// Source with every local include expanded.
    pub text: String,
    /// Newest modification time among included files (seconds since epoch),
    /// `0.0` when nothing was included.
    pub include_mtime: f64,
}

/// A recognised directive on a single trimmed line.
#[derive(Debug, PartialEq)]
enum Directive<'a> {
    /// Not an include; copied through.
    Text,
    /// Include kept as written (`!includeurl`, URL or stdlib target).
    Verbatim,
    /// Local `!include`.
    File(&'a str),
    /// Local `!includesub`.
    Sub { target: &'a str, name: &'a str },
}

fn parse_directive(line: &str) -> Result<Directive<'_>, IncludeError> {
    if !line.starts_with(INCLUDE_KEYWORD) {
        return Ok(Directive::Text);
    }

    if INCLUDE_URL_PATTERN.is_match(line) {
        return Ok(Directive::Verbatim);
    }

    if let Some(caps) = INCLUDE_SUB_PATTERN.captures(line) {
        let argument = caps.get(1).map_or("", |m| m.as_str());
        return match argument.split('!').collect::<Vec<_>>().as_slice() {
            [target, name] if !target.is_empty() && !name.is_empty() => Ok(Directive::Sub {
                target: *target,
                name: *name,
            }),
            _ => Err(IncludeError::InvalidSubInclude {
                line: line.to_owned(),
            }),
        };
    }

    if let Some(caps) = INCLUDE_PATTERN.captures(line) {
        let target = caps.get(1).map_or("", |m| m.as_str());
        if target.starts_with('<') || URL_SCHEME_PATTERN.is_match(target) {
            return Ok(Directive::Verbatim);
        }
        return Ok(Directive::File(target));
    }

    Err(IncludeError::Malformed {
        line: line.to_owned(),
    })
}

/// Flatten diagram source.
///
/// `dir` is the directory of the file `source` was read from; relative
/// include targets are looked up there before falling back to the root.
///
/// # Errors
///
/// Returns [`IncludeError`] for malformed directives, targets that exist in
/// neither lookup directory, include cycles, and unreadable files.
pub fn flatten_source(
    source: &str,
    dir: &Path,
    ctx: &IncludeContext<'_>,
) -> Result<Flattened, IncludeError> {
    let mut resolver = Resolver {
        ctx: *ctx,
        chain: Vec::new(),
    };
    let (text, include_mtime) = resolver.flatten(source, dir)?;
    Ok(Flattened {
        text,
        include_mtime,
    })
}

/// Recursive flattening state for one pass.
struct Resolver<'a> {
    ctx: IncludeContext<'a>,
    /// Files (and sub-sections) currently being expanded, outermost first.
    chain: Vec<(PathBuf, Option<String>)>,
}

impl Resolver<'_> {
    /// Flatten `text`, returning the expanded text and the newest include mtime.
    fn flatten(&mut self, text: &str, dir: &Path) -> Result<(String, f64), IncludeError> {
        let mut output = String::with_capacity(text.len());
        let mut newest = 0.0_f64;

        for raw in text.split_inclusive('\n') {
            let line = raw.trim();
            let (content, mtime) = match parse_directive(line)? {
                Directive::Text | Directive::Verbatim => {
                    output.push_str(raw);
                    continue;
                }
                Directive::File(target) => self.include_file(line, target, dir)?,
                Directive::Sub { target, name } => self.include_sub(line, target, name, dir)?,
            };

            newest = newest.max(mtime);
            output.push_str(&content);
            if raw.ends_with('\n') && !content.is_empty() && !content.ends_with('\n') {
                output.push('\n');
            }
        }

        Ok((output, newest))
    }

    fn include_file(
        &mut self,
        line: &str,
        target: &str,
        dir: &Path,
    ) -> Result<(String, f64), IncludeError> {
        let path = self.locate(line, target, dir)?;
        let content = read_include(&path)?;
        self.expand(&path, None, &content)
    }

    fn include_sub(
        &mut self,
        line: &str,
        target: &str,
        name: &str,
        dir: &Path,
    ) -> Result<(String, f64), IncludeError> {
        let path = self.locate(line, target, dir)?;
        let content = read_include(&path)?;
        let section = extract_sub(&content, name);
        self.expand(&path, Some(name), &section)
    }

    /// Flatten included content in the context of its own file.
    fn expand(
        &mut self,
        path: &Path,
        sub: Option<&str>,
        content: &str,
    ) -> Result<(String, f64), IncludeError> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let key = (canonical, sub.map(ToOwned::to_owned));
        if self.chain.contains(&key) {
            return Err(IncludeError::Cycle {
                path: path.to_path_buf(),
            });
        }

        let own_mtime = file_mtime(path).unwrap_or(0.0);
        let parent = key.0.parent().map(Path::to_path_buf).unwrap_or_default();

        self.chain.push(key);
        let result = self.flatten(content, &parent);
        self.chain.pop();

        let (text, nested_mtime) = result?;
        Ok((text, own_mtime.max(nested_mtime)))
    }

    /// Find an include target next to the including file, then in the root.
    fn locate(&self, line: &str, target: &str, dir: &Path) -> Result<PathBuf, IncludeError> {
        let target = match self.ctx.theme {
            Some(theme) => theme.apply(target),
            None => target.to_owned(),
        };

        let local = dir.join(&target);
        if local.is_file() {
            return Ok(local);
        }
        tracing::debug!(path = %local.display(), "Include not found next to including file");

        let rooted = self.ctx.root_dir.join(&target);
        if rooted.is_file() {
            return Ok(rooted);
        }
        tracing::debug!(path = %rooted.display(), "Include not found in diagram root");

        Err(IncludeError::Unresolved {
            line: line.to_owned(),
            searched: format!("{}, {}", local.display(), rooted.display()),
        })
    }
}

fn read_include(path: &Path) -> Result<String, IncludeError> {
    fs::read_to_string(path).map_err(|source| IncludeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_sub_start(line: &str, name: &str) -> bool {
    line.strip_prefix("!startsub")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace) && rest.trim() == name)
}

fn is_sub_end(line: &str) -> bool {
    ["!endsub", "@enduml"]
        .iter()
        .any(|marker| line.strip_prefix(marker).is_some_and(str::is_empty))
}

/// Collect the lines of every `!startsub <name>` block, markers excluded.
fn extract_sub(content: &str, name: &str) -> String {
    let mut section = String::new();
    let mut inside = false;

    for raw in content.split_inclusive('\n') {
        let line = raw.trim();
        if is_sub_start(line, name) {
            inside = true;
        } else if is_sub_end(line) {
            inside = false;
        } else if inside {
            section.push_str(raw);
            if !raw.ends_with('\n') {
                section.push('\n');
            }
        }
    }

    section
}
