//! Diagram root discovery and per-diagram descriptors.
//!
//! A diagram root pairs a source folder with an output location:
//!
//! ```text
//! {root}/
//! +-- src/               # input folder, scanned recursively
//! |   +-- seq/login.puml
//! +-- out/               # output folder (flat layout)
//!     +-- seq/login.png
//!     +-- seq/login_dark.png
//! ```
//!
//! With `output_in_dir` the output folder moves below each subdirectory
//! instead (`{root}/seq/out/login.png`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::consts::{DARK_SUFFIX, START_TAG};
use crate::staleness::file_mtime;

/// Discovery and output layout settings.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Directory diagram roots are resolved against.
    pub project_dir: PathBuf,
    /// Diagram root path, relative to `project_dir`.
    pub diagram_root: String,
    /// Search below `project_dir` for every directory ending in `diagram_root`.
    pub allow_multiple_roots: bool,
    /// Source folder name inside a root.
    pub input_folder: String,
    /// Accepted file name suffixes; empty accepts every file.
    pub input_extensions: Vec<String>,
    /// Output folder name.
    pub output_folder: String,
    /// Put the output folder inside each source subdirectory.
    pub output_in_dir: bool,
    /// Output format, used as the output file extension.
    pub output_format: String,
}

/// Theme pass of a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Default (light) rendering.
    Normal,
    /// Dark rendering with theme substitution.
    Dark,
}

impl Variant {
    /// Short name used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Dark => "dark",
        }
    }
}

/// A diagram root and its source folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRoot {
    /// Root directory, fallback for include lookups.
    pub root_dir: PathBuf,
    /// Folder holding diagram sources.
    pub src_dir: PathBuf,
}

impl DiagramRoot {
    fn new(root_dir: PathBuf, options: &CatalogOptions) -> Self {
        let src_dir = root_dir.join(&options.input_folder);
        Self { root_dir, src_dir }
    }
}

/// Location of a discovered diagram source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Directory containing the file.
    pub directory: PathBuf,
    /// File name within `directory`.
    pub file_name: String,
}

impl SourceFile {
    /// Full path to the file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Everything known about one diagram while it moves through the pipeline.
#[derive(Debug, Clone)]
pub struct DiagramDescriptor {
    /// Source file name.
    pub file_name: String,
    /// Directory of the source file.
    pub directory: PathBuf,
    /// Diagram root the source belongs to.
    pub root_dir: PathBuf,
    /// Directory outputs are written to.
    pub out_dir: PathBuf,
    /// Output path of the normal variant.
    pub out_file: PathBuf,
    /// Output path of the dark variant.
    pub out_file_dark: PathBuf,
    /// Output name taken from `@startuml <name>` rather than the file name.
    pub has_explicit_target_name: bool,
    /// Raw source text.
    pub source: String,
    /// Source modification time.
    pub source_mtime: f64,
    /// Normal output modification time, `None` if missing.
    pub output_mtime: Option<f64>,
    /// Dark output modification time, `None` if missing.
    pub output_mtime_dark: Option<f64>,
    /// Newest include seen by the most recent flatten pass.
    pub include_mtime: f64,
    /// Source after include expansion (most recent pass).
    pub flattened: String,
    /// Server token of `flattened`.
    pub token: String,
}

impl DiagramDescriptor {
    /// Read a source file and compute its output paths and timestamps.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source can't be read.
    pub fn load(
        file: &SourceFile,
        root: &DiagramRoot,
        options: &CatalogOptions,
    ) -> std::io::Result<Self> {
        let path = file.path();
        let source = fs::read_to_string(&path)?;
        let source_mtime = file_mtime(&path).unwrap_or(0.0);
        let out_dir = output_dir(root, &file.directory, options);

        let (stem, has_explicit_target_name) = match explicit_target_name(&source) {
            Some(name) => (name.to_owned(), true),
            None => (derived_stem(&file.file_name).to_owned(), false),
        };
        let format = &options.output_format;
        let out_file = out_dir.join(format!("{stem}.{format}"));
        let out_file_dark = out_dir.join(format!("{stem}{DARK_SUFFIX}.{format}"));

        let mut descriptor = Self {
            file_name: file.file_name.clone(),
            directory: file.directory.clone(),
            root_dir: root.root_dir.clone(),
            out_dir,
            out_file,
            out_file_dark,
            has_explicit_target_name,
            source,
            source_mtime,
            output_mtime: None,
            output_mtime_dark: None,
            include_mtime: 0.0,
            flattened: String::new(),
            token: String::new(),
        };
        descriptor.refresh_output_mtimes();
        Ok(descriptor)
    }

    /// Full path to the source file.
    #[must_use]
    pub fn source_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Output path for a variant.
    #[must_use]
    pub fn output_path(&self, variant: Variant) -> &Path {
        match variant {
            Variant::Normal => &self.out_file,
            Variant::Dark => &self.out_file_dark,
        }
    }

    /// Existing output modification time for a variant.
    #[must_use]
    pub fn output_mtime(&self, variant: Variant) -> Option<f64> {
        match variant {
            Variant::Normal => self.output_mtime,
            Variant::Dark => self.output_mtime_dark,
        }
    }

    /// Re-read output modification times from disk.
    pub fn refresh_output_mtimes(&mut self) {
        self.output_mtime = file_mtime(&self.out_file);
        self.output_mtime_dark = file_mtime(&self.out_file_dark);
    }

    /// Source lines without terminators.
    pub fn source_lines(&self) -> impl Iterator<Item = &str> {
        self.source.lines()
    }
}

/// Find the diagram roots to process.
///
/// In single-root mode this is `project_dir/diagram_root`, whether or not it
/// exists. In multi-root mode the project tree is walked (hidden directories
/// skipped) and every directory whose path ends with `diagram_root` is a root.
#[must_use]
pub fn discover_roots(options: &CatalogOptions) -> Vec<DiagramRoot> {
    if !options.allow_multiple_roots {
        let root_dir = options.project_dir.join(&options.diagram_root);
        return vec![DiagramRoot::new(root_dir, options)];
    }

    let suffix = Path::new(&options.diagram_root);
    let mut found = Vec::new();
    collect_roots(&options.project_dir, suffix, &mut found);
    found.sort();

    found
        .into_iter()
        .map(|root_dir| DiagramRoot::new(root_dir, options))
        .collect()
}

fn collect_roots(dir: &Path, suffix: &Path, found: &mut Vec<PathBuf>) {
    for (path, is_dir) in sorted_entries(dir) {
        if !is_dir {
            continue;
        }
        if path.ends_with(suffix) {
            found.push(path.clone());
        }
        collect_roots(&path, suffix, found);
    }
}

/// List the source files of a root, recursively and in sorted order.
///
/// Returns an empty list if the source folder doesn't exist.
#[must_use]
pub fn scan_sources(root: &DiagramRoot, extensions: &[String]) -> Vec<SourceFile> {
    let mut files = Vec::new();
    scan_directory(&root.src_dir, extensions, &mut files);
    files
}

fn scan_directory(dir: &Path, extensions: &[String], files: &mut Vec<SourceFile>) {
    for (path, is_dir) in sorted_entries(dir) {
        if is_dir {
            scan_directory(&path, extensions, files);
            continue;
        }
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if matches_extension(&file_name, extensions) {
            files.push(SourceFile {
                directory: dir.to_path_buf(),
                file_name,
            });
        }
    }
}

/// Non-hidden directory entries as `(path, is_dir)`, sorted by path.
fn sorted_entries(dir: &Path) -> Vec<(PathBuf, bool)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut entries: Vec<_> = entries
        .filter_map(Result::ok)
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| {
            let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
            (e.path(), is_dir)
        })
        .collect();
    entries.sort();
    entries
}

/// Whether a file name ends with one of the accepted suffixes.
///
/// An empty suffix list accepts every file.
#[must_use]
pub fn matches_extension(file_name: &str, extensions: &[String]) -> bool {
    extensions.is_empty() || extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
}

/// Output directory for sources found in `subdir`.
fn output_dir(root: &DiagramRoot, subdir: &Path, options: &CatalogOptions) -> PathBuf {
    let relative = subdir.strip_prefix(&root.src_dir).unwrap_or(Path::new(""));
    if options.output_in_dir {
        root.root_dir.join(relative).join(&options.output_folder)
    } else {
        root.root_dir.join(&options.output_folder).join(relative)
    }
}

/// Name given by the first `@startuml <name>` line, if any.
fn explicit_target_name(source: &str) -> Option<&str> {
    source.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(START_TAG)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let name = rest.trim();
        (!name.is_empty()).then_some(name)
    })
}

/// File name without its last extension.
fn derived_stem(file_name: &str) -> &str {
    file_name
        .rfind('.')
        .map_or(file_name, |index| &file_name[..index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn options(project_dir: &Path) -> CatalogOptions {
        CatalogOptions {
            project_dir: project_dir.to_path_buf(),
            diagram_root: "docs/diagrams".to_owned(),
            allow_multiple_roots: false,
            input_folder: "src".to_owned(),
            input_extensions: Vec::new(),
            output_folder: "out".to_owned(),
            output_in_dir: false,
            output_format: "svg".to_owned(),
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_single_root() {
        let dir = TempDir::new().unwrap();
        let roots = discover_roots(&options(dir.path()));
        assert_eq!(
            roots,
            vec![DiagramRoot {
                root_dir: dir.path().join("docs/diagrams"),
                src_dir: dir.path().join("docs/diagrams/src"),
            }]
        );
    }

    #[test]
    fn test_multiple_roots_discovered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/diagrams/src")).unwrap();
        fs::create_dir_all(dir.path().join("module/docs/diagrams/src")).unwrap();
        fs::create_dir_all(dir.path().join("module/mydocs/diagrams")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden/docs/diagrams")).unwrap();

        let opts = CatalogOptions {
            allow_multiple_roots: true,
            ..options(dir.path())
        };
        let roots: Vec<_> = discover_roots(&opts)
            .into_iter()
            .map(|r| r.root_dir)
            .collect();

        assert_eq!(
            roots,
            vec![
                dir.path().join("docs/diagrams"),
                dir.path().join("module/docs/diagrams"),
            ]
        );
    }

    #[test]
    fn test_scan_sources_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = DiagramRoot::new(dir.path().to_path_buf(), &options(dir.path()));
        write(&root.src_dir.join("b.puml"), "");
        write(&root.src_dir.join("a.puml"), "");
        write(&root.src_dir.join("notes.txt"), "");
        write(&root.src_dir.join("seq/login.puml"), "");
        write(&root.src_dir.join(".draft.puml"), "");

        let files = scan_sources(&root, &[".puml".to_owned()]);
        let names: Vec<_> = files.iter().map(|f| f.path()).collect();

        assert_eq!(
            names,
            vec![
                root.src_dir.join("a.puml"),
                root.src_dir.join("b.puml"),
                root.src_dir.join("seq/login.puml"),
            ]
        );
    }

    #[test]
    fn test_scan_sources_missing_folder() {
        let dir = TempDir::new().unwrap();
        let root = DiagramRoot::new(dir.path().join("nope"), &options(dir.path()));
        assert!(scan_sources(&root, &[]).is_empty());
    }

    #[test]
    fn test_matches_extension() {
        assert!(matches_extension("a.puml", &[]));
        let exts = vec![".puml".to_owned(), ".iuml".to_owned()];
        assert!(matches_extension("a.puml", &exts));
        assert!(matches_extension("a.iuml", &exts));
        assert!(!matches_extension("a.png", &exts));
    }

    #[test]
    fn test_explicit_target_name() {
        assert_eq!(
            explicit_target_name("' header\n  @startuml login_flow\nA -> B\n@enduml"),
            Some("login_flow")
        );
        assert_eq!(explicit_target_name("@startuml\nA -> B\n@enduml"), None);
        assert_eq!(explicit_target_name("@startumlx\n"), None);
        assert_eq!(
            explicit_target_name("@startuml\n@enduml\n@startuml second\n"),
            Some("second")
        );
    }

    #[test]
    fn test_derived_stem() {
        assert_eq!(derived_stem("login.puml"), "login");
        assert_eq!(derived_stem("a.b.puml"), "a.b");
        assert_eq!(derived_stem("README"), "README");
    }

    #[test]
    fn test_load_flat_output_layout() {
        let dir = TempDir::new().unwrap();
        let opts = options(dir.path());
        let root = discover_roots(&opts).remove(0);
        write(&root.src_dir.join("seq/login.puml"), "@startuml\nA -> B\n@enduml\n");
        let file = scan_sources(&root, &[]).remove(0);

        let descriptor = DiagramDescriptor::load(&file, &root, &opts).unwrap();

        assert_eq!(descriptor.out_dir, root.root_dir.join("out/seq"));
        assert_eq!(descriptor.out_file, root.root_dir.join("out/seq/login.svg"));
        assert_eq!(
            descriptor.out_file_dark,
            root.root_dir.join("out/seq/login_dark.svg")
        );
        assert!(!descriptor.has_explicit_target_name);
        assert_eq!(descriptor.output_mtime, None);
        assert!(descriptor.source_mtime > 0.0);
        assert_eq!(
            descriptor.source_lines().collect::<Vec<_>>(),
            vec!["@startuml", "A -> B", "@enduml"]
        );
    }

    #[test]
    fn test_load_output_in_dir_with_explicit_name() {
        let dir = TempDir::new().unwrap();
        let opts = CatalogOptions {
            output_in_dir: true,
            output_format: "png".to_owned(),
            ..options(dir.path())
        };
        let root = discover_roots(&opts).remove(0);
        write(&root.src_dir.join("seq/login.puml"), "@startuml auth\n@enduml\n");
        let file = scan_sources(&root, &[]).remove(0);

        let descriptor = DiagramDescriptor::load(&file, &root, &opts).unwrap();

        assert!(descriptor.has_explicit_target_name);
        assert_eq!(descriptor.out_file, root.root_dir.join("seq/out/auth.png"));
        assert_eq!(
            descriptor.out_file_dark,
            root.root_dir.join("seq/out/auth_dark.png")
        );
    }

    #[test]
    fn test_refresh_output_mtimes() {
        let dir = TempDir::new().unwrap();
        let opts = options(dir.path());
        let root = discover_roots(&opts).remove(0);
        write(&root.src_dir.join("a.puml"), "@startuml\n@enduml\n");
        let file = scan_sources(&root, &[]).remove(0);
        let mut descriptor = DiagramDescriptor::load(&file, &root, &opts).unwrap();
        assert_eq!(descriptor.output_mtime(Variant::Normal), None);

        write(&descriptor.out_file, "<svg/>");
        descriptor.refresh_output_mtimes();

        assert!(descriptor.output_mtime(Variant::Normal).is_some());
        assert_eq!(descriptor.output_mtime(Variant::Dark), None);
    }
}
