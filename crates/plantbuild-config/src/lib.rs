//! Configuration management for plantbuild.
//!
//! Parses `plantbuild.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `render.server`
//! - `render.bin_path`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "plantbuild.toml";

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override render mode.
    pub mode: Option<RenderMode>,
    /// Override rendering server base URL.
    pub server: Option<String>,
    /// Override local renderer command.
    pub bin_path: Option<String>,
    /// Override output format.
    pub output_format: Option<String>,
    /// Override fail-fast behaviour.
    pub fail_fast: Option<bool>,
}

/// Where diagrams get rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Run the renderer binary on this machine.
    Local,
    /// Fetch rendered images from a rendering server.
    #[default]
    Server,
}

impl std::str::FromStr for RenderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "server" => Ok(Self::Server),
            other => Err(ConfigError::Validation(format!(
                "render.mode must be \"local\" or \"server\", got \"{other}\""
            ))),
        }
    }
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Renderer configuration.
    pub render: RenderConfig,
    /// Diagram discovery and output layout.
    pub diagrams: DiagramsConfig,
    /// Light/dark theme configuration.
    pub theme: ThemeConfig,

    /// Directory relative paths are resolved against (set after loading).
    #[serde(skip)]
    pub project_dir: PathBuf,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Renderer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Local binary or remote server.
    pub mode: RenderMode,
    /// Base URL of the rendering server.
    pub server: String,
    /// Skip TLS certificate verification on server calls.
    pub disable_ssl_certificate_validation: bool,
    /// Renderer command line prefix (program plus leading arguments).
    pub bin_path: String,
    /// Output format token (png, svg, pdf, ...).
    pub output_format: String,
    /// Pretty-print SVG output before writing it.
    pub prettify_svg: bool,
    /// Timeout for a single renderer process or server request.
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Server,
            server: "https://www.plantuml.com/plantuml".to_owned(),
            disable_ssl_certificate_validation: false,
            bin_path: "/usr/local/bin/plantuml".to_owned(),
            output_format: "png".to_owned(),
            prettify_svg: false,
            timeout_secs: 30,
        }
    }
}

/// Diagram discovery and output layout.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiagramsConfig {
    /// Diagram root, relative to the project directory.
    pub root: String,
    /// Search the project tree for every directory ending in `root`.
    pub allow_multiple_roots: bool,
    /// Source folder inside each diagram root.
    pub input_folder: String,
    /// Comma-separated list of accepted source suffixes (empty accepts all).
    pub input_extensions: String,
    /// Name of the generated-output folder.
    pub output_folder: String,
    /// Place the output folder inside each source subdirectory.
    pub output_in_dir: bool,
    /// Stop the batch at the first failing diagram.
    pub fail_fast: bool,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            root: "docs/diagrams".to_owned(),
            allow_multiple_roots: false,
            input_folder: "src".to_owned(),
            input_extensions: String::new(),
            output_folder: "out".to_owned(),
            output_in_dir: false,
            fail_fast: false,
        }
    }
}

impl DiagramsConfig {
    /// Accepted source suffixes, trimmed, with empty entries removed.
    #[must_use]
    pub fn extensions(&self) -> Vec<String> {
        self.input_extensions
            .split(',')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

/// Light/dark theme configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Render a dark variant next to every diagram.
    pub enabled: bool,
    /// Folder holding the theme files, relative to a diagram root.
    pub folder: String,
    /// Light theme file name, replaced in include targets on the dark pass.
    pub light: String,
    /// Dark theme file name.
    pub dark: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            folder: "include/themes/".to_owned(),
            light: "light.puml".to_owned(),
            dark: "dark.puml".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`render.server`").
        field: String,
        /// Error message (e.g., "${`PLANTUML_SERVER`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `plantbuild.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values. The merged result is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(mode) = settings.mode {
            self.render.mode = mode;
        }
        if let Some(server) = &settings.server {
            self.render.server.clone_from(server);
        }
        if let Some(bin_path) = &settings.bin_path {
            self.render.bin_path.clone_from(bin_path);
        }
        if let Some(format) = &settings.output_format {
            self.render.output_format.clone_from(format);
        }
        if let Some(fail_fast) = settings.fail_fast {
            self.diagrams.fail_fast = fail_fast;
        }
    }

    /// Absolute path of the single configured diagram root.
    #[must_use]
    pub fn diagram_root_dir(&self) -> PathBuf {
        self.project_dir.join(&self.diagrams.root)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            render: RenderConfig::default(),
            diagrams: DiagramsConfig::default(),
            theme: ThemeConfig::default(),
            project_dir: base.to_path_buf(),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.project_dir = if config_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            config_dir.to_path_buf()
        };
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_render()?;
        self.validate_diagrams()?;
        self.validate_theme()?;
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        let render = &self.render;
        match render.mode {
            RenderMode::Server => {
                require_non_empty(&render.server, "render.server")?;
                require_http_url(&render.server, "render.server")?;
            }
            RenderMode::Local => require_non_empty(&render.bin_path, "render.bin_path")?,
        }

        require_non_empty(&render.output_format, "render.output_format")?;
        if render.output_format.contains('/') {
            return Err(ConfigError::Validation(
                "render.output_format cannot contain '/'".to_owned(),
            ));
        }

        if render.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "render.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.diagrams.root, "diagrams.root")?;
        require_non_empty(&self.diagrams.input_folder, "diagrams.input_folder")?;
        require_non_empty(&self.diagrams.output_folder, "diagrams.output_folder")?;
        Ok(())
    }

    fn validate_theme(&self) -> Result<(), ConfigError> {
        if !self.theme.enabled {
            return Ok(());
        }
        require_non_empty(&self.theme.light, "theme.light")?;
        require_non_empty(&self.theme.dark, "theme.dark")?;
        if self.theme.light == self.theme.dark {
            return Err(ConfigError::Validation(
                "theme.light and theme.dark must differ".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.render.server = expand::expand_env(&self.render.server, "render.server")?;
        self.render.bin_path = expand::expand_env(&self.render.bin_path, "render.bin_path")?;
        Ok(())
    }
}
