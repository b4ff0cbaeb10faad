//! Mapping from loaded configuration to diagram pipeline settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use plantbuild_config::{Config, RenderMode};
use plantbuild_diagrams::catalog::discover_roots;
use plantbuild_diagrams::{
    BuildOptions, CatalogOptions, HttpServer, LocalRenderer, RenderBackend, ServerRenderer,
    ThemeOptions, ThemeSubstitution,
};

use crate::error::CliError;

pub(crate) fn catalog_options(config: &Config) -> CatalogOptions {
    CatalogOptions {
        project_dir: config.project_dir.clone(),
        diagram_root: config.diagrams.root.clone(),
        allow_multiple_roots: config.diagrams.allow_multiple_roots,
        input_folder: config.diagrams.input_folder.clone(),
        input_extensions: config.diagrams.extensions(),
        output_folder: config.diagrams.output_folder.clone(),
        output_in_dir: config.diagrams.output_in_dir,
        output_format: config.render.output_format.clone(),
    }
}

pub(crate) fn theme_substitution(config: &Config) -> ThemeSubstitution {
    ThemeSubstitution {
        light: config.theme.light.clone(),
        dark: config.theme.dark.clone(),
    }
}

pub(crate) fn build_options(config: &Config) -> BuildOptions {
    let theme = config.theme.enabled.then(|| ThemeOptions {
        folder: config.theme.folder.clone(),
        substitution: theme_substitution(config),
    });

    BuildOptions {
        catalog: catalog_options(config),
        theme,
        prettify_svg: config.render.prettify_svg,
        fail_fast: config.diagrams.fail_fast,
    }
}

/// Create the render backend selected by `render.mode`.
pub(crate) fn render_backend(config: &Config) -> Result<Box<dyn RenderBackend>, CliError> {
    let timeout = Duration::from_secs(config.render.timeout_secs);
    let backend: Box<dyn RenderBackend> = match config.render.mode {
        RenderMode::Local => Box::new(LocalRenderer::new(
            &config.render.bin_path,
            timeout,
            config.theme.enabled,
        )?),
        RenderMode::Server => {
            let server = HttpServer::new(
                timeout,
                config.render.disable_ssl_certificate_validation,
            );
            Box::new(ServerRenderer::new(server, &config.render.server))
        }
    };
    Ok(backend)
}

/// Diagram root a source file belongs to.
///
/// Falls back to the configured single root when the file is outside every
/// discovered root.
pub(crate) fn root_for(config: &Config, file: &Path) -> PathBuf {
    let file = canonical(file);
    discover_roots(&catalog_options(config))
        .into_iter()
        .map(|root| root.root_dir)
        .find(|root_dir| file.starts_with(canonical(root_dir)))
        .unwrap_or_else(|| config.diagram_root_dir())
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn load(dir: &TempDir, toml: &str) -> Config {
        let path = dir.path().join("plantbuild.toml");
        fs::write(&path, toml).unwrap();
        Config::load(Some(path.as_path()), None).unwrap()
    }

    #[test]
    fn test_build_options_from_config() {
        let dir = TempDir::new().unwrap();
        let config = load(
            &dir,
            r#"
[render]
output_format = "svg"
prettify_svg = true

[diagrams]
root = "docs/uml"
input_extensions = ".puml, .iuml"
output_in_dir = true
fail_fast = true

[theme]
enabled = true
dark = "night.puml"
"#,
        );

        let options = build_options(&config);

        assert_eq!(options.catalog.project_dir, dir.path());
        assert_eq!(options.catalog.diagram_root, "docs/uml");
        assert_eq!(options.catalog.input_extensions, vec![".puml", ".iuml"]);
        assert_eq!(options.catalog.output_format, "svg");
        assert!(options.catalog.output_in_dir);
        assert!(options.prettify_svg);
        assert!(options.fail_fast);
        let theme = options.theme.unwrap();
        assert_eq!(theme.folder, "include/themes/");
        assert_eq!(theme.substitution.light, "light.puml");
        assert_eq!(theme.substitution.dark, "night.puml");
    }

    #[test]
    fn test_themes_disabled_by_default() {
        let dir = TempDir::new().unwrap();
        let config = load(&dir, "");
        assert!(build_options(&config).theme.is_none());
    }

    #[test]
    fn test_root_for_multiple_roots() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("service/docs/diagrams");
        fs::create_dir_all(nested.join("src")).unwrap();
        fs::write(nested.join("src/a.puml"), "@startuml\n@enduml\n").unwrap();
        let config = load(&dir, "[diagrams]\nallow_multiple_roots = true\n");

        assert_eq!(
            canonical(&root_for(&config, &nested.join("src/a.puml"))),
            canonical(&nested)
        );
    }

    #[test]
    fn test_root_for_falls_back_to_configured_root() {
        let dir = TempDir::new().unwrap();
        let config = load(&dir, "");
        assert_eq!(
            root_for(&config, Path::new("/elsewhere/a.puml")),
            dir.path().join("docs/diagrams")
        );
    }

    #[test]
    fn test_local_backend_rejects_empty_command() {
        let dir = TempDir::new().unwrap();
        let mut config = load(&dir, "");
        config.render.mode = RenderMode::Local;
        config.render.bin_path = " ".to_owned();
        assert!(render_backend(&config).is_err());
    }
}
