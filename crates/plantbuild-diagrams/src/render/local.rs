//! Rendering with a local `PlantUML` executable.

use std::ffi::OsString;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::catalog::Variant;
use crate::consts::PROCESS_POLL_INTERVAL;

use super::{RenderBackend, RenderError, RenderJob, RenderOutcome};

/// Runs the configured executable once per diagram variant.
///
/// The executable writes into a fresh scratch directory; the single file it
/// produces there is the output. When themes are enabled the flattened source
/// is written to a temporary file and rendered instead of the original, since
/// theme substitution only exists in memory.
#[derive(Debug, Clone)]
pub struct LocalRenderer {
    program: String,
    prefix: Vec<String>,
    timeout: Duration,
    render_flattened: bool,
}

impl LocalRenderer {
    /// Create a renderer from a whitespace-separated command line
    /// (`"java -jar plantuml.jar"` or `"/usr/local/bin/plantuml"`).
    pub fn new(
        bin_path: &str,
        timeout: Duration,
        render_flattened: bool,
    ) -> Result<Self, RenderError> {
        let mut parts = bin_path.split_whitespace().map(str::to_owned);
        let program = parts.next().ok_or(RenderError::EmptyCommand)?;
        Ok(Self {
            program,
            prefix: parts.collect(),
            timeout,
            render_flattened,
        })
    }

    fn arguments(&self, job: &RenderJob<'_>, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.prefix.iter().map(OsString::from).collect();
        args.push(format!("-t{}", job.format).into());
        args.push(input.into());
        if job.variant == Variant::Dark {
            args.push("-darkmode".into());
        }
        args.push("-o".into());
        args.push(out_dir.into());
        args
    }

    fn run(&self, args: &[OsString]) -> Result<(), RenderError> {
        let mut stderr_log = tempfile::tempfile()?;
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_log.try_clone()?))
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = wait_with_timeout(&mut child, self.timeout)?;
        if !status.success() {
            let mut stderr = String::new();
            stderr_log.seek(SeekFrom::Start(0))?;
            stderr_log.read_to_string(&mut stderr)?;
            tracing::warn!(
                program = %self.program,
                %status,
                stderr = stderr.trim(),
                "Renderer exited with failure"
            );
        }
        Ok(())
    }
}

impl RenderBackend for LocalRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderOutcome, RenderError> {
        let scratch = tempfile::tempdir()?;

        // Kept alive until the process has finished
        let flattened_file = if self.render_flattened {
            let mut file = tempfile::Builder::new()
                .prefix("plantbuild-")
                .suffix(".puml")
                .tempfile()?;
            file.write_all(job.flattened.as_bytes())?;
            file.flush()?;
            Some(file)
        } else {
            None
        };
        let input = flattened_file
            .as_ref()
            .map_or(job.source_path, tempfile::NamedTempFile::path);

        let args = self.arguments(job, input, scratch.path());
        tracing::debug!(program = %self.program, ?args, "Running local renderer");
        self.run(&args)?;

        let Some(generated) = generated_files(scratch.path())?.into_iter().next() else {
            return Err(RenderError::NoOutput {
                input: job.source_path.to_path_buf(),
            });
        };
        Ok(RenderOutcome::Rendered(fs::read(generated)?))
    }
}

/// Wait for `child`, killing it once `timeout` has passed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RenderError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "Failed to kill timed out renderer");
            }
            child.wait()?;
            return Err(RenderError::Timeout(timeout));
        }
        thread::sleep(PROCESS_POLL_INTERVAL);
    }
}

/// Regular files in `dir`, sorted.
fn generated_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Fake renderer: writes its arguments followed by the input file content.
    const ECHO_SCRIPT: &str = r#"
out=""
fmt=""
input=""
args="$*"
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    -t*) fmt="${1#-t}" ;;
    -darkmode) ;;
    *) input="$1" ;;
  esac
  shift
done
{ echo "$args"; cat "$input"; } > "$out/diagram.$fmt"
"#;

    fn script(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("fake-plantuml.sh");
        fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }

    fn job<'a>(source_path: &'a Path, flattened: &'a str, variant: Variant) -> RenderJob<'a> {
        RenderJob {
            source_path,
            flattened,
            token: "",
            variant,
            format: "svg",
        }
    }

    #[test]
    fn test_empty_command() {
        let err = LocalRenderer::new("   ", Duration::from_secs(1), false).unwrap_err();
        assert!(matches!(err, RenderError::EmptyCommand));
    }

    #[test]
    fn test_command_prefix_split() {
        let renderer =
            LocalRenderer::new("java -jar plantuml.jar", Duration::from_secs(1), false).unwrap();
        assert_eq!(renderer.program, "java");
        assert_eq!(renderer.prefix, vec!["-jar", "plantuml.jar"]);
    }

    #[test]
    fn test_arguments() {
        let renderer =
            LocalRenderer::new("plantuml -charset UTF-8", Duration::from_secs(1), false).unwrap();
        let source = Path::new("/src/a.puml");

        let args = renderer.arguments(&job(source, "", Variant::Dark), source, Path::new("/tmp/x"));

        assert_eq!(
            args,
            vec!["-charset", "UTF-8", "-tsvg", "/src/a.puml", "-darkmode", "-o", "/tmp/x"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_renders_original_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.puml");
        fs::write(&source, "@startuml\nA -> B\n@enduml\n").unwrap();
        let renderer =
            LocalRenderer::new(&script(&dir, ECHO_SCRIPT), Duration::from_secs(10), false)
                .unwrap();

        let outcome = renderer
            .render(&job(&source, "ignored", Variant::Normal))
            .unwrap();

        let RenderOutcome::Rendered(bytes) = outcome else {
            panic!("expected output, got {outcome:?}");
        };
        let text = String::from_utf8(bytes).unwrap();
        let (args, content) = text.split_once('\n').unwrap();
        assert!(args.starts_with("-tsvg "));
        assert!(!args.contains("-darkmode"));
        assert_eq!(content, "@startuml\nA -> B\n@enduml\n");
    }

    #[test]
    fn test_renders_flattened_source_in_dark_mode() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.puml");
        fs::write(&source, "@startuml\n!include light.puml\n@enduml\n").unwrap();
        let renderer =
            LocalRenderer::new(&script(&dir, ECHO_SCRIPT), Duration::from_secs(10), true).unwrap();

        let outcome = renderer
            .render(&job(&source, "@startuml\nskinparam dark\n@enduml\n", Variant::Dark))
            .unwrap();

        let RenderOutcome::Rendered(bytes) = outcome else {
            panic!("expected output, got {outcome:?}");
        };
        let text = String::from_utf8(bytes).unwrap();
        let (args, content) = text.split_once('\n').unwrap();
        assert!(args.contains("-darkmode"));
        assert!(!args.contains(source.to_str().unwrap()));
        assert_eq!(content, "@startuml\nskinparam dark\n@enduml\n");
    }

    #[test]
    fn test_no_output_is_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.puml");
        fs::write(&source, "@startuml\n@enduml\n").unwrap();
        let renderer =
            LocalRenderer::new(&script(&dir, "exit 1\n"), Duration::from_secs(10), false).unwrap();

        let err = renderer
            .render(&job(&source, "", Variant::Normal))
            .unwrap_err();

        assert!(matches!(err, RenderError::NoOutput { input } if input == source));
    }

    #[test]
    fn test_timeout_kills_renderer() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.puml");
        fs::write(&source, "@startuml\n@enduml\n").unwrap();
        let renderer =
            LocalRenderer::new(&script(&dir, "sleep 5\n"), Duration::from_millis(100), false)
                .unwrap();

        let started = Instant::now();
        let err = renderer
            .render(&job(&source, "", Variant::Normal))
            .unwrap_err();

        assert!(matches!(err, RenderError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.puml");
        let renderer =
            LocalRenderer::new("/nonexistent/plantuml", Duration::from_secs(1), false).unwrap();

        let err = renderer
            .render(&job(&source, "", Variant::Normal))
            .unwrap_err();

        assert!(matches!(err, RenderError::Spawn { .. }));
    }
}
