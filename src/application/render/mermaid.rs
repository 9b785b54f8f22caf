use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Instant,
};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::{DiagramRenderer, RenderError};

/// Renders diagrams by shelling out to the Mermaid CLI (`mmdc`).
#[derive(Debug, Clone)]
pub struct MermaidCliRenderer {
    cli_path: PathBuf,
}

impl MermaidCliRenderer {
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
        }
    }

    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    /// Run the CLI synchronously. Blocks for as long as `mmdc` takes.
    pub fn render_svg_blocking(&self, source: &str) -> Result<String, RenderError> {
        let started_at = Instant::now();

        let mut input_file = NamedTempFile::new().map_err(RenderError::Io)?;
        input_file
            .write_all(source.as_bytes())
            .map_err(RenderError::Io)?;
        input_file.flush().map_err(RenderError::Io)?;

        let output_file = tempfile::Builder::new()
            .suffix(".svg")
            .tempfile()
            .map_err(RenderError::Io)?;

        let output = Command::new(&self.cli_path)
            .arg("--input")
            .arg(input_file.path())
            .arg("--output")
            .arg(output_file.path())
            .arg("--outputFormat")
            .arg("svg")
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                warn!(
                    target = "application::render::mermaid",
                    op = "mermaid::render_svg",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    cli_path = %self.cli_path.display(),
                    error = %err,
                    "Failed to spawn Mermaid CLI"
                );
                if err.kind() == ErrorKind::NotFound {
                    RenderError::NotFound(err)
                } else {
                    RenderError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "application::render::mermaid",
                op = "mermaid::render_svg",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "mermaid_cli",
                stderr = %stderr,
                "Mermaid CLI invocation failed"
            );
            return Err(RenderError::Cli { exit_code, stderr });
        }

        let svg = fs::read_to_string(output_file.path()).map_err(RenderError::Read)?;

        info!(
            target = "application::render::mermaid",
            op = "mermaid::render_svg",
            result = "rendered",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            svg_bytes = svg.len(),
            "Mermaid diagram rendered via CLI"
        );

        Ok(svg)
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCliRenderer {
    async fn render(&self, source: &str) -> Result<String, RenderError> {
        let renderer = self.clone();
        let source = source.to_owned();
        tokio::task::spawn_blocking(move || renderer.render_svg_blocking(&source))
            .await
            .map_err(|err| RenderError::Join(err.to_string()))?
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn make_executable(path: &Path) {
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("set perms");
    }

    fn fake_cli(dir: &TempDir, body: &str) -> PathBuf {
        let script_path = dir.path().join("fake-mmdc");
        fs::write(&script_path, body).expect("write script");
        make_executable(&script_path);
        script_path
    }

    #[test]
    fn renders_svg_with_valid_cli() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let script = format!(
            r#"#!/bin/sh
set -eu
echo "$@" > "{args_file}"
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output)
      shift
      out="$1"
      ;;
    *)
      shift
      ;;
  esac
done
if [ -z "${{out:-}}" ]; then
  echo "missing --output" >&2
  exit 2
fi
cat <<'SVG' > "$out"
<svg>ok</svg>
SVG
"#,
            args_file = args_path.display()
        );
        let renderer = MermaidCliRenderer::new(fake_cli(&dir, &script));

        let svg = renderer
            .render_svg_blocking("flowchart LR\n  A --> B")
            .expect("svg rendered");
        assert!(svg.contains("<svg>ok</svg>"), "unexpected svg output: {svg}");

        let args = fs::read_to_string(&args_path).expect("read args");
        assert!(args.contains("--outputFormat svg"), "CLI args: {args}");
        assert!(args.contains("--quiet"), "CLI args: {args}");
    }

    #[test]
    fn surfaces_cli_errors() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = MermaidCliRenderer::new(fake_cli(
            &dir,
            r#"#!/bin/sh
echo "Parse error on line 2" >&2
exit 42
"#,
        ));

        let err = renderer
            .render_svg_blocking("flowchart LR\n  A -->")
            .expect_err("expected cli failure");
        match err {
            RenderError::Cli { exit_code, stderr } => {
                assert_eq!(exit_code, Some(42));
                assert!(stderr.contains("Parse error"), "stderr: {stderr}");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_cli_is_reported_as_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = MermaidCliRenderer::new(dir.path().join("no-such-mmdc"));

        let err = renderer
            .render("flowchart LR\n  A --> B")
            .await
            .expect_err("missing binary");
        assert!(matches!(err, RenderError::NotFound(_)), "got {err:?}");
    }
}
