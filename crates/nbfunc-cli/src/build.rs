//! Build command implementation for nbfunc CLI.
//!
//! Prints the built function.yaml, or writes the artifacts to a directory.

use std::path::{Path, PathBuf};

use nbfunc_core::config::{HttpTrigger, parse_literal};
use nbfunc_core::directive::{parse_env_line, parse_mount};
use nbfunc_core::{BuildOptions, ConfigSpec, ExportSettings, build_file};
use serde_json::Value;

use crate::colors;

/// Command line inputs of `nbfunc build`.
pub struct BuildRequest {
    pub name: Option<String>,
    pub handler: Option<String>,
    pub tag: Option<String>,
    pub project: Option<String>,
    pub output: Option<PathBuf>,
    pub env: Vec<String>,
    pub config: Vec<String>,
    pub commands: Vec<String>,
    pub files: Vec<PathBuf>,
    /// Mount lines in `%nuclio mount` syntax.
    pub mounts: Vec<String>,
    pub http_port: Option<u16>,
    pub settings: ExportSettings,
}

/// Execute the build command.
pub fn execute(source: &str, request: BuildRequest) -> anyhow::Result<()> {
    let path = Path::new(source);
    if !path.exists() {
        anyhow::bail!("Source not found: {}", source);
    }

    let mut spec = ConfigSpec::new();
    for line in &request.env {
        let Some((name, value)) = parse_env_line(line) else {
            anyhow::bail!("Bad --env value {:?} (expected KEY=VALUE)", line);
        };
        spec = spec.set_env(name, value);
    }
    for line in &request.config {
        let Some((key, raw)) = line.split_once('=') else {
            anyhow::bail!("Bad --config value {:?} (expected path=value)", line);
        };
        spec = spec.set_config(key.trim(), config_value(raw.trim()));
    }
    for command in request.commands {
        spec = spec.add_command(command);
    }
    for line in &request.mounts {
        spec = spec.add_volume(parse_mount(line)?);
    }
    if let Some(port) = request.http_port {
        spec = spec.add_trigger("http", HttpTrigger::default().with_port(port));
    }

    let options = BuildOptions {
        name: request.name,
        handler: request.handler,
        tag: request.tag,
        project: request.project,
        spec,
        files: request.files,
        output_dir: request.output.clone(),
        settings: request.settings,
        ..Default::default()
    };
    let output = build_file(path, &options)?;

    match &request.output {
        Some(dir) => {
            println!(
                "\n{}nbfunc build{} - {} → {}",
                colors::BOLD,
                colors::RESET,
                path.display(),
                dir.display()
            );
            println!(
                "  {}✓{} function {}",
                colors::GREEN,
                colors::RESET,
                output.name
            );
        }
        None => print!("{}", output.config.to_yaml()?),
    }
    for request in &output.requests {
        eprintln!(
            "{}note:{} notebook requests `{} {}` (not run by build)",
            colors::YELLOW,
            colors::RESET,
            request.kind,
            request.args
        );
    }
    Ok(())
}

/// A literal when it parses as one, otherwise the raw text.
fn config_value(raw: &str) -> Value {
    parse_literal(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_value() {
        assert_eq!(config_value("5"), json!(5));
        assert_eq!(config_value("\"quoted\""), json!("quoted"));
        assert_eq!(config_value("python:3.9"), json!("python:3.9"));
    }
}
