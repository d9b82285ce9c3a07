//! Export command implementation for nbfunc CLI.
//!
//! Writes function.yaml (and the handler when it is not embedded).

use std::fs;
use std::path::Path;

use nbfunc_core::build::CONFIG_FILE;
use nbfunc_core::{ExportSettings, NotebookExporter};

use crate::colors;

/// Execute the export command.
pub fn execute(notebook_path: &str, output_dir: &Path, settings: ExportSettings) -> anyhow::Result<()> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }

    let embeds = settings.embeds_code();
    let export = NotebookExporter::new(settings).export_file(path)?;

    fs::create_dir_all(output_dir)?;
    let config_path = output_dir.join(CONFIG_FILE);
    export.config.write_yaml(&config_path, None)?;
    let mut written = vec![config_path];

    if !embeds && export.code_path.is_none() {
        let (module, _) = export.config.handler();
        let code_path = output_dir.join(format!("{module}.py"));
        fs::write(&code_path, &export.code)?;
        written.push(code_path);
    }
    if let Some(code_path) = &export.code_path {
        written.push(code_path.clone());
    }

    println!(
        "\n{}nbfunc export{} - {}",
        colors::BOLD,
        colors::RESET,
        path.display()
    );
    for file in &written {
        println!("  {}✓{} {}", colors::GREEN, colors::RESET, file.display());
    }
    for file in &export.extra_files {
        println!("  {}+{} {}", colors::CYAN, colors::RESET, file.display());
    }
    for request in &export.requests {
        println!(
            "  {}note:{} notebook requests `{} {}` (not run by export)",
            colors::YELLOW,
            colors::RESET,
            request.kind,
            request.args
        );
    }

    Ok(())
}
