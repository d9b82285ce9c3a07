//! Show command implementation for nbfunc CLI.

use std::path::Path;

use nbfunc_core::{ExportSettings, NotebookExporter};

use crate::colors;

/// Print the generated handler code, optionally followed by the config.
pub fn execute(notebook_path: &str, with_config: bool, settings: ExportSettings) -> anyhow::Result<()> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }

    let settings = ExportSettings {
        no_embed: true,
        code_target_path: None,
        ..settings
    };
    let export = NotebookExporter::new(settings).export_file(path)?;

    print!("{}", export.code);
    if with_config {
        println!("{}---{}", colors::DIM, colors::RESET);
        print!("{}", export.config.to_yaml()?);
    }
    colors::flush_stdout();
    Ok(())
}
