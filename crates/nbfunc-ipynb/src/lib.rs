//! Jupyter notebook model for nbfunc.
//!
//! Reads `.ipynb` documents into a typed cell list the exporter can scan.
//!
//! # Architecture
//!
//! ```text
//! notebook.ipynb ─────► JupyterNotebook ─────► code_cells() ─────► exporter
//!                        (cells, tags)
//! ```

mod error;
mod ipynb;

pub use error::{NotebookError, NotebookResult};
pub use ipynb::{CellKind, CellMetadata, CellSource, JupyterCell, JupyterNotebook};

use std::path::Path;

/// Load a notebook, dropping stored outputs.
pub fn load_notebook(path: impl AsRef<Path>) -> NotebookResult<JupyterNotebook> {
    let mut notebook = JupyterNotebook::read_from_file(path)?;
    notebook.clear_outputs();
    Ok(notebook)
}

/// Notebook name derived from its file name (`my_nb.ipynb` → `my_nb`).
pub fn notebook_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notebook_name() {
        assert_eq!(notebook_name("handler.ipynb"), "handler");
        assert_eq!(notebook_name("/path/to/My Notebook.ipynb"), "My Notebook");
    }
}
