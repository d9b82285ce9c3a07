//! Jupyter notebook (.ipynb) document model.
//!
//! Only the parts the exporter reads are typed; everything else is kept as
//! raw JSON so a notebook survives a read/write cycle untouched.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NotebookError, NotebookResult};

/// Oldest notebook format with a flat `cells` list.
const MIN_NBFORMAT: u32 = 4;

/// A Jupyter notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterNotebook {
    /// Notebook metadata (kernelspec, language_info, ...)
    #[serde(default)]
    pub metadata: Value,

    /// Format version
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,

    /// Minor format version
    #[serde(default)]
    pub nbformat_minor: u32,

    /// Notebook cells
    #[serde(default)]
    pub cells: Vec<JupyterCell>,
}

fn default_nbformat() -> u32 {
    MIN_NBFORMAT
}

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

/// Cell source as stored on disk: either one string or a list of lines
/// (each line keeping its trailing newline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl CellSource {
    /// The source as a single string.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            CellSource::Text(text) => Cow::Borrowed(text),
            CellSource::Lines(lines) => Cow::Owned(lines.concat()),
        }
    }
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

/// Cell metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    /// Tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Anything else the front-end stored.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A Jupyter cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterCell {
    /// Cell type
    pub cell_type: CellKind,

    /// Cell metadata
    #[serde(default)]
    pub metadata: CellMetadata,

    /// Cell source
    #[serde(default)]
    pub source: CellSource,

    /// Cell outputs (for code cells)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,

    /// Execution count (for code cells)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<u32>,
}

impl JupyterCell {
    /// Create a code cell with the given source.
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellKind::Code,
            metadata: CellMetadata::default(),
            source: CellSource::Text(source.into()),
            outputs: Some(Vec::new()),
            execution_count: None,
        }
    }

    /// Create a markdown cell with the given source.
    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellKind::Markdown,
            metadata: CellMetadata::default(),
            source: CellSource::Text(source.into()),
            outputs: None,
            execution_count: None,
        }
    }

    /// Attach tags to the cell.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellKind::Code
    }

    /// The cell source as a single string.
    pub fn source_text(&self) -> Cow<'_, str> {
        self.source.text()
    }

    /// Cell tags (empty if none).
    pub fn tags(&self) -> &[String] {
        self.metadata.tags.as_deref().unwrap_or(&[])
    }
}

impl JupyterNotebook {
    /// Create a new empty notebook.
    pub fn new() -> Self {
        Self {
            metadata: Value::Object(Map::new()),
            nbformat: MIN_NBFORMAT,
            nbformat_minor: 5,
            cells: Vec::new(),
        }
    }

    /// Build a notebook from cells.
    pub fn from_cells(cells: impl IntoIterator<Item = JupyterCell>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
            ..Self::new()
        }
    }

    /// Build a notebook holding one code cell per source string.
    pub fn from_code_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_cells(sources.into_iter().map(JupyterCell::code))
    }

    /// Parse a notebook from its JSON text.
    pub fn from_json(json: &str) -> NotebookResult<Self> {
        let notebook: Self = serde_json::from_str(json)?;
        notebook.validate()?;
        Ok(notebook)
    }

    /// Read a notebook from a file.
    pub fn read_from_file(path: impl AsRef<Path>) -> NotebookResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| NotebookError::ReadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let notebook = Self::from_json(&content)?;
        tracing::debug!(
            "Loaded {} ({} cells, nbformat {}.{})",
            path.display(),
            notebook.cells.len(),
            notebook.nbformat,
            notebook.nbformat_minor
        );
        Ok(notebook)
    }

    /// Write the notebook to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> NotebookResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| NotebookError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Code cells in notebook order.
    pub fn code_cells(&self) -> impl Iterator<Item = &JupyterCell> {
        self.cells.iter().filter(|cell| cell.is_code())
    }

    /// Drop outputs and execution counts from every code cell.
    pub fn clear_outputs(&mut self) {
        for cell in self.cells.iter_mut().filter(|cell| cell.is_code()) {
            cell.outputs = Some(Vec::new());
            cell.execution_count = None;
        }
    }

    fn validate(&self) -> NotebookResult<()> {
        if self.nbformat < MIN_NBFORMAT {
            return Err(NotebookError::InvalidNotebook(format!(
                "nbformat {} is not supported (need {} or later)",
                self.nbformat, MIN_NBFORMAT
            )));
        }
        Ok(())
    }
}

impl Default for JupyterNotebook {
    fn default() -> Self {
        Self::new()
    }
}
