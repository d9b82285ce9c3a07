//! Integration tests for loading notebooks from disk.

use std::fs;

use nbfunc_ipynb::{JupyterCell, JupyterNotebook, NotebookError, load_notebook, notebook_name};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

#[test]
fn test_write_then_load_keeps_cells() {
    let temp = temp_dir();
    let path = temp.path().join("hello.ipynb");

    let notebook = JupyterNotebook::from_cells([
        JupyterCell::markdown("# Hello"),
        JupyterCell::code("x = 1"),
        JupyterCell::code("print(x)").with_tags(["nuclio-ignore"]),
    ]);
    notebook.write_to_file(&path).unwrap();

    let loaded = load_notebook(&path).unwrap();
    assert_eq!(loaded.cells.len(), 3);
    let code: Vec<_> = loaded.code_cells().map(|c| c.source_text().into_owned()).collect();
    assert_eq!(code, vec!["x = 1", "print(x)"]);
    assert_eq!(loaded.cells[2].tags(), ["nuclio-ignore".to_string()]);
    assert_eq!(notebook_name(&path), "hello");
}

#[test]
fn test_load_drops_outputs() {
    let temp = temp_dir();
    let path = temp.path().join("outputs.ipynb");
    fs::write(
        &path,
        r#"{
  "nbformat": 4,
  "nbformat_minor": 2,
  "metadata": {"kernelspec": {"name": "python3"}},
  "cells": [
    {
      "cell_type": "code",
      "execution_count": 7,
      "metadata": {},
      "outputs": [{"output_type": "stream", "name": "stdout", "text": ["hi\n"]}],
      "source": ["print('hi')"]
    }
  ]
}"#,
    )
    .unwrap();

    let loaded = load_notebook(&path).unwrap();
    assert!(loaded.cells[0].outputs.as_ref().unwrap().is_empty());
    assert!(loaded.cells[0].execution_count.is_none());
}

#[test]
fn test_missing_file() {
    let temp = temp_dir();
    let err = load_notebook(temp.path().join("nope.ipynb")).unwrap_err();
    assert!(matches!(err, NotebookError::ReadError { .. }));
}

#[test]
fn test_malformed_json() {
    let temp = temp_dir();
    let path = temp.path().join("bad.ipynb");
    fs::write(&path, "{ not json").unwrap();
    let err = load_notebook(&path).unwrap_err();
    assert!(matches!(err, NotebookError::JsonError(_)));
}
