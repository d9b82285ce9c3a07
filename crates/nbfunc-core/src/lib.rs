//! Turns Jupyter notebooks into nuclio serverless functions.
//!
//! This crate provides:
//! - Function configuration document with dotted-path addressing
//! - `%nuclio` directive parsing and the standard directive handlers
//! - The cell scanner that selects handler code (`start-code`/`end-code`)
//! - Code assembly, source embedding and the file build pipeline
//!
//! # Architecture
//!
//! ```text
//! JupyterNotebook ──► CellScanner ──► fragments ──► CodeAssembler ──► handler code
//!                         │
//!                         └─► DirectiveRegistry ──► BuildContext ──► FunctionConfig
//! ```

pub mod build;
pub mod config;
pub mod directive;
pub mod error;
pub mod export;

pub use build::{BuildOptions, BuildOutput, build_file};
pub use config::{ConfigFragment, ConfigSpec, FunctionConfig, KeyPath, Volume, VolumeKind};
pub use directive::{Directive, DirectiveRegistry, DirectiveSpec};
pub use error::{Error, Result};
pub use export::{
    BuildContext, CellScanner, CodeAssembler, EnvSource, Export, ExportSettings,
    NotebookExporter, ToolRequest, ToolRequestKind,
};
