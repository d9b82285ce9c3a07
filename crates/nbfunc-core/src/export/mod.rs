//! Notebook export: scan cells, run directives, assemble handler code.

mod assembler;
mod context;
mod scanner;
mod settings;

pub use assembler::{CodeAssembler, generated_header, strip_header};
pub use context::{BuildContext, ContextOutputs, ToolRequest, ToolRequestKind};
pub use scanner::CellScanner;
pub use settings::{DEFAULT_IGNORED_TAGS, EnvSource, ExportSettings, env_keys, split_tags};

use std::path::{Path, PathBuf};

use nbfunc_ipynb::{JupyterNotebook, load_notebook, notebook_name};
use tracing::info;

use crate::config::{FunctionConfig, normalize_name};
use crate::directive::DirectiveRegistry;
use crate::error::{Error, Result};

/// Result of exporting one notebook.
#[derive(Debug)]
pub struct Export {
    /// Handler source, header included.
    pub code: String,
    pub config: FunctionConfig,
    /// Files requested by `add`/`archive` directives.
    pub extra_files: Vec<PathBuf>,
    pub requests: Vec<ToolRequest>,
    /// Where the code was written when `code_target_path` is set.
    pub code_path: Option<PathBuf>,
}

impl Export {
    /// Handler source without the generated header.
    pub fn body(&self) -> &str {
        strip_header(&self.code)
    }
}

/// Turns notebooks into handler code plus function configuration.
#[derive(Debug, Clone)]
pub struct NotebookExporter {
    registry: DirectiveRegistry,
    settings: ExportSettings,
    env: EnvSource,
    assembler: Option<CodeAssembler>,
}

impl NotebookExporter {
    /// Exporter with the standard directives.
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            registry: DirectiveRegistry::standard(),
            settings,
            env: EnvSource::Process,
            assembler: None,
        }
    }

    pub fn with_registry(mut self, registry: DirectiveRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Use a fixed assembler (and so a fixed header timestamp).
    pub fn with_assembler(mut self, assembler: CodeAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn registry(&self) -> &DirectiveRegistry {
        &self.registry
    }

    /// Handler text and configuration for `notebook`.
    pub fn scan(&self, notebook: &JupyterNotebook) -> Result<(String, FunctionConfig)> {
        let export = self.export(notebook, None)?;
        Ok((export.code, export.config))
    }

    /// Load and export a notebook file; the function is named after the file.
    pub fn export_file(&self, path: &Path) -> Result<Export> {
        if !path.is_file() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        let notebook = load_notebook(path)?;
        self.export(&notebook, Some(&notebook_name(path)))
    }

    pub fn export(&self, notebook: &JupyterNotebook, name: Option<&str>) -> Result<Export> {
        let settings = &self.settings;
        let mut ctx = BuildContext::with_env(settings.clone(), self.env.clone());
        if let Some(name) = name {
            ctx.config.set_name(&normalize_name(name))?;
        }
        ctx.config
            .set_handler(&settings.module_name(), &settings.handler_function())?;

        let fragments = CellScanner::new(&self.registry, settings).scan(notebook, &mut ctx)?;
        ctx.reapply_env_files()?;

        let assembler = self.assembler.clone().unwrap_or_default();
        let code = match &settings.handler_path {
            Some(path) => read_handler(path)?,
            None => assembler.assemble(&fragments),
        };

        let (mut config, outputs) = ctx.finish();
        let code_path = match &settings.code_target_path {
            Some(path) => {
                std::fs::write(path, &code)?;
                info!("wrote handler code to {}", path.display());
                Some(path.clone())
            }
            None => None,
        };
        if settings.embeds_code() {
            config.embed_source(&code)?;
        }

        Ok(Export {
            code,
            config,
            extra_files: outputs.extra_files,
            requests: outputs.requests,
            code_path,
        })
    }
}

fn read_handler(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingFile(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nbfunc_ipynb::JupyterCell;
    use serde_json::json;

    fn exporter(settings: ExportSettings) -> NotebookExporter {
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        NotebookExporter::new(settings)
            .with_env(EnvSource::fixed::<_, &str, &str>([]))
            .with_assembler(CodeAssembler::stamped(&time))
    }

    #[test]
    fn test_env_and_code() {
        let notebook = JupyterNotebook::from_code_sources(["x = 1", "%nuclio env USER=daffy"]);
        let export = exporter(ExportSettings::default())
            .export(&notebook, Some("My Notebook"))
            .unwrap();

        assert_eq!(
            export.config.get("spec.env"),
            Some(&json!([{"name": "USER", "value": "daffy"}]))
        );
        assert!(export.code.contains("x = 1"));
        assert_eq!(export.config.name(), Some("my-notebook"));
        assert_eq!(export.config.embedded_source().unwrap().as_deref(), Some(export.code.as_str()));
    }

    #[test]
    fn test_named_target() {
        let notebook = JupyterNotebook::from_code_sources([
            "a=1",
            "# nuclio: start-code my-fn\nb=2",
            "# nuclio: end-code my-fn\nc=3",
            "d=4",
        ]);
        let settings = ExportSettings {
            target: Some("my-fn".to_string()),
            ..Default::default()
        };
        let export = exporter(settings).export(&notebook, None).unwrap();
        assert_eq!(export.body().trim(), "b=2");
        assert!(export.code.starts_with("# Generated by nbfunc on 2024-01-02 03:04\n"));
    }

    #[test]
    fn test_config_literal() {
        let notebook = JupyterNotebook::from_code_sources(["%nuclio config spec.maxReplicas = 5"]);
        let (_, config) = exporter(ExportSettings::default()).scan(&notebook).unwrap();
        assert_eq!(config.get("spec.maxReplicas"), Some(&json!(5)));
    }

    #[test]
    fn test_handler_settings() {
        let dir = tempfile::tempdir().unwrap();
        let handler = dir.path().join("face.py");
        std::fs::write(&handler, "def lassie(context, event):\n    return 1\n").unwrap();

        let settings = ExportSettings {
            handler_name: Some("lassie".to_string()),
            handler_path: Some(handler),
            ..Default::default()
        };
        let notebook = JupyterNotebook::from_code_sources(["%%nuclio handler greet\n1"]);
        let export = exporter(settings).export(&notebook, None).unwrap();
        assert_eq!(export.config.handler(), ("face".to_string(), "lassie".to_string()));
        assert!(export.code.starts_with("def lassie"));
    }

    #[test]
    fn test_code_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("handler.py");
        let settings = ExportSettings {
            code_target_path: Some(target.clone()),
            ..Default::default()
        };
        let notebook = JupyterNotebook::from_code_sources(["a=1"]);
        let export = exporter(settings).export(&notebook, None).unwrap();

        assert_eq!(export.code_path.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), export.code);
        assert_eq!(export.config.embedded_source().unwrap(), None);
    }

    #[test]
    fn test_no_embed() {
        let settings = ExportSettings {
            no_embed: true,
            ..Default::default()
        };
        let notebook = JupyterNotebook::from_code_sources(["a=1"]);
        let export = exporter(settings).export(&notebook, None).unwrap();
        assert_eq!(export.config.embedded_source().unwrap(), None);
    }

    #[test]
    fn test_env_files_reapplied_last() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("env.txt");
        std::fs::write(&env_file, "USER=from-file\n").unwrap();

        let settings = ExportSettings {
            env_files: vec![env_file, dir.path().join("missing.txt")],
            ..Default::default()
        };
        let notebook = JupyterNotebook::from_code_sources(["%nuclio env USER=daffy"]);
        let export = exporter(settings).export(&notebook, None).unwrap();
        assert_eq!(export.config.env_value("USER"), Some("from-file"));
    }

    #[test]
    fn test_requests_and_extra_files() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path().join("model.bin");
        std::fs::write(&extra, b"\0").unwrap();

        let notebook = JupyterNotebook::from_cells([
            JupyterCell::code(format!("%nuclio add {}", extra.display())),
            JupyterCell::code("%nuclio deploy -p demo"),
        ]);
        let export = exporter(ExportSettings::default())
            .export(&notebook, None)
            .unwrap();
        assert_eq!(export.extra_files, [extra]);
        assert_eq!(export.requests.len(), 1);
        assert_eq!(export.requests[0].kind, ToolRequestKind::Deploy);
    }

    #[test]
    fn test_export_missing_file() {
        let err = exporter(ExportSettings::default())
            .export_file(Path::new("/no/such/notebook.ipynb"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }
}
