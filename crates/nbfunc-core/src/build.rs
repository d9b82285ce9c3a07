//! Build a function configuration from a notebook, a code file or an
//! existing configuration document.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{ConfigSpec, FunctionConfig, meta_keys, normalize_name};
use crate::error::{Error, Result};
use crate::export::{EnvSource, ExportSettings, NotebookExporter, ToolRequest};

/// Name of the configuration file written to an output directory.
pub const CONFIG_FILE: &str = "function.yaml";

const RUNTIMES: &[(&str, &str)] = &[
    (".py", "python"),
    (".go", "golang"),
    (".js", "nodejs"),
    (".java", "java"),
    (".sh", "shell"),
];

/// Runtime for a source file extension (`.py` -> `python`).
pub fn runtime_for_extension(ext: &str) -> Option<&'static str> {
    RUNTIMES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, runtime)| *runtime)
}

/// Source extension for a runtime; versioned runtimes (`python:3.9`) match
/// on their prefix. Unknown runtimes map to `.py`.
pub fn extension_for_runtime(runtime: &str) -> &'static str {
    RUNTIMES
        .iter()
        .find(|(_, r)| runtime.starts_with(r))
        .map_or(".py", |(ext, _)| *ext)
}

/// Options for [`build_file`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Function name; defaults to the source file stem.
    pub name: Option<String>,
    /// Function part of `spec.handler`.
    pub handler: Option<String>,
    /// Value of the `nuclio.io/tag` label.
    pub tag: Option<String>,
    /// Value of the `nuclio.io/project-name` label.
    pub project: Option<String>,
    /// Overrides merged after the source is read.
    pub spec: ConfigSpec,
    /// Extra files shipped next to the handler.
    pub files: Vec<PathBuf>,
    /// Write the artifacts here instead of embedding the code.
    pub output_dir: Option<PathBuf>,
    /// Settings for notebook sources.
    pub settings: ExportSettings,
    pub env: EnvSource,
}

/// A built function.
#[derive(Debug)]
pub struct BuildOutput {
    pub name: String,
    pub config: FunctionConfig,
    pub code: String,
    /// `<stem><ext>`: the handler file name in an output directory.
    pub code_file: String,
    pub files: Vec<PathBuf>,
    pub requests: Vec<ToolRequest>,
    source: PathBuf,
}

impl BuildOutput {
    /// Write `function.yaml`, the handler file and the extra files into
    /// `dir`. Returns the written paths.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let config_path = dir.join(CONFIG_FILE);
        self.config.write_yaml(&config_path, None)?;
        written.push(config_path);

        if !self.code.is_empty() {
            let code_path = dir.join(&self.code_file);
            if !same_file(&code_path, &self.source) {
                std::fs::write(&code_path, &self.code)?;
                written.push(code_path);
            }
        }

        for file in &self.files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let target = dir.join(file_name);
            if same_file(&target, file) {
                continue;
            }
            std::fs::copy(file, &target)?;
            written.push(target);
        }

        for path in &written {
            info!("wrote {}", path.display());
        }
        Ok(written)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Build a function from `path` (`.ipynb`, a code file or `.yaml`).
///
/// Extra files or an output directory disable code embedding. With an
/// output directory the artifacts are also written there.
pub fn build_file(path: &Path, options: &BuildOptions) -> Result<BuildOutput> {
    if !path.is_file() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    let embed = options.files.is_empty() && options.output_dir.is_none();

    let mut files = options.files.clone();
    let mut requests = Vec::new();
    let is_document = matches!(ext.as_str(), ".yaml" | ".yml");

    let (mut config, code, code_ext) = match ext.as_str() {
        ".ipynb" => {
            let settings = ExportSettings {
                no_embed: true,
                ..options.settings.clone()
            };
            let export = NotebookExporter::new(settings)
                .with_env(options.env.clone())
                .export_file(path)?;
            files.extend(export.extra_files);
            requests = export.requests;
            (export.config, export.code, ".py")
        }
        ".yaml" | ".yml" => {
            let config = FunctionConfig::from_yaml(&std::fs::read_to_string(path)?)?;
            let code = config.embedded_source()?.unwrap_or_default();
            let code_ext = extension_for_runtime(config.runtime().unwrap_or_default());
            (config, code, code_ext)
        }
        other => {
            let runtime = runtime_for_extension(other).ok_or_else(|| {
                Error::UnsupportedSource(format!(
                    "{} (expected .ipynb, .yaml or one of {})",
                    path.display(),
                    RUNTIMES.iter().map(|(e, _)| *e).collect::<Vec<_>>().join(", ")
                ))
            })?;
            let code = std::fs::read_to_string(path)?;
            let mut config = FunctionConfig::new();
            config.set_runtime(runtime)?;
            (config, code, other)
        }
    };
    let code_ext = code_ext.to_string();

    let name = match (&options.name, is_document) {
        (Some(name), _) => normalize_name(name),
        (None, true) => config
            .name()
            .map(normalize_name)
            .unwrap_or_else(|| normalize_name(&stem)),
        (None, false) => normalize_name(&stem),
    };
    config.set_name(&name)?;

    options.spec.merge(&mut config)?;
    if let Some(tag) = &options.tag {
        config.set_label(meta_keys::TAG, tag)?;
    }
    if let Some(project) = &options.project {
        config.set_label(meta_keys::PROJECT, project)?;
    }
    config.set_annotation(
        meta_keys::GENERATED_BY,
        &format!("nbfunc from {}", path.display()),
    )?;

    if is_document {
        if let Some(handler) = &options.handler {
            config.set_handler_function(handler)?;
        }
    } else {
        let module = if code_ext == ".sh" {
            format!("{stem}.sh")
        } else {
            stem.clone()
        };
        let function = options
            .handler
            .clone()
            .unwrap_or_else(|| config.handler().1);
        config.set_handler(&module, &function)?;
    }

    if embed {
        if !code.is_empty() {
            config.embed_source(&code)?;
        }
    } else {
        config.clear_embedded_source();
        if !files.is_empty() {
            let names = files
                .iter()
                .filter_map(|f| f.file_name())
                .map(|f| f.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(",");
            config.set_annotation(meta_keys::EXTRA_FILES, &names)?;
        }
    }
    debug!("built function {name} from {}", path.display());

    let output = BuildOutput {
        name,
        config,
        code,
        code_file: format!("{stem}{code_ext}"),
        files,
        requests,
        source: path.to_path_buf(),
    };
    if let Some(dir) = &options.output_dir {
        output.write_to_dir(dir)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_mapping() {
        assert_eq!(runtime_for_extension(".go"), Some("golang"));
        assert_eq!(runtime_for_extension(".rb"), None);
        assert_eq!(extension_for_runtime("python:3.9"), ".py");
        assert_eq!(extension_for_runtime("nodejs"), ".js");
        assert_eq!(extension_for_runtime(""), ".py");
    }

    #[test]
    fn test_unsupported_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.rb");
        std::fs::write(&path, "puts 1").unwrap();
        let err = build_file(&path, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(_)));
    }

    #[test]
    fn test_missing_source() {
        let err = build_file(Path::new("/no/such/file.py"), &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }
}
