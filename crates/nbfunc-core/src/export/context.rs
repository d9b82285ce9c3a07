//! Per-export mutable state threaded through directive handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::settings::{EnvSource, ExportSettings};
use crate::config::{DEFAULT_FUNCTION, EnvValue, FunctionConfig};
use crate::directive::{expand_vars, parse_env_line};
use crate::error::{Error, Result};

/// Tool actions requested from inside a notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRequestKind {
    Deploy,
    Build,
    Export,
    Show,
    Help,
}

impl fmt::Display for ToolRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolRequestKind::Deploy => "deploy",
            ToolRequestKind::Build => "build",
            ToolRequestKind::Export => "export",
            ToolRequestKind::Show => "show",
            ToolRequestKind::Help => "help",
        };
        f.write_str(name)
    }
}

/// A `deploy`/`build`/`export`/`show`/`help` directive, left for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub kind: ToolRequestKind,
    pub args: String,
}

/// State of one export: the configuration being built plus everything the
/// directives accumulate on the side.
#[derive(Debug)]
pub struct BuildContext {
    pub config: FunctionConfig,
    settings: ExportSettings,
    env: EnvSource,
    verbose: bool,
    /// Values set by `env` directives; shadows `env` for expansion.
    local_env: BTreeMap<String, String>,
    env_files: Vec<PathBuf>,
    extra_files: Vec<PathBuf>,
    handlers_emitted: usize,
    requests: Vec<ToolRequest>,
}

/// What a finished context hands back besides the configuration.
#[derive(Debug, Default)]
pub struct ContextOutputs {
    pub extra_files: Vec<PathBuf>,
    pub requests: Vec<ToolRequest>,
    pub env_files: Vec<PathBuf>,
}

impl BuildContext {
    pub fn new(settings: ExportSettings) -> Self {
        Self::with_env(settings, EnvSource::Process)
    }

    pub fn with_env(settings: ExportSettings, env: EnvSource) -> Self {
        Self {
            config: FunctionConfig::new(),
            verbose: settings.verbose,
            settings,
            env,
            local_env: BTreeMap::new(),
            env_files: Vec::new(),
            extra_files: Vec::new(),
            handlers_emitted: 0,
            requests: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Flip verbosity; returns the new state.
    pub fn toggle_verbose(&mut self) -> bool {
        self.verbose = !self.verbose;
        self.verbose
    }

    /// Progress message: `info!` when verbose, `debug!` otherwise.
    pub fn note(&self, message: impl fmt::Display) {
        if self.verbose {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }

    /// Overlay first, then the environment source.
    pub fn lookup_env(&self, name: &str) -> Option<String> {
        self.local_env
            .get(name)
            .cloned()
            .or_else(|| self.env.get(name))
    }

    /// Expand `$VAR`/`${VAR}` against [`Self::lookup_env`].
    pub fn expand(&self, text: &str) -> String {
        expand_vars(text, |name| self.lookup_env(name))
    }

    pub fn local_env(&self) -> &BTreeMap<String, String> {
        &self.local_env
    }

    pub fn set_local_env(&mut self, name: &str, value: &str) {
        self.local_env.insert(name.to_string(), value.to_string());
    }

    /// Next auto-generated handler name: `handler`, `handler_1`, ...
    pub fn next_handler_name(&mut self) -> String {
        let name = match self.handlers_emitted {
            0 => DEFAULT_FUNCTION.to_string(),
            n => format!("{DEFAULT_FUNCTION}_{n}"),
        };
        self.handlers_emitted += 1;
        name
    }

    /// Parse an env file and set every entry in the configuration.
    ///
    /// All lines are parsed before any entry is applied.
    pub fn apply_env_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::MissingFile(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let mut entries = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = parse_env_line(line).ok_or_else(|| Error::EnvParse {
                line: line.to_string(),
                origin: Some(path.to_path_buf()),
            })?;
            entries.push((name, value));
        }

        for (name, value) in &entries {
            self.config.set_env(name, EnvValue::Value(value.clone()))?;
        }
        self.note(format_args!(
            "applied {} env entries from {}",
            entries.len(),
            path.display()
        ));
        Ok(())
    }

    /// Remember an env file for re-application at finalization.
    pub fn remember_env_file(&mut self, path: &Path) {
        if !self.env_files.iter().any(|p| p == path) {
            self.env_files.push(path.to_path_buf());
        }
    }

    /// Re-apply remembered env files, then the ones from the settings.
    /// Missing files are skipped with a warning.
    pub fn reapply_env_files(&mut self) -> Result<()> {
        let mut files = self.env_files.clone();
        for path in &self.settings.env_files {
            if !files.contains(path) {
                files.push(path.clone());
            }
        }
        for path in files {
            if !path.is_file() {
                warn!("env file {} not found, skipping", path.display());
                continue;
            }
            self.apply_env_file(&path)?;
        }
        Ok(())
    }

    pub fn add_extra_file(&mut self, path: PathBuf) {
        if !self.extra_files.contains(&path) {
            self.extra_files.push(path);
        }
    }

    pub fn extra_files(&self) -> &[PathBuf] {
        &self.extra_files
    }

    pub fn request(&mut self, kind: ToolRequestKind, args: &str) {
        self.note(format_args!("tool request: {kind} {args}"));
        self.requests.push(ToolRequest {
            kind,
            args: args.to_string(),
        });
    }

    pub fn requests(&self) -> &[ToolRequest] {
        &self.requests
    }

    /// Tear down into the configuration and the side outputs.
    pub fn finish(self) -> (FunctionConfig, ContextOutputs) {
        (
            self.config,
            ContextOutputs {
                extra_files: self.extra_files,
                requests: self.requests,
                env_files: self.env_files,
            },
        )
    }
}
