//! Environment-driven export settings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_FUNCTION, DEFAULT_MODULE};
use crate::error::Result;

/// Environment variables read by the exporter.
pub mod env_keys {
    pub const FUNCTION_NAME: &str = "NUCLIO_FUNCTION_NAME";
    pub const HANDLER_NAME: &str = "NUCLIO_HANDLER_NAME";
    pub const HANDLER_PATH: &str = "NUCLIO_HANDLER_PATH";
    pub const IGNORED_TAGS: &str = "NUCLIO_IGNORED_TAGS";
    pub const NO_EMBED_CODE: &str = "NUCLIO_NO_EMBED_CODE";
    pub const CODE_TARGET_PATH: &str = "NUCLIO_CODE_TARGET_PATH";
    pub const ENV_FILES: &str = "NUCLIO_ENV_FILES";
    pub const VERBOSE: &str = "NUCLIO_VERBOSE";
    pub const EXEC_COMMANDS: &str = "NUCLIO_EXEC_COMMANDS";
}

/// Cell tags that are always ignored.
pub const DEFAULT_IGNORED_TAGS: &[&str] = &["nuclio-ignore"];

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(BTreeMap<String, String>),
}

impl EnvSource {
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        EnvSource::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(key).ok(),
            EnvSource::Fixed(vars) => vars.get(key).cloned(),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no"))
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }
}

/// Settings for one export invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSettings {
    /// Named code region to emit (`# nuclio: start-code <target>`).
    pub target: Option<String>,
    /// Function part of `spec.handler`; pins it against `handler` directives.
    pub handler_name: Option<String>,
    /// Use this file as the handler code instead of the notebook.
    pub handler_path: Option<PathBuf>,
    /// Extra ignored tags (the defaults always apply).
    pub ignored_tags: Vec<String>,
    /// Do not embed the handler source in the configuration. Set whenever
    /// `NUCLIO_NO_EMBED_CODE` is present, whatever its value.
    pub no_embed: bool,
    /// Write the handler source here instead of embedding it.
    pub code_target_path: Option<PathBuf>,
    /// Env files re-applied when the export is finalized.
    pub env_files: Vec<PathBuf>,
    pub verbose: bool,
    /// Run `cmd` directive lines locally while exporting.
    pub exec_commands: bool,
}

impl ExportSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::Process)
    }

    pub fn from_source(env: &EnvSource) -> Result<Self> {
        let env_files = match env.non_empty(env_keys::ENV_FILES) {
            Some(raw) => serde_json::from_str::<Vec<PathBuf>>(&raw)?,
            None => Vec::new(),
        };
        let ignored_tags = env
            .get(env_keys::IGNORED_TAGS)
            .map(|raw| split_tags(&raw))
            .unwrap_or_default();

        Ok(Self {
            target: env.non_empty(env_keys::FUNCTION_NAME),
            handler_name: env.non_empty(env_keys::HANDLER_NAME),
            handler_path: env.non_empty(env_keys::HANDLER_PATH).map(PathBuf::from),
            ignored_tags,
            no_embed: env.get(env_keys::NO_EMBED_CODE).is_some(),
            code_target_path: env.non_empty(env_keys::CODE_TARGET_PATH).map(PathBuf::from),
            env_files,
            verbose: env.flag(env_keys::VERBOSE),
            exec_commands: env.flag(env_keys::EXEC_COMMANDS),
        })
    }

    /// Defaults plus the configured extra tags.
    pub fn all_ignored_tags(&self) -> BTreeSet<String> {
        DEFAULT_IGNORED_TAGS
            .iter()
            .map(|tag| tag.to_string())
            .chain(self.ignored_tags.iter().cloned())
            .collect()
    }

    /// Module part of `spec.handler`.
    pub fn module_name(&self) -> String {
        self.handler_path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_MODULE.to_string())
    }

    /// Function part of `spec.handler`.
    pub fn handler_function(&self) -> String {
        self.handler_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FUNCTION.to_string())
    }

    /// Whether the handler source is embedded in the configuration.
    pub fn embeds_code(&self) -> bool {
        !self.no_embed && self.code_target_path.is_none()
    }
}

/// Comma separated tag list; blanks dropped.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
