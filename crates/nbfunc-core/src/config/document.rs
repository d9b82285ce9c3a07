//! The function configuration document (`function.yaml`).

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use super::path_tree::{KeyPath, get_in, update_in};
use crate::error::{Error, Result};

pub const API_VERSION: &str = "nuclio.io/v1";
pub const DEFAULT_MODULE: &str = "handler";
pub const DEFAULT_FUNCTION: &str = "handler";

/// Well-known metadata keys.
pub mod meta_keys {
    pub const PROJECT: &str = "nuclio.io/project-name";
    pub const TAG: &str = "nuclio.io/tag";
    pub const EXTRA_FILES: &str = "nuclio.io/extra_files";
    pub const GENERATED_BY: &str = "nuclio.io/generated_by";
}

const SOURCE_CODE_PATH: &str = "spec.build.functionSourceCode";

/// Value of an environment variable entry in `spec.env`.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    /// Literal value.
    Value(String),
    /// Reference to an external source (e.g. `secretKeyRef`).
    ValueFrom(Value),
}

/// Structured function descriptor: `apiVersion`/`kind`/`metadata`/`spec`.
///
/// Backed by an ordered JSON tree so arbitrary `config` directives can
/// address any path, while the accessors below keep the invariants
/// (`spec.handler` is `module:function`, env names are unique).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionConfig {
    root: Value,
}

impl FunctionConfig {
    /// A fresh document from the default template.
    pub fn new() -> Self {
        let root = json!({
            "apiVersion": API_VERSION,
            "kind": "Function",
            "metadata": {
                "name": "notebook",
                "labels": {},
                "annotations": {},
            },
            "spec": {
                "runtime": "python",
                "handler": format!("{DEFAULT_MODULE}:{DEFAULT_FUNCTION}"),
                "env": [],
                "volumes": [],
                "build": {
                    "commands": [],
                    "noBaseImagesPull": true,
                },
            },
        });
        Self { root }
    }

    /// Wrap an existing document tree.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(Error::UnsupportedSource(
                "function configuration must be a mapping".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// Parse a serialized (YAML or JSON) document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(text)?;
        Self::from_value(root)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn get(&self, path: impl Into<KeyPath>) -> Option<&Value> {
        get_in(&self.root, path)
    }

    /// Overwrite the value at `path`.
    pub fn set(&mut self, path: impl Into<KeyPath>, value: Value) -> Result<()> {
        update_in(&mut self.root, path, value, false)
    }

    /// Append to the list at `path`.
    pub fn append(&mut self, path: impl Into<KeyPath>, value: Value) -> Result<()> {
        update_in(&mut self.root, path, value, true)
    }

    /// Remove the value at `path`, returning it.
    pub fn remove(&mut self, path: impl Into<KeyPath>) -> Option<Value> {
        let path = path.into();
        let (last, parents) = path.segments().split_last()?;
        let mut node = &mut self.root;
        for key in parents {
            node = node.as_object_mut()?.get_mut(key)?;
        }
        node.as_object_mut()?.shift_remove(last)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("metadata.name").and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.set("metadata.name", Value::String(name.to_string()))
    }

    pub fn runtime(&self) -> Option<&str> {
        self.get("spec.runtime").and_then(Value::as_str)
    }

    pub fn set_runtime(&mut self, runtime: &str) -> Result<()> {
        self.set("spec.runtime", Value::String(runtime.to_string()))
    }

    /// `spec.handler` split into `(module, function)`, defaults filled in.
    pub fn handler(&self) -> (String, String) {
        let raw = self.get("spec.handler").and_then(Value::as_str).unwrap_or("");
        let (module, function) = raw.split_once(':').unwrap_or((raw, ""));
        let module = if module.is_empty() { DEFAULT_MODULE } else { module };
        let function = if function.is_empty() {
            DEFAULT_FUNCTION
        } else {
            function
        };
        (module.to_string(), function.to_string())
    }

    /// Set `spec.handler` to `module:function`; empty parts use the defaults.
    pub fn set_handler(&mut self, module: &str, function: &str) -> Result<()> {
        let module = if module.is_empty() { DEFAULT_MODULE } else { module };
        let function = if function.is_empty() {
            DEFAULT_FUNCTION
        } else {
            function
        };
        self.set("spec.handler", Value::String(format!("{module}:{function}")))
    }

    /// Replace only the function part of `spec.handler`.
    pub fn set_handler_function(&mut self, function: &str) -> Result<()> {
        let (module, _) = self.handler();
        self.set_handler(&module, function)
    }

    /// Create or update an env entry, keeping its position if it exists.
    pub fn set_env(&mut self, name: &str, value: EnvValue) -> Result<()> {
        let item = match value {
            EnvValue::Value(value) => json!({"name": name, "value": value}),
            EnvValue::ValueFrom(from) => json!({"name": name, "valueFrom": from}),
        };

        if self.get("spec.env").is_none_or(Value::is_null) {
            self.set("spec.env", Value::Array(Vec::new()))?;
        }
        let Some(Value::Array(entries)) = self.root.pointer_mut("/spec/env") else {
            return Err(Error::PathConflict {
                path: "spec.env".to_string(),
                reason: "not a list".to_string(),
            });
        };

        let existing = entries
            .iter()
            .position(|entry| entry.get("name").and_then(Value::as_str) == Some(name));
        match existing {
            Some(index) => entries[index] = item,
            None => entries.push(item),
        }
        Ok(())
    }

    /// Literal env value by name.
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env_entries()
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|entry| entry.get("value"))
            .and_then(Value::as_str)
    }

    /// Entries of `spec.env` in order.
    pub fn env_entries(&self) -> impl Iterator<Item = &Value> {
        self.get("spec.env")
            .and_then(Value::as_array)
            .map(|entries| entries.iter())
            .into_iter()
            .flatten()
    }

    pub fn add_build_command(&mut self, command: &str) -> Result<()> {
        self.append("spec.build.commands", Value::String(command.to_string()))
    }

    pub fn build_commands(&self) -> Vec<&str> {
        self.get("spec.build.commands")
            .and_then(Value::as_array)
            .map(|cmds| cmds.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn set_label(&mut self, key: &str, value: &str) -> Result<()> {
        self.set(
            vec!["metadata".to_string(), "labels".to_string(), key.to_string()],
            Value::String(value.to_string()),
        )
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<()> {
        self.set(
            vec![
                "metadata".to_string(),
                "annotations".to_string(),
                key.to_string(),
            ],
            Value::String(value.to_string()),
        )
    }

    /// Embed handler source as base64.
    pub fn embed_source(&mut self, code: &str) -> Result<()> {
        self.set(SOURCE_CODE_PATH, Value::String(BASE64.encode(code)))
    }

    /// Decode the embedded handler source, if any.
    pub fn embedded_source(&self) -> Result<Option<String>> {
        let Some(data) = self.get(SOURCE_CODE_PATH).and_then(Value::as_str) else {
            return Ok(None);
        };
        let bytes = BASE64.decode(data).map_err(|e| {
            Error::UnsupportedSource(format!("functionSourceCode is not base64: {e}"))
        })?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| Error::UnsupportedSource(format!("functionSourceCode: {e}")))
    }

    pub fn clear_embedded_source(&mut self) {
        self.remove(SOURCE_CODE_PATH);
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    /// Write the YAML document, prefixed with `header` if given.
    pub fn write_yaml(&self, path: &Path, header: Option<&str>) -> Result<()> {
        let mut text = String::new();
        if let Some(header) = header {
            text.push_str(header);
            text.push('\n');
        }
        text.push_str(&self.to_yaml()?);
        std::fs::write(path, text)?;
        Ok(())
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased function name: whitespace runs become `-`, `_` becomes `-`.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace('_', "-")
        .to_lowercase()
}
