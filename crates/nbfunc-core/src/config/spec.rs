//! Programmatic configuration overrides applied on top of a document.

use serde_json::Value;

use super::document::{EnvValue, FunctionConfig};
use super::trigger::Trigger;
use super::volume::Volume;
use super::ConfigFragment;
use crate::error::Result;

/// Overrides collected from the command line (or a library caller) and
/// merged into a [`FunctionConfig`] after the notebook has been scanned.
#[derive(Debug, Clone, Default)]
pub struct ConfigSpec {
    env: Vec<(String, String)>,
    external_env: Vec<(String, Value)>,
    /// `(path, value)` overrides, in insertion order.
    config: Vec<(String, Value)>,
    commands: Vec<String>,
    mounts: Vec<Volume>,
    triggers: Vec<(String, Trigger)>,
}

impl ConfigSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Env var read from an external source, e.g. `{"secretKeyRef": {...}}`.
    pub fn set_external_env(mut self, name: impl Into<String>, value_from: Value) -> Self {
        self.external_env.push((name.into(), value_from));
        self
    }

    pub fn set_config(mut self, path: impl Into<String>, value: Value) -> Self {
        self.config.push((path.into(), value));
        self
    }

    pub fn add_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn add_volume(mut self, volume: Volume) -> Self {
        self.mounts.push(volume);
        self
    }

    pub fn add_trigger(mut self, name: impl Into<String>, trigger: impl Into<Trigger>) -> Self {
        self.triggers.push((name.into(), trigger.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.env.is_empty()
            && self.external_env.is_empty()
            && self.config.is_empty()
            && self.commands.is_empty()
            && self.mounts.is_empty()
            && self.triggers.is_empty()
    }

    /// Apply the overrides. A config override appends when the current value
    /// at its path is a list.
    pub fn merge(&self, config: &mut FunctionConfig) -> Result<()> {
        for (path, value) in &self.config {
            let is_list = config.get(path).is_some_and(Value::is_array);
            if is_list {
                config.append(path, value.clone())?;
            } else {
                config.set(path, value.clone())?;
            }
        }
        for (name, trigger) in &self.triggers {
            config.set(
                vec!["spec".to_string(), "triggers".to_string(), name.clone()],
                trigger.to_value(),
            )?;
        }
        for (name, value) in &self.env {
            config.set_env(name, EnvValue::Value(value.clone()))?;
        }
        for (name, value_from) in &self.external_env {
            config.set_env(name, EnvValue::ValueFrom(value_from.clone()))?;
        }
        for command in &self.commands {
            let command = command.trim();
            if command.is_empty() || command.starts_with('#') {
                continue;
            }
            config.add_build_command(command)?;
        }
        for mount in &self.mounts {
            config.append("spec.volumes", mount.to_value())?;
        }
        Ok(())
    }
}
