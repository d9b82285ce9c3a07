//! Volume mounts rendered into `spec.volumes`.

use std::str::FromStr;

use serde_json::{Value, json};

use super::ConfigFragment;
use crate::error::Error;

pub const DEFAULT_VOLUME_NAME: &str = "fs";

/// Kind of a mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeKind {
    #[default]
    V3io,
    Pvc,
    Secret,
}

impl FromStr for VolumeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "v3io" => Ok(VolumeKind::V3io),
            "pvc" => Ok(VolumeKind::Pvc),
            "secret" => Ok(VolumeKind::Secret),
            other => Err(Error::InvalidArguments {
                directive: "mount".to_string(),
                message: format!("unknown volume type {other:?} (expected v3io, pvc or secret)"),
            }),
        }
    }
}

/// A volume mounted into the function container.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub mount_path: String,
    pub remote: String,
    pub kind: VolumeKind,
    pub name: String,
    /// v3io access key; falls back to `V3IO_ACCESS_KEY`.
    pub access_key: Option<String>,
    pub readonly: bool,
}

impl Volume {
    pub fn new(mount_path: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            mount_path: mount_path.into(),
            remote: remote.into(),
            kind: VolumeKind::default(),
            name: DEFAULT_VOLUME_NAME.to_string(),
            access_key: None,
            readonly: false,
        }
    }

    pub fn with_kind(mut self, kind: VolumeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Render with an explicit environment lookup (for `~/` and the access key).
    pub fn render_with(&self, env: impl Fn(&str) -> Option<String>) -> Value {
        let volume = match self.kind {
            VolumeKind::V3io => {
                let remote = match self.remote.strip_prefix("~/") {
                    Some(rest) => {
                        let user = env("V3IO_USERNAME").unwrap_or_default();
                        format!("users/{user}/{rest}")
                    }
                    None => self.remote.clone(),
                };
                let (container, sub_path) = split_container(&remote);
                let key = self
                    .access_key
                    .clone()
                    .or_else(|| env("V3IO_ACCESS_KEY"))
                    .unwrap_or_default();
                json!({
                    "name": self.name,
                    "flexVolume": {
                        "driver": "v3io/fuse",
                        "options": {
                            "container": container,
                            "subPath": sub_path,
                            "accessKey": key,
                        },
                    },
                })
            }
            VolumeKind::Pvc => json!({
                "name": self.name,
                "persistentVolumeClaim": {"claimName": self.remote},
            }),
            VolumeKind::Secret => json!({
                "name": self.name,
                "secret": {"secretName": self.remote},
            }),
        };

        let mut mount = json!({"name": self.name, "mountPath": self.mount_path});
        if self.readonly {
            mount["readOnly"] = Value::Bool(true);
        }
        json!({"volume": volume, "volumeMount": mount})
    }
}

impl ConfigFragment for Volume {
    fn to_value(&self) -> Value {
        self.render_with(|key| std::env::var(key).ok())
    }
}

/// Split `container/sub/path` into `("container", "/sub/path")`.
fn split_container(path: &str) -> (String, String) {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.find('/') {
        Some(index) => (path[..index].to_string(), path[index..].to_string()),
        None => (path.to_string(), String::new()),
    }
}
