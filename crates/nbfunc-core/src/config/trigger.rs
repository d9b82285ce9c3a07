//! Function triggers rendered under `spec.triggers.<name>`.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::warn;

use super::ConfigFragment;
use crate::error::{Error, Result};

/// Default v3io web API endpoint for stream triggers.
pub const DEFAULT_WEBAPI: &str = "http://v3io-webapi:8081";

const CANARY: &str = "nginx.ingress.kubernetes.io/canary";
const CANARY_WEIGHT: &str = "nginx.ingress.kubernetes.io/canary-weight";

fn trigger_error(trigger: &str, message: impl Into<String>) -> Error {
    Error::InvalidArguments {
        directive: trigger.to_string(),
        message: message.into(),
    }
}

/// Copy `extra` over the rendered `attributes`.
fn merge_attributes(value: &mut Value, extra: &Map<String, Value>) {
    if let Some(attributes) = value.get_mut("attributes").and_then(Value::as_object_mut) {
        for (key, item) in extra {
            attributes.insert(key.clone(), item.clone());
        }
    }
}

/// Explicit ack mode conflicts with pooled workers; force `static` unless the
/// caller picked a mode explicitly.
fn pin_static_allocation(kind: &str, extra: &mut Map<String, Value>) {
    if !extra.contains_key("workerAllocationMode") {
        warn!("{kind}: workerAllocationMode set to static because explicitAckMode is enabled");
        extra.insert(
            "workerAllocationMode".to_string(),
            Value::String("static".to_string()),
        );
    }
}

/// HTTP trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTrigger {
    pub workers: u32,
    pub port: Option<u16>,
    pub ingresses: BTreeMap<String, Ingress>,
    pub annotations: BTreeMap<String, String>,
    pub extra_attributes: Map<String, Value>,
    pub disabled: bool,
}

/// Ingress rule of an HTTP trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingress {
    pub host: String,
    pub paths: Vec<String>,
    /// Kubernetes TLS secret name.
    pub secret: Option<String>,
}

impl Ingress {
    /// Rule for `host`; no paths means `/`.
    pub fn new(host: impl Into<String>, paths: Vec<String>) -> Self {
        let paths = if paths.is_empty() {
            vec!["/".to_string()]
        } else {
            paths
        };
        Self {
            host: host.into(),
            paths,
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

impl HttpTrigger {
    pub fn new(workers: u32) -> Self {
        Self {
            workers,
            port: None,
            ingresses: BTreeMap::new(),
            annotations: BTreeMap::new(),
            extra_attributes: Map::new(),
            disabled: false,
        }
    }

    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Add an ingress; no paths means `/`.
    pub fn with_ingress(self, name: &str, host: &str, paths: Vec<String>) -> Self {
        self.with_ingress_rule(name, Ingress::new(host, paths))
    }

    pub fn with_ingress_rule(mut self, name: &str, ingress: Ingress) -> Self {
        self.ingresses.insert(name.to_string(), ingress);
        self
    }

    /// Route `weight` percent of the traffic through this trigger's ingress.
    pub fn with_canary(self, weight: u8) -> Result<Self> {
        if weight > 100 {
            return Err(trigger_error(
                "http",
                format!("canary weight {weight} is not between 0 and 100"),
            ));
        }
        Ok(self
            .with_annotation(CANARY, "true")
            .with_annotation(CANARY_WEIGHT, weight.to_string()))
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Extra keys copied into `attributes`, overriding rendered ones.
    pub fn with_extra_attributes(mut self, extra: Map<String, Value>) -> Self {
        self.extra_attributes.extend(extra);
        self
    }

    pub fn disable(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl Default for HttpTrigger {
    fn default() -> Self {
        Self::new(8)
    }
}

impl ConfigFragment for HttpTrigger {
    fn to_value(&self) -> Value {
        let mut ingresses = Map::new();
        for (name, ingress) in &self.ingresses {
            let mut rule = json!({"host": ingress.host, "paths": ingress.paths});
            if let Some(secret) = &ingress.secret {
                rule["secretName"] = Value::String(secret.clone());
            }
            ingresses.insert(name.clone(), rule);
        }

        let mut attributes = json!({"ingresses": ingresses});
        if let Some(port) = self.port {
            attributes["port"] = json!(port);
        }
        let mut value = json!({
            "kind": "http",
            "maxWorkers": self.workers,
            "attributes": attributes,
            "annotations": self.annotations,
        });
        merge_attributes(&mut value, &self.extra_attributes);
        if self.disabled {
            value["disabled"] = Value::Bool(true);
        }
        value
    }
}

/// When a cron trigger fires.
#[derive(Debug, Clone, PartialEq)]
pub enum CronSchedule {
    /// Fixed interval such as `1h`, `30m`, `10s`.
    Interval(String),
    /// Cron expression.
    Schedule(String),
}

/// Cron trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct CronTrigger {
    pub schedule: CronSchedule,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl CronTrigger {
    /// Build from an interval or a schedule; one of them must be non-empty.
    pub fn new(interval: &str, schedule: &str) -> Result<Self> {
        let schedule = if !interval.is_empty() {
            CronSchedule::Interval(interval.to_string())
        } else if !schedule.is_empty() {
            CronSchedule::Schedule(schedule.to_string())
        } else {
            return Err(trigger_error("cron", "interval or schedule must be specified"));
        };
        Ok(Self {
            schedule,
            body: String::new(),
            headers: BTreeMap::new(),
        })
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl ConfigFragment for CronTrigger {
    fn to_value(&self) -> Value {
        let mut attributes = match &self.schedule {
            CronSchedule::Interval(interval) => json!({"interval": interval}),
            CronSchedule::Schedule(schedule) => json!({"schedule": schedule}),
        };
        if !self.body.is_empty() || !self.headers.is_empty() {
            attributes["event"] = json!({"body": self.body, "headers": self.headers});
        }
        json!({"kind": "cron", "attributes": attributes})
    }
}

/// Kafka cluster trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaTrigger {
    pub brokers: Vec<String>,
    pub topics: Vec<String>,
    pub partitions: Vec<u32>,
    pub consumer_group: String,
    pub initial_offset: String,
    pub explicit_ack_mode: Option<String>,
    pub session_timeout: String,
    pub heartbeat_interval: String,
    pub worker_allocation_mode: String,
    pub fetch_default: u64,
    pub max_workers: u32,
    /// `(user, password)` for SASL authentication.
    pub sasl: Option<(String, String)>,
    pub extra_attributes: Map<String, Value>,
}

impl KafkaTrigger {
    pub fn new<B, T>(brokers: B, topics: T) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            brokers: brokers.into_iter().map(Into::into).collect(),
            topics: topics.into_iter().map(Into::into).collect(),
            partitions: Vec::new(),
            consumer_group: "kafka".to_string(),
            initial_offset: "earliest".to_string(),
            explicit_ack_mode: None,
            session_timeout: "10s".to_string(),
            heartbeat_interval: "3s".to_string(),
            worker_allocation_mode: "pool".to_string(),
            fetch_default: 1_048_576,
            max_workers: 1,
            sasl: None,
            extra_attributes: Map::new(),
        }
    }

    pub fn with_partitions(mut self, partitions: Vec<u32>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    pub fn with_initial_offset(mut self, offset: impl Into<String>) -> Self {
        self.initial_offset = offset.into();
        self
    }

    /// `enable` or `explicitOnly`; pins the worker allocation to `static`.
    pub fn with_explicit_ack_mode(mut self, mode: impl Into<String>) -> Self {
        self.explicit_ack_mode = Some(mode.into());
        self
    }

    pub fn with_max_workers(mut self, workers: u32) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn with_sasl(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.sasl = Some((user.into(), password.into()));
        self
    }

    pub fn with_extra_attributes(mut self, extra: Map<String, Value>) -> Self {
        self.extra_attributes.extend(extra);
        self
    }
}

impl ConfigFragment for KafkaTrigger {
    fn to_value(&self) -> Value {
        let mut value = json!({
            "kind": "kafka-cluster",
            "maxWorkers": self.max_workers,
            "attributes": {
                "topics": self.topics,
                "brokers": self.brokers,
                "consumerGroup": self.consumer_group,
                "initialOffset": self.initial_offset,
                "sessionTimeout": self.session_timeout,
                "heartbeatInterval": self.heartbeat_interval,
                "workerAllocationMode": self.worker_allocation_mode,
                "fetchDefault": self.fetch_default,
            },
        });
        if !self.partitions.is_empty() {
            value["attributes"]["partitions"] = json!(self.partitions);
        }
        if let Some((user, password)) = &self.sasl {
            value["attributes"]["sasl"] =
                json!({"enable": true, "user": user, "password": password});
        }

        let mut extra = self.extra_attributes.clone();
        if let Some(mode) = &self.explicit_ack_mode {
            value["explicitAckMode"] = Value::String(mode.clone());
            pin_static_allocation("kafka-cluster", &mut extra);
        }
        merge_attributes(&mut value, &extra);
        value
    }
}

/// Where a v3io stream trigger reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSource {
    /// Full stream URL.
    Url(String),
    /// Container and stream path behind a web API endpoint.
    Stream {
        webapi: String,
        container: String,
        path: String,
    },
}

impl StreamSource {
    /// Container and path behind [`DEFAULT_WEBAPI`].
    pub fn stream(container: impl Into<String>, path: impl Into<String>) -> Self {
        StreamSource::Stream {
            webapi: DEFAULT_WEBAPI.to_string(),
            container: container.into(),
            path: path.into(),
        }
    }
}

/// v3io stream trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct V3ioStreamTrigger {
    pub source: StreamSource,
    /// Resolved access key, rendered as `password`.
    pub access_key: String,
    pub name: Option<String>,
    pub seek_to: String,
    pub partitions: Vec<u32>,
    pub polling_interval_ms: u32,
    pub read_batch_size: u32,
    pub max_workers: u32,
    pub session_timeout: String,
    pub worker_allocation_mode: String,
    pub consumer_group: String,
    pub sequence_number_commit_interval: String,
    pub heartbeat_interval: String,
    pub explicit_ack_mode: Option<String>,
    pub extra_attributes: Map<String, Value>,
}

impl V3ioStreamTrigger {
    /// Access key from the argument, else `V3IO_ACCESS_KEY`.
    pub fn new(source: StreamSource, access_key: Option<&str>) -> Result<Self> {
        Self::new_with(source, access_key, |key| std::env::var(key).ok())
    }

    /// Like [`Self::new`] with an explicit environment lookup.
    pub fn new_with(
        source: StreamSource,
        access_key: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let access_key = access_key
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| env("V3IO_ACCESS_KEY").filter(|key| !key.is_empty()))
            .ok_or_else(|| {
                trigger_error(
                    "v3ioStream",
                    "access key must be set (argument or V3IO_ACCESS_KEY)",
                )
            })?;
        Ok(Self {
            source,
            access_key,
            name: None,
            seek_to: "latest".to_string(),
            partitions: Vec::new(),
            polling_interval_ms: 500,
            read_batch_size: 64,
            max_workers: 1,
            session_timeout: "10s".to_string(),
            worker_allocation_mode: "pool".to_string(),
            consumer_group: "default".to_string(),
            sequence_number_commit_interval: "1s".to_string(),
            heartbeat_interval: "3s".to_string(),
            explicit_ack_mode: None,
            extra_attributes: Map::new(),
        })
    }

    /// Stream URL as rendered.
    pub fn url(&self) -> &str {
        match &self.source {
            StreamSource::Url(url) => url,
            StreamSource::Stream { webapi, .. } => webapi,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_seek_to(mut self, seek_to: impl Into<String>) -> Self {
        self.seek_to = seek_to.into();
        self
    }

    pub fn with_partitions(mut self, partitions: Vec<u32>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    pub fn with_max_workers(mut self, workers: u32) -> Self {
        self.max_workers = workers;
        self
    }

    /// `enable` or `explicitOnly`; pins the worker allocation to `static`.
    pub fn with_explicit_ack_mode(mut self, mode: impl Into<String>) -> Self {
        self.explicit_ack_mode = Some(mode.into());
        self
    }

    pub fn with_extra_attributes(mut self, extra: Map<String, Value>) -> Self {
        self.extra_attributes.extend(extra);
        self
    }
}

impl ConfigFragment for V3ioStreamTrigger {
    fn to_value(&self) -> Value {
        let mut value = match &self.source {
            StreamSource::Url(url) => json!({
                "kind": "v3ioStream",
                "url": url,
                "attributes": {},
            }),
            StreamSource::Stream {
                webapi,
                container,
                path,
            } => {
                let mut value = json!({
                    "kind": "v3ioStream",
                    "url": webapi,
                    "attributes": {
                        "containerName": container,
                        "streamPath": path,
                        "consumerGroup": self.consumer_group,
                        "sequenceNumberCommitInterval": self.sequence_number_commit_interval,
                        "workerAllocationMode": self.worker_allocation_mode,
                        "sessionTimeout": self.session_timeout,
                        "heartbeatInterval": self.heartbeat_interval,
                    },
                });
                if let Some(name) = &self.name {
                    value["name"] = Value::String(name.clone());
                }
                value
            }
        };

        value["maxWorkers"] = json!(self.max_workers);
        let attributes = &mut value["attributes"];
        attributes["seekTo"] = json!(self.seek_to);
        attributes["readBatchSize"] = json!(self.read_batch_size);
        attributes["pollingIntervalMs"] = json!(self.polling_interval_ms);
        if !self.partitions.is_empty() {
            attributes["partitions"] = json!(self.partitions);
        }
        value["password"] = Value::String(self.access_key.clone());

        let mut extra = self.extra_attributes.clone();
        if let Some(mode) = &self.explicit_ack_mode {
            value["explicitAckMode"] = Value::String(mode.clone());
            pin_static_allocation("v3ioStream", &mut extra);
        }
        merge_attributes(&mut value, &extra);
        value
    }
}

/// Any trigger the configuration can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Http(HttpTrigger),
    Cron(CronTrigger),
    Kafka(KafkaTrigger),
    V3ioStream(V3ioStreamTrigger),
}

impl ConfigFragment for Trigger {
    fn to_value(&self) -> Value {
        match self {
            Trigger::Http(trigger) => trigger.to_value(),
            Trigger::Cron(trigger) => trigger.to_value(),
            Trigger::Kafka(trigger) => trigger.to_value(),
            Trigger::V3ioStream(trigger) => trigger.to_value(),
        }
    }
}

impl From<HttpTrigger> for Trigger {
    fn from(trigger: HttpTrigger) -> Self {
        Trigger::Http(trigger)
    }
}

impl From<CronTrigger> for Trigger {
    fn from(trigger: CronTrigger) -> Self {
        Trigger::Cron(trigger)
    }
}

impl From<KafkaTrigger> for Trigger {
    fn from(trigger: KafkaTrigger) -> Self {
        Trigger::Kafka(trigger)
    }
}

impl From<V3ioStreamTrigger> for Trigger {
    fn from(trigger: V3ioStreamTrigger) -> Self {
        Trigger::V3ioStream(trigger)
    }
}
