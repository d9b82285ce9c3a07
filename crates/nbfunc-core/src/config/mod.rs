//! Function configuration: the document, its path addressing, and the
//! structured fragments (volumes, triggers) rendered into it.

mod document;
mod literal;
mod path_tree;
mod spec;
mod trigger;
mod volume;

pub use document::{
    API_VERSION, DEFAULT_FUNCTION, DEFAULT_MODULE, EnvValue, FunctionConfig, meta_keys,
    normalize_name,
};
pub use literal::{LiteralError, parse_literal};
pub use path_tree::{KeyPath, get_in, update_in};
pub use spec::ConfigSpec;
pub use trigger::{
    CronSchedule, CronTrigger, DEFAULT_WEBAPI, HttpTrigger, Ingress, KafkaTrigger, StreamSource,
    Trigger, V3ioStreamTrigger,
};
pub use volume::{DEFAULT_VOLUME_NAME, Volume, VolumeKind};

use serde_json::Value;

/// Anything that renders itself as a structured configuration value.
pub trait ConfigFragment {
    fn to_value(&self) -> Value;
}
