//! Name to handler mapping for directives.

use std::collections::BTreeMap;

use super::handlers;
use super::parser::Directive;
use crate::error::{Error, Result};
use crate::export::BuildContext;

/// A directive implementation: updates the context, returns emitted code.
pub type DirectiveFn = fn(&Directive, &mut BuildContext) -> Result<String>;

/// One registered directive.
#[derive(Debug, Clone)]
pub struct DirectiveSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub usage: &'static str,
    pub handler: DirectiveFn,
}

impl DirectiveSpec {
    pub const fn new(
        name: &'static str,
        summary: &'static str,
        usage: &'static str,
        handler: DirectiveFn,
    ) -> Self {
        Self {
            name,
            summary,
            usage,
            handler,
        }
    }
}

const STANDARD: &[DirectiveSpec] = &[
    DirectiveSpec::new(
        "env",
        "set environment variables",
        "%nuclio env [--local-only|-l] [--config-only|-c] KEY=VALUE\n\
         %%nuclio env\nKEY=VALUE\n%v3io",
        handlers::env,
    ),
    DirectiveSpec::new(
        "cmd",
        "add build commands",
        "%nuclio cmd [--config-only|-c] COMMAND\n%%nuclio cmd\nCOMMAND\nCOMMAND",
        handlers::cmd,
    ),
    DirectiveSpec::new(
        "env_file",
        "set environment variables from files",
        "%nuclio env_file PATH\n%%nuclio env_file\nPATH\nPATH",
        handlers::env_file,
    ),
    DirectiveSpec::new(
        "config",
        "set configuration values",
        "%nuclio config path.to.key = VALUE\n%nuclio config path.to.list += VALUE\n\
         (escape dots inside keys as `\\.`)",
        handlers::config,
    ),
    DirectiveSpec::new(
        "handler",
        "wrap the cell body in a handler function",
        "%%nuclio handler [NAME]\nBODY",
        handlers::handler,
    ),
    DirectiveSpec::new(
        "mount",
        "mount a volume into the function",
        "%nuclio mount [--type v3io|pvc|secret] [--name NAME] [--key KEY] [--readonly] \
         MOUNT_PATH REMOTE",
        handlers::mount,
    ),
    DirectiveSpec::new(
        "add",
        "bundle extra files with the function",
        "%nuclio add [-f FILE]... [FILE]...",
        handlers::add,
    ),
    DirectiveSpec::new(
        "archive",
        "bundle extra files with the function",
        "%nuclio archive [-f FILE]... [FILE]...",
        handlers::add,
    ),
    DirectiveSpec::new(
        "deploy",
        "request a deployment from the invoking tool",
        "%nuclio deploy [ARGS]",
        handlers::deploy,
    ),
    DirectiveSpec::new(
        "build",
        "request a build from the invoking tool",
        "%nuclio build [ARGS]",
        handlers::build,
    ),
    DirectiveSpec::new(
        "export",
        "request an export from the invoking tool",
        "%nuclio export [ARGS]",
        handlers::export,
    ),
    DirectiveSpec::new(
        "show",
        "request the generated code to be shown",
        "%nuclio show",
        handlers::show,
    ),
    DirectiveSpec::new(
        "help",
        "request directive help",
        "%nuclio help [COMMAND]",
        handlers::help,
    ),
    DirectiveSpec::new(
        "verbose",
        "toggle verbose scan output",
        "%nuclio verbose [on|off]",
        handlers::verbose,
    ),
];

/// Immutable directive table, built once and handed to the scanner.
#[derive(Debug, Clone, Default)]
pub struct DirectiveRegistry {
    directives: BTreeMap<&'static str, DirectiveSpec>,
}

impl DirectiveRegistry {
    /// A registry with no directives.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All standard directives.
    pub fn standard() -> Self {
        STANDARD
            .iter()
            .cloned()
            .fold(Self::empty(), |registry, spec| registry.with(spec))
    }

    /// Add (or replace) a directive.
    pub fn with(mut self, spec: DirectiveSpec) -> Self {
        self.directives.insert(spec.name, spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveSpec> {
        self.directives.get(name)
    }

    /// Sorted directive names.
    pub fn names(&self) -> Vec<&'static str> {
        self.directives.keys().copied().collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &DirectiveSpec> {
        self.directives.values()
    }

    pub fn dispatch(&self, directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
        let spec = self
            .get(&directive.name)
            .ok_or_else(|| Error::UnknownDirective {
                name: directive.name.clone(),
                supported: self.names().into_iter().map(str::to_string).collect(),
            })?;
        ctx.note(format_args!(
            "{} {} {}",
            if directive.is_cell { "%%nuclio" } else { "%nuclio" },
            directive.name,
            directive.args
        ));
        (spec.handler)(directive, ctx)
    }

    /// Help for one directive, or a summary of all of them.
    pub fn help(&self, name: Option<&str>) -> Result<String> {
        match name {
            Some(name) => {
                let spec = self.get(name).ok_or_else(|| Error::UnknownDirective {
                    name: name.to_string(),
                    supported: self.names().into_iter().map(str::to_string).collect(),
                })?;
                Ok(format!("{} - {}\n\n{}\n", spec.name, spec.summary, spec.usage))
            }
            None => {
                let width = self.directives.keys().map(|n| n.len()).max().unwrap_or(0);
                let mut text = String::from("nuclio directives:\n");
                for spec in self.specs() {
                    text.push_str(&format!("  {:width$}  {}\n", spec.name, spec.summary));
                }
                Ok(text)
            }
        }
    }
}
