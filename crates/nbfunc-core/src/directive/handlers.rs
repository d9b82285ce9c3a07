//! The standard directive implementations.
//!
//! Every handler has the same shape: it reads the directive, updates the
//! [`BuildContext`] and returns the code it emits (usually nothing).

use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use clap::Parser;
use regex::Regex;
use tracing::warn;

use super::parser::{
    AssignOp, Directive, parse_assignment, parse_env_line, split_args, value_lines,
};
use crate::config::{DEFAULT_VOLUME_NAME, EnvValue, Volume, VolumeKind};
use crate::error::{Error, Result};
use crate::export::{BuildContext, ToolRequestKind};

static RE_RETURN_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s*nuclio:\s*return\b").unwrap());
static RE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// Variables copied by the `%v3io` env line.
const V3IO_VARS: &[&str] = &["V3IO_FRAMESD", "V3IO_USERNAME", "V3IO_ACCESS_KEY", "V3IO_API"];

const INDENT: &str = "    ";

/// Leading tokens of `args` that are in `known`, and the remainder.
fn strip_flags<'a>(args: &'a str, known: &[&str]) -> (Vec<&'a str>, &'a str) {
    let mut rest = args.trim_start();
    let mut flags = Vec::new();
    loop {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..end];
        if token.is_empty() || !known.contains(&token) {
            break;
        }
        flags.push(token);
        rest = rest[end..].trim_start();
    }
    (flags, rest)
}

fn invalid(directive: &str, message: impl Into<String>) -> Error {
    Error::InvalidArguments {
        directive: directive.to_string(),
        message: message.into(),
    }
}

/// First line of a clap error, without its `error: ` prefix.
fn clap_message(err: &clap::Error) -> String {
    let text = err.to_string();
    let first = text.lines().next().unwrap_or_default();
    first.trim_start_matches("error: ").to_string()
}

pub(crate) fn env(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    let (flags, rest) = strip_flags(
        &directive.args,
        &["--local-only", "-l", "--config-only", "-c"],
    );
    let local_only = flags.iter().any(|f| matches!(*f, "--local-only" | "-l"));
    let config_only = flags.iter().any(|f| matches!(*f, "--config-only" | "-c"));
    if let Some(flag) = rest.split_whitespace().next().filter(|t| t.starts_with('-')) {
        return Err(invalid("env", format!("unknown flag {flag:?}")));
    }

    let mut entries = Vec::new();
    for line in value_lines(rest, &directive.lines) {
        if line == "%v3io" {
            entries.extend(
                V3IO_VARS
                    .iter()
                    .filter_map(|name| ctx.lookup_env(name).map(|v| (name.to_string(), v))),
            );
            continue;
        }
        let entry = parse_env_line(line).ok_or_else(|| Error::EnvParse {
            line: line.to_string(),
            origin: None,
        })?;
        entries.push(entry);
    }

    for (name, value) in &entries {
        if !config_only {
            ctx.set_local_env(name, value);
        }
        if !local_only {
            ctx.config.set_env(name, EnvValue::Value(value.clone()))?;
        }
        ctx.note(format_args!("env {name}={value}"));
    }
    Ok(String::new())
}

pub(crate) fn cmd(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    let (flags, rest) = strip_flags(&directive.args, &["--config-only", "-c"]);
    let config_only = !flags.is_empty();

    for line in value_lines(rest, &directive.lines) {
        let command = ctx.expand(line);
        if !config_only && ctx.settings().exec_commands {
            run_local(&command, ctx)?;
        }
        ctx.config.add_build_command(&command)?;
    }
    Ok(String::new())
}

fn run_local(command: &str, ctx: &BuildContext) -> Result<()> {
    ctx.note(format_args!("running {command:?}"));
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .envs(ctx.local_env())
        .output()?;
    if output.status.success() {
        ctx.note(String::from_utf8_lossy(&output.stdout).trim_end());
    } else {
        warn!(
            "command {command:?} failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
    }
    Ok(())
}

pub(crate) fn env_file(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    for line in directive.value_lines() {
        let path = PathBuf::from(ctx.expand(line));
        if !path.is_file() {
            warn!("env file {} not found, skipping", path.display());
            continue;
        }
        ctx.apply_env_file(&path)?;
        ctx.remember_env_file(&path);
    }
    Ok(String::new())
}

pub(crate) fn config(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    for line in directive.value_lines() {
        let assignment = parse_assignment(line, |name| ctx.lookup_env(name))?;
        ctx.note(format_args!("config {line}"));
        match assignment.op {
            AssignOp::Set => ctx.config.set(assignment.path, assignment.value)?,
            AssignOp::Append => ctx.config.append(assignment.path, assignment.value)?,
        }
    }
    Ok(String::new())
}

pub(crate) fn handler(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    let name = match directive.args.trim() {
        "" => ctx.next_handler_name(),
        name if RE_IDENTIFIER.is_match(name) => name.to_string(),
        name => return Err(invalid("handler", format!("{name:?} is not a function name"))),
    };
    if ctx.settings().handler_name.is_none() {
        ctx.config.set_handler_function(&name)?;
    }
    ctx.note(format_args!("handler {name}"));
    Ok(handler_code(&name, &directive.lines))
}

/// Wrap `body` in `def <name>(context, event):`, indented, with the last
/// code line turned into a return statement.
pub fn handler_code(name: &str, body: &[String]) -> String {
    let mut lines: Vec<String> = body.iter().map(|line| mark_return(line)).collect();
    add_return(&mut lines);

    let mut code = format!("def {name}(context, event):\n");
    if lines.iter().all(|line| line.trim().is_empty()) {
        code.push_str(INDENT);
        code.push_str("pass\n");
        return code;
    }
    for line in &lines {
        if !line.trim().is_empty() {
            code.push_str(INDENT);
            code.push_str(line);
        }
        code.push('\n');
    }
    code
}

/// Insert `return ` into the last code line unless it already returns.
/// Blank lines and lines starting with `#` or `%` are skipped.
pub fn add_return(lines: &mut [String]) {
    for line in lines.iter_mut().rev() {
        let code = line.trim();
        if code.is_empty() || code.starts_with('#') || code.starts_with('%') {
            continue;
        }
        if !code.contains("return") {
            *line = insert_return(line);
        }
        break;
    }
}

/// Rewrite a line carrying `# nuclio: return`.
fn mark_return(line: &str) -> String {
    if RE_RETURN_MARK.is_match(line) && !line.trim_start().starts_with("return") {
        insert_return(line)
    } else {
        line.to_string()
    }
}

fn insert_return(line: &str) -> String {
    let indent = line.len() - line.trim_start().len();
    format!("{}return {}", &line[..indent], &line[indent..])
}

#[derive(Debug, Parser)]
#[command(name = "mount", disable_help_flag = true)]
struct MountArgs {
    /// Volume type: v3io, pvc or secret
    #[arg(short = 't', long = "type", default_value = "v3io")]
    kind: String,
    #[arg(short, long, default_value = DEFAULT_VOLUME_NAME)]
    name: String,
    /// v3io access key
    #[arg(short, long)]
    key: Option<String>,
    #[arg(short, long)]
    readonly: bool,
    mount_path: String,
    remote: String,
}

/// Parse the arguments of a mount line: `[flags] MOUNT_PATH REMOTE`.
pub fn parse_mount(line: &str) -> Result<Volume> {
    let tokens = split_args(line)?;
    let args = MountArgs::try_parse_from(std::iter::once("mount".to_string()).chain(tokens))
        .map_err(|e| invalid("mount", clap_message(&e)))?;
    let kind: VolumeKind = args.kind.parse()?;

    let mut volume = Volume::new(args.mount_path, args.remote)
        .with_kind(kind)
        .with_name(args.name)
        .readonly(args.readonly);
    if let Some(key) = args.key {
        volume = volume.with_access_key(key);
    }
    Ok(volume)
}

pub(crate) fn mount(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    for line in directive.value_lines() {
        let volume = parse_mount(&ctx.expand(line))?;
        let rendered = volume.render_with(|name| ctx.lookup_env(name));
        ctx.note(format_args!("mount {} -> {}", volume.remote, volume.mount_path));
        ctx.config.append("spec.volumes", rendered)?;
    }
    Ok(String::new())
}

#[derive(Debug, Parser)]
#[command(name = "add", disable_help_flag = true)]
struct AddArgs {
    #[arg(short, long = "file")]
    file: Vec<String>,
    files: Vec<String>,
}

pub(crate) fn add(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    for line in directive.value_lines() {
        let tokens = split_args(&ctx.expand(line))?;
        let args = AddArgs::try_parse_from(std::iter::once("add".to_string()).chain(tokens))
            .map_err(|e| invalid(&directive.name, clap_message(&e)))?;
        for file in args.file.into_iter().chain(args.files) {
            let path = PathBuf::from(file);
            if !path.is_file() {
                return Err(Error::MissingFile(path));
            }
            ctx.note(format_args!("add {}", path.display()));
            ctx.add_extra_file(path);
        }
    }
    Ok(String::new())
}

fn request(kind: ToolRequestKind, directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    ctx.request(kind, directive.args.trim());
    Ok(String::new())
}

pub(crate) fn deploy(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    request(ToolRequestKind::Deploy, directive, ctx)
}

pub(crate) fn build(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    request(ToolRequestKind::Build, directive, ctx)
}

pub(crate) fn export(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    request(ToolRequestKind::Export, directive, ctx)
}

pub(crate) fn show(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    request(ToolRequestKind::Show, directive, ctx)
}

pub(crate) fn help(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    request(ToolRequestKind::Help, directive, ctx)
}

pub(crate) fn verbose(directive: &Directive, ctx: &mut BuildContext) -> Result<String> {
    let on = match directive.args.trim() {
        "" => ctx.toggle_verbose(),
        "on" | "true" => {
            ctx.set_verbose(true);
            true
        }
        "off" | "false" => {
            ctx.set_verbose(false);
            false
        }
        other => return Err(invalid("verbose", format!("expected on or off, got {other:?}"))),
    };
    tracing::info!("verbose mode {}", if on { "on" } else { "off" });
    Ok(String::new())
}
