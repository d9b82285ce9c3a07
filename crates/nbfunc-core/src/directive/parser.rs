//! Parsing of `%nuclio` directive lines and their argument lines.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::config::{KeyPath, parse_literal};
use crate::error::{Error, Result};

/// Line-level directive marker.
pub const LINE_MAGIC: &str = "%nuclio";
/// Cell-level directive marker.
pub const CELL_MAGIC: &str = "%%nuclio";

static RE_INVOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%?%nuclio\s+(\w+)\s*").unwrap());
static RE_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((?:[\w\-/]|\\\.)+(?:\.(?:[\w\-/]|\\\.)+)*)\s*(\+?=)\s*(.*?)\s*$").unwrap()
});
static RE_ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:(\w+)|\{([^}]*)\})").unwrap());

/// One parsed directive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    /// Everything after the command name on the invocation line.
    pub args: String,
    /// Body lines of a cell directive.
    pub lines: Vec<String>,
    pub is_cell: bool,
}

impl Directive {
    /// A single-line `%nuclio name args` directive.
    pub fn line(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
            lines: Vec::new(),
            is_cell: false,
        }
    }

    /// A `%%nuclio name args` directive with body lines.
    pub fn cell(name: impl Into<String>, args: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
            lines,
            is_cell: true,
        }
    }

    /// Parse an invocation line plus an optional body.
    pub fn parse(line: &str, body: Option<Vec<String>>) -> Result<Option<Self>> {
        let Some((name, args)) = parse_invocation(line)? else {
            return Ok(None);
        };
        Ok(Some(match body {
            Some(lines) => Self::cell(name, args, lines),
            None => Self::line(name, args),
        }))
    }

    /// The argument line followed by the body lines, trimmed, without blanks
    /// and comments.
    pub fn value_lines(&self) -> impl Iterator<Item = &str> {
        value_lines(&self.args, &self.lines)
    }
}

/// `args` followed by `lines`, trimmed, without blanks and comments.
pub fn value_lines<'a>(args: &'a str, lines: &'a [String]) -> impl Iterator<Item = &'a str> {
    std::iter::once(args)
        .chain(lines.iter().map(String::as_str))
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Split a directive line into `(name, args)`.
///
/// Returns `None` when the line carries no marker, and fails when the
/// marker is not followed by a command name.
pub fn parse_invocation(line: &str) -> Result<Option<(String, String)>> {
    if !line.contains(LINE_MAGIC) {
        return Ok(None);
    }
    let line = line.trim();
    let caps = RE_INVOCATION
        .captures(line)
        .ok_or_else(|| Error::DirectiveSyntax(line.to_string()))?;
    let name = caps[1].to_string();
    let args = line[caps[0].len()..].trim().to_string();
    Ok(Some((name, args)))
}

/// Operator of a config assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Append,
}

/// A parsed `path op value` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: KeyPath,
    pub op: AssignOp,
    pub value: Value,
}

/// Parse `path = value` / `path += value`, expanding `$VAR` in the value
/// before reading it as a literal.
pub fn parse_assignment(
    line: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Assignment> {
    let caps = RE_ASSIGNMENT
        .captures(line)
        .ok_or_else(|| Error::config_line(line, "expected `path = value` or `path += value`"))?;
    let raw_value = &caps[3];
    if raw_value.is_empty() {
        return Err(Error::config_line(line, "missing value"));
    }

    let expanded = expand_vars(raw_value, lookup);
    let value = parse_literal(&expanded).map_err(|e| Error::config_line(line, e.to_string()))?;
    let op = if &caps[2] == "+=" {
        AssignOp::Append
    } else {
        AssignOp::Set
    };

    Ok(Assignment {
        path: KeyPath::parse(&caps[1]),
        op,
        value,
    })
}

/// Split `KEY=value` on the first `=`. `None` if there is no `=` or no key.
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Replace `$NAME` and `${NAME}`; unknown variables are left as written.
pub fn expand_vars(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    if !text.contains('$') {
        return text.to_string();
    }
    RE_ENV_VAR
        .replace_all(text, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Split directive arguments on whitespace, honoring single and double quotes.
pub fn split_args(text: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                in_arg = true;
            }
            None if ch.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(ch);
                in_arg = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::DirectiveSyntax(format!("unterminated quote in {text:?}")));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}
