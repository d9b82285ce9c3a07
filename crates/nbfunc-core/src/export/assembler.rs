//! Joins scanned fragments into handler source.

use chrono::{DateTime, Local, TimeZone};

/// Builds the final handler text from code fragments.
#[derive(Debug, Clone)]
pub struct CodeAssembler {
    header: String,
}

impl CodeAssembler {
    /// Header stamped with the current local time.
    pub fn new() -> Self {
        Self::stamped(&Local::now())
    }

    pub fn stamped<Tz: TimeZone>(time: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            header: generated_header(time),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Header line, a blank line, then the fragments joined by newlines.
    pub fn assemble<S: AsRef<str>>(&self, fragments: &[S]) -> String {
        let body = fragments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        let mut code = format!("{}\n\n{}", self.header, body);
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code
    }
}

impl Default for CodeAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// `# Generated by nbfunc on <date>`.
pub fn generated_header<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("# Generated by nbfunc on {}", time.format("%Y-%m-%d %H:%M"))
}

/// Handler text without its generated header line.
pub fn strip_header(code: &str) -> &str {
    match code.split_once('\n') {
        Some((first, rest)) if first.starts_with("# Generated by nbfunc") => rest,
        _ => code,
    }
}
