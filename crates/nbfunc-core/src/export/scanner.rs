//! Cell scanner: decides which notebook lines end up in the handler.
//!
//! Each tracked function buffer (the nameless one, plus the target function
//! when one is requested) follows the boundary annotations addressed to it:
//!
//! ```text
//!   not started --start-code--> started --end-code--> ended
//!        |                         ^                    |
//!        +--end-code--> ended      +-----start-code-----+
//! ```
//!
//! The first `start-code` a buffer sees discards everything it collected so
//! far. Directives run once per cell, whatever the buffers decide to keep.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use nbfunc_ipynb::{JupyterCell, JupyterNotebook};
use regex::Regex;

use super::context::BuildContext;
use super::settings::ExportSettings;
use crate::directive::{CELL_MAGIC, Directive, DirectiveRegistry, LINE_MAGIC};
use crate::error::{Error, Result};

static RE_IGNORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s*nuclio:\s*ignore\b").unwrap());
static RE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#\s*(?:nuclio:\s*)?(start|end)-code\b(?:[ \t]+([\w.\-]+))?").unwrap()
});
static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Start,
    End,
}

#[derive(Debug)]
struct Boundary {
    line: usize,
    kind: BoundaryKind,
    /// Empty for the nameless buffer.
    target: String,
}

fn find_boundaries(lines: &[&str]) -> Vec<Boundary> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line, text)| {
            let caps = RE_BOUNDARY.captures(text)?;
            let kind = if &caps[1] == "start" {
                BoundaryKind::Start
            } else {
                BoundaryKind::End
            };
            let target = caps.get(2).map_or("", |m| m.as_str()).to_string();
            Some(Boundary { line, kind, target })
        })
        .collect()
}

/// What one cell does to one buffer, computed before anything is applied.
#[derive(Debug)]
struct CellPlan {
    keep: Vec<bool>,
    reset: bool,
    started: bool,
    ended: bool,
}

#[derive(Debug, Default)]
struct FunctionBuffer {
    name: String,
    started: bool,
    ended: bool,
    fragments: Vec<String>,
}

impl FunctionBuffer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn plan(&self, boundaries: &[Boundary], line_count: usize) -> Result<CellPlan> {
        let mut plan = CellPlan {
            keep: vec![false; line_count],
            reset: false,
            started: self.started,
            ended: self.ended,
        };
        let mine: Vec<&Boundary> = boundaries
            .iter()
            .filter(|b| b.target == self.name)
            .collect();
        let mut pending = mine.iter().peekable();

        for index in 0..line_count {
            let Some(boundary) = pending.next_if(|b| b.line == index) else {
                plan.keep[index] = !plan.ended;
                continue;
            };
            match boundary.kind {
                BoundaryKind::Start => {
                    if plan.started && !plan.ended {
                        return Err(Error::state(
                            &self.name,
                            "multiple consecutive start-code annotations",
                        ));
                    }
                    if !plan.started {
                        plan.reset = true;
                        plan.keep[..index].fill(false);
                    }
                    plan.started = true;
                    plan.ended = false;
                }
                BoundaryKind::End => {
                    if plan.ended {
                        return Err(Error::state(
                            &self.name,
                            "multiple consecutive end-code annotations",
                        ));
                    }
                    let opens_later = mine
                        .iter()
                        .any(|b| b.line > index && b.kind == BoundaryKind::Start);
                    if !plan.started && opens_later {
                        return Err(Error::state(
                            &self.name,
                            "end-code before start-code in the same cell",
                        ));
                    }
                    plan.ended = true;
                }
            }
        }
        Ok(plan)
    }

    fn commit(&mut self, plan: CellPlan, fragment: String) {
        if plan.reset {
            self.fragments.clear();
        }
        self.started = plan.started;
        self.ended = plan.ended;
        if !fragment.trim().is_empty() {
            self.fragments.push(fragment);
        }
    }

    fn has_code(&self) -> bool {
        !self.fragments.is_empty()
    }
}

/// Walks the code cells of a notebook once, dispatching directives and
/// collecting code fragments per function buffer.
#[derive(Debug)]
pub struct CellScanner<'r> {
    registry: &'r DirectiveRegistry,
    ignored_tags: BTreeSet<String>,
    buffers: Vec<FunctionBuffer>,
}

impl<'r> CellScanner<'r> {
    pub fn new(registry: &'r DirectiveRegistry, settings: &ExportSettings) -> Self {
        let mut buffers = vec![FunctionBuffer::new("")];
        if let Some(target) = settings.target.as_deref().filter(|t| !t.is_empty()) {
            buffers.push(FunctionBuffer::new(target));
        }
        Self {
            registry,
            ignored_tags: settings.all_ignored_tags(),
            buffers,
        }
    }

    /// Scan every code cell; returns the fragments of the resolved buffer.
    pub fn scan(mut self, notebook: &JupyterNotebook, ctx: &mut BuildContext) -> Result<Vec<String>> {
        for (index, cell) in notebook.cells.iter().enumerate() {
            if !cell.is_code() {
                continue;
            }
            if self.is_ignored(cell) {
                ctx.note(format_args!("cell {index}: ignored"));
                continue;
            }
            self.scan_cell(index, &cell.source_text(), ctx)?;
        }
        Ok(self.resolve(ctx))
    }

    fn is_ignored(&self, cell: &JupyterCell) -> bool {
        RE_IGNORE.is_match(&cell.source_text())
            || cell.tags().iter().any(|tag| self.ignored_tags.contains(tag))
    }

    fn scan_cell(&mut self, index: usize, source: &str, ctx: &mut BuildContext) -> Result<()> {
        let lines: Vec<&str> = source.lines().collect();
        let boundaries = find_boundaries(&lines);

        let plans = self
            .buffers
            .iter()
            .map(|buffer| buffer.plan(&boundaries, lines.len()))
            .collect::<Result<Vec<_>>>()?;

        let pieces = self.render(&lines, ctx)?;

        for (buffer, plan) in self.buffers.iter_mut().zip(plans) {
            let fragment = pieces
                .iter()
                .filter(|(line, _)| plan.keep[*line])
                .map(|(_, text)| text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            if plan.reset {
                ctx.note(format_args!(
                    "cell {index}: start-code{} discards {} earlier fragment(s)",
                    display_target(&buffer.name),
                    buffer.fragments.len()
                ));
            }
            buffer.commit(plan, fragment);
        }
        Ok(())
    }

    /// Emitted text keyed by source line. Comments, foreign magics and shell
    /// escapes produce nothing; directives run here.
    fn render(&self, lines: &[&str], ctx: &mut BuildContext) -> Result<Vec<(usize, String)>> {
        let cell_magic = lines
            .iter()
            .position(|line| line.trim_start().starts_with(CELL_MAGIC));
        if let Some(at) = cell_magic {
            let body = lines[at + 1..]
                .iter()
                .filter(|line| !RE_COMMENT.is_match(line))
                .map(|line| line.to_string())
                .collect();
            let directive = Directive::parse(lines[at], Some(body))?
                .ok_or_else(|| Error::DirectiveSyntax(lines[at].to_string()))?;
            let code = self.registry.dispatch(&directive, ctx)?;
            return Ok(emitted(at, code).into_iter().collect());
        }

        let mut pieces = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if RE_COMMENT.is_match(line) {
                continue;
            }
            if trimmed.starts_with(LINE_MAGIC) {
                let directive = Directive::parse(line, None)?
                    .ok_or_else(|| Error::DirectiveSyntax(line.to_string()))?;
                let code = self.registry.dispatch(&directive, ctx)?;
                pieces.extend(emitted(index, code));
            } else if trimmed.starts_with('%') || trimmed.starts_with('!') {
                continue;
            } else {
                pieces.push((index, line.to_string()));
            }
        }
        Ok(pieces)
    }

    /// The target buffer if it collected any code, else the nameless one.
    fn resolve(self, ctx: &BuildContext) -> Vec<String> {
        let mut buffers = self.buffers.into_iter();
        let nameless = buffers.next().unwrap_or_default();
        match buffers.find(FunctionBuffer::has_code) {
            Some(target) => {
                ctx.note(format_args!("emitting function {:?}", target.name));
                target.fragments
            }
            None => nameless.fragments,
        }
    }
}

fn emitted(line: usize, code: String) -> Option<(usize, String)> {
    (!code.is_empty()).then(|| (line, code.trim_end_matches('\n').to_string()))
}

fn display_target(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!(" {name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::EnvSource;

    fn scan_with(settings: ExportSettings, cells: Vec<JupyterCell>) -> Result<String> {
        let registry = DirectiveRegistry::standard();
        let mut ctx =
            BuildContext::with_env(settings.clone(), EnvSource::fixed::<_, &str, &str>([]));
        let notebook = JupyterNotebook::from_cells(cells);
        let fragments = CellScanner::new(&registry, &settings).scan(&notebook, &mut ctx)?;
        Ok(fragments.join("\n"))
    }

    fn scan(sources: &[&str]) -> Result<String> {
        scan_with(
            ExportSettings::default(),
            sources.iter().map(|s| JupyterCell::code(*s)).collect(),
        )
    }

    fn scan_target(target: &str, sources: &[&str]) -> Result<String> {
        let settings = ExportSettings {
            target: Some(target.to_string()),
            ..Default::default()
        };
        scan_with(settings, sources.iter().map(|s| JupyterCell::code(*s)).collect())
    }

    #[test]
    fn test_plain_cells() {
        assert_eq!(scan(&["a=1", "b=2"]).unwrap(), "a=1\nb=2");
    }

    #[test]
    fn test_comments_and_magics_dropped() {
        let code = scan(&["# comment\na=1\n%matplotlib inline\n!pip install x\nb=2  # kept"])
            .unwrap();
        assert_eq!(code, "a=1\nb=2  # kept");
    }

    #[test]
    fn test_ignore_annotation_and_tags() {
        let cells = vec![
            JupyterCell::code("a=1"),
            JupyterCell::code("# nuclio: ignore\nb=2"),
            JupyterCell::code("c=3").with_tags(["nuclio-ignore"]),
            JupyterCell::code("d=4").with_tags(["scratch"]),
            JupyterCell::markdown("e=5"),
        ];
        let settings = ExportSettings {
            ignored_tags: vec!["scratch".to_string()],
            ..Default::default()
        };
        assert_eq!(scan_with(settings, cells).unwrap(), "a=1");
    }

    #[test]
    fn test_ignored_cell_runs_no_directives() {
        let cells = vec![JupyterCell::code("%nuclio bogus").with_tags(["nuclio-ignore"])];
        assert!(scan_with(ExportSettings::default(), cells).is_ok());
    }

    #[test]
    fn test_start_code_discards_earlier_cells() {
        let code = scan(&["a=1", "b=2", "# start-code\nc=3", "d=4"]).unwrap();
        assert_eq!(code, "c=3\nd=4");
    }

    #[test]
    fn test_end_code_truncates() {
        let code = scan(&["a=1", "b=2", "# end-code\nc=3", "d=4"]).unwrap();
        assert_eq!(code, "a=1\nb=2");
    }

    #[test]
    fn test_start_and_end_split_cells() {
        let code = scan(&[
            "a=1",
            "x=0\n# nuclio: start-code\nb=2",
            "c=3\n# nuclio: end-code\nd=4",
            "e=5",
        ])
        .unwrap();
        assert_eq!(code, "b=2\nc=3");
    }

    #[test]
    fn test_reopen_after_end_keeps_fragments() {
        let code = scan(&[
            "# start-code\na=1",
            "# end-code\nskip=1",
            "# start-code\nb=2",
            "# end-code",
        ])
        .unwrap();
        assert_eq!(code, "a=1\nb=2");
    }

    #[test]
    fn test_start_and_end_in_one_cell() {
        let code = scan(&["a=1", "x=0\n# start-code\nb=2\n# end-code\ny=3", "z=4"]).unwrap();
        assert_eq!(code, "b=2");
    }

    #[test]
    fn test_duplicate_start_is_error() {
        let err = scan(&["# start-code\na=1", "# start-code\nb=2"]).unwrap_err();
        assert!(matches!(err, Error::State { .. }));
        assert!(err.to_string().contains("multiple consecutive start-code"));
    }

    #[test]
    fn test_duplicate_end_is_error() {
        let err = scan(&["a=1\n# end-code", "# end-code"]).unwrap_err();
        assert!(err.to_string().contains("multiple consecutive end-code"));
    }

    #[test]
    fn test_end_before_start_in_cell_is_error() {
        let err = scan(&["a=1\n# end-code\nb=2\n# start-code\nc=3"]).unwrap_err();
        assert!(matches!(err, Error::State { .. }));
    }

    #[test]
    fn test_end_then_start_closes_open_region() {
        let code = scan(&["# start-code\na=1", "b=2\n# end-code\nx=1\n# start-code\nc=3"]).unwrap();
        assert_eq!(code, "a=1\nb=2\nc=3");
    }

    #[test]
    fn test_named_target_region() {
        let code = scan_target(
            "my-fn",
            &[
                "a=1",
                "# nuclio: start-code my-fn\nb=2",
                "# nuclio: end-code my-fn\nc=3",
                "d=4",
            ],
        )
        .unwrap();
        assert_eq!(code, "b=2");
    }

    #[test]
    fn test_named_boundaries_ignored_without_target() {
        let code = scan(&["a=1", "# nuclio: start-code my-fn\nb=2", "# nuclio: end-code my-fn\nc=3"])
            .unwrap();
        assert_eq!(code, "a=1\nb=2\nc=3");
    }

    #[test]
    fn test_target_without_boundaries_captures_everything() {
        let code = scan_target("other", &["a=1", "# start-code\nb=2"]).unwrap();
        assert_eq!(code, "a=1\nb=2");
    }

    #[test]
    fn test_empty_target_falls_back_to_nameless() {
        let code = scan_target("my-fn", &["# nuclio: ignore\na=1", "# start-code my-fn"]).unwrap();
        assert_eq!(code, "");
        let code = scan_target("my-fn", &["# end-code my-fn", "a=1", "# start-code\nb=2"]).unwrap();
        assert_eq!(code, "b=2");
    }

    #[test]
    fn test_duplicate_named_start_is_error() {
        let err = scan_target(
            "my-fn",
            &["# start-code my-fn\na=1", "# start-code my-fn\nb=2"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("\"my-fn\""));
    }

    #[test]
    fn test_mixed_named_and_nameless_in_one_cell() {
        let sources = [
            "a=1",
            "# start-code\nb=2\n# nuclio: start-code my-fn\nc=3",
            "d=4\n# end-code my-fn\n# end-code\ne=5",
        ];
        assert_eq!(scan(&sources).unwrap(), "b=2\nc=3\nd=4");
        assert_eq!(scan_target("my-fn", &sources).unwrap(), "c=3\nd=4");
    }

    #[test]
    fn test_line_directive_in_code_cell() {
        let registry = DirectiveRegistry::standard();
        let settings = ExportSettings::default();
        let mut ctx = BuildContext::with_env(settings.clone(), EnvSource::fixed::<_, &str, &str>([]));
        let notebook = JupyterNotebook::from_code_sources(["x = 1\n%nuclio env USER=daffy\ny = 2"]);
        let fragments = CellScanner::new(&registry, &settings)
            .scan(&notebook, &mut ctx)
            .unwrap();
        assert_eq!(fragments, ["x = 1\ny = 2"]);
        assert_eq!(ctx.config.env_value("USER"), Some("daffy"));
    }

    #[test]
    fn test_directives_outside_region_still_apply() {
        let registry = DirectiveRegistry::standard();
        let settings = ExportSettings::default();
        let mut ctx = BuildContext::with_env(settings.clone(), EnvSource::fixed::<_, &str, &str>([]));
        let notebook = JupyterNotebook::from_code_sources([
            "%nuclio config spec.maxReplicas = 3",
            "# start-code\na=1",
        ]);
        let fragments = CellScanner::new(&registry, &settings)
            .scan(&notebook, &mut ctx)
            .unwrap();
        assert_eq!(fragments, ["a=1"]);
        assert_eq!(ctx.config.get("spec.maxReplicas"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_cell_directive_drops_preceding_lines() {
        let code = scan(&["before = 1\n%%nuclio handler\n# note\nx = 1\n'Hello ' + event.body"])
            .unwrap();
        assert_eq!(
            code,
            "def handler(context, event):\n    x = 1\n    return 'Hello ' + event.body"
        );
    }

    #[test]
    fn test_unknown_directive_aborts() {
        let err = scan(&["a=1", "%nuclio deplyo"]).unwrap_err();
        assert!(matches!(err, Error::UnknownDirective { .. }));
    }

    #[test]
    fn test_marker_without_command() {
        assert!(matches!(scan(&["%nuclio"]), Err(Error::DirectiveSyntax(_))));
    }
}
