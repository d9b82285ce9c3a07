//! `%nuclio` directives: parsing, the standard handlers and their registry.

mod handlers;
mod parser;
mod registry;

pub use handlers::{add_return, handler_code, parse_mount};
pub use parser::{
    AssignOp, Assignment, CELL_MAGIC, Directive, LINE_MAGIC, expand_vars, parse_assignment,
    parse_env_line, parse_invocation, split_args, value_lines,
};
pub use registry::{DirectiveFn, DirectiveRegistry, DirectiveSpec};
