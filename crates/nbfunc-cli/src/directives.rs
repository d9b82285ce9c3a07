//! Directives command implementation for nbfunc CLI.

use nbfunc_core::DirectiveRegistry;

/// Print help for one directive, or the directive summary.
pub fn execute(name: Option<&str>) -> anyhow::Result<()> {
    let registry = DirectiveRegistry::standard();
    print!("{}", registry.help(name)?);
    Ok(())
}
