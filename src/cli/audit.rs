//! Audit command.
//!
//! Decrypts every secret and reports weak or reused passwords.

use std::path::PathBuf;

use crate::cli::context::Context;
use crate::cli::output;
use crate::core::audit;
use crate::error::Result;

pub fn execute(config: Option<PathBuf>, prefix: &str) -> Result<()> {
    let ctx = Context::open(config)?;
    let report = audit::audit(&ctx.root, prefix, &ctx.opts)?;

    if report.is_clean() {
        output::success(&format!("{} checked, no issues", output::plural(report.checked, "secret")));
        return Ok(());
    }

    output::warn(&format!(
        "{} with issues (of {})",
        output::plural(report.entries.len(), "secret"),
        report.checked
    ));
    for entry in &report.entries {
        for issue in &entry.issues {
            output::list_item(&format!("{}: {}", output::name(&entry.name), issue));
        }
    }
    std::process::exit(1);
}
