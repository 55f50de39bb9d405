//! Fsck command.

use std::path::PathBuf;

use crate::cli::context::Context;
use crate::cli::output;
use crate::core::store::FindingKind;
use crate::error::Result;

/// Check all stores at or below `prefix`. Exits non-zero on errors.
pub fn execute(config: Option<PathBuf>, prefix: &str, check: bool, force: bool) -> Result<()> {
    let ctx = Context::open(config)?;
    let mut opts = ctx.opts.clone();
    opts.check = check;
    opts.force = force;

    let report = ctx.root.fsck(prefix, &opts)?;
    for finding in &report.findings {
        let line = finding.to_string();
        match finding.kind {
            FindingKind::Undecryptable | FindingKind::CheckFailed => output::error(&line),
            _ if finding.fixed => output::success(&line),
            _ => output::warn(&line),
        }
    }

    output::kv("checked:", output::plural(report.checked, "secret"));
    output::kv("errors: ", report.errors());
    output::kv("warnings:", report.warnings());
    output::kv("fixed:  ", report.fixed());
    if report.errors() > 0 {
        std::process::exit(1);
    }
    if report.is_clean() {
        output::success("no problems found");
    }
    Ok(())
}
