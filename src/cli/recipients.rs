//! Recipients command.

use std::path::PathBuf;

use crate::cli::context::Context;
use crate::cli::output;
use crate::error::Result;

pub fn ls(config: Option<PathBuf>, store: &str) -> Result<()> {
    let ctx = Context::open(config)?;
    let store = ctx.root.store(store)?;
    for id in store.recipients("")? {
        println!("{}", ctx.crypto.format_key(&id));
    }
    Ok(())
}

/// Add a recipient; every secret in the store is re-encrypted.
pub fn add(config: Option<PathBuf>, store: &str, id: &str) -> Result<()> {
    let ctx = Context::open(config)?;
    let target = ctx.root.store(store)?;
    target.add_recipient(id, &ctx.opts)?;
    output::success(&format!(
        "added {} and re-encrypted {}",
        output::name(id),
        output::plural(target.list("")?.len(), "secret")
    ));
    Ok(())
}

/// Remove a recipient; every secret in the store is re-encrypted.
///
/// Old ciphertext in the repository history stays readable for them.
pub fn rm(config: Option<PathBuf>, store: &str, id: &str) -> Result<()> {
    let ctx = Context::open(config)?;
    let target = ctx.root.store(store)?;
    target.remove_recipient(id, &ctx.opts)?;
    output::success(&format!("removed {}", output::name(id)));
    output::hint("rotate the secrets they could read; history still holds old ciphertext");
    Ok(())
}
