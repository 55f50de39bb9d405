//! Secret commands: show, insert, rm, mv, cp, ls.

use std::io::{self, Read};
use std::path::PathBuf;

use dialoguer::Password;
use zeroize::Zeroizing;

use crate::cli::context::Context;
use crate::cli::output;
use crate::cli::prompt::TerminalConfirm;
use crate::core::options::Confirm;
use crate::core::secret::Secret;
use crate::error::{CipherError, Result, SecretError};

/// Print a secret, its password, or one YAML key.
pub fn show(config: Option<PathBuf>, name: &str, key: Option<&str>, password: bool) -> Result<()> {
    let ctx = Context::open(config)?;
    let secret = ctx.root.get(name, &ctx.opts)?;
    match (key, password) {
        (Some(key), _) => println!("{}", secret.value(key)?),
        (None, true) => println!("{}", secret.password()),
        (None, false) => print!("{}", secret),
    }
    Ok(())
}

/// Insert a secret from stdin or an interactive prompt.
pub fn insert(config: Option<PathBuf>, name: &str, force: bool) -> Result<()> {
    let ctx = Context::open(config)?;

    if ctx.root.exists(name)
        && !force
        && !TerminalConfirm.confirm(&format!("{} already exists. Overwrite?", name))
    {
        return Err(SecretError::AlreadyExists(name.to_string()).into());
    }

    let secret = if !atty::is(atty::Stream::Stdin) {
        // piped input: first line is the password, the rest is the body
        let mut input = Zeroizing::new(Vec::new());
        io::stdin().read_to_end(&mut input)?;
        Secret::parse(&input).0
    } else {
        let pass = Password::new()
            .with_prompt(format!("Password for {}", output::name(name)))
            .with_confirmation("Repeat", "passwords don't match")
            .interact()
            .map_err(|e| CipherError::Passphrase(e.to_string()))?;
        let pass = Zeroizing::new(pass);
        Secret::new(&pass, "")
    };

    let opts = ctx.opts.clone().with_reason("Inserted from the command line");
    ctx.root.set(name, &secret, &opts)?;
    output::success(&format!("saved {}", output::name(name)));
    Ok(())
}

/// Remove a secret, or a directory with `--recursive`.
pub fn rm(config: Option<PathBuf>, name: &str, recursive: bool, force: bool) -> Result<()> {
    let ctx = Context::open(config)?;
    let what = if recursive { "directory" } else { "secret" };
    if !force && !TerminalConfirm.confirm(&format!("Remove {} {}?", what, name)) {
        output::warn("aborted");
        return Ok(());
    }
    if recursive {
        ctx.root.prune(name, &ctx.opts)?;
    } else {
        ctx.root.delete(name, &ctx.opts)?;
    }
    output::success(&format!("removed {}", output::name(name)));
    Ok(())
}

pub fn mv(config: Option<PathBuf>, from: &str, to: &str, force: bool) -> Result<()> {
    let ctx = Context::open(config)?;
    let mut opts = ctx.opts.clone();
    opts.force = force;
    ctx.root.rename(from, to, &opts)?;
    output::success(&format!("moved {} to {}", output::name(from), output::name(to)));
    Ok(())
}

pub fn cp(config: Option<PathBuf>, from: &str, to: &str, force: bool) -> Result<()> {
    let ctx = Context::open(config)?;
    let mut opts = ctx.opts.clone();
    opts.force = force;
    ctx.root.copy(from, to, &opts)?;
    output::success(&format!("copied {} to {}", output::name(from), output::name(to)));
    Ok(())
}

/// Print the tree of secrets, or full names with `--flat`.
pub fn ls(config: Option<PathBuf>, prefix: &str, flat: bool) -> Result<()> {
    let ctx = Context::open(config)?;
    if flat {
        for name in ctx.root.list(prefix)? {
            println!("{}", name);
        }
        return Ok(());
    }

    let tree = ctx.root.tree()?;
    let prefix = prefix.trim_end_matches('/');
    let Some(node) = tree.find(prefix) else {
        return Err(SecretError::NotFound(prefix.to_string()).into());
    };
    let title = if prefix.is_empty() { "cellar" } else { prefix };
    print!("{}", node.render(title));
    Ok(())
}
