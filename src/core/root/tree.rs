//! Directory tree of secret names, with mounts as marked subtrees.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::core::constants::SEP;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tree {
    pub children: BTreeMap<String, Tree>,
    /// A secret exists at this node.
    pub leaf: bool,
    /// Set if this node is a mount point.
    pub mount: Option<PathBuf>,
}

impl Tree {
    /// Add a secret name, creating intermediate directories.
    pub fn insert(&mut self, name: &str) {
        let mut node = self;
        for part in name.split(SEP).filter(|p| !p.is_empty()) {
            node = node.children.entry(part.to_string()).or_default();
        }
        node.leaf = true;
    }

    /// Replace the subtree at `alias` with an empty mount node and return it.
    pub fn mount(&mut self, alias: &str, path: &Path) -> &mut Tree {
        let mut node = self;
        for part in alias.split(SEP).filter(|p| !p.is_empty()) {
            node = node.children.entry(part.to_string()).or_default();
        }
        *node = Tree {
            mount: Some(path.to_path_buf()),
            ..Tree::default()
        };
        node
    }

    /// The subtree at `prefix`, if any.
    pub fn find(&self, prefix: &str) -> Option<&Tree> {
        let mut node = self;
        for part in prefix.split(SEP).filter(|p| !p.is_empty()) {
            node = node.children.get(part)?;
        }
        Some(node)
    }

    /// Full names of all secrets, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let full = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}{}{}", prefix, SEP, name)
            };
            if child.leaf {
                out.push(full.clone());
            }
            child.collect(&full, out);
        }
    }

    /// Render like `tree(1)` under a title line.
    pub fn render(&self, title: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", title);
        self.render_into("", &mut out);
        out
    }

    fn render_into(&self, indent: &str, out: &mut String) {
        let count = self.children.len();
        for (i, (name, child)) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let (branch, next) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            let label = match &child.mount {
                Some(path) => format!("{} ({})", name, path.display()),
                None if !child.children.is_empty() => format!("{}{}", name, SEP),
                None => name.clone(),
            };
            let _ = writeln!(out, "{}{}{}", indent, branch, label);
            child.render_into(&format!("{}{}", indent, next), out);
        }
    }
}
