//! Type aliases for domain concepts.

/// A mount alias in the root store namespace (e.g. `work/team`).
pub type MountAlias = String;
