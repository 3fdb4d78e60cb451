//! The task abstractions shared by every entry in the registry.
//!
//! A task is either an [`Action`] (a leaf unit of work wrapping exactly one
//! transformation) or a composite referencing other tasks by name. Both kinds
//! signal completion the same way: the `Result` returned to the executor.

use std::fmt::Debug;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::core::Environment;

/// A leaf unit of work.
///
/// Implementations read from their input locations, apply one transformation,
/// and write below the locations they [claim](Action::claims). Partial writes
/// on failure are not rolled back; `rebuild` restores a consistent tree.
pub trait Action: Send + Sync {
    fn run(&self, env: &Environment) -> anyhow::Result<()>;

    /// The output locations this action may write (or delete).
    ///
    /// Claims of actions that can run concurrently under some parallel
    /// composite must be pairwise disjoint; the registry validates this at
    /// construction time. Actions without filesystem output claim nothing.
    fn claims(&self) -> Vec<OutputClaim> {
        Vec::new()
    }
}

/// One registered task: a leaf action or a composite over other task names.
#[derive(Clone)]
pub enum TaskKind {
    /// A leaf unit of work.
    Action(Arc<dyn Action>),
    /// Members run in order; the first failure aborts the rest.
    Series(Vec<&'static str>),
    /// Members start concurrently; the composite joins all of them and then
    /// reports the first failure in declaration order, if any.
    Parallel(Vec<&'static str>),
    /// Another name for an existing task.
    Alias(&'static str),
}

impl Debug for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Action(_) => write!(f, "Action(*)"),
            TaskKind::Series(members) => f.debug_tuple("Series").field(members).finish(),
            TaskKind::Parallel(members) => f.debug_tuple("Parallel").field(members).finish(),
            TaskKind::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
        }
    }
}

/// Which files within a claimed directory an action owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    /// Every file.
    All,
    /// Files with the given extension.
    Ext(&'static str),
    /// Exactly the listed files (paths relative to the claim root).
    Only(Vec<Utf8PathBuf>),
    /// Every file except the listed ones (paths relative to the claim root).
    Except(Vec<Utf8PathBuf>),
}

/// A declared output location: a directory plus a file selector.
///
/// Non-recursive claims cover only files directly inside `root`, so a claim
/// on the output root does not collide with claims on its subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputClaim {
    pub root: Utf8PathBuf,
    pub recursive: bool,
    pub select: Select,
}

impl OutputClaim {
    pub fn tree(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            select: Select::All,
        }
    }

    pub fn ext(root: impl Into<Utf8PathBuf>, recursive: bool, ext: &'static str) -> Self {
        Self {
            root: root.into(),
            recursive,
            select: Select::Ext(ext),
        }
    }

    pub fn files<I>(root: impl Into<Utf8PathBuf>, files: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Utf8PathBuf>,
    {
        Self {
            root: root.into(),
            recursive: true,
            select: Select::Only(files.into_iter().map(Into::into).collect()),
        }
    }

    pub fn all_except<I>(root: impl Into<Utf8PathBuf>, files: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Utf8PathBuf>,
    {
        Self {
            root: root.into(),
            recursive: true,
            select: Select::Except(files.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether two claims may write the same file.
    ///
    /// Conservative: answers `true` whenever disjointness cannot be shown
    /// from the declared structure alone.
    pub fn overlaps(&self, other: &OutputClaim) -> bool {
        if self.root == other.root {
            return selects_intersect(&self.select, &other.select);
        }
        if other.root.starts_with(&self.root) {
            return covers_descendant(self, other);
        }
        if self.root.starts_with(&other.root) {
            return covers_descendant(other, self);
        }
        false
    }

    /// The common path both claims touch, for diagnostics.
    pub fn overlap_root(&self, other: &OutputClaim) -> Utf8PathBuf {
        if other.root.starts_with(&self.root) {
            other.root.clone()
        } else {
            self.root.clone()
        }
    }
}

/// `outer.root` is a strict ancestor of `inner.root`: does the outer claim
/// reach files inside the inner one?
fn covers_descendant(outer: &OutputClaim, inner: &OutputClaim) -> bool {
    if !outer.recursive {
        return false;
    }

    match &outer.select {
        Select::All | Select::Except(_) => true,
        Select::Ext(ext) => select_may_have_ext(&inner.select, ext),
        Select::Only(files) => files.iter().any(|file| {
            let absolute = outer.root.join(file);
            match absolute.strip_prefix(&inner.root) {
                Ok(rel) => select_matches_file(&inner.select, rel),
                Err(_) => false,
            }
        }),
    }
}

fn selects_intersect(a: &Select, b: &Select) -> bool {
    use Select::*;

    match (a, b) {
        (All, _) | (_, All) => true,
        (Except(_), Except(_)) => true,
        (Ext(x), Ext(y)) => x == y,
        (Ext(x), Only(files)) | (Only(files), Ext(x)) => {
            files.iter().any(|f| f.extension() == Some(*x))
        }
        // Unlisted files of any extension remain claimed by `Except`.
        (Ext(_), Except(_)) | (Except(_), Ext(_)) => true,
        (Only(xs), Only(ys)) => xs.iter().any(|x| ys.contains(x)),
        (Only(files), Except(excluded)) | (Except(excluded), Only(files)) => {
            files.iter().any(|f| !excluded.contains(f))
        }
    }
}

fn select_may_have_ext(select: &Select, ext: &str) -> bool {
    match select {
        Select::All | Select::Except(_) => true,
        Select::Ext(e) => *e == ext,
        Select::Only(files) => files.iter().any(|f| f.extension() == Some(ext)),
    }
}

fn select_matches_file(select: &Select, file: &Utf8Path) -> bool {
    match select {
        Select::All => true,
        Select::Ext(e) => file.extension() == Some(*e),
        Select::Only(files) => files.iter().any(|f| f == file),
        Select::Except(excluded) => !excluded.iter().any(|f| f == file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrelated_roots_are_disjoint() {
        let a = OutputClaim::tree("dist/img");
        let b = OutputClaim::tree("dist/fonts");
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_nested_trees_overlap() {
        let a = OutputClaim::tree("dist");
        let b = OutputClaim::tree("dist/config");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_non_recursive_root_skips_subdirectories() {
        // Markup lands directly in the output root; category directories
        // below it belong to other actions.
        let markup = OutputClaim::ext("dist", false, "html");
        let config = OutputClaim::tree("dist/config");
        assert!(!markup.overlaps(&config));
    }

    #[test]
    fn test_extension_claims() {
        let html = OutputClaim::ext("dist", false, "html");
        let css = OutputClaim::ext("dist", false, "css");
        assert!(!html.overlaps(&css));
        assert!(html.overlaps(&OutputClaim::ext("dist", false, "html")));
    }

    #[test]
    fn test_except_against_listed_files() {
        let strip = OutputClaim::all_except("dist/js", ["bundle.js", "bundle.js.map"]);
        let minify = OutputClaim::files("dist/js", ["bundle.js"]);
        assert!(!strip.overlaps(&minify));

        let compile = OutputClaim::tree("dist/js");
        assert!(strip.overlaps(&compile));
    }

    #[test]
    fn test_listed_file_under_descendant_root() {
        let outer = OutputClaim::files("dist", ["js/bundle.js"]);
        let inner = OutputClaim::files("dist/js", ["bundle.js"]);
        assert!(outer.overlaps(&inner));

        let other = OutputClaim::files("dist/js", ["bundle.js.map"]);
        assert!(!outer.overlaps(&other));
    }
}
