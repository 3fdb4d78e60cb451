//! Watch mode: a resident process that re-runs a pipeline whenever one of
//! its source files changes.
//!
//! Filesystem events are debounced (250 ms) and matched against each watch
//! target's source pattern; every matching batch triggers the corresponding
//! pipeline run. Runs happen one batch at a time inside the loop, and a
//! failing pipeline never stops the watcher.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::new_debouncer;

use crate::core::Environment;
use crate::error::WatchError;
use crate::executor::Executor;
use crate::registry::Registry;

/// A source pattern wired to the task it re-triggers.
pub struct WatchTarget {
    pub pattern: String,
    pub task: &'static str,
}

struct ResolvedTarget {
    matcher: Pattern,
    task: &'static str,
}

/// Watch the targets' sources forever, re-running their tasks on change.
pub fn watch(
    registry: &Registry,
    targets: &[WatchTarget],
    env: Environment,
) -> Result<(), WatchError> {
    let mut roots = HashSet::new();
    let mut resolved = Vec::new();

    for target in targets {
        match resolve_watch_path(&target.pattern) {
            Ok((root, matcher)) => {
                roots.insert(root);
                resolved.push(ResolvedTarget {
                    matcher,
                    task: target.task,
                });
            }
            Err(e) => {
                tracing::error!("failed to resolve '{}': {}", target.pattern, e);
            }
        }
    }

    if resolved.is_empty() {
        return Err(WatchError::NothingToWatch);
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(250), None, tx)?;

    for root in collapse_watch_paths(roots) {
        tracing::info!("watching {}", root);
        debouncer.watch(root.as_std_path(), RecursiveMode::Recursive)?;
    }

    let executor = Executor::new(registry, env);

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<&Path> = events
                    .iter()
                    .filter(|de| {
                        matches!(
                            de.event.kind,
                            EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
                        )
                    })
                    .flat_map(|de| de.event.paths.iter().map(Path::new))
                    .collect();

                for task in matching_tasks(&resolved, &changed) {
                    tracing::info!("change detected, running '{}'", task);
                    if let Err(e) = executor.run(task) {
                        tracing::error!("'{}' failed, still watching:\n{}", task, e);
                    }
                }
            }
            Ok(Err(errors)) => {
                for e in errors {
                    tracing::error!("watch error: {e:?}");
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Tasks to run for a batch of changed paths, in target declaration order,
/// each at most once.
fn matching_tasks<'a>(targets: &'a [ResolvedTarget], changed: &[&Path]) -> Vec<&'a str> {
    targets
        .iter()
        .filter(|target| changed.iter().any(|path| target.matcher.matches_path(path)))
        .map(|target| target.task)
        .collect()
}

/// Splits a glob string into a canonicalized static root path (for watching)
/// and a compiled absolute pattern (for matching event paths).
fn resolve_watch_path(glob_str: &str) -> Result<(Utf8PathBuf, Pattern), WatchError> {
    let path = Utf8Path::new(glob_str);

    // Split the path into a static root and a dynamic suffix containing the
    // wildcards.
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    // The static root must exist on disk to be watchable.
    let absolute_root = root_part.canonicalize_utf8()?;

    // A concrete file is watched through its parent so atomic writes are
    // caught.
    let (watch_root, match_pattern) = if suffix_part.as_str().is_empty() && absolute_root.is_file()
    {
        let parent = absolute_root
            .parent()
            .unwrap_or(&absolute_root)
            .to_path_buf();
        (parent, absolute_root)
    } else {
        let pattern = absolute_root.join(&suffix_part);
        (absolute_root, pattern)
    };

    let pattern = Pattern::new(match_pattern.as_str())?;

    Ok((watch_root, pattern))
}

/// Reduces a set of paths to the minimal set of watch roots. Watching is
/// recursive, so a path covered by a previously accepted ancestor is dropped.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered: Vec<Utf8PathBuf> = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_resolve_directory_wildcard() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("styles")).unwrap();

        let glob = format!("{root}/styles/**/*.scss");
        let (watch, pattern) = resolve_watch_path(&glob).unwrap();

        let canonical = root.canonicalize_utf8().unwrap();
        assert_eq!(watch, canonical.join("styles"));
        assert!(pattern.matches_path(canonical.join("styles/a/b.scss").as_std_path()));
        assert!(!pattern.matches_path(canonical.join("styles/a/b.css").as_std_path()));
    }

    #[test]
    fn test_resolve_missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        let glob = format!("{root}/absent/**/*.ts");
        assert!(resolve_watch_path(&glob).is_err());
    }

    #[test]
    fn test_collapse_watch_paths() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/a"));
        paths.insert(Utf8PathBuf::from("/a/b"));
        paths.insert(Utf8PathBuf::from("/a/b/c"));
        paths.insert(Utf8PathBuf::from("/b"));
        paths.insert(Utf8PathBuf::from("/c/d"));

        let collapsed = collapse_watch_paths(paths);

        assert_eq!(
            collapsed,
            vec![
                Utf8PathBuf::from("/a"),
                Utf8PathBuf::from("/b"),
                Utf8PathBuf::from("/c/d")
            ]
        );
    }

    #[test]
    fn test_collapse_keeps_similar_named_siblings() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/foo"));
        paths.insert(Utf8PathBuf::from("/foo-bar"));

        let collapsed = collapse_watch_paths(paths);

        assert_eq!(
            collapsed,
            vec![Utf8PathBuf::from("/foo"), Utf8PathBuf::from("/foo-bar")]
        );
    }

    #[test]
    fn test_matching_tasks_order_and_dedup() {
        let targets = vec![
            ResolvedTarget {
                matcher: Pattern::new("/src/ts/**/*.ts").unwrap(),
                task: "build-js",
            },
            ResolvedTarget {
                matcher: Pattern::new("/src/styles/**/*.scss").unwrap(),
                task: "build-styles",
            },
        ];

        let scss = Path::new("/src/styles/main.scss");
        let ts_a = Path::new("/src/ts/app.ts");
        let ts_b = Path::new("/src/ts/util.ts");

        assert_eq!(
            matching_tasks(&targets, &[scss, ts_a, ts_b]),
            vec!["build-js", "build-styles"]
        );
        assert_eq!(matching_tasks(&targets, &[ts_a]), vec!["build-js"]);
        assert!(matching_tasks(&targets, &[Path::new("/src/readme.md")]).is_empty());
    }
}
