//! Runs a named task tree to completion on the rayon thread pool.
//!
//! Series members run in declaration order and the first failure aborts the
//! remainder. Parallel members are spawned into a rayon scope and the
//! composite joins all of them before reporting; a failing member never
//! cancels its siblings, so a parallel composite either succeeds completely
//! or fails after every member has come to rest.

use std::collections::HashMap;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::Level;

use crate::core::Environment;
use crate::error::BuildError;
use crate::registry::Registry;
use crate::task::TaskKind;

pub struct Executor<'a> {
    registry: &'a Registry,
    env: Environment,
    progress: MultiProgress,
    spinner_style: ProgressStyle,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a Registry, env: Environment) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .expect("Error setting progress bar template");

        Self {
            registry,
            env,
            progress: MultiProgress::new(),
            spinner_style,
        }
    }

    /// Execute the task registered under `name`.
    pub fn run(&self, name: &str) -> Result<(), BuildError> {
        let s = Instant::now();
        let result = self.run_named(name);

        match &result {
            Ok(()) => tracing::info!("finished '{}' {}", name, crate::io::as_overhead(s)),
            Err(e) => tracing::error!("'{}' failed:\n{}", name, e),
        }

        result
    }

    fn run_named(&self, name: &str) -> Result<(), BuildError> {
        let kind = self
            .registry
            .get(name)
            .ok_or_else(|| BuildError::UnknownTask(name.to_string()))?;

        match kind {
            TaskKind::Alias(target) => self.run_named(target),
            TaskKind::Series(members) => {
                for member in members {
                    self.run_named(member)?;
                }
                Ok(())
            }
            TaskKind::Parallel(members) => self.run_parallel(members),
            TaskKind::Action(action) => {
                let bar = self.progress.add(ProgressBar::new_spinner());
                bar.set_style(self.spinner_style.clone());
                bar.set_message(format!("Running {name}"));
                bar.enable_steady_tick(Duration::from_millis(100));

                let span = tracing::span!(Level::INFO, "task", name);
                let _enter = span.enter();

                // A panicking task must not take down parallel siblings that
                // are still writing their own outputs.
                let result =
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        action.run(&self.env)
                    })) {
                        Ok(result) => result,
                        Err(panic) => {
                            let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                                format!("Task panicked: {s}")
                            } else if let Some(s) = panic.downcast_ref::<String>() {
                                format!("Task panicked: {s}")
                            } else {
                                String::from("Task panicked with unknown payload")
                            };

                            Err(anyhow::anyhow!(msg))
                        }
                    };

                bar.finish_and_clear();

                result.map_err(|e| BuildError::Task(name.to_string(), e))
            }
        }
    }

    fn run_parallel(&self, members: &[&'static str]) -> Result<(), BuildError> {
        let (sender, receiver) = channel();

        rayon::scope(|s| {
            for &member in members {
                let sender = sender.clone();
                s.spawn(move |_| {
                    let result = self.run_named(member);
                    // The receiver outlives the scope, send cannot fail.
                    sender.send((member, result)).unwrap();
                });
            }
        });
        drop(sender);

        let mut results: HashMap<&str, Result<(), BuildError>> = receiver.iter().collect();

        // All members have completed; report the first failure in
        // declaration order so the outcome is deterministic.
        for member in members {
            if let Some(Err(e)) = results.remove(*member) {
                return Err(e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::core::Mode;
    use crate::task::Action;

    struct Count(Arc<AtomicUsize>);

    impl Action for Count {
        fn run(&self, _: &Environment) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fail;

    impl Action for Fail {
        fn run(&self, _: &Environment) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Panic;

    impl Action for Panic {
        fn run(&self, _: &Environment) -> anyhow::Result<()> {
            panic!("unexpected")
        }
    }

    fn env() -> Environment {
        Environment {
            mode: Mode::Build,
            verbose: false,
        }
    }

    #[test]
    fn test_series_aborts_on_failure() {
        let ran = Arc::new(AtomicUsize::new(0));

        let mut builder = Registry::builder();
        builder.action("first", Count(ran.clone()));
        builder.action("bad", Fail);
        builder.action("last", Count(ran.clone()));
        builder.series("all", ["first", "bad", "last"]);
        let registry = builder.finish().unwrap();

        let err = Executor::new(&registry, env()).run("all").unwrap_err();
        assert!(matches!(err, BuildError::Task(name, _) if name == "bad"));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_lets_siblings_finish() {
        let ran = Arc::new(AtomicUsize::new(0));

        let mut builder = Registry::builder();
        builder.action("bad", Fail);
        builder.action("a", Count(ran.clone()));
        builder.action("b", Count(ran.clone()));
        builder.parallel("all", ["bad", "a", "b"]);
        let registry = builder.finish().unwrap();

        let err = Executor::new(&registry, env()).run("all").unwrap_err();
        assert!(matches!(err, BuildError::Task(name, _) if name == "bad"));
        // Both siblings completed despite the failure.
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parallel_reports_first_failure_in_declaration_order() {
        let mut builder = Registry::builder();
        builder.action("x", Fail);
        builder.action("y", Fail);
        builder.parallel("all", ["x", "y"]);
        let registry = builder.finish().unwrap();

        let err = Executor::new(&registry, env()).run("all").unwrap_err();
        assert!(matches!(err, BuildError::Task(name, _) if name == "x"));
    }

    #[test]
    fn test_alias_resolves_to_target() {
        let ran = Arc::new(AtomicUsize::new(0));

        let mut builder = Registry::builder();
        builder.action("work", Count(ran.clone()));
        builder.alias("default", "work");
        let registry = builder.finish().unwrap();

        Executor::new(&registry, env()).run("default").unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let ran = Arc::new(AtomicUsize::new(0));

        let mut builder = Registry::builder();
        builder.action("bad", Panic);
        builder.action("good", Count(ran.clone()));
        builder.parallel("all", ["bad", "good"]);
        let registry = builder.finish().unwrap();

        let err = Executor::new(&registry, env()).run("all").unwrap_err();
        assert!(matches!(err, BuildError::Task(name, _) if name == "bad"));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_task_is_an_error() {
        let registry = Registry::builder().finish().unwrap();
        let err = Executor::new(&registry, env()).run("nope").unwrap_err();
        assert!(matches!(err, BuildError::UnknownTask(name) if name == "nope"));
    }

    #[test]
    fn test_nested_composites_run_every_leaf() {
        let ran = Arc::new(AtomicUsize::new(0));

        let mut builder = Registry::builder();
        builder.action("a", Count(ran.clone()));
        builder.action("b", Count(ran.clone()));
        builder.action("c", Count(ran.clone()));
        builder.parallel("inner", ["b", "c"]);
        builder.series("outer", ["a", "inner"]);
        let registry = builder.finish().unwrap();

        Executor::new(&registry, env()).run("outer").unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }
}
