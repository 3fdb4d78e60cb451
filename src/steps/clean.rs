use std::time::Instant;

use camino::Utf8PathBuf;

use crate::core::Environment;
use crate::paths::Paths;
use crate::task::{Action, OutputClaim};

/// Deletes every generated location: the output tree, the legacy
/// stylesheet-compiler cache, and the artifact cache. Absent paths are a
/// quiet success, so running it twice in a row is fine.
pub struct Clean {
    targets: Vec<Utf8PathBuf>,
}

impl Clean {
    pub fn new(paths: &Paths) -> Self {
        Self {
            targets: vec![
                paths.dist.clone(),
                paths.styles.cache.clone(),
                paths.cache.clone(),
            ],
        }
    }
}

impl Action for Clean {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        for target in &self.targets {
            if crate::io::remove_all(target)? {
                tracing::debug!("removed {target}");
            }
        }

        tracing::info!("cleaned generated output {}", crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        self.targets.iter().cloned().map(OutputClaim::tree).collect()
    }
}
