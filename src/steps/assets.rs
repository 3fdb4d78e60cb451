use std::time::Instant;

use camino::Utf8PathBuf;

use crate::core::Environment;
use crate::task::{Action, OutputClaim};

/// Copies a source directory into the output tree verbatim, recursively.
/// Files whose content is already present at the destination are skipped, so
/// re-running a build over unchanged sources rewrites nothing.
pub struct CopyDir {
    what: &'static str,
    src: Utf8PathBuf,
    dst: Utf8PathBuf,
}

impl CopyDir {
    pub fn new(what: &'static str, src: Utf8PathBuf, dst: Utf8PathBuf) -> Self {
        Self { what, src, dst }
    }
}

impl Action for CopyDir {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        if !self.src.exists() {
            anyhow::bail!("source directory '{}' does not exist", self.src);
        }

        let written = crate::io::copy_tree(&self.src, &self.dst)?;
        tracing::info!(
            "copied {} {} files {}",
            written,
            self.what,
            crate::io::as_overhead(s)
        );

        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::tree(self.dst.clone())]
    }
}
