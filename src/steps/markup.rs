use std::fs;
use std::time::Instant;

use camino::Utf8PathBuf;

use crate::core::Environment;
use crate::paths::Paths;
use crate::task::{Action, OutputClaim};

/// Minifies root-level markup files into the output root. The source pattern
/// is non-recursive; category directories below the output root belong to
/// other steps.
pub struct MinifyMarkup {
    sources: String,
    out: Utf8PathBuf,
}

impl MinifyMarkup {
    pub fn new(paths: &Paths) -> Self {
        Self {
            sources: paths.markup.clone(),
            out: paths.dist.clone(),
        }
    }
}

impl Action for MinifyMarkup {
    fn run(&self, env: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();
        let cfg = minify_html::Cfg::new();

        fs::create_dir_all(&self.out)?;

        let mut minified = 0;
        for entry in glob::glob(&self.sources)? {
            let path = Utf8PathBuf::try_from(entry?)?;
            let Some(name) = path.file_name() else {
                continue;
            };

            let source = fs::read(&path)?;
            let output = minify_html::minify(&source, &cfg);

            if env.verbose {
                tracing::debug!("{path}: {} -> {} bytes", source.len(), output.len());
            }

            fs::write(self.out.join(name), output)?;
            minified += 1;
        }

        tracing::info!("minified {} markup files {}", minified, crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::ext(self.out.clone(), false, "html")]
    }
}
