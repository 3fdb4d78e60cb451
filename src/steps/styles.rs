use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use camino::Utf8PathBuf;
use glob::GlobError;
use rayon::iter::{ParallelBridge, ParallelIterator};

use crate::core::Environment;
use crate::paths::Paths;
use crate::task::{Action, OutputClaim};

/// Compiles every non-partial stylesheet source into the output stylesheet
/// directory, preserving the directory structure below the source root.
/// Partials (`_*.scss`) are excluded by the source glob and reachable only
/// through their importers.
pub struct CompileStylesheets {
    sources: String,
    base: Utf8PathBuf,
    out: Utf8PathBuf,
}

impl CompileStylesheets {
    pub fn new(paths: &Paths) -> Self {
        Self {
            sources: paths.styles.sources.clone(),
            base: paths.styles.dir.clone(),
            out: paths.css_dir(),
        }
    }

    fn compile(&self, entry: Result<PathBuf, GlobError>) -> anyhow::Result<()> {
        let path = Utf8PathBuf::try_from(entry?)?;

        let opts = grass::Options::default();
        let css = grass::from_path(&path, &opts).map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let rel = path.strip_prefix(&self.base).unwrap_or(&path);
        let target = self.out.join(rel).with_extension("css");

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&target, css)?;

        tracing::debug!("compiled {path} -> {target}");
        Ok(())
    }
}

impl Action for CompileStylesheets {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        let compiled = glob::glob(&self.sources)?
            .par_bridge()
            .map(|entry| self.compile(entry).map(|()| 1usize))
            .try_reduce(|| 0, |a, b| Ok(a + b))?;

        tracing::info!("compiled {} stylesheets {}", compiled, crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::ext(self.out.clone(), true, "css")]
    }
}

/// Minifies every compiled stylesheet in place.
pub struct MinifyStylesheets {
    dir: Utf8PathBuf,
}

impl MinifyStylesheets {
    pub fn new(paths: &Paths) -> Self {
        Self { dir: paths.css_dir() }
    }
}

impl Action for MinifyStylesheets {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();
        let pattern = self.dir.join("**/*.css");

        let minified = glob::glob(pattern.as_str())?
            .par_bridge()
            .map(|entry| -> anyhow::Result<usize> {
                let path = Utf8PathBuf::try_from(entry?)?;
                let source = fs::read_to_string(&path)?;
                let minified = minify_css(&source)
                    .map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
                fs::write(&path, minified)?;
                Ok(1)
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))?;

        tracing::info!("minified {} stylesheets {}", minified, crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::ext(self.dir.clone(), true, "css")]
    }
}

fn minify_css(source: &str) -> Result<String, String> {
    use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

    let mut sheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| e.to_string())?;

    let out = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(out.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Mode;

    fn env() -> Environment {
        Environment {
            mode: Mode::Build,
            verbose: false,
        }
    }

    #[test]
    fn test_minify_css_drops_whitespace_and_comments() {
        let out = minify_css("/* note */ body {  color : #ff0000 ; }").unwrap();
        assert!(!out.contains("note"));
        assert!(out.len() < "/* note */ body {  color : #ff0000 ; }".len());
        assert!(out.contains("body"));
    }

    #[test]
    fn test_compile_writes_css_next_to_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("styles/pages")).unwrap();
        fs::write(root.join("styles/pages/home.scss"), "$c: #abc;\nbody { color: $c; }\n").unwrap();

        let compile = CompileStylesheets {
            sources: format!("{}/styles/**/[!_]*.scss", root),
            base: root.join("styles"),
            out: root.join("dist/styles"),
        };

        compile.run(&env()).unwrap();

        let css = fs::read_to_string(root.join("dist/styles/pages/home.css")).unwrap();
        assert!(css.contains("color"));
    }

    #[test]
    fn test_partials_are_not_compiled_standalone() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("styles")).unwrap();
        fs::write(root.join("styles/_mixins.scss"), "@mixin hide { display: none; }\n").unwrap();
        fs::write(root.join("styles/site.scss"), "body { margin: 0; }\n").unwrap();

        let compile = CompileStylesheets {
            sources: format!("{}/styles/**/[!_]*.scss", root),
            base: root.join("styles"),
            out: root.join("dist/styles"),
        };

        compile.run(&env()).unwrap();

        assert!(root.join("dist/styles/site.css").exists());
        assert!(!root.join("dist/styles/_mixins.css").exists());
    }
}
