//! The typed-script toolchain: dependency symlink, external compiler,
//! external bundler/minifier, and the intermediate-file strip.
//!
//! The compiler and bundler run as child processes with inherited stdio, so
//! their diagnostics reach the user unmodified; the orchestrator only adds
//! the failing task's name.

use std::fs;
use std::process::Command;
use std::time::Instant;

use anyhow::Context;
use camino::Utf8PathBuf;

use crate::core::Environment;
use crate::paths::Paths;
use crate::task::{Action, OutputClaim};

/// Symlinks the third-party dependency directory into the output tree, so
/// the bundler resolves imports relative to the compiled entry point.
pub struct SymlinkDeps {
    source: Utf8PathBuf,
    link: Utf8PathBuf,
}

impl SymlinkDeps {
    pub fn new(paths: &Paths) -> Self {
        Self {
            source: paths.node_modules.clone(),
            link: paths.node_modules_link(),
        }
    }
}

impl Action for SymlinkDeps {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        if let Some(dir) = self.link.parent() {
            fs::create_dir_all(dir)?;
        }

        // The symlink target must be resolvable from the link's directory.
        let target = self
            .source
            .canonicalize_utf8()
            .with_context(|| format!("dependency directory '{}' does not exist", self.source))?;

        // Replace a stale link; a correct one is left untouched.
        if let Ok(meta) = fs::symlink_metadata(&self.link) {
            if meta.is_symlink() && fs::read_link(&self.link)?.as_path() == target.as_std_path() {
                return Ok(());
            }
            crate::io::remove_all(&self.link)?;
        }

        symlink_dir(target.as_std_path(), self.link.as_std_path())?;
        tracing::info!("linked {} -> {}", self.link, target);

        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::tree(self.link.clone())]
    }
}

#[cfg(unix)]
fn symlink_dir(target: &std::path::Path, link: &std::path::Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &std::path::Path, link: &std::path::Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Runs the external typed-script compiler over the project, emitting
/// compiled script and source maps into the output script directory.
pub struct CompileTypescript {
    tsconfig: Utf8PathBuf,
    out: Utf8PathBuf,
}

impl CompileTypescript {
    pub fn new(paths: &Paths) -> Self {
        Self {
            tsconfig: paths.typescript.tsconfig.clone(),
            out: paths.js_dir(),
        }
    }
}

impl Action for CompileTypescript {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        run_tool("tsc", &tsc_args(&self.tsconfig, &self.out))?;

        tracing::info!("compiled typed script {}", crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::tree(self.out.clone())]
    }
}

pub(crate) fn tsc_args(tsconfig: &Utf8PathBuf, out: &Utf8PathBuf) -> Vec<String> {
    vec![
        "--project".into(),
        tsconfig.to_string(),
        "--outDir".into(),
        out.to_string(),
        "--sourceMap".into(),
    ]
}

/// Bundles the compiled entry point into a single file, down-leveling syntax
/// on the way through.
pub struct BundleScript {
    entry: Utf8PathBuf,
    outfile: Utf8PathBuf,
}

impl BundleScript {
    pub fn new(paths: &Paths) -> Self {
        Self {
            entry: paths.js_entry(),
            outfile: paths.js_bundle(),
        }
    }
}

impl Action for BundleScript {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        run_tool("esbuild", &bundle_args(&self.entry, &self.outfile))?;

        tracing::info!("bundled {} {}", self.outfile, crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        let dir = self.outfile.parent().unwrap_or(&self.outfile).to_owned();
        let name = self.outfile.file_name().unwrap_or_default().to_owned();
        vec![OutputClaim::files(dir, [name.clone(), format!("{name}.map")])]
    }
}

pub(crate) fn bundle_args(entry: &Utf8PathBuf, outfile: &Utf8PathBuf) -> Vec<String> {
    vec![
        entry.to_string(),
        "--bundle".into(),
        "--sourcemap".into(),
        "--target=es2017".into(),
        format!("--outfile={outfile}"),
    ]
}

/// Deletes the intermediate per-module files the compiler left in the output
/// script directory, keeping only the bundle and its source map.
pub struct StripCompiled {
    dir: Utf8PathBuf,
    keep: Vec<String>,
}

impl StripCompiled {
    pub fn new(paths: &Paths) -> Self {
        Self {
            dir: paths.js_dir(),
            keep: vec![
                paths.javascript.bundle.clone(),
                format!("{}.map", paths.javascript.bundle),
            ],
        }
    }
}

impl Action for StripCompiled {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let mut removed = 0;

        for entry in self.dir.read_dir_utf8()? {
            let entry = entry?;
            if self.keep.iter().any(|keep| keep.as_str() == entry.file_name()) {
                continue;
            }
            if crate::io::remove_all(entry.path())? {
                removed += 1;
            }
        }

        tracing::info!("stripped {} intermediate script files", removed);
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::all_except(self.dir.clone(), self.keep.clone())]
    }
}

/// Minifies the bundle in place with the external bundler's minifier.
pub struct MinifyBundle {
    file: Utf8PathBuf,
}

impl MinifyBundle {
    pub fn new(paths: &Paths) -> Self {
        Self {
            file: paths.js_bundle(),
        }
    }
}

impl Action for MinifyBundle {
    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        run_tool("esbuild", &minify_args(&self.file))?;

        tracing::info!("minified {} {}", self.file, crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        let dir = self.file.parent().unwrap_or(&self.file).to_owned();
        let name = self.file.file_name().unwrap_or_default().to_owned();
        vec![OutputClaim::files(dir, [name])]
    }
}

pub(crate) fn minify_args(file: &Utf8PathBuf) -> Vec<String> {
    vec![
        file.to_string(),
        "--minify".into(),
        "--allow-overwrite".into(),
        format!("--outfile={file}"),
    ]
}

/// Launch an external tool with inherited stdio and map a non-zero exit to an
/// error. The tool's own diagnostics are the error message that matters.
fn run_tool(tool: &str, args: &[String]) -> anyhow::Result<()> {
    let status = Command::new(tool)
        .args(args)
        .status()
        .with_context(|| format!("failed to launch `{tool}`, is it installed?"))?;

    if !status.success() {
        anyhow::bail!("`{tool}` exited with {status}");
    }

    Ok(())
}
