//! The path table: every filesystem location the pipeline reads or writes,
//! resolved through one immutable struct.
//!
//! Defaults describe the conventional project layout (`ts/`, `styles/`,
//! `fonts/`, `config/`, `img/`, root-level markup, output under `dist/`).
//! A `sitewright.toml` at the project root may override any subset of the
//! source-side fields; output locations below `dist` are derived, keeping the
//! layout coherent when only `dist` is changed.

use std::fs;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::PathsError;

fn default_dist() -> Utf8PathBuf {
    "dist".into()
}

fn default_cache() -> Utf8PathBuf {
    ".cache".into()
}

fn default_node_modules() -> Utf8PathBuf {
    "node_modules".into()
}

/// Typed-script source locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TypescriptPaths {
    pub dir: Utf8PathBuf,
    /// Glob over every typed-script source, used by the watcher.
    pub sources: String,
    pub tsconfig: Utf8PathBuf,
}

impl Default for TypescriptPaths {
    fn default() -> Self {
        Self {
            dir: "ts".into(),
            sources: "ts/**/*.ts".into(),
            tsconfig: "ts/tsconfig.json".into(),
        }
    }
}

/// Names of the compiled-script artifacts within the output script directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JavascriptPaths {
    pub entry: String,
    pub bundle: String,
}

impl Default for JavascriptPaths {
    fn default() -> Self {
        Self {
            entry: "main.js".into(),
            bundle: "bundle.js".into(),
        }
    }
}

/// Stylesheet source locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StylePaths {
    pub dir: Utf8PathBuf,
    /// Partials (`_*.scss`) are reachable only through their importers.
    pub sources: String,
    /// Legacy stylesheet-compiler cache, removed by `clean`.
    pub cache: Utf8PathBuf,
}

impl Default for StylePaths {
    fn default() -> Self {
        Self {
            dir: "styles".into(),
            sources: "styles/**/[!_]*.scss".into(),
            cache: "styles/.sass-cache".into(),
        }
    }
}

/// Image source locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagePaths {
    pub dir: Utf8PathBuf,
    pub sources: String,
}

impl Default for ImagePaths {
    fn default() -> Self {
        Self {
            dir: "img".into(),
            sources: "img/**/*".into(),
        }
    }
}

/// The complete path table.
///
/// Lookups are plain field accesses and derived-path methods; nothing here
/// touches the filesystem or validates existence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Root of the generated output tree.
    pub dist: Utf8PathBuf,
    /// Artifact cache used by the image optimizer, removed by `clean`.
    pub cache: Utf8PathBuf,
    /// Third-party script dependencies, symlinked into the output tree.
    pub node_modules: Utf8PathBuf,
    pub typescript: TypescriptPaths,
    pub javascript: JavascriptPaths,
    pub styles: StylePaths,
    pub fonts: Utf8PathBuf,
    pub config: Utf8PathBuf,
    pub images: ImagePaths,
    /// Root-level markup files, non-recursive.
    pub markup: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            dist: default_dist(),
            cache: default_cache(),
            node_modules: default_node_modules(),
            typescript: TypescriptPaths::default(),
            javascript: JavascriptPaths::default(),
            styles: StylePaths::default(),
            fonts: "fonts".into(),
            config: "config".into(),
            images: ImagePaths::default(),
            markup: "*.html".into(),
        }
    }
}

impl Paths {
    /// Layer overrides from a TOML file on top of the defaults.
    pub fn load(file: impl AsRef<std::path::Path>) -> Result<Self, PathsError> {
        let text = fs::read_to_string(file)?;
        let paths = toml::from_str(&text)?;
        Ok(paths)
    }

    /// Output location of compiled and bundled script.
    pub fn js_dir(&self) -> Utf8PathBuf {
        self.dist.join("js")
    }

    /// The bundler entry point, produced by the typed-script compiler.
    pub fn js_entry(&self) -> Utf8PathBuf {
        self.js_dir().join(&self.javascript.entry)
    }

    pub fn js_bundle(&self) -> Utf8PathBuf {
        self.js_dir().join(&self.javascript.bundle)
    }

    pub fn js_bundle_map(&self) -> Utf8PathBuf {
        let mut name = self.javascript.bundle.clone();
        name.push_str(".map");
        self.js_dir().join(name)
    }

    /// Output location of compiled stylesheets.
    pub fn css_dir(&self) -> Utf8PathBuf {
        self.dist.join("styles")
    }

    pub fn fonts_out(&self) -> Utf8PathBuf {
        self.dist.join("fonts")
    }

    pub fn config_out(&self) -> Utf8PathBuf {
        self.dist.join("config")
    }

    pub fn images_out(&self) -> Utf8PathBuf {
        self.dist.join("img")
    }

    /// Where the dependency symlink lands inside the output tree.
    pub fn node_modules_link(&self) -> Utf8PathBuf {
        self.dist.join("node_modules")
    }

    /// Cache directory for optimized image artifacts.
    pub fn image_cache(&self) -> Utf8PathBuf {
        self.cache.join("img")
    }
}
