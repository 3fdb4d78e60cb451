//! The declared build graph: every task name, its wiring, and the watch
//! targets. This is the single place where the shape of the build lives.
//!
//! ```text
//! default ──alias──> rebuild ──seq──> clean, build
//! build ──par──> build-js, build-styles, build-misc
//! build-js ──seq──> symlink-deps, compile-ts, bundle-js, finalize-js
//! finalize-js ──par──> strip-js, minify-js
//! build-styles ──seq──> compile-scss, minify-css
//! build-misc ──par──> minify-html, minify-images, copy-fonts, copy-config
//! ```

use crate::error::RegistryError;
use crate::paths::Paths;
use crate::registry::Registry;
use crate::steps::{
    BundleScript, Clean, CompileStylesheets, CompileTypescript, CopyDir, MinifyBundle,
    MinifyMarkup, MinifyStylesheets, OptimizeImages, StripCompiled, SymlinkDeps,
};
use crate::watch::WatchTarget;

/// Build the full task graph over the given path table.
pub fn graph(paths: &Paths) -> Result<Registry, RegistryError> {
    let mut b = Registry::builder();

    b.action("clean", Clean::new(paths));
    b.action("symlink-deps", SymlinkDeps::new(paths));
    b.action("compile-ts", CompileTypescript::new(paths));
    b.action("bundle-js", BundleScript::new(paths));
    b.action("strip-js", StripCompiled::new(paths));
    b.action("minify-js", MinifyBundle::new(paths));
    b.action("compile-scss", CompileStylesheets::new(paths));
    b.action("minify-css", MinifyStylesheets::new(paths));
    b.action("minify-html", MinifyMarkup::new(paths));
    b.action(
        "minify-images",
        OptimizeImages::new(paths),
    );
    b.action(
        "copy-fonts",
        CopyDir::new("font", paths.fonts.clone(), paths.fonts_out()),
    );
    b.action(
        "copy-config",
        CopyDir::new("config", paths.config.clone(), paths.config_out()),
    );

    // Bundling requires the compiled entry point on disk, so the script
    // pipeline is strictly ordered until the bundle exists; stripping and
    // minification touch disjoint files and run side by side.
    b.parallel("finalize-js", ["strip-js", "minify-js"]);
    b.series(
        "build-js",
        ["symlink-deps", "compile-ts", "bundle-js", "finalize-js"],
    );
    b.series("build-styles", ["compile-scss", "minify-css"]);
    b.parallel(
        "build-misc",
        ["minify-html", "minify-images", "copy-fonts", "copy-config"],
    );

    b.parallel("build", ["build-js", "build-styles", "build-misc"]);
    b.series("rebuild", ["clean", "build"]);
    b.alias("default", "rebuild");

    b.finish()
}

/// Source patterns whose changes re-trigger a pipeline in watch mode.
pub fn watch_targets(paths: &Paths) -> Vec<WatchTarget> {
    vec![
        WatchTarget {
            pattern: paths.typescript.sources.clone(),
            task: "build-js",
        },
        WatchTarget {
            pattern: paths.styles.sources.clone(),
            task: "build-styles",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    #[test]
    fn test_default_graph_is_valid() {
        graph(&Paths::default()).unwrap();
    }

    #[test]
    fn test_build_reaches_every_leaf() {
        let registry = graph(&Paths::default()).unwrap();
        let leaves = registry.leaves("build");

        for leaf in [
            "symlink-deps",
            "compile-ts",
            "bundle-js",
            "strip-js",
            "minify-js",
            "compile-scss",
            "minify-css",
            "minify-html",
            "minify-images",
            "copy-fonts",
            "copy-config",
        ] {
            assert!(leaves.contains(&leaf), "missing {leaf}");
        }
        assert!(!leaves.contains(&"clean"));
    }

    #[test]
    fn test_rebuild_is_clean_then_build() {
        let registry = graph(&Paths::default()).unwrap();

        match registry.get("rebuild").unwrap() {
            TaskKind::Series(members) => assert_eq!(members, &["clean", "build"]),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_default_aliases_rebuild() {
        let registry = graph(&Paths::default()).unwrap();
        assert!(matches!(
            registry.get("default").unwrap(),
            TaskKind::Alias("rebuild")
        ));
    }

    #[test]
    fn test_watch_targets_cover_both_pipelines() {
        let targets = watch_targets(&Paths::default());
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].task, "build-js");
        assert_eq!(targets[1].task, "build-styles");
    }

    #[test]
    fn test_misc_and_style_pipelines_populate_fresh_output() {
        use std::fs;

        use crate::core::{Environment, Mode};
        use crate::executor::Executor;
        use crate::paths::{ImagePaths, StylePaths};

        let tmp = tempfile::tempdir().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("img")).unwrap();
        fs::create_dir_all(root.join("fonts")).unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::create_dir_all(root.join("styles")).unwrap();
        fs::write(root.join("img/logo.svg"), b"<svg></svg>").unwrap();
        fs::write(root.join("fonts/body.woff2"), b"glyphs").unwrap();
        fs::write(root.join("config/app.json"), b"{}").unwrap();
        fs::write(root.join("index.html"), "<html>  <body> hi </body>  </html>").unwrap();
        fs::write(root.join("styles/site.scss"), "body { margin: 0; }\n").unwrap();

        let paths = Paths {
            dist: root.join("dist"),
            cache: root.join(".cache"),
            node_modules: root.join("node_modules"),
            styles: StylePaths {
                dir: root.join("styles"),
                sources: format!("{root}/styles/**/[!_]*.scss"),
                cache: root.join("styles/.sass-cache"),
            },
            fonts: root.join("fonts"),
            config: root.join("config"),
            images: ImagePaths {
                dir: root.join("img"),
                sources: format!("{root}/img/**/*"),
            },
            markup: format!("{root}/*.html"),
            ..Paths::default()
        };

        let registry = graph(&paths).unwrap();
        let env = Environment {
            mode: Mode::Build,
            verbose: false,
        };
        let executor = Executor::new(&registry, env);

        // The output tree does not exist yet; the pipelines create it.
        executor.run("build-misc").unwrap();
        executor.run("build-styles").unwrap();

        assert!(root.join("dist/img/logo.svg").exists());
        assert!(root.join("dist/fonts/body.woff2").exists());
        assert!(root.join("dist/config/app.json").exists());
        assert!(root.join("dist/index.html").exists());
        let css = fs::read_to_string(root.join("dist/styles/site.css")).unwrap();
        assert!(css.contains("margin"));

        // Re-running over unchanged sources succeeds and leaves the same
        // observable output.
        executor.run("build-misc").unwrap();
        executor.run("build-styles").unwrap();
        assert_eq!(
            fs::read_to_string(root.join("dist/styles/site.css")).unwrap(),
            css
        );
    }

    #[test]
    fn test_graph_renders_as_mermaid() {
        let registry = graph(&Paths::default()).unwrap();
        let rendered = registry.to_string();
        assert!(rendered.starts_with("graph LR"));
        assert!(rendered.contains("\"rebuild\""));
    }
}
