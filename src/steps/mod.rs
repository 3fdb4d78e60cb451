//! Leaf build steps, each wrapping exactly one transformation.

mod assets;
mod clean;
mod images;
mod markup;
mod script;
mod styles;

pub use assets::CopyDir;
pub use clean::Clean;
pub use images::OptimizeImages;
pub use markup::MinifyMarkup;
pub use script::{BundleScript, CompileTypescript, MinifyBundle, StripCompiled, SymlinkDeps};
pub use styles::{CompileStylesheets, MinifyStylesheets};
