#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod core;
mod error;
mod executor;
mod io;
mod paths;
pub mod pipeline;
mod registry;
mod steps;
mod task;
mod watch;

pub use crate::core::{Environment, Mode};
pub use crate::error::{
    BuildError, PathsError, RegistryError, SitewrightError, WatchError,
};
pub use crate::executor::Executor;
pub use crate::paths::Paths;
pub use crate::registry::{Registry, RegistryBuilder};
pub use crate::task::{Action, OutputClaim, Select, TaskKind};
pub use crate::watch::{WatchTarget, watch};
