use std::sync::mpsc::RecvError;

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SitewrightError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to load the path table:\n{0}")]
    Paths(#[from] PathsError),

    #[error("Invalid task graph:\n{0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),
}

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("Couldn't read the override file.\n{0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Couldn't parse the override file.\n{0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Task '{0}' is registered twice")]
    Duplicate(String),

    #[error("Task '{referenced_by}' references unknown task '{member}'")]
    Unknown {
        member: String,
        referenced_by: String,
    },

    #[error("Task '{0}' transitively includes itself")]
    Cycle(String),

    #[error("Tasks '{0}' and '{1}' can run concurrently but their outputs overlap under '{2}'")]
    Overlap(String, String, Utf8PathBuf),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No task named '{0}'")]
    UnknownTask(String),

    #[error("Task '{0}':\n{1}")]
    Task(String, anyhow::Error),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error("No watchable source pattern resolved")]
    NothingToWatch,

    #[error(transparent)]
    Recv(#[from] RecvError),
}
