use std::io;
use std::path::PathBuf;

/// Errors that can escape the daemon's subsystems.
///
/// Initialization errors propagate out of `main` and terminate the process;
/// per-subscriber runtime errors are caught by the event loop, logged, and
/// the loop keeps running.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to initialize {what}")]
    Init {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("device {} is grabbed by another process", path.display())]
    GrabContended { path: PathBuf },

    #[error("cannot access {} (try running as root)", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read of invalid length from {}", path.display())]
    InvalidRead { path: PathBuf },

    #[error("device {} is already grabbed", path.display())]
    DuplicateGrab { path: PathBuf },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
