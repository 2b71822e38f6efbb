//! Error taxonomy for lifecycle handling.
//!
//! Collaborator glue reports failures through `anyhow`; the controller maps
//! them onto these kinds so callers (and tests) can match on what went wrong
//! instead of parsing status strings.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Signal;

/// Problems with the install artifact. Recoverable once a new artifact is
/// supplied; never retried automatically.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("resource '{0}' is not available")]
    NotFound(String),

    #[error("Bad zip file: {0}")]
    CorruptArchive(String),
}

/// Data path migration failures.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("destination does not exist: {}", .0.display())]
    DestinationMissing(PathBuf),

    #[error("destination not empty: {}", .0.display())]
    DestinationNotEmpty(PathBuf),

    #[error("destination {} is inside {}", .target.display(), .current.display())]
    DestinationInsideSource { current: PathBuf, target: PathBuf },

    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PathError {
    /// Operator-facing reason used for the Blocked status.
    pub fn status_reason(&self) -> String {
        match self {
            PathError::DestinationMissing(path) => {
                format!("Destination directory does not exist: {}", path.display())
            }
            PathError::DestinationNotEmpty(path) => {
                format!("Destination directory is not empty: {}", path.display())
            }
            PathError::DestinationInsideSource { target, .. } => format!(
                "Destination directory is inside the current data directory: {}",
                target.display()
            ),
            PathError::Move { from, .. } => {
                format!("Data migration failed while moving {}", from.display())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    RecoverableInput(#[from] ArtifactError),

    #[error("{signal} requires the unit to be {requires}")]
    PreconditionNotMet {
        signal: Signal,
        requires: &'static str,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("dependency installation failed: {0}")]
    FatalDependency(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unit state error: {0:#}")]
    State(anyhow::Error),

    #[error("{0:#}")]
    Io(anyhow::Error),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::RecoverableInput(_) => ErrorKind::RecoverableInput,
            AgentError::PreconditionNotMet { .. } => ErrorKind::PreconditionNotMet,
            AgentError::Path(_) => ErrorKind::Path,
            AgentError::FatalDependency(_) => ErrorKind::FatalDependency,
            AgentError::Config(_) => ErrorKind::Config,
            AgentError::State(_) | AgentError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Coarse classification of [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RecoverableInput,
    PreconditionNotMet,
    Path,
    FatalDependency,
    Config,
    Io,
}

pub type AgentResult<T> = Result<T, AgentError>;
