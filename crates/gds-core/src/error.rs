use thiserror::Error;

pub type GdsResult<T> = Result<T, GdsError>;

/// Classification of a failure, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PathNotFound,
    NameCollision,
    StagingFailure,
    SyncTimeout,
    RemoteExecFailure,
    VerifyMiss,
    ProviderError,
    SyntaxError,
    UserCancel,
    CacheInconsistency,
    InvalidInput,
}

#[derive(Debug, Error)]
pub enum GdsError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("{0}")]
    NameCollision(String),

    #[error("staging failed: {0}")]
    Staging(String),

    #[error("sync timeout: {0}")]
    SyncTimeout(String),

    #[error("remote execution failed: {0}")]
    RemoteExec(String),

    #[error("verification failed: {0}")]
    VerifyMiss(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("bash syntax error: {0}")]
    Syntax(String),

    #[error("operation cancelled by user")]
    UserCancel,

    #[error("cache inconsistency: {0}")]
    CacheInconsistency(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GdsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GdsError::PathNotFound(_) => ErrorKind::PathNotFound,
            GdsError::NameCollision(_) => ErrorKind::NameCollision,
            GdsError::Staging(_) | GdsError::Io(_) => ErrorKind::StagingFailure,
            GdsError::SyncTimeout(_) => ErrorKind::SyncTimeout,
            GdsError::RemoteExec(_) => ErrorKind::RemoteExecFailure,
            GdsError::VerifyMiss(_) => ErrorKind::VerifyMiss,
            GdsError::Provider(_) | GdsError::Other(_) => ErrorKind::ProviderError,
            GdsError::Syntax(_) => ErrorKind::SyntaxError,
            GdsError::UserCancel => ErrorKind::UserCancel,
            GdsError::CacheInconsistency(_) => ErrorKind::CacheInconsistency,
            GdsError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// A short actionable hint for the user, when one exists for this kind.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            GdsError::NameCollision(_) => Some("use --force to override"),
            GdsError::SyncTimeout(_) => {
                Some("files may still propagate; verify manually and retry if needed")
            }
            GdsError::VerifyMiss(_) => Some("retry the operation"),
            _ => None,
        }
    }
}
