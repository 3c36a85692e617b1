use thiserror::Error;

/// Outcome of a failed job run. Every variant is terminal: nothing is retried
/// automatically and the message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("{0}")]
    SubmissionFailed(String),

    #[error("{0}")]
    RemoteError(String),

    #[error("Connection to the server was lost")]
    ConnectionLost,

    #[error("Server offline")]
    Unreachable,

    #[error("A download is already in progress")]
    Busy,

    #[error("Download cancelled")]
    Cancelled,

    #[error("Unsupported page: {0}")]
    UnsupportedResource(String),

    #[error("Unknown quality: {0}")]
    UnknownQuality(String),
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(String),
}
