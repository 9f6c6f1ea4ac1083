use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of [`Error`] values.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Unknown job id or dataset id. Not retryable.
    NotFound,
    /// Malformed or inconsistent input, rejected before any job is registered.
    InvalidInput,
    /// The stop signal could not be delivered. Logged, never surfaced by `terminate`.
    TerminationFailure,
    /// A job or engine thread failed. Not caused by the input.
    Internal,
}

/// Errors of the task assignment system.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no schedule found with id {0}")]
    JobNotFound(String),
    #[error("unknown demo dataset: {0}")]
    DatasetNotFound(String),
    #[error("unknown search engine: {0}")]
    UnknownEngine(String),
    #[error("constraint weight `{name}` must be within 0..=100, got {value}")]
    InvalidWeight { name: &'static str, value: i64 },
    #[error("task `{task}` references unknown resource `{resource}`")]
    UnknownResource { task: String, resource: String },
    #[error("task `{task}` references resource index {index} out of {resources}")]
    ResourceOutOfRange {
        task: String,
        index: usize,
        resources: usize,
    },
    #[error("duplicate resource name `{0}`")]
    DuplicateResource(String),
    #[error("duplicate task id `{0}`")]
    DuplicateTask(String),
    #[error("invalid score `{0}`, expected `<hard>hard/<soft>soft`")]
    InvalidScore(String),
    #[error("cannot terminate job {id}: {reason}")]
    TerminationFailure { id: String, reason: &'static str },
    #[error("cannot start job thread")]
    Spawn(#[source] std::io::Error),
    #[error("search engine of job {0} panicked")]
    EnginePanicked(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the category of the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::JobNotFound(_) | Self::DatasetNotFound(_) => ErrorKind::NotFound,
            Self::TerminationFailure { .. } => ErrorKind::TerminationFailure,
            Self::Spawn(_) | Self::EnginePanicked(_) => ErrorKind::Internal,
            _ => ErrorKind::InvalidInput,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn errors_are_classified() {
        assert_eq!(Error::JobNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::DatasetNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::DuplicateTask("t".into()).kind(), ErrorKind::InvalidInput);
        assert_eq!(
            Error::InvalidWeight {
                name: "balanceLoad",
                value: 101
            }
            .kind(),
            ErrorKind::InvalidInput
        );
        let failure = Error::TerminationFailure {
            id: "x".into(),
            reason: "already terminated",
        };
        assert_eq!(failure.kind(), ErrorKind::TerminationFailure);

        let spawn = Error::Spawn(std::io::Error::other("no threads"));
        assert_eq!(spawn.kind(), ErrorKind::Internal);
        assert_eq!(Error::EnginePanicked("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(Error::Io(std::io::Error::other("eof")).kind(), ErrorKind::InvalidInput);
    }
}
