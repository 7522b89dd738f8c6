//! Rust-level error types that carry or sit beside [`Error`].

use thiserror::Error as ThisError;

use super::Error;

/// Raised when a failed [`Result`](super::Result) is forced into a value.
///
/// Displays the error's message, or its code when there is no message.
/// The full chain stays reachable through [`Failure::error`] and `source()`.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("{}", .error.headline())]
pub struct Failure {
    #[source]
    error: Error,
}

impl Failure {
    pub fn new(error: Error) -> Self {
        Self { error }
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        failure.error
    }
}

/// The operation observed its cancellation token and stopped.
///
/// Kept apart from [`Error`] so callers never mistake a cancellation for a
/// domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// Outcome of an operation that honours a cancellation token.
pub type Cancellable<T> = std::result::Result<T, Cancelled>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_prefers_message() {
        let with_message = Failure::new(Error::new("code").with_message("readable"));
        let bare = Failure::new(Error::new("code"));

        assert_eq!(with_message.to_string(), "readable");
        assert_eq!(bare.to_string(), "code");
    }

    #[test]
    fn test_failure_exposes_chain_through_source() {
        let failure = Failure::new(Error::new("outer").with_inner(Error::new("inner")));

        let source = std::error::Error::source(&failure).unwrap();
        assert_eq!(source.to_string(), "outer");
        assert_eq!(source.source().unwrap().to_string(), "inner");
    }

    #[test]
    fn test_failure_converts_into_anyhow() {
        let err: anyhow::Error = Failure::new(Error::new("boom")).into();
        assert_eq!(err.to_string(), "boom");
    }
}
