//! Success-or-failure values.

use std::fmt;

use super::{Error, Failure};

/// Exactly one of a success payload or an [`Error`].
///
/// Expected outcomes such as a cache miss are returned as `Fail` rather
/// than as a Rust error or a panic. Reaching for the wrong side with
/// [`Result::value`] or [`Result::error`] is a programming error and panics.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "this `Result` may be a failure which should be handled"]
pub enum Result<T> {
    Success(T),
    Fail(Error),
}

const VALUE_ON_FAIL: &str = "invalid state: cannot read the value of a failed result";
const ERROR_ON_SUCCESS: &str = "invalid state: cannot read the error of a successful result";

impl Result<()> {
    /// The payload-less success.
    pub fn unit() -> Self {
        Result::Success(())
    }
}

impl Default for Result<()> {
    fn default() -> Self {
        Self::unit()
    }
}

impl<T> Result<T> {
    pub fn success(value: T) -> Self {
        Result::Success(value)
    }

    pub fn fail(error: Error) -> Self {
        Result::Fail(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Result::Success(_))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Result::Fail(_))
    }

    /// Run exactly one of the two branches.
    pub fn match_with<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_fail: impl FnOnce(Error) -> R,
    ) -> R {
        match self {
            Result::Success(value) => on_success(value),
            Result::Fail(error) => on_fail(error),
        }
    }

    /// Side-effecting variant of [`Result::match_with`].
    pub fn switch(&self, on_success: impl FnOnce(&T), on_fail: impl FnOnce(&Error)) {
        match self {
            Result::Success(value) => on_success(value),
            Result::Fail(error) => on_fail(error),
        }
    }

    /// The value on success, `None` on failure. Never panics.
    pub fn try_get_value(&self) -> Option<&T> {
        match self {
            Result::Success(value) => Some(value),
            Result::Fail(_) => None,
        }
    }

    /// The error on failure, `None` on success. Never panics.
    pub fn try_get_error(&self) -> Option<&Error> {
        match self {
            Result::Success(_) => None,
            Result::Fail(error) => Some(error),
        }
    }

    /// # Panics
    /// Panics if the result is a failure.
    pub fn value(&self) -> &T {
        match self {
            Result::Success(value) => value,
            Result::Fail(_) => panic!("{VALUE_ON_FAIL}"),
        }
    }

    /// # Panics
    /// Panics if the result is a success.
    pub fn error(&self) -> &Error {
        match self {
            Result::Success(_) => panic!("{ERROR_ON_SUCCESS}"),
            Result::Fail(error) => error,
        }
    }

    /// Take the value, panicking with the error on failure.
    ///
    /// # Panics
    /// Panics if the result is a failure. The panic payload is a
    /// [`Failure`] carrying the whole error, recoverable with
    /// `catch_unwind` and `downcast`. Use [`Result::into_std`] to handle the
    /// failure without unwinding.
    pub fn get_value_or_throw(self) -> T {
        match self {
            Result::Success(value) => value,
            Result::Fail(error) => std::panic::panic_any(Failure::new(error)),
        }
    }

    /// Convert into a standard `Result` so `?` can carry the failure.
    pub fn into_std(self) -> std::result::Result<T, Failure> {
        match self {
            Result::Success(value) => Ok(value),
            Result::Fail(error) => Err(Failure::new(error)),
        }
    }

    /// `Ok(())` on success, the failure otherwise.
    pub fn ensure_success(&self) -> std::result::Result<(), Failure> {
        match self {
            Result::Success(_) => Ok(()),
            Result::Fail(error) => Err(Failure::new(error.clone())),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Result::Success(value) => Some(value),
            Result::Fail(_) => None,
        }
    }

    pub fn err(self) -> Option<Error> {
        match self {
            Result::Success(_) => None,
            Result::Fail(error) => Some(error),
        }
    }

    pub fn as_ref(&self) -> Result<&T> {
        match self {
            Result::Success(value) => Result::Success(value),
            Result::Fail(error) => Result::Fail(error.clone()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Result<U> {
        match self {
            Result::Success(value) => Result::Success(f(value)),
            Result::Fail(error) => Result::Fail(error),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<U> {
        match self {
            Result::Success(value) => f(value),
            Result::Fail(error) => Result::Fail(error),
        }
    }

    pub fn map_error(self, f: impl FnOnce(Error) -> Error) -> Result<T> {
        match self {
            Result::Success(value) => Result::Success(value),
            Result::Fail(error) => Result::Fail(f(error)),
        }
    }

    /// Build from a `(value, error)` pair. Any error wins.
    pub fn from_tuple(tuple: (Option<T>, Option<Error>)) -> Result<Option<T>> {
        match tuple {
            (_, Some(error)) => Result::Fail(error),
            (value, None) => Result::Success(value),
        }
    }

    /// Split into a `(value, error)` pair with exactly one side set.
    pub fn into_tuple(self) -> (Option<T>, Option<Error>) {
        match self {
            Result::Success(value) => (Some(value), None),
            Result::Fail(error) => (None, Some(error)),
        }
    }
}

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Result::Fail(error)
    }
}

impl<T> From<std::result::Result<T, Error>> for Result<T> {
    fn from(result: std::result::Result<T, Error>) -> Self {
        match result {
            Ok(value) => Result::Success(value),
            Err(error) => Result::Fail(error),
        }
    }
}

impl<T> From<Result<T>> for std::result::Result<T, Error> {
    fn from(result: Result<T>) -> Self {
        match result {
            Result::Success(value) => Ok(value),
            Result::Fail(error) => Err(error),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Result<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Result::Success(value) => write!(f, "Success: {value}"),
            Result::Fail(error) => write!(f, "Fail: {error}"),
        }
    }
}
