//! Result and Error values used by every fallible operation in the crate.
//!
//! ## Model
//!
//! - [`Result<T>`] is exactly one of `Success(T)` or `Fail(Error)`.
//!   The payload-less form is `Result<()>`.
//! - [`Error`] is a serializable record: `code`, optional `message` and
//!   `target`, sibling `details`, a nested `innererror` chain and an open
//!   bag of extension fields.
//! - [`Failure`] is what a caller gets when it forces a failed result into
//!   a value; [`Cancelled`] marks operations stopped by their token.
//!
//! ## Usage
//!
//! ```rust
//! use appkit::errors::{Error, Result};
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     match raw.parse() {
//!         Ok(port) => Result::success(port),
//!         Err(_) => Error::new("config.bad_port").with_target("port").into(),
//!     }
//! }
//!
//! assert!(parse_port("8080").is_success());
//! assert_eq!(parse_port("x").error().target(), Some("port"));
//! ```

mod error;
mod failure;
mod result;

pub use error::{Error, ErrorJsonOptions, INTERNAL_ERROR_CODE};
pub use failure::{Cancellable, Cancelled, Failure};
pub use result::Result;

/// Wrap a value in a successful result.
pub fn success<T>(value: T) -> Result<T> {
    Result::Success(value)
}

/// Build a failed result from a code, message and optional target.
pub fn fail<T>(code: &str, message: &str, target: Option<&str>) -> Result<T> {
    let error = Error::new(code).with_message(message);
    match target {
        Some(target) => Result::Fail(error.with_target(target)),
        None => Result::Fail(error),
    }
}
