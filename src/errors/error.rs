//! The structured error object shared by every fallible operation.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Code given to causes lifted out of a Rust error chain.
pub const INTERNAL_ERROR_CODE: &str = "internal_error";

/// A structured, serializable failure description.
///
/// Errors are built once and never mutated afterwards: every builder method
/// consumes `self` and returns a new value. Context is added going up the
/// call stack with [`Error::wrap`], which nests the previous error as the
/// `innererror` of a fresh one, so the chain is always finite.
///
/// On the wire the fields appear as `code`, `innererror`, `message`,
/// `target`, `details`, followed by any extension fields. `code` is always
/// written; the optional fields are left out entirely when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Error {
    #[serde(default, alias = "Code", deserialize_with = "null_as_empty")]
    code: String,

    #[serde(
        rename = "innererror",
        alias = "innerError",
        alias = "InnerError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    inner_error: Option<Box<Error>>,

    #[serde(default, alias = "Message", skip_serializing_if = "Option::is_none")]
    message: Option<String>,

    #[serde(default, alias = "Target", skip_serializing_if = "Option::is_none")]
    target: Option<String>,

    #[serde(default, alias = "Details", skip_serializing_if = "Option::is_none")]
    details: Option<Vec<Error>>,

    /// Fields this type does not know about, kept verbatim.
    #[serde(flatten)]
    extension_data: Map<String, Value>,
}

/// Reads `"code": null` the same as a missing code.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Knobs for [`Error::to_json_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorJsonOptions {
    /// Indent the output.
    pub pretty: bool,
    /// Leave `code` out when it is empty.
    pub suppress_empty_code: bool,
}

impl Error {
    /// Create an error with the given code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    /// Set the human readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the name of the offending field or parameter.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Replace the sibling errors.
    #[must_use]
    pub fn with_details(mut self, details: impl IntoIterator<Item = Error>) -> Self {
        self.details = Some(details.into_iter().collect());
        self
    }

    /// Append one sibling error.
    #[must_use]
    pub fn with_detail(mut self, detail: Error) -> Self {
        self.details.get_or_insert_with(Vec::new).push(detail);
        self
    }

    /// Set the more specific nested error.
    #[must_use]
    pub fn with_inner(mut self, inner: Error) -> Self {
        self.inner_error = Some(Box::new(inner));
        self
    }

    /// Attach an extension field.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extension_data.insert(key.into(), value.into());
        self
    }

    /// Wrap this error as the inner error of a new, less specific one.
    #[must_use]
    pub fn wrap(self, code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::new(code).with_message(message).with_inner(self)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Sibling errors, empty when none were attached.
    pub fn details(&self) -> &[Error] {
        self.details.as_deref().unwrap_or_default()
    }

    pub fn inner_error(&self) -> Option<&Error> {
        self.inner_error.as_deref()
    }

    pub fn extension_data(&self) -> &Map<String, Value> {
        &self.extension_data
    }

    /// Look up a single extension field.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extension_data.get(key)
    }

    /// The error itself followed by its inner chain, outermost first.
    pub fn flatten(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |error| error.inner_error())
    }

    /// The message if there is one, otherwise the code.
    pub fn headline(&self) -> &str {
        self.message().unwrap_or(&self.code)
    }

    /// One line describing the whole inner chain.
    pub fn summary(&self) -> String {
        self.flatten()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Convert an `anyhow` error into an error chain.
    ///
    /// An [`Error`] carried inside the `anyhow::Error` is returned as is.
    /// Anything else becomes one `internal_error` level per cause.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(error) = err.downcast_ref::<Error>() {
            return error.clone();
        }
        Self::from_messages(err.chain().map(ToString::to_string))
    }

    /// Convert any standard error and its `source()` chain.
    pub fn from_std_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let causes = std::iter::successors(Some(err), |e| e.source());
        Self::from_messages(causes.map(ToString::to_string))
    }

    fn from_messages(messages: impl Iterator<Item = String>) -> Self {
        let messages: Vec<String> = messages.collect();
        messages
            .into_iter()
            .rev()
            .fold(None, |inner: Option<Error>, message| {
                let error = Error::new(INTERNAL_ERROR_CODE).with_message(message);
                Some(match inner {
                    Some(inner) => error.with_inner(inner),
                    None => error,
                })
            })
            .unwrap_or_else(|| Error::new(INTERNAL_ERROR_CODE))
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize with explicit options.
    pub fn to_json_with(&self, options: &ErrorJsonOptions) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if options.suppress_empty_code
            && self.code.is_empty()
            && let Value::Object(map) = &mut value
        {
            map.remove("code");
        }

        if options.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
    }

    /// Parse the base error shape. Unknown fields land in extension data.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parse straight into a known error subtype.
    pub fn from_json_as<E: DeserializeOwned>(json: &str) -> serde_json::Result<E> {
        serde_json::from_str(json)
    }

    /// Lift a domain-specific error type into the base shape.
    ///
    /// The subtype's own fields end up in extension data, so they are
    /// written back out when the base error is serialized.
    pub fn from_typed<E: Serialize>(typed: &E) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::to_value(typed)?)
    }

    /// Read this error back as a known subtype.
    pub fn to_typed<E: DeserializeOwned>(&self) -> serde_json::Result<E> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(target) = &self.target {
            write!(f, " (target: {target})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner_error
            .as_deref()
            .map(|inner| inner as &(dyn std::error::Error + 'static))
    }
}
