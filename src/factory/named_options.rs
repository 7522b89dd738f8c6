//! Per-name configuration objects.

use std::collections::HashMap;

/// Options registered under logical names during startup.
///
/// A name can be registered with a value ([`NamedOptions::configure`]) or
/// without one ([`NamedOptions::declare`]). Once handed to a factory the
/// collection is shared read-only.
#[derive(Debug, Clone)]
pub struct NamedOptions<O> {
    entries: HashMap<String, Option<O>>,
}

impl<O> Default for NamedOptions<O> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<O> NamedOptions<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the options for `name`.
    #[must_use]
    pub fn configure(mut self, name: impl Into<String>, options: O) -> Self {
        self.entries.insert(name.into(), Some(options));
        self
    }

    /// Register `name` without options. Creation functions see `None`.
    #[must_use]
    pub fn declare(mut self, name: impl Into<String>) -> Self {
        self.entries.entry(name.into()).or_insert(None);
        self
    }

    /// `None` when the name is unknown, `Some(None)` when it was declared
    /// without options.
    pub fn get(&self, name: &str) -> Option<Option<&O>> {
        self.entries.get(name).map(Option::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
