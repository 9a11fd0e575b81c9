//! Result of an operation with a degrade-safe fallback.

use serde::Serialize;

/// A value produced by a fallback chain.
///
/// Text extraction never fails outright: when every path breaks it still
/// yields a value (usually empty). `degraded` records that a fallback fired so
/// callers can tell "no content" apart from "could not read the content".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction<T> {
    /// The extracted value
    pub value: T,
    /// Whether any fallback was taken
    pub degraded: bool,
    /// Why the fallback was taken
    pub reason: Option<String>,
}

impl<T> Extraction<T> {
    /// A value produced by the primary path.
    pub fn ok(value: T) -> Self {
        Self {
            value,
            degraded: false,
            reason: None,
        }
    }

    /// A value produced after a fallback.
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            degraded: true,
            reason: Some(reason.into()),
        }
    }

    /// Mark an existing extraction as degraded, keeping the first reason.
    pub fn mark_degraded(&mut self, reason: impl Into<String>) {
        self.degraded = true;
        if self.reason.is_none() {
            self.reason = Some(reason.into());
        }
    }

    /// Consume and return the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T: Default> Default for Extraction<T> {
    fn default() -> Self {
        Self::ok(T::default())
    }
}
