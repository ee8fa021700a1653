//! Error taxonomy for fixture resolution, setup, and teardown.
//!
//! Every error is scoped to a single test execution; nothing here aborts a
//! run. Resolution errors (`UndefinedFixture`, `CyclicDependency`) surface at
//! the first resolution attempt for a callable, before any setup code runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors for one test's fixture resolution or initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum FixtureError {
    /// Name not found in any reachable scope frame or the registry.
    #[error("fixture `{name}` is not defined in any reachable scope or registry")]
    UndefinedFixture { name: String },

    /// Dependency graph cycle. `path` runs from the first repeated name
    /// back around to its repetition, e.g. `["a", "b", "a"]`.
    #[error("cyclic fixture dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// Setup callable failed before its continuation completed. Later-planned
    /// fixtures are never initialized; earlier Ready instances still receive
    /// teardown in reverse order.
    #[error("setup for fixture `{fixture}` failed: {message}")]
    Setup { fixture: String, message: String },

    /// Setup callable returned without ever invoking its continuation.
    #[error("setup for fixture `{fixture}` returned without invoking its continuation")]
    MissingUseCall { fixture: String },
}

impl FixtureError {
    /// Fixture name the error is attributed to, where one exists.
    pub fn fixture(&self) -> Option<&str> {
        match self {
            Self::UndefinedFixture { name } => Some(name),
            Self::CyclicDependency { path } => path.first().map(String::as_str),
            Self::Setup { fixture, .. } | Self::MissingUseCall { fixture } => Some(fixture),
        }
    }

    /// Stable string tag for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UndefinedFixture { .. } => "undefined_fixture",
            Self::CyclicDependency { .. } => "cyclic_dependency",
            Self::Setup { .. } => "setup",
            Self::MissingUseCall { .. } => "missing_use_call",
        }
    }
}

/// A cleanup failure captured during teardown. Collected per instance and
/// reported as a secondary failure; never blocks the remaining teardowns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("teardown for fixture `{fixture}` failed: {message}")]
pub struct TeardownError {
    pub fixture: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_names_the_path() {
        let err = FixtureError::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic fixture dependency: a -> b -> a");
        assert_eq!(err.fixture(), Some("a"));
    }

    #[test]
    fn kind_tags_are_stable() {
        let undefined = FixtureError::UndefinedFixture { name: "db".into() };
        assert_eq!(undefined.kind(), "undefined_fixture");
        assert_eq!(undefined.fixture(), Some("db"));

        let missing = FixtureError::MissingUseCall {
            fixture: "db".into(),
        };
        assert_eq!(missing.kind(), "missing_use_call");
    }

    #[test]
    fn teardown_error_display() {
        let err = TeardownError {
            fixture: "server".into(),
            message: "port still bound".into(),
        };
        assert_eq!(
            err.to_string(),
            "teardown for fixture `server` failed: port still bound"
        );
    }
}
