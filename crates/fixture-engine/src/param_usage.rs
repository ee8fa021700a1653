//! Parameter-usage analysis: which fixtures does a callable actually ask for?
//!
//! Each consumer (test body, hook, fixture setup) carries an explicit
//! [`ParamBinding`] declaring how it binds its fixtures parameter. The engine
//! initializes exactly the transitive closure of the declared top-level keys
//! and nothing else — "pay only for what you use" as a static property of the
//! declaration, not of runtime access.

use serde::{Deserialize, Serialize};

/// One top-level key requested from the fixtures parameter.
///
/// A rename (`{ foo: bar }` in destructuring terms) requests the fixture
/// `source = "foo"` and exposes it to the callable under `local = "bar"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamEntry {
    /// Fixture name looked up in the scope chain.
    pub source: String,
    /// Name the callable sees the value under.
    pub local: String,
}

impl ParamEntry {
    pub fn named(source: impl Into<String>) -> Self {
        let source = source.into();
        let local = source.clone();
        Self { source, local }
    }

    pub fn renamed(source: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            local: local.into(),
        }
    }
}

/// How a callable binds its fixtures parameter.
///
/// Only `Destructured` requests anything. `Ident` binds the whole container
/// to a plain identifier: property access on it at runtime is an ordinary
/// absent read and must never trigger initialization. Nested destructuring
/// below a top-level key never introduces additional requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamBinding {
    /// No fixtures parameter at all.
    Absent,
    /// Parameter bound whole, without destructuring.
    Ident,
    /// Top-level keys destructured, in mention order.
    Destructured(Vec<ParamEntry>),
}

impl ParamBinding {
    /// Binding over plain (unrenamed) top-level keys.
    pub fn destructured<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Destructured(names.into_iter().map(ParamEntry::named).collect())
    }

    /// Binding over `(source, local)` rename pairs.
    pub fn renamed<I, S, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        Self::Destructured(
            pairs
                .into_iter()
                .map(|(source, local)| ParamEntry::renamed(source, local))
                .collect(),
        )
    }

    /// Declared entries, in mention order. Empty for `Absent` and `Ident`.
    pub fn entries(&self) -> &[ParamEntry] {
        match self {
            Self::Absent | Self::Ident => &[],
            Self::Destructured(entries) => entries,
        }
    }

    /// Requested fixture names, first-mention order, duplicates dropped.
    pub fn requested_names(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for entry in self.entries() {
            let source = entry.source.as_str();
            if !seen.contains(&source) {
                seen.push(source);
            }
        }
        seen
    }

    /// Whether this binding requests any fixture at all.
    pub fn requests_anything(&self) -> bool {
        !self.entries().is_empty()
    }
}
