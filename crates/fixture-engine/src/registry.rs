//! Immutable, layered store of fixture definitions.
//!
//! A [`FixtureRegistry`] maps fixture names to definitions. [`extend`] is
//! pure: it produces a new registry over `parent ∪ overrides` (overrides win
//! on collision) without touching the parent, so one base registry can be
//! extended independently by any number of callers.
//!
//! `BTreeMap` keeps name iteration deterministic.
//!
//! [`extend`]: FixtureRegistry::extend

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::lifecycle::{ResolvedDeps, SetupHandle};
use crate::param_usage::{ParamBinding, ParamEntry};

/// Fixture payloads are structured data.
pub type FixtureValue = serde_json::Value;

/// Setup callable: receives its already-resolved dependencies and a
/// single-shot continuation handle, and must call
/// [`SetupHandle::provide`] exactly once.
pub type SetupFn = Arc<dyn Fn(&ResolvedDeps, &mut SetupHandle) -> anyhow::Result<()> + Send + Sync>;

/// A setup callable together with its declared dependency binding.
#[derive(Clone)]
pub struct FixtureSetup {
    params: ParamBinding,
    run: SetupFn,
}

impl FixtureSetup {
    pub fn new<F>(params: ParamBinding, run: F) -> Self
    where
        F: Fn(&ResolvedDeps, &mut SetupHandle) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            params,
            run: Arc::new(run),
        }
    }

    /// Dependency binding declared by this setup.
    pub fn params(&self) -> &ParamBinding {
        &self.params
    }

    pub fn invoke(&self, deps: &ResolvedDeps, handle: &mut SetupHandle) -> anyhow::Result<()> {
        (self.run)(deps, handle)
    }
}

impl fmt::Debug for FixtureSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureSetup")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// What a fixture definition holds: a literal value or a setup callable.
#[derive(Debug, Clone)]
pub enum FixtureSource {
    /// Static value, Ready as soon as it is requested.
    Value(FixtureValue),
    /// Two-phase setup with an explicit continuation.
    Setup(FixtureSetup),
}

impl FixtureSource {
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

/// Named fixture definition. Immutable once created.
#[derive(Debug, Clone)]
pub struct FixtureDefinition {
    name: String,
    source: FixtureSource,
}

impl FixtureDefinition {
    /// Definition over a literal value.
    pub fn value(name: impl Into<String>, value: impl Into<FixtureValue>) -> Self {
        Self {
            name: name.into(),
            source: FixtureSource::Value(value.into()),
        }
    }

    /// Definition over a setup callable with a declared dependency binding.
    pub fn setup<F>(name: impl Into<String>, params: ParamBinding, run: F) -> Self
    where
        F: Fn(&ResolvedDeps, &mut SetupHandle) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: FixtureSource::Setup(FixtureSetup::new(params, run)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FixtureSource {
        &self.source
    }

    /// Dependency entries this definition declares. Empty for static values.
    pub fn dependencies(&self) -> &[ParamEntry] {
        match &self.source {
            FixtureSource::Value(_) => &[],
            FixtureSource::Setup(setup) => setup.params().entries(),
        }
    }
}

/// Immutable name → definition mapping.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    defs: BTreeMap<String, Arc<FixtureDefinition>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// New registry = `self ∪ defs`, `defs` winning on name collision.
    /// `self` is never mutated.
    pub fn extend(&self, defs: impl IntoIterator<Item = FixtureDefinition>) -> Self {
        let mut merged = self.defs.clone();
        for def in defs {
            merged.insert(def.name.clone(), Arc::new(def));
        }
        Self { defs: merged }
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<FixtureDefinition>> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Defined names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extend_does_not_mutate_parent() {
        let base = FixtureRegistry::new().extend([FixtureDefinition::value("a", json!(1))]);
        let derived = base.extend([FixtureDefinition::value("b", json!(2))]);

        assert_eq!(base.len(), 1);
        assert!(!base.contains("b"));
        assert_eq!(derived.len(), 2);
        assert!(derived.contains("a"));
    }

    #[test]
    fn extend_overrides_win_on_collision() {
        let base = FixtureRegistry::new().extend([FixtureDefinition::value("a", json!("old"))]);
        let derived = base.extend([FixtureDefinition::value("a", json!("new"))]);

        let def = derived.lookup("a").expect("a");
        match def.source() {
            FixtureSource::Value(v) => assert_eq!(v, &json!("new")),
            FixtureSource::Setup(_) => panic!("expected value"),
        }
        match base.lookup("a").expect("a").source() {
            FixtureSource::Value(v) => assert_eq!(v, &json!("old")),
            FixtureSource::Setup(_) => panic!("expected value"),
        }
    }

    #[test]
    fn one_base_extends_independently() {
        let base = FixtureRegistry::new().extend([FixtureDefinition::value("shared", json!(0))]);
        let left = base.extend([FixtureDefinition::value("left", json!(1))]);
        let right = base.extend([FixtureDefinition::value("right", json!(2))]);

        assert!(left.contains("left") && !left.contains("right"));
        assert!(right.contains("right") && !right.contains("left"));
        assert!(left.contains("shared") && right.contains("shared"));
    }

    #[test]
    fn setup_definition_reports_dependencies() {
        let def = FixtureDefinition::setup(
            "pkg",
            ParamBinding::destructured(["dependency"]),
            |_deps, handle| {
                handle.provide(json!({}))?;
                Ok(())
            },
        );
        assert!(def.source().is_setup());
        assert_eq!(def.dependencies().len(), 1);
        assert_eq!(def.dependencies()[0].source, "dependency");

        let value_def = FixtureDefinition::value("n", json!(3));
        assert!(value_def.dependencies().is_empty());
    }
}
