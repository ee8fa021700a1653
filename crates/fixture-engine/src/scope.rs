//! Suite-level override layers, resolved by lexical nesting.
//!
//! A [`ScopeFrame`] holds one suite's overrides plus a reference to the
//! enclosing suite's frame. A [`ScopeChain`] is the static resolution
//! snapshot a test captures at declaration time: innermost frame outward,
//! falling back to the registry. Chains are persistent — [`ScopeChain::scoped`]
//! returns a new chain and leaves the old one untouched, so sibling suites
//! are isolated by construction and nothing ever retroactively changes a
//! snapshot already captured.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::FixtureError;
use crate::registry::{FixtureDefinition, FixtureRegistry};

/// One suite's override layer. Immutable once created.
#[derive(Debug)]
pub struct ScopeFrame {
    overrides: BTreeMap<String, Arc<FixtureDefinition>>,
    parent: Option<Arc<ScopeFrame>>,
}

impl ScopeFrame {
    fn lookup(&self, name: &str) -> Option<&Arc<FixtureDefinition>> {
        if let Some(def) = self.overrides.get(name) {
            return Some(def);
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Frames from this one outward, for diagnostics.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |parent| parent.depth())
    }
}

/// Registry plus the innermost applicable scope frame.
///
/// Cloning is cheap (two `Arc`s); a clone is an independent snapshot.
#[derive(Debug, Clone)]
pub struct ScopeChain {
    registry: Arc<FixtureRegistry>,
    head: Option<Arc<ScopeFrame>>,
}

impl ScopeChain {
    /// Chain with no scope frames: resolution goes straight to the registry.
    pub fn root(registry: FixtureRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            head: None,
        }
    }

    /// New chain with a frame holding `overrides` pushed on top. An override
    /// fully replaces the definition for the subtree using the new chain;
    /// `self` and every snapshot derived from it are unaffected.
    pub fn scoped(&self, overrides: impl IntoIterator<Item = FixtureDefinition>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|def| (def.name().to_string(), Arc::new(def)))
            .collect();
        Self {
            registry: Arc::clone(&self.registry),
            head: Some(Arc::new(ScopeFrame {
                overrides,
                parent: self.head.clone(),
            })),
        }
    }

    /// Resolve a name: innermost frame outward, then the registry.
    pub fn resolve(&self, name: &str) -> Result<Arc<FixtureDefinition>, FixtureError> {
        if let Some(head) = &self.head {
            if let Some(def) = head.lookup(name) {
                return Ok(Arc::clone(def));
            }
        }
        match self.registry.lookup(name) {
            Some(def) => Ok(Arc::clone(def)),
            None => Err(FixtureError::UndefinedFixture {
                name: name.to_string(),
            }),
        }
    }

    /// Number of scope frames above the registry.
    pub fn frame_depth(&self) -> usize {
        self.head.as_ref().map_or(0, |head| head.depth())
    }

    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }
}
