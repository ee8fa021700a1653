//! The suite-building scope stack.
//!
//! [`SuiteBuilder`] is the explicit persistent stack tied to suite-tree
//! nodes: a node is pushed on entering a suite and popped on leaving it.
//! `scoped` attaches overrides to the node currently being built; a test is
//! declared against that node and resolves through it.
//!
//! Scope resolution is a static property of the suite tree. Building and
//! running are two phases: [`SuiteBuilder::finish`] freezes the tree into
//! per-node [`ScopeChain`]s, so an override anywhere in a suite's body
//! applies to every test declared textually within that suite — independent
//! of the order in which `scoped` calls, sibling suites, and test
//! declarations were interleaved, and independent of the order in which the
//! tests later execute. A suite that declares no override shares its
//! parent's chain by reference, not by copy.

use crate::registry::{FixtureDefinition, FixtureRegistry};
use crate::scope::ScopeChain;

/// Handle to a declared test, resolvable once the tree is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestDecl {
    node: usize,
}

#[derive(Debug)]
struct SuiteNode {
    parent: Option<usize>,
    overrides: Vec<FixtureDefinition>,
}

/// Builds the suite tree. Node 0 is the file-level root.
#[derive(Debug)]
pub struct SuiteBuilder {
    registry: FixtureRegistry,
    nodes: Vec<SuiteNode>,
    stack: Vec<usize>,
}

impl SuiteBuilder {
    pub fn new(registry: FixtureRegistry) -> Self {
        Self {
            registry,
            nodes: vec![SuiteNode {
                parent: None,
                overrides: Vec::new(),
            }],
            stack: vec![0],
        }
    }

    fn current(&self) -> usize {
        *self.stack.last().expect("root node always present")
    }

    /// Enter a nested suite.
    pub fn enter_suite(&mut self) {
        let node = SuiteNode {
            parent: Some(self.current()),
            overrides: Vec::new(),
        };
        self.nodes.push(node);
        self.stack.push(self.nodes.len() - 1);
    }

    /// Leave the current suite. The root node is never popped.
    pub fn leave_suite(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Attach overrides to the suite node currently being built. They apply
    /// to every test declared textually within this suite (nested suites
    /// that don't re-override included) and to nothing outside it. Repeated
    /// calls accumulate; the later definition wins per name.
    pub fn scoped(&mut self, overrides: impl IntoIterator<Item = FixtureDefinition>) {
        let node = self.current();
        self.nodes[node].overrides.extend(overrides);
    }

    /// Declare a test at the current position in the tree.
    pub fn declare_test(&mut self) -> TestDecl {
        TestDecl {
            node: self.current(),
        }
    }

    /// Suite nesting depth at the current position, root = 0.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Freeze the tree: compute each node's chain from its ancestors'
    /// overrides. Nodes without overrides reuse the parent chain.
    pub fn finish(self) -> SuitePlan {
        let mut chains: Vec<ScopeChain> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let base = match node.parent {
                // Nodes are appended parent-first, so the parent chain exists.
                Some(parent) => chains[parent].clone(),
                None => ScopeChain::root(self.registry.clone()),
            };
            let chain = if node.overrides.is_empty() {
                base
            } else {
                base.scoped(node.overrides.iter().cloned())
            };
            chains.push(chain);
        }
        SuitePlan { chains }
    }
}

/// Frozen suite tree: per-node resolution chains.
#[derive(Debug)]
pub struct SuitePlan {
    chains: Vec<ScopeChain>,
}

impl SuitePlan {
    /// Chain a declared test resolves fixtures through.
    pub fn chain_for(&self, decl: TestDecl) -> ScopeChain {
        self.chains[decl.node].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FixtureSource;
    use serde_json::json;

    fn value_of(chain: &ScopeChain, name: &str) -> serde_json::Value {
        match chain.resolve(name).expect(name).source() {
            FixtureSource::Value(v) => v.clone(),
            FixtureSource::Setup(_) => panic!("expected value for {name}"),
        }
    }

    fn builder() -> SuiteBuilder {
        let registry = FixtureRegistry::new()
            .extend([FixtureDefinition::value("dependency", json!("default"))]);
        SuiteBuilder::new(registry)
    }

    #[test]
    fn nested_suite_inherits_parent_overrides() {
        let mut b = builder();
        b.enter_suite();
        b.scoped([FixtureDefinition::value("dependency", json!("new"))]);
        b.enter_suite();
        let nested = b.declare_test();
        b.leave_suite();
        b.leave_suite();
        let top = b.declare_test();

        let plan = b.finish();
        assert_eq!(value_of(&plan.chain_for(nested), "dependency"), json!("new"));
        assert_eq!(
            value_of(&plan.chain_for(top), "dependency"),
            json!("default")
        );
    }

    #[test]
    fn override_applies_to_tests_declared_before_it_in_the_same_suite() {
        let mut b = builder();
        b.enter_suite();
        let early = b.declare_test();
        b.scoped([FixtureDefinition::value("dependency", json!("new"))]);
        let late = b.declare_test();
        b.leave_suite();

        // Textual membership in the suite decides, not declaration position.
        let plan = b.finish();
        assert_eq!(value_of(&plan.chain_for(early), "dependency"), json!("new"));
        assert_eq!(value_of(&plan.chain_for(late), "dependency"), json!("new"));
    }

    #[test]
    fn sibling_suites_are_isolated() {
        let mut b = builder();

        b.enter_suite();
        b.scoped([FixtureDefinition::value("dependency", json!("left"))]);
        let left = b.declare_test();
        b.leave_suite();

        b.enter_suite();
        let plain = b.declare_test();
        b.leave_suite();

        b.enter_suite();
        b.scoped([FixtureDefinition::value("dependency", json!("right"))]);
        let right = b.declare_test();
        b.leave_suite();

        let plan = b.finish();
        assert_eq!(value_of(&plan.chain_for(left), "dependency"), json!("left"));
        assert_eq!(
            value_of(&plan.chain_for(plain), "dependency"),
            json!("default")
        );
        assert_eq!(
            value_of(&plan.chain_for(right), "dependency"),
            json!("right")
        );
    }

    #[test]
    fn nested_rescope_shadows_without_mutating_parent_layer() {
        let mut b = builder();
        b.enter_suite();
        b.scoped([FixtureDefinition::value("dependency", json!("new"))]);
        let outer_before = b.declare_test();
        b.enter_suite();
        b.scoped([FixtureDefinition::value("dependency", json!("override"))]);
        let inner = b.declare_test();
        b.leave_suite();
        let outer_after = b.declare_test();
        b.leave_suite();

        let plan = b.finish();
        assert_eq!(
            value_of(&plan.chain_for(inner), "dependency"),
            json!("override")
        );
        assert_eq!(
            value_of(&plan.chain_for(outer_before), "dependency"),
            json!("new")
        );
        assert_eq!(
            value_of(&plan.chain_for(outer_after), "dependency"),
            json!("new")
        );
    }

    #[test]
    fn repeated_scoped_calls_accumulate_later_wins_per_name() {
        let mut b = builder();
        b.enter_suite();
        b.scoped([FixtureDefinition::value("dependency", json!("first"))]);
        b.scoped([FixtureDefinition::value("dependency", json!("second"))]);
        let t = b.declare_test();
        b.leave_suite();

        let plan = b.finish();
        assert_eq!(value_of(&plan.chain_for(t), "dependency"), json!("second"));
    }

    #[test]
    fn root_node_survives_extra_leaves() {
        let mut b = builder();
        b.leave_suite();
        b.leave_suite();
        assert_eq!(b.depth(), 0);
        let t = b.declare_test();
        let plan = b.finish();
        assert_eq!(
            value_of(&plan.chain_for(t), "dependency"),
            json!("default")
        );
    }
}
