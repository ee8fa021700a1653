//! Transitive dependency resolution into an ordered instantiation plan.
//!
//! Depth-first over the requested names in first-mention order; a setup's
//! own declared binding supplies further names in declaration order; steps
//! are emitted post-order. That yields "dependencies initialize strictly
//! before dependents" and, among fixtures with no ordering constraint,
//! left-to-right first-mention order (ties broken by declaration order,
//! never by name).
//!
//! Cycles and unknown names are fatal here, before any setup code runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::FixtureError;
use crate::param_usage::ParamBinding;
use crate::registry::{FixtureDefinition, FixtureSource};
use crate::scope::ScopeChain;

/// One fixture to materialize, with its resolved definition.
#[derive(Debug, Clone)]
pub struct PlanStep {
    name: String,
    definition: Arc<FixtureDefinition>,
}

impl PlanStep {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Arc<FixtureDefinition> {
        &self.definition
    }
}

/// Ordered instantiation plan: executing steps front to back satisfies
/// every dependency edge.
#[derive(Debug, Clone, Default)]
pub struct InstantiationPlan {
    steps: Vec<PlanStep>,
}

impl InstantiationPlan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in instantiation order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(PlanStep::name).collect()
    }
}

/// Resolve an ordered requested-name set against a scope chain.
pub fn resolve(requested: &[&str], chain: &ScopeChain) -> Result<InstantiationPlan, FixtureError> {
    let mut steps = Vec::new();
    let mut done = BTreeSet::new();
    let mut visiting = Vec::new();
    for name in requested {
        visit(name, chain, &mut visiting, &mut done, &mut steps)?;
    }
    Ok(InstantiationPlan { steps })
}

/// Resolve everything a callable's declared binding requests.
pub fn resolve_binding(
    binding: &ParamBinding,
    chain: &ScopeChain,
) -> Result<InstantiationPlan, FixtureError> {
    resolve(&binding.requested_names(), chain)
}

fn visit(
    name: &str,
    chain: &ScopeChain,
    visiting: &mut Vec<String>,
    done: &mut BTreeSet<String>,
    steps: &mut Vec<PlanStep>,
) -> Result<(), FixtureError> {
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = visiting.iter().position(|n| n == name) {
        let mut path: Vec<String> = visiting[start..].to_vec();
        path.push(name.to_string());
        return Err(FixtureError::CyclicDependency { path });
    }

    let definition = chain.resolve(name)?;
    if let FixtureSource::Setup(setup) = definition.source() {
        visiting.push(name.to_string());
        for dep in setup.params().requested_names() {
            visit(dep, chain, visiting, done, steps)?;
        }
        visiting.pop();
    }

    done.insert(name.to_string());
    steps.push(PlanStep {
        name: name.to_string(),
        definition,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FixtureRegistry;
    use serde_json::json;

    fn provide_one(
        name: &str,
        deps: &[&str],
    ) -> FixtureDefinition {
        FixtureDefinition::setup(
            name,
            ParamBinding::destructured(deps.iter().copied()),
            |_deps, handle| {
                handle.provide(json!(null))?;
                Ok(())
            },
        )
    }

    fn chain(defs: Vec<FixtureDefinition>) -> ScopeChain {
        ScopeChain::root(FixtureRegistry::new().extend(defs))
    }

    #[test]
    fn independents_keep_first_mention_order() {
        let chain = chain(vec![
            FixtureDefinition::value("b", json!(2)),
            FixtureDefinition::value("a", json!(1)),
        ]);
        // Registry iteration would be alphabetical; the request is not.
        let plan = resolve(&["b", "a"], &chain).expect("plan");
        assert_eq!(plan.names(), vec!["b", "a"]);
    }

    #[test]
    fn dependencies_come_strictly_before_dependents() {
        let chain = chain(vec![
            provide_one("pkg", &["dependency"]),
            FixtureDefinition::value("dependency", json!("default")),
        ]);
        let plan = resolve(&["pkg"], &chain).expect("plan");
        assert_eq!(plan.names(), vec!["dependency", "pkg"]);
    }

    #[test]
    fn diamond_dependency_materializes_once() {
        let chain = chain(vec![
            provide_one("top", &["left", "right"]),
            provide_one("left", &["base"]),
            provide_one("right", &["base"]),
            FixtureDefinition::value("base", json!(0)),
        ]);
        let plan = resolve(&["top"], &chain).expect("plan");
        assert_eq!(plan.names(), vec!["base", "left", "right", "top"]);
    }

    #[test]
    fn transitive_deps_follow_declaration_order() {
        let chain = chain(vec![
            provide_one("svc", &["zeta", "alpha"]),
            FixtureDefinition::value("zeta", json!(1)),
            FixtureDefinition::value("alpha", json!(2)),
        ]);
        let plan = resolve(&["svc"], &chain).expect("plan");
        // Declaration order of the setup's binding, not name order.
        assert_eq!(plan.names(), vec!["zeta", "alpha", "svc"]);
    }

    #[test]
    fn cycle_is_fatal_and_names_the_path() {
        let chain = chain(vec![
            provide_one("a", &["b"]),
            provide_one("b", &["c"]),
            provide_one("c", &["a"]),
        ]);
        let err = resolve(&["a"], &chain).unwrap_err();
        assert_eq!(
            err,
            FixtureError::CyclicDependency {
                path: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
    }

    #[test]
    fn self_cycle_is_reported() {
        let chain = chain(vec![provide_one("a", &["a"])]);
        let err = resolve(&["a"], &chain).unwrap_err();
        assert_eq!(
            err,
            FixtureError::CyclicDependency {
                path: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn unknown_dependency_fails_before_any_setup() {
        let chain = chain(vec![provide_one("pkg", &["missing"])]);
        let err = resolve(&["pkg"], &chain).unwrap_err();
        assert_eq!(
            err,
            FixtureError::UndefinedFixture {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn repeated_request_resolves_once() {
        let chain = chain(vec![FixtureDefinition::value("a", json!(1))]);
        let plan = resolve(&["a", "a"], &chain).expect("plan");
        assert_eq!(plan.names(), vec!["a"]);
    }

    #[test]
    fn binding_resolution_uses_sources_not_locals() {
        let chain = chain(vec![FixtureDefinition::value("todoList", json!([1, 2, 3]))]);
        let binding = ParamBinding::renamed([("todoList", "todos")]);
        let plan = resolve_binding(&binding, &chain).expect("plan");
        assert_eq!(plan.names(), vec!["todoList"]);
    }

    #[test]
    fn empty_request_yields_empty_plan() {
        let chain = chain(vec![FixtureDefinition::value("a", json!(1))]);
        let plan = resolve_binding(&ParamBinding::Ident, &chain).expect("plan");
        assert!(plan.is_empty());
    }
}
