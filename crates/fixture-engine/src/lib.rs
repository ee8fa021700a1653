#![forbid(unsafe_code)]

//! Fixture dependency-injection and lifecycle engine.
//!
//! Supplies per-test values ("fixtures") to test and hook bodies with lazy,
//! scope-aware initialization, dependency resolution, and deterministic
//! reverse-order teardown:
//!
//! - a callable declares the fixtures it needs as data ([`ParamBinding`]);
//!   only the transitive closure of that declaration is ever initialized;
//! - fixtures live in immutable, layered registries ([`FixtureRegistry`])
//!   with per-suite overrides resolved by lexical nesting ([`SuiteBuilder`],
//!   [`ScopeChain`]);
//! - the resolver orders the dependency graph ([`InstantiationPlan`]),
//!   rejecting cycles and unknown names before any setup runs;
//! - setup is an explicit two-phase resource with a single-shot continuation
//!   ([`SetupHandle`]); teardown runs in exact reverse initialization order
//!   on every exit path, including failure and cancellation.
//!
//! Suite scheduling, process isolation, module loading, and reporting live
//! outside this crate; they drive it through [`run_test`] or the staged
//! [`ExecutionContext`] API.

pub mod context;
pub mod error;
pub mod lifecycle;
pub mod param_usage;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod suite;

pub use context::{
    run_test, ExecutionContext, FixtureCallable, FixtureView, TestFailure, TestOutcome,
};
pub use error::{FixtureError, TeardownError};
pub use lifecycle::{
    FixtureInstance, InstanceState, LifecycleEvent, LifecyclePhase, ResolvedDeps, SetupHandle,
};
pub use param_usage::{ParamBinding, ParamEntry};
pub use registry::{FixtureDefinition, FixtureRegistry, FixtureSource, FixtureValue};
pub use resolver::{resolve, resolve_binding, InstantiationPlan, PlanStep};
pub use scope::{ScopeChain, ScopeFrame};
pub use suite::{SuiteBuilder, SuitePlan, TestDecl};
