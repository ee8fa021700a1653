//! Per-test execution context and the test/hook invocation driver.
//!
//! One [`ExecutionContext`] lives for exactly one test execution and is
//! shared by the test body and its before/after hooks. Initialization is
//! incremental: each callable's plan runs against the same context, and a
//! name already Ready is reused — a fixture instance is created at most once
//! per context. Teardown runs once for the whole context, in exact reverse
//! creation order, on every exit path.
//!
//! Initialization is strictly sequential; nothing in a context is shared
//! across tests, so no locking exists anywhere in this module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, TeardownError};
use crate::lifecycle::{
    FixtureInstance, InstanceState, LifecycleEvent, LifecyclePhase, ResolvedDeps, SetupHandle,
};
use crate::param_usage::ParamBinding;
use crate::registry::{FixtureSource, FixtureValue};
use crate::resolver::{self, InstantiationPlan};
use crate::scope::ScopeChain;

// ---------------------------------------------------------------------------
// FixtureView — what a callable sees
// ---------------------------------------------------------------------------

/// The resolved values a single callable receives, under its local names.
///
/// Exactly the callable's requested names are present. An unrequested name
/// is plainly absent — `get` returns `None` without initializing anything.
/// Values are snapshots taken at invocation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureView {
    values: BTreeMap<String, FixtureValue>,
}

impl FixtureView {
    pub fn get(&self, local: &str) -> Option<&FixtureValue> {
        self.values.get(local)
    }

    /// Value that the callable's own binding guarantees to exist.
    pub fn required(&self, local: &str) -> anyhow::Result<&FixtureValue> {
        match self.values.get(local) {
            Some(value) => Ok(value),
            None => anyhow::bail!("fixture `{local}` was not requested by this callable"),
        }
    }

    pub fn contains(&self, local: &str) -> bool {
        self.values.contains_key(local)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Per-test container of materialized fixtures.
#[derive(Debug)]
pub struct ExecutionContext {
    chain: ScopeChain,
    instances: Vec<FixtureInstance>,
    index: BTreeMap<String, usize>,
    events: Vec<LifecycleEvent>,
    next_seq: u64,
}

impl ExecutionContext {
    pub fn new(chain: ScopeChain) -> Self {
        Self {
            chain,
            instances: Vec::new(),
            index: BTreeMap::new(),
            events: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn chain(&self) -> &ScopeChain {
        &self.chain
    }

    /// Materialized instances, in creation order.
    pub fn instances(&self) -> &[FixtureInstance] {
        &self.instances
    }

    /// Append-only lifecycle event log.
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    /// Resolved value of a Ready fixture, by canonical name.
    pub fn value(&self, name: &str) -> Option<&FixtureValue> {
        let idx = *self.index.get(name)?;
        let instance = &self.instances[idx];
        if instance.state() == InstanceState::Ready {
            instance.value()
        } else {
            None
        }
    }

    /// Names in creation order, for order assertions.
    pub fn init_order(&self) -> Vec<&str> {
        self.instances.iter().map(FixtureInstance::name).collect()
    }

    fn push_event(&mut self, fixture: &str, phase: LifecyclePhase) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(LifecycleEvent {
            seq,
            fixture: fixture.to_string(),
            phase,
        });
    }

    /// Execute a plan against this context. Names already Ready are reused.
    /// On a mid-plan setup failure the context keeps everything materialized
    /// so far; later-planned fixtures are never touched.
    pub fn initialize(&mut self, plan: &InstantiationPlan) -> Result<(), FixtureError> {
        for step in plan.steps() {
            let name = step.name();
            if let Some(&idx) = self.index.get(name) {
                match self.instances[idx].state() {
                    InstanceState::Ready => continue,
                    state => {
                        return Err(FixtureError::Setup {
                            fixture: name.to_string(),
                            message: format!(
                                "fixture is `{state}` in this execution context and cannot be \
                                 materialized again"
                            ),
                        });
                    }
                }
            }

            self.push_event(name, LifecyclePhase::SetupStarted);
            let idx = self.instances.len();
            self.instances
                .push(FixtureInstance::initializing(name, idx));
            self.index.insert(name.to_string(), idx);

            match step.definition().source() {
                FixtureSource::Value(value) => {
                    self.instances[idx].mark_ready(value.clone(), None);
                    self.push_event(name, LifecyclePhase::Ready);
                }
                FixtureSource::Setup(setup) => {
                    let outcome = match self.deps_for(name, setup.params()) {
                        Ok(deps) => {
                            let mut handle = SetupHandle::new(name);
                            match setup.invoke(&deps, &mut handle) {
                                Ok(()) => handle.into_parts(),
                                Err(err) => Err(FixtureError::Setup {
                                    fixture: name.to_string(),
                                    message: err.to_string(),
                                }),
                            }
                        }
                        Err(err) => Err(err),
                    };
                    match outcome {
                        Ok((value, teardown)) => {
                            self.instances[idx].mark_ready(value, teardown);
                            self.push_event(name, LifecyclePhase::Ready);
                        }
                        Err(err) => {
                            self.instances[idx].mark_failed();
                            self.push_event(name, LifecyclePhase::SetupFailed);
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Dependency values for a setup, keyed by its local names. The plan
    /// materializes dependencies first, so every declared name is Ready.
    fn deps_for(&self, fixture: &str, params: &ParamBinding) -> Result<ResolvedDeps, FixtureError> {
        let mut values = BTreeMap::new();
        for entry in params.entries() {
            match self.value(&entry.source) {
                Some(value) => {
                    values.insert(entry.local.clone(), value.clone());
                }
                None => {
                    return Err(FixtureError::Setup {
                        fixture: fixture.to_string(),
                        message: format!("dependency `{}` is not ready", entry.source),
                    });
                }
            }
        }
        Ok(ResolvedDeps::new(values))
    }

    /// Steps 1–4 of an invocation: resolve the callable's declared binding,
    /// initialize incrementally, and build its view.
    pub fn prepare(&mut self, binding: &ParamBinding) -> Result<FixtureView, FixtureError> {
        let plan = resolver::resolve_binding(binding, &self.chain)?;
        self.initialize(&plan)?;
        Ok(self.view_for(binding))
    }

    /// View over already-materialized values for a binding. Unrequested or
    /// not-Ready names are absent.
    pub fn view_for(&self, binding: &ParamBinding) -> FixtureView {
        let mut values = BTreeMap::new();
        for entry in binding.entries() {
            if let Some(value) = self.value(&entry.source) {
                values.insert(entry.local.clone(), value.clone());
            }
        }
        FixtureView { values }
    }

    /// Tear down every Ready instance in exact reverse creation order.
    /// Errors are collected per instance and never stop the sweep. Failed
    /// instances are skipped; calling this again is a no-op.
    pub fn teardown(&mut self) -> Vec<TeardownError> {
        let mut errors = Vec::new();
        for idx in (0..self.instances.len()).rev() {
            if !self.instances[idx].state().needs_teardown() {
                continue;
            }
            let name = self.instances[idx].name().to_string();
            self.push_event(&name, LifecyclePhase::TeardownStarted);
            let teardown = self.instances[idx].take_teardown();
            self.instances[idx].mark_torn_down();
            let result = match teardown {
                Some(release) => release(),
                None => Ok(()),
            };
            match result {
                Ok(()) => self.push_event(&name, LifecyclePhase::TornDown),
                Err(err) => {
                    self.push_event(&name, LifecyclePhase::TeardownFailed);
                    errors.push(TeardownError {
                        fixture: name,
                        message: err.to_string(),
                    });
                }
            }
        }
        errors
    }

    /// Close out the test: run teardown and fold everything into an outcome.
    /// Used on every exit path, including cancellation — pass
    /// [`TestFailure::Timeout`] and everything Ready at that moment is still
    /// released.
    pub fn finish(mut self, failure: Option<TestFailure>) -> TestOutcome {
        let teardown_errors = self.teardown();
        TestOutcome {
            failure,
            teardown_errors,
            events: self.events,
        }
    }
}

// ---------------------------------------------------------------------------
// Callables and outcomes
// ---------------------------------------------------------------------------

/// A test or hook body with its declared fixture binding.
pub struct FixtureCallable {
    params: ParamBinding,
    body: Box<dyn Fn(&FixtureView) -> anyhow::Result<()> + Send + Sync>,
}

impl FixtureCallable {
    pub fn new<F>(params: ParamBinding, body: F) -> Self
    where
        F: Fn(&FixtureView) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            params,
            body: Box::new(body),
        }
    }

    pub fn params(&self) -> &ParamBinding {
        &self.params
    }

    pub fn invoke(&self, view: &FixtureView) -> anyhow::Result<()> {
        (self.body)(view)
    }
}

impl std::fmt::Debug for FixtureCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureCallable")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Primary failure of one test execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFailure {
    /// Resolution or setup failed before/while materializing fixtures.
    Fixture(FixtureError),
    /// The test or hook body itself failed.
    Body { message: String },
    /// The external scheduler cancelled the body.
    Timeout,
}

/// Outcome of one test execution: at most one primary failure, plus the
/// teardown errors collected as secondary failures, plus the full lifecycle
/// event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub failure: Option<TestFailure>,
    pub teardown_errors: Vec<TeardownError>,
    pub events: Vec<LifecycleEvent>,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.teardown_errors.is_empty()
    }
}

/// Drive one test: before-hooks, body, after-hooks, then teardown.
///
/// After-hooks still run when a before-hook or the body failed; the first
/// failure stays primary. Teardown always runs.
pub fn run_test(
    chain: ScopeChain,
    before_each: &[FixtureCallable],
    body: &FixtureCallable,
    after_each: &[FixtureCallable],
) -> TestOutcome {
    let mut ctx = ExecutionContext::new(chain);
    let mut failure: Option<TestFailure> = None;

    for hook in before_each {
        if let Some(found) = invoke(&mut ctx, hook) {
            failure = Some(found);
            break;
        }
    }
    if failure.is_none() {
        failure = invoke(&mut ctx, body);
    }
    for hook in after_each {
        if let Some(found) = invoke(&mut ctx, hook) {
            failure.get_or_insert(found);
        }
    }

    ctx.finish(failure)
}

fn invoke(ctx: &mut ExecutionContext, callable: &FixtureCallable) -> Option<TestFailure> {
    match ctx.prepare(callable.params()) {
        Err(err) => Some(TestFailure::Fixture(err)),
        Ok(view) => callable
            .invoke(&view)
            .err()
            .map(|err| TestFailure::Body {
                message: err.to_string(),
            }),
    }
}
