//! Per-instance lifecycle: the continuation handle, the instance state
//! machine, and the structured event log.
//!
//! States: `Unrequested → Initializing → Ready → TornDown`, with
//! `Initializing → Failed` on setup error (no teardown for that instance;
//! earlier Ready instances in the same plan still receive teardown in
//! reverse order).
//!
//! A setup is an explicit two-phase resource: the engine invokes it with its
//! resolved dependencies and a [`SetupHandle`]; the setup must call
//! [`SetupHandle::provide`] exactly once (the continuation) and may register
//! cleanup with [`SetupHandle::on_teardown`]. The coordinator drives release
//! directly on every exit path, including failure and cancellation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FixtureError;
use crate::registry::FixtureValue;

/// Cleanup captured at setup time, run once during teardown.
pub type TeardownFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

// ---------------------------------------------------------------------------
// InstanceState
// ---------------------------------------------------------------------------

/// Lifecycle state of one fixture instance within one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Defined somewhere reachable, but this context never asked for it.
    Unrequested,
    /// Setup is running; the continuation has not completed yet.
    Initializing,
    /// Value produced and cached; teardown pending.
    Ready,
    /// Teardown ran (successfully or not).
    TornDown,
    /// Setup failed before the continuation completed. Skipped at teardown.
    Failed,
}

impl InstanceState {
    /// Whether teardown still owes this instance a release.
    pub fn needs_teardown(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Stable string tag for structured logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrequested => "unrequested",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::TornDown => "torn_down",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResolvedDeps / SetupHandle — what a setup callable sees
// ---------------------------------------------------------------------------

/// Already-resolved dependency values, keyed by the setup's own local names.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDeps {
    values: BTreeMap<String, FixtureValue>,
}

impl ResolvedDeps {
    pub(crate) fn new(values: BTreeMap<String, FixtureValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, local: &str) -> Option<&FixtureValue> {
        self.values.get(local)
    }

    /// Dependency that the declared binding guarantees to exist.
    pub fn required(&self, local: &str) -> anyhow::Result<&FixtureValue> {
        match self.values.get(local) {
            Some(value) => Ok(value),
            None => anyhow::bail!("dependency `{local}` was not declared by this setup"),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Single-shot continuation handle passed to a setup callable.
pub struct SetupHandle {
    fixture: String,
    value: Option<FixtureValue>,
    provide_calls: u32,
    teardown: Option<TeardownFn>,
}

impl SetupHandle {
    pub(crate) fn new(fixture: &str) -> Self {
        Self {
            fixture: fixture.to_string(),
            value: None,
            provide_calls: 0,
            teardown: None,
        }
    }

    /// The continuation: hand the produced value to the engine. Mandatory,
    /// exactly once; a second call is a setup error.
    pub fn provide(&mut self, value: impl Into<FixtureValue>) -> Result<(), FixtureError> {
        self.provide_calls += 1;
        if self.provide_calls > 1 {
            return Err(FixtureError::Setup {
                fixture: self.fixture.clone(),
                message: "continuation invoked more than once".into(),
            });
        }
        self.value = Some(value.into());
        Ok(())
    }

    /// Register the post-continuation cleanup. A later registration replaces
    /// an earlier one.
    pub fn on_teardown<F>(&mut self, teardown: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.teardown = Some(Box::new(teardown));
    }

    /// Consume the handle after the setup returned `Ok`, enforcing the
    /// exactly-once continuation contract.
    pub(crate) fn into_parts(self) -> Result<(FixtureValue, Option<TeardownFn>), FixtureError> {
        match self.provide_calls {
            0 => Err(FixtureError::MissingUseCall {
                fixture: self.fixture,
            }),
            1 => {
                let value = self.value.expect("value set by provide");
                Ok((value, self.teardown))
            }
            _ => Err(FixtureError::Setup {
                fixture: self.fixture,
                message: "continuation invoked more than once".into(),
            }),
        }
    }
}

impl fmt::Debug for SetupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupHandle")
            .field("fixture", &self.fixture)
            .field("provide_calls", &self.provide_calls)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FixtureInstance
// ---------------------------------------------------------------------------

/// One materialized fixture. Created at most once per execution context,
/// owned exclusively by it, never shared across tests.
pub struct FixtureInstance {
    name: String,
    init_order: usize,
    state: InstanceState,
    value: Option<FixtureValue>,
    teardown: Option<TeardownFn>,
}

impl FixtureInstance {
    pub(crate) fn initializing(name: &str, init_order: usize) -> Self {
        Self {
            name: name.to_string(),
            init_order,
            state: InstanceState::Initializing,
            value: None,
            teardown: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index in creation order; teardown visits the exact reverse.
    pub fn init_order(&self) -> usize {
        self.init_order
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Resolved value; `None` unless the instance reached Ready.
    pub fn value(&self) -> Option<&FixtureValue> {
        self.value.as_ref()
    }

    pub(crate) fn mark_ready(&mut self, value: FixtureValue, teardown: Option<TeardownFn>) {
        self.state = InstanceState::Ready;
        self.value = Some(value);
        self.teardown = teardown;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = InstanceState::Failed;
        self.teardown = None;
    }

    pub(crate) fn take_teardown(&mut self) -> Option<TeardownFn> {
        self.teardown.take()
    }

    pub(crate) fn mark_torn_down(&mut self) {
        self.state = InstanceState::TornDown;
    }
}

impl fmt::Debug for FixtureInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureInstance")
            .field("name", &self.name)
            .field("init_order", &self.init_order)
            .field("state", &self.state)
            .field("value", &self.value)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle event log
// ---------------------------------------------------------------------------

/// Phase change recorded in the execution context's append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    SetupStarted,
    Ready,
    SetupFailed,
    TeardownStarted,
    TornDown,
    TeardownFailed,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetupStarted => "setup_started",
            Self::Ready => "ready",
            Self::SetupFailed => "setup_failed",
            Self::TeardownStarted => "teardown_started",
            Self::TornDown => "torn_down",
            Self::TeardownFailed => "teardown_failed",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record in the lifecycle event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Monotonic sequence number within one execution context.
    pub seq: u64,
    pub fixture: String,
    pub phase: LifecyclePhase,
}
