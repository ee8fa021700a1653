#![no_main]

use fixture_engine::{
    run_test, FixtureCallable, FixtureDefinition, FixtureRegistry, LifecyclePhase, ParamBinding,
    ScopeChain,
};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

const POOL: usize = 6;

fn name(i: usize) -> String {
    format!("f{i}")
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // One byte per fixture selects its behavior; the mix of clean setups,
    // setup faults, missing continuations, and teardown faults must always
    // leave teardown order the exact reverse of the Ready order.
    let mut defs = Vec::with_capacity(POOL);
    for i in 0..POOL {
        let def = match data.get(i).copied().unwrap_or(0) % 5 {
            0 => FixtureDefinition::value(name(i), json!(i)),
            1 => FixtureDefinition::setup(name(i), ParamBinding::Absent, |_deps, handle| {
                handle.provide(json!("ok"))?;
                handle.on_teardown(|| Ok(()));
                Ok(())
            }),
            2 => FixtureDefinition::setup(name(i), ParamBinding::Absent, |_deps, _handle| {
                anyhow::bail!("setup fault")
            }),
            3 => FixtureDefinition::setup(name(i), ParamBinding::Absent, |_deps, _handle| Ok(())),
            _ => FixtureDefinition::setup(name(i), ParamBinding::Absent, |_deps, handle| {
                handle.provide(json!("ok"))?;
                handle.on_teardown(|| anyhow::bail!("teardown fault"));
                Ok(())
            }),
        };
        defs.push(def);
    }
    let chain = ScopeChain::root(FixtureRegistry::new().extend(defs));

    let requested: Vec<String> = (0..POOL).map(name).collect();
    let body = FixtureCallable::new(
        ParamBinding::destructured(requested.iter().cloned()),
        |_view| Ok(()),
    );
    let outcome = run_test(chain, &[], &body, &[]);

    let ready: Vec<&str> = outcome
        .events
        .iter()
        .filter(|e| e.phase == LifecyclePhase::Ready)
        .map(|e| e.fixture.as_str())
        .collect();
    let torn: Vec<&str> = outcome
        .events
        .iter()
        .filter(|e| e.phase == LifecyclePhase::TeardownStarted)
        .map(|e| e.fixture.as_str())
        .collect();

    let mut expected = ready.clone();
    expected.reverse();
    assert_eq!(torn, expected, "teardown must be exact reverse of ready");
});
