#![no_main]

use fixture_engine::{
    resolve, FixtureDefinition, FixtureRegistry, FixtureSource, ParamBinding, ScopeChain,
};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

const POOL: usize = 8;

fn byte(data: &[u8], idx: usize) -> u8 {
    data.get(idx).copied().unwrap_or(0)
}

fn name(i: usize) -> String {
    format!("f{i}")
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // One byte per fixture: a bitmask of dependencies on the pool. Cycles
    // and self-edges are deliberately reachable; resolution must terminate
    // with a plan or a typed error, never hang or panic.
    let mut defs = Vec::with_capacity(POOL);
    for i in 0..POOL {
        let mask = byte(data, i);
        if mask == 0 {
            defs.push(FixtureDefinition::value(name(i), json!(i)));
            continue;
        }
        let deps: Vec<String> = (0..POOL)
            .filter(|j| mask & (1 << *j) != 0)
            .map(name)
            .collect();
        defs.push(FixtureDefinition::setup(
            name(i),
            ParamBinding::destructured(deps),
            |_deps, handle| {
                handle.provide(json!(null))?;
                Ok(())
            },
        ));
    }
    let chain = ScopeChain::root(FixtureRegistry::new().extend(defs));

    let request_mask = byte(data, POOL);
    let requested: Vec<String> = (0..POOL)
        .filter(|i| request_mask & (1 << *i) != 0)
        .map(name)
        .collect();
    let requested: Vec<&str> = requested.iter().map(String::as_str).collect();

    let Ok(plan) = resolve(&requested, &chain) else {
        return;
    };

    // Topological invariant: every dependency appears strictly earlier than
    // its dependent, and no name is planned twice.
    let names = plan.names();
    for (pos, step) in plan.steps().iter().enumerate() {
        assert_eq!(names.iter().position(|n| n == &step.name()), Some(pos));
        if let FixtureSource::Setup(setup) = step.definition().source() {
            for dep in setup.params().requested_names() {
                let dep_pos = names.iter().position(|n| *n == dep).expect("dep planned");
                assert!(dep_pos < pos, "dependency must precede dependent");
            }
        }
    }
});
