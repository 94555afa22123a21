#![no_main]
use libfuzzer_sys::fuzz_target;
use pac_engine::{EngineOptions, ProxyResolver, StaticBindings};

// Compiles arbitrary source under tight execution bounds and, when a script
// loads, runs its entry point once.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let options = EngineOptions {
        loop_iteration_limit: 10_000,
        recursion_limit: 64,
        ..EngineOptions::default()
    };
    let mut resolver = ProxyResolver::new(StaticBindings::new()).with_options(options);
    if resolver.compile(source).is_ok() {
        let _ = resolver.evaluate("http://fuzz.example/", "fuzz.example");
    }
});
