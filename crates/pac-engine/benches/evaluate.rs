use criterion::{criterion_group, criterion_main, Criterion};
use pac_engine::{ProxyResolver, StaticBindings};

const SCRIPT: &str = r#"
    function FindProxyForURL(url, host) {
        if (isPlainHostName(host) || dnsDomainIs(host, ".corp.example")) return "DIRECT";
        if (isInNet(dnsResolve(host), "10.0.0.0", "255.0.0.0")) return "DIRECT";
        if (shExpMatch(url, "*/downloads/*")) return "PROXY bulk.example:3128";
        return "PROXY edge.example:8080; DIRECT";
    }
"#;

fn bench_evaluate(c: &mut Criterion) {
    let bindings = StaticBindings::new()
        .with_host("www.example.com", "203.0.113.10".parse().unwrap())
        .with_local("192.0.2.1".parse().unwrap());
    let mut resolver = ProxyResolver::new(bindings);
    resolver.compile(SCRIPT).unwrap();
    c.bench_function("pac_evaluate_routing_script", |b| {
        b.iter(|| resolver.evaluate("https://www.example.com/downloads/a.iso", "www.example.com").unwrap())
    });
    c.bench_function("pac_compile_routing_script", |b| {
        b.iter(|| resolver.compile(SCRIPT).unwrap())
    });
}
criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
