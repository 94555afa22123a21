use std::cell::RefCell;
use std::net::IpAddr;
use std::rc::Rc;

use pac_engine::{
    BindingError, CachingBindings, CollectingSink, EvalError, HostBindings, ProxyResolver,
    StaticBindings,
};

/// Static table that also logs every lookup it serves.
#[derive(Default)]
struct RecordingBindings {
    table: StaticBindings,
    lookups: RefCell<Vec<String>>,
    swaps: RefCell<usize>,
}

impl RecordingBindings {
    fn new(table: StaticBindings) -> Self {
        Self { table, ..Self::default() }
    }

    fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }
}

impl HostBindings for RecordingBindings {
    fn resolve(&self, host: &str) -> Result<IpAddr, BindingError> {
        self.lookups.borrow_mut().push(host.to_string());
        self.table.resolve(host)
    }

    fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, BindingError> {
        self.lookups.borrow_mut().push(host.to_string());
        self.table.resolve_all(host)
    }

    fn local_address(&self) -> Result<IpAddr, BindingError> {
        self.table.local_address()
    }

    fn local_addresses(&self) -> Result<Vec<IpAddr>, BindingError> {
        self.table.local_addresses()
    }

    fn on_script_swap(&self) {
        *self.swaps.borrow_mut() += 1;
    }
}

fn table() -> StaticBindings {
    StaticBindings::new()
        .with_host("proxy.corp.example", "10.20.30.40".parse().unwrap())
        .with_host("dual.example", "192.0.2.7".parse().unwrap())
        .with_host("dual.example", "2001:db8::7".parse().unwrap())
        .with_local("172.16.0.9".parse().unwrap())
        .with_local("fe80::9".parse().unwrap())
}

#[test]
fn dns_resolve_returns_binding_value() {
    let bindings = Rc::new(RecordingBindings::new(table()));
    let mut resolver = ProxyResolver::new(Rc::clone(&bindings));
    resolver
        .compile("function FindProxyForURL(url, host) { return 'PROXY ' + dnsResolve('proxy.corp.example') + ':80'; }")
        .expect("compile");
    assert_eq!(
        resolver.evaluate("http://example.com/", "example.com").as_deref(),
        Ok("PROXY 10.20.30.40:80")
    );
    assert_eq!(bindings.lookups(), vec!["proxy.corp.example".to_string()]);
}

#[test]
fn uncaught_resolution_failure_is_a_runtime_fault() {
    let sink = Rc::new(CollectingSink::new());
    let mut resolver = ProxyResolver::with_diagnostics(table(), Rc::clone(&sink));
    resolver
        .compile("function FindProxyForURL(url, host) { return 'PROXY ' + dnsResolve(host) + ':80'; }")
        .expect("compile");
    match resolver.evaluate("http://x/", "x") {
        Err(EvalError::RuntimeFault(message)) => assert!(message.contains("dnsResolve"), "{message}"),
        other => panic!("expected runtime fault, got {other:?}"),
    }
    assert_eq!(sink.errors().len(), 1);
    assert_eq!(
        resolver.evaluate("http://proxy.corp.example/", "proxy.corp.example").as_deref(),
        Ok("PROXY 10.20.30.40:80")
    );
}

#[test]
fn caught_resolution_failure_is_absorbed() {
    let sink = Rc::new(CollectingSink::new());
    let mut resolver = ProxyResolver::with_diagnostics(table(), Rc::clone(&sink));
    resolver
        .compile(
            r#"
            function FindProxyForURL(url, host) {
                try {
                    return "PROXY " + dnsResolve(host) + ":80";
                } catch (e) {
                    return "DIRECT";
                }
            }
            "#,
        )
        .expect("compile");
    assert_eq!(resolver.evaluate("http://x/", "x").as_deref(), Ok("DIRECT"));
    assert!(sink.errors().is_empty());
}

#[test]
fn multi_address_bindings_are_semicolon_joined() {
    let mut resolver = ProxyResolver::new(table());
    resolver
        .compile(
            r#"
            function FindProxyForURL(url, host) {
                return dnsResolveEx(host) + "|" + myIpAddress() + "|" + myIpAddressEx();
            }
            "#,
        )
        .expect("compile");
    assert_eq!(
        resolver.evaluate("http://dual.example/", "dual.example").as_deref(),
        Ok("192.0.2.7;2001:db8::7|172.16.0.9|172.16.0.9;fe80::9")
    );
}

#[test]
fn missing_local_address_is_a_runtime_fault() {
    let mut resolver = ProxyResolver::new(StaticBindings::new());
    resolver.compile("function FindProxyForURL() { return myIpAddress(); }").expect("compile");
    assert!(matches!(
        resolver.evaluate("http://example.com/", "example.com"),
        Err(EvalError::RuntimeFault(_))
    ));
}

#[test]
fn alert_reaches_sink_once_per_evaluation() {
    let sink = Rc::new(CollectingSink::new());
    let mut resolver = ProxyResolver::with_diagnostics(StaticBindings::new(), Rc::clone(&sink));
    resolver
        .compile("function FindProxyForURL(url, host) { alert('loaded'); return 'DIRECT'; }")
        .expect("compile");
    assert!(sink.alerts().is_empty());

    assert_eq!(resolver.evaluate("http://example.com/", "example.com").as_deref(), Ok("DIRECT"));
    assert_eq!(sink.alerts(), vec!["loaded".to_string()]);

    assert_eq!(resolver.evaluate("http://example.com/", "example.com").as_deref(), Ok("DIRECT"));
    assert_eq!(sink.alerts(), vec!["loaded".to_string(), "loaded".to_string()]);
    assert!(sink.errors().is_empty());
}

#[test]
fn alert_without_sink_is_dropped() {
    let mut resolver = ProxyResolver::new(StaticBindings::new());
    resolver
        .compile("alert({ toString: function () { return 'top-level'; } }); function FindProxyForURL() { alert(1); return 'DIRECT'; }")
        .expect("compile");
    assert_eq!(resolver.evaluate("http://example.com/", "example.com").as_deref(), Ok("DIRECT"));
}

#[test]
fn bindings_are_available_during_compile() {
    let sink = Rc::new(CollectingSink::new());
    let bindings = Rc::new(RecordingBindings::new(table()));
    let mut resolver = ProxyResolver::with_diagnostics(Rc::clone(&bindings), Rc::clone(&sink));
    resolver
        .compile(
            r#"
            var corpProxy = dnsResolve("proxy.corp.example");
            alert("corp proxy is " + corpProxy);
            function FindProxyForURL(url, host) { return "PROXY " + corpProxy + ":8080"; }
            "#,
        )
        .expect("compile");
    assert_eq!(sink.alerts(), vec!["corp proxy is 10.20.30.40".to_string()]);
    assert_eq!(
        resolver.evaluate("http://example.com/", "example.com").as_deref(),
        Ok("PROXY 10.20.30.40:8080")
    );
    assert_eq!(bindings.lookups().len(), 1);
}

#[test]
fn script_swap_notifies_bindings() {
    let bindings = Rc::new(RecordingBindings::new(table()));
    let mut resolver = ProxyResolver::new(Rc::clone(&bindings));
    resolver.compile("function FindProxyForURL() { return 'DIRECT'; }").expect("compile");
    assert_eq!(*bindings.swaps.borrow(), 0);

    assert!(resolver.compile("function Nope() {}").is_err());
    assert_eq!(*bindings.swaps.borrow(), 0);

    resolver.compile("function FindProxyForURL() { return 'PROXY p:1'; }").expect("recompile");
    assert_eq!(*bindings.swaps.borrow(), 1);

    resolver.unload();
    assert_eq!(*bindings.swaps.borrow(), 2);
}

#[test]
fn dropping_resolver_notifies_bindings() {
    let bindings = Rc::new(RecordingBindings::new(table()));
    let mut resolver = ProxyResolver::new(Rc::clone(&bindings));
    resolver.compile("function FindProxyForURL() { return 'DIRECT'; }").expect("compile");
    drop(resolver);
    assert_eq!(*bindings.swaps.borrow(), 1);
}

#[test]
fn purge_clears_memoised_lookups() {
    let cached = Rc::new(CachingBindings::new(RecordingBindings::new(table())));
    let mut resolver = ProxyResolver::new(Rc::clone(&cached));
    resolver
        .compile("function FindProxyForURL(url, host) { return 'PROXY ' + dnsResolve('proxy.corp.example') + ':80'; }")
        .expect("compile");

    let first = resolver.evaluate("http://a/", "a");
    let second = resolver.evaluate("http://b/", "b");
    assert_eq!(first, second);
    assert_eq!(cached.inner().lookups().len(), 1);
    assert_eq!(cached.cached_entries(), 1);

    resolver.purge_memory();
    assert_eq!(cached.cached_entries(), 0);
    assert_eq!(resolver.evaluate("http://a/", "a"), first);
    assert_eq!(cached.inner().lookups().len(), 2);
}

#[test]
fn accessor_exposes_configured_bindings() {
    let resolver = ProxyResolver::new(table());
    assert_eq!(
        resolver.bindings().resolve("proxy.corp.example").map(|addr| addr.to_string()),
        Ok("10.20.30.40".to_string())
    );
}
