use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pac_engine::{BindingError, HostBindings, InterpreterGuard, ProxyResolver};

/// Tracks how many binding calls are in flight across every resolver that
/// shares it.
#[derive(Default)]
struct OverlapProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

struct ProbeBindings {
    probe: Arc<OverlapProbe>,
    answer: IpAddr,
}

impl HostBindings for ProbeBindings {
    fn resolve(&self, _host: &str) -> Result<IpAddr, BindingError> {
        let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(now, Ordering::SeqCst);
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(1));
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.answer)
    }

    fn local_address(&self) -> Result<IpAddr, BindingError> {
        Ok(self.answer)
    }
}

fn script_for(label: &str) -> String {
    format!(
        "function FindProxyForURL(url, host) {{ return 'PROXY {label}-' + dnsResolve(host) + ':' + host; }}"
    )
}

#[test]
fn parallel_resolvers_never_interleave() {
    const ROUNDS: usize = 50;
    let probe = Arc::new(OverlapProbe::default());

    let workers: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            let probe = Arc::clone(&probe);
            thread::spawn(move || {
                let answer = IpAddr::from([10, 0, 0, index as u8 + 1]);
                let mut resolver = ProxyResolver::new(ProbeBindings { probe, answer });
                resolver.compile(&script_for(label)).expect("compile");
                for round in 0..ROUNDS {
                    let host = format!("h{round}.example");
                    let directive =
                        resolver.evaluate(&format!("http://{host}/"), &host).expect("evaluate");
                    assert_eq!(directive, format!("PROXY {label}-{answer}:{host}"));
                    if round % 10 == 0 {
                        resolver.purge_memory();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(probe.calls.load(Ordering::SeqCst), 3 * ROUNDS);
    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    assert!(InterpreterGuard::is_initialised());
}

#[test]
fn recompiling_in_parallel_keeps_each_resolver_consistent() {
    let probe = Arc::new(OverlapProbe::default());
    let workers: Vec<_> = (0..4u8)
        .map(|index| {
            let probe = Arc::clone(&probe);
            thread::spawn(move || {
                let answer = IpAddr::from([192, 0, 2, index]);
                let mut resolver = ProxyResolver::new(ProbeBindings { probe, answer });
                for generation in 0..5 {
                    let label = format!("w{index}g{generation}");
                    resolver.compile(&script_for(&label)).expect("compile");
                    let directive = resolver.evaluate("http://x/", "x").expect("evaluate");
                    assert_eq!(directive, format!("PROXY {label}-{answer}:x"));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
}
