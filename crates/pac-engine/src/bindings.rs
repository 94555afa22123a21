use std::collections::HashMap;
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::diagnostics::PacDomain;
use crate::error::BindingError;

/// Capabilities a PAC script may reach through `dnsResolve`,
/// `dnsResolveEx`, `myIpAddress` and `myIpAddressEx`.
///
/// Implementations are only called from the thread that currently holds the
/// interpreter guard and must not re-enter the engine.
pub trait HostBindings {
    /// Resolve `host` to a single address.
    fn resolve(&self, host: &str) -> Result<IpAddr, BindingError>;

    /// Resolve `host` to every known address, in preference order.
    fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, BindingError> {
        self.resolve(host).map(|addr| vec![addr])
    }

    fn local_address(&self) -> Result<IpAddr, BindingError>;

    fn local_addresses(&self) -> Result<Vec<IpAddr>, BindingError> {
        self.local_address().map(|addr| vec![addr])
    }

    /// Drop memoised results. Called by `purge_memory`.
    fn purge(&self) {}

    /// The script these bindings serve was replaced or unloaded.
    fn on_script_swap(&self) {
        self.purge();
    }
}

macro_rules! forward_host_bindings {
    ($($ptr:ident),*) => {$(
        impl<T: HostBindings + ?Sized> HostBindings for $ptr<T> {
            fn resolve(&self, host: &str) -> Result<IpAddr, BindingError> {
                (**self).resolve(host)
            }

            fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, BindingError> {
                (**self).resolve_all(host)
            }

            fn local_address(&self) -> Result<IpAddr, BindingError> {
                (**self).local_address()
            }

            fn local_addresses(&self) -> Result<Vec<IpAddr>, BindingError> {
                (**self).local_addresses()
            }

            fn purge(&self) {
                (**self).purge()
            }

            fn on_script_swap(&self) {
                (**self).on_script_swap()
            }
        }
    )*};
}

forward_host_bindings!(Box, Rc, Arc);

/// Fixed host table, useful for tests and offline evaluation.
///
/// Address literals resolve to themselves. Lookups ignore ASCII case.
#[derive(Debug, Clone, Default)]
pub struct StaticBindings {
    hosts: HashMap<String, Vec<IpAddr>>,
    local: Vec<IpAddr>,
}

impl StaticBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, addr: IpAddr) -> Self {
        self.insert(host, addr);
        self
    }

    pub fn with_local(mut self, addr: IpAddr) -> Self {
        self.local.push(addr);
        self
    }

    pub fn insert(&mut self, host: &str, addr: IpAddr) {
        self.hosts.entry(host.to_ascii_lowercase()).or_default().push(addr);
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains_key(&host.to_ascii_lowercase())
    }
}

impl HostBindings for StaticBindings {
    fn resolve(&self, host: &str) -> Result<IpAddr, BindingError> {
        self.resolve_all(host)?
            .into_iter()
            .next()
            .ok_or_else(|| BindingError::NotFound(host.to_string()))
    }

    fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, BindingError> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(vec![addr]);
        }
        match self.hosts.get(&host.to_ascii_lowercase()) {
            Some(addrs) if !addrs.is_empty() => Ok(addrs.clone()),
            _ => Err(BindingError::NotFound(host.to_string())),
        }
    }

    fn local_address(&self) -> Result<IpAddr, BindingError> {
        self.local
            .first()
            .copied()
            .ok_or_else(|| BindingError::Unavailable("no local address configured".into()))
    }

    fn local_addresses(&self) -> Result<Vec<IpAddr>, BindingError> {
        if self.local.is_empty() {
            return Err(BindingError::Unavailable("no local address configured".into()));
        }
        Ok(self.local.clone())
    }
}

#[derive(Debug, Default)]
struct ResolutionCache {
    single: HashMap<String, Result<IpAddr, BindingError>>,
    all: HashMap<String, Result<Vec<IpAddr>, BindingError>>,
    local: Option<Result<Vec<IpAddr>, BindingError>>,
}

impl ResolutionCache {
    fn len(&self) -> usize {
        self.single.len() + self.all.len() + usize::from(self.local.is_some())
    }
}

/// Memoises another [`HostBindings`], failures included.
///
/// The cache lives until `purge` or a script swap clears it.
#[derive(Debug)]
pub struct CachingBindings<B> {
    inner: B,
    cache: Mutex<ResolutionCache>,
}

impl<B: HostBindings> CachingBindings<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, cache: Mutex::new(ResolutionCache::default()) }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Number of memoised lookups.
    pub fn cached_entries(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResolutionCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_cache(&self) {
        let dropped = {
            let mut cache = self.lock();
            let dropped = cache.len();
            *cache = ResolutionCache::default();
            dropped
        };
        if dropped > 0 {
            debug!(domain = %PacDomain::Binding, dropped, "Purged cached host lookups");
        }
    }

    fn local_list(&self) -> Result<Vec<IpAddr>, BindingError> {
        if let Some(hit) = &self.lock().local {
            return hit.clone();
        }
        let fresh = self.inner.local_addresses();
        self.lock().local = Some(fresh.clone());
        fresh
    }
}

impl<B: HostBindings> HostBindings for CachingBindings<B> {
    fn resolve(&self, host: &str) -> Result<IpAddr, BindingError> {
        let key = host.to_ascii_lowercase();
        if let Some(hit) = self.lock().single.get(&key) {
            return hit.clone();
        }
        let fresh = self.inner.resolve(host);
        self.lock().single.insert(key, fresh.clone());
        fresh
    }

    fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, BindingError> {
        let key = host.to_ascii_lowercase();
        if let Some(hit) = self.lock().all.get(&key) {
            return hit.clone();
        }
        let fresh = self.inner.resolve_all(host);
        self.lock().all.insert(key, fresh.clone());
        fresh
    }

    fn local_address(&self) -> Result<IpAddr, BindingError> {
        self.local_list()?
            .into_iter()
            .next()
            .ok_or_else(|| BindingError::Unavailable("no local address available".into()))
    }

    fn local_addresses(&self) -> Result<Vec<IpAddr>, BindingError> {
        self.local_list()
    }

    fn purge(&self) {
        self.clear_cache();
        self.inner.purge();
    }

    fn on_script_swap(&self) {
        self.clear_cache();
        self.inner.on_script_swap();
    }
}
