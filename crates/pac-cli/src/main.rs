use std::fs;
use std::net::{IpAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use pac_engine::{
    BindingError, CachingBindings, Config, HostBindings, ProxyResolver, StaticBindings,
    TracingSink,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pac-eval", about = "Evaluate a PAC script for one URL")]
struct Args {
    /// PAC script to compile.
    #[arg(long)]
    script: PathBuf,
    /// URL passed to FindProxyForURL.
    #[arg(long)]
    url: String,
    /// Host passed to FindProxyForURL; derived from the URL when omitted.
    #[arg(long)]
    host: Option<String>,
    /// TOML or YAML engine config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Pin a host to an address, e.g. `proxy.corp=10.0.0.1`. Repeatable.
    #[arg(long = "resolve", value_name = "HOST=IP")]
    resolve: Vec<String>,
    /// Address reported by myIpAddress. Repeatable.
    #[arg(long = "local-ip", value_name = "IP")]
    local_ip: Vec<IpAddr>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Some(Config::load(path).with_context(|| format!("loading {}", path.display()))?),
        None => None,
    };
    install_subscriber(config.as_ref().and_then(Config::log_level));

    let options = config.as_ref().map(Config::engine_options).unwrap_or_default();
    let host = match &args.host {
        Some(host) => host.clone(),
        None => host_from_url(&args.url)
            .ok_or_else(|| anyhow!("cannot derive a host from {}; pass --host", args.url))?,
    };
    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("reading {}", args.script.display()))?;

    let bindings = CachingBindings::new(HarnessBindings::new(&args.resolve, &args.local_ip)?);
    let mut resolver = ProxyResolver::with_diagnostics(bindings, TracingSink).with_options(options);
    resolver.compile(&script)?;
    debug!(entry_point = ?resolver.entry_point(), host = host.as_str(), "Evaluating PAC script");
    let directive = resolver.evaluate(&args.url, &host)?;
    println!("{directive}");
    Ok(())
}

fn install_subscriber(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Host part of an http(s)/ftp/ws URL, without userinfo or port.
fn host_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or(bracketed)
    } else {
        authority.split(':').next().unwrap_or(authority)
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Command-line overrides first, then the system resolver.
struct HarnessBindings {
    overrides: StaticBindings,
    pinned_local: bool,
}

impl HarnessBindings {
    fn new(resolve: &[String], local: &[IpAddr]) -> Result<Self> {
        let mut overrides = StaticBindings::new();
        for entry in resolve {
            let (host, addr) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("--resolve expects HOST=IP, got {entry}"))?;
            let addr: IpAddr =
                addr.parse().with_context(|| format!("--resolve {host}: bad address {addr}"))?;
            overrides.insert(host, addr);
        }
        for addr in local {
            overrides = overrides.with_local(*addr);
        }
        Ok(Self { overrides, pinned_local: !local.is_empty() })
    }

    fn system_lookup(host: &str) -> Result<Vec<IpAddr>, BindingError> {
        let addrs: Vec<IpAddr> = (host, 0)
            .to_socket_addrs()
            .map_err(|err| BindingError::NotFound(format!("{host}: {err}")))?
            .map(|addr| addr.ip())
            .collect();
        if addrs.is_empty() {
            return Err(BindingError::NotFound(host.to_string()));
        }
        Ok(addrs)
    }

    /// Source address the kernel would pick for outbound traffic. No packet
    /// is sent.
    fn outbound_address() -> Result<IpAddr, BindingError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|err| BindingError::Unavailable(err.to_string()))?;
        socket
            .connect("198.51.100.1:53")
            .map_err(|err| BindingError::Unavailable(err.to_string()))?;
        let addr = socket
            .local_addr()
            .map_err(|err| BindingError::Unavailable(err.to_string()))?
            .ip();
        if addr.is_unspecified() {
            return Err(BindingError::Unavailable("no route to a public address".into()));
        }
        Ok(addr)
    }
}

impl HostBindings for HarnessBindings {
    fn resolve(&self, host: &str) -> Result<IpAddr, BindingError> {
        let addrs = self.resolve_all(host)?;
        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| BindingError::NotFound(host.to_string()))
    }

    fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, BindingError> {
        if self.overrides.contains(host) || host.parse::<IpAddr>().is_ok() {
            return self.overrides.resolve_all(host);
        }
        Self::system_lookup(host)
    }

    fn local_address(&self) -> Result<IpAddr, BindingError> {
        if self.pinned_local {
            return self.overrides.local_address();
        }
        Self::outbound_address()
    }

    fn local_addresses(&self) -> Result<Vec<IpAddr>, BindingError> {
        if self.pinned_local {
            return self.overrides.local_addresses();
        }
        Self::outbound_address().map(|addr| vec![addr])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_taken_from_url_authority() {
        assert_eq!(host_from_url("http://Example.COM/path").as_deref(), Some("example.com"));
        assert_eq!(host_from_url("https://user:pw@host.example:8443/?q").as_deref(), Some("host.example"));
        assert_eq!(host_from_url("http://[2001:db8::1]:80/").as_deref(), Some("2001:db8::1"));
        assert_eq!(host_from_url("ftp://files.example#frag").as_deref(), Some("files.example"));
        assert_eq!(host_from_url("no-scheme"), None);
        assert_eq!(host_from_url("http:///path"), None);
    }

    #[test]
    fn overrides_win_over_system_lookup() {
        let bindings =
            HarnessBindings::new(&["proxy.corp=10.0.0.7".into()], &["192.0.2.9".parse().unwrap()])
                .unwrap();
        assert_eq!(bindings.resolve("PROXY.corp").unwrap(), "10.0.0.7".parse::<IpAddr>().unwrap());
        assert_eq!(bindings.resolve("10.1.1.1").unwrap(), "10.1.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(bindings.local_address().unwrap(), "192.0.2.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn malformed_override_is_rejected() {
        assert!(HarnessBindings::new(&["no-equals".into()], &[]).is_err());
        assert!(HarnessBindings::new(&["host=not-an-ip".into()], &[]).is_err());
    }
}
