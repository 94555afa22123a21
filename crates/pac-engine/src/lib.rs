//! Host for proxy auto-config (PAC) scripts.
//!
//! A [`ProxyResolver`] compiles a PAC script into its own interpreter realm
//! and evaluates `FindProxyForURL(url, host)` on request. Scripts reach the
//! outside world only through the [`HostBindings`] the resolver owns, and
//! report through an optional [`DiagnosticsSink`].

pub mod bindings;
pub mod config;
mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod guard;
mod natives;
mod pac_utils;
mod time_range;

pub use bindings::{CachingBindings, HostBindings, StaticBindings};
pub use config::{Config, EngineOptions};
pub use context::EntryPoint;
pub use diagnostics::{CollectingSink, DiagnosticsSink, PacDomain, TracingSink};
pub use engine::ProxyResolver;
pub use error::{BindingError, CompileError, EvalError};
pub use guard::InterpreterGuard;
