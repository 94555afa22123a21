use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bindings::HostBindings;
use crate::config::EngineOptions;
use crate::context::{BindingCallContext, EntryPoint, Phase, ScriptContext};
use crate::diagnostics::{DiagnosticsSink, PacDomain};
use crate::error::{CompileError, EvalError};
use crate::guard::InterpreterGuard;

/// Evaluates PAC scripts on behalf of one client.
///
/// A resolver holds at most one compiled script. Every interpreter entry
/// (compile, evaluate, purge, teardown) goes through the process-wide
/// [`InterpreterGuard`], so resolvers created on different threads never run
/// script code at the same time.
///
/// The resolver is tied to the thread that created it.
///
/// ```no_run
/// use pac_engine::{ProxyResolver, StaticBindings};
///
/// let mut resolver = ProxyResolver::new(StaticBindings::new());
/// resolver
///     .compile("function FindProxyForURL(url, host) { return 'DIRECT'; }")
///     .expect("valid script");
/// let directive = resolver.evaluate("http://example.com/", "example.com");
/// assert_eq!(directive.as_deref(), Ok("DIRECT"));
/// ```
pub struct ProxyResolver {
    context: Option<ScriptContext>,
    bindings: Rc<dyn HostBindings>,
    diagnostics: Option<Rc<dyn DiagnosticsSink>>,
    options: EngineOptions,
}

impl ProxyResolver {
    /// Create a resolver that owns `bindings`. Alerts and errors are only
    /// logged.
    pub fn new(bindings: impl HostBindings + 'static) -> Self {
        Self {
            context: None,
            bindings: Rc::new(bindings),
            diagnostics: None,
            options: EngineOptions::default(),
        }
    }

    pub fn with_diagnostics(
        bindings: impl HostBindings + 'static,
        diagnostics: impl DiagnosticsSink + 'static,
    ) -> Self {
        let mut resolver = Self::new(bindings);
        resolver.diagnostics = Some(Rc::new(diagnostics));
        resolver
    }

    /// Limits used by subsequent compiles. The loaded script keeps the
    /// limits it was compiled with.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn bindings(&self) -> &dyn HostBindings {
        &*self.bindings
    }

    pub fn is_loaded(&self) -> bool {
        self.context.is_some()
    }

    /// Which function of the loaded script serves requests.
    pub fn entry_point(&self) -> Option<EntryPoint> {
        self.context.as_ref().map(ScriptContext::entry_point)
    }

    /// Compile `script` and make it the active script.
    ///
    /// The new script is fully prepared before the old one is discarded, so
    /// on error the previously loaded script (if any) stays active.
    pub fn compile(&mut self, script: &str) -> Result<(), CompileError> {
        let guard = InterpreterGuard::acquire();
        if script.len() > self.options.max_script_bytes {
            let err =
                CompileError::TooLarge { limit: self.options.max_script_bytes, actual: script.len() };
            warn!(domain = %PacDomain::Compile, bytes = script.len(), limit = self.options.max_script_bytes, "PAC script too large");
            self.report_error(&err.to_string());
            return Err(err);
        }

        let started = Instant::now();
        let call = self.call_context(Phase::Compile);
        match ScriptContext::compile(script, &self.options, call) {
            Ok(context) => {
                let entry_point = context.entry_point();
                let replaced = self.context.replace(context).is_some();
                info!(
                    domain = %PacDomain::Compile,
                    entry_point = entry_point.name(),
                    bytes = script.len(),
                    replaced,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    entries = guard.entries(),
                    "PAC script loaded"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    domain = %PacDomain::Compile,
                    bytes = script.len(),
                    still_loaded = self.context.is_some(),
                    error = %err,
                    "PAC script rejected"
                );
                self.report_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Run the loaded script's entry point for `(url, host)`.
    pub fn evaluate(&mut self, url: &str, host: &str) -> Result<String, EvalError> {
        if self.context.is_none() {
            return Err(EvalError::NoScriptLoaded);
        }
        let _guard = InterpreterGuard::acquire();
        let started = Instant::now();
        let call = self.call_context(Phase::Evaluate);
        let outcome = match self.context.as_mut() {
            Some(context) => context.invoke(url, host, call),
            None => Err(EvalError::NoScriptLoaded),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(directive) => {
                debug!(domain = %PacDomain::Evaluate, host, directive = directive.as_str(), elapsed_ms, "Resolved proxy");
            }
            Err(EvalError::RuntimeFault(message)) => {
                warn!(domain = %PacDomain::Evaluate, host, elapsed_ms, error = message.as_str(), "PAC script fault");
                self.report_error(message);
            }
            Err(err) => {
                warn!(domain = %PacDomain::Evaluate, host, elapsed_ms, error = %err, "PAC evaluation failed");
            }
        }
        outcome
    }

    /// Release cached lookups and collect unreachable interpreter memory.
    /// The loaded script stays loaded.
    pub fn purge_memory(&mut self) {
        let _guard = InterpreterGuard::acquire();
        self.bindings.purge();
        boa_gc::force_collect();
        debug!(domain = %PacDomain::Runtime, loaded = self.context.is_some(), "Purged interpreter memory");
    }

    /// Discard the loaded script, if any.
    pub fn unload(&mut self) {
        if let Some(context) = self.context.take() {
            let _guard = InterpreterGuard::acquire();
            drop(context);
            info!(domain = %PacDomain::Runtime, "PAC script unloaded");
        }
    }

    fn call_context(&self, phase: Phase) -> BindingCallContext {
        BindingCallContext::new(Rc::clone(&self.bindings), self.diagnostics.clone(), phase)
    }

    fn report_error(&self, message: &str) {
        if let Some(sink) = &self.diagnostics {
            sink.on_error(message);
        }
    }
}

impl Drop for ProxyResolver {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            let _guard = InterpreterGuard::acquire();
            drop(context);
        }
    }
}

impl std::fmt::Debug for ProxyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyResolver")
            .field("entry_point", &self.entry_point())
            .field("options", &self.options)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}
