use std::cell::{Cell, RefCell};
use std::rc::Rc;

use boa_engine::object::builtins::JsFunction;
use boa_engine::{Context, JsError, JsString, JsValue, Script, Source};
use tracing::debug;

use crate::bindings::HostBindings;
use crate::config::EngineOptions;
use crate::diagnostics::{DiagnosticsSink, PacDomain};
use crate::error::{CompileError, EvalError};
use crate::{natives, pac_utils};

/// The script function the engine calls for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    FindProxyForUrl,
    /// IPv6-aware variant; preferred when a script defines both.
    FindProxyForUrlEx,
}

impl EntryPoint {
    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::FindProxyForUrl => "FindProxyForURL",
            EntryPoint::FindProxyForUrlEx => "FindProxyForURLEx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Compile,
    Evaluate,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Compile => "compile",
            Phase::Evaluate => "evaluate",
        }
    }
}

/// Ties one in-flight compile or evaluate call to the bindings and sink
/// its capability calls must reach.
pub(crate) struct BindingCallContext {
    bindings: Rc<dyn HostBindings>,
    diagnostics: Option<Rc<dyn DiagnosticsSink>>,
    phase: Phase,
    calls: Cell<u32>,
}

impl BindingCallContext {
    pub(crate) fn new(
        bindings: Rc<dyn HostBindings>,
        diagnostics: Option<Rc<dyn DiagnosticsSink>>,
        phase: Phase,
    ) -> Self {
        Self { bindings, diagnostics, phase, calls: Cell::new(0) }
    }

    pub(crate) fn bindings(&self) -> &dyn HostBindings {
        &*self.bindings
    }

    pub(crate) fn record(&self, name: &str) {
        self.calls.set(self.calls.get().saturating_add(1));
        debug!(domain = %PacDomain::Binding, phase = self.phase.as_str(), binding = name, "Script capability call");
    }

    pub(crate) fn alert(&self, message: &str) {
        debug!(domain = %PacDomain::Script, phase = self.phase.as_str(), "alert: {message}");
        if let Some(sink) = &self.diagnostics {
            sink.on_alert(message);
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.get()
    }
}

/// Holder the registered natives read the active call context from.
///
/// Empty between calls, which revokes the script's access to the host.
#[derive(Clone, Default)]
pub(crate) struct CallSlot(Rc<RefCell<Option<Rc<BindingCallContext>>>>);

impl CallSlot {
    pub(crate) fn install(&self, call: BindingCallContext) -> ActiveCall {
        let call = Rc::new(call);
        *self.0.borrow_mut() = Some(Rc::clone(&call));
        ActiveCall { slot: self.clone(), call }
    }

    pub(crate) fn current(&self) -> Option<Rc<BindingCallContext>> {
        self.0.borrow().clone()
    }
}

/// Clears its [`CallSlot`] when dropped.
pub(crate) struct ActiveCall {
    slot: CallSlot,
    call: Rc<BindingCallContext>,
}

impl ActiveCall {
    pub(crate) fn binding_calls(&self) -> u32 {
        self.call.calls()
    }
}

impl Drop for ActiveCall {
    fn drop(&mut self) {
        self.slot.0.borrow_mut().take();
    }
}

/// A compiled PAC script inside its own interpreter realm.
pub(crate) struct ScriptContext {
    // Declared before `context` so the function handle is released first.
    entry: JsFunction,
    entry_point: EntryPoint,
    context: Context,
    slot: CallSlot,
    bindings: Rc<dyn HostBindings>,
}

impl ScriptContext {
    /// Build a realm, run the script's top-level code and locate its entry
    /// point. The caller must hold the interpreter guard.
    pub(crate) fn compile(
        source: &str,
        options: &EngineOptions,
        call: BindingCallContext,
    ) -> Result<Self, CompileError> {
        let bindings = Rc::clone(&call.bindings);
        let slot = CallSlot::default();
        let mut context = Context::default();
        context.set_runtime_limits(options.runtime_limits());
        natives::register(&mut context, &slot)
            .map_err(|err| CompileError::Setup(err.to_string()))?;
        pac_utils::register(&mut context, &slot)
            .map_err(|err| CompileError::Setup(err.to_string()))?;

        let active = slot.install(call);
        let script = match Script::parse(Source::from_bytes(source.as_bytes()), None, &mut context)
        {
            Ok(script) => script,
            Err(err) => return Err(CompileError::Syntax(describe_error(&err, &mut context))),
        };
        if let Err(err) = script.evaluate(&mut context) {
            return Err(CompileError::Exception(describe_error(&err, &mut context)));
        }
        let (entry_point, entry) = find_entry_point(&mut context)?;
        debug!(
            domain = %PacDomain::Compile,
            entry_point = entry_point.name(),
            binding_calls = active.binding_calls(),
            "Script top-level code finished"
        );
        drop(active);

        Ok(Self { entry, entry_point, context, slot, bindings })
    }

    pub(crate) fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    /// Call the entry point with `(url, host)`. The caller must hold the
    /// interpreter guard.
    pub(crate) fn invoke(
        &mut self,
        url: &str,
        host: &str,
        call: BindingCallContext,
    ) -> Result<String, EvalError> {
        let active = self.slot.install(call);
        let args = [JsValue::from(JsString::from(url)), JsValue::from(JsString::from(host))];
        let outcome = self.entry.call(&JsValue::undefined(), &args, &mut self.context);
        debug!(
            domain = %PacDomain::Evaluate,
            binding_calls = active.binding_calls(),
            "Entry point returned"
        );
        drop(active);

        let value = match outcome {
            Ok(value) => value,
            Err(err) => return Err(EvalError::RuntimeFault(describe_error(&err, &mut self.context))),
        };
        match value.as_string() {
            Some(result) => Ok(result.to_std_string_lossy()),
            None => Err(EvalError::BadReturnType { found: value.type_of().to_string() }),
        }
    }
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        debug!(domain = %PacDomain::Runtime, entry_point = self.entry_point.name(), "Discarding script context");
        self.bindings.on_script_swap();
    }
}

fn find_entry_point(context: &mut Context) -> Result<(EntryPoint, JsFunction), CompileError> {
    let global = context.global_object();
    for entry_point in [EntryPoint::FindProxyForUrlEx, EntryPoint::FindProxyForUrl] {
        let value = match global.get(JsString::from(entry_point.name()), context) {
            Ok(value) => value,
            Err(err) => return Err(CompileError::Exception(describe_error(&err, context))),
        };
        if let Some(function) = value.as_object().map(|obj| obj.clone()).and_then(JsFunction::from_object) {
            return Ok((entry_point, function));
        }
    }
    Err(CompileError::MissingEntryPoint)
}

/// Render a script error as `Kind: message` where possible.
pub(crate) fn describe_error(err: &JsError, context: &mut Context) -> String {
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => err.to_string(),
    }
}
