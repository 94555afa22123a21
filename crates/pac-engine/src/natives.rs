//! Script-visible capability functions.
//!
//! Each native looks up the active [`BindingCallContext`] and forwards to the
//! engine's [`crate::HostBindings`]. Failures become thrown `Error` values
//! the script may catch.

use std::net::IpAddr;

use boa_engine::{Context, JsArgs, JsError, JsNativeError, JsResult, JsString, JsValue, NativeFunction};

use crate::context::{BindingCallContext, CallSlot};
use crate::error::BindingError;

/// Register the binding vocabulary as globals of `context`.
pub(crate) fn register(context: &mut Context, slot: &CallSlot) -> JsResult<()> {
    context.register_global_builtin_callable(
        JsString::from("dnsResolve"),
        1,
        make_binding(slot, "dnsResolve", |call, args, _ctx| {
            let host = host_argument("dnsResolve", args)?;
            let addr = call
                .bindings()
                .resolve(&host)
                .map_err(|err| binding_failure("dnsResolve", &host, &err))?;
            Ok(JsValue::from(JsString::from(addr.to_string().as_str())))
        }),
    )?;
    context.register_global_builtin_callable(
        JsString::from("dnsResolveEx"),
        1,
        make_binding(slot, "dnsResolveEx", |call, args, _ctx| {
            let host = host_argument("dnsResolveEx", args)?;
            let addrs = call
                .bindings()
                .resolve_all(&host)
                .map_err(|err| binding_failure("dnsResolveEx", &host, &err))?;
            Ok(JsValue::from(JsString::from(join_addresses(&addrs).as_str())))
        }),
    )?;
    context.register_global_builtin_callable(
        JsString::from("myIpAddress"),
        0,
        make_binding(slot, "myIpAddress", |call, _args, _ctx| {
            let addr = call
                .bindings()
                .local_address()
                .map_err(|err| binding_failure("myIpAddress", "", &err))?;
            Ok(JsValue::from(JsString::from(addr.to_string().as_str())))
        }),
    )?;
    context.register_global_builtin_callable(
        JsString::from("myIpAddressEx"),
        0,
        make_binding(slot, "myIpAddressEx", |call, _args, _ctx| {
            let addrs = call
                .bindings()
                .local_addresses()
                .map_err(|err| binding_failure("myIpAddressEx", "", &err))?;
            Ok(JsValue::from(JsString::from(join_addresses(&addrs).as_str())))
        }),
    )?;
    context.register_global_builtin_callable(
        JsString::from("alert"),
        1,
        make_binding(slot, "alert", |call, args, ctx| {
            let message = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
            call.alert(&message);
            Ok(JsValue::undefined())
        }),
    )?;
    Ok(())
}

/// Wrap `body` so it runs against whichever call context is active when
/// the script invokes it.
pub(crate) fn make_binding<F>(slot: &CallSlot, name: &'static str, body: F) -> NativeFunction
where
    F: Fn(&BindingCallContext, &[JsValue], &mut Context) -> JsResult<JsValue> + 'static,
{
    let slot = slot.clone();
    // SAFETY: the closure captures no garbage-collected values.
    unsafe {
        NativeFunction::from_closure(move |_this, args, ctx| {
            let Some(call) = slot.current() else {
                return Err(JsNativeError::error()
                    .with_message(format!("{name}() called outside of an active request"))
                    .into());
            };
            call.record(name);
            body(&call, args, ctx)
        })
    }
}

/// The hostname argument, which must be a string.
pub(crate) fn host_argument(function: &str, args: &[JsValue]) -> JsResult<String> {
    args.get_or_undefined(0)
        .as_string()
        .map(|v| v.to_std_string_lossy())
        .ok_or_else(|| {
            JsNativeError::typ()
                .with_message(format!("{function}() expects a hostname string"))
                .into()
        })
}

pub(crate) fn join_addresses(addrs: &[IpAddr]) -> String {
    addrs.iter().map(ToString::to_string).collect::<Vec<_>>().join(";")
}

fn binding_failure(function: &str, host: &str, err: &BindingError) -> JsError {
    let message = if host.is_empty() {
        format!("{function}() failed: {err}")
    } else {
        format!("{function}(\"{host}\") failed: {err}")
    };
    JsNativeError::error().with_message(message).into()
}
