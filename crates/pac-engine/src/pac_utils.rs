//! The standard PAC helper library available to every script.

use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr};

use boa_engine::{Context, JsArgs, JsNativeError, JsResult, JsString, JsValue, NativeFunction};

use crate::context::CallSlot;
use crate::natives::{host_argument, make_binding};
use crate::time_range::{self, Clock, TimeArg};

type NativeFn = fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>;

const CLIENT_VERSION: &str = "1.0";

pub(crate) fn register(context: &mut Context, slot: &CallSlot) -> JsResult<()> {
    let pure: [(&str, usize, NativeFn); 11] = [
        ("isPlainHostName", 1, js_is_plain_host_name),
        ("dnsDomainIs", 2, js_dns_domain_is),
        ("localHostOrDomainIs", 2, js_local_host_or_domain_is),
        ("dnsDomainLevels", 1, js_dns_domain_levels),
        ("shExpMatch", 2, js_sh_exp_match),
        ("isInNetEx", 2, js_is_in_net_ex),
        ("sortIpAddressList", 1, js_sort_ip_address_list),
        ("getClientVersion", 0, js_get_client_version),
        ("weekdayRange", 1, js_weekday_range),
        ("dateRange", 1, js_date_range),
        ("timeRange", 1, js_time_range),
    ];
    for (name, length, function) in pure {
        context.register_global_builtin_callable(
            JsString::from(name),
            length,
            NativeFunction::from_fn_ptr(function),
        )?;
    }

    context.register_global_builtin_callable(
        JsString::from("isResolvable"),
        1,
        make_binding(slot, "isResolvable", |call, args, _ctx| {
            let host = host_argument("isResolvable", args)?;
            Ok(JsValue::from(call.bindings().resolve(&host).is_ok()))
        }),
    )?;
    context.register_global_builtin_callable(
        JsString::from("isResolvableEx"),
        1,
        make_binding(slot, "isResolvableEx", |call, args, _ctx| {
            let host = host_argument("isResolvableEx", args)?;
            let resolved = call.bindings().resolve_all(&host).is_ok_and(|addrs| !addrs.is_empty());
            Ok(JsValue::from(resolved))
        }),
    )?;
    context.register_global_builtin_callable(
        JsString::from("isInNet"),
        3,
        make_binding(slot, "isInNet", |call, args, ctx| {
            let host = string_arg(args, 0, ctx)?;
            let pattern = string_arg(args, 1, ctx)?;
            let mask = string_arg(args, 2, ctx)?;
            let addr = match host.parse::<Ipv4Addr>() {
                Ok(addr) => Some(addr),
                Err(_) => match call.bindings().resolve(&host) {
                    Ok(IpAddr::V4(addr)) => Some(addr),
                    _ => None,
                },
            };
            Ok(JsValue::from(addr.is_some_and(|addr| is_in_net(addr, &pattern, &mask))))
        }),
    )?;
    Ok(())
}

fn string_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<String> {
    Ok(args.get_or_undefined(index).to_string(ctx)?.to_std_string_escaped())
}

fn js_is_plain_host_name(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    Ok(JsValue::from(is_plain_host_name(&host)))
}

fn js_dns_domain_is(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    let domain = string_arg(args, 1, ctx)?;
    Ok(JsValue::from(dns_domain_is(&host, &domain)))
}

fn js_local_host_or_domain_is(
    _this: &JsValue,
    args: &[JsValue],
    ctx: &mut Context,
) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    let hostdom = string_arg(args, 1, ctx)?;
    Ok(JsValue::from(local_host_or_domain_is(&host, &hostdom)))
}

fn js_dns_domain_levels(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    let levels = i32::try_from(dns_domain_levels(&host)).unwrap_or(i32::MAX);
    Ok(JsValue::from(levels))
}

fn js_sh_exp_match(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let text = string_arg(args, 0, ctx)?;
    let pattern = string_arg(args, 1, ctx)?;
    Ok(JsValue::from(sh_exp_match(&text, &pattern)))
}

fn js_is_in_net_ex(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let addr = string_arg(args, 0, ctx)?;
    let prefix = string_arg(args, 1, ctx)?;
    Ok(JsValue::from(is_in_net_ex(&addr, &prefix)))
}

fn js_sort_ip_address_list(
    _this: &JsValue,
    args: &[JsValue],
    ctx: &mut Context,
) -> JsResult<JsValue> {
    let list = string_arg(args, 0, ctx)?;
    Ok(match sort_ip_address_list(&list) {
        Some(sorted) => JsValue::from(JsString::from(sorted.as_str())),
        None => JsValue::from(false),
    })
}

fn js_get_client_version(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::from(JsString::from(CLIENT_VERSION)))
}

fn js_weekday_range(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let args = time_args(args, ctx)?;
    Ok(JsValue::from(time_range::weekday_range(&args, &Clock::now())))
}

fn js_date_range(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let args = time_args(args, ctx)?;
    Ok(JsValue::from(time_range::date_range(&args, &Clock::now())))
}

fn js_time_range(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let args = time_args(args, ctx)?;
    match time_range::time_range(&args, &Clock::now()) {
        Some(matched) => Ok(JsValue::from(matched)),
        None => Err(JsNativeError::typ()
            .with_message("timeRange: bad number of arguments")
            .into()),
    }
}

/// Numbers and numeric strings become [`TimeArg::Number`].
fn time_args(args: &[JsValue], ctx: &mut Context) -> JsResult<Vec<TimeArg>> {
    let mut out = Vec::with_capacity(args.len());
    for value in args {
        if let Some(number) = value.as_number() {
            out.push(TimeArg::Number(number as i64));
            continue;
        }
        let text = value.to_string(ctx)?.to_std_string_escaped();
        match text.trim().parse::<i64>() {
            Ok(number) => out.push(TimeArg::Number(number)),
            Err(_) => out.push(TimeArg::Text(text)),
        }
    }
    Ok(out)
}

pub(crate) fn is_plain_host_name(host: &str) -> bool {
    !host.contains('.')
}

pub(crate) fn dns_domain_is(host: &str, domain: &str) -> bool {
    host.ends_with(domain)
}

pub(crate) fn local_host_or_domain_is(host: &str, hostdom: &str) -> bool {
    host == hostdom || hostdom.strip_prefix(host).is_some_and(|rest| rest.starts_with('.'))
}

pub(crate) fn dns_domain_levels(host: &str) -> usize {
    host.matches('.').count()
}

/// Shell-style match where `*` is any run and `?` any single character.
pub(crate) fn sh_exp_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if let Some((star, mark)) = backtrack {
            p = star + 1;
            t = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

pub(crate) fn is_in_net(addr: Ipv4Addr, pattern: &str, mask: &str) -> bool {
    let (Ok(pattern), Ok(mask)) = (pattern.parse::<Ipv4Addr>(), mask.parse::<Ipv4Addr>()) else {
        return false;
    };
    let mask = u32::from(mask);
    u32::from(addr) & mask == u32::from(pattern) & mask
}

/// `addr` must be a literal; `prefix` is `network/length`.
pub(crate) fn is_in_net_ex(addr: &str, prefix: &str) -> bool {
    let Ok(addr) = addr.trim().parse::<IpAddr>() else {
        return false;
    };
    let Some((network, length)) = prefix.trim().split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(length)) = (network.parse::<IpAddr>(), length.parse::<u32>()) else {
        return false;
    };
    match (addr, network) {
        (IpAddr::V4(a), IpAddr::V4(n)) if length <= 32 => {
            same_prefix(u128::from(u32::from(a)), u128::from(u32::from(n)), length, 32)
        }
        (IpAddr::V6(a), IpAddr::V6(n)) if length <= 128 => {
            same_prefix(u128::from(a), u128::from(n), length, 128)
        }
        _ => false,
    }
}

fn same_prefix(a: u128, b: u128, length: u32, width: u32) -> bool {
    if length == 0 {
        return true;
    }
    let shift = width - length;
    (a >> shift) == (b >> shift)
}

/// Sort a `;`-separated address list, IPv6 first. `None` if any entry is
/// not an address literal.
pub(crate) fn sort_ip_address_list(list: &str) -> Option<String> {
    let mut addrs = list
        .split(';')
        .map(|entry| entry.trim().parse::<IpAddr>().ok())
        .collect::<Option<Vec<_>>>()?;
    if addrs.is_empty() {
        return None;
    }
    addrs.sort_by(|a, b| match (a, b) {
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Less,
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Greater,
        _ => a.cmp(b),
    });
    Some(crate::natives::join_addresses(&addrs))
}
