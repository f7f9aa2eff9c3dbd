//! Top-level global functions.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GlobalFn {
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    EncodeUriComponent,
    DecodeUriComponent,
    EncodeUri,
    DecodeUri,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    define_method(cx, global, "parseInt", NativeFn::Global(GlobalFn::ParseInt), 2)?;
    define_method(cx, global, "parseFloat", NativeFn::Global(GlobalFn::ParseFloat), 1)?;
    define_method(cx, global, "isNaN", NativeFn::Global(GlobalFn::IsNaN), 1)?;
    define_method(cx, global, "isFinite", NativeFn::Global(GlobalFn::IsFinite), 1)?;
    define_method(
        cx,
        global,
        "encodeURIComponent",
        NativeFn::Global(GlobalFn::EncodeUriComponent),
        1,
    )?;
    define_method(
        cx,
        global,
        "decodeURIComponent",
        NativeFn::Global(GlobalFn::DecodeUriComponent),
        1,
    )?;
    define_method(cx, global, "encodeURI", NativeFn::Global(GlobalFn::EncodeUri), 1)?;
    define_method(cx, global, "decodeURI", NativeFn::Global(GlobalFn::DecodeUri), 1)?;
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: GlobalFn,
    _this: &Value,
    args: &[Value],
) -> RunResult<Value> {
    match f {
        GlobalFn::ParseInt => {
            let text = cx.to_js_string(&arg(args, 0))?;
            let radix = cx.to_number_value(&arg(args, 1))?;
            Ok(Value::number(parse_int(text.as_str(), radix as u32)))
        }
        GlobalFn::ParseFloat => {
            let text = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::number(parse_float(text.as_str())))
        }
        GlobalFn::IsNaN => {
            let n = cx.to_number_value(&arg(args, 0))?;
            Ok(Value::bool(n.is_nan()))
        }
        GlobalFn::IsFinite => {
            let n = cx.to_number_value(&arg(args, 0))?;
            Ok(Value::bool(n.is_finite()))
        }
        GlobalFn::EncodeUriComponent => {
            let text = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::str(encode_uri(text.as_str(), false)))
        }
        GlobalFn::EncodeUri => {
            let text = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::str(encode_uri(text.as_str(), true)))
        }
        GlobalFn::DecodeUriComponent | GlobalFn::DecodeUri => {
            let text = cx.to_js_string(&arg(args, 0))?;
            match decode_uri(text.as_str()) {
                Some(decoded) => Ok(Value::str(decoded)),
                None => Err(cx.raise(crate::error::ErrorKind::Uri, "URI malformed")),
            }
        }
    }
}

/// `parseInt`: optional sign, optional `0x` when radix is 16 or absent,
/// stops at the first invalid digit.
fn parse_int(text: &str, radix: u32) -> f64 {
    let mut s = text.trim();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = radix;
    if radix == 0 {
        radix = 10;
    }
    if radix == 16 || text.trim().starts_with("0x") || text.trim().starts_with("0X") {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0f64;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                any = true;
                value = value * f64::from(radix) + f64::from(d);
            }
            None => break,
        }
    }
    if any { sign * value } else { f64::NAN }
}

/// `parseFloat`: longest valid decimal prefix.
fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_e = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'0'..=b'9' => end = i + 1,
            b'+' | b'-' if i == 0 || matches!(bytes.get(i - 1), Some(b'e' | b'E')) => {}
            b'.' if !seen_dot && !seen_e => seen_dot = true,
            b'e' | b'E' if !seen_e && end > 0 => seen_e = true,
            _ => break,
        }
    }
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if s.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    s[..end.min(s.len())].parse().unwrap_or(f64::NAN)
}

fn is_uri_unreserved(b: u8, full_uri: bool) -> bool {
    if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')') {
        return true;
    }
    full_uri && matches!(b, b';' | b'/' | b'?' | b':' | b'@' | b'&' | b'=' | b'+' | b'$' | b',' | b'#')
}

fn encode_uri(text: &str, full_uri: bool) -> String {
    let mut out = String::new();
    for &b in text.as_bytes() {
        if is_uri_unreserved(b, full_uri) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_uri(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3)?;
            let value = u8::from_str_radix(hex, 16).ok()?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
