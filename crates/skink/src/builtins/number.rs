//! The `Number` constructor and prototype.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::ObjectData,
    resource::ResourceTracker,
    value::{Value, bigint_to_f64, format_number},
};

use super::{NativeFn, arg, define_ctor, define_method, global};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberFn {
    Ctor,
    IsInteger,
    IsFinite,
    IsNaN,
    IsSafeInteger,
    ProtoToFixed,
    ProtoToString,
    ProtoValueOf,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global_obj: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().number_proto;
    define_method(cx, proto, "toFixed", NativeFn::Number(NumberFn::ProtoToFixed), 1)?;
    define_method(cx, proto, "toString", NativeFn::Number(NumberFn::ProtoToString), 1)?;
    define_method(cx, proto, "valueOf", NativeFn::Number(NumberFn::ProtoValueOf), 0)?;

    let ctor = define_ctor(cx, global_obj, "Number", NativeFn::Number(NumberFn::Ctor), 1, proto)?;
    define_method(cx, ctor, "isInteger", NativeFn::Number(NumberFn::IsInteger), 1)?;
    define_method(cx, ctor, "isFinite", NativeFn::Number(NumberFn::IsFinite), 1)?;
    define_method(cx, ctor, "isNaN", NativeFn::Number(NumberFn::IsNaN), 1)?;
    define_method(cx, ctor, "isSafeInteger", NativeFn::Number(NumberFn::IsSafeInteger), 1)?;
    define_method(cx, ctor, "parseInt", NativeFn::Global(global::GlobalFn::ParseInt), 2)?;
    define_method(cx, ctor, "parseFloat", NativeFn::Global(global::GlobalFn::ParseFloat), 1)?;

    let constants = [
        ("MAX_SAFE_INTEGER", 9_007_199_254_740_991.0),
        ("MIN_SAFE_INTEGER", -9_007_199_254_740_991.0),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", f64::MIN_POSITIVE),
        ("EPSILON", f64::EPSILON),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ];
    for (name, value) in constants {
        cx.define_locked(ctor, name, Value::number(value));
    }
    Ok(())
}

fn this_number<T: ResourceTracker>(cx: &mut Context<T>, this: &Value) -> RunResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(id) => match &cx.heap.object(*id).data {
            ObjectData::Primitive(Value::Number(n)) => Ok(*n),
            _ => Err(cx.type_error("Number method called on an incompatible receiver")),
        },
        _ => Err(cx.type_error("Number method called on an incompatible receiver")),
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: NumberFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        NumberFn::Ctor => {
            let value = match args.first() {
                // Number(bigint) is the sanctioned explicit conversion.
                Some(Value::BigInt(b)) => Value::number(bigint_to_f64(b)),
                Some(other) => Value::number(cx.to_number_value(other)?),
                None => Value::number(0.0),
            };
            if construct {
                Ok(Value::Object(cx.to_object_value(&value)?))
            } else {
                Ok(value)
            }
        }
        NumberFn::IsInteger => Ok(Value::bool(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0
        ))),
        NumberFn::IsFinite => Ok(Value::bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite()))),
        NumberFn::IsNaN => Ok(Value::bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan()))),
        NumberFn::IsSafeInteger => Ok(Value::bool(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0
        ))),
        NumberFn::ProtoToFixed => {
            let n = this_number(cx, this)?;
            let digits = cx.to_number_value(&arg(args, 0))?;
            if !(0.0..=100.0).contains(&digits) {
                return Err(cx.range_error("toFixed() digits argument must be between 0 and 100"));
            }
            let precision = digits as usize;
            Ok(Value::str(format!("{n:.precision$}")))
        }
        NumberFn::ProtoToString => {
            let n = this_number(cx, this)?;
            let radix = match arg(args, 0) {
                Value::Undefined => 10.0,
                other => cx.to_number_value(&other)?,
            };
            if !(2.0..=36.0).contains(&radix) {
                return Err(cx.range_error("toString() radix must be between 2 and 36"));
            }
            let radix = radix as u32;
            if radix == 10 {
                return Ok(Value::str(format_number(n)));
            }
            Ok(Value::str(to_radix_string(n, radix)))
        }
        NumberFn::ProtoValueOf => Ok(Value::number(this_number(cx, this)?)),
    }
}

/// Integer-focused radix rendering; fractional parts get a short
/// approximation, which matches what embedders actually use this for.
fn to_radix_string(n: f64, radix: u32) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let negative = n < 0.0;
    let mut int_part = n.abs().trunc();
    let mut digits = Vec::new();
    if int_part == 0.0 {
        digits.push(b'0');
    }
    while int_part >= 1.0 {
        let digit = (int_part % f64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0') as u8);
        int_part = (int_part / f64::from(radix)).trunc();
    }
    digits.reverse();
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&String::from_utf8_lossy(&digits));
    let mut frac = n.abs().fract();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac *= f64::from(radix);
            let digit = frac.trunc() as u32;
            out.push(char::from_digit(digit, radix).unwrap_or('0'));
            frac -= frac.trunc();
            if frac <= 0.0 {
                break;
            }
        }
    }
    out
}
