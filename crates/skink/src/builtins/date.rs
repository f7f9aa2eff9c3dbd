//! A minimal `Date`: construction, epoch access, ISO rendering.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::{JsObject, ObjectData},
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_ctor, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DateFn {
    Ctor,
    Now,
    ProtoGetTime,
    ProtoValueOf,
    ProtoToISOString,
    ProtoToString,
    ProtoGetFullYear,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().date_proto;
    define_method(cx, proto, "getTime", NativeFn::Date(DateFn::ProtoGetTime), 0)?;
    define_method(cx, proto, "valueOf", NativeFn::Date(DateFn::ProtoValueOf), 0)?;
    define_method(cx, proto, "toISOString", NativeFn::Date(DateFn::ProtoToISOString), 0)?;
    define_method(cx, proto, "toString", NativeFn::Date(DateFn::ProtoToString), 0)?;
    define_method(cx, proto, "getFullYear", NativeFn::Date(DateFn::ProtoGetFullYear), 0)?;

    let ctor = define_ctor(cx, global, "Date", NativeFn::Date(DateFn::Ctor), 0, proto)?;
    define_method(cx, ctor, "now", NativeFn::Date(DateFn::Now), 0)?;
    Ok(())
}

fn now_millis() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0.0, |d| d.as_millis() as f64)
}

fn this_millis<T: ResourceTracker>(cx: &mut Context<T>, this: &Value) -> RunResult<f64> {
    match this {
        Value::Object(id) => match &cx.heap.object(*id).data {
            ObjectData::Date(ms) => Ok(*ms),
            _ => Err(cx.type_error("Date method called on an incompatible receiver")),
        },
        _ => Err(cx.type_error("Date method called on an incompatible receiver")),
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: DateFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        DateFn::Ctor => {
            if !construct {
                return Ok(Value::str(to_iso_string(now_millis())));
            }
            let millis = match args.first() {
                None => now_millis(),
                Some(value) => cx.to_number_value(value)?,
            };
            let proto = cx.realm_ref().date_proto;
            let obj = JsObject::with_data(Some(proto), "Date", ObjectData::Date(millis));
            Ok(Value::Object(cx.heap.alloc_object(obj)?))
        }
        DateFn::Now => Ok(Value::number(now_millis())),
        DateFn::ProtoGetTime | DateFn::ProtoValueOf => Ok(Value::number(this_millis(cx, this)?)),
        DateFn::ProtoToISOString | DateFn::ProtoToString => {
            let millis = this_millis(cx, this)?;
            if !millis.is_finite() {
                return Err(cx.range_error("Invalid time value"));
            }
            Ok(Value::str(to_iso_string(millis)))
        }
        DateFn::ProtoGetFullYear => {
            let millis = this_millis(cx, this)?;
            let (year, ..) = civil_from_millis(millis);
            Ok(Value::number(year as f64))
        }
    }
}

/// Milliseconds since the epoch to `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub(crate) fn to_iso_string(millis: f64) -> String {
    let (year, month, day) = civil_from_millis(millis);
    let total_ms = millis.rem_euclid(86_400_000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}.{ms:03}Z")
}

/// Civil date from epoch milliseconds, via the days-from-civil inverse.
fn civil_from_millis(millis: f64) -> (i64, u32, u32) {
    let days = (millis / 86_400_000.0).floor() as i64;
    let mut z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    z -= era * 146_097;
    let doe = z;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { year + 1 } else { year };
    (year, month, day)
}
