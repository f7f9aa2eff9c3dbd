//! The `String` constructor and prototype.
//!
//! Indexed operations address UTF-16 code units throughout; search results
//! are converted from byte offsets before they become script-visible.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::{IterState, ObjectData},
    resource::ResourceTracker,
    value::{JsString, SYM_ITERATOR, Value},
};

use super::{NativeFn, arg, define_ctor, define_method, define_symbol_method, iter::new_iterator, regexp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringFn {
    Ctor,
    FromCharCode,
    CharAt,
    CharCodeAt,
    CodePointAt,
    IndexOf,
    LastIndexOf,
    Includes,
    StartsWith,
    EndsWith,
    Slice,
    Substring,
    ToUpperCase,
    ToLowerCase,
    Trim,
    TrimStart,
    TrimEnd,
    Split,
    Repeat,
    PadStart,
    PadEnd,
    Replace,
    ReplaceAll,
    Concat,
    At,
    Match,
    ToString,
    ValueOf,
    Iterator,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().string_proto;
    define_method(cx, proto, "charAt", NativeFn::Str(StringFn::CharAt), 1)?;
    define_method(cx, proto, "charCodeAt", NativeFn::Str(StringFn::CharCodeAt), 1)?;
    define_method(cx, proto, "codePointAt", NativeFn::Str(StringFn::CodePointAt), 1)?;
    define_method(cx, proto, "indexOf", NativeFn::Str(StringFn::IndexOf), 1)?;
    define_method(cx, proto, "lastIndexOf", NativeFn::Str(StringFn::LastIndexOf), 1)?;
    define_method(cx, proto, "includes", NativeFn::Str(StringFn::Includes), 1)?;
    define_method(cx, proto, "startsWith", NativeFn::Str(StringFn::StartsWith), 1)?;
    define_method(cx, proto, "endsWith", NativeFn::Str(StringFn::EndsWith), 1)?;
    define_method(cx, proto, "slice", NativeFn::Str(StringFn::Slice), 2)?;
    define_method(cx, proto, "substring", NativeFn::Str(StringFn::Substring), 2)?;
    define_method(cx, proto, "toUpperCase", NativeFn::Str(StringFn::ToUpperCase), 0)?;
    define_method(cx, proto, "toLowerCase", NativeFn::Str(StringFn::ToLowerCase), 0)?;
    define_method(cx, proto, "trim", NativeFn::Str(StringFn::Trim), 0)?;
    define_method(cx, proto, "trimStart", NativeFn::Str(StringFn::TrimStart), 0)?;
    define_method(cx, proto, "trimEnd", NativeFn::Str(StringFn::TrimEnd), 0)?;
    define_method(cx, proto, "split", NativeFn::Str(StringFn::Split), 2)?;
    define_method(cx, proto, "repeat", NativeFn::Str(StringFn::Repeat), 1)?;
    define_method(cx, proto, "padStart", NativeFn::Str(StringFn::PadStart), 2)?;
    define_method(cx, proto, "padEnd", NativeFn::Str(StringFn::PadEnd), 2)?;
    define_method(cx, proto, "replace", NativeFn::Str(StringFn::Replace), 2)?;
    define_method(cx, proto, "replaceAll", NativeFn::Str(StringFn::ReplaceAll), 2)?;
    define_method(cx, proto, "concat", NativeFn::Str(StringFn::Concat), 1)?;
    define_method(cx, proto, "at", NativeFn::Str(StringFn::At), 1)?;
    define_method(cx, proto, "match", NativeFn::Str(StringFn::Match), 1)?;
    define_method(cx, proto, "toString", NativeFn::Str(StringFn::ToString), 0)?;
    define_method(cx, proto, "valueOf", NativeFn::Str(StringFn::ValueOf), 0)?;
    define_symbol_method(cx, proto, SYM_ITERATOR, "[Symbol.iterator]", NativeFn::Str(StringFn::Iterator))?;

    let ctor = define_ctor(cx, global, "String", NativeFn::Str(StringFn::Ctor), 1, proto)?;
    define_method(cx, ctor, "fromCharCode", NativeFn::Str(StringFn::FromCharCode), 1)?;
    Ok(())
}

/// The receiver as a string, unwrapping `new String(...)` objects.
fn this_string<T: ResourceTracker>(cx: &mut Context<T>, this: &Value) -> RunResult<JsString> {
    match this {
        Value::Str(s) => Ok(s.clone()),
        Value::Object(id) => match &cx.heap.object(*id).data {
            ObjectData::Primitive(Value::Str(s)) => Ok(s.clone()),
            _ => cx.to_js_string(this),
        },
        _ => cx.to_js_string(this),
    }
}

fn norm_index(len: usize, relative: f64) -> usize {
    if relative.is_nan() {
        return 0;
    }
    if relative < 0.0 {
        len.saturating_sub((-relative) as usize)
    } else {
        (relative as usize).min(len)
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: StringFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        StringFn::Ctor => {
            let value = match args.first() {
                Some(v) => {
                    if let Value::Symbol(id) = v {
                        // String(sym) is the one place symbols stringify.
                        let rendered = match cx.symbols.description(*id) {
                            Some(desc) => format!("Symbol({desc})"),
                            None => "Symbol()".to_owned(),
                        };
                        Value::str(rendered)
                    } else {
                        Value::Str(cx.to_js_string(v)?)
                    }
                }
                None => Value::str(""),
            };
            if construct {
                Ok(Value::Object(cx.to_object_value(&value)?))
            } else {
                Ok(value)
            }
        }
        StringFn::FromCharCode => {
            let mut units = Vec::with_capacity(args.len());
            for value in args {
                units.push(cx.to_number_value(value)? as u16);
            }
            Ok(Value::str(String::from_utf16_lossy(&units)))
        }
        StringFn::CharAt => {
            let s = this_string(cx, this)?;
            let index = cx.to_number_value(&arg(args, 0))?;
            if index < 0.0 || index >= s.utf16_len() as f64 {
                return Ok(Value::str(""));
            }
            let index = index as usize;
            Ok(Value::Str(s.utf16_slice(index, index + 1)))
        }
        StringFn::CharCodeAt => {
            let s = this_string(cx, this)?;
            let index = cx.to_number_value(&arg(args, 0))?;
            if index < 0.0 {
                return Ok(Value::number(f64::NAN));
            }
            Ok(match s.code_unit_at(index as usize) {
                Some(unit) => Value::number(f64::from(unit)),
                None => Value::number(f64::NAN),
            })
        }
        StringFn::CodePointAt => {
            let s = this_string(cx, this)?;
            let index = cx.to_number_value(&arg(args, 0))?.max(0.0) as usize;
            let Some(unit) = s.code_unit_at(index) else {
                return Ok(Value::Undefined);
            };
            if (0xD800..0xDC00).contains(&unit) {
                if let Some(low) = s.code_unit_at(index + 1) {
                    if (0xDC00..0xE000).contains(&low) {
                        let cp = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                        return Ok(Value::number(f64::from(cp)));
                    }
                }
            }
            Ok(Value::number(f64::from(unit)))
        }
        StringFn::IndexOf => {
            let s = this_string(cx, this)?;
            let needle = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::number(match s.as_str().find(needle.as_str()) {
                Some(byte_index) => s.byte_to_utf16_index(byte_index) as f64,
                None => -1.0,
            }))
        }
        StringFn::LastIndexOf => {
            let s = this_string(cx, this)?;
            let needle = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::number(match s.as_str().rfind(needle.as_str()) {
                Some(byte_index) => s.byte_to_utf16_index(byte_index) as f64,
                None => -1.0,
            }))
        }
        StringFn::Includes => {
            let s = this_string(cx, this)?;
            let needle = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::bool(s.as_str().contains(needle.as_str())))
        }
        StringFn::StartsWith => {
            let s = this_string(cx, this)?;
            let needle = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::bool(s.as_str().starts_with(needle.as_str())))
        }
        StringFn::EndsWith => {
            let s = this_string(cx, this)?;
            let needle = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::bool(s.as_str().ends_with(needle.as_str())))
        }
        StringFn::Slice => {
            let s = this_string(cx, this)?;
            let len = s.utf16_len();
            let start = norm_index(len, cx.to_number_value(&arg(args, 0))?);
            let end = match arg(args, 1) {
                Value::Undefined => len,
                other => norm_index(len, cx.to_number_value(&other)?),
            };
            Ok(Value::Str(s.utf16_slice(start, end.max(start))))
        }
        StringFn::Substring => {
            let s = this_string(cx, this)?;
            let len = s.utf16_len();
            let a = (cx.to_number_value(&arg(args, 0))?.max(0.0) as usize).min(len);
            let b = match arg(args, 1) {
                Value::Undefined => len,
                other => (cx.to_number_value(&other)?.max(0.0) as usize).min(len),
            };
            // substring swaps out-of-order bounds instead of clamping.
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::Str(s.utf16_slice(start, end)))
        }
        StringFn::ToUpperCase => {
            let s = this_string(cx, this)?;
            Ok(Value::str(s.as_str().to_uppercase()))
        }
        StringFn::ToLowerCase => {
            let s = this_string(cx, this)?;
            Ok(Value::str(s.as_str().to_lowercase()))
        }
        StringFn::Trim => {
            let s = this_string(cx, this)?;
            Ok(Value::str(s.as_str().trim()))
        }
        StringFn::TrimStart => {
            let s = this_string(cx, this)?;
            Ok(Value::str(s.as_str().trim_start()))
        }
        StringFn::TrimEnd => {
            let s = this_string(cx, this)?;
            Ok(Value::str(s.as_str().trim_end()))
        }
        StringFn::Split => {
            let s = this_string(cx, this)?;
            let separator = arg(args, 0);
            if separator.is_nullish() {
                return cx.new_array(vec![Value::Str(s)]);
            }
            if let Value::Object(id) = &separator {
                if matches!(cx.heap.object(*id).data, ObjectData::RegExp(_)) {
                    return regexp::split_with_regexp(cx, &s, *id);
                }
            }
            let separator = cx.to_js_string(&separator)?;
            let parts: Vec<Value> = if separator.as_str().is_empty() {
                // Splitting on the empty string yields code units.
                (0..s.utf16_len())
                    .map(|i| Value::Str(s.utf16_slice(i, i + 1)))
                    .collect()
            } else {
                s.as_str().split(separator.as_str()).map(Value::str).collect()
            };
            cx.new_array(parts)
        }
        StringFn::Repeat => {
            let s = this_string(cx, this)?;
            let count = cx.to_number_value(&arg(args, 0))?;
            if count < 0.0 || !count.is_finite() {
                return Err(cx.range_error("Invalid count value"));
            }
            Ok(Value::str(s.as_str().repeat(count as usize)))
        }
        StringFn::PadStart | StringFn::PadEnd => {
            let s = this_string(cx, this)?;
            let target_len = cx.to_number_value(&arg(args, 0))?.max(0.0) as usize;
            let filler = match arg(args, 1) {
                Value::Undefined => " ".to_owned(),
                other => cx.to_js_string(&other)?.as_str().to_owned(),
            };
            let current = s.utf16_len();
            if target_len <= current || filler.is_empty() {
                return Ok(Value::Str(s));
            }
            let missing = target_len - current;
            let mut pad = String::new();
            while pad.encode_utf16().count() < missing {
                pad.push_str(&filler);
            }
            let pad = JsString::from(pad).utf16_slice(0, missing);
            Ok(Value::str(if f == StringFn::PadStart {
                format!("{}{}", pad.as_str(), s.as_str())
            } else {
                format!("{}{}", s.as_str(), pad.as_str())
            }))
        }
        StringFn::Replace | StringFn::ReplaceAll => {
            let s = this_string(cx, this)?;
            let pattern = arg(args, 0);
            let replacement = arg(args, 1);
            let all = f == StringFn::ReplaceAll;
            if let Value::Object(id) = &pattern {
                if matches!(cx.heap.object(*id).data, ObjectData::RegExp(_)) {
                    return regexp::replace_with_regexp(cx, &s, *id, &replacement, all);
                }
            }
            let pattern = cx.to_js_string(&pattern)?;
            let replacement = cx.to_js_string(&replacement)?;
            Ok(Value::str(if all {
                s.as_str().replace(pattern.as_str(), replacement.as_str())
            } else {
                s.as_str().replacen(pattern.as_str(), replacement.as_str(), 1)
            }))
        }
        StringFn::Concat => {
            let s = this_string(cx, this)?;
            let mut out = s.as_str().to_owned();
            for value in args {
                let rendered = cx.to_js_string(value)?;
                out.push_str(rendered.as_str());
            }
            Ok(Value::str(out))
        }
        StringFn::At => {
            let s = this_string(cx, this)?;
            let len = s.utf16_len() as f64;
            let mut index = cx.to_number_value(&arg(args, 0))?;
            if index < 0.0 {
                index += len;
            }
            if index < 0.0 || index >= len {
                return Ok(Value::Undefined);
            }
            let index = index as usize;
            Ok(Value::Str(s.utf16_slice(index, index + 1)))
        }
        StringFn::Match => {
            let s = this_string(cx, this)?;
            let pattern = arg(args, 0);
            let regexp_id = match &pattern {
                Value::Object(id) if matches!(cx.heap.object(*id).data, ObjectData::RegExp(_)) => *id,
                other => {
                    let source = cx.to_js_string(other)?;
                    let value = regexp::create_regexp(cx, source.as_str(), "")?;
                    match value {
                        Value::Object(id) => id,
                        _ => unreachable!("create_regexp returns an object"),
                    }
                }
            };
            regexp::match_with_regexp(cx, &s, regexp_id)
        }
        StringFn::ToString | StringFn::ValueOf => Ok(Value::Str(this_string(cx, this)?)),
        StringFn::Iterator => {
            let s = this_string(cx, this)?;
            new_iterator(cx, IterState::Str { string: s, index: 0 })
        }
    }
}
