//! The `JSON` namespace, bridged through serde_json.
//!
//! Parsing preserves object key order (serde_json's preserve_order
//! feature), matching the engine's own insertion-ordered property maps.

use serde_json::Value as Json;

use crate::{
    context::Context,
    error::{ErrorKind, RunResult},
    heap::HeapId,
    object::{JsObject, ObjectData, PropValue, PropertyKey},
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonFn {
    Parse,
    Stringify,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let object_proto = cx.realm_ref().object_proto;
    let json = cx.heap.alloc_object(JsObject::with_data(
        Some(object_proto),
        "JSON",
        crate::object::ObjectData::Ordinary,
    ))?;
    define_method(cx, json, "parse", NativeFn::Json(JsonFn::Parse), 2)?;
    define_method(cx, json, "stringify", NativeFn::Json(JsonFn::Stringify), 3)?;
    cx.heap.object_mut(global).define_method("JSON", Value::Object(json));
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: JsonFn,
    _this: &Value,
    args: &[Value],
) -> RunResult<Value> {
    match f {
        JsonFn::Parse => {
            let text = cx.to_js_string(&arg(args, 0))?;
            let parsed: Json = serde_json::from_str(text.as_str())
                .map_err(|e| cx.raise(ErrorKind::Syntax, format!("JSON.parse: {e}")))?;
            json_to_value(cx, &parsed)
        }
        JsonFn::Stringify => {
            let value = arg(args, 0);
            let space = match arg(args, 2) {
                Value::Number(n) if n >= 1.0 => Some(" ".repeat((n as usize).min(10))),
                Value::Str(s) => Some(s.as_str().chars().take(10).collect()),
                _ => None,
            };
            let Some(json) = value_to_json(cx, &value, 0)? else {
                return Ok(Value::Undefined);
            };
            let rendered = match &space {
                Some(indent) => {
                    let mut buf = Vec::new();
                    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
                    serde::Serialize::serialize(&json, &mut serializer)
                        .map_err(|e| cx.raise(ErrorKind::Type, format!("JSON.stringify: {e}")))?;
                    String::from_utf8_lossy(&buf).into_owned()
                }
                None => serde_json::to_string(&json)
                    .map_err(|e| cx.raise(ErrorKind::Type, format!("JSON.stringify: {e}")))?,
            };
            Ok(Value::str(rendered))
        }
    }
}

fn json_to_value<T: ResourceTracker>(cx: &mut Context<T>, json: &Json) -> RunResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::bool(*b),
        Json::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::str(s.as_str()),
        Json::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(json_to_value(cx, item)?);
            }
            cx.new_array(elements)?
        }
        Json::Object(map) => {
            let id = cx.new_object()?;
            for (key, item) in map {
                let value = json_to_value(cx, item)?;
                cx.heap.object_mut(id).define_data(key, value);
            }
            Value::Object(id)
        }
    })
}

const MAX_STRINGIFY_DEPTH: u32 = 128;

/// Converts a script value to JSON. `None` means the value is skipped
/// (functions, undefined, symbols), mirroring the language's rules.
fn value_to_json<T: ResourceTracker>(cx: &mut Context<T>, value: &Value, depth: u32) -> RunResult<Option<Json>> {
    if depth > MAX_STRINGIFY_DEPTH {
        return Err(cx.type_error("Converting circular structure to JSON"));
    }
    Ok(match value {
        Value::Undefined | Value::Symbol(_) => None,
        Value::Null => Some(Json::Null),
        Value::Bool(b) => Some(Json::Bool(*b)),
        Value::Number(n) => {
            if n.is_finite() {
                Some(serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number))
            } else {
                Some(Json::Null)
            }
        }
        Value::Str(s) => Some(Json::String(s.as_str().to_owned())),
        Value::BigInt(_) => {
            return Err(cx.type_error("Do not know how to serialize a BigInt"));
        }
        Value::Object(id) => {
            let id = *id;
            // toJSON hook first (Date relies on it conceptually; here only
            // script-defined hooks are honored).
            let to_json = cx.get_member(value, &PropertyKey::str("toJSON"))?;
            if let Value::Object(f) = &to_json {
                if cx.heap.object(*f).is_callable() {
                    let replaced = cx.call_value(&to_json, value.clone(), Vec::new())?;
                    return value_to_json(cx, &replaced, depth + 1);
                }
            }
            match &cx.heap.object(id).data {
                ObjectData::Array(elements) => {
                    let elements = elements.clone();
                    let mut out = Vec::with_capacity(elements.len());
                    for element in &elements {
                        out.push(value_to_json(cx, element, depth + 1)?.unwrap_or(Json::Null));
                    }
                    Some(Json::Array(out))
                }
                ObjectData::Function(_) => None,
                ObjectData::Primitive(inner) => {
                    let inner = inner.clone();
                    return value_to_json(cx, &inner, depth + 1);
                }
                ObjectData::Date(ms) => Some(Json::String(super::date::to_iso_string(*ms))),
                _ => {
                    let keys: Vec<(std::rc::Rc<str>, bool)> = cx
                        .heap
                        .object(id)
                        .properties
                        .iter()
                        .map(|(name, prop)| (std::rc::Rc::clone(name), prop.enumerable && matches!(prop.value, PropValue::Data { .. } | PropValue::Accessor { .. })))
                        .collect();
                    let mut map = serde_json::Map::new();
                    for (name, enumerable) in keys {
                        if !enumerable {
                            continue;
                        }
                        let member = cx.get_member(value, &PropertyKey::Str(std::rc::Rc::clone(&name)))?;
                        if let Some(json) = value_to_json(cx, &member, depth + 1)? {
                            map.insert(name.to_string(), json);
                        }
                    }
                    Some(Json::Object(map))
                }
            }
        }
    })
}
