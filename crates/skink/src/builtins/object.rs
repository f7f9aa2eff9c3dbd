//! The `Object` constructor and prototype.

use std::rc::Rc;

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::{JsObject, ObjectData, PropValue, Property, PropertyKey, set_prototype},
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_ctor, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectFn {
    Ctor,
    Keys,
    Values,
    Entries,
    Assign,
    Freeze,
    IsFrozen,
    Seal,
    IsSealed,
    Create,
    GetPrototypeOf,
    SetPrototypeOf,
    DefineProperty,
    GetOwnPropertyNames,
    ProtoHasOwnProperty,
    ProtoIsPrototypeOf,
    ProtoPropertyIsEnumerable,
    ProtoToString,
    ProtoValueOf,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().object_proto;
    define_method(cx, proto, "hasOwnProperty", NativeFn::Object(ObjectFn::ProtoHasOwnProperty), 1)?;
    define_method(cx, proto, "isPrototypeOf", NativeFn::Object(ObjectFn::ProtoIsPrototypeOf), 1)?;
    define_method(
        cx,
        proto,
        "propertyIsEnumerable",
        NativeFn::Object(ObjectFn::ProtoPropertyIsEnumerable),
        1,
    )?;
    define_method(cx, proto, "toString", NativeFn::Object(ObjectFn::ProtoToString), 0)?;
    define_method(cx, proto, "valueOf", NativeFn::Object(ObjectFn::ProtoValueOf), 0)?;

    let ctor = define_ctor(cx, global, "Object", NativeFn::Object(ObjectFn::Ctor), 1, proto)?;
    define_method(cx, ctor, "keys", NativeFn::Object(ObjectFn::Keys), 1)?;
    define_method(cx, ctor, "values", NativeFn::Object(ObjectFn::Values), 1)?;
    define_method(cx, ctor, "entries", NativeFn::Object(ObjectFn::Entries), 1)?;
    define_method(cx, ctor, "assign", NativeFn::Object(ObjectFn::Assign), 2)?;
    define_method(cx, ctor, "freeze", NativeFn::Object(ObjectFn::Freeze), 1)?;
    define_method(cx, ctor, "isFrozen", NativeFn::Object(ObjectFn::IsFrozen), 1)?;
    define_method(cx, ctor, "seal", NativeFn::Object(ObjectFn::Seal), 1)?;
    define_method(cx, ctor, "isSealed", NativeFn::Object(ObjectFn::IsSealed), 1)?;
    define_method(cx, ctor, "create", NativeFn::Object(ObjectFn::Create), 2)?;
    define_method(cx, ctor, "getPrototypeOf", NativeFn::Object(ObjectFn::GetPrototypeOf), 1)?;
    define_method(cx, ctor, "setPrototypeOf", NativeFn::Object(ObjectFn::SetPrototypeOf), 2)?;
    define_method(cx, ctor, "defineProperty", NativeFn::Object(ObjectFn::DefineProperty), 3)?;
    define_method(
        cx,
        ctor,
        "getOwnPropertyNames",
        NativeFn::Object(ObjectFn::GetOwnPropertyNames),
        1,
    )?;
    Ok(())
}

/// Own enumerable string keys, in insertion order. Arrays contribute their
/// indices first.
fn own_keys<T: ResourceTracker>(cx: &Context<T>, id: HeapId) -> Vec<Rc<str>> {
    let obj = cx.heap.object(id);
    let mut keys: Vec<Rc<str>> = Vec::new();
    if let ObjectData::Array(elements) = &obj.data {
        for index in 0..elements.len() {
            keys.push(Rc::from(index.to_string()));
        }
    }
    for (name, prop) in &obj.properties {
        if prop.enumerable {
            keys.push(Rc::clone(name));
        }
    }
    keys
}

fn require_object<T: ResourceTracker>(cx: &mut Context<T>, value: &Value, who: &str) -> RunResult<HeapId> {
    match value {
        Value::Object(id) => Ok(*id),
        _ => Err(cx.type_error(format!("{who} called on non-object"))),
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: ObjectFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        ObjectFn::Ctor => {
            let _ = construct;
            let value = arg(args, 0);
            if value.is_nullish() {
                Ok(Value::Object(cx.new_object()?))
            } else {
                Ok(Value::Object(cx.to_object_value(&value)?))
            }
        }
        ObjectFn::Keys => {
            let id = require_object(cx, &arg(args, 0), "Object.keys")?;
            let keys = own_keys(cx, id).into_iter().map(Value::str).collect();
            cx.new_array(keys)
        }
        ObjectFn::Values => {
            let target = arg(args, 0);
            let id = require_object(cx, &target, "Object.values")?;
            let keys = own_keys(cx, id);
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                values.push(cx.get_member(&target, &PropertyKey::Str(key))?);
            }
            cx.new_array(values)
        }
        ObjectFn::Entries => {
            let target = arg(args, 0);
            let id = require_object(cx, &target, "Object.entries")?;
            let keys = own_keys(cx, id);
            let mut entries = Vec::with_capacity(keys.len());
            for key in keys {
                let value = cx.get_member(&target, &PropertyKey::Str(Rc::clone(&key)))?;
                entries.push(cx.new_array(vec![Value::str(key), value])?);
            }
            cx.new_array(entries)
        }
        ObjectFn::Assign => {
            let target = arg(args, 0);
            require_object(cx, &target, "Object.assign")?;
            for source in args.iter().skip(1) {
                if source.is_nullish() {
                    continue;
                }
                let Some(source_id) = source.as_object() else { continue };
                let keys = own_keys(cx, source_id);
                for key in keys {
                    let value = cx.get_member(source, &PropertyKey::Str(Rc::clone(&key)))?;
                    cx.put_member(&target, &PropertyKey::Str(key), value)?;
                }
            }
            Ok(target)
        }
        ObjectFn::Freeze => {
            if let Value::Object(id) = arg(args, 0) {
                cx.heap.object_mut(id).seal_or_freeze(true);
            }
            Ok(arg(args, 0))
        }
        ObjectFn::Seal => {
            if let Value::Object(id) = arg(args, 0) {
                cx.heap.object_mut(id).seal_or_freeze(false);
            }
            Ok(arg(args, 0))
        }
        ObjectFn::IsFrozen => Ok(Value::bool(match arg(args, 0) {
            Value::Object(id) => cx.heap.object(id).is_frozen(),
            _ => true,
        })),
        ObjectFn::IsSealed => Ok(Value::bool(match arg(args, 0) {
            Value::Object(id) => cx.heap.object(id).is_sealed(),
            _ => true,
        })),
        ObjectFn::Create => {
            let proto = match arg(args, 0) {
                Value::Null => None,
                Value::Object(id) => Some(id),
                _ => return Err(cx.type_error("Object prototype may only be an Object or null")),
            };
            let id = cx.heap.alloc_object(JsObject::ordinary(proto))?;
            Ok(Value::Object(id))
        }
        ObjectFn::GetPrototypeOf => {
            let id = cx.to_object_value(&arg(args, 0))?;
            Ok(match cx.heap.object(id).proto {
                Some(proto) => Value::Object(proto),
                None => Value::Null,
            })
        }
        ObjectFn::SetPrototypeOf => {
            let target = arg(args, 0);
            let id = require_object(cx, &target, "Object.setPrototypeOf")?;
            let proto = match arg(args, 1) {
                Value::Null => None,
                Value::Object(proto) => Some(proto),
                _ => return Err(cx.type_error("Object prototype may only be an Object or null")),
            };
            set_prototype(&mut cx.heap, id, proto).map_err(|e| cx.locate(e))?;
            Ok(target)
        }
        ObjectFn::DefineProperty => {
            let target = arg(args, 0);
            let id = require_object(cx, &target, "Object.defineProperty")?;
            let key_value = arg(args, 1);
            let key = cx.to_property_key(&key_value)?;
            let descriptor = arg(args, 2);
            let prop = parse_descriptor(cx, &descriptor)?;
            if let Some(existing) = cx.heap.object(id).own_property(&key) {
                if !existing.configurable {
                    return Err(cx.type_error(format!("Cannot redefine property: {key}")));
                }
            }
            cx.heap.object_mut(id).insert_property(key, prop);
            Ok(target)
        }
        ObjectFn::GetOwnPropertyNames => {
            let id = require_object(cx, &arg(args, 0), "Object.getOwnPropertyNames")?;
            let obj = cx.heap.object(id);
            let mut keys: Vec<Value> = Vec::new();
            if let ObjectData::Array(elements) = &obj.data {
                for index in 0..elements.len() {
                    keys.push(Value::str(index.to_string()));
                }
                keys.push(Value::str("length"));
            }
            let names: Vec<Rc<str>> = obj.properties.keys().map(Rc::clone).collect();
            keys.extend(names.into_iter().map(Value::str));
            cx.new_array(keys)
        }
        ObjectFn::ProtoHasOwnProperty => {
            let key_value = arg(args, 0);
            let key = cx.to_property_key(&key_value)?;
            Ok(Value::bool(match this {
                Value::Object(id) => {
                    let obj = cx.heap.object(*id);
                    if let (ObjectData::Array(elements), Some(index)) = (&obj.data, key.array_index()) {
                        (index as usize) < elements.len()
                    } else {
                        obj.own_property(&key).is_some()
                    }
                }
                _ => false,
            }))
        }
        ObjectFn::ProtoIsPrototypeOf => {
            let Value::Object(candidate) = arg(args, 0) else {
                return Ok(Value::bool(false));
            };
            let Value::Object(target) = this else {
                return Ok(Value::bool(false));
            };
            let mut walk = cx.heap.object(candidate).proto;
            while let Some(current) = walk {
                if current == *target {
                    return Ok(Value::bool(true));
                }
                walk = cx.heap.object(current).proto;
            }
            Ok(Value::bool(false))
        }
        ObjectFn::ProtoPropertyIsEnumerable => {
            let key_value = arg(args, 0);
            let key = cx.to_property_key(&key_value)?;
            Ok(Value::bool(match this {
                Value::Object(id) => cx
                    .heap
                    .object(*id)
                    .own_property(&key)
                    .is_some_and(|p| p.enumerable),
                _ => false,
            }))
        }
        ObjectFn::ProtoToString => {
            let tag: String = match this {
                Value::Undefined => "Undefined".to_owned(),
                Value::Null => "Null".to_owned(),
                Value::Object(id) => cx.heap.object(*id).class_name.to_string(),
                Value::Str(_) => "String".to_owned(),
                Value::Number(_) => "Number".to_owned(),
                Value::Bool(_) => "Boolean".to_owned(),
                Value::BigInt(_) => "BigInt".to_owned(),
                Value::Symbol(_) => "Symbol".to_owned(),
            };
            Ok(Value::str(format!("[object {tag}]")))
        }
        ObjectFn::ProtoValueOf => match this {
            Value::Object(id) => match &cx.heap.object(*id).data {
                ObjectData::Primitive(inner) => Ok(inner.clone()),
                _ => Ok(this.clone()),
            },
            other => Ok(other.clone()),
        },
    }
}

/// Reads `{value, writable, enumerable, configurable, get, set}` from a
/// descriptor object.
fn parse_descriptor<T: ResourceTracker>(cx: &mut Context<T>, descriptor: &Value) -> RunResult<Property> {
    let Value::Object(_) = descriptor else {
        return Err(cx.type_error("Property description must be an object"));
    };
    let get = cx.get_member(descriptor, &PropertyKey::str("get"))?;
    let set = cx.get_member(descriptor, &PropertyKey::str("set"))?;
    let enumerable = cx.get_member(descriptor, &PropertyKey::str("enumerable"))?.to_boolean();
    let configurable = cx
        .get_member(descriptor, &PropertyKey::str("configurable"))?
        .to_boolean();
    if !get.is_nullish() || !set.is_nullish() {
        let get = get.as_object();
        let set = set.as_object();
        return Ok(Property {
            value: PropValue::Accessor { get, set },
            enumerable,
            configurable,
        });
    }
    let value = cx.get_member(descriptor, &PropertyKey::str("value"))?;
    let writable = cx.get_member(descriptor, &PropertyKey::str("writable"))?.to_boolean();
    Ok(Property {
        value: PropValue::Data { value, writable },
        enumerable,
        configurable,
    })
}
