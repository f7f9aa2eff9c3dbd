//! Script `Map` and `Set` over the insertion-ordered linked hash table.
//!
//! Both share [`LinkedMap`]; sets store their element as both key and
//! value. Iterators are deletion-tolerant by construction, which is the
//! load-bearing behavioral contract of these collections.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    linked_map::{LinkedMap, MapCursor},
    object::{IterMode, IterState, JsObject, ObjectData},
    resource::ResourceTracker,
    value::{SYM_ITERATOR, Value},
};

use super::{NativeFn, arg, define_ctor, define_method, define_symbol_method, iter::new_iterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapSetFn {
    MapCtor,
    SetCtor,
    MapGet,
    MapSet,
    MapHas,
    MapDelete,
    MapClear,
    MapForEach,
    MapKeys,
    MapValues,
    MapEntries,
    SetAdd,
    SetHas,
    SetDelete,
    SetClear,
    SetForEach,
    SetValues,
    SetEntries,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let map_proto = cx.realm_ref().map_proto;
    define_method(cx, map_proto, "get", NativeFn::MapSet(MapSetFn::MapGet), 1)?;
    define_method(cx, map_proto, "set", NativeFn::MapSet(MapSetFn::MapSet), 2)?;
    define_method(cx, map_proto, "has", NativeFn::MapSet(MapSetFn::MapHas), 1)?;
    define_method(cx, map_proto, "delete", NativeFn::MapSet(MapSetFn::MapDelete), 1)?;
    define_method(cx, map_proto, "clear", NativeFn::MapSet(MapSetFn::MapClear), 0)?;
    define_method(cx, map_proto, "forEach", NativeFn::MapSet(MapSetFn::MapForEach), 1)?;
    define_method(cx, map_proto, "keys", NativeFn::MapSet(MapSetFn::MapKeys), 0)?;
    define_method(cx, map_proto, "values", NativeFn::MapSet(MapSetFn::MapValues), 0)?;
    define_method(cx, map_proto, "entries", NativeFn::MapSet(MapSetFn::MapEntries), 0)?;
    define_symbol_method(cx, map_proto, SYM_ITERATOR, "entries", NativeFn::MapSet(MapSetFn::MapEntries))?;
    define_ctor(cx, global, "Map", NativeFn::MapSet(MapSetFn::MapCtor), 0, map_proto)?;

    let set_proto = cx.realm_ref().set_proto;
    define_method(cx, set_proto, "add", NativeFn::MapSet(MapSetFn::SetAdd), 1)?;
    define_method(cx, set_proto, "has", NativeFn::MapSet(MapSetFn::SetHas), 1)?;
    define_method(cx, set_proto, "delete", NativeFn::MapSet(MapSetFn::SetDelete), 1)?;
    define_method(cx, set_proto, "clear", NativeFn::MapSet(MapSetFn::SetClear), 0)?;
    define_method(cx, set_proto, "forEach", NativeFn::MapSet(MapSetFn::SetForEach), 1)?;
    define_method(cx, set_proto, "values", NativeFn::MapSet(MapSetFn::SetValues), 0)?;
    define_method(cx, set_proto, "keys", NativeFn::MapSet(MapSetFn::SetValues), 0)?;
    define_method(cx, set_proto, "entries", NativeFn::MapSet(MapSetFn::SetEntries), 0)?;
    define_symbol_method(cx, set_proto, SYM_ITERATOR, "values", NativeFn::MapSet(MapSetFn::SetValues))?;
    define_ctor(cx, global, "Set", NativeFn::MapSet(MapSetFn::SetCtor), 0, set_proto)?;
    Ok(())
}

fn this_map_id<T: ResourceTracker>(cx: &mut Context<T>, this: &Value, want_set: bool) -> RunResult<HeapId> {
    if let Value::Object(id) = this {
        let matches = match &cx.heap.object(*id).data {
            ObjectData::Map(_) => !want_set,
            ObjectData::Set(_) => want_set,
            _ => false,
        };
        if matches {
            return Ok(*id);
        }
    }
    let what = if want_set { "Set" } else { "Map" };
    Err(cx.type_error(format!("Method called on an incompatible receiver; expected a {what}")))
}

fn with_map<T: ResourceTracker, R>(cx: &mut Context<T>, id: HeapId, f: impl FnOnce(&mut LinkedMap) -> R) -> R {
    match &mut cx.heap.object_mut(id).data {
        ObjectData::Map(map) | ObjectData::Set(map) => f(map),
        _ => unreachable!("receiver checked by this_map_id"),
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: MapSetFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        MapSetFn::MapCtor | MapSetFn::SetCtor => {
            let want_set = f == MapSetFn::SetCtor;
            if !construct {
                let name = if want_set { "Set" } else { "Map" };
                return Err(cx.type_error(format!("Constructor {name} requires new")));
            }
            let (proto, class_name) = if want_set {
                (cx.realm_ref().set_proto, "Set")
            } else {
                (cx.realm_ref().map_proto, "Map")
            };
            let data = if want_set {
                ObjectData::Set(LinkedMap::new())
            } else {
                ObjectData::Map(LinkedMap::new())
            };
            let id = cx
                .heap
                .alloc_object(JsObject::with_data(Some(proto), class_name, data))?;

            // Optional iterable initializer: entries for Map, values for Set.
            let init = arg(args, 0);
            if !init.is_nullish() {
                let iterator = cx.get_iterator(&init)?;
                while let Some(item) = cx.iterator_next(&iterator)? {
                    if want_set {
                        with_map(cx, id, |map| map.set(item.clone(), item));
                    } else {
                        let key = cx.get_member(&item, &crate::object::PropertyKey::str("0"))?;
                        let value = cx.get_member(&item, &crate::object::PropertyKey::str("1"))?;
                        with_map(cx, id, |map| map.set(key, value));
                    }
                }
            }
            Ok(Value::Object(id))
        }
        MapSetFn::MapGet => {
            let id = this_map_id(cx, this, false)?;
            Ok(with_map(cx, id, |map| map.get(&arg(args, 0)).cloned()).unwrap_or(Value::Undefined))
        }
        MapSetFn::MapSet => {
            let id = this_map_id(cx, this, false)?;
            let key = arg(args, 0);
            let value = arg(args, 1);
            with_map(cx, id, |map| map.set(key, value));
            Ok(this.clone())
        }
        MapSetFn::MapHas => {
            let id = this_map_id(cx, this, false)?;
            Ok(Value::bool(with_map(cx, id, |map| map.has(&arg(args, 0)))))
        }
        MapSetFn::MapDelete => {
            let id = this_map_id(cx, this, false)?;
            Ok(Value::bool(with_map(cx, id, |map| map.delete(&arg(args, 0)))))
        }
        MapSetFn::MapClear => {
            let id = this_map_id(cx, this, false)?;
            with_map(cx, id, LinkedMap::clear);
            Ok(Value::Undefined)
        }
        MapSetFn::MapForEach => {
            let id = this_map_id(cx, this, false)?;
            let callback = arg(args, 0);
            let this_arg = arg(args, 1);
            // Walk through a tolerant cursor so the callback may mutate.
            let mut cursor = MapCursor::Start;
            loop {
                let entry = with_map(cx, id, |map| map.advance(&mut cursor));
                let Some((key, value)) = entry else { break };
                cx.call_value(&callback, this_arg.clone(), vec![value, key, this.clone()])?;
            }
            Ok(Value::Undefined)
        }
        MapSetFn::SetForEach => {
            let id = this_map_id(cx, this, true)?;
            let callback = arg(args, 0);
            let this_arg = arg(args, 1);
            let mut cursor = MapCursor::Start;
            loop {
                let entry = with_map(cx, id, |map| map.advance(&mut cursor));
                let Some((key, value)) = entry else { break };
                cx.call_value(&callback, this_arg.clone(), vec![value, key, this.clone()])?;
            }
            Ok(Value::Undefined)
        }
        MapSetFn::MapKeys => {
            let id = this_map_id(cx, this, false)?;
            map_iterator(cx, id, IterMode::Keys)
        }
        MapSetFn::MapValues => {
            let id = this_map_id(cx, this, false)?;
            map_iterator(cx, id, IterMode::Values)
        }
        MapSetFn::MapEntries => {
            let id = this_map_id(cx, this, false)?;
            map_iterator(cx, id, IterMode::Entries)
        }
        MapSetFn::SetAdd => {
            let id = this_map_id(cx, this, true)?;
            let value = arg(args, 0);
            with_map(cx, id, |map| map.set(value.clone(), value));
            Ok(this.clone())
        }
        MapSetFn::SetHas => {
            let id = this_map_id(cx, this, true)?;
            Ok(Value::bool(with_map(cx, id, |map| map.has(&arg(args, 0)))))
        }
        MapSetFn::SetDelete => {
            let id = this_map_id(cx, this, true)?;
            Ok(Value::bool(with_map(cx, id, |map| map.delete(&arg(args, 0)))))
        }
        MapSetFn::SetClear => {
            let id = this_map_id(cx, this, true)?;
            with_map(cx, id, LinkedMap::clear);
            Ok(Value::Undefined)
        }
        MapSetFn::SetValues => {
            let id = this_map_id(cx, this, true)?;
            map_iterator(cx, id, IterMode::Values)
        }
        MapSetFn::SetEntries => {
            let id = this_map_id(cx, this, true)?;
            map_iterator(cx, id, IterMode::Entries)
        }
    }
}

fn map_iterator<T: ResourceTracker>(cx: &mut Context<T>, target: HeapId, mode: IterMode) -> RunResult<Value> {
    new_iterator(
        cx,
        IterState::Map {
            target,
            cursor: MapCursor::Start,
            mode,
        },
    )
}
