//! Standard built-in objects.
//!
//! Every native function is a variant of [`NativeFn`], dispatched through a
//! single match so function objects stay small, copyable, and serializable.
//! Each submodule installs its own constructor and prototype during
//! [`install_standard_objects`].

pub(crate) mod array;
pub(crate) mod boolean;
pub(crate) mod console;
pub(crate) mod date;
pub(crate) mod error;
pub(crate) mod function;
pub(crate) mod global;
pub(crate) mod iter;
pub(crate) mod json;
pub(crate) mod map_set;
pub(crate) mod math;
pub(crate) mod number;
pub(crate) mod object;
pub(crate) mod regexp;
pub(crate) mod string;
pub(crate) mod symbol;

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    context::{Context, Realm},
    error::{ErrorKind, RunResult},
    heap::HeapId,
    object::{FunctionData, FunctionKind, JsObject, Property, PropertyKey},
    resource::ResourceTracker,
    value::Value,
};

pub(crate) use array::ArrayFn;
pub(crate) use boolean::BooleanFn;
pub(crate) use console::ConsoleFn;
pub(crate) use date::DateFn;
pub(crate) use error::ErrorFn;
pub(crate) use function::FunctionFn;
pub(crate) use global::GlobalFn;
pub(crate) use iter::IterFn;
pub(crate) use json::JsonFn;
pub(crate) use map_set::MapSetFn;
pub(crate) use math::MathFn;
pub(crate) use number::NumberFn;
pub(crate) use object::ObjectFn;
pub(crate) use regexp::RegExpFn;
pub(crate) use string::StringFn;
pub(crate) use symbol::SymbolFn;

/// Identity of a native function. One flat space, grouped per built-in
/// area, so dispatch is a pair of matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NativeFn {
    Global(GlobalFn),
    Object(ObjectFn),
    Array(ArrayFn),
    Function(FunctionFn),
    Str(StringFn),
    Number(NumberFn),
    Boolean(BooleanFn),
    Math(MathFn),
    Json(JsonFn),
    MapSet(MapSetFn),
    Symbol(SymbolFn),
    Error(ErrorFn),
    Date(DateFn),
    RegExp(RegExpFn),
    Console(ConsoleFn),
    Iter(IterFn),
}

/// Dispatches a native call. `construct` is true for `new`.
pub(crate) fn call_native<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: NativeFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        NativeFn::Global(f) => global::dispatch(cx, f, this, args),
        NativeFn::Object(f) => object::dispatch(cx, f, this, args, construct),
        NativeFn::Array(f) => array::dispatch(cx, f, this, args, construct),
        NativeFn::Function(f) => function::dispatch(cx, f, this, args),
        NativeFn::Str(f) => string::dispatch(cx, f, this, args, construct),
        NativeFn::Number(f) => number::dispatch(cx, f, this, args, construct),
        NativeFn::Boolean(f) => boolean::dispatch(cx, f, this, args, construct),
        NativeFn::Math(f) => math::dispatch(cx, f, this, args),
        NativeFn::Json(f) => json::dispatch(cx, f, this, args),
        NativeFn::MapSet(f) => map_set::dispatch(cx, f, this, args, construct),
        NativeFn::Symbol(f) => symbol::dispatch(cx, f, this, args, construct),
        NativeFn::Error(f) => error::dispatch(cx, f, this, args),
        NativeFn::Date(f) => date::dispatch(cx, f, this, args, construct),
        NativeFn::RegExp(f) => regexp::dispatch(cx, f, this, args, construct),
        NativeFn::Console(f) => console::dispatch(cx, f, this, args),
        NativeFn::Iter(f) => iter::dispatch(cx, f, this, args),
    }
}

/// Argument by position, `undefined` when absent.
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Allocates a native function object.
pub(crate) fn make_fn<T: ResourceTracker>(
    cx: &mut Context<T>,
    name: &str,
    f: NativeFn,
    length: u32,
) -> RunResult<HeapId> {
    let function_proto = cx.realm_ref().function_proto;
    let data = FunctionData {
        kind: FunctionKind::Native(f),
        name: Rc::from(name),
        length,
    };
    let mut obj = JsObject::function(Some(function_proto), data);
    obj.insert_property(PropertyKey::str("name"), Property::method(Value::str(name)));
    obj.insert_property(
        PropertyKey::str("length"),
        Property::method(Value::number(f64::from(length))),
    );
    cx.heap.alloc_object(obj)
}

/// Installs a method-style native on an object.
pub(crate) fn define_method<T: ResourceTracker>(
    cx: &mut Context<T>,
    target: HeapId,
    name: &str,
    f: NativeFn,
    length: u32,
) -> RunResult<()> {
    let func = make_fn(cx, name, f, length)?;
    cx.heap.object_mut(target).define_method(name, Value::Object(func));
    Ok(())
}

/// Installs a symbol-keyed method on an object.
pub(crate) fn define_symbol_method<T: ResourceTracker>(
    cx: &mut Context<T>,
    target: HeapId,
    symbol: crate::value::SymbolId,
    name: &str,
    f: NativeFn,
) -> RunResult<()> {
    let func = make_fn(cx, name, f, 0)?;
    cx.heap
        .object_mut(target)
        .symbol_props
        .insert(symbol, Property::method(Value::Object(func)));
    Ok(())
}

/// Creates a constructor function object wired to its prototype, and
/// installs it on the global object.
pub(crate) fn define_ctor<T: ResourceTracker>(
    cx: &mut Context<T>,
    global: HeapId,
    name: &str,
    f: NativeFn,
    length: u32,
    proto: HeapId,
) -> RunResult<HeapId> {
    let ctor = make_fn(cx, name, f, length)?;
    cx.heap
        .object_mut(ctor)
        .insert_property(PropertyKey::str("prototype"), Property::frozen_data(Value::Object(proto)));
    cx.heap.object_mut(proto).define_method("constructor", Value::Object(ctor));
    cx.heap.object_mut(global).define_method(name, Value::Object(ctor));
    Ok(ctor)
}

/// Builds the realm and populates a fresh global object with the standard
/// built-ins: `Object`, `Array`, `Function`, `Math`, `JSON`, `Number`,
/// `String`, `Boolean`, `Date`, `RegExp`, the `Error` hierarchy, `Map`,
/// `Set`, `Symbol`, and `console`.
pub(crate) fn install_standard_objects<T: ResourceTracker>(cx: &mut Context<T>) -> RunResult<HeapId> {
    // Bare prototype objects first; methods attach once the realm exists.
    let object_proto = cx.heap.alloc_object(JsObject::ordinary(None))?;
    let function_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let array_proto = cx.heap.alloc_object(JsObject::with_data(
        Some(object_proto),
        "Array",
        crate::object::ObjectData::Ordinary,
    ))?;
    let string_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let number_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let boolean_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let bigint_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let symbol_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let map_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let set_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let iterator_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let regexp_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let date_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let host_list_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;
    let error_proto = cx.heap.alloc_object(JsObject::ordinary(Some(object_proto)))?;

    let mut error_protos = AHashMap::new();
    for kind in [
        ErrorKind::Plain,
        ErrorKind::Type,
        ErrorKind::Range,
        ErrorKind::Reference,
        ErrorKind::Syntax,
        ErrorKind::Uri,
        ErrorKind::Evaluator,
        ErrorKind::Wrapped,
    ] {
        let proto = if kind == ErrorKind::Plain {
            error_proto
        } else {
            cx.heap.alloc_object(JsObject::ordinary(Some(error_proto)))?
        };
        error_protos.insert(kind, proto);
    }

    cx.realm = Some(Realm {
        object_proto,
        function_proto,
        array_proto,
        string_proto,
        number_proto,
        boolean_proto,
        bigint_proto,
        symbol_proto,
        map_proto,
        set_proto,
        iterator_proto,
        regexp_proto,
        date_proto,
        host_list_proto,
        error_proto,
        error_protos,
    });

    let global = cx.heap.alloc_object(JsObject::with_data(
        None,
        "global",
        crate::object::ObjectData::Ordinary,
    ))?;
    cx.heap.object_mut(global).proto = Some(object_proto);
    cx.global = Some(global);

    // Global singletons.
    cx.heap
        .object_mut(global)
        .insert_property(PropertyKey::str("globalThis"), Property::method(Value::Object(global)));
    cx.heap
        .object_mut(global)
        .insert_property(PropertyKey::str("undefined"), Property::frozen_data(Value::Undefined));
    cx.heap
        .object_mut(global)
        .insert_property(PropertyKey::str("NaN"), Property::frozen_data(Value::number(f64::NAN)));
    cx.heap.object_mut(global).insert_property(
        PropertyKey::str("Infinity"),
        Property::frozen_data(Value::number(f64::INFINITY)),
    );

    global::install(cx, global)?;
    object::install(cx, global)?;
    function::install(cx, global)?;
    array::install(cx, global)?;
    string::install(cx, global)?;
    number::install(cx, global)?;
    boolean::install(cx, global)?;
    math::install(cx, global)?;
    json::install(cx, global)?;
    map_set::install(cx, global)?;
    symbol::install(cx, global)?;
    error::install(cx, global)?;
    date::install(cx, global)?;
    regexp::install(cx, global)?;
    console::install(cx, global)?;
    iter::install(cx)?;

    Ok(global)
}
