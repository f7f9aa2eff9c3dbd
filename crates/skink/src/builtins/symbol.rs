//! The `Symbol` constructor.
//!
//! Symbols compare by identity; `Symbol.for` returns the registered
//! identity for equal keys, so both equality readings of the original
//! engine hold.

use std::rc::Rc;

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::{Property, PropertyKey},
    resource::ResourceTracker,
    value::{SYM_IS_CONCAT_SPREADABLE, SYM_ITERATOR, SYM_TO_PRIMITIVE, Value},
};

use super::{NativeFn, arg, define_ctor, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolFn {
    Ctor,
    For,
    ProtoToString,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().symbol_proto;
    define_method(cx, proto, "toString", NativeFn::Symbol(SymbolFn::ProtoToString), 0)?;

    let ctor = define_ctor(cx, global, "Symbol", NativeFn::Symbol(SymbolFn::Ctor), 0, proto)?;
    define_method(cx, ctor, "for", NativeFn::Symbol(SymbolFn::For), 1)?;
    let well_known = [
        ("iterator", SYM_ITERATOR),
        ("toPrimitive", SYM_TO_PRIMITIVE),
        ("isConcatSpreadable", SYM_IS_CONCAT_SPREADABLE),
    ];
    for (name, id) in well_known {
        cx.heap
            .object_mut(ctor)
            .insert_property(PropertyKey::str(name), Property::frozen_data(Value::Symbol(id)));
    }
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: SymbolFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        SymbolFn::Ctor => {
            if construct {
                return Err(cx.type_error("Symbol is not a constructor"));
            }
            let description = match arg(args, 0) {
                Value::Undefined => None,
                other => Some(Rc::from(cx.to_js_string(&other)?.as_str())),
            };
            Ok(Value::Symbol(cx.symbols.create(description)))
        }
        SymbolFn::For => {
            let key = cx.to_js_string(&arg(args, 0))?;
            Ok(Value::Symbol(cx.symbols.for_key(key.rc())))
        }
        SymbolFn::ProtoToString => {
            let Value::Symbol(id) = this else {
                return Err(cx.type_error("Symbol.prototype.toString called on a non-symbol"));
            };
            Ok(Value::str(match cx.symbols.description(*id) {
                Some(desc) => format!("Symbol({desc})"),
                None => "Symbol()".to_owned(),
            }))
        }
    }
}
