//! The `Boolean` constructor and prototype.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::ObjectData,
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_ctor, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BooleanFn {
    Ctor,
    ProtoToString,
    ProtoValueOf,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().boolean_proto;
    define_method(cx, proto, "toString", NativeFn::Boolean(BooleanFn::ProtoToString), 0)?;
    define_method(cx, proto, "valueOf", NativeFn::Boolean(BooleanFn::ProtoValueOf), 0)?;
    define_ctor(cx, global, "Boolean", NativeFn::Boolean(BooleanFn::Ctor), 1, proto)?;
    Ok(())
}

fn this_bool<T: ResourceTracker>(cx: &mut Context<T>, this: &Value) -> RunResult<bool> {
    match this {
        Value::Bool(b) => Ok(*b),
        Value::Object(id) => match &cx.heap.object(*id).data {
            ObjectData::Primitive(Value::Bool(b)) => Ok(*b),
            _ => Err(cx.type_error("Boolean method called on an incompatible receiver")),
        },
        _ => Err(cx.type_error("Boolean method called on an incompatible receiver")),
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: BooleanFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    match f {
        BooleanFn::Ctor => {
            let value = Value::bool(arg(args, 0).to_boolean());
            if construct {
                Ok(Value::Object(cx.to_object_value(&value)?))
            } else {
                Ok(value)
            }
        }
        BooleanFn::ProtoToString => Ok(Value::str(if this_bool(cx, this)? { "true" } else { "false" })),
        BooleanFn::ProtoValueOf => Ok(Value::bool(this_bool(cx, this)?)),
    }
}
