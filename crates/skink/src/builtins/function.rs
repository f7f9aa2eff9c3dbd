//! `Function.prototype` methods.

use std::rc::Rc;

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::{FunctionData, FunctionKind, JsObject, ObjectData},
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionFn {
    ProtoCall,
    ProtoApply,
    ProtoBind,
    ProtoToString,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, _global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().function_proto;
    define_method(cx, proto, "call", NativeFn::Function(FunctionFn::ProtoCall), 1)?;
    define_method(cx, proto, "apply", NativeFn::Function(FunctionFn::ProtoApply), 2)?;
    define_method(cx, proto, "bind", NativeFn::Function(FunctionFn::ProtoBind), 1)?;
    define_method(cx, proto, "toString", NativeFn::Function(FunctionFn::ProtoToString), 0)?;
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: FunctionFn,
    this: &Value,
    args: &[Value],
) -> RunResult<Value> {
    match f {
        FunctionFn::ProtoCall => {
            let call_this = arg(args, 0);
            let call_args: Vec<Value> = args.iter().skip(1).cloned().collect();
            cx.call_value(this, call_this, call_args)
        }
        FunctionFn::ProtoApply => {
            let call_this = arg(args, 0);
            let call_args = match arg(args, 1) {
                Value::Undefined | Value::Null => Vec::new(),
                Value::Object(id) => match &cx.heap.object(id).data {
                    ObjectData::Array(elements) => elements.clone(),
                    _ => return Err(cx.type_error("apply expects an array-like arguments list")),
                },
                _ => return Err(cx.type_error("apply expects an array-like arguments list")),
            };
            cx.call_value(this, call_this, call_args)
        }
        FunctionFn::ProtoBind => {
            let Value::Object(target) = this else {
                return Err(cx.type_error("bind called on a non-function"));
            };
            if !cx.heap.object(*target).is_callable() {
                return Err(cx.type_error("bind called on a non-function"));
            }
            let bound_this = arg(args, 0);
            let bound_args: Vec<Value> = args.iter().skip(1).cloned().collect();
            let name = match &cx.heap.object(*target).data {
                ObjectData::Function(data) => format!("bound {}", data.name),
                _ => "bound".to_owned(),
            };
            let function_proto = cx.realm_ref().function_proto;
            let data = FunctionData {
                kind: FunctionKind::Bound {
                    target: *target,
                    this_val: bound_this,
                    bound_args,
                },
                name: Rc::from(name.as_str()),
                length: 0,
            };
            let obj = JsObject::function(Some(function_proto), data);
            Ok(Value::Object(cx.heap.alloc_object(obj)?))
        }
        FunctionFn::ProtoToString => {
            let Value::Object(id) = this else {
                return Err(cx.type_error("Function.prototype.toString called on a non-function"));
            };
            let ObjectData::Function(data) = &cx.heap.object(*id).data else {
                return Err(cx.type_error("Function.prototype.toString called on a non-function"));
            };
            Ok(Value::str(format!("function {}() {{ [native code] }}", data.name)))
        }
    }
}
