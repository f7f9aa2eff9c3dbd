//! The `console` object, routed through the context's `ConsoleWriter`.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    io::ConsoleLevel,
    object::JsObject,
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConsoleFn(pub ConsoleLevel);

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let object_proto = cx.realm_ref().object_proto;
    let console = cx.heap.alloc_object(JsObject::with_data(
        Some(object_proto),
        "Console",
        crate::object::ObjectData::Ordinary,
    ))?;
    for level in [
        ConsoleLevel::Debug,
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
    ] {
        define_method(cx, console, level.method_name(), NativeFn::Console(ConsoleFn(level)), 0)?;
    }
    cx.heap.object_mut(global).define_method("console", Value::Object(console));
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: ConsoleFn,
    _this: &Value,
    args: &[Value],
) -> RunResult<Value> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(cx.display_value(value));
    }
    let line = parts.join(" ");
    cx.console.write_line(f.0, &line);
    Ok(Value::Undefined)
}
