//! The `Error` hierarchy constructors.

use crate::{
    context::Context,
    error::{ErrorKind, RunResult},
    heap::HeapId,
    object::{ErrorData, JsObject, ObjectData, PropertyKey},
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_ctor, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorFn {
    Ctor(ErrorKind),
    ProtoToString,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let base_proto = cx.realm_ref().error_proto;
    define_method(cx, base_proto, "toString", NativeFn::Error(ErrorFn::ProtoToString), 0)?;
    cx.heap.object_mut(base_proto).define_data("message", Value::str(""));

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
        let proto = cx.realm_ref().error_protos[&kind];
        let name: &'static str = kind.into();
        cx.heap.object_mut(proto).define_data("name", Value::str(name));
        define_ctor(cx, global, name, NativeFn::Error(ErrorFn::Ctor(kind)), 1, proto)?;
    }
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: ErrorFn,
    this: &Value,
    args: &[Value],
) -> RunResult<Value> {
    match f {
        ErrorFn::Ctor(kind) => {
            // Error constructors work identically with and without new.
            let proto = cx.realm_ref().error_protos[&kind];
            let frames = cx.capture_stack();
            let mut obj = JsObject::with_data(Some(proto), "Error", ObjectData::Error(ErrorData { kind, frames }));
            match arg(args, 0) {
                Value::Undefined => {}
                message => {
                    let rendered = cx.to_js_string(&message)?;
                    obj.define_data("message", Value::Str(rendered));
                }
            }
            if let Value::Object(options) = arg(args, 1) {
                let cause = cx.get_member(&Value::Object(options), &PropertyKey::str("cause"))?;
                if !matches!(cause, Value::Undefined) {
                    obj.define_data("cause", cause);
                }
            }
            let stack_frames = match &obj.data {
                ObjectData::Error(data) => data.frames.clone(),
                _ => Vec::new(),
            };
            let mut stack_text = String::new();
            for frame in &stack_frames {
                stack_text.push_str(&format!(
                    "\tat {} ({}:{})\n",
                    frame.function_name, frame.file_name, frame.line_number
                ));
            }
            obj.define_data("stack", Value::str(stack_text));
            Ok(Value::Object(cx.heap.alloc_object(obj)?))
        }
        ErrorFn::ProtoToString => {
            let name = cx.get_member(this, &PropertyKey::str("name"))?;
            let message = cx.get_member(this, &PropertyKey::str("message"))?;
            let name = if matches!(name, Value::Undefined) {
                "Error".to_owned()
            } else {
                cx.to_js_string(&name)?.as_str().to_owned()
            };
            let message = if matches!(message, Value::Undefined) {
                String::new()
            } else {
                cx.to_js_string(&message)?.as_str().to_owned()
            };
            Ok(Value::str(match (name.is_empty(), message.is_empty()) {
                (true, _) => message,
                (false, true) => name,
                (false, false) => format!("{name}: {message}"),
            }))
        }
    }
}
