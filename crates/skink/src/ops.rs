//! Runtime operations: conversions, the property access protocol, operator
//! semantics, iteration, and host-bridge dispatch.
//!
//! Everything here can call back into script code (getters, `valueOf`,
//! adapted callbacks), which is why these are context methods rather than
//! free functions over the heap.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    ast::BinOp,
    context::{Activation, Context},
    error::{ErrorKind, NativeError, RunError, RunResult, Thrown},
    exception::{CodeLoc, Exception},
    heap::HeapId,
    host::{
        HostCallCx, HostClassId, HostHandle, HostListRef, HostValue, MemberEntry, ScriptCallback, coerce_value,
        host_instance_of, select_overload,
    },
    object::{
        ErrorData, FunctionData, FunctionKind, JsObject, ObjectData, PropValue, Property, PropertyKey,
        lookup_property,
    },
    resource::ResourceTracker,
    value::{
        JsString, SYM_ITERATOR, SYM_TO_PRIMITIVE, Value, bigint_to_f64, format_number, loose_equals_prim,
        strict_equals, to_int32, to_uint32,
    },
};

/// Preferred type for ToPrimitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    Str,
}

impl<T: ResourceTracker> Context<T> {
    // -- error helpers -----------------------------------------------------

    /// Builds an engine error carrying the current source position and a
    /// snapshot of the script stack.
    pub(crate) fn raise(&mut self, kind: ErrorKind, message: impl Into<String>) -> RunError {
        let mut native = NativeError::new(kind, message);
        if let Some(frame) = self.call_stack.last() {
            native.source_name = Some(frame.source.to_string());
            native.loc = Some(CodeLoc {
                line: frame.line,
                column: 1,
            });
        }
        native.stack = self.capture_stack();
        RunError::Throw(Thrown::Native(native))
    }

    pub(crate) fn type_error(&mut self, message: impl Into<String>) -> RunError {
        self.raise(ErrorKind::Type, message)
    }

    pub(crate) fn reference_error(&mut self, message: impl Into<String>) -> RunError {
        self.raise(ErrorKind::Reference, message)
    }

    pub(crate) fn range_error(&mut self, message: impl Into<String>) -> RunError {
        self.raise(ErrorKind::Range, message)
    }

    /// Wraps a host-side failure into the script-visible `WrappedError`.
    pub(crate) fn wrapped_error(&mut self, message: String) -> RunError {
        let err = self.raise(ErrorKind::Wrapped, message.clone());
        if let RunError::Throw(Thrown::Native(native)) = err {
            RunError::Throw(Thrown::Native(native.with_cause(message)))
        } else {
            err
        }
    }

    /// Materializes an engine error as a script error object, for `catch`
    /// bindings.
    pub(crate) fn create_error_object(&mut self, native: &NativeError) -> RunResult<Value> {
        let realm = self.realm_ref().clone();
        let proto = realm
            .error_protos
            .get(&native.kind)
            .copied()
            .unwrap_or(realm.error_proto);
        let mut obj = JsObject::with_data(
            Some(proto),
            "Error",
            ObjectData::Error(ErrorData {
                kind: native.kind,
                frames: native.stack.clone(),
            }),
        );
        obj.define_data("message", Value::str(native.message.as_str()));
        if let Some(source) = &native.source_name {
            obj.define_data("fileName", Value::str(source.as_str()));
        }
        if let Some(loc) = native.loc {
            obj.define_data("lineNumber", Value::number(f64::from(loc.line)));
        }
        if let Some(cause) = &native.cause {
            obj.define_data("cause", Value::str(cause.as_str()));
        }
        let mut stack_text = String::new();
        for frame in &native.stack {
            stack_text.push_str(&format!("\tat {} ({}:{})\n", frame.function_name, frame.file_name, frame.line_number));
        }
        obj.define_data("stack", Value::str(stack_text));
        let id = self.heap.alloc_object(obj)?;
        Ok(Value::Object(id))
    }

    /// Converts a thrown script value to the public exception form.
    pub(crate) fn thrown_value_to_exception(&mut self, value: &Value) -> Exception {
        if let Value::Object(id) = value {
            let obj = self.heap.object(*id);
            if let ObjectData::Error(data) = &obj.data {
                let kind = data.kind;
                let frames = data.frames.clone();
                let message = match obj.properties.get("message") {
                    Some(Property {
                        value: PropValue::Data { value, .. },
                        ..
                    }) => value.clone(),
                    _ => Value::Undefined,
                };
                let source = match obj.properties.get("fileName") {
                    Some(Property {
                        value: PropValue::Data { value: Value::Str(s), .. },
                        ..
                    }) => Some(s.as_str().to_owned()),
                    _ => None,
                };
                let line = match obj.properties.get("lineNumber") {
                    Some(Property {
                        value: PropValue::Data {
                            value: Value::Number(n),
                            ..
                        },
                        ..
                    }) => Some(*n as u32),
                    _ => None,
                };
                let message = message.to_string_prim().map_or_else(|_| String::new(), |s| s.to_string());
                return Exception::new(kind, message)
                    .with_location(source, line, None, None)
                    .with_stack(frames);
            }
        }
        let rendered = self.display_value(value);
        Exception::new(ErrorKind::Plain, rendered).with_stack(self.capture_stack())
    }

    // -- conversions -------------------------------------------------------

    /// ECMA ToPrimitive: `Symbol.toPrimitive`, then `valueOf`/`toString`
    /// in hint-appropriate order.
    pub(crate) fn to_primitive(&mut self, value: &Value, hint: Hint) -> RunResult<Value> {
        let Value::Object(id) = value else {
            return Ok(value.clone());
        };
        // Symbol.toPrimitive wins when present.
        if let Some((_, prop)) = lookup_property(&self.heap, *id, &PropertyKey::Sym(SYM_TO_PRIMITIVE)) {
            if let PropValue::Data {
                value: method @ Value::Object(_),
                ..
            } = prop.value
            {
                let hint_arg = Value::str(match hint {
                    Hint::Default => "default",
                    Hint::Number => "number",
                    Hint::Str => "string",
                });
                let result = self.call_value(&method, value.clone(), vec![hint_arg])?;
                if result.is_primitive() {
                    return Ok(result);
                }
                return Err(self.type_error("Symbol.toPrimitive returned an object"));
            }
        }
        if let ObjectData::Primitive(inner) = &self.heap.object(*id).data {
            return Ok(inner.clone());
        }
        // Dates prefer the string hint by default.
        let hint = if hint == Hint::Default {
            if matches!(self.heap.object(*id).data, ObjectData::Date(_)) {
                Hint::Str
            } else {
                Hint::Number
            }
        } else {
            hint
        };
        let order: [&str; 2] = if hint == Hint::Str {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_member(value, &PropertyKey::str(name))?;
            if let Value::Object(f) = &method {
                if self.heap.object(*f).is_callable() {
                    let result = self.call_value(&method, value.clone(), Vec::new())?;
                    if result.is_primitive() {
                        return Ok(result);
                    }
                }
            }
        }
        Err(self.type_error("Cannot convert object to a primitive value"))
    }

    pub(crate) fn to_number_value(&mut self, value: &Value) -> RunResult<f64> {
        let prim = self.to_primitive(value, Hint::Number)?;
        prim.to_number_prim()
    }

    pub(crate) fn to_js_string(&mut self, value: &Value) -> RunResult<JsString> {
        let prim = self.to_primitive(value, Hint::Str)?;
        prim.to_string_prim()
    }

    pub(crate) fn to_property_key(&mut self, value: &Value) -> RunResult<PropertyKey> {
        if let Value::Symbol(id) = value {
            return Ok(PropertyKey::Sym(*id));
        }
        let s = self.to_js_string(value)?;
        Ok(PropertyKey::Str(s.rc()))
    }

    /// ToObject: boxes primitives into wrapper objects; nullish raises.
    pub(crate) fn to_object_value(&mut self, value: &Value) -> RunResult<HeapId> {
        let realm = self.realm_ref().clone();
        let (proto, class_name) = match value {
            Value::Object(id) => return Ok(*id),
            Value::Undefined | Value::Null => {
                return Err(self.type_error("Cannot convert undefined or null to an object"));
            }
            Value::Bool(_) => (realm.boolean_proto, "Boolean"),
            Value::Number(_) => (realm.number_proto, "Number"),
            Value::Str(_) => (realm.string_proto, "String"),
            Value::BigInt(_) => (realm.bigint_proto, "BigInt"),
            Value::Symbol(_) => (realm.symbol_proto, "Symbol"),
        };
        let obj = JsObject::with_data(Some(proto), class_name, ObjectData::Primitive(value.clone()));
        Ok(self.heap.alloc_object(obj)?)
    }

    /// Script-facing `typeof`.
    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Symbol(_) => "symbol",
            Value::Object(id) => {
                if self.heap.object(*id).is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Best-effort rendering for console output and diagnostics. Never
    /// raises: objects that fail to stringify render as their class tag.
    pub(crate) fn display_value(&mut self, value: &Value) -> String {
        match value {
            Value::Str(s) => s.as_str().to_owned(),
            Value::Number(n) => format_number(*n),
            Value::Object(id) => {
                let class = Rc::clone(&self.heap.object(*id).class_name);
                match self.to_js_string(value) {
                    Ok(s) => s.as_str().to_owned(),
                    Err(_) => format!("[object {class}]"),
                }
            }
            other => other
                .to_string_prim()
                .map_or_else(|_| format!("[{}]", self.type_of(other)), |s| s.as_str().to_owned()),
        }
    }

    // -- property access ---------------------------------------------------

    /// `Get`: walks own properties then the prototype chain, invoking
    /// accessor getters; host wrappers resolve through their member tables.
    pub(crate) fn get_member(&mut self, base: &Value, key: &PropertyKey) -> RunResult<Value> {
        match base {
            Value::Undefined | Value::Null => {
                let kind = if matches!(base, Value::Null) { "null" } else { "undefined" };
                Err(self.type_error(format!("Cannot read property \"{key}\" from {kind}")))
            }
            Value::Str(s) => self.get_string_member(s, key),
            Value::Bool(_) | Value::Number(_) | Value::BigInt(_) | Value::Symbol(_) => {
                self.get_primitive_member(base, key)
            }
            Value::Object(id) => self.get_object_member(*id, base, key),
        }
    }

    fn get_string_member(&mut self, s: &JsString, key: &PropertyKey) -> RunResult<Value> {
        if let Some(name) = key.as_str() {
            if name == "length" {
                return Ok(Value::number(s.utf16_len() as f64));
            }
            if let Some(index) = key.array_index() {
                return Ok(match s.code_unit_at(index as usize) {
                    Some(_) => Value::Str(s.utf16_slice(index as usize, index as usize + 1)),
                    None => Value::Undefined,
                });
            }
        }
        let proto = self.realm_ref().string_proto;
        self.get_from_proto(proto, key)
    }

    fn get_primitive_member(&mut self, base: &Value, key: &PropertyKey) -> RunResult<Value> {
        let realm = self.realm_ref().clone();
        if let (Value::Symbol(id), Some("description")) = (base, key.as_str()) {
            return Ok(match self.symbols.description(*id) {
                Some(desc) => Value::str(desc),
                None => Value::Undefined,
            });
        }
        let proto = match base {
            Value::Bool(_) => realm.boolean_proto,
            Value::Number(_) => realm.number_proto,
            Value::BigInt(_) => realm.bigint_proto,
            Value::Symbol(_) => realm.symbol_proto,
            _ => realm.object_proto,
        };
        self.get_from_proto(proto, key)
    }

    fn get_from_proto(&mut self, proto: HeapId, key: &PropertyKey) -> RunResult<Value> {
        match lookup_property(&self.heap, proto, key) {
            Some((_, prop)) => match prop.value {
                PropValue::Data { value, .. } => Ok(value),
                PropValue::Accessor { get: Some(getter), .. } => {
                    self.call_value(&Value::Object(getter), Value::Undefined, Vec::new())
                }
                PropValue::Accessor { get: None, .. } => Ok(Value::Undefined),
            },
            None => Ok(Value::Undefined),
        }
    }

    fn get_object_member(&mut self, id: HeapId, base: &Value, key: &PropertyKey) -> RunResult<Value> {
        // Exotic fast paths first.
        match &self.heap.object(id).data {
            ObjectData::Array(elements) => {
                if let Some(index) = key.array_index() {
                    return Ok(elements.get(index as usize).cloned().unwrap_or(Value::Undefined));
                }
                if key.as_str() == Some("length") {
                    return Ok(Value::number(elements.len() as f64));
                }
            }
            ObjectData::Map(map) | ObjectData::Set(map) => {
                if key.as_str() == Some("size") {
                    return Ok(Value::number(map.len() as f64));
                }
            }
            ObjectData::HostList(list) => {
                if key.as_str() == Some("length") {
                    return Ok(Value::number(list.borrow().len() as f64));
                }
                if let Some(index) = key.array_index() {
                    let hv = list.borrow().get(index as usize);
                    return self.host_value_to_script(hv);
                }
            }
            ObjectData::RegExp(data) => match key.as_str() {
                Some("source") => return Ok(Value::str(&*data.source)),
                Some("flags") => return Ok(Value::str(&*data.flags)),
                Some("global") => return Ok(Value::bool(data.global)),
                Some("lastIndex") => return Ok(Value::number(data.last_index as f64)),
                _ => {}
            },
            ObjectData::Host { class, handle } => {
                let class = *class;
                let handle = handle.clone();
                if self.heap.object(id).own_property(key).is_none() {
                    if let Some(name) = key.as_str() {
                        if let Some(value) = self.get_host_member(id, class, &handle, name, false)? {
                            return Ok(value);
                        }
                    }
                }
            }
            ObjectData::Function(FunctionData {
                kind: FunctionKind::HostCtor { class },
                ..
            }) => {
                let class = *class;
                if self.heap.object(id).own_property(key).is_none() {
                    if let Some(name) = key.as_str() {
                        if let Some(value) = self.get_host_member(id, class, &HostHandle::new(()), name, true)? {
                            return Ok(value);
                        }
                    }
                }
            }
            _ => {}
        }

        match lookup_property(&self.heap, id, key) {
            Some((_, prop)) => match prop.value {
                PropValue::Data { value, .. } => Ok(value),
                PropValue::Accessor { get: Some(getter), .. } => {
                    self.call_value(&Value::Object(getter), base.clone(), Vec::new())
                }
                PropValue::Accessor { get: None, .. } => Ok(Value::Undefined),
            },
            None => Ok(Value::Undefined),
        }
    }

    /// Resolves a host member: fields read through their closure, bean
    /// properties invoke the getter, overload sets materialize as function
    /// objects cached on the wrapper.
    fn get_host_member(
        &mut self,
        wrapper: HeapId,
        class: HostClassId,
        handle: &HostHandle,
        name: &str,
        is_static: bool,
    ) -> RunResult<Option<Value>> {
        let registry = Rc::clone(&self.host);
        let members = registry.members(class);
        let Some(entry) = members.get(name, is_static) else {
            return Ok(None);
        };
        match entry {
            MemberEntry::Field(index) => {
                let field = &registry.class(class).fields[*index];
                let receiver = if is_static { None } else { Some(handle) };
                let hv = (field.get)(receiver);
                Ok(Some(self.host_value_to_script(hv)?))
            }
            MemberEntry::BeanProp { getter, .. } => {
                if !self.wrap_factory.expose_beans() {
                    return Ok(None);
                }
                let method = &registry.class(class).methods[*getter];
                let receiver = if is_static { None } else { Some(handle) };
                let result = (method.func)(self, receiver, &[]);
                match result {
                    Ok(hv) => Ok(Some(self.host_value_to_script(hv)?)),
                    Err(message) => Err(self.wrapped_error(message)),
                }
            }
            MemberEntry::Methods(_) => {
                let realm = self.realm_ref().clone();
                let data = FunctionData {
                    kind: FunctionKind::HostMethod {
                        class,
                        name: Rc::from(name),
                        is_static,
                    },
                    name: Rc::from(name),
                    length: 0,
                };
                let func = JsObject::function(Some(realm.function_proto), data);
                let func_id = self.heap.alloc_object(func)?;
                // Cache so the same function object comes back next time.
                self.heap
                    .object_mut(wrapper)
                    .properties
                    .insert(Rc::from(name), Property::method(Value::Object(func_id)));
                Ok(Some(Value::Object(func_id)))
            }
        }
    }

    /// `Put`: writable own data properties update in place, prototype
    /// accessors invoke their setter, and otherwise extensible objects
    /// create a new own property. Non-writable targets fail silently, per
    /// the loose-mode rules this engine runs under.
    pub(crate) fn put_member(&mut self, base: &Value, key: &PropertyKey, value: Value) -> RunResult<()> {
        let Value::Object(id) = base else {
            if base.is_nullish() {
                let kind = if matches!(base, Value::Null) { "null" } else { "undefined" };
                return Err(self.type_error(format!("Cannot set property \"{key}\" on {kind}")));
            }
            // Writes to primitives are dropped.
            return Ok(());
        };
        let id = *id;

        match &self.heap.object(id).data {
            ObjectData::Array(_) => {
                if let Some(index) = key.array_index() {
                    let elements = self.heap.object_mut(id).as_array_mut().expect("array data");
                    let index = index as usize;
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                    return Ok(());
                }
                if key.as_str() == Some("length") {
                    let new_len = self.to_number_value(&value)?;
                    if new_len < 0.0 || new_len.fract() != 0.0 || new_len > u32::MAX.into() {
                        return Err(self.range_error("Invalid array length"));
                    }
                    let elements = self.heap.object_mut(id).as_array_mut().expect("array data");
                    elements.resize(new_len as usize, Value::Undefined);
                    return Ok(());
                }
            }
            ObjectData::HostList(list) => {
                if let Some(index) = key.array_index() {
                    let list = list.clone();
                    let hv = self.script_to_any_host_value(&value)?;
                    list.borrow_mut().set(index as usize, hv);
                    return Ok(());
                }
            }
            ObjectData::RegExp(_) => {
                if key.as_str() == Some("lastIndex") {
                    let new_index = self.to_number_value(&value)?.max(0.0) as usize;
                    if let ObjectData::RegExp(data) = &mut self.heap.object_mut(id).data {
                        data.last_index = new_index;
                    }
                    return Ok(());
                }
            }
            ObjectData::Host { class, handle } => {
                let class = *class;
                let handle = handle.clone();
                if let Some(name) = key.as_str() {
                    if self.put_host_member(class, &handle, name, &value, false)? {
                        return Ok(());
                    }
                }
            }
            _ => {}
        }

        // Own property rules first.
        if let Some(prop) = self.heap.object(id).own_property(key) {
            match prop.value.clone() {
                PropValue::Data { writable, .. } => {
                    if writable {
                        if let Some(prop) = self.heap.object_mut(id).own_property_mut(key) {
                            prop.value = PropValue::Data { value, writable: true };
                        }
                    }
                    return Ok(());
                }
                PropValue::Accessor { set, .. } => {
                    if let Some(setter) = set {
                        self.call_value(&Value::Object(setter), base.clone(), vec![value])?;
                    }
                    return Ok(());
                }
            }
        }

        // Accessors up the prototype chain win over property creation.
        if let Some((_, prop)) = lookup_property(&self.heap, id, key) {
            if let PropValue::Accessor { set, .. } = prop.value {
                if let Some(setter) = set {
                    self.call_value(&Value::Object(setter), base.clone(), vec![value])?;
                }
                return Ok(());
            }
            if let PropValue::Data { writable: false, .. } = prop.value {
                return Ok(());
            }
        }

        if self.heap.object(id).extensible {
            self.heap.object_mut(id).insert_property(key.clone(), Property::data(value));
        }
        Ok(())
    }

    /// Host-side assignment: fields and bean setters. Returns true when a
    /// member consumed the write.
    fn put_host_member(
        &mut self,
        class: HostClassId,
        handle: &HostHandle,
        name: &str,
        value: &Value,
        is_static: bool,
    ) -> RunResult<bool> {
        let registry = Rc::clone(&self.host);
        let members = registry.members(class);
        let Some(entry) = members.get(name, is_static) else {
            return Ok(false);
        };
        match entry.clone() {
            MemberEntry::Field(index) => {
                let hv = self.script_to_any_host_value(value)?;
                let field = &registry.class(class).fields[index];
                let Some(setter) = &field.set else {
                    return Err(self.type_error(format!("Host field \"{name}\" is read-only")));
                };
                let receiver = if is_static { None } else { Some(handle) };
                if let Err(message) = setter(receiver, hv) {
                    return Err(self.wrapped_error(message));
                }
                Ok(true)
            }
            MemberEntry::BeanProp { setter, .. } => {
                let Some(setter) = setter else {
                    return Err(self.type_error(format!("Host property \"{name}\" has no setter")));
                };
                let method = &registry.class(class).methods[setter];
                let target = method.params.first().cloned().unwrap_or(crate::host::HostType::Any);
                let hv = self.coerce_for_host(value, &target)?;
                let receiver = if is_static { None } else { Some(handle) };
                let result = (method.func)(self, receiver, &[hv]);
                match result {
                    Ok(_) => Ok(true),
                    Err(message) => Err(self.wrapped_error(message)),
                }
            }
            // Assigning over a method is ignored, like the original engine.
            MemberEntry::Methods(_) => Ok(true),
        }
    }

    /// `delete obj[key]`, honoring `configurable`. Host members never
    /// delete.
    pub(crate) fn delete_member(&mut self, base: &Value, key: &PropertyKey) -> RunResult<bool> {
        let Value::Object(id) = base else {
            return Ok(true);
        };
        let id = *id;
        match &self.heap.object(id).data {
            ObjectData::Array(_) => {
                if let Some(index) = key.array_index() {
                    let elements = self.heap.object_mut(id).as_array_mut().expect("array data");
                    if (index as usize) < elements.len() {
                        elements[index as usize] = Value::Undefined;
                    }
                    return Ok(true);
                }
            }
            ObjectData::Host { class, .. } => {
                if let Some(name) = key.as_str() {
                    let registry = Rc::clone(&self.host);
                    if registry.members(*class).get(name, false).is_some() {
                        return Ok(false);
                    }
                }
            }
            _ => {}
        }
        Ok(self.heap.object_mut(id).delete_property(key))
    }

    /// The `in` operator and `'name' in host` membership checks.
    pub(crate) fn has_property_value(&mut self, target: &Value, key: &PropertyKey) -> RunResult<bool> {
        let Value::Object(id) = target else {
            return Err(self.type_error("Cannot use \"in\" operator on a non-object"));
        };
        let id = *id;
        match &self.heap.object(id).data {
            ObjectData::Array(elements) => {
                if let Some(index) = key.array_index() {
                    return Ok((index as usize) < elements.len());
                }
                if key.as_str() == Some("length") {
                    return Ok(true);
                }
            }
            ObjectData::HostList(list) => {
                if let Some(index) = key.array_index() {
                    return Ok((index as usize) < list.borrow().len());
                }
                if key.as_str() == Some("length") {
                    return Ok(true);
                }
            }
            ObjectData::Host { class, .. } => {
                if let Some(name) = key.as_str() {
                    let registry = Rc::clone(&self.host);
                    if registry.members(*class).get(name, false).is_some() {
                        return Ok(true);
                    }
                }
            }
            _ => {}
        }
        Ok(lookup_property(&self.heap, id, key).is_some())
    }

    // -- host bridge plumbing ----------------------------------------------

    /// Wraps a host object, memoized by identity so round-trips preserve
    /// `===`.
    pub(crate) fn wrap_host_object(&mut self, class: HostClassId, handle: HostHandle) -> RunResult<HeapId> {
        if let Some(existing) = self.wrapper_cache.get(&handle.identity()) {
            return Ok(*existing);
        }
        let realm = self.realm_ref().clone();
        let registry = Rc::clone(&self.host);
        let descriptor_name = registry.class(class).name.clone();
        let class_name = self
            .wrap_factory
            .class_name_for(&descriptor_name)
            .unwrap_or_else(|| "JavaObject".to_owned());
        let identity = handle.identity();
        let obj = JsObject::with_data(Some(realm.object_proto), &class_name, ObjectData::Host { class, handle });
        let id = self.heap.alloc_object(obj)?;
        self.wrapper_cache.insert(identity, id);
        Ok(id)
    }

    /// Wraps a host list with the shared array-like prototype.
    pub(crate) fn wrap_host_list(&mut self, list: HostListRef) -> RunResult<HeapId> {
        let identity = Rc::as_ptr(&list).cast::<()>() as usize;
        if let Some(existing) = self.wrapper_cache.get(&identity) {
            return Ok(*existing);
        }
        let realm = self.realm_ref().clone();
        let obj = JsObject::with_data(Some(realm.host_list_proto), "JavaList", ObjectData::HostList(list));
        let id = self.heap.alloc_object(obj)?;
        self.wrapper_cache.insert(identity, id);
        Ok(id)
    }

    /// Converts a host value to a script value, wrapping host objects.
    pub(crate) fn host_value_to_script(&mut self, hv: HostValue) -> RunResult<Value> {
        Ok(match hv {
            HostValue::Undefined => Value::Undefined,
            HostValue::Null => Value::Null,
            HostValue::Bool(b) => Value::Bool(b),
            HostValue::Byte(v) => Value::number(f64::from(v)),
            HostValue::Short(v) => Value::number(f64::from(v)),
            HostValue::Int(v) => Value::number(f64::from(v)),
            HostValue::Long(v) => Value::number(v as f64),
            HostValue::Float(v) => Value::number(f64::from(v)),
            HostValue::Double(v) => Value::number(v),
            HostValue::Char(c) => Value::str(c.to_string()),
            HostValue::Str(s) => Value::str(s),
            HostValue::Object { class, handle } => Value::Object(self.wrap_host_object(class, handle)?),
            HostValue::List(list) => Value::Object(self.wrap_host_list(list)?),
            HostValue::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.host_value_to_script(item)?);
                }
                self.new_array(elements)?
            }
            HostValue::Callback(cb) => cb.func,
            HostValue::Opaque(sv) => sv.0,
        })
    }

    /// Coerces a script value to the host's root type.
    pub(crate) fn script_to_any_host_value(&mut self, value: &Value) -> RunResult<HostValue> {
        self.coerce_for_host(value, &crate::host::HostType::Any)
    }

    pub(crate) fn coerce_for_host(&mut self, value: &Value, target: &crate::host::HostType) -> RunResult<HostValue> {
        // String targets may run script toString; collect eagerly through a
        // closure-free path by pre-rendering object arguments.
        let prerendered = match (value, target) {
            (Value::Object(_), crate::host::HostType::String) => Some(self.to_js_string(value)?),
            _ => None,
        };
        let registry = Rc::clone(&self.host);
        let stringify = |v: &Value| -> RunResult<JsString> {
            if let Some(ready) = &prerendered {
                return Ok(ready.clone());
            }
            v.to_string_prim()
        };
        coerce_value(value, target, &self.heap, &registry, &self.type_wrappers, &stringify)
    }

    /// Calls a host method overload set: rank, coerce, invoke, convert.
    pub(crate) fn call_host_method(
        &mut self,
        class: HostClassId,
        name: &str,
        is_static: bool,
        this: &Value,
        args: &[Value],
    ) -> RunResult<Value> {
        let registry = Rc::clone(&self.host);
        let members = registry.members(class);
        let Some(MemberEntry::Methods(set)) = members.get(name, is_static) else {
            return Err(self.type_error(format!("Host method \"{name}\" not found")));
        };
        let set: Vec<usize> = set.iter().copied().collect();
        let chosen = select_overload(class, name, &set, args, &self.heap, &registry, &self.type_wrappers)
            .map_err(|e| self.locate(e))?;
        let method = &registry.class(class).methods[chosen];
        let params = method.params.clone();
        let mut host_args = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&params) {
            host_args.push(self.coerce_for_host(arg, param)?);
        }
        let receiver = if is_static {
            None
        } else {
            match this {
                Value::Object(id) => match &self.heap.object(*id).data {
                    ObjectData::Host { handle, .. } => Some(handle.clone()),
                    _ => None,
                },
                _ => None,
            }
        };
        let method = &registry.class(class).methods[chosen];
        let result = (method.func)(self, receiver.as_ref(), &host_args);
        match result {
            Ok(hv) => self.host_value_to_script(hv),
            Err(message) => Err(self.wrapped_error(message)),
        }
    }

    /// Constructs a host object through the registered constructor set.
    pub(crate) fn construct_host(&mut self, class: HostClassId, args: &[Value]) -> RunResult<Value> {
        let registry = Rc::clone(&self.host);
        let chosen = crate::host::select_ctor(class, args, &self.heap, &registry, &self.type_wrappers)
            .map_err(|e| self.locate(e))?;
        let ctor = &registry.class(class).ctors[chosen];
        let params = ctor.params.clone();
        let mut host_args = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&params) {
            host_args.push(self.coerce_for_host(arg, param)?);
        }
        let ctor = &registry.class(class).ctors[chosen];
        let result = (ctor.func)(self, &host_args);
        match result {
            Ok(hv) => self.host_value_to_script(hv),
            Err(message) => Err(self.wrapped_error(message)),
        }
    }

    /// Attaches the current location and stack to a bare error raised by
    /// location-free helper code.
    pub(crate) fn locate(&mut self, err: RunError) -> RunError {
        match err {
            RunError::Throw(Thrown::Native(mut native)) => {
                if native.loc.is_none() {
                    if let Some(frame) = self.call_stack.last() {
                        native.source_name = Some(frame.source.to_string());
                        native.loc = Some(CodeLoc {
                            line: frame.line,
                            column: 1,
                        });
                    }
                }
                if native.stack.is_empty() {
                    native.stack = self.capture_stack();
                }
                RunError::Throw(Thrown::Native(native))
            }
            other => other,
        }
    }

    // -- iteration protocol ------------------------------------------------

    /// GetIterator: fetches and calls `@@iterator`.
    pub(crate) fn get_iterator(&mut self, value: &Value) -> RunResult<Value> {
        let method = self.get_member(value, &PropertyKey::Sym(SYM_ITERATOR))?;
        match &method {
            Value::Object(id) if self.heap.object(*id).is_callable() => {
                let iter = self.call_value(&method, value.clone(), Vec::new())?;
                if matches!(iter, Value::Object(_)) {
                    Ok(iter)
                } else {
                    Err(self.type_error("@@iterator did not return an object"))
                }
            }
            _ => {
                let ty = self.type_of(value);
                Err(self.type_error(format!("{ty} is not iterable")))
            }
        }
    }

    /// IteratorStep + IteratorValue folded together: `Ok(None)` means done.
    pub(crate) fn iterator_next(&mut self, iterator: &Value) -> RunResult<Option<Value>> {
        let next = self.get_member(iterator, &PropertyKey::str("next"))?;
        let result = self.call_value(&next, iterator.clone(), Vec::new())?;
        if !matches!(result, Value::Object(_)) {
            return Err(self.type_error("iterator result is not an object"));
        }
        let done = self.get_member(&result, &PropertyKey::str("done"))?;
        if done.to_boolean() {
            return Ok(None);
        }
        let value = self.get_member(&result, &PropertyKey::str("value"))?;
        Ok(Some(value))
    }

    /// IteratorClose, called when a loop exits abnormally. Failures from
    /// `return()` are swallowed so the original completion wins.
    pub(crate) fn iterator_close(&mut self, iterator: &Value) {
        let Ok(ret) = self.get_member(iterator, &PropertyKey::str("return")) else {
            return;
        };
        if let Value::Object(id) = &ret {
            if self.heap.object(*id).is_callable() {
                let _ = self.call_value(&ret, iterator.clone(), Vec::new());
            }
        }
    }

    /// Builds an iterator-result `{value, done}` object.
    pub(crate) fn iter_result(&mut self, value: Value, done: bool) -> RunResult<Value> {
        let realm = self.realm_ref().clone();
        let mut obj = JsObject::ordinary(Some(realm.object_proto));
        obj.define_data("value", value);
        obj.define_data("done", Value::bool(done));
        Ok(Value::Object(self.heap.alloc_object(obj)?))
    }

    /// Allocates a script array.
    pub(crate) fn new_array(&mut self, elements: Vec<Value>) -> RunResult<Value> {
        let realm = self.realm_ref().clone();
        let obj = JsObject::array(Some(realm.array_proto), elements);
        Ok(Value::Object(self.heap.alloc_object(obj)?))
    }

    /// Allocates an ordinary object with the realm's Object prototype.
    pub(crate) fn new_object(&mut self) -> RunResult<HeapId> {
        let realm = self.realm_ref().clone();
        let obj = JsObject::ordinary(Some(realm.object_proto));
        Ok(self.heap.alloc_object(obj)?)
    }

    // -- operators ---------------------------------------------------------

    pub(crate) fn binary_op(&mut self, op: BinOp, left: &Value, right: &Value) -> RunResult<Value> {
        match op {
            BinOp::Add => self.op_add(left, right),
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Exp => self.op_arith(op, left, right),
            BinOp::Shl | BinOp::Shr | BinOp::UShr | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                self.op_bitwise(op, left, right)
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => self.op_relational(op, left, right),
            BinOp::Eq => Ok(Value::bool(self.loose_equals(left, right)?)),
            BinOp::Ne => Ok(Value::bool(!self.loose_equals(left, right)?)),
            BinOp::StrictEq => Ok(Value::bool(strict_equals(left, right))),
            BinOp::StrictNe => Ok(Value::bool(!strict_equals(left, right))),
            BinOp::In => {
                let key = self.to_property_key(left)?;
                Ok(Value::bool(self.has_property_value(right, &key)?))
            }
            BinOp::Instanceof => self.op_instanceof(left, right),
        }
    }

    fn op_add(&mut self, left: &Value, right: &Value) -> RunResult<Value> {
        let lp = self.to_primitive(left, Hint::Default)?;
        let rp = self.to_primitive(right, Hint::Default)?;
        if matches!(lp, Value::Str(_)) || matches!(rp, Value::Str(_)) {
            let ls = self.to_js_string(&lp)?;
            let rs = self.to_js_string(&rp)?;
            let mut out = String::with_capacity(ls.as_str().len() + rs.as_str().len());
            out.push_str(ls.as_str());
            out.push_str(rs.as_str());
            return Ok(Value::str(out));
        }
        if let (Value::BigInt(a), Value::BigInt(b)) = (&lp, &rp) {
            return Ok(Value::BigInt(Rc::new(&**a + &**b)));
        }
        if matches!(lp, Value::BigInt(_)) || matches!(rp, Value::BigInt(_)) {
            return Err(self.type_error("Cannot mix BigInt and other types in addition"));
        }
        let a = lp.to_number_prim()?;
        let b = rp.to_number_prim()?;
        Ok(Value::number(a + b))
    }

    fn op_arith(&mut self, op: BinOp, left: &Value, right: &Value) -> RunResult<Value> {
        let lp = self.to_primitive(left, Hint::Number)?;
        let rp = self.to_primitive(right, Hint::Number)?;
        if let (Value::BigInt(a), Value::BigInt(b)) = (&lp, &rp) {
            return self.bigint_arith(op, a, b);
        }
        if matches!(lp, Value::BigInt(_)) || matches!(rp, Value::BigInt(_)) {
            return Err(self.type_error("Cannot mix BigInt and other types in arithmetic"));
        }
        let a = lp.to_number_prim()?;
        let b = rp.to_number_prim()?;
        Ok(Value::number(match op {
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Mod => {
                // ECMA remainder keeps the dividend's sign, like Rust's %.
                a % b
            }
            BinOp::Exp => a.powf(b),
            _ => unreachable!("non-arithmetic op in op_arith"),
        }))
    }

    fn bigint_arith(&mut self, op: BinOp, a: &Rc<BigInt>, b: &Rc<BigInt>) -> RunResult<Value> {
        let result = match op {
            BinOp::Sub => &**a - &**b,
            BinOp::Mul => &**a * &**b,
            BinOp::Div => {
                if b.is_zero() {
                    return Err(self.range_error("Division by zero"));
                }
                &**a / &**b
            }
            BinOp::Mod => {
                if b.is_zero() {
                    return Err(self.range_error("Division by zero"));
                }
                &**a % &**b
            }
            BinOp::Exp => {
                if b.is_negative() {
                    return Err(self.range_error("Exponent must be non-negative"));
                }
                let exp = b.to_u32().ok_or_else(|| self.range_error("BigInt exponent too large"))?;
                num_traits::pow::pow((**a).clone(), exp as usize)
            }
            _ => unreachable!("non-arithmetic op in bigint_arith"),
        };
        Ok(Value::BigInt(Rc::new(result)))
    }

    fn op_bitwise(&mut self, op: BinOp, left: &Value, right: &Value) -> RunResult<Value> {
        let lp = self.to_primitive(left, Hint::Number)?;
        let rp = self.to_primitive(right, Hint::Number)?;
        if let (Value::BigInt(a), Value::BigInt(b)) = (&lp, &rp) {
            let result = match op {
                BinOp::BitAnd => &**a & &**b,
                BinOp::BitOr => &**a | &**b,
                BinOp::BitXor => &**a ^ &**b,
                _ => return Err(self.type_error("BigInt does not support this shift form")),
            };
            return Ok(Value::BigInt(Rc::new(result)));
        }
        let a = lp.to_number_prim()?;
        let b = rp.to_number_prim()?;
        Ok(Value::number(match op {
            BinOp::Shl => f64::from(to_int32(a) << (to_uint32(b) & 31)),
            BinOp::Shr => f64::from(to_int32(a) >> (to_uint32(b) & 31)),
            BinOp::UShr => f64::from(to_uint32(a) >> (to_uint32(b) & 31)),
            BinOp::BitAnd => f64::from(to_int32(a) & to_int32(b)),
            BinOp::BitOr => f64::from(to_int32(a) | to_int32(b)),
            BinOp::BitXor => f64::from(to_int32(a) ^ to_int32(b)),
            _ => unreachable!("non-bitwise op in op_bitwise"),
        }))
    }

    fn op_relational(&mut self, op: BinOp, left: &Value, right: &Value) -> RunResult<Value> {
        let lp = self.to_primitive(left, Hint::Number)?;
        let rp = self.to_primitive(right, Hint::Number)?;
        if let (Value::Str(a), Value::Str(b)) = (&lp, &rp) {
            let (a, b) = (a.as_str(), b.as_str());
            return Ok(Value::bool(match op {
                BinOp::Lt => a < b,
                BinOp::Gt => a > b,
                BinOp::Le => a <= b,
                BinOp::Ge => a >= b,
                _ => unreachable!("non-relational op"),
            }));
        }
        // Mixed BigInt/Number comparison is allowed, unlike arithmetic.
        let a = match &lp {
            Value::BigInt(b) => bigint_to_f64(b),
            other => other.to_number_prim()?,
        };
        let b = match &rp {
            Value::BigInt(b) => bigint_to_f64(b),
            other => other.to_number_prim()?,
        };
        Ok(Value::bool(match op {
            BinOp::Lt => a < b,
            BinOp::Gt => a > b,
            BinOp::Le => a <= b,
            BinOp::Ge => a >= b,
            _ => unreachable!("non-relational op"),
        }))
    }

    pub(crate) fn loose_equals(&mut self, left: &Value, right: &Value) -> RunResult<bool> {
        match (left, right) {
            (Value::Object(a), Value::Object(b)) => Ok(a == b),
            (Value::Object(_), _) => {
                let lp = self.to_primitive(left, Hint::Default)?;
                self.loose_equals(&lp, right)
            }
            (_, Value::Object(_)) => {
                let rp = self.to_primitive(right, Hint::Default)?;
                self.loose_equals(left, &rp)
            }
            _ => loose_equals_prim(left, right),
        }
    }

    fn op_instanceof(&mut self, left: &Value, right: &Value) -> RunResult<Value> {
        let Value::Object(ctor_id) = right else {
            return Err(self.type_error("Right-hand side of instanceof is not callable"));
        };
        let ctor_id = *ctor_id;
        let obj = self.heap.object(ctor_id);
        let ObjectData::Function(data) = &obj.data else {
            return Err(self.type_error("Right-hand side of instanceof is not callable"));
        };
        if let FunctionKind::HostCtor { class } = data.kind {
            let registry = Rc::clone(&self.host);
            return Ok(Value::bool(host_instance_of(&self.heap, left, class, &registry)));
        }
        let prototype = self.get_member(right, &PropertyKey::str("prototype"))?;
        let Value::Object(proto_id) = prototype else {
            return Err(self.type_error("Function has no prototype object"));
        };
        let Value::Object(mut walk) = left.clone() else {
            return Ok(Value::bool(false));
        };
        loop {
            match self.heap.object(walk).proto {
                Some(next) if next == proto_id => return Ok(Value::bool(true)),
                Some(next) => walk = next,
                None => return Ok(Value::bool(false)),
            }
        }
    }
}

impl<T: ResourceTracker> HostCallCx for Context<T> {
    fn call_callback(&mut self, callback: &ScriptCallback, args: Vec<HostValue>) -> Result<HostValue, String> {
        let mut script_args = Vec::with_capacity(args.len());
        for arg in args {
            match self.host_value_to_script(arg) {
                Ok(v) => script_args.push(v),
                Err(err) => {
                    let exc = self.run_error_to_exception(err);
                    return Err(exc.to_string());
                }
            }
        }
        let result = self.call_value(&callback.func, callback.this_val.clone(), script_args);
        match result {
            Ok(value) => match self.script_to_any_host_value(&value) {
                Ok(hv) => Ok(hv),
                Err(err) => {
                    let exc = self.run_error_to_exception(err);
                    Err(exc.to_string())
                }
            },
            Err(err) => {
                let exc = self.run_error_to_exception(err);
                Err(exc.to_string())
            }
        }
    }
}

/// New activations start at the function's declaration line until the first
/// statement updates them.
pub(crate) fn activation(function_name: &Rc<str>, source: &Rc<str>, line: u32) -> Activation {
    Activation {
        function_name: Rc::clone(function_name),
        source: Rc::clone(source),
        line,
    }
}
