//! Scriptable objects: property maps, prototype links, descriptors.
//!
//! Property lookup walks own properties then the prototype chain. Accessor
//! invocation happens in the evaluator, which is the only place that can
//! call script functions; this module supplies the storage and the pure
//! parts of the protocol (descriptor rules, extensibility, seal/freeze,
//! prototype-cycle rejection, enumeration order).

use std::{fmt, rc::Rc};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    ast::FuncId,
    builtins::NativeFn,
    error::{ErrorKind, RunError, RunResult},
    heap::{Heap, HeapId},
    host::{HostClassId, HostHandle, HostIterableRef, HostIterator, HostListRef},
    linked_map::{LinkedMap, MapCursor},
    resource::ResourceTracker,
    value::{JsString, SymbolId, Value, as_array_index},
};

/// A property key after ToPropertyKey: an interned-ish string or a symbol.
///
/// Integer-like keys on arrays never reach the property map; the evaluator
/// routes them to the element storage first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PropertyKey {
    Str(Rc<str>),
    Sym(SymbolId),
}

impl PropertyKey {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Sym(_) => None,
        }
    }

    /// Canonical array index when this key is one.
    pub fn array_index(&self) -> Option<u32> {
        self.as_str().and_then(as_array_index)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Sym(id) => write!(f, "Symbol({})", id.0),
        }
    }
}

/// Payload of a property: plain data or accessor pair.
#[derive(Debug, Clone)]
pub(crate) enum PropValue {
    Data { value: Value, writable: bool },
    Accessor { get: Option<HeapId>, set: Option<HeapId> },
}

/// A property descriptor.
#[derive(Debug, Clone)]
pub(crate) struct Property {
    pub value: PropValue,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Ordinary writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Self {
            value: PropValue::Data { value, writable: true },
            enumerable: true,
            configurable: true,
        }
    }

    /// Built-in method style: writable and configurable but not enumerable.
    pub fn method(value: Value) -> Self {
        Self {
            value: PropValue::Data { value, writable: true },
            enumerable: false,
            configurable: true,
        }
    }

    /// Fully locked data property.
    pub fn frozen_data(value: Value) -> Self {
        Self {
            value: PropValue::Data {
                value,
                writable: false,
            },
            enumerable: false,
            configurable: false,
        }
    }

    pub fn accessor(get: Option<HeapId>, set: Option<HeapId>) -> Self {
        Self {
            value: PropValue::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }
}

/// Iteration flavor of the built-in iterator objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterMode {
    Keys,
    Values,
    Entries,
}

/// State of a live iterator object.
pub(crate) enum IterState {
    Array {
        target: HeapId,
        index: u32,
        mode: IterMode,
    },
    Map {
        target: HeapId,
        cursor: MapCursor,
        mode: IterMode,
    },
    Str {
        string: JsString,
        /// Next UTF-16 code-unit offset.
        index: usize,
    },
    /// Wrapped host iterator; `next`/`done` folded into the script
    /// protocol by the evaluator.
    Host(Box<dyn HostIterator>),
    /// Exhausted or closed.
    Done,
}

impl fmt::Debug for IterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array { index, .. } => write!(f, "ArrayIter(at {index})"),
            Self::Map { .. } => f.write_str("MapIter"),
            Self::Str { index, .. } => write!(f, "StrIter(at {index})"),
            Self::Host(_) => f.write_str("HostIter"),
            Self::Done => f.write_str("DoneIter"),
        }
    }
}

/// Error-object internals.
#[derive(Debug, Clone)]
pub(crate) struct ErrorData {
    pub kind: ErrorKind,
    /// Script stack at construction, innermost frame first.
    pub frames: Vec<crate::exception::StackFrame>,
}

/// Compiled regular expression literal or constructor result.
#[derive(Debug)]
pub(crate) struct RegExpData {
    pub source: Rc<str>,
    pub flags: Rc<str>,
    pub regex: fancy_regex::Regex,
    pub global: bool,
    pub last_index: usize,
}

/// Script function payloads.
#[derive(Debug)]
pub(crate) enum FunctionKind {
    /// A function compiled from source, closing over `env`.
    Script {
        code: Rc<crate::context::CompiledCode>,
        func: FuncId,
        env: HeapId,
    },
    /// An engine-provided builtin.
    Native(NativeFn),
    /// `Function.prototype.bind` result.
    Bound {
        target: HeapId,
        this_val: Value,
        bound_args: Vec<Value>,
    },
    /// An overload set of host methods under one name.
    HostMethod {
        class: HostClassId,
        name: Rc<str>,
        is_static: bool,
    },
    /// A host constructor set.
    HostCtor { class: HostClassId },
}

#[derive(Debug)]
pub(crate) struct FunctionData {
    pub kind: FunctionKind,
    pub name: Rc<str>,
    /// Declared parameter count, the script-visible `length`.
    pub length: u32,
}

/// Exotic internal state attached to an object.
pub(crate) enum ObjectData {
    Ordinary,
    /// Dense element storage; `length` is the vector length.
    Array(Vec<Value>),
    Function(FunctionData),
    /// Error objects keep their kind and the structured stack captured at
    /// construction, so embedder-side rendering does not have to re-parse
    /// the `stack` string property.
    Error(ErrorData),
    Map(LinkedMap),
    Set(LinkedMap),
    Iter(IterState),
    RegExp(RegExpData),
    /// Milliseconds since the epoch.
    Date(f64),
    /// Primitive wrapper objects (`new Number(3)` and friends).
    Primitive(Value),
    /// A reflective wrapper around a host object.
    Host { class: HostClassId, handle: HostHandle },
    /// An integer-indexed live view over a host list.
    HostList(HostListRef),
    /// A host iterable; `@@iterator` yields wrapped host iterators.
    HostIterable(HostIterableRef),
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinary => f.write_str("Ordinary"),
            Self::Array(v) => write!(f, "Array(len {})", v.len()),
            Self::Function(data) => write!(f, "Function({})", data.name),
            Self::Error(data) => write!(f, "Error({})", data.kind),
            Self::Map(m) => write!(f, "Map(len {})", m.len()),
            Self::Set(s) => write!(f, "Set(len {})", s.len()),
            Self::Iter(state) => state.fmt(f),
            Self::RegExp(r) => write!(f, "RegExp(/{}/{})", r.source, r.flags),
            Self::Date(ms) => write!(f, "Date({ms})"),
            Self::Primitive(v) => write!(f, "Primitive({v:?})"),
            Self::Host { class, .. } => write!(f, "Host(class {})", class.0),
            Self::HostList(_) => f.write_str("HostList"),
            Self::HostIterable(_) => f.write_str("HostIterable"),
        }
    }
}

/// A runtime object participating in the script object protocol.
#[derive(Debug)]
pub(crate) struct JsObject {
    /// Own string-keyed properties in insertion order.
    pub properties: IndexMap<Rc<str>, Property>,
    /// Own symbol-keyed properties.
    pub symbol_props: AHashMap<SymbolId, Property>,
    pub proto: Option<HeapId>,
    /// Lexical scope the object's definitions close over, for functions.
    pub parent_scope: Option<HeapId>,
    /// Short diagnostic tag: "Object", "Array", "Function", "JavaObject".
    pub class_name: Rc<str>,
    pub extensible: bool,
    pub data: ObjectData,
}

impl JsObject {
    pub fn ordinary(proto: Option<HeapId>) -> Self {
        Self {
            properties: IndexMap::new(),
            symbol_props: AHashMap::new(),
            proto,
            parent_scope: None,
            class_name: Rc::from("Object"),
            extensible: true,
            data: ObjectData::Ordinary,
        }
    }

    pub fn with_data(proto: Option<HeapId>, class_name: &str, data: ObjectData) -> Self {
        Self {
            properties: IndexMap::new(),
            symbol_props: AHashMap::new(),
            proto,
            parent_scope: None,
            class_name: Rc::from(class_name),
            extensible: true,
            data,
        }
    }

    pub fn array(proto: Option<HeapId>, elements: Vec<Value>) -> Self {
        Self::with_data(proto, "Array", ObjectData::Array(elements))
    }

    pub fn function(proto: Option<HeapId>, data: FunctionData) -> Self {
        Self::with_data(proto, "Function", ObjectData::Function(data))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.data, ObjectData::Function(_))
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match &self.data {
            ObjectData::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.data {
            ObjectData::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn own_property(&self, key: &PropertyKey) -> Option<&Property> {
        match key {
            PropertyKey::Str(name) => self.properties.get(name),
            PropertyKey::Sym(id) => self.symbol_props.get(id),
        }
    }

    pub fn own_property_mut(&mut self, key: &PropertyKey) -> Option<&mut Property> {
        match key {
            PropertyKey::Str(name) => self.properties.get_mut(name),
            PropertyKey::Sym(id) => self.symbol_props.get_mut(id),
        }
    }

    pub fn insert_property(&mut self, key: PropertyKey, prop: Property) {
        match key {
            PropertyKey::Str(name) => {
                self.properties.insert(name, prop);
            }
            PropertyKey::Sym(id) => {
                self.symbol_props.insert(id, prop);
            }
        }
    }

    /// Removes an own property, honoring `configurable`. Returns the
    /// script-visible `delete` result.
    pub fn delete_property(&mut self, key: &PropertyKey) -> bool {
        let configurable = match self.own_property(key) {
            Some(prop) => prop.configurable,
            None => return true,
        };
        if !configurable {
            return false;
        }
        match key {
            // shift_remove keeps the insertion order of survivors intact.
            PropertyKey::Str(name) => {
                self.properties.shift_remove(name);
            }
            PropertyKey::Sym(id) => {
                self.symbol_props.remove(id);
            }
        }
        true
    }

    /// Defines a method-style builtin property.
    pub fn define_method(&mut self, name: &str, value: Value) {
        self.properties.insert(Rc::from(name), Property::method(value));
    }

    /// Defines an ordinary data property.
    pub fn define_data(&mut self, name: &str, value: Value) {
        self.properties.insert(Rc::from(name), Property::data(value));
    }

    /// Marks every own property non-configurable (and non-writable when
    /// `freeze`), then makes the object non-extensible.
    pub fn seal_or_freeze(&mut self, freeze: bool) {
        for prop in self.properties.values_mut().chain(self.symbol_props.values_mut()) {
            prop.configurable = false;
            if freeze {
                if let PropValue::Data { writable, .. } = &mut prop.value {
                    *writable = false;
                }
            }
        }
        self.extensible = false;
    }

    pub fn is_sealed(&self) -> bool {
        !self.extensible
            && self
                .properties
                .values()
                .chain(self.symbol_props.values())
                .all(|p| !p.configurable)
    }

    pub fn is_frozen(&self) -> bool {
        self.is_sealed()
            && self
                .properties
                .values()
                .chain(self.symbol_props.values())
                .all(|p| match &p.value {
                    PropValue::Data { writable, .. } => !writable,
                    PropValue::Accessor { .. } => true,
                })
    }

    pub fn estimate_size(&self) -> usize {
        let base = std::mem::size_of::<Self>();
        let props = self.properties.len() * (std::mem::size_of::<Property>() + 24);
        let extra = match &self.data {
            ObjectData::Array(elements) => elements.len() * std::mem::size_of::<Value>(),
            ObjectData::Map(m) | ObjectData::Set(m) => m.len() * 2 * std::mem::size_of::<Value>(),
            _ => 0,
        };
        base + props + extra
    }
}

/// Walks the prototype chain looking for `key`, returning the holder id and
/// a clone of the descriptor. Accessor invocation is the caller's job.
pub(crate) fn lookup_property<T: ResourceTracker>(
    heap: &Heap<T>,
    mut id: HeapId,
    key: &PropertyKey,
) -> Option<(HeapId, Property)> {
    loop {
        let obj = heap.object(id);
        if let Some(prop) = obj.own_property(key) {
            return Some((id, prop.clone()));
        }
        id = obj.proto?;
    }
}

/// Sets the prototype, rejecting cycles and non-extensible targets.
pub(crate) fn set_prototype<T: ResourceTracker>(
    heap: &mut Heap<T>,
    id: HeapId,
    new_proto: Option<HeapId>,
) -> RunResult<()> {
    if !heap.object(id).extensible {
        return Err(RunError::type_error("Cannot set prototype of a non-extensible object"));
    }
    // Reject any chain that would lead back to the object itself.
    let mut walk = new_proto;
    while let Some(current) = walk {
        if current == id {
            return Err(RunError::type_error("Cyclic prototype chain is not allowed"));
        }
        walk = heap.object(current).proto;
    }
    heap.object_mut(id).proto = new_proto;
    Ok(())
}

/// Collects keys for `for…in`: own enumerable string keys in insertion
/// order, then up the prototype chain, skipping shadowed names. Array
/// elements enumerate as their indices before named properties.
pub(crate) fn enumerate_keys<T: ResourceTracker>(heap: &Heap<T>, mut id: HeapId) -> Vec<Rc<str>> {
    let mut out: Vec<Rc<str>> = Vec::new();
    let mut seen: Vec<Rc<str>> = Vec::new();
    loop {
        let obj = heap.object(id);
        if let ObjectData::Array(elements) = &obj.data {
            for index in 0..elements.len() {
                let key: Rc<str> = Rc::from(index.to_string());
                if !seen.iter().any(|k| **k == *key) {
                    seen.push(Rc::clone(&key));
                    out.push(key);
                }
            }
        }
        for (name, prop) in &obj.properties {
            if seen.iter().any(|k| **k == **name) {
                continue;
            }
            seen.push(Rc::clone(name));
            if prop.enumerable {
                out.push(Rc::clone(name));
            }
        }
        match obj.proto {
            Some(proto) => id = proto,
            None => return out,
        }
    }
}
