//! Public value type for the embedder boundary.
//!
//! [`JsValue`] owns all its data and can be freely cloned, serialized, or
//! stored; unlike the internal `Value` it needs no heap. Conversion walks
//! the heap with cycle detection and falls back to a rendered `Repr` for
//! values with no data mapping (functions, symbols, host wrappers).

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    context::Context,
    error::{RunError, RunResult},
    heap::HeapId,
    object::{ObjectData, PropValue},
    resource::ResourceTracker,
    value::{Value, format_number},
};

/// A script value crossing the embedder boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(BigInt),
    /// An array snapshot.
    Array(Vec<JsValue>),
    /// An object snapshot: own enumerable string-keyed data properties in
    /// insertion order.
    Object(Vec<(String, JsValue)>),
    /// Fallback rendering for values with no direct data mapping.
    Repr(String),
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Repr(r) => f.write_str(r),
        }
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

const MAX_CONVERT_DEPTH: u32 = 64;

impl<T: ResourceTracker> Context<T> {
    /// Converts an internal value to the public form.
    pub(crate) fn value_to_jsvalue(&self, value: &Value) -> JsValue {
        let mut visiting = Vec::new();
        self.convert_out(value, &mut visiting, 0)
    }

    fn convert_out(&self, value: &Value, visiting: &mut Vec<HeapId>, depth: u32) -> JsValue {
        match value {
            Value::Undefined => JsValue::Undefined,
            Value::Null => JsValue::Null,
            Value::Bool(b) => JsValue::Bool(*b),
            Value::Number(n) => JsValue::Number(*n),
            Value::Str(s) => JsValue::String(s.as_str().to_owned()),
            Value::BigInt(b) => JsValue::BigInt((**b).clone()),
            Value::Symbol(id) => JsValue::Repr(match self.symbols.description(*id) {
                Some(desc) => format!("Symbol({desc})"),
                None => "Symbol()".to_owned(),
            }),
            Value::Object(id) => {
                if depth > MAX_CONVERT_DEPTH || visiting.contains(id) {
                    return JsValue::Repr("[cycle]".to_owned());
                }
                visiting.push(*id);
                let out = self.convert_object_out(*id, visiting, depth);
                visiting.pop();
                out
            }
        }
    }

    fn convert_object_out(&self, id: HeapId, visiting: &mut Vec<HeapId>, depth: u32) -> JsValue {
        let obj = self.heap.object(id);
        match &obj.data {
            ObjectData::Array(elements) => JsValue::Array(
                elements
                    .iter()
                    .map(|element| self.convert_out(element, visiting, depth + 1))
                    .collect(),
            ),
            ObjectData::Function(data) => JsValue::Repr(format!("function {}() {{ ... }}", data.name)),
            ObjectData::Error(data) => {
                let message = obj
                    .properties
                    .get("message")
                    .and_then(|p| match &p.value {
                        PropValue::Data { value: Value::Str(s), .. } => Some(s.as_str().to_owned()),
                        _ => None,
                    })
                    .unwrap_or_default();
                JsValue::Repr(format!("{}: {message}", data.kind))
            }
            ObjectData::Map(map) => JsValue::Repr(format!("[object Map({})]", map.len())),
            ObjectData::Set(set) => JsValue::Repr(format!("[object Set({})]", set.len())),
            ObjectData::RegExp(data) => JsValue::Repr(format!("/{}/{}", data.source, data.flags)),
            ObjectData::Date(ms) => JsValue::Repr(crate::builtins::date::to_iso_string(*ms)),
            ObjectData::Primitive(inner) => self.convert_out(inner, visiting, depth + 1),
            ObjectData::Host { .. } => JsValue::Repr(format!("[{}]", obj.class_name)),
            ObjectData::HostList(list) => JsValue::Repr(format!("[JavaList({})]", list.borrow().len())),
            ObjectData::HostIterable(_) => JsValue::Repr("[JavaIterable]".to_owned()),
            ObjectData::Iter(_) => JsValue::Repr("[object Iterator]".to_owned()),
            ObjectData::Ordinary => {
                let mut out = Vec::new();
                for (name, prop) in &obj.properties {
                    if !prop.enumerable {
                        continue;
                    }
                    if let PropValue::Data { value, .. } = &prop.value {
                        out.push((name.to_string(), self.convert_out(value, visiting, depth + 1)));
                    }
                }
                JsValue::Object(out)
            }
        }
    }

    /// Converts a public value to the internal form, allocating containers
    /// on the context heap.
    pub(crate) fn jsvalue_to_value(&mut self, value: &JsValue) -> RunResult<Value> {
        Ok(match value {
            JsValue::Undefined => Value::Undefined,
            JsValue::Null => Value::Null,
            JsValue::Bool(b) => Value::Bool(*b),
            JsValue::Number(n) => Value::Number(*n),
            JsValue::String(s) => Value::str(s.as_str()),
            JsValue::BigInt(b) => Value::BigInt(std::rc::Rc::new(b.clone())),
            JsValue::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.jsvalue_to_value(item)?);
                }
                self.new_array(elements)?
            }
            JsValue::Object(pairs) => {
                let id = self.new_object()?;
                for (key, item) in pairs {
                    let converted = self.jsvalue_to_value(item)?;
                    self.heap.object_mut(id).define_data(key, converted);
                }
                Value::Object(id)
            }
            JsValue::Repr(_) => {
                return Err(RunError::type_error("Repr values cannot be used as inputs"));
            }
        })
    }
}
