//! Overload ranking and value coercion across the host boundary.
//!
//! The ranking follows the LiveConnect-3 style weight table:
//!
//! | source            | target and weight                                    |
//! |-------------------|------------------------------------------------------|
//! | null              | any non-primitive: 1                                 |
//! | undefined         | String: 1, Object: 1                                 |
//! | boolean           | boolean: 1, Object: 3                                |
//! | number            | double: 1, then widening rank double<float<long<int  |
//! |                   | <short<char<byte (2..7), String: 9, Object: 10       |
//! | string            | String: 1, Object: 2, char (len 1): 3, numeric: 4    |
//! | bigint            | integer prims that fit: 2.., double: 4, String: 9    |
//! | script function   | interface: 1                                         |
//! | script object     | interface: 2 if shaped, 12 otherwise; Object: 5      |
//! | script array      | host array: 2, Object: 5                             |
//! | wrapped host obj  | matching class: 0 (nontrivial), Object: 1, String: 2 |
//!
//! The lowest total across the argument tuple wins; ties fall back to the
//! most specific declaring class and then fail as an ambiguous call. A
//! per-context `TypeWrappers` registry is consulted first and may
//! short-circuit with weight 0.

use crate::{
    error::{RunError, RunResult},
    heap::{Heap, HeapId},
    object::{FunctionKind, ObjectData, PropValue, PropertyKey, lookup_property},
    resource::ResourceTracker,
    value::{JsString, Value, bigint_to_f64, string_to_number},
};

use super::{
    HostClassId, HostRegistry, HostType, HostValue, ScriptCallback, ScriptValue, TypeWrappers,
    members::{describe_overloads, type_name},
};

/// Sentinel weight for an impossible conversion.
pub(crate) const WEIGHT_NONE: u32 = u32::MAX;

/// Weight of converting `value` to `target` per the table above.
pub(crate) fn conversion_weight<T: ResourceTracker>(
    value: &Value,
    target: &HostType,
    heap: &Heap<T>,
    registry: &HostRegistry,
    wrappers: &TypeWrappers,
) -> u32 {
    if let Some(weight) = wrappers.weight(&ScriptValue(value.clone()), target) {
        return weight;
    }
    match value {
        Value::Null => match target {
            HostType::String
            | HostType::Any
            | HostType::Class(_)
            | HostType::Interface(_)
            | HostType::Array(_) => 1,
            _ => WEIGHT_NONE,
        },
        Value::Undefined => match target {
            HostType::String | HostType::Any => 1,
            _ => WEIGHT_NONE,
        },
        Value::Bool(_) => match target {
            HostType::Bool => 1,
            HostType::Any => 3,
            _ => WEIGHT_NONE,
        },
        Value::Number(_) => match target {
            HostType::Double => 1,
            HostType::Float => 2,
            HostType::Long => 3,
            HostType::Int => 4,
            HostType::Short => 5,
            HostType::Char => 6,
            HostType::Byte => 7,
            HostType::String => 9,
            HostType::Any => 10,
            _ => WEIGHT_NONE,
        },
        Value::Str(s) => match target {
            HostType::String => 1,
            HostType::Any => 2,
            HostType::Char if s.utf16_len() == 1 => 3,
            HostType::Byte | HostType::Short | HostType::Int | HostType::Long | HostType::Float | HostType::Double => {
                4
            }
            _ => WEIGHT_NONE,
        },
        Value::BigInt(b) => match target {
            HostType::Long => {
                if num_traits::ToPrimitive::to_i64(&**b).is_some() {
                    2
                } else {
                    WEIGHT_NONE
                }
            }
            HostType::Int => {
                if num_traits::ToPrimitive::to_i32(&**b).is_some() {
                    3
                } else {
                    WEIGHT_NONE
                }
            }
            HostType::Double => 4,
            HostType::String => 9,
            HostType::Any => 10,
            _ => WEIGHT_NONE,
        },
        Value::Symbol(_) => match target {
            HostType::Any => 10,
            _ => WEIGHT_NONE,
        },
        Value::Object(id) => object_weight(*id, target, heap, registry),
    }
}

fn object_weight<T: ResourceTracker>(
    id: HeapId,
    target: &HostType,
    heap: &Heap<T>,
    registry: &HostRegistry,
) -> u32 {
    let obj = heap.object(id);
    match &obj.data {
        ObjectData::Host { class, .. } => match target {
            HostType::Class(wanted) => {
                if registry.is_subclass(*class, *wanted) {
                    0
                } else {
                    WEIGHT_NONE
                }
            }
            HostType::Any => 1,
            HostType::String => 2,
            _ => WEIGHT_NONE,
        },
        ObjectData::HostList(_) => match target {
            HostType::Any => 1,
            HostType::String => 2,
            HostType::Array(_) => 3,
            _ => WEIGHT_NONE,
        },
        ObjectData::Function(_) => match target {
            HostType::Interface(_) => 1,
            HostType::Any => 5,
            HostType::String => 9,
            _ => WEIGHT_NONE,
        },
        ObjectData::Array(_) => match target {
            HostType::Array(_) => 2,
            HostType::Any => 5,
            HostType::String => 9,
            HostType::Interface(_) => 12,
            _ => WEIGHT_NONE,
        },
        _ => match target {
            HostType::Interface(iface) => {
                let method_name = registry.interface(*iface).method_name.as_str();
                if object_method(heap, id, method_name).is_some() {
                    2
                } else {
                    12
                }
            }
            HostType::Any => 5,
            HostType::String => 9,
            _ => WEIGHT_NONE,
        },
    }
}

/// Function-valued data property used when adapting an object-shaped value
/// to a single-method interface. Accessors are deliberately not triggered.
fn object_method<T: ResourceTracker>(heap: &Heap<T>, id: HeapId, name: &str) -> Option<Value> {
    let (_, prop) = lookup_property(heap, id, &PropertyKey::str(name))?;
    match prop.value {
        PropValue::Data { value: Value::Object(f), .. } if heap.object(f).is_callable() => Some(Value::Object(f)),
        _ => None,
    }
}

/// Ranks an overload set against an argument tuple, returning the winning
/// candidate index.
///
/// Candidates with a different arity are not applicable. The lowest summed
/// weight wins; equal-weight survivors are compared by declaring-class
/// specificity, and a remaining tie raises the ambiguous-call `TypeError`.
pub(crate) fn select_overload<T: ResourceTracker>(
    class_id: HostClassId,
    name: &str,
    candidates: &[usize],
    args: &[Value],
    heap: &Heap<T>,
    registry: &HostRegistry,
    wrappers: &TypeWrappers,
) -> RunResult<usize> {
    let class = registry.class(class_id);
    let mut best: Vec<usize> = Vec::new();
    let mut best_weight = WEIGHT_NONE;

    for &candidate in candidates {
        let method = &class.methods[candidate];
        if method.params.len() != args.len() {
            continue;
        }
        let mut total = 0u32;
        let mut applicable = true;
        for (arg, param) in args.iter().zip(&method.params) {
            let weight = conversion_weight(arg, param, heap, registry, wrappers);
            if weight == WEIGHT_NONE {
                applicable = false;
                break;
            }
            total += weight;
        }
        if !applicable {
            continue;
        }
        if total < best_weight {
            best_weight = total;
            best = vec![candidate];
        } else if total == best_weight {
            best.push(candidate);
        }
    }

    match best.len() {
        0 => Err(RunError::type_error(format!(
            "Can't find method {}.{name} matching the supplied arguments; overloads are {}",
            class.name,
            describe_overloads(class, candidates)
        ))),
        1 => Ok(best[0]),
        _ => {
            // Prefer the candidate declared in the most specific class.
            let survivors = most_specific(&best, class_id, registry);
            if survivors.len() == 1 {
                Ok(survivors[0])
            } else {
                Err(RunError::type_error(format!(
                    "The choice of method {}.{name} is ambiguous for the supplied arguments; candidates are {}",
                    class.name,
                    describe_overloads(class, &survivors)
                )))
            }
        }
    }
}

fn most_specific(tied: &[usize], class_id: HostClassId, registry: &HostRegistry) -> Vec<usize> {
    let class = registry.class(class_id);
    let mut survivors: Vec<usize> = Vec::new();
    for &candidate in tied {
        let cand_class = class.methods[candidate].declared_in.unwrap_or(class_id);
        let beaten = tied.iter().any(|&other| {
            if other == candidate {
                return false;
            }
            let other_class = class.methods[other].declared_in.unwrap_or(class_id);
            other_class != cand_class && registry.is_subclass(other_class, cand_class)
        });
        if !beaten {
            survivors.push(candidate);
        }
    }
    survivors
}

/// Selects the constructor overload for `new`, same rules as methods.
pub(crate) fn select_ctor<T: ResourceTracker>(
    class_id: HostClassId,
    args: &[Value],
    heap: &Heap<T>,
    registry: &HostRegistry,
    wrappers: &TypeWrappers,
) -> RunResult<usize> {
    let class = registry.class(class_id);
    let mut best = Vec::new();
    let mut best_weight = WEIGHT_NONE;
    for (candidate, ctor) in class.ctors.iter().enumerate() {
        if ctor.params.len() != args.len() {
            continue;
        }
        let mut total = 0u32;
        let mut applicable = true;
        for (arg, param) in args.iter().zip(&ctor.params) {
            let weight = conversion_weight(arg, param, heap, registry, wrappers);
            if weight == WEIGHT_NONE {
                applicable = false;
                break;
            }
            total += weight;
        }
        if !applicable {
            continue;
        }
        if total < best_weight {
            best_weight = total;
            best = vec![candidate];
        } else if total == best_weight {
            best.push(candidate);
        }
    }
    match best.len() {
        0 => Err(RunError::type_error(format!(
            "Can't find a constructor of {} matching the supplied arguments",
            class.name
        ))),
        1 => Ok(best[0]),
        _ => Err(RunError::type_error(format!(
            "The choice of constructor of {} is ambiguous for the supplied arguments",
            class.name
        ))),
    }
}

/// Applies the resolved conversion, producing the host-side value.
///
/// `stringify` renders values for `String` targets; it is supplied by the
/// evaluator because object stringification can run script code.
pub(crate) fn coerce_value<T: ResourceTracker>(
    value: &Value,
    target: &HostType,
    heap: &Heap<T>,
    registry: &HostRegistry,
    wrappers: &TypeWrappers,
    stringify: &dyn Fn(&Value) -> RunResult<JsString>,
) -> RunResult<HostValue> {
    if let Some(wrapped) = wrappers.wrap(&ScriptValue(value.clone()), target) {
        return Ok(wrapped);
    }
    let fail = || {
        RunError::type_error(format!(
            "Cannot convert {} to {}",
            kind_of(value),
            type_name(target)
        ))
    };
    Ok(match target {
        HostType::Bool => match value {
            Value::Bool(b) => HostValue::Bool(*b),
            _ => return Err(fail()),
        },
        HostType::Byte => HostValue::Byte(numeric_arg(value)? as i8),
        HostType::Short => HostValue::Short(numeric_arg(value)? as i16),
        HostType::Int => HostValue::Int(numeric_arg(value)? as i32),
        HostType::Long => HostValue::Long(numeric_arg(value)? as i64),
        HostType::Float => HostValue::Float(numeric_arg(value)? as f32),
        HostType::Double => HostValue::Double(numeric_arg(value)?),
        HostType::Char => match value {
            Value::Str(s) if s.utf16_len() == 1 => HostValue::Char(s.as_str().chars().next().unwrap_or('\0')),
            Value::Number(n) => HostValue::Char(char::from_u32(*n as u32).ok_or_else(fail)?),
            _ => return Err(fail()),
        },
        HostType::String => match value {
            Value::Null => HostValue::Null,
            Value::Undefined => HostValue::Str("undefined".to_owned()),
            other => HostValue::Str(stringify(other)?.as_str().to_owned()),
        },
        HostType::Any => match value {
            Value::Undefined => HostValue::Undefined,
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Number(n) => HostValue::Double(*n),
            Value::Str(s) => HostValue::Str(s.as_str().to_owned()),
            Value::Object(id) => match &heap.object(*id).data {
                ObjectData::Host { class, handle } => HostValue::Object {
                    class: *class,
                    handle: handle.clone(),
                },
                ObjectData::HostList(list) => HostValue::List(list.clone()),
                _ => HostValue::Opaque(ScriptValue(value.clone())),
            },
            _ => HostValue::Opaque(ScriptValue(value.clone())),
        },
        HostType::Class(wanted) => match value {
            Value::Null => HostValue::Null,
            Value::Object(id) => match &heap.object(*id).data {
                ObjectData::Host { class, handle } if registry.is_subclass(*class, *wanted) => HostValue::Object {
                    class: *class,
                    handle: handle.clone(),
                },
                _ => return Err(fail()),
            },
            _ => return Err(fail()),
        },
        HostType::Interface(iface) => match value {
            Value::Null => HostValue::Null,
            Value::Object(id) => {
                let obj = heap.object(*id);
                if obj.is_callable() {
                    HostValue::Callback(ScriptCallback {
                        func: value.clone(),
                        this_val: Value::Undefined,
                    })
                } else {
                    let method_name = registry.interface(*iface).method_name.as_str();
                    let func = object_method(heap, *id, method_name).ok_or_else(fail)?;
                    HostValue::Callback(ScriptCallback {
                        func,
                        this_val: value.clone(),
                    })
                }
            }
            _ => return Err(fail()),
        },
        HostType::Array(element) => match value {
            Value::Null => HostValue::Null,
            Value::Object(id) => match &heap.object(*id).data {
                ObjectData::Array(items) => {
                    let items = items.clone();
                    let mut out = Vec::with_capacity(items.len());
                    for item in &items {
                        out.push(coerce_value(item, element, heap, registry, wrappers, stringify)?);
                    }
                    HostValue::Array(out)
                }
                ObjectData::HostList(list) => {
                    let len = list.borrow().len();
                    let mut out = Vec::with_capacity(len);
                    for index in 0..len {
                        out.push(list.borrow().get(index));
                    }
                    HostValue::Array(out)
                }
                _ => return Err(fail()),
            },
            _ => return Err(fail()),
        },
    })
}

/// Numeric value for primitive-target coercion: numbers pass through,
/// strings re-parse, booleans widen.
fn numeric_arg(value: &Value) -> RunResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Str(s) => Ok(string_to_number(s.as_str())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::BigInt(b) => Ok(bigint_to_f64(b)),
        _ => Err(RunError::type_error("Cannot convert value to a number")),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Str(_) => "string",
        Value::BigInt(_) => "bigint",
        Value::Symbol(_) => "symbol",
        Value::Object(_) => "object",
    }
}

/// Checks host-object membership for `instanceof` against a host
/// constructor.
pub(crate) fn host_instance_of<T: ResourceTracker>(
    heap: &Heap<T>,
    value: &Value,
    class: HostClassId,
    registry: &HostRegistry,
) -> bool {
    match value {
        Value::Object(id) => match &heap.object(*id).data {
            ObjectData::Host { class: actual, .. } => registry.is_subclass(*actual, class),
            _ => false,
        },
        _ => false,
    }
}

/// Used by `FunctionKind` consumers to recognize host functions when
/// rendering stack frames and `toString`.
pub(crate) fn is_host_function(kind: &FunctionKind) -> bool {
    matches!(kind, FunctionKind::HostMethod { .. } | FunctionKind::HostCtor { .. })
}
