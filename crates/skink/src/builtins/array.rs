//! The `Array` constructor and prototype.
//!
//! The same natives also serve host-list wrappers: every function reads its
//! receiver through [`elements_of`] and mutators write back through
//! [`write_back`], so `push`, `splice`, `map` and the rest behave
//! identically over script arrays and live host lists.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::{IterMode, IterState, ObjectData, PropertyKey},
    resource::ResourceTracker,
    value::{SYM_IS_CONCAT_SPREADABLE, SYM_ITERATOR, Value, strict_equals},
};

use super::{NativeFn, arg, define_ctor, define_method, define_symbol_method, iter::new_iterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayFn {
    Ctor,
    IsArray,
    Of,
    From,
    Push,
    Pop,
    Shift,
    Unshift,
    Slice,
    Splice,
    Concat,
    Join,
    Reverse,
    IndexOf,
    LastIndexOf,
    Includes,
    Map,
    Filter,
    ForEach,
    Reduce,
    ReduceRight,
    Every,
    Some,
    Find,
    FindIndex,
    FindLast,
    FindLastIndex,
    Keys,
    Values,
    Entries,
    Sort,
    ToString,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().array_proto;
    let list_proto = cx.realm_ref().host_list_proto;
    for target in [proto, list_proto] {
        define_method(cx, target, "push", NativeFn::Array(ArrayFn::Push), 1)?;
        define_method(cx, target, "pop", NativeFn::Array(ArrayFn::Pop), 0)?;
        define_method(cx, target, "shift", NativeFn::Array(ArrayFn::Shift), 0)?;
        define_method(cx, target, "unshift", NativeFn::Array(ArrayFn::Unshift), 1)?;
        define_method(cx, target, "slice", NativeFn::Array(ArrayFn::Slice), 2)?;
        define_method(cx, target, "splice", NativeFn::Array(ArrayFn::Splice), 2)?;
        define_method(cx, target, "concat", NativeFn::Array(ArrayFn::Concat), 1)?;
        define_method(cx, target, "join", NativeFn::Array(ArrayFn::Join), 1)?;
        define_method(cx, target, "reverse", NativeFn::Array(ArrayFn::Reverse), 0)?;
        define_method(cx, target, "indexOf", NativeFn::Array(ArrayFn::IndexOf), 1)?;
        define_method(cx, target, "lastIndexOf", NativeFn::Array(ArrayFn::LastIndexOf), 1)?;
        define_method(cx, target, "includes", NativeFn::Array(ArrayFn::Includes), 1)?;
        define_method(cx, target, "map", NativeFn::Array(ArrayFn::Map), 1)?;
        define_method(cx, target, "filter", NativeFn::Array(ArrayFn::Filter), 1)?;
        define_method(cx, target, "forEach", NativeFn::Array(ArrayFn::ForEach), 1)?;
        define_method(cx, target, "reduce", NativeFn::Array(ArrayFn::Reduce), 1)?;
        define_method(cx, target, "reduceRight", NativeFn::Array(ArrayFn::ReduceRight), 1)?;
        define_method(cx, target, "every", NativeFn::Array(ArrayFn::Every), 1)?;
        define_method(cx, target, "some", NativeFn::Array(ArrayFn::Some), 1)?;
        define_method(cx, target, "find", NativeFn::Array(ArrayFn::Find), 1)?;
        define_method(cx, target, "findIndex", NativeFn::Array(ArrayFn::FindIndex), 1)?;
        define_method(cx, target, "findLast", NativeFn::Array(ArrayFn::FindLast), 1)?;
        define_method(cx, target, "findLastIndex", NativeFn::Array(ArrayFn::FindLastIndex), 1)?;
        define_method(cx, target, "keys", NativeFn::Array(ArrayFn::Keys), 0)?;
        define_method(cx, target, "values", NativeFn::Array(ArrayFn::Values), 0)?;
        define_method(cx, target, "entries", NativeFn::Array(ArrayFn::Entries), 0)?;
        define_method(cx, target, "sort", NativeFn::Array(ArrayFn::Sort), 1)?;
        define_method(cx, target, "toString", NativeFn::Array(ArrayFn::ToString), 0)?;
        define_symbol_method(cx, target, SYM_ITERATOR, "values", NativeFn::Array(ArrayFn::Values))?;
    }

    let ctor = define_ctor(cx, global, "Array", NativeFn::Array(ArrayFn::Ctor), 1, proto)?;
    define_method(cx, ctor, "isArray", NativeFn::Array(ArrayFn::IsArray), 1)?;
    define_method(cx, ctor, "of", NativeFn::Array(ArrayFn::Of), 0)?;
    define_method(cx, ctor, "from", NativeFn::Array(ArrayFn::From), 1)?;
    Ok(())
}

/// Snapshot of the receiver's elements; works for arrays and host lists.
fn elements_of<T: ResourceTracker>(cx: &mut Context<T>, this: &Value) -> RunResult<Vec<Value>> {
    let Value::Object(id) = this else {
        return Err(cx.type_error("Array method called on a non-array"));
    };
    match &cx.heap.object(*id).data {
        ObjectData::Array(elements) => Ok(elements.clone()),
        ObjectData::HostList(list) => {
            let list = list.clone();
            let len = list.borrow().len();
            let mut out = Vec::with_capacity(len);
            for index in 0..len {
                let hv = list.borrow().get(index);
                out.push(cx.host_value_to_script(hv)?);
            }
            Ok(out)
        }
        _ => Err(cx.type_error("Array method called on a non-array")),
    }
}

/// Writes a full element list back into the receiver.
fn write_back<T: ResourceTracker>(cx: &mut Context<T>, this: &Value, elements: Vec<Value>) -> RunResult<()> {
    let Value::Object(id) = this else {
        return Err(cx.type_error("Array method called on a non-array"));
    };
    match &cx.heap.object(*id).data {
        ObjectData::Array(_) => {
            if let ObjectData::Array(slot) = &mut cx.heap.object_mut(*id).data {
                *slot = elements;
            }
            Ok(())
        }
        ObjectData::HostList(list) => {
            let list = list.clone();
            let mut host_values = Vec::with_capacity(elements.len());
            for element in &elements {
                host_values.push(cx.script_to_any_host_value(element)?);
            }
            let mut borrowed = list.borrow_mut();
            while borrowed.len() > 0 {
                let last = borrowed.len() - 1;
                borrowed.remove(last);
            }
            for (index, hv) in host_values.into_iter().enumerate() {
                borrowed.insert(index, hv);
            }
            Ok(())
        }
        _ => Err(cx.type_error("Array method called on a non-array")),
    }
}

fn norm_index(len: usize, relative: f64) -> usize {
    if relative.is_nan() {
        return 0;
    }
    if relative < 0.0 {
        let back = (-relative) as usize;
        len.saturating_sub(back)
    } else {
        (relative as usize).min(len)
    }
}

fn callback_arg<T: ResourceTracker>(cx: &mut Context<T>, args: &[Value]) -> RunResult<Value> {
    let callback = arg(args, 0);
    match &callback {
        Value::Object(id) if cx.heap.object(*id).is_callable() => Ok(callback),
        _ => Err(cx.type_error("callback is not a function")),
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: ArrayFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    let _ = construct;
    match f {
        ArrayFn::Ctor => {
            // `Array(3)` makes a hole-free array of three undefineds;
            // anything else treats the arguments as elements.
            if args.len() == 1 {
                if let Value::Number(n) = &args[0] {
                    if n.fract() != 0.0 || *n < 0.0 || *n > f64::from(u32::MAX) {
                        return Err(cx.range_error("Invalid array length"));
                    }
                    return cx.new_array(vec![Value::Undefined; *n as usize]);
                }
            }
            cx.new_array(args.to_vec())
        }
        ArrayFn::IsArray => Ok(Value::bool(matches!(
            arg(args, 0),
            Value::Object(id) if matches!(cx.heap.object(id).data, ObjectData::Array(_))
        ))),
        ArrayFn::Of => cx.new_array(args.to_vec()),
        ArrayFn::From => {
            let source = arg(args, 0);
            let mut items = Vec::new();
            let iterator = cx.get_iterator(&source)?;
            while let Some(item) = cx.iterator_next(&iterator)? {
                items.push(item);
            }
            if let Value::Object(id) = arg(args, 1) {
                if cx.heap.object(id).is_callable() {
                    let mapper = Value::Object(id);
                    let mut mapped = Vec::with_capacity(items.len());
                    for (index, item) in items.into_iter().enumerate() {
                        mapped.push(cx.call_value(&mapper, Value::Undefined, vec![item, Value::number(index as f64)])?);
                    }
                    return cx.new_array(mapped);
                }
            }
            cx.new_array(items)
        }
        ArrayFn::Push => {
            let mut elements = elements_of(cx, this)?;
            elements.extend(args.iter().cloned());
            let len = elements.len();
            write_back(cx, this, elements)?;
            Ok(Value::number(len as f64))
        }
        ArrayFn::Pop => {
            let mut elements = elements_of(cx, this)?;
            let popped = elements.pop().unwrap_or(Value::Undefined);
            write_back(cx, this, elements)?;
            Ok(popped)
        }
        ArrayFn::Shift => {
            let mut elements = elements_of(cx, this)?;
            let shifted = if elements.is_empty() {
                Value::Undefined
            } else {
                elements.remove(0)
            };
            write_back(cx, this, elements)?;
            Ok(shifted)
        }
        ArrayFn::Unshift => {
            let mut elements = elements_of(cx, this)?;
            for (offset, value) in args.iter().enumerate() {
                elements.insert(offset, value.clone());
            }
            let len = elements.len();
            write_back(cx, this, elements)?;
            Ok(Value::number(len as f64))
        }
        ArrayFn::Slice => {
            let elements = elements_of(cx, this)?;
            let len = elements.len();
            let start = norm_index(len, cx.to_number_value(&arg(args, 0))?);
            let end = match arg(args, 1) {
                Value::Undefined => len,
                other => norm_index(len, cx.to_number_value(&other)?),
            };
            let out = if start < end {
                elements[start..end].to_vec()
            } else {
                Vec::new()
            };
            cx.new_array(out)
        }
        ArrayFn::Splice => {
            let mut elements = elements_of(cx, this)?;
            let len = elements.len();
            let start = norm_index(len, cx.to_number_value(&arg(args, 0))?);
            let delete_count = match arg(args, 1) {
                Value::Undefined if args.len() <= 1 => len - start,
                other => (cx.to_number_value(&other)?.max(0.0) as usize).min(len - start),
            };
            let removed: Vec<Value> = elements.splice(start..start + delete_count, args.iter().skip(2).cloned()).collect();
            write_back(cx, this, elements)?;
            cx.new_array(removed)
        }
        ArrayFn::Concat => {
            let mut out = elements_of(cx, this)?;
            for extra in args {
                if is_concat_spreadable(cx, extra)? {
                    out.extend(elements_of(cx, extra)?);
                } else {
                    out.push(extra.clone());
                }
            }
            cx.new_array(out)
        }
        ArrayFn::Join => {
            let elements = elements_of(cx, this)?;
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_owned(),
                other => cx.to_js_string(&other)?.as_str().to_owned(),
            };
            let mut out = String::new();
            for (index, element) in elements.iter().enumerate() {
                if index > 0 {
                    out.push_str(&separator);
                }
                if !element.is_nullish() {
                    let rendered = cx.to_js_string(element)?;
                    out.push_str(rendered.as_str());
                }
            }
            Ok(Value::str(out))
        }
        ArrayFn::Reverse => {
            let mut elements = elements_of(cx, this)?;
            elements.reverse();
            write_back(cx, this, elements)?;
            Ok(this.clone())
        }
        ArrayFn::IndexOf => {
            let elements = elements_of(cx, this)?;
            let needle = arg(args, 0);
            let position = elements.iter().position(|e| strict_equals(e, &needle));
            Ok(Value::number(position.map_or(-1.0, |i| i as f64)))
        }
        ArrayFn::LastIndexOf => {
            let elements = elements_of(cx, this)?;
            let needle = arg(args, 0);
            let position = elements.iter().rposition(|e| strict_equals(e, &needle));
            Ok(Value::number(position.map_or(-1.0, |i| i as f64)))
        }
        ArrayFn::Includes => {
            let elements = elements_of(cx, this)?;
            let needle = arg(args, 0);
            Ok(Value::bool(
                elements.iter().any(|e| crate::value::same_value_zero(e, &needle)),
            ))
        }
        ArrayFn::Map => {
            let elements = elements_of(cx, this)?;
            let callback = callback_arg(cx, args)?;
            let this_arg = arg(args, 1);
            let mut out = Vec::with_capacity(elements.len());
            for (index, element) in elements.into_iter().enumerate() {
                out.push(cx.call_value(
                    &callback,
                    this_arg.clone(),
                    vec![element, Value::number(index as f64), this.clone()],
                )?);
            }
            cx.new_array(out)
        }
        ArrayFn::Filter => {
            let elements = elements_of(cx, this)?;
            let callback = callback_arg(cx, args)?;
            let this_arg = arg(args, 1);
            let mut out = Vec::new();
            for (index, element) in elements.into_iter().enumerate() {
                let keep = cx.call_value(
                    &callback,
                    this_arg.clone(),
                    vec![element.clone(), Value::number(index as f64), this.clone()],
                )?;
                if keep.to_boolean() {
                    out.push(element);
                }
            }
            cx.new_array(out)
        }
        ArrayFn::ForEach => {
            let elements = elements_of(cx, this)?;
            let callback = callback_arg(cx, args)?;
            let this_arg = arg(args, 1);
            for (index, element) in elements.into_iter().enumerate() {
                cx.call_value(
                    &callback,
                    this_arg.clone(),
                    vec![element, Value::number(index as f64), this.clone()],
                )?;
            }
            Ok(Value::Undefined)
        }
        ArrayFn::Reduce | ArrayFn::ReduceRight => {
            let mut elements = elements_of(cx, this)?;
            if f == ArrayFn::ReduceRight {
                elements.reverse();
            }
            let callback = callback_arg(cx, args)?;
            let mut iter = elements.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => return Err(cx.type_error("Reduce of empty array with no initial value")),
                },
            };
            for (index, element) in iter {
                acc = cx.call_value(
                    &callback,
                    Value::Undefined,
                    vec![acc, element, Value::number(index as f64), this.clone()],
                )?;
            }
            Ok(acc)
        }
        ArrayFn::Every | ArrayFn::Some => {
            let elements = elements_of(cx, this)?;
            let callback = callback_arg(cx, args)?;
            let want_all = f == ArrayFn::Every;
            for (index, element) in elements.into_iter().enumerate() {
                let outcome = cx
                    .call_value(
                        &callback,
                        Value::Undefined,
                        vec![element, Value::number(index as f64), this.clone()],
                    )?
                    .to_boolean();
                if want_all && !outcome {
                    return Ok(Value::bool(false));
                }
                if !want_all && outcome {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(want_all))
        }
        ArrayFn::Find | ArrayFn::FindIndex | ArrayFn::FindLast | ArrayFn::FindLastIndex => {
            let elements = elements_of(cx, this)?;
            let callback = callback_arg(cx, args)?;
            let backwards = matches!(f, ArrayFn::FindLast | ArrayFn::FindLastIndex);
            let want_index = matches!(f, ArrayFn::FindIndex | ArrayFn::FindLastIndex);
            let len = elements.len();
            let order: Vec<usize> = if backwards { (0..len).rev().collect() } else { (0..len).collect() };
            for index in order {
                let element = elements[index].clone();
                let hit = cx
                    .call_value(
                        &callback,
                        Value::Undefined,
                        vec![element.clone(), Value::number(index as f64), this.clone()],
                    )?
                    .to_boolean();
                if hit {
                    return Ok(if want_index {
                        Value::number(index as f64)
                    } else {
                        element
                    });
                }
            }
            Ok(if want_index { Value::number(-1.0) } else { Value::Undefined })
        }
        ArrayFn::Keys | ArrayFn::Values | ArrayFn::Entries => {
            let Value::Object(id) = this else {
                return Err(cx.type_error("Array iterator on a non-array"));
            };
            let mode = match f {
                ArrayFn::Keys => IterMode::Keys,
                ArrayFn::Values => IterMode::Values,
                _ => IterMode::Entries,
            };
            new_iterator(
                cx,
                IterState::Array {
                    target: *id,
                    index: 0,
                    mode,
                },
            )
        }
        ArrayFn::Sort => {
            let mut elements = elements_of(cx, this)?;
            let comparator = args.first().cloned().filter(|c| !c.is_nullish());
            // Insertion sort so the comparator can re-enter the evaluator.
            for i in 1..elements.len() {
                let mut j = i;
                while j > 0 {
                    let ordered = sort_le(cx, &comparator, &elements[j - 1], &elements[j])?;
                    if ordered {
                        break;
                    }
                    elements.swap(j - 1, j);
                    j -= 1;
                }
            }
            write_back(cx, this, elements)?;
            Ok(this.clone())
        }
        ArrayFn::ToString => {
            let elements = elements_of(cx, this)?;
            let mut out = String::new();
            for (index, element) in elements.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                if !element.is_nullish() {
                    let rendered = cx.to_js_string(element)?;
                    out.push_str(rendered.as_str());
                }
            }
            Ok(Value::str(out))
        }
    }
}

/// `a <= b` under the sort order: custom comparator or default string
/// comparison, with undefineds last.
fn sort_le<T: ResourceTracker>(
    cx: &mut Context<T>,
    comparator: &Option<Value>,
    a: &Value,
    b: &Value,
) -> RunResult<bool> {
    if matches!(b, Value::Undefined) {
        return Ok(true);
    }
    if matches!(a, Value::Undefined) {
        return Ok(false);
    }
    match comparator {
        Some(callback) => {
            let ordering = cx.call_value(callback, Value::Undefined, vec![a.clone(), b.clone()])?;
            Ok(cx.to_number_value(&ordering)? <= 0.0)
        }
        None => {
            let a = cx.to_js_string(a)?;
            let b = cx.to_js_string(b)?;
            Ok(a.as_str() <= b.as_str())
        }
    }
}

/// `Symbol.isConcatSpreadable` overrides the default array/list spreading.
fn is_concat_spreadable<T: ResourceTracker>(cx: &mut Context<T>, value: &Value) -> RunResult<bool> {
    let Value::Object(id) = value else {
        return Ok(false);
    };
    let flag = cx.get_member(value, &PropertyKey::Sym(SYM_IS_CONCAT_SPREADABLE))?;
    if !matches!(flag, Value::Undefined) {
        return Ok(flag.to_boolean());
    }
    Ok(matches!(
        cx.heap.object(*id).data,
        ObjectData::Array(_) | ObjectData::HostList(_)
    ))
}
