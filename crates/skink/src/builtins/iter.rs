//! The shared iterator prototype.
//!
//! Every built-in iterator object (array, string, Map/Set, wrapped host
//! iterators) carries an [`IterState`] and delegates `next`, `return`, and
//! `@@iterator` to the single prototype installed here.

use crate::{
    context::Context,
    error::RunResult,
    object::{IterMode, IterState, JsObject, ObjectData},
    resource::ResourceTracker,
    value::{SYM_ITERATOR, Value},
};

use super::{NativeFn, define_method, define_symbol_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterFn {
    Next,
    /// `return()`: closes the iterator and reports done.
    Close,
    /// `@@iterator` on iterators returns the receiver.
    ReturnThis,
    /// `@@iterator` on host-iterable wrappers: starts a fresh pass.
    HostIterableIterator,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>) -> RunResult<()> {
    let proto = cx.realm_ref().iterator_proto;
    define_method(cx, proto, "next", NativeFn::Iter(IterFn::Next), 0)?;
    define_method(cx, proto, "return", NativeFn::Iter(IterFn::Close), 0)?;
    define_symbol_method(cx, proto, SYM_ITERATOR, "[Symbol.iterator]", NativeFn::Iter(IterFn::ReturnThis))?;
    Ok(())
}

/// Allocates an iterator object with the given state.
pub(crate) fn new_iterator<T: ResourceTracker>(cx: &mut Context<T>, state: IterState) -> RunResult<Value> {
    let proto = cx.realm_ref().iterator_proto;
    let obj = JsObject::with_data(Some(proto), "Iterator", ObjectData::Iter(state));
    Ok(Value::Object(cx.heap.alloc_object(obj)?))
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: IterFn,
    this: &Value,
    _args: &[Value],
) -> RunResult<Value> {
    match f {
        IterFn::ReturnThis => Ok(this.clone()),
        IterFn::HostIterableIterator => {
            let Value::Object(id) = this else {
                return Err(cx.type_error("@@iterator called on a non-iterable"));
            };
            let iterator = match &cx.heap.object(*id).data {
                ObjectData::HostIterable(iterable) => iterable.iterator(),
                _ => return Err(cx.type_error("@@iterator called on a non-iterable")),
            };
            new_iterator(cx, IterState::Host(iterator))
        }
        IterFn::Close => {
            if let Value::Object(id) = this {
                if let ObjectData::Iter(state) = &mut cx.heap.object_mut(*id).data {
                    *state = IterState::Done;
                }
            }
            cx.iter_result(Value::Undefined, true)
        }
        IterFn::Next => {
            let Value::Object(id) = this else {
                return Err(cx.type_error("next called on a non-iterator"));
            };
            let id = *id;
            let step = advance(cx, id)?;
            match step {
                Some(value) => cx.iter_result(value, false),
                None => cx.iter_result(Value::Undefined, true),
            }
        }
    }
}

/// Advances an iterator object one step, returning the produced value.
///
/// State that needs further heap access (array indexing, map cursors) is
/// snapshotted out of the iterator first so the borrows stay disjoint.
fn advance<T: ResourceTracker>(cx: &mut Context<T>, id: crate::heap::HeapId) -> RunResult<Option<Value>> {
    enum Step {
        Done,
        Yield(Value),
        ArrayAt {
            target: crate::heap::HeapId,
            index: u32,
            mode: IterMode,
        },
        MapStep {
            target: crate::heap::HeapId,
            cursor: crate::linked_map::MapCursor,
            mode: IterMode,
        },
        HostValue(crate::host::HostValue),
    }

    let step = {
        let obj = cx.heap.object_mut(id);
        let ObjectData::Iter(state) = &mut obj.data else {
            return Err(RunErrorHelper::not_iterator());
        };
        match state {
            IterState::Done => Step::Done,
            IterState::Array { target, index, mode } => {
                let step = Step::ArrayAt {
                    target: *target,
                    index: *index,
                    mode: *mode,
                };
                *index += 1;
                step
            }
            IterState::Str { string, index } => {
                // String iteration yields whole code points, consuming two
                // units for a surrogate pair.
                match string.code_unit_at(*index) {
                    None => {
                        *state = IterState::Done;
                        Step::Done
                    }
                    Some(unit) => {
                        let width = if (0xD800..0xDC00).contains(&unit)
                            && string
                                .code_unit_at(*index + 1)
                                .is_some_and(|low| (0xDC00..0xE000).contains(&low))
                        {
                            2
                        } else {
                            1
                        };
                        let chunk = string.utf16_slice(*index, *index + width);
                        *index += width;
                        Step::Yield(Value::Str(chunk))
                    }
                }
            }
            IterState::Map { target, cursor, mode } => Step::MapStep {
                target: *target,
                cursor: *cursor,
                mode: *mode,
            },
            IterState::Host(iterator) => match iterator.next_value() {
                Some(hv) => Step::HostValue(hv),
                None => {
                    *state = IterState::Done;
                    Step::Done
                }
            },
        }
    };

    match step {
        Step::Done => Ok(None),
        Step::Yield(value) => Ok(Some(value)),
        Step::ArrayAt { target, index, mode } => {
            let len = array_like_len(cx, target)?;
            if u64::from(index) >= len {
                if let ObjectData::Iter(state) = &mut cx.heap.object_mut(id).data {
                    *state = IterState::Done;
                }
                return Ok(None);
            }
            let element = cx.get_member(
                &Value::Object(target),
                &crate::object::PropertyKey::str(index.to_string()),
            )?;
            Ok(Some(match mode {
                IterMode::Keys => Value::number(f64::from(index)),
                IterMode::Values => element,
                IterMode::Entries => {
                    let pair = vec![Value::number(f64::from(index)), element];
                    cx.new_array(pair)?
                }
            }))
        }
        Step::MapStep { target, mut cursor, mode } => {
            let entry = {
                let map = match &cx.heap.object(target).data {
                    ObjectData::Map(map) | ObjectData::Set(map) => map,
                    _ => return Err(RunErrorHelper::not_iterator()),
                };
                map.advance(&mut cursor)
            };
            if let ObjectData::Iter(IterState::Map { cursor: saved, .. }) = &mut cx.heap.object_mut(id).data {
                *saved = cursor;
            }
            match entry {
                Some((key, value)) => Ok(Some(match mode {
                    IterMode::Keys => key,
                    IterMode::Values => value,
                    IterMode::Entries => cx.new_array(vec![key, value])?,
                })),
                None => Ok(None),
            }
        }
        Step::HostValue(hv) => Ok(Some(cx.host_value_to_script(hv)?)),
    }
}

fn array_like_len<T: ResourceTracker>(cx: &Context<T>, target: crate::heap::HeapId) -> RunResult<u64> {
    Ok(match &cx.heap.object(target).data {
        ObjectData::Array(elements) => elements.len() as u64,
        ObjectData::HostList(list) => list.borrow().len() as u64,
        _ => 0,
    })
}

struct RunErrorHelper;

impl RunErrorHelper {
    fn not_iterator() -> crate::error::RunError {
        crate::error::RunError::type_error("iterator state is corrupt")
    }
}
