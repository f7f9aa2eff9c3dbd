//! `RegExp` over the fancy-regex engine.
//!
//! The engine is treated as a black box with ECMA-flavored semantics:
//! patterns pass through mostly verbatim, `i`/`m`/`s` flags translate to
//! inline flags, and `g`/`y` drive `lastIndex` bookkeeping here.

use std::rc::Rc;

use crate::{
    context::Context,
    error::{ErrorKind, RunResult},
    heap::HeapId,
    object::{JsObject, ObjectData, RegExpData},
    resource::ResourceTracker,
    value::{JsString, Value},
};

use super::{NativeFn, arg, define_ctor, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegExpFn {
    Ctor,
    ProtoTest,
    ProtoExec,
    ProtoToString,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let proto = cx.realm_ref().regexp_proto;
    define_method(cx, proto, "test", NativeFn::RegExp(RegExpFn::ProtoTest), 1)?;
    define_method(cx, proto, "exec", NativeFn::RegExp(RegExpFn::ProtoExec), 1)?;
    define_method(cx, proto, "toString", NativeFn::RegExp(RegExpFn::ProtoToString), 0)?;
    define_ctor(cx, global, "RegExp", NativeFn::RegExp(RegExpFn::Ctor), 2, proto)?;
    Ok(())
}

/// Compiles a regex literal or constructor call into a RegExp object.
pub(crate) fn create_regexp<T: ResourceTracker>(cx: &mut Context<T>, source: &str, flags: &str) -> RunResult<Value> {
    for flag in flags.chars() {
        if !matches!(flag, 'g' | 'i' | 'm' | 's' | 'u' | 'y') {
            return Err(cx.raise(
                ErrorKind::Syntax,
                format!("Invalid regular expression flag \"{flag}\""),
            ));
        }
    }
    let mut translated = String::new();
    let mut inline = String::new();
    if flags.contains('i') {
        inline.push('i');
    }
    if flags.contains('m') {
        inline.push('m');
    }
    if flags.contains('s') {
        inline.push('s');
    }
    if !inline.is_empty() {
        translated.push_str(&format!("(?{inline})"));
    }
    translated.push_str(source);
    let regex = fancy_regex::Regex::new(&translated)
        .map_err(|e| cx.raise(ErrorKind::Syntax, format!("Invalid regular expression: {e}")))?;
    let proto = cx.realm_ref().regexp_proto;
    let data = RegExpData {
        source: Rc::from(source),
        flags: Rc::from(flags),
        regex,
        global: flags.contains('g') || flags.contains('y'),
        last_index: 0,
    };
    let obj = JsObject::with_data(Some(proto), "RegExp", ObjectData::RegExp(data));
    Ok(Value::Object(cx.heap.alloc_object(obj)?))
}

fn regexp_parts<T: ResourceTracker>(
    cx: &mut Context<T>,
    id: HeapId,
) -> RunResult<(fancy_regex::Regex, bool, usize)> {
    match &cx.heap.object(id).data {
        ObjectData::RegExp(data) => Ok((data.regex.clone(), data.global, data.last_index)),
        _ => Err(cx.type_error("RegExp method called on an incompatible receiver")),
    }
}

fn set_last_index<T: ResourceTracker>(cx: &mut Context<T>, id: HeapId, index: usize) {
    if let ObjectData::RegExp(data) = &mut cx.heap.object_mut(id).data {
        data.last_index = index;
    }
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: RegExpFn,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    let _ = construct;
    match f {
        RegExpFn::Ctor => {
            let pattern = arg(args, 0);
            if let Value::Object(id) = &pattern {
                if let ObjectData::RegExp(data) = &cx.heap.object(*id).data {
                    let source = data.source.to_string();
                    let flags = data.flags.to_string();
                    return create_regexp(cx, &source, &flags);
                }
            }
            let source = match &pattern {
                Value::Undefined => String::new(),
                other => cx.to_js_string(other)?.as_str().to_owned(),
            };
            let flags = match arg(args, 1) {
                Value::Undefined => String::new(),
                other => cx.to_js_string(&other)?.as_str().to_owned(),
            };
            create_regexp(cx, &source, &flags)
        }
        RegExpFn::ProtoTest => {
            let result = dispatch(cx, RegExpFn::ProtoExec, this, args, false)?;
            Ok(Value::bool(!matches!(result, Value::Null)))
        }
        RegExpFn::ProtoExec => {
            let Value::Object(id) = this else {
                return Err(cx.type_error("exec called on an incompatible receiver"));
            };
            let id = *id;
            let (regex, global, last_index) = regexp_parts(cx, id)?;
            let text = cx.to_js_string(&arg(args, 0))?;
            let start = if global { last_index } else { 0 };
            if start > text.as_str().len() {
                set_last_index(cx, id, 0);
                return Ok(Value::Null);
            }
            let found = regex
                .captures_from_pos(text.as_str(), start)
                .map_err(|e| cx.raise(ErrorKind::Evaluator, format!("regex backtracking failed: {e}")))?;
            let Some(captures) = found else {
                if global {
                    set_last_index(cx, id, 0);
                }
                return Ok(Value::Null);
            };
            let whole = captures.get(0).expect("capture 0 always present");
            if global {
                set_last_index(cx, id, whole.end().max(whole.start() + 1));
            }
            build_match_array(cx, &text, &captures)
        }
        RegExpFn::ProtoToString => {
            let Value::Object(id) = this else {
                return Err(cx.type_error("toString called on an incompatible receiver"));
            };
            match &cx.heap.object(*id).data {
                ObjectData::RegExp(data) => Ok(Value::str(format!("/{}/{}", data.source, data.flags))),
                _ => Err(cx.type_error("toString called on an incompatible receiver")),
            }
        }
    }
}

/// The exec result: a match array with `index` and `input` properties.
fn build_match_array<T: ResourceTracker>(
    cx: &mut Context<T>,
    text: &JsString,
    captures: &fancy_regex::Captures<'_>,
) -> RunResult<Value> {
    let mut elements = Vec::with_capacity(captures.len());
    for group in 0..captures.len() {
        elements.push(match captures.get(group) {
            Some(m) => Value::str(m.as_str()),
            None => Value::Undefined,
        });
    }
    let whole = captures.get(0).expect("capture 0 always present");
    let index = text.byte_to_utf16_index(whole.start());
    let array = cx.new_array(elements)?;
    if let Value::Object(id) = &array {
        cx.heap
            .object_mut(*id)
            .define_data("index", Value::number(index as f64));
        cx.heap.object_mut(*id).define_data("input", Value::Str(text.clone()));
    }
    Ok(array)
}

/// `String.prototype.match` support.
pub(crate) fn match_with_regexp<T: ResourceTracker>(
    cx: &mut Context<T>,
    text: &JsString,
    regexp: HeapId,
) -> RunResult<Value> {
    let (regex, global, _) = regexp_parts(cx, regexp)?;
    if !global {
        let this = Value::Object(regexp);
        return dispatch(cx, RegExpFn::ProtoExec, &this, &[Value::Str(text.clone())], false);
    }
    let mut matches = Vec::new();
    let mut pos = 0;
    while let Ok(Some(found)) = regex.find_from_pos(text.as_str(), pos) {
        matches.push(Value::str(found.as_str()));
        pos = if found.end() > found.start() { found.end() } else { found.end() + 1 };
        if pos > text.as_str().len() {
            break;
        }
    }
    set_last_index(cx, regexp, 0);
    if matches.is_empty() {
        return Ok(Value::Null);
    }
    cx.new_array(matches)
}

/// `String.prototype.replace`/`replaceAll` with a RegExp pattern.
///
/// Replacement strings honor `$&` and `$1`-style group references; function
/// replacers are invoked per match.
pub(crate) fn replace_with_regexp<T: ResourceTracker>(
    cx: &mut Context<T>,
    text: &JsString,
    regexp: HeapId,
    replacement: &Value,
    force_all: bool,
) -> RunResult<Value> {
    let (regex, global, _) = regexp_parts(cx, regexp)?;
    let all = global || force_all;
    let source = text.as_str();
    let mut out = String::new();
    let mut pos = 0;
    loop {
        let captures = regex
            .captures_from_pos(source, pos)
            .map_err(|e| cx.raise(ErrorKind::Evaluator, format!("regex backtracking failed: {e}")))?;
        let Some(captures) = captures else { break };
        let whole = captures.get(0).expect("capture 0 always present");
        out.push_str(&source[pos..whole.start()]);

        let replacer_is_fn = matches!(replacement, Value::Object(id) if cx.heap.object(*id).is_callable());
        if replacer_is_fn {
            let mut call_args: Vec<Value> = Vec::with_capacity(captures.len() + 2);
            for group in 0..captures.len() {
                call_args.push(match captures.get(group) {
                    Some(m) => Value::str(m.as_str()),
                    None => Value::Undefined,
                });
            }
            call_args.push(Value::number(text.byte_to_utf16_index(whole.start()) as f64));
            call_args.push(Value::Str(text.clone()));
            let replaced = cx.call_value(replacement, Value::Undefined, call_args)?;
            let rendered = cx.to_js_string(&replaced)?;
            out.push_str(rendered.as_str());
        } else {
            let template = cx.to_js_string(replacement)?;
            out.push_str(&expand_replacement(template.as_str(), &captures));
        }

        pos = if whole.end() > whole.start() {
            whole.end()
        } else {
            // Zero-length match: copy one unit forward to guarantee progress.
            if whole.end() < source.len() {
                let next = source[whole.end()..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&source[whole.end()..whole.end() + next]);
                whole.end() + next
            } else {
                whole.end() + 1
            }
        };
        if !all || pos > source.len() {
            break;
        }
    }
    if pos <= source.len() {
        out.push_str(&source[pos.min(source.len())..]);
    }
    set_last_index(cx, regexp, 0);
    Ok(Value::str(out))
}

/// `String.prototype.split` with a RegExp separator.
pub(crate) fn split_with_regexp<T: ResourceTracker>(
    cx: &mut Context<T>,
    text: &JsString,
    regexp: HeapId,
) -> RunResult<Value> {
    let (regex, _, _) = regexp_parts(cx, regexp)?;
    let source = text.as_str();
    let mut parts = Vec::new();
    let mut pos = 0;
    while let Ok(Some(found)) = regex.find_from_pos(source, pos) {
        if found.end() == found.start() && found.start() == pos {
            // Zero-length match at the cursor: step forward instead of
            // looping.
            if pos >= source.len() {
                break;
            }
            pos += source[pos..].chars().next().map_or(1, char::len_utf8);
            continue;
        }
        parts.push(Value::str(&source[pos..found.start()]));
        pos = found.end();
    }
    parts.push(Value::str(&source[pos.min(source.len())..]));
    cx.new_array(parts)
}

fn expand_replacement(template: &str, captures: &fancy_regex::Captures<'_>) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                if let Some(m) = captures.get(0) {
                    out.push_str(m.as_str());
                }
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = 0usize;
                while let Some(d) = chars.peek().copied() {
                    if !d.is_ascii_digit() || group >= 10 {
                        break;
                    }
                    group = group * 10 + d.to_digit(10).unwrap_or(0) as usize;
                    chars.next();
                }
                match captures.get(group) {
                    Some(m) => out.push_str(m.as_str()),
                    None => out.push_str(&format!("${group}")),
                }
            }
            _ => out.push('$'),
        }
    }
    out
}
