mod common;

use common::{eval, eval_err, eval_with_console};
use pretty_assertions::assert_eq;
use skink::{ErrorKind, JsValue};

#[test]
fn map_keeps_insertion_order() {
    assert_eq!(
        eval("let m = new Map(); m.set('z', 1); m.set('a', 2); m.set('m', 3); let out = ''; for (let k of m.keys()) out += k; out"),
        JsValue::String("zam".to_owned())
    );
    // Updating an existing key keeps its position.
    assert_eq!(
        eval("let m = new Map(); m.set('a', 1); m.set('b', 2); m.set('a', 9); let out = ''; m.forEach((v, k) => out += k + v); out"),
        JsValue::String("a9b2".to_owned())
    );
}

#[test]
fn iterators_tolerate_concurrent_deletion() {
    // The S2 scenario, byte for byte.
    let (result, output) = eval_with_console(
        "let m = new Map(); m.set('a',1); m.set('b',2); m.set('c',3);\nlet it = m.keys(); m.delete('b');\nconsole.info(it.next().value, it.next().value, it.next().done);",
    );
    result.unwrap();
    assert_eq!(output, "a c true\n");
}

#[test]
fn iterator_parked_on_deleted_entry_advances() {
    // Delete the entry the iterator is parked on; it must keep walking
    // forward through the survivors.
    assert_eq!(
        eval(
            "let m = new Map(); for (let i = 0; i < 6; i++) m.set(i, i);\nlet it = m.keys();\nit.next();\nm.delete(0); m.delete(2); m.delete(4);\nlet out = ''; let step;\nwhile (!(step = it.next()).done) out += step.value;\nout"
        ),
        JsValue::String("135".to_owned())
    );
}

#[test]
fn iteration_stability_under_every_second_deletion() {
    // Delete every second entry after creating the iterator: the survivors
    // come out in insertion order, and nothing ever raises.
    assert_eq!(
        eval(
            "let m = new Map(); for (let i = 0; i < 10; i++) m.set(i, i);\nlet it = m.keys();\nfor (let i = 0; i < 10; i += 2) m.delete(i);\nlet out = []; let step;\nwhile (!(step = it.next()).done) out.push(step.value);\nout.join(',')"
        ),
        JsValue::String("1,3,5,7,9".to_owned())
    );
}

#[test]
fn iterators_survive_clear() {
    assert_eq!(
        eval(
            "let m = new Map(); m.set('a', 1); m.set('b', 2);\nlet it = m.keys();\nit.next();\nm.clear();\nm.set('z', 9);\nit.next().done"
        ),
        JsValue::Bool(true)
    );
    // The map itself works normally after the clear.
    assert_eq!(
        eval("let m = new Map(); m.set('a', 1); m.clear(); m.set('z', 9); m.get('z') + m.size"),
        JsValue::Number(10.0)
    );
}

#[test]
fn same_value_zero_keys() {
    assert_eq!(eval("let m = new Map(); m.set(NaN, 'found'); m.get(NaN)"), JsValue::String("found".to_owned()));
    assert_eq!(eval("let m = new Map(); m.set(0, 'zero'); m.get(-0)"), JsValue::String("zero".to_owned()));
    assert_eq!(eval("let s = new Set([NaN, NaN]); s.size"), JsValue::Number(1.0));
    // Objects key by identity.
    assert_eq!(
        eval("let m = new Map(); let k = {}; m.set(k, 1); m.has({}) === false && m.get(k) === 1"),
        JsValue::Bool(true)
    );
}

#[test]
fn map_and_set_api_surface() {
    assert_eq!(eval("let m = new Map([[1, 'a'], [2, 'b']]); m.get(2)"), JsValue::String("b".to_owned()));
    assert_eq!(eval("let m = new Map(); m.set(1, 'x'); m.delete(1)"), JsValue::Bool(true));
    assert_eq!(eval("let m = new Map(); m.delete(1)"), JsValue::Bool(false));
    assert_eq!(eval("let m = new Map(); m.set(1, 2); m.has(1)"), JsValue::Bool(true));
    assert_eq!(eval("let s = new Set(); s.add(1).add(2).add(1); s.size"), JsValue::Number(2.0));
    assert_eq!(eval("let s = new Set([1, 2]); s.has(2)"), JsValue::Bool(true));
    assert_eq!(
        eval("let m = new Map([['k', 'v']]); let out = ''; for (let [k, v] of m.entries()) out = k + v; out"),
        JsValue::String("kv".to_owned())
    );
    // Map requires construction with new.
    let err = eval_err("Map()");
    assert_eq!(err.kind(), ErrorKind::Type);
}
