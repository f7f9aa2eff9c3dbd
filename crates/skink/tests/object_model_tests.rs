mod common;

use common::{eval, eval_err};
use pretty_assertions::assert_eq;
use skink::{ErrorKind, JsValue};

#[test]
fn prototype_chain_lookup() {
    assert_eq!(
        eval("let proto = { greet() { return 'hi'; } }; let o = Object.create(proto); o.greet()"),
        JsValue::String("hi".to_owned())
    );
    // Own properties shadow the prototype.
    assert_eq!(
        eval("let proto = { v: 1 }; let o = Object.create(proto); o.v = 2; o.v + proto.v"),
        JsValue::Number(3.0)
    );
    assert_eq!(
        eval("let proto = { v: 1 }; let o = Object.create(proto); Object.getPrototypeOf(o) === proto"),
        JsValue::Bool(true)
    );
}

#[test]
fn prototype_cycles_are_rejected() {
    let err = eval_err("let a = {}; let b = Object.create(a); Object.setPrototypeOf(a, b);");
    assert_eq!(err.kind(), ErrorKind::Type);
    // Self-cycle too.
    let err = eval_err("let a = {}; Object.setPrototypeOf(a, a);");
    assert_eq!(err.kind(), ErrorKind::Type);
    // A legal re-parenting still works.
    assert_eq!(
        eval("let a = {}; let c = { tag: 'c' }; Object.setPrototypeOf(a, c); a.tag"),
        JsValue::String("c".to_owned())
    );
}

#[test]
fn freeze_and_seal() {
    assert_eq!(
        eval("let o = Object.freeze({ v: 1 }); o.v = 2; o.v"),
        JsValue::Number(1.0)
    );
    assert_eq!(eval("Object.isFrozen(Object.freeze({}))"), JsValue::Bool(true));
    assert_eq!(eval("Object.isFrozen({})"), JsValue::Bool(false));
    assert_eq!(
        eval("let o = Object.freeze({ v: 1 }); delete o.v; o.v"),
        JsValue::Number(1.0)
    );
    // Sealed objects allow writes but not additions or deletions.
    assert_eq!(
        eval("let o = Object.seal({ v: 1 }); o.v = 2; o.extra = 3; [o.v, o.extra][0] + (o.extra === undefined ? 10 : 0)"),
        JsValue::Number(12.0)
    );
}

#[test]
fn property_descriptors() {
    assert_eq!(
        eval("let o = {}; Object.defineProperty(o, 'v', { value: 7, writable: false, enumerable: false, configurable: false }); o.v"),
        JsValue::Number(7.0)
    );
    // Non-writable silently refuses the write in loose mode.
    assert_eq!(
        eval("let o = {}; Object.defineProperty(o, 'v', { value: 7, writable: false }); o.v = 9; o.v"),
        JsValue::Number(7.0)
    );
    // Non-configurable cannot be deleted or redefined.
    assert_eq!(
        eval("let o = {}; Object.defineProperty(o, 'v', { value: 7 }); delete o.v"),
        JsValue::Bool(false)
    );
    let err = eval_err("let o = {}; Object.defineProperty(o, 'v', { value: 1 }); Object.defineProperty(o, 'v', { value: 2 });");
    assert_eq!(err.kind(), ErrorKind::Type);
    // Non-enumerable properties hide from for-in and keys.
    assert_eq!(
        eval("let o = { a: 1 }; Object.defineProperty(o, 'h', { value: 2, enumerable: false }); Object.keys(o).join(',')"),
        JsValue::String("a".to_owned())
    );
    // Accessor descriptors.
    assert_eq!(
        eval("let o = {}; let backing = 1; Object.defineProperty(o, 'v', { get: function () { return backing; }, set: function (n) { backing = n; } }); o.v = 41; o.v + 1"),
        JsValue::Number(42.0)
    );
}

#[test]
fn object_statics() {
    assert_eq!(eval("Object.keys({ a: 1, b: 2 }).join(',')"), JsValue::String("a,b".to_owned()));
    assert_eq!(eval("Object.values({ a: 1, b: 2 }).join(',')"), JsValue::String("1,2".to_owned()));
    assert_eq!(
        eval("Object.entries({ a: 1 })[0].join(':')"),
        JsValue::String("a:1".to_owned())
    );
    assert_eq!(
        eval("let t = Object.assign({ a: 1 }, { b: 2 }, { a: 3 }); t.a + t.b"),
        JsValue::Number(5.0)
    );
    assert_eq!(eval("({ a: 1 }).hasOwnProperty('a')"), JsValue::Bool(true));
    assert_eq!(eval("({ a: 1 }).hasOwnProperty('toString')"), JsValue::Bool(false));
}

#[test]
fn arrays_are_index_normalized() {
    assert_eq!(eval("let a = [1, 2, 3]; a['1']"), JsValue::Number(2.0));
    assert_eq!(eval("let a = []; a[3] = 'x'; a.length"), JsValue::Number(4.0));
    assert_eq!(eval("let a = [1, 2, 3]; a.length = 1; a.join(',')"), JsValue::String("1".to_owned()));
    // Non-index keys become ordinary properties.
    assert_eq!(eval("let a = [1]; a['01'] = 'prop'; a.length"), JsValue::Number(1.0));
}

#[test]
fn array_methods() {
    assert_eq!(eval("[3, 1, 2].sort().join(',')"), JsValue::String("1,2,3".to_owned()));
    assert_eq!(eval("[3, 1, 2].sort((a, b) => b - a).join(',')"), JsValue::String("3,2,1".to_owned()));
    assert_eq!(eval("[1, 2, 3, 4].filter(v => v % 2 === 0).join(',')"), JsValue::String("2,4".to_owned()));
    assert_eq!(eval("[1, 2, 3].map(v => v * v).join(',')"), JsValue::String("1,4,9".to_owned()));
    assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b)"), JsValue::Number(6.0));
    assert_eq!(eval("[1, 2, 3].reduceRight((a, b) => a - b)"), JsValue::Number(0.0));
    assert_eq!(eval("[[1], [2]].concat([[3]]).length"), JsValue::Number(3.0));
    assert_eq!(eval("[1, 2, 3].slice(1).join(',')"), JsValue::String("2,3".to_owned()));
    assert_eq!(
        eval("let a = [1, 2, 3, 4]; let removed = a.splice(1, 2, 'x'); removed.join(',') + '|' + a.join(',')"),
        JsValue::String("2,3|1,x,4".to_owned())
    );
    assert_eq!(eval("[1, 2, 3].indexOf(2)"), JsValue::Number(1.0));
    assert_eq!(eval("[1, NaN].includes(NaN)"), JsValue::Bool(true));
    assert_eq!(eval("[1, 2, 3].find(v => v > 1)"), JsValue::Number(2.0));
    assert_eq!(eval("[1, 2, 3].findLast(v => v > 1)"), JsValue::Number(3.0));
    assert_eq!(eval("[1, 2, 3].findLastIndex(v => v < 3)"), JsValue::Number(1.0));
    assert_eq!(eval("[1, 2].every(v => v > 0)"), JsValue::Bool(true));
    assert_eq!(eval("[1, 2].some(v => v > 1)"), JsValue::Bool(true));
    assert_eq!(eval("let a = [1, 2]; a.push(3); a.pop() + a.length"), JsValue::Number(5.0));
    assert_eq!(eval("let a = [1, 2]; a.unshift(0); a.shift() + a.length"), JsValue::Number(2.0));
    assert_eq!(eval("Array.isArray([])"), JsValue::Bool(true));
    assert_eq!(eval("Array.isArray({})"), JsValue::Bool(false));
    assert_eq!(eval("Array.from('abc').join('-')"), JsValue::String("a-b-c".to_owned()));
    assert_eq!(eval("Array.of(1, 2).length"), JsValue::Number(2.0));
}

#[test]
fn symbols_are_identities() {
    assert_eq!(eval("Symbol('x') === Symbol('x')"), JsValue::Bool(false));
    assert_eq!(eval("Symbol.for('k') === Symbol.for('k')"), JsValue::Bool(true));
    assert_eq!(eval("Symbol('desc').description"), JsValue::String("desc".to_owned()));
    // Symbol-keyed properties are invisible to string enumeration.
    assert_eq!(
        eval("let s = Symbol('hidden'); let o = { [s]: 1, visible: 2 }; Object.keys(o).join(',')"),
        JsValue::String("visible".to_owned())
    );
    assert_eq!(eval("let s = Symbol('k'); let o = { [s]: 42 }; o[s]"), JsValue::Number(42.0));
}

#[test]
fn symbol_to_primitive_is_honored() {
    assert_eq!(
        eval("let o = { [Symbol.toPrimitive](hint) { return hint === 'number' ? 42 : 'str'; } }; +o"),
        JsValue::Number(42.0)
    );
    assert_eq!(
        eval("let o = { [Symbol.toPrimitive](hint) { return hint === 'number' ? 42 : 'str'; } }; `${o}`"),
        JsValue::String("str".to_owned())
    );
}

#[test]
fn is_concat_spreadable_controls_concat() {
    assert_eq!(eval("[1].concat([2, 3]).length"), JsValue::Number(3.0));
    assert_eq!(
        eval("let arr = [2, 3]; arr[Symbol.isConcatSpreadable] = false; [1].concat(arr).length"),
        JsValue::Number(2.0)
    );
}

#[test]
fn valueof_and_tostring_drive_coercion() {
    assert_eq!(eval("let o = { valueOf() { return 6; } }; o * 7"), JsValue::Number(42.0));
    assert_eq!(
        eval("let o = { toString() { return 'rendered'; } }; `${o}`"),
        JsValue::String("rendered".to_owned())
    );
    // Number hint prefers valueOf, string hint prefers toString.
    assert_eq!(
        eval("let o = { valueOf() { return 1; }, toString() { return 'two'; } }; (o + 0) + ';' + `${o}`"),
        JsValue::String("1;two".to_owned())
    );
}
