mod common;

use common::{eval, eval_err};
use pretty_assertions::assert_eq;
use skink::{ErrorKind, JsValue};

#[test]
fn let_is_block_scoped() {
    assert_eq!(
        eval("let x = 'outer'; { let x = 'inner'; } x"),
        JsValue::String("outer".to_owned())
    );
    assert_eq!(
        eval("let x = 'outer'; let seen; { let x = 'inner'; seen = x; } seen"),
        JsValue::String("inner".to_owned())
    );
    // Reading the name outside the block resolves to the outer binding.
    assert_eq!(
        eval("let log = ''; let v = 'a'; { let v = 'b'; log += v; } log += v; log"),
        JsValue::String("ba".to_owned())
    );
}

#[test]
fn var_hoists_to_function_scope() {
    assert_eq!(
        eval("function f() { { var v = 1; } return v; } f()"),
        JsValue::Number(1.0)
    );
    assert_eq!(
        eval("var x = 'outer'; function f() { var x = 'inner'; return x; } f() + ':' + x"),
        JsValue::String("inner:outer".to_owned())
    );
}

#[test]
fn temporal_dead_zone() {
    let err = eval_err("{ tdz; let tdz = 1; }");
    assert_eq!(err.kind(), ErrorKind::Reference);

    let err = eval_err("{ const c = before; const before = 1; }");
    assert_eq!(err.kind(), ErrorKind::Reference);

    // The same name in an outer scope does not rescue the read.
    let err = eval_err("let x = 'outer'; { let probe = x; let x = 'inner'; }");
    assert_eq!(err.kind(), ErrorKind::Reference);

    // After initialization the binding reads normally.
    assert_eq!(eval("{ let ok = 5; ok; }"), JsValue::Number(5.0));
}

#[test]
fn const_is_immutable() {
    let err = eval_err("const c = 1; c = 2;");
    assert_eq!(err.kind(), ErrorKind::Type);
    let err = eval_err("const c = 1; c++;");
    assert_eq!(err.kind(), ErrorKind::Type);
    // Const objects stay mutable inside.
    assert_eq!(eval("const o = { v: 1 }; o.v = 2; o.v"), JsValue::Number(2.0));
}

#[test]
fn unbound_names_raise_reference_errors() {
    let err = eval_err("definitelyNotDefined");
    assert_eq!(err.kind(), ErrorKind::Reference);
    assert!(err.message().contains("definitelyNotDefined"));
    // Assignment to an undeclared name creates a global in loose mode.
    assert_eq!(eval("function f() { implicitGlobal = 3; } f(); implicitGlobal"), JsValue::Number(3.0));
}

#[test]
fn loop_heads_get_fresh_bindings_per_iteration() {
    assert_eq!(
        eval("let fs = []; for (let v of [1, 2, 3]) fs.push(() => v); fs[0]() + fs[1]() + fs[2]()"),
        JsValue::Number(6.0)
    );
    // var in the head shares one binding.
    assert_eq!(
        eval("let fs = []; let xs = [1, 2, 3]; for (var i = 0; i < 3; i++) fs.push(function () { return i; }); fs[0]()"),
        JsValue::Number(3.0)
    );
}

#[test]
fn catch_parameter_is_scoped_to_the_clause() {
    assert_eq!(
        eval("let e = 'outer'; try { throw 'inner'; } catch (e) { } e"),
        JsValue::String("outer".to_owned())
    );
    assert_eq!(
        eval("let seen; try { throw 'inner'; } catch (e) { seen = e; } seen"),
        JsValue::String("inner".to_owned())
    );
}

#[test]
fn closures_capture_block_scopes() {
    assert_eq!(
        eval("function make() { let hidden = 1; return { bump() { return ++hidden; } }; } let c = make(); c.bump(); c.bump()"),
        JsValue::Number(3.0)
    );
    // Separate blocks give separate captures.
    assert_eq!(
        eval("let fs = []; { let n = 10; fs.push(() => n); } { let n = 20; fs.push(() => n); } fs[0]() + fs[1]()"),
        JsValue::Number(30.0)
    );
}

#[test]
fn switch_cases_share_one_lexical_scope() {
    assert_eq!(
        eval("switch (1) { case 1: let shared = 'x'; default: shared += 'y'; break; } 'done'"),
        JsValue::String("done".to_owned())
    );
}
