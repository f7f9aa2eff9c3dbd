mod common;

use common::{eval, eval_err, eval_with_console};
use pretty_assertions::assert_eq;
use skink::{ErrorKind, JsValue};

fn num(n: f64) -> JsValue {
    JsValue::Number(n)
}

fn s(text: &str) -> JsValue {
    JsValue::String(text.to_owned())
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(eval("1 + 2 * 3"), num(7.0));
    assert_eq!(eval("(1 + 2) * 3"), num(9.0));
    assert_eq!(eval("2 ** 3 ** 2"), num(512.0));
    assert_eq!(eval("7 % 3"), num(1.0));
    assert_eq!(eval("-7 % 3"), num(-1.0));
    assert_eq!(eval("1 / 0"), num(f64::INFINITY));
}

#[test]
fn string_concat_and_coercion() {
    assert_eq!(eval("'a' + 1"), s("a1"));
    assert_eq!(eval("1 + '2'"), s("12"));
    assert_eq!(eval("'3' * '4'"), num(12.0));
    assert_eq!(eval("'' + null"), s("null"));
    assert_eq!(eval("'' + undefined"), s("undefined"));
    assert_eq!(eval("'' + [1,2]"), s("1,2"));
    assert_eq!(eval("'' + {}"), s("[object Object]"));
}

#[test]
fn equality_operators() {
    assert_eq!(eval("1 == '1'"), JsValue::Bool(true));
    assert_eq!(eval("1 === '1'"), JsValue::Bool(false));
    assert_eq!(eval("null == undefined"), JsValue::Bool(true));
    assert_eq!(eval("null === undefined"), JsValue::Bool(false));
    assert_eq!(eval("NaN === NaN"), JsValue::Bool(false));
    assert_eq!(eval("0 == false"), JsValue::Bool(true));
    assert_eq!(eval("({}) == ({})"), JsValue::Bool(false));
    assert_eq!(eval("let o = {}; o == o"), JsValue::Bool(true));
}

#[test]
fn logical_and_nullish() {
    assert_eq!(eval("0 || 'fallback'"), s("fallback"));
    assert_eq!(eval("0 ?? 'fallback'"), num(0.0));
    assert_eq!(eval("null ?? 'fallback'"), s("fallback"));
    assert_eq!(eval("1 && 2"), num(2.0));
    // Short-circuit must not evaluate the right side.
    assert_eq!(eval("let hits = 0; false && (hits = 1); hits"), num(0.0));
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(eval("5 & 3"), num(1.0));
    assert_eq!(eval("5 | 3"), num(7.0));
    assert_eq!(eval("5 ^ 3"), num(6.0));
    assert_eq!(eval("~0"), num(-1.0));
    assert_eq!(eval("1 << 3"), num(8.0));
    assert_eq!(eval("-8 >> 1"), num(-4.0));
    assert_eq!(eval("-8 >>> 28"), num(15.0));
}

#[test]
fn typeof_operator() {
    assert_eq!(eval("typeof 1"), s("number"));
    assert_eq!(eval("typeof 'x'"), s("string"));
    assert_eq!(eval("typeof undefined"), s("undefined"));
    assert_eq!(eval("typeof null"), s("object"));
    assert_eq!(eval("typeof {}"), s("object"));
    assert_eq!(eval("typeof (() => 1)"), s("function"));
    assert_eq!(eval("typeof 1n"), s("bigint"));
    assert_eq!(eval("typeof Symbol('x')"), s("symbol"));
    // typeof on an unbound name yields undefined instead of throwing.
    assert_eq!(eval("typeof neverDeclared"), s("undefined"));
}

#[test]
fn functions_and_closures() {
    assert_eq!(eval("function add(a, b) { return a + b; } add(2, 3)"), num(5.0));
    assert_eq!(
        eval("function counter() { let n = 0; return function () { return ++n; }; } let c = counter(); c(); c(); c()"),
        num(3.0)
    );
    // Two closures over distinct activations stay independent.
    assert_eq!(
        eval("function counter() { let n = 0; return () => ++n; } let a = counter(), b = counter(); a(); a(); b()"),
        num(1.0)
    );
    // Named function expressions see their own name.
    assert_eq!(
        eval("let fact = function f(n) { return n <= 1 ? 1 : n * f(n - 1); }; fact(5)"),
        num(120.0)
    );
}

#[test]
fn default_and_rest_parameters() {
    assert_eq!(eval("function f(a, b = a + 1) { return b; } f(1)"), num(2.0));
    assert_eq!(eval("function f(...rest) { return rest.length; } f(1, 2, 3)"), num(3.0));
    assert_eq!(
        eval("function f(first, ...rest) { return first + rest.join(''); } f('a', 'b', 'c')"),
        s("abc")
    );
}

#[test]
fn arrow_functions_capture_this() {
    assert_eq!(
        eval("let o = { n: 41, get() { let f = () => this.n + 1; return f(); } }; o.get()"),
        num(42.0)
    );
    // Plain functions get the global object as this in loose mode.
    assert_eq!(eval("var top = 7; function f() { return this.top; } f()"), num(7.0));
}

#[test]
fn method_calls_bind_receiver() {
    assert_eq!(
        eval("let o = { x: 10, getX: function () { return this.x; } }; o.getX()"),
        num(10.0)
    );
    assert_eq!(
        eval("let o = { x: 1 }; function f() { return this.x; } o.f = f; o.f()"),
        num(1.0)
    );
}

#[test]
fn constructors_and_new() {
    assert_eq!(
        eval("function Point(x, y) { this.x = x; this.y = y; } let p = new Point(3, 4); p.x + p.y"),
        num(7.0)
    );
    assert_eq!(
        eval("function Point(x) { this.x = x; } Point.prototype.double = function () { return this.x * 2; }; new Point(21).double()"),
        num(42.0)
    );
    // A constructor returning an object overrides the allocation.
    assert_eq!(
        eval("function F() { return { marker: 1 }; } new F().marker"),
        num(1.0)
    );
    assert_eq!(
        eval("function Point() {} let p = new Point(); p instanceof Point"),
        JsValue::Bool(true)
    );
}

#[test]
fn hoisting() {
    // Function declarations are callable before their statement.
    assert_eq!(eval("let r = early(); function early() { return 'ok'; } r"), s("ok"));
    // var hoists as undefined.
    assert_eq!(eval("typeof x; var x = 1; typeof x"), s("number"));
    assert_eq!(eval("function f() { var seen = typeof v; var v = 1; return seen; } f()"), s("undefined"));
}

#[test]
fn control_flow() {
    assert_eq!(eval("let n = 0; for (let i = 0; i < 5; i++) n += i; n"), num(10.0));
    assert_eq!(eval("let n = 0; while (n < 5) n++; n"), num(5.0));
    assert_eq!(eval("let n = 0; do { n++; } while (n < 3); n"), num(3.0));
    assert_eq!(
        eval("let n = 0; for (let i = 0; i < 10; i++) { if (i === 3) continue; if (i === 6) break; n += i; } n"),
        num(12.0)
    );
}

#[test]
fn labeled_break_and_continue() {
    assert_eq!(
        eval(
            "let hits = 0;\nouter: for (let i = 0; i < 3; i++) {\n  for (let j = 0; j < 3; j++) {\n    if (j === 1) continue outer;\n    hits++;\n  }\n}\nhits"
        ),
        num(3.0)
    );
    assert_eq!(
        eval(
            "let hits = 0;\nouter: for (let i = 0; i < 3; i++) {\n  for (let j = 0; j < 3; j++) {\n    if (i === 1) break outer;\n    hits++;\n  }\n}\nhits"
        ),
        num(3.0)
    );
}

#[test]
fn switch_statement() {
    let src = "function pick(v) { switch (v) { case 1: return 'one'; case 2: return 'two'; default: return 'many'; } }";
    assert_eq!(eval(&format!("{src} pick(1)")), s("one"));
    assert_eq!(eval(&format!("{src} pick(2)")), s("two"));
    assert_eq!(eval(&format!("{src} pick(9)")), s("many"));
    // Fallthrough without break.
    assert_eq!(
        eval("let log = ''; switch (1) { case 1: log += 'a'; case 2: log += 'b'; break; case 3: log += 'c'; } log"),
        s("ab")
    );
    // Strict matching: no coercion.
    assert_eq!(
        eval("switch ('1') { case 1: 'number'; break; default: 'default'; }"),
        s("default")
    );
}

#[test]
fn try_catch_finally() {
    assert_eq!(eval("let r; try { throw 'boom'; } catch (e) { r = e; } r"), s("boom"));
    assert_eq!(
        eval("let log = ''; try { log += 'a'; } finally { log += 'b'; } log"),
        s("ab")
    );
    assert_eq!(
        eval("let log = ''; try { try { throw 1; } finally { log += 'f'; } } catch (e) { log += 'c'; } log"),
        s("fc")
    );
    // Catch binding is optional.
    assert_eq!(eval("let r = 'no'; try { throw 1; } catch { r = 'yes'; } r"), s("yes"));
    // Rethrow propagates.
    let err = eval_err("try { null.x; } catch (e) { throw e; }");
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn try_finally_completion_override() {
    // The finally completion wins over the pending return.
    let (result, output) = eval_with_console("function f(){ try { return 1; } finally { return 2; } }\nconsole.info(f());");
    result.unwrap();
    assert_eq!(output, "2\n");
    // And over a pending throw.
    assert_eq!(
        eval("function f() { try { throw 'x'; } finally { return 'saved'; } } f()"),
        s("saved")
    );
}

#[test]
fn caught_engine_errors_are_error_objects() {
    assert_eq!(
        eval("let name; try { undefinedName; } catch (e) { name = e.name; } name"),
        s("ReferenceError")
    );
    assert_eq!(
        eval("let m; try { null.x; } catch (e) { m = e instanceof TypeError; } m"),
        JsValue::Bool(true)
    );
    assert_eq!(
        eval("try { null.x; } catch (e) { e.message.length > 0 }"),
        JsValue::Bool(true)
    );
}

#[test]
fn optional_chaining_scenario() {
    // First the happy paths, then the plain access that must throw.
    let (result, output) = eval_with_console(
        "let a = { b: { c: 'd' } }; let e = { f: {} }; let h = null;\nconsole.info(a?.b?.c);\nconsole.info(e?.f?.g, h?.i?.j);\nconsole.info(h.i.j);",
    );
    assert_eq!(output, "d\nundefined undefined\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.to_string(), "TypeError: Cannot read property \"i\" from null (src#4)");
}

#[test]
fn optional_chain_evaluates_head_once() {
    assert_eq!(
        eval("let hits = 0; function get() { hits++; return null; } get()?.y.z; hits"),
        num(1.0)
    );
    // The tail of a short-circuited chain is never evaluated.
    assert_eq!(
        eval("let hits = 0; let x = null; x?.[hits++]; hits"),
        num(0.0)
    );
    assert_eq!(eval("let o = null; o?.method()"), JsValue::Undefined);
    assert_eq!(eval("let f = null; f?.()"), JsValue::Undefined);
}

#[test]
fn template_literals() {
    assert_eq!(eval("let x = 6; `v=${x * 7}!`"), s("v=42!"));
    assert_eq!(eval("`a${1}${2}b`"), s("a12b"));
    assert_eq!(eval("`plain`"), s("plain"));
    assert_eq!(eval("let o = { n: 1 }; `${ { a: o.n + 1 }.a }`"), s("2"));
}

#[test]
fn destructuring() {
    assert_eq!(eval("let [a, b] = [1, 2]; a + b"), num(3.0));
    assert_eq!(eval("let [a, , c] = [1, 2, 3]; a + c"), num(4.0));
    assert_eq!(eval("let [a, b = 10] = [1]; a + b"), num(11.0));
    assert_eq!(eval("let [head, ...tail] = [1, 2, 3]; head + tail.length"), num(3.0));
    assert_eq!(eval("let { x, y } = { x: 1, y: 2 }; x + y"), num(3.0));
    assert_eq!(eval("let { x: renamed } = { x: 5 }; renamed"), num(5.0));
    assert_eq!(eval("let { missing = 9 } = {}; missing"), num(9.0));
    assert_eq!(eval("let { a, ...rest } = { a: 1, b: 2, c: 3 }; a + rest.b + rest.c"), num(6.0));
    // Destructuring assignment to existing bindings.
    assert_eq!(eval("let a = 0, b = 0; [a, b] = [4, 5]; a + b"), num(9.0));
    // Nested patterns in parameters.
    assert_eq!(eval("function f({ point: [x, y] }) { return x * y; } f({ point: [6, 7] })"), num(42.0));
}

#[test]
fn for_in_enumerates_own_keys_in_insertion_order() {
    assert_eq!(
        eval("let o = { b: 1, a: 2, c: 3 }; let keys = ''; for (let k in o) keys += k; keys"),
        s("bac")
    );
    // Inherited enumerable properties come after own ones.
    assert_eq!(
        eval("let proto = { p: 1 }; let o = Object.create(proto); o.own = 2; let keys = ''; for (let k in o) keys += k + ','; keys"),
        s("own,p,")
    );
    assert_eq!(
        eval("let seen = ''; for (let i in [10, 20, 30]) seen += i; seen"),
        s("012")
    );
}

#[test]
fn for_of_over_builtin_iterables() {
    assert_eq!(eval("let sum = 0; for (let v of [1, 2, 3]) sum += v; sum"), num(6.0));
    assert_eq!(eval("let out = ''; for (let c of 'abc') out += c + '.'; out"), s("a.b.c."));
    assert_eq!(
        eval("let m = new Map(); m.set('a', 1).set('b', 2); let out = ''; for (let [k, v] of m) out += k + v; out"),
        s("a1b2")
    );
    assert_eq!(
        eval("let s = new Set([3, 1, 3, 2]); let out = ''; for (let v of s) out += v; out"),
        s("312")
    );
    // Spread uses the same protocol.
    assert_eq!(eval("let xs = [...'ab', ...[1, 2]]; xs.join('-')"), s("a-b-1-2"));
}

#[test]
fn with_statement_dynamic_scope() {
    assert_eq!(eval("let o = { x: 10 }; let x = 1; let r; with (o) { r = x; } r"), num(10.0));
    // Names missing from the with object fall through to outer scopes.
    assert_eq!(eval("let o = { }; let y = 5; let r; with (o) { r = y; } r"), num(5.0));
    // Assignment through the with layer mutates the object.
    assert_eq!(eval("let o = { x: 1 }; with (o) { x = 2; } o.x"), num(2.0));
}

#[test]
fn getters_and_setters() {
    assert_eq!(
        eval("let o = { _v: 1, get v() { return this._v; }, set v(n) { this._v = n * 2; } }; o.v = 21; o.v"),
        num(42.0)
    );
}

#[test]
fn compound_and_logical_assignment() {
    assert_eq!(eval("let n = 10; n += 5; n -= 3; n *= 2; n"), num(24.0));
    assert_eq!(eval("let n = null; n ??= 7; n"), num(7.0));
    assert_eq!(eval("let n = 1; n ||= 9; n"), num(1.0));
    assert_eq!(eval("let n = 1; n &&= 9; n"), num(9.0));
}

#[test]
fn update_expressions() {
    assert_eq!(eval("let n = 5; [n++, n]"), JsValue::Array(vec![num(5.0), num(6.0)]));
    assert_eq!(eval("let n = 5; [++n, n]"), JsValue::Array(vec![num(6.0), num(6.0)]));
    assert_eq!(eval("let o = { n: 1 }; o.n++; o.n"), num(2.0));
}

#[test]
fn bigint_arithmetic() {
    assert_eq!(eval("(2n ** 64n).toString()"), s("18446744073709551616"));
    assert_eq!(eval("7n / 2n === 3n"), JsValue::Bool(true));
    let err = eval_err("1n + 1");
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn delete_and_in_operators() {
    assert_eq!(eval("let o = { a: 1 }; 'a' in o"), JsValue::Bool(true));
    assert_eq!(eval("let o = { a: 1 }; delete o.a; 'a' in o"), JsValue::Bool(false));
    assert_eq!(eval("0 in [7]"), JsValue::Bool(true));
    assert_eq!(eval("1 in [7]"), JsValue::Bool(false));
}

#[test]
fn comma_and_conditional() {
    assert_eq!(eval("(1, 2, 3)"), num(3.0));
    assert_eq!(eval("true ? 'a' : 'b'"), s("a"));
    assert_eq!(eval("0 ? 'a' : 'b'"), s("b"));
}

#[test]
fn json_round_trip() {
    assert_eq!(eval("JSON.stringify({ b: 1, a: [true, null] })"), s("{\"b\":1,\"a\":[true,null]}"));
    assert_eq!(eval("JSON.parse('{\"x\": 3}').x"), num(3.0));
    // Key order from the source text is preserved.
    assert_eq!(
        eval("let keys = ''; let o = JSON.parse('{\"z\":1,\"a\":2}'); for (let k in o) keys += k; keys"),
        s("za")
    );
}

#[test]
fn string_methods() {
    assert_eq!(eval("'Hello'.toUpperCase()"), s("HELLO"));
    assert_eq!(eval("'a,b,c'.split(',').length"), num(3.0));
    assert_eq!(eval("'abcdef'.slice(1, 4)"), s("bcd"));
    assert_eq!(eval("'abc'.indexOf('c')"), num(2.0));
    assert_eq!(eval("'ab'.repeat(3)"), s("ababab"));
    assert_eq!(eval("'5'.padStart(3, '0')"), s("005"));
    assert_eq!(eval("'  x  '.trim()"), s("x"));
    assert_eq!(eval("'aaa'.replace('a', 'b')"), s("baa"));
    assert_eq!(eval("'aaa'.replaceAll('a', 'b')"), s("bbb"));
    assert_eq!(eval("'abc'.charCodeAt(0)"), num(97.0));
    assert_eq!(eval("'abc'[1]"), s("b"));
    assert_eq!(eval("'abc'.length"), num(3.0));
}

#[test]
fn math_and_number_builtins() {
    assert_eq!(eval("Math.max(1, 5, 3)"), num(5.0));
    assert_eq!(eval("Math.floor(3.7)"), num(3.0));
    assert_eq!(eval("Math.abs(-4)"), num(4.0));
    assert_eq!(eval("Number('12')"), num(12.0));
    assert_eq!(eval("Number.isInteger(4)"), JsValue::Bool(true));
    assert_eq!(eval("parseInt('ff', 16)"), num(255.0));
    assert_eq!(eval("parseFloat('3.5rest')"), num(3.5));
    assert_eq!(eval("(255).toString(16)"), s("ff"));
    assert_eq!(eval("(1.005).toFixed(1)"), s("1.0"));
    assert_eq!(eval("isNaN('x')"), JsValue::Bool(true));
}

#[test]
fn regexp_basics() {
    assert_eq!(eval("/ab+c/.test('xabbbc')"), JsValue::Bool(true));
    assert_eq!(eval("/ab+c/.test('ac')"), JsValue::Bool(false));
    assert_eq!(eval("/a(b)c/.exec('abc')[1]"), s("b"));
    assert_eq!(eval("'a1b2'.replace(/[0-9]/g, '#')"), s("a#b#"));
    assert_eq!(eval("'x-y-z'.split(/-/).length"), num(3.0));
    assert_eq!(eval("/CASE/i.test('case')"), JsValue::Bool(true));
    assert_eq!(eval("'aXbXc'.match(/x/gi).length"), num(2.0));
}

#[test]
fn function_prototype_methods() {
    assert_eq!(eval("function f(a, b) { return this.base + a + b; } f.call({ base: 1 }, 2, 3)"), num(6.0));
    assert_eq!(eval("function f(a, b) { return a * b; } f.apply(null, [6, 7])"), num(42.0));
    assert_eq!(eval("function f(a, b) { return a - b; } let g = f.bind(null, 10); g(4)"), num(6.0));
}

#[test]
fn interrupt_hook_terminates_uncatchably() {
    let mut cx = skink::Context::enter();
    let scope = cx.init_standard_objects();
    let mut budget = 50u32;
    cx.set_interrupt_handler(move || {
        budget = budget.saturating_sub(1);
        budget == 0
    });
    // The interrupt must cut the infinite loop and skip the catch.
    let err = cx
        .evaluate_string(&scope, "try { while (true) {} } catch (e) { 'caught' }", "test.js", 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Terminated);
}

#[test]
fn resource_limits_stop_runaway_scripts() {
    let limits = skink::ResourceLimits {
        max_steps: Some(10_000),
        ..Default::default()
    };
    let mut cx = skink::Context::with_limits(limits);
    let scope = cx.init_standard_objects();
    let err = cx
        .evaluate_string(&scope, "while (true) {}", "test.js", 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluator);
}

#[test]
fn recursion_depth_is_bounded() {
    let err = eval_err("function f() { return f(); } f()");
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[test]
fn compiled_scripts_are_reusable() {
    let mut cx = skink::Context::enter();
    let scope = cx.init_standard_objects();
    let script = cx.compile_string("var n = (typeof n === 'number') ? n + 1 : 1; n", "counter.js", 1).unwrap();
    assert_eq!(script.exec(&mut cx, &scope).unwrap(), num(1.0));
    assert_eq!(script.exec(&mut cx, &scope).unwrap(), num(2.0));

    // Binary round-trip preserves the compiled program.
    let bytes = script.dump().unwrap();
    let restored = skink::Script::load(&bytes).unwrap();
    assert_eq!(restored.exec(&mut cx, &scope).unwrap(), num(3.0));
}

#[test]
fn script_stack_frames_render_script_functions() {
    let err = eval_err("function inner() { null.x; }\nfunction outer() { inner(); }\nouter();");
    let stack = err.render_stack(None, None);
    assert_eq!(stack, "\tat inner (test.js:1)\n\tat outer (test.js:2)\n\tat <top-level> (test.js:3)\n");
    // Truncation and hiding filters.
    assert_eq!(err.render_stack(Some(1), None), "\tat inner (test.js:1)\n");
    assert_eq!(
        err.render_stack(None, Some("outer")),
        "\tat inner (test.js:1)\n"
    );
}
