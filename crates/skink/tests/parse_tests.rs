mod common;

use common::{eval, eval_err};
use pretty_assertions::assert_eq;
use skink::{Context, ErrorKind, JsValue};

fn syntax_error(source: &str) -> skink::Exception {
    let mut cx = Context::enter();
    let err = cx.compile_string(source, "test.js", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax, "expected a syntax error for {source:?}");
    err
}

#[test]
fn reports_unterminated_strings() {
    let err = syntax_error("let s = 'oops");
    assert!(err.message().contains("unterminated string"));
    assert_eq!(err.line_number(), Some(1));
}

#[test]
fn reports_duplicate_lexical_declarations() {
    let err = syntax_error("let twice = 1; let twice = 2;");
    assert!(err.message().contains("twice"));
    syntax_error("const twice = 1; let twice = 2;");
    syntax_error("function f(a) { let a = 1; }");
    // var re-declaration merges silently.
    assert_eq!(eval("var ok = 1; var ok = 2; ok"), JsValue::Number(2.0));
}

#[test]
fn reports_invalid_jump_targets() {
    syntax_error("break;");
    syntax_error("continue;");
    syntax_error("missing: 1; break missing;");
    syntax_error("notloop: { continue notloop; }");
    // A loop label is a valid continue target.
    eval("loop: for (let i = 0; i < 1; i++) { continue loop; }");
}

#[test]
fn reports_reserved_words() {
    syntax_error("class C {}");
    syntax_error("let e = export;");
    syntax_error("yield 1;");
}

#[test]
fn automatic_semicolon_insertion() {
    assert_eq!(eval("let a = 1\nlet b = 2\na + b"), JsValue::Number(3.0));
    // A missing semicolon before `}` is inserted.
    assert_eq!(eval("function f() { return 1 } f()"), JsValue::Number(1.0));
    // But two statements on one line without separation are an error.
    syntax_error("let a = 1 let b = 2");
}

#[test]
fn restricted_productions() {
    // return with a line break returns undefined and leaves the operand as
    // a separate statement.
    assert_eq!(eval("function f() { return\n42; } f()"), JsValue::Undefined);
    // Postfix ++ cannot be separated from its operand by a newline.
    assert_eq!(eval("let a = 1; let b = 2; a\n++b; a + b"), JsValue::Number(4.0));
    // throw requires its operand on the same line.
    syntax_error("throw\n'x';");
}

#[test]
fn recovers_and_reports_multiple_errors() {
    let mut cx = Context::enter();
    let source = "let = 1;\nlet ok = 2;\nlet = 3;";
    let err = cx.compile_string(source, "multi.js", 1).unwrap_err();
    // The first error is surfaced; recovery means the parse does not abort
    // at the first bad statement (exercised by not panicking here).
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.line_number(), Some(1));
}

#[test]
fn position_invariant_holds() {
    let mut cx = Context::enter();
    let source = r"
function outer(a, { b = 1, c: [d] = [] } = {}) {
    let total = a + b + d;
    for (let i = 0; i < 10; i++) {
        total += i ** 2;
    }
    label: while (total > 0) {
        if (total % 2) { break label; }
        total -= `chunk ${total / 2}`.length;
    }
    try {
        return [...arguments_like(), total];
    } catch ({ message }) {
        throw new TypeError(message);
    } finally {
        cleanup?.();
    }
}
let handler = (x, ...rest) => x + rest.map(v => v * 2).reduce((a, b) => a + b, 0);
with ({ shadow: 1 }) { shadow += handler(shadow); }
";
    let script = cx.compile_string(source, "positions.js", 1).unwrap();
    script.verify_positions().expect("positions are parent-relative and in bounds");
}

#[test]
fn compile_does_not_run() {
    let mut cx = Context::enter();
    // Compiling must not execute anything: this would throw at runtime.
    cx.compile_string("null.x;", "lazy.js", 1).unwrap();
}

#[test]
fn line_numbers_offset_by_first_line() {
    let mut cx = Context::enter();
    let scope = cx.init_standard_objects();
    let err = cx
        .evaluate_string(&scope, "let ok = 1;\nnull.x;", "embedded.js", 10)
        .unwrap_err();
    assert_eq!(err.line_number(), Some(11));
}

#[test]
fn lexer_errors_surface_with_positions() {
    let err = syntax_error("let a = 1;\nlet b = 0x;\n");
    assert_eq!(err.line_number(), Some(2));
}

#[test]
fn runtime_error_positions() {
    let err = eval_err("let a = 1;\nlet b = 2;\nnull.x;");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.line_number(), Some(3));
    assert_eq!(err.source_name(), Some("test.js"));
}
