use std::{cell::RefCell, rc::Rc};

use skink::{ConsoleLevel, ConsoleWriter, Context, JsValue};

/// Console writer sharing its buffer with the test, since the context owns
/// the writer itself.
#[derive(Debug, Clone, Default)]
pub struct SharedConsole(pub Rc<RefCell<String>>);

impl SharedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        self.0.borrow().clone()
    }
}

impl ConsoleWriter for SharedConsole {
    fn write_line(&mut self, _level: ConsoleLevel, line: &str) {
        let mut buffer = self.0.borrow_mut();
        buffer.push_str(line);
        buffer.push('\n');
    }
}

/// Evaluates a script, panicking on errors.
pub fn eval(source: &str) -> JsValue {
    let mut cx = Context::enter();
    let scope = cx.init_standard_objects();
    match cx.evaluate_string(&scope, source, "test.js", 1) {
        Ok(value) => value,
        Err(err) => panic!("script failed: {err}\n{}", err.render_stack(None, None)),
    }
}

/// Evaluates a script, returning the error it must raise.
pub fn eval_err(source: &str) -> skink::Exception {
    let mut cx = Context::enter();
    let scope = cx.init_standard_objects();
    match cx.evaluate_string(&scope, source, "test.js", 1) {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(err) => err,
    }
}

/// Evaluates a script and returns `(result, console output)`.
pub fn eval_with_console(source: &str) -> (Result<JsValue, skink::Exception>, String) {
    let console = SharedConsole::new();
    let mut cx = Context::enter();
    cx.set_console(console.clone());
    let scope = cx.init_standard_objects();
    let result = cx.evaluate_string(&scope, source, "src", 1);
    (result, console.output())
}
