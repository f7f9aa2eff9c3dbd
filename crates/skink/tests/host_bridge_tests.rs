mod common;

use std::{cell::RefCell, rc::Rc};

use common::SharedConsole;
use pretty_assertions::assert_eq;
use skink::{
    Context, ErrorKind, HostClassDescriptor, HostHandle, HostIterable, HostIterator, HostType, HostValue, JsValue,
};

fn host_cx() -> (Context, SharedConsole) {
    let console = SharedConsole::new();
    let mut cx = Context::enter();
    cx.set_console(console.clone());
    cx.init_standard_objects();
    (cx, console)
}

#[test]
fn overload_resolution_prefers_lowest_weight() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let class = cx.register_host_class(
        HostClassDescriptor::new("Overloaded")
            .method("f", vec![HostType::Int], |_cx, _this, args| {
                Ok(HostValue::Str(format!("int:{:?}", &args[0])))
            })
            .method("f", vec![HostType::String], |_cx, _this, args| {
                Ok(HostValue::Str(format!("string:{:?}", &args[0])))
            }),
    );
    cx.add_host_object(&scope, "host", class, HostHandle::new(())).unwrap();

    // A double dispatches to f(int): widening beats stringification.
    let result = cx.evaluate_string(&scope, "host.f(1.0)", "s3.js", 1).unwrap();
    assert_eq!(result, JsValue::String("int:Int(1)".to_owned()));

    // A string dispatches to f(String).
    let result = cx.evaluate_string(&scope, "host.f('1')", "s3.js", 1).unwrap();
    assert_eq!(result, JsValue::String("string:Str(\"1\")".to_owned()));

    // A boolean fits neither overload.
    let err = cx.evaluate_string(&scope, "host.f(true)", "s3.js", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn ambiguous_overloads_raise_type_error() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let class = cx.register_host_class(
        HostClassDescriptor::new("Ambiguous")
            .method("f", vec![HostType::Int], |_cx, _this, _args| Ok(HostValue::Null))
            .method("f", vec![HostType::Int], |_cx, _this, _args| Ok(HostValue::Null)),
    );
    cx.add_host_object(&scope, "host", class, HostHandle::new(())).unwrap();
    let err = cx.evaluate_string(&scope, "host.f(1)", "test.js", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(err.message().contains("ambiguous"), "message: {}", err.message());
}

#[test]
fn bean_property_synthesis() {
    #[derive(Debug)]
    struct Person {
        name: RefCell<String>,
    }

    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let class = cx.register_host_class(
        HostClassDescriptor::new("Person")
            .method("getName", vec![], |_cx, this, _args| {
                let person = this.and_then(|h| h.downcast_ref::<Person>()).expect("receiver");
                Ok(HostValue::Str(person.name.borrow().clone()))
            })
            .method("setName", vec![HostType::String], |_cx, this, args| {
                let person = this.and_then(|h| h.downcast_ref::<Person>()).expect("receiver");
                if let HostValue::Str(new_name) = &args[0] {
                    *person.name.borrow_mut() = new_name.clone();
                }
                Ok(HostValue::Undefined)
            }),
    );
    let handle = HostHandle::new(Person {
        name: RefCell::new("ada".to_owned()),
    });
    cx.add_host_object(&scope, "host", class, handle).unwrap();

    // Reading host.name invokes the getter.
    assert_eq!(
        cx.evaluate_string(&scope, "host.name", "s4.js", 1).unwrap(),
        JsValue::String("ada".to_owned())
    );
    // Writing invokes the setter.
    cx.evaluate_string(&scope, "host.name = 'x'", "s4.js", 1).unwrap();
    assert_eq!(
        cx.evaluate_string(&scope, "host.name", "s4.js", 1).unwrap(),
        JsValue::String("x".to_owned())
    );
    // Membership is visible, deletion is refused.
    assert_eq!(
        cx.evaluate_string(&scope, "'name' in host", "s4.js", 1).unwrap(),
        JsValue::Bool(true)
    );
    assert_eq!(
        cx.evaluate_string(&scope, "delete host.name", "s4.js", 1).unwrap(),
        JsValue::Bool(false)
    );
    // The raw accessor methods remain reachable too.
    assert_eq!(
        cx.evaluate_string(&scope, "host.getName()", "s4.js", 1).unwrap(),
        JsValue::String("x".to_owned())
    );
}

#[test]
fn for_of_over_host_list() {
    let (mut cx, console) = host_cx();
    let scope = cx.init_standard_objects();
    let list: Rc<RefCell<Vec<HostValue>>> = Rc::new(RefCell::new(vec![
        HostValue::Int(10),
        HostValue::Int(20),
        HostValue::Int(30),
    ]));
    cx.add_host_list(&scope, "xs", list).unwrap();
    cx.evaluate_string(&scope, "let s = 0; for (let v of xs) s += v; console.info(s);", "s5.js", 1)
        .unwrap();
    assert_eq!(console.output(), "60\n");
}

#[test]
fn host_list_exposes_array_surface() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let list: Rc<RefCell<Vec<HostValue>>> = Rc::new(RefCell::new(vec![
        HostValue::Int(1),
        HostValue::Int(2),
        HostValue::Int(3),
    ]));
    cx.add_host_list(&scope, "xs", list.clone()).unwrap();

    assert_eq!(cx.evaluate_string(&scope, "xs.length", "t.js", 1).unwrap(), JsValue::Number(3.0));
    assert_eq!(cx.evaluate_string(&scope, "xs[1]", "t.js", 1).unwrap(), JsValue::Number(2.0));
    assert_eq!(
        cx.evaluate_string(&scope, "xs.map(v => v * 2).join(',')", "t.js", 1).unwrap(),
        JsValue::String("2,4,6".to_owned())
    );
    assert_eq!(
        cx.evaluate_string(&scope, "xs.slice(1).join('')", "t.js", 1).unwrap(),
        JsValue::String("23".to_owned())
    );

    // Mutators write through to the live host list.
    cx.evaluate_string(&scope, "xs.push(4); xs.splice(0, 1);", "t.js", 1).unwrap();
    assert_eq!(list.borrow().len(), 3);
    assert!(matches!(list.borrow().first(), Some(HostValue::Int(2))));
    assert_eq!(
        cx.evaluate_string(&scope, "xs.reduce((a, b) => a + b, 0)", "t.js", 1).unwrap(),
        JsValue::Number(9.0)
    );
}

#[test]
fn host_fields_and_statics() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let shared = Rc::new(RefCell::new(5i32));
    let read = Rc::clone(&shared);
    let write = Rc::clone(&shared);
    let class = cx.register_host_class(
        HostClassDescriptor::new("Counter").field_mut(
            "count",
            move |_this| HostValue::Int(*read.borrow()),
            move |_this, value| {
                if let HostValue::Int(n) = value {
                    *write.borrow_mut() = n;
                }
                Ok(())
            },
        ),
    );
    cx.add_host_object(&scope, "counter", class, HostHandle::new(())).unwrap();
    assert_eq!(
        cx.evaluate_string(&scope, "counter.count", "t.js", 1).unwrap(),
        JsValue::Number(5.0)
    );
    cx.evaluate_string(&scope, "counter.count = 9", "t.js", 1).unwrap();
    assert_eq!(*shared.borrow(), 9);
}

#[test]
fn host_exceptions_are_wrapped() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let class = cx.register_host_class(HostClassDescriptor::new("Failing").method(
        "explode",
        vec![],
        |_cx, _this, _args| Err("disk on fire".to_owned()),
    ));
    cx.add_host_object(&scope, "host", class, HostHandle::new(())).unwrap();

    let err = cx.evaluate_string(&scope, "host.explode()", "t.js", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Wrapped);
    assert!(err.message().contains("disk on fire"));

    // Script code can catch the wrapped error and read its message.
    let result = cx
        .evaluate_string(
            &scope,
            "let m; try { host.explode(); } catch (e) { m = e.message; } m",
            "t.js",
            1,
        )
        .unwrap();
    assert_eq!(result, JsValue::String("disk on fire".to_owned()));
}

#[test]
fn wrapper_identity_is_preserved() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    let class = cx.register_host_class(HostClassDescriptor::new("Thing"));
    let handle = HostHandle::new(42i64);
    cx.add_host_object(&scope, "a", class, handle.clone()).unwrap();
    cx.add_host_object(&scope, "b", class, handle).unwrap();
    // The same host object wraps to the same Scriptable.
    assert_eq!(
        cx.evaluate_string(&scope, "a === b", "t.js", 1).unwrap(),
        JsValue::Bool(true)
    );
}

#[test]
fn script_function_adapts_to_host_interface() {
    let mut cx = Context::enter();
    let scope = cx.init_standard_objects();
    let iface = cx.register_host_interface("Transformer", "transform");
    let class = cx.register_host_class(HostClassDescriptor::new("Applier").method(
        "apply",
        vec![HostType::Int, HostType::Interface(iface)],
        |call_cx, _this, args| {
            let HostValue::Int(n) = args[0] else {
                return Err("expected int".to_owned());
            };
            let HostValue::Callback(callback) = &args[1] else {
                return Err("expected callback".to_owned());
            };
            // Dispatch back into the script function.
            call_cx.call_callback(callback, vec![HostValue::Int(n * 2)])
        },
    ));
    cx.add_host_object(&scope, "host", class, HostHandle::new(())).unwrap();

    // Function-shaped adapter.
    assert_eq!(
        cx.evaluate_string(&scope, "host.apply(21, v => v + 1)", "t.js", 1).unwrap(),
        JsValue::Number(43.0)
    );
    // Object-shaped adapter: the named method is bound as the callback.
    assert_eq!(
        cx.evaluate_string(
            &scope,
            "host.apply(10, { bias: 7, transform(v) { return v + this.bias; } })",
            "t.js",
            1,
        )
        .unwrap(),
        JsValue::Number(27.0)
    );
}

#[test]
fn host_iterable_participates_in_for_of() {
    struct Range(i32);

    struct RangeIter {
        next: i32,
        end: i32,
    }

    impl HostIterator for RangeIter {
        fn next_value(&mut self) -> Option<HostValue> {
            if self.next < self.end {
                let value = self.next;
                self.next += 1;
                Some(HostValue::Int(value))
            } else {
                None
            }
        }
    }

    impl HostIterable for Range {
        fn iterator(&self) -> Box<dyn HostIterator> {
            Box::new(RangeIter { next: 0, end: self.0 })
        }
    }

    let mut cx = Context::enter();
    let scope = cx.init_standard_objects();
    cx.add_host_iterable(&scope, "range", Rc::new(Range(4))).unwrap();
    assert_eq!(
        cx.evaluate_string(&scope, "let s = 0; for (let v of range) s += v; s", "t.js", 1).unwrap(),
        JsValue::Number(6.0)
    );
    // A second loop starts a fresh pass.
    assert_eq!(
        cx.evaluate_string(&scope, "let c = 0; for (let v of range) c++; c", "t.js", 1).unwrap(),
        JsValue::Number(4.0)
    );
}

#[test]
fn host_constructor_via_new() {
    let (mut cx, _console) = host_cx();
    let scope = cx.init_standard_objects();
    // The constructor closure needs its own class id, which only exists
    // after registration; a shared cell breaks the circle.
    let class_cell: Rc<std::cell::Cell<Option<skink::HostClassId>>> = Rc::new(std::cell::Cell::new(None));
    let ctor_class = Rc::clone(&class_cell);
    let class = cx.register_host_class(
        HostClassDescriptor::new("Box")
            .constructor(vec![HostType::Int], move |_cx, args| {
                let HostValue::Int(n) = args[0] else {
                    return Err("expected int".to_owned());
                };
                Ok(HostValue::Object {
                    class: ctor_class.get().expect("class registered"),
                    handle: HostHandle::new(n),
                })
            })
            .method("value", vec![], |_cx, this, _args| {
                let n = this.and_then(|h| h.downcast_ref::<i32>()).copied().unwrap_or(0);
                Ok(HostValue::Int(n))
            }),
    );
    class_cell.set(Some(class));
    cx.add_host_class_to_scope(&scope, "Box", class).unwrap();
    assert_eq!(
        cx.evaluate_string(&scope, "new Box(41).value() + 1", "t.js", 1).unwrap(),
        JsValue::Number(42.0)
    );
    // instanceof against the host constructor checks class membership.
    assert_eq!(
        cx.evaluate_string(&scope, "new Box(1) instanceof Box", "t.js", 1).unwrap(),
        JsValue::Bool(true)
    );
}
