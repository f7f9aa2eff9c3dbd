//! The embedder-facing execution context.
//!
//! A `Context` is the unit of execution: it owns the heap arena, the symbol
//! registry, the realm of standard objects, the host-wrapper caches, and the
//! script call stack. All evaluation runs on one thread between context
//! entry and exit; dropping the context releases every object it allocated.

use std::rc::Rc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    ast::ScriptAst,
    env::{EnvKind, Environment},
    error::{ErrorKind, RunError, Thrown},
    exception::{Exception, StackFrame},
    heap::{Heap, HeapId},
    host::{HostClassId, HostHandle, HostIterableRef, HostListRef, HostRegistry, TypeWrappers, WrapFactory},
    io::{ConsoleWriter, StdConsole},
    jsvalue::JsValue,
    object::{JsObject, ObjectData, Property},
    parse::parse,
    prepare::prepare,
    report::CollectingReporter,
    resource::{LimitedTracker, NoLimitTracker, ResourceLimits, ResourceTracker},
    value::{SymbolRegistry, Value},
};

/// A root scope handle returned by [`Context::init_standard_objects`].
///
/// Scopes are plain references into the owning context's heap; using one
/// with a different context is an error the context detects by id misuse
/// (debug builds panic on out-of-range ids).
#[derive(Debug, Clone, Copy)]
pub struct Scope(pub(crate) HeapId);

/// Heap ids of the intrinsic objects of one realm.
#[derive(Debug, Clone)]
pub(crate) struct Realm {
    pub object_proto: HeapId,
    pub function_proto: HeapId,
    pub array_proto: HeapId,
    pub string_proto: HeapId,
    pub number_proto: HeapId,
    pub boolean_proto: HeapId,
    pub bigint_proto: HeapId,
    pub symbol_proto: HeapId,
    pub map_proto: HeapId,
    pub set_proto: HeapId,
    pub iterator_proto: HeapId,
    pub regexp_proto: HeapId,
    pub date_proto: HeapId,
    /// Prototype shared by host-list wrappers, carrying the array-like
    /// method suite.
    pub host_list_proto: HeapId,
    /// `Error.prototype`; per-kind prototypes chain to it.
    pub error_proto: HeapId,
    pub error_protos: AHashMap<ErrorKind, HeapId>,
}

/// One frame of the script call stack, updated as statements execute so
/// error captures see accurate line numbers.
#[derive(Debug, Clone)]
pub(crate) struct Activation {
    pub function_name: Rc<str>,
    pub source: Rc<str>,
    pub line: u32,
}

/// A compiled script: parsed, resolved, and reusable across executions.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompiledCode {
    pub ast: ScriptAst,
}

/// A reusable compiled script.
///
/// Obtained from [`Context::compile_string`]; executing it against a scope
/// runs the same program without re-parsing. The binary form produced by
/// [`Script::dump`] round-trips through [`Script::load`], which lets
/// embedders cache compilation results.
#[derive(Debug, Clone)]
pub struct Script {
    pub(crate) code: Rc<CompiledCode>,
}

impl Script {
    /// Serializes the compiled script to a compact binary format.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(&*self.code)
    }

    /// Restores a script serialized with [`Script::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        let code: CompiledCode = postcard::from_bytes(bytes)?;
        Ok(Self { code: Rc::new(code) })
    }

    /// Executes the script in `scope`, returning the completion value.
    pub fn exec<T: ResourceTracker>(&self, cx: &mut Context<T>, scope: &Scope) -> Result<JsValue, Exception> {
        cx.exec_compiled(&self.code, scope)
    }

    /// Checks the AST position invariant: every node's position is
    /// non-negative and `position + length` stays within its parent.
    pub fn verify_positions(&self) -> Result<(), String> {
        self.code.ast.verify_positions()
    }
}

/// The execution context.
///
/// Generic over the resource tracker like the heap it owns; the default is
/// unlimited. Use [`Context::with_limits`] for sandboxed execution.
pub struct Context<T: ResourceTracker = NoLimitTracker> {
    pub(crate) heap: Heap<T>,
    pub(crate) symbols: SymbolRegistry,
    pub(crate) realm: Option<Realm>,
    pub(crate) global: Option<HeapId>,
    pub(crate) host: Rc<HostRegistry>,
    pub(crate) type_wrappers: TypeWrappers,
    pub(crate) wrap_factory: Box<dyn WrapFactory>,
    /// Host identity -> wrapper, so the same host object always surfaces as
    /// the same Scriptable within this context.
    pub(crate) wrapper_cache: AHashMap<usize, HeapId>,
    pub(crate) console: Box<dyn ConsoleWriter>,
    /// Cancellation hook, consulted before each statement.
    pub(crate) interrupt: Option<Box<dyn FnMut() -> bool>>,
    pub(crate) call_stack: Vec<Activation>,
}

impl Context<NoLimitTracker> {
    /// Enters a new unrestricted context.
    pub fn enter() -> Self {
        Self::with_tracker(NoLimitTracker)
    }
}

impl Context<LimitedTracker> {
    /// Enters a context whose execution is bounded by `limits`.
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self::with_tracker(LimitedTracker::new(limits))
    }
}

impl<T: ResourceTracker> Context<T> {
    pub fn with_tracker(tracker: T) -> Self {
        Self {
            heap: Heap::new(tracker),
            symbols: SymbolRegistry::new(),
            realm: None,
            global: None,
            host: Rc::new(HostRegistry::new()),
            type_wrappers: TypeWrappers::new(),
            wrap_factory: Box::new(crate::host::DefaultWrapFactory),
            wrapper_cache: AHashMap::new(),
            console: Box::new(StdConsole),
            interrupt: None,
            call_stack: Vec::new(),
        }
    }

    /// Exits the context, releasing every object it allocated. Dropping the
    /// context does the same; this form exists for explicit pairing with
    /// [`Context::enter`].
    pub fn exit(self) {}

    /// Populates a fresh global object with the standard built-ins and
    /// returns it as the root scope.
    pub fn init_standard_objects(&mut self) -> Scope {
        if let Some(global) = self.global {
            return Scope(global);
        }
        let global = crate::builtins::install_standard_objects(self).expect("standard objects install");
        self.global = Some(global);
        Scope(global)
    }

    fn root_scope(&mut self) -> Scope {
        self.init_standard_objects()
    }

    /// Replaces the console sink.
    pub fn set_console(&mut self, console: impl ConsoleWriter + 'static) {
        self.console = Box::new(console);
    }

    /// Installs the cancellation hook. When it returns `true` the evaluator
    /// raises a `Terminated` error that script `catch` cannot intercept.
    pub fn set_interrupt_handler(&mut self, hook: impl FnMut() -> bool + 'static) {
        self.interrupt = Some(Box::new(hook));
    }

    /// Shares a pre-built host registry with this context. Registries are
    /// immutable once shared, so several contexts can reuse one set of
    /// reflective caches.
    pub fn set_host_registry(&mut self, registry: Rc<HostRegistry>) {
        self.host = registry;
    }

    /// Registers a host class on this context's registry. Fails once the
    /// registry is shared with another context.
    pub fn register_host_class(&mut self, descriptor: crate::host::HostClassDescriptor) -> HostClassId {
        Rc::get_mut(&mut self.host)
            .expect("host registry is shared; register classes before sharing")
            .register_class(descriptor)
    }

    /// Registers a single-method host interface, the target type for
    /// function-shaped adaptation.
    pub fn register_host_interface(
        &mut self,
        name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> crate::host::HostInterfaceId {
        Rc::get_mut(&mut self.host)
            .expect("host registry is shared; register interfaces before sharing")
            .register_interface(name, method_name)
    }

    /// Installs a host class's constructor set into a scope, so scripts can
    /// `new Name(...)` and use `instanceof Name`.
    pub fn add_host_class_to_scope(&mut self, scope: &Scope, name: &str, class: HostClassId) -> Result<(), Exception> {
        let realm = self.realm_ref().clone();
        let data = crate::object::FunctionData {
            kind: crate::object::FunctionKind::HostCtor { class },
            name: Rc::from(name),
            length: 0,
        };
        let func = JsObject::function(Some(realm.function_proto), data);
        let id = self
            .heap
            .alloc_object(func)
            .map_err(|err| self.run_error_to_exception(err))?;
        self.heap.object_mut(scope.0).define_data(name, Value::Object(id));
        Ok(())
    }

    /// The custom-coercion registry consulted during overload ranking.
    pub fn type_wrappers(&mut self) -> &mut TypeWrappers {
        &mut self.type_wrappers
    }

    pub fn wrap_factory(&self) -> &dyn WrapFactory {
        &*self.wrap_factory
    }

    pub fn set_wrap_factory(&mut self, factory: impl WrapFactory + 'static) {
        self.wrap_factory = Box::new(factory);
    }

    // -- script entry points ----------------------------------------------

    /// Parses and resolves `source`, reporting syntax errors as a
    /// `SyntaxError` exception carrying the first diagnostic.
    pub fn compile_string(&mut self, source: &str, source_name: &str, first_line: u32) -> Result<Script, Exception> {
        let mut reporter = CollectingReporter::new();
        let script = self.compile_with_reporter(source, source_name, first_line, &mut reporter);
        match reporter.first_error() {
            Some(error) => Err(error),
            None => Ok(script),
        }
    }

    /// Like [`Context::compile_string`] but routing every diagnostic through
    /// the embedder's reporter. Parsing recovers at statement boundaries, so
    /// the reporter may receive several errors from one pass; the returned
    /// script covers whatever was salvaged and the embedder decides whether
    /// reported errors are fatal.
    pub fn compile_with_reporter(
        &mut self,
        source: &str,
        source_name: &str,
        first_line: u32,
        reporter: &mut dyn crate::report::ErrorReporter,
    ) -> Script {
        let mut ast = parse(source, source_name, first_line, false, reporter);
        prepare(&mut ast, reporter);
        Script {
            code: Rc::new(CompiledCode { ast }),
        }
    }

    /// Parses and runs `source` in `scope`, returning the completion value.
    pub fn evaluate_string(
        &mut self,
        scope: &Scope,
        source: &str,
        source_name: &str,
        first_line: u32,
    ) -> Result<JsValue, Exception> {
        let script = self.compile_string(source, source_name, first_line)?;
        self.exec_compiled(&script.code, scope)
    }

    /// Installs a data value into a scope under `name`.
    pub fn add_to_scope(&mut self, scope: &Scope, name: &str, value: JsValue) -> Result<(), Exception> {
        let value = self
            .jsvalue_to_value(&value)
            .map_err(|err| self.run_error_to_exception(err))?;
        self.heap.object_mut(scope.0).define_data(name, value);
        Ok(())
    }

    /// Wraps a registered host object and installs it into a scope.
    pub fn add_host_object(
        &mut self,
        scope: &Scope,
        name: &str,
        class: HostClassId,
        handle: HostHandle,
    ) -> Result<(), Exception> {
        let wrapped = self
            .wrap_host_object(class, handle)
            .map_err(|err| self.run_error_to_exception(err))?;
        self.heap.object_mut(scope.0).define_data(name, Value::Object(wrapped));
        Ok(())
    }

    /// Wraps a live host list and installs it into a scope.
    pub fn add_host_list(&mut self, scope: &Scope, name: &str, list: HostListRef) -> Result<(), Exception> {
        let wrapped = self
            .wrap_host_list(list)
            .map_err(|err| self.run_error_to_exception(err))?;
        self.heap.object_mut(scope.0).define_data(name, Value::Object(wrapped));
        Ok(())
    }

    /// Wraps a host iterable and installs it into a scope. The wrapper's
    /// `@@iterator` yields elements through the script iterator protocol.
    pub fn add_host_iterable(&mut self, scope: &Scope, name: &str, iterable: HostIterableRef) -> Result<(), Exception> {
        let realm = self.realm_ref().clone();
        let obj = JsObject::with_data(Some(realm.object_proto), "JavaObject", ObjectData::HostIterable(iterable));
        let id = self
            .heap
            .alloc_object(obj)
            .map_err(|err| self.run_error_to_exception(err))?;
        self.attach_host_iterable_iterator(id)
            .map_err(|err| self.run_error_to_exception(err))?;
        self.heap.object_mut(scope.0).define_data(name, Value::Object(id));
        Ok(())
    }

    // -- internals shared with the evaluator -------------------------------

    pub(crate) fn realm_ref(&self) -> &Realm {
        self.realm.as_ref().expect("standard objects not initialized")
    }

    pub(crate) fn global_id(&self) -> HeapId {
        self.global.expect("standard objects not initialized")
    }

    /// Runs a compiled script against `scope`, translating the result to
    /// the public value form.
    fn exec_compiled(&mut self, code: &Rc<CompiledCode>, scope: &Scope) -> Result<JsValue, Exception> {
        let _ = self.root_scope();
        let result = self.run_program(code, scope.0);
        match result {
            Ok(value) => Ok(self.value_to_jsvalue(&value)),
            Err(err) => Err(self.run_error_to_exception(err)),
        }
    }

    /// Converts an internal error into the public exception, materializing
    /// location and stack information.
    pub(crate) fn run_error_to_exception(&mut self, err: RunError) -> Exception {
        match err {
            RunError::Terminated => {
                Exception::new(ErrorKind::Terminated, "script execution was terminated".to_owned())
                    .with_stack(self.capture_stack())
            }
            RunError::Throw(Thrown::Native(native)) => native.into_exception(),
            RunError::Throw(Thrown::Value(value)) => self.thrown_value_to_exception(&value),
        }
    }

    /// Snapshot of the script call stack, innermost frame first.
    pub(crate) fn capture_stack(&self) -> Vec<StackFrame> {
        self.call_stack
            .iter()
            .rev()
            .map(|frame| StackFrame {
                file_name: frame.source.to_string(),
                function_name: frame.function_name.to_string(),
                line_number: frame.line,
            })
            .collect()
    }

    /// Allocates a block/function environment frame.
    pub(crate) fn new_env(&mut self, kind: EnvKind, parent: Option<HeapId>, scope: &crate::ast::ScopeInfo) -> crate::error::RunResult<HeapId> {
        self.heap.alloc_env(Environment::from_scope(kind, parent, scope))
    }

    /// Defines a frozen-style property used for bean members and the like.
    pub(crate) fn define_locked(&mut self, object: HeapId, name: &str, value: Value) {
        self.heap
            .object_mut(object)
            .properties
            .insert(Rc::from(name), Property::frozen_data(value));
    }
}

impl<T: ResourceTracker> std::fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("heap_len", &self.heap.len())
            .field("initialized", &self.global.is_some())
            .finish()
    }
}
