//! The host-interop bridge.
//!
//! Rust has no runtime reflection, so the embedder registers a
//! [`HostClassDescriptor`] per exposed class: fields, method overload sets,
//! constructors, and supertype links, each backed by closures. From that
//! the bridge synthesizes reflective member tables (with JavaBean-style
//! `getX`/`setX` collapsing and embedder name remapping), ranks overloads
//! by conversion weight at call sites, and coerces values in both
//! directions. Wrappers for the same host object within one context are
//! memoized so identity survives round-trips.

mod convert;
mod members;

use std::{
    any::Any,
    cell::{OnceCell, RefCell},
    fmt,
    rc::Rc,
};

pub(crate) use convert::{coerce_value, host_instance_of, select_ctor, select_overload};
pub(crate) use members::{MemberEntry, Members};

use crate::value::Value;

/// Identifier of a registered host class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostClassId(pub(crate) u32);

/// Identifier of a registered host interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostInterfaceId(pub(crate) u32);

/// Declared type of a host parameter, field, or return slot.
///
/// The numeric variants mirror the host language's primitive widths, which
/// is what the overload-ranking weights are defined over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    /// The host's root object type; accepts any script value.
    Any,
    /// A registered class; satisfied by wrapped instances of it or a
    /// subclass, or by `null`.
    Class(HostClassId),
    /// A registered single-method interface; satisfied by function-shaped
    /// script values through a generated adapter.
    Interface(HostInterfaceId),
    /// A host array with the given element type; script arrays materialize
    /// element-wise.
    Array(Box<HostType>),
}

/// Shared handle to a host object. Identity (`Rc` pointer) is the wrapper
/// cache key, so the same host object always wraps to the same Scriptable
/// within a context.
#[derive(Clone)]
pub struct HostHandle(Rc<dyn Any>);

impl HostHandle {
    pub fn new<V: Any>(value: V) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<V: Any>(&self) -> Option<&V> {
        self.0.downcast_ref()
    }

    /// Stable identity key for the wrapper cache.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle@{:x}", self.identity())
    }
}

/// An opaque script value passed through the bridge. Only meaningful inside
/// the context that produced it.
#[derive(Debug, Clone)]
pub struct ScriptValue(pub(crate) Value);

/// A script function (or function-shaped object method) adapted to a host
/// interface parameter. The host invokes it through [`HostCallCx`].
#[derive(Debug, Clone)]
pub struct ScriptCallback {
    pub(crate) func: Value,
    /// Receiver the adapter binds, for object-shaped adaptations.
    pub(crate) this_val: Value,
}

/// A value crossing the host boundary, in either direction.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    /// A wrapped instance of a registered host class.
    Object { class: HostClassId, handle: HostHandle },
    /// A live host list exposed to scripts with an indexed view.
    List(HostListRef),
    /// A materialized host array.
    Array(Vec<HostValue>),
    /// A script function adapted to an interface parameter.
    Callback(ScriptCallback),
    /// A script value passed through opaquely for `HostType::Any`.
    Opaque(ScriptValue),
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Byte(v) => f.debug_tuple("Byte").field(v).finish(),
            Self::Short(v) => f.debug_tuple("Short").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Long(v) => f.debug_tuple("Long").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::Char(v) => f.debug_tuple("Char").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::Object { class, handle } => f
                .debug_struct("Object")
                .field("class", class)
                .field("handle", handle)
                .finish(),
            Self::List(_) => write!(f, "List(..)"),
            Self::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Self::Callback(v) => f.debug_tuple("Callback").field(v).finish(),
            Self::Opaque(v) => f.debug_tuple("Opaque").field(v).finish(),
        }
    }
}

/// Capability handed to host method bodies so they can dispatch back into
/// script code (interface adapters).
pub trait HostCallCx {
    /// Invokes an adapted script function with the given arguments.
    fn call_callback(&mut self, callback: &ScriptCallback, args: Vec<HostValue>) -> Result<HostValue, String>;
}

/// Result type host closures return; the `Err` string becomes the message
/// of a script-visible `WrappedError`.
pub type HostResult = Result<HostValue, String>;

type MethodFn = Box<dyn Fn(&mut dyn HostCallCx, Option<&HostHandle>, &[HostValue]) -> HostResult>;
type FieldGetFn = Box<dyn Fn(Option<&HostHandle>) -> HostValue>;
type FieldSetFn = Box<dyn Fn(Option<&HostHandle>, HostValue) -> Result<(), String>>;
type CtorFn = Box<dyn Fn(&mut dyn HostCallCx, &[HostValue]) -> HostResult>;

pub(crate) struct HostMethodDef {
    pub name: String,
    pub is_static: bool,
    pub params: Vec<HostType>,
    /// Class the method was declared in, for specificity tie-breaking.
    pub declared_in: Option<HostClassId>,
    pub func: MethodFn,
}

impl fmt::Debug for HostMethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} params)", self.name, self.params.len())
    }
}

pub(crate) struct HostFieldDef {
    pub name: String,
    pub is_static: bool,
    pub get: FieldGetFn,
    pub set: Option<FieldSetFn>,
}

impl fmt::Debug for HostFieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub(crate) struct HostCtorDef {
    pub params: Vec<HostType>,
    pub func: CtorFn,
}

/// A registered host class with its lazily built member tables.
pub(crate) struct HostClass {
    pub name: String,
    pub supers: Vec<HostClassId>,
    pub methods: Vec<HostMethodDef>,
    pub fields: Vec<HostFieldDef>,
    pub ctors: Vec<HostCtorDef>,
    /// Member tables are expensive to synthesize, so construction is
    /// compute-if-absent; reads are free afterwards.
    members: OnceCell<Rc<Members>>,
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostClass({})", self.name)
    }
}

/// A registered single-method interface.
#[derive(Debug, Clone)]
pub struct HostInterface {
    pub name: String,
    /// Name of the interface's single abstract method, used to find the
    /// matching method on object-shaped adapters.
    pub method_name: String,
}

/// Builder for a host class registration.
///
/// Every member is declared with its statically known parameter types and a
/// closure implementing it; this plays the role reflection plays in hosts
/// that have it.
pub struct HostClassDescriptor {
    name: String,
    supers: Vec<HostClassId>,
    methods: Vec<HostMethodDef>,
    fields: Vec<HostFieldDef>,
    ctors: Vec<HostCtorDef>,
}

impl HostClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supers: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            ctors: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: HostClassId) -> Self {
        self.supers.push(superclass);
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        params: Vec<HostType>,
        func: impl Fn(&mut dyn HostCallCx, Option<&HostHandle>, &[HostValue]) -> HostResult + 'static,
    ) -> Self {
        self.methods.push(HostMethodDef {
            name: name.into(),
            is_static: false,
            params,
            declared_in: None,
            func: Box::new(func),
        });
        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        params: Vec<HostType>,
        func: impl Fn(&mut dyn HostCallCx, Option<&HostHandle>, &[HostValue]) -> HostResult + 'static,
    ) -> Self {
        self.methods.push(HostMethodDef {
            name: name.into(),
            is_static: true,
            params,
            declared_in: None,
            func: Box::new(func),
        });
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        get: impl Fn(Option<&HostHandle>) -> HostValue + 'static,
    ) -> Self {
        self.fields.push(HostFieldDef {
            name: name.into(),
            is_static: false,
            get: Box::new(get),
            set: None,
        });
        self
    }

    pub fn field_mut(
        mut self,
        name: impl Into<String>,
        get: impl Fn(Option<&HostHandle>) -> HostValue + 'static,
        set: impl Fn(Option<&HostHandle>, HostValue) -> Result<(), String> + 'static,
    ) -> Self {
        self.fields.push(HostFieldDef {
            name: name.into(),
            is_static: false,
            get: Box::new(get),
            set: Some(Box::new(set)),
        });
        self
    }

    pub fn constructor(
        mut self,
        params: Vec<HostType>,
        func: impl Fn(&mut dyn HostCallCx, &[HostValue]) -> HostResult + 'static,
    ) -> Self {
        self.ctors.push(HostCtorDef {
            params,
            func: Box::new(func),
        });
        self
    }
}

/// Registry of host classes and interfaces.
///
/// Built once and then shared read-only: contexts hold an `Rc` to it, so
/// several contexts on a thread reuse the same reflective caches while each
/// keeps its own wrapper identity map. Member-table construction inside is
/// compute-if-absent.
#[derive(Default)]
pub struct HostRegistry {
    classes: Vec<HostClass>,
    interfaces: Vec<HostInterface>,
    /// Embedder hook rewriting member names before they enter the binding
    /// tables (the annotation-driven remapping seam).
    name_remap: Option<Box<dyn Fn(&str) -> Option<String>>>,
    /// Prefixes stripped from method names before the bean `getX`/`setX`
    /// rule applies.
    bean_prefixes: Vec<String>,
}

impl fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRegistry({} classes)", self.classes.len())
    }
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class and returns its id. Methods remember the declaring
    /// class for overload specificity tie-breaking.
    pub fn register_class(&mut self, descriptor: HostClassDescriptor) -> HostClassId {
        let id = HostClassId(self.classes.len() as u32);
        let mut methods = descriptor.methods;
        for method in &mut methods {
            method.declared_in.get_or_insert(id);
        }
        self.classes.push(HostClass {
            name: descriptor.name,
            supers: descriptor.supers,
            methods,
            fields: descriptor.fields,
            ctors: descriptor.ctors,
            members: OnceCell::new(),
        });
        id
    }

    pub fn register_interface(&mut self, name: impl Into<String>, method_name: impl Into<String>) -> HostInterfaceId {
        let id = HostInterfaceId(self.interfaces.len() as u32);
        self.interfaces.push(HostInterface {
            name: name.into(),
            method_name: method_name.into(),
        });
        id
    }

    /// Installs the member-name remapping hook. Applies to methods and
    /// fields of classes whose member tables have not been built yet.
    pub fn set_name_remap(&mut self, remap: impl Fn(&str) -> Option<String> + 'static) {
        self.name_remap = Some(Box::new(remap));
    }

    /// Adds a prefix stripped before bean-property synthesis.
    pub fn add_bean_prefix(&mut self, prefix: impl Into<String>) {
        self.bean_prefixes.push(prefix.into());
    }

    pub(crate) fn class(&self, id: HostClassId) -> &HostClass {
        &self.classes[id.0 as usize]
    }

    pub(crate) fn interface(&self, id: HostInterfaceId) -> &HostInterface {
        &self.interfaces[id.0 as usize]
    }

    /// The member tables for a class, built on first use.
    pub(crate) fn members(&self, id: HostClassId) -> Rc<Members> {
        let class = self.class(id);
        Rc::clone(class.members.get_or_init(|| {
            Rc::new(members::build_members(
                class,
                self.name_remap.as_deref(),
                &self.bean_prefixes,
            ))
        }))
    }

    /// Whether `class` is `wanted` or one of its transitive supertypes.
    pub(crate) fn is_subclass(&self, class: HostClassId, wanted: HostClassId) -> bool {
        if class == wanted {
            return true;
        }
        self.class(class)
            .supers
            .iter()
            .any(|&sup| self.is_subclass(sup, wanted))
    }
}

// ---------------------------------------------------------------------------
// Host collections
// ---------------------------------------------------------------------------

/// An integer-indexed host collection exposed to scripts.
///
/// Wrappers built over this trait present the script-side array surface
/// (`length`, `push`, `slice`, iteration and the rest); the trait itself
/// stays minimal so embedders can adapt any sequential container.
pub trait HostList {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> HostValue;
    fn set(&mut self, index: usize, value: HostValue);
    fn insert(&mut self, index: usize, value: HostValue);
    fn remove(&mut self, index: usize) -> HostValue;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HostList for Vec<HostValue> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> HostValue {
        self.as_slice().get(index).cloned().unwrap_or(HostValue::Undefined)
    }

    fn set(&mut self, index: usize, value: HostValue) {
        if index < Vec::len(self) {
            self[index] = value;
        } else {
            self.resize(index, HostValue::Undefined);
            self.push(value);
        }
    }

    fn insert(&mut self, index: usize, value: HostValue) {
        Vec::insert(self, index.min(Vec::len(self)), value);
    }

    fn remove(&mut self, index: usize) -> HostValue {
        if index < Vec::len(self) {
            Vec::remove(self, index)
        } else {
            HostValue::Undefined
        }
    }
}

/// Shared mutable reference to a host list.
pub type HostListRef = Rc<RefCell<dyn HostList>>;

/// One pass over a host iterable; `hasNext`/`next` folded into a single
/// Option-returning step the evaluator turns into `{value, done}` objects.
pub trait HostIterator {
    fn next_value(&mut self) -> Option<HostValue>;
}

/// A host iterable: yields a fresh iterator per `for…of` loop.
pub trait HostIterable {
    fn iterator(&self) -> Box<dyn HostIterator>;
}

/// Shared reference to a host iterable.
pub type HostIterableRef = Rc<dyn HostIterable>;

/// Iterator over a vector snapshot, the simplest `HostIterable` backing.
pub struct VecIterator {
    items: std::vec::IntoIter<HostValue>,
}

impl VecIterator {
    pub fn new(items: Vec<HostValue>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl HostIterator for VecIterator {
    fn next_value(&mut self) -> Option<HostValue> {
        self.items.next()
    }
}

// ---------------------------------------------------------------------------
// Type wrappers
// ---------------------------------------------------------------------------

/// Embedder-supplied custom coercion.
///
/// Consulted before the standard ranking; returning `Some(0)` from
/// [`TypeWrapper::weight`] short-circuits overload resolution with a
/// "nontrivial" exact match.
pub trait TypeWrapper {
    fn weight(&self, value: &ScriptValue, target: &HostType) -> Option<u32>;
    fn wrap(&self, value: &ScriptValue, target: &HostType) -> Option<HostValue>;
}

/// Per-context registry of [`TypeWrapper`]s.
#[derive(Default)]
pub struct TypeWrappers {
    wrappers: Vec<Box<dyn TypeWrapper>>,
}

impl fmt::Debug for TypeWrappers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeWrappers({})", self.wrappers.len())
    }
}

impl TypeWrappers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, wrapper: impl TypeWrapper + 'static) {
        self.wrappers.push(Box::new(wrapper));
    }

    pub(crate) fn weight(&self, value: &ScriptValue, target: &HostType) -> Option<u32> {
        self.wrappers.iter().find_map(|w| w.weight(value, target))
    }

    pub(crate) fn wrap(&self, value: &ScriptValue, target: &HostType) -> Option<HostValue> {
        self.wrappers.iter().find_map(|w| w.wrap(value, target))
    }
}

/// Customization hook for host-to-script wrapping.
pub trait WrapFactory {
    /// Diagnostic class name for a wrapper; default keeps the registered
    /// descriptor name.
    fn class_name_for(&self, descriptor_name: &str) -> Option<String> {
        let _ = descriptor_name;
        None
    }

    /// Whether bean properties are synthesized on wrappers.
    fn expose_beans(&self) -> bool {
        true
    }
}

/// The default wrap factory: descriptor names as-is, beans exposed.
#[derive(Debug, Default)]
pub struct DefaultWrapFactory;

impl WrapFactory for DefaultWrapFactory {}
