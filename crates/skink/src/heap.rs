use std::fmt;

use crate::{
    env::Environment,
    error::RunResult,
    object::JsObject,
    resource::ResourceTracker,
};

/// Index of an allocated object in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct HeapId(u32);

impl HeapId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One slot of the heap arena.
pub(crate) enum HeapData {
    Object(JsObject),
    Env(Environment),
}

impl fmt::Debug for HeapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(obj) => write!(f, "Object({})", obj.class_name),
            Self::Env(_) => f.write_str("Env"),
        }
    }
}

/// Arena holding every Scriptable and environment frame of one context.
///
/// Allocation is append-only: objects live until the context is dropped, so
/// references can be plain indices with no lifetime or refcount discipline.
/// The resource tracker sees every allocation with a size estimate, which is
/// how embedders bound heap growth.
#[derive(Debug)]
pub(crate) struct Heap<T: ResourceTracker> {
    slots: Vec<HeapData>,
    tracker: T,
}

impl<T: ResourceTracker> Heap<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            slots: Vec::new(),
            tracker,
        }
    }

    pub fn allocate(&mut self, data: HeapData) -> RunResult<HeapId> {
        let size = match &data {
            HeapData::Object(obj) => obj.estimate_size(),
            HeapData::Env(env) => env.estimate_size(),
        };
        self.tracker.on_allocate(size)?;
        let id = HeapId(self.slots.len() as u32);
        self.slots.push(data);
        Ok(id)
    }

    pub fn alloc_object(&mut self, obj: JsObject) -> RunResult<HeapId> {
        self.allocate(HeapData::Object(obj))
    }

    pub fn alloc_env(&mut self, env: Environment) -> RunResult<HeapId> {
        self.allocate(HeapData::Env(env))
    }

    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.index()]
    }

    /// The object at `id`.
    ///
    /// # Panics
    /// Panics when the slot holds an environment; ids are never exposed to
    /// code that could mix the two up.
    pub fn object(&self, id: HeapId) -> &JsObject {
        match self.get(id) {
            HeapData::Object(obj) => obj,
            HeapData::Env(_) => panic!("heap id {id:?} is an environment, not an object"),
        }
    }

    pub fn object_mut(&mut self, id: HeapId) -> &mut JsObject {
        match self.get_mut(id) {
            HeapData::Object(obj) => obj,
            HeapData::Env(_) => panic!("heap id {id:?} is an environment, not an object"),
        }
    }

    pub fn env(&self, id: HeapId) -> &Environment {
        match self.get(id) {
            HeapData::Env(env) => env,
            HeapData::Object(_) => panic!("heap id {id:?} is an object, not an environment"),
        }
    }

    pub fn env_mut(&mut self, id: HeapId) -> &mut Environment {
        match self.get_mut(id) {
            HeapData::Env(env) => env,
            HeapData::Object(_) => panic!("heap id {id:?} is an object, not an environment"),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }
}
