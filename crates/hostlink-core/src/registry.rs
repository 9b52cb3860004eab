//! Object registry
//!
//! Bidirectional id ↔ object map. Identity is the address of the shared
//! handle: while the registry holds an `Arc`, that address cannot be reused by
//! another allocation, so the two maps stay mutual inverses.

use core::any::Any;
use hashbrown::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::errors::RegistryError;
use crate::types::{ClassId, MethodId, ObjectId};

// ----------------------------------------------------------------------------
// Host Object Trait
// ----------------------------------------------------------------------------

/// A scripting-side proxy for an object that lives on the native host
pub trait HostObject: Any + Send + Sync {
    /// Class the object's opcodes are namespaced under
    fn class_id(&self) -> ClassId;

    /// Instance method id of the class's "destroy" operation
    fn destroy_method(&self) -> MethodId;

    /// Stop pending local work before the destroy command is emitted
    fn on_destroy(&self) {}

    fn as_any(&self) -> &dyn Any;
}

impl dyn HostObject {
    /// Downcast to a concrete host object type
    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

// ----------------------------------------------------------------------------
// Object Registry
// ----------------------------------------------------------------------------

/// Live objects keyed both by id and by handle identity
pub struct ObjectRegistry<T: ?Sized = dyn HostObject> {
    by_id: HashMap<ObjectId, Arc<T>>,
    by_addr: HashMap<usize, ObjectId>,
    next_id: u32,
}

impl<T: ?Sized> Default for ObjectRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ObjectRegistry<T> {
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_addr: HashMap::new(),
            next_id: 1,
        }
    }

    fn addr(obj: &Arc<T>) -> usize {
        Arc::as_ptr(obj) as *const () as usize
    }

    /// Register an object, returning its id
    ///
    /// An object that is already registered keeps its existing id. Ids are
    /// never handed out twice within the lifetime of a registry.
    pub fn register(&mut self, obj: &Arc<T>) -> Result<ObjectId, RegistryError> {
        let addr = Self::addr(obj);
        if let Some(id) = self.by_addr.get(&addr) {
            return Ok(*id);
        }

        let id = ObjectId::new(self.next_id).ok_or(RegistryError::Exhausted)?;
        self.next_id = self.next_id.checked_add(1).unwrap_or(0);

        self.by_id.insert(id, Arc::clone(obj));
        self.by_addr.insert(addr, id);
        debug!(object_id = %id, "registered object");
        Ok(id)
    }

    /// Remove an object from both directions
    pub fn unregister(&mut self, obj: &Arc<T>) -> Option<ObjectId> {
        let id = self.by_addr.remove(&Self::addr(obj))?;
        self.by_id.remove(&id);
        debug!(object_id = %id, "unregistered object");
        Some(id)
    }

    /// Remove an object by id
    pub fn unregister_id(&mut self, id: ObjectId) -> Option<Arc<T>> {
        let obj = self.by_id.remove(&id)?;
        self.by_addr.remove(&Self::addr(&obj));
        debug!(object_id = %id, "unregistered object");
        Some(obj)
    }

    /// Resolve an id; `None` for ids that were never registered or already removed
    pub fn id_to_object(&self, id: ObjectId) -> Option<&Arc<T>> {
        self.by_id.get(&id)
    }

    pub fn object_to_id(&self, obj: &Arc<T>) -> Option<ObjectId> {
        self.by_addr.get(&Self::addr(obj)).copied()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate over live ids
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.by_id.keys().copied()
    }
}
