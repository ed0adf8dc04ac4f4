//! Pending-object set guarded by the add lock.
//!
//! Newly added objects are parked here, invisible to queries and the
//! publisher, until the engine promotes them into the published map. The
//! separate lock means `add_object` never blocks on a publish cycle.

use qmf_types::{ManagedObject, ObjectId};
use std::collections::HashMap;
use std::sync::Arc;

/// Objects added by the host but not yet promoted.
pub struct PendingSet {
    epoch: u64,
    next_object_id: u64,
    objects: HashMap<ObjectId, Arc<dyn ManagedObject>>,
}

impl PendingSet {
    /// Creates an empty set; `epoch` is the boot sequence embedded in
    /// non-persistent identifiers.
    #[must_use]
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            next_object_id: 1,
            objects: HashMap::new(),
        }
    }

    /// Assigns an identifier and parks the object for promotion.
    ///
    /// The key is the caller's string, else the object's default key, else
    /// a counter value. Persistent objects get epoch 0.
    pub fn add(&mut self, object: Arc<dyn ManagedObject>, key: &str, persistent: bool) -> ObjectId {
        let epoch = if persistent { 0 } else { self.epoch };
        let name = if !key.is_empty() {
            key.to_string()
        } else {
            let derived = object.default_key();
            if !derived.is_empty() {
                derived
            } else {
                let n = self.next_object_id;
                self.next_object_id += 1;
                n.to_string()
            }
        };
        let id = ObjectId::new(epoch, name);
        object.state().set_object_id(id.clone());
        self.objects.insert(id.clone(), object);
        id
    }

    /// Drains every pending entry (promotion).
    pub fn drain(&mut self) -> Vec<(ObjectId, Arc<dyn ManagedObject>)> {
        self.objects.drain().collect()
    }

    /// Number of objects awaiting promotion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects await promotion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
