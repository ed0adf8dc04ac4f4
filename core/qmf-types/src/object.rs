//! The managed-object capability interface and its change-tracking state.

use crate::timestamp::now_ns;
use crate::{ObjectId, SchemaId};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Method status codes reported at the QMF boundary.
pub mod status {
    /// The method succeeded.
    pub const OK: u32 = 0;
    /// The addressed object does not exist (or is deleted).
    pub const UNKNOWN_OBJECT: u32 = 1;
    /// The object does not implement the named method.
    pub const UNKNOWN_METHOD: u32 = 2;
    /// The method exists but is not implemented.
    pub const NOT_IMPLEMENTED: u32 = 3;
    /// A request argument was missing or malformed.
    pub const PARAMETER_INVALID: u32 = 4;
    /// The feature behind the method is not implemented.
    pub const FEATURE_NOT_IMPLEMENTED: u32 = 5;
    /// The caller may not invoke this method.
    pub const FORBIDDEN: u32 = 6;
    /// The invocation failed with an exception.
    pub const EXCEPTION: u32 = 7;

    /// Human-readable text for a status code.
    #[must_use]
    pub fn text(code: u32) -> &'static str {
        match code {
            OK => "OK",
            UNKNOWN_OBJECT => "UnknownObject",
            UNKNOWN_METHOD => "UnknownMethod",
            NOT_IMPLEMENTED => "NotImplemented",
            PARAMETER_INVALID => "InvalidParameter",
            FEATURE_NOT_IMPLEMENTED => "FeatureNotImplemented",
            FORBIDDEN => "Forbidden",
            EXCEPTION => "Exception",
            _ => "??",
        }
    }
}

/// Outcome of a managed-object method invocation.
#[derive(Debug, Clone, Default)]
pub struct MethodResult {
    /// Status code (see [`status`]).
    pub status: u32,
    /// Status text.
    pub text: String,
    /// Output arguments, returned to the console on success.
    pub out_args: Map<String, Value>,
}

impl MethodResult {
    /// A successful invocation with the given output arguments.
    #[must_use]
    pub fn ok(out_args: Map<String, Value>) -> Self {
        Self {
            status: status::OK,
            text: status::text(status::OK).to_string(),
            out_args,
        }
    }

    /// A failed invocation.
    #[must_use]
    pub fn error(code: u32, text: impl Into<String>) -> Self {
        Self {
            status: code,
            text: text.into(),
            out_args: Map::new(),
        }
    }
}

/// Change-tracking state shared between a managed object and the agent.
///
/// The host flips the change flags as its entity mutates; the publisher
/// clears them as it emits data indications. A fresh state starts with both
/// change flags set so a new object is published on its first cycle.
#[derive(Debug)]
pub struct ObjectState {
    config_changed: AtomicBool,
    inst_changed: AtomicBool,
    force_publish: AtomicBool,
    deleted: AtomicBool,
    /// Transient per-cycle marker owned by the publisher.
    publish_flag: AtomicU8,
    create_time: AtomicU64,
    update_time: AtomicU64,
    delete_time: AtomicU64,
    object_id: RwLock<Option<ObjectId>>,
}

impl ObjectState {
    /// Creates fresh state with both change flags set.
    #[must_use]
    pub fn new() -> Self {
        let now = now_ns();
        Self {
            config_changed: AtomicBool::new(true),
            inst_changed: AtomicBool::new(true),
            force_publish: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
            publish_flag: AtomicU8::new(0),
            create_time: AtomicU64::new(now),
            update_time: AtomicU64::new(now),
            delete_time: AtomicU64::new(0),
            object_id: RwLock::new(None),
        }
    }

    /// Whether the properties changed since they were last published.
    pub fn config_changed(&self) -> bool {
        self.config_changed.load(Ordering::SeqCst)
    }

    /// Marks the properties as changed.
    pub fn mark_config_changed(&self) {
        self.config_changed.store(true, Ordering::SeqCst);
    }

    /// Clears the property-change flag (publisher side).
    pub fn clear_config_changed(&self) {
        self.config_changed.store(false, Ordering::SeqCst);
    }

    /// Whether the statistics changed since they were last published.
    pub fn inst_changed(&self) -> bool {
        self.inst_changed.load(Ordering::SeqCst)
    }

    /// Marks the statistics as changed.
    pub fn mark_inst_changed(&self) {
        self.inst_changed.store(true, Ordering::SeqCst);
    }

    /// Clears the statistics-change flag (publisher side).
    pub fn clear_inst_changed(&self) {
        self.inst_changed.store(false, Ordering::SeqCst);
    }

    /// Whether the next cycle must publish regardless of change flags.
    pub fn force_publish(&self) -> bool {
        self.force_publish.load(Ordering::SeqCst)
    }

    /// Sets or clears the force-publish flag.
    pub fn set_force_publish(&self, value: bool) {
        self.force_publish.store(value, Ordering::SeqCst);
    }

    /// Whether the object has been flagged for deletion.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Flags the object as deleted and stamps the deletion time.
    /// It will be published one final time, then destroyed.
    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
        self.delete_time.store(now_ns(), Ordering::SeqCst);
    }

    /// The transient per-cycle publisher marker.
    pub fn publish_flag(&self) -> u8 {
        self.publish_flag.load(Ordering::SeqCst)
    }

    /// Sets the transient per-cycle publisher marker.
    pub fn set_publish_flag(&self, value: u8) {
        self.publish_flag.store(value, Ordering::SeqCst);
    }

    /// Creation timestamp, nanoseconds since the epoch.
    pub fn create_time(&self) -> u64 {
        self.create_time.load(Ordering::SeqCst)
    }

    /// Last-update timestamp, nanoseconds since the epoch.
    pub fn update_time(&self) -> u64 {
        self.update_time.load(Ordering::SeqCst)
    }

    /// Deletion timestamp (0 while the object is alive).
    pub fn delete_time(&self) -> u64 {
        self.delete_time.load(Ordering::SeqCst)
    }

    /// Stamps the last-update timestamp with the current time.
    pub fn touch_update_time(&self) {
        self.update_time.store(now_ns(), Ordering::SeqCst);
    }

    /// The identifier assigned at registration, if any.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.object_id.read().clone()
    }

    /// Assigns the object's identifier (agent side).
    pub fn set_object_id(&self, id: ObjectId) {
        *self.object_id.write() = Some(id);
    }

    /// Writes the three lifecycle timestamps into a wire map.
    pub fn write_timestamps(&self, map: &mut Map<String, Value>) {
        map.insert("_update_ts".to_string(), Value::from(self.update_time()));
        map.insert("_create_ts".to_string(), Value::from(self.create_time()));
        map.insert("_delete_ts".to_string(), Value::from(self.delete_time()));
    }
}

impl Default for ObjectState {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability interface for an entity published through the agent.
///
/// The registry owns registered objects; the host may keep an `Arc` clone to
/// flip change flags or invoke its own logic, but must not assume the object
/// outlives its deletion cycle.
pub trait ManagedObject: Send + Sync {
    /// Schema identity (package, class, hash) of this object.
    fn schema_id(&self) -> SchemaId;

    /// The change-tracking state driven by the agent.
    fn state(&self) -> &ObjectState;

    /// Key used when the host does not supply one at registration.
    fn default_key(&self) -> String {
        String::new()
    }

    /// Serializes the property map.
    fn encode_properties(&self) -> Map<String, Value>;

    /// Serializes the statistics map.
    fn encode_statistics(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Whether the schema defines statistics.
    fn has_statistics(&self) -> bool {
        false
    }

    /// Invokes a named method with the given input arguments.
    fn do_method(&self, name: &str, in_args: &Map<String, Value>) -> MethodResult;

    /// Whether two objects share a schema (used for publish batching).
    fn is_same_class(&self, other: &dyn ManagedObject) -> bool {
        self.schema_id() == other.schema_id()
    }
}
