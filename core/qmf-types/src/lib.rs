//! Core types for the QMF management agent.
//!
//! A host process embeds the agent to expose telemetry, configuration and
//! invocable operations to a message-bus broker. This crate holds the
//! vocabulary shared between the host and the agent runtime:
//!
//! - **Identifiers**: [`ObjectId`] names a managed object across the fleet;
//!   [`SchemaId`] and [`SchemaClassKey`] name schema classes by package,
//!   class and 128-bit hash.
//! - **Capabilities**: [`ManagedObject`] and [`ManagedEvent`] are the
//!   interfaces the host implements for entities it wants published;
//!   [`ObjectState`] is the change-tracking cell the agent drives.
//! - **Method dispatch**: [`MethodResult`] and the [`status`] codes reported
//!   at the QMF boundary.

mod event;
mod ids;
mod object;
mod schema;
pub mod timestamp;

pub use event::{ManagedEvent, Severity};
pub use ids::ObjectId;
pub use object::{status, ManagedObject, MethodResult, ObjectState};
pub use schema::{ClassKind, SchemaClassKey, SchemaHash, SchemaId};
