//! Schema package registry.

use qmf_types::{ClassKind, SchemaClassKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Callback that serializes a class schema on demand.
pub type SchemaWriter = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// A registered schema class.
#[derive(Clone)]
pub struct SchemaClass {
    /// Table or event.
    pub kind: ClassKind,
    /// Produces the schema bytes announced on schema-request.
    pub writer: SchemaWriter,
}

/// Packages mapped to their classes, each keyed by `(name, hash)`.
///
/// A class, once registered, is immutable: re-registering the same key is a
/// no-op. Schemas live for the agent's lifetime.
#[derive(Default)]
pub struct SchemaRegistry {
    packages: HashMap<String, HashMap<SchemaClassKey, SchemaClass>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class, returning whether the package is new.
    pub fn register(
        &mut self,
        package: &str,
        key: SchemaClassKey,
        kind: ClassKind,
        writer: SchemaWriter,
    ) -> bool {
        let new_package = !self.packages.contains_key(package);
        self.packages
            .entry(package.to_string())
            .or_default()
            .entry(key)
            .or_insert(SchemaClass { kind, writer });
        new_package
    }

    /// Looks up the schema writer for a class.
    #[must_use]
    pub fn writer(&self, package: &str, key: &SchemaClassKey) -> Option<SchemaWriter> {
        self.packages
            .get(package)
            .and_then(|classes| classes.get(key))
            .map(|class| class.writer.clone())
    }

    /// Looks up the kind of a registered class.
    #[must_use]
    pub fn kind(&self, package: &str, key: &SchemaClassKey) -> Option<ClassKind> {
        self.packages
            .get(package)
            .and_then(|classes| classes.get(key))
            .map(|class| class.kind)
    }
}
