//! Loaded-schema storage: the set of message descriptors a [`crate::facade::Facade`]
//! knows how to encode and decode, keyed both by wire identity and by name.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smartstring::{LazyCompact, SmartString};

use crate::descriptor::{MessageDescriptor, SchemaId};
use crate::error::{Result, SchemaError};

type DcclString = SmartString<LazyCompact>;

/// The collection of descriptors loaded into a facade, resolvable by id
/// (as carried in the wire identity prefix) or by name.
#[derive(Default)]
pub struct SchemaSet {
    by_id: FxHashMap<u32, Arc<MessageDescriptor>>,
    by_name: FxHashMap<DcclString, u32>,
}

impl SchemaSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor`, rejecting a schema id already bound to a
    /// different name.
    pub fn insert(&mut self, descriptor: MessageDescriptor) -> Result<()> {
        if let Some(existing) = self.by_id.get(&descriptor.id.0) {
            if existing.name != descriptor.name {
                return Err(SchemaError::DuplicateSchemaId {
                    schema_id: descriptor.id.0,
                    existing: existing.name.clone(),
                    name: descriptor.name,
                }
                .into());
            }
        }
        self.by_name.insert(descriptor.name.clone(), descriptor.id.0);
        self.by_id.insert(descriptor.id.0, Arc::new(descriptor));
        Ok(())
    }

    /// Looks up a descriptor by its wire identity.
    #[must_use]
    pub fn get(&self, id: SchemaId) -> Option<Arc<MessageDescriptor>> {
        self.by_id.get(&id.0).cloned()
    }

    /// Looks up a descriptor by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<MessageDescriptor>> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id)).cloned()
    }

    /// Every loaded descriptor, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MessageDescriptor>> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MessageDescriptorBuilder;

    #[test]
    fn insert_and_lookup_by_id_and_name() {
        let mut schemas = SchemaSet::new();
        schemas
            .insert(MessageDescriptorBuilder::new("Ping", 1u32).build())
            .unwrap();
        assert!(schemas.get(SchemaId(1)).is_some());
        assert!(schemas.get_by_name("Ping").is_some());
        assert!(schemas.get_by_name("Pong").is_none());
    }

    #[test]
    fn conflicting_id_rejected() {
        let mut schemas = SchemaSet::new();
        schemas
            .insert(MessageDescriptorBuilder::new("Ping", 1u32).build())
            .unwrap();
        let err = schemas.insert(MessageDescriptorBuilder::new("Pong", 1u32).build());
        assert!(err.is_err());
    }
}
