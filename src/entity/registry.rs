//! Descriptor cache.
//!
//! The registry is an explicit object with the lifetime of the manager that
//! owns it; there is no ambient global. Entries are immutable once
//! published. A race on first resolution is resolved single-writer-wins:
//! the losing thread's descriptor is discarded, which wastes the duplicate
//! derivation but is never incorrect.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::entity::descriptor::EntityDescriptor;
use crate::entity::naming::NamingStrategy;
use crate::entity::traits::Record;
use crate::error::DbError;

/// Cache of validated [`EntityDescriptor`]s keyed by record type.
#[derive(Debug)]
pub struct DescriptorRegistry {
    naming: NamingStrategy,
    cache: RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>,
}

impl DescriptorRegistry {
    pub fn new(naming: NamingStrategy) -> Self {
        Self {
            naming,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Descriptor for a record type, derived on first use and cached for
    /// the registry's lifetime. Deterministic and idempotent: two calls
    /// return descriptors with identical content.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Mapping` when the type's schema fails validation.
    pub fn resolve<R: Record>(&self) -> Result<Arc<EntityDescriptor>, DbError> {
        let key = TypeId::of::<R>();
        {
            let cache = self.cache.read().expect("descriptor cache poisoned");
            if let Some(found) = cache.get(&key) {
                return Ok(Arc::clone(found));
            }
        }

        let built = Arc::new(EntityDescriptor::from_meta(&R::schema(), &self.naming)?);
        let mut cache = self.cache.write().expect("descriptor cache poisoned");
        let entry = cache.entry(key).or_insert_with(|| {
            log::debug!(
                "resolved descriptor for '{}' (table '{}')",
                built.type_name(),
                built.table()
            );
            Arc::clone(&built)
        });
        Ok(Arc::clone(entry))
    }

    /// Pre-populate the cache for a record type with an externally built
    /// descriptor, e.g. one produced by a schema-driven code generator.
    /// A later `resolve` for the same type returns this descriptor instead
    /// of deriving one.
    pub fn preregister<R: Record>(&self, descriptor: EntityDescriptor) {
        let mut cache = self.cache.write().expect("descriptor cache poisoned");
        cache.insert(TypeId::of::<R>(), Arc::new(descriptor));
    }

    pub fn naming(&self) -> NamingStrategy {
        self.naming
    }

    pub fn len(&self) -> usize {
        self.cache.read().expect("descriptor cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::meta::{ColumnMeta, ColumnType, TableMeta};
    use crate::row::Row;
    use crate::value::{IntoValue, Value};

    #[derive(Debug, Clone)]
    struct Widget {
        id: i64,
        label: String,
    }

    impl Record for Widget {
        fn schema() -> TableMeta {
            TableMeta::new("Widget")
                .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key())
                .column(ColumnMeta::new("label", ColumnType::Text))
        }

        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(self.id.into_value()),
                "label" => Some(self.label.clone().into_value()),
                _ => None,
            }
        }

        fn load(row: &Row) -> Result<Self, DbError> {
            Ok(Self {
                id: row.get("id")?,
                label: row.get("label")?,
            })
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let registry = DescriptorRegistry::new(NamingStrategy::SnakeCase);
        let first = registry.resolve::<Widget>().unwrap();
        let second = registry.resolve::<Widget>().unwrap();
        assert_eq!(*first, *second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_binding_count_matches_field_count() {
        let registry = DescriptorRegistry::new(NamingStrategy::SnakeCase);
        let desc = registry.resolve::<Widget>().unwrap();
        assert_eq!(desc.columns().len(), 2);
    }

    #[test]
    fn test_preregister_takes_precedence() {
        let registry = DescriptorRegistry::new(NamingStrategy::SnakeCase);
        let meta = TableMeta::new("Widget")
            .table("widget_archive")
            .column(ColumnMeta::new("id", ColumnType::BigInt).primary_key())
            .column(ColumnMeta::new("label", ColumnType::Text));
        let desc = EntityDescriptor::from_meta(&meta, &NamingStrategy::SnakeCase).unwrap();
        registry.preregister::<Widget>(desc);

        let resolved = registry.resolve::<Widget>().unwrap();
        assert_eq!(resolved.table(), "widget_archive");
    }

    #[test]
    fn test_concurrent_resolution_converges() {
        let registry = Arc::new(DescriptorRegistry::new(NamingStrategy::SnakeCase));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.resolve::<Widget>().unwrap())
            })
            .collect();
        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for d in &descriptors {
            assert_eq!(**d, *descriptors[0]);
        }
        assert_eq!(registry.len(), 1);
    }
}
