//! [`BehaviorCatalog`] – registry of behaviors keyed by id.
//!
//! Registration goes through a shared reference so a catalog can be grown
//! while a sequencer holds it.  Definitions are validated on the way in and
//! stored behind `Arc`, so a running invocation keeps its definition alive
//! even if the catalog changes underneath it.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use stride_types::StrideError;
use tracing::debug;

use crate::behavior::BehaviorDefinition;

/// One row of [`BehaviorCatalog::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
    pub requires_state_monitoring: bool,
}

#[derive(Debug, Default)]
pub struct BehaviorCatalog {
    behaviors: RwLock<BTreeMap<u32, Arc<BehaviorDefinition>>>,
}

impl BehaviorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add `definition`.
    ///
    /// # Errors
    ///
    /// - [`StrideError::InvalidDefinition`] if validation fails.
    /// - [`StrideError::DuplicateId`] if the id is already registered.
    pub fn register(&self, definition: BehaviorDefinition) -> Result<(), StrideError> {
        definition.validate()?;
        let mut behaviors = self.behaviors.write().unwrap_or_else(PoisonError::into_inner);
        if behaviors.contains_key(&definition.id) {
            return Err(StrideError::DuplicateId(definition.id));
        }
        debug!(id = definition.id, name = %definition.name, "behavior registered");
        behaviors.insert(definition.id, Arc::new(definition));
        Ok(())
    }

    pub fn lookup(&self, id: u32) -> Option<Arc<BehaviorDefinition>> {
        self.read().get(&id).cloned()
    }

    /// Case-insensitive lookup by name; spaces and underscores match each other.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<BehaviorDefinition>> {
        let wanted = normalize(name);
        self.read()
            .values()
            .find(|def| normalize(&def.name) == wanted)
            .cloned()
    }

    /// All behaviors ordered by id.
    pub fn list(&self) -> Vec<CatalogEntry> {
        self.read()
            .values()
            .map(|def| CatalogEntry {
                id: def.id,
                name: def.name.clone(),
                enabled: def.enabled,
                requires_state_monitoring: def.requires_state_monitoring,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<u32, Arc<BehaviorDefinition>>> {
        self.behaviors.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}
