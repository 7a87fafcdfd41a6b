//! In-memory registry backend.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::metrics;
use crate::registry::{
    check_write, validate_name, ParameterStore, RegistryEntry, RegistryError, WriteMode,
};

/// Registry held in a concurrent map. Lost on restart.
#[derive(Debug)]
pub struct MemoryRegistry {
    entries: DashMap<String, RegistryEntry>,
    generation: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore for MemoryRegistry {
    fn put(&self, name: &str, value: &str, mode: WriteMode) -> Result<RegistryEntry, RegistryError> {
        validate_name(name)?;
        let generation = self.generation.load(Ordering::SeqCst);
        let entry = RegistryEntry::new(name, value, generation);

        // The entry guard makes check-and-write atomic per name.
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                check_write(Some(occupied.get()), name, mode, generation)?;
                occupied.insert(entry.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry.clone());
            }
        }

        tracing::debug!(name = %name, generation, "Parameter written");
        metrics::record_registry_write();
        Ok(entry)
    }

    fn get(&self, name: &str) -> Result<RegistryEntry, RegistryError> {
        self.entries
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> Result<RegistryEntry, RegistryError> {
        self.entries
            .remove(name)
            .map(|(_, entry)| entry)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn list(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<_> = self.entries.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    fn begin_generation(&self) -> Result<u64, RegistryError> {
        Ok(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
