//! File-backed registry.
//!
//! The whole registry is one JSON document, rewritten on every mutation
//! through a temp file and rename so a crash never leaves a torn file.
//!
//! The file has a single owner: the in-memory copy loaded at `open` is the
//! source of truth for reads and for every rewrite. Another process (or a
//! second `FileRegistry` on the same path) sees changes only after it
//! reopens the file, and its own writes replace the document wholesale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::observability::metrics;
use crate::registry::{
    check_write, validate_name, ParameterStore, RegistryEntry, RegistryError, WriteMode,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    generation: u64,
    entries: BTreeMap<String, RegistryEntry>,
}

/// Durable registry persisted to a JSON file.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileRegistry {
    /// Open the registry at `path`, creating an empty one if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            FileState {
                generation: 1,
                entries: BTreeMap::new(),
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &FileState) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply `f` to the state and persist it; on persist failure the change is rolled back.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut FileState) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = FileState {
            generation: state.generation,
            entries: state.entries.clone(),
        };
        let out = f(&mut state)?;
        if let Err(e) = self.persist(&state) {
            *state = snapshot;
            return Err(e);
        }
        Ok(out)
    }
}

impl ParameterStore for FileRegistry {
    fn put(&self, name: &str, value: &str, mode: WriteMode) -> Result<RegistryEntry, RegistryError> {
        validate_name(name)?;
        let entry = self.mutate(|state| {
            check_write(state.entries.get(name), name, mode, state.generation)?;
            let entry = RegistryEntry::new(name, value, state.generation);
            state.entries.insert(name.to_string(), entry.clone());
            Ok(entry)
        })?;
        tracing::debug!(name = %name, generation = entry.generation, "Parameter written");
        metrics::record_registry_write();
        Ok(entry)
    }

    fn get(&self, name: &str) -> Result<RegistryEntry, RegistryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> Result<RegistryEntry, RegistryError> {
        self.mutate(|state| {
            state
                .entries
                .remove(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))
        })
    }

    fn list(&self) -> Vec<RegistryEntry> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.values().cloned().collect()
    }

    fn begin_generation(&self) -> Result<u64, RegistryError> {
        self.mutate(|state| {
            state.generation += 1;
            Ok(state.generation)
        })
    }

    fn generation(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).generation
    }
}
