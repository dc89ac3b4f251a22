//! Persistence of the saved configuration collection.
//!
//! A [`Store`] is a tiny key/value map of JSON values. The whole collection
//! of saved configurations lives under one key, [`CONFIGS_KEY`], and
//! [`ConfigLibrary`] is the only thing that reads or writes it.

use crate::config::Configuration;
use crate::error::{Error, Result, StoreError};
use crate::export::{self, ImportFormat};
use crate::record::{PersistedRecord, RecordFactory};
use crate::validate::validate_name;
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIGS_KEY: &str = "configs";

pub trait Store {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Map<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk, rewritten whole (temp file + rename) on every set.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Map::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    /// Memory only changes once the file write succeeded.
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value);
        self.write(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Overwrite the saved collection with the imported records.
    #[default]
    Replace,
    /// Add the imported records after the existing ones.
    Append,
}

/// Save/list/delete/import/export over a [`Store`].
pub struct ConfigLibrary<S> {
    store: S,
    factory: RecordFactory,
}

impl<S: Store> ConfigLibrary<S> {
    pub fn new(store: S) -> Self {
        Self { store, factory: RecordFactory::new() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<PersistedRecord>> {
        match self.store.get(CONFIGS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StoreError::from)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&mut self, records: &[PersistedRecord]) -> Result<()> {
        let value = serde_json::to_value(records).map_err(StoreError::from)?;
        self.store.set(CONFIGS_KEY, value)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<PersistedRecord> {
        self.list()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::UnknownRecord(id.to_string()))
    }

    /// Validate and persist `config` under `name`.
    pub fn save(&mut self, config: &Configuration, name: &str) -> Result<PersistedRecord> {
        let mut errors = config.validate();
        if let Some(message) = validate_name(name) {
            errors.set_name_error(message);
        }
        if !errors.is_empty() {
            return Err(Error::Invalid(errors));
        }

        let mut records = self.list()?;
        let mut record = self.factory.to_record(*config, name);
        while records.iter().any(|r| r.id == record.id) {
            record = self.factory.to_record(*config, name);
        }
        records.push(record.clone());
        self.write(&records)?;
        info!("Saved configuration {:?} ({})", record.name, record.id);
        Ok(record)
    }

    /// Remove a record. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            warn!("No saved configuration with id {}", id);
            return Ok(false);
        }
        self.write(&records)?;
        info!("Deleted configuration {}", id);
        Ok(true)
    }

    pub fn export(&self, format: ImportFormat) -> Result<String> {
        let records = self.list()?;
        Ok(match format {
            ImportFormat::Csv => export::export_csv(&records),
            ImportFormat::Json => export::export_json(&records)?,
        })
    }

    /// Parse and check `text` completely, then write the collection once.
    /// Every record must pass the same checks as [`save`](Self::save).
    /// Returns the number of records imported.
    pub fn import(&mut self, text: &str, format: ImportFormat, mode: ImportMode) -> Result<usize> {
        let imported = match format {
            ImportFormat::Csv => export::import_csv(text, &mut self.factory)?,
            ImportFormat::Json => export::import_json(text)?,
        };
        let count = imported.len();
        for (index, record) in imported.iter().enumerate() {
            check_imported(index + 1, record)?;
        }

        let mut records = match mode {
            ImportMode::Replace => Vec::new(),
            ImportMode::Append => self.list()?,
        };
        let mut ids: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
        for mut record in imported {
            while !ids.insert(record.id.clone()) {
                record.id = uuid::Uuid::new_v4().to_string();
            }
            records.push(record);
        }

        self.write(&records)?;
        info!("Imported {} configurations ({:?})", count, mode);
        Ok(count)
    }
}

fn check_imported(index: usize, record: &PersistedRecord) -> Result<()> {
    let mut errors = record.config.validate();
    if let Some(message) = validate_name(&record.name) {
        errors.set_name_error(message);
    }
    if errors.is_empty() {
        return Ok(());
    }
    Err(Error::InvalidImport { index, name: record.name.clone(), errors })
}
