//! Retained record as a JSON file
//!
//! The hosted equivalent of a battery-backed RAM section. Writes go to a
//! sibling temporary file first and are renamed into place, so a crash
//! mid-save leaves the previous record intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thermolink_core::{PersistentRecord, RecordStore, StorageError};

use crate::ConnectorError;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<PersistentRecord>, ConnectorError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn write(&self, record: &PersistentRecord) -> Result<(), ConnectorError> {
        let json = serde_json::to_string_pretty(record)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<PersistentRecord>, StorageError> {
        self.read().map_err(|e| {
            log::warn!("Loading {} failed: {}", self.path.display(), e);
            StorageError::from(&e)
        })
    }

    fn save(&mut self, record: &PersistentRecord) -> Result<(), StorageError> {
        self.write(record).map_err(|e| {
            log::warn!("Saving {} failed: {}", self.path.display(), e);
            StorageError::from(&e)
        })
    }
}
