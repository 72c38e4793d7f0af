//! Load packages on the output volume.
//!
//! A package spends its life under `{root}/new/{load_id}/` while workers
//! populate it, then moves to `{root}/loaded/{load_id}/` in a single
//! rename. A package that never gets promoted is garbage; later runs may
//! sweep it.

use crate::error::StorageError;
use crate::writers::WriterPool;
use rivulet_protocol::config::LoaderFileFormat;
use rivulet_schema::{SchemaUpdate, StoredSchema};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const NEW_PACKAGES_FOLDER: &str = "new";
pub const LOADED_PACKAGES_FOLDER: &str = "loaded";

const SCHEMA_FILE: &str = "schema.json";
const SCHEMA_UPDATES_FILE: &str = "schema_updates.json";

pub struct LoadStorage {
    root: PathBuf,
    preferred_format: LoaderFileFormat,
}

impl LoadStorage {
    pub fn new(
        root: impl Into<PathBuf>,
        preferred_format: LoaderFileFormat,
        makedirs: bool,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        if makedirs {
            fs::create_dir_all(root.join(NEW_PACKAGES_FOLDER))?;
            fs::create_dir_all(root.join(LOADED_PACKAGES_FOLDER))?;
        }
        Ok(Self {
            root,
            preferred_format,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preferred_format(&self) -> LoaderFileFormat {
        self.preferred_format
    }

    pub fn temp_package_path(&self, load_id: &str) -> PathBuf {
        self.root.join(NEW_PACKAGES_FOLDER).join(load_id)
    }

    pub fn committed_package_path(&self, load_id: &str) -> PathBuf {
        self.root.join(LOADED_PACKAGES_FOLDER).join(load_id)
    }

    /// Create a fresh temp package. An existing one with the same id is
    /// wiped first: the single-worker fallback restarts from scratch.
    pub fn create_temp_load_package(&self, load_id: &str) -> Result<(), StorageError> {
        let path = self.temp_package_path(load_id);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(())
    }

    /// Writer pool for one worker chunk, rooted at the temp package.
    pub fn writer_pool(&self, load_id: &str, chunk_id: &str) -> WriterPool {
        WriterPool::new(
            self.temp_package_path(load_id),
            chunk_id.to_string(),
            self.preferred_format,
        )
    }

    pub fn save_temp_schema(
        &self,
        stored: &StoredSchema,
        load_id: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self.temp_package_path(load_id).join(SCHEMA_FILE);
        fs::write(&path, serde_json::to_string_pretty(stored)?)?;
        Ok(path)
    }

    pub fn save_temp_schema_updates(
        &self,
        load_id: &str,
        updates: &[SchemaUpdate],
    ) -> Result<PathBuf, StorageError> {
        let path = self.temp_package_path(load_id).join(SCHEMA_UPDATES_FILE);
        fs::write(&path, serde_json::to_string_pretty(updates)?)?;
        Ok(path)
    }

    /// Atomically promote a temp package to the committed stage.
    pub fn commit_temp_load_package(&self, load_id: &str) -> Result<(), StorageError> {
        let loaded_root = self.root.join(LOADED_PACKAGES_FOLDER);
        fs::create_dir_all(&loaded_root)?;
        fs::rename(
            self.temp_package_path(load_id),
            self.committed_package_path(load_id),
        )?;
        debug!(load_id, "Promoted load package");
        Ok(())
    }

    /// Read back the schema sealed into a committed package.
    pub fn load_committed_schema(&self, load_id: &str) -> Result<StoredSchema, StorageError> {
        let raw = fs::read_to_string(self.committed_package_path(load_id).join(SCHEMA_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Read back the schema updates sealed into a committed package.
    pub fn load_committed_schema_updates(
        &self,
        load_id: &str,
    ) -> Result<Vec<SchemaUpdate>, StorageError> {
        let raw =
            fs::read_to_string(self.committed_package_path(load_id).join(SCHEMA_UPDATES_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Ids of committed packages, sorted.
    pub fn list_committed_packages(&self) -> Result<Vec<String>, StorageError> {
        let loaded_root = self.root.join(LOADED_PACKAGES_FOLDER);
        if !loaded_root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(loaded_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
