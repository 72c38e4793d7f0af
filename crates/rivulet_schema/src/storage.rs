//! File-backed schema store.
//!
//! One JSON document per schema name under the schema volume. Saves go
//! through a temp file and a rename so a crashed writer never leaves a
//! half-written schema behind.

use crate::error::SchemaError;
use crate::schema::{Schema, StoredSchema};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct SchemaStorage {
    root: PathBuf,
}

impl SchemaStorage {
    pub fn new(root: impl Into<PathBuf>, makedirs: bool) -> Result<Self, SchemaError> {
        let root = root.into();
        if makedirs {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn schema_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.schema.json", name))
    }

    pub fn load_schema(&self, name: &str) -> Result<Schema, SchemaError> {
        let path = self.schema_path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SchemaError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSchema =
            serde_json::from_str(&raw).map_err(|e| SchemaError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        debug!(schema = name, version = stored.version, "Loaded schema");
        Ok(Schema::from_stored(stored))
    }

    pub fn save_schema(&self, schema: &Schema) -> Result<(), SchemaError> {
        let stored = schema.to_stored();
        let raw = serde_json::to_string_pretty(&stored).map_err(|e| SchemaError::Corrupt {
            name: schema.name().to_string(),
            reason: e.to_string(),
        })?;
        let path = self.schema_path(schema.name());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        debug!(schema = schema.name(), version = schema.version(), "Saved schema");
        Ok(())
    }
}
