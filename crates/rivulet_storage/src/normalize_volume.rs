//! Input volume holding extracted-items files.
//!
//! A flat directory; file names encode schema and root table
//! (`{schema}.{root_table}.{unique_id}.{format}`). Files are read once,
//! streamingly, by exactly one worker and deleted by the coordinator only
//! after their load package has been committed.

use crate::error::StorageError;
use rivulet_protocol::naming::parse_extracted_file_name;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct NormalizeStorage {
    root: PathBuf,
}

impl NormalizeStorage {
    pub fn new(root: impl Into<PathBuf>, makedirs: bool) -> Result<Self, StorageError> {
        let root = root.into();
        if makedirs {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// List pending extracted-items files, lexicographically sorted.
    /// Entries whose names do not parse are skipped with a warning; they
    /// are not ours to consume.
    pub fn list_files_sorted(&self) -> Result<Vec<String>, StorageError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match parse_extracted_file_name(&name) {
                Ok(_) => files.push(name),
                Err(_) => warn!(file = %name, "Skipping unrecognized file on normalize volume"),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Group file names by the schema encoded in them, schemas in sorted
    /// order, file order preserved within each group.
    pub fn group_by_schema(
        &self,
        files: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, StorageError> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in files {
            let parsed = parse_extracted_file_name(file)?;
            groups.entry(parsed.schema).or_default().push(file.clone());
        }
        Ok(groups)
    }

    pub fn open_file(&self, name: &str) -> Result<BufReader<File>, StorageError> {
        Ok(BufReader::new(File::open(self.file_path(name))?))
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        fs::remove_file(self.file_path(name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn listing_is_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["s1.orders.002.jsonl", "s1.orders.001.jsonl", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"[]\n").unwrap();
        }
        let storage = NormalizeStorage::new(dir.path(), false).unwrap();
        let files = storage.list_files_sorted().unwrap();
        assert_eq!(files, vec!["s1.orders.001.jsonl", "s1.orders.002.jsonl"]);
    }

    #[test]
    fn grouping_by_schema() {
        let dir = tempdir().unwrap();
        let storage = NormalizeStorage::new(dir.path(), false).unwrap();
        let files = vec![
            "a.orders.001.jsonl".to_string(),
            "a.users.001.jsonl".to_string(),
            "b.events.001.jsonl".to_string(),
        ];
        let groups = storage.group_by_schema(&files).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["a"].len(), 2);
        assert_eq!(groups["b"], vec!["b.events.001.jsonl"]);
    }

    #[test]
    fn open_read_delete() {
        let dir = tempdir().unwrap();
        let storage = NormalizeStorage::new(dir.path(), false).unwrap();
        let name = "s1.orders.001.jsonl";
        let mut f = std::fs::File::create(storage.file_path(name)).unwrap();
        writeln!(f, r#"[{{"id":1}}]"#).unwrap();

        let mut contents = String::new();
        use std::io::Read;
        storage.open_file(name).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("\"id\""));

        storage.delete(name).unwrap();
        assert!(!storage.file_path(name).exists());
    }
}
