//! Process-wide normalize metrics.
//!
//! ## Design Principles (Data-Oriented)
//! - Plain data structures, lock-free atomics for the cells
//! - One registry per process; repeated initialization is a silent no-op
//! - Per-schema label cells created lazily on first use

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

static REGISTRY: OnceLock<NormalizeMetrics> = OnceLock::new();

/// Process-wide metrics registry. The first caller initializes it; every
/// later call gets the same instance.
pub fn metrics() -> &'static NormalizeMetrics {
    REGISTRY.get_or_init(NormalizeMetrics::default)
}

/// Metric cells for one schema label.
pub struct SchemaMetrics {
    /// `normalize_item_count{schema}` - monotonic counter.
    item_count: AtomicU64,
    /// `normalize_last_items{schema}` - gauge.
    last_items: AtomicU64,
    /// `normalize_schema_version{schema}` - gauge.
    schema_version: AtomicU64,
    /// `normalize_load_packages_created_count{schema}` - monotonic counter.
    load_packages_created: AtomicU64,
}

impl SchemaMetrics {
    const fn new() -> Self {
        Self {
            item_count: AtomicU64::new(0),
            last_items: AtomicU64::new(0),
            schema_version: AtomicU64::new(0),
            load_packages_created: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn add_items(&self, count: u64) {
        self.item_count.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_last_items(&self, count: u64) {
        self.last_items.store(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_schema_version(&self, version: u64) {
        self.schema_version.store(version, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_load_packages(&self) {
        self.load_packages_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchemaMetricsSnapshot {
        SchemaMetricsSnapshot {
            item_count: self.item_count.load(Ordering::Relaxed),
            last_items: self.last_items.load(Ordering::Relaxed),
            schema_version: self.schema_version.load(Ordering::Relaxed),
            load_packages_created: self.load_packages_created.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of one schema's cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMetricsSnapshot {
    pub item_count: u64,
    pub last_items: u64,
    pub schema_version: u64,
    pub load_packages_created: u64,
}

/// Registry of per-schema metric cells.
#[derive(Default)]
pub struct NormalizeMetrics {
    schemas: Mutex<HashMap<String, Arc<SchemaMetrics>>>,
}

impl NormalizeMetrics {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SchemaMetrics>>> {
        match self.schemas.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cells for a schema label, created on first use.
    pub fn schema(&self, name: &str) -> Arc<SchemaMetrics> {
        let mut schemas = self.lock();
        schemas
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(SchemaMetrics::new()))
            .clone()
    }

    /// Snapshot of a schema's cells, `None` when the label was never used.
    pub fn snapshot(&self, name: &str) -> Option<SchemaMetricsSnapshot> {
        self.lock().get(name).map(|m| m.snapshot())
    }

    /// Prometheus exposition format.
    pub fn prometheus_format(&self) -> String {
        let snapshots: Vec<(String, SchemaMetricsSnapshot)> = {
            let schemas = self.lock();
            let mut entries: Vec<_> = schemas
                .iter()
                .map(|(name, cells)| (name.clone(), cells.snapshot()))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        };

        let mut out = String::new();
        let mut section = |header: &str, values: &dyn Fn(&SchemaMetricsSnapshot) -> u64, name: &str| {
            out.push_str(header);
            for (schema, snapshot) in &snapshots {
                out.push_str(&format!("{}{{schema=\"{}\"}} {}\n", name, schema, values(snapshot)));
            }
            out.push('\n');
        };

        section(
            "# HELP normalize_item_count Items processed in normalize\n# TYPE normalize_item_count counter\n",
            &|s| s.item_count,
            "normalize_item_count",
        );
        section(
            "# HELP normalize_last_items Number of items processed in last package\n# TYPE normalize_last_items gauge\n",
            &|s| s.last_items,
            "normalize_last_items",
        );
        section(
            "# HELP normalize_schema_version Current schema version\n# TYPE normalize_schema_version gauge\n",
            &|s| s.schema_version,
            "normalize_schema_version",
        );
        section(
            "# HELP normalize_load_packages_created_count Count of load packages created\n# TYPE normalize_load_packages_created_count counter\n",
            &|s| s.load_packages_created,
            "normalize_load_packages_created_count",
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_accumulate() {
        let registry = NormalizeMetrics::default();
        let cells = registry.schema("s1");
        cells.add_items(2);
        cells.add_items(3);
        cells.set_last_items(3);
        cells.set_schema_version(7);
        cells.inc_load_packages();

        let snapshot = registry.snapshot("s1").unwrap();
        assert_eq!(snapshot.item_count, 5);
        assert_eq!(snapshot.last_items, 3);
        assert_eq!(snapshot.schema_version, 7);
        assert_eq!(snapshot.load_packages_created, 1);

        assert!(registry.snapshot("other").is_none());
    }

    #[test]
    fn schema_cells_are_shared() {
        let registry = NormalizeMetrics::default();
        registry.schema("s1").add_items(1);
        registry.schema("s1").add_items(1);
        assert_eq!(registry.snapshot("s1").unwrap().item_count, 2);
    }

    #[test]
    fn exposition_format() {
        let registry = NormalizeMetrics::default();
        registry.schema("s1").add_items(4);
        registry.schema("s1").inc_load_packages();

        let output = registry.prometheus_format();
        assert!(output.contains("# TYPE normalize_item_count counter"));
        assert!(output.contains("normalize_item_count{schema=\"s1\"} 4"));
        assert!(output.contains("normalize_load_packages_created_count{schema=\"s1\"} 1"));
    }

    #[test]
    fn process_registry_is_idempotent() {
        let first = metrics() as *const NormalizeMetrics;
        let second = metrics() as *const NormalizeMetrics;
        assert_eq!(first, second);
    }
}
