//! Coordinator: shard pending files, dispatch workers, merge schema
//! deltas, stage and commit load packages.

use crate::cancel::CancelToken;
use crate::error::NormalizeError;
use crate::metrics::metrics;
use crate::worker::{self, WorkerParams};
use chrono::Utc;
use rivulet_protocol::config::NormalizeConfig;
use rivulet_protocol::naming;
use rivulet_schema::{Schema, SchemaError, SchemaStorage, SchemaUpdate};
use rivulet_storage::{LoadStorage, NormalizeStorage};
use std::fs;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cadence of the coordinator's completion poll. Keeps the loop responsive
/// to cancellation without burning CPU.
const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// What a run leaves behind: the number of files that showed up on the
/// input volume while we were working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMetrics {
    pub pending: usize,
}

struct PendingTask {
    handle: thread::JoinHandle<Result<worker::WorkerOutput, NormalizeError>>,
    params: WorkerParams,
    base_chunk_id: String,
    retries: u32,
}

fn spawn_worker(
    params: WorkerParams,
    cancel: CancelToken,
    base_chunk_id: String,
    retries: u32,
) -> PendingTask {
    let thread_params = params.clone();
    let handle = thread::spawn(move || worker::normalize_files(thread_params, cancel));
    PendingTask {
        handle,
        params,
        base_chunk_id,
        retries,
    }
}

pub struct Normalize {
    config: NormalizeConfig,
    normalize_storage: NormalizeStorage,
    load_storage: LoadStorage,
    schema_storage: SchemaStorage,
    cancel: CancelToken,
}

impl Normalize {
    pub fn new(config: NormalizeConfig) -> Result<Self, NormalizeError> {
        let normalize_storage = NormalizeStorage::new(&config.normalize_volume, true)?;
        let load_storage = LoadStorage::new(
            &config.load_volume,
            config.destination_capabilities.preferred_loader_file_format,
            true,
        )?;
        let schema_storage = SchemaStorage::new(&config.schema_volume, true)?;
        // Touch the process-wide registry; repeated construction of
        // Normalize must not re-register anything.
        metrics();
        Ok(Self {
            config,
            normalize_storage,
            load_storage,
            schema_storage,
            cancel: CancelToken::new(),
        })
    }

    /// Handle for requesting cooperative cancellation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn load_or_create_schema(&self, schema_name: &str) -> Result<Schema, SchemaError> {
        match self.schema_storage.load_schema(schema_name) {
            Ok(schema) => {
                info!(schema = schema_name, version = schema.version(), "Loaded schema");
                Ok(schema)
            }
            Err(SchemaError::NotFound(_)) => {
                info!(schema = schema_name, "Created new schema");
                Ok(Schema::new(schema_name))
            }
            Err(e) => Err(e),
        }
    }

    /// Partition sorted files into at most `no_groups` consecutive chunks.
    ///
    /// Sorting clusters same-table files into adjacent positions so one
    /// worker usually owns a whole table. Remainder chunks beyond the
    /// group count are redistributed element by element into the earlier
    /// chunks, from the tail backwards.
    pub fn group_worker_files(files: &[String], no_groups: usize) -> Vec<Vec<String>> {
        let mut files: Vec<String> = files.to_vec();
        files.sort();
        if files.is_empty() {
            return Vec::new();
        }

        let chunk_size = (files.len() / no_groups.max(1)).max(1);
        let mut chunk_files: Vec<Vec<String>> =
            files.chunks(chunk_size).map(|c| c.to_vec()).collect();

        let mut remainder = chunk_files.len() as i64 - no_groups as i64;
        let mut l_idx: i64 = 0;
        while remainder > 0 {
            let tail = match chunk_files.pop() {
                Some(tail) => tail,
                None => break,
            };
            let mut idx: i64 = 0;
            for (i, file) in tail.into_iter().rev().enumerate() {
                idx = i as i64;
                let pos = chunk_files.len() as i64 - l_idx - idx - remainder;
                chunk_files[pos as usize].push(file);
            }
            remainder -= 1;
            l_idx += idx + 1;
        }
        chunk_files
    }

    fn worker_params(&self, schema: &Schema, load_id: &str, files: Vec<String>) -> WorkerParams {
        WorkerParams {
            normalize_volume: self.config.normalize_volume.clone(),
            load_volume: self.config.load_volume.clone(),
            destination_capabilities: self.config.destination_capabilities.clone(),
            stored_schema: schema.to_stored(),
            load_id: load_id.to_string(),
            chunk_id: naming::chunk_id(&files),
            files,
        }
    }

    /// Apply worker deltas to the master schema, in order. Returns the
    /// number of partial tables applied.
    fn update_schema(schema: &mut Schema, updates: &[SchemaUpdate]) -> Result<usize, SchemaError> {
        let mut applied = 0;
        for update in updates {
            for (table_name, partials) in &update.tables {
                debug!(table = %table_name, deltas = partials.len(), "Updating schema for table");
                for partial in partials {
                    schema.update_schema(partial)?;
                    applied += 1;
                }
            }
        }
        Ok(applied)
    }

    fn map_parallel(
        &self,
        schema: &mut Schema,
        load_id: &str,
        files: &[String],
    ) -> Result<(u64, Vec<SchemaUpdate>), NormalizeError> {
        let chunks = Self::group_worker_files(files, self.config.worker_count.max(1));
        let mut tasks: Vec<PendingTask> = chunks
            .into_iter()
            .map(|chunk| {
                let params = self.worker_params(schema, load_id, chunk);
                let base_chunk_id = params.chunk_id.clone();
                spawn_worker(params, self.cancel.clone(), base_chunk_id, 0)
            })
            .collect();

        let mut schema_updates: Vec<SchemaUpdate> = Vec::new();
        let mut total_items = 0u64;

        let outcome = (|| -> Result<(), NormalizeError> {
            while !tasks.is_empty() {
                thread::sleep(POLL_INTERVAL);
                let mut idx = 0;
                while idx < tasks.len() {
                    if !tasks[idx].handle.is_finished() {
                        idx += 1;
                        continue;
                    }
                    let task = tasks.swap_remove(idx);
                    let output = task
                        .handle
                        .join()
                        .map_err(|_| NormalizeError::WorkerPanic)??;
                    match Self::update_schema(schema, &output.schema_updates) {
                        Ok(_) => {
                            schema_updates.extend(output.schema_updates);
                            total_items += output.items_count;
                        }
                        Err(e @ SchemaError::CannotCoerceColumn { .. }) if task.retries == 0 => {
                            warn!(error = %e, "Parallel schema update conflict, retrying chunk");
                            // The chunk's output was written against a schema
                            // that lost the merge; those files are poisoned.
                            for file in &output.closed_files {
                                fs::remove_file(file)?;
                            }
                            let retries = task.retries + 1;
                            let params = task
                                .params
                                .with_schema(schema.to_stored())
                                .with_chunk_id(naming::retry_chunk_id(
                                    &task.base_chunk_id,
                                    retries,
                                ));
                            tasks.push(spawn_worker(
                                params,
                                self.cancel.clone(),
                                task.base_chunk_id,
                                retries,
                            ));
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            Ok(())
        })();

        if let Err(e) = outcome {
            // The package is being abandoned. Wait out the stragglers so
            // none of them can write into a recreated temp stage.
            for task in tasks.drain(..) {
                let _ = task.handle.join();
            }
            return Err(e);
        }

        Ok((total_items, schema_updates))
    }

    fn map_single(
        &self,
        schema: &mut Schema,
        load_id: &str,
        files: &[String],
    ) -> Result<(u64, Vec<SchemaUpdate>), NormalizeError> {
        let params = self.worker_params(schema, load_id, files.to_vec());
        let output = worker::normalize_files(params, self.cancel.clone())?;
        Self::update_schema(schema, &output.schema_updates)?;
        Ok((output.items_count, output.schema_updates))
    }

    fn spool_files(
        &self,
        schema_name: &str,
        load_id: &str,
        parallel: bool,
        files: &[String],
    ) -> Result<(), NormalizeError> {
        let mut schema = self.load_or_create_schema(schema_name)?;

        let (total_items, schema_updates) = if parallel {
            self.map_parallel(&mut schema, load_id, files)?
        } else {
            self.map_single(&mut schema, load_id, files)?
        };
        let delta_count: usize = schema_updates.iter().map(SchemaUpdate::delta_count).sum();
        info!(
            schema = schema_name,
            items = total_items,
            deltas = delta_count,
            "Processed schema files"
        );
        metrics().schema(schema_name).set_schema_version(schema.version());

        if delta_count > 0 {
            info!(
                schema = schema_name,
                version = schema.version(),
                "Saving schema and writing package manifests"
            );
            self.schema_storage.save_schema(&schema)?;
        }
        // The package seals its own copy of the schema and the deltas that
        // produced it, even when empty.
        self.load_storage.save_temp_schema(&schema.to_stored(), load_id)?;
        self.load_storage.save_temp_schema_updates(load_id, &schema_updates)?;

        // Last safe point: rename and input deletion belong together.
        self.cancel.checkpoint()?;
        info!(load_id, "Committing load package, do not kill this process");
        self.load_storage.commit_temp_load_package(load_id)?;
        for file in files {
            self.normalize_storage.delete(file)?;
        }
        info!(load_id, "Load package committed");

        let cells = metrics().schema(schema_name);
        cells.inc_load_packages();
        cells.add_items(total_items);
        cells.set_last_items(total_items);
        Ok(())
    }

    fn spool_schema_files(
        &self,
        schema_name: &str,
        files: &[String],
    ) -> Result<String, NormalizeError> {
        let load_id = new_load_id();
        self.load_storage.create_temp_load_package(&load_id)?;
        info!(load_id, "Created temp load package");

        let parallel = self.config.worker_count > 1;
        match self.spool_files(schema_name, &load_id, parallel, files) {
            Ok(()) => Ok(load_id),
            Err(e) if parallel && e.is_coercion_conflict() => {
                warn!(error = %e, "Parallel schema update conflict, switching to single worker");
                // Start over from scratch; single-worker merges are
                // sequential and cannot conflict with each other.
                self.load_storage.create_temp_load_package(&load_id)?;
                self.spool_files(schema_name, &load_id, false, files)?;
                Ok(load_id)
            }
            Err(e) => Err(e),
        }
    }

    /// Normalize everything pending on the input volume, one load package
    /// per schema.
    pub fn run(&self) -> Result<RunMetrics, NormalizeError> {
        info!("Running file normalizing");
        let files = self.normalize_storage.list_files_sorted()?;
        info!(files = files.len(), "Found files to normalize");
        if files.is_empty() {
            return Ok(RunMetrics { pending: 0 });
        }
        for (schema_name, schema_files) in self.normalize_storage.group_by_schema(&files)? {
            info!(schema = %schema_name, files = schema_files.len(), "Found files in schema");
            self.spool_schema_files(&schema_name, &schema_files)?;
        }
        // Extract may have produced more while we were spooling.
        Ok(RunMetrics {
            pending: self.normalize_storage.list_files_sorted()?.len(),
        })
    }
}

/// Wall-clock load id: `{unix_seconds}.{micros}`, monotone within a
/// process.
fn new_load_id() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}
