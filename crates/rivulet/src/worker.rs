//! Worker routine: normalize a batch of extracted-items files.
//!
//! Workers share nothing with the coordinator. Every input arrives by
//! value in [`WorkerParams`] - including the schema, as a serialized
//! snapshot the worker rebuilds into a private mutable [`Schema`]. Deltas
//! discovered here are applied locally (so later rows in the same batch
//! see the new columns) and returned for the coordinator to merge.

use crate::cancel::CancelToken;
use crate::error::NormalizeError;
use crate::relational;
use rivulet_protocol::config::DestinationCapabilities;
use rivulet_protocol::naming::parse_extracted_file_name;
use rivulet_protocol::pua::custom_pua_decode;
use rivulet_protocol::types::Row;
use rivulet_schema::{ColumnSchema, Schema, SchemaUpdate, StoredSchema};
use rivulet_storage::{NormalizeStorage, StorageError, WriterPool};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Everything a worker needs, owned. The retry path replaces only the
/// schema snapshot and the chunk id.
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub normalize_volume: PathBuf,
    pub load_volume: PathBuf,
    pub destination_capabilities: DestinationCapabilities,
    pub stored_schema: StoredSchema,
    pub load_id: String,
    pub chunk_id: String,
    pub files: Vec<String>,
}

impl WorkerParams {
    pub fn with_schema(mut self, stored_schema: StoredSchema) -> Self {
        self.stored_schema = stored_schema;
        self
    }

    pub fn with_chunk_id(mut self, chunk_id: String) -> Self {
        self.chunk_id = chunk_id;
        self
    }
}

/// What a worker hands back: the schema deltas in discovery order, the
/// number of items written, and the output files it closed.
#[derive(Debug)]
pub struct WorkerOutput {
    pub schema_updates: Vec<SchemaUpdate>,
    pub items_count: u64,
    pub closed_files: Vec<PathBuf>,
}

/// Process a file batch end to end. On any failure the file and line are
/// logged, writers are closed, and the error propagates unchanged.
pub fn normalize_files(
    params: WorkerParams,
    cancel: CancelToken,
) -> Result<WorkerOutput, NormalizeError> {
    let mut schema = Schema::from_stored(params.stored_schema.clone());
    let normalize_storage = NormalizeStorage::new(&params.normalize_volume, false)?;
    let load_storage = rivulet_storage::LoadStorage::new(
        &params.load_volume,
        params.destination_capabilities.preferred_loader_file_format,
        false,
    )?;
    let mut pool = load_storage.writer_pool(&params.load_id, &params.chunk_id);

    let mut schema_updates: Vec<SchemaUpdate> = Vec::new();
    let mut total_items = 0u64;

    let outcome = process_files(
        &mut schema,
        &normalize_storage,
        &mut pool,
        &params,
        &cancel,
        &mut schema_updates,
        &mut total_items,
    );
    // Writers close on both paths; the error, if any, wins.
    let closed = pool.close_writers();
    outcome?;
    let closed_files = closed?;

    info!(
        chunk = %params.chunk_id,
        files = params.files.len(),
        items = total_items,
        "Processed worker file batch"
    );
    Ok(WorkerOutput {
        schema_updates,
        items_count: total_items,
        closed_files,
    })
}

#[allow(clippy::too_many_arguments)]
fn process_files(
    schema: &mut Schema,
    normalize_storage: &NormalizeStorage,
    pool: &mut WriterPool,
    params: &WorkerParams,
    cancel: &CancelToken,
    schema_updates: &mut Vec<SchemaUpdate>,
    total_items: &mut u64,
) -> Result<(), NormalizeError> {
    let schema_name = schema.name().to_string();
    // Column lookups memoized per table across the batch; invalidated
    // whenever a delta lands.
    let mut column_cache: HashMap<String, Vec<ColumnSchema>> = HashMap::new();

    for file_name in &params.files {
        let mut line_no = 0usize;
        let outcome = process_file(
            schema,
            normalize_storage,
            pool,
            &schema_name,
            &params.load_id,
            file_name,
            cancel,
            &mut column_cache,
            schema_updates,
            total_items,
            &mut line_no,
        );
        if let Err(e) = outcome {
            error!(
                file = %file_name,
                line = line_no,
                error = %e,
                "Failed to normalize extracted items file"
            );
            return Err(e);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_file(
    schema: &mut Schema,
    normalize_storage: &NormalizeStorage,
    pool: &mut WriterPool,
    schema_name: &str,
    load_id: &str,
    file_name: &str,
    cancel: &CancelToken,
    column_cache: &mut HashMap<String, Vec<ColumnSchema>>,
    schema_updates: &mut Vec<SchemaUpdate>,
    total_items: &mut u64,
    line_no: &mut usize,
) -> Result<(), NormalizeError> {
    let parsed = parse_extracted_file_name(file_name).map_err(StorageError::from)?;
    let root_table = parsed.root_table;
    debug!(
        file = %file_name,
        load_id,
        table = %root_table,
        schema = %schema_name,
        "Processing extracted items"
    );

    let reader = normalize_storage.open_file(file_name)?;
    let mut file_items = 0u64;
    for (index, line) in reader.lines().enumerate() {
        *line_no = index + 1;
        let line = line?;
        let items: Vec<JsonValue> =
            serde_json::from_str(&line).map_err(|source| NormalizeError::Decode {
                file: file_name.to_string(),
                line: *line_no,
                source,
            })?;
        let (update, items_count) = normalize_chunk(
            schema,
            pool,
            schema_name,
            load_id,
            &root_table,
            &items,
            column_cache,
            cancel,
        )?;
        schema_updates.push(update);
        *total_items += items_count;
        file_items += items_count;
        debug!(
            file = %file_name,
            line = *line_no,
            items = items_count,
            total = *total_items,
            "Processed record batch"
        );
    }
    // Empty files contribute nothing, not even a summary line.
    if file_items > 0 {
        debug!(file = %file_name, lines = *line_no, items = file_items, "Processed file");
    }
    Ok(())
}

/// Normalize one line's worth of records: filter, decode, coerce, write.
#[allow(clippy::too_many_arguments)]
fn normalize_chunk(
    schema: &mut Schema,
    pool: &mut WriterPool,
    schema_name: &str,
    load_id: &str,
    root_table: &str,
    items: &[JsonValue],
    column_cache: &mut HashMap<String, Vec<ColumnSchema>>,
    cancel: &CancelToken,
) -> Result<(SchemaUpdate, u64), NormalizeError> {
    let mut update = SchemaUpdate::default();
    let mut items_count = 0u64;

    for item in items {
        for ((table, parent_table), row) in
            relational::normalize_data_item(schema, item, load_id, root_table)?
        {
            // Hints may eliminate some or all fields; empty rows vanish
            // without being counted.
            let row = schema.filter_row(&table, row);
            if row.is_empty() {
                continue;
            }
            let mut decoded = Row::new();
            for (name, value) in row {
                decoded.insert(name, custom_pua_decode(value)?);
            }
            let (row, partial) = schema.coerce_row(&table, parent_table.as_deref(), decoded)?;
            if let Some(partial) = partial {
                schema.update_schema(&partial)?;
                column_cache.remove(&table);
                update.push(table.clone(), partial);
            }
            let columns = column_cache
                .entry(table.clone())
                .or_insert_with(|| schema.table_columns(&table));
            pool.write_data_item(schema_name, &table, &row, columns)?;
            items_count += 1;
        }
        cancel.checkpoint()?;
    }
    Ok((update, items_count))
}
