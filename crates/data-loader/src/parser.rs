//! Parser for the CSV exports.
//!
//! The exporting system writes three files with a header row:
//! - interactions: user_id,item_id,rating,timestamp
//! - items: item_id,<type columns>,<tag columns>,document
//! - users: user_id,<indicator columns>,<key:value columns>,<text columns>
//!
//! Interactions are fully typed here, so a malformed timestamp or rating is
//! rejected before any transformation runs. Entity files are read into an
//! `EntityTable` whose columns are interpreted later by the pipeline.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use csv::{ReaderBuilder, StringRecord};
use std::fmt::Display;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Open a file, mapping "not found" to a dedicated error
fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Position of `name` in the header row
fn column_index(headers: &StringRecord, name: &str, table: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| DataLoadError::MissingColumn {
            column: name.to_string(),
            table: table.to_string(),
        })
}

/// Line number of a record, for error messages
fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Parse one field of a record into `T`
fn parse_field<T>(record: &StringRecord, index: usize, name: &str, file: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let line = record_line(record);
    let raw = record.get(index).ok_or_else(|| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Missing {}", name),
    })?;
    raw.trim().parse().map_err(|e| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Invalid {} '{}': {}", name, raw, e),
    })
}

/// Parse the interactions export from any reader.
///
/// `file` is only used to label errors.
pub fn parse_interactions<R: Read>(reader: R, file: &str) -> Result<Vec<InteractionEvent>> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let user_idx = column_index(&headers, "user_id", "interactions")?;
    let item_idx = column_index(&headers, "item_id", "interactions")?;
    let rating_idx = column_index(&headers, "rating", "interactions")?;
    let timestamp_idx = column_index(&headers, "timestamp", "interactions")?;

    let mut events = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let rating: i64 = parse_field(&record, rating_idx, "rating", file)?;
        let rating = Rating::from_value(rating).map_err(|e| DataLoadError::ParseError {
            file: file.to_string(),
            line: record_line(&record),
            reason: e.to_string(),
        })?;

        events.push(InteractionEvent {
            user_id: parse_field(&record, user_idx, "user_id", file)?,
            item_id: parse_field(&record, item_idx, "item_id", file)?,
            rating,
            timestamp: parse_field(&record, timestamp_idx, "timestamp", file)?,
        });
    }

    tracing::debug!("Parsed {} interaction events from {}", events.len(), file);
    Ok(events)
}

/// Parse an entity export (users or items) from any reader.
///
/// The column named `id_column` becomes the row key; every other column is
/// kept as a `Raw` column in file order.
pub fn parse_entities<R, K>(reader: R, file: &str, table: &str, id_column: &str) -> Result<EntityTable<K>>
where
    R: Read,
    K: FromStr + Clone,
    K::Err: Display,
{
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let id_idx = column_index(&headers, id_column, table)?;

    let attribute_names: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != id_idx)
        .map(|(idx, name)| (idx, name.trim().to_string()))
        .collect();

    let mut ids = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); attribute_names.len()];

    for record in csv_reader.records() {
        let record = record?;
        ids.push(parse_field(&record, id_idx, id_column, file)?);
        // Each id owns exactly one matrix row downstream
        let raw_id = record.get(id_idx).unwrap_or_default().trim();
        if !seen.insert(raw_id.to_string()) {
            return Err(DataLoadError::ParseError {
                file: file.to_string(),
                line: record_line(&record),
                reason: format!("Duplicate {} '{}'", id_column, raw_id),
            });
        }
        for (slot, (idx, _)) in attribute_names.iter().enumerate() {
            // Short rows are padded with missing values
            let value = record.get(*idx).map(Value::parse).unwrap_or(Value::Missing);
            columns[slot].push(value);
        }
    }

    let mut entity_table = EntityTable::new(table, id_column, ids);
    for ((_, name), values) in attribute_names.into_iter().zip(columns) {
        entity_table.push_column(Column::new(name, ColumnKind::Raw, values))?;
    }

    tracing::debug!(
        "Parsed {} rows with {} columns from {}",
        entity_table.len(),
        entity_table.columns().len(),
        file
    );
    Ok(entity_table)
}

/// Parse the interactions export file
pub fn parse_interactions_file(path: &Path) -> Result<Vec<InteractionEvent>> {
    parse_interactions(open_file(path)?, &file_label(path))
}

/// Parse the users export file, keyed by `user_id`
pub fn parse_users_file(path: &Path) -> Result<EntityTable<UserId>> {
    parse_entities(open_file(path)?, &file_label(path), "users", "user_id")
}

/// Parse the items export file, keyed by `item_id`
pub fn parse_items_file(path: &Path) -> Result<EntityTable<ItemId>> {
    parse_entities(open_file(path)?, &file_label(path), "items", "item_id")
}
