//! Wide-format expansion of multi-valued categorical columns.
//!
//! Two transforms, both pure: they return a new table with the source column
//! dropped and the derived columns appended at the end.
//!
//! - `expand_indicator`: `"a|b"` becomes `{col}_a = 1, {col}_b = 1`
//! - `expand_keyvalue`: `"k1:3|k2:1"` becomes `{col}_k1 = 3, {col}_k2 = 1`
//!
//! An empty or missing cell contributes nothing and gets 0 in every derived
//! column.

use crate::error::{PipelineError, Result};
use data_loader::{Column, ColumnKind, EntityTable, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

pub const DEFAULT_DELIMITER: char = '|';
pub const DEFAULT_PAIR_DELIMITER: char = ':';

/// Spread a delimiter-separated token column into one 0/1 column per token.
///
/// Derived columns are named `{column}_{token}` and ordered by token.
pub fn expand_indicator<K: Clone>(
    table: &EntityTable<K>,
    column: &str,
    delimiter: char,
) -> Result<EntityTable<K>> {
    let source = table.require_column(column)?;
    let rows: Vec<BTreeSet<String>> = source
        .values
        .iter()
        .map(|value| split_tokens(&value.to_text(), delimiter))
        .collect();
    let tokens: BTreeSet<&String> = rows.iter().flatten().collect();

    let mut expanded = table.without_columns(&[column])?;
    for token in tokens {
        let values = rows
            .iter()
            .map(|row| Value::number(if row.contains(token) { 1.0 } else { 0.0 }))
            .collect();
        expanded.push_column(Column::new(
            format!("{}_{}", column, token),
            ColumnKind::Indicator,
            values,
        ))?;
    }

    tracing::debug!(
        "Expanded indicator column {} into {} columns",
        column,
        expanded.columns().len() + 1 - table.columns().len()
    );
    Ok(expanded)
}

/// Expand a `key:value` pair column into one weighted column per key.
///
/// Derived columns are named `{column}_{key}` in order of first appearance;
/// a row without the key gets 0.
pub fn expand_keyvalue<K: Clone>(
    table: &EntityTable<K>,
    column: &str,
    delimiter: char,
    pair_delimiter: char,
) -> Result<EntityTable<K>> {
    let source = table.require_column(column)?;

    let mut keys: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows: Vec<HashMap<String, f64>> = Vec::with_capacity(source.values.len());

    for value in &source.values {
        let pairs = parse_pairs(&value.to_text(), delimiter, pair_delimiter, column)?;
        let mut row = HashMap::with_capacity(pairs.len());
        for (key, weight) in pairs {
            if seen.insert(key.clone()) {
                keys.push(key.clone());
            }
            row.insert(key, weight);
        }
        rows.push(row);
    }

    let mut expanded = table.without_columns(&[column])?;
    for key in &keys {
        let values = rows
            .iter()
            .map(|row| Value::number(row.get(key).copied().unwrap_or(0.0)))
            .collect();
        expanded.push_column(Column::new(
            format!("{}_{}", column, key),
            ColumnKind::Weighted,
            values,
        ))?;
    }

    tracing::debug!("Expanded key:value column {} into {} columns", column, keys.len());
    Ok(expanded)
}

/// Distinct non-empty tokens of one cell
pub(crate) fn split_tokens(raw: &str, delimiter: char) -> BTreeSet<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse one cell of `key:value` pairs, keeping input order.
///
/// A pair is split at its first `pair_delimiter`; the value must be numeric.
pub(crate) fn parse_pairs(
    raw: &str,
    delimiter: char,
    pair_delimiter: char,
    column: &str,
) -> Result<Vec<(String, f64)>> {
    let invalid = |pair: &str| PipelineError::InvalidValue {
        field: column.to_string(),
        value: pair.to_string(),
    };

    let mut pairs = Vec::new();
    for pair in raw.split(delimiter).map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once(pair_delimiter).ok_or_else(|| invalid(pair))?;
        let weight: f64 = value.trim().parse().map_err(|_| invalid(pair))?;
        if !weight.is_finite() {
            return Err(invalid(pair));
        }
        pairs.push((key.trim().to_string(), weight));
    }
    Ok(pairs)
}
