//! Core domain types for the recommender exports.
//!
//! This module defines the fundamental data structures used throughout the system:
//! - Type aliases for the two id spaces (UserId, ItemId)
//! - `InteractionEvent` for one row of the interactions export
//! - `EntityTable` for the user and item exports, a small immutable column store
//!
//! Tables are never edited in place. Transformations build a new table from
//! an existing one (`without_columns`, `select`, `with_column`), so a stage can
//! never observe columns added or dropped by another stage.

use crate::error::{DataLoadError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Identifier of a user in the exporting system
pub type UserId = i64;

/// Identifier of an item; item ids are composite strings such as `container_course1`
pub type ItemId = String;

// =============================================================================
// Interaction Types
// =============================================================================

/// Binary rating attached to an interaction event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    /// Rating 0: the user interacted but the signal is not positive
    Negative,
    /// Rating 1
    Positive,
}

impl Rating {
    /// Convert a raw rating value, rejecting anything outside {0, 1}
    pub fn from_value(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Rating::Negative),
            1 => Ok(Rating::Positive),
            _ => Err(DataLoadError::InvalidValue {
                field: "rating".to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Rating::Positive)
    }

    /// Sample weight carried into the weights matrix
    pub fn weight(self) -> f32 {
        match self {
            Rating::Negative => 0.0,
            Rating::Positive => 1.0,
        }
    }
}

/// One raw user-item event from the interactions export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: Rating,
    /// Unix timestamp of the event
    pub timestamp: i64,
}

impl InteractionEvent {
    pub fn new(user_id: UserId, item_id: impl Into<ItemId>, rating: Rating, timestamp: i64) -> Self {
        Self {
            user_id,
            item_id: item_id.into(),
            rating,
            timestamp,
        }
    }
}

// =============================================================================
// Tabular Types
// =============================================================================

/// A single cell of an entity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Missing,
    /// A numeric cell; `raw` is the text it was read from, so "007" and
    /// "7" stay distinct tokens.
    Number { value: f64, raw: String },
    Text(String),
}

impl Value {
    /// Interpret a raw CSV field.
    ///
    /// Empty fields are `Missing`, finite numbers are `Number`, everything
    /// else (including "nan" and "inf") stays `Text`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Value::Number {
                value,
                raw: raw.to_string(),
            },
            _ => Value::Text(raw.to_string()),
        }
    }

    /// A derived numeric cell, rendered without a trailing `.0` when integral
    pub fn number(value: f64) -> Self {
        let raw = if value.fract() == 0.0 && value.abs() < 1e15 {
            (value as i64).to_string()
        } else {
            value.to_string()
        };
        Value::Number { value, raw }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// True only for a numeric cell holding exactly 1
    pub fn is_one(&self) -> bool {
        self.as_number() == Some(1.0)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// String form used for token splitting and document concatenation.
    /// Missing cells become the empty string.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number { raw, .. } => f.write_str(raw),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Value::parse(raw)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::number(number)
    }
}

/// How a column came to be, which decides how it turns into features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Read as-is from the export
    Raw,
    /// Derived 0/1 column from a multi-valued indicator field
    Indicator,
    /// Derived numeric weight from a key:value field
    Weighted,
}

/// A named column with one value per table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// A column read straight from an export
    pub fn raw<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(name, ColumnKind::Raw, values.into_iter().map(Into::into).collect())
    }
}

/// An immutable table of entity records (users or items) keyed by entity id.
///
/// Row order is the order of `ids` and is preserved by every transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTable<K> {
    name: String,
    id_column: String,
    ids: Vec<K>,
    columns: Vec<Column>,
}

impl<K: Clone> EntityTable<K> {
    /// Creates a table with the given row keys and no attribute columns
    pub fn new(name: impl Into<String>, id_column: impl Into<String>, ids: Vec<K>) -> Self {
        Self {
            name: name.into(),
            id_column: id_column.into(),
            ids,
            columns: Vec::new(),
        }
    }

    /// Returns a copy of this table with `column` appended
    pub fn with_column(&self, column: Column) -> Result<Self> {
        let mut table = self.clone();
        table.push_column(column)?;
        Ok(table)
    }

    /// Append a column while the table is being built
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if column.values.len() != self.ids.len() {
            return Err(DataLoadError::ColumnLengthMismatch {
                column: column.name,
                expected: self.ids.len(),
                found: column.values.len(),
            });
        }
        if column.name == self.id_column || self.column(&column.name).is_some() {
            return Err(DataLoadError::DuplicateColumn {
                column: column.name,
                table: self.name.clone(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Column headers in table order, excluding the id column
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like `column`, but a missing column is a schema error
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| DataLoadError::MissingColumn {
            column: name.to_string(),
            table: self.name.clone(),
        })
    }

    /// Projection onto `names`, in that order. Every name must exist.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| self.require_column(name.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: self.name.clone(),
            id_column: self.id_column.clone(),
            ids: self.ids.clone(),
            columns,
        })
    }

    /// Returns a copy without the named columns. Every name must exist.
    pub fn without_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        for name in names {
            self.require_column(name.as_ref())?;
        }
        let columns = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n.as_ref() == c.name))
            .cloned()
            .collect();
        Ok(Self {
            name: self.name.clone(),
            id_column: self.id_column.clone(),
            ids: self.ids.clone(),
            columns,
        })
    }
}
