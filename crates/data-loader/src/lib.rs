//! # Data Loader Crate
//!
//! This crate reads the tabular exports of the learning platform that feed the
//! recommender: user-item interaction events, item records and user records.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (InteractionEvent, Rating, EntityTable, Value)
//! - **parser**: Parse the CSV exports into Rust structs
//! - **exports**: Load a tenant's three export files in one call
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::RawExports;
//! use std::path::Path;
//!
//! let exports = RawExports::load_from_dir(Path::new("data"), "0")?;
//! println!("{} users, {} items", exports.users.len(), exports.items.len());
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;
pub mod exports;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use exports::{ExportPaths, RawExports};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    Column,
    ColumnKind,
    EntityTable,
    InteractionEvent,
    Rating,
    Value,
};
