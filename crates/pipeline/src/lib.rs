//! Feature pipeline turning raw exports into matrix-factorization inputs.
//!
//! This crate provides:
//! - Interaction reduction (latest event per user-item pair)
//! - Categorical expansion of indicator and key:value columns
//! - TF-IDF text vectorization behind the TextCleaner trait
//! - FeatureExtractor for user and item feature vectors
//! - DatasetAssembler for the sparse matrices and id/feature mappings
//!
//! ## Architecture
//! A run processes the exports in stages:
//! 1. Interaction events are reduced to one row per (user, item)
//! 2. Users and items are turned into sparse feature vectors, as the mode asks
//! 3. Feature snapshots are written for inspection
//! 4. Everything is assembled against one user and one item index space
//!
//! ## Example Usage
//! ```ignore
//! use data_loader::RawExports;
//! use pipeline::{DataLoader, FeatureMode, PipelineConfig};
//!
//! let exports = RawExports::load_from_dir(Path::new("data"), "0")?;
//! let loader = DataLoader::new(PipelineConfig::default());
//! let dataset = loader.load_exports(&exports, FeatureMode::Hybrid)?;
//! println!("{} weights", dataset.weights.nnz());
//! ```

pub mod artifacts;
pub mod assemble;
pub mod config;
pub mod error;
pub mod expand;
pub mod features;
pub mod interactions;
pub mod loader;
pub mod mode;
pub mod text;
pub mod traits;

// Re-export main types
pub use assemble::{AssembledDataset, DatasetAssembler, DatasetMapping, SparseMatrix};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use features::{EntityFeatures, FeatureExtractor, FeatureVector, ItemFeatures, ItemTypeIndex};
pub use interactions::{reduce_interactions, PositiveIndex, ReducedInteraction};
pub use loader::DataLoader;
pub use mode::FeatureMode;
pub use text::{StopwordCleaner, TextFeatures, TfidfVectorizer};
pub use traits::TextCleaner;
