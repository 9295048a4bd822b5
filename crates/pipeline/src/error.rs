//! Error types for the feature pipeline.
//!
//! The variants follow the failure classes of a run:
//! schema errors (bad columns or values), referential errors (an interaction
//! pointing outside the user/item universe), consistency errors (a feature
//! outside its vocabulary) and artifact errors. Only artifact errors are
//! recoverable; `DataLoader` logs them instead of returning them.

use data_loader::DataLoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Schema errors raised while reading or reshaping tables
    #[error(transparent)]
    Load(#[from] DataLoadError),

    /// A cell could not be interpreted (e.g. a key:value pair without a value)
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// An interaction references an id absent from the user/item tables
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: String },

    /// A feature vector uses a name that is not in the vocabulary
    #[error("Feature '{feature}' of {entity} {id} is not in the {entity} vocabulary")]
    UnknownFeature {
        entity: String,
        id: String,
        feature: String,
    },

    /// Features were requested for assembly but never extracted
    #[error("No {entity} features were extracted for mode {mode}")]
    MissingFeatures { entity: String, mode: String },

    #[error("Unknown feature mode: {0}")]
    UnknownMode(String),

    /// Writing a side artifact failed
    #[error("Failed to write {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
