//! Pipeline configuration.
//!
//! Names the user columns to expand or vectorize, the item type columns, the
//! tenant and where side artifacts go. Every field has a default, so a JSON
//! config file only needs the keys it changes.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The mutually exclusive item type columns of the items export
pub const ITEM_TYPE_COLUMNS: [&str; 5] = [
    "container_course",
    "container_workspace",
    "engage_article",
    "engage_microlearning",
    "totara_playlist",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipe-separated multi-valued user columns spread into 0/1 columns
    pub users_spread_hor: Vec<String>,
    /// User columns of `key:value|key:value` pairs expanded into weighted columns
    pub users_expand_dict: Vec<String>,
    /// Free-text user columns concatenated into one document per user
    pub users_concat: Vec<String>,
    pub item_type_columns: Vec<String>,
    pub item_document_column: String,
    /// Tenant whose data is processed; used in artifact names
    pub tenant: String,
    /// Directory for the feature snapshots. No snapshots are written when unset.
    pub output_dir: Option<PathBuf>,
    /// Scale each feature matrix row to sum to 1
    pub normalize_features: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            users_spread_hor: vec!["assignments".to_string()],
            users_expand_dict: vec!["competencies_scale".to_string()],
            users_concat: vec!["description".to_string()],
            item_type_columns: ITEM_TYPE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            item_document_column: "document".to_string(),
            tenant: "0".to_string(),
            output_dir: None,
            normalize_features: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| PipelineError::Load(e.into()))?;
        Self::from_json_str(&json)
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_normalize_features(mut self, normalize: bool) -> Self {
        self.normalize_features = normalize;
        self
    }

    /// All user columns the pipeline reads, in processing order
    pub(crate) fn designated_user_columns(&self) -> Vec<String> {
        self.users_spread_hor
            .iter()
            .chain(&self.users_expand_dict)
            .chain(&self.users_concat)
            .cloned()
            .collect()
    }
}
