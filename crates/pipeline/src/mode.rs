//! Feature extraction modes.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side information goes into the model, applied to users and items alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// Pure collaborative filtering, no feature matrices
    #[default]
    None,
    /// Tag and key:value features only
    IndicatorOnly,
    /// Tag features plus TF-IDF text features
    Hybrid,
}

impl FeatureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureMode::None => "none",
            FeatureMode::IndicatorOnly => "indicator_only",
            FeatureMode::Hybrid => "hybrid",
        }
    }

    pub fn uses_features(self) -> bool {
        !matches!(self, FeatureMode::None)
    }
}

impl fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names and the exporter's legacy query names
/// (`mf`, `partial`).
impl FromStr for FeatureMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "mf" => Ok(FeatureMode::None),
            "indicator_only" | "partial" => Ok(FeatureMode::IndicatorOnly),
            "hybrid" => Ok(FeatureMode::Hybrid),
            other => Err(PipelineError::UnknownMode(other.to_string())),
        }
    }
}
