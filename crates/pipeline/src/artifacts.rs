//! Feature snapshots written next to the exports.
//!
//! One file per entity kind, `processed_{kind}_data_{tenant}.txt`, holding the
//! JSON list of `[entity_id, {feature: weight}]` pairs, or `null` when no
//! features were extracted. The files are for inspection only; nothing in the
//! pipeline reads them back.

use crate::error::{PipelineError, Result};
use crate::features::FeatureVector;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Item,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Item => "item",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn snapshot_path(dir: &Path, kind: EntityKind, tenant: &str) -> PathBuf {
    dir.join(format!("processed_{}_data_{}.txt", kind, tenant))
}

/// Write the feature snapshot of one entity kind and return its path
pub fn write_feature_snapshot<K: Serialize>(
    dir: &Path,
    kind: EntityKind,
    tenant: &str,
    features: Option<&[FeatureVector<K>]>,
) -> Result<PathBuf> {
    let path = snapshot_path(dir, kind, tenant);
    let body = serde_json::to_string(&features)?;
    fs::write(&path, body).map_err(|source| PipelineError::Artifact {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}
