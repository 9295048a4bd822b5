//! Loading of a tenant's complete export set.
//!
//! A pipeline run always consumes three files written by the exporting
//! system into one data directory:
//! - `user_interactions_{tenant}.csv`
//! - `item_data_{tenant}.csv`
//! - `user_data_{tenant}.csv`

use crate::error::Result;
use crate::parser;
use crate::types::*;
use std::path::{Path, PathBuf};

/// The three raw exports of one tenant
#[derive(Debug, Clone)]
pub struct RawExports {
    pub interactions: Vec<InteractionEvent>,
    pub items: EntityTable<ItemId>,
    pub users: EntityTable<UserId>,
}

/// Paths of the export files for a tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub interactions: PathBuf,
    pub items: PathBuf,
    pub users: PathBuf,
}

impl ExportPaths {
    pub fn for_tenant(data_dir: &Path, tenant: &str) -> Self {
        Self {
            interactions: data_dir.join(format!("user_interactions_{}.csv", tenant)),
            items: data_dir.join(format!("item_data_{}.csv", tenant)),
            users: data_dir.join(format!("user_data_{}.csv", tenant)),
        }
    }
}

impl RawExports {
    /// Load all three exports of `tenant` from `data_dir`.
    ///
    /// The files are independent, so they are parsed in parallel.
    pub fn load_from_dir(data_dir: &Path, tenant: &str) -> Result<Self> {
        let paths = ExportPaths::for_tenant(data_dir, tenant);
        tracing::info!("Loading exports for tenant {} from {:?}", tenant, data_dir);

        // Nested joins give three-way parallelism
        let ((interactions, items), users) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_interactions_file(&paths.interactions),
                    || parser::parse_items_file(&paths.items),
                )
            },
            || parser::parse_users_file(&paths.users),
        );

        let exports = Self {
            interactions: interactions?,
            items: items?,
            users: users?,
        };

        tracing::info!(
            "Loaded {} interaction events, {} items, {} users",
            exports.interactions.len(),
            exports.items.len(),
            exports.users.len()
        );
        Ok(exports)
    }
}
