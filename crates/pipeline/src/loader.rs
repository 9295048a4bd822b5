//! End-to-end orchestration of one pipeline run.
//!
//! ## Stages
//! 1. Reduce interaction events to one row per (user, item)
//! 2. Extract item and user features (in parallel, they share nothing)
//! 3. Write the feature snapshots, if an output directory is configured
//! 4. Assemble matrices and mappings

use crate::artifacts::{write_feature_snapshot, EntityKind};
use crate::assemble::{AssembledDataset, DatasetAssembler};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::{EntityFeatures, FeatureExtractor, ItemFeatures};
use crate::interactions::reduce_interactions;
use crate::mode::FeatureMode;
use crate::text::StopwordCleaner;
use crate::traits::TextCleaner;
use data_loader::{EntityTable, InteractionEvent, ItemId, RawExports, UserId};
use std::path::Path;
use std::sync::Arc;

/// Runs the full pipeline over a tenant's exports.
///
/// ## Usage
/// ```ignore
/// let loader = DataLoader::new(PipelineConfig::default().with_output_dir("data"));
/// let dataset = loader.load_data(&events, &items, &users, FeatureMode::Hybrid)?;
/// ```
#[derive(Clone)]
pub struct DataLoader {
    config: Arc<PipelineConfig>,
    cleaner: Arc<dyn TextCleaner>,
}

impl DataLoader {
    /// Create a loader using the default stop-word cleaner
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            cleaner: Arc::new(StopwordCleaner::new()),
        }
    }

    /// Replace the document cleaner (builder pattern)
    pub fn with_cleaner(mut self, cleaner: impl TextCleaner + 'static) -> Self {
        self.cleaner = Arc::new(cleaner);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage and return the assembled dataset.
    ///
    /// Any schema, referential or consistency error aborts the run. Failing
    /// to write a snapshot does not.
    pub fn load_data(
        &self,
        interactions: &[InteractionEvent],
        items: &EntityTable<ItemId>,
        users: &EntityTable<UserId>,
        mode: FeatureMode,
    ) -> Result<AssembledDataset> {
        tracing::info!(
            "Preparing tenant {} in mode {}: {} events, {} items, {} users",
            self.config.tenant,
            mode,
            interactions.len(),
            items.len(),
            users.len()
        );

        let (reduced, positive_index) = reduce_interactions(interactions);

        let extractor = FeatureExtractor::new(self.config.clone(), self.cleaner.clone());
        let (item_features, user_features) = rayon::join(
            || extractor.extract_items(items, mode),
            || extractor.extract_users(users, mode),
        );
        let item_features = item_features?;
        let user_features = user_features?;

        if let Some(dir) = &self.config.output_dir {
            self.persist_snapshots(dir, &user_features, &item_features);
        }

        DatasetAssembler::new(self.config.normalize_features).assemble(
            &reduced,
            positive_index,
            &user_features,
            item_features,
            mode,
        )
    }

    /// Convenience wrapper over `load_data` for parsed exports
    pub fn load_exports(&self, exports: &RawExports, mode: FeatureMode) -> Result<AssembledDataset> {
        self.load_data(&exports.interactions, &exports.items, &exports.users, mode)
    }

    /// Write both snapshots. Failures are logged and otherwise ignored.
    fn persist_snapshots(
        &self,
        dir: &Path,
        users: &EntityFeatures<UserId>,
        items: &ItemFeatures,
    ) {
        let tenant = self.config.tenant.as_str();
        let results = [
            (
                EntityKind::User,
                write_feature_snapshot(dir, EntityKind::User, tenant, users.features.as_deref()),
            ),
            (
                EntityKind::Item,
                write_feature_snapshot(dir, EntityKind::Item, tenant, items.entity.features.as_deref()),
            ),
        ];

        for (kind, result) in results {
            match result {
                Ok(path) => tracing::debug!("Wrote {} feature snapshot to {:?}", kind, path),
                Err(e) => tracing::warn!("Could not write {} feature snapshot: {}", kind, e),
            }
        }
    }
}
