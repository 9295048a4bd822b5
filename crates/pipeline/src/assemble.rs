//! Assembly of the model-ready dataset.
//!
//! Fixes the user and item index spaces once, from the full entity tables,
//! and builds every matrix against them:
//! - interactions: 1.0 where the surviving interaction is positive
//! - weights: the weight of every surviving interaction, zeros included
//! - user / item features: rows = entities, columns = vocabulary

use crate::error::{PipelineError, Result};
use crate::features::{EntityFeatures, FeatureVector, ItemFeatures, ItemTypeIndex};
use crate::interactions::{PositiveIndex, ReducedInteraction};
use crate::mode::FeatureMode;
use data_loader::{ItemId, UserId};
use serde::Serialize;
use sprs::vec::IntoSparseVecIter;
use sprs::{CsMat, TriMat};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Sparse matrix in CSR form.
///
/// Built from (row, col, value) triplets. A stored 0.0 is a defined entry and
/// is counted by `nnz`.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct SparseMatrix(CsMat<f32>);

impl SparseMatrix {
    /// Compress `triplets` into CSR; repeated coordinates are summed
    pub(crate) fn from_triplets(triplets: TriMat<f32>) -> Self {
        Self(triplets.to_csr())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.0.shape()
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.0.nnz()
    }

    /// Stored value at (row, col), `None` if nothing is stored there
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.0.get(row, col).copied()
    }

    /// Stored (column, value) pairs of one row
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.0
            .outer_view(row)
            .into_iter()
            .flat_map(|view| view.into_sparse_vec_iter())
            .map(|(col, value)| (col, *value))
    }

    pub fn as_csr(&self) -> &CsMat<f32> {
        &self.0
    }

    pub fn into_csr(self) -> CsMat<f32> {
        self.0
    }

    /// Scale every row to unit L1 norm. All-zero rows are left as they are.
    pub(crate) fn normalize_rows(&mut self) {
        for mut row in self.0.outer_iterator_mut() {
            let norm: f32 = row.iter().map(|(_, value)| value.abs()).sum();
            if norm > 0.0 {
                row.map_inplace(|value| value / norm);
            }
        }
    }
}

/// Id and feature-name lookups for interpreting matrix rows and columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetMapping {
    pub user_id_map: BTreeMap<UserId, usize>,
    pub user_feature_map: BTreeMap<String, usize>,
    pub item_id_map: BTreeMap<ItemId, usize>,
    pub item_feature_map: BTreeMap<String, usize>,
}

/// Everything a matrix-factorization model needs for one training run
#[derive(Debug, Clone, Serialize)]
pub struct AssembledDataset {
    pub interactions: SparseMatrix,
    pub weights: SparseMatrix,
    pub user_features: Option<SparseMatrix>,
    pub item_features: Option<SparseMatrix>,
    pub mapping: DatasetMapping,
    pub item_types: ItemTypeIndex,
    pub positive_index: PositiveIndex,
}

/// Builds an `AssembledDataset` from the outputs of the earlier stages
#[derive(Debug, Clone, Copy)]
pub struct DatasetAssembler {
    normalize_features: bool,
}

impl DatasetAssembler {
    pub fn new(normalize_features: bool) -> Self {
        Self { normalize_features }
    }

    pub fn assemble(
        &self,
        reduced: &[ReducedInteraction],
        positive_index: PositiveIndex,
        users: &EntityFeatures<UserId>,
        items: ItemFeatures,
        mode: FeatureMode,
    ) -> Result<AssembledDataset> {
        let user_id_map = index_map(&users.ids);
        let item_id_map = index_map(&items.entity.ids);

        let (interactions, weights) = build_interactions(reduced, &user_id_map, &item_id_map)?;

        let (user_features, user_feature_map, item_features, item_feature_map) = match mode {
            FeatureMode::None => (None, BTreeMap::new(), None, BTreeMap::new()),
            FeatureMode::IndicatorOnly | FeatureMode::Hybrid => {
                let (user_matrix, user_feature_map) =
                    self.build_features("user", users, &user_id_map, mode)?;
                let (item_matrix, item_feature_map) =
                    self.build_features("item", &items.entity, &item_id_map, mode)?;
                (Some(user_matrix), user_feature_map, Some(item_matrix), item_feature_map)
            }
        };

        tracing::info!(
            "Assembled dataset: {} users x {} items, {} interactions, {} weights",
            user_id_map.len(),
            item_id_map.len(),
            interactions.nnz(),
            weights.nnz()
        );

        Ok(AssembledDataset {
            interactions,
            weights,
            user_features,
            item_features,
            mapping: DatasetMapping {
                user_id_map,
                user_feature_map,
                item_id_map,
                item_feature_map,
            },
            item_types: items.item_types,
            positive_index,
        })
    }

    fn build_features<K: Ord + Display>(
        &self,
        entity: &str,
        features: &EntityFeatures<K>,
        id_map: &BTreeMap<K, usize>,
        mode: FeatureMode,
    ) -> Result<(SparseMatrix, BTreeMap<String, usize>)> {
        let missing = || PipelineError::MissingFeatures {
            entity: entity.to_string(),
            mode: mode.to_string(),
        };
        let vocabulary = features.vocabulary.as_ref().ok_or_else(missing)?;
        let vectors = features.features.as_ref().ok_or_else(missing)?;

        let feature_map = index_map(vocabulary);
        let mut matrix = build_feature_matrix(entity, vectors, id_map, &feature_map)?;
        if self.normalize_features {
            matrix.normalize_rows();
        }
        Ok((matrix, feature_map))
    }
}

/// Position of each key in `keys`; a repeated key keeps its first position.
///
/// Indices are dense: a repeated key does not consume an index. Parsed
/// exports never repeat an entity id; for hand-built tables the rows of a
/// repeated id share one matrix row and their weights are summed.
pub(crate) fn index_map<K: Ord + Clone>(keys: &[K]) -> BTreeMap<K, usize> {
    let mut map = BTreeMap::new();
    for key in keys {
        let next = map.len();
        map.entry(key.clone()).or_insert(next);
    }
    map
}

pub(crate) fn build_interactions(
    reduced: &[ReducedInteraction],
    user_id_map: &BTreeMap<UserId, usize>,
    item_id_map: &BTreeMap<ItemId, usize>,
) -> Result<(SparseMatrix, SparseMatrix)> {
    let shape = (user_id_map.len(), item_id_map.len());
    let mut interactions = TriMat::new(shape);
    let mut weights = TriMat::with_capacity(shape, reduced.len());

    for interaction in reduced {
        let user = *user_id_map
            .get(&interaction.user_id)
            .ok_or_else(|| PipelineError::MissingReference {
                entity: "user".to_string(),
                id: interaction.user_id.to_string(),
            })?;
        let item = *item_id_map
            .get(&interaction.item_id)
            .ok_or_else(|| PipelineError::MissingReference {
                entity: "item".to_string(),
                id: interaction.item_id.clone(),
            })?;

        weights.add_triplet(user, item, interaction.weight);
        if interaction.is_positive() {
            interactions.add_triplet(user, item, 1.0);
        }
    }
    Ok((
        SparseMatrix::from_triplets(interactions),
        SparseMatrix::from_triplets(weights),
    ))
}

pub(crate) fn build_feature_matrix<K: Ord + Display>(
    entity: &str,
    vectors: &[FeatureVector<K>],
    id_map: &BTreeMap<K, usize>,
    feature_map: &BTreeMap<String, usize>,
) -> Result<SparseMatrix> {
    let mut matrix = TriMat::new((id_map.len(), feature_map.len()));

    for vector in vectors {
        let row = *id_map
            .get(&vector.entity_id)
            .ok_or_else(|| PipelineError::MissingReference {
                entity: entity.to_string(),
                id: vector.entity_id.to_string(),
            })?;
        for (feature, weight) in &vector.features {
            let col = *feature_map
                .get(feature)
                .ok_or_else(|| PipelineError::UnknownFeature {
                    entity: entity.to_string(),
                    id: vector.entity_id.to_string(),
                    feature: feature.clone(),
                })?;
            matrix.add_triplet(row, col, *weight);
        }
    }
    Ok(SparseMatrix::from_triplets(matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reduced(user_id: UserId, item_id: &str, weight: f32) -> ReducedInteraction {
        ReducedInteraction {
            user_id,
            item_id: item_id.to_string(),
            weight,
        }
    }

    fn item_ids() -> Vec<ItemId> {
        vec!["i1".to_string(), "i2".to_string()]
    }

    fn items_without_features() -> ItemFeatures {
        ItemFeatures {
            entity: EntityFeatures::without_features(item_ids()),
            item_types: ItemTypeIndex::new(),
        }
    }

    fn vector<K>(id: K, features: &[(&str, f32)]) -> FeatureVector<K> {
        let mut vector = FeatureVector::new(id);
        for (name, weight) in features {
            vector.features.insert(name.to_string(), *weight);
        }
        vector
    }

    #[test]
    fn test_index_map_keeps_first_position() {
        let map = index_map(&["b", "a", "b", "c"]);
        assert_eq!(map["b"], 0);
        assert_eq!(map["a"], 1);
        assert_eq!(map["c"], 2);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_interactions_and_weights() {
        let users = EntityFeatures::without_features(vec![5, 3, 9]);
        let rows = vec![reduced(3, "i2", 1.0), reduced(9, "i1", 0.0)];

        let dataset = DatasetAssembler::new(true)
            .assemble(&rows, PositiveIndex::new(), &users, items_without_features(), FeatureMode::None)
            .unwrap();

        assert_eq!(dataset.interactions.shape(), (3, 2));
        assert_eq!(dataset.weights.shape(), (3, 2));
        assert_eq!(dataset.interactions.nnz(), 1);
        assert_eq!(dataset.interactions.get(1, 1), Some(1.0));
        assert_eq!(dataset.weights.nnz(), 2);
        // The non-positive interaction is a defined zero weight
        assert_eq!(dataset.weights.get(2, 0), Some(0.0));
        assert_eq!(dataset.interactions.get(2, 0), None);

        assert!(dataset.user_features.is_none());
        assert!(dataset.item_features.is_none());
        assert!(dataset.mapping.user_feature_map.is_empty());
        assert_eq!(dataset.mapping.user_id_map[&9], 2);
    }

    #[test]
    fn test_unknown_user_is_referential_error() {
        let users = EntityFeatures::without_features(vec![1]);
        let rows = vec![reduced(2, "i1", 1.0)];

        let result = DatasetAssembler::new(true).assemble(
            &rows,
            PositiveIndex::new(),
            &users,
            items_without_features(),
            FeatureMode::None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::MissingReference { ref entity, .. }) if entity == "user"
        ));
    }

    #[test]
    fn test_unknown_item_is_referential_error() {
        let users = EntityFeatures::without_features(vec![1]);
        let rows = vec![reduced(1, "i9", 1.0)];

        let result = DatasetAssembler::new(true).assemble(
            &rows,
            PositiveIndex::new(),
            &users,
            items_without_features(),
            FeatureMode::None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::MissingReference { ref entity, .. }) if entity == "item"
        ));
    }

    #[test]
    fn test_feature_outside_vocabulary_is_consistency_error() {
        let ids = vec![1i64];
        let vocabulary = vec!["a".to_string()];
        let vectors = vec![vector(1i64, &[("b", 1.0)])];

        let result = build_feature_matrix("user", &vectors, &index_map(&ids), &index_map(&vocabulary));
        assert!(matches!(result, Err(PipelineError::UnknownFeature { .. })));
    }

    #[test]
    fn test_feature_matrices() {
        let users = EntityFeatures {
            ids: vec![1, 2],
            features: Some(vec![
                vector(1, &[("skill_a", 1.0), ("skill_b", 3.0)]),
                vector(2, &[]),
            ]),
            vocabulary: Some(vec!["skill_a".to_string(), "skill_b".to_string()]),
        };
        let items = ItemFeatures {
            entity: EntityFeatures {
                ids: item_ids(),
                features: Some(vec![vector("i1".to_string(), &[("tag", 1.0)]), vector("i2".to_string(), &[])]),
                vocabulary: Some(vec!["tag".to_string()]),
            },
            item_types: ItemTypeIndex::new(),
        };

        let dataset = DatasetAssembler::new(true)
            .assemble(&[], PositiveIndex::new(), &users, items, FeatureMode::IndicatorOnly)
            .unwrap();

        let user_matrix = dataset.user_features.unwrap();
        assert_eq!(user_matrix.shape(), (2, 2));
        assert_eq!(user_matrix.get(0, 0), Some(0.25));
        assert_eq!(user_matrix.get(0, 1), Some(0.75));
        assert_eq!(user_matrix.row(1).count(), 0);

        let item_matrix = dataset.item_features.unwrap();
        assert_eq!(item_matrix.shape(), (2, 1));
        assert_eq!(item_matrix.get(0, 0), Some(1.0));
        assert_eq!(dataset.mapping.item_feature_map["tag"], 0);
        assert_eq!(dataset.mapping.user_feature_map["skill_b"], 1);
    }

    #[test]
    fn test_feature_matrix_without_normalization() {
        let ids = vec![1i64];
        let vocabulary = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![vector(1i64, &[("a", 2.0), ("b", 2.0)])];

        let matrix =
            build_feature_matrix("user", &vectors, &index_map(&ids), &index_map(&vocabulary)).unwrap();
        assert_eq!(matrix.get(0, 0), Some(2.0));
    }

    #[test]
    fn test_normalization_uses_absolute_weights() {
        let ids = vec![1i64, 2];
        let vocabulary = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![
            vector(1i64, &[("a", -1.0), ("b", 3.0)]),
            vector(2i64, &[("a", -2.0), ("b", 2.0)]),
        ];

        let mut matrix =
            build_feature_matrix("user", &vectors, &index_map(&ids), &index_map(&vocabulary)).unwrap();
        matrix.normalize_rows();

        assert_eq!(matrix.get(0, 0), Some(-0.25));
        assert_eq!(matrix.get(0, 1), Some(0.75));
        // A row summing to zero is still scaled
        assert_eq!(matrix.get(1, 0), Some(-0.5));
        assert_eq!(matrix.get(1, 1), Some(0.5));
    }

    #[test]
    fn test_matrices_are_csr() {
        let users = EntityFeatures::without_features(vec![1, 2]);
        let rows = vec![reduced(2, "i2", 1.0), reduced(2, "i1", 0.0), reduced(1, "i2", 0.0)];

        let dataset = DatasetAssembler::new(true)
            .assemble(&rows, PositiveIndex::new(), &users, items_without_features(), FeatureMode::None)
            .unwrap();

        let weights = dataset.weights.as_csr();
        assert!(weights.is_csr());
        assert_eq!(weights.nnz(), 3);
        assert_eq!(dataset.weights.row(1).collect::<Vec<_>>(), vec![(0, 0.0), (1, 1.0)]);
        assert_eq!(dataset.interactions.row(0).count(), 0);
    }

    #[test]
    fn test_missing_features_for_feature_mode() {
        let users = EntityFeatures::without_features(vec![1]);
        let result = DatasetAssembler::new(true).assemble(
            &[],
            PositiveIndex::new(),
            &users,
            items_without_features(),
            FeatureMode::Hybrid,
        );
        assert!(matches!(result, Err(PipelineError::MissingFeatures { .. })));
    }
}
