//! Feature extraction for users and items.
//!
//! Turns an entity table into one sparse feature vector per row plus the
//! ordered vocabulary of feature names. What goes in depends on the mode:
//!
//! | mode             | features                                   |
//! |------------------|--------------------------------------------|
//! | `None`           | none, pure collaborative filtering         |
//! | `IndicatorOnly`  | tag / indicator / key:value columns        |
//! | `Hybrid`         | the above plus TF-IDF text terms           |
//!
//! Items always yield an `ItemTypeIndex` built from the type columns, whatever
//! the mode. The type columns never become features.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::expand::{expand_indicator, expand_keyvalue, DEFAULT_DELIMITER, DEFAULT_PAIR_DELIMITER};
use crate::mode::FeatureMode;
use crate::text::{TextFeatures, TfidfVectorizer};
use crate::traits::TextCleaner;
use data_loader::{ColumnKind, EntityTable, ItemId, UserId};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps each item to its single type label
pub type ItemTypeIndex = BTreeMap<ItemId, String>;

/// Sparse features of one entity. Absent names have weight zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<K> {
    pub entity_id: K,
    pub features: BTreeMap<String, f32>,
}

impl<K> FeatureVector<K> {
    pub fn new(entity_id: K) -> Self {
        Self {
            entity_id,
            features: BTreeMap::new(),
        }
    }

    pub fn get(&self, feature: &str) -> Option<f32> {
        self.features.get(feature).copied()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Serialized as the pair `[entity_id, {feature: weight, ...}]`
impl<K: Serialize> Serialize for FeatureVector<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.entity_id, &self.features).serialize(serializer)
    }
}

/// Output of feature extraction for one entity population
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFeatures<K> {
    /// Every id of the entity table, in table order
    pub ids: Vec<K>,
    /// One vector per row, absent in `FeatureMode::None`
    pub features: Option<Vec<FeatureVector<K>>>,
    /// Feature names in column order, absent in `FeatureMode::None`
    pub vocabulary: Option<Vec<String>>,
}

impl<K> EntityFeatures<K> {
    pub fn without_features(ids: Vec<K>) -> Self {
        Self {
            ids,
            features: None,
            vocabulary: None,
        }
    }
}

/// Item features together with the item type index
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFeatures {
    pub entity: EntityFeatures<ItemId>,
    pub item_types: ItemTypeIndex,
}

/// Extracts user and item features.
///
/// Cheap to clone; user and item extraction share nothing mutable and can run
/// in parallel.
#[derive(Clone)]
pub struct FeatureExtractor {
    config: Arc<PipelineConfig>,
    cleaner: Arc<dyn TextCleaner>,
    vectorizer: TfidfVectorizer,
}

impl FeatureExtractor {
    pub fn new(config: Arc<PipelineConfig>, cleaner: Arc<dyn TextCleaner>) -> Self {
        Self {
            config,
            cleaner,
            vectorizer: TfidfVectorizer::new(),
        }
    }

    pub fn with_vectorizer(mut self, vectorizer: TfidfVectorizer) -> Self {
        self.vectorizer = vectorizer;
        self
    }

    /// Extract user features.
    ///
    /// The table is projected onto the designated columns; indicator columns
    /// are spread, key:value columns expanded, and in hybrid mode the text
    /// columns are joined into one document per user.
    pub fn extract_users(
        &self,
        users: &EntityTable<UserId>,
        mode: FeatureMode,
    ) -> Result<EntityFeatures<UserId>> {
        let ids = users.ids().to_vec();
        let with_text = match mode {
            FeatureMode::None => return Ok(EntityFeatures::without_features(ids)),
            FeatureMode::IndicatorOnly => false,
            FeatureMode::Hybrid => true,
        };

        let mut table = users.select(&self.config.designated_user_columns())?;
        for column in &self.config.users_spread_hor {
            table = expand_indicator(&table, column, DEFAULT_DELIMITER)?;
        }
        for column in &self.config.users_expand_dict {
            table = expand_keyvalue(&table, column, DEFAULT_DELIMITER, DEFAULT_PAIR_DELIMITER)?;
        }

        let tags = table.without_columns(&self.config.users_concat)?;
        let mut features = partial_features(&tags);
        let mut vocabulary = tags.headers();

        if with_text {
            let documents = concat_documents(&table, &self.config.users_concat)?;
            let text = self.vectorizer.vectorize(&documents, self.cleaner.as_ref());
            merge_text_features(&mut features, &mut vocabulary, text);
        }

        tracing::info!(
            "Extracted {} features for {} users (mode {})",
            vocabulary.len(),
            features.len(),
            mode
        );
        Ok(EntityFeatures {
            ids,
            features: Some(features),
            vocabulary: Some(vocabulary),
        })
    }

    /// Extract item features and the item type index.
    ///
    /// Every column other than the type columns and the document column is a
    /// tag column. A missing document column reads as empty documents.
    pub fn extract_items(&self, items: &EntityTable<ItemId>, mode: FeatureMode) -> Result<ItemFeatures> {
        let item_types = item_type_index(items, &self.config.item_type_columns)?;
        let ids = items.ids().to_vec();
        let with_text = match mode {
            FeatureMode::None => {
                return Ok(ItemFeatures {
                    entity: EntityFeatures::without_features(ids),
                    item_types,
                });
            }
            FeatureMode::IndicatorOnly => false,
            FeatureMode::Hybrid => true,
        };

        let document_column = self.config.item_document_column.as_str();
        let mut excluded: Vec<&str> = self.config.item_type_columns.iter().map(String::as_str).collect();
        if items.column(document_column).is_some() {
            excluded.push(document_column);
        }

        let tags = items.without_columns(&excluded)?;
        let mut features = partial_features(&tags);
        let mut vocabulary = tags.headers();

        if with_text {
            let documents: Vec<String> = match items.column(document_column) {
                Some(column) => column.values.iter().map(|v| v.to_text()).collect(),
                None => vec![String::new(); items.len()],
            };
            let text = self.vectorizer.vectorize(&documents, self.cleaner.as_ref());
            merge_text_features(&mut features, &mut vocabulary, text);
        }

        tracing::info!(
            "Extracted {} features for {} items (mode {})",
            vocabulary.len(),
            features.len(),
            mode
        );
        Ok(ItemFeatures {
            entity: EntityFeatures {
                ids,
                features: Some(features),
                vocabulary: Some(vocabulary),
            },
            item_types,
        })
    }
}

/// One feature vector per row from the table's columns.
///
/// `Raw` and `Indicator` columns contribute 1.0 only where the value is
/// exactly 1; `Weighted` columns contribute their nonzero values.
pub(crate) fn partial_features<K: Clone>(table: &EntityTable<K>) -> Vec<FeatureVector<K>> {
    table
        .ids()
        .iter()
        .enumerate()
        .map(|(row, id)| {
            let mut vector = FeatureVector::new(id.clone());
            for column in table.columns() {
                let value = &column.values[row];
                let weight = match column.kind {
                    ColumnKind::Raw | ColumnKind::Indicator => value.is_one().then_some(1.0),
                    ColumnKind::Weighted => value.as_number().filter(|w| *w != 0.0).map(|w| w as f32),
                };
                if let Some(weight) = weight {
                    vector.features.insert(column.name.clone(), weight);
                }
            }
            vector
        })
        .collect()
}

/// Space-joined string form of `columns` for each row; missing cells are empty
pub(crate) fn concat_documents<K: Clone, S: AsRef<str>>(
    table: &EntityTable<K>,
    columns: &[S],
) -> Result<Vec<String>> {
    let columns = columns
        .iter()
        .map(|name| table.require_column(name.as_ref()))
        .collect::<data_loader::Result<Vec<_>>>()?;

    Ok((0..table.len())
        .map(|row| {
            columns
                .iter()
                .map(|column| column.values[row].to_text())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect())
}

/// Merge text weights into the tag vectors (text wins on a name clash) and
/// append the text vocabulary.
fn merge_text_features<K>(
    features: &mut [FeatureVector<K>],
    vocabulary: &mut Vec<String>,
    text: TextFeatures,
) {
    for (vector, row) in features.iter_mut().zip(text.rows) {
        vector.features.extend(row);
    }
    vocabulary.extend(text.feature_names);
}

/// Map each item to the one type column set to 1.
///
/// An item with no type flag, or with more than one, is a schema error.
pub(crate) fn item_type_index<S: AsRef<str>>(
    items: &EntityTable<ItemId>,
    type_columns: &[S],
) -> Result<ItemTypeIndex> {
    let columns = type_columns
        .iter()
        .map(|name| items.require_column(name.as_ref()))
        .collect::<data_loader::Result<Vec<_>>>()?;

    let mut index = ItemTypeIndex::new();
    for (row, item_id) in items.ids().iter().enumerate() {
        let mut flagged = columns.iter().filter(|column| column.values[row].is_one());
        match (flagged.next(), flagged.next()) {
            (Some(column), None) => {
                index.insert(item_id.clone(), column.name.clone());
            }
            (None, _) => {
                return Err(PipelineError::InvalidValue {
                    field: "item_type".to_string(),
                    value: format!("{} has no type flag set", item_id),
                });
            }
            (Some(_), Some(_)) => {
                return Err(PipelineError::InvalidValue {
                    field: "item_type".to_string(),
                    value: format!("{} has more than one type flag set", item_id),
                });
            }
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ITEM_TYPE_COLUMNS;
    use crate::text::StopwordCleaner;
    use data_loader::{Column, DataLoadError};

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(
            Arc::new(PipelineConfig::default()),
            Arc::new(StopwordCleaner::new()),
        )
    }

    fn users() -> EntityTable<UserId> {
        let mut table = EntityTable::new("users", "user_id", vec![10, 20, 30]);
        table.push_column(Column::raw("city_town", ["Leeds", "York", ""])).unwrap();
        table.push_column(Column::raw("assignments", ["a1|a2", "a2", ""])).unwrap();
        table
            .push_column(Column::raw("competencies_scale", ["c1:2|c2:0", "", "c3:1"]))
            .unwrap();
        table
            .push_column(Column::raw(
                "description",
                ["Machine learning engineer", "", "Learning designer"],
            ))
            .unwrap();
        table
    }

    fn items() -> EntityTable<ItemId> {
        let ids = vec!["container_course1".to_string(), "engage_article2".to_string()];
        let mut table = EntityTable::new("items", "item_id", ids);
        for column in ITEM_TYPE_COLUMNS {
            let flags = match column {
                "container_course" => ["1", "0"],
                "engage_article" => ["0", "1"],
                _ => ["0", "0"],
            };
            table.push_column(Column::raw(column, flags)).unwrap();
        }
        table.push_column(Column::raw("topic_rust", ["1", "0"])).unwrap();
        table.push_column(Column::raw("topic_data", ["1", "1"])).unwrap();
        table
            .push_column(Column::raw("document", ["Rust ownership explained", "Data pipelines"]))
            .unwrap();
        table
    }

    #[test]
    fn test_mode_none_has_no_features() {
        let extractor = extractor();

        let user_features = extractor.extract_users(&users(), FeatureMode::None).unwrap();
        assert_eq!(user_features.ids, vec![10, 20, 30]);
        assert!(user_features.features.is_none());
        assert!(user_features.vocabulary.is_none());

        let item_features = extractor.extract_items(&items(), FeatureMode::None).unwrap();
        assert!(item_features.entity.features.is_none());
        assert_eq!(item_features.item_types.len(), 2);
    }

    #[test]
    fn test_user_indicator_only() {
        let features = extractor().extract_users(&users(), FeatureMode::IndicatorOnly).unwrap();
        let vocabulary = features.vocabulary.unwrap();
        let vectors = features.features.unwrap();

        assert_eq!(
            vocabulary,
            vec![
                "assignments_a1",
                "assignments_a2",
                "competencies_scale_c1",
                "competencies_scale_c2",
                "competencies_scale_c3"
            ]
        );
        assert_eq!(vectors.len(), 3);

        assert_eq!(vectors[0].entity_id, 10);
        assert_eq!(vectors[0].get("assignments_a1"), Some(1.0));
        assert_eq!(vectors[0].get("competencies_scale_c1"), Some(2.0));
        // Zero weights are never stored
        assert_eq!(vectors[0].get("competencies_scale_c2"), None);
        assert_eq!(vectors[1].len(), 1);
        assert_eq!(vectors[2].get("competencies_scale_c3"), Some(1.0));
        // Columns that are not designated are ignored
        assert!(vectors.iter().all(|v| v.get("city_town").is_none()));
    }

    #[test]
    fn test_user_hybrid_appends_text_vocabulary() {
        let extractor = extractor();
        let indicator = extractor.extract_users(&users(), FeatureMode::IndicatorOnly).unwrap();
        let hybrid = extractor.extract_users(&users(), FeatureMode::Hybrid).unwrap();

        let indicator_vocabulary = indicator.vocabulary.unwrap();
        let hybrid_vocabulary = hybrid.vocabulary.unwrap();
        let text_vocabulary = &hybrid_vocabulary[indicator_vocabulary.len()..];

        assert_eq!(&hybrid_vocabulary[..indicator_vocabulary.len()], &indicator_vocabulary[..]);
        assert_eq!(text_vocabulary, &["designer", "engineer", "learning", "machine"]);

        let vectors = hybrid.features.unwrap();
        assert_eq!(vectors.len(), 3);
        assert!(vectors[0].get("machine").unwrap() > 0.0);
        assert_eq!(vectors[0].get("assignments_a1"), Some(1.0));
        // A user with no description keeps only tag features
        assert_eq!(vectors[1].len(), 1);
    }

    #[test]
    fn test_user_hybrid_with_empty_descriptions() {
        let mut table = EntityTable::new("users", "user_id", vec![1, 2]);
        table.push_column(Column::raw("assignments", ["x", ""])).unwrap();
        table.push_column(Column::raw("competencies_scale", ["", ""])).unwrap();
        table.push_column(Column::raw("description", ["", "  "])).unwrap();

        let features = extractor().extract_users(&table, FeatureMode::Hybrid).unwrap();
        assert_eq!(features.vocabulary.unwrap(), vec!["assignments_x"]);
        assert_eq!(features.features.unwrap().len(), 2);
    }

    #[test]
    fn test_user_missing_designated_column() {
        let table = users().without_columns(&["competencies_scale"]).unwrap();
        let result = extractor().extract_users(&table, FeatureMode::IndicatorOnly);
        assert!(matches!(
            result,
            Err(PipelineError::Load(DataLoadError::MissingColumn { .. }))
        ));
    }

    #[test]
    fn test_item_indicator_only_excludes_type_columns() {
        let features = extractor().extract_items(&items(), FeatureMode::IndicatorOnly).unwrap();
        let vocabulary = features.entity.vocabulary.unwrap();
        let vectors = features.entity.features.unwrap();

        assert_eq!(vocabulary, vec!["topic_rust", "topic_data"]);
        assert_eq!(vectors[0].features.keys().collect::<Vec<_>>(), vec!["topic_data", "topic_rust"]);
        assert_eq!(vectors[1].get("topic_rust"), None);
        assert_eq!(features.item_types["container_course1"], "container_course");
        assert_eq!(features.item_types["engage_article2"], "engage_article");
    }

    #[test]
    fn test_item_hybrid() {
        let features = extractor().extract_items(&items(), FeatureMode::Hybrid).unwrap();
        let vocabulary = features.entity.vocabulary.unwrap();

        assert_eq!(
            vocabulary,
            vec!["topic_rust", "topic_data", "data", "explained", "ownership", "pipelines", "rust"]
        );
        let vectors = features.entity.features.unwrap();
        assert!(vectors[0].get("ownership").unwrap() > 0.0);
        assert!(vectors[1].get("pipelines").unwrap() > 0.0);
        assert_eq!(vectors[1].get("topic_data"), Some(1.0));
    }

    #[test]
    fn test_item_hybrid_without_document_column() {
        let table = items().without_columns(&["document"]).unwrap();
        let features = extractor().extract_items(&table, FeatureMode::Hybrid).unwrap();

        assert_eq!(features.entity.vocabulary.unwrap(), vec!["topic_rust", "topic_data"]);
        assert_eq!(features.entity.features.unwrap().len(), 2);
    }

    #[test]
    fn test_item_type_index_rejects_ambiguous_items() {
        let table = items()
            .without_columns(&["totara_playlist"])
            .unwrap()
            .with_column(Column::raw("totara_playlist", ["1", "0"]))
            .unwrap();

        let result = item_type_index(&table, &ITEM_TYPE_COLUMNS);
        assert!(matches!(result, Err(PipelineError::InvalidValue { .. })));
    }

    #[test]
    fn test_item_type_index_requires_type_columns() {
        let table = items().without_columns(&["engage_microlearning"]).unwrap();
        let result = item_type_index(&table, &ITEM_TYPE_COLUMNS);
        assert!(matches!(
            result,
            Err(PipelineError::Load(DataLoadError::MissingColumn { .. }))
        ));
    }

    #[test]
    fn test_partial_features_only_exact_ones() {
        let mut table = EntityTable::new("items", "item_id", vec!["i".to_string()]);
        table.push_column(Column::raw("a", ["1"])).unwrap();
        table.push_column(Column::raw("b", ["2"])).unwrap();
        table.push_column(Column::raw("c", ["0"])).unwrap();
        table.push_column(Column::raw("d", ["yes"])).unwrap();

        let vectors = partial_features(&table);
        assert_eq!(vectors[0].features.len(), 1);
        assert_eq!(vectors[0].get("a"), Some(1.0));
    }

    #[test]
    fn test_concat_documents() {
        let docs = concat_documents(&users(), &["city_town", "description"]).unwrap();
        assert_eq!(docs, vec!["Leeds Machine learning engineer", "York ", " Learning designer"]);
    }

    #[test]
    fn test_feature_vector_serializes_as_pair() {
        let mut vector = FeatureVector::new(7i64);
        vector.features.insert("assignments_a".to_string(), 1.0);

        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, r#"[7,{"assignments_a":1.0}]"#);
    }
}
