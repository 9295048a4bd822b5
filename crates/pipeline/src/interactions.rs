//! Reduction of raw interaction events.
//!
//! Users can interact with the same item many times. Only the latest event of
//! each (user, item) pair is kept, which is a reduction, not an aggregation:
//! ratings are never averaged. When several events share the latest
//! timestamp, the one that appears first in the input wins.

use data_loader::{InteractionEvent, ItemId, Rating, UserId};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Items each user rated positively, in reduced order.
///
/// Only users with at least one positive interaction appear as keys.
pub type PositiveIndex = BTreeMap<UserId, Vec<ItemId>>;

/// The surviving interaction of one (user, item) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducedInteraction {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Sample weight, taken from the rating
    pub weight: f32,
}

impl ReducedInteraction {
    pub fn is_positive(&self) -> bool {
        self.weight > 0.0
    }
}

impl From<&InteractionEvent> for ReducedInteraction {
    fn from(event: &InteractionEvent) -> Self {
        Self {
            user_id: event.user_id,
            item_id: event.item_id.clone(),
            weight: event.rating.weight(),
        }
    }
}

/// Keep the latest event per (user, item) pair and index the positive ones.
///
/// The reduced list is ordered by the first appearance of each pair. Empty
/// input gives empty outputs.
pub fn reduce_interactions(events: &[InteractionEvent]) -> (Vec<ReducedInteraction>, PositiveIndex) {
    let latest = latest_per_pair(events);
    let positive_index = build_positive_index(&latest);
    let reduced: Vec<ReducedInteraction> = latest.into_iter().map(ReducedInteraction::from).collect();

    tracing::debug!(
        "Reduced {} interaction events to {} pairs ({} users with positive interactions)",
        events.len(),
        reduced.len(),
        positive_index.len()
    );
    (reduced, positive_index)
}

/// One event per pair: the maximum timestamp, first occurrence on ties
pub(crate) fn latest_per_pair(events: &[InteractionEvent]) -> Vec<&InteractionEvent> {
    let mut latest: Vec<&InteractionEvent> = Vec::new();
    let mut slots: HashMap<(UserId, &str), usize> = HashMap::with_capacity(events.len());

    for event in events {
        match slots.entry((event.user_id, event.item_id.as_str())) {
            Entry::Occupied(slot) => {
                let current = &mut latest[*slot.get()];
                // Strictly greater: an equal timestamp keeps the earlier event
                if event.timestamp > current.timestamp {
                    *current = event;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(latest.len());
                latest.push(event);
            }
        }
    }
    latest
}

pub(crate) fn build_positive_index(latest: &[&InteractionEvent]) -> PositiveIndex {
    let mut index = PositiveIndex::new();
    for event in latest.iter().filter(|e| e.rating == Rating::Positive) {
        index
            .entry(event.user_id)
            .or_insert_with(Vec::new)
            .push(event.item_id.clone());
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn event(user_id: UserId, item_id: &str, rating: Rating, timestamp: i64) -> InteractionEvent {
        InteractionEvent::new(user_id, item_id, rating, timestamp)
    }

    #[test]
    fn test_latest_event_wins() {
        let events = vec![
            event(1, "a", Rating::Positive, 100),
            event(1, "a", Rating::Negative, 200),
            event(1, "b", Rating::Negative, 300),
            event(1, "b", Rating::Positive, 150),
        ];
        let (reduced, positive_index) = reduce_interactions(&events);

        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].item_id, "a");
        assert_eq!(reduced[0].weight, 0.0);
        assert_eq!(reduced[1].item_id, "b");
        assert_eq!(reduced[1].weight, 0.0);
        assert!(positive_index.is_empty());
    }

    #[test]
    fn test_tie_keeps_first_occurrence() {
        let events = vec![
            event(2, "x", Rating::Negative, 50),
            event(2, "x", Rating::Positive, 50),
        ];
        let latest = latest_per_pair(&events);

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].rating, Rating::Negative);
    }

    #[test]
    fn test_one_row_per_distinct_pair() {
        let events = vec![
            event(1, "a", Rating::Positive, 1),
            event(2, "a", Rating::Positive, 2),
            event(1, "b", Rating::Negative, 3),
            event(1, "a", Rating::Negative, 0),
            event(2, "a", Rating::Positive, 9),
        ];
        let (reduced, _) = reduce_interactions(&events);

        let distinct: HashSet<(UserId, &str)> =
            events.iter().map(|e| (e.user_id, e.item_id.as_str())).collect();
        assert_eq!(reduced.len(), distinct.len());
        let pairs: HashSet<(UserId, &str)> =
            reduced.iter().map(|r| (r.user_id, r.item_id.as_str())).collect();
        assert_eq!(pairs, distinct);
    }

    #[test]
    fn test_duplicating_input_is_idempotent() {
        let events = vec![
            event(1, "a", Rating::Positive, 10),
            event(1, "b", Rating::Negative, 20),
            event(3, "a", Rating::Positive, 30),
        ];
        let mut doubled = events.clone();
        doubled.extend(events.iter().cloned());

        let (once, once_index) = reduce_interactions(&events);
        let (twice, twice_index) = reduce_interactions(&doubled);
        assert_eq!(once, twice);
        assert_eq!(once_index, twice_index);
    }

    #[test]
    fn test_positive_index() {
        let events = vec![
            event(1, "c", Rating::Positive, 1),
            event(1, "a", Rating::Positive, 2),
            event(2, "a", Rating::Negative, 3),
            event(3, "b", Rating::Positive, 4),
            event(3, "b", Rating::Negative, 5),
        ];
        let (_, positive_index) = reduce_interactions(&events);

        assert_eq!(positive_index.len(), 1);
        assert_eq!(positive_index[&1], vec!["c", "a"]);
        assert!(!positive_index.contains_key(&2));
        assert!(!positive_index.contains_key(&3));
        assert!(positive_index.values().all(|items| !items.is_empty()));
    }

    #[test]
    fn test_empty_input() {
        let (reduced, positive_index) = reduce_interactions(&[]);
        assert!(reduced.is_empty());
        assert!(positive_index.is_empty());
    }
}
