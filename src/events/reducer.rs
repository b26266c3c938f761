//! Change batch reduction.
//!
//! # Responsibilities
//! - Keep route and default-filter keys, ignore everything else
//! - Group route events by route index
//! - Decide whether a batch clears every route or edits some of them
//! - Fold partial edits over the stored definitions into upserts/removals
//!
//! # Design Decisions
//! - Pure: reads a store snapshot, never the live store
//! - Full clear requires every route-prefixed event to be a deletion and
//!   one deleted identifier key per occupied slot; counting distinct slots
//!   keeps a redelivered deletion from being counted twice
//! - Folding over the stored definition makes redelivery idempotent: the
//!   same events produce the same draft, and an unchanged draft yields no
//!   mutation

use std::collections::{BTreeMap, BTreeSet};

use crate::events::change::{ChangeBatch, ChangeEvent, ChangeKind};
use crate::events::key::{EventKey, KeyPattern, RouteField};
use crate::routing::definition::{FilterDefinition, PredicateDefinition, RouteDefinition};
use crate::routing::store::{ListPositions, StoreSnapshot};

/// Place `route` at `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    pub slot: usize,
    pub route: RouteDefinition,
    /// Upstream indices of the route's predicates and filters.
    pub positions: ListPositions,
}

/// Drop the route `id` from `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub slot: usize,
    pub id: String,
}

/// How a batch affects the route set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every known route was deleted upstream.
    FullClear,
    /// Slot-level edits.
    Partial {
        upserts: Vec<Upsert>,
        removals: Vec<Removal>,
    },
}

/// Reducer output for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub verdict: Verdict,
    /// Replacement default filters keyed by upstream index, when the batch
    /// touched them.
    pub default_filters: Option<BTreeMap<usize, FilterDefinition>>,
    /// Keys that were not route keys.
    pub ignored_keys: Vec<String>,
}

impl Reduction {
    /// True when applying this reduction cannot change the store.
    pub fn is_noop(&self) -> bool {
        let verdict_noop = match &self.verdict {
            Verdict::FullClear => false,
            Verdict::Partial { upserts, removals } => upserts.is_empty() && removals.is_empty(),
        };
        verdict_noop && self.default_filters.is_none()
    }
}

type Edits<'a> = Vec<(RouteField, &'a ChangeEvent)>;

/// Turns change batches into store mutations.
#[derive(Debug, Clone)]
pub struct Reducer {
    keys: KeyPattern,
}

impl Reducer {
    pub fn new(keys: KeyPattern) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyPattern {
        &self.keys
    }

    pub fn reduce(&self, batch: &ChangeBatch, current: &StoreSnapshot) -> Reduction {
        let mut groups: BTreeMap<usize, Edits<'_>> = BTreeMap::new();
        let mut default_edits: Vec<(usize, &ChangeEvent)> = Vec::new();
        let mut ignored_keys = Vec::new();

        for event in batch.events() {
            match self.keys.parse(event.key()) {
                Ok(EventKey::Route { index, field }) => {
                    groups.entry(index).or_default().push((field, event));
                }
                Ok(EventKey::DefaultFilter { index }) => default_edits.push((index, event)),
                Err(e) => {
                    tracing::debug!(batch_id = %batch.id(), error = %e, "Ignoring change event");
                    ignored_keys.push(event.key().to_string());
                }
            }
        }

        let default_filters = if default_edits.is_empty() {
            None
        } else {
            Some(fold_default_filters(current.indexed_default_filters(), &default_edits))
        };

        let verdict = if is_full_clear(&groups, current) {
            Verdict::FullClear
        } else {
            fold_routes(groups, current)
        };

        tracing::debug!(
            batch_id = %batch.id(),
            full_clear = matches!(verdict, Verdict::FullClear),
            ignored = ignored_keys.len(),
            "Batch reduced"
        );

        Reduction {
            verdict,
            default_filters,
            ignored_keys,
        }
    }
}

fn is_full_clear(groups: &BTreeMap<usize, Edits<'_>>, current: &StoreSnapshot) -> bool {
    if current.is_empty() {
        return false;
    }

    let only_deletions = groups
        .values()
        .flatten()
        .all(|(_, event)| event.kind() == ChangeKind::Deleted);
    if !only_deletions {
        return false;
    }

    let cleared: BTreeSet<usize> = groups
        .iter()
        .filter(|(_, edits)| edits.iter().any(|(field, _)| *field == RouteField::Id))
        .map(|(slot, _)| *slot)
        .collect();

    cleared.len() == current.len() && cleared.iter().all(|slot| current.route_at(*slot).is_some())
}

fn fold_routes(groups: BTreeMap<usize, Edits<'_>>, current: &StoreSnapshot) -> Verdict {
    let mut upserts = Vec::new();
    let mut removals = Vec::new();

    for (slot, edits) in groups {
        let existing = current.route_at(slot);
        let mut draft = existing
            .map(|def| RouteDraft::from_definition(def, current.positions_at(slot)))
            .unwrap_or_default();
        for (field, event) in &edits {
            draft.apply(field, event);
        }

        match (existing, draft.into_definition()) {
            (Some(old), None) => removals.push(Removal {
                slot,
                id: old.id.clone(),
            }),
            (None, None) => {
                // Nothing stored here: a redelivered deletion. Report it so
                // the store can flag the unknown route.
                let deleted_id = edits.iter().find_map(|(field, event)| match field {
                    RouteField::Id if event.kind() == ChangeKind::Deleted => event.old_value(),
                    _ => None,
                });
                if let Some(id) = deleted_id {
                    removals.push(Removal {
                        slot,
                        id: id.to_string(),
                    });
                }
            }
            (Some(old), Some((new, positions))) if old.id != new.id => {
                removals.push(Removal {
                    slot,
                    id: old.id.clone(),
                });
                upserts.push(Upsert {
                    slot,
                    route: new,
                    positions,
                });
            }
            (Some(old), Some((new, positions)))
                if *old == new && current.positions_at(slot) == Some(&positions) => {}
            (_, Some((new, positions))) => upserts.push(Upsert {
                slot,
                route: new,
                positions,
            }),
        }
    }

    Verdict::Partial { upserts, removals }
}

fn fold_default_filters(
    current: &BTreeMap<usize, FilterDefinition>,
    edits: &[(usize, &ChangeEvent)],
) -> BTreeMap<usize, FilterDefinition> {
    let mut slots: BTreeMap<usize, String> = current
        .iter()
        .map(|(i, f)| (*i, f.to_string()))
        .collect();

    for (index, event) in edits {
        set_or_unset(&mut slots, *index, event);
    }

    slots
        .into_iter()
        .map(|(i, text)| (i, FilterDefinition::parse(&text)))
        .collect()
}

fn set_or_unset<K: Ord>(map: &mut BTreeMap<K, String>, key: K, event: &ChangeEvent) {
    match (event.kind(), event.new_value()) {
        (ChangeKind::Deleted, _) | (_, None) => {
            map.remove(&key);
        }
        (_, Some(value)) => {
            map.insert(key, value.to_string());
        }
    }
}

/// A route as a bag of optional fields, the shape the events address.
#[derive(Debug, Default)]
struct RouteDraft {
    id: Option<String>,
    uri: Option<String>,
    order: Option<i32>,
    predicates: BTreeMap<usize, String>,
    filters: BTreeMap<usize, String>,
    metadata: BTreeMap<String, String>,
}

impl RouteDraft {
    /// Seed a draft from the stored route. Entries are keyed by the upstream
    /// indices recorded in `positions`, so a sparse list keeps its gaps.
    fn from_definition(def: &RouteDefinition, positions: Option<&ListPositions>) -> Self {
        let dense;
        let positions = match positions {
            Some(p)
                if p.predicates.len() == def.predicates.len()
                    && p.filters.len() == def.filters.len() =>
            {
                p
            }
            _ => {
                dense = ListPositions::dense(def);
                &dense
            }
        };
        Self {
            id: Some(def.id.clone()),
            uri: Some(def.uri.clone()),
            order: Some(def.order),
            predicates: positions
                .predicates
                .iter()
                .zip(&def.predicates)
                .map(|(i, p)| (*i, p.to_string()))
                .collect(),
            filters: positions
                .filters
                .iter()
                .zip(&def.filters)
                .map(|(i, f)| (*i, f.to_string()))
                .collect(),
            metadata: def.metadata.clone(),
        }
    }

    fn apply(&mut self, field: &RouteField, event: &ChangeEvent) {
        let value = match event.kind() {
            ChangeKind::Deleted => None,
            ChangeKind::Added | ChangeKind::Modified => event.new_value(),
        };

        match field {
            RouteField::Id => self.id = value.map(str::to_string),
            RouteField::Uri => self.uri = value.map(str::to_string),
            RouteField::Order => match value.map(|v| v.trim().parse::<i32>()) {
                None => self.order = None,
                Some(Ok(order)) => self.order = Some(order),
                Some(Err(_)) => {
                    tracing::warn!(
                        key = %event.key(),
                        value = ?event.new_value(),
                        "Ignoring non-numeric route order"
                    );
                }
            },
            RouteField::Predicate(i) => set_or_unset(&mut self.predicates, *i, event),
            RouteField::Filter(i) => set_or_unset(&mut self.filters, *i, event),
            RouteField::Metadata(name) => set_or_unset(&mut self.metadata, name.clone(), event),
        }
    }

    /// `None` when the draft no longer names a route.
    fn into_definition(self) -> Option<(RouteDefinition, ListPositions)> {
        let id = self.id.filter(|id| !id.trim().is_empty())?;
        let positions = ListPositions {
            predicates: self.predicates.keys().copied().collect(),
            filters: self.filters.keys().copied().collect(),
        };
        let def = RouteDefinition {
            id,
            predicates: self
                .predicates
                .values()
                .map(|text| PredicateDefinition::parse(text))
                .collect(),
            filters: self
                .filters
                .values()
                .map(|text| FilterDefinition::parse(text))
                .collect(),
            uri: self.uri.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            metadata: self.metadata,
        };
        Some((def, positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::store::RouteStore;

    fn reducer() -> Reducer {
        Reducer::new(KeyPattern::new("gateway."))
    }

    fn two_route_store() -> RouteStore {
        let store = RouteStore::new();
        store.replace_all(
            vec![
                RouteDefinition::new("A", "http://host1").with_predicate("Path=/a"),
                RouteDefinition::new("B", "http://host2").with_predicate("Path=/b"),
            ],
            vec![],
        );
        store
    }

    fn delete_ids(n: usize) -> Vec<ChangeEvent> {
        ["A", "B", "C"]
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, id)| ChangeEvent::deleted(format!("gateway.routes[{}].id", i), *id))
            .collect()
    }

    #[test]
    fn test_all_identifiers_deleted_is_full_clear() {
        let store = two_route_store();
        let batch = ChangeBatch::new(delete_ids(2));

        let reduction = reducer().reduce(&batch, &store.snapshot());
        assert_eq!(reduction.verdict, Verdict::FullClear);
    }

    #[test]
    fn test_one_identifier_short_is_partial() {
        let store = two_route_store();
        let batch = ChangeBatch::new(delete_ids(1));

        let reduction = reducer().reduce(&batch, &store.snapshot());
        assert_eq!(
            reduction.verdict,
            Verdict::Partial {
                upserts: vec![],
                removals: vec![Removal { slot: 0, id: "A".into() }],
            }
        );
    }

    #[test]
    fn test_deletion_mixed_with_addition_is_partial() {
        let store = two_route_store();
        let mut events = delete_ids(2);
        events.push(ChangeEvent::added("gateway.routes[2].id", "C"));
        events.push(ChangeEvent::added("gateway.routes[2].uri", "http://host3"));
        events.push(ChangeEvent::added("gateway.routes[2].predicates[0]", "Path=/c"));

        let reduction = reducer().reduce(&ChangeBatch::new(events), &store.snapshot());
        match reduction.verdict {
            Verdict::Partial { upserts, removals } => {
                assert_eq!(removals.len(), 2);
                assert_eq!(upserts.len(), 1);
                assert_eq!(upserts[0].route.id, "C");
                assert_eq!(upserts[0].route.predicates[0].args, vec!["/c".to_string()]);
            }
            other => panic!("expected partial verdict, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_store_never_full_clear() {
        let store = RouteStore::new();
        let reduction = reducer().reduce(&ChangeBatch::new(vec![]), &store.snapshot());
        assert!(reduction.is_noop());
    }

    #[test]
    fn test_field_edit_folds_over_existing_route() {
        let store = two_route_store();
        let batch = ChangeBatch::new(vec![
            ChangeEvent::modified("gateway.routes[1].uri", "http://host2", "http://host9"),
            ChangeEvent::added("gateway.routes[1].filters[0]", "StripPrefix=1"),
            ChangeEvent::added("gateway.routes[1].order", "-1"),
        ]);

        let reduction = reducer().reduce(&batch, &store.snapshot());
        let Verdict::Partial { upserts, removals } = reduction.verdict else {
            panic!("expected partial verdict");
        };
        assert!(removals.is_empty());
        assert_eq!(upserts.len(), 1);
        let route = &upserts[0].route;
        assert_eq!(route.id, "B");
        assert_eq!(route.uri, "http://host9");
        assert_eq!(route.order, -1);
        assert_eq!(route.predicates.len(), 1);
        assert_eq!(route.filters[0].name, "StripPrefix");
    }

    #[test]
    fn test_renamed_route_is_removed_and_upserted() {
        let store = two_route_store();
        let batch = ChangeBatch::new(vec![ChangeEvent::modified("gateway.routes[0].id", "A", "A2")]);

        let reduction = reducer().reduce(&batch, &store.snapshot());
        let Verdict::Partial { upserts, removals } = reduction.verdict else {
            panic!("expected partial verdict");
        };
        assert_eq!(removals, vec![Removal { slot: 0, id: "A".into() }]);
        assert_eq!(upserts[0].route.id, "A2");
    }

    #[test]
    fn test_redelivered_batch_reduces_to_nothing() {
        let store = two_route_store();
        let batch = ChangeBatch::new(vec![ChangeEvent::modified(
            "gateway.routes[0].uri",
            "http://host1",
            "http://host5",
        )]);

        let first = reducer().reduce(&batch, &store.snapshot());
        store.apply(&first);
        let second = reducer().reduce(&batch, &store.snapshot());
        assert!(second.is_noop());
    }

    #[test]
    fn test_foreign_keys_are_ignored() {
        let store = two_route_store();
        let batch = ChangeBatch::new(vec![
            ChangeEvent::modified("server.port", "8080", "9090"),
            ChangeEvent::added("gateway.routes[0].weight", "5"),
        ]);

        let reduction = reducer().reduce(&batch, &store.snapshot());
        assert!(reduction.is_noop());
        assert_eq!(reduction.ignored_keys.len(), 2);
    }

    #[test]
    fn test_default_filters_fold() {
        let store = RouteStore::new();
        store.replace_all(vec![], vec![FilterDefinition::parse("AddRequestHeader=X-A,1")]);
        let batch = ChangeBatch::new(vec![
            ChangeEvent::deleted("gateway.default-filters[0]", "AddRequestHeader=X-A,1"),
            ChangeEvent::added("gateway.default-filters[1]", "PreserveHostHeader"),
        ]);

        let reduction = reducer().reduce(&batch, &store.snapshot());
        let filters = reduction.default_filters.unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[&1].name, "PreserveHostHeader");
    }

    fn reduce_into(store: &RouteStore, events: Vec<ChangeEvent>) {
        let reduction = reducer().reduce(&ChangeBatch::new(events), &store.snapshot());
        store.apply(&reduction);
    }

    fn texts<T: ToString>(items: &[T]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn test_sparse_predicates_keep_upstream_indices() {
        let store = RouteStore::new();
        reduce_into(
            &store,
            vec![
                ChangeEvent::added("gateway.routes[0].id", "A"),
                ChangeEvent::added("gateway.routes[0].uri", "http://host1"),
                ChangeEvent::added("gateway.routes[0].predicates[0]", "Path=/a/**"),
                ChangeEvent::added("gateway.routes[0].predicates[1]", "Header=X-A"),
                ChangeEvent::added("gateway.routes[0].predicates[2]", "Header=X-A"),
            ],
        );
        reduce_into(
            &store,
            vec![ChangeEvent::deleted("gateway.routes[0].predicates[1]", "Header=X-A")],
        );
        assert_eq!(
            store.snapshot().positions_at(0).unwrap().predicates,
            vec![0, 2]
        );

        reduce_into(
            &store,
            vec![ChangeEvent::modified(
                "gateway.routes[0].predicates[2]",
                "Header=X-A",
                "Header=X-B",
            )],
        );

        let snapshot = store.snapshot();
        let route = snapshot.route_at(0).unwrap();
        assert_eq!(texts(&route.predicates), vec!["Path=/a/**", "Header=X-B"]);
    }

    #[test]
    fn test_sparse_filters_keep_upstream_indices() {
        let store = RouteStore::new();
        reduce_into(
            &store,
            vec![
                ChangeEvent::added("gateway.routes[0].id", "A"),
                ChangeEvent::added("gateway.routes[0].uri", "http://host1"),
                ChangeEvent::added("gateway.routes[0].predicates[0]", "Path=/a/**"),
                ChangeEvent::added("gateway.routes[0].filters[0]", "StripPrefix=1"),
                ChangeEvent::added("gateway.routes[0].filters[1]", "AddRequestHeader=X-A,1"),
                ChangeEvent::added("gateway.routes[0].filters[2]", "AddRequestHeader=X-B,1"),
            ],
        );
        reduce_into(
            &store,
            vec![ChangeEvent::deleted(
                "gateway.routes[0].filters[1]",
                "AddRequestHeader=X-A,1",
            )],
        );
        reduce_into(
            &store,
            vec![ChangeEvent::modified(
                "gateway.routes[0].filters[2]",
                "AddRequestHeader=X-B,1",
                "AddRequestHeader=X-B,2",
            )],
        );

        let snapshot = store.snapshot();
        let route = snapshot.route_at(0).unwrap();
        assert_eq!(
            texts(&route.filters),
            vec!["StripPrefix=1", "AddRequestHeader=X-B,2"]
        );
        assert_eq!(snapshot.positions_at(0).unwrap().filters, vec![0, 2]);
    }

    #[test]
    fn test_sparse_default_filters_keep_upstream_indices() {
        let store = RouteStore::new();
        reduce_into(
            &store,
            vec![
                ChangeEvent::added("gateway.default-filters[0]", "PreserveHostHeader"),
                ChangeEvent::added("gateway.default-filters[1]", "AddRequestHeader=X-A,1"),
                ChangeEvent::added("gateway.default-filters[2]", "AddRequestHeader=X-B,1"),
            ],
        );
        reduce_into(
            &store,
            vec![ChangeEvent::deleted(
                "gateway.default-filters[1]",
                "AddRequestHeader=X-A,1",
            )],
        );
        reduce_into(
            &store,
            vec![ChangeEvent::modified(
                "gateway.default-filters[2]",
                "AddRequestHeader=X-B,1",
                "AddRequestHeader=X-C,1",
            )],
        );

        let snapshot = store.snapshot();
        assert_eq!(
            texts(snapshot.default_filters()),
            vec!["PreserveHostHeader", "AddRequestHeader=X-C,1"]
        );
        let indices: Vec<usize> = snapshot.indexed_default_filters().keys().copied().collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_bad_order_keeps_previous_value() {
        let store = two_route_store();
        let batch = ChangeBatch::new(vec![
            ChangeEvent::added("gateway.routes[0].order", "soon"),
        ]);
        let reduction = reducer().reduce(&batch, &store.snapshot());
        assert!(reduction.is_noop());
    }
}
