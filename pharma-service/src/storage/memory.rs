//! In-memory storage adapter
//!
//! Keeps records in id order behind a `tokio::sync::RwLock`. Ids are
//! assigned sequentially from 1 and never reused. Unique keys declared by
//! the record type are enforced case-insensitively on create and update.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use super::error::{StorageError, StorageOperation};
use super::traits::{EntityId, Page, PageRequest, Record, SearchQuery, Storage, StorageResult};

/// A record type that [`MemoryStorage`] knows how to build and modify
pub trait MemoryEntity: Record {
    /// Validated creation input
    type Create: Send + 'static;
    /// Validated partial update input
    type Update: Send + 'static;

    /// Name used in error messages
    const ENTITY: &'static str;

    /// Build a new record from creation input
    fn from_create(id: EntityId, data: Self::Create, now: DateTime<Utc>) -> Self;

    /// Apply a partial update in place
    fn apply_update(&mut self, data: Self::Update, now: DateTime<Utc>);

    /// `(field, value)` pairs that must be unique across the collection
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

struct MemoryState<E> {
    records: BTreeMap<EntityId, E>,
    next_id: EntityId,
}

/// Storage adapter holding every record in memory
pub struct MemoryStorage<E: MemoryEntity> {
    state: RwLock<MemoryState<E>>,
}

impl<E: MemoryEntity> MemoryStorage<E> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                records: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// True when nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    fn check_unique(
        records: &BTreeMap<EntityId, E>,
        candidate: &E,
        operation: StorageOperation,
    ) -> StorageResult<()> {
        for (field, value) in candidate.unique_keys() {
            let taken = records
                .values()
                .filter(|existing| existing.id() != candidate.id())
                .any(|existing| {
                    existing
                        .unique_keys()
                        .iter()
                        .any(|(f, v)| *f == field && v.eq_ignore_ascii_case(&value))
                });
            if taken {
                return Err(StorageError::already_exists(E::ENTITY, field, value)
                    .with_operation(operation));
            }
        }
        Ok(())
    }
}

impl<E: MemoryEntity> Default for MemoryStorage<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MemoryEntity> Storage for MemoryStorage<E> {
    type Record = E;
    type Create = E::Create;
    type Update = E::Update;

    async fn get_all(
        &self,
        page: PageRequest,
        search: Option<&SearchQuery>,
    ) -> StorageResult<Page<E>> {
        let state = self.state.read().await;
        let matching: Vec<&E> = state
            .records
            .values()
            .filter(|record| search.map_or(true, |s| matches_search(*record, s)))
            .collect();

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    async fn get_by_id(&self, id: EntityId) -> StorageResult<Option<E>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn create(&self, data: E::Create) -> StorageResult<E> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        let record = E::from_create(id, data, Utc::now());
        Self::check_unique(&state.records, &record, StorageOperation::Create)?;

        state.records.insert(id, record.clone());
        state.next_id += 1;
        tracing::debug!(entity = E::ENTITY, id, "Record created");
        Ok(record)
    }

    async fn update(&self, id: EntityId, data: E::Update) -> StorageResult<E> {
        let mut state = self.state.write().await;
        let Some(current) = state.records.get(&id) else {
            return Err(StorageError::not_found(StorageOperation::Update, E::ENTITY, id));
        };

        let mut next = current.clone();
        next.apply_update(data, Utc::now());
        Self::check_unique(&state.records, &next, StorageOperation::Update)?;

        state.records.insert(id, next.clone());
        tracing::debug!(entity = E::ENTITY, id, "Record updated");
        Ok(next)
    }

    async fn delete(&self, id: EntityId) -> StorageResult<bool> {
        let removed = self.state.write().await.records.remove(&id).is_some();
        if removed {
            tracing::debug!(entity = E::ENTITY, id, "Record deleted");
        }
        Ok(removed)
    }
}

/// Case-insensitive substring match over the serialized search fields
fn matches_search<E: Serialize>(record: &E, search: &SearchQuery) -> bool {
    let Ok(Value::Object(map)) = serde_json::to_value(record) else {
        return false;
    };
    let needle = search.term.to_lowercase();
    search
        .fields
        .iter()
        .filter_map(|field| map.get(*field))
        .any(|value| match value {
            Value::String(s) => s.to_lowercase().contains(&needle),
            Value::Number(n) => n.to_string().contains(&needle),
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageErrorKind;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct Tag {
        id: EntityId,
        label: String,
        note: Option<String>,
        updated_at: DateTime<Utc>,
    }

    impl Record for Tag {
        fn id(&self) -> EntityId {
            self.id
        }
    }

    impl MemoryEntity for Tag {
        type Create = (String, Option<String>);
        type Update = String;
        const ENTITY: &'static str = "Tag";

        fn from_create(id: EntityId, (label, note): Self::Create, now: DateTime<Utc>) -> Self {
            Self {
                id,
                label,
                note,
                updated_at: now,
            }
        }

        fn apply_update(&mut self, label: String, now: DateTime<Utc>) {
            self.label = label;
            self.updated_at = now;
        }

        fn unique_keys(&self) -> Vec<(&'static str, String)> {
            vec![("label", self.label.clone())]
        }
    }

    async fn seeded(count: usize) -> MemoryStorage<Tag> {
        let storage = MemoryStorage::new();
        for i in 0..count {
            storage.create((format!("tag-{i:02}"), None)).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_ids_are_sequential_and_not_reused() {
        let storage = seeded(2).await;
        assert!(storage.delete(2).await.unwrap());
        let next = storage.create(("fresh".into(), None)).await.unwrap();
        assert_eq!(next.id, 3);
        assert_eq!(storage.len().await, 2);
    }

    #[tokio::test]
    async fn test_unique_key_on_create_is_case_insensitive() {
        let storage = seeded(1).await;
        let err = storage.create(("TAG-00".into(), None)).await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::AlreadyExists);
        assert_eq!(err.operation, StorageOperation::Create);
        assert_eq!(err.message, "Tag with label 'TAG-00' already exists");
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_checks_uniqueness_against_others_only() {
        let storage = seeded(2).await;
        let same = storage.update(1, "tag-00".into()).await.unwrap();
        assert_eq!(same.label, "tag-00");

        let err = storage.update(1, "tag-01".into()).await.unwrap_err();
        assert_eq!(err.operation, StorageOperation::Update);
        assert!(err.is_unique_violation());

        let unchanged = storage.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(unchanged.label, "tag-00");
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let storage = seeded(0).await;
        let err = storage.update(9, "x".into()).await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let storage = seeded(1).await;
        assert!(storage.delete(1).await.unwrap());
        assert!(!storage.delete(1).await.unwrap());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_paging_past_the_end() {
        let storage = seeded(25).await;

        let first = storage.get_all(PageRequest::new(1, 10), None).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].id, 1);
        assert_eq!(first.total, 25);

        let last = storage.get_all(PageRequest::new(3, 10), None).await.unwrap();
        assert_eq!(last.items.len(), 5);

        let beyond = storage.get_all(PageRequest::new(4, 10), None).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 25);
    }

    #[tokio::test]
    async fn test_search_filters_before_paging() {
        let storage = seeded(12).await;
        storage
            .create(("other".into(), Some("Contains TAG text".into())))
            .await
            .unwrap();

        let search = SearchQuery::new("tag-1", &["label"]).unwrap();
        let page = storage
            .get_all(PageRequest::new(1, 2), Some(&search))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);

        let search = SearchQuery::new("tag text", &["note"]).unwrap();
        let page = storage
            .get_all(PageRequest::new(1, 10), Some(&search))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].label, "other");
    }
}
