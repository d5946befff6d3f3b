//! In-memory store adapter.
//!
//! Backs tests and single-process deployments. Records are held as JSON
//! values in per-collection maps behind a [`RwLock`], so each CRUD call is
//! atomic with respect to other callers — which is exactly the per-record
//! serialization the core's read-modify-write sequences rely on.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use choreboard_model::Filter;

use super::{Page, Record, Sort, Store, StoreError};

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, BTreeMap<String, serde_json::Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn encode<R: Record>(record: &R) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(record).map_err(|e| StoreError::Codec {
            collection: R::COLLECTION,
            message: e.to_string(),
        })
    }

    fn decode<R: Record>(value: serde_json::Value) -> Result<R, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Codec {
            collection: R::COLLECTION,
            message: e.to_string(),
        })
    }
}

impl Store for MemoryStore {
    fn create<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let id = record.record_id();
        let value = Self::encode(record)?;
        let mut collections = self.collections.write();
        let collection = collections.entry(R::COLLECTION).or_default();
        if collection.contains_key(&id) {
            return Err(StoreError::Duplicate {
                collection: R::COLLECTION,
                id,
            });
        }
        collection.insert(id, value);
        Ok(())
    }

    fn get<R: Record>(&self, id: &str) -> Result<R, StoreError> {
        let collections = self.collections.read();
        let value = collections
            .get(R::COLLECTION)
            .and_then(|collection| collection.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: R::COLLECTION,
                id: id.to_string(),
            })?;
        Self::decode(value)
    }

    fn update<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let id = record.record_id();
        let value = Self::encode(record)?;
        let mut collections = self.collections.write();
        let collection = collections.entry(R::COLLECTION).or_default();
        let Some(slot) = collection.get_mut(&id) else {
            return Err(StoreError::NotFound {
                collection: R::COLLECTION,
                id,
            });
        };
        *slot = value;
        Ok(())
    }

    fn list<R: Record>(
        &self,
        filter: &Filter,
        sort: Option<&Sort>,
        page: Option<Page>,
    ) -> Result<Vec<R>, StoreError> {
        let collections = self.collections.read();
        // BTreeMap iteration gives id order; v7 ids make that creation order.
        let mut matched: Vec<serde_json::Value> = collections
            .get(R::COLLECTION)
            .map(|collection| {
                collection
                    .values()
                    .filter(|value| filter.matches(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if let Some(sort) = sort {
            matched.sort_by(|a, b| {
                let ordering = cmp_field(a, b, &sort.field);
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let records = match page {
            Some(page) => matched
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect(),
            None => matched,
        };
        records.into_iter().map(Self::decode).collect()
    }

    fn get_first<R: Record>(&self, filter: &Filter) -> Result<Option<R>, StoreError> {
        let mut found = self.list::<R>(
            filter,
            None,
            Some(Page {
                offset: 0,
                limit: 1,
            }),
        )?;
        Ok(found.pop())
    }
}

/// Compares one field of two JSON records. Timestamps serialize as RFC 3339
/// strings, so string comparison orders them chronologically.
fn cmp_field(a: &serde_json::Value, b: &serde_json::Value, field: &str) -> std::cmp::Ordering {
    let null = serde_json::Value::Null;
    let left = a.get(field).unwrap_or(&null);
    let right = b.get(field).unwrap_or(&null);
    match (left, right) {
        (serde_json::Value::String(l), serde_json::Value::String(r)) => l.cmp(r),
        (serde_json::Value::Number(l), serde_json::Value::Number(r)) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (serde_json::Value::Bool(l), serde_json::Value::Bool(r)) => l.cmp(r),
        (serde_json::Value::Null, serde_json::Value::Null) => std::cmp::Ordering::Equal,
        (serde_json::Value::Null, _) => std::cmp::Ordering::Less,
        (_, serde_json::Value::Null) => std::cmp::Ordering::Greater,
        _ => std::cmp::Ordering::Equal,
    }
}
