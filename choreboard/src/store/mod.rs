//! The record store adapter boundary.
//!
//! The core treats persistence as an external collaborator offering CRUD
//! plus filtered listing over typed records. Every mutating operation in
//! the core is a short read-modify-write through this trait; strict
//! serializability (compare-and-swap, row locks) is the adapter's
//! responsibility, not the core's.

pub mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use choreboard_model::{Filter, LogEntry, TakeoverCounter, Task, VoteRecord, Workflow};

pub use memory::MemoryStore;

/// Errors surfaced by a store adapter.
///
/// Anything that is not a clean miss is wrapped as [`StoreError::Backend`]
/// rather than leaking adapter-specific detail; the core never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("record not found: {collection}/{id}")]
    NotFound {
        /// Collection searched.
        collection: &'static str,
        /// Identifier that missed.
        id: String,
    },
    /// A record with the same identifier already exists.
    #[error("duplicate record: {collection}/{id}")]
    Duplicate {
        /// Collection written to.
        collection: &'static str,
        /// Identifier that collided.
        id: String,
    },
    /// A record could not be converted to or from its stored shape.
    #[error("record codec failure in {collection}: {message}")]
    Codec {
        /// Collection involved.
        collection: &'static str,
        /// What went wrong.
        message: String,
    },
    /// Unclassified adapter failure.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// A persistable record type: names its collection and exposes its id.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection (table) the record lives in.
    const COLLECTION: &'static str;

    /// The record's identifier, as stored.
    fn record_id(&self) -> String;
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for Workflow {
    const COLLECTION: &'static str = "workflows";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for LogEntry {
    const COLLECTION: &'static str = "logs";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for VoteRecord {
    const COLLECTION: &'static str = "votes";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for TakeoverCounter {
    const COLLECTION: &'static str = "takeover_counters";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

/// Sort order for listed records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Field to order by.
    pub field: String,
    /// `true` for newest/highest first.
    pub descending: bool,
}

impl Sort {
    /// Ascending order on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on `field`.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Pagination window for listed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Records to skip.
    pub offset: usize,
    /// Maximum records to return.
    pub limit: usize,
}

/// CRUD plus filtered listing over typed records.
pub trait Store: Send + Sync {
    /// Persists a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id already exists, or a
    /// codec/backend error.
    fn create<R: Record>(&self, record: &R) -> Result<(), StoreError>;

    /// Fetches a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent.
    fn get<R: Record>(&self, id: &str) -> Result<R, StoreError>;

    /// Overwrites an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent.
    fn update<R: Record>(&self, record: &R) -> Result<(), StoreError>;

    /// Lists records matching `filter`, optionally sorted and paged.
    ///
    /// # Errors
    ///
    /// Returns a codec/backend error on adapter failure.
    fn list<R: Record>(
        &self,
        filter: &Filter,
        sort: Option<&Sort>,
        page: Option<Page>,
    ) -> Result<Vec<R>, StoreError>;

    /// First record matching `filter`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns a codec/backend error on adapter failure.
    fn get_first<R: Record>(&self, filter: &Filter) -> Result<Option<R>, StoreError>;
}
