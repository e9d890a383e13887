//! Storage collaborator contract
//!
//! The loader and the verifier only talk to the backing store through
//! [`Store`]. Any store that offers exact row counts, true min/max under
//! lexicographic order, exact distinct cardinality and per-group predicate
//! counts satisfies the contract; wire protocol and connection handling stay
//! behind the trait.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{IndexKey, IndexSpec, Row, RowPredicate, Value};
use crate::Result;

pub use memory::MemoryStore;

/// Result of a batch insert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    /// Rows stored
    pub inserted: u64,

    /// Rows rejected
    pub errors: u64,

    /// Message of the first rejected row
    pub first_error: Option<String>,
}

/// Narrow storage contract used by the loader and the verifier
#[async_trait]
pub trait Store: Debug + Send + Sync {
    /// Create the database if it does not exist
    async fn ensure_database(&self, name: &str) -> Result<()>;

    /// Drop `table` if present and create it empty with `primary_key`
    async fn recreate_table(&self, table: &str, primary_key: &str) -> Result<()>;

    /// Create a secondary index unless one with the same name exists
    async fn ensure_index(&self, table: &str, index: &IndexSpec) -> Result<()>;

    /// Insert rows; duplicates of an existing primary key are rejected per row
    async fn insert_batch(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome>;

    /// Exact number of rows
    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Number of distinct keys of a secondary index (or the primary key)
    async fn distinct_count(&self, table: &str, index: &str) -> Result<u64>;

    /// Distinct keys of a secondary index (or the primary key), in order
    async fn distinct_keys(&self, table: &str, index: &str) -> Result<Vec<IndexKey>>;

    /// Smallest and largest key of an index, `None` on an empty table
    async fn min_max_by_index(&self, table: &str, index: &str)
        -> Result<Option<(IndexKey, IndexKey)>>;

    /// Rows per group of `group_index` that satisfy `predicate`.
    ///
    /// Every group is reported, including groups with no matching row.
    async fn group_count_by_index(
        &self,
        table: &str,
        group_index: &str,
        predicate: Option<&RowPredicate>,
    ) -> Result<BTreeMap<IndexKey, u64>>;

    /// Distinct values of `field` per group of `group_index`
    async fn group_distinct_count(
        &self,
        table: &str,
        group_index: &str,
        field: &str,
    ) -> Result<BTreeMap<IndexKey, u64>>;

    /// Whether a row with this primary key exists
    async fn contains_key(&self, table: &str, primary_key: &Value) -> Result<bool>;

    /// Rows whose index key equals `key`
    async fn count_by_index(&self, table: &str, index: &str, key: &IndexKey) -> Result<u64>;

    /// Overwrite one field of one row, returning the number of replaced rows
    async fn update_field(
        &self,
        table: &str,
        primary_key: &Value,
        field: &str,
        value: Value,
    ) -> Result<u64>;

    /// Remove every row, returning the number deleted
    async fn delete_all(&self, table: &str) -> Result<u64>;

    /// Names of existing tables
    async fn list_tables(&self) -> Result<Vec<String>>;
}
