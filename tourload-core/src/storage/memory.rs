//! In-memory store
//!
//! `MemoryStore` keeps every table in ordered maps: rows by primary key, and
//! one ordered secondary index per [`IndexSpec`] mapping index keys to the
//! primary keys that carry them. Ordered maps give exact min/max, distinct
//! and grouped counts without sorting. The whole store can be written to and
//! read back from a snapshot file so that separate processes can load and
//! verify the same dataset.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{InsertOutcome, Store};
use crate::types::{IndexKey, IndexSpec, Row, RowPredicate, Value};
use crate::{Error, Result};

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Ordered secondary index
#[derive(Debug, Clone)]
struct SecondaryIndex {
    spec: IndexSpec,
    entries: BTreeMap<IndexKey, BTreeSet<Value>>,
}

impl SecondaryIndex {
    fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            entries: BTreeMap::new(),
        }
    }

    fn add(&mut self, primary_key: &Value, row: &Row) {
        // Rows lacking an indexed field are not indexed
        if let Some(key) = self.spec.key_of(row) {
            self.entries
                .entry(key)
                .or_default()
                .insert(primary_key.clone());
        }
    }

    fn remove(&mut self, primary_key: &Value, row: &Row) {
        if let Some(key) = self.spec.key_of(row) {
            if let Some(keys) = self.entries.get_mut(&key) {
                keys.remove(primary_key);
                if keys.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Table {
    primary_key: String,
    rows: BTreeMap<Value, Row>,
    indexes: BTreeMap<String, SecondaryIndex>,
}

impl Table {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            rows: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    fn insert(&mut self, row: Row) -> std::result::Result<(), String> {
        let primary_key = match row.get(&self.primary_key) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(format!(
                    "Primary key `{}` not found in document",
                    self.primary_key
                ))
            }
        };
        if self.rows.contains_key(&primary_key) {
            return Err(format!(
                "Duplicate primary key `{}`: {}",
                self.primary_key, primary_key
            ));
        }
        for index in self.indexes.values_mut() {
            index.add(&primary_key, &row);
        }
        self.rows.insert(primary_key, row);
        Ok(())
    }

    fn add_index(&mut self, spec: IndexSpec) {
        let mut index = SecondaryIndex::new(spec);
        for (primary_key, row) in &self.rows {
            index.add(primary_key, row);
        }
        self.indexes.insert(index.spec.name.clone(), index);
    }

    fn is_primary(&self, index: &str) -> bool {
        index == self.primary_key
    }

    fn index(&self, name: &str, table: &str) -> Result<&SecondaryIndex> {
        self.indexes.get(name).ok_or_else(|| {
            Error::not_found(format!("Index `{name}` was not found on table `{table}`"))
        })
    }

    /// Rows grouped by index key, in key order
    fn groups<'a>(&'a self, index: &str, table: &str) -> Result<Vec<(IndexKey, Vec<&'a Row>)>> {
        if self.is_primary(index) {
            return Ok(self
                .rows
                .iter()
                .map(|(key, row)| (IndexKey::single(key.clone()), vec![row]))
                .collect());
        }
        Ok(self
            .index(index, table)?
            .entries
            .iter()
            .map(|(key, primary_keys)| {
                let rows = primary_keys
                    .iter()
                    .filter_map(|pk| self.rows.get(pk))
                    .collect();
                (key.clone(), rows)
            })
            .collect())
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub tables: usize,
    pub rows: u64,
    pub index_entries: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    databases: Vec<String>,
    tables: Vec<TableSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableSnapshot {
    name: String,
    primary_key: String,
    indexes: Vec<IndexSpec>,
    rows: Vec<Row>,
}

/// In-memory implementation of [`Store`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: RwLock<BTreeSet<String>>,
    tables: RwLock<BTreeMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        let tables = self.tables.read();
        StoreStats {
            tables: tables.len(),
            rows: tables.values().map(|t| t.rows.len() as u64).sum(),
            index_entries: tables
                .values()
                .flat_map(|t| t.indexes.values())
                .map(|i| i.entries.values().map(|keys| keys.len() as u64).sum::<u64>())
                .sum(),
        }
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases.read().contains(name)
    }

    /// Write every table to `path`
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let bytes = {
            let tables = self.tables.read();
            let snapshot = Snapshot {
                format_version: SNAPSHOT_FORMAT_VERSION,
                databases: self.databases.read().iter().cloned().collect(),
                tables: tables
                    .iter()
                    .map(|(name, table)| TableSnapshot {
                        name: name.clone(),
                        primary_key: table.primary_key.clone(),
                        indexes: table.indexes.values().map(|i| i.spec.clone()).collect(),
                        rows: table.rows.values().cloned().collect(),
                    })
                    .collect(),
            };
            bincode::serialize(&snapshot)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    /// Rebuild a store, indexes included, from a snapshot file
    pub async fn open_snapshot(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::serialization(format!(
                "unsupported snapshot format version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        let mut tables = BTreeMap::new();
        for table_snapshot in snapshot.tables {
            let mut table = Table::new(&table_snapshot.primary_key);
            for row in table_snapshot.rows {
                table
                    .insert(row)
                    .map_err(|msg| Error::serialization(format!("corrupt snapshot: {msg}")))?;
            }
            for spec in table_snapshot.indexes {
                table.add_index(spec);
            }
            tables.insert(table_snapshot.name, table);
        }
        debug!(path = %path.display(), tables = tables.len(), "snapshot read");

        Ok(Self {
            databases: RwLock::new(snapshot.databases.into_iter().collect()),
            tables: RwLock::new(tables),
        })
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&Table) -> Result<T>) -> Result<T> {
        let tables = self.tables.read();
        let found = tables
            .get(table)
            .ok_or_else(|| Error::not_found(format!("Table `{table}` does not exist")))?;
        f(found)
    }

    fn with_table_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> Result<T>,
    ) -> Result<T> {
        let mut tables = self.tables.write();
        let found = tables
            .get_mut(table)
            .ok_or_else(|| Error::not_found(format!("Table `{table}` does not exist")))?;
        f(found)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ensure_database(&self, name: &str) -> Result<()> {
        if self.databases.write().insert(name.to_string()) {
            debug!(database = name, "database created");
        }
        Ok(())
    }

    async fn recreate_table(&self, table: &str, primary_key: &str) -> Result<()> {
        debug!(table, primary_key, "recreate table");
        self.tables
            .write()
            .insert(table.to_string(), Table::new(primary_key));
        Ok(())
    }

    async fn ensure_index(&self, table: &str, index: &IndexSpec) -> Result<()> {
        self.with_table_mut(table, |t| {
            if !t.indexes.contains_key(&index.name) {
                debug!(table, index = %index.name, fields = ?index.fields, "create index");
                t.add_index(index.clone());
            }
            Ok(())
        })
    }

    async fn insert_batch(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome> {
        self.with_table_mut(table, |t| {
            let mut outcome = InsertOutcome::default();
            for row in rows {
                match t.insert(row) {
                    Ok(()) => outcome.inserted += 1,
                    Err(message) => {
                        outcome.errors += 1;
                        outcome.first_error.get_or_insert(message);
                    }
                }
            }
            Ok(outcome)
        })
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        self.with_table(table, |t| Ok(t.rows.len() as u64))
    }

    async fn distinct_count(&self, table: &str, index: &str) -> Result<u64> {
        self.with_table(table, |t| {
            if t.is_primary(index) {
                return Ok(t.rows.len() as u64);
            }
            Ok(t.index(index, table)?.entries.len() as u64)
        })
    }

    async fn distinct_keys(&self, table: &str, index: &str) -> Result<Vec<IndexKey>> {
        self.with_table(table, |t| {
            if t.is_primary(index) {
                return Ok(t.rows.keys().cloned().map(IndexKey::single).collect());
            }
            Ok(t.index(index, table)?.entries.keys().cloned().collect())
        })
    }

    async fn min_max_by_index(
        &self,
        table: &str,
        index: &str,
    ) -> Result<Option<(IndexKey, IndexKey)>> {
        self.with_table(table, |t| {
            if t.is_primary(index) {
                let first = t.rows.keys().next();
                let last = t.rows.keys().next_back();
                return Ok(first.zip(last).map(|(min, max)| {
                    (IndexKey::single(min.clone()), IndexKey::single(max.clone()))
                }));
            }
            let entries = &t.index(index, table)?.entries;
            Ok(entries
                .keys()
                .next()
                .zip(entries.keys().next_back())
                .map(|(min, max)| (min.clone(), max.clone())))
        })
    }

    async fn group_count_by_index(
        &self,
        table: &str,
        group_index: &str,
        predicate: Option<&RowPredicate>,
    ) -> Result<BTreeMap<IndexKey, u64>> {
        self.with_table(table, |t| {
            Ok(t.groups(group_index, table)?
                .into_iter()
                .map(|(key, rows)| {
                    let count = rows
                        .iter()
                        .filter(|row| predicate.map_or(true, |p| p.matches(row)))
                        .count() as u64;
                    (key, count)
                })
                .collect())
        })
    }

    async fn group_distinct_count(
        &self,
        table: &str,
        group_index: &str,
        field: &str,
    ) -> Result<BTreeMap<IndexKey, u64>> {
        self.with_table(table, |t| {
            Ok(t.groups(group_index, table)?
                .into_iter()
                .map(|(key, rows)| {
                    let distinct: BTreeSet<&Value> =
                        rows.iter().filter_map(|row| row.get(field)).collect();
                    (key, distinct.len() as u64)
                })
                .collect())
        })
    }

    async fn contains_key(&self, table: &str, primary_key: &Value) -> Result<bool> {
        self.with_table(table, |t| Ok(t.rows.contains_key(primary_key)))
    }

    async fn count_by_index(&self, table: &str, index: &str, key: &IndexKey) -> Result<u64> {
        self.with_table(table, |t| {
            if t.is_primary(index) {
                let found = key.first().map_or(false, |pk| t.rows.contains_key(pk));
                return Ok(u64::from(found));
            }
            Ok(t.index(index, table)?
                .entries
                .get(key)
                .map_or(0, |keys| keys.len() as u64))
        })
    }

    async fn update_field(
        &self,
        table: &str,
        primary_key: &Value,
        field: &str,
        value: Value,
    ) -> Result<u64> {
        self.with_table_mut(table, |t| {
            if t.is_primary(field) {
                return Err(Error::invalid_operation(format!(
                    "Primary key `{field}` of table `{table}` cannot be changed"
                )));
            }
            let Some(row) = t.rows.get_mut(primary_key) else {
                return Ok(0);
            };
            if row.get(field) == Some(&value) {
                return Ok(0);
            }
            for index in t.indexes.values_mut() {
                index.remove(primary_key, row);
            }
            row.insert(field, value);
            for index in t.indexes.values_mut() {
                index.add(primary_key, row);
            }
            Ok(1)
        })
    }

    async fn delete_all(&self, table: &str) -> Result<u64> {
        self.with_table_mut(table, |t| {
            let deleted = t.rows.len() as u64;
            t.rows.clear();
            for index in t.indexes.values_mut() {
                index.entries.clear();
            }
            debug!(table, deleted, "delete all rows");
            Ok(deleted)
        })
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn booking(id: &str, tour: &str, user: &str, status: &str) -> Row {
        Row::new()
            .with("bookingId", id)
            .with("tourId", tour)
            .with("userId", user)
            .with("status", status)
    }

    async fn bookings_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.recreate_table("bookings", "bookingId").await.unwrap();
        store
            .ensure_index("bookings", &IndexSpec::simple("tourId"))
            .await
            .unwrap();
        store
            .ensure_index("bookings", &IndexSpec::simple("userId"))
            .await
            .unwrap();
        let outcome = store
            .insert_batch(
                "bookings",
                vec![
                    booking("booking1", "tour1", "user1", "approved"),
                    booking("booking2", "tour1", "user2", "approved"),
                    booking("booking3", "tour1", "user2", "canceled"),
                    booking("booking4", "tour2", "user3", "canceled"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 4);
        store
    }

    #[tokio::test]
    async fn test_duplicate_primary_key_is_rejected() {
        let store = bookings_store().await;
        let outcome = store
            .insert_batch(
                "bookings",
                vec![
                    booking("booking5", "tour2", "user1", "approved"),
                    booking("booking1", "tour9", "user9", "approved"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.errors, 1);
        assert_eq!(
            outcome.first_error.as_deref(),
            Some("Duplicate primary key `bookingId`: booking1")
        );
        assert_eq!(store.count_rows("bookings").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_missing_primary_key_is_rejected() {
        let store = bookings_store().await;
        let outcome = store
            .insert_batch("bookings", vec![Row::new().with("tourId", "tour1")])
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 0);
        assert!(outcome.first_error.unwrap().contains("not found in document"));
    }

    #[tokio::test]
    async fn test_grouped_counts() {
        let store = bookings_store().await;

        let approved = RowPredicate::eq("status", "approved");
        let counts = store
            .group_count_by_index("bookings", "tourId", Some(&approved))
            .await
            .unwrap();
        assert_eq!(counts.get(&IndexKey::single("tour1")), Some(&2));
        // Groups without a match are still reported
        assert_eq!(counts.get(&IndexKey::single("tour2")), Some(&0));

        let passengers = store
            .group_distinct_count("bookings", "tourId", "userId")
            .await
            .unwrap();
        assert_eq!(passengers.get(&IndexKey::single("tour1")), Some(&2));
        assert_eq!(passengers.get(&IndexKey::single("tour2")), Some(&1));
    }

    #[tokio::test]
    async fn test_distinct_and_min_max() {
        let store = bookings_store().await;
        assert_eq!(store.distinct_count("bookings", "userId").await.unwrap(), 3);
        assert_eq!(store.distinct_count("bookings", "bookingId").await.unwrap(), 4);

        let (min, max) = store
            .min_max_by_index("bookings", "bookingId")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(min.as_text(), Some("booking1"));
        assert_eq!(max.as_text(), Some("booking4"));

        let (min, max) = store
            .min_max_by_index("bookings", "userId")
            .await
            .unwrap()
            .unwrap();
        assert_eq!((min.as_text(), max.as_text()), (Some("user1"), Some("user3")));

        assert!(store.min_max_by_index("bookings", "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_update_field_moves_index_entry() {
        let store = bookings_store().await;
        let pk = Value::from("booking4");
        let replaced = store
            .update_field("bookings", &pk, "tourId", Value::from("tour1"))
            .await
            .unwrap();
        assert_eq!(replaced, 1);
        assert_eq!(
            store
                .count_by_index("bookings", "tourId", &IndexKey::single("tour1"))
                .await
                .unwrap(),
            4
        );
        assert_eq!(
            store
                .count_by_index("bookings", "tourId", &IndexKey::single("tour2"))
                .await
                .unwrap(),
            0
        );
        assert!(store
            .update_field("bookings", &pk, "bookingId", Value::from("x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_index_created_after_rows_is_backfilled() {
        let store = bookings_store().await;
        store
            .ensure_index(
                "bookings",
                &IndexSpec::compound("tourIdAndStatus", &["tourId", "status"]),
            )
            .await
            .unwrap();
        assert_eq!(
            store
                .distinct_count("bookings", "tourIdAndStatus")
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_delete_all_and_recreate() {
        let store = bookings_store().await;
        assert_eq!(store.delete_all("bookings").await.unwrap(), 4);
        assert_eq!(store.count_rows("bookings").await.unwrap(), 0);
        assert_eq!(store.distinct_count("bookings", "tourId").await.unwrap(), 0);
        assert!(store
            .min_max_by_index("bookings", "tourId")
            .await
            .unwrap()
            .is_none());

        store.recreate_table("bookings", "bookingId").await.unwrap();
        assert!(store.distinct_count("bookings", "tourId").await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_rebuilds_indexes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("store.snapshot");

        let store = bookings_store().await;
        store.ensure_database("test").await.unwrap();
        store.save_snapshot(&path).await.unwrap();

        let reopened = MemoryStore::open_snapshot(&path).await.unwrap();
        assert!(reopened.has_database("test"));
        assert_eq!(reopened.stats(), store.stats());
        assert_eq!(
            reopened.distinct_count("bookings", "tourId").await.unwrap(),
            2
        );
        assert_eq!(reopened.list_tables().await.unwrap(), vec!["bookings"]);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = MemoryStore::new();
        let err = store.count_rows("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
