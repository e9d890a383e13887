//! Dataset seeder
//!
//! Recreates each table with its primary key and indexes, then streams the
//! generated rows through a [`BulkLoader`]. Tables are seeded in dependency
//! order: users, tours, bookings, reviews.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assign::EntityAssigner;
use crate::config::Config;
use crate::load::{BulkLoader, LoadStats, RowYield};
use crate::rows::RowFactory;
use crate::scale::ScaleModel;
use crate::schema::{self, TableDef};
use crate::storage::Store;
use crate::types::Row;
use crate::Result;

/// Row counts of a seeding run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub database: String,
    pub users: u64,
    pub tours: u64,
    pub bookings: u64,
    pub self_bookings: u64,
    pub reviews: u64,
    pub self_reviews: u64,
    pub elapsed: Duration,

    /// Loader statistics, one entry per table load
    pub loads: Vec<LoadStats>,
}

impl SeedSummary {
    pub fn total_rows(&self) -> u64 {
        self.users + self.tours + self.bookings + self.self_bookings + self.reviews + self.self_reviews
    }
}

/// Seeds every table of the dataset
#[derive(Debug)]
pub struct Seeder {
    loader: BulkLoader,
    factory: RowFactory,
    database: String,
    loads: Vec<LoadStats>,
}

impl Seeder {
    /// Seeder with a system clock and a loader built from `config.load`
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Result<Self> {
        config.validate()?;
        let scale = ScaleModel::derive(&config.scale)?;
        Ok(Self::with_parts(
            BulkLoader::new(store, config.load.clone()),
            RowFactory::new(EntityAssigner::new(scale)),
            &config.database,
        ))
    }

    pub fn with_parts(loader: BulkLoader, factory: RowFactory, database: &str) -> Self {
        Self {
            loader,
            factory,
            database: database.to_string(),
            loads: Vec::new(),
        }
    }

    pub fn scale(&self) -> &ScaleModel {
        self.factory.assigner().scale()
    }

    async fn prepare(&self, table: &TableDef) -> Result<()> {
        let store = self.loader.store();
        store.recreate_table(table.name, table.primary_key).await?;
        for index in &table.indexes {
            store.ensure_index(table.name, index).await?;
        }
        debug!(table = table.name, indexes = table.indexes.len(), "table prepared");
        Ok(())
    }

    fn record(&mut self) {
        if let Some(stats) = self.loader.last_stats() {
            self.loads.push(stats.clone());
        }
    }

    pub async fn seed_users(&mut self) -> Result<u64> {
        let users = schema::users();
        self.prepare(&users).await?;

        let factory = &self.factory;
        let count = self.scale().user_count;
        let inserted = self
            .loader
            .load(users.name, count, |_, user| factory.user(user).map(RowYield::One))
            .await?;
        self.record();
        Ok(inserted)
    }

    pub async fn seed_tours(&mut self) -> Result<u64> {
        let tours = schema::tours();
        self.prepare(&tours).await?;

        let factory = &self.factory;
        let count = self.scale().tour_count;
        let inserted = self
            .loader
            .load(tours.name, count, |_, tour| {
                let assignment = factory.assigner().tour(tour)?;
                Ok(RowYield::One(factory.tour(&assignment)))
            })
            .await?;
        self.record();
        Ok(inserted)
    }

    /// Seed bookings and the self-booking markers. Returns both counts.
    pub async fn seed_bookings(&mut self) -> Result<(u64, u64)> {
        let bookings = schema::bookings();
        let self_bookings = schema::self_bookings();
        self.prepare(&bookings).await?;
        self.prepare(&self_bookings).await?;

        let factory = &self.factory;
        let count = self.scale().booking_count;
        let mut markers: Vec<Row> = Vec::new();
        let inserted = self
            .loader
            .load(bookings.name, count, |_, booking| {
                let assignment = factory.assigner().booking(booking)?;
                if assignment.is_self() {
                    markers.push(factory.self_booking(&assignment));
                }
                Ok(RowYield::One(factory.booking(&assignment)))
            })
            .await?;
        self.record();

        let marked = self.loader.insert_rows(self_bookings.name, markers).await?;
        self.record();
        Ok((inserted, marked))
    }

    /// Seed reviews and the self-review copies. Returns both counts.
    pub async fn seed_reviews(&mut self) -> Result<(u64, u64)> {
        let reviews = schema::reviews();
        let self_reviews = schema::self_reviews();
        self.prepare(&reviews).await?;
        self.prepare(&self_reviews).await?;

        let factory = &self.factory;
        let count = self.scale().booking_count;
        let mut copies: Vec<Row> = Vec::new();
        let inserted = self
            .loader
            .load(reviews.name, count, |row_ordinal, booking| {
                let Some(pair) = factory.assigner().reviews_of_booking(booking)? else {
                    return Ok(RowYield::Skip);
                };
                debug_assert_eq!(pair[0].ordinal, row_ordinal);
                let rows = pair
                    .iter()
                    .map(|review| {
                        let row = factory.review(review);
                        if review.is_self() {
                            copies.push(row.clone());
                        }
                        row
                    })
                    .collect();
                Ok(RowYield::Many(rows))
            })
            .await?;
        self.record();

        let copied = self.loader.insert_rows(self_reviews.name, copies).await?;
        self.record();
        Ok((inserted, copied))
    }

    /// Create the database and seed every table
    pub async fn seed_all(&mut self) -> Result<SeedSummary> {
        let start = Instant::now();
        self.loader.store().ensure_database(&self.database).await?;
        self.loads.clear();

        let users = self.seed_users().await?;
        let tours = self.seed_tours().await?;
        let (bookings, self_bookings) = self.seed_bookings().await?;
        let (reviews, self_reviews) = self.seed_reviews().await?;

        let summary = SeedSummary {
            database: self.database.clone(),
            users,
            tours,
            bookings,
            self_bookings,
            reviews,
            self_reviews,
            elapsed: start.elapsed(),
            loads: std::mem::take(&mut self.loads),
        };
        info!(
            database = %summary.database,
            rows = summary.total_rows(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "dataset seeded"
        );
        Ok(summary)
    }

    /// Loader statistics recorded since the last `seed_all`
    pub fn loads(&self) -> &[LoadStats] {
        &self.loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaleConfig;
    use crate::schema::{field, table};
    use crate::storage::MemoryStore;
    use crate::types::{IndexKey, Value};

    fn self_dealing_config() -> Config {
        Config {
            scale: ScaleConfig {
                user_count: 10,
                conducteur_ratio: 0.5,
                passenger_ratio: 1.0,
                tour_count: 10,
                booking_count: 20,
                approved_bookings_per_tour: 1,
            },
            ..Config::small()
        }
    }

    #[tokio::test]
    async fn test_seed_all_small() {
        let store = Arc::new(MemoryStore::new());
        let mut seeder = Seeder::new(store.clone(), &Config::small()).unwrap();
        let summary = seeder.seed_all().await.unwrap();

        assert_eq!(summary.users, 100);
        assert_eq!(summary.tours, 100);
        assert_eq!(summary.bookings, 200);
        assert_eq!(summary.reviews, 300);
        assert_eq!(summary.self_bookings, 0);
        assert_eq!(summary.self_reviews, 0);
        assert_eq!(summary.loads.len(), 6);
        assert!(store.has_database("test"));

        let reviews = store
            .count_by_index(
                table::REVIEWS,
                field::TOUR_ID,
                &IndexKey::single("tour001"),
            )
            .await
            .unwrap();
        assert_eq!(reviews, 6);
    }

    #[tokio::test]
    async fn test_self_dealing_markers() {
        let store = Arc::new(MemoryStore::new());
        let mut seeder = Seeder::new(store.clone(), &self_dealing_config()).unwrap();
        let summary = seeder.seed_all().await.unwrap();

        assert_eq!(summary.bookings, 20);
        assert_eq!(summary.self_bookings, 2);
        assert_eq!(summary.reviews, 20);
        assert_eq!(summary.self_reviews, 4);

        assert!(store
            .contains_key(table::SELF_BOOKINGS, &Value::from("booking07"))
            .await
            .unwrap());
        assert!(store
            .contains_key(table::SELF_BOOKINGS, &Value::from("booking17"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_reseeding_recreates_tables() {
        let store = Arc::new(MemoryStore::new());
        let mut seeder = Seeder::new(store.clone(), &Config::small()).unwrap();
        seeder.seed_users().await.unwrap();
        seeder.seed_users().await.unwrap();
        assert_eq!(store.count_rows(table::USERS).await.unwrap(), 100);
    }

    #[test]
    fn test_invalid_config_rejected_before_writes() {
        let mut config = Config::small();
        config.scale.conducteur_ratio = 0.0;
        let store = Arc::new(MemoryStore::new());
        assert!(Seeder::new(store.clone(), &config).is_err());
        assert_eq!(store.stats().tables, 0);
    }
}
