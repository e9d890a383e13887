//! Integrity verification
//!
//! [`IntegrityVerifier`] runs a fixed battery of count, min/max, distinct and
//! grouped queries per table and compares each result with the value
//! recomputed from the [`ScaleModel`]. A failing check never stops the
//! battery: every outcome is collected into a [`VerificationReport`].

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::VerifyConfig;
use crate::ident::IdCodecs;
use crate::scale::ScaleModel;
use crate::schema::{field, index, table};
use crate::storage::Store;
use crate::types::{IndexKey, RowPredicate, Value};
use crate::{Error, Result};

const APPROVED: &str = "approved";

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub table: String,
    pub name: String,

    /// Human readable statement of what must hold
    pub expectation: String,
    pub expected: String,
    pub observed: String,
    pub passed: bool,

    /// Store error that prevented the check from observing a value
    pub error: Option<String>,
}

/// All outcomes of a verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub database: String,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    pub success_rate: f64,
    pub execution_time_ms: u64,
    pub outcomes: Vec<CheckOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl VerificationReport {
    fn new(database: &str, outcomes: Vec<CheckOutcome>, execution_time_ms: u64) -> Self {
        let total_checks = outcomes.len();
        let passed_checks = outcomes.iter().filter(|o| o.passed).count();
        let success_rate = if total_checks == 0 {
            1.0
        } else {
            passed_checks as f64 / total_checks as f64
        };
        Self {
            database: database.to_string(),
            total_checks,
            passed_checks,
            failed_checks: total_checks - passed_checks,
            success_rate,
            execution_time_ms,
            outcomes,
            timestamp: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failed_checks == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// Outcomes grouped by table, in table order
    pub fn by_table(&self) -> BTreeMap<&str, Vec<&CheckOutcome>> {
        let mut tables: BTreeMap<&str, Vec<&CheckOutcome>> = BTreeMap::new();
        for outcome in &self.outcomes {
            tables.entry(outcome.table.as_str()).or_default().push(outcome);
        }
        tables
    }

    /// `Err(Error::Verification)` when any check failed
    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(Error::Verification {
                failed: self.failed_checks,
                total: self.total_checks,
            })
        }
    }
}

/// Outcomes of one table's battery
struct Battery {
    table: &'static str,
    outcomes: Vec<CheckOutcome>,
}

impl Battery {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            outcomes: Vec::new(),
        }
    }

    fn check<T: PartialEq + Display>(
        &mut self,
        name: &str,
        expectation: impl Into<String>,
        expected: T,
        observed: Result<T>,
    ) {
        let (observed, passed, error) = match observed {
            Ok(value) => (value.to_string(), value == expected, None),
            Err(e) => ("<error>".to_string(), false, Some(e.to_string())),
        };
        if !passed {
            warn!(table = self.table, check = name, expected = %expected, observed = %observed, "check failed");
        }
        self.outcomes.push(CheckOutcome {
            table: self.table.to_string(),
            name: name.to_string(),
            expectation: expectation.into(),
            expected: expected.to_string(),
            observed,
            passed,
            error,
        });
    }

    /// Two checks from one min/max query
    fn check_bounds(
        &mut self,
        index: &str,
        expected: Option<(String, String)>,
        observed: Result<Option<(IndexKey, IndexKey)>>,
    ) {
        let (expected_min, expected_max) = bounds_text(expected);
        match observed {
            Ok(bounds) => {
                let (min, max) = bounds_text(
                    bounds.map(|(min, max)| (min.to_string(), max.to_string())),
                );
                self.check(
                    &format!("min {index}"),
                    format!("smallest `{index}` is {expected_min}"),
                    expected_min,
                    Ok(min),
                );
                self.check(
                    &format!("max {index}"),
                    format!("largest `{index}` is {expected_max}"),
                    expected_max,
                    Ok(max),
                );
            }
            Err(e) => {
                let message = e.to_string();
                self.check(
                    &format!("min {index}"),
                    format!("smallest `{index}` is {expected_min}"),
                    expected_min,
                    Err(Error::storage(message.clone())),
                );
                self.check(
                    &format!("max {index}"),
                    format!("largest `{index}` is {expected_max}"),
                    expected_max,
                    Err(Error::storage(message)),
                );
            }
        }
    }

    fn finish(self) -> Vec<CheckOutcome> {
        let failed = self.outcomes.iter().filter(|o| !o.passed).count();
        info!(
            table = self.table,
            checks = self.outcomes.len(),
            failed,
            "verification battery done"
        );
        self.outcomes
    }
}

/// Formatted first and last identifier of `count` entities
fn id_bounds(format: impl Fn(u64) -> Result<String>, count: u64) -> Option<(String, String)> {
    if count == 0 {
        return None;
    }
    format(0).ok().zip(format(count - 1).ok())
}

fn bounds_text(bounds: Option<(String, String)>) -> (String, String) {
    bounds.unwrap_or_else(|| ("none".to_string(), "none".to_string()))
}

/// The instant written by the date index probe
pub fn probe_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1900, 12, 31, 23, 58, 59)
        .single()
        .map(|t| t + chrono::Duration::nanoseconds(123))
        .unwrap_or_default()
}

/// Checks a loaded dataset against its scale model
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    store: Arc<dyn Store>,
    scale: ScaleModel,
    codecs: IdCodecs,
    config: VerifyConfig,
    database: String,
}

impl IntegrityVerifier {
    pub fn new(store: Arc<dyn Store>, scale: ScaleModel, config: VerifyConfig) -> Self {
        Self {
            store,
            codecs: IdCodecs::new(&scale),
            scale,
            config,
            database: String::new(),
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn scale(&self) -> &ScaleModel {
        &self.scale
    }

    /// Run every battery and collect the outcomes
    pub async fn verify(&self) -> VerificationReport {
        let start = Instant::now();
        let mut outcomes = if self.config.concurrent {
            let (users, tours, bookings, reviews) = tokio::join!(
                self.check_users(),
                self.check_tours(),
                self.check_bookings(),
                self.check_reviews()
            );
            [users, tours, bookings, reviews].concat()
        } else {
            let mut outcomes = self.check_users().await;
            outcomes.extend(self.check_tours().await);
            outcomes.extend(self.check_bookings().await);
            outcomes.extend(self.check_reviews().await);
            outcomes
        };
        if self.config.probe_date_index {
            outcomes.extend(self.probe_created_at_index().await);
        }

        let report =
            VerificationReport::new(&self.database, outcomes, start.elapsed().as_millis() as u64);
        info!(
            total = report.total_checks,
            failed = report.failed_checks,
            "verification done"
        );
        report
    }

    fn user_id(&self, ordinal: u64) -> Result<String> {
        self.codecs.user.format(ordinal)
    }

    pub async fn check_users(&self) -> Vec<CheckOutcome> {
        let s = &self.scale;
        let mut battery = Battery::new(table::USERS);

        battery.check(
            "row count",
            "one row per user",
            s.user_count,
            self.store.count_rows(table::USERS).await,
        );

        let ids = id_bounds(|i| self.user_id(i), s.user_count);
        battery.check_bounds(
            field::USER_ID,
            ids.clone(),
            self.store.min_max_by_index(table::USERS, field::USER_ID).await,
        );

        let internal = ids.map(|(min, max)| {
            (
                format!("{min}{}", field::INTERNAL_ID),
                format!("{max}{}", field::INTERNAL_ID),
            )
        });
        battery.check_bounds(
            field::INTERNAL_ID,
            internal,
            self.store
                .min_max_by_index(table::USERS, field::INTERNAL_ID)
                .await,
        );

        battery.finish()
    }

    pub async fn check_tours(&self) -> Vec<CheckOutcome> {
        let s = &self.scale;
        let mut battery = Battery::new(table::TOURS);

        battery.check(
            "row count",
            "one row per tour",
            s.tour_count,
            self.store.count_rows(table::TOURS).await,
        );
        battery.check_bounds(
            field::TOUR_ID,
            id_bounds(|i| self.codecs.tour.format(i), s.tour_count),
            self.store.min_max_by_index(table::TOURS, field::TOUR_ID).await,
        );

        let conductors = s.active_conducteur_count();
        battery.check(
            "distinct conductors",
            "tours are owned by the leading conducteur slice of users",
            conductors,
            self.store.distinct_count(table::TOURS, field::USER_ID).await,
        );
        battery.check_bounds(
            field::USER_ID,
            id_bounds(|i| self.user_id(i), conductors),
            self.store.min_max_by_index(table::TOURS, field::USER_ID).await,
        );

        battery.check(
            "conductors exist",
            "no `userId` which does not exist in `users`",
            0,
            self.missing_primary_keys(table::TOURS, field::USER_ID, table::USERS)
                .await,
        );

        battery.finish()
    }

    pub async fn check_bookings(&self) -> Vec<CheckOutcome> {
        let s = &self.scale;
        let mut battery = Battery::new(table::BOOKINGS);

        battery.check(
            "row count",
            "one row per booking",
            s.booking_count,
            self.store.count_rows(table::BOOKINGS).await,
        );
        battery.check_bounds(
            field::BOOKING_ID,
            id_bounds(|i| self.codecs.booking.format(i), s.booking_count),
            self.store
                .min_max_by_index(table::BOOKINGS, field::BOOKING_ID)
                .await,
        );

        let passengers = s.active_passenger_count();
        battery.check(
            "distinct passengers",
            "bookings are requested by the trailing passenger slice of users",
            passengers,
            self.store
                .distinct_count(table::BOOKINGS, field::USER_ID)
                .await,
        );
        let passenger_bounds = self
            .user_id(s.user_count - passengers)
            .ok()
            .zip(self.user_id(s.user_count - 1).ok());
        battery.check_bounds(
            field::USER_ID,
            passenger_bounds,
            self.store
                .min_max_by_index(table::BOOKINGS, field::USER_ID)
                .await,
        );

        battery.check(
            "booked tours",
            "bookings cover exactly the booked tours",
            s.booking_tour_count,
            self.store
                .distinct_count(table::BOOKINGS, field::TOUR_ID)
                .await,
        );

        let approved = RowPredicate::eq(field::STATUS, APPROVED);
        battery.check(
            "approved per tour",
            format!(
                "almost every tour has {} approved bookings",
                s.approved_bookings_per_tour
            ),
            s.approved_booking_tour_count,
            self.groups_equal_to(Some(&approved), s.approved_bookings_per_tour)
                .await,
        );

        let not_approved = RowPredicate::ne(field::STATUS, APPROVED);
        battery.check(
            "non-approved per tour",
            format!(
                "almost every tour has {} non-approved bookings",
                s.canceled_bookings_per_tour()
            ),
            s.full_cohort_tour_count(),
            self.groups_equal_to(Some(&not_approved), s.canceled_bookings_per_tour())
                .await,
        );

        battery.check(
            "unique passengers per tour",
            format!(
                "almost every tour has {} unique passengers",
                s.bookings_per_tour
            ),
            s.full_cohort_tour_count(),
            self.store
                .group_distinct_count(table::BOOKINGS, field::TOUR_ID, field::USER_ID)
                .await
                .map(|groups| count_equal_to(&groups, s.bookings_per_tour)),
        );

        battery.check(
            "passengers exist",
            "no `userId` which does not exist in `users`",
            0,
            self.missing_primary_keys(table::BOOKINGS, field::USER_ID, table::USERS)
                .await,
        );
        battery.check(
            "tours exist",
            "no `tourId` which does not exist in `tours`",
            0,
            self.missing_primary_keys(table::BOOKINGS, field::TOUR_ID, table::TOURS)
                .await,
        );

        battery.finish()
    }

    pub async fn check_reviews(&self) -> Vec<CheckOutcome> {
        let s = &self.scale;
        let mut battery = Battery::new(table::REVIEWS);

        battery.check(
            "row count",
            "two reviews per approved booking",
            s.review_count,
            self.store.count_rows(table::REVIEWS).await,
        );
        battery.check_bounds(
            field::REVIEW_ID,
            id_bounds(|i| self.codecs.review.format(i), s.review_count),
            self.store
                .min_max_by_index(table::REVIEWS, field::REVIEW_ID)
                .await,
        );

        battery.check(
            "reviewed tours",
            "reviews cover exactly the tours with a full set of approved bookings",
            s.approved_booking_tour_count,
            self.store
                .distinct_count(table::REVIEWS, field::TOUR_ID)
                .await,
        );
        battery.check_bounds(
            field::TOUR_ID,
            id_bounds(|i| self.codecs.tour.format(i), s.approved_booking_tour_count),
            self.store
                .min_max_by_index(table::REVIEWS, field::TOUR_ID)
                .await,
        );

        for user_field in [field::OF_USER_ID, field::BY_USER_ID] {
            battery.check(
                &format!("{user_field} exists"),
                format!("no `{user_field}` which does not exist in `users`"),
                0,
                self.missing_primary_keys(table::REVIEWS, user_field, table::USERS)
                    .await,
            );
        }
        battery.check(
            "tours exist",
            "no `tourId` which does not exist in `tours`",
            0,
            self.missing_primary_keys(table::REVIEWS, field::TOUR_ID, table::TOURS)
                .await,
        );
        battery.check(
            "tours booked",
            "no `tourId` which does not exist in `bookings`",
            0,
            self.missing_index_keys(
                table::REVIEWS,
                field::TOUR_ID,
                &[(table::BOOKINGS, field::TOUR_ID)],
            )
            .await,
        );
        battery.check(
            "tours approved",
            "no `tourId` whose bookings are not approved",
            0,
            self.tours_without_approved_booking().await,
        );
        for user_field in [field::OF_USER_ID, field::BY_USER_ID] {
            battery.check(
                &format!("{user_field} participates"),
                format!("no `{user_field}` which does not exist in `bookings` or `tours`"),
                0,
                self.missing_index_keys(
                    table::REVIEWS,
                    user_field,
                    &[
                        (table::BOOKINGS, field::USER_ID),
                        (table::TOURS, field::USER_ID),
                    ],
                )
                .await,
            );
        }

        battery.check(
            "unique review triples",
            "every review has a unique [`tourId`, `byUserId`, `ofUserId`]",
            s.review_count,
            self.unique_triples_with_self_reviews().await,
        );

        battery.finish()
    }

    /// Overwrite `createdAt` of one tour with [`probe_instant`] and look it
    /// up again through the `createdAt` index
    pub async fn probe_created_at_index(&self) -> Vec<CheckOutcome> {
        let mut battery = Battery::new(table::TOURS);
        let at = probe_instant();

        let replaced = match self.codecs.tour.format(self.scale.tour_count / 2) {
            Ok(tour_id) => {
                self.store
                    .update_field(
                        table::TOURS,
                        &Value::from(tour_id),
                        field::CREATED_AT,
                        Value::from(at),
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        battery.check(
            "probe update",
            "the probed tour is replaced exactly once",
            1,
            replaced,
        );
        battery.check(
            "probe lookup",
            "exactly one tour is found by the probed `createdAt`",
            1,
            self.store
                .count_by_index(table::TOURS, field::CREATED_AT, &IndexKey::single(at))
                .await,
        );

        battery.finish()
    }

    /// Booking groups per tour whose matching row count equals `target`
    async fn groups_equal_to(&self, predicate: Option<&RowPredicate>, target: u64) -> Result<u64> {
        let groups = self
            .store
            .group_count_by_index(table::BOOKINGS, field::TOUR_ID, predicate)
            .await?;
        Ok(count_equal_to(&groups, target))
    }

    /// Distinct keys of `table.index` that are not a primary key of `target`
    async fn missing_primary_keys(&self, table: &str, index: &str, target: &str) -> Result<u64> {
        let mut missing = 0;
        for key in self.store.distinct_keys(table, index).await? {
            let found = match key.first() {
                Some(value) => self.store.contains_key(target, value).await?,
                None => false,
            };
            if !found {
                missing += 1;
            }
        }
        Ok(missing)
    }

    /// Distinct keys of `table.index` found under none of the target indexes
    async fn missing_index_keys(
        &self,
        table: &str,
        index: &str,
        targets: &[(&str, &str)],
    ) -> Result<u64> {
        let mut missing = 0;
        for key in self.store.distinct_keys(table, index).await? {
            let mut found = false;
            for (target, target_index) in targets {
                if self.store.count_by_index(target, target_index, &key).await? > 0 {
                    found = true;
                    break;
                }
            }
            if !found {
                missing += 1;
            }
        }
        Ok(missing)
    }

    async fn tours_without_approved_booking(&self) -> Result<u64> {
        let mut missing = 0;
        for key in self
            .store
            .distinct_keys(table::REVIEWS, field::TOUR_ID)
            .await?
        {
            let mut values = key.0;
            values.push(Value::from(APPROVED));
            let approved = self
                .store
                .count_by_index(table::BOOKINGS, index::TOUR_ID_AND_STATUS, &IndexKey(values))
                .await?;
            if approved == 0 {
                missing += 1;
            }
        }
        Ok(missing)
    }

    /// A self review pair collapses onto one triple, so every two rows of
    /// `_selfReviews` make up for one missing distinct triple
    async fn unique_triples_with_self_reviews(&self) -> Result<u64> {
        let triples = self
            .store
            .distinct_count(table::REVIEWS, index::TOUR_ID_AND_BY_USER_ID_AND_OF_USER_ID)
            .await?;
        let self_reviews = self.store.count_rows(table::SELF_REVIEWS).await?;
        Ok(triples + self_reviews / 2)
    }
}

fn count_equal_to(groups: &BTreeMap<IndexKey, u64>, target: u64) -> u64 {
    groups.values().filter(|&&count| count == target).count() as u64
}
