//! End-to-end tests: seed a dataset into a `MemoryStore`, then verify it

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use tourload_core::config::ScaleConfig;
use tourload_core::schema::{field, table};
use tourload_core::{Config, MemoryStore, Row, Store, Value, Workload};

fn config(scale: ScaleConfig) -> Config {
    Config {
        scale,
        ..Config::small()
    }
}

fn scenario(booking_count: u64) -> Config {
    let mut config = Config::small();
    config.scale.booking_count = booking_count;
    config
}

fn self_dealing() -> Config {
    config(ScaleConfig {
        user_count: 10,
        conducteur_ratio: 0.5,
        passenger_ratio: 1.0,
        tour_count: 10,
        booking_count: 20,
        approved_bookings_per_tour: 1,
    })
}

fn failed_names(report: &tourload_core::VerificationReport) -> Vec<String> {
    report
        .failures()
        .map(|o| format!("{}: {}", o.table, o.name))
        .collect()
}

#[tokio::test]
async fn test_scenario_a_has_no_failures() -> Result<()> {
    let workload = Workload::new(Arc::new(MemoryStore::new()), Config::small())?;
    let summary = workload.seed().await?;

    assert_eq!(summary.users, 100);
    assert_eq!(summary.tours, 100);
    assert_eq!(summary.bookings, 200);
    assert_eq!(summary.reviews, 300);

    let report = workload.verify().await;
    assert!(report.passed(), "{:?}", failed_names(&report));
    Ok(())
}

#[tokio::test]
async fn test_scenario_b_partial_cohort_adds_no_reviews() -> Result<()> {
    let workload = Workload::new(Arc::new(MemoryStore::new()), scenario(201))?;
    assert_eq!(workload.scale().booking_tour_count, 51);
    assert_eq!(workload.scale().approved_booking_tour_count, 50);

    let summary = workload.seed().await?;
    assert_eq!(summary.bookings, 201);
    assert_eq!(summary.reviews, 300);

    let report = workload.verify().await;
    assert!(report.passed(), "{:?}", failed_names(&report));
    Ok(())
}

#[tokio::test]
async fn test_partial_cohort_with_enough_approved_bookings() -> Result<()> {
    let workload = Workload::new(Arc::new(MemoryStore::new()), scenario(203))?;
    let summary = workload.seed().await?;
    assert_eq!(summary.reviews, 306);

    let report = workload.verify().await;
    assert!(report.passed(), "{:?}", failed_names(&report));
    Ok(())
}

#[tokio::test]
async fn test_self_dealing_pairs_are_compensated() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let workload = Workload::new(store.clone(), self_dealing())?;
    let summary = workload.seed().await?;

    assert_eq!(summary.self_bookings, 2);
    assert_eq!(summary.self_reviews, 4);
    assert_eq!(
        store
            .distinct_count(
                table::REVIEWS,
                tourload_core::schema::index::TOUR_ID_AND_BY_USER_ID_AND_OF_USER_ID
            )
            .await?,
        18
    );

    let report = workload.verify().await;
    assert!(report.passed(), "{:?}", failed_names(&report));
    Ok(())
}

#[tokio::test]
async fn test_snapshot_can_be_verified_by_another_store() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tourload.snapshot");

    let store = Arc::new(MemoryStore::new());
    Workload::new(store.clone(), Config::small())?.seed().await?;
    store.save_snapshot(&path).await?;

    let reopened = Arc::new(MemoryStore::open_snapshot(&path).await?);
    let mut config = Config::small();
    config.verify.probe_date_index = true;
    let report = Workload::new(reopened, config)?.verify().await;

    assert!(report.passed(), "{:?}", failed_names(&report));
    assert!(report.outcomes.iter().any(|o| o.name == "probe lookup"));
    Ok(())
}

#[tokio::test]
async fn test_corrupted_dataset_reports_every_failure() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let workload = Workload::new(store.clone(), Config::small())?;
    workload.seed().await?;

    store
        .update_field(
            table::BOOKINGS,
            &Value::from("booking001"),
            field::STATUS,
            Value::from("canceled"),
        )
        .await?;
    store
        .insert_batch(
            table::REVIEWS,
            vec![Row::new()
                .with(field::REVIEW_ID, "review999")
                .with(field::TOUR_ID, "tour001")
                .with(field::BY_USER_ID, "user999")
                .with(field::OF_USER_ID, "user001")],
        )
        .await?;

    let report = workload.verify().await;
    let failed = failed_names(&report);

    assert!(!report.passed());
    for expected in [
        "bookings: approved per tour",
        "bookings: non-approved per tour",
        "reviews: row count",
        "reviews: max reviewId",
        "reviews: byUserId exists",
        "reviews: byUserId participates",
        "reviews: unique review triples",
    ] {
        assert!(failed.iter().any(|f| f == expected), "missing {expected} in {failed:?}");
    }
    assert!(report.by_table()[table::USERS].iter().all(|o| o.passed));
    assert!(report.into_result().is_err());
    Ok(())
}

#[tokio::test]
async fn test_reloading_into_loaded_table_is_rejected() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let workload = Workload::new(store.clone(), Config::small())?;
    workload.seed().await?;

    let mut loader = tourload_core::BulkLoader::new(store.clone(), workload.config().load.clone());
    let row = Row::new().with(field::USER_ID, "user001");
    let err = loader
        .insert_rows(table::USERS, vec![row])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Duplicate primary key `userId`: user001"));
    assert_eq!(store.count_rows(table::USERS).await?, 100);
    Ok(())
}
