use crate::cli::{OutputFormat, TableSelection};
use crate::commands::{open_snapshot, save_snapshot, ProgressObserver};
use anyhow::{Context, Result};
use colored::*;
use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tourload_core::{Config, LoadStats, MemoryStore, Seeder, Store, Workload};
use tracing::info;

/// Load output, also used by `run`
#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub database: String,
    pub elapsed_ms: u64,
    pub loads: Vec<LoadStats>,
}

pub async fn handle_load_command(
    config: &Config,
    only: Option<TableSelection>,
    snapshot: &Path,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    // A single-table load replaces that table inside an existing snapshot
    let store = match only {
        Some(_) if snapshot.exists() => open_snapshot(snapshot).await?,
        _ => Arc::new(MemoryStore::new()),
    };

    let report = seed(store.clone(), config, only, quiet).await?;
    save_snapshot(&store, snapshot).await?;
    info!(path = %snapshot.display(), "snapshot saved");

    print_load_report(&report, format)?;
    if format == OutputFormat::Table && !quiet {
        println!(
            "{} {}",
            "Snapshot written to".green(),
            snapshot.display()
        );
    }
    Ok(())
}

/// Seed `store` with every table, or only the selected one
pub async fn seed(
    store: Arc<MemoryStore>,
    config: &Config,
    only: Option<TableSelection>,
    quiet: bool,
) -> Result<LoadReport> {
    let workload = Workload::new(store, config.clone())?;
    let observer = Arc::new(ProgressObserver::new(quiet));
    let mut seeder = workload.seeder(Some(observer.clone()));

    let start = std::time::Instant::now();
    let loads = match only {
        None => seeder.seed_all().await.map(|summary| summary.loads),
        Some(table) => seed_one(&workload, &mut seeder, table).await,
    };
    observer.finish();
    let loads = loads.with_context(|| "Bulk load failed")?;

    Ok(LoadReport {
        database: config.database.clone(),
        elapsed_ms: start.elapsed().as_millis() as u64,
        loads,
    })
}

async fn seed_one(
    workload: &Workload,
    seeder: &mut Seeder,
    table: TableSelection,
) -> tourload_core::Result<Vec<LoadStats>> {
    workload
        .store()
        .ensure_database(&workload.config().database)
        .await?;
    match table {
        TableSelection::Users => {
            seeder.seed_users().await?;
        }
        TableSelection::Tours => {
            seeder.seed_tours().await?;
        }
        TableSelection::Bookings => {
            seeder.seed_bookings().await?;
        }
        TableSelection::Reviews => {
            seeder.seed_reviews().await?;
        }
    }
    Ok(seeder.loads().to_vec())
}

pub fn print_load_report(report: &LoadReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .with_context(|| "Failed to serialize load report")?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.add_row(Row::new(vec![
                Cell::new("Table"),
                Cell::new("Rows"),
                Cell::new("Batches"),
                Cell::new("Skipped calls"),
                Cell::new("Duplicates"),
                Cell::new("Rows/sec"),
            ]));
            for load in &report.loads {
                table.add_row(Row::new(vec![
                    Cell::new(&load.table),
                    Cell::new(&load.rows_inserted.to_string()).style_spec("r"),
                    Cell::new(&load.batches.to_string()).style_spec("r"),
                    Cell::new(&load.skipped_calls.to_string()).style_spec("r"),
                    Cell::new(&load.duplicates_tolerated.to_string()).style_spec("r"),
                    Cell::new(&format!("{:.0}", load.throughput)).style_spec("r"),
                ]));
            }
            table.printstd();

            let rows: u64 = report.loads.iter().map(|l| l.rows_inserted).sum();
            println!(
                "{} {} rows into `{}` in {} ms",
                "Loaded".green().bold(),
                rows,
                report.database,
                report.elapsed_ms
            );
        }
    }
    Ok(())
}
