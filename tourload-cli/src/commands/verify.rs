use crate::cli::OutputFormat;
use crate::commands::load::{print_load_report, seed};
use crate::commands::{open_snapshot, save_snapshot};
use anyhow::{Context, Result};
use colored::*;
use prettytable::{Cell, Row, Table};
use std::path::Path;
use std::sync::Arc;
use tourload_core::{Config, MemoryStore, VerificationReport, Workload};

pub async fn handle_verify_command(
    config: &Config,
    snapshot: &Path,
    format: OutputFormat,
) -> Result<()> {
    let store = open_snapshot(snapshot).await?;
    let report = Workload::new(store, config.clone())?.verify().await;

    print_report(&report, format)?;
    report.into_result()?;
    Ok(())
}

/// Load into a fresh store, then verify it in the same process
pub async fn handle_run_command(
    config: &Config,
    snapshot: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let load = seed(store.clone(), config, None, quiet).await?;
    if format == OutputFormat::Table {
        print_load_report(&load, format)?;
    }
    if let Some(path) = snapshot {
        save_snapshot(&store, path).await?;
    }

    let report = Workload::new(store, config.clone())?.verify().await;
    match format {
        OutputFormat::Table => print_report(&report, format)?,
        OutputFormat::Json => {
            let json = serde_json::json!({ "load": load, "verification": report });
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .with_context(|| "Failed to serialize run report")?
            );
        }
    }
    report.into_result()?;
    Ok(())
}

pub fn print_report(report: &VerificationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .with_context(|| "Failed to serialize verification report")?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.add_row(Row::new(vec![
                Cell::new("Table"),
                Cell::new("Check"),
                Cell::new("Expected"),
                Cell::new("Observed"),
                Cell::new("Result"),
            ]));
            for outcome in &report.outcomes {
                let result = if outcome.passed {
                    Cell::new("PASS").style_spec("Fg")
                } else {
                    Cell::new("FAIL").style_spec("Fr")
                };
                table.add_row(Row::new(vec![
                    Cell::new(&outcome.table),
                    Cell::new(&outcome.name),
                    Cell::new(&outcome.expected),
                    Cell::new(&outcome.observed),
                    result,
                ]));
            }
            table.printstd();

            for failure in report.failures() {
                eprintln!(
                    "{} {}.{}: {}{}",
                    "FAIL".red().bold(),
                    failure.table,
                    failure.name,
                    failure.expectation,
                    failure
                        .error
                        .as_ref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                );
            }

            let summary = format!(
                "{}/{} checks passed in {} ms",
                report.passed_checks, report.total_checks, report.execution_time_ms
            );
            if report.passed() {
                println!("{} {}", "Verification passed:".green().bold(), summary);
            } else {
                println!("{} {}", "Verification failed:".red().bold(), summary);
            }
        }
    }
    Ok(())
}
