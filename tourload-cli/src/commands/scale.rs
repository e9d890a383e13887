use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use prettytable::{Cell, Row, Table};
use tourload_core::{Config, ScaleModel};

pub fn handle_scale_command(config: &Config, format: OutputFormat) -> Result<()> {
    let scale = ScaleModel::derive(&config.scale)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&scale)
                .with_context(|| "Failed to serialize scale model")?;
            println!("{}", json);
        }
        OutputFormat::Table => scale_table(&scale).printstd(),
    }

    Ok(())
}

pub fn scale_table(scale: &ScaleModel) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Count"), Cell::new("Value")]));

    let counts = [
        ("users", scale.user_count),
        ("conducteurs", scale.conducteur_count),
        ("passengers", scale.passenger_count),
        ("tours", scale.tour_count),
        ("bookings", scale.booking_count),
        ("approved bookings per tour", scale.approved_bookings_per_tour),
        ("bookings per tour", scale.bookings_per_tour),
        ("booked tours", scale.booking_tour_count),
        ("tours with approved bookings", scale.approved_booking_tour_count),
        ("approved bookings", scale.approved_booking_count),
        ("reviews", scale.review_count),
    ];
    for (name, value) in counts {
        table.add_row(Row::new(vec![
            Cell::new(name),
            Cell::new(&value.to_string()).style_spec("r"),
        ]));
    }
    table
}
