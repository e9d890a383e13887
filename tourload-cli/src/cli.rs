use clap::{Args, ValueEnum};
use tourload_core::Config;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Single table selectable by `load --only`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableSelection {
    Users,
    Tours,
    Bookings,
    Reviews,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::fmt::Display for TableSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSelection::Users => write!(f, "users"),
            TableSelection::Tours => write!(f, "tours"),
            TableSelection::Bookings => write!(f, "bookings"),
            TableSelection::Reviews => write!(f, "reviews"),
        }
    }
}

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Database name
    #[arg(long, global = true, env = "TOURLOAD_DATABASE")]
    pub database: Option<String>,

    /// Number of users
    #[arg(long, global = true, env = "TOURLOAD_USER_COUNT")]
    pub user_count: Option<u64>,

    /// Leading share of users that own tours
    #[arg(long, global = true, env = "TOURLOAD_CONDUCTEUR_RATIO")]
    pub conducteur_ratio: Option<f64>,

    /// Trailing share of users that book tours
    #[arg(long, global = true, env = "TOURLOAD_PASSENGER_RATIO")]
    pub passenger_ratio: Option<f64>,

    /// Number of tours
    #[arg(long, global = true, env = "TOURLOAD_TOUR_COUNT")]
    pub tour_count: Option<u64>,

    /// Number of bookings
    #[arg(long, global = true, env = "TOURLOAD_BOOKING_COUNT")]
    pub booking_count: Option<u64>,

    /// Approved bookings per tour
    #[arg(long, global = true, env = "TOURLOAD_APPROVED_BOOKINGS_PER_TOUR")]
    pub approved_bookings_per_tour: Option<u64>,

    /// Maximum rows per flushed batch
    #[arg(long, global = true, env = "TOURLOAD_BATCH_ROWS")]
    pub batch_rows: Option<usize>,

    /// Keep loading when a batch is rejected for duplicate primary keys
    #[arg(long, global = true)]
    pub tolerate_duplicates: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(database) = &self.database {
            config.database = database.clone();
        }

        let scale = &mut config.scale;
        if let Some(count) = self.user_count {
            scale.user_count = count;
        }
        if let Some(ratio) = self.conducteur_ratio {
            scale.conducteur_ratio = ratio;
        }
        if let Some(ratio) = self.passenger_ratio {
            scale.passenger_ratio = ratio;
        }
        if let Some(count) = self.tour_count {
            scale.tour_count = count;
        }
        if let Some(count) = self.booking_count {
            scale.booking_count = count;
        }
        if let Some(count) = self.approved_bookings_per_tour {
            scale.approved_bookings_per_tour = count;
        }

        if let Some(rows) = self.batch_rows {
            config.load.batch_rows = rows;
        }
        if self.tolerate_duplicates {
            config.load.fail_on_duplicate_key = false;
        }
    }
}
