//! Configuration management for tourload

use serde::{Deserialize, Serialize};

use crate::scale::ScaleModel;

/// Main configuration structure for a tourload run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the database the dataset is loaded into
    pub database: String,

    /// Scale parameters that determine every derived count
    pub scale: ScaleConfig,

    /// Bulk load settings
    pub load: LoadConfig,

    /// Integrity verification settings
    pub verify: VerifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "test".to_string(),
            scale: ScaleConfig::default(),
            load: LoadConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

/// Scale parameters, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Number of users (default: 1M)
    pub user_count: u64,

    /// Leading share of users that own tours
    pub conducteur_ratio: f64,

    /// Trailing share of users that book tours
    pub passenger_ratio: f64,

    /// Number of tours (default: 1M)
    pub tour_count: u64,

    /// Number of bookings (default: 2M)
    pub booking_count: u64,

    /// Approved bookings at the head of every cohort
    pub approved_bookings_per_tour: u64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            user_count: 1_000_000,
            conducteur_ratio: 0.3,
            passenger_ratio: 0.8,
            tour_count: 1_000_000,
            booking_count: 2_000_000,
            approved_bookings_per_tour: 3,
        }
    }
}

/// Bulk load configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Maximum rows per flushed batch
    pub batch_rows: usize,

    /// Abort the load when a flush inserts fewer rows than submitted
    pub fail_on_duplicate_key: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_rows: 1000,
            fail_on_duplicate_key: true,
        }
    }
}

/// Integrity verification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Run the per-table batteries concurrently
    pub concurrent: bool,

    /// Run the `createdAt` index probe, which overwrites one tour
    pub probe_date_index: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            concurrent: true,
            probe_date_index: false,
        }
    }
}

impl Config {
    /// Create a small configuration (100 users, 100 tours, 200 bookings)
    pub fn small() -> Self {
        let mut config = Self::default();
        config.scale = ScaleConfig {
            user_count: 100,
            conducteur_ratio: 0.3,
            passenger_ratio: 0.8,
            tour_count: 100,
            booking_count: 200,
            approved_bookings_per_tour: 3,
        };
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.database.is_empty() {
            return Err(crate::Error::configuration("database must not be empty"));
        }

        if self.load.batch_rows == 0 {
            return Err(crate::Error::configuration(
                "batch_rows must be greater than 0",
            ));
        }

        ScaleModel::derive(&self.scale)?;

        Ok(())
    }
}
