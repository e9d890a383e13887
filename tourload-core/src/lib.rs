//! Tourload Core
//!
//! Generates a synthetic, internally consistent dataset of users, tours,
//! bookings and reviews from a handful of scale parameters, bulk loads it into
//! a store in bounded batches and verifies the loaded data against the same
//! closed-form model.

#![allow(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assign;
pub mod config;
pub mod error;
pub mod ident;
pub mod load;
pub mod rows;
pub mod scale;
pub mod schema;
pub mod seed;
pub mod storage;
pub mod types;
pub mod verify;

// Re-export main types for convenience
pub use crate::{
    assign::EntityAssigner,
    config::Config,
    error::{Error, ErrorCategory, Result},
    ident::{EntityKind, IdCodec},
    load::{BulkLoader, LoadObserver, LoadStats, RowYield},
    scale::ScaleModel,
    seed::{SeedSummary, Seeder},
    storage::{MemoryStore, Store},
    types::{IndexKey, IndexSpec, Row, Value},
    verify::{CheckOutcome, IntegrityVerifier, VerificationReport},
};

use std::sync::Arc;

use crate::load::BulkLoaderBuilder;
use crate::rows::RowFactory;

/// A configured dataset bound to a store
///
/// Ties the seeder and the verifier to one store handle and one validated
/// configuration.
#[derive(Debug, Clone)]
pub struct Workload {
    store: Arc<dyn Store>,
    config: Config,
    scale: ScaleModel,
}

impl Workload {
    /// Validate `config` and derive its scale model
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the configuration is invalid.
    pub fn new(store: Arc<dyn Store>, config: Config) -> Result<Self> {
        config.validate()?;
        let scale = ScaleModel::derive(&config.scale)?;
        Ok(Self {
            store,
            config,
            scale,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scale(&self) -> &ScaleModel {
        &self.scale
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Seeder whose loader reports progress to `observer`
    pub fn seeder(&self, observer: Option<Arc<dyn LoadObserver>>) -> Seeder {
        let mut builder = BulkLoaderBuilder::new(self.config.load.clone());
        if let Some(observer) = observer {
            builder = builder.with_observer(observer);
        }
        Seeder::with_parts(
            builder.build(Arc::clone(&self.store)),
            RowFactory::new(EntityAssigner::new(self.scale)),
            &self.config.database,
        )
    }

    pub fn verifier(&self) -> IntegrityVerifier {
        IntegrityVerifier::new(
            Arc::clone(&self.store),
            self.scale,
            self.config.verify.clone(),
        )
        .with_database(&self.config.database)
    }

    /// Seed every table
    ///
    /// # Errors
    ///
    /// Fails on the first store error or rejected flush.
    pub async fn seed(&self) -> Result<SeedSummary> {
        self.seeder(None).seed_all().await
    }

    /// Run the verification batteries
    pub async fn verify(&self) -> VerificationReport {
        self.verifier().verify().await
    }
}
