//! Derived dataset counts
//!
//! Every count the generator and the verifier rely on is computed here from
//! the handful of [`ScaleConfig`] parameters. The derivation is pure integer
//! arithmetic, so the verifier can recompute the same expectations without
//! looking at the generator run.

use serde::{Deserialize, Serialize};

use crate::config::ScaleConfig;
use crate::{Error, Result};

/// Fractional digits of a ratio taken into account. Keeps
/// `user_count * numerator` within `u128`.
const RATIO_MAX_DIGITS: usize = 19;

/// Integer division rounding up. `b` must be non-zero.
pub fn ceil_div(a: u64, b: u64) -> u64 {
    a / b + u64::from(a % b != 0)
}

/// Counts derived from the scale parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleModel {
    pub user_count: u64,
    pub conducteur_count: u64,
    pub passenger_count: u64,
    pub tour_count: u64,
    pub booking_count: u64,
    pub approved_bookings_per_tour: u64,
    pub bookings_per_tour: u64,
    pub booking_tour_count: u64,
    pub approved_booking_tour_count: u64,
    pub approved_booking_count: u64,
    pub review_count: u64,
}

impl ScaleModel {
    /// Derive all counts, failing before any write when the parameters are
    /// inconsistent.
    pub fn derive(config: &ScaleConfig) -> Result<Self> {
        let ScaleConfig {
            user_count,
            conducteur_ratio,
            passenger_ratio,
            tour_count,
            booking_count,
            approved_bookings_per_tour,
        } = *config;

        for (name, value) in [
            ("user_count", user_count),
            ("tour_count", tour_count),
            ("booking_count", booking_count),
            ("approved_bookings_per_tour", approved_bookings_per_tour),
        ] {
            if value == 0 {
                return Err(Error::configuration(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        let conducteur_count = ratio_count(user_count, conducteur_ratio, "conducteur_ratio")?;
        let passenger_count = ratio_count(user_count, passenger_ratio, "passenger_ratio")?;

        if conducteur_count == 0 {
            return Err(Error::configuration(format!(
                "conducteur_count resolves to 0 ({user_count} users * {conducteur_ratio}) \
                 while {tour_count} tours are requested"
            )));
        }
        if passenger_count == 0 {
            return Err(Error::configuration(format!(
                "passenger_count resolves to 0 ({user_count} users * {passenger_ratio}) \
                 while {booking_count} bookings are requested"
            )));
        }

        let min_bookings_per_tour = approved_bookings_per_tour
            .checked_add(1)
            .ok_or_else(|| overflow("approved_bookings_per_tour + 1"))?;
        let bookings_per_tour = ceil_div(booking_count, tour_count).max(min_bookings_per_tour);

        // Cohort members walk the passenger pool round-robin; a pool smaller
        // than a cohort would repeat a passenger inside one tour.
        if passenger_count < bookings_per_tour {
            return Err(Error::configuration(format!(
                "passenger_count ({passenger_count}) must be at least bookings_per_tour \
                 ({bookings_per_tour}) so that every tour has unique passengers"
            )));
        }

        let booking_tour_count = ceil_div(booking_count, bookings_per_tour);
        let last_cohort = booking_count % bookings_per_tour;
        let approved_booking_tour_count =
            if last_cohort != 0 && last_cohort < approved_bookings_per_tour {
                booking_tour_count - 1
            } else {
                booking_tour_count
            };
        let approved_booking_count = approved_booking_tour_count
            .checked_mul(approved_bookings_per_tour)
            .ok_or_else(|| overflow("approved_booking_count"))?;
        let review_count = approved_booking_count
            .checked_mul(2)
            .ok_or_else(|| overflow("review_count"))?;

        Ok(Self {
            user_count,
            conducteur_count,
            passenger_count,
            tour_count,
            booking_count,
            approved_bookings_per_tour,
            bookings_per_tour,
            booking_tour_count,
            approved_booking_tour_count,
            approved_booking_count,
            review_count,
        })
    }

    /// Bookings in the final cohort, or 0 when every cohort is full
    pub fn last_cohort_size(&self) -> u64 {
        self.booking_count % self.bookings_per_tour
    }

    /// Whether the final cohort holds fewer than `bookings_per_tour` bookings
    pub fn has_partial_cohort(&self) -> bool {
        self.last_cohort_size() != 0
    }

    /// Tours whose cohort is complete
    pub fn full_cohort_tour_count(&self) -> u64 {
        self.booking_tour_count - u64::from(self.has_partial_cohort())
    }

    /// Non-approved bookings in a full cohort
    pub fn canceled_bookings_per_tour(&self) -> u64 {
        self.bookings_per_tour - self.approved_bookings_per_tour
    }

    /// Distinct conductors that own at least one tour
    pub fn active_conducteur_count(&self) -> u64 {
        self.conducteur_count.min(self.tour_count)
    }

    /// Distinct passengers that hold at least one booking
    pub fn active_passenger_count(&self) -> u64 {
        self.passenger_count.min(self.booking_count)
    }
}

fn overflow(what: &str) -> Error {
    Error::configuration(format!("{what} does not fit in 64 bits"))
}

/// `floor(user_count * ratio)`, with the ratio read as the shortest decimal
/// that round-trips to the same `f64`, so `0.29` is exactly 29 hundredths.
fn ratio_count(user_count: u64, ratio: f64, name: &str) -> Result<u64> {
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(Error::configuration(format!(
            "{name} must be within [0, 1], got {ratio}"
        )));
    }
    let (numerator, denominator) = decimal_fraction(ratio.abs(), name)?;
    let count = u128::from(user_count) * numerator / denominator;
    u64::try_from(count).map_err(|_| overflow(name))
}

/// Split a ratio in `[0, 1]` into `numerator / 10^digits`
fn decimal_fraction(ratio: f64, name: &str) -> Result<(u128, u128)> {
    let text = ratio.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = &fraction[..fraction.len().min(RATIO_MAX_DIGITS)];
    let invalid = |_| Error::configuration(format!("{name} is not a decimal ratio: {text}"));

    let denominator = 10_u128.pow(fraction.len() as u32);
    let whole: u128 = whole.parse().map_err(invalid)?;
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        fraction.parse().map_err(invalid)?
    };
    Ok((whole * denominator + fraction, denominator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scenario(booking_count: u64) -> ScaleConfig {
        ScaleConfig {
            user_count: 100,
            conducteur_ratio: 0.3,
            passenger_ratio: 0.8,
            tour_count: 100,
            booking_count,
            approved_bookings_per_tour: 3,
        }
    }

    #[test]
    fn test_scenario_a() {
        let model = ScaleModel::derive(&scenario(200)).unwrap();
        assert_eq!(model.conducteur_count, 30);
        assert_eq!(model.passenger_count, 80);
        assert_eq!(model.bookings_per_tour, 4);
        assert_eq!(model.booking_tour_count, 50);
        assert_eq!(model.approved_booking_tour_count, 50);
        assert_eq!(model.approved_booking_count, 150);
        assert_eq!(model.review_count, 300);
        assert!(!model.has_partial_cohort());
    }

    #[test]
    fn test_scenario_b_partial_last_cohort() {
        let model = ScaleModel::derive(&scenario(201)).unwrap();
        assert_eq!(model.booking_tour_count, 51);
        assert_eq!(model.last_cohort_size(), 1);
        assert_eq!(model.approved_booking_tour_count, 50);
        assert_eq!(model.approved_booking_count, 150);
        assert_eq!(model.review_count, 300);
        assert_eq!(model.full_cohort_tour_count(), 50);
    }

    #[test]
    fn test_partial_cohort_with_enough_approved() {
        // 203 bookings leave 3 in the last cohort, enough to be approved.
        let model = ScaleModel::derive(&scenario(203)).unwrap();
        assert_eq!(model.booking_tour_count, 51);
        assert_eq!(model.approved_booking_tour_count, 51);
        assert_eq!(model.review_count, 306);
    }

    #[test]
    fn test_booking_ratio_wins_over_approved_floor() {
        let mut config = scenario(1000);
        config.passenger_ratio = 0.8;
        let model = ScaleModel::derive(&config).unwrap();
        assert_eq!(model.bookings_per_tour, 10);
        assert_eq!(model.booking_tour_count, 100);
        assert_eq!(model.canceled_bookings_per_tour(), 7);
    }

    #[test]
    fn test_zero_conducteurs_rejected() {
        let mut config = scenario(200);
        config.conducteur_ratio = 0.001;
        let err = ScaleModel::derive(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("conducteur_count resolves to 0"));
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        let mut config = scenario(200);
        config.passenger_ratio = 1.5;
        assert!(ScaleModel::derive(&config).is_err());
        config.passenger_ratio = f64::NAN;
        assert!(ScaleModel::derive(&config).is_err());
    }

    #[test]
    fn test_decimal_ratio_is_exact() {
        let mut config = scenario(200);
        config.conducteur_ratio = 0.29;
        let model = ScaleModel::derive(&config).unwrap();
        assert_eq!(model.conducteur_count, 29);
    }

    #[test]
    fn test_ratio_uses_full_decimal_precision() {
        let mut config = scenario(200);
        config.user_count = 10_000_000;
        config.conducteur_ratio = 0.1234567;
        config.passenger_ratio = 0.999_999_9;
        let model = ScaleModel::derive(&config).unwrap();
        assert_eq!(model.conducteur_count, 1_234_567);
        assert_eq!(model.passenger_count, 9_999_999);
    }

    #[test]
    fn test_ratio_bounds_resolve_exactly() {
        let mut config = scenario(200);
        config.passenger_ratio = 1.0;
        config.conducteur_ratio = 0.0;
        assert_eq!(ratio_count(100, 1.0, "r").unwrap(), 100);
        assert_eq!(ratio_count(100, 0.0, "r").unwrap(), 0);
        assert_eq!(ratio_count(100, -0.0, "r").unwrap(), 0);
        assert_eq!(ratio_count(u64::MAX, 1.0, "r").unwrap(), u64::MAX);
        assert!(ScaleModel::derive(&config).is_err());
    }

    #[test]
    fn test_passenger_pool_smaller_than_cohort_rejected() {
        let mut config = scenario(200);
        config.passenger_ratio = 0.03;
        let err = ScaleModel::derive(&config).unwrap_err();
        assert!(err.to_string().contains("unique passengers"));
    }

    #[test]
    fn test_huge_counts_are_configuration_errors() {
        let mut config = scenario(u64::MAX);
        let err = ScaleModel::derive(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        config = scenario(200);
        config.approved_bookings_per_tour = u64::MAX;
        let err = ScaleModel::derive(&config).unwrap_err();
        assert!(err.to_string().contains("approved_bookings_per_tour + 1"));

        // Every count at the maximum: the review count no longer fits.
        config = ScaleConfig {
            user_count: u64::MAX,
            conducteur_ratio: 1.0,
            passenger_ratio: 1.0,
            tour_count: u64::MAX,
            booking_count: u64::MAX,
            approved_bookings_per_tour: 1,
        };
        let err = ScaleModel::derive(&config).unwrap_err();
        assert!(err.to_string().contains("review_count"));
    }

    #[test]
    fn test_ceil_div_at_the_top_of_the_range() {
        assert_eq!(ceil_div(u64::MAX, 1), u64::MAX);
        assert_eq!(ceil_div(u64::MAX, 2), 1 << 63);
        assert_eq!(ceil_div(201, 4), 51);
        assert_eq!(ceil_div(200, 4), 50);
    }

    fn valid_config() -> impl Strategy<Value = ScaleConfig> {
        (
            50u64..5_000,
            1u64..2_000,
            1u64..20_000,
            1u64..6,
            1u32..=100,
        )
            .prop_map(|(user_count, tour_count, booking_count, approved, conducteur_pct)| {
                ScaleConfig {
                    user_count,
                    conducteur_ratio: f64::from(conducteur_pct) / 100.0,
                    passenger_ratio: 1.0,
                    tour_count,
                    booking_count,
                    approved_bookings_per_tour: approved,
                }
            })
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(config in valid_config()) {
            let first = ScaleModel::derive(&config);
            let second = ScaleModel::derive(&config);
            match (first, second) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
                _ => prop_assert!(false, "derivation disagreed with itself"),
            }
        }

        #[test]
        fn prop_review_counts_follow_approved_counts(config in valid_config()) {
            if let Ok(model) = ScaleModel::derive(&config) {
                prop_assert_eq!(
                    model.approved_booking_count,
                    model.approved_booking_tour_count * model.approved_bookings_per_tour
                );
                prop_assert_eq!(model.review_count, 2 * model.approved_booking_count);
                prop_assert!(model.bookings_per_tour > model.approved_bookings_per_tour);
                prop_assert!(model.booking_tour_count <= model.tour_count);
                if model.booking_count % model.bookings_per_tour == 0 {
                    prop_assert_eq!(model.approved_booking_tour_count, model.booking_tour_count);
                }
            }
        }
    }
}
