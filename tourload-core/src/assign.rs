//! Ordinal to relationship mapping
//!
//! Every foreign key of the dataset is a function of an entity ordinal and
//! the [`ScaleModel`]:
//!
//! - booking `i` belongs to tour `i / bookings_per_tour`;
//! - tour `t` is owned by conductor `t mod conducteur_count` (leading users);
//! - booking `i` is requested by passenger
//!   `user_count - (i mod passenger_count) - 1` (trailing users, walked
//!   downwards);
//! - the first `approved_bookings_per_tour` bookings of a cohort are approved.
//!
//! Reviews come in pairs, one per direction, for every approved booking of a
//! tour below `approved_booking_tour_count`. Review ordinals are dense: the
//! pair of booking `i` starts at twice the number of approved bookings before
//! `i`, a prefix sum that has a closed form because cohorts have a fixed size.
//! Nothing here carries state, so disjoint booking ranges can be generated in
//! any order or in parallel.

use serde::{Deserialize, Serialize};

use crate::ident::IdCodecs;
use crate::scale::ScaleModel;
use crate::Result;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Approved,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Approved => "approved",
            BookingStatus::Canceled => "canceled",
        }
    }

    pub fn is_approved(self) -> bool {
        self == BookingStatus::Approved
    }
}

/// Relationships of one tour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TourAssignment {
    pub ordinal: u64,
    pub tour_id: String,
    pub conductor_ordinal: u64,
    pub conductor_id: String,
}

/// Relationships of one booking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingAssignment {
    pub ordinal: u64,
    pub booking_id: String,
    pub tour_ordinal: u64,
    pub tour_id: String,
    pub conductor_ordinal: u64,
    pub conductor_id: String,
    pub passenger_ordinal: u64,
    pub passenger_id: String,
    pub status: BookingStatus,
}

impl BookingAssignment {
    /// The passenger books a tour they conduct themselves
    pub fn is_self(&self) -> bool {
        self.conductor_ordinal == self.passenger_ordinal
    }
}

/// Relationships of one review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewAssignment {
    pub ordinal: u64,
    pub review_id: String,
    pub tour_id: String,
    pub booking_id: String,
    pub by_user_id: String,
    pub of_user_id: String,
    pub star_rank: i64,
}

impl ReviewAssignment {
    pub fn is_self(&self) -> bool {
        self.by_user_id == self.of_user_id
    }
}

/// Deterministic assigner over booking and tour ordinals
#[derive(Debug, Clone, Copy)]
pub struct EntityAssigner {
    scale: ScaleModel,
    codecs: IdCodecs,
}

impl EntityAssigner {
    pub fn new(scale: ScaleModel) -> Self {
        Self {
            codecs: IdCodecs::new(&scale),
            scale,
        }
    }

    pub fn scale(&self) -> &ScaleModel {
        &self.scale
    }

    pub fn tour_of_booking(&self, booking: u64) -> u64 {
        booking / self.scale.bookings_per_tour
    }

    pub fn conductor_of_tour(&self, tour: u64) -> u64 {
        tour % self.scale.conducteur_count
    }

    pub fn passenger_of_booking(&self, booking: u64) -> u64 {
        self.scale.user_count - (booking % self.scale.passenger_count) - 1
    }

    pub fn status_of_booking(&self, booking: u64) -> BookingStatus {
        if booking % self.scale.bookings_per_tour < self.scale.approved_bookings_per_tour {
            BookingStatus::Approved
        } else {
            BookingStatus::Canceled
        }
    }

    /// Approved bookings with an ordinal below `booking`
    pub fn approved_bookings_before(&self, booking: u64) -> u64 {
        let full_cohorts = booking / self.scale.bookings_per_tour;
        let in_cohort = booking % self.scale.bookings_per_tour;
        full_cohorts * self.scale.approved_bookings_per_tour
            + in_cohort.min(self.scale.approved_bookings_per_tour)
    }

    /// Whether tour `tour` receives reviews.
    ///
    /// A trailing cohort too small to hold `approved_bookings_per_tour`
    /// bookings contributes none.
    pub fn is_reviewed_tour(&self, tour: u64) -> bool {
        tour < self.scale.approved_booking_tour_count
    }

    /// First review ordinal of the pair generated for `booking`, if any
    pub fn review_ordinal_of_booking(&self, booking: u64) -> Option<u64> {
        let reviewed = booking < self.scale.booking_count
            && self.status_of_booking(booking).is_approved()
            && self.is_reviewed_tour(self.tour_of_booking(booking));
        reviewed.then(|| 2 * self.approved_bookings_before(booking))
    }

    pub fn user_id(&self, user: u64) -> Result<String> {
        self.codecs.user.format(user)
    }

    pub fn tour(&self, tour: u64) -> Result<TourAssignment> {
        let conductor_ordinal = self.conductor_of_tour(tour);
        Ok(TourAssignment {
            ordinal: tour,
            tour_id: self.codecs.tour.format(tour)?,
            conductor_ordinal,
            conductor_id: self.codecs.user.format(conductor_ordinal)?,
        })
    }

    pub fn booking(&self, booking: u64) -> Result<BookingAssignment> {
        let tour = self.tour(self.tour_of_booking(booking))?;
        let passenger_ordinal = self.passenger_of_booking(booking);
        Ok(BookingAssignment {
            ordinal: booking,
            booking_id: self.codecs.booking.format(booking)?,
            tour_ordinal: tour.ordinal,
            tour_id: tour.tour_id,
            conductor_ordinal: tour.conductor_ordinal,
            conductor_id: tour.conductor_id,
            passenger_ordinal,
            passenger_id: self.codecs.user.format(passenger_ordinal)?,
            status: self.status_of_booking(booking),
        })
    }

    /// The review pair of `booking`: conductor -> passenger first, then
    /// passenger -> conductor. `None` for bookings that produce no reviews.
    pub fn reviews_of_booking(&self, booking: u64) -> Result<Option<[ReviewAssignment; 2]>> {
        let Some(first) = self.review_ordinal_of_booking(booking) else {
            return Ok(None);
        };
        let assignment = self.booking(booking)?;
        let review = |ordinal: u64, by: &str, of: &str| -> Result<ReviewAssignment> {
            Ok(ReviewAssignment {
                ordinal,
                review_id: self.codecs.review.format(ordinal)?,
                tour_id: assignment.tour_id.clone(),
                booking_id: assignment.booking_id.clone(),
                by_user_id: by.to_string(),
                of_user_id: of.to_string(),
                star_rank: (ordinal % 4 + 1) as i64,
            })
        };
        Ok(Some([
            review(first, &assignment.conductor_id, &assignment.passenger_id)?,
            review(first + 1, &assignment.passenger_id, &assignment.conductor_id)?,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaleConfig;
    use proptest::prelude::*;

    fn assigner(booking_count: u64) -> EntityAssigner {
        let scale = ScaleModel::derive(&ScaleConfig {
            user_count: 100,
            conducteur_ratio: 0.3,
            passenger_ratio: 0.8,
            tour_count: 100,
            booking_count,
            approved_bookings_per_tour: 3,
        })
        .unwrap();
        EntityAssigner::new(scale)
    }

    #[test]
    fn test_first_cohort() {
        let assigner = assigner(200);
        let booking = assigner.booking(0).unwrap();
        assert_eq!(booking.booking_id, "booking001");
        assert_eq!(booking.tour_id, "tour001");
        assert_eq!(booking.conductor_id, "user001");
        assert_eq!(booking.passenger_id, "user100");
        assert_eq!(booking.status, BookingStatus::Approved);

        let fourth = assigner.booking(3).unwrap();
        assert_eq!(fourth.tour_id, "tour001");
        assert_eq!(fourth.passenger_id, "user097");
        assert_eq!(fourth.status, BookingStatus::Canceled);

        let next = assigner.booking(4).unwrap();
        assert_eq!(next.tour_id, "tour002");
        assert_eq!(next.conductor_id, "user002");
    }

    #[test]
    fn test_conductors_wrap_around() {
        let assigner = assigner(200);
        assert_eq!(assigner.conductor_of_tour(29), 29);
        assert_eq!(assigner.conductor_of_tour(30), 0);
        assert_eq!(assigner.tour(30).unwrap().conductor_id, "user001");
    }

    #[test]
    fn test_passengers_walk_trailing_slice() {
        let assigner = assigner(200);
        assert_eq!(assigner.passenger_of_booking(0), 99);
        assert_eq!(assigner.passenger_of_booking(79), 20);
        assert_eq!(assigner.passenger_of_booking(80), 99);
    }

    #[test]
    fn test_review_pairs_are_dense() {
        let assigner = assigner(200);
        let [a, b] = assigner.reviews_of_booking(0).unwrap().unwrap();
        assert_eq!((a.ordinal, b.ordinal), (0, 1));
        assert_eq!(a.review_id, "review001");
        assert_eq!(a.by_user_id, "user001");
        assert_eq!(a.of_user_id, "user100");
        assert_eq!(b.by_user_id, "user100");
        assert_eq!(b.of_user_id, "user001");
        assert_eq!(a.star_rank, 1);
        assert_eq!(b.star_rank, 2);

        assert!(assigner.reviews_of_booking(3).unwrap().is_none());
        let [c, _] = assigner.reviews_of_booking(4).unwrap().unwrap();
        assert_eq!(c.ordinal, 6);

        let [_, last] = assigner.reviews_of_booking(198).unwrap().unwrap();
        assert_eq!(last.ordinal, 299);
        assert_eq!(last.review_id, "review300");
    }

    #[test]
    fn test_short_trailing_cohort_has_no_reviews() {
        let assigner = assigner(201);
        assert_eq!(assigner.status_of_booking(200), BookingStatus::Approved);
        assert!(!assigner.is_reviewed_tour(50));
        assert!(assigner.reviews_of_booking(200).unwrap().is_none());
    }

    #[test]
    fn test_self_booking_detection() {
        let scale = ScaleModel::derive(&ScaleConfig {
            user_count: 10,
            conducteur_ratio: 0.5,
            passenger_ratio: 1.0,
            tour_count: 10,
            booking_count: 20,
            approved_bookings_per_tour: 1,
        })
        .unwrap();
        let assigner = EntityAssigner::new(scale);
        let selfies: Vec<u64> = (0..20)
            .filter(|&i| assigner.booking(i).unwrap().is_self())
            .collect();
        assert_eq!(selfies, vec![6, 16]);

        let [a, b] = assigner.reviews_of_booking(6).unwrap().unwrap();
        assert!(a.is_self() && b.is_self());
    }

    proptest! {
        #[test]
        fn prop_tour_and_conductor_are_monotonic_within_cohort(booking in 0u64..199) {
            let assigner = assigner(200);
            let next = booking + 1;
            prop_assert!(assigner.tour_of_booking(booking) <= assigner.tour_of_booking(next));
            if assigner.tour_of_booking(booking) == assigner.tour_of_booking(next) {
                let tour = assigner.tour_of_booking(booking);
                prop_assert_eq!(
                    assigner.conductor_of_tour(tour),
                    assigner.conductor_of_tour(assigner.tour_of_booking(next))
                );
            }
        }

        #[test]
        fn prop_review_ordinals_cover_range_exactly(booking_count in 1u64..400) {
            let assigner = assigner(booking_count);
            let ordinals: Vec<u64> = (0..booking_count)
                .filter_map(|i| assigner.review_ordinal_of_booking(i))
                .flat_map(|first| [first, first + 1])
                .collect();
            let expected: Vec<u64> = (0..assigner.scale().review_count).collect();
            prop_assert_eq!(ordinals, expected);
        }
    }
}
