//! Row construction for every table of the dataset

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::assign::{BookingAssignment, EntityAssigner, ReviewAssignment, TourAssignment};
use crate::schema::field;
use crate::types::Row;
use crate::Result;

/// Source of `createdAt` timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Builds rows from assigner output
#[derive(Clone)]
pub struct RowFactory {
    assigner: EntityAssigner,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RowFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowFactory")
            .field("assigner", &self.assigner)
            .finish_non_exhaustive()
    }
}

impl RowFactory {
    pub fn new(assigner: EntityAssigner) -> Self {
        Self::with_clock(assigner, Arc::new(SystemClock))
    }

    pub fn with_clock(assigner: EntityAssigner, clock: Arc<dyn Clock>) -> Self {
        Self { assigner, clock }
    }

    pub fn assigner(&self) -> &EntityAssigner {
        &self.assigner
    }

    pub fn user(&self, user: u64) -> Result<Row> {
        let user_id = self.assigner.user_id(user)?;
        Ok(Row::new()
            .with(field::FIRSTNAME, format!("{user_id} firstname"))
            .with(field::NICK_NAME, format!("{user_id} nickname"))
            .with(field::SURNAME, format!("{user_id} surname"))
            .with(field::INTERNAL_ID, format!("{user_id}{}", field::INTERNAL_ID))
            .with(field::CREATED_AT, self.clock.now())
            .with(field::USER_ID, user_id))
    }

    pub fn tour(&self, tour: &TourAssignment) -> Row {
        Row::new()
            .with(field::TOUR_ID, tour.tour_id.as_str())
            .with(field::USER_ID, tour.conductor_id.as_str())
            .with(field::BAG_SIZE, "20Kg")
            .with(field::SEATS_TOTAL, 3_i64)
            .with(field::SEATS_REMAIN, 3_i64)
            .with(field::CREATED_AT, self.clock.now())
    }

    pub fn booking(&self, booking: &BookingAssignment) -> Row {
        Row::new()
            .with(field::BOOKING_ID, booking.booking_id.as_str())
            .with(field::TOUR_ID, booking.tour_id.as_str())
            .with(field::USER_ID, booking.passenger_id.as_str())
            .with(field::STATUS, booking.status.as_str())
            .with(field::CREATED_AT, self.clock.now())
    }

    /// Marker row for a booking whose passenger conducts the tour
    pub fn self_booking(&self, booking: &BookingAssignment) -> Row {
        Row::new().with(field::BOOKING_ID, booking.booking_id.as_str())
    }

    pub fn review(&self, review: &ReviewAssignment) -> Row {
        let comment = format!(
            "{} comment from {} to {} for {} {}",
            review.review_id, review.by_user_id, review.of_user_id, review.tour_id, review.booking_id
        );
        Row::new()
            .with(field::REVIEW_ID, review.review_id.as_str())
            .with(field::TOUR_ID, review.tour_id.as_str())
            .with(field::BY_USER_ID, review.by_user_id.as_str())
            .with(field::OF_USER_ID, review.of_user_id.as_str())
            .with(field::COMMENT, comment)
            .with(field::STAR_RANK, review.star_rank)
            .with(field::CREATED_AT, self.clock.now())
    }
}
