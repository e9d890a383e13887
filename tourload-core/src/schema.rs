//! Table, field and index names of the dataset

use crate::types::IndexSpec;

pub mod table {
    pub const USERS: &str = "users";
    pub const TOURS: &str = "tours";
    pub const BOOKINGS: &str = "bookings";
    pub const REVIEWS: &str = "reviews";
    pub const SELF_BOOKINGS: &str = "_selfBookings";
    pub const SELF_REVIEWS: &str = "_selfReviews";
}

pub mod field {
    pub const USER_ID: &str = "userId";
    pub const INTERNAL_ID: &str = "internalId";
    pub const FIRSTNAME: &str = "firstname";
    pub const NICK_NAME: &str = "nickName";
    pub const SURNAME: &str = "surname";

    pub const TOUR_ID: &str = "tourId";
    pub const BAG_SIZE: &str = "bagSize";
    pub const SEATS_TOTAL: &str = "seatsTotal";
    pub const SEATS_REMAIN: &str = "seatsRemain";

    pub const BOOKING_ID: &str = "bookingId";
    pub const STATUS: &str = "status";

    pub const REVIEW_ID: &str = "reviewId";
    pub const BY_USER_ID: &str = "byUserId";
    pub const OF_USER_ID: &str = "ofUserId";
    pub const COMMENT: &str = "comment";
    pub const STAR_RANK: &str = "starRank";

    pub const CREATED_AT: &str = "createdAt";
}

pub mod index {
    pub const TOUR_ID_AND_STATUS: &str = "tourIdAndStatus";
    pub const TOUR_ID_AND_BY_USER_ID_AND_OF_USER_ID: &str = "tourIdAndbyUserIdAndofUserId";
}

/// Primary key and secondary indexes of one table
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub indexes: Vec<IndexSpec>,
}

pub fn users() -> TableDef {
    TableDef {
        name: table::USERS,
        primary_key: field::USER_ID,
        indexes: vec![IndexSpec::simple(field::INTERNAL_ID)],
    }
}

pub fn tours() -> TableDef {
    TableDef {
        name: table::TOURS,
        primary_key: field::TOUR_ID,
        indexes: vec![
            IndexSpec::simple(field::USER_ID),
            IndexSpec::simple(field::CREATED_AT),
        ],
    }
}

pub fn bookings() -> TableDef {
    TableDef {
        name: table::BOOKINGS,
        primary_key: field::BOOKING_ID,
        indexes: vec![
            IndexSpec::simple(field::USER_ID),
            IndexSpec::simple(field::TOUR_ID),
            IndexSpec::compound(index::TOUR_ID_AND_STATUS, &[field::TOUR_ID, field::STATUS]),
            IndexSpec::simple(field::CREATED_AT),
        ],
    }
}

pub fn reviews() -> TableDef {
    TableDef {
        name: table::REVIEWS,
        primary_key: field::REVIEW_ID,
        indexes: vec![
            IndexSpec::simple(field::TOUR_ID),
            IndexSpec::simple(field::BY_USER_ID),
            IndexSpec::simple(field::OF_USER_ID),
            IndexSpec::simple(field::CREATED_AT),
            IndexSpec::compound(
                index::TOUR_ID_AND_BY_USER_ID_AND_OF_USER_ID,
                &[field::TOUR_ID, field::BY_USER_ID, field::OF_USER_ID],
            ),
        ],
    }
}

pub fn self_bookings() -> TableDef {
    TableDef {
        name: table::SELF_BOOKINGS,
        primary_key: field::BOOKING_ID,
        indexes: Vec::new(),
    }
}

pub fn self_reviews() -> TableDef {
    TableDef {
        name: table::SELF_REVIEWS,
        primary_key: field::REVIEW_ID,
        indexes: Vec::new(),
    }
}
