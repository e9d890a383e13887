//! Fixed-width, lexicographically sortable entity identifiers
//!
//! An identifier is the entity kind followed by `ordinal + 1`, zero padded to
//! the decimal width of the kind's configured count: with 100 users ordinal 0
//! is `user001` and ordinal 99 is `user100`. Because the width is fixed for
//! the run, string order and ordinal order agree on `[0, count)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scale::ScaleModel;
use crate::{Error, Result};

/// Entity kinds that carry formatted identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Tour,
    Booking,
    Review,
}

impl EntityKind {
    /// Identifier prefix
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Tour => "tour",
            EntityKind::Booking => "booking",
            EntityKind::Review => "review",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Number of decimal digits in `n` (at least 1)
fn decimal_width(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |digits| digits as usize + 1)
}

/// Identifier codec for one entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCodec {
    kind: EntityKind,
    count: u64,
    width: usize,
}

impl IdCodec {
    /// Create a codec whose width is fixed from the configured count
    pub fn new(kind: EntityKind, count: u64) -> Self {
        Self {
            kind,
            count,
            width: decimal_width(count),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Format an ordinal in `[0, count)`.
    ///
    /// Ordinals past the configured count would widen the identifier and
    /// break the sort order, so they are rejected.
    pub fn format(&self, ordinal: u64) -> Result<String> {
        if ordinal >= self.count {
            return Err(Error::IdentifierOverflow {
                kind: self.kind,
                ordinal,
                count: self.count,
            });
        }
        Ok(format!(
            "{}{:0width$}",
            self.kind.prefix(),
            ordinal + 1,
            width = self.width
        ))
    }

    /// Recover the ordinal from an identifier of this kind
    pub fn parse(&self, id: &str) -> Result<u64> {
        let digits = id.strip_prefix(self.kind.prefix()).ok_or_else(|| {
            Error::invalid_operation(format!("`{id}` is not a {} identifier", self.kind))
        })?;
        if digits.len() != self.width || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_operation(format!(
                "`{id}` does not carry {} digits",
                self.width
            )));
        }
        let number: u64 = digits
            .parse()
            .map_err(|e| Error::invalid_operation(format!("`{id}`: {e}")))?;
        match number.checked_sub(1) {
            Some(ordinal) if ordinal < self.count => Ok(ordinal),
            _ => Err(Error::IdentifierOverflow {
                kind: self.kind,
                ordinal: number.saturating_sub(1),
                count: self.count,
            }),
        }
    }
}

/// The identifier codecs of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCodecs {
    pub user: IdCodec,
    pub tour: IdCodec,
    pub booking: IdCodec,
    pub review: IdCodec,
}

impl IdCodecs {
    pub fn new(scale: &ScaleModel) -> Self {
        Self {
            user: IdCodec::new(EntityKind::User, scale.user_count),
            tour: IdCodec::new(EntityKind::Tour, scale.tour_count),
            booking: IdCodec::new(EntityKind::Booking, scale.booking_count),
            review: IdCodec::new(EntityKind::Review, scale.review_count),
        }
    }
}
