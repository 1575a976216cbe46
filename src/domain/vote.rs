use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ParticipantId, PointId, TripId};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// One participant's rating of one route point. At most one vote exists per
/// (voter, point); voting again replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub trip_id: TripId,
    pub voter: ParticipantId,
    pub point_id: PointId,
    pub value: u8,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        trip_id: TripId,
        voter: ParticipantId,
        point_id: PointId,
        value: u8,
    ) -> Result<Self, InvalidRating> {
        validate_rating(value)?;
        Ok(Self {
            trip_id,
            voter,
            point_id,
            value,
            comment: None,
            updated_at: Utc::now(),
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Apply a repeated vote: the value always changes, the comment only
    /// when a new one is given.
    pub fn overwrite_with(&mut self, newer: Vote) {
        self.value = newer.value;
        if newer.comment.is_some() {
            self.comment = newer.comment;
        }
        self.updated_at = newer.updated_at;
    }
}

pub fn validate_rating(value: u8) -> Result<(), InvalidRating> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(())
    } else {
        Err(InvalidRating(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRating(pub u8);

impl std::fmt::Display for InvalidRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vote value {} is outside {}..={}",
            self.0, MIN_RATING, MAX_RATING
        )
    }
}

impl std::error::Error for InvalidRating {}
