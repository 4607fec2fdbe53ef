//! Feedback records and aggregates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::RepositoryError;

/// Minimum rating counted as positive.
pub const POSITIVE_RATING: u8 = 4;
/// Maximum rating counted as low.
pub const LOW_RATING: u8 = 2;

/// A user rating from 1 (thumbs down) to 5 (thumbs up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, RepositoryError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(RepositoryError::InvalidRating(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 >= POSITIVE_RATING
    }

    pub fn is_low(self) -> bool {
        self.0 <= LOW_RATING
    }
}

impl TryFrom<i64> for Rating {
    type Error = RepositoryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rated question/query pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEntry {
    pub id: i64,
    pub question: String,
    pub sql_query: String,
    pub rating: Rating,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A user-supplied fix for a rated query, joined with the original question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionEntry {
    pub id: i64,
    pub feedback_id: i64,
    pub question: String,
    pub original_query: String,
    pub corrected_query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total_feedback: u64,
    /// Mean rating rounded to two decimals, 0 when empty.
    pub average_rating: f64,
    pub positive_feedback: u64,
    pub total_corrections: u64,
}

/// Snapshot of how much the learning engine has to work with.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LearningStatus {
    pub has_learning_data: bool,
    pub positive_examples: u64,
    pub corrections: u64,
    pub total_feedback: u64,
    pub average_rating: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert!(Rating::new(-1).is_err());
        for v in 1..=5 {
            assert_eq!(Rating::new(v).unwrap().value() as i64, v);
        }
    }

    #[test]
    fn test_rating_classes() {
        assert!(Rating::new(4).unwrap().is_positive());
        assert!(!Rating::new(3).unwrap().is_positive());
        assert!(!Rating::new(3).unwrap().is_low());
        assert!(Rating::new(2).unwrap().is_low());
    }

    #[test]
    fn test_invalid_rating_message() {
        let err = Rating::try_from(9).unwrap_err();
        assert_eq!(err.to_string(), "Rating must be between 1 and 5, got 9");
    }
}
