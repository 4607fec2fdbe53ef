//! User feedback: persistence and learning.
//!
//! Ratings and corrections are stored by [`FeedbackRepository`] and turned
//! into prompt material by [`FeedbackLearning`].

pub mod learning;
pub mod models;
pub mod repository;

use thiserror::Error;

pub use learning::{FeedbackLearning, LearningOptions};
pub use models::{CorrectionEntry, FeedbackEntry, FeedbackStats, LearningStatus, Rating};
pub use repository::FeedbackRepository;

/// Errors from the feedback store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),
    #[error("No feedback entry with id {0}")]
    UnknownFeedback(i64),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
