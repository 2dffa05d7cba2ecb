//! Generated question sets and their concurrent store.

mod store;

pub use store::QuestionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cached bundle of generated candidate questions for one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    /// Unique set ID, assigned at creation.
    pub id: Uuid,
    /// Episode the questions were generated from.
    pub source_episode_number: String,
    /// Topics covered by the sampled transcript text.
    pub topics: Vec<String>,
    /// The question strings, in generation order.
    pub questions: Vec<String>,
    /// When this set was generated.
    pub generated_at: DateTime<Utc>,
    /// When this set was last shown to a user, if ever.
    pub last_shown_at: Option<DateTime<Utc>>,
    /// How many times this set has been shown. Never decreases.
    pub times_shown: u32,
}

impl QuestionSet {
    /// Create a new set with a fresh identifier.
    pub fn new(
        source_episode_number: String,
        topics: Vec<String>,
        questions: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_episode_number,
            topics,
            questions,
            generated_at: Utc::now(),
            last_shown_at: None,
            times_shown: 0,
        }
    }
}
