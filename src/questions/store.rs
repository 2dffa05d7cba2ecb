//! Concurrent in-memory store of generated question sets.
//!
//! Safe for concurrent use from API readers and the generation scheduler
//! without external locking. Randomness comes from one process-lifetime
//! generator so tests can pin the seed and assert exact selections.

use super::QuestionSet;
use crate::error::{Result, UndreError};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Concurrent store of question sets, keyed by set identifier.
pub struct QuestionStore {
    sets: RwLock<HashMap<Uuid, QuestionSet>>,
    rng: Mutex<StdRng>,
}

impl QuestionStore {
    /// Create a store with entropy-seeded randomness.
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a store with a fixed seed (for tests).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Insert a set, keeping whatever is already stored under its ID.
    ///
    /// A set must carry at least one question to be persisted.
    pub fn save(&self, set: QuestionSet) -> Result<Uuid> {
        if set.questions.is_empty() {
            return Err(UndreError::InvalidInput(
                "Question set has no questions".to_string(),
            ));
        }
        let id = set.id;
        let mut sets = self.sets.write().unwrap();
        sets.entry(id).or_insert(set);
        Ok(id)
    }

    /// All sets, newest first.
    pub fn all(&self) -> Vec<QuestionSet> {
        let sets = self.sets.read().unwrap();
        let mut all: Vec<QuestionSet> = sets.values().cloned().collect();
        all.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        all
    }

    /// Pick up to `count` sets for display.
    ///
    /// Selection precedence: a fresh random key first, then ascending
    /// times-shown, then oldest (or never) last-shown time. The random key
    /// dominates so repeat calls vary; the tie-breaks prefer underexposed
    /// sets when keys collide.
    pub fn get_random(&self, count: usize, topic: Option<&str>) -> Vec<QuestionSet> {
        let sets = self.sets.read().unwrap();

        let mut candidates: Vec<QuestionSet> = sets
            .values()
            .filter(|s| match topic {
                Some(topic) => s.topics.iter().any(|t| t.contains(topic)),
                None => true,
            })
            .cloned()
            .collect();

        // Stable base order so a pinned seed gives a reproducible pick.
        candidates.sort_by_key(|s| s.id);

        let mut rng = self.rng.lock().unwrap();
        let mut keyed: Vec<(u32, QuestionSet)> = candidates
            .into_iter()
            .map(|s| (rng.gen::<u32>(), s))
            .collect();
        drop(rng);

        keyed.sort_by(|(ka, a), (kb, b)| {
            ka.cmp(kb)
                .then(a.times_shown.cmp(&b.times_shown))
                .then(
                    a.last_shown_at
                        .unwrap_or(DateTime::<Utc>::MIN_UTC)
                        .cmp(&b.last_shown_at.unwrap_or(DateTime::<Utc>::MIN_UTC)),
                )
        });

        keyed.into_iter().take(count).map(|(_, s)| s).collect()
    }

    /// Record that a set was shown: bump the counter and stamp the time.
    ///
    /// Returns false (and changes nothing) when the ID is unknown.
    pub fn mark_shown(&self, id: Uuid) -> bool {
        let mut sets = self.sets.write().unwrap();
        match sets.get_mut(&id) {
            Some(set) => {
                set.times_shown += 1;
                set.last_shown_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Sets generated from the given episode, newest first.
    pub fn by_episode(&self, episode_number: &str) -> Vec<QuestionSet> {
        let sets = self.sets.read().unwrap();
        let mut found: Vec<QuestionSet> = sets
            .values()
            .filter(|s| s.source_episode_number == episode_number)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        found
    }

    /// Sets carrying the given topic, newest first.
    pub fn by_topic(&self, topic: &str) -> Vec<QuestionSet> {
        let sets = self.sets.read().unwrap();
        let mut found: Vec<QuestionSet> = sets
            .values()
            .filter(|s| s.topics.iter().any(|t| t.contains(topic)))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        found
    }

    /// Sets generated within the last `days` days, newest first.
    pub fn generated_within_days(&self, days: i64) -> Vec<QuestionSet> {
        let cutoff = Utc::now() - Duration::days(days);
        let sets = self.sets.read().unwrap();
        let mut found: Vec<QuestionSet> = sets
            .values()
            .filter(|s| s.generated_at >= cutoff)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        found
    }

    /// Delete sets generated before the cutoff; returns how many went.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sets = self.sets.write().unwrap();
        let before = sets.len();
        sets.retain(|_, s| s.generated_at >= cutoff);
        before - sets.len()
    }

    /// Delete one set by ID; returns whether it existed.
    pub fn delete(&self, id: Uuid) -> bool {
        let mut sets = self.sets.write().unwrap();
        sets.remove(&id).is_some()
    }

    /// Number of stored sets.
    pub fn len(&self) -> usize {
        self.sets.read().unwrap().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QuestionStore {
    fn default() -> Self {
        Self::new()
    }
}
