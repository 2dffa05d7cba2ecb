//! Question generation from retrieved transcript text.

mod scheduler;

pub use scheduler::{GenerationScheduler, IngestionSignal};

use crate::completion::{CompletionParams, CompletionProvider};
use crate::config::{GenerationSettings, Prompts};
use crate::error::{Result, UndreError};
use crate::questions::{QuestionSet, QuestionStore};
use crate::search::{SearchEngine, SearchQuery};
use crate::vector_store::VectorStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Query text used to sample chunks from the chosen episode.
const SAMPLE_QUERY_TEXT: &str = "Topic";

/// Sampling parameters for the generation call. Creative on purpose.
const GENERATION_TEMPERATURE: f32 = 0.9;
const GENERATION_TOP_P: f32 = 0.95;

/// Generates question sets from transcript samples and caches them.
pub struct QuestionGenerator {
    engine: Arc<SearchEngine>,
    vector_store: Arc<dyn VectorStore>,
    question_store: Arc<QuestionStore>,
    completion: Arc<dyn CompletionProvider>,
    prompts: Prompts,
    settings: GenerationSettings,
    rng: Mutex<StdRng>,
}

impl QuestionGenerator {
    /// Create a new generator.
    pub fn new(
        engine: Arc<SearchEngine>,
        vector_store: Arc<dyn VectorStore>,
        question_store: Arc<QuestionStore>,
        completion: Arc<dyn CompletionProvider>,
        prompts: Prompts,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            engine,
            vector_store,
            question_store,
            completion,
            prompts,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Pin the episode-selection seed (for tests).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Run one full generation pass.
    ///
    /// Picks an episode, samples its chunks, prompts the completion
    /// provider, parses the questions, and persists the resulting set.
    #[instrument(skip(self))]
    pub async fn generate_once(&self) -> Result<QuestionSet> {
        let episode = self.pick_episode().await?;
        info!("Selected episode {} for question generation", episode);

        let episode_number = episode.parse::<i64>().map_err(|_| {
            UndreError::Generation(format!("Episode number '{}' is not numeric", episode))
        })?;

        let response = self
            .engine
            .search(&SearchQuery {
                query_text: SAMPLE_QUERY_TEXT.to_string(),
                max_results: Some(self.settings.sample_size),
                episode_number: Some(episode_number),
                ..Default::default()
            })
            .await?;

        if response.results.is_empty() {
            return Err(UndreError::Generation(format!(
                "No transcript content found for episode {}",
                episode
            )));
        }

        let transcript = response
            .results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let topics = collect_topics(response.results.iter().map(|r| r.topics.as_str()));

        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), transcript);
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.generation.user, &vars);

        let params = CompletionParams {
            max_tokens: Some(self.settings.max_response_tokens),
            temperature: GENERATION_TEMPERATURE,
            top_p: GENERATION_TOP_P,
        };
        let response_text = self.completion.complete(&prompt, params).await?;

        let questions = parse_questions(&response_text)?;
        let set = QuestionSet::new(episode, topics, questions);
        self.question_store.save(set.clone())?;

        info!(
            "Cached {} questions for episode {}",
            set.questions.len(),
            set.source_episode_number
        );
        Ok(set)
    }

    /// Serve up to `count` question sets, generating more on shortage.
    ///
    /// Every returned set is marked shown. A failed synchronous generation
    /// pass is logged; the caller still gets whatever the store holds.
    #[instrument(skip(self))]
    pub async fn suggest(&self, count: usize, topic: Option<&str>) -> Vec<QuestionSet> {
        let mut sets = self.question_store.get_random(count, topic);

        if sets.len() < count {
            info!(
                "Question shortage ({}/{}), running a synchronous generation pass",
                sets.len(),
                count
            );
            if let Err(e) = self.generate_once().await {
                warn!("Synchronous generation failed: {}", e);
            }
            sets = self.question_store.get_random(count, topic);
        }

        for set in &sets {
            self.question_store.mark_shown(set.id);
        }
        sets
    }

    /// Choose an episode: the store's live pool when it has one, otherwise
    /// the configured candidate list.
    async fn pick_episode(&self) -> Result<String> {
        let mut pool = self.vector_store.episode_numbers().await?;
        if pool.is_empty() {
            pool = self
                .settings
                .episode_pool
                .iter()
                .map(|n| n.to_string())
                .collect();
        }
        if pool.is_empty() {
            return Err(UndreError::Generation(
                "No candidate episodes available".to_string(),
            ));
        }

        let mut rng = self.rng.lock().unwrap();
        let index = rng.gen_range(0..pool.len());
        Ok(pool.swap_remove(index))
    }
}

/// Parse the model response as a JSON array of question strings.
fn parse_questions(response: &str) -> Result<Vec<String>> {
    let json_start = response.find('[');
    let json_end = response.rfind(']');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    let questions: Vec<String> = serde_json::from_str(json_str).map_err(|e| {
        UndreError::Generation(format!(
            "Failed to parse question response: {}. Response was: {}",
            e,
            &response[..response.len().min(500)]
        ))
    })?;

    let questions: Vec<String> = questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if questions.is_empty() {
        return Err(UndreError::Generation(
            "Model returned no usable questions".to_string(),
        ));
    }
    Ok(questions)
}

/// Distinct topics across comma-separated topic fields, first seen first.
fn collect_topics<'a>(topic_fields: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for field in topic_fields {
        for topic in field.split(',') {
            let topic = topic.trim();
            if !topic.is_empty() && !seen.iter().any(|t: &String| t == topic) {
                seen.push(topic.to_string());
            }
        }
    }
    seen
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_generation_pass_caches_a_question_set() {
        let (generator, question_store) = generator_with(
            vec![
                sample_chunk("201", 0.0, "first segment"),
                sample_chunk("201", 30.0, "second segment"),
                sample_chunk("201", 60.0, "third segment"),
            ],
            r#"["Who visited the castle?", "What started the fire?"]"#,
            vec![],
        )
        .await;

        let set = generator.generate_once().await.unwrap();

        assert_eq!(set.source_episode_number, "201");
        assert!(!set.questions.is_empty());
        assert_eq!(set.questions.len(), 2);
        assert!(set.topics.contains(&"history".to_string()));
        assert_eq!(question_store.len(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_pool_wins_over_configured_pool() {
        // Only episode 510 is indexed; the static pool says 201.
        let (generator, _) = generator_with(
            vec![sample_chunk("510", 0.0, "content")],
            r#"["A question?"]"#,
            vec![201],
        )
        .await;

        let set = generator.generate_once().await.unwrap();
        assert_eq!(set.source_episode_number, "510");
    }

    #[tokio::test]
    async fn test_empty_store_and_pool_is_an_error() {
        let (generator, _) = generator_with(vec![], r#"["A question?"]"#, vec![]).await;
        assert!(generator.generate_once().await.is_err());
    }

    #[tokio::test]
    async fn test_unparseable_response_fails_without_caching() {
        let (generator, question_store) = generator_with(
            vec![sample_chunk("201", 0.0, "content")],
            "I'd rather not answer in JSON today.",
            vec![],
        )
        .await;

        assert!(generator.generate_once().await.is_err());
        assert!(question_store.is_empty());
    }

    #[tokio::test]
    async fn test_suggest_generates_on_shortage_and_marks_shown() {
        let (generator, question_store) = generator_with(
            vec![sample_chunk("201", 0.0, "content")],
            r#"["One?", "Two?", "Three?"]"#,
            vec![],
        )
        .await;
        assert!(question_store.is_empty());

        let sets = generator.suggest(2, None).await;

        assert_eq!(sets.len(), 1);
        let stored = question_store.by_episode("201").remove(0);
        assert_eq!(stored.times_shown, 1);
        assert!(stored.last_shown_at.is_some());
    }

    #[test]
    fn test_parse_questions_extracts_array_from_prose() {
        let questions =
            parse_questions("Sure!\n```json\n[\"Who?\", \"What?\"]\n```").unwrap();
        assert_eq!(questions, vec!["Who?".to_string(), "What?".to_string()]);
    }

    #[test]
    fn test_parse_questions_rejects_empty_and_garbage() {
        assert!(parse_questions("[]").is_err());
        assert!(parse_questions(r#"["  ", ""]"#).is_err());
        assert!(parse_questions("no array").is_err());
    }

    #[test]
    fn test_collect_topics_dedupes_across_fields() {
        let topics = collect_topics(["history, politics", "politics, art"].into_iter());
        assert_eq!(topics, vec!["history", "politics", "art"]);
    }
}
