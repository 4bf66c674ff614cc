/// Phase orchestrator: generate the tournament, run the comparison batch,
/// normalize answers, run the extraction batch, validate with bounded
/// per-matchup retries, and hand back verdicts in matchup order.
///
/// Prompt-template rendering is injected through [`Prompter`]; the remote
/// call through [`ModelClient`]. The phases never overlap: generation is
/// pure and single-threaded, the batches are the only parallel sections.
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_CONCURRENCY, DEFAULT_EXTRACTION_RETRIES, DEFAULT_MAX_TRIES,
    DEFAULT_SEED, MAX_CONCURRENCY,
};
use crate::executor::{execute_batch, BatchError, BatchOptions, ModelClient, ProgressFn};
use crate::extract::{
    build_extraction_turns, classify_answer, normalize_comparison_answer, ExtractionState,
};
use crate::tournament::{generate_matchups, TournamentError};
use crate::types::{CallParams, ChatTurn, Direction, Entity, Outcome, Verdict};

/// Renders the two prompt kinds for a matchup, in presentation order.
/// Direction-sensitive template sets pick a direction per matchup and must
/// render the matching extraction prompt for it.
pub trait Prompter {
    fn comparison_prompt(&self, first: &Entity, second: &Entity) -> (String, Direction);
    fn extraction_prompt(&self, first: &Entity, second: &Entity, direction: Direction) -> String;
}

/// Run parameters. Construct with [`SessionConfig::new`] and override fields
/// as needed; validation happens eagerly in [`Session::new`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    /// Sampling temperature for the comparison phase. Extraction always runs
    /// at temperature 0.
    pub temperature: f64,
    pub top_p: f64,
    pub concurrency: usize,
    /// Total attempts per remote call before the batch aborts.
    pub max_tries: u32,
    /// Linear backoff base in seconds between attempts.
    pub backoff_base: f64,
    /// Partners sampled per entity; `None` runs the exhaustive tournament.
    pub sample_per_entity: Option<usize>,
    pub seed: u64,
    /// Single-item retries for an extraction answer that fails validation.
    pub extraction_retry_limit: u32,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>) -> SessionConfig {
        SessionConfig {
            model: model.into(),
            temperature: 0.0,
            top_p: 1.0,
            concurrency: DEFAULT_CONCURRENCY,
            max_tries: DEFAULT_MAX_TRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            sample_per_entity: None,
            seed: DEFAULT_SEED,
            extraction_retry_limit: DEFAULT_EXTRACTION_RETRIES,
        }
    }

    fn validate(&self) -> Result<(), RunError> {
        if self.model.is_empty() {
            return Err(RunError::Config("model id must not be empty".to_string()));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(RunError::Config(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.max_tries == 0 {
            return Err(RunError::Config("max_tries must be at least 1".to_string()));
        }
        if self.sample_per_entity == Some(0) {
            return Err(RunError::Config(
                "sample_per_entity must be positive; omit it for the exhaustive tournament"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error("comparison phase failed: {0}")]
    Comparison(#[source] BatchError),

    #[error("extraction phase failed: {0}")]
    Extraction(#[source] BatchError),
}

/// One run over one loaded entity set.
pub struct Session {
    entities: Vec<Entity>,
    by_id: HashMap<String, usize>,
    config: SessionConfig,
}

impl Session {
    pub fn new(entities: Vec<Entity>, config: SessionConfig) -> Result<Session, RunError> {
        config.validate()?;

        let mut by_id = HashMap::with_capacity(entities.len());
        for (index, entity) in entities.iter().enumerate() {
            if by_id.insert(entity.id.clone(), index).is_some() {
                return Err(RunError::Config(format!("duplicate entity id: {}", entity.id)));
            }
        }

        Ok(Session { entities, by_id, config })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn entity(&self, id: &str) -> &Entity {
        let index = *self
            .by_id
            .get(id)
            .unwrap_or_else(|| panic!("matchup references unknown entity id: {id}"));
        &self.entities[index]
    }

    /// Drive the whole run. Verdicts come back in matchup-generation order,
    /// each carrying its canonical id pair for stable joining.
    pub async fn run(
        &self,
        prompter: &dyn Prompter,
        client: Arc<dyn ModelClient>,
        on_progress: Option<ProgressFn>,
    ) -> Result<Vec<Verdict>, RunError> {
        let ids: Vec<String> = self.entities.iter().map(|e| e.id.clone()).collect();
        let matchups = generate_matchups(&ids, self.config.sample_per_entity, self.config.seed)?;

        let mut prompts = Vec::with_capacity(matchups.len());
        let mut directions = Vec::with_capacity(matchups.len());
        for matchup in &matchups {
            let first = self.entity(&matchup.presented.0);
            let second = self.entity(&matchup.presented.1);
            let (text, direction) = prompter.comparison_prompt(first, second);
            prompts.push(text);
            directions.push(direction);
        }

        let options = BatchOptions {
            concurrency: self.config.concurrency,
            max_tries: self.config.max_tries,
            backoff_base: self.config.backoff_base,
        };

        tracing::info!(matchups = matchups.len(), "running pairwise comparisons");
        let comparison_payloads: Vec<Vec<ChatTurn>> = prompts
            .iter()
            .map(|prompt| vec![ChatTurn::user(prompt.clone())])
            .collect();
        let comparison_params = CallParams {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        };
        let answers = execute_batch(
            client.clone(),
            comparison_payloads,
            comparison_params,
            &options,
            on_progress.clone(),
        )
        .await
        .map_err(RunError::Comparison)?;

        let normalized: Vec<String> = answers
            .iter()
            .map(|answer| normalize_comparison_answer(answer).to_string())
            .collect();

        tracing::info!("extracting verdicts");
        // Extraction is deterministic by construction: temperature pinned to
        // zero regardless of the comparison phase's sampling settings.
        let extraction_params = CallParams {
            model: self.config.model.clone(),
            temperature: 0.0,
            top_p: 1.0,
        };
        let mut extraction_payloads = Vec::with_capacity(matchups.len());
        for (i, matchup) in matchups.iter().enumerate() {
            let first = self.entity(&matchup.presented.0);
            let second = self.entity(&matchup.presented.1);
            let extraction_prompt = prompter.extraction_prompt(first, second, directions[i]);
            extraction_payloads.push(build_extraction_turns(
                &prompts[i],
                &normalized[i],
                &extraction_prompt,
            ));
        }

        let extraction_answers = execute_batch(
            client.clone(),
            extraction_payloads.clone(),
            extraction_params.clone(),
            &options,
            on_progress,
        )
        .await
        .map_err(RunError::Extraction)?;

        let retry_limit = self.config.extraction_retry_limit;
        let mut verdicts = Vec::with_capacity(matchups.len());
        let mut unresolved = 0usize;

        for (i, matchup) in matchups.into_iter().enumerate() {
            let first_name = self.entity(&matchup.presented.0).name.clone();
            let second_name = self.entity(&matchup.presented.1).name.clone();

            let mut answer = extraction_answers[i].clone();
            let mut outcome = classify_answer(&answer, &first_name, &second_name);
            let mut state = ExtractionState::Pending.observe(outcome.is_some(), retry_limit);

            // Bounded single-item retries; each round-trip is still covered
            // by the executor's own transient-failure policy.
            while !state.is_terminal() {
                tracing::debug!(matchup = i, ?state, "re-issuing extraction request");
                let retry = execute_batch(
                    client.clone(),
                    vec![extraction_payloads[i].clone()],
                    extraction_params.clone(),
                    &options,
                    None,
                )
                .await
                .map_err(RunError::Extraction)?;
                answer = retry
                    .into_iter()
                    .next()
                    .expect("single-item batch yields one result");
                outcome = classify_answer(&answer, &first_name, &second_name);
                state = state.observe(outcome.is_some(), retry_limit);
            }

            let extraction_error = state == ExtractionState::Failed;
            if extraction_error {
                unresolved += 1;
            }

            verdicts.push(Verdict {
                matchup,
                direction: directions[i],
                prompt: prompts[i].clone(),
                comparison_answer: normalized[i].clone(),
                extraction_answer: answer,
                outcome: outcome.unwrap_or(Outcome::Unresolved),
                extraction_error,
            });
        }

        if unresolved == 0 {
            tracing::info!("no extraction errors found");
        } else {
            tracing::warn!(unresolved, "matchups need manual review");
        }

        Ok(verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CallError;
    use async_trait::async_trait;

    fn entity(id: &str, name: &str, party_code: u16) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            chamber: "Senate".to_string(),
            congress: 116,
            party_code,
            state: "CA".to_string(),
        }
    }

    fn four_entities() -> Vec<Entity> {
        vec![
            entity("B0001", "Alma Reyes", 100),
            entity("B0002", "Frank Okafor", 200),
            entity("B0003", "Lena Voss", 100),
            entity("B0004", "Marcus Hale", 200),
        ]
    }

    struct TestPrompter;

    impl Prompter for TestPrompter {
        fn comparison_prompt(&self, first: &Entity, second: &Entity) -> (String, Direction) {
            (
                format!(
                    "Which senator was more liberal: {} or {}?",
                    first.name, second.name
                ),
                Direction::Liberal,
            )
        }

        fn extraction_prompt(&self, first: &Entity, second: &Entity, _: Direction) -> String {
            format!(
                "Return only the name of the senator: {} or {}, or \"Tie\".",
                first.name, second.name
            )
        }
    }

    /// Always answers with whichever known name appears first in the last
    /// user turn, i.e. the first-presented entity.
    struct FirstNamedClient {
        names: Vec<String>,
    }

    #[async_trait]
    impl ModelClient for FirstNamedClient {
        async fn send(&self, turns: &[ChatTurn], _: &CallParams) -> Result<String, CallError> {
            let content = &turns.last().expect("non-empty payload").content;
            let first = self
                .names
                .iter()
                .filter_map(|name| content.find(name.as_str()).map(|pos| (pos, name)))
                .min_by_key(|(pos, _)| *pos)
                .map(|(_, name)| name.clone())
                .expect("prompt names a known entity");
            Ok(first)
        }
    }

    /// Valid comparison answers, garbage extraction answers.
    struct GarbageExtractionClient {
        inner: FirstNamedClient,
    }

    #[async_trait]
    impl ModelClient for GarbageExtractionClient {
        async fn send(&self, turns: &[ChatTurn], params: &CallParams) -> Result<String, CallError> {
            if turns.len() > 1 {
                Ok("Neither can be determined".to_string())
            } else {
                self.inner.send(turns, params).await
            }
        }
    }

    #[tokio::test]
    async fn test_end_to_end_first_presented_wins() {
        let entities = four_entities();
        let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();

        let mut config = SessionConfig::new("test-model");
        config.seed = 42;
        config.concurrency = 4;
        let session = Session::new(entities, config).unwrap();

        let client = Arc::new(FirstNamedClient { names });
        let verdicts = session.run(&TestPrompter, client, None).await.unwrap();

        assert_eq!(verdicts.len(), 6);
        for verdict in &verdicts {
            assert_eq!(verdict.outcome, Outcome::First);
            assert!(!verdict.extraction_error);
            assert_eq!(verdict.direction, Direction::Liberal);
            // The winner is the first-presented name, whatever the canonical order.
            let first = &verdict.matchup.presented.0;
            assert!(verdict.matchup.canonical.0 == *first || verdict.matchup.canonical.1 == *first);
        }
    }

    #[tokio::test]
    async fn test_unresolved_extraction_flags_and_continues() {
        let entities = four_entities();
        let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();

        let mut config = SessionConfig::new("test-model");
        config.concurrency = 4;
        config.extraction_retry_limit = 2;
        let session = Session::new(entities, config).unwrap();

        let client = Arc::new(GarbageExtractionClient {
            inner: FirstNamedClient { names },
        });
        let verdicts = session.run(&TestPrompter, client, None).await.unwrap();

        assert_eq!(verdicts.len(), 6);
        for verdict in &verdicts {
            assert_eq!(verdict.outcome, Outcome::Unresolved);
            assert!(verdict.extraction_error);
            assert_eq!(verdict.extraction_answer, "Neither can be determined");
        }
    }

    #[test]
    fn test_config_rejects_out_of_range_concurrency() {
        let mut config = SessionConfig::new("m");
        config.concurrency = 0;
        assert!(matches!(
            Session::new(four_entities(), config),
            Err(RunError::Config(_))
        ));

        let mut config = SessionConfig::new("m");
        config.concurrency = 201;
        assert!(matches!(
            Session::new(four_entities(), config),
            Err(RunError::Config(_))
        ));
    }

    #[test]
    fn test_config_rejects_duplicate_ids() {
        let mut entities = four_entities();
        entities.push(entity("B0001", "Shadow Clone", 100));
        assert!(matches!(
            Session::new(entities, SessionConfig::new("m")),
            Err(RunError::Config(_))
        ));
    }
}
