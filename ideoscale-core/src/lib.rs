/// ideoscale-core: pairwise ideology comparison engine.
///
/// Tournament generation → concurrent comparison batch → verdict extraction.
/// No HTTP, no filesystem. The remote model call is an injected trait and
/// prompt-template rendering is injected through [`Prompter`].
///
/// # Quick start
///
/// ```no_run
/// use std::sync::Arc;
/// use ideoscale_core::{ModelClient, Prompter, Session, SessionConfig};
///
/// # async fn example(
/// #     entities: Vec<ideoscale_core::Entity>,
/// #     prompter: impl Prompter,
/// #     client: Arc<dyn ModelClient>,
/// # ) -> Result<(), ideoscale_core::RunError> {
/// let mut config = SessionConfig::new("gpt-4.1-mini");
/// config.sample_per_entity = Some(10);
///
/// let session = Session::new(entities, config)?;
/// let verdicts = session.run(&prompter, client, None).await?;
///
/// for v in &verdicts {
///     println!("{:?} vs {:?}: {:?}", v.matchup.canonical.0, v.matchup.canonical.1, v.outcome);
/// }
/// # Ok(())
/// # }
/// ```

pub mod constants;
pub mod executor;
pub mod extract;
pub mod session;
pub mod tournament;
pub mod types;

// Re-export primary public API at crate root.
pub use executor::{
    execute_batch, BatchError, BatchOptions, CallError, ModelClient, ProgressFn,
};
pub use extract::{
    build_extraction_turns, classify_answer, normalize_comparison_answer, ExtractionState,
};
pub use session::{Prompter, RunError, Session, SessionConfig};
pub use tournament::{generate_matchups, TournamentError};
pub use types::{
    CallParams, ChatTurn, Direction, Entity, Matchup, Outcome, Party, Role, Verdict,
};
