/// Default random seed for sampling draws and presentation-order shuffles.
/// A fixed well-known value so two runs with the same entity set produce the
/// same tournament unless the caller asks otherwise.
pub const DEFAULT_SEED: u64 = 42;

/// Default number of comparison requests allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 125;

/// Upper bound on the concurrency limit. Provider rate limits make anything
/// beyond this counterproductive.
pub const MAX_CONCURRENCY: usize = 200;

/// Default total attempts per remote call before the batch is aborted.
pub const DEFAULT_MAX_TRIES: u32 = 3;

/// Default backoff base in seconds. Attempt n sleeps `base * n` seconds.
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Default number of single-item extraction retries before a matchup is
/// flagged as unresolved.
pub const DEFAULT_EXTRACTION_RETRIES: u32 = 5;

/// Per-entity budget multiplier for rejected sampling draws.
///
/// When sampling partners for an entity, a draw is rejected if the canonical
/// pair was already produced anywhere in the run. With a healthy pool the
/// rejection run is short, but a small pool with a high per-entity quota can
/// make the quota unreachable. The draw loop therefore gives each entity at
/// most `SAMPLE_DRAW_FACTOR * pool_size` draws before giving up with an
/// error instead of spinning forever.
pub const SAMPLE_DRAW_FACTOR: usize = 64;
