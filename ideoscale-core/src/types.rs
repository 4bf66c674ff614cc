/// Core data model: entities, matchups, chat payloads, verdicts.
use serde::{Deserialize, Serialize};

/// Party affiliation, collapsed from voteview numeric party codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    D,
    R,
    I,
}

impl Party {
    /// Voteview convention: 100 = Democrat, 200 = Republican, everything else
    /// is treated as independent/other.
    pub fn from_code(code: u16) -> Party {
        match code {
            100 => Party::D,
            200 => Party::R,
            _ => Party::I,
        }
    }
}

/// One legislator, loaded once per run and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier (bioguide-style).
    pub id: String,
    /// Display name used verbatim in prompts and answer validation.
    pub name: String,
    pub chamber: String,
    /// Congress / session number.
    pub congress: u32,
    pub party_code: u16,
    /// State or region abbreviation.
    pub state: String,
}

impl Entity {
    pub fn party(&self) -> Party {
        Party::from_code(self.party_code)
    }
}

/// One pairwise comparison instance between two entities.
///
/// Carries both orderings of the pair: `presented` is the randomized
/// left/right order used to build prompt text, `canonical` is the sorted
/// order used as a stable identity for dedup and for joining results back
/// to rows. `presented` is always a permutation of `canonical`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub presented: (String, String),
    pub canonical: (String, String),
}

impl Matchup {
    /// Build a matchup from a drawn pair, flipping presentation order when
    /// `swap` is set. Canonical order is derived by sorting the ids.
    pub fn new(a: &str, b: &str, swap: bool) -> Matchup {
        let presented = if swap {
            (b.to_string(), a.to_string())
        } else {
            (a.to_string(), b.to_string())
        };
        let canonical = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        Matchup { presented, canonical }
    }
}

/// Conversation roles understood by chat-completion style endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One ordered conversation turn in a request payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> ChatTurn {
        ChatTurn { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> ChatTurn {
        ChatTurn { role: Role::Assistant, content: content.into() }
    }
}

/// Sampling parameters for one remote call.
#[derive(Debug, Clone)]
pub struct CallParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
}

/// Which way a comparison prompt points on the ideological scale.
///
/// Unidirectional runs always record `Liberal`. Bidirectional runs use the
/// conservative-direction prompt pair for Republican-vs-Republican matchups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Liberal,
    Conservative,
}

/// The validated outcome of one matchup.
///
/// `First`/`Second` refer to presentation order, since that is the order the
/// model saw and answered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    First,
    Second,
    Tie,
    /// The extraction answer never validated within the retry budget.
    /// Flagged for manual review.
    Unresolved,
}

/// Result of one matchup: prompt, answers, outcome, and error flag.
///
/// Never mutated after creation, except for the bounded in-place retry
/// substitution of an invalid extraction answer during the run itself.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub matchup: Matchup,
    pub direction: Direction,
    /// The comparison prompt the model was asked.
    pub prompt: String,
    /// The comparison answer after normalization (trailing period and role
    /// prefix stripped).
    pub comparison_answer: String,
    /// The last extraction answer seen, validated or not.
    pub extraction_answer: String,
    pub outcome: Outcome,
    /// True when the extraction answer never validated after retries.
    pub extraction_error: bool,
}
