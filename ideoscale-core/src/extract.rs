/// Verdict extraction: answer normalization, validation against the two
/// entity names, and the bounded retry state machine for invalid answers.
use crate::types::{ChatTurn, Outcome};

/// Strip one trailing period, preserving generational name suffixes.
/// The exact-match validation downstream needs "John Smith Jr." intact.
pub fn strip_trailing_period(answer: &str) -> &str {
    if answer.ends_with("Jr.") || answer.ends_with("Sr.") {
        answer
    } else {
        answer.strip_suffix('.').unwrap_or(answer)
    }
}

/// Strip a leading role title. Models often repeat "Senator " or
/// "Representative " before a name, which breaks exact-string matching.
pub fn strip_role_prefix(answer: &str) -> &str {
    answer
        .strip_prefix("Senator ")
        .or_else(|| answer.strip_prefix("Representative "))
        .unwrap_or(answer)
}

/// Normalization applied to a comparison answer before it is embedded into
/// the extraction conversation: period first, then prefix.
pub fn normalize_comparison_answer(answer: &str) -> &str {
    strip_role_prefix(strip_trailing_period(answer))
}

/// Classify an extraction answer against the presentation-order names.
/// `None` means the answer is invalid and a retry is warranted.
pub fn classify_answer(answer: &str, first_name: &str, second_name: &str) -> Option<Outcome> {
    if answer == first_name {
        Some(Outcome::First)
    } else if answer == second_name {
        Some(Outcome::Second)
    } else if answer == "Tie" {
        Some(Outcome::Tie)
    } else {
        None
    }
}

/// Assemble the extraction conversation: the comparison exchange replayed,
/// then the extraction question.
pub fn build_extraction_turns(
    comparison_prompt: &str,
    normalized_answer: &str,
    extraction_prompt: &str,
) -> Vec<ChatTurn> {
    vec![
        ChatTurn::user(comparison_prompt),
        ChatTurn::assistant(normalized_answer),
        ChatTurn::user(extraction_prompt),
    ]
}

/// Per-matchup extraction lifecycle.
///
/// `Retrying(k)` means retry number k is about to be issued. The retry
/// budget is explicit here so the loop driving it stays trivial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Pending,
    Retrying(u32),
    Validated,
    Failed,
}

impl ExtractionState {
    /// Fold one observed answer into the state.
    pub fn observe(self, valid: bool, retry_limit: u32) -> ExtractionState {
        match (self, valid) {
            (ExtractionState::Pending, true) | (ExtractionState::Retrying(_), true) => {
                ExtractionState::Validated
            }
            (ExtractionState::Pending, false) => {
                if retry_limit == 0 {
                    ExtractionState::Failed
                } else {
                    ExtractionState::Retrying(1)
                }
            }
            (ExtractionState::Retrying(k), false) => {
                if k >= retry_limit {
                    ExtractionState::Failed
                } else {
                    ExtractionState::Retrying(k + 1)
                }
            }
            // Terminal states never observe further answers.
            (state @ ExtractionState::Validated, _) | (state @ ExtractionState::Failed, _) => state,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExtractionState::Validated | ExtractionState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_trailing_period() {
        assert_eq!(strip_trailing_period("Jane Doe."), "Jane Doe");
        assert_eq!(strip_trailing_period("Jane Doe"), "Jane Doe");
        assert_eq!(strip_trailing_period("John Smith Jr."), "John Smith Jr.");
        assert_eq!(strip_trailing_period("John Smith Sr."), "John Smith Sr.");
    }

    #[test]
    fn test_strip_role_prefix() {
        assert_eq!(strip_role_prefix("Senator Jane Doe"), "Jane Doe");
        assert_eq!(strip_role_prefix("Representative John Smith"), "John Smith");
        assert_eq!(strip_role_prefix("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn test_normalize_comparison_answer() {
        assert_eq!(normalize_comparison_answer("Senator Jane Doe."), "Jane Doe");
        assert_eq!(
            normalize_comparison_answer("Representative John Smith Jr."),
            "John Smith Jr."
        );
    }

    #[test]
    fn test_classify_answer() {
        assert_eq!(classify_answer("Jane Doe", "Jane Doe", "John Smith"), Some(Outcome::First));
        assert_eq!(classify_answer("John Smith", "Jane Doe", "John Smith"), Some(Outcome::Second));
        assert_eq!(classify_answer("Tie", "Jane Doe", "John Smith"), Some(Outcome::Tie));
        assert_eq!(classify_answer("Neither of them", "Jane Doe", "John Smith"), None);
        // Validation is exact-match; normalization happens upstream.
        assert_eq!(classify_answer("Senator Jane Doe", "Jane Doe", "John Smith"), None);
    }

    #[test]
    fn test_extraction_turns_shape() {
        let turns = build_extraction_turns("who is more liberal?", "Jane Doe", "return the name");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "Jane Doe");
    }

    #[test]
    fn test_state_machine_validates_immediately() {
        let state = ExtractionState::Pending.observe(true, 5);
        assert_eq!(state, ExtractionState::Validated);
    }

    #[test]
    fn test_state_machine_retries_then_validates() {
        let mut state = ExtractionState::Pending;
        state = state.observe(false, 5);
        assert_eq!(state, ExtractionState::Retrying(1));
        state = state.observe(false, 5);
        assert_eq!(state, ExtractionState::Retrying(2));
        state = state.observe(true, 5);
        assert_eq!(state, ExtractionState::Validated);
    }

    #[test]
    fn test_state_machine_exhausts_budget() {
        let mut state = ExtractionState::Pending;
        for _ in 0..6 {
            state = state.observe(false, 5);
        }
        assert_eq!(state, ExtractionState::Failed);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_state_machine_zero_budget_fails_at_once() {
        let state = ExtractionState::Pending.observe(false, 0);
        assert_eq!(state, ExtractionState::Failed);
    }
}
