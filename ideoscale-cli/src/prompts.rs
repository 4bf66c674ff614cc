/// Prompt templates and placeholder rendering.
///
/// Templates use `{name0}`-style placeholders, filled from the two entities
/// in presentation order. Congress numbers render with an English ordinal
/// suffix ("116th", "101st") because the default prompts read as prose.
use ideoscale_core::{Direction, Entity, Party, Prompter};

pub const DEFAULT_LIBERAL_COMPARISON: &str =
    "During the {congress_number0} U.S. Congress, which {politician_type} was more liberal: \
     {name0} or {name1}?";

pub const DEFAULT_CONSERVATIVE_COMPARISON: &str =
    "During the {congress_number0} U.S. Congress, which {politician_type} was more conservative: \
     {name0} or {name1}?";

pub const DEFAULT_LIBERAL_EXTRACTION: &str =
    "According to your answer, who is described to be the more liberal, more progressive, or \
     less conservative {politician_type}: {name0} or {name1}? Return only the name of the \
     {politician_type}, and nothing else. If one {politician_type} is described as more \
     conservative, return the other {politician_type}'s name. If one {politician_type} is \
     described as more moderate, return the other {politician_type}'s name. If neither \
     {politician_type} is described to be more liberal, more progressive, less conservative, \
     more conservative, or more moderate, reply with \"Tie\".";

pub const DEFAULT_CONSERVATIVE_EXTRACTION: &str =
    "According to your answer, who is described to be the more conservative or less liberal \
     {politician_type}: {name0} or {name1}? Return only the name of the {politician_type}, \
     and nothing else. If one {politician_type} is described as more liberal, return the \
     other {politician_type}'s name. If one {politician_type} is described as more moderate, \
     return the other {politician_type}'s name. If neither {politician_type} is described to \
     be more conservative, less liberal, more liberal, or more moderate, reply with \"Tie\".";

/// English ordinal suffix: 1st, 2nd, 3rd, 4th, ... 11th, 12th, 13th, 21st.
pub fn ordinal_suffix(number: u32) -> &'static str {
    if (11..=13).contains(&(number % 100)) {
        return "th";
    }
    match number % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Default noun for the entities being compared, from the chamber selection.
pub fn politician_type_for_chamber(chamber: Option<&str>) -> &'static str {
    match chamber {
        Some("S") => "senator",
        Some("H") => "representative",
        _ => "politician",
    }
}

fn render(template: &str, first: &Entity, second: &Entity, politician_type: &str) -> String {
    template
        .replace("{name0}", &first.name)
        .replace("{name1}", &second.name)
        .replace(
            "{congress_number0}",
            &format!("{}{}", first.congress, ordinal_suffix(first.congress)),
        )
        .replace(
            "{congress_number1}",
            &format!("{}{}", second.congress, ordinal_suffix(second.congress)),
        )
        .replace("{chamber0}", &first.chamber)
        .replace("{chamber1}", &second.chamber)
        .replace("{state0}", &first.state)
        .replace("{state1}", &second.state)
        .replace("{politician_type}", politician_type)
}

/// A comparison template and its matching extraction template. They travel
/// together: an answer produced by one can only be validated through the
/// other.
#[derive(Debug, Clone)]
pub struct PromptPair {
    pub comparison: String,
    pub extraction: String,
}

/// Caller-supplied template overrides; `None` falls back to the defaults.
#[derive(Debug, Clone, Default)]
pub struct TemplateOverrides {
    pub comparison: Option<String>,
    pub extraction: Option<String>,
    pub conservative_comparison: Option<String>,
    pub conservative_extraction: Option<String>,
}

/// The resolved template set for a run.
///
/// Unidirectional runs carry one pair used for every matchup. Bidirectional
/// runs add a conservative-direction pair, used when both entities are
/// Republicans: some models refuse to say which of two conservatives is
/// "more liberal", so those matchups get asked the other way around.
pub struct TemplateSet {
    liberal: PromptPair,
    conservative: Option<PromptPair>,
    politician_type: String,
}

impl TemplateSet {
    pub fn resolve(
        overrides: TemplateOverrides,
        bidirectional: bool,
        politician_type: String,
    ) -> Result<TemplateSet, String> {
        // A comparison template without its extraction counterpart is
        // rejected before any remote call is made.
        if overrides.comparison.is_some() && overrides.extraction.is_none() {
            return Err(
                "a comparison prompt was supplied without its extraction prompt".to_string(),
            );
        }
        if overrides.conservative_comparison.is_some() && overrides.conservative_extraction.is_none()
        {
            return Err("a conservative-direction prompt was supplied without its extraction prompt"
                .to_string());
        }
        if !bidirectional
            && (overrides.conservative_comparison.is_some()
                || overrides.conservative_extraction.is_some())
        {
            return Err(
                "conservative-direction prompts only apply to bidirectional runs".to_string(),
            );
        }

        let liberal = PromptPair {
            comparison: overrides
                .comparison
                .unwrap_or_else(|| DEFAULT_LIBERAL_COMPARISON.to_string()),
            extraction: overrides
                .extraction
                .unwrap_or_else(|| DEFAULT_LIBERAL_EXTRACTION.to_string()),
        };

        let conservative = bidirectional.then(|| PromptPair {
            comparison: overrides
                .conservative_comparison
                .unwrap_or_else(|| DEFAULT_CONSERVATIVE_COMPARISON.to_string()),
            extraction: overrides
                .conservative_extraction
                .unwrap_or_else(|| DEFAULT_CONSERVATIVE_EXTRACTION.to_string()),
        });

        Ok(TemplateSet {
            liberal,
            conservative,
            politician_type,
        })
    }

    fn pair_for(&self, direction: Direction) -> &PromptPair {
        match (direction, &self.conservative) {
            (Direction::Conservative, Some(pair)) => pair,
            _ => &self.liberal,
        }
    }
}

impl Prompter for TemplateSet {
    fn comparison_prompt(&self, first: &Entity, second: &Entity) -> (String, Direction) {
        let direction = match &self.conservative {
            Some(_) if first.party() == Party::R && second.party() == Party::R => {
                Direction::Conservative
            }
            _ => Direction::Liberal,
        };
        let text = render(
            &self.pair_for(direction).comparison,
            first,
            second,
            &self.politician_type,
        );
        (text, direction)
    }

    fn extraction_prompt(&self, first: &Entity, second: &Entity, direction: Direction) -> String {
        render(
            &self.pair_for(direction).extraction,
            first,
            second,
            &self.politician_type,
        )
    }
}
