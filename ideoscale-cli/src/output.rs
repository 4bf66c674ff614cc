/// Result-table assembly and export.
///
/// Rows are keyed on canonical matchup order so repeated pairs (possible
/// under sampling) join on a stable identity, and the win/loss polarity
/// convention is applied here, not in the core.
use ideoscale_core::{Direction, Entity, Outcome, Party, Verdict};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};

/// One matchup's final row, attributes in canonical order.
#[derive(Debug, Clone, Serialize)]
pub struct MatchupRow {
    pub name0: String,
    pub name1: String,
    pub id0: String,
    pub id1: String,
    pub chamber0: String,
    pub chamber1: String,
    pub congress0: u32,
    pub congress1: u32,
    pub party_code0: u16,
    pub party_code1: u16,
    pub party0: String,
    pub party1: String,
    pub state0: String,
    pub state1: String,
    pub prompt: String,
    pub response: String,
    pub extracted_answer: String,
    pub direction: String,
    pub extraction_error: u8,
    pub win0: f64,
    pub win1: f64,
}

fn party_label(party: Party) -> &'static str {
    match party {
        Party::D => "D",
        Party::R => "R",
        Party::I => "I",
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Liberal => "liberal",
        Direction::Conservative => "conservative",
    }
}

/// Score assigned to the entity the model preferred.
///
/// Unidimensional scales are rotation-invariant, so the convention is a
/// choice: by default the more-liberal entity scores 0.0 (liberals sort
/// left); `scale_increasing` flips that. Conservative-direction matchups
/// invert because there the preferred entity is the more conservative one.
fn preferred_score(direction: Direction, scale_increasing: bool) -> f64 {
    match (direction, scale_increasing) {
        (Direction::Liberal, false) => 0.0,
        (Direction::Liberal, true) => 1.0,
        (Direction::Conservative, false) => 1.0,
        (Direction::Conservative, true) => 0.0,
    }
}

/// Build final rows from verdicts. `entities` must cover every id that
/// appears in the verdicts.
pub fn assemble_rows(
    entities: &[Entity],
    verdicts: &[Verdict],
    scale_increasing: bool,
) -> Vec<MatchupRow> {
    let by_id: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();

    fn entity_for<'a>(by_id: &HashMap<&str, &'a Entity>, id: &str) -> &'a Entity {
        by_id
            .get(id)
            .copied()
            .unwrap_or_else(|| panic!("verdict references unknown entity id: {id}"))
    }

    verdicts
        .iter()
        .map(|verdict| {
            let e0 = entity_for(&by_id, &verdict.matchup.canonical.0);
            let e1 = entity_for(&by_id, &verdict.matchup.canonical.1);

            let winner_id = match verdict.outcome {
                Outcome::First => Some(verdict.matchup.presented.0.as_str()),
                Outcome::Second => Some(verdict.matchup.presented.1.as_str()),
                Outcome::Tie | Outcome::Unresolved => None,
            };

            let (win0, win1) = match (verdict.outcome, winner_id) {
                (Outcome::Tie, _) => (0.5, 0.5),
                // Flagged for manual review; scores carry no information.
                (Outcome::Unresolved, _) => (0.0, 0.0),
                (_, Some(winner)) => {
                    let preferred = preferred_score(verdict.direction, scale_increasing);
                    if winner == e0.id {
                        (preferred, 1.0 - preferred)
                    } else {
                        (1.0 - preferred, preferred)
                    }
                }
                (_, None) => (0.0, 0.0),
            };

            MatchupRow {
                name0: e0.name.clone(),
                name1: e1.name.clone(),
                id0: e0.id.clone(),
                id1: e1.id.clone(),
                chamber0: e0.chamber.clone(),
                chamber1: e1.chamber.clone(),
                congress0: e0.congress,
                congress1: e1.congress,
                party_code0: e0.party_code,
                party_code1: e1.party_code,
                party0: party_label(e0.party()).to_string(),
                party1: party_label(e1.party()).to_string(),
                state0: e0.state.clone(),
                state1: e1.state.clone(),
                prompt: verdict.prompt.clone(),
                response: verdict.comparison_answer.clone(),
                extracted_answer: verdict.extraction_answer.clone(),
                direction: direction_label(verdict.direction).to_string(),
                extraction_error: u8::from(verdict.extraction_error),
                win0,
                win1,
            }
        })
        .collect()
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

const CSV_HEADER: &str = "name0,name1,id0,id1,chamber0,chamber1,congress0,congress1,\
     party_code0,party_code1,party0,party1,state0,state1,prompt,response,\
     extracted_answer,direction,extraction_error,win0,win1";

/// Write rows as CSV.
pub fn write_csv(rows: &[MatchupRow], writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for row in rows {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_escape(&row.name0),
            csv_escape(&row.name1),
            csv_escape(&row.id0),
            csv_escape(&row.id1),
            csv_escape(&row.chamber0),
            csv_escape(&row.chamber1),
            row.congress0,
            row.congress1,
            row.party_code0,
            row.party_code1,
            row.party0,
            row.party1,
            csv_escape(&row.state0),
            csv_escape(&row.state1),
            csv_escape(&row.prompt),
            csv_escape(&row.response),
            csv_escape(&row.extracted_answer),
            row.direction,
            row.extraction_error,
            row.win0,
            row.win1,
        )?;
    }
    Ok(())
}

/// Print rows as pretty JSON.
pub fn print_json(rows: &[MatchupRow]) {
    println!(
        "{}",
        serde_json::to_string_pretty(rows).expect("rows serialize without error")
    );
}

/// Print the run summary: totals and how many rows need manual review.
pub fn print_summary(rows: &[MatchupRow]) {
    let unresolved = rows.iter().filter(|r| r.extraction_error != 0).count();
    println!("{} matchups completed", rows.len());
    if unresolved == 0 {
        println!("No extraction errors found");
    } else {
        println!("{unresolved} matchups need manual review (extraction_error = 1)");
    }
}
