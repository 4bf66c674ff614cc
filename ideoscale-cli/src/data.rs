/// Entity loading: voteview-style member CSVs (local file or fetched from
/// voteview.com) and plain JSON entity arrays.
use ideoscale_core::Entity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("member data is missing required column \"{0}\"")]
    MissingColumn(String),

    #[error("member row {row}: bad {column} value \"{value}\"")]
    BadField {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("failed to parse entity JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to fetch member data: {0}")]
    Fetch(String),

    #[error("no usable member rows found")]
    Empty,
}

pub fn members_url(chamber: &str, congress: u32) -> String {
    format!("https://voteview.com/static/data/out/members/{chamber}{congress}_members.csv")
}

/// Download a member CSV from voteview.com. `chamber` is the voteview code:
/// "S", "H", or "HS" for both chambers.
pub async fn fetch_members(chamber: &str, congress: u32) -> Result<String, DataError> {
    let url = members_url(chamber, congress);
    tracing::info!(%url, "fetching member data");

    let response = reqwest::get(&url)
        .await
        .map_err(|e| DataError::Fetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(DataError::Fetch(format!("{url} returned {}", response.status())));
    }
    response.text().await.map_err(|e| DataError::Fetch(e.to_string()))
}

/// Parse entities from text, auto-detecting JSON arrays vs CSV.
pub fn load_entities(content: &str) -> Result<Vec<Entity>, DataError> {
    let trimmed = content.trim();
    let entities = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Entity>>(trimmed)?
    } else {
        entities_from_csv(trimmed)?
    };

    if entities.is_empty() {
        return Err(DataError::Empty);
    }
    Ok(entities)
}

/// Build entities from a voteview member CSV.
///
/// Uses `bioguide_id`, `bioname`, `chamber`, `congress`, `party_code`, and
/// `state_abbrev`; a non-empty `bioname_canonical` column overrides
/// `bioname`. Rows for the President are dropped; voteview exports include
/// them but they are not legislators.
fn entities_from_csv(content: &str) -> Result<Vec<Entity>, DataError> {
    let records = parse_csv(content);
    let Some((header, rows)) = records.split_first() else {
        return Err(DataError::Empty);
    };

    let col = |name: &str| -> Result<usize, DataError> {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    };

    let id_col = col("bioguide_id")?;
    let name_col = col("bioname")?;
    let chamber_col = col("chamber")?;
    let congress_col = col("congress")?;
    let party_col = col("party_code")?;
    let state_col = col("state_abbrev")?;
    let canonical_col = header.iter().position(|h| h == "bioname_canonical");

    let mut entities = Vec::new();
    for (row_number, row) in rows.iter().enumerate() {
        // Blank trailing lines parse as a single empty field.
        if row.len() <= 1 && row.iter().all(|f| f.is_empty()) {
            continue;
        }

        let field = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

        if field(chamber_col) == "President" {
            continue;
        }

        let name = match canonical_col.map(field) {
            Some(canonical) if !canonical.is_empty() => canonical,
            _ => field(name_col),
        };

        let congress = parse_number(field(congress_col)).ok_or_else(|| DataError::BadField {
            row: row_number + 2,
            column: "congress",
            value: field(congress_col).to_string(),
        })? as u32;

        let party_code = parse_number(field(party_col)).ok_or_else(|| DataError::BadField {
            row: row_number + 2,
            column: "party_code",
            value: field(party_col).to_string(),
        })? as u16;

        entities.push(Entity {
            id: field(id_col).to_string(),
            name: name.to_string(),
            chamber: field(chamber_col).to_string(),
            congress,
            party_code,
            state: field(state_col).to_string(),
        });
    }

    Ok(entities)
}

/// Voteview numeric columns occasionally arrive float-formatted ("200.0").
fn parse_number(value: &str) -> Option<u64> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }
    value.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64)
}

/// Minimal RFC-4180-style reader: quoted fields, doubled quotes, commas and
/// newlines inside quotes. Voteview bionames contain commas, so naive
/// line-splitting is not an option.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}
