use std::collections::HashSet;

use serde_json::Value;

use crate::error::FetchError;
use crate::model::CompetitionSeasonRow;

/// Decodes a competition-editions response body into its raw `results`.
pub fn parse_competition_editions(raw: &str, url: &str) -> Result<Vec<Value>, FetchError> {
    let root: Value = serde_json::from_str(raw.trim()).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })?;
    let Some(results) = root.get("results").and_then(Value::as_array) else {
        return Err(FetchError::EmptyResultSet {
            url: url.to_string(),
        });
    };
    require_results(results.clone(), url)
}

/// An account with no competition editions has nothing to select from.
pub fn require_results(results: Vec<Value>, url: &str) -> Result<Vec<Value>, FetchError> {
    if results.is_empty() {
        return Err(FetchError::EmptyResultSet {
            url: url.to_string(),
        });
    }
    Ok(results)
}

/// Flattens competition-edition records. Fails on the first malformed record;
/// a repeated (competition, season) pair keeps its first occurrence.
pub fn normalize(raw: &[Value]) -> Result<Vec<CompetitionSeasonRow>, FetchError> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(raw.len());

    for (index, item) in raw.iter().enumerate() {
        let competition_id = id_at(item, index, &["competition", "id"])?;
        let competition_name = string_at(item, index, &["competition", "name"])?;
        let season_id = id_at(item, index, &["season", "id"])?;
        let start_year = year_at(item, index, &["season", "start_year"])?;
        let end_year = year_at(item, index, &["season", "end_year"])?;

        if !seen.insert((competition_id, season_id)) {
            continue;
        }
        rows.push(CompetitionSeasonRow {
            competition_id,
            competition_name,
            season_id,
            season_name: format!("{start_year}/{end_year}"),
        });
    }

    Ok(rows)
}

fn lookup<'a>(item: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(item, |node, key| node.get(*key))
        .filter(|v| !v.is_null())
}

fn malformed(index: usize, path: &[&str]) -> FetchError {
    FetchError::MalformedRecord {
        index,
        field: path.join("."),
    }
}

fn id_at(item: &Value, index: usize, path: &[&str]) -> Result<u32, FetchError> {
    lookup(item, path)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| malformed(index, path))
}

fn string_at(item: &Value, index: usize, path: &[&str]) -> Result<String, FetchError> {
    lookup(item, path)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| malformed(index, path))
}

// Years arrive as numbers, occasionally as strings.
fn year_at(item: &Value, index: usize, path: &[&str]) -> Result<String, FetchError> {
    match lookup(item, path) {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(malformed(index, path)),
    }
}
