use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::FetchError;
use crate::model::MatchRow;

/// Validates accumulated match records against the `MatchRow` schema.
pub fn parse_match_rows(raw: Vec<Value>) -> Result<Vec<MatchRow>, FetchError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, item)| {
            let field = missing_match_field(&item);
            serde_json::from_value::<MatchRow>(item).map_err(|_| FetchError::MalformedRecord {
                index,
                field: field.unwrap_or("match").to_string(),
            })
        })
        .collect()
}

fn missing_match_field(item: &Value) -> Option<&'static str> {
    const FIELDS: [&str; 6] = [
        "id",
        "competition_id",
        "season_id",
        "date_time",
        "home_team",
        "away_team",
    ];
    for field in FIELDS {
        if item.get(field).is_none_or(Value::is_null) {
            return Some(field);
        }
    }
    for side in ["home_team", "away_team"] {
        if item
            .get(side)
            .and_then(|team| team.get("short_name"))
            .and_then(Value::as_str)
            .is_none()
        {
            return Some(if side == "home_team" {
                "home_team.short_name"
            } else {
                "away_team.short_name"
            });
        }
    }
    None
}

pub fn filter_matches(rows: &[MatchRow], competition_id: u32, season_id: u32) -> Vec<&MatchRow> {
    rows.iter()
        .filter(|m| m.competition_id == competition_id && m.season_id == season_id)
        .collect()
}

pub fn match_label(row: &MatchRow) -> String {
    format!(
        "{} - {} vs {}",
        format_kickoff(&row.date_time),
        row.home_team.short_name,
        row.away_team.short_name
    )
}

pub fn format_kickoff(raw: &str) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return "TBD".to_string();
    }
    match parse_kickoff(cleaned) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => cleaned.replace('T', " "),
    }
}

pub fn parse_kickoff(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
