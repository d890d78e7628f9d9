use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompetitionSeasonRow {
    pub competition_id: u32,
    pub competition_name: String,
    pub season_id: u32,
    pub season_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub short_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Required match fields; everything else the API sends is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: u64,
    pub competition_id: u32,
    pub season_id: u32,
    pub date_time: String,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of a cursor-paginated collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub results: Vec<Value>,
    #[serde(default)]
    pub next: Option<String>,
}

impl Page {
    pub fn next_url(&self) -> Option<&str> {
        self.next
            .as_deref()
            .map(str::trim)
            .filter(|next| !next.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFormat {
    Tabular,
    Structured,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Table(Table),
    Json(Value),
}
