use std::collections::{BTreeMap, HashSet};

use reqwest::Url;
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::FetchError;

pub const GROUP_BY: &str = "player,team,competition,season,group";
pub const POSSESSION: &str = "all,tip,otip";
pub const MIN_PLAYING_TIME: u32 = 60;
pub const MIN_MATCH_COUNT: u32 = 8;
pub const DATA_VERSION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalParams {
    pub competition: u32,
    pub season: u32,
    pub group_by: String,
    pub possession: String,
    pub playing_time_gte: u32,
    pub count_match_gte: u32,
    pub data_version: u32,
}

impl PhysicalParams {
    pub fn for_season(competition: u32, season: u32) -> Self {
        Self {
            competition,
            season,
            group_by: GROUP_BY.to_string(),
            possession: POSSESSION.to_string(),
            playing_time_gte: MIN_PLAYING_TIME,
            count_match_gte: MIN_MATCH_COUNT,
            data_version: DATA_VERSION,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("competition", self.competition.to_string()),
            ("season", self.season.to_string()),
            ("group_by", self.group_by.clone()),
            ("possession", self.possession.clone()),
            ("playing_time__gte", self.playing_time_gte.to_string()),
            ("count_match__gte", self.count_match_gte.to_string()),
            ("data_version", self.data_version.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalRow {
    pub player_id: Option<u64>,
    pub player_short_name: String,
    pub team_name: String,
    pub position_group: String,
    pub plot_label: String,
    /// Numeric columns, including derived metrics.
    pub values: BTreeMap<String, f64>,
    /// Remaining text columns.
    pub text: BTreeMap<String, String>,
}

impl PhysicalRow {
    pub fn from_record(record: &Value, index: usize) -> Result<Self, FetchError> {
        let Some(obj) = record.as_object() else {
            return Err(FetchError::MalformedRecord {
                index,
                field: "record".to_string(),
            });
        };
        let text_field = |key: &str| -> Result<String, FetchError> {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| FetchError::MalformedRecord {
                    index,
                    field: key.to_string(),
                })
        };

        let player_short_name = text_field("player_short_name")?;
        let team_name = text_field("team_name")?;
        let position_group = obj
            .get("position_group")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut values = BTreeMap::new();
        let mut text = BTreeMap::new();
        for (key, value) in obj {
            match value {
                Value::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        values.insert(key.clone(), v);
                    }
                }
                Value::String(s) => {
                    text.insert(key.clone(), s.clone());
                }
                _ => {}
            }
        }

        Ok(Self {
            player_id: obj.get("player_id").and_then(Value::as_u64),
            plot_label: format!("{player_short_name} | {position_group}"),
            player_short_name,
            team_name,
            position_group,
            values,
            text,
        })
    }

    pub fn value(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().filter(|v| v.is_finite())
    }

    /// Column lookup used by chart id/label parameters.
    pub fn field(&self, column: &str) -> Option<String> {
        match column {
            "player_id" => self.player_id.map(|id| id.to_string()),
            "player_short_name" => Some(self.player_short_name.clone()),
            "team_name" => Some(self.team_name.clone()),
            "position_group" => Some(self.position_group.clone()),
            "plot_label" => Some(self.plot_label.clone()),
            other => self
                .text
                .get(other)
                .cloned()
                .or_else(|| self.values.get(other).map(|v| v.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalTable {
    pub rows: Vec<PhysicalRow>,
}

impl PhysicalTable {
    pub fn from_records(records: &[Value]) -> Result<Self, FetchError> {
        let rows = records
            .iter()
            .enumerate()
            .map(|(index, record)| PhysicalRow::from_record(record, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct team names in first-appearance order.
    pub fn team_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|row| seen.insert(row.team_name.as_str()))
            .map(|row| row.team_name.clone())
            .collect()
    }

    pub fn for_team(&self, team: &str) -> Vec<&PhysicalRow> {
        self.rows.iter().filter(|row| row.team_name == team).collect()
    }
}

/// Supplies season-level physical data for a competition.
pub trait PerformanceSource {
    fn get_physical(&self, params: &PhysicalParams) -> Result<PhysicalTable, FetchError>;
}

impl PerformanceSource for ApiClient {
    fn get_physical(&self, params: &PhysicalParams) -> Result<PhysicalTable, FetchError> {
        let url = physical_url(self, params)?;
        let records = self.fetch_all(url.as_str())?;
        PhysicalTable::from_records(&records)
    }
}

pub fn physical_url(api: &ApiClient, params: &PhysicalParams) -> Result<Url, FetchError> {
    let endpoint = api.endpoint("physical/");
    Url::parse_with_params(&endpoint, params.query_pairs()).map_err(|err| FetchError::InvalidUrl {
        url: endpoint,
        reason: err.to_string(),
    })
}

/// Physical table scoped to one (competition, season), with its metric list.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceScope {
    pub competition_id: u32,
    pub season_id: u32,
    pub table: PhysicalTable,
    pub metrics: Vec<String>,
}

impl PerformanceScope {
    pub fn matches(&self, competition_id: u32, season_id: u32) -> bool {
        self.competition_id == competition_id && self.season_id == season_id
    }
}
