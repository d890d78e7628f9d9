//! Cascading selection: competition → season → analysis mode → leaf picks.
//!
//! `reduce` is a pure function of the previous state, the event and the
//! loaded tables. Setting any field resets every field downstream of it.

use std::collections::HashSet;

use thiserror::Error;

use crate::matches::{filter_matches, match_label};
use crate::model::{CompetitionSeasonRow, MatchRow};
use crate::physical::{PerformanceScope, PhysicalParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisMode {
    PlayerAspects,
    MatchAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visualization {
    Bar,
    Scatter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarPicks {
    pub team: Option<String>,
    pub metric: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScatterPicks {
    pub x_metric: Option<String>,
    pub y_metric: Option<String>,
    pub primary_team: Option<String>,
    pub secondary_team: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub competition_id: Option<u32>,
    pub season_id: Option<u32>,
    pub mode: Option<AnalysisMode>,
    pub visualization: Option<Visualization>,
    pub bar: BarPicks,
    pub scatter: ScatterPicks,
    pub match_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CompetitionUnset,
    CompetitionSet,
    SeasonSet,
    ModeSet,
    LeafOptionsSet,
    MatchSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    SetCompetition(u32),
    SetSeason(u32),
    SetMode(AnalysisMode),
    SetVisualization(Visualization),
    SetTeam(String),
    SetMetric(String),
    SetXMetric(String),
    SetYMetric(String),
    SetPrimaryTeam(String),
    SetSecondaryTeam(String),
    SetMatch(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("choose a {0} first")]
    MissingPrerequisite(&'static str),
    #[error("{0} not loaded")]
    DataUnavailable(&'static str),
    #[error("{0} is not an available option")]
    NotAnOption(String),
}

/// Tables the reducer may consult. `None` means not loaded (or failed).
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext<'a> {
    pub reference: Option<&'a [CompetitionSeasonRow]>,
    pub matches: Option<&'a [MatchRow]>,
    pub performance: Option<&'a PerformanceScope>,
}

/// Final query handed to a renderer once a leaf is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderRequest {
    Bar {
        team: String,
        metric: String,
    },
    Scatter {
        x_metric: String,
        y_metric: String,
        primary_team: String,
        secondary_team: String,
    },
    Match {
        match_id: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionItem<T> {
    pub value: T,
    pub label: String,
}

impl SelectionState {
    pub fn stage(&self) -> Stage {
        let (Some(_), Some(_)) = (self.competition_id, self.season_id) else {
            return if self.competition_id.is_some() {
                Stage::CompetitionSet
            } else {
                Stage::CompetitionUnset
            };
        };
        match self.mode {
            None => Stage::SeasonSet,
            Some(AnalysisMode::MatchAnalysis) if self.match_id.is_some() => Stage::MatchSet,
            Some(AnalysisMode::PlayerAspects) if self.render_request().is_some() => {
                Stage::LeafOptionsSet
            }
            Some(_) => Stage::ModeSet,
        }
    }

    pub fn season_key(&self) -> Option<(u32, u32)> {
        Some((self.competition_id?, self.season_id?))
    }

    /// Performance query for the current season, once player aspects is chosen.
    pub fn physical_params(&self) -> Option<PhysicalParams> {
        if self.mode != Some(AnalysisMode::PlayerAspects) {
            return None;
        }
        let (competition, season) = self.season_key()?;
        Some(PhysicalParams::for_season(competition, season))
    }

    pub fn render_request(&self) -> Option<RenderRequest> {
        self.season_key()?;
        match self.mode? {
            AnalysisMode::MatchAnalysis => Some(RenderRequest::Match {
                match_id: self.match_id?,
            }),
            AnalysisMode::PlayerAspects => match self.visualization? {
                Visualization::Bar => Some(RenderRequest::Bar {
                    team: self.bar.team.clone()?,
                    metric: self.bar.metric.clone()?,
                }),
                Visualization::Scatter => Some(RenderRequest::Scatter {
                    x_metric: self.scatter.x_metric.clone()?,
                    y_metric: self.scatter.y_metric.clone()?,
                    primary_team: self.scatter.primary_team.clone()?,
                    secondary_team: self.scatter.secondary_team.clone()?,
                }),
            },
        }
    }

    fn through_season(&self) -> Self {
        Self {
            competition_id: self.competition_id,
            season_id: self.season_id,
            ..Self::default()
        }
    }

    fn through_visualization(&self) -> Self {
        Self {
            mode: self.mode,
            visualization: self.visualization,
            ..self.through_season()
        }
    }
}

pub fn reduce(
    state: &SelectionState,
    event: SelectionEvent,
    ctx: &SelectionContext<'_>,
) -> Result<SelectionState, SelectionError> {
    match event {
        SelectionEvent::SetCompetition(id) => {
            let reference = ctx
                .reference
                .ok_or(SelectionError::DataUnavailable("competition editions"))?;
            if !competition_options(reference).iter().any(|o| o.value == id) {
                return Err(SelectionError::NotAnOption(format!("competition {id}")));
            }
            Ok(SelectionState {
                competition_id: Some(id),
                ..SelectionState::default()
            })
        }
        SelectionEvent::SetSeason(id) => {
            let competition_id = state
                .competition_id
                .ok_or(SelectionError::MissingPrerequisite("competition"))?;
            let reference = ctx
                .reference
                .ok_or(SelectionError::DataUnavailable("competition editions"))?;
            if !season_options(reference, competition_id)
                .iter()
                .any(|o| o.value == id)
            {
                return Err(SelectionError::NotAnOption(format!("season {id}")));
            }
            Ok(SelectionState {
                competition_id: Some(competition_id),
                season_id: Some(id),
                ..SelectionState::default()
            })
        }
        SelectionEvent::SetMode(mode) => {
            state
                .season_key()
                .ok_or(SelectionError::MissingPrerequisite("season"))?;
            if mode == AnalysisMode::MatchAnalysis && ctx.matches.is_none() {
                return Err(SelectionError::DataUnavailable("matches"));
            }
            Ok(SelectionState {
                mode: Some(mode),
                ..state.through_season()
            })
        }
        SelectionEvent::SetVisualization(visualization) => {
            if state.mode != Some(AnalysisMode::PlayerAspects) || state.season_key().is_none() {
                return Err(SelectionError::MissingPrerequisite("player aspects analysis"));
            }
            current_scope(state, ctx)?;
            Ok(SelectionState {
                visualization: Some(visualization),
                ..state.through_visualization()
            })
        }
        SelectionEvent::SetTeam(team) => {
            let scope = leaf_scope(state, ctx, Visualization::Bar)?;
            let mut next = state.clone();
            next.bar.team = Some(require_team(scope, team)?);
            Ok(next)
        }
        SelectionEvent::SetMetric(metric) => {
            let scope = leaf_scope(state, ctx, Visualization::Bar)?;
            let mut next = state.clone();
            next.bar.metric = Some(require_metric(scope, metric)?);
            Ok(next)
        }
        SelectionEvent::SetXMetric(metric) => {
            let scope = leaf_scope(state, ctx, Visualization::Scatter)?;
            let mut next = state.clone();
            next.scatter.x_metric = Some(require_metric(scope, metric)?);
            Ok(next)
        }
        SelectionEvent::SetYMetric(metric) => {
            let scope = leaf_scope(state, ctx, Visualization::Scatter)?;
            let mut next = state.clone();
            next.scatter.y_metric = Some(require_metric(scope, metric)?);
            Ok(next)
        }
        SelectionEvent::SetPrimaryTeam(team) => {
            let scope = leaf_scope(state, ctx, Visualization::Scatter)?;
            let mut next = state.clone();
            next.scatter.primary_team = Some(require_team(scope, team)?);
            Ok(next)
        }
        SelectionEvent::SetSecondaryTeam(team) => {
            let scope = leaf_scope(state, ctx, Visualization::Scatter)?;
            let mut next = state.clone();
            next.scatter.secondary_team = Some(require_team(scope, team)?);
            Ok(next)
        }
        SelectionEvent::SetMatch(match_id) => {
            if state.mode != Some(AnalysisMode::MatchAnalysis) {
                return Err(SelectionError::MissingPrerequisite("match analysis"));
            }
            let (competition_id, season_id) = state
                .season_key()
                .ok_or(SelectionError::MissingPrerequisite("season"))?;
            let matches = ctx.matches.ok_or(SelectionError::DataUnavailable("matches"))?;
            if !filter_matches(matches, competition_id, season_id)
                .iter()
                .any(|m| m.id == match_id)
            {
                return Err(SelectionError::NotAnOption(format!("match {match_id}")));
            }
            Ok(SelectionState {
                match_id: Some(match_id),
                ..state.through_visualization()
            })
        }
    }
}

fn current_scope<'a>(
    state: &SelectionState,
    ctx: &SelectionContext<'a>,
) -> Result<&'a PerformanceScope, SelectionError> {
    let (competition_id, season_id) = state
        .season_key()
        .ok_or(SelectionError::MissingPrerequisite("season"))?;
    ctx.performance
        .filter(|scope| scope.matches(competition_id, season_id))
        .ok_or(SelectionError::DataUnavailable("physical data"))
}

fn leaf_scope<'a>(
    state: &SelectionState,
    ctx: &SelectionContext<'a>,
    visualization: Visualization,
) -> Result<&'a PerformanceScope, SelectionError> {
    if state.visualization != Some(visualization) {
        return Err(SelectionError::MissingPrerequisite(match visualization {
            Visualization::Bar => "bar plot",
            Visualization::Scatter => "scatter plot",
        }));
    }
    current_scope(state, ctx)
}

fn require_team(scope: &PerformanceScope, team: String) -> Result<String, SelectionError> {
    if scope.table.rows.iter().any(|row| row.team_name == team) {
        Ok(team)
    } else {
        Err(SelectionError::NotAnOption(team))
    }
}

fn require_metric(scope: &PerformanceScope, metric: String) -> Result<String, SelectionError> {
    if scope.metrics.contains(&metric) {
        Ok(metric)
    } else {
        Err(SelectionError::NotAnOption(metric))
    }
}

/// Distinct competitions in first-appearance order.
pub fn competition_options(reference: &[CompetitionSeasonRow]) -> Vec<OptionItem<u32>> {
    let mut seen = HashSet::new();
    reference
        .iter()
        .filter(|row| seen.insert(row.competition_id))
        .map(|row| OptionItem {
            value: row.competition_id,
            label: format!("{} ({})", row.competition_name, row.competition_id),
        })
        .collect()
}

/// Distinct (season_id, season_name) pairs of one competition.
pub fn season_options(
    reference: &[CompetitionSeasonRow],
    competition_id: u32,
) -> Vec<OptionItem<u32>> {
    let mut seen = HashSet::new();
    reference
        .iter()
        .filter(|row| row.competition_id == competition_id)
        .filter(|row| seen.insert(row.season_id))
        .map(|row| OptionItem {
            value: row.season_id,
            label: format!("{} ({})", row.season_name, row.season_id),
        })
        .collect()
}

pub fn match_options(
    matches: &[MatchRow],
    competition_id: u32,
    season_id: u32,
) -> Vec<OptionItem<u64>> {
    filter_matches(matches, competition_id, season_id)
        .into_iter()
        .map(|row| OptionItem {
            value: row.id,
            label: match_label(row),
        })
        .collect()
}

pub fn team_options(scope: &PerformanceScope) -> Vec<String> {
    scope.table.team_names()
}

pub fn metric_options(scope: &PerformanceScope) -> Vec<String> {
    scope.metrics.clone()
}
