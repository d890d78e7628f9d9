use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use crate::chart::{BarChartData, ScatterData, plot_bar, plot_scatter};
use crate::config::EventsFormat;
use crate::matches::{filter_matches, match_label};
use crate::metrics::{metric_label, metric_unit};
use crate::model::{CompetitionSeasonRow, MatchRow, Resource};
use crate::physical::{PerformanceScope, PhysicalParams, PhysicalRow};
use crate::selection::{
    AnalysisMode, OptionItem, RenderRequest, SelectionContext, SelectionEvent, SelectionState,
    Visualization, competition_options, match_options, metric_options, reduce, season_options,
    team_options,
};
use crate::table::Table;

const MAX_LOGS: usize = 200;

#[derive(Debug)]
pub enum LoadState<T> {
    Idle,
    Loading,
    Loaded(Arc<T>),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<Arc<T>> {
        match self {
            LoadState::Loaded(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            LoadState::Failed(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    fn from_result(result: Result<Arc<T>, String>) -> Self {
        match result {
            Ok(value) => LoadState::Loaded(value),
            Err(msg) => LoadState::Failed(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Competition,
    Season,
    Mode,
    Visualization,
    Team,
    Metric,
    XMetric,
    YMetric,
    PrimaryTeam,
    SecondaryTeam,
    Match,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedTable {
    pub path: String,
    pub table: Table,
}

#[derive(Debug)]
pub struct EventsState {
    pub match_id: u64,
    pub resource: LoadState<Resource>,
}

#[derive(Debug)]
pub enum ChartView {
    Bar(BarChartData),
    Scatter(ScatterData),
}

#[derive(Debug)]
pub enum EventsDisplay<'a> {
    Uploaded(&'a UploadedTable),
    Fetched(&'a Resource),
    Loading,
    Failed(&'a str),
    Empty,
}

#[derive(Debug)]
pub enum Delta {
    ReferenceLoaded(Result<Arc<Vec<CompetitionSeasonRow>>, String>),
    MatchesLoaded(Result<Arc<Vec<MatchRow>>, String>),
    PerformanceLoaded {
        competition_id: u32,
        season_id: u32,
        result: Result<Arc<PerformanceScope>, String>,
    },
    EventsLoaded {
        match_id: u64,
        result: Result<Arc<Resource>, String>,
    },
    UploadLoaded {
        path: String,
        result: Result<Table, String>,
    },
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    LoadReference,
    LoadMatches,
    FetchPerformance(PhysicalParams),
    FetchDynamicEvents { match_id: u64, format: EventsFormat },
    LoadUpload { path: PathBuf },
    ClearCache,
}

#[derive(Debug)]
pub struct AppState {
    pub selection: SelectionState,
    pub reference: LoadState<Vec<CompetitionSeasonRow>>,
    pub matches: LoadState<Vec<MatchRow>>,
    pub performance: LoadState<PerformanceScope>,
    pub performance_pending: Option<(u32, u32)>,
    pub events: Option<EventsState>,
    pub upload: Option<UploadedTable>,
    pub upload_error: Option<String>,
    pub upload_input: Option<String>,
    pub events_format: EventsFormat,
    pub focus: Field,
    pub cursor: usize,
    pub table_scroll: usize,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EventsFormat::Csv)
    }
}

impl AppState {
    pub fn new(events_format: EventsFormat) -> Self {
        Self {
            selection: SelectionState::default(),
            reference: LoadState::Idle,
            matches: LoadState::Idle,
            performance: LoadState::Idle,
            performance_pending: None,
            events: None,
            upload: None,
            upload_error: None,
            upload_input: None,
            events_format,
            focus: Field::Competition,
            cursor: 0,
            table_scroll: 0,
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    /// Commands that (re)load the reference tables.
    pub fn initial_commands(&mut self) -> Vec<ProviderCommand> {
        self.reference = LoadState::Loading;
        self.matches = LoadState::Loading;
        vec![ProviderCommand::LoadReference, ProviderCommand::LoadMatches]
    }

    /// Drops every cached table and the selection built on top of it.
    pub fn reload(&mut self) -> Vec<ProviderCommand> {
        self.selection = SelectionState::default();
        self.performance = LoadState::Idle;
        self.performance_pending = None;
        self.events = None;
        self.focus = Field::Competition;
        self.cursor = 0;
        self.table_scroll = 0;
        self.push_log("[INFO] Reloading reference data");
        let mut cmds = vec![ProviderCommand::ClearCache];
        cmds.extend(self.initial_commands());
        cmds
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn context(&self) -> SelectionContext<'_> {
        SelectionContext {
            reference: self.reference.loaded().map(Vec::as_slice),
            matches: self.matches.loaded().map(Vec::as_slice),
            performance: self.performance_scope(),
        }
    }

    /// Physical data for the selected season, if it has arrived.
    pub fn performance_scope(&self) -> Option<&PerformanceScope> {
        let (competition_id, season_id) = self.selection.season_key()?;
        self.performance
            .loaded()
            .filter(|scope| scope.matches(competition_id, season_id))
    }

    pub fn visible_fields(&self) -> Vec<Field> {
        let sel = &self.selection;
        let mut fields = vec![Field::Competition];
        if sel.competition_id.is_none() {
            return fields;
        }
        fields.push(Field::Season);
        if sel.season_id.is_none() {
            return fields;
        }
        fields.push(Field::Mode);
        match sel.mode {
            Some(AnalysisMode::PlayerAspects) => {
                fields.push(Field::Visualization);
                match sel.visualization {
                    Some(Visualization::Bar) => fields.extend([Field::Team, Field::Metric]),
                    Some(Visualization::Scatter) => fields.extend([
                        Field::XMetric,
                        Field::YMetric,
                        Field::PrimaryTeam,
                        Field::SecondaryTeam,
                    ]),
                    None => {}
                }
            }
            Some(AnalysisMode::MatchAnalysis) => fields.push(Field::Match),
            None => {}
        }
        fields
    }

    /// Options for a field, or the message explaining why there are none.
    pub fn options(&self, field: Field) -> Result<Vec<OptionItem<SelectionEvent>>, String> {
        let sel = &self.selection;
        match field {
            Field::Competition => {
                let reference = require_loaded(&self.reference, "competitions")?;
                Ok(map_options(competition_options(reference), SelectionEvent::SetCompetition))
            }
            Field::Season => {
                let reference = require_loaded(&self.reference, "competitions")?;
                let Some(competition_id) = sel.competition_id else {
                    return Ok(Vec::new());
                };
                Ok(map_options(
                    season_options(reference, competition_id),
                    SelectionEvent::SetSeason,
                ))
            }
            Field::Mode => Ok(vec![
                OptionItem {
                    value: SelectionEvent::SetMode(AnalysisMode::PlayerAspects),
                    label: mode_label(AnalysisMode::PlayerAspects).to_string(),
                },
                OptionItem {
                    value: SelectionEvent::SetMode(AnalysisMode::MatchAnalysis),
                    label: mode_label(AnalysisMode::MatchAnalysis).to_string(),
                },
            ]),
            Field::Visualization => {
                self.require_scope()?;
                Ok(vec![
                    OptionItem {
                        value: SelectionEvent::SetVisualization(Visualization::Bar),
                        label: visualization_label(Visualization::Bar).to_string(),
                    },
                    OptionItem {
                        value: SelectionEvent::SetVisualization(Visualization::Scatter),
                        label: visualization_label(Visualization::Scatter).to_string(),
                    },
                ])
            }
            Field::Team | Field::PrimaryTeam | Field::SecondaryTeam => {
                let scope = self.require_scope()?;
                let make: fn(String) -> SelectionEvent = match field {
                    Field::Team => SelectionEvent::SetTeam,
                    Field::PrimaryTeam => SelectionEvent::SetPrimaryTeam,
                    _ => SelectionEvent::SetSecondaryTeam,
                };
                Ok(string_options(team_options(scope), make))
            }
            Field::Metric | Field::XMetric | Field::YMetric => {
                let scope = self.require_scope()?;
                let make: fn(String) -> SelectionEvent = match field {
                    Field::Metric => SelectionEvent::SetMetric,
                    Field::XMetric => SelectionEvent::SetXMetric,
                    _ => SelectionEvent::SetYMetric,
                };
                Ok(string_options(metric_options(scope), make))
            }
            Field::Match => {
                let matches = require_loaded(&self.matches, "matches")?;
                let Some((competition_id, season_id)) = sel.season_key() else {
                    return Ok(Vec::new());
                };
                Ok(map_options(
                    match_options(matches, competition_id, season_id),
                    SelectionEvent::SetMatch,
                ))
            }
        }
    }

    fn require_scope(&self) -> Result<&PerformanceScope, String> {
        if let Some(scope) = self.performance_scope() {
            return Ok(scope);
        }
        match &self.performance {
            LoadState::Failed(msg) => Err(format!("Data load failed: {msg}")),
            _ => Err("Loading physical data...".to_string()),
        }
    }

    pub fn selected_label(&self, field: Field) -> Option<String> {
        let sel = &self.selection;
        match field {
            Field::Competition => {
                let id = sel.competition_id?;
                let reference = self.reference.loaded()?;
                competition_options(reference)
                    .into_iter()
                    .find(|o| o.value == id)
                    .map(|o| o.label)
            }
            Field::Season => {
                let (competition_id, season_id) = sel.season_key()?;
                let reference = self.reference.loaded()?;
                season_options(reference, competition_id)
                    .into_iter()
                    .find(|o| o.value == season_id)
                    .map(|o| o.label)
            }
            Field::Mode => sel.mode.map(|m| mode_label(m).to_string()),
            Field::Visualization => sel.visualization.map(|v| visualization_label(v).to_string()),
            Field::Team => sel.bar.team.clone(),
            Field::Metric => sel.bar.metric.clone(),
            Field::XMetric => sel.scatter.x_metric.clone(),
            Field::YMetric => sel.scatter.y_metric.clone(),
            Field::PrimaryTeam => sel.scatter.primary_team.clone(),
            Field::SecondaryTeam => sel.scatter.secondary_team.clone(),
            Field::Match => {
                let id = sel.match_id?;
                let matches = self.matches.loaded()?;
                matches.iter().find(|m| m.id == id).map(match_label)
            }
        }
    }

    pub fn focus_next(&mut self) {
        let fields = self.visible_fields();
        let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.set_focus(fields[(idx + 1) % fields.len()]);
    }

    pub fn focus_prev(&mut self) {
        let fields = self.visible_fields();
        let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.set_focus(fields[(idx + fields.len() - 1) % fields.len()]);
    }

    fn set_focus(&mut self, field: Field) {
        self.focus = field;
        let current = self.selected_label(field);
        self.cursor = self
            .options(field)
            .ok()
            .and_then(|opts| opts.iter().position(|o| Some(&o.label) == current.as_ref()))
            .unwrap_or(0);
    }

    pub fn cursor_next(&mut self) {
        let len = self.options(self.focus).map(|o| o.len()).unwrap_or(0);
        if len > 0 {
            self.cursor = (self.cursor + 1).min(len - 1);
        }
    }

    pub fn cursor_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Applies the option under the cursor; returns a follow-up fetch if the
    /// new selection needs data that isn't loaded.
    pub fn choose(&mut self) -> Option<ProviderCommand> {
        let options = match self.options(self.focus) {
            Ok(options) => options,
            Err(msg) => {
                self.push_log(format!("[WARN] {msg}"));
                return None;
            }
        };
        let item = options.get(self.cursor)?.clone();
        self.apply_event(item.value)
    }

    pub fn apply_event(&mut self, event: SelectionEvent) -> Option<ProviderCommand> {
        let next = match reduce(&self.selection, event, &self.context()) {
            Ok(next) => next,
            Err(err) => {
                self.push_log(format!("[WARN] {err}"));
                return None;
            }
        };
        let prev = std::mem::replace(&mut self.selection, next);

        if prev.match_id != self.selection.match_id {
            self.events = None;
            self.table_scroll = 0;
        }

        let fields = self.visible_fields();
        if let Some(pos) = fields.iter().position(|f| *f == self.focus)
            && pos + 1 < fields.len()
        {
            self.set_focus(fields[pos + 1]);
        } else if !fields.contains(&self.focus) {
            self.set_focus(Field::Competition);
        }

        self.performance_request()
    }

    fn performance_request(&mut self) -> Option<ProviderCommand> {
        let params = self.selection.physical_params()?;
        let key = (params.competition, params.season);
        if self.performance_scope().is_some() || self.performance_pending == Some(key) {
            return None;
        }
        self.performance = LoadState::Loading;
        self.performance_pending = Some(key);
        self.push_log(format!(
            "[INFO] Fetching physical data for competition {} season {}",
            params.competition, params.season
        ));
        Some(ProviderCommand::FetchPerformance(params))
    }

    pub fn request_dynamic_events(&mut self) -> Option<ProviderCommand> {
        let Some(match_id) = self.selection.match_id else {
            self.push_log("[INFO] No match selected for dynamic events");
            return None;
        };
        if let Some(events) = &self.events
            && events.match_id == match_id
            && events.resource.is_loading()
        {
            return None;
        }
        self.events = Some(EventsState {
            match_id,
            resource: LoadState::Loading,
        });
        self.push_log(format!("[INFO] Fetching dynamic events for match {match_id}"));
        Some(ProviderCommand::FetchDynamicEvents {
            match_id,
            format: self.events_format,
        })
    }

    pub fn start_upload_input(&mut self) {
        self.upload_input = Some(String::new());
    }

    pub fn cancel_upload_input(&mut self) {
        self.upload_input = None;
    }

    pub fn submit_upload_input(&mut self) -> Option<ProviderCommand> {
        let raw = self.upload_input.take()?;
        let path = raw.trim();
        if path.is_empty() {
            return None;
        }
        self.push_log(format!("[INFO] Loading upload {path}"));
        Some(ProviderCommand::LoadUpload {
            path: PathBuf::from(path),
        })
    }

    pub fn clear_upload(&mut self) {
        self.upload = None;
        self.upload_error = None;
        self.table_scroll = 0;
    }

    pub fn filtered_matches(&self) -> Vec<&MatchRow> {
        let (Some((competition_id, season_id)), Some(matches)) =
            (self.selection.season_key(), self.matches.loaded())
        else {
            return Vec::new();
        };
        filter_matches(matches, competition_id, season_id)
    }

    /// Upload first, then fetched events for the selected match.
    pub fn events_display(&self) -> EventsDisplay<'_> {
        if let Some(upload) = &self.upload {
            return EventsDisplay::Uploaded(upload);
        }
        let Some(events) = &self.events else {
            return EventsDisplay::Empty;
        };
        match &events.resource {
            LoadState::Loaded(resource) => EventsDisplay::Fetched(resource),
            LoadState::Loading => EventsDisplay::Loading,
            LoadState::Failed(msg) => EventsDisplay::Failed(msg),
            LoadState::Idle => EventsDisplay::Empty,
        }
    }

    pub fn chart_view(&self) -> Option<ChartView> {
        let scope = self.performance_scope()?;
        match self.selection.render_request()? {
            RenderRequest::Bar { team, metric } => {
                let rows = scope.table.for_team(&team);
                Some(ChartView::Bar(plot_bar(
                    &rows,
                    &metric,
                    &format!("{} Metric", metric_label(&metric)),
                    metric_unit(&metric),
                    true,
                    "player_id",
                    "plot_label",
                )))
            }
            RenderRequest::Scatter {
                x_metric,
                y_metric,
                primary_team,
                secondary_team,
            } => {
                let rows: Vec<&PhysicalRow> = scope.table.rows.iter().collect();
                Some(ChartView::Scatter(plot_scatter(
                    &rows,
                    &x_metric,
                    &y_metric,
                    "team_name",
                    "player_short_name",
                    &[primary_team],
                    &[secondary_team],
                )))
            }
            RenderRequest::Match { .. } => None,
        }
    }

    pub fn scroll_down(&mut self) {
        self.table_scroll = self.table_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.table_scroll = self.table_scroll.saturating_sub(1);
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::ReferenceLoaded(result) => {
            match &result {
                Ok(rows) => state.push_log(format!("[INFO] Loaded {} competition editions", rows.len())),
                Err(err) => state.push_log(format!("[WARN] Competition editions failed: {err}")),
            }
            state.reference = LoadState::from_result(result);
        }
        Delta::MatchesLoaded(result) => {
            match &result {
                Ok(rows) => state.push_log(format!("[INFO] Loaded {} matches", rows.len())),
                Err(err) => state.push_log(format!("[WARN] Matches failed: {err}")),
            }
            state.matches = LoadState::from_result(result);
        }
        Delta::PerformanceLoaded {
            competition_id,
            season_id,
            result,
        } => {
            if state.performance_pending == Some((competition_id, season_id)) {
                state.performance_pending = None;
            }
            let wanted = state
                .selection
                .physical_params()
                .is_some_and(|p| p.competition == competition_id && p.season == season_id);
            if !wanted {
                state.push_log(format!(
                    "[INFO] Dropped physical data for {competition_id}/{season_id} (selection changed)"
                ));
                if state.performance.is_loading() && state.performance_pending.is_none() {
                    state.performance = LoadState::Idle;
                }
                return;
            }
            match &result {
                Ok(scope) => state.push_log(format!(
                    "[INFO] Loaded {} physical rows, {} metrics",
                    scope.table.len(),
                    scope.metrics.len()
                )),
                Err(err) => state.push_log(format!("[WARN] Physical data failed: {err}")),
            }
            state.performance = LoadState::from_result(result);
        }
        Delta::EventsLoaded { match_id, result } => {
            if state.selection.match_id != Some(match_id) {
                state.push_log(format!(
                    "[INFO] Dropped dynamic events for match {match_id} (selection changed)"
                ));
                return;
            }
            if let Err(err) = &result {
                state.push_log(format!("[WARN] Dynamic events failed: {err}"));
            }
            state.table_scroll = 0;
            state.events = Some(EventsState {
                match_id,
                resource: LoadState::from_result(result),
            });
        }
        Delta::UploadLoaded { path, result } => match result {
            Ok(table) => {
                state.push_log(format!("[INFO] Uploaded {} rows from {path}", table.len()));
                state.upload = Some(UploadedTable { path, table });
                state.upload_error = None;
                state.table_scroll = 0;
            }
            Err(err) => {
                state.push_log(format!("[WARN] Upload failed: {err}"));
                state.upload_error = Some(err);
            }
        },
        Delta::Log(msg) => state.push_log(msg),
    }
}

fn require_loaded<'a, T>(state: &'a LoadState<T>, what: &str) -> Result<&'a T, String> {
    match state {
        LoadState::Loaded(value) => Ok(value.as_ref()),
        LoadState::Failed(msg) => Err(format!("Data load failed: {msg}")),
        LoadState::Loading | LoadState::Idle => Err(format!("Loading {what}...")),
    }
}

fn map_options<T>(
    items: Vec<OptionItem<T>>,
    make: fn(T) -> SelectionEvent,
) -> Vec<OptionItem<SelectionEvent>> {
    items
        .into_iter()
        .map(|o| OptionItem {
            value: make(o.value),
            label: o.label,
        })
        .collect()
}

fn string_options(
    values: Vec<String>,
    make: fn(String) -> SelectionEvent,
) -> Vec<OptionItem<SelectionEvent>> {
    values
        .into_iter()
        .map(|v| OptionItem {
            label: v.clone(),
            value: make(v),
        })
        .collect()
}

pub fn field_label(field: Field) -> &'static str {
    match field {
        Field::Competition => "Competition",
        Field::Season => "Season",
        Field::Mode => "Analysis",
        Field::Visualization => "Visualization",
        Field::Team => "Team",
        Field::Metric => "Metric",
        Field::XMetric => "X-Axis Metric",
        Field::YMetric => "Y-Axis Metric",
        Field::PrimaryTeam => "Primary Highlight Team",
        Field::SecondaryTeam => "Secondary Highlight Team",
        Field::Match => "Match",
    }
}

pub fn mode_label(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::PlayerAspects => "Visualise Player Aspects",
        AnalysisMode::MatchAnalysis => "Analyse Match",
    }
}

pub fn visualization_label(visualization: Visualization) -> &'static str {
    match visualization {
        Visualization::Bar => "Bar Plot",
        Visualization::Scatter => "Scatter Plot",
    }
}
