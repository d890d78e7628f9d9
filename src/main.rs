use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
    Paragraph, Row, Table as TableWidget, Wrap,
};

use sc_explorer::api::ApiClient;
use sc_explorer::chart::{BarChartData, Highlight, ScatterData};
use sc_explorer::config::ApiConfig;
use sc_explorer::http_client::http_client;
use sc_explorer::model::Resource;
use sc_explorer::provider::{spawn_provider, Provider};
use sc_explorer::selection::{AnalysisMode, Visualization};
use sc_explorer::state::{
    apply_delta, field_label, AppState, ChartView, Delta, EventsDisplay, Field, ProviderCommand,
};
use sc_explorer::table::Table;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: mpsc::Sender<ProviderCommand>,
}

impl App {
    fn new(state: AppState, cmd_tx: mpsc::Sender<ProviderCommand>) -> Self {
        Self {
            state,
            should_quit: false,
            cmd_tx,
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider unavailable");
        }
    }

    fn send_all(&mut self, cmds: Vec<ProviderCommand>) {
        for cmd in cmds {
            self.send(cmd);
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.upload_input.is_some() {
            self.on_input_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.state.focus_next(),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.state.focus_prev(),
            KeyCode::Char('j') | KeyCode::Down => self.state.cursor_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.cursor_prev(),
            KeyCode::PageDown | KeyCode::Char('J') => self.state.scroll_down(),
            KeyCode::PageUp | KeyCode::Char('K') => self.state.scroll_up(),
            KeyCode::Enter => {
                if let Some(cmd) = self.state.choose() {
                    self.send(cmd);
                }
            }
            KeyCode::Char('f') => {
                if let Some(cmd) = self.state.request_dynamic_events() {
                    self.send(cmd);
                }
            }
            KeyCode::Char('u') => self.state.start_upload_input(),
            KeyCode::Char('c') => self.state.clear_upload(),
            KeyCode::Char('r') => {
                let cmds = self.state.reload();
                self.send_all(cmds);
            }
            _ => {}
        }
    }

    fn on_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.state.cancel_upload_input(),
            KeyCode::Enter => {
                if let Some(cmd) = self.state.submit_upload_input() {
                    self.send(cmd);
                }
            }
            KeyCode::Backspace => {
                if let Some(input) = self.state.upload_input.as_mut() {
                    input.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.state.upload_input.as_mut() {
                    input.push(c);
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = ApiConfig::from_env()?;
    let client = http_client(config.timeout)?.clone();
    let api = ApiClient::with_client(config, client);

    let mut state = AppState::new(api.config().events_format);
    state.push_log(format!("[INFO] API {}", api.config().base_url));

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(Provider::new(api), tx, cmd_rx);

    let mut app = App::new(state, cmd_tx);
    let initial = app.state.initial_commands();
    app.send_all(initial);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = &app.state;
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(header_text(state))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(40), Constraint::Min(30)])
        .split(chunks[1]);

    render_sidebar(frame, body[0], state);
    render_main(frame, body[1], state);

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if state.upload_input.is_some() {
        render_upload_prompt(frame, area, state);
    }
    if state.help_overlay {
        render_help_overlay(frame, area);
    }
}

fn header_text(state: &AppState) -> String {
    let mut parts = vec!["SKILLCORNER EXPLORER".to_string()];
    for field in [Field::Competition, Field::Season, Field::Mode] {
        if let Some(label) = state.selected_label(field) {
            parts.push(label);
        }
    }
    parts.join(" | ")
}

fn footer_text(state: &AppState) -> String {
    if state.upload_input.is_some() {
        return "Enter Load | Esc Cancel".to_string();
    }
    match state.selection.mode {
        Some(AnalysisMode::MatchAnalysis) => {
            "Tab/h/l Field | j/k Move | Enter Select | f Fetch events | u Upload | c Clear upload | J/K Scroll | r Reload | ? Help | q Quit".to_string()
        }
        _ => "Tab/h/l Field | j/k Move | Enter Select | r Reload | ? Help | q Quit".to_string(),
    }
}

fn render_sidebar(frame: &mut Frame, area: Rect, state: &AppState) {
    let fields = state.visible_fields();
    let summary_height = (fields.len() as u16) * 2 + 2;
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(summary_height), Constraint::Min(3)])
        .split(area);

    let mut lines = Vec::new();
    for field in &fields {
        let focused = *field == state.focus;
        let title_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        lines.push(Line::from(Span::styled(field_label(*field), title_style)));
        let value = state
            .selected_label(*field)
            .unwrap_or_else(|| "<unset>".to_string());
        lines.push(Line::from(format!("  {value}")));
    }
    let summary = Paragraph::new(lines)
        .block(Block::default().title("Selection").borders(Borders::ALL));
    frame.render_widget(summary, sections[0]);

    let block = Block::default()
        .title(format!("Choose {}", field_label(state.focus)))
        .borders(Borders::ALL);
    let inner = block.inner(sections[1]);
    frame.render_widget(block, sections[1]);

    let options = match state.options(state.focus) {
        Ok(options) => options,
        Err(msg) => {
            let style = if msg.starts_with("Data load failed") {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            frame.render_widget(Paragraph::new(msg).style(style).wrap(Wrap { trim: true }), inner);
            return;
        }
    };
    if options.is_empty() {
        let empty = Paragraph::new("No options").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let visible = inner.height as usize;
    let (start, end) = visible_range(state.cursor, options.len(), visible);
    let lines: Vec<Line> = options[start..end]
        .iter()
        .enumerate()
        .map(|(i, option)| {
            if start + i == state.cursor {
                Line::from(Span::styled(
                    format!("> {}", option.label),
                    Style::default().fg(Color::White).bg(Color::DarkGray),
                ))
            } else {
                Line::from(format!("  {}", option.label))
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_main(frame: &mut Frame, area: Rect, state: &AppState) {
    if let Some(msg) = state.reference.failure() {
        let failed = Paragraph::new(format!("Data Load Failed\n\n{msg}"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(failed, area);
        return;
    }

    match state.selection.mode {
        Some(AnalysisMode::PlayerAspects) => render_player_aspects(frame, area, state),
        Some(AnalysisMode::MatchAnalysis) => render_match_analysis(frame, area, state),
        None => {
            let hint = if state.reference.is_loading() {
                "Loading competitions..."
            } else {
                "Choose a competition, season and analysis type"
            };
            let paragraph = Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_player_aspects(frame: &mut Frame, area: Rect, state: &AppState) {
    match state.chart_view() {
        Some(ChartView::Bar(data)) => render_bar_chart(frame, area, state, &data),
        Some(ChartView::Scatter(data)) => render_scatter(frame, area, &data),
        None => {
            let msg = if let Some(err) = state.performance.failure() {
                format!("Data load failed: {err}")
            } else if state.performance_scope().is_none() {
                "Loading physical data...".to_string()
            } else {
                match state.selection.visualization {
                    Some(Visualization::Bar) => "Choose a team and a metric".to_string(),
                    Some(Visualization::Scatter) => {
                        "Choose both axis metrics and two highlight teams".to_string()
                    }
                    None => "Choose a visualization".to_string(),
                }
            };
            let paragraph = Paragraph::new(msg)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_bar_chart(frame: &mut Frame, area: Rect, state: &AppState, data: &BarChartData) {
    let team = state.selection.bar.team.clone().unwrap_or_default();
    let title = if data.unit.is_empty() {
        format!("Bar Plot: {} for {team}", data.label)
    } else {
        format!("Bar Plot: {} ({}) for {team}", data.label, data.unit)
    };
    let block = Block::default().title(title).borders(Borders::ALL);

    if data.bars.is_empty() {
        let empty = Paragraph::new("No players with this metric").block(block);
        frame.render_widget(empty, area);
        return;
    }

    const SCALE: f64 = 100.0;
    let bars: Vec<Bar> = data
        .bars
        .iter()
        .map(|datum| {
            let text = if data.show_values {
                format!("{:.2}", datum.value)
            } else {
                String::new()
            };
            Bar::default()
                .value((datum.value.max(0.0) * SCALE).round() as u64)
                .label(Line::from(datum.label.clone()))
                .text_value(text)
                .style(Style::default().fg(Color::Cyan))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .max((data.max_value() * SCALE).ceil().max(1.0) as u64);
    frame.render_widget(chart, area);
}

fn render_scatter(frame: &mut Frame, area: Rect, data: &ScatterData) {
    let others = data.coords(Highlight::None);
    let primary = data.coords(Highlight::Primary);
    let secondary = data.coords(Highlight::Secondary);
    let x_mean = [(data.x_mean, data.y_bounds[0]), (data.x_mean, data.y_bounds[1])];
    let y_mean = [(data.x_bounds[0], data.y_mean), (data.x_bounds[1], data.y_mean)];

    let datasets = vec![
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&x_mean),
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&y_mean),
        Dataset::default()
            .name("Other")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::DarkGray))
            .data(&others),
        Dataset::default()
            .name("Secondary")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Yellow))
            .data(&secondary),
        Dataset::default()
            .name("Primary")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Red))
            .data(&primary),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(format!("Scatter Plot: {} vs {}", data.x_metric, data.y_metric))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title(data.x_metric.clone())
                .bounds(data.x_bounds)
                .labels(axis_labels(data.x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(data.y_metric.clone())
                .bounds(data.y_bounds)
                .labels(axis_labels(data.y_bounds)),
        );
    frame.render_widget(chart, area);
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    vec![
        Span::raw(format!("{:.1}", bounds[0])),
        Span::raw(format!("{mid:.1}")),
        Span::raw(format!("{:.1}", bounds[1])),
    ]
}

fn render_match_analysis(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    render_match_table(frame, sections[0], state);
    render_events(frame, sections[1], state);
}

fn render_match_table(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Analyse Match").borders(Borders::ALL);
    if let Some(err) = state.matches.failure() {
        let failed = Paragraph::new(format!("Data load failed: {err}"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(failed, area);
        return;
    }

    let matches = state.filtered_matches();
    if matches.is_empty() {
        let empty = Paragraph::new("No matches for this season")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = matches
        .iter()
        .map(|m| {
            let style = if state.selection.match_id == Some(m.id) {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(m.id.to_string()),
                Cell::from(sc_explorer::matches::format_kickoff(&m.date_time)),
                Cell::from(m.home_team.short_name.clone()),
                Cell::from(m.away_team.short_name.clone()),
            ])
            .style(style)
        })
        .collect();

    let table = TableWidget::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(17),
            Constraint::Min(10),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["ID", "Kickoff", "Home", "Away"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(block);
    frame.render_widget(table, area);
}

fn render_events(frame: &mut Frame, area: Rect, state: &AppState) {
    match state.events_display() {
        EventsDisplay::Uploaded(upload) => render_data_table(
            frame,
            area,
            &format!("Uploaded Dynamic Events Data ({})", upload.path),
            &upload.table,
            state.table_scroll,
        ),
        EventsDisplay::Fetched(Resource::Table(table)) => render_data_table(
            frame,
            area,
            "Dynamic Events Data",
            table,
            state.table_scroll,
        ),
        EventsDisplay::Fetched(Resource::Json(value)) => {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_default();
            let paragraph = Paragraph::new(pretty)
                .scroll((state.table_scroll.min(u16::MAX as usize) as u16, 0))
                .block(Block::default().title("Dynamic Events Data").borders(Borders::ALL));
            frame.render_widget(paragraph, area);
        }
        EventsDisplay::Loading => {
            let paragraph = Paragraph::new("Fetching dynamic events...")
                .block(Block::default().title("Dynamic Events").borders(Borders::ALL));
            frame.render_widget(paragraph, area);
        }
        EventsDisplay::Failed(err) => {
            let paragraph = Paragraph::new(format!("Fetch failed: {err}"))
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true })
                .block(Block::default().title("Dynamic Events").borders(Borders::ALL));
            frame.render_widget(paragraph, area);
        }
        EventsDisplay::Empty => {
            let mut text = String::from("Select a match and press f to fetch its dynamic events,\nor u to load a CSV file.");
            if let Some(err) = &state.upload_error {
                text.push_str(&format!("\n\nUpload failed: {err}"));
            }
            let paragraph = Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true })
                .block(Block::default().title("Dynamic Events").borders(Borders::ALL));
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_data_table(frame: &mut Frame, area: Rect, title: &str, table: &Table, scroll: usize) {
    const COLUMN_WIDTH: u16 = 14;
    let block = Block::default()
        .title(format!("{title} - {} rows", table.len()))
        .borders(Borders::ALL);
    let inner_width = area.width.saturating_sub(2);
    let shown = ((inner_width / (COLUMN_WIDTH + 1)).max(1) as usize).min(table.columns.len());

    let start = scroll.min(table.len().saturating_sub(1));
    let rows: Vec<Row> = table.rows[start..]
        .iter()
        .take(area.height as usize)
        .map(|row| Row::new(row.iter().take(shown).cloned().collect::<Vec<_>>()))
        .collect();
    let widths = vec![Constraint::Length(COLUMN_WIDTH); shown];

    let widget = TableWidget::new(rows, widths)
        .header(
            Row::new(table.columns.iter().take(shown).cloned().collect::<Vec<_>>())
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(block);
    frame.render_widget(widget, area);
}

fn render_upload_prompt(frame: &mut Frame, area: Rect, state: &AppState) {
    let popup_area = centered_rect(60, 20, area);
    frame.render_widget(Clear, popup_area);
    let input = state.upload_input.clone().unwrap_or_default();
    let prompt = Paragraph::new(format!("Path to dynamic events CSV:\n> {input}_"))
        .block(Block::default().title("Upload").borders(Borders::ALL));
    frame.render_widget(prompt, popup_area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "SkillCorner Explorer - Help",
        "",
        "Selection:",
        "  Tab / l / →    Next field",
        "  S-Tab / h / ←  Previous field",
        "  j/k or ↑/↓     Move in option list",
        "  Enter          Select option",
        "",
        "Match analysis:",
        "  f              Fetch dynamic events",
        "  u              Load a CSV file",
        "  c              Clear loaded file",
        "  J/K, PgDn/PgUp Scroll table",
        "",
        "Global:",
        "  r              Clear cache and reload",
        "  ?              Toggle help",
        "  q              Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
