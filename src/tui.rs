use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant, SystemTime};
use std::{
    sync::{Arc, Mutex},
    thread,
};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{ProgressEvent, ProgressSink, ProgressSinkKind};
use crate::error::FetchError;

const EVENTS_MAX: usize = 6;
const LOGS_MAX: usize = 200;
const HINTS: &[&str] = &[
    "Tip: pff-dm with no arguments fetches the default sample game",
    "Tip: --dry-run previews planned downloads without writing",
    "Tip: pff-dm status shows per-game completeness",
    "Tip: F4 logs, F1 help, Esc aborts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Operational,
    Logs,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resolve,
    Fetch,
    Verify,
    Store,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Resolve => "Resolve",
            Phase::Fetch => "Fetch",
            Phase::Verify => "Verify",
            Phase::Store => "Store",
        }
    }

    fn index(self) -> usize {
        match self {
            Phase::Resolve => 0,
            Phase::Fetch => 1,
            Phase::Verify => 2,
            Phase::Store => 3,
        }
    }
}

#[derive(Debug)]
struct AppState {
    status: String,
    phase: Phase,
    req_rate: f64,
    latency_ms: Option<u128>,
    warnings: u32,
    events: VecDeque<String>,
    logs: VecDeque<String>,
    view: View,
    started: Instant,
    active: bool,
    finished: bool,
    request_count: u64,
    hint_index: usize,
    last_hint_update: Instant,
}

pub struct Tui {
    kind: ProgressSinkKind,
    root_label: String,
    source_label: String,
    games_label: String,
    state: Arc<Mutex<AppState>>,
    log_scroll: u16,
}

struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = parse_phase(&message) {
                state.phase = phase;
                state.status = payload.to_string();
            } else if let Some(latency) = parse_latency(&message) {
                state.latency_ms = Some(latency);
            } else if message.starts_with("warn ") {
                state.warnings = state.warnings.saturating_add(1);
            } else {
                state.status = message.clone();
            }

            if message.contains("source.request") {
                state.request_count = state.request_count.saturating_add(1);
            }

            push_event(&mut state.events, message.clone());
            push_log(&mut state.logs, format!("[{}] {message}", timestamp()));
        }
    }
}

impl Tui {
    pub fn new(kind: ProgressSinkKind, root: &str, source: &str, games: usize) -> Self {
        Self {
            kind,
            root_label: root.to_string(),
            source_label: source.to_string(),
            games_label: format!("{games}"),
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                phase: Phase::Resolve,
                req_rate: 0.0,
                latency_ms: None,
                warnings: 0,
                events: VecDeque::new(),
                logs: VecDeque::new(),
                view: View::Operational,
                started: Instant::now(),
                active: false,
                finished: false,
                request_count: 0,
                hint_index: 0,
                last_hint_update: Instant::now(),
            })),
            log_scroll: 0,
        }
    }

    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, FetchError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let state = self.state.clone();
        let sink = TuiProgress { state };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            self.refresh_metrics();
            if let Ok(state) = self.state.lock() {
                let elapsed = state.started.elapsed();
                terminal
                    .draw(|frame| draw_ui(frame, self, &state, tick, elapsed))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                self.set_active(false);
                disable_raw_mode().into_diagnostic()?;
                let mut stdout = io::stdout();
                stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        break;
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        self.set_active(false);
        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        Err(miette::Report::msg("aborted"))
    }

    pub fn confirm_clear(&mut self, root: &str) -> miette::Result<bool> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;

        let prompt = format!("Remove {root} and everything under it?");
        let confirmed = loop {
            terminal
                .draw(|frame| {
                    let block = Block::default().borders(Borders::ALL).title("Confirm");
                    let text = Paragraph::new(vec![
                        Line::from(prompt.clone()),
                        Line::from("Press y to confirm, n to cancel."),
                    ])
                    .alignment(Alignment::Center)
                    .block(block);
                    frame.render_widget(text, frame.area());
                })
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(100)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    match key.code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => break true,
                        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => break false,
                        _ => {}
                    }
                }
            }
        };

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        Ok(confirmed)
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::F(1) => {
                self.set_view(View::Help);
                false
            }
            KeyCode::F(3) => {
                self.set_view(View::Operational);
                false
            }
            KeyCode::F(4) => {
                self.set_view(View::Logs);
                false
            }
            KeyCode::PageUp => {
                self.scroll_logs(5);
                false
            }
            KeyCode::PageDown => {
                self.scroll_logs(-5);
                false
            }
            KeyCode::Char('q') => !self.is_active(),
            KeyCode::Esc => true,
            _ => false,
        }
    }

    fn is_active(&self) -> bool {
        self.state.lock().map(|state| state.active).unwrap_or(false)
    }

    fn set_active(&self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            state.finished = !active;
            state.started = Instant::now();
            state.request_count = 0;
            state.warnings = 0;
            state.latency_ms = None;
            state.phase = Phase::Resolve;
        }
    }

    fn set_view(&self, view: View) {
        if let Ok(mut state) = self.state.lock() {
            state.view = view;
        }
    }

    fn refresh_metrics(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.active {
                let elapsed = state.started.elapsed().as_secs_f64().max(0.1);
                state.req_rate = (state.request_count as f64) / elapsed;
            } else {
                state.req_rate = 0.0;
            }
            if state.last_hint_update.elapsed() >= Duration::from_secs(5) {
                state.hint_index = (state.hint_index + 1) % HINTS.len().max(1);
                state.last_hint_update = Instant::now();
            }
        }
    }

    fn scroll_logs(&mut self, delta: i16) {
        let max = self.state.lock().map(|state| state.logs.len()).unwrap_or(0);
        let max_scroll = max.saturating_sub(1) as i16;
        let next = (self.log_scroll as i16 + delta).clamp(0, max_scroll);
        self.log_scroll = next as u16;
    }
}

fn draw_ui(
    frame: &mut ratatui::Frame,
    tui: &Tui,
    state: &AppState,
    tick: usize,
    elapsed: Duration,
) {
    match state.view {
        View::Operational => draw_operational(frame, tui, state, tick, elapsed),
        View::Logs => draw_logs(frame, tui, state),
        View::Help => draw_help(frame),
    }
}

fn draw_operational(
    frame: &mut ratatui::Frame,
    tui: &Tui,
    state: &AppState,
    tick: usize,
    elapsed: Duration,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = draw_header(tui, state, tick);
    frame.render_widget(header, chunks[0]);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    let status = draw_status_panel(state, elapsed);
    frame.render_widget(status, main[0]);

    let details = draw_details_panel(tui);
    frame.render_widget(details, main[1]);

    draw_footer(frame, state, chunks[2]);
}

fn draw_logs(frame: &mut ratatui::Frame, tui: &Tui, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = draw_header(tui, state, 0);
    frame.render_widget(header, chunks[0]);

    let logs = draw_logs_view(state, tui.log_scroll);
    frame.render_widget(logs, chunks[1]);

    draw_footer(frame, state, chunks[2]);
}

fn draw_help(frame: &mut ratatui::Frame) {
    let block = Block::default().borders(Borders::ALL).title("Help");
    let lines = vec![
        Line::from("F1 Help  F3 Progress  F4 Logs  PgUp/PgDown scroll  Esc abort"),
        Line::from("Commands: pff-dm fetch|status|info|clear"),
        Line::from("The dataset lands under the data root:"),
        Line::from("  tracking/{game}.jsonl.bz2  metadata/{game}.json"),
        Line::from("  rosters/{game}.json        events.json"),
    ];
    let view = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(view, frame.area());
}

fn draw_header(tui: &Tui, state: &AppState, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let op_label = match tui.kind {
        ProgressSinkKind::Fetch => "Fetch",
        ProgressSinkKind::Status => "Status",
        ProgressSinkKind::Info => "Info",
        ProgressSinkKind::Clear => "Clear",
    };
    let header_line = Line::from(vec![
        Span::styled(
            "PFF-DM",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Mode: Interactive   Op: "),
        Span::styled(op_label, Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]);
    let root_line = Line::from(vec![
        Span::styled("Data root: ", Style::default().fg(Color::Gray)),
        Span::raw(tui.root_label.clone()),
        Span::styled("   Games: ", Style::default().fg(Color::Gray)),
        Span::raw(tui.games_label.clone()),
        Span::styled(
            format!("   Warnings: {}", state.warnings),
            Style::default().fg(if state.warnings > 0 {
                Color::Yellow
            } else {
                Color::Gray
            }),
        ),
    ]);
    Paragraph::new(vec![header_line, root_line])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_status_panel(state: &AppState, elapsed: Duration) -> Paragraph<'static> {
    let progress = phase_progress(state.phase, elapsed);
    let bar = progress_bar(progress);
    let phase_color = if state.active {
        Color::Cyan
    } else if state.finished {
        Color::Green
    } else {
        Color::Yellow
    };
    let req_rate = if state.req_rate > 0.0 {
        format!("{:.1}", state.req_rate)
    } else {
        "0.0".to_string()
    };
    let latency = state
        .latency_ms
        .map(|v| format!("{v} ms"))
        .unwrap_or_else(|| "--".to_string());
    let mut lines = vec![
        Line::from(Span::styled(
            "STATUS / PROGRESS",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Phase: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:<7} ", state.phase.label()),
                Style::default().fg(phase_color),
            ),
            Span::raw(bar),
            Span::raw(format!(" {progress:>3}%")),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
        Line::from(vec![
            Span::styled("Req/s: ", Style::default().fg(Color::Gray)),
            Span::raw(req_rate),
            Span::styled("   Latency: ", Style::default().fg(Color::Gray)),
            Span::raw(latency),
        ]),
        Line::from(Span::styled(
            "Recent events:",
            Style::default().fg(Color::Gray),
        )),
    ];

    for event in state.events.iter().rev().take(3) {
        lines.push(Line::from(format!("- {event}")));
    }
    lines.push(Line::from(vec![
        Span::styled("Hint: ", Style::default().fg(Color::Gray)),
        Span::styled(HINTS[state.hint_index], Style::default().fg(Color::Gray)),
    ]));

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::RIGHT))
        .wrap(Wrap { trim: true })
}

fn draw_details_panel(tui: &Tui) -> Paragraph<'static> {
    let lines = vec![
        Line::from(Span::styled(
            "DETAILS",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Source: ", Style::default().fg(Color::Gray)),
            Span::raw(tui.source_label.clone()),
        ]),
        Line::from(vec![
            Span::styled("Data root: ", Style::default().fg(Color::Gray)),
            Span::raw(tui.root_label.clone()),
        ]),
        Line::from(vec![
            Span::styled("Per game: ", Style::default().fg(Color::Gray)),
            Span::raw("tracking, metadata, roster"),
        ]),
        Line::from(vec![
            Span::styled("Shared: ", Style::default().fg(Color::Gray)),
            Span::raw("events.json"),
        ]),
    ];

    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn draw_footer(frame: &mut ratatui::Frame, state: &AppState, area: Rect) {
    let label = if state.active {
        "working... Esc aborts"
    } else {
        "done. q quits"
    };
    let lines = vec![Line::from(vec![
        Span::styled("F1 Help  F4 Logs   ", Style::default().fg(Color::DarkGray)),
        Span::styled(label, Style::default().fg(Color::DarkGray)),
    ])];
    let block = Block::default().borders(Borders::TOP);
    let para = Paragraph::new(lines).block(block);
    frame.render_widget(para, area);
}

fn draw_logs_view(state: &AppState, scroll: u16) -> Paragraph<'static> {
    let total = state.logs.len();
    let visible = 9usize;
    let start = total.saturating_sub(scroll as usize + visible);
    let mut lines = Vec::with_capacity(visible + 1);
    lines.push(Line::from(Span::styled(
        "LOGS (scrollable)",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    for line in state.logs.iter().skip(start).take(visible) {
        lines.push(Line::from(line.clone()));
    }
    Paragraph::new(lines)
        .block(Block::default())
        .wrap(Wrap { trim: true })
}

fn phase_progress(phase: Phase, elapsed: Duration) -> u8 {
    let base = ((phase.index() + 1) as f64 / 4.0) * 100.0;
    let wobble = (elapsed.as_millis() % 500) as f64 / 500.0 * 4.0;
    (base + wobble).min(100.0) as u8
}

fn progress_bar(percent: u8) -> String {
    let total = 10;
    let filled = (percent as usize * total) / 100;
    let mut out = String::from("[");
    for i in 0..total {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    if let Some(rest) = message.strip_prefix("phase=Resolve;") {
        return Some((Phase::Resolve, rest.trim()));
    }
    if let Some(rest) = message.strip_prefix("phase=Fetch;") {
        return Some((Phase::Fetch, rest.trim()));
    }
    if let Some(rest) = message.strip_prefix("phase=Verify;") {
        return Some((Phase::Verify, rest.trim()));
    }
    if let Some(rest) = message.strip_prefix("phase=Store;") {
        return Some((Phase::Store, rest.trim()));
    }
    None
}

fn parse_latency(message: &str) -> Option<u128> {
    message
        .split("latency_ms=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u128>().ok())
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}

fn push_log(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > LOGS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    let now = SystemTime::now();
    let secs = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    let mins = (secs / 60) % 60;
    let hours = (secs / 3600) % 24;
    let seconds = secs % 60;
    format!("{hours:02}:{mins:02}:{seconds:02}")
}
