use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{ProgressEvent, ProgressSink, ProgressSinkKind};
use crate::error::CatalogError;

const EVENTS_MAX: usize = 8;
const LOGS_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resolve,
    Fetch,
    Store,
    Done,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Resolve => "Resolve",
            Phase::Fetch => "Fetch",
            Phase::Store => "Store",
            Phase::Done => "Done",
        }
    }
}

#[derive(Debug)]
struct AppState {
    status: String,
    phase: Phase,
    latency_ms: Option<u128>,
    requests: u64,
    stored: u64,
    warnings: u64,
    events: VecDeque<String>,
    logs: VecDeque<String>,
    started: Instant,
    show_logs: bool,
}

pub struct Tui {
    kind: ProgressSinkKind,
    state: Arc<Mutex<AppState>>,
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
                if phase == Phase::Store {
                    state.stored = state.stored.saturating_add(1);
                }
            } else if message.contains("failed") || message.contains("no resources") {
                state.warnings = state.warnings.saturating_add(1);
                state.status = message.clone();
            } else {
                state.status = message.clone();
            }

            if let Some(elapsed) = event.elapsed {
                state.latency_ms = Some(elapsed.as_millis());
            }
            if message.starts_with("catalog.request") || state.phase == Phase::Fetch {
                state.requests = state.requests.saturating_add(1);
            }

            push_bounded(&mut state.events, message.clone(), EVENTS_MAX);
            push_bounded(&mut state.logs, format!("[{}] {message}", timestamp()), LOGS_MAX);
        }
    }
}

impl Tui {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                phase: Phase::Resolve,
                latency_ms: None,
                requests: 0,
                stored: 0,
                warnings: 0,
                events: VecDeque::new(),
                logs: VecDeque::new(),
                started: Instant::now(),
                show_logs: false,
            })),
        }
    }

    /// Runs `f` on a worker thread while drawing its progress. `q` or `Esc`
    /// leaves the view; the worker is not interrupted and its result is
    /// still awaited, so no file is left half written.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, CatalogError> + Send + 'static,
        R: Send + 'static,
    {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, self.kind, &state, tick))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                restore_terminal()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => break,
                            KeyCode::F(4) | KeyCode::Char('l') => self.toggle_logs(),
                            _ => {}
                        }
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        restore_terminal()?;
        eprintln!("waiting for the running job to finish...");
        let result = wait_for_worker(&rx);
        handle.join().ok();
        result
    }

    fn toggle_logs(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.show_logs = !state.show_logs;
        }
    }
}

fn wait_for_worker<R>(rx: &Receiver<Result<R, CatalogError>>) -> miette::Result<R> {
    match rx.recv() {
        Ok(result) => result.map_err(miette::Report::new),
        Err(_) => Err(miette::Report::msg("worker stopped without a result")),
    }
}

fn restore_terminal() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
    Ok(())
}

fn draw_ui(frame: &mut ratatui::Frame, kind: ProgressSinkKind, state: &AppState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(kind, tick), chunks[0]);
    if state.show_logs {
        frame.render_widget(draw_logs(state, chunks[1].height), chunks[1]);
    } else {
        frame.render_widget(draw_status(state), chunks[1]);
    }
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "q/Esc: leave view   l/F4: toggle logs",
            Style::default().fg(Color::Gray),
        ))),
        chunks[2],
    );
}

fn draw_header(kind: ProgressSinkKind, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let op_label = match kind {
        ProgressSinkKind::Fetch => "Fetch",
        ProgressSinkKind::Bulk => "Bulk",
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            "CKAN-FETCH",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Op: "),
        Span::styled(op_label, Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]))
    .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_status(state: &AppState) -> Paragraph<'static> {
    let phase_color = if state.phase == Phase::Done {
        Color::Green
    } else {
        Color::Cyan
    };
    let latency = state
        .latency_ms
        .map(|v| format!("{v} ms"))
        .unwrap_or_else(|| "--".to_string());
    let elapsed = state.started.elapsed().as_secs();
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Phase: ", Style::default().fg(Color::Gray)),
            Span::styled(state.phase.label(), Style::default().fg(phase_color)),
            Span::styled("   Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}m{:02}s", elapsed / 60, elapsed % 60)),
        ]),
        Line::from(vec![
            Span::styled("Requests: ", Style::default().fg(Color::Gray)),
            Span::raw(state.requests.to_string()),
            Span::styled("   Stored: ", Style::default().fg(Color::Gray)),
            Span::raw(state.stored.to_string()),
            Span::styled("   Warnings: ", Style::default().fg(Color::Gray)),
            Span::styled(state.warnings.to_string(), Style::default().fg(Color::Yellow)),
            Span::styled("   Latency: ", Style::default().fg(Color::Gray)),
            Span::raw(latency),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
        Line::from(Span::styled(
            "Recent events:",
            Style::default().fg(Color::Gray),
        )),
    ];
    for event in state.events.iter().rev() {
        lines.push(Line::from(format!("- {event}")));
    }
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::NONE))
        .wrap(Wrap { trim: true })
}

fn draw_logs(state: &AppState, height: u16) -> Paragraph<'static> {
    let visible = height.saturating_sub(2) as usize;
    let skip = state.logs.len().saturating_sub(visible);
    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(skip)
        .map(|line| Line::from(line.clone()))
        .collect();
    Paragraph::new(lines)
        .block(Block::default().title("Logs").borders(Borders::ALL))
        .wrap(Wrap { trim: false })
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (label, payload) = rest.split_once(';')?;
    let phase = match label {
        "Resolve" => Phase::Resolve,
        "Fetch" => Phase::Fetch,
        "Store" => Phase::Store,
        "Done" => Phase::Done,
        _ => return None,
    };
    Some((phase, payload.trim()))
}

fn push_bounded(buffer: &mut VecDeque<String>, item: String, max: usize) {
    buffer.push_back(item);
    while buffer.len() > max {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
