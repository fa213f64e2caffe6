mod app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use odds_tracker::config::DEFAULT_THRESHOLD_PCT;
use odds_tracker::types::Direction as Movement;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use app::{format_change, format_uptime, truncate, AppState, ConnectionStatus};

const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| {
        let port = std::env::var("API_PORT").unwrap_or_else(|_| "3000".to_string());
        format!("http://localhost:{port}")
    });
    let min_change = std::env::var("THRESHOLD_PERCENT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_THRESHOLD_PCT);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url, min_change);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut snapshot_table_state = TableState::default();
    snapshot_table_state.select(Some(0));

    let result = run_loop(&mut terminal, &mut app, &client, &mut snapshot_table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    snapshot_state: &mut TableState,
) -> io::Result<()> {
    let mut last_tick = std::time::Instant::now();

    loop {
        snapshot_state.select(Some(app.selected));
        terminal.draw(|f| render(f, app, snapshot_state))?;

        let timeout = REFRESH_INTERVAL
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select_next();
                            app.refresh_movements(client).await;
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select_prev();
                            app.refresh_movements(client).await;
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            app.raise_threshold();
                            app.refresh_movements(client).await;
                        }
                        KeyCode::Char('-') => {
                            app.lower_threshold();
                            app.refresh_movements(client).await;
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= REFRESH_INTERVAL {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, snapshot_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, snapshot_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected if app.health.database => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connected => (format!("● {}", app.health.status), Color::Yellow),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let latest = app
        .health
        .latest_snapshot
        .map_or("-".to_string(), |d| d.to_string());

    let title_spans = vec![
        Span::styled(
            " Odds Tracker  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} snapshots, latest {latest}", app.health.snapshots),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("threshold {}%", app.min_change),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("up {}", format_uptime(app.health.uptime_secs)),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let header_line = Line::from(title_spans);
    let paragraph = Paragraph::new(header_line)
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, snapshot_state: &mut TableState, area: Rect) {
    // Horizontal split: snapshots (30%) | movements (70%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    render_snapshots_table(f, app, snapshot_state, halves[0]);
    render_movements_table(f, app, halves[1]);
}

fn render_snapshots_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["Date", "Odds", "Matches", "At"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .snapshots
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.collection_date.to_string()),
                Cell::from(s.record_count.to_string()).style(Style::default().fg(Color::Cyan)),
                Cell::from(s.match_count.to_string()),
                Cell::from(s.collected_at.format("%H:%M").to_string())
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " SNAPSHOTS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_movements_table(f: &mut Frame, app: &AppState, area: Rect) {
    let Some(m) = &app.movements else {
        let note = app.movements_note.as_deref().unwrap_or("no comparison available");
        let paragraph = Paragraph::new(Line::from(Span::styled(
            format!(" {note}"),
            Style::default().fg(Color::DarkGray),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" MOVEMENTS "),
        );
        f.render_widget(paragraph, area);
        return;
    };

    let header_cells = ["Match", "Market", "Selection", "Prev", "Now", "Change"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = m
        .movements
        .iter()
        .map(|e| {
            let colour = match e.direction {
                Movement::Drift => Color::Green,
                Movement::Shorten => Color::Red,
            };
            Row::new(vec![
                Cell::from(truncate(&e.key.match_key.label(), 30)),
                Cell::from(truncate(&e.key.market, 16)),
                Cell::from(truncate(&e.key.selection, 10)),
                Cell::from(format!("{:.2}", e.previous_price)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format!("{:.2}", e.current_price)),
                Cell::from(format_change(e.change_pct)).style(Style::default().fg(colour)),
            ])
        })
        .collect();

    let title = format!(
        " MOVEMENTS {} → {}  ({} of {} over {}%, {} new, {} gone, {} unpriced) ",
        m.baseline_date, m.current_date, m.total, m.matched, m.min_change, m.added, m.removed, m.excluded
    );

    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("pick date  "),
        Span::styled("[+ -] ", Style::default().fg(Color::Yellow)),
        Span::raw("threshold  "),
        Span::styled("auto-refresh: 30s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
