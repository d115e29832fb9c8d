use std::io;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use clubhouse_terminal::api::{CalendarBackend, RestBackend};
use clubhouse_terminal::calendar::{CalendarState, SLOT_MINUTES, ViewMode};
use clubhouse_terminal::config::AppConfig;
use clubhouse_terminal::demo_backend::DemoBackend;
use clubhouse_terminal::drag::{DragPhase, PendingDrop};
use clubhouse_terminal::layout::{self, EventRect};
use clubhouse_terminal::model::CalendarEvent;
use clubhouse_terminal::query_cache::QueryCache;
use clubhouse_terminal::state::{AppState, Delta, ProviderCommand, Screen, apply_delta};
use clubhouse_terminal::{logging, persist, provider};

/// Screen regions from the last draw, used to resolve mouse positions.
#[derive(Debug, Default)]
struct HitMap {
    days: Vec<(Rect, NaiveDate)>,
    events: Vec<(Rect, String)>,
}

impl HitMap {
    fn event_at(&self, col: u16, row: u16) -> Option<&str> {
        // Later entries were drawn on top.
        self.events
            .iter()
            .rev()
            .find(|(rect, _)| contains(rect, col, row))
            .map(|(_, id)| id.as_str())
    }

    fn day_at(&self, col: u16, row: u16) -> Option<(Rect, NaiveDate)> {
        self.days
            .iter()
            .find(|(rect, _)| contains(rect, col, row))
            .copied()
    }
}

fn contains(rect: &Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.right() && row >= rect.y && row < rect.bottom()
}

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    hits: HitMap,
    refresh_check: Duration,
    last_refresh_check: Instant,
}

impl App {
    fn new(state: AppState, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state,
            should_quit: false,
            cmd_tx,
            hits: HitMap::default(),
            refresh_check: Duration::from_secs(1),
            last_refresh_check: Instant::now(),
        }
    }

    fn send(&mut self, cmd: Option<ProviderCommand>) {
        let Some(cmd) = cmd else {
            return;
        };
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[WARN] Backend unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Backend worker stopped");
        }
    }

    fn refresh(&mut self, force: bool) {
        let cmds = self.state.refresh_commands(SystemTime::now(), force);
        for cmd in cmds {
            self.send(Some(cmd));
        }
        self.last_refresh_check = Instant::now();
    }

    fn maybe_refresh(&mut self) {
        if self.last_refresh_check.elapsed() >= self.refresh_check {
            self.refresh(false);
        }
    }

    fn day_event_count(&self) -> usize {
        let events = self.state.visible_events();
        self.state.calendar.events_on_cursor(&events).len()
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.state.help_overlay = false;
            }
            return;
        }
        if self.state.pending_delete.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    let cmd = self.state.confirm_delete();
                    self.send(cmd);
                }
                _ => {
                    self.state.pending_delete = None;
                    self.state.push_log("[INFO] Delete cancelled");
                }
            }
            return;
        }
        if self.state.calendar.drag.pending().is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    let cmd = self.state.confirm_drop();
                    self.send(cmd);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.state.cancel_drag(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }
        if let Screen::EventDetail { .. } = self.state.screen {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('b') | KeyCode::Esc | KeyCode::Enter => {
                    self.state.screen = Screen::Calendar
                }
                _ => {}
            }
            return;
        }

        let month = self.state.calendar.view == ViewMode::Month;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Char('m') => self.state.set_view(ViewMode::Month),
            KeyCode::Char('w') => self.state.set_view(ViewMode::Week),
            KeyCode::Char('d') => self.state.set_view(ViewMode::Day),
            KeyCode::Char('v') => self.state.calendar.cycle_view(),
            KeyCode::Char('h') | KeyCode::Left => self.state.calendar.move_days(-1),
            KeyCode::Char('l') | KeyCode::Right => self.state.calendar.move_days(1),
            KeyCode::Char('k') | KeyCode::Up if month => self.state.calendar.move_days(-7),
            KeyCode::Char('j') | KeyCode::Down if month => self.state.calendar.move_days(7),
            KeyCode::Char('k') | KeyCode::Up => self.state.calendar.move_slot(-1),
            KeyCode::Char('j') | KeyCode::Down => self.state.calendar.move_slot(1),
            KeyCode::Char('[') | KeyCode::PageUp => self.state.calendar.prev_period(),
            KeyCode::Char(']') | KeyCode::PageDown => self.state.calendar.next_period(),
            KeyCode::Char('t') => self.state.calendar.go_today(),
            KeyCode::Tab => {
                let count = self.day_event_count();
                self.state.calendar.select_next(count);
            }
            KeyCode::BackTab => {
                let count = self.day_event_count();
                self.state.calendar.select_prev(count);
            }
            KeyCode::Char(' ') => {
                if self.state.calendar.drag.is_dragging() {
                    let cmd = self.state.drop_at_cursor();
                    self.send(cmd);
                } else {
                    self.state.begin_drag();
                }
            }
            KeyCode::Esc => self.state.cancel_drag(),
            KeyCode::Enter => self.state.open_detail(),
            KeyCode::Char('a') => {
                let cmd = self.state.quick_create();
                self.send(cmd);
            }
            KeyCode::Char('x') => self.state.request_delete(),
            KeyCode::Char('c') => self.state.toggle_confirmation(),
            KeyCode::Char('r') => {
                self.state.push_log("[INFO] Refreshing");
                self.refresh(true);
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent) {
        if self.state.help_overlay || self.state.screen != Screen::Calendar {
            return;
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let day = self.hits.day_at(mouse.column, mouse.row);
                if let Some((rect, date)) = day {
                    self.move_cursor_to(rect, date, mouse.row);
                }
                self.state.pointer = None;
                if let Some(id) = self.hits.event_at(mouse.column, mouse.row).map(str::to_string) {
                    let at = day.and_then(|(rect, _)| self.time_at(rect, mouse.row));
                    self.state.press_event(&id, at);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some((rect, date)) = self.hits.day_at(mouse.column, mouse.row) else {
                    return;
                };
                if self.state.pointer.is_some() {
                    let at = self.time_at(rect, mouse.row);
                    self.state.drag_pointer(date, at);
                } else {
                    self.move_cursor_to(rect, date, mouse.row);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let at = self
                    .hits
                    .day_at(mouse.column, mouse.row)
                    .map(|(rect, date)| (date, self.time_at(rect, mouse.row)));
                let cmd = self.state.release_pointer(at);
                self.send(cmd);
            }
            _ => {}
        }
    }

    fn move_cursor_to(&mut self, rect: Rect, date: NaiveDate, row: u16) {
        let cal = &mut self.state.calendar;
        if cal.cursor != date {
            cal.cursor = date;
            cal.selected = 0;
        }
        if let Some(time) = self.time_at(rect, row) {
            self.state.calendar.cursor_slot = self.state.calendar.slot_for_time(time);
        }
    }

    fn time_at(&self, rect: Rect, row: u16) -> Option<NaiveTime> {
        if self.state.calendar.view == ViewMode::Month || rect.height == 0 {
            return None;
        }
        let window = self.state.calendar.window;
        let frac = (row.saturating_sub(rect.y)) as f32 / rect.height as f32;
        let minutes = window.start_hour as f32 * 60.0 + frac * window.total_minutes() as f32;
        let slot = (minutes as u32 / SLOT_MINUTES) * SLOT_MINUTES;
        NaiveTime::from_hms_opt(slot / 60, slot % 60, 0)
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let config = AppConfig::from_env();

    let log_path = logging::init_file_logger(&config.log_level).ok();

    let today = Local::now().date_naive();
    let backend: Arc<dyn CalendarBackend> = match config.api_url.as_deref() {
        Some(url) => Arc::new(RestBackend::new(
            url,
            config.api_token.clone(),
            config.http_timeout,
        )),
        None => Arc::new(DemoBackend::seeded(today).with_fail_rate(config.demo_fail_rate)),
    };

    let mut cache = QueryCache::new(config.stale_after);
    let restored = persist::load_into_cache(&mut cache);
    let calendar = CalendarState::new(
        today,
        config.view,
        config.window,
        config.show_confirmation,
    );
    let mut state = AppState::new(calendar, cache);
    state.backend_label = backend.label();
    state.push_log(format!("[INFO] Backend: {}", state.backend_label));
    if restored > 0 {
        state.push_log(format!("[INFO] Restored {restored} cached queries"));
    }
    if let Some(path) = log_path {
        state.push_log(format!("[INFO] Log file: {}", path.display()));
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let backend_term = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend_term)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let worker = provider::spawn_provider(backend, tx, cmd_rx, config.fetch_parallelism);

    let mut app = App::new(state, Some(cmd_tx));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    if let Err(err) = persist::save_from_cache(&app.state.cache) {
        log::warn!("could not save cache: {err:#}");
    }
    app.cmd_tx = None;
    let _ = worker.join();

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
    app.refresh(false);

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        app.maybe_refresh();

        let mut hits = HitMap::default();
        terminal.draw(|f| hits = ui(f, &app.state))?;
        app.hits = hits;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::FocusLost => {
                    app.state.pointer = None;
                    app.state.calendar.drag.abort();
                }
                _ => {}
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

fn ui(frame: &mut Frame, state: &AppState) -> HitMap {
    let size = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(size);

    let header = Paragraph::new(header_text(state))
        .block(Block::default().borders(Borders::BOTTOM))
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(header, chunks[0]);

    let mut hits = HitMap::default();
    match &state.screen {
        Screen::Calendar => {
            let events = state.visible_events();
            match state.calendar.view {
                ViewMode::Month => render_month(frame, chunks[1], state, &events, &mut hits),
                ViewMode::Week => {
                    let days = state.calendar.week_days();
                    render_time_grid(frame, chunks[1], state, &events, &days, &mut hits)
                }
                ViewMode::Day => {
                    let days = [state.calendar.cursor];
                    render_time_grid(frame, chunks[1], state, &events, &days, &mut hits)
                }
            }
        }
        Screen::EventDetail { .. } => render_detail(frame, chunks[1], state),
    }

    let footer = Paragraph::new(footer_text(state)).block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if let Some(pending) = state.calendar.drag.pending() {
        let text = format!(
            "Move \"{}\"\n\nfrom {} {}\n  to {} {}-{}\n\ny confirm   n cancel",
            pending.event.title,
            pending.event.start_date.format("%a %d %b"),
            pending.event.time_label(),
            pending.new_start.format("%a %d %b"),
            pending.new_start.format("%H:%M"),
            pending.new_end.format("%H:%M"),
        );
        render_popup(frame, size, "Confirm move", &text);
    }
    if state.help_overlay {
        render_help_overlay(frame, size);
    }
    hits
}

fn header_text(state: &AppState) -> String {
    let cal = &state.calendar;
    let period = match cal.view {
        ViewMode::Month => cal.cursor.format("%B %Y").to_string(),
        ViewMode::Week => {
            let days = cal.week_days();
            format!(
                "Week {} | {} - {}",
                cal.cursor.iso_week().week(),
                days[0].format("%d %b"),
                days[6].format("%d %b %Y")
            )
        }
        ViewMode::Day => cal.cursor.format("%A %d %B %Y").to_string(),
    };
    let drag = match cal.drag.phase() {
        DragPhase::Idle => String::new(),
        DragPhase::Dragging(event) => format!(" | MOVING {}", event.title),
        DragPhase::PendingConfirmation(_) => " | CONFIRM?".to_string(),
        DragPhase::Committing(pending) => format!(" | SAVING {}", pending.event.title),
    };
    format!(
        "CLUBHOUSE | {} | {} | {} | confirm: {}{}{}",
        cal.view.label(),
        period,
        state.backend_label,
        if cal.show_confirmation { "on" } else { "off" },
        if state.online { "" } else { " | OFFLINE" },
        drag
    )
}

fn footer_text(state: &AppState) -> String {
    let keys = match state.screen {
        Screen::Calendar if state.calendar.drag.is_dragging() => {
            "arrows Move | Space Drop | Esc Cancel | mouse: release on a day"
        }
        Screen::Calendar => {
            "m/w/d View | arrows Move | [ ] Period | t Today | Tab Select | Space Pick up | Enter Details | a Add | x Delete | c Confirm | r Refresh | ? Help | q Quit"
        }
        Screen::EventDetail { .. } => "b/Esc Back | q Quit",
    };
    let notice = state.last_notice().unwrap_or("");
    format!("{keys}\n{notice}")
}

fn render_month(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    events: &[CalendarEvent],
    hits: &mut HitMap,
) {
    let cal = &state.calendar;
    let weeks = cal.month_grid();
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 7); 7])
        .split(sections[0]);
    for (idx, name) in ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .enumerate()
    {
        let label = Paragraph::new(*name)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(label, cols[idx]);
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, weeks.len() as u32); weeks.len()])
        .split(sections[1]);
    let dragged = cal.drag.active_event().map(|e| e.id.clone());

    for (week, row) in weeks.iter().zip(rows.iter()) {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 7); 7])
            .split(*row);
        for (date, cell) in week.iter().zip(cells.iter()) {
            hits.days.push((*cell, *date));
            let is_cursor = *date == cal.cursor;
            let mut border = Style::default().fg(Color::DarkGray);
            if is_cursor {
                border = Style::default().fg(Color::Yellow);
            }
            let mut title_style = Style::default();
            if !cal.in_current_month(*date) {
                title_style = title_style.fg(Color::DarkGray);
            } else if *date == cal.today {
                title_style = title_style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
            } else if CalendarState::is_weekend(*date) {
                title_style = title_style.fg(Color::Gray);
            }
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Span::styled(format!("{}", date.day()), title_style));
            let inner = block.inner(*cell);
            frame.render_widget(block, *cell);

            let on_day = layout::events_for_day(events, *date);
            let mut lines: Vec<Line> = Vec::new();
            if is_cursor
                && cal.drag.is_dragging()
                && let Some(event) = cal.drag.active_event()
            {
                lines.push(Line::styled(
                    format!("> {}", event.title),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::ITALIC),
                ));
            }
            for (idx, event) in on_day.iter().enumerate() {
                if lines.len() >= inner.height as usize {
                    break;
                }
                let selected = is_cursor && idx == cal.selected.min(on_day.len().saturating_sub(1));
                let mut style = Style::default().fg(event_color(event));
                if selected {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                if dragged.as_deref() == Some(event.id.as_str()) {
                    style = style.add_modifier(Modifier::DIM);
                }
                let line_rect = Rect::new(inner.x, inner.y + lines.len() as u16, inner.width, 1);
                hits.events.push((line_rect, event.id.clone()));
                lines.push(Line::styled(
                    format!("{} {}", event.start_date.format("%H:%M"), event.title),
                    style,
                ));
            }
            frame.render_widget(Paragraph::new(lines), inner);
        }
    }
}

fn render_time_grid(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    events: &[CalendarEvent],
    days: &[NaiveDate],
    hits: &mut HitMap,
) {
    let cal = &state.calendar;
    let window = cal.window;
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);
    let header_cols = split_columns(sections[0], days.len());
    let body_cols = split_columns(sections[1], days.len());

    // Hour gutter.
    let gutter = Rect::new(sections[1].x, sections[1].y, 6, sections[1].height);
    let hours = window.end_hour - window.start_hour;
    for (i, hour) in (window.start_hour..window.end_hour).enumerate() {
        let rect = layout::project(
            EventRect {
                top: i as f32 / hours as f32 * 100.0,
                height: 100.0 / hours as f32,
                left: 0.0,
                width: 100.0,
            },
            gutter,
        );
        let label = Paragraph::new(format!("{hour:02}:00")).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(label, Rect::new(rect.x, rect.y, rect.width, 1));
    }

    let slots = (cal.last_slot() - cal.first_slot() + 1) as f32;
    let dragged = cal.drag.active_event().cloned();

    for ((date, head), col) in days.iter().zip(header_cols.iter()).zip(body_cols.iter()) {
        let mut head_style = Style::default();
        if *date == cal.today {
            head_style = head_style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if *date == cal.cursor {
            head_style = head_style.add_modifier(Modifier::UNDERLINED);
        }
        frame.render_widget(
            Paragraph::new(date.format("%a %d").to_string())
                .alignment(Alignment::Center)
                .style(head_style),
            *head,
        );

        let column = Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = column.inner(*col);
        frame.render_widget(column, *col);
        hits.days.push((inner, *date));

        if *date == cal.cursor {
            let slot_rect = EventRect {
                top: (cal.cursor_slot - cal.first_slot()) as f32 / slots * 100.0,
                height: 100.0 / slots,
                left: 0.0,
                width: 100.0,
            };
            let cells = layout::project(slot_rect, inner);
            frame.render_widget(
                Block::default().style(Style::default().bg(Color::Rgb(40, 40, 40))),
                cells,
            );
        }

        let on_day = layout::events_for_day(events, *date);
        let selected_id = cal
            .selected_event(events)
            .filter(|_| *date == cal.cursor)
            .map(|e| e.id.clone());
        for placed in layout::layout_day(&on_day, *date, window) {
            let cells = layout::project(placed.rect, inner);
            let mut style = Style::default().fg(Color::Black).bg(event_color(placed.event));
            if selected_id.as_deref() == Some(placed.event.id.as_str()) {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            if dragged.as_ref().is_some_and(|d| d.id == placed.event.id) {
                style = style.add_modifier(Modifier::DIM);
            }
            let mut text = format!("{}\n{}", placed.event.title, placed.event.time_label());
            let initials = state.attendee_initials(placed.event);
            if !initials.is_empty() {
                text.push('\n');
                text.push_str(&initials.join(" "));
            }
            frame.render_widget(Clear, cells);
            frame.render_widget(
                Paragraph::new(text).style(style).wrap(Wrap { trim: true }),
                cells,
            );
            hits.events.push((cells, placed.event.id.clone()));
        }

        // Ghost of the dragged event at the cursor slot.
        if let Some(event) = dragged.as_ref()
            && cal.drag.is_dragging()
            && *date == cal.cursor
            && let Some(target) = cal.drop_target()
        {
            let pending = PendingDrop::propose(event, target);
            let mut ghost = event.clone();
            ghost.start_date = pending.new_start;
            ghost.end_date = pending.new_end;
            let Some(span) = layout::span_in_window(&ghost, *date, window) else {
                continue;
            };
            let total = window.total_minutes() as f32;
            let rect = EventRect {
                top: span.start as f32 / total * 100.0,
                height: (span.end - span.start) as f32 / total * 100.0,
                left: 0.0,
                width: 100.0,
            };
            let cells = layout::project(rect, inner);
            frame.render_widget(Clear, cells);
            frame.render_widget(
                Paragraph::new(format!("> {}\n{}", ghost.title, ghost.time_label()))
                    .style(
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::ITALIC),
                    )
                    .block(Block::default().borders(Borders::ALL)),
                cells,
            );
        }
    }
}

fn split_columns(area: Rect, count: usize) -> Vec<Rect> {
    let body = Rect::new(
        area.x + 6,
        area.y,
        area.width.saturating_sub(6),
        area.height,
    );
    let count = count.max(1) as u32;
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, count); count as usize])
        .split(body)
        .to_vec()
}

fn render_detail(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(event) = state.detail_event() else {
        frame.render_widget(
            Paragraph::new("Event no longer available").style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    };
    let caps = event.kind.capabilities();
    let mut lines = vec![
        Line::styled(
            event.title.clone(),
            Style::default()
                .fg(event_color(event))
                .add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::raw(format!(
            "When:  {} {}",
            event.start_date.format("%A %d %B %Y"),
            event.time_label()
        )),
        Line::raw(format!("Type:  {}", event.kind.label())),
        Line::raw(format!(
            "Moves: {}",
            if caps.draggable { "allowed" } else { "read-only" }
        )),
        Line::raw(""),
    ];
    if !event.description.is_empty() {
        lines.push(Line::raw(event.description.clone()));
        lines.push(Line::raw(""));
    }
    if !event.attendees.is_empty() {
        lines.push(Line::styled("Attendees", Style::default().add_modifier(Modifier::BOLD)));
        for id in &event.attendees {
            let line = match state.cache.user(*id) {
                Some(user) => format!(
                    "  [{}] {}{}",
                    user.initials(),
                    user.display_name(),
                    user.role
                        .as_deref()
                        .map(|r| format!(" ({r})"))
                        .unwrap_or_default()
                ),
                None => format!("  [#{id}] unknown"),
            };
            lines.push(Line::raw(line));
        }
    }
    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Event"))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn event_color(event: &CalendarEvent) -> Color {
    event
        .color
        .as_deref()
        .and_then(parse_color)
        .unwrap_or(Color::Blue)
}

fn parse_color(raw: &str) -> Option<Color> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color::Rgb(r, g, b));
        }
        return None;
    }
    raw.parse::<Color>().ok()
}

fn render_popup(frame: &mut Frame, area: Rect, title: &str, text: &str) {
    let popup_area = centered_rect(50, 40, area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(text.to_string())
        .block(Block::default().title(title.to_string()).borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, popup_area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Clubhouse Calendar - Help",
        "",
        "Views:",
        "  m / w / d    Month / Week / Day",
        "  v            Cycle view",
        "  [ ]          Previous / next period",
        "  t            Today",
        "",
        "Cursor:",
        "  h/l or ←/→   Previous / next day",
        "  j/k or ↑/↓   Time slot (week, day) or week (month)",
        "  Tab          Select next event on the day",
        "  Enter        Event details",
        "",
        "Moving events:",
        "  Space        Pick up, then drop at the cursor",
        "  Mouse        Drag an event onto another day or slot",
        "  y / n        Confirm or cancel a pending move",
        "  Esc          Cancel the move",
        "  c            Toggle move confirmation",
        "",
        "  a            Add a one-hour event at the cursor",
        "  x            Delete the selected event",
        "  r            Refresh from the server",
        "  ?            Toggle help",
        "  q            Quit",
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
