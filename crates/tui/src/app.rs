use std::{cmp, future::Future, io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use portal_core::{
    calendar::{self, WeekGrid},
    cart::{AddOutcome, AddPlan, SaveOutcome, SaveReport},
    dashboard::Dashboard,
    error::{ApiResult, Notification},
    models::{format_clock, Section},
    search::bracket_filters,
    AppConfig, CartReconciler, CartState, DayLetter, HttpRegistrar, PrereqVerdict, RegistrarApi,
    SearchAdapter, SearchTicket, SessionContext,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];
const TIME_COLUMN: u16 = 6;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
    on_accent: Color,
    events: [Color; 6],
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            on_accent: Color::Black,
            events: [
                Color::Cyan,
                Color::Magenta,
                Color::Green,
                Color::Yellow,
                Color::Blue,
                Color::LightRed,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Registration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Results,
    Cart,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Search => Focus::Results,
            Focus::Results => Focus::Cart,
            Focus::Cart => Focus::Search,
        }
    }
}

/// Events handled by the interaction loop. Network results carry the cart
/// generation they were started under so responses for an abandoned
/// registration session are dropped.
enum AppEvent {
    Input(Event),
    Tick,
    DashboardLoaded(Dashboard, Vec<Notification>),
    CartLoaded(u64, ApiResult<Option<Vec<Section>>>),
    SearchDone(SearchTicket, ApiResult<Vec<Section>>),
    PrereqChecked(u64, Section, ApiResult<PrereqVerdict>),
    Saved(u64, Vec<Section>, SaveReport),
}

/// Terminal frontend for the student portal.
pub struct PortalApp {
    api: HttpRegistrar,
    ctx: SessionContext,
    config: AppConfig,
    screen: Screen,
    state: UiState,
    dashboard: Option<Dashboard>,
    cart: CartReconciler,
    cart_generation: u64,
    search: SearchAdapter,
    pending_prereqs: usize,
    saving: bool,
    modal: Option<Notification>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    theme: Theme,
}

impl PortalApp {
    pub fn new(api: HttpRegistrar, config: AppConfig) -> Self {
        let ctx = SessionContext::new(config.student_id.clone());
        Self {
            api,
            ctx,
            config,
            screen: Screen::Home,
            state: UiState::default(),
            dashboard: None,
            cart: CartReconciler::new(),
            cart_generation: 0,
            search: SearchAdapter::new(),
            pending_prereqs: 0,
            saving: false,
            modal: None,
            event_tx: None,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        if self.ctx.student_id.is_empty() {
            self.state
                .set_status("No student id configured; start with --student <id>".to_string());
        } else {
            self.state
                .set_status(format!("Signed in as {}", self.ctx.student_id));
        }
        self.start_dashboard_load();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) || self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let Some(tx) = self.event_tx.clone() else {
            warn!("Request dropped; event loop not running");
            return;
        };
        spawn(async move {
            let event = task.await;
            if tx.send(event).await.is_err() {
                debug!("Event loop closed before request finished");
            }
        });
    }

    fn start_dashboard_load(&mut self) {
        self.dashboard = None;
        let api = self.api.clone();
        let ctx = self.ctx.clone();
        let config = self.config.clone();
        self.dispatch(async move {
            let (dashboard, notes) = Dashboard::load(&api, &ctx, &config).await;
            AppEvent::DashboardLoaded(dashboard, notes)
        });
    }

    fn open_registration(&mut self) {
        if self.screen == Screen::Registration {
            return;
        }
        self.screen = Screen::Registration;
        self.cart_generation += 1;
        self.cart.begin_load();
        let generation = self.cart_generation;
        let api = self.api.clone();
        let ctx = self.ctx.clone();
        info!(student = %ctx.student_id, "Loading saved cart");
        self.dispatch(async move { AppEvent::CartLoaded(generation, api.saved_cart(&ctx).await) });
        self.state.set_status("Loading saved cart".to_string());
    }

    fn leave_registration(&mut self) {
        if self.cart.is_dirty() {
            self.state
                .set_status("Unsaved cart changes were discarded".to_string());
        }
        // Results of in-flight requests belong to the old session.
        self.cart_generation += 1;
        self.cart.reset();
        self.pending_prereqs = 0;
        self.saving = false;
        self.state.cart_cursor = 0;
        self.screen = Screen::Home;
    }

    fn is_loading(&self) -> bool {
        self.cart.state() == CartState::Loading
    }

    fn is_busy(&self) -> bool {
        self.is_loading() || self.search.is_pending() || self.pending_prereqs > 0 || self.saving
    }

    fn submit_search(&mut self) {
        let query = self.state.query.clone();
        let ticket = self.search.begin(&query);
        self.state.results_cursor = 0;
        self.collect_notifications();
        let Some(ticket) = ticket else {
            return;
        };
        let filters = bracket_filters(&query);
        if filters.is_empty() {
            self.state.set_status(format!("Searching for \"{query}\""));
        } else {
            self.state.set_status(format!(
                "Searching for \"{query}\" (requirements: {})",
                filters.join(", ")
            ));
        }
        let api = self.api.clone();
        self.dispatch(async move {
            let result = api.search(&query).await;
            AppEvent::SearchDone(ticket, result)
        });
    }

    fn add_selected(&mut self) {
        let Some(candidate) = self.search.results().get(self.state.results_cursor).cloned() else {
            return;
        };
        match self.cart.plan_add(&candidate) {
            AddPlan::Done(AddOutcome::Added) => {
                self.state
                    .set_status(format!("Added {} to cart", candidate.label()));
            }
            AddPlan::Done(AddOutcome::Rejected(_)) => {}
            AddPlan::NeedsPrerequisite { expression } => {
                self.pending_prereqs += 1;
                self.state.set_status(format!(
                    "Checking prerequisites for {}",
                    candidate.course_label()
                ));
                let generation = self.cart_generation;
                let api = self.api.clone();
                let ctx = self.ctx.clone();
                self.dispatch(async move {
                    let verdict = api.check_prerequisite(&ctx, &expression).await;
                    AppEvent::PrereqChecked(generation, candidate, verdict)
                });
            }
        }
        self.collect_notifications();
    }

    fn remove_selected(&mut self) {
        let Some(id) = self
            .cart
            .entries()
            .get(self.state.cart_cursor)
            .map(|entry| entry.id.clone())
        else {
            return;
        };
        if self.cart.remove_section(&id) {
            self.state.set_status("Removed section from cart".to_string());
        }
        self.state.clamp_cart_cursor(self.cart.entries().len());
    }

    fn start_save(&mut self) {
        if self.saving {
            self.state
                .set_status("A save is already in progress".to_string());
            return;
        }
        let Some(sent) = self.cart.begin_save() else {
            self.state.set_status("No changes to save".to_string());
            return;
        };
        self.saving = true;
        self.state.set_status("Saving cart".to_string());
        let generation = self.cart_generation;
        let api = self.api.clone();
        let ctx = self.ctx.clone();
        self.dispatch(async move {
            let report = SaveReport::run(&api, &ctx, &sent).await;
            AppEvent::Saved(generation, sent, report)
        });
    }

    fn collect_notifications(&mut self) {
        let notes = [self.cart.take_notification(), self.search.take_notification()];
        for note in notes.into_iter().flatten() {
            self.show_notification(note);
        }
    }

    fn show_notification(&mut self, note: Notification) {
        if note.kind.is_error() {
            self.modal = Some(note);
        } else {
            self.state
                .set_status(format!("{}: {}", note.header, note.message));
        }
    }

    fn handle_tick(&mut self) {
        if self.is_busy() {
            self.state.spinner = (self.state.spinner + 1) % SPINNER.len();
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    error!(?err, "Input handling failed");
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Tick) => {
                self.handle_tick();
                true
            }
            Some(AppEvent::DashboardLoaded(dashboard, notes)) => {
                info!(dates = dashboard.dates.len(), "Dashboard loaded");
                self.dashboard = Some(dashboard);
                for note in notes {
                    self.show_notification(note);
                }
                true
            }
            Some(AppEvent::CartLoaded(generation, result)) => {
                if generation == self.cart_generation {
                    self.cart.finish_load(result);
                    self.state.clamp_cart_cursor(self.cart.entries().len());
                    self.state.set_status(format!(
                        "Cart ready: {} section(s)",
                        self.cart.entries().len()
                    ));
                    self.collect_notifications();
                } else {
                    debug!(generation, "Dropping cart load for a closed session");
                }
                true
            }
            Some(AppEvent::SearchDone(ticket, result)) => {
                if self.search.complete(ticket, result) {
                    self.state.results_cursor = 0;
                    self.state.set_status(format!(
                        "{} result(s) for \"{}\"",
                        self.search.results().len(),
                        self.search.query()
                    ));
                    self.collect_notifications();
                }
                true
            }
            Some(AppEvent::PrereqChecked(generation, candidate, verdict)) => {
                if generation != self.cart_generation {
                    debug!(section = %candidate.label(), "Dropping prerequisite result for a closed session");
                    return true;
                }
                self.pending_prereqs = self.pending_prereqs.saturating_sub(1);
                let label = candidate.label();
                if self.cart.finish_add(candidate, verdict) == AddOutcome::Added {
                    self.state.set_status(format!("Added {label} to cart"));
                }
                self.collect_notifications();
                true
            }
            Some(AppEvent::Saved(generation, sent, report)) => {
                if generation != self.cart_generation {
                    debug!("Dropping save result for a closed session");
                    return true;
                }
                self.saving = false;
                if self.cart.finish_save(&sent, report) == SaveOutcome::Saved {
                    self.state.clamp_cart_cursor(self.cart.entries().len());
                }
                self.collect_notifications();
                true
            }
            None => false,
        }
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if self.modal.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.modal = None;
            }
            return Ok(());
        }
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return Ok(());
        }
        match self.screen {
            Screen::Home => self.handle_home_key(key),
            Screen::Registration => match self.state.focus {
                Focus::Search => self.handle_search_key(key),
                Focus::Results | Focus::Cart => self.handle_browse_key(key),
            },
        }
        Ok(())
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.state.should_quit = true;
            }
            KeyCode::Char('2') | KeyCode::Tab | KeyCode::Enter => self.open_registration(),
            KeyCode::Char('r') => {
                self.state.set_status("Refreshing dashboard".to_string());
                self.start_dashboard_load();
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.state.focus = self.state.focus.next(),
            KeyCode::Enter => {
                self.submit_search();
                self.state.focus = Focus::Results;
            }
            KeyCode::Backspace => {
                self.state.query.pop();
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.state.query.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') if key.modifiers.is_empty() => self.state.should_quit = true,
            KeyCode::Char('1') => self.leave_registration(),
            KeyCode::Char('/') => self.state.focus = Focus::Search,
            KeyCode::Tab => self.state.focus = self.state.focus.next(),
            KeyCode::Char('s') => self.start_save(),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Enter if self.state.focus == Focus::Results => self.add_selected(),
            KeyCode::Char('d') | KeyCode::Delete if self.state.focus == Focus::Cart => {
                self.remove_selected()
            }
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.state.focus {
            Focus::Results => {
                self.state.results_cursor =
                    step(self.state.results_cursor, delta, self.search.results().len());
            }
            Focus::Cart => {
                self.state.cart_cursor =
                    step(self.state.cart_cursor, delta, self.cart.entries().len());
            }
            Focus::Search => {}
        }
    }

    fn draw(&self, frame: &mut Frame) {
        match self.screen {
            Screen::Home => self.draw_home(frame),
            Screen::Registration => self.draw_registration(frame),
        }
        if let Some(note) = &self.modal {
            self.render_notification(frame, note);
        }
    }

    fn draw_home(&self, frame: &mut Frame) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(area);

        let greeting = format!(
            "Student Portal  ·  {}",
            Local::now().format("%A, %B %-d %Y")
        );
        let header = Paragraph::new(Line::from(Span::styled(
            greeting,
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        frame.render_widget(header, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[0]);

        match &self.dashboard {
            Some(dashboard) => {
                self.render_bullets(frame, left[0], "Holds", &dashboard.holds, self.theme.danger);
                self.render_bullets(frame, left[1], "To Do", &dashboard.todo, self.theme.warning);
                let dates: Vec<String> = dashboard.dates.iter().map(|date| date.display()).collect();
                self.render_bullets(frame, columns[1], "Important Dates", &dates, self.theme.accent);
            }
            None => {
                let loading = Paragraph::new(format!("{} Loading dashboard", self.spinner()))
                    .block(Block::default().borders(Borders::ALL).title("Dashboard"))
                    .alignment(Alignment::Center);
                frame.render_widget(loading, rows[1]);
            }
        }

        self.render_status(frame, rows[2], "2/Tab registration  r refresh  q quit");
    }

    fn render_bullets(&self, frame: &mut Frame, area: Rect, title: &str, items: &[String], color: Color) {
        let lines: Vec<Line> = if items.is_empty() {
            vec![Line::from(Span::styled(
                "Nothing here",
                Style::default().fg(self.theme.muted),
            ))]
        } else {
            items
                .iter()
                .map(|item| {
                    Line::from(vec![
                        Span::styled("• ", Style::default().fg(color)),
                        Span::raw(item.clone()),
                    ])
                })
                .collect()
        };
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_registration(&self, frame: &mut Frame) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_search_box(frame, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(42), Constraint::Percentage(58)])
            .split(rows[1]);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(columns[0]);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(9), Constraint::Min(6)])
            .split(columns[1]);

        self.render_results(frame, left[0]);
        self.render_section_details(frame, left[1]);
        self.render_cart(frame, right[0]);
        self.render_schedule(frame, right[1]);
        self.render_status(
            frame,
            rows[2],
            "/ search  Enter add  d remove  s save  Tab focus  1 home  q quit",
        );
    }

    fn panel_block(&self, title: String, focused: bool) -> Block<'static> {
        let style = if focused {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(title)
    }

    fn render_search_box(&self, frame: &mut Frame, area: Rect) {
        let focused = self.state.focus == Focus::Search;
        let mut spans = vec![
            Span::styled("> ", Style::default().fg(self.theme.accent)),
            Span::raw(self.state.query.clone()),
        ];
        if self.state.query.is_empty() && !focused {
            spans.push(Span::styled(
                "CSE 316, Software, [SPK]",
                Style::default().fg(self.theme.muted),
            ));
        }
        let block = self.panel_block("Search".to_string(), focused);
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
        if focused {
            let cursor_x = (area.x + 3 + self.state.query.chars().count() as u16)
                .min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + 1);
        }
    }

    fn render_results(&self, frame: &mut Frame, area: Rect) {
        let focused = self.state.focus == Focus::Results;
        let title = if self.search.is_pending() {
            format!("Results {}", self.spinner())
        } else {
            format!("Results ({})", self.search.results().len())
        };
        let items: Vec<ListItem> = self
            .search
            .results()
            .iter()
            .map(|section| {
                let in_cart = self.cart.entries().iter().any(|entry| entry.id == section.id);
                let marker = if in_cart {
                    Span::styled("✓ ", Style::default().fg(self.theme.success))
                } else {
                    Span::raw("  ")
                };
                ListItem::new(vec![
                    Line::from(vec![
                        marker,
                        Span::styled(
                            section.label(),
                            Style::default()
                                .fg(self.theme.primary_fg)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(format!("  {}", section.title)),
                    ]),
                    Line::from(Span::styled(
                        format!(
                            "    {}  {}  {} cr",
                            section.meeting_pattern(),
                            section.instructor_display(),
                            format_credits(section.credits)
                        ),
                        Style::default().fg(self.theme.muted),
                    )),
                ])
            })
            .collect();

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.state.results_cursor.min(items.len() - 1)));
        }
        let list = List::new(items)
            .block(self.panel_block(title, focused))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_section_details(&self, frame: &mut Frame, area: Rect) {
        let selected = match self.state.focus {
            Focus::Cart => self.cart.entries().get(self.state.cart_cursor),
            _ => self.search.results().get(self.state.results_cursor),
        };
        let lines = match selected {
            Some(section) => {
                let mut lines = vec![
                    Line::from(Span::styled(
                        format!("{}: {}", section.label(), section.title),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!(
                        "{}  ·  {}  ·  {}",
                        section.meeting_pattern(),
                        if section.room.is_empty() { "TBA" } else { section.room.as_str() },
                        section.instructor_display()
                    )),
                ];
                if !section.prereq.trim().is_empty() {
                    lines.push(Line::from(format!("Prerequisite: {}", section.prereq)));
                }
                if !section.sbc.is_empty() {
                    lines.push(Line::from(format!("SBC: {}", section.sbc.join(", "))));
                }
                if !section.description.is_empty() {
                    lines.push(Line::from(""));
                    lines.push(Line::from(section.description.clone()));
                }
                lines
            }
            None => vec![Line::from(Span::styled(
                "Select a section to see its details",
                Style::default().fg(self.theme.muted),
            ))],
        };
        let paragraph = Paragraph::new(lines)
            .block(self.panel_block("Details".to_string(), false))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_cart(&self, frame: &mut Frame, area: Rect) {
        let focused = self.state.focus == Focus::Cart;
        let mut title = if self.is_loading() {
            format!("Cart {}", self.spinner())
        } else {
            format!(
                "Cart · {} credits",
                format_credits(self.cart.total_credits())
            )
        };
        if self.saving {
            title.push_str(" · saving");
        } else if self.cart.is_dirty() {
            title.push_str(" · unsaved changes");
        }

        let items: Vec<ListItem> = self
            .cart
            .entries()
            .iter()
            .enumerate()
            .map(|(idx, section)| {
                let color = self.theme.events[idx % self.theme.events.len()];
                ListItem::new(Line::from(vec![
                    Span::styled("■ ", Style::default().fg(color)),
                    Span::styled(section.label(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(format!(
                        "  {}  {} cr",
                        section.meeting_pattern(),
                        format_credits(section.credits)
                    )),
                ]))
            })
            .collect();

        let mut list_state = ListState::default();
        if !items.is_empty() && focused {
            list_state.select(Some(self.state.cart_cursor.min(items.len() - 1)));
        }
        let list = List::new(items)
            .block(self.panel_block(title, focused))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_schedule(&self, frame: &mut Frame, area: Rect) {
        let block = self.panel_block("Schedule".to_string(), false);
        let grid = match WeekGrid::build(
            calendar::project(self.cart.entries()),
            self.config.display_window,
            self.config.slot_minutes,
        ) {
            Ok(grid) => grid,
            Err(err) => {
                let paragraph = Paragraph::new(format!("Schedule unavailable: {err}")).block(block);
                frame.render_widget(paragraph, area);
                return;
            }
        };

        let inner_width = area.width.saturating_sub(2);
        let column = (inner_width.saturating_sub(TIME_COLUMN) / 7).max(1) as usize;
        let mut lines = Vec::with_capacity(grid.rows() + 1);

        let mut header = vec![Span::raw(" ".repeat(TIME_COLUMN as usize))];
        for day in DayLetter::ALL {
            header.push(Span::styled(
                fit(&calendar::day_name(day), column),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::from(header));

        for row in 0..grid.rows() {
            let minute = grid.slot_start_minute(row);
            let label = if minute % 60 == 0 {
                format!("{:>5} ", format_minute(minute))
            } else {
                " ".repeat(TIME_COLUMN as usize)
            };
            let mut spans = vec![Span::styled(label, Style::default().fg(self.theme.muted))];
            for day in DayLetter::ALL {
                let span = match grid.cell(row, day) {
                    Some(cell) => {
                        let color = self.event_color(&cell.event.section_id);
                        let text = if cell.first {
                            fit(&cell.event.title, column)
                        } else {
                            " ".repeat(column)
                        };
                        Span::styled(text, Style::default().bg(color).fg(self.theme.on_accent))
                    }
                    None => Span::styled(fit("·", column), Style::default().fg(self.theme.muted)),
                };
                spans.push(span);
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn event_color(&self, section_id: &str) -> Color {
        let index = self
            .cart
            .entries()
            .iter()
            .position(|entry| entry.id == section_id)
            .unwrap_or(0);
        self.theme.events[index % self.theme.events.len()]
    }

    fn render_notification(&self, frame: &mut Frame, note: &Notification) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(60_u16, frame_area.width.saturating_sub(4)), 24_u16);
        let height = 8_u16.min(frame_area.height.saturating_sub(2)).max(5_u16);
        let area = centered_rect(width, height, frame_area);

        frame.render_widget(Clear, area);
        let color = if note.kind.is_error() {
            self.theme.danger
        } else {
            self.theme.accent
        };
        let paragraph = Paragraph::new(vec![
            Line::from(note.message.clone()),
            Line::from(""),
            Line::from(vec![
                Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" dismiss"),
            ]),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(Span::styled(
                    note.header.clone(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
        )
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, keys: &str) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let mut spans = Vec::new();
        if self.is_busy() {
            spans.push(Span::styled(
                format!("{} ", self.spinner()),
                Style::default().fg(self.theme.accent),
            ));
        }
        spans.push(Span::raw(self.state.status.clone()));
        spans.push(Span::styled(
            format!("   {keys}"),
            Style::default().fg(self.theme.muted),
        ));
        let paragraph = Paragraph::new(Line::from(spans)).block(block);
        frame.render_widget(paragraph, area);
    }

    fn spinner(&self) -> &'static str {
        SPINNER[self.state.spinner % SPINNER.len()]
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    focus: Focus,
    query: String,
    results_cursor: usize,
    cart_cursor: usize,
    status: String,
    spinner: usize,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            focus: Focus::Search,
            query: String::new(),
            results_cursor: 0,
            cart_cursor: 0,
            status: "Ready".to_string(),
            spinner: 0,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn clamp_cart_cursor(&mut self, len: usize) {
        self.cart_cursor = self.cart_cursor.min(len.saturating_sub(1));
    }
}

fn step(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = cursor as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Pad or truncate `text` to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

fn format_minute(minute: u32) -> String {
    chrono::NaiveTime::from_hms_opt(minute / 60 % 24, minute % 60, 0)
        .map(format_clock)
        .unwrap_or_default()
}

fn format_credits(credits: f64) -> String {
    if credits.fract() == 0.0 {
        format!("{credits:.0}")
    } else {
        format!("{credits:.1}")
    }
}
