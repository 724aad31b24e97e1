mod calendar;
mod form;
mod notes;
mod tasks;
mod widgets;

use crate::config::Config;
use crate::interaction::{run_reload, ReloadCompletion, SyncError};
use crate::model::{EntityId, Event};
use crate::storage::WorkspaceSource;
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as TermEvent, KeyCode, KeyEvent,
    KeyEventKind, MouseEvent,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use calendar::CalendarState;
use form::{Form, FormOutcome};
use notes::NotesState;
use tasks::TasksState;
use widgets::format_elapsed;

pub fn run(source: WorkspaceSource, config: &Config) -> Result<()> {
    let runtime = Runtime::new()?;
    let mut terminal = setup_terminal()?;
    let mut app = App::new(source, config, runtime.handle().clone());
    info!(path = %app.source.location().path.display(), "tui started");
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

/// A settled background reload, delivered back to the UI thread.
enum Completion {
    Workspace {
        message: String,
        result: Result<(), SyncError>,
    },
    EventPopover(ReloadCompletion<Event>),
}

struct App {
    source: WorkspaceSource,
    runtime: Handle,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
    tick: Duration,
    last_reload: Instant,
    status: String,
    mode: Mode,
    view: ViewMode,
    calendar: CalendarState,
    notes: NotesState,
    tasks: TasksState,
}

enum Mode {
    Normal,
    Form { kind: FormKind, form: Form },
    RenameNote { note_id: EntityId, field: form::FieldValue },
    ConfirmDeleteNote { note_id: EntityId },
    ConfirmDeleteTask { task_id: EntityId },
    TaskInput,
}

enum FormKind {
    NewEvent,
    EditEvent(EntityId),
    NewNote,
    EditNote(EntityId),
    EditTask(EntityId),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ViewMode {
    Calendar,
    Notes,
    Tasks,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Calendar => "Calendar",
            ViewMode::Notes => "Notes",
            ViewMode::Tasks => "Tasks",
        }
    }
}

impl FormKind {
    fn title(&self) -> &'static str {
        match self {
            FormKind::NewEvent => "New Event",
            FormKind::EditEvent(_) => "Edit Event",
            FormKind::NewNote => "New Note",
            FormKind::EditNote(_) => "Edit Note",
            FormKind::EditTask(_) => "Edit Task",
        }
    }
}

impl App {
    fn new(source: WorkspaceSource, config: &Config, runtime: Handle) -> Self {
        let status = format!("Loaded workspace from {}", source.location().path.display());
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let mut app = App {
            source,
            runtime,
            completions_tx,
            completions_rx,
            tick: config.tick(),
            last_reload: Instant::now(),
            status,
            mode: Mode::Normal,
            view: ViewMode::Calendar,
            calendar: CalendarState::new(),
            notes: NotesState::new(config.drag_threshold()),
            tasks: TasksState::new(),
        };
        app.after_reload();
        app
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.drain_completions();
            self.notes.drag.tick(Instant::now());
            terminal.draw(|f| self.draw(f))?;
            if event::poll(self.poll_timeout())? {
                match event::read()? {
                    TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    TermEvent::Mouse(mouse) => self.handle_mouse(mouse)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Wakes up early when an armed drag is about to activate.
    fn poll_timeout(&self) -> Duration {
        match self.notes.drag.time_to_activation(Instant::now()) {
            Some(remaining) => remaining.min(self.tick),
            None => self.tick,
        }
    }

    /// Re-reads the workspace in the background. Every store write is
    /// followed by one of these.
    fn spawn_reload(&self, message: impl Into<String>) {
        let reload = self.source.reload();
        let tx = self.completions_tx.clone();
        let message = message.into();
        self.runtime.spawn(async move {
            let result = reload.await;
            let _ = tx.send(Completion::Workspace { message, result });
        });
    }

    fn spawn_popover_reload(&self, ticket: crate::interaction::SyncTicket) {
        let events = self.source.events();
        let tx = self.completions_tx.clone();
        self.runtime.spawn(async move {
            let completion = run_reload(&events, ticket).await;
            let _ = tx.send(Completion::EventPopover(completion));
        });
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            match completion {
                Completion::Workspace { message, result } => match result {
                    Ok(()) => {
                        self.last_reload = Instant::now();
                        self.after_reload();
                        if !message.is_empty() {
                            self.status = message;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "workspace reload failed");
                        self.status = format!("Could not refresh: {}", err);
                    }
                },
                Completion::EventPopover(completion) => {
                    if self.calendar_reload_settled(completion) {
                        self.last_reload = Instant::now();
                        self.after_reload();
                    }
                }
            }
        }
    }

    fn after_reload(&mut self) {
        let ws = self.source.read();
        self.calendar.sync.reconcile(&ws.events);
        self.notes.settle(&ws);
        self.calendar.clamp(ws.events.len());
        self.tasks.clamp(&ws);
    }

    /// Runs a store write and queues the follow-up reload. Failures land in
    /// the status line.
    fn write<T, F>(&mut self, action: &str, done: impl Into<String>, f: F) -> Option<T>
    where
        F: FnOnce(&mut crate::model::Workspace) -> Result<T, crate::model::WorkspaceError>,
    {
        match self.source.mutate(action, f) {
            Ok(value) => {
                self.spawn_reload(done);
                Some(value)
            }
            Err(err) => {
                debug!(error = %err, action, "write rejected");
                self.status = format!("{:#}", err);
                None
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => Ok(self.handle_normal_key(key)),
            Mode::Form { .. } => {
                self.handle_form_key(key);
                Ok(false)
            }
            Mode::RenameNote { .. } => {
                self.handle_rename_key(key);
                Ok(false)
            }
            Mode::ConfirmDeleteNote { .. } | Mode::ConfirmDeleteTask { .. } => {
                self.handle_confirm_key(key);
                Ok(false)
            }
            Mode::TaskInput => {
                self.handle_task_input_key(key);
                Ok(false)
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        if !self.calendar.popover_open() {
            match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Char('1') => {
                    self.set_view(ViewMode::Calendar);
                    return false;
                }
                KeyCode::Char('2') => {
                    self.set_view(ViewMode::Notes);
                    return false;
                }
                KeyCode::Char('3') => {
                    self.set_view(ViewMode::Tasks);
                    return false;
                }
                KeyCode::Char('r') => {
                    self.spawn_reload("Refreshed");
                    return false;
                }
                _ => {}
            }
        }
        match self.view {
            ViewMode::Calendar => self.handle_calendar_key(key),
            ViewMode::Notes => self.handle_notes_key(key),
            ViewMode::Tasks => self.handle_tasks_key(key),
        }
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        // captured drags see every pointer event regardless of view or mode
        if self.notes.capture.is_captured() || self.view == ViewMode::Notes {
            self.handle_notes_mouse(mouse);
        }
        Ok(())
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.notes.drag.release();
            self.view = view;
            self.status = format!("Switched to {} view", view.label());
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        if let Mode::Form { kind, form } = &mut mode {
            match form.handle_key(key) {
                FormOutcome::Continue => {}
                FormOutcome::Cancel => {
                    self.status = "Canceled".into();
                    return;
                }
                FormOutcome::Submit => {
                    if self.submit_form(kind, form) {
                        return;
                    }
                }
            }
        }
        self.mode = mode;
    }

    /// Returns whether the form can close.
    fn submit_form(&mut self, kind: &FormKind, form: &Form) -> bool {
        match kind {
            FormKind::NewEvent => self.save_event_form(None, form),
            FormKind::EditEvent(id) => self.save_event_form(Some(id.as_str()), form),
            FormKind::NewNote => self.save_note_form(None, form),
            FormKind::EditNote(id) => self.save_note_form(Some(id.as_str()), form),
            FormKind::EditTask(id) => self.save_task_form(id, form),
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let confirmed = match key.code {
            KeyCode::Char('y') | KeyCode::Enter => true,
            KeyCode::Char('n') | KeyCode::Esc => false,
            _ => return,
        };
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        if !confirmed {
            self.status = "Delete canceled".into();
            return;
        }
        match mode {
            Mode::ConfirmDeleteNote { note_id } => {
                self.write(
                    "deleting note",
                    format!("Deleted note {}", note_id),
                    |ws| ws.remove_note(&note_id).map(|_| ()),
                );
            }
            Mode::ConfirmDeleteTask { task_id } => {
                self.write(
                    "deleting task",
                    format!("Deleted task {}", task_id),
                    |ws| ws.remove_task(&task_id).map(|_| ()),
                );
            }
            _ => {}
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            ViewMode::Calendar => self.draw_calendar(f, layout[1]),
            ViewMode::Notes => self.draw_notes(f, layout[1]),
            ViewMode::Tasks => self.draw_tasks(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Form { kind, form } => form.draw(f, kind.title()),
            Mode::ConfirmDeleteNote { note_id } => self.draw_note_confirm(f, note_id),
            Mode::ConfirmDeleteTask { task_id } => self.draw_task_confirm(f, task_id),
            Mode::Normal | Mode::RenameNote { .. } | Mode::TaskInput => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let location = self.source.location();
        let name = self.source.read().name.clone();
        let title = Line::from(vec![
            Span::styled(
                "daybook ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(name, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            Span::styled(location.scope.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("synced {}", format_elapsed(self.last_reload)),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color));
        let mut spans = vec![
            key("1", Color::LightCyan),
            Span::raw(" calendar  "),
            key("2", Color::LightCyan),
            Span::raw(" notes  "),
            key("3", Color::LightCyan),
            Span::raw(" tasks  "),
        ];
        match self.view {
            ViewMode::Calendar if self.calendar.popover_open() => spans.extend([
                key("↑↓", Color::LightCyan),
                Span::raw(" re-anchor  "),
                key("e", Color::LightYellow),
                Span::raw(" edit  "),
                key("d", Color::LightRed),
                Span::raw(" delete  "),
                key("Esc", Color::LightRed),
                Span::raw(" close"),
            ]),
            ViewMode::Calendar => spans.extend([
                key("↑↓ / j k", Color::LightCyan),
                Span::raw(" browse  "),
                key("Enter", Color::LightYellow),
                Span::raw(" details  "),
                key("n", Color::LightMagenta),
                Span::raw(" new  "),
            ]),
            ViewMode::Notes => spans.extend([
                key("drag toolbar", Color::LightCyan),
                Span::raw(" move  "),
                key("Tab", Color::LightCyan),
                Span::raw(" select  "),
                key("b i u", Color::LightGreen),
                Span::raw(" format  "),
                key("space", Color::LightGreen),
                Span::raw(" collapse  "),
                key("n", Color::LightMagenta),
                Span::raw(" new  "),
                key("e", Color::LightYellow),
                Span::raw(" edit  "),
                key("d", Color::LightRed),
                Span::raw(" delete  "),
            ]),
            ViewMode::Tasks => spans.extend([
                key("←↑↓→", Color::LightCyan),
                Span::raw(" move  "),
                key("m/>", Color::LightGreen),
                Span::raw(" forward  "),
                key("b/<", Color::LightGreen),
                Span::raw(" back  "),
                key("n", Color::LightMagenta),
                Span::raw(" new  "),
                key("e", Color::LightYellow),
                Span::raw(" edit  "),
                key("d", Color::LightRed),
                Span::raw(" delete  "),
            ]),
        }
        if !self.calendar.popover_open() {
            spans.extend([
                key("r", Color::LightCyan),
                Span::raw(" refresh  "),
                key("q", Color::LightRed),
                Span::raw(" quit"),
            ]);
        }
        Line::from(spans)
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_workspace_in;

    fn event(id: &str, name: &str) -> Event {
        Event {
            id: id.into(),
            name: name.into(),
            description: None,
            start: None,
            end: None,
            category_id: None,
            calendar_id: None,
        }
    }

    fn rename_event(source: &WorkspaceSource, id: &str, name: &str) {
        source
            .mutate("renaming event", |ws| {
                ws.update_event(id, |e| e.name = name.to_string())
            })
            .unwrap();
    }

    #[test]
    fn superseded_popover_reload_leaves_snapshot_alone() {
        let runtime = Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let location = init_workspace_in(dir.path(), None).unwrap();
        let source = WorkspaceSource::open(location).unwrap();
        source
            .mutate("seeding events", |ws| {
                ws.add_event(event("a", "A"))?;
                ws.add_event(event("b", "B new"))
            })
            .unwrap();
        runtime.block_on(source.reload()).unwrap();

        let mut app = App::new(source.clone(), &Config::default(), runtime.handle().clone());
        let ticket_a = app.calendar.sync.observe(true, Some(&event("a", "A"))).unwrap();
        let ticket_b = app
            .calendar
            .sync
            .observe(true, Some(&event("b", "B new")))
            .unwrap();

        app.completions_tx
            .send(Completion::EventPopover(ReloadCompletion {
                ticket: ticket_b,
                result: Ok(vec![event("a", "A"), event("b", "B new")]),
            }))
            .unwrap();
        app.drain_completions();
        assert_eq!(app.calendar.sync.snapshot().unwrap().name, "B new");

        // the shared collection now disagrees with the synced snapshot
        rename_event(&source, "b", "B old");
        runtime.block_on(source.reload()).unwrap();

        app.completions_tx
            .send(Completion::EventPopover(ReloadCompletion {
                ticket: ticket_a,
                result: Ok(vec![event("a", "A"), event("b", "B old")]),
            }))
            .unwrap();
        app.drain_completions();
        assert_eq!(app.calendar.sync.snapshot().unwrap().name, "B new");
        assert_eq!(app.calendar.sync.last_synced(), Some("b"));
    }
}
