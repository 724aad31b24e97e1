use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::{Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use super::form::Form;
use super::widgets::{adjust_offset, anchored_rect, truncate_text};
use super::{App, FormKind, Mode};
use crate::commands::{format_date, parse_date, DATE_FORMAT};
use crate::interaction::sync::SyncPhase;
use crate::interaction::{EntitySyncController, ReloadCompletion, SyncOutcome};
use crate::model::{generate_id, EntityId, Event, Workspace, WorkspaceError};

const POPOVER_WIDTH: u16 = 44;
const POPOVER_HEIGHT: u16 = 11;

pub(super) struct CalendarState {
    selected: usize,
    offset: usize,
    popover: Option<EventPopover>,
    pub(super) sync: EntitySyncController<Event>,
    /// Screen row of the selected item as last drawn, used to anchor the
    /// popover.
    anchor: Rect,
}

struct EventPopover {
    event_id: EntityId,
    confirming_delete: bool,
}

impl CalendarState {
    pub(super) fn new() -> Self {
        CalendarState {
            selected: 0,
            offset: 0,
            popover: None,
            sync: EntitySyncController::new(),
            anchor: Rect::default(),
        }
    }

    pub(super) fn popover_open(&self) -> bool {
        self.popover.is_some()
    }

    pub(super) fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

impl App {
    pub(super) fn handle_calendar_key(&mut self, key: KeyEvent) {
        if let Some(confirming) = self.calendar.popover.as_ref().map(|p| p.confirming_delete) {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter if confirming => self.delete_popover_event(),
                KeyCode::Char('n') | KeyCode::Esc if confirming => self.confirm_delete(false),
                _ if confirming => {}
                KeyCode::Esc | KeyCode::Char('q') => self.close_popover(),
                KeyCode::Up | KeyCode::Char('k') => {
                    self.select_event(-1);
                    self.anchor_popover();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.select_event(1);
                    self.anchor_popover();
                }
                KeyCode::Char('e') => self.edit_popover_event(),
                KeyCode::Char('d') => self.confirm_delete(true),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_event(-1),
            KeyCode::Down | KeyCode::Char('j') => self.select_event(1),
            KeyCode::Enter => self.anchor_popover(),
            KeyCode::Char('n') => {
                self.mode = Mode::Form {
                    kind: FormKind::NewEvent,
                    form: event_form(None, &self.source.read()),
                };
                self.status = format!("Creating new event (dates as {})", DATE_FORMAT);
            }
            _ => {}
        }
    }

    fn confirm_delete(&mut self, confirming: bool) {
        if let Some(popover) = &mut self.calendar.popover {
            popover.confirming_delete = confirming;
        }
    }

    fn select_event(&mut self, delta: isize) {
        let len = self.source.read().events.len();
        if len == 0 {
            return;
        }
        let max = len as isize - 1;
        self.calendar.selected = (self.calendar.selected as isize + delta).clamp(0, max) as usize;
    }

    fn selected_event(&self) -> Option<Event> {
        self.source
            .read()
            .events_by_start()
            .get(self.calendar.selected)
            .map(|e| (*e).clone())
    }

    /// Opens the popover on the selected event, or re-anchors an open one.
    /// The popover shows the list's copy right away and refreshes in place.
    fn anchor_popover(&mut self) {
        let Some(event) = self.selected_event() else {
            self.status = "No event selected".into();
            return;
        };
        self.calendar.popover = Some(EventPopover {
            event_id: event.id.clone(),
            confirming_delete: false,
        });
        if let Some(ticket) = self.calendar.sync.observe(true, Some(&event)) {
            self.spawn_popover_reload(ticket);
        }
    }

    fn close_popover(&mut self) {
        self.calendar.popover = None;
        self.calendar.sync.observe(false, None);
    }

    /// Returns `false` when the completion was superseded and must not
    /// reach any view state.
    pub(super) fn calendar_reload_settled(
        &mut self,
        completion: ReloadCompletion<Event>,
    ) -> bool {
        let message = match self.calendar.sync.complete(completion) {
            Ok(SyncOutcome::Discarded) => return false,
            Ok(SyncOutcome::Refreshed(_)) => None,
            Ok(SyncOutcome::NotFound) => Some("Event is no longer available".to_string()),
            Err(err) => Some(format!("Could not refresh event: {}", err)),
        };
        if let Some(message) = message {
            if self.calendar.popover_open() {
                self.status = message;
            }
        }
        true
    }

    fn edit_popover_event(&mut self) {
        let Some(event) = self.calendar.sync.snapshot().cloned() else {
            return;
        };
        self.close_popover();
        let form = event_form(Some(&event), &self.source.read());
        self.mode = Mode::Form {
            kind: FormKind::EditEvent(event.id.clone()),
            form,
        };
        self.status = format!("Editing {}", event.id);
    }

    fn delete_popover_event(&mut self) {
        let Some(id) = self.calendar.popover.as_ref().map(|p| p.event_id.clone()) else {
            return;
        };
        self.write(
            "deleting event",
            format!("Deleted event {}", id),
            |ws| ws.remove_event(&id).map(|_| ()),
        );
        self.close_popover();
    }

    pub(super) fn save_event_form(&mut self, id: Option<&str>, form: &Form) -> bool {
        let name = form.value("Name").trim().to_string();
        let (start, end) = match (
            parse_date(Some(form.value("Start"))),
            parse_date(Some(form.value("End"))),
        ) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(err), _) | (_, Err(err)) => {
                self.status = format!("Could not save: {}", err);
                return false;
            }
        };
        let description = Some(form.value("Description").trim().to_string())
            .filter(|d| !d.is_empty());
        let category = form.value("Category").trim().to_string();
        let calendar = form.value("Calendar").trim().to_string();

        let saved = match id {
            None => {
                let new_id = generate_id();
                self.write(
                    "adding event",
                    format!("Created event {}", new_id),
                    |ws| {
                        let category_id = resolve_category(ws, &category)?;
                        let calendar_id = resolve_calendar(ws, &calendar)?;
                        ws.add_event(Event {
                            id: new_id.clone(),
                            name,
                            description,
                            start,
                            end,
                            category_id,
                            calendar_id,
                        })
                    },
                )
            }
            Some(id) => self.write("updating event", format!("Updated {}", id), |ws| {
                let category_id = resolve_category(ws, &category)?;
                let calendar_id = resolve_calendar(ws, &calendar)?;
                ws.update_event(id, |event| {
                    event.name = name.clone();
                    event.description = description.clone();
                    event.start = start;
                    event.end = end;
                    event.category_id = category_id.clone();
                    event.calendar_id = calendar_id.clone();
                })
            }),
        };
        if saved.is_some() && id.is_some() {
            // the next open of this event should fetch the edited copy
            self.calendar.sync.invalidate();
        }
        saved.is_some()
    }

    pub(super) fn draw_calendar(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let ws = self.source.read();
        let events = ws.events_by_start();
        let block = Block::default()
            .title(Span::styled(
                format!("Events ({})", events.len()),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);

        if events.is_empty() {
            let empty = Paragraph::new("No events yet. Press n to add one.").block(block);
            f.render_widget(empty, area);
            return;
        }

        let items = events
            .iter()
            .map(|event| event_item(&ws, event, inner.width as usize))
            .collect::<Vec<_>>();
        let viewport = inner.height as usize;
        self.calendar.offset =
            adjust_offset(self.calendar.selected, self.calendar.offset, viewport, items.len());
        let mut state = ListState::default();
        state.select(Some(self.calendar.selected));
        *state.offset_mut() = self.calendar.offset;

        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);

        let row = inner.y + (self.calendar.selected - self.calendar.offset) as u16;
        let anchor_width = (inner.width / 2).max(1);
        self.calendar.anchor = Rect::new(inner.x, row, anchor_width, 1);
        drop(ws);

        self.draw_event_popover(f, area);
    }

    fn draw_event_popover(&self, f: &mut ratatui::Frame<'_>, bounds: Rect) {
        let Some(popover) = &self.calendar.popover else {
            return;
        };
        let Some(event) = self.calendar.sync.snapshot() else {
            return;
        };
        let ws = self.source.read();
        let area = anchored_rect(self.calendar.anchor, POPOVER_WIDTH, POPOVER_HEIGHT, bounds);

        let title = if event.name.is_empty() {
            "Untitled".to_string()
        } else {
            truncate_text(&event.name, POPOVER_WIDTH as usize - 6)
        };
        let refreshing = matches!(self.calendar.sync.phase(), SyncPhase::Opening { .. });

        let mut lines = Vec::new();
        if popover.confirming_delete {
            lines.push(Line::from(Span::styled(
                "Delete this event?",
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("y delete • n cancel"));
        } else {
            lines.push(Line::from(Span::styled(
                time_range(event),
                Style::default().fg(Color::Gray),
            )));
            if let Some(description) = &event.description {
                lines.push(Line::from(""));
                lines.push(Line::from(description.clone()));
            }
            lines.push(Line::from(""));
            if let Some(category) = ws.category_name(event.category_id.as_deref()) {
                lines.push(Line::from(Span::styled(
                    format!("#{}", category),
                    Style::default().fg(Color::LightMagenta),
                )));
            }
            if let Some(calendar) = ws.calendar_name(event.calendar_id.as_deref()) {
                lines.push(Line::from(Span::styled(
                    calendar.to_string(),
                    Style::default().fg(Color::LightGreen),
                )));
            }
        }

        let mut block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));
        if refreshing {
            block = block.title_bottom(Line::from(Span::styled(
                " refreshing… ",
                Style::default().fg(Color::DarkGray),
            )));
        }
        let widget = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(Clear, area);
        f.render_widget(widget, area);
    }
}

fn event_form(event: Option<&Event>, ws: &Workspace) -> Form {
    let start = event
        .and_then(|e| e.start.as_ref())
        .map(format_date)
        .unwrap_or_default();
    let end = event
        .and_then(|e| e.end.as_ref())
        .map(format_date)
        .unwrap_or_default();
    let category = event
        .and_then(|e| ws.category_name(e.category_id.as_deref()))
        .unwrap_or_default();
    let calendar = match event {
        Some(e) => ws.calendar_name(e.calendar_id.as_deref()).unwrap_or_default(),
        None => ws.default_calendar().map(|c| c.name.as_str()).unwrap_or_default(),
    };
    Form::new()
        .field("Name", event.map(|e| e.name.as_str()).unwrap_or_default())
        .field("Start", &start)
        .field("End", &end)
        .multiline(
            "Description",
            event
                .and_then(|e| e.description.as_deref())
                .unwrap_or_default(),
        )
        .field("Category", category)
        .field("Calendar", calendar)
}

fn time_range(event: &Event) -> String {
    match (event.start, event.end) {
        (Some(start), Some(end)) => format!(
            "{} – {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        ),
        _ => "No date available".to_string(),
    }
}

fn event_item(ws: &Workspace, event: &Event, width: usize) -> ListItem<'static> {
    let when = event
        .start
        .map(|s| s.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "----------------".to_string());
    let name = if event.name.is_empty() {
        "Untitled"
    } else {
        event.name.as_str()
    };
    let mut spans = vec![
        Span::styled(when, Style::default().fg(Color::LightYellow)),
        Span::raw("  "),
        Span::styled(
            truncate_text(name, width.saturating_sub(20).max(8)),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(category) = ws.category_name(event.category_id.as_deref()) {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("#{}", category),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    ListItem::new(Line::from(spans))
}

/// Blank means "no category"; otherwise match by id, then by name.
fn resolve_category(ws: &Workspace, raw: &str) -> Result<Option<EntityId>, WorkspaceError> {
    if raw.is_empty() {
        return Ok(None);
    }
    ws.categories
        .iter()
        .find(|c| c.id == raw || c.name.eq_ignore_ascii_case(raw))
        .map(|c| Some(c.id.clone()))
        .ok_or_else(|| WorkspaceError::CategoryNotFound(raw.to_string()))
}

/// Blank means the default calendar.
fn resolve_calendar(ws: &Workspace, raw: &str) -> Result<Option<EntityId>, WorkspaceError> {
    if raw.is_empty() {
        return Ok(ws.default_calendar().map(|c| c.id.clone()));
    }
    ws.calendars
        .iter()
        .find(|c| c.id == raw || c.name.eq_ignore_ascii_case(raw))
        .map(|c| Some(c.id.clone()))
        .ok_or_else(|| WorkspaceError::CalendarNotFound(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    #[test]
    fn category_resolves_by_id_or_name() {
        let mut ws = Workspace::default_named("t");
        ws.add_category(Category {
            id: "c1".into(),
            name: "Health".into(),
            color: None,
        });
        assert_eq!(resolve_category(&ws, "c1"), Ok(Some("c1".into())));
        assert_eq!(resolve_category(&ws, "health"), Ok(Some("c1".into())));
        assert_eq!(resolve_category(&ws, ""), Ok(None));
        assert!(resolve_category(&ws, "work").is_err());
    }

    #[test]
    fn blank_calendar_means_default() {
        let ws = Workspace::default_named("t");
        assert_eq!(resolve_calendar(&ws, ""), Ok(Some("personal".into())));
        assert_eq!(resolve_calendar(&ws, "Personal"), Ok(Some("personal".into())));
    }

    #[test]
    fn undated_event_reads_no_date() {
        let event = Event {
            id: "e".into(),
            name: String::new(),
            description: None,
            start: None,
            end: None,
            category_id: None,
            calendar_id: None,
        };
        assert_eq!(time_range(&event), "No date available");
    }
}
