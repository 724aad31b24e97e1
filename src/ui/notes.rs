use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use std::time::{Duration, Instant};
use tracing::debug;

use super::form::{FieldValue, Form};
use super::widgets::{anchored_rect, centered_rect, parse_color, truncate_text};
use super::{App, FormKind, Mode};
use crate::interaction::{DragController, HitTarget, Point, PointerCapture};
use crate::model::{
    find_by_id, generate_id, EntityId, FormatCommand, Note, Position, Workspace,
};

const NOTE_WIDTH: u16 = 30;
const NOTE_HEIGHT: u16 = 8;
const COLLAPSED_HEIGHT: u16 = 3;

/// Controls on a note's toolbar row, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolbarControl {
    Collapse,
    Name,
    Bold,
    Italic,
    Underline,
    Category,
    Calendar,
    Clear,
    Delete,
}

const TAIL: [ToolbarControl; 7] = [
    ToolbarControl::Bold,
    ToolbarControl::Italic,
    ToolbarControl::Underline,
    ToolbarControl::Category,
    ToolbarControl::Calendar,
    ToolbarControl::Clear,
    ToolbarControl::Delete,
];

impl ToolbarControl {
    fn glyph(&self) -> &'static str {
        match self {
            ToolbarControl::Collapse => "▾",
            ToolbarControl::Name => "",
            ToolbarControl::Bold => "B",
            ToolbarControl::Italic => "I",
            ToolbarControl::Underline => "U",
            ToolbarControl::Category => "#",
            ToolbarControl::Calendar => "@",
            ToolbarControl::Clear => "⌫",
            ToolbarControl::Delete => "✕",
        }
    }

    fn hit_target(&self) -> HitTarget {
        match self {
            ToolbarControl::Name => HitTarget::Input,
            _ => HitTarget::Button,
        }
    }
}

/// Column span of each control within a toolbar `width` cells wide. Cells
/// not covered by any span are bare handle.
fn toolbar_layout(width: u16) -> Vec<(ToolbarControl, u16, u16)> {
    let tail_len = TAIL.len() as u16 * 2 - 1;
    let tail_start = width.saturating_sub(tail_len);
    let name_len = tail_start.saturating_sub(3);
    let mut spans = vec![
        (ToolbarControl::Collapse, 0, 1),
        (ToolbarControl::Name, 2, name_len),
    ];
    spans.extend(
        TAIL.iter()
            .enumerate()
            .map(|(idx, control)| (*control, tail_start + idx as u16 * 2, 1)),
    );
    spans
}

/// What sits at column `x` of a toolbar `width` cells wide.
fn toolbar_hit(x: u16, width: u16) -> (HitTarget, Option<ToolbarControl>) {
    toolbar_layout(width)
        .into_iter()
        .find(|(_, start, len)| x >= *start && x < start + len)
        .map(|(control, _, _)| (control.hit_target(), Some(control)))
        .unwrap_or((HitTarget::Handle, None))
}

/// Screen rectangle of a note, clipped to the canvas. `None` when the note
/// sits entirely off-canvas.
fn note_rect(position: Position, collapsed: bool, canvas: Rect) -> Option<Rect> {
    let x = canvas.x.checked_add(u16::try_from(position.x.max(0)).ok()?)?;
    let y = canvas.y.checked_add(u16::try_from(position.y.max(0)).ok()?)?;
    if x >= canvas.right() || y >= canvas.bottom() {
        return None;
    }
    let height = if collapsed { COLLAPSED_HEIGHT } else { NOTE_HEIGHT };
    Some(Rect::new(
        x,
        y,
        NOTE_WIDTH.min(canvas.right() - x),
        height.min(canvas.bottom() - y),
    ))
}

/// Steps through `ids` and wraps to "none" after the last one.
fn cycle_id(ids: &[&str], current: Option<&str>) -> Option<EntityId> {
    let next = match current.and_then(|c| ids.iter().position(|id| *id == c)) {
        Some(idx) => ids.get(idx + 1),
        None => ids.first(),
    };
    next.map(|id| id.to_string())
}

fn cascade_position(count: usize) -> Position {
    Position {
        x: 2 + 4 * (count % 8) as i32,
        y: 1 + 2 * (count % 5) as i32,
    }
}

pub(super) struct NotesState {
    pub(super) drag: DragController,
    pub(super) capture: PointerCapture,
    selected: Option<EntityId>,
    /// Note under an armed or active drag, with its live position.
    dragging: Option<(EntityId, Position)>,
    /// Position written on release, shown until the reload brings it back.
    pending_position: Option<(EntityId, Position)>,
    canvas: Rect,
}

impl NotesState {
    pub(super) fn new(threshold: Duration) -> Self {
        let capture = PointerCapture::new();
        NotesState {
            drag: DragController::new(threshold, capture.clone()),
            capture,
            selected: None,
            dragging: None,
            pending_position: None,
            canvas: Rect::default(),
        }
    }

    pub(super) fn settle(&mut self, ws: &Workspace) {
        if let Some((id, position)) = &self.pending_position {
            let landed = find_by_id(&ws.notes, id).map_or(true, |n| n.position == *position);
            if landed {
                self.pending_position = None;
            }
        }
        let still_there = self
            .selected
            .as_deref()
            .is_some_and(|id| find_by_id(&ws.notes, id).is_some());
        if !still_there {
            self.selected = ws.notes.first().map(|n| n.id.clone());
        }
    }

    fn position_of(&self, note: &Note) -> Position {
        match (&self.dragging, &self.pending_position) {
            (Some((id, pos)), _) if *id == note.id => *pos,
            (_, Some((id, pos))) if *id == note.id => *pos,
            _ => note.position,
        }
    }

    fn is_selected(&self, note: &Note) -> bool {
        self.selected.as_deref() == Some(note.id.as_str())
    }

    /// Notes in paint order: the selected note goes on top.
    fn paint_order<'a>(&self, ws: &'a Workspace) -> Vec<&'a Note> {
        let mut notes = ws.notes.iter().collect::<Vec<_>>();
        notes.sort_by_key(|n| self.is_selected(n));
        notes
    }
}

impl App {
    pub(super) fn handle_notes_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab => self.cycle_note(1),
            KeyCode::BackTab => self.cycle_note(-1),
            KeyCode::Char('n') => {
                self.mode = Mode::Form {
                    kind: FormKind::NewNote,
                    form: Form::new().field("Name", "").multiline("Content", ""),
                };
                self.status = "Creating new note".into();
            }
            _ => {
                let Some(id) = self.notes.selected.clone() else {
                    return;
                };
                let control = match key.code {
                    KeyCode::Char(' ') => ToolbarControl::Collapse,
                    KeyCode::F(2) => ToolbarControl::Name,
                    KeyCode::Char('b') => ToolbarControl::Bold,
                    KeyCode::Char('i') => ToolbarControl::Italic,
                    KeyCode::Char('u') => ToolbarControl::Underline,
                    KeyCode::Char('c') => ToolbarControl::Category,
                    KeyCode::Char('k') => ToolbarControl::Calendar,
                    KeyCode::Char('x') => ToolbarControl::Clear,
                    KeyCode::Char('d') => ToolbarControl::Delete,
                    KeyCode::Char('e') => {
                        self.edit_note(&id);
                        return;
                    }
                    KeyCode::Left => return self.nudge_note(&id, -1, 0),
                    KeyCode::Right => return self.nudge_note(&id, 1, 0),
                    KeyCode::Up => return self.nudge_note(&id, 0, -1),
                    KeyCode::Down => return self.nudge_note(&id, 0, 1),
                    _ => return,
                };
                self.note_action(&id, control);
            }
        }
    }

    fn cycle_note(&mut self, delta: isize) {
        let ws = self.source.read();
        if ws.notes.is_empty() {
            return;
        }
        let len = ws.notes.len() as isize;
        let current = self
            .notes
            .selected
            .as_deref()
            .and_then(|id| ws.notes.iter().position(|n| n.id == id))
            .map_or(-1, |idx| idx as isize);
        let next = (current + delta).rem_euclid(len) as usize;
        self.notes.selected = Some(ws.notes[next].id.clone());
    }

    fn edit_note(&mut self, id: &str) {
        let ws = self.source.read();
        let Some(note) = find_by_id(&ws.notes, id) else {
            return;
        };
        let form = Form::new()
            .field("Name", &note.name)
            .multiline("Content", &note.content);
        drop(ws);
        self.mode = Mode::Form {
            kind: FormKind::EditNote(id.to_string()),
            form,
        };
        self.status = format!("Editing {}", id);
    }

    fn nudge_note(&mut self, id: &str, dx: i32, dy: i32) {
        self.write("moving note", "", |ws| {
            ws.update_note(id, |note| {
                note.position.x = (note.position.x + dx).max(0);
                note.position.y = (note.position.y + dy).max(0);
            })
        });
    }

    fn note_action(&mut self, id: &str, control: ToolbarControl) {
        let updated = |what: &str| format!("Updated {} of {}", what, id);
        match control {
            ToolbarControl::Collapse => {
                self.write("collapsing note", "", |ws| {
                    ws.update_note(id, |note| note.collapsed = !note.collapsed)
                });
            }
            ToolbarControl::Name => {
                let name = self
                    .source
                    .read()
                    .notes
                    .iter()
                    .find(|n| n.id == id)
                    .map(|n| n.name.clone());
                if let Some(name) = name {
                    self.mode = Mode::RenameNote {
                        note_id: id.to_string(),
                        field: FieldValue::new(&name),
                    };
                }
            }
            ToolbarControl::Bold | ToolbarControl::Italic | ToolbarControl::Underline => {
                let command = match control {
                    ToolbarControl::Bold => FormatCommand::Bold,
                    ToolbarControl::Italic => FormatCommand::Italic,
                    _ => FormatCommand::Underline,
                };
                self.write("formatting note", updated("format"), |ws| {
                    ws.update_note(id, |note| note.formats.toggle(command))
                });
            }
            ToolbarControl::Category => {
                self.write("setting note category", updated("category"), |ws| {
                    let ids = ws.categories.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
                    let ids = ids.iter().map(String::as_str).collect::<Vec<_>>();
                    ws.update_note(id, |note| {
                        note.category_id = cycle_id(&ids, note.category_id.as_deref())
                    })
                });
            }
            ToolbarControl::Calendar => {
                self.write("setting note calendar", updated("calendar"), |ws| {
                    let ids = ws.calendars.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
                    let ids = ids.iter().map(String::as_str).collect::<Vec<_>>();
                    ws.update_note(id, |note| {
                        note.calendar_id = cycle_id(&ids, note.calendar_id.as_deref())
                    })
                });
            }
            ToolbarControl::Clear => {
                self.write("clearing note", format!("Cleared {}", id), |ws| {
                    ws.update_note(id, |note| note.content.clear())
                });
            }
            ToolbarControl::Delete => {
                self.mode = Mode::ConfirmDeleteNote {
                    note_id: id.to_string(),
                };
            }
        }
    }

    pub(super) fn handle_rename_key(&mut self, key: KeyEvent) {
        let (note_id, mut field) = match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::RenameNote { note_id, field } => (note_id, field),
            other => {
                self.mode = other;
                return;
            }
        };
        match key.code {
            KeyCode::Esc => self.status = "Rename canceled".into(),
            KeyCode::Enter => {
                let name = field.value.trim().to_string();
                self.write("renaming note", format!("Renamed {}", note_id), |ws| {
                    ws.update_note(&note_id, |note| note.name = name.clone())
                });
            }
            _ => {
                field.edit_line(key);
                self.mode = Mode::RenameNote { note_id, field };
            }
        }
    }

    pub(super) fn save_note_form(&mut self, id: Option<&str>, form: &Form) -> bool {
        let name = form.value("Name").trim().to_string();
        let content = form.value("Content").to_string();
        let saved = match id {
            None => {
                let new_id = generate_id();
                let done = format!("Created note {}", new_id);
                let created = self.write("adding note", done, |ws| {
                    let mut note = Note::new(
                        new_id.clone(),
                        name,
                        content,
                        cascade_position(ws.notes.len()),
                    );
                    note.calendar_id = ws.default_calendar().map(|c| c.id.clone());
                    ws.add_note(note)
                });
                if created.is_some() {
                    self.notes.selected = Some(new_id);
                }
                created
            }
            Some(id) => self.write("updating note", format!("Updated {}", id), |ws| {
                ws.update_note(id, |note| {
                    note.name = name.clone();
                    note.content = content.clone();
                })
            }),
        };
        saved.is_some()
    }

    pub(super) fn handle_notes_mouse(&mut self, mouse: MouseEvent) {
        let now = Instant::now();
        let point = Point::new(mouse.column as i32, mouse.row as i32);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.notes_press(mouse.column, mouse.row, now)
            }
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
                if let Some(delta) = self.notes.drag.pointer_move(point, now) {
                    if let Some((_, position)) = &mut self.notes.dragging {
                        position.x = (position.x + delta.dx).max(0);
                        position.y = (position.y + delta.dy).max(0);
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.notes_release(),
            _ => {}
        }
    }

    fn notes_press(&mut self, column: u16, row: u16, now: Instant) {
        let hit = {
            let ws = self.source.read();
            self.notes
                .paint_order(&ws)
                .into_iter()
                .rev()
                .find_map(|note| {
                    let position = self.notes.position_of(note);
                    let rect = note_rect(position, note.collapsed, self.notes.canvas)?;
                    let inside = column >= rect.x
                        && column < rect.right()
                        && row >= rect.y
                        && row < rect.bottom();
                    inside.then(|| (note.id.clone(), position, rect))
                })
        };
        let Some((id, position, rect)) = hit else {
            return;
        };
        self.notes.selected = Some(id.clone());

        // the toolbar is the first row inside the border
        if row != rect.y + 1 || column == rect.x || column + 1 >= rect.right() {
            return;
        }
        let (target, control) = toolbar_hit(column - rect.x - 1, rect.width.saturating_sub(2));
        if self
            .notes
            .drag
            .press(Point::new(column as i32, row as i32), target, now)
        {
            self.notes.dragging = Some((id, position));
        } else if let Some(control) = control {
            self.note_action(&id, control);
        }
    }

    fn notes_release(&mut self) {
        let was_active = self.notes.drag.is_active();
        self.notes.drag.release();
        let Some((id, position)) = self.notes.dragging.take() else {
            return;
        };
        if !was_active {
            return;
        }
        debug!(note = %id, x = position.x, y = position.y, "note dropped");
        self.notes.pending_position = Some((id.clone(), position));
        let moved = self.write("moving note", format!("Moved {}", id), |ws| {
            ws.update_note(&id, |note| note.position = position)
        });
        if moved.is_none() {
            self.notes.pending_position = None;
        }
    }

    pub(super) fn draw_notes(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let ws = self.source.read();
        let block = Block::default()
            .title(Span::styled(
                format!("Notes ({})", ws.notes.len()),
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .style(Style::default().bg(Color::Rgb(16, 18, 24)));
        self.notes.canvas = block.inner(area);
        f.render_widget(block, area);

        if ws.notes.is_empty() {
            let empty = Paragraph::new("No notes yet. Press n to add one.")
                .alignment(Alignment::Center);
            f.render_widget(empty, self.notes.canvas);
            return;
        }

        let renaming = match &self.mode {
            Mode::RenameNote { note_id, field } => Some((note_id.as_str(), field)),
            _ => None,
        };
        for note in self.notes.paint_order(&ws) {
            let position = self.notes.position_of(note);
            let Some(rect) = note_rect(position, note.collapsed, self.notes.canvas) else {
                continue;
            };
            let rename = renaming
                .filter(|(id, _)| *id == note.id)
                .map(|(_, field)| field);
            let selected = self.notes.is_selected(note);
            let dragging = self
                .notes
                .dragging
                .as_ref()
                .is_some_and(|(id, _)| *id == note.id && self.notes.drag.is_active());
            draw_note(f, &ws, note, rect, selected, dragging, rename);
        }
    }

    pub(super) fn draw_note_confirm(&self, f: &mut ratatui::Frame<'_>, note_id: &str) {
        let ws = self.source.read();
        let note = find_by_id(&ws.notes, note_id);
        let name = note
            .map(|n| n.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| note_id.to_string());
        let area = note
            .and_then(|n| note_rect(self.notes.position_of(n), n.collapsed, self.notes.canvas))
            .map(|rect| anchored_rect(rect, 36, 6, f.size()))
            .unwrap_or_else(|| centered_rect(50, 30, f.size()));
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", truncate_text(&name, 24)),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Delete Note",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn draw_note(
    f: &mut ratatui::Frame<'_>,
    ws: &Workspace,
    note: &Note,
    rect: Rect,
    selected: bool,
    dragging: bool,
    rename: Option<&FieldValue>,
) {
    let category = note
        .category_id
        .as_deref()
        .and_then(|id| find_by_id(&ws.categories, id));
    let accent = parse_color(category.and_then(|c| c.color.as_deref()));
    let inner_width = rect.width.saturating_sub(2);

    let mut toolbar = Vec::new();
    let mut cursor = 0;
    for (control, start, len) in toolbar_layout(inner_width) {
        if start > cursor {
            toolbar.push(Span::raw(" ".repeat((start - cursor) as usize)));
        }
        let span = match control {
            ToolbarControl::Name => {
                let text = match rename {
                    Some(field) => field.with_caret(),
                    None if note.name.is_empty() => "Untitled".to_string(),
                    None => note.name.clone(),
                };
                let text = truncate_text(&text, len as usize);
                let style = if rename.is_some() {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
                };
                Span::styled(format!("{:width$}", text, width = len as usize), style)
            }
            ToolbarControl::Collapse => Span::styled(
                if note.collapsed { "▸" } else { control.glyph() },
                Style::default().fg(accent),
            ),
            ToolbarControl::Bold | ToolbarControl::Italic | ToolbarControl::Underline => {
                let command = match control {
                    ToolbarControl::Bold => FormatCommand::Bold,
                    ToolbarControl::Italic => FormatCommand::Italic,
                    _ => FormatCommand::Underline,
                };
                let style = if note.formats.is_active(command) {
                    Style::default().fg(Color::Black).bg(accent)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Span::styled(control.glyph(), style)
            }
            ToolbarControl::Delete => {
                Span::styled(control.glyph(), Style::default().fg(Color::LightRed))
            }
            _ => Span::styled(control.glyph(), Style::default().fg(Color::Gray)),
        };
        toolbar.push(span);
        cursor = start + len;
    }

    let mut lines = vec![Line::from(toolbar)];
    if !note.collapsed {
        let mut modifier = Modifier::empty();
        if note.formats.bold {
            modifier |= Modifier::BOLD;
        }
        if note.formats.italic {
            modifier |= Modifier::ITALIC;
        }
        if note.formats.underline {
            modifier |= Modifier::UNDERLINED;
        }
        let text_style = Style::default().fg(Color::White).add_modifier(modifier);
        lines.extend(
            note.content
                .lines()
                .map(|line| Line::from(Span::styled(line.to_string(), text_style))),
        );
    }

    let meta = [
        category.map(|c| format!("#{}", c.name)),
        ws.calendar_name(note.calendar_id.as_deref())
            .map(|name| format!("@{}", name)),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    let border_type = if dragging {
        BorderType::Double
    } else if selected {
        BorderType::Thick
    } else {
        BorderType::Rounded
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(Style::default().fg(accent))
        .style(Style::default().bg(Color::Rgb(22, 24, 30)));
    if !meta.is_empty() && !note.collapsed {
        block = block.title_bottom(Line::from(Span::styled(
            truncate_text(&meta, inner_width as usize),
            Style::default().fg(Color::DarkGray),
        )));
    }
    let widget = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(Clear, rect);
    f.render_widget(widget, rect);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolbar_gaps_are_handle_and_controls_are_not() {
        let width = NOTE_WIDTH - 2;
        assert_eq!(toolbar_hit(1, width), (HitTarget::Handle, None));
        assert_eq!(
            toolbar_hit(0, width),
            (HitTarget::Button, Some(ToolbarControl::Collapse))
        );
        assert_eq!(
            toolbar_hit(4, width),
            (HitTarget::Input, Some(ToolbarControl::Name))
        );
        assert_eq!(
            toolbar_hit(width - 1, width),
            (HitTarget::Button, Some(ToolbarControl::Delete))
        );
        assert_eq!(toolbar_hit(width - 2, width), (HitTarget::Handle, None));
    }

    #[test]
    fn toolbar_controls_do_not_overlap() {
        let layout = toolbar_layout(NOTE_WIDTH - 2);
        assert_eq!(layout.len(), 9);
        for pair in layout.windows(2) {
            let (_, start, len) = pair[0];
            assert!(start + len < pair[1].1);
        }
    }

    #[test]
    fn note_rect_clips_to_canvas() {
        let canvas = Rect::new(1, 1, 40, 10);
        assert_eq!(
            note_rect(Position { x: 0, y: 0 }, false, canvas),
            Some(Rect::new(1, 1, NOTE_WIDTH, NOTE_HEIGHT))
        );
        assert_eq!(
            note_rect(Position { x: 20, y: 5 }, true, canvas),
            Some(Rect::new(21, 6, 20, COLLAPSED_HEIGHT))
        );
        assert_eq!(note_rect(Position { x: 45, y: 0 }, false, canvas), None);
    }

    #[test]
    fn far_off_canvas_positions_do_not_wrap() {
        let canvas = Rect::new(1, 1, 40, 10);
        assert_eq!(note_rect(Position { x: 65_540, y: 0 }, false, canvas), None);
        assert_eq!(note_rect(Position { x: 0, y: 65_538 }, false, canvas), None);
        assert_eq!(note_rect(Position { x: i32::MAX, y: i32::MAX }, true, canvas), None);
        assert_eq!(
            note_rect(Position { x: -3, y: -7 }, true, canvas),
            Some(Rect::new(1, 1, NOTE_WIDTH, COLLAPSED_HEIGHT))
        );
    }

    #[test]
    fn cycling_wraps_through_none() {
        let ids = ["a", "b"];
        assert_eq!(cycle_id(&ids, None), Some("a".into()));
        assert_eq!(cycle_id(&ids, Some("a")), Some("b".into()));
        assert_eq!(cycle_id(&ids, Some("b")), None);
        assert_eq!(cycle_id(&[], None), None);
    }

    #[test]
    fn settle_clears_landed_position() {
        let mut state = NotesState::new(Duration::from_millis(200));
        let mut ws = Workspace::default_named("t");
        let note = Note::new("n1".into(), "n".into(), String::new(), Position { x: 5, y: 3 });
        ws.notes.push(note.clone());
        state.pending_position = Some(("n1".into(), Position { x: 9, y: 3 }));
        state.settle(&ws);
        assert_eq!(state.position_of(&note), Position { x: 9, y: 3 });
        ws.notes[0].position = Position { x: 9, y: 3 };
        state.settle(&ws);
        assert!(state.pending_position.is_none());
        assert_eq!(state.selected.as_deref(), Some("n1"));
    }
}
