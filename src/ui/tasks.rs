use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

use super::form::{FieldValue, Form};
use super::widgets::{centered_rect, color_for_index, truncate_text};
use super::{App, FormKind, Mode};
use crate::model::{find_by_id, Task, TaskStatus, Workspace};

pub(super) struct TasksState {
    column: usize,
    row: usize,
    new_title: FieldValue,
}

impl TasksState {
    pub(super) fn new() -> Self {
        TasksState {
            column: 0,
            row: 0,
            new_title: FieldValue::default(),
        }
    }

    fn status(&self) -> TaskStatus {
        TaskStatus::ALL[self.column.min(TaskStatus::ALL.len() - 1)]
    }

    pub(super) fn clamp(&mut self, ws: &Workspace) {
        let len = ws.tasks_with_status(self.status()).len();
        self.row = self.row.min(len.saturating_sub(1));
    }

    fn current<'a>(&self, ws: &'a Workspace) -> Option<&'a Task> {
        ws.tasks_with_status(self.status()).get(self.row).copied()
    }
}

impl App {
    pub(super) fn handle_tasks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.select_column(-1),
            KeyCode::Right | KeyCode::Char('l') => self.select_column(1),
            KeyCode::Up | KeyCode::Char('k') => {
                self.tasks.row = self.tasks.row.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.tasks.row += 1;
                self.tasks.clamp(&self.source.read());
            }
            KeyCode::Char('m') | KeyCode::Char('>') => self.shift_task(1),
            KeyCode::Char('b') | KeyCode::Char('<') => self.shift_task(-1),
            KeyCode::Char('n') | KeyCode::Char('a') => {
                self.mode = Mode::TaskInput;
                self.status = "Type a task title, Enter to add".into();
            }
            KeyCode::Char('e') => {
                let ws = self.source.read();
                let Some(task) = self.tasks.current(&ws) else {
                    return;
                };
                let kind = FormKind::EditTask(task.id.clone());
                let form = Form::new()
                    .field("Name", &task.name)
                    .multiline("Description", &task.description);
                drop(ws);
                self.mode = Mode::Form { kind, form };
            }
            KeyCode::Char('d') => {
                let id = self.tasks.current(&self.source.read()).map(|t| t.id.clone());
                if let Some(task_id) = id {
                    self.mode = Mode::ConfirmDeleteTask { task_id };
                }
            }
            _ => {}
        }
    }

    fn select_column(&mut self, delta: isize) {
        let max = TaskStatus::ALL.len() as isize - 1;
        self.tasks.column = (self.tasks.column as isize + delta).clamp(0, max) as usize;
        self.tasks.clamp(&self.source.read());
    }

    fn shift_task(&mut self, delta: isize) {
        let Some((id, status)) = self
            .tasks
            .current(&self.source.read())
            .map(|t| (t.id.clone(), t.status))
        else {
            return;
        };
        let target = status.shifted(delta);
        if target == status {
            return;
        }
        let moved = self.write(
            "moving task",
            format!("Moved {} to {}", id, target.label()),
            |ws| ws.move_task(&id, target),
        );
        if moved.is_some() {
            // follow the card into its new column
            self.tasks.column = target.index();
            self.tasks.row = usize::MAX;
        }
    }

    pub(super) fn handle_task_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status = "Canceled".into();
            }
            KeyCode::Enter => self.create_task(),
            _ => {
                self.tasks.new_title.edit_line(key);
            }
        }
    }

    fn create_task(&mut self) {
        let title = self.tasks.new_title.value.trim().to_string();
        if title.is_empty() {
            return;
        }
        if self.source.read().default_calendar().is_none() {
            self.status = "Cannot create task. No calendar is available.".into();
            return;
        }
        let created = self.write("adding task", format!("Added task \"{}\"", title), |ws| {
            let task = ws.new_task(title.clone(), "")?;
            ws.add_task(task)
        });
        if created.is_some() {
            self.tasks.new_title.clear();
            self.mode = Mode::Normal;
        }
    }

    pub(super) fn save_task_form(&mut self, id: &str, form: &Form) -> bool {
        let name = form.value("Name").trim().to_string();
        let description = form.value("Description").to_string();
        self.write("updating task", format!("Updated {}", id), |ws| {
            ws.update_task(id, |task| {
                task.name = name.clone();
                task.description = description.clone();
            })
        })
        .is_some()
    }

    pub(super) fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);
        self.draw_task_input(f, layout[0]);

        let ws = self.source.read();
        self.tasks.clamp(&ws);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 3); 3])
            .split(layout[1]);

        for (idx, status) in TaskStatus::ALL.iter().enumerate() {
            let accent = color_for_index(idx);
            let focused = idx == self.tasks.column;
            let tasks = ws.tasks_with_status(*status);
            let card_width = chunks[idx].width.saturating_sub(2);
            let items = tasks
                .iter()
                .enumerate()
                .map(|(row, task)| {
                    task_item(&ws, task, card_width, focused && row == self.tasks.row)
                })
                .collect::<Vec<_>>();

            let mut state = ListState::default();
            if focused {
                state.select(Some(self.tasks.row));
            }
            let block = Block::default()
                .title(Span::styled(
                    format!("{} ({})", status.label(), tasks.len()),
                    Style::default()
                        .fg(accent)
                        .add_modifier(if focused {
                            Modifier::BOLD | Modifier::UNDERLINED
                        } else {
                            Modifier::BOLD
                        }),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent))
                .style(Style::default().bg(Color::Rgb(16, 18, 24)));

            let list = List::new(items).block(block);
            f.render_stateful_widget(list, chunks[idx], &mut state);
        }
    }

    fn draw_task_input(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let editing = matches!(self.mode, Mode::TaskInput);
        let text = if editing {
            Span::styled(self.tasks.new_title.with_caret(), Style::default().fg(Color::Cyan))
        } else if self.tasks.new_title.value.is_empty() {
            Span::styled("Press n to add a task", Style::default().fg(Color::DarkGray))
        } else {
            Span::raw(self.tasks.new_title.value.clone())
        };
        let border = if editing { Color::Cyan } else { Color::DarkGray };
        let input = Paragraph::new(Line::from(text)).block(
            Block::default()
                .title("New task")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
        f.render_widget(input, area);
    }

    pub(super) fn draw_task_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: &str) {
        let area = centered_rect(50, 30, f.size());
        let name = find_by_id(&self.source.read().tasks, task_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| task_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", name),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
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

fn task_item(ws: &Workspace, task: &Task, width: u16, selected: bool) -> ListItem<'static> {
    let inner_width = width.saturating_sub(4).max(10) as usize;
    let border_char = if selected { "=" } else { "-" };
    let edge = format!("+{}+", border_char.repeat(inner_width));
    let title = truncate_text(&task.name, inner_width.saturating_sub(2));
    let description = truncate_text(
        task.description.lines().next().unwrap_or_default(),
        inner_width.saturating_sub(2),
    );
    let calendar = ws
        .calendar_name(Some(task.calendar_id.as_str()))
        .unwrap_or("?");
    let meta = match ws.category_name(task.category_id.as_deref()) {
        Some(category) => format!("@{} #{}", calendar, category),
        None => format!("@{}", calendar),
    };
    let text_width = inner_width.saturating_sub(2);
    let meta = truncate_text(&meta, text_width);
    let lines = vec![
        Line::raw(edge.clone()),
        Line::raw(format!("| {:width$} |", title, width = text_width)),
        Line::raw(format!("| {:width$} |", description, width = text_width)),
        Line::raw(format!("| {:width$} |", meta, width = text_width)),
        Line::raw(edge),
    ];
    let base = Style::default().bg(Color::Rgb(22, 24, 30)).fg(Color::Gray);
    let mut item = ListItem::new(lines).style(base);
    if selected {
        item = item.style(
            Style::default()
                .bg(Color::Rgb(252, 214, 112))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with_tasks() -> Workspace {
        let mut ws = Workspace::default_named("t");
        for name in ["a", "b", "c"] {
            let task = ws.new_task(name, "").unwrap();
            ws.add_task(task).unwrap();
        }
        let id = ws.tasks[2].id.clone();
        ws.move_task(&id, TaskStatus::Done).unwrap();
        ws
    }

    #[test]
    fn clamp_keeps_row_inside_column() {
        let ws = workspace_with_tasks();
        let mut state = TasksState::new();
        state.row = 9;
        state.clamp(&ws);
        assert_eq!(state.row, 1);
        assert_eq!(state.current(&ws).map(|t| t.name.as_str()), Some("b"));

        state.column = 2;
        state.clamp(&ws);
        assert_eq!(state.row, 0);
        assert_eq!(state.current(&ws).map(|t| t.name.as_str()), Some("c"));
    }

    #[test]
    fn empty_column_has_no_current_task() {
        let ws = workspace_with_tasks();
        let mut state = TasksState::new();
        state.column = 1;
        state.clamp(&ws);
        assert!(state.current(&ws).is_none());
    }
}
