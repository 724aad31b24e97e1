use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::widgets::centered_rect;

#[derive(Clone, Debug, Default)]
pub(super) struct FieldValue {
    pub(super) value: String,
    cursor: usize,
}

impl FieldValue {
    pub(super) fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn move_up(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx == 0 {
            return;
        }
        self.cursor = index_at_col(&self.value, line_starts[line_idx - 1], col);
    }

    fn move_down(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx + 1 >= line_starts.len() {
            return;
        }
        self.cursor = index_at_col(&self.value, line_starts[line_idx + 1], col);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub(super) fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub(super) fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    /// Single-line editing keys. Returns whether the key was consumed.
    pub(super) fn edit_line(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.len(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(c)
            }
            _ => return false,
        }
        true
    }
}

struct FormField {
    label: &'static str,
    value: FieldValue,
    multiline: bool,
}

pub(super) enum FormOutcome {
    Continue,
    Cancel,
    Submit,
}

/// Modal multi-field form. Enter submits except in multi-line fields, where
/// Ctrl+Enter does.
pub(super) struct Form {
    fields: Vec<FormField>,
    active: usize,
}

impl Form {
    pub(super) fn new() -> Self {
        Form {
            fields: Vec::new(),
            active: 0,
        }
    }

    pub(super) fn field(mut self, label: &'static str, value: &str) -> Self {
        self.fields.push(FormField {
            label,
            value: FieldValue::new(value),
            multiline: false,
        });
        self
    }

    pub(super) fn multiline(mut self, label: &'static str, value: &str) -> Self {
        self.fields.push(FormField {
            label,
            value: FieldValue::new(value),
            multiline: true,
        });
        self
    }

    pub(super) fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.value.as_str())
            .unwrap_or_default()
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) -> FormOutcome {
        let len = self.fields.len();
        match key.code {
            KeyCode::Esc => return FormOutcome::Cancel,
            KeyCode::Tab if len > 0 => {
                self.active = (self.active + 1) % len;
                return FormOutcome::Continue;
            }
            KeyCode::BackTab if len > 0 => {
                self.active = (self.active + len - 1) % len;
                return FormOutcome::Continue;
            }
            _ => {}
        }
        let Some(field) = self.fields.get_mut(self.active) else {
            return FormOutcome::Cancel;
        };
        match key.code {
            KeyCode::Up if field.multiline => field.value.move_up(),
            KeyCode::Down if field.multiline => field.value.move_down(),
            KeyCode::Enter => {
                let control = key.modifiers.contains(KeyModifiers::CONTROL);
                if field.multiline && !control {
                    field.value.insert_char('\n');
                } else {
                    return FormOutcome::Submit;
                }
            }
            _ => {
                field.value.edit_line(key);
            }
        }
        FormOutcome::Continue
    }

    pub(super) fn draw(&self, f: &mut ratatui::Frame<'_>, title: &str) {
        let area = centered_rect(70, 60, f.size());
        let mut lines = Vec::new();
        for (idx, field) in self.fields.iter().enumerate() {
            lines.extend(field_lines(field.label, &field.value, idx == self.active));
        }
        lines.push(Line::from(Span::styled(
            "Enter to save • Ctrl+Enter in multi-line fields • Esc to cancel • Tab/Shift-Tab to move",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let prefix = format!("{}: ", label);
    let spacer = " ".repeat(prefix.chars().count());
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style,
                ),
                Span::styled(line.to_string(), value_style),
            ])
        })
        .collect()
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    let line_idx = starts
        .iter()
        .rposition(|start| *start <= cursor)
        .unwrap_or(0);
    let col = text[starts[line_idx]..cursor].chars().count();
    (starts, line_idx, col)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    slice[..limit]
        .char_indices()
        .nth(target_col)
        .map(|(idx, _)| start + idx)
        .unwrap_or(start + limit)
}
