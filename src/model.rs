use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type EntityId = String;

/// Anything stored in the workspace under a stable id.
pub trait Identified {
    fn id(&self) -> &str;
}

pub fn find_by_id<'a, E: Identified>(items: &'a [E], id: &str) -> Option<&'a E> {
    items.iter().find(|item| item.id() == id)
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub calendars: Vec<Calendar>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Calendar {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub category_id: Option<EntityId>,
    pub calendar_id: Option<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextFormats {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Note {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub formats: TextFormats,
    pub category_id: Option<EntityId>,
    pub calendar_id: Option<EntityId>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub calendar_id: EntityId,
    pub category_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("calendar not found: {0}")]
    CalendarNotFound(String),
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    #[error("event not found: {0}")]
    EventNotFound(String),
    #[error("note not found: {0}")]
    NoteNotFound(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("no calendar is available")]
    NoCalendar,
    #[error("event {0} ends before it starts")]
    InvalidTimeRange(String),
    #[error("unknown task status: {0} (use todo, in-progress or done)")]
    UnknownStatus(String),
}

impl Identified for Calendar {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Category {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Event {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Note {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Workspace {
    pub fn default_named(name: impl Into<String>) -> Self {
        Workspace {
            name: name.into(),
            calendars: vec![Calendar {
                id: "personal".into(),
                name: "Personal".into(),
            }],
            categories: Vec::new(),
            events: Vec::new(),
            notes: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn default_calendar(&self) -> Option<&Calendar> {
        self.calendars.first()
    }

    pub fn calendar_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| find_by_id(&self.calendars, id))
            .map(|c| c.name.as_str())
    }

    pub fn category_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| find_by_id(&self.categories, id))
            .map(|c| c.name.as_str())
    }

    pub fn add_calendar(&mut self, calendar: Calendar) {
        self.calendars.push(calendar);
    }

    pub fn add_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    pub fn add_event(&mut self, event: Event) -> Result<(), WorkspaceError> {
        self.check_refs(event.calendar_id.as_deref(), event.category_id.as_deref())?;
        check_range(&event)?;
        self.events.push(event);
        Ok(())
    }

    pub fn update_event<F>(&mut self, id: &str, mut f: F) -> Result<(), WorkspaceError>
    where
        F: FnMut(&mut Event),
    {
        let idx = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| WorkspaceError::EventNotFound(id.to_string()))?;
        let mut updated = self.events[idx].clone();
        f(&mut updated);
        self.check_refs(updated.calendar_id.as_deref(), updated.category_id.as_deref())?;
        check_range(&updated)?;
        self.events[idx] = updated;
        Ok(())
    }

    pub fn remove_event(&mut self, id: &str) -> Result<Event, WorkspaceError> {
        let idx = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| WorkspaceError::EventNotFound(id.to_string()))?;
        Ok(self.events.remove(idx))
    }

    pub fn add_note(&mut self, note: Note) -> Result<(), WorkspaceError> {
        self.check_refs(note.calendar_id.as_deref(), note.category_id.as_deref())?;
        self.notes.push(note);
        Ok(())
    }

    pub fn update_note<F>(&mut self, id: &str, mut f: F) -> Result<(), WorkspaceError>
    where
        F: FnMut(&mut Note),
    {
        let note = self
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| WorkspaceError::NoteNotFound(id.to_string()))?;
        f(note);
        note.updated_at = Utc::now();
        Ok(())
    }

    pub fn remove_note(&mut self, id: &str) -> Result<Note, WorkspaceError> {
        let idx = self
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| WorkspaceError::NoteNotFound(id.to_string()))?;
        Ok(self.notes.remove(idx))
    }

    /// Builds a `Todo` task on the first calendar, mirroring the quick-add panel.
    pub fn new_task(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Task, WorkspaceError> {
        let calendar = self.default_calendar().ok_or(WorkspaceError::NoCalendar)?;
        let now = Utc::now();
        Ok(Task {
            id: generate_id(),
            name: name.into(),
            description: description.into(),
            status: TaskStatus::Todo,
            calendar_id: calendar.id.clone(),
            category_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn add_task(&mut self, task: Task) -> Result<(), WorkspaceError> {
        self.check_refs(Some(&task.calendar_id), task.category_id.as_deref())?;
        self.tasks.push(task);
        Ok(())
    }

    pub fn update_task<F>(&mut self, id: &str, mut f: F) -> Result<(), WorkspaceError>
    where
        F: FnMut(&mut Task),
    {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))?;
        f(task);
        task.updated_at = Utc::now();
        Ok(())
    }

    pub fn move_task(&mut self, id: &str, status: TaskStatus) -> Result<(), WorkspaceError> {
        self.update_task(id, |task| task.status = status)
    }

    pub fn remove_task(&mut self, id: &str) -> Result<Task, WorkspaceError> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))?;
        Ok(self.tasks.remove(idx))
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn events_by_start(&self) -> Vec<&Event> {
        let mut events = self.events.iter().collect::<Vec<_>>();
        // undated events sink to the bottom
        events.sort_by_key(|e| (e.start.is_none(), e.start, e.name.to_lowercase()));
        events
    }

    fn check_refs(
        &self,
        calendar_id: Option<&str>,
        category_id: Option<&str>,
    ) -> Result<(), WorkspaceError> {
        if let Some(id) = calendar_id {
            if find_by_id(&self.calendars, id).is_none() {
                return Err(WorkspaceError::CalendarNotFound(id.to_string()));
            }
        }
        if let Some(id) = category_id {
            if find_by_id(&self.categories, id).is_none() {
                return Err(WorkspaceError::CategoryNotFound(id.to_string()));
            }
        }
        Ok(())
    }
}

fn check_range(event: &Event) -> Result<(), WorkspaceError> {
    if let (Some(start), Some(end)) = (event.start, event.end) {
        if end < start {
            return Err(WorkspaceError::InvalidTimeRange(event.id.clone()));
        }
    }
    Ok(())
}

impl Note {
    pub fn new(id: EntityId, name: String, content: String, position: Position) -> Self {
        Note {
            id,
            name,
            content,
            position,
            collapsed: false,
            formats: TextFormats::default(),
            category_id: None,
            calendar_id: None,
            updated_at: Utc::now(),
        }
    }
}

impl TextFormats {
    pub fn toggle(&mut self, command: FormatCommand) {
        match command {
            FormatCommand::Bold => self.bold = !self.bold,
            FormatCommand::Italic => self.italic = !self.italic,
            FormatCommand::Underline => self.underline = !self.underline,
        }
    }

    pub fn is_active(&self, command: FormatCommand) -> bool {
        match command {
            FormatCommand::Bold => self.bold,
            FormatCommand::Italic => self.italic,
            FormatCommand::Underline => self.underline,
        }
    }
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Done => 2,
        }
    }

    /// Steps through the kanban columns, saturating at either end.
    pub fn shifted(&self, delta: isize) -> TaskStatus {
        let target = (self.index() as isize + delta).clamp(0, 2) as usize;
        TaskStatus::ALL[target]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        };
        f.write_str(raw)
    }
}

impl FromStr for TaskStatus {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "todo" | "to-do" => Ok(TaskStatus::Todo),
            "in-progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(WorkspaceError::UnknownStatus(other.to_string())),
        }
    }
}

pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str) -> Event {
        Event {
            id: id.into(),
            name: format!("event {id}"),
            description: None,
            start: None,
            end: None,
            category_id: None,
            calendar_id: Some("personal".into()),
        }
    }

    #[test]
    fn add_event_rejects_unknown_calendar() {
        let mut ws = Workspace::default_named("test");
        let mut ev = event("a");
        ev.calendar_id = Some("work".into());
        assert_eq!(
            ws.add_event(ev),
            Err(WorkspaceError::CalendarNotFound("work".into()))
        );
        assert!(ws.events.is_empty());
    }

    #[test]
    fn update_event_keeps_original_on_bad_range() {
        let mut ws = Workspace::default_named("test");
        ws.add_event(event("a")).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let result = ws.update_event("a", |e| {
            e.start = Some(start);
            e.end = Some(end);
        });
        assert_eq!(result, Err(WorkspaceError::InvalidTimeRange("a".into())));
        assert_eq!(ws.events[0].start, None);
    }

    #[test]
    fn new_task_requires_calendar() {
        let mut ws = Workspace::default_named("test");
        ws.calendars.clear();
        assert_eq!(ws.new_task("write", ""), Err(WorkspaceError::NoCalendar));
    }

    #[test]
    fn new_task_lands_in_todo_on_first_calendar() {
        let ws = Workspace::default_named("test");
        let task = ws.new_task("write", "").unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.calendar_id, "personal");
        assert_eq!(task.category_id, None);
    }

    #[test]
    fn move_task_changes_column() {
        let mut ws = Workspace::default_named("test");
        let task = ws.new_task("write", "").unwrap();
        let id = task.id.clone();
        ws.add_task(task).unwrap();
        ws.move_task(&id, TaskStatus::Done).unwrap();
        assert_eq!(ws.tasks_with_status(TaskStatus::Done).len(), 1);
        assert!(ws.tasks_with_status(TaskStatus::Todo).is_empty());
    }

    #[test]
    fn status_shift_saturates() {
        assert_eq!(TaskStatus::Todo.shifted(-1), TaskStatus::Todo);
        assert_eq!(TaskStatus::Todo.shifted(1), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.shifted(5), TaskStatus::Done);
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("TODO".parse::<TaskStatus>(), Ok(TaskStatus::Todo));
        assert!("later".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn events_sort_undated_last() {
        let mut ws = Workspace::default_named("test");
        let mut dated = event("b");
        dated.start = Some(Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap());
        ws.add_event(event("a")).unwrap();
        ws.add_event(dated).unwrap();
        let ids = ws
            .events_by_start()
            .iter()
            .map(|e| e.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn format_toggle_flips_only_target() {
        let mut formats = TextFormats::default();
        formats.toggle(FormatCommand::Italic);
        assert!(formats.is_active(FormatCommand::Italic));
        assert!(!formats.is_active(FormatCommand::Bold));
        formats.toggle(FormatCommand::Italic);
        assert_eq!(formats, TextFormats::default());
    }
}
