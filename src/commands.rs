use crate::cli::{CalendarCommand, CategoryCommand, EventCommand, NoteCommand, PageArgs, TaskCommand};
use crate::config::Config;
use crate::model::{
    generate_id, Calendar, Category, Event, Note, Position, Task, TaskStatus, Workspace,
};
use crate::storage::{init_project_workspace, locate_workspace, Page, WorkspaceSource};
use crate::ui;
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::env;

pub const DATE_FORMAT: &str = "%Y.%m.%d@%H:%M";

pub fn init(name: Option<String>) -> Result<()> {
    let location = init_project_workspace(name)?;
    println!("Initialized workspace at {}", location.path.display());
    Ok(())
}

pub fn calendar(command: CalendarCommand) -> Result<()> {
    let source = open_current_workspace()?;
    match command {
        CalendarCommand::Add { name } => {
            let id = generate_id();
            source.mutate("adding calendar", |ws| {
                ws.add_calendar(Calendar {
                    id: id.clone(),
                    name: name.clone(),
                });
                Ok(())
            })?;
            println!("Added calendar {} ({})", name, id);
        }
        CalendarCommand::List => {
            let ws = source.read();
            for (idx, calendar) in ws.calendars.iter().enumerate() {
                let marker = if idx == 0 { " (default)" } else { "" };
                println!("  - {}: {}{}", calendar.id, calendar.name, marker);
            }
        }
    }
    Ok(())
}

pub fn category(command: CategoryCommand) -> Result<()> {
    let source = open_current_workspace()?;
    match command {
        CategoryCommand::Add { name, color } => {
            let id = generate_id();
            source.mutate("adding category", |ws| {
                ws.add_category(Category {
                    id: id.clone(),
                    name: name.clone(),
                    color: color.clone(),
                });
                Ok(())
            })?;
            println!("Added category {} ({})", name, id);
        }
        CategoryCommand::List => {
            let ws = source.read();
            if ws.categories.is_empty() {
                println!("  (none)");
            }
            for category in &ws.categories {
                match &category.color {
                    Some(color) => println!("  - {}: {} [{}]", category.id, category.name, color),
                    None => println!("  - {}: {}", category.id, category.name),
                }
            }
        }
    }
    Ok(())
}

pub fn event(command: EventCommand) -> Result<()> {
    let source = open_current_workspace()?;
    match command {
        EventCommand::Add {
            name,
            start,
            end,
            description,
            category,
            calendar,
        } => {
            let start = parse_date(start.as_deref())?;
            let end = parse_date(end.as_deref())?;
            let id = generate_id();
            source.mutate("adding event", |ws| {
                let calendar_id = calendar
                    .clone()
                    .or_else(|| ws.default_calendar().map(|c| c.id.clone()));
                ws.add_event(Event {
                    id: id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    start,
                    end,
                    category_id: category.clone(),
                    calendar_id,
                })
            })?;
            println!("Added event {}", id);
        }
        EventCommand::List(PageArgs { page, size }) => {
            let ws = source.read();
            let events = ws.events_by_start().into_iter().cloned().collect::<Vec<_>>();
            let page = Page::of(&events, page, size);
            print_page_header("events", &page);
            for event in &page.content {
                print_event(&ws, event);
            }
        }
        EventCommand::Delete { event_id } => {
            source.mutate("deleting event", |ws| ws.remove_event(&event_id).map(|_| ()))?;
            println!("Deleted event {}", event_id);
        }
    }
    Ok(())
}

pub fn note(command: NoteCommand) -> Result<()> {
    let source = open_current_workspace()?;
    match command {
        NoteCommand::Add {
            name,
            content,
            x,
            y,
        } => {
            let id = generate_id();
            let note = Note::new(
                id.clone(),
                name,
                content.unwrap_or_default(),
                Position {
                    x: x.max(0),
                    y: y.max(0),
                },
            );
            source.mutate("adding note", |ws| ws.add_note(note.clone()))?;
            println!("Added note {}", id);
        }
        NoteCommand::List(PageArgs { page, size }) => {
            let ws = source.read();
            let page = Page::of(&ws.notes, page, size);
            print_page_header("notes", &page);
            for note in &page.content {
                println!(
                    "  - {}: {} @ ({}, {})",
                    note.id, note.name, note.position.x, note.position.y
                );
                if !note.content.is_empty() {
                    println!("    {}", note.content.replace('\n', "\n    "));
                }
            }
        }
        NoteCommand::Delete { note_id } => {
            source.mutate("deleting note", |ws| ws.remove_note(&note_id).map(|_| ()))?;
            println!("Deleted note {}", note_id);
        }
    }
    Ok(())
}

pub fn task(command: TaskCommand) -> Result<()> {
    let source = open_current_workspace()?;
    match command {
        TaskCommand::Add { name, description } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(anyhow!("task name is required"));
            }
            let id = source
                .mutate("adding task", |ws| {
                    let task = ws.new_task(name.clone(), description.clone().unwrap_or_default())?;
                    let id = task.id.clone();
                    ws.add_task(task)?;
                    Ok(id)
                })?;
            println!("Added task {} to {}", id, TaskStatus::Todo.label());
        }
        TaskCommand::List { status } => {
            let filter = status.as_deref().map(str::parse::<TaskStatus>).transpose()?;
            let ws = source.read();
            for column in TaskStatus::ALL {
                if filter.is_some_and(|f| f != column) {
                    continue;
                }
                println!("{}", column.label());
                let tasks = ws.tasks_with_status(column);
                if tasks.is_empty() {
                    println!("  (empty)");
                }
                for task in tasks {
                    print_task(&ws, task);
                }
                println!();
            }
        }
        TaskCommand::Move { task_id, status } => {
            let status = status.parse::<TaskStatus>()?;
            source.mutate("moving task", |ws| ws.move_task(&task_id, status))?;
            println!("Moved task {} to {}", task_id, status.label());
        }
        TaskCommand::Delete { task_id } => {
            source.mutate("deleting task", |ws| ws.remove_task(&task_id).map(|_| ()))?;
            println!("Deleted task {}", task_id);
        }
    }
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let source = open_current_workspace()?;
    ui::run(source, config)
}

fn open_current_workspace() -> Result<WorkspaceSource> {
    let cwd = env::current_dir()?;
    let location = locate_workspace(&cwd)?;
    WorkspaceSource::open(location)
}

pub fn parse_date(input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let raw = match input {
        Some(r) => r.trim(),
        None => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }
    let dt = NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| anyhow!("invalid date format (use YYYY.MM.DD@hh:mm): {}", raw))?;
    Ok(Some(Utc.from_utc_datetime(&dt)))
}

pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn print_page_header<T>(what: &str, page: &Page<T>) {
    println!(
        "{} {}-{} of {} (page {}/{})",
        what,
        if page.empty {
            0
        } else {
            page.number * page.size + 1
        },
        page.number * page.size + page.number_of_elements,
        page.total_elements,
        page.number + 1,
        page.total_pages.max(1)
    );
}

fn print_event(ws: &Workspace, event: &Event) {
    let name = if event.name.is_empty() {
        "Untitled"
    } else {
        &event.name
    };
    println!("  - {}: {}", event.id, name);
    match (event.start, event.end) {
        (Some(start), Some(end)) => {
            println!("    {} - {}", format_date(&start), format_date(&end))
        }
        (Some(start), None) => println!("    from {}", format_date(&start)),
        _ => {}
    }
    if let Some(description) = &event.description {
        println!("    {}", description);
    }
    if let Some(calendar) = ws.calendar_name(event.calendar_id.as_deref()) {
        println!("    calendar: {}", calendar);
    }
    if let Some(category) = ws.category_name(event.category_id.as_deref()) {
        println!("    category: {}", category);
    }
}

fn print_task(ws: &Workspace, task: &Task) {
    println!("  - {}: {}", task.id, task.name);
    if !task.description.is_empty() {
        println!("    {}", task.description);
    }
    if let Some(category) = ws.category_name(task.category_id.as_deref()) {
        println!("    category: {}", category);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_date_accepts_workspace_format() {
        let dt = parse_date(Some(" 2026.04.09@13:45 ")).unwrap().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2026, 4, 9));
        assert_eq!((dt.hour(), dt.minute()), (13, 45));
        assert_eq!(format_date(&dt), "2026.04.09@13:45");
    }

    #[test]
    fn parse_date_blank_is_none_and_garbage_errors() {
        assert_eq!(parse_date(None).unwrap(), None);
        assert_eq!(parse_date(Some("  ")).unwrap(), None);
        assert!(parse_date(Some("tomorrow")).is_err());
    }
}
