use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "daybook",
    version,
    about = "Terminal calendar, sticky notes and task board"
)]
pub struct Cli {
    /// Path to a config.yml (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project workspace in the current directory
    Init {
        /// Optional workspace name
        #[arg(long)]
        name: Option<String>,
    },
    /// Manage calendars
    #[command(subcommand)]
    Calendar(CalendarCommand),
    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage calendar events
    #[command(subcommand)]
    Event(EventCommand),
    /// Manage sticky notes
    #[command(subcommand)]
    Note(NoteCommand),
    /// Manage tasks on the kanban panel
    #[command(subcommand)]
    Task(TaskCommand),
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// Add a calendar
    Add { name: String },
    /// List calendars
    List,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Add a category
    Add {
        name: String,
        /// Display color (any terminal color name)
        #[arg(long)]
        color: Option<String>,
    },
    /// List categories
    List,
}

#[derive(Subcommand, Debug)]
pub enum EventCommand {
    /// Add an event
    Add {
        name: String,
        /// Start in YYYY.MM.DD@hh:mm format
        #[arg(long)]
        start: Option<String>,
        /// End in YYYY.MM.DD@hh:mm format
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Category id
        #[arg(long)]
        category: Option<String>,
        /// Calendar id (defaults to the first calendar)
        #[arg(long)]
        calendar: Option<String>,
    },
    /// List events ordered by start
    List(PageArgs),
    /// Delete an event
    Delete { event_id: String },
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// Add a sticky note
    Add {
        name: String,
        #[arg(long)]
        content: Option<String>,
        /// Column on the notes canvas
        #[arg(long, default_value_t = 2)]
        x: i32,
        /// Row on the notes canvas
        #[arg(long, default_value_t = 1)]
        y: i32,
    },
    /// List sticky notes
    List(PageArgs),
    /// Delete a sticky note
    Delete { note_id: String },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task to the To Do column
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List tasks
    List {
        /// Only show one status (todo, in-progress, done)
        #[arg(long)]
        status: Option<String>,
    },
    /// Move a task to another status
    Move { task_id: String, status: String },
    /// Delete a task
    Delete { task_id: String },
}

#[derive(Args, Debug)]
pub struct PageArgs {
    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    pub page: usize,
    /// Page size
    #[arg(long, default_value_t = 20)]
    pub size: usize,
}
