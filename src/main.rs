mod cli;
mod commands;
mod config;
mod interaction;
mod logging;
mod model;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = config::load_config(args.config.as_deref())?;
    let _log_guard = logging::init_tracing(&config, args.verbose)?;
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init { name } => commands::init(name),
        cli::Command::Calendar(cmd) => commands::calendar(cmd),
        cli::Command::Category(cmd) => commands::category(cmd),
        cli::Command::Event(cmd) => commands::event(cmd),
        cli::Command::Note(cmd) => commands::note(cmd),
        cli::Command::Task(cmd) => commands::task(cmd),
        cli::Command::Tui => commands::tui(&config),
    }
}
