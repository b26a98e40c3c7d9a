//! Command-line presentation for a todo list.
//!
//! Parses commands and renders collections and stats as text. All state
//! changes go through a [`View`](todo_sync_runtime::View); this module only
//! turns its snapshots into output.

use thiserror::Error;
use todo_sync_core::collection::{TodoCollection, filter_by_completion};
use todo_sync_core::stats::Stats;

/// Usage text
pub const USAGE: &str = "\
Usage: todo-demo <command>

Commands:
  list [--completed | --pending]   Show tasks
  add <text...>                    Add a task
  toggle <id>                      Mark a task done / not done
  remove <id>                      Delete a task
  stats [--watch]                  Show progress, optionally following changes
  about                            About this app
  help                             Show this message";

/// About page
pub const ABOUT: &str = "\
Todo keeps a simple task list in a data directory shared by every running
copy of the app. Add tasks, tick them off and watch your progress.

Run `todo-demo stats --watch` in one terminal while you work through your list
in another: the stats follow every change as soon as it is saved.

Data directory: $TODO_SYNC_DATA_DIR, or the platform data directory.";

/// Shown by `list` when there are no tasks at all
pub const EMPTY_LIST: &str = "No tasks yet. Add one above to get started!";

/// Shown by `stats` when there are no tasks at all
pub const EMPTY_STATS: &str = "No todos yet. Create some tasks to see statistics!";

const PROGRESS_WIDTH: usize = 20;

/// Which tasks `list` shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFilter {
    /// Every task
    #[default]
    All,
    /// Only completed tasks
    Completed,
    /// Only pending tasks
    Pending,
}

/// A parsed command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show tasks
    List(ListFilter),
    /// Add a task with this (untrimmed) text
    Add(String),
    /// Flip a task's completion
    Toggle(String),
    /// Delete a task
    Remove(String),
    /// Show stats
    Stats {
        /// Keep running and reprint on every change
        watch: bool,
    },
    /// Show the about page
    About,
    /// Show usage
    Help,
}

/// Errors from parsing the command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// Unrecognized command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Unrecognized flag for a command
    #[error("unknown option for {command}: {flag}")]
    UnknownFlag {
        /// Command being parsed
        command: &'static str,
        /// Offending flag
        flag: String,
    },

    /// A required argument is missing
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

/// Parses arguments (without the program name).
///
/// No arguments means `list`. `add` joins all remaining words, so quoting is
/// optional.
///
/// # Errors
///
/// Returns [`UsageError`] for unknown commands or flags and missing ids.
pub fn parse_args<I>(args: I) -> Result<Command, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::List(ListFilter::All));
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "list" | "ls" => {
            let filter = match rest.first().map(String::as_str) {
                None => ListFilter::All,
                Some("--completed") => ListFilter::Completed,
                Some("--pending") => ListFilter::Pending,
                Some(flag) => {
                    return Err(UsageError::UnknownFlag {
                        command: "list",
                        flag: flag.to_string(),
                    });
                }
            };
            Ok(Command::List(filter))
        }
        // Blank text is passed through; the view rejects it
        "add" => Ok(Command::Add(rest.join(" "))),
        "toggle" | "done" => single_id("toggle", rest).map(Command::Toggle),
        "remove" | "rm" => single_id("remove", rest).map(Command::Remove),
        "stats" => match rest.first().map(String::as_str) {
            None => Ok(Command::Stats { watch: false }),
            Some("--watch" | "-w") => Ok(Command::Stats { watch: true }),
            Some(flag) => Err(UsageError::UnknownFlag {
                command: "stats",
                flag: flag.to_string(),
            }),
        },
        "about" => Ok(Command::About),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(UsageError::UnknownCommand(other.to_string())),
    }
}

fn single_id(command: &'static str, rest: Vec<String>) -> Result<String, UsageError> {
    rest.into_iter()
        .next()
        .filter(|id| !id.trim().is_empty())
        .ok_or(UsageError::MissingArgument(command))
}

/// Renders the task list.
#[must_use]
pub fn render_list(todos: &TodoCollection, filter: ListFilter) -> String {
    if todos.is_empty() {
        return EMPTY_LIST.to_string();
    }

    let shown = match filter {
        ListFilter::All => todos.clone(),
        ListFilter::Completed => filter_by_completion(todos, true),
        ListFilter::Pending => filter_by_completion(todos, false),
    };

    if shown.is_empty() {
        return match filter {
            ListFilter::Completed => "No completed tasks.".to_string(),
            ListFilter::Pending | ListFilter::All => "Nothing pending. All done!".to_string(),
        };
    }

    let id_width = shown.iter().map(|t| t.id().as_str().len()).max().unwrap_or(0);
    shown
        .iter()
        .map(|todo| {
            let mark = if todo.completed() { 'x' } else { ' ' };
            format!(
                "[{mark}] {id:<id_width$}  {text}",
                id = todo.id().as_str(),
                text = todo.text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the stats page.
#[must_use]
pub fn render_stats(stats: &Stats) -> String {
    let Some(summary) = stats.summary() else {
        return EMPTY_STATS.to_string();
    };

    format!(
        "Total:      {total}\n\
         Completed:  {completed}\n\
         Pending:    {pending}\n\
         Progress:   {bar} {rate}%\n\
         {summary}",
        total = stats.total,
        completed = stats.completed,
        pending = stats.pending,
        bar = progress_bar(stats.completion_rate, PROGRESS_WIDTH),
        rate = stats.completion_rate,
    )
}

/// `[####----]` bar for a percentage, `width` cells wide
#[must_use]
pub fn progress_bar(rate: u8, width: usize) -> String {
    let filled = usize::from(rate.min(100)) * width / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
