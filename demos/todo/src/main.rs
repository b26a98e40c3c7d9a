//! `todo-demo` command-line app
//!
//! Every invocation mounts its own view of the shared data directory. Run
//! `todo-demo stats --watch` alongside other invocations to see it follow their
//! writes.

use anyhow::{Context, anyhow};
use std::sync::Arc;
use todo_demo::{ABOUT, Command, USAGE, parse_args, render_list, render_stats};
use todo_sync_core::environment::{SystemClock, TimestampIdGenerator};
use todo_sync_core::list::TodoListEnvironment;
use todo_sync_core::stats::compute_stats;
use todo_sync_core::todo::TodoId;
use todo_sync_runtime::{FileStore, View, ViewConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_demo=info,todo_sync_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = parse_args(std::env::args().skip(1)).map_err(|e| anyhow!("{e}\n\n{USAGE}"))?;

    match command {
        Command::About => {
            println!("{ABOUT}");
            return Ok(());
        }
        Command::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        _ => {}
    }

    let view = mount()?;
    run(command, &view).await
}

fn mount() -> anyhow::Result<View> {
    let config = ViewConfig::from_env()?;
    let dir = config
        .data_dir
        .clone()
        .or_else(FileStore::default_dir)
        .context("no data directory available; set TODO_SYNC_DATA_DIR")?;
    tracing::debug!(dir = %dir.display(), slot = %config.slot, "Opening store");

    let store = Arc::new(FileStore::open(&dir)?);
    let environment =
        TodoListEnvironment::new(Arc::new(TimestampIdGenerator::new(Arc::new(SystemClock))));

    Ok(View::mount(store, environment, &config)?)
}

async fn run(command: Command, view: &View) -> anyhow::Result<()> {
    match command {
        Command::List(filter) => {
            println!("{}", render_list(&view.todos().await, filter));
        }

        Command::Add(text) => match view.add(text).await? {
            Some(todo) => println!("Added [{}] {}", todo.id(), todo.text()),
            None => {
                let reason = view
                    .last_error()
                    .await
                    .map_or_else(String::new, |e| format!(": {e}"));
                println!("Nothing added{reason}");
            }
        },

        Command::Toggle(id) => {
            let id = TodoId::new(id);
            view.toggle(id.clone()).await?;
            match view.state(|s| s.todos.get(&id).cloned()).await {
                Some(todo) if todo.completed() => println!("Done: {}", todo.text()),
                Some(todo) => println!("Not done: {}", todo.text()),
                None => println!("No task with id {id}"),
            }
        }

        Command::Remove(id) => {
            let id = TodoId::new(id);
            let existed = view.state(|s| s.todos.contains(&id)).await;
            view.remove(id.clone()).await?;
            if existed {
                println!("Removed {id}");
            } else {
                println!("No task with id {id}");
            }
        }

        Command::Stats { watch: false } => {
            println!("{}", render_stats(&view.stats().await));
        }

        Command::Stats { watch: true } => watch_stats(view).await,

        Command::About | Command::Help => {}
    }

    Ok(())
}

/// Prints stats, then reprints on every change until Ctrl-C.
async fn watch_stats(view: &View) {
    let _watch = view.watch();
    let mut snapshots = view.subscribe();

    let stats = compute_stats(&snapshots.borrow_and_update());
    println!("{}", render_stats(&stats));
    println!("\nWatching for changes (Ctrl-C to stop)...");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let stats = compute_stats(&snapshots.borrow_and_update());
                println!("\n{}", render_stats(&stats));
            }
            _ = &mut ctrl_c => {
                tracing::debug!("Interrupted, stopping watch");
                break;
            }
        }
    }
}
