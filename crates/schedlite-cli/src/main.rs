use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use schedlite_dispatch::ActionDispatcher;
use schedlite_engine::Engine;
use schedlite_store::TaskStore;
use schedlite_types::Frequency;
use schedlite_types::time::format_schedule_time;

#[derive(Parser)]
#[command(name = "schedlite", about = "Persisted cron-driven task scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a new item
    Add {
        /// Grouping label for the item (anything you like)
        #[arg(short, long)]
        name: String,

        /// When the item becomes due: YYYY-MM-DD or YYYY-MM-DD_HH:MM:SS,
        /// now or later
        #[arg(short, long)]
        time: String,

        /// URL to request when the item fires (mutually exclusive with --command)
        #[arg(short, long)]
        url: Option<String>,

        /// Shell command to run when the item fires (mutually exclusive with --url)
        #[arg(short, long)]
        command: Option<String>,

        /// How often the item repeats: once, hourly, daily, weekly or monthly
        #[arg(short, long, default_value = "once")]
        frequency: Frequency,
    },
    /// Dispatch due items; point a crontab entry at this
    Run {
        /// Only consider items with this name ("all" for everything)
        #[arg(short, long, default_value = "all")]
        name: String,
    },
    /// List pending items
    List {
        /// Only list items with this name ("all" for everything)
        #[arg(short, long, default_value = "all")]
        name: String,

        /// Emit the pending items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete every pending item (irreversible)
    #[command(name = "removeall")]
    RemoveAll,
}

/// "all" is the CLI sentinel for an unfiltered query.
fn name_filter(name: &str) -> Option<&str> {
    (name != "all").then_some(name)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = schedlite_config::load_config().context("failed to load config")?;
    let db_path = config.db_path()?;
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let store = Arc::new(TaskStore::open(&db_path)?);
    let dispatcher = Arc::new(ActionDispatcher::new(
        Duration::from_secs(config.http_timeout_secs),
        config.shell.as_str(),
    )?);
    let engine = Engine::new(store, dispatcher);

    match cli.command {
        Commands::Add {
            name,
            time,
            url,
            command,
            frequency,
        } => {
            let task = engine.register(
                &name,
                &time,
                url.as_deref(),
                command.as_deref(),
                frequency,
            )?;
            println!(
                "scheduled '{}' item '{}' for {}",
                task.frequency,
                task.name,
                format_schedule_time(task.scheduled_at)
            );
        }
        Commands::Run { name } => {
            let rt = tokio::runtime::Runtime::new()?;
            let report = rt.block_on(engine.run(name_filter(&name)))?;
            for item in &report.dispatched {
                match &item.result {
                    Ok(output) => println!("{}: {}", item.task.name, output.trim_end()),
                    Err(e) => eprintln!("{}: dispatch failed: {e}", item.task.name),
                }
            }
            if report.triggered() {
                println!("triggered");
            } else {
                println!("nothing to do...");
            }
        }
        Commands::List { name, json } => {
            let tasks = engine.list(name_filter(&name))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("no scheduled items set...");
            } else {
                for task in &tasks {
                    println!(
                        "{} - {} - {} - {}",
                        format_schedule_time(task.scheduled_at),
                        task.frequency,
                        task.name,
                        task.action.target()
                    );
                }
            }
        }
        Commands::RemoveAll => {
            let n = engine.remove_all()?;
            println!("removed {n} scheduled item(s)");
        }
    }

    Ok(())
}
