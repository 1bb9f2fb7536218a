use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use pulse_core::{DayPrefs, Enricher, PlanError, PlanService, TaskPatch, TaskStatus};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod config;
mod llm;
mod render;
mod state;
mod store;

use store::{NewTask, SqliteStore};

#[derive(Parser, Debug)]
#[command(
    name = "pulse",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("PULSE_BUILD_SHA"), ")"),
    about = "Pulse: single-day planner with live replanning"
)]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Record a status event for today (started, blocked, deferred, done, completed)
    Event {
        kind: String,

        #[arg(long)]
        task: Option<i64>,

        #[arg(long, default_value = "")]
        meta: String,
    },

    /// Plan operations for today
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },

    /// End-of-day review of today's plan
    Review,

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Add a task (status starts as todo)
    Add {
        title: String,

        #[arg(long, default_value = "")]
        notes: String,

        /// 1 = high, 3 = low
        #[arg(long, default_value_t = 2)]
        priority: i32,

        /// Estimate in minutes
        #[arg(long, default_value_t = 30)]
        estimate: i32,
    },

    /// List tasks, newest first
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
    },

    /// Update fields of a task
    Update {
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        priority: Option<i32>,

        #[arg(long)]
        estimate: Option<i32>,

        #[arg(long)]
        status: Option<TaskStatus>,
    },
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// Show today's plan
    Today,

    /// Generate a fresh plan for today (drops locks)
    Generate {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        buffer_pct: Option<f64>,

        /// Put Admin before Deep Work
        #[arg(long, default_value_t = false)]
        admin_first: bool,

        #[arg(long)]
        max_per_block: Option<usize>,
    },

    /// Lock a block so replans keep its tasks (layout follows the generated plan)
    Lock {
        block_id: String,

        /// Unlock instead
        #[arg(long, default_value_t = false)]
        unlock: bool,
    },

    /// Move a task between blocks (or reorder within one)
    Move {
        task_id: i64,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Recompute today's plan from events, keeping locked blocks
    Replan,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,

    /// Print the effective config
    Show,
}

type Service = PlanService<SqliteStore, Box<dyn Enricher + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },

        Command::Task { command } => {
            let store = SqliteStore::open(&state::db_path()?)?;
            match command {
                TaskCommand::Add {
                    title,
                    notes,
                    priority,
                    estimate,
                } => {
                    let task = store.add_task(NewTask {
                        title,
                        notes,
                        priority,
                        estimate_min: estimate,
                    })?;
                    emit(json, &task, || format!("Added task #{} {}\n", task.id, task.title))?;
                }
                TaskCommand::List { status } => {
                    let records = store.list_tasks(status)?;
                    emit(json, &records, || render::tasks_text(&records))?;
                }
                TaskCommand::Update {
                    id,
                    title,
                    notes,
                    priority,
                    estimate,
                    status,
                } => {
                    let patch = TaskPatch {
                        title,
                        notes,
                        priority,
                        estimate_min: estimate,
                        status,
                    };
                    if patch.is_empty() {
                        bail!("nothing to update (pass at least one of --title/--notes/--priority/--estimate/--status)");
                    }
                    let task = store.patch_task(id, &patch)?;
                    emit(json, &task, || format!("Updated task #{} {}\n", task.id, task.title))?;
                }
            }
        }

        Command::Event { kind, task, meta } => {
            let store = SqliteStore::open(&state::db_path()?)?;
            let ev = store.log_event(&kind, task, &meta)?;
            emit(json, &ev, || format!("Logged {kind} event\n"))?;
        }

        Command::Plan { command } => {
            let cfg = config::load_config()?;
            let svc = service(&cfg)?;
            let day = today();

            let plan = match command {
                PlanCommand::Today => svc.today(day).map_err(no_plan_hint)?,
                PlanCommand::Generate {
                    start,
                    end,
                    buffer_pct,
                    admin_first,
                    max_per_block,
                } => {
                    let prefs = DayPrefs {
                        work_start: start.unwrap_or(cfg.day.work_start.clone()),
                        work_end: end.unwrap_or(cfg.day.work_end.clone()),
                        buffer_pct: buffer_pct.unwrap_or(cfg.day.buffer_pct),
                        deep_work_first: !admin_first && cfg.day.deep_work_first,
                        max_tasks_per_block: max_per_block.unwrap_or(cfg.day.max_tasks_per_block),
                    };
                    svc.generate(day, &prefs)?
                }
                PlanCommand::Lock { block_id, unlock } => svc.set_lock(day, &block_id, !unlock, &cfg.day)?,
                PlanCommand::Move {
                    task_id,
                    from,
                    to,
                    index,
                } => svc.move_task(day, &from, &to, task_id, index).map_err(no_plan_hint)?,
                PlanCommand::Replan => svc.replan(day, &cfg.day)?,
            };
            emit(json, &plan, || render::plan_text(&plan))?;
        }

        Command::Review => {
            let cfg = config::load_config()?;
            let svc = service(&cfg)?;
            let review = svc.review(today())?;
            emit(json, &review, || format!("# Review for {}\n\n{}\n", review.date, review.review))?;
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn service(cfg: &config::Config) -> Result<Service> {
    let store = SqliteStore::open(&state::db_path()?)?;
    Ok(PlanService::new(store, llm::enricher_from_config(&cfg.llm)))
}

fn no_plan_hint(e: PlanError) -> anyhow::Error {
    match e {
        PlanError::NoPlanForDay(day) => {
            anyhow::anyhow!("No plan for {day}. Run: pulse plan generate")
        }
        other => other.into(),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}
