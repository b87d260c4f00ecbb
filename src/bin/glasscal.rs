use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};

use glasscal::calendar::{self, CalendarDay};
use glasscal::config::SyncSettings;
use glasscal::{Glasscal, MonthCursor, Task};

#[derive(Parser)]
#[command(name = "glasscal", about = "Task calendar with cloud sync")]
struct Cli {
    /// Database path (default: ~/.glasscal/glasscal.db)
    #[arg(long)]
    db: Option<String>,

    /// Sync endpoint URL (overrides GLASSCAL_SYNC_URL and the stored config)
    #[arg(long)]
    endpoint: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl glasscal::SyncProgress for StderrProgress {
    fn on_push_start(&self, sync_id: &str, task_count: usize) {
        eprintln!("Uploading {task_count} tasks to {sync_id}...");
    }

    fn on_pull_fetched(&self, sync_id: &str, record_count: usize) {
        eprintln!("Fetched {record_count} tasks from {sync_id}");
    }

    fn on_record_dropped(&self, index: usize, reason: &str) {
        eprintln!("  Skipped record #{index}: {reason}");
    }

    fn on_complete(&self, report: &glasscal::SyncReport) {
        eprintln!("  Done: {} items synced", report.items_synced);
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add, list and edit tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Show a month as a calendar grid
    Calendar {
        /// Year (default: current)
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
        year: Option<i32>,
        /// Month 1-12 (default: current)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Output the grid as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push, pull and inspect the cloud copy
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task
    Add {
        title: String,
        /// Notes for the task
        #[arg(long, default_value = "")]
        content: String,
        /// Day of the task (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Attached image URI
        #[arg(long)]
        image: Option<String>,
    },
    /// List tasks
    List {
        /// Only tasks on this day (YYYY-MM-DD)
        #[arg(long, conflicts_with = "month")]
        date: Option<String>,
        /// Only tasks in this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show one task
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Change a task
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// New day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, conflicts_with = "clear_image")]
        image: Option<String>,
        /// Remove the attached image
        #[arg(long)]
        clear_image: bool,
    },
    /// Delete a task
    Delete { id: i64 },
    /// Delete every local task (sync state is kept)
    Clear {
        /// Skip the safety check
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Upload all local tasks, replacing the cloud copy
    Push,
    /// Replace local tasks with the cloud copy stored under ID
    Pull { sync_id: String },
    /// Ask the server about this device's cloud copy
    Status,
    /// Print this device's sync id
    Id,
    /// Delete local tasks, sync state and the cloud copy
    Wipe {
        /// Skip the safety check
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn parse_month(s: &str) -> anyhow::Result<MonthCursor> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("invalid month '{s}', expected YYYY-MM"))?;
    Ok(MonthCursor::new(first.year(), first.month0()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => glasscal::Database::open_at(path).await?,
        None => glasscal::Database::open().await?,
    };

    match cli.command {
        Commands::Task { action } => {
            handle_task(&Glasscal::open_local(db), action).await?;
        }
        Commands::Calendar { year, month, json } => {
            let gc = Glasscal::open_local(db);
            let current = MonthCursor::current(gc.calculator());
            let cursor = MonthCursor::new(
                year.unwrap_or(current.year),
                month.map(|m| m - 1).unwrap_or(current.month0),
            );
            handle_calendar(&gc, cursor, json).await?;
        }
        Commands::Sync { action } => {
            let gc = match SyncSettings::resolve(&db, cli.endpoint.as_deref()).await {
                Ok(settings) => Glasscal::new(db, settings.client()?),
                // Wiping and reading the id work without a server
                Err(glasscal::Error::Config(msg))
                    if matches!(action, SyncAction::Id | SyncAction::Wipe { .. }) =>
                {
                    log::info!("{msg}");
                    Glasscal::open_local(db)
                }
                Err(e) => return Err(e.into()),
            };
            handle_sync(&gc, action).await?;
        }
        Commands::Config { action } => {
            handle_config(&Glasscal::open_local(db), action).await?;
        }
    }

    Ok(())
}

async fn handle_task(gc: &Glasscal, action: TaskAction) -> anyhow::Result<()> {
    let calc = gc.calculator();
    match action {
        TaskAction::Add {
            title,
            content,
            date,
            image,
        } => {
            let day = match date {
                Some(ref d) => calc.start_of_date(parse_date(d)?),
                None => calc.today_timestamp(),
            };
            let task = gc.add_task(&title, &content, day, image.as_deref()).await?;
            println!("Added task {} on {}", task.id, calc.format_date(task.date));
        }
        TaskAction::List { date, month, json } => {
            let tasks = if let Some(ref d) = date {
                gc.tasks_for_day(calc.start_of_date(parse_date(d)?)).await?
            } else if let Some(ref m) = month {
                let cursor = parse_month(m)?;
                gc.tasks_for_month(cursor.year, cursor.month0).await?
            } else {
                gc.all_tasks().await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in &tasks {
                    print_task_line(gc, task);
                }
            }
        }
        TaskAction::Show { id, json } => {
            let task = gc.task(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                print_task(gc, &task);
            }
        }
        TaskAction::Edit {
            id,
            title,
            content,
            date,
            image,
            clear_image,
        } => {
            let mut task = gc.task(id).await?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(content) = content {
                task.content = content;
            }
            if let Some(ref d) = date {
                task.date = calc.start_of_date(parse_date(d)?);
            }
            if clear_image {
                task.image_uri = None;
            } else if image.is_some() {
                task.image_uri = image;
            }
            let task = gc.edit_task(task).await?;
            println!("Updated task {}.", task.id);
        }
        TaskAction::Delete { id } => {
            gc.delete_task(id).await?;
            println!("Deleted task {id}.");
        }
        TaskAction::Clear { yes } => {
            if !yes {
                anyhow::bail!("this deletes every local task. Re-run with --yes to confirm.");
            }
            let count = gc.clear_tasks().await?;
            println!("Deleted {count} tasks.");
        }
    }
    Ok(())
}

async fn handle_calendar(gc: &Glasscal, cursor: MonthCursor, json: bool) -> anyhow::Result<()> {
    let grid = gc.calendar(cursor.year, cursor.month0).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&grid)?);
        return Ok(());
    }

    println!("{:^42}", cursor.label());
    println!("{}", ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"].map(|d| format!("{d:>6}")).join(""));
    for week in calendar::weeks(&grid) {
        let row: String = week.iter().map(|day| format!("{:>6}", cell_label(day))).collect();
        println!("{row}");
    }

    let busy: Vec<&CalendarDay> = grid
        .iter()
        .filter(|d| d.is_current_month && d.has_tasks())
        .collect();
    if !busy.is_empty() {
        println!();
        for day in busy {
            let extra = match day.additional_task_count() {
                0 => String::new(),
                n => format!(" (+{n})"),
            };
            println!(
                "  {}  {}{extra}",
                gc.calculator().format_date(day.timestamp),
                day.first_task_title().unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Day number, `*` when it has tasks, bracketed when it is today. Days of
/// the neighbouring months show as `.` unless they have tasks.
fn cell_label(day: &CalendarDay) -> String {
    let mut label = if day.is_current_month || day.has_tasks() {
        day.day_of_month.to_string()
    } else {
        ".".to_string()
    };
    if day.has_tasks() {
        label.push('*');
    }
    if day.is_today {
        label = format!("[{label}]");
    }
    label
}

async fn handle_sync(gc: &Glasscal, action: SyncAction) -> anyhow::Result<()> {
    let progress = StderrProgress;
    match action {
        SyncAction::Push => {
            let report = gc.push(&progress).await?;
            print_sync_report(&report);
        }
        SyncAction::Pull { sync_id } => {
            let result = gc.pull(&sync_id, &progress).await?;
            print_sync_report(&result.report);
        }
        SyncAction::Status => {
            let status = gc.check_status().await?;
            let state = gc.sync_state().await?;
            println!("Sync id:   {}", state.sync_id.as_deref().unwrap_or("none"));
            println!("Synced:    {}", if status.synced { "yes" } else { "no" });
            println!(
                "Last sync: {}",
                status.last_sync_date.as_deref().unwrap_or("never")
            );
        }
        SyncAction::Id => {
            let state = gc.sync_state().await?;
            match state.sync_id {
                Some(id) => {
                    println!("{id}");
                    if !state.is_synced {
                        eprintln!("(not yet confirmed by the server)");
                    }
                }
                None => println!("No sync id yet. Run 'glasscal sync push' to create one."),
            }
        }
        SyncAction::Wipe { yes } => {
            if !yes {
                anyhow::bail!(
                    "this deletes every local task and the cloud copy. Re-run with --yes to confirm."
                );
            }
            let report = gc.wipe().await?;
            println!("Deleted {} local tasks.", report.tasks_deleted);
            if report.remote_deleted {
                println!("Cloud copy deleted.");
            } else if let Some(ref err) = report.remote_error {
                println!("Cloud copy kept: {err}");
            }
        }
    }
    Ok(())
}

async fn handle_config(gc: &Glasscal, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match gc.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            gc.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = gc.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

fn print_task_line(gc: &Glasscal, task: &Task) {
    let image = if task.image_uri.is_some() { " [img]" } else { "" };
    println!(
        "{:>5}  {}  {}{image}",
        task.id,
        gc.calculator().format_date(task.date),
        task.title
    );
}

fn print_task(gc: &Glasscal, task: &Task) {
    println!("Task {}", task.id);
    println!("  Title:   {}", task.title);
    println!("  Date:    {}", gc.calculator().format_date(task.date));
    if !task.content.is_empty() {
        println!("  Notes:   {}", task.content);
    }
    if let Some(ref uri) = task.image_uri {
        println!("  Image:   {uri}");
    }
}

fn print_sync_report(report: &glasscal::SyncReport) {
    println!("Sync: {}", report.sync_id);
    println!("  Status:  {:?}", report.status);
    println!("  Synced:  {} items", report.items_synced);
    println!("  Failed:  {} items", report.items_failed);
    if let Some(ref date) = report.sync_date {
        println!("  At:      {date}");
    }
    if let Some(ref err) = report.error {
        println!("  Error:   {err}");
    }
}
