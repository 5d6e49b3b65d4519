//! `cadence` — drive the scheduler against a local database file.
//!
//! This binary is the only place the wall clock is read; every store and
//! engine call takes the resulting instant explicitly.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cadence_engine::{Frequency, UpdateScheduleRequest};
use cadence_store::{Database, PostStatus};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Recurring post scheduler")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "cadence.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Update a user's posting schedule and re-sequence their backlog.
    SetSchedule {
        #[arg(long)]
        user: String,
        /// daily, weekly or monthly.
        #[arg(long)]
        frequency: Frequency,
        /// Local time of day, HH:MM.
        #[arg(long)]
        at: String,
        /// 0-6, 0 = Sunday. Required for weekly schedules.
        #[arg(long)]
        day_of_week: Option<u8>,
        /// 1-31, clamped to shorter months. Required for monthly schedules.
        #[arg(long)]
        day_of_month: Option<u8>,
        /// IANA timezone name, defaults to UTC.
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Create a post on the next reserved slot.
    AddPost {
        #[arg(long)]
        user: String,
        /// Identifier of the externally owned content.
        #[arg(long)]
        content: String,
    },
    /// Show a user's pending backlog in creation order.
    List {
        #[arg(long)]
        user: String,
    },
    /// Show pending posts whose run time has arrived.
    Due {
        /// Poll instant (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Record the publisher's verdict for a post.
    Mark {
        #[arg(long)]
        post: String,
        /// posted or failed.
        #[arg(long, value_parser = parse_status)]
        status: PostStatus,
    },
}

fn parse_status(raw: &str) -> Result<PostStatus, String> {
    match PostStatus::parse(raw) {
        Some(PostStatus::Pending) | None => Err(format!("expected posted or failed, got '{raw}'")),
        Some(status) => Ok(status),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = Database::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    match cli.command {
        Command::SetSchedule {
            user,
            frequency,
            at,
            day_of_week,
            day_of_month,
            timezone,
        } => {
            let request = UpdateScheduleRequest {
                user_id: user,
                frequency: Some(frequency),
                time_of_day: Some(at),
                day_of_week,
                day_of_month,
                timezone,
            };
            let result = db.apply_schedule_update(&request, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::AddPost { user, content } => {
            let post = db.create_post(&user, &content, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&post)?);
        }
        Command::List { user } => {
            let backlog = db.backlog(&user)?;
            println!("{}", serde_json::to_string_pretty(&backlog)?);
        }
        Command::Due { at } => {
            let now = at.unwrap_or_else(Utc::now);
            let due = db.due_posts(now)?;
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
        Command::Mark { post, status } => {
            db.set_post_status(&post, status)?;
            let updated = db
                .get_post(&post)?
                .context("post disappeared after status update")?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }

    Ok(())
}
