use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod models;
mod progress;
mod report;
mod source;
mod weeks;

use config::Settings;
use models::{CheatMeal, DailyLog};
use progress::{ProgressEstimator, ProgressPhase, ProgressSnapshot};
use weeks::WeekBucket;

#[derive(Parser)]
#[command(name = "fit-weeks")]
#[command(about = "Week-by-week view of body-composition logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample daily logs and cheat meals
    Seed,
    /// Import daily logs from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List logs grouped by anchored week, newest first
    Weeks {
        /// Read daily logs from a CSV file instead of Postgres
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Only show logs on or after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        since: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown weekly report
    Report {
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Cheat meals CSV, used together with --csv
        #[arg(long, requires = "csv")]
        meals_csv: Option<PathBuf>,
        #[arg(long, value_parser = parse_date_arg)]
        since: Option<NaiveDate>,
        #[arg(long, default_value = "weekly-report.md")]
        out: PathBuf,
    },
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, weeks::WeekError> {
    weeks::parse_calendar_date(raw)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&settings).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&settings).await?;
            let inserted = with_progress(&settings, "importing", db::import_csv(&pool, &csv)).await?;
            println!("Inserted {inserted} daily logs from {}.", csv.display());
        }
        Commands::Weeks { csv, since, format } => {
            let (logs, _) = load_records(&settings, csv, None).await?;
            let reference = weeks::first_date(&logs);
            let visible = logs
                .iter()
                .filter(|log| since.map_or(true, |since| log.date >= since));
            let buckets = weeks::weekly_buckets(visible, reference);

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&buckets)?),
                OutputFormat::Text => print_weeks(&buckets, reference, &settings),
            }
        }
        Commands::Report {
            csv,
            meals_csv,
            since,
            out,
        } => {
            let (logs, meals) = load_records(&settings, csv, meals_csv).await?;
            let today = weeks::calendar_today(settings.utc_offset);
            let report = report::build_report(&logs, &meals, today, since);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = settings.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Loads complete record sets; filtering by date happens after the week
/// reference is taken so numbering does not shift.
async fn load_records(
    settings: &Settings,
    csv: Option<PathBuf>,
    meals_csv: Option<PathBuf>,
) -> anyhow::Result<(Vec<DailyLog>, Vec<CheatMeal>)> {
    match csv {
        Some(path) => {
            let logs = source::read_daily_logs(&path)?;
            let meals = match meals_csv {
                Some(path) => source::read_cheat_meals(&path)?,
                None => Vec::new(),
            };
            Ok((logs, meals))
        }
        None => {
            let pool = connect(settings).await?;
            with_progress(settings, "loading", async {
                let logs = db::fetch_daily_logs(&pool).await?;
                let meals = db::fetch_cheat_meals(&pool).await?;
                anyhow::Ok((logs, meals))
            })
            .await
        }
    }
}

/// Runs `operation` while a synthetic percentage is drawn on stderr.
async fn with_progress<T>(
    settings: &Settings,
    label: &'static str,
    operation: impl std::future::Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    let mut estimator = ProgressEstimator::new(settings.progress.clone());
    let display = spawn_display(label, estimator.subscribe());
    let result = estimator.track(operation).await;
    let outcome = estimator.snapshot();
    tracing::debug!(label, phase = ?outcome.phase, percent = outcome.percent, "operation finished");
    drop(estimator);
    finish_display(label, display).await;
    result
}

/// Waits for the display task; returns false if it panicked.
async fn finish_display(label: &str, display: JoinHandle<()>) -> bool {
    match display.await {
        Err(error) if error.is_panic() => {
            tracing::warn!(label, %error, "progress display panicked");
            false
        }
        _ => true,
    }
}

fn spawn_display(
    label: &'static str,
    mut updates: tokio::sync::watch::Receiver<ProgressSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = *updates.borrow_and_update();
            match snapshot.phase {
                ProgressPhase::Running => eprint!("\r{label} {:>3.0}%", snapshot.percent),
                ProgressPhase::Done => {
                    eprintln!("\r{label} {:>3.0}%", snapshot.percent);
                    break;
                }
                ProgressPhase::Failed | ProgressPhase::Idle => {
                    eprintln!();
                    break;
                }
            }
        }
    })
}

fn print_weeks(
    buckets: &[WeekBucket<&DailyLog>],
    reference: Option<NaiveDate>,
    settings: &Settings,
) {
    if buckets.is_empty() {
        println!("No daily logs found.");
        return;
    }

    let today = weeks::calendar_today(settings.utc_offset);
    let current = weeks::week_info(today, reference);
    println!(
        "Today ({today}) is week {}, day {} ({} to {}).",
        current.week_number,
        weeks::day_in_week(today, reference),
        current.week_start,
        current.week_end
    );

    for bucket in buckets {
        println!();
        println!(
            "Week {} ({} to {}), {} entries",
            bucket.info.week_number,
            bucket.info.week_start,
            bucket.info.week_end,
            bucket.records.len()
        );
        for log in &bucket.records {
            println!("  {}", report::describe_log(log, reference));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn display_panics_are_reported() {
        let healthy = tokio::spawn(async {});
        assert!(finish_display("loading", healthy).await);

        let broken = tokio::spawn(async { panic!("terminal went away") });
        assert!(!finish_display("loading", broken).await);
    }
}
